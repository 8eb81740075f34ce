// src/engine/activity.rs

//! Low-noise progress feedback on stdout.
//!
//! Each acted-upon event prints one symbol; symbols are grouped 100 per
//! line, each line starting with a timestamp:
//!
//! ```text
//! [2024-05-01T10:00:00.000Z] ccacf.d
//! ```
//!
//! Command output shown with `showStdout` goes through the same writer so
//! it starts on its own line and the next symbol opens a fresh group.

use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use tracing::warn;

use crate::watch::ChangeKind;

/// Symbols per report line.
pub const GROUP_SIZE: usize = 100;

pub const LEGEND: &str = "
Changes report legend:

  a - Added file
  f - Added folder
  c - Changed file
  d - Deleted file
  e - Watcher error
  . - Any other change event
";

/// Symbol printed for a change kind.
pub fn symbol(kind: ChangeKind) -> char {
    match kind {
        ChangeKind::Add => 'a',
        ChangeKind::AddDir => 'f',
        ChangeKind::Change => 'c',
        ChangeKind::Unlink => 'd',
        ChangeKind::Error => 'e',
        ChangeKind::UnlinkDir => '.',
    }
}

struct ReportState {
    writer: Box<dyn Write + Send>,
    counter: usize,
    enabled: bool,
}

/// Shared, cloneable handle to the activity line.
#[derive(Clone)]
pub struct ActivityReporter {
    state: Arc<Mutex<ReportState>>,
}

impl std::fmt::Debug for ActivityReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityReporter").finish_non_exhaustive()
    }
}

impl ActivityReporter {
    /// Reporter writing to stdout.
    pub fn stdout(enabled: bool) -> Self {
        Self::with_writer(Box::new(std::io::stdout()), enabled)
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, enabled: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(ReportState {
                writer,
                counter: 0,
                enabled,
            })),
        }
    }

    /// Reporter that drops symbols but still passes command output through
    /// to stdout.
    pub fn disabled() -> Self {
        Self::stdout(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().map(|s| s.enabled).unwrap_or(false)
    }

    pub fn print_legend(&self) {
        self.write_with(|state| {
            if state.enabled {
                writeln!(state.writer, "{LEGEND}")?;
            }
            Ok(())
        });
    }

    /// Append the symbol for `kind` to the current line.
    pub fn report(&self, kind: ChangeKind) {
        self.write_with(|state| {
            if !state.enabled {
                return Ok(());
            }
            if state.counter % GROUP_SIZE == 0 {
                let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                write!(state.writer, "\n[{now}] ")?;
            }
            write!(state.writer, "{}", symbol(kind))?;
            state.counter += 1;
            Ok(())
        });
    }

    /// Print a line of command output and restart symbol grouping.
    pub fn passthrough(&self, line: &str) {
        self.write_with(|state| {
            if state.enabled && state.counter % GROUP_SIZE != 0 {
                writeln!(state.writer)?;
            }
            writeln!(state.writer, "{line}")?;
            state.counter = 0;
            Ok(())
        });
    }

    fn write_with<F>(&self, f: F)
    where
        F: FnOnce(&mut ReportState) -> std::io::Result<()>,
    {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = f(&mut state).and_then(|()| state.writer.flush());
        if let Err(err) = result {
            warn!(error = %err, "failed to write activity report");
        }
    }
}
