// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `incbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "incbuild",
    version,
    about = "Watch folders and run templated shell commands on file changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the watch-definitions file (JSON, or TOML with a `.toml`
    /// extension).
    #[arg(value_name = "CONFIG")]
    pub config: String,

    /// Names of the watches to activate.
    ///
    /// When omitted, every watch in the file is activated.
    #[arg(value_name = "WATCH")]
    pub watches: Vec<String>,

    /// List all available watches and exit.
    #[arg(short, long, conflicts_with = "show")]
    pub list: bool,

    /// Show the configuration of a watch and exit.
    #[arg(short, long, value_name = "WATCH")]
    pub show: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `INCBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_required_and_watch_names_are_optional() {
        assert!(CliArgs::try_parse_from(["incbuild"]).is_err());

        let args = CliArgs::try_parse_from(["incbuild", "watches.json"]).unwrap();
        assert_eq!(args.config, "watches.json");
        assert!(args.watches.is_empty());

        let args =
            CliArgs::try_parse_from(["incbuild", "watches.json", "ts", "scss"]).unwrap();
        assert_eq!(args.watches, vec!["ts".to_string(), "scss".to_string()]);
    }

    #[test]
    fn list_and_show_are_mutually_exclusive() {
        assert!(
            CliArgs::try_parse_from(["incbuild", "w.json", "--list", "--show", "ts"]).is_err()
        );
        let args = CliArgs::try_parse_from(["incbuild", "w.json", "--show", "ts"]).unwrap();
        assert_eq!(args.show.as_deref(), Some("ts"));
    }
}
