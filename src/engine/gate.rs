// src/engine/gate.rs

/// Per-watch switch that holds back command execution until the watcher has
/// finished its initial scan.
///
/// The watcher reports every pre-existing entry as an `add` while scanning;
/// acting on those would re-run every command at startup. The gate moves
/// from scanning to armed once, on the watcher's `Ready`, and never goes back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionGate {
    armed: bool,
}

impl ExecutionGate {
    /// A gate in the scanning state.
    pub fn new() -> Self {
        Self { armed: false }
    }

    /// A gate that is armed from the start (`executeBeforeReady`).
    pub fn pre_armed() -> Self {
        Self { armed: true }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arm the gate. Returns true only for the call that changed the state.
    pub fn arm(&mut self) -> bool {
        let transitioned = !self.armed;
        self.armed = true;
        transitioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_scanning_and_arms_once() {
        let mut gate = ExecutionGate::new();
        assert!(!gate.is_armed());

        assert!(gate.arm());
        assert!(gate.is_armed());

        assert!(!gate.arm());
        assert!(gate.is_armed());
    }

    #[test]
    fn pre_armed_gate_does_not_transition_again() {
        let mut gate = ExecutionGate::pre_armed();
        assert!(gate.is_armed());
        assert!(!gate.arm());
    }
}
