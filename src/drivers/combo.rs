//! Hidden button-combo detectors.
//!
//! Three two-button holds force state transitions from anywhere in the
//! state machine; they are evaluated on every control-loop iteration,
//! before the current state's handler runs:
//!
//! | Buttons held 2 s | Action                         |
//! |------------------|--------------------------------|
//! | 1 + 2            | Start assessment               |
//! | 1 + 3            | Inject synthetic test result   |
//! | 2 + 3            | Enter diagnostics              |
//!
//! Inside diagnostics, a separate 1.5 s single-button hold of button 3
//! exits. The exit gesture arms only after button 3 has been seen
//! released, so the 2+3 entry combo cannot immediately bounce back out.

use crate::config::SystemConfig;
use crate::drivers::button::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combo {
    StartAssessment,
    InjectTestResult,
    EnterDiagnostics,
}

/// (first button, second button, button that must stay up).
const COMBO_TABLE: [(usize, usize, usize, Combo); 3] = [
    (0, 1, 2, Combo::StartAssessment),
    (0, 2, 1, Combo::InjectTestResult),
    (1, 2, 0, Combo::EnterDiagnostics),
];

pub struct ComboDetector {
    hold_ms: u32,
    /// Set after a combo fires; cleared once every button is up, so a
    /// continued hold reports the combo exactly once.
    latched: bool,
}

impl ComboDetector {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            hold_ms: config.combo_hold_ms,
            latched: false,
        }
    }

    pub fn reset(&mut self) {
        self.latched = false;
    }

    pub fn evaluate(&mut self, snap: &InputSnapshot) -> Option<Combo> {
        if self.latched {
            if snap.pressed.iter().all(|&p| !p) {
                self.latched = false;
            }
            return None;
        }

        for (a, b, up, combo) in COMBO_TABLE {
            if snap.pressed[a]
                && snap.pressed[b]
                && !snap.pressed[up]
                && snap.held_ms[a] >= self.hold_ms
                && snap.held_ms[b] >= self.hold_ms
            {
                self.latched = true;
                return Some(combo);
            }
        }
        None
    }
}

/// Diagnostics exit: button 3 held alone for the exit duration.
pub struct ExitGesture {
    hold_ms: u32,
    armed: bool,
}

impl ExitGesture {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            hold_ms: config.diag_exit_hold_ms,
            armed: false,
        }
    }

    /// Call on diagnostics entry.
    pub fn reset(&mut self) {
        self.armed = false;
    }

    pub fn evaluate(&mut self, snap: &InputSnapshot) -> bool {
        if !self.armed {
            // Still riding the 2+3 entry hold.
            if !snap.pressed[2] {
                self.armed = true;
            }
            return false;
        }
        snap.pressed[2]
            && !snap.pressed[0]
            && !snap.pressed[1]
            && snap.held_ms[2] >= self.hold_ms
    }
}
