//! Inbound commands to the application service.
//!
//! The hidden button combos decode to these; keeping a command layer
//! (rather than calling transitions directly from the combo detector)
//! means a serial console or test harness can drive the same paths.

/// Commands that force behaviour from anywhere in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Begin a real assessment run (buttons 1+2 held).
    StartAssessment,

    /// Queue a synthetic cycling test result on the telemetry path
    /// without running the assessment (buttons 1+3 held).
    InjectTestResult,

    /// Enter the diagnostics console (buttons 2+3 held).
    EnterDiagnostics,
}
