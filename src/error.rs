//! Error types for the CogniPet firmware.
//!
//! One small enum per subsystem, all `Copy` so they pass through the
//! dispatcher without allocation.
//!
//! Note the taxonomy: nothing in here is fatal. Display faults skip the
//! write and leave stale contents, network faults collapse to
//! "unsynchronized", telemetry faults drop the notification and keep the
//! local ring entry. The device never restarts over any of these.

use core::fmt;

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// No WiFi credentials are configured — join not attempted.
    NoCredentials,
    /// WiFi join did not complete within the connect timeout.
    JoinTimeout,
    /// WiFi join was rejected (auth failure, AP unreachable).
    JoinFailed,
    /// No SNTP server produced a response.
    SntpNoResponse,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::JoinTimeout => write!(f, "WiFi join timed out"),
            Self::JoinFailed => write!(f, "WiFi join failed"),
            Self::SntpNoResponse => write!(f, "no SNTP server responded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Display errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// I²C write to the LCD controller failed.
    I2cWriteFailed,
    /// I²C write to the RGB backlight controller failed.
    BacklightWriteFailed,
    /// The bus has not been initialised yet.
    BusNotReady,
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2cWriteFailed => write!(f, "I2C write to LCD failed"),
            Self::BacklightWriteFailed => write!(f, "I2C write to backlight failed"),
            Self::BusNotReady => write!(f, "display bus not ready"),
        }
    }
}
