//! Hardware drivers for the CogniPet main board.
//!
//! Everything here is either pure logic (debounce, combo detection)
//! that runs identically on host and target, or a thin shim over raw
//! ESP-IDF sys calls gated on `target_os = "espidf"` with a simulation
//! fallback.

pub mod button;
pub mod combo;
pub mod display;
pub mod hw_init;
pub mod watchdog;
