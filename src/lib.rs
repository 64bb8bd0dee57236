//! CogniPet firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod assessment;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod events;
pub mod fsm;
pub mod pet;
pub mod telemetry;

pub mod error;
pub mod pins;

// Adapter and driver modules compile on every target; the actual
// hardware implementations are guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;
