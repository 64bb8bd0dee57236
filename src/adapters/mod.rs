//! Adapter implementations of the application ports.
//!
//! Each adapter is cfg-gated: ESP-IDF implementations compile only on
//! `target_os = "espidf"`; every module provides a simulation fallback
//! so the whole crate builds and tests on the host.

pub mod ble;
pub mod device_id;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
