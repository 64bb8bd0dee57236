//! Time adapters: monotonic uptime and the SNTP fetch.
//!
//! - [`MonotonicClock`] wraps `esp_timer_get_time()` on target
//!   (microsecond precision, monotonic) and `std::time::Instant` on
//!   the host.
//! - [`SntpAdapter`] implements [`SntpPort`]: a one-shot blocking
//!   fetch of unix time from a named server, used only inside the
//!   join → fetch → drop window.

use crate::clock::SntpPort;
use crate::error::CommsError;

// ───────────────────────────────────────────────────────────────
// Monotonic uptime
// ───────────────────────────────────────────────────────────────

pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot. Wraps after ~49 days, which every
    /// consumer handles with `wrapping_sub` arithmetic.
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u32 {
        ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1_000) as u32
    }

    /// Milliseconds since boot.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

// ───────────────────────────────────────────────────────────────
// SNTP fetch
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use espidf::SntpAdapter;

#[cfg(target_os = "espidf")]
mod espidf {
    use super::*;
    use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus, SNTP_SERVER_NUM};
    use log::{info, warn};

    const POLL_INTERVAL_MS: u64 = 100;

    /// One-shot SNTP client. A fresh `EspSntp` instance is created per
    /// fetch and dropped afterwards so nothing keeps polling once the
    /// radio is off.
    pub struct SntpAdapter;

    impl SntpAdapter {
        pub fn new() -> Self {
            Self
        }
    }

    impl Default for SntpAdapter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SntpPort for SntpAdapter {
        fn fetch_unix_time(&mut self, server: &str, timeout_ms: u32) -> Result<u32, CommsError> {
            let conf = SntpConf {
                servers: [server; SNTP_SERVER_NUM],
                ..Default::default()
            };
            let sntp = EspSntp::new(&conf).map_err(|e| {
                warn!("SNTP: client init failed: {}", e);
                CommsError::SntpNoResponse
            })?;

            let mut waited_ms: u32 = 0;
            while sntp.get_sync_status() != SyncStatus::Completed {
                if waited_ms >= timeout_ms {
                    warn!("SNTP: no response from {} within {}ms", server, timeout_ms);
                    return Err(CommsError::SntpNoResponse);
                }
                std::thread::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS));
                waited_ms += POLL_INTERVAL_MS as u32;
            }

            let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
            // SAFETY: plain libc-style call writing into a stack struct.
            if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
                return Err(CommsError::SntpNoResponse);
            }
            // Reject obviously unsynced time (before 2020-01-01).
            const EPOCH_2020: i64 = 1_577_836_800;
            if (tv.tv_sec as i64) < EPOCH_2020 {
                return Err(CommsError::SntpNoResponse);
            }
            info!("SNTP: synced from {} (unix={})", server, tv.tv_sec);
            Ok(tv.tv_sec as u32)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub use sim::SntpAdapter;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use super::*;
    use log::info;

    /// Host stand-in returning a scripted unix time, or timing out
    /// when none is set.
    pub struct SntpAdapter {
        pub unix_time: Option<u32>,
    }

    impl SntpAdapter {
        pub fn new() -> Self {
            // Sim default: a known Tuesday evening.
            Self {
                unix_time: Some(1_700_000_000),
            }
        }
    }

    impl Default for SntpAdapter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SntpPort for SntpAdapter {
        fn fetch_unix_time(&mut self, server: &str, _timeout_ms: u32) -> Result<u32, CommsError> {
            match self.unix_time {
                Some(t) => {
                    info!("SNTP(sim): {} reports unix={}", server, t);
                    Ok(t)
                }
                None => Err(CommsError::SntpNoResponse),
            }
        }
    }
}
