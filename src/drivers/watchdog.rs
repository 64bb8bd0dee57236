//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the device if the 25 ms dispatcher loop stalls for more than
//! [`TIMEOUT_MS`]. Every wait in the firmware is non-blocking, so a
//! trip here means a real hang (stuck I²C transaction, wedged radio
//! task), not a slow code path.
//!
//! The dispatcher must call `feed()` on every iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Loop-stall budget before the TWDT forces a panic reset.
pub const TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    armed: bool,
}

impl Watchdog {
    /// Reconfigure the TWDT and subscribe the current task to it.
    /// Subscription failure leaves the watchdog disarmed but the
    /// firmware running.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            let armed = Self::subscribe_current_task();
            Self { armed }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op");
            Self {}
        }
    }

    #[cfg(target_os = "espidf")]
    fn subscribe_current_task() -> bool {
        let cfg = esp_task_wdt_config_t {
            timeout_ms: TIMEOUT_MS,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: TWDT calls run on the main task before the loop starts.
        let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
        if ret != ESP_OK {
            log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
        }

        let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
        if ret == ESP_OK {
            log::info!("Watchdog: armed ({} ms budget, panic on trip)", TIMEOUT_MS);
            true
        } else {
            log::warn!("Watchdog: task subscribe failed ({})", ret);
            false
        }
    }

    /// Feed the watchdog. Must be called at least once per [`TIMEOUT_MS`].
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.armed {
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}
