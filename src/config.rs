//! System configuration parameters
//!
//! All tunable parameters for the CogniPet device.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Control loop ---
    /// Main loop tick interval (milliseconds). Buttons and combos are
    /// sampled at this rate, so it bounds gesture-timing resolution.
    pub control_loop_interval_ms: u32,

    // --- Buttons / hidden combos ---
    /// Button debounce time (milliseconds).
    pub debounce_ms: u32,
    /// Hold duration for the two-button backdoor combos (milliseconds).
    pub combo_hold_ms: u32,
    /// Hold duration for the diagnostics exit gesture (milliseconds).
    pub diag_exit_hold_ms: u32,

    // --- Diagnostics console ---
    /// Minimum interval between diagnostics page redraws (milliseconds).
    pub diag_refresh_ms: u32,

    // --- Pet menu ---
    /// Idle time before a sub-menu auto-returns to Main (milliseconds).
    pub menu_idle_timeout_ms: u32,

    // --- Pet simulation ---
    /// Minimum elapsed time between maintenance passes (seconds).
    pub maintenance_interval_secs: u32,
    /// Hunger added per maintenance pass.
    pub hunger_step: u8,
    /// Cleanliness removed per maintenance pass.
    pub cleanliness_step: u8,
    /// Hunger level above which happiness takes an extra penalty.
    pub hunger_high_threshold: u8,
    /// Cleanliness level below which happiness takes an extra penalty.
    pub cleanliness_low_threshold: u8,
    /// Happiness penalty applied per unmet need per maintenance pass.
    pub happiness_penalty: u8,
    /// Happiness recovery per maintenance pass when both needs are met.
    pub happiness_recovery: u8,
    /// Happiness at or above this reads as "happy".
    pub mood_happy_threshold: u8,
    /// Happiness below this reads as "sad".
    pub mood_sad_threshold: u8,

    // --- Time synchronization ---
    /// WiFi SSID (empty = no credentials, sync never attempted).
    pub wifi_ssid: heapless::String<32>,
    /// WiFi password (empty allowed for open networks).
    pub wifi_password: heapless::String<64>,
    /// WiFi join timeout (milliseconds). Joining blocks the main loop,
    /// so this also bounds the worst-case loop stall.
    pub connect_timeout_ms: u32,
    /// Per-server SNTP response timeout (milliseconds).
    pub sntp_timeout_ms: u32,
    /// Resync interval once synchronization has succeeded (seconds).
    pub resync_interval_secs: u32,
    /// Time-sync health-check cadence (seconds), independent of outcome.
    pub health_check_interval_secs: u32,
    /// Local timezone offset from UTC (minutes, may be negative).
    pub utc_offset_minutes: i16,

    // --- Assessment timing ---
    /// Dwell time for informational notices (e.g. "sync unavailable").
    pub notice_dwell_ms: u32,
    /// Inter-symbol display time during the memory sequence (milliseconds).
    pub memory_symbol_ms: u32,
    /// Minimum attention-trial arming delay (milliseconds).
    pub attention_min_delay_ms: u32,
    /// Maximum attention-trial arming delay (milliseconds).
    pub attention_max_delay_ms: u32,
    /// Attention cue response window (milliseconds).
    pub attention_window_ms: u32,
    /// Response ceiling for the pet memory minigame (milliseconds).
    pub game_timeout_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Control loop
            control_loop_interval_ms: 25, // 40 Hz — combo timing resolution

            // Buttons / combos
            debounce_ms: 50,
            combo_hold_ms: 2000,
            diag_exit_hold_ms: 1500,

            // Diagnostics
            diag_refresh_ms: 400,

            // Menu
            menu_idle_timeout_ms: 10_000,

            // Pet
            maintenance_interval_secs: 60,
            hunger_step: 2,
            cleanliness_step: 2,
            hunger_high_threshold: 70,
            cleanliness_low_threshold: 30,
            happiness_penalty: 3,
            happiness_recovery: 1,
            mood_happy_threshold: 70,
            mood_sad_threshold: 40,

            // Time sync
            wifi_ssid: heapless::String::new(),
            wifi_password: heapless::String::new(),
            connect_timeout_ms: 10_000,
            sntp_timeout_ms: 5_000,
            resync_interval_secs: 6 * 60 * 60, // 6 h
            health_check_interval_secs: 60,
            utc_offset_minutes: 0,

            // Assessment
            notice_dwell_ms: 1500,
            memory_symbol_ms: 900,
            attention_min_delay_ms: 1500,
            attention_max_delay_ms: 3500,
            attention_window_ms: 2000,
            game_timeout_ms: 15_000,
        }
    }
}

impl SystemConfig {
    /// The three SNTP hosts tried in order: primary plus two fallbacks.
    pub const NTP_SERVERS: [&'static str; 3] =
        ["pool.ntp.org", "time.nist.gov", "time.google.com"];

    /// Whether WiFi credentials are configured at all.
    pub fn has_wifi_credentials(&self) -> bool {
        !self.wifi_ssid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.control_loop_interval_ms > 0);
        assert!(c.debounce_ms < c.combo_hold_ms);
        assert!(c.diag_exit_hold_ms < c.combo_hold_ms);
        assert!(c.mood_sad_threshold < c.mood_happy_threshold);
        assert!(c.hunger_high_threshold > c.cleanliness_low_threshold);
        assert!(c.attention_min_delay_ms < c.attention_max_delay_ms);
        assert!(c.resync_interval_secs > c.health_check_interval_secs);
        assert!(!c.has_wifi_credentials());
    }

    #[test]
    fn combo_timing_resolvable_at_tick_rate() {
        let c = SystemConfig::default();
        // A combo hold must span many ticks, or detection jitter would
        // make the backdoor gestures unreliable.
        assert!(c.combo_hold_ms / c.control_loop_interval_ms >= 10);
        assert!(c.diag_exit_hold_ms / c.control_loop_interval_ms >= 10);
    }

    #[test]
    fn serde_roundtrip() {
        let mut c = SystemConfig::default();
        c.wifi_ssid.push_str("HomeNet").unwrap();
        c.utc_offset_minutes = -300;
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.wifi_ssid, c2.wifi_ssid);
        assert_eq!(c.utc_offset_minutes, c2.utc_offset_minutes);
        assert_eq!(c.combo_hold_ms, c2.combo_hold_ms);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = SystemConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: SystemConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.maintenance_interval_secs, c2.maintenance_interval_secs);
        assert_eq!(c.attention_window_ms, c2.attention_window_ms);
    }
}
