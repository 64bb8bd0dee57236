//! Opportunistic wall-clock time synchronization.
//!
//! The appliance is battery powered and intermittently connected: the
//! radio joins the network only long enough to fetch NTP time, then
//! drops the join. Every caller that needs truthful calendar time must
//! handle the unsynchronized case explicitly; [`TimeSync::wall_clock`]
//! returns `None` rather than a guess.
//!
//! Network and NTP access go through the [`NetworkPort`] and
//! [`SntpPort`] traits so the whole service runs against mocks on the
//! host.

use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::CommsError;

/// Calendar-correct time, only available while synchronized.
/// `weekday` is 0 = Sunday .. 6 = Saturday; `hour` is 0..=23. Both are
/// derived in the configured local offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub unix: u32,
    pub weekday: u8,
    pub hour: u8,
}

/// Station-mode network join/leave, bounded by a connect timeout.
pub trait NetworkPort {
    fn has_credentials(&self) -> bool;
    /// Join the configured network. Returns the obtained IPv4 address
    /// (display only).
    fn join(&mut self, timeout_ms: u32) -> Result<[u8; 4], CommsError>;
    fn leave(&mut self);
}

/// One-shot NTP fetch against a named server.
pub trait SntpPort {
    fn fetch_unix_time(&mut self, server: &str, timeout_ms: u32) -> Result<u32, CommsError>;
}

/// Observable sync status, surfaced on the diagnostics console.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSyncState {
    pub joined: bool,
    pub synced: bool,
    pub last_sync_uptime_ms: u32,
    pub last_join_uptime_ms: u32,
    pub last_ip: Option<[u8; 4]>,
}

pub struct TimeSync<N, S> {
    network: N,
    sntp: S,
    state: TimeSyncState,
    /// Base pair: unix seconds captured at `base_uptime_ms`. Wall
    /// clock is extrapolated from here between syncs.
    base_unix: u32,
    base_uptime_ms: u32,
    last_health_check_ms: u32,
}

impl<N: NetworkPort, S: SntpPort> TimeSync<N, S> {
    pub fn new(network: N, sntp: S) -> Self {
        Self {
            network,
            sntp,
            state: TimeSyncState::default(),
            base_unix: 0,
            base_uptime_ms: 0,
            last_health_check_ms: 0,
        }
    }

    pub fn state(&self) -> TimeSyncState {
        self.state
    }

    pub fn is_synced(&self) -> bool {
        self.state.synced
    }

    /// Attempt a sync if one is due: credentials configured, and either
    /// never synced or the resync interval has elapsed. Blocks the
    /// caller for up to connect + NTP timeouts; callers keep this away
    /// from active assessment questions. All failures collapse to
    /// "unsynchronized" and are never propagated.
    pub fn ensure_sync(&mut self, uptime_ms: u32, config: &SystemConfig) {
        if !self.network.has_credentials() {
            return;
        }
        if self.state.synced {
            let elapsed_secs = uptime_ms.wrapping_sub(self.state.last_sync_uptime_ms) / 1000;
            if elapsed_secs < config.resync_interval_secs {
                return;
            }
        }
        self.attempt_sync(uptime_ms, config);
    }

    /// Health-check bookkeeping, called every control-loop iteration.
    /// Runs at most once per health-check interval regardless of
    /// outcome.
    pub fn periodic(&mut self, uptime_ms: u32, config: &SystemConfig) {
        let elapsed_secs = uptime_ms.wrapping_sub(self.last_health_check_ms) / 1000;
        if elapsed_secs < config.health_check_interval_secs {
            return;
        }
        self.last_health_check_ms = uptime_ms;
        self.ensure_sync(uptime_ms, config);
    }

    /// Calendar time in the configured local offset, `None` while
    /// unsynchronized.
    pub fn wall_clock(&self, uptime_ms: u32, config: &SystemConfig) -> Option<WallClock> {
        if !self.state.synced {
            return None;
        }
        let unix = self.base_unix + uptime_ms.wrapping_sub(self.base_uptime_ms) / 1000;
        let local = unix as i64 + config.utc_offset_minutes as i64 * 60;
        let days = local.div_euclid(86_400);
        let secs_of_day = local.rem_euclid(86_400);
        Some(WallClock {
            unix,
            // Unix epoch (1970-01-01) was a Thursday.
            weekday: ((days + 4).rem_euclid(7)) as u8,
            hour: (secs_of_day / 3600) as u8,
        })
    }

    /// Unix seconds when synced, uptime-seconds surrogate otherwise.
    /// Callers that must not trust the surrogate use [`wall_clock`]
    /// and handle `None`.
    ///
    /// [`wall_clock`]: Self::wall_clock
    pub fn timestamp(&self, uptime_ms: u32, config: &SystemConfig) -> u32 {
        match self.wall_clock(uptime_ms, config) {
            Some(wall) => wall.unix,
            None => uptime_ms / 1000,
        }
    }

    fn attempt_sync(&mut self, uptime_ms: u32, config: &SystemConfig) {
        let ip = match self.network.join(config.connect_timeout_ms) {
            Ok(ip) => ip,
            Err(err) => {
                warn!("timesync: join failed: {err}");
                return;
            }
        };
        self.state.joined = true;
        self.state.last_join_uptime_ms = uptime_ms;
        self.state.last_ip = Some(ip);

        for server in SystemConfig::NTP_SERVERS {
            match self.sntp.fetch_unix_time(server, config.sntp_timeout_ms) {
                Ok(unix) => {
                    self.base_unix = unix;
                    self.base_uptime_ms = uptime_ms;
                    self.state.synced = true;
                    self.state.last_sync_uptime_ms = uptime_ms;
                    info!("timesync: synced via {server} (unix {unix})");
                    break;
                }
                Err(err) => {
                    warn!("timesync: {server} failed: {err}");
                }
            }
        }

        // Drop the join immediately to conserve power, whether or not
        // a server answered.
        self.network.leave();
        self.state.joined = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockNetwork {
        creds: bool,
        join_ok: bool,
        joins: u32,
        leaves: u32,
    }

    impl MockNetwork {
        fn new(creds: bool, join_ok: bool) -> Self {
            Self {
                creds,
                join_ok,
                joins: 0,
                leaves: 0,
            }
        }
    }

    impl NetworkPort for MockNetwork {
        fn has_credentials(&self) -> bool {
            self.creds
        }

        fn join(&mut self, _timeout_ms: u32) -> Result<[u8; 4], CommsError> {
            self.joins += 1;
            if self.join_ok {
                Ok([192, 168, 1, 50])
            } else {
                Err(CommsError::JoinTimeout)
            }
        }

        fn leave(&mut self) {
            self.leaves += 1;
        }
    }

    struct MockSntp {
        /// Servers that fail before one answers.
        failures_before_success: usize,
        fetches: Vec<&'static str>,
        unix: u32,
    }

    impl SntpPort for MockSntp {
        fn fetch_unix_time(&mut self, server: &str, _timeout_ms: u32) -> Result<u32, CommsError> {
            let attempt = self.fetches.len();
            // Server name strings come from the fixed NTP table.
            self.fetches.push(SystemConfig::NTP_SERVERS
                .iter()
                .copied()
                .find(|s| *s == server)
                .unwrap());
            if attempt < self.failures_before_success {
                Err(CommsError::SntpNoResponse)
            } else {
                Ok(self.unix)
            }
        }
    }

    fn sntp_ok(unix: u32) -> MockSntp {
        MockSntp {
            failures_before_success: 0,
            fetches: Vec::new(),
            unix,
        }
    }

    #[test]
    fn no_credentials_means_no_join() {
        let config = SystemConfig::default();
        let mut sync = TimeSync::new(MockNetwork::new(false, true), sntp_ok(1_700_000_000));
        sync.ensure_sync(0, &config);
        assert_eq!(sync.network.joins, 0);
        assert!(!sync.is_synced());
        assert_eq!(sync.wall_clock(5000, &config), None);
        // Surrogate timestamp falls back to uptime seconds.
        assert_eq!(sync.timestamp(5000, &config), 5);
    }

    #[test]
    fn successful_sync_sets_base_and_drops_join() {
        let config = SystemConfig::default();
        // 2023-11-14 22:13:20 UTC, a Tuesday.
        let mut sync = TimeSync::new(MockNetwork::new(true, true), sntp_ok(1_700_000_000));
        sync.ensure_sync(10_000, &config);

        assert!(sync.is_synced());
        let state = sync.state();
        assert!(!state.joined);
        assert_eq!(state.last_ip, Some([192, 168, 1, 50]));
        assert_eq!(sync.network.leaves, 1);

        let wall = sync.wall_clock(10_000, &config).unwrap();
        assert_eq!(wall.unix, 1_700_000_000);
        assert_eq!(wall.weekday, 2);
        assert_eq!(wall.hour, 22);

        // Wall clock extrapolates from the base pair.
        let later = sync.wall_clock(70_000, &config).unwrap();
        assert_eq!(later.unix, 1_700_000_060);
        assert_eq!(sync.timestamp(70_000, &config), 1_700_000_060);
    }

    #[test]
    fn fallback_servers_are_tried_in_order() {
        let config = SystemConfig::default();
        let sntp = MockSntp {
            failures_before_success: 2,
            fetches: Vec::new(),
            unix: 1_700_000_000,
        };
        let mut sync = TimeSync::new(MockNetwork::new(true, true), sntp);
        sync.ensure_sync(0, &config);
        assert!(sync.is_synced());
        assert_eq!(sync.sntp.fetches, SystemConfig::NTP_SERVERS.to_vec());
    }

    #[test]
    fn join_failure_collapses_to_unsynchronized() {
        let config = SystemConfig::default();
        let mut sync = TimeSync::new(MockNetwork::new(true, false), sntp_ok(1_700_000_000));
        sync.ensure_sync(0, &config);
        assert!(!sync.is_synced());
        // Never joined, so nothing to leave.
        assert_eq!(sync.network.leaves, 0);
        assert_eq!(sync.wall_clock(0, &config), None);
    }

    #[test]
    fn resync_waits_for_the_interval() {
        let config = SystemConfig::default();
        let mut sync = TimeSync::new(MockNetwork::new(true, true), sntp_ok(1_700_000_000));
        sync.ensure_sync(0, &config);
        assert_eq!(sync.network.joins, 1);

        // Synced recently: no new join.
        sync.ensure_sync(60_000, &config);
        assert_eq!(sync.network.joins, 1);

        // 6 h later the resync interval has elapsed.
        let six_hours_ms = config.resync_interval_secs * 1000;
        sync.ensure_sync(six_hours_ms, &config);
        assert_eq!(sync.network.joins, 2);
    }

    #[test]
    fn health_check_is_rate_limited() {
        let config = SystemConfig::default();
        let mut sync = TimeSync::new(MockNetwork::new(true, false), sntp_ok(0));
        sync.periodic(60_000, &config);
        assert_eq!(sync.network.joins, 1);
        // Within the same health-check window: no retry.
        sync.periodic(90_000, &config);
        assert_eq!(sync.network.joins, 1);
        sync.periodic(120_000, &config);
        assert_eq!(sync.network.joins, 2);
    }

    #[test]
    fn utc_offset_shifts_weekday_and_hour() {
        let mut config = SystemConfig::default();
        // 2023-11-14 22:13:20 UTC at -300 min is still Tuesday 17:13;
        // at +120 min it crosses midnight into Wednesday 00:13.
        let mut sync = TimeSync::new(MockNetwork::new(true, true), sntp_ok(1_700_000_000));
        sync.ensure_sync(0, &config);

        config.utc_offset_minutes = -300;
        let wall = sync.wall_clock(0, &config).unwrap();
        assert_eq!((wall.weekday, wall.hour), (2, 17));

        config.utc_offset_minutes = 120;
        let wall = sync.wall_clock(0, &config).unwrap();
        assert_eq!((wall.weekday, wall.hour), (3, 0));
    }
}
