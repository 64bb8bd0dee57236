//! CogniPet Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  I2cDisplay       BleAdapter      NvsAdapter    WifiAdapter    │
//! │  (DisplayPort)    (Telemetry)     (Config+NVS)  (NetworkPort)  │
//! │  SntpAdapter      LogEventSink    MonotonicClock               │
//! │  (SntpPort)       (EventSink)                                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · assessment engine · pet sim · combos            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  TimeSync (join → NTP fetch → drop) · Watchdog                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every wait in the firmware is non-blocking: the loop below ticks the
//! service once per control interval and sleeps the remainder. The only
//! blocking section is the opportunistic time-sync window, which the
//! loop keeps away from active assessment questions.
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use cognipet::adapters::ble::BleAdapter;
use cognipet::adapters::device_id;
use cognipet::adapters::log_sink::LogEventSink;
use cognipet::adapters::nvs::NvsAdapter;
use cognipet::adapters::time::{MonotonicClock, SntpAdapter};
use cognipet::adapters::wifi::WifiAdapter;
use cognipet::app::ports::ConfigPort;
use cognipet::app::service::AppService;
use cognipet::clock::TimeSync;
use cognipet::config::SystemConfig;
use cognipet::drivers::display::I2cDisplay;
use cognipet::events;
use cognipet::fsm::StateId;
use cognipet::fsm::context::ClockSnapshot;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  CogniPet v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = cognipet::drivers::hw_init::init_peripherals() {
        // Peripheral init failure is critical — log and halt.
        // In production this triggers the watchdog reset after timeout.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    let watchdog = cognipet::drivers::watchdog::Watchdog::new();

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    let first_boot = nvs.is_first_boot();
    if first_boot {
        info!("No prior assessment on record — baseline flow armed");
    }

    // ── 4. Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    let ble_name = device_id::ble_name(&mac);
    info!("Device ID: {} (BLE name: {})", dev_id, ble_name);

    // ── 5. Construct adapters ─────────────────────────────────
    let mut display = match I2cDisplay::init() {
        Ok(d) => d,
        Err(e) => {
            // A dead LCD still leaves BLE telemetry and the log
            // running; keep going with the unready handle.
            warn!("LCD init failed: {} — display writes will be dropped", e);
            I2cDisplay::unready()
        }
    };

    let mut ble = BleAdapter::new(ble_name);
    ble.start();

    let mut log_sink = LogEventSink::new();
    let monotonic = MonotonicClock::new();

    #[cfg(target_os = "espidf")]
    let network = {
        use esp_idf_hal::peripherals::Peripherals;
        use esp_idf_svc::eventloop::EspSystemEventLoop;
        use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let wifi = BlockingWifi::wrap(
            EspWifi::new(peripherals.modem, sysloop.clone(), None)?,
            sysloop,
        )?;
        WifiAdapter::new(wifi, &config)
    };
    #[cfg(not(target_os = "espidf"))]
    let network = WifiAdapter::new(&config);

    let mut timesync = TimeSync::new(network, SntpAdapter::new());

    // ── 6. Construct app service ──────────────────────────────
    let mut svc = AppService::new(config.clone(), first_boot);
    svc.start(&mut log_sink);

    info!("System ready. Entering control loop.");

    // ── 7. Control loop ───────────────────────────────────────
    let interval_ms = config.control_loop_interval_ms;
    loop {
        let loop_start = monotonic.uptime_ms();

        // Fold queued BLE stack events into the service first so the
        // tick sees the current link state.
        events::drain_events(|event| svc.handle_event(event));

        // Snapshot inputs and clocks for this tick.
        #[cfg(target_os = "espidf")]
        let raw = cognipet::drivers::button::read_raw_levels();
        #[cfg(not(target_os = "espidf"))]
        let raw = [false; 3];

        let uptime_ms = monotonic.uptime_ms();
        let clock = ClockSnapshot {
            uptime_ms,
            wall: timesync.wall_clock(uptime_ms, &config),
            timestamp: timesync.timestamp(uptime_ms, &config),
        };

        let outcome = svc.tick(raw, clock, &mut display, &mut ble, &mut log_sink);

        // Opportunistic time sync. An explicit request (assessment
        // about to start) syncs immediately; otherwise the periodic
        // health check runs, but never during an active assessment —
        // the join window would stall a response-time question.
        if outcome.sync_requested {
            timesync.ensure_sync(uptime_ms, &config);
        } else if outcome.state != StateId::Assessment {
            timesync.periodic(uptime_ms, &config);
        }
        svc.update_sync_view(timesync.state());

        // Deferred BLE work, including the post-disconnect re-advertise.
        ble.poll(uptime_ms);

        // Write-back of the first-boot flag, retried until it lands.
        svc.persist_assessed_flag_if_needed(&mut nvs);

        watchdog.feed();

        // Sleep the remainder of the control interval.
        let elapsed = monotonic.uptime_ms().wrapping_sub(loop_start);
        let sleep_ms = interval_ms.saturating_sub(elapsed).max(1);
        std::thread::sleep(std::time::Duration::from_millis(sleep_ms as u64));
    }
}
