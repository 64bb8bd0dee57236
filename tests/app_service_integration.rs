//! Integration tests: AppService → FSM → adapters, end to end.
//!
//! Drives the service through the same seams the firmware entry point
//! uses: raw button levels in, display / BLE / storage adapters out.
//! All adapters here are the simulation variants that back host builds.

use cognipet::adapters::ble::BleAdapter;
use cognipet::adapters::nvs::NvsAdapter;
use cognipet::adapters::time::SntpAdapter;
use cognipet::adapters::wifi::WifiAdapter;
use cognipet::app::events::AppEvent;
use cognipet::app::ports::{ConfigPort, EventSink};
use cognipet::app::service::AppService;
use cognipet::clock::TimeSync;
use cognipet::config::SystemConfig;
use cognipet::drivers::display::{BufferDisplay, LCD_COLS};
use cognipet::fsm::StateId;
use cognipet::fsm::context::ClockSnapshot;
use cognipet::telemetry::records::{decode_assessment, decode_interaction};
use cognipet::telemetry::InteractionKind;

// ── Test harness ──────────────────────────────────────────────

#[derive(Default)]
struct CaptureSink {
    events: Vec<AppEvent>,
}

impl EventSink for CaptureSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

/// Runs the service against the simulation adapters on a fixed 25 ms
/// grid, the same cadence the firmware loop uses.
struct Bench {
    svc: AppService,
    display: BufferDisplay,
    ble: BleAdapter,
    sink: CaptureSink,
    uptime_ms: u32,
}

const IDLE: [bool; 3] = [false; 3];

impl Bench {
    fn new(first_boot: bool) -> Self {
        let mut name = heapless::String::<24>::new();
        name.push_str("CogniPet-TEST").ok();
        let mut ble = BleAdapter::new(name);
        ble.start();

        let mut svc = AppService::new(SystemConfig::default(), first_boot);
        let mut sink = CaptureSink::default();
        svc.start(&mut sink);

        Self {
            svc,
            display: BufferDisplay::new(),
            ble,
            sink,
            uptime_ms: 0,
        }
    }

    fn tick(&mut self, raw: [bool; 3]) {
        self.uptime_ms += 25;
        let clock = ClockSnapshot {
            uptime_ms: self.uptime_ms,
            wall: None,
            timestamp: self.uptime_ms / 1000,
        };
        self.svc.tick(
            raw,
            clock,
            &mut self.display,
            &mut self.ble,
            &mut self.sink,
        );
    }

    fn run(&mut self, raw: [bool; 3], ticks: u32) {
        for _ in 0..ticks {
            self.tick(raw);
        }
    }

    /// Debounced press-and-release of one button.
    fn press(&mut self, button: usize) {
        let mut raw = [false; 3];
        raw[button] = true;
        self.run(raw, 4);
        self.run(IDLE, 4);
    }

    /// Ticks until the assessment in progress finishes, mashing the
    /// buttons on a rotating cadence so every phase eventually sees
    /// an answer.
    fn mash_through_assessment(&mut self) {
        let mut guard = 0u32;
        while self.svc.state() == StateId::Assessment {
            guard += 1;
            assert!(guard < 10_000, "assessment never completed");
            let raw = match (guard / 4) % 4 {
                0 => [true, false, false],
                1 => [false, true, false],
                2 => [false, false, true],
                _ => IDLE,
            };
            self.run(raw, 4);
        }
    }
}

// ── Boot flow ─────────────────────────────────────────────────

#[test]
fn returning_device_boots_to_pet_screen() {
    let mut bench = Bench::new(false);
    bench.run(IDLE, 100);

    assert_eq!(bench.svc.state(), StateId::PetNormal);
    // 16-column padded face + menu line reached the panel.
    assert_eq!(bench.display.lines[0].len(), LCD_COLS);
    assert!(bench.display.lines[1].contains("Feed"));
}

#[test]
fn first_boot_routes_into_baseline_assessment() {
    let mut bench = Bench::new(true);
    bench.run(IDLE, 100);
    assert_eq!(bench.svc.state(), StateId::Assessment);
}

// ── Full assessment over the real button pipeline ─────────────

#[test]
fn completed_assessment_lands_on_ble_when_subscribed() {
    let mut bench = Bench::new(false);
    bench.run(IDLE, 100);
    bench.ble.sim_connected = true;
    bench.svc.handle_event(cognipet::events::Event::BleConnected);

    // Hidden combo: hold buttons 1+2 for two seconds.
    bench.run([true, true, false], 100);
    bench.run(IDLE, 4);
    assert_eq!(bench.svc.state(), StateId::Assessment);

    bench.mash_through_assessment();
    assert_eq!(bench.svc.state(), StateId::PetNormal);

    assert_eq!(bench.ble.sim_assessment_frames.len(), 1);
    let record = decode_assessment(&bench.ble.sim_assessment_frames[0]).expect("valid frame");
    assert!(record.total <= 12);
    assert_eq!(
        record.total,
        record.orientation + record.memory + record.attention + record.executive
    );
    assert!(bench
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::AssessmentCompleted(_))));
}

#[test]
fn injected_result_cycles_profiles() {
    let mut bench = Bench::new(false);
    bench.run(IDLE, 100);
    bench.ble.sim_connected = true;

    // Combo 1+3 injects without leaving pet mode.
    bench.run([true, false, true], 100);
    bench.run(IDLE, 4);
    assert_eq!(bench.svc.state(), StateId::PetNormal);

    bench.run([true, false, true], 100);
    bench.run(IDLE, 4);

    assert_eq!(bench.ble.sim_assessment_frames.len(), 2);
    let first = decode_assessment(&bench.ble.sim_assessment_frames[0]).expect("valid frame");
    let second = decode_assessment(&bench.ble.sim_assessment_frames[1]).expect("valid frame");
    assert_eq!(first.total, 12);
    assert_eq!(first.alert_level, 0);
    assert_eq!(second.total, 8);
}

// ── Pet interactions ──────────────────────────────────────────

#[test]
fn menu_navigation_and_feed_produce_interaction_record() {
    let mut bench = Bench::new(false);
    bench.run(IDLE, 100);
    bench.ble.sim_connected = true;

    // Cursor starts on "Feed"; button 2 selects it.
    bench.press(1);

    assert_eq!(bench.svc.ring().len(), 1);
    assert_eq!(bench.ble.sim_interaction_frames.len(), 1);
    let event = decode_interaction(&bench.ble.sim_interaction_frames[0]).expect("valid frame");
    assert_eq!(event.kind, InteractionKind::Feed);
    assert!(event.success);
    assert_eq!(event.mood, None);
}

#[test]
fn interactions_survive_without_a_central() {
    let mut bench = Bench::new(false);
    bench.run(IDLE, 100);

    bench.press(1); // Feed
    bench.press(2); // cursor → Play
    bench.press(1); // select Play

    assert_eq!(bench.svc.ring().len(), 2);
    assert!(bench.ble.sim_interaction_frames.is_empty());
    let kinds: Vec<InteractionKind> = bench.svc.ring().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![InteractionKind::Feed, InteractionKind::Play]);
}

// ── Diagnostics console ───────────────────────────────────────

#[test]
fn diagnostics_combo_pages_and_exit_hold() {
    let mut bench = Bench::new(false);
    bench.run(IDLE, 100);

    bench.run([false, true, true], 100);
    assert_eq!(bench.svc.state(), StateId::Diagnostics);

    // Pages cycle with buttons 1 / 2 once the combo is released.
    bench.run(IDLE, 4);
    bench.press(1);
    bench.press(1);
    assert_eq!(bench.svc.state(), StateId::Diagnostics);

    // Holding button 3 alone for 1.5 s leaves the console.
    bench.run([false, false, true], 80);
    assert_eq!(bench.svc.state(), StateId::PetNormal);
}

// ── Persistence through the NVS adapter ───────────────────────

#[test]
fn first_boot_flag_clears_after_baseline_assessment() {
    let mut nvs = NvsAdapter::new().expect("sim NVS");
    assert!(nvs.is_first_boot());

    let mut bench = Bench::new(nvs.is_first_boot());
    bench.run(IDLE, 100);
    bench.mash_through_assessment();

    assert!(bench.svc.persist_assessed_flag_if_needed(&mut nvs));
    assert!(!nvs.is_first_boot());

    // A rebooted service constructed from the stored flag skips the
    // baseline and goes straight to the pet.
    let mut bench = Bench::new(nvs.is_first_boot());
    bench.run(IDLE, 100);
    assert_eq!(bench.svc.state(), StateId::PetNormal);
}

#[test]
fn config_roundtrips_through_nvs() {
    let nvs = NvsAdapter::new().expect("sim NVS");

    let mut config = SystemConfig::default();
    config.combo_hold_ms = 3000;
    config.utc_offset_minutes = -300;
    config.wifi_ssid.push_str("HomeNet").ok();

    nvs.save(&config).expect("save");
    let loaded = nvs.load().expect("load");
    assert_eq!(loaded.combo_hold_ms, 3000);
    assert_eq!(loaded.utc_offset_minutes, -300);
    assert_eq!(loaded.wifi_ssid.as_str(), "HomeNet");
}

// ── Time sync wired into the service view ─────────────────────

#[test]
fn sync_state_reaches_diagnostics_view() {
    let mut config = SystemConfig::default();
    config.wifi_ssid.push_str("HomeNet").ok();

    let network = WifiAdapter::new(&config);
    let sntp = SntpAdapter::new();
    let mut timesync = TimeSync::new(network, sntp);
    timesync.ensure_sync(10_000, &config);
    assert!(timesync.is_synced());

    let mut bench = Bench::new(false);
    bench.svc.update_sync_view(timesync.state());
    assert!(bench.svc.context().sync_view.synced);
    assert_eq!(bench.svc.context().sync_view.last_ip, Some([192, 168, 4, 20]));
}
