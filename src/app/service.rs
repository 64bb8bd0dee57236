//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the FSM, the button pipeline, and the shared
//! context.  It exposes a clean, hardware-agnostic API.  All I/O flows
//! through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!  raw GPIO levels ──▶ ┌────────────────────────┐ ──▶ DisplayPort
//!                      │       AppService        │ ──▶ TelemetryPort
//!  ClockSnapshot  ──▶  │  debounce · combos · FSM │ ──▶ EventSink
//!                      └────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::drivers::button::ButtonBank;
use crate::drivers::combo::{Combo, ComboDetector};
use crate::events::Event;
use crate::fsm::context::{ClockSnapshot, DeviceContext, Outbound};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::telemetry::records::{encode_assessment, encode_interaction};
use crate::telemetry::InteractionRing;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{DisplayPort, EventSink, StoragePort, TelemetryPort};

/// NVS namespace shared by the config blob and the domain flags.
pub const STORAGE_NAMESPACE: &str = "cognipet";

/// Key set once the initial (first-boot) assessment completes.
pub const ASSESSED_FLAG_KEY: &str = "assessed";

/// Synthetic score profiles cycled by the inject combo, highest to
/// lowest functioning. Latencies picked to look plausible per tier.
const INJECT_PROFILES: [(u8, u8, u8, u8, u16); 4] = [
    (3, 3, 3, 3, 420),
    (2, 2, 2, 2, 800),
    (1, 1, 1, 1, 1500),
    (0, 1, 1, 1, 2100),
];

/// What the caller's outer loop needs to know after a tick.
#[derive(Debug, Clone, Copy)]
pub struct TickOutcome {
    /// An assessment is about to start; kick off opportunistic time
    /// sync now so the orientation questions can use wall-clock time.
    pub sync_requested: bool,
    /// FSM state after the tick.
    pub state: StateId,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: DeviceContext,
    buttons: ButtonBank,
    combos: ComboDetector,
    /// Last 20 interactions, oldest evicted first.
    ring: InteractionRing,
    /// Next inject-combo profile index.
    inject_profile: usize,
    /// Assessment entry deferred by one tick so the outer loop can
    /// start time sync before the engine captures the wall clock.
    pending_assessment: bool,
    /// Cleared once the first-boot flag flip has been written back.
    assessed_persist_pending: bool,
    was_first_boot: bool,
    tick_count: u64,
}

impl AppService {
    /// Construct the service from configuration and the stored
    /// first-boot flag.
    ///
    /// Does **not** start the FSM — call [`AppService::start`] next.
    pub fn new(config: SystemConfig, first_boot: bool) -> Self {
        let buttons = ButtonBank::new(&config);
        let combos = ComboDetector::new(&config);
        let ctx = DeviceContext::new(config, first_boot);
        let fsm = Fsm::new(build_state_table(), StateId::FirstBoot);

        Self {
            fsm,
            ctx,
            buttons,
            combos,
            ring: InteractionRing::new(),
            inject_profile: 0,
            pending_assessment: false,
            assessed_persist_pending: false,
            was_first_boot: first_boot,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Run the boot banner's `on_enter` and announce startup.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle:
    /// debounce → pet upkeep → combos → FSM → display → telemetry.
    pub fn tick(
        &mut self,
        raw: [bool; 3],
        clock: ClockSnapshot,
        display: &mut impl DisplayPort,
        telemetry: &mut impl TelemetryPort,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.tick_count += 1;
        let prev_state = self.fsm.current_state();
        let mut sync_requested = false;

        // 1. Clock and debounced input snapshot
        self.ctx.clock = clock;
        self.ctx.input = self.buttons.sample(clock.uptime_ms, raw);

        // 2. Pet gauge upkeep (interval-gated internally)
        if self.ctx.pet.maintain(clock.uptime_ms / 1000, &self.ctx.config) {
            debug!(
                "pet upkeep: hap={} hun={} cln={}",
                self.ctx.pet.happiness, self.ctx.pet.hunger, self.ctx.pet.cleanliness
            );
        }

        // 3. Assessment entry requested on a previous tick
        if self.pending_assessment {
            self.pending_assessment = false;
            if self.fsm.current_state() != StateId::Assessment {
                self.fsm.force_transition(StateId::Assessment, &mut self.ctx);
            }
        }

        // 4. Hidden combos fire from any state
        if let Some(combo) = self.combos.evaluate(&self.ctx.input) {
            let cmd = match combo {
                Combo::StartAssessment => AppCommand::StartAssessment,
                Combo::InjectTestResult => AppCommand::InjectTestResult,
                Combo::EnterDiagnostics => AppCommand::EnterDiagnostics,
            };
            sync_requested |= self.handle_command(cmd);
        }

        // 5. FSM tick (pure state logic)
        self.fsm.tick(&mut self.ctx);

        // 6. First-boot flag flips exactly once, on the first
        //    completed assessment; remember to write it back.
        if self.was_first_boot && !self.ctx.first_boot {
            self.was_first_boot = false;
            self.assessed_persist_pending = true;
        }

        // 7. Push UI changes out through the display port
        self.flush_display(display);

        // 8. Drain finished records into the ring + BLE channel
        self.drain_outbox(telemetry, sink);

        // 9. Emit state change if the FSM moved
        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }

        TickOutcome {
            sync_requested,
            state: new_state,
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a command (combo detector today; a console or BLE
    /// control channel would feed the same entry point). Returns
    /// whether the caller should kick off time sync. State change
    /// events are emitted by the surrounding [`AppService::tick`].
    pub fn handle_command(&mut self, cmd: AppCommand) -> bool {
        match cmd {
            AppCommand::StartAssessment => {
                if self.fsm.current_state() == StateId::Assessment {
                    return false;
                }
                info!("combo: assessment requested");
                self.pending_assessment = true;
                true
            }
            AppCommand::InjectTestResult => {
                let (o, m, a, e, avg) = INJECT_PROFILES[self.inject_profile];
                self.inject_profile = (self.inject_profile + 1) % INJECT_PROFILES.len();
                let result = crate::assessment::AssessmentResult::from_scores(
                    self.ctx.clock.timestamp,
                    o,
                    m,
                    a,
                    e,
                    avg,
                );
                info!(
                    "combo: injecting synthetic result total={}/12 alert={}",
                    result.total, result.alert_level
                );
                self.ctx.last_result = Some(result);
                self.ctx.queue_outbound(Outbound::Assessment(result));
                false
            }
            AppCommand::EnterDiagnostics => {
                if self.fsm.current_state() != StateId::Diagnostics {
                    info!("combo: entering diagnostics console");
                    self.fsm
                        .force_transition(StateId::Diagnostics, &mut self.ctx);
                }
                false
            }
        }
    }

    // ── External inputs ───────────────────────────────────────

    /// Fold a queued hardware/stack event into the context.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::BleConnected => {
                info!("BLE central connected");
                self.ctx.ble_connected = true;
            }
            Event::BleDisconnected => {
                info!("BLE central disconnected");
                self.ctx.ble_connected = false;
            }
            Event::BleSubscribed => {
                info!("BLE telemetry subscriber active");
            }
        }
    }

    /// Mirror the time-sync adapter's state for the diagnostics pages.
    pub fn update_sync_view(&mut self, view: crate::clock::TimeSyncState) {
        self.ctx.sync_view = view;
    }

    /// Write the assessed flag back to storage if the first completed
    /// assessment flipped it this session. Returns whether a write
    /// happened; failures retry on the next call.
    pub fn persist_assessed_flag_if_needed(&mut self, storage: &mut impl StoragePort) -> bool {
        if !self.assessed_persist_pending {
            return false;
        }
        match storage.write(STORAGE_NAMESPACE, ASSESSED_FLAG_KEY, &[1]) {
            Ok(()) => {
                info!("first-boot assessment recorded in NVS");
                self.assessed_persist_pending = false;
                true
            }
            Err(e) => {
                warn!("assessed flag write failed: {}", e);
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The in-RAM interaction history.
    pub fn ring(&self) -> &InteractionRing {
        &self.ring
    }

    /// Read-only view of the shared context (diagnostics, tests).
    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    // ── Internal ──────────────────────────────────────────────

    /// One write per line plus the backlight, only when something
    /// changed. Bus faults are logged and the frame dropped; the next
    /// change retries naturally.
    fn flush_display(&mut self, display: &mut impl DisplayPort) {
        if !self.ctx.ui.take_dirty() {
            return;
        }
        if let Err(e) = display.write_line(0, self.ctx.ui.line0()) {
            warn!("display line 0 write failed: {}", e);
        }
        if let Err(e) = display.write_line(1, self.ctx.ui.line1()) {
            warn!("display line 1 write failed: {}", e);
        }
        let (r, g, b) = self.ctx.ui.backlight();
        if let Err(e) = display.set_backlight(r, g, b) {
            warn!("backlight write failed: {}", e);
        }
    }

    /// Move finished records from the context outbox into the ring
    /// buffer and mirror them over BLE, best-effort.
    fn drain_outbox(&mut self, telemetry: &mut impl TelemetryPort, sink: &mut impl EventSink) {
        let records = core::mem::take(&mut self.ctx.outbox);
        for record in &records {
            match record {
                Outbound::Assessment(result) => {
                    let frame = encode_assessment(result);
                    let notified = telemetry.is_connected() && telemetry.notify_assessment(&frame);
                    if !notified {
                        debug!("assessment record not mirrored (no subscriber)");
                    }
                    sink.emit(&AppEvent::AssessmentCompleted(*result));
                }
                Outbound::Interaction(event) => {
                    self.ring.push(*event);
                    let frame = encode_interaction(event);
                    let notified = telemetry.is_connected() && telemetry.notify_interaction(&frame);
                    sink.emit(&AppEvent::InteractionLogged {
                        kind: event.kind,
                        notified,
                    });
                }
            }
        }
        self.ctx.ring_len = self.ring.len();
    }
}
