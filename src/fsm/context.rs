//! Shared mutable context threaded through every FSM handler.
//!
//! `DeviceContext` is the single struct that state handlers read from
//! and write to: the latest input snapshot, display command outputs,
//! clock view, pet gauges, assessment engine, menu state, and the
//! outbound record queue. Think of it as the "blackboard" in a
//! blackboard architecture — there are no ambient globals.

use heapless::Vec;

use crate::assessment::{AssessmentEngine, AssessmentResult};
use crate::assessment::rng::XorShift32;
use crate::clock::{TimeSyncState, WallClock};
use crate::config::SystemConfig;
use crate::diagnostics::DiagView;
use crate::drivers::button::InputSnapshot;
use crate::drivers::combo::ExitGesture;
use crate::pet::PetState;
use crate::telemetry::InteractionEvent;

// ---------------------------------------------------------------------------
// Display commands (written by state handlers; flushed by the service)
// ---------------------------------------------------------------------------

/// Pending display output. State handlers write text and backlight
/// colour here; the service flushes it through the `DisplayPort` once
/// per tick, and only when something changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiCommands {
    line0: heapless::String<16>,
    line1: heapless::String<16>,
    backlight: (u8, u8, u8),
    dirty: bool,
}

impl UiCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lines(&mut self, line0: &str, line1: &str) {
        let l0 = truncate16(line0);
        let l1 = truncate16(line1);
        if self.line0 != l0 || self.line1 != l1 {
            self.line0 = l0;
            self.line1 = l1;
            self.dirty = true;
        }
    }

    pub fn set_backlight(&mut self, r: u8, g: u8, b: u8) {
        if self.backlight != (r, g, b) {
            self.backlight = (r, g, b);
            self.dirty = true;
        }
    }

    pub fn line0(&self) -> &str {
        &self.line0
    }

    pub fn line1(&self) -> &str {
        &self.line1
    }

    pub fn backlight(&self) -> (u8, u8, u8) {
        self.backlight
    }

    /// Consume the dirty flag; the service flushes when this is true.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::take(&mut self.dirty)
    }
}

fn truncate16(text: &str) -> heapless::String<16> {
    let mut out = heapless::String::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Clock view (written by the main loop before each tick)
// ---------------------------------------------------------------------------

/// Point-in-time clock facts, refreshed by the main loop each tick so
/// handlers never call into the time-sync service directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockSnapshot {
    pub uptime_ms: u32,
    /// Calendar time when synchronized, `None` otherwise.
    pub wall: Option<WallClock>,
    /// Unix seconds when synced, uptime-seconds surrogate otherwise.
    pub timestamp: u32,
}

// ---------------------------------------------------------------------------
// Pet-mode menu state
// ---------------------------------------------------------------------------

/// Symbol-match minigame in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    /// Index into the 3-symbol alphabet; the matching button wins.
    pub symbol: usize,
    pub started_at: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuScreen {
    Main,
    Stats,
    MoodCheck,
    Game(GameState),
}

/// Items on the main menu, cycled with buttons 1/3.
pub const MENU_ITEMS: [&str; 6] = ["Feed", "Play", "Clean", "Mood", "Stats", "Game"];

#[derive(Debug, Clone, Copy)]
pub struct MenuState {
    pub screen: MenuScreen,
    pub cursor: u8,
    /// Uptime of the last button activity; sub-screens auto-return to
    /// Main once the idle timeout elapses.
    pub last_activity_ms: u32,
    /// When a sub-screen was entered (mood/game response timing).
    pub screen_shown_at: u32,
}

impl MenuState {
    pub fn reset(&mut self, now: u32) {
        self.screen = MenuScreen::Main;
        self.cursor = 0;
        self.last_activity_ms = now;
        self.screen_shown_at = now;
    }
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            screen: MenuScreen::Main,
            cursor: 0,
            last_activity_ms: 0,
            screen_shown_at: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound records
// ---------------------------------------------------------------------------

/// Finished records queued by state handlers; the service drains them
/// into the interaction ring and the BLE channel after each tick.
#[derive(Debug, Clone, Copy)]
pub enum Outbound {
    Assessment(AssessmentResult),
    Interaction(InteractionEvent),
}

// ---------------------------------------------------------------------------
// DeviceContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct DeviceContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,
    /// Duration of one tick in milliseconds.
    pub tick_period_ms: u32,

    // -- Per-tick inputs (written by the service before each tick) --
    pub clock: ClockSnapshot,
    pub input: InputSnapshot,
    /// Mirror of the time-sync service state, for diagnostics.
    pub sync_view: TimeSyncState,
    /// BLE connection flag owned by the main loop (set from queue
    /// events, never from the GATTS callback directly).
    pub ble_connected: bool,
    /// Current interaction-ring depth, for diagnostics.
    pub ring_len: usize,

    // -- Outputs --
    pub ui: UiCommands,
    pub outbox: Vec<Outbound, 4>,

    // -- Domain state --
    pub config: SystemConfig,
    pub pet: PetState,
    pub engine: AssessmentEngine,
    /// Latest completed assessment; exactly one retained.
    pub last_result: Option<AssessmentResult>,
    pub menu: MenuState,
    pub diag: DiagView,
    pub diag_exit: ExitGesture,
    /// First power-up: FirstBoot routes into Assessment, and the
    /// flag is persisted once that run completes.
    pub first_boot: bool,
    /// Seeds assessment runs and the minigame symbol picks.
    pub rng: XorShift32,
}

impl DeviceContext {
    pub fn new(config: SystemConfig, first_boot: bool) -> Self {
        let diag_exit = ExitGesture::new(&config);
        let tick_period_ms = config.control_loop_interval_ms;
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            tick_period_ms,
            clock: ClockSnapshot::default(),
            input: InputSnapshot::default(),
            sync_view: TimeSyncState::default(),
            ble_connected: false,
            ring_len: 0,
            ui: UiCommands::new(),
            outbox: Vec::new(),
            config,
            pet: PetState::new(),
            engine: AssessmentEngine::new(),
            last_result: None,
            menu: MenuState::default(),
            diag: DiagView::new(),
            diag_exit,
            first_boot,
            rng: XorShift32::new(0x5EED_CAFE),
        }
    }

    /// Milliseconds spent in the current state.
    pub fn ms_in_state(&self) -> u32 {
        (self.ticks_in_state as u32).saturating_mul(self.tick_period_ms)
    }

    pub fn queue_outbound(&mut self, record: Outbound) {
        // Overflow would need >4 records in one 25 ms tick, which no
        // handler produces; drop with a warning if it ever happens.
        if self.outbox.push(record).is_err() {
            log::warn!("outbox full, record dropped");
        }
    }
}
