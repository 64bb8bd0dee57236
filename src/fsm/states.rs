//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers — no closures, no
//! dynamic dispatch, no heap.  This is the classic embedded C FSM pattern
//! expressed in safe Rust.
//!
//! ```text
//!  FIRST_BOOT ──[banner dwell, flag set]──▶ ASSESSMENT
//!       │                                       │
//!       │ [flag clear]                 [run complete / combo]
//!       ▼                                       ▼
//!  PET_NORMAL ◀─────────────────────────────────┘
//!       │ ▲
//!  [2+3 combo]  [1.5s button-3 hold]
//!       ▼ │
//!  DIAGNOSTICS
//! ```
//!
//! The 1+2 / 1+3 combos are serviced outside the table (see the app
//! service): they call `force_transition` so they fire from any state.

use core::fmt::Write;

use super::context::{DeviceContext, GameState, MenuScreen, Outbound, MENU_ITEMS};
use super::{StateDescriptor, StateId};
use crate::diagnostics::DiagData;
use crate::telemetry::{InteractionEvent, InteractionKind};
use log::info;

/// How long the boot banner stays up before routing onwards.
const BANNER_DWELL_MS: u32 = 2000;

/// Symbols the pet mini-game asks the user to match (one per button).
const GAME_SYMBOLS: [char; 3] = ['A', 'B', 'C'];

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — FirstBoot
        StateDescriptor {
            id: StateId::FirstBoot,
            name: "FirstBoot",
            on_enter: Some(first_boot_enter),
            on_exit: None,
            on_update: first_boot_update,
        },
        // Index 1 — Assessment
        StateDescriptor {
            id: StateId::Assessment,
            name: "Assessment",
            on_enter: Some(assessment_enter),
            on_exit: Some(assessment_exit),
            on_update: assessment_update,
        },
        // Index 2 — PetNormal
        StateDescriptor {
            id: StateId::PetNormal,
            name: "PetNormal",
            on_enter: Some(pet_enter),
            on_exit: None,
            on_update: pet_update,
        },
        // Index 3 — Diagnostics
        StateDescriptor {
            id: StateId::Diagnostics,
            name: "Diagnostics",
            on_enter: Some(diag_enter),
            on_exit: None,
            on_update: diag_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  FIRST_BOOT state — welcome banner, then route by the stored flag
// ═══════════════════════════════════════════════════════════════════════════

fn first_boot_enter(ctx: &mut DeviceContext) {
    ctx.ui.set_lines("CogniPet", "Hello!");
    ctx.ui.set_backlight(120, 120, 200);
    info!("FIRST_BOOT: banner up, first_boot={}", ctx.first_boot);
}

fn first_boot_update(ctx: &mut DeviceContext) -> Option<StateId> {
    if ctx.ms_in_state() < BANNER_DWELL_MS {
        return None;
    }
    if ctx.first_boot {
        // Unassessed device: run the baseline before anything else.
        Some(StateId::Assessment)
    } else {
        Some(StateId::PetNormal)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  ASSESSMENT state — the resumable engine does the actual work
// ═══════════════════════════════════════════════════════════════════════════

fn assessment_enter(ctx: &mut DeviceContext) {
    let seed = ctx.rng.next_u32() ^ ctx.clock.uptime_ms;
    info!("ASSESSMENT: starting run");
    ctx.engine
        .start(ctx.clock.uptime_ms, ctx.clock.wall, seed, &ctx.config, &mut ctx.ui);
}

fn assessment_exit(ctx: &mut DeviceContext) {
    // No-op after a completed run; abandons the run when diagnostics
    // (or an injected result) pulls us out mid-assessment.
    ctx.engine.reset();
}

fn assessment_update(ctx: &mut DeviceContext) -> Option<StateId> {
    let input = ctx.input;
    if let Some(summary) = ctx.engine.tick(ctx.clock.uptime_ms, &input, &mut ctx.ui) {
        let result = crate::assessment::AssessmentResult::from_scores(
            ctx.clock.timestamp,
            summary.orientation,
            summary.memory,
            summary.attention,
            summary.executive,
            summary.avg_response_ms,
        );
        info!(
            "ASSESSMENT: complete, total={}/12 alert={}",
            result.total, result.alert_level
        );
        ctx.last_result = Some(result);
        ctx.first_boot = false;
        ctx.queue_outbound(Outbound::Assessment(result));
        return Some(StateId::PetNormal);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PET_NORMAL state — face, menu, and the interaction screens
// ═══════════════════════════════════════════════════════════════════════════

fn pet_enter(ctx: &mut DeviceContext) {
    ctx.menu.reset(ctx.clock.uptime_ms);
}

fn pet_update(ctx: &mut DeviceContext) -> Option<StateId> {
    let now = ctx.clock.uptime_ms;

    if ctx.input.any_press() {
        ctx.menu.last_activity_ms = now;
    }

    // Sub-screens fall back to the main face after a quiet spell. A
    // running game is exempt: it carries its own response ceiling and
    // must end as a logged timeout, not a silent cancel.
    let idle = now.wrapping_sub(ctx.menu.last_activity_ms) >= ctx.config.menu_idle_timeout_ms;
    if idle && !matches!(ctx.menu.screen, MenuScreen::Main | MenuScreen::Game(_)) {
        ctx.menu.screen = MenuScreen::Main;
    }

    match ctx.menu.screen {
        MenuScreen::Main => pet_main(ctx, now),
        MenuScreen::Stats => pet_stats(ctx),
        MenuScreen::MoodCheck => pet_mood_check(ctx, now),
        MenuScreen::Game(game) => pet_game(ctx, game, now),
    }

    None
}

fn pet_main(ctx: &mut DeviceContext, now: u32) {
    let items = MENU_ITEMS.len() as u8;
    if ctx.input.pressed_edge[0] {
        ctx.menu.cursor = (ctx.menu.cursor + items - 1) % items;
    }
    if ctx.input.pressed_edge[2] {
        ctx.menu.cursor = (ctx.menu.cursor + 1) % items;
    }
    if ctx.input.pressed_edge[1] {
        pet_select(ctx, now);
        if ctx.menu.screen != MenuScreen::Main {
            // The sub-screen prompt replaces the menu on the same tick
            // as the selection; its input handler runs from next tick.
            render_sub_screen(ctx);
            return;
        }
    }

    let mood = ctx.pet.mood(&ctx.config);
    let (r, g, b) = mood.backlight();
    let mut line1: heapless::String<16> = heapless::String::new();
    let _ = write!(line1, "<{}>", MENU_ITEMS[ctx.menu.cursor as usize]);
    ctx.ui.set_lines(mood.face(), &line1);
    ctx.ui.set_backlight(r, g, b);
}

fn render_sub_screen(ctx: &mut DeviceContext) {
    match ctx.menu.screen {
        MenuScreen::Main => {}
        MenuScreen::Stats => render_stats(ctx),
        MenuScreen::MoodCheck => render_mood_prompt(ctx),
        MenuScreen::Game(game) => render_game_prompt(ctx, game),
    }
}

fn pet_select(ctx: &mut DeviceContext, now: u32) {
    let ts = ctx.clock.timestamp;
    match MENU_ITEMS[ctx.menu.cursor as usize] {
        "Feed" => {
            ctx.pet.feed(ts);
            log_interaction(ctx, InteractionKind::Feed, 0, true, None);
        }
        "Play" => {
            ctx.pet.play(ts);
            log_interaction(ctx, InteractionKind::Play, 0, true, None);
        }
        "Clean" => {
            ctx.pet.clean(ts);
            log_interaction(ctx, InteractionKind::Clean, 0, true, None);
        }
        "Mood" => {
            ctx.menu.screen = MenuScreen::MoodCheck;
            ctx.menu.screen_shown_at = now;
        }
        "Stats" => {
            ctx.menu.screen = MenuScreen::Stats;
            ctx.menu.screen_shown_at = now;
        }
        "Game" => {
            let symbol = ctx.rng.below(GAME_SYMBOLS.len() as u32) as usize;
            ctx.menu.screen = MenuScreen::Game(GameState {
                symbol,
                started_at: now,
            });
        }
        other => {
            debug_assert!(false, "unknown menu item: {other}");
        }
    }
}

fn pet_stats(ctx: &mut DeviceContext) {
    if ctx.input.any_press() {
        ctx.menu.screen = MenuScreen::Main;
        return;
    }
    render_stats(ctx);
}

fn render_stats(ctx: &mut DeviceContext) {
    let mut line0: heapless::String<16> = heapless::String::new();
    let _ = write!(line0, "Hap:{} Hun:{}", ctx.pet.happiness, ctx.pet.hunger);
    let mut line1: heapless::String<16> = heapless::String::new();
    let _ = write!(line1, "Cln:{}", ctx.pet.cleanliness);
    ctx.ui.set_lines(&line0, &line1);
}

fn pet_mood_check(ctx: &mut DeviceContext, now: u32) {
    if let Some(button) = ctx.input.first_press() {
        let mood = button as u8; // 0=happy 1=neutral 2=sad, matching labels
        ctx.pet.mood_select(mood);
        let response = elapsed_ms(now, ctx.menu.screen_shown_at);
        log_interaction(ctx, InteractionKind::MoodSelect, response, true, Some(mood));
        ctx.menu.screen = MenuScreen::Main;
        return;
    }
    render_mood_prompt(ctx);
}

fn render_mood_prompt(ctx: &mut DeviceContext) {
    ctx.ui.set_lines("How do you feel", "1=:) 2=:| 3=:(");
}

fn pet_game(ctx: &mut DeviceContext, game: GameState, now: u32) {
    if let Some(button) = ctx.input.first_press() {
        let success = button == game.symbol;
        let response = elapsed_ms(now, game.started_at);
        if success {
            // Winning counts as playtime for the pet.
            ctx.pet.play(ctx.clock.timestamp);
        }
        log_interaction(ctx, InteractionKind::Game, response, success, None);
        ctx.menu.screen = MenuScreen::Main;
        return;
    }

    if now.wrapping_sub(game.started_at) >= ctx.config.game_timeout_ms {
        let response = ctx.config.game_timeout_ms.min(u16::MAX as u32) as u16;
        log_interaction(ctx, InteractionKind::Game, response, false, None);
        ctx.menu.screen = MenuScreen::Main;
        return;
    }

    render_game_prompt(ctx, game);
}

fn render_game_prompt(ctx: &mut DeviceContext, game: GameState) {
    let mut line0: heapless::String<16> = heapless::String::new();
    let _ = write!(line0, "Match: {}", GAME_SYMBOLS[game.symbol]);
    ctx.ui.set_lines(&line0, "1=A 2=B 3=C");
}

fn log_interaction(
    ctx: &mut DeviceContext,
    kind: InteractionKind,
    response_ms: u16,
    success: bool,
    mood: Option<u8>,
) {
    info!("PET: interaction {kind:?} success={success} response={response_ms}ms");
    ctx.queue_outbound(Outbound::Interaction(InteractionEvent {
        timestamp: ctx.clock.timestamp,
        kind,
        response_ms,
        success,
        mood,
    }));
}

fn elapsed_ms(now: u32, since: u32) -> u16 {
    now.wrapping_sub(since).min(u16::MAX as u32) as u16
}

// ═══════════════════════════════════════════════════════════════════════════
//  DIAGNOSTICS state — hidden four-page console
// ═══════════════════════════════════════════════════════════════════════════

fn diag_enter(ctx: &mut DeviceContext) {
    ctx.diag.reset();
    ctx.diag_exit.reset();
    info!("DIAG: console entered");
}

fn diag_update(ctx: &mut DeviceContext) -> Option<StateId> {
    if ctx.input.pressed_edge[0] {
        ctx.diag.prev_page();
    }
    if ctx.input.pressed_edge[1] {
        ctx.diag.next_page();
    }

    if ctx.diag_exit.evaluate(&ctx.input) {
        info!("DIAG: exit gesture, console closed");
        return Some(StateId::PetNormal);
    }

    ctx.diag.maybe_render(
        ctx.clock.uptime_ms,
        ctx.config.diag_refresh_ms,
        &mut ctx.ui,
        &DiagData {
            sync: &ctx.sync_view,
            ble_connected: ctx.ble_connected,
            ring_len: ctx.ring_len,
            last_result: ctx.last_result.as_ref(),
            input: &ctx.input,
            pet: &ctx.pet,
        },
    );

    None
}
