//! Cognitive assessment engine.
//!
//! Four sub-tests run strictly in sequence, Orientation → Memory →
//! Attention → Executive, each producing a 0..=3 sub-score. The engine
//! is a resumable state machine driven by `tick()` from the control
//! loop; it never blocks, so the global combo detectors stay live
//! between inputs. Orientation and memory waits are unbounded,
//! attention trials and nothing else carry a response deadline.

pub mod rng;
pub mod scoring;

pub use scoring::{AssessmentResult, alert_level};

use core::fmt::Write;

use log::{debug, info};

use crate::clock::WallClock;
use crate::config::SystemConfig;
use crate::drivers::button::InputSnapshot;
use crate::fsm::context::UiCommands;
use rng::XorShift32;
use scoring::{attention_scale, executive_scale, rotate3, rotated_index};

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const TIME_LABELS: [&str; 3] = ["Morn", "Aft", "Eve"];
const LOCATION_LABELS: [&str; 3] = ["Home", "Park", "Out"];
const MEMORY_SYMBOLS: [char; 3] = ['A', 'B', 'C'];

/// Canonical executive-function press ordering (button indices),
/// shown to the user one-based as "2 1 3 2".
const CANONICAL_ORDER: [usize; 4] = [1, 0, 2, 1];

const ORIENTATION_QUESTIONS: u8 = 3;
const MEMORY_SEQUENCE_LEN: u8 = 3;
const ATTENTION_TRIALS: u8 = 5;

/// Sub-scores plus aggregate latency, handed to the dispatcher on
/// completion. The dispatcher attaches the timestamp and builds the
/// wire-level [`AssessmentResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentSummary {
    pub orientation: u8,
    pub memory: u8,
    pub attention: u8,
    pub executive: u8,
    pub avg_response_ms: u16,
}

/// Engine timing knobs, copied out of `SystemConfig` at start so the
/// run is immune to mid-assessment config changes.
#[derive(Debug, Clone, Copy)]
struct Timing {
    notice_dwell_ms: u32,
    memory_symbol_ms: u32,
    attention_min_delay_ms: u32,
    attention_max_delay_ms: u32,
    attention_window_ms: u32,
}

#[derive(Debug, Clone, Copy)]
struct OrientationQ {
    index: u8,
    /// Button index that answers the current question correctly.
    correct_button: usize,
    prompt_at: u32,
    /// Set while showing the "sync unavailable" notice; the question
    /// auto-advances (scoring 0) once the dwell elapses.
    notice_at: Option<u32>,
    correct_so_far: u8,
}

#[derive(Debug, Clone, Copy)]
struct MemoryShow {
    seq: [usize; 3],
    shown: u8,
    shown_at: u32,
}

#[derive(Debug, Clone, Copy)]
struct MemoryRecall {
    seq: [usize; 3],
    answered: u8,
    correct: u8,
    prompt_at: u32,
}

#[derive(Debug, Clone, Copy)]
struct AttentionTrial {
    trial: u8,
    armed_at: u32,
    /// Random arming delay before the cue appears.
    cue_delay_ms: u32,
    cue_at: Option<u32>,
    hits: u8,
}

#[derive(Debug, Clone, Copy)]
struct ExecutiveRun {
    presses: u8,
    matches: u8,
    prompt_at: u32,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Orientation(OrientationQ),
    MemoryShow(MemoryShow),
    MemoryRecall(MemoryRecall),
    Attention(AttentionTrial),
    Executive(ExecutiveRun),
}

pub struct AssessmentEngine {
    phase: Phase,
    rng: XorShift32,
    wall: Option<WallClock>,
    /// Cyclic option rotation for all orientation questions this run.
    shift: u8,
    timing: Timing,
    orientation_score: u8,
    memory_score: u8,
    attention_score: u8,
    latency_sum_ms: u32,
    latency_count: u32,
}

impl AssessmentEngine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            rng: XorShift32::new(1),
            wall: None,
            shift: 0,
            timing: Timing {
                notice_dwell_ms: 1500,
                memory_symbol_ms: 900,
                attention_min_delay_ms: 1500,
                attention_max_delay_ms: 3500,
                attention_window_ms: 2000,
            },
            orientation_score: 0,
            memory_score: 0,
            attention_score: 0,
            latency_sum_ms: 0,
            latency_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Abandon a run in progress (diagnostics entry mid-assessment).
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Begin a fresh run. `wall` is captured once here; a sync that
    /// completes mid-run does not retroactively change questions.
    pub fn start(
        &mut self,
        now: u32,
        wall: Option<WallClock>,
        seed: u32,
        config: &SystemConfig,
        ui: &mut UiCommands,
    ) {
        self.rng = XorShift32::new(seed);
        self.wall = wall;
        self.shift = match wall {
            Some(w) => (w.weekday as u32 + w.hour as u32) as u8 % 3,
            None => self.rng.below(3) as u8,
        };
        self.timing = Timing {
            notice_dwell_ms: config.notice_dwell_ms,
            memory_symbol_ms: config.memory_symbol_ms,
            attention_min_delay_ms: config.attention_min_delay_ms,
            attention_max_delay_ms: config.attention_max_delay_ms,
            attention_window_ms: config.attention_window_ms,
        };
        self.orientation_score = 0;
        self.memory_score = 0;
        self.attention_score = 0;
        self.latency_sum_ms = 0;
        self.latency_count = 0;
        info!("assessment: starting (synced={})", wall.is_some());
        self.phase = self.begin_orientation(0, 0, now, ui);
    }

    /// Advance the run by one control-loop iteration. Returns the
    /// summary exactly once, on the tick that completes the final
    /// sub-test; the engine is idle afterwards.
    pub fn tick(
        &mut self,
        now: u32,
        input: &InputSnapshot,
        ui: &mut UiCommands,
    ) -> Option<AssessmentSummary> {
        match self.phase {
            Phase::Idle => None,
            Phase::Orientation(q) => {
                self.tick_orientation(q, now, input, ui);
                None
            }
            Phase::MemoryShow(show) => {
                self.tick_memory_show(show, now, ui);
                None
            }
            Phase::MemoryRecall(recall) => {
                self.tick_memory_recall(recall, now, input, ui);
                None
            }
            Phase::Attention(trial) => {
                self.tick_attention(trial, now, input, ui);
                None
            }
            Phase::Executive(run) => self.tick_executive(run, now, input, ui),
        }
    }

    // ── Orientation ───────────────────────────────────────────

    fn begin_orientation(
        &mut self,
        index: u8,
        correct_so_far: u8,
        now: u32,
        ui: &mut UiCommands,
    ) -> Phase {
        if index >= ORIENTATION_QUESTIONS {
            self.orientation_score = correct_so_far;
            debug!("assessment: orientation {correct_so_far}/3");
            return self.begin_memory(now, ui);
        }

        let mut q = OrientationQ {
            index,
            correct_button: 0,
            prompt_at: now,
            notice_at: None,
            correct_so_far,
        };

        match index {
            0 => match self.wall {
                Some(w) => {
                    let wd = w.weekday as usize % 7;
                    let options = [
                        DAY_NAMES[wd],
                        DAY_NAMES[(wd + 2) % 7],
                        DAY_NAMES[(wd + 4) % 7],
                    ];
                    q.correct_button = rotated_index(0, self.shift);
                    render_question(ui, "Day of week?", rotate3(options, self.shift));
                }
                None => {
                    q.notice_at = Some(now);
                    ui.set_lines("Day of week?", "Sync unavailable");
                }
            },
            1 => match self.wall {
                Some(w) => {
                    let bucket = time_bucket(w.hour);
                    q.correct_button = rotated_index(bucket, self.shift);
                    render_question(ui, "Time of day?", rotate3(TIME_LABELS, self.shift));
                }
                None => {
                    q.notice_at = Some(now);
                    ui.set_lines("Time of day?", "Sync unavailable");
                }
            },
            _ => {
                q.correct_button = rotated_index(0, self.shift);
                render_question(ui, "Where are you?", rotate3(LOCATION_LABELS, self.shift));
            }
        }

        Phase::Orientation(q)
    }

    fn tick_orientation(
        &mut self,
        q: OrientationQ,
        now: u32,
        input: &InputSnapshot,
        ui: &mut UiCommands,
    ) {
        if let Some(since) = q.notice_at {
            // Degraded question: dwell on the notice, score nothing.
            // Wrap-safe: uptime rolls over after ~49.7 days.
            if now.wrapping_sub(since) >= self.timing.notice_dwell_ms {
                self.phase = self.begin_orientation(q.index + 1, q.correct_so_far, now, ui);
            }
            return;
        }

        if let Some(button) = input.first_press() {
            self.record_latency(now.wrapping_sub(q.prompt_at));
            let correct = q.correct_so_far + u8::from(button == q.correct_button);
            self.phase = self.begin_orientation(q.index + 1, correct, now, ui);
        }
    }

    // ── Memory ────────────────────────────────────────────────

    fn begin_memory(&mut self, now: u32, ui: &mut UiCommands) -> Phase {
        let seq = [
            self.rng.below(3) as usize,
            self.rng.below(3) as usize,
            self.rng.below(3) as usize,
        ];
        show_symbol(ui, 0, MEMORY_SYMBOLS[seq[0]]);
        Phase::MemoryShow(MemoryShow {
            seq,
            shown: 1,
            shown_at: now,
        })
    }

    fn tick_memory_show(&mut self, mut show: MemoryShow, now: u32, ui: &mut UiCommands) {
        if now.wrapping_sub(show.shown_at) < self.timing.memory_symbol_ms {
            return;
        }
        if show.shown < MEMORY_SEQUENCE_LEN {
            show_symbol(ui, show.shown, MEMORY_SYMBOLS[show.seq[show.shown as usize]]);
            show.shown += 1;
            show.shown_at = now;
            self.phase = Phase::MemoryShow(show);
        } else {
            ui.set_lines("Repeat sequence", "1=A 2=B 3=C");
            self.phase = Phase::MemoryRecall(MemoryRecall {
                seq: show.seq,
                answered: 0,
                correct: 0,
                prompt_at: now,
            });
        }
    }

    fn tick_memory_recall(
        &mut self,
        mut recall: MemoryRecall,
        now: u32,
        input: &InputSnapshot,
        ui: &mut UiCommands,
    ) {
        let Some(button) = input.first_press() else {
            return;
        };
        self.record_latency(now.wrapping_sub(recall.prompt_at));
        if recall.seq[recall.answered as usize] == button {
            recall.correct += 1;
        }
        recall.answered += 1;
        recall.prompt_at = now;

        if recall.answered >= MEMORY_SEQUENCE_LEN {
            self.memory_score = recall.correct;
            debug!("assessment: memory {}/3", recall.correct);
            self.phase = self.begin_attention(0, 0, now, ui);
        } else {
            self.phase = Phase::MemoryRecall(recall);
        }
    }

    // ── Attention ─────────────────────────────────────────────

    fn begin_attention(&mut self, trial: u8, hits: u8, now: u32, ui: &mut UiCommands) -> Phase {
        if trial >= ATTENTION_TRIALS {
            self.attention_score = attention_scale(hits);
            debug!("assessment: attention {hits}/5 hits");
            return self.begin_executive(now, ui);
        }
        let span = self.timing.attention_max_delay_ms - self.timing.attention_min_delay_ms + 1;
        let delay = self.timing.attention_min_delay_ms + self.rng.below(span);
        ui.set_lines("Get ready...", "");
        Phase::Attention(AttentionTrial {
            trial,
            armed_at: now,
            cue_delay_ms: delay,
            cue_at: None,
            hits,
        })
    }

    fn tick_attention(
        &mut self,
        mut trial: AttentionTrial,
        now: u32,
        input: &InputSnapshot,
        ui: &mut UiCommands,
    ) {
        match trial.cue_at {
            // Arming: presses are deliberately ignored.
            None => {
                if now.wrapping_sub(trial.armed_at) >= trial.cue_delay_ms {
                    ui.set_lines("PRESS NOW!", "");
                    trial.cue_at = Some(now);
                }
                self.phase = Phase::Attention(trial);
            }
            Some(cue_at) => {
                if input.first_press().is_some() {
                    self.record_latency(now.wrapping_sub(cue_at));
                    self.phase = self.begin_attention(trial.trial + 1, trial.hits + 1, now, ui);
                } else if now.wrapping_sub(cue_at) >= self.timing.attention_window_ms {
                    // Miss: no latency recorded for a non-response.
                    self.phase = self.begin_attention(trial.trial + 1, trial.hits, now, ui);
                } else {
                    self.phase = Phase::Attention(trial);
                }
            }
        }
    }

    // ── Executive ─────────────────────────────────────────────

    fn begin_executive(&mut self, now: u32, ui: &mut UiCommands) -> Phase {
        ui.set_lines("Press in order:", "2 1 3 2");
        Phase::Executive(ExecutiveRun {
            presses: 0,
            matches: 0,
            prompt_at: now,
        })
    }

    fn tick_executive(
        &mut self,
        mut run: ExecutiveRun,
        now: u32,
        input: &InputSnapshot,
        _ui: &mut UiCommands,
    ) -> Option<AssessmentSummary> {
        let Some(button) = input.first_press() else {
            self.phase = Phase::Executive(run);
            return None;
        };
        self.record_latency(now.wrapping_sub(run.prompt_at));
        if CANONICAL_ORDER[run.presses as usize] == button {
            run.matches += 1;
        }
        run.presses += 1;
        run.prompt_at = now;

        if run.presses < CANONICAL_ORDER.len() as u8 {
            self.phase = Phase::Executive(run);
            return None;
        }

        let executive = executive_scale(run.matches);
        debug!("assessment: executive {}/4 matches", run.matches);
        self.phase = Phase::Idle;

        let avg = if self.latency_count == 0 {
            0
        } else {
            (self.latency_sum_ms / self.latency_count).min(u16::MAX as u32) as u16
        };
        let summary = AssessmentSummary {
            orientation: self.orientation_score,
            memory: self.memory_score,
            attention: self.attention_score,
            executive,
            avg_response_ms: avg,
        };
        info!(
            "assessment: complete o={} m={} a={} e={} avg={}ms",
            summary.orientation, summary.memory, summary.attention, summary.executive, avg
        );
        Some(summary)
    }

    fn record_latency(&mut self, ms: u32) {
        self.latency_sum_ms = self.latency_sum_ms.saturating_add(ms);
        self.latency_count += 1;
    }
}

impl Default for AssessmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Morning 5..=11, afternoon 12..=17, evening otherwise.
fn time_bucket(hour: u8) -> usize {
    match hour {
        5..=11 => 0,
        12..=17 => 1,
        _ => 2,
    }
}

fn render_question(ui: &mut UiCommands, prompt: &str, options: [&str; 3]) {
    let mut line: heapless::String<16> = heapless::String::new();
    // Overflow just truncates on the 16-char display.
    let _ = write!(line, "1{} 2{} 3{}", options[0], options[1], options[2]);
    ui.set_lines(prompt, &line);
}

// The position counter keeps consecutive identical symbols visually
// distinct; without it the display dedup would merge them into one
// long frame.
fn show_symbol(ui: &mut UiCommands, position: u8, symbol: char) {
    let mut line: heapless::String<16> = heapless::String::new();
    let _ = write!(
        line,
        " {}/{} [{symbol}]",
        position + 1,
        MEMORY_SEQUENCE_LEN
    );
    ui.set_lines("Memorize:", &line);
}
