//! Three-button input sampler.
//!
//! ## Hardware
//!
//! Active-low momentary switches with external pull-ups, polled at the
//! control-tick rate (25 ms). Each button carries its own debounce
//! state: a raw level change must hold steady for the debounce window
//! before it is accepted as a press or release edge.
//!
//! The sampler itself is pure. On target the raw levels come from
//! [`read_raw_levels`]; tests and the simulation inject levels
//! directly.

use crate::config::SystemConfig;

pub const BUTTON_COUNT: usize = 3;

/// Per-tick view of all three buttons, consumed by the combo
/// detectors, the assessment engine, and the menu handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    /// Debounced pressed level.
    pub pressed: [bool; BUTTON_COUNT],
    /// True on the single tick the press was accepted.
    pub pressed_edge: [bool; BUTTON_COUNT],
    /// True on the single tick the release was accepted.
    pub released_edge: [bool; BUTTON_COUNT],
    /// How long the button has been held, 0 when released.
    pub held_ms: [u32; BUTTON_COUNT],
}

impl InputSnapshot {
    /// Lowest-indexed button with a press edge this tick.
    pub fn first_press(&self) -> Option<usize> {
        self.pressed_edge.iter().position(|&edge| edge)
    }

    pub fn any_press(&self) -> bool {
        self.pressed_edge.iter().any(|&edge| edge)
    }
}

#[derive(Debug, Clone, Copy)]
struct Debounce {
    stable: bool,
    candidate: bool,
    candidate_since: u32,
    pressed_at: u32,
}

impl Debounce {
    const fn new() -> Self {
        Self {
            stable: false,
            candidate: false,
            candidate_since: 0,
            pressed_at: 0,
        }
    }
}

pub struct ButtonBank {
    debounce_ms: u32,
    buttons: [Debounce; BUTTON_COUNT],
}

impl ButtonBank {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            buttons: [Debounce::new(); BUTTON_COUNT],
        }
    }

    /// Fold one raw sample (true = pressed) into the debounce state
    /// and produce the per-tick snapshot.
    pub fn sample(&mut self, now_ms: u32, raw: [bool; BUTTON_COUNT]) -> InputSnapshot {
        let mut snap = InputSnapshot::default();

        for (i, button) in self.buttons.iter_mut().enumerate() {
            if raw[i] != button.candidate {
                button.candidate = raw[i];
                button.candidate_since = now_ms;
            }

            if button.candidate != button.stable
                && now_ms.wrapping_sub(button.candidate_since) >= self.debounce_ms
            {
                button.stable = button.candidate;
                if button.stable {
                    button.pressed_at = now_ms;
                    snap.pressed_edge[i] = true;
                } else {
                    snap.released_edge[i] = true;
                }
            }

            snap.pressed[i] = button.stable;
            snap.held_ms[i] = if button.stable {
                now_ms.wrapping_sub(button.pressed_at)
            } else {
                0
            };
        }

        snap
    }
}

/// Raw active-low levels from the button GPIOs, inverted so true
/// means pressed.
#[cfg(target_os = "espidf")]
pub fn read_raw_levels() -> [bool; BUTTON_COUNT] {
    let mut raw = [false; BUTTON_COUNT];
    for (i, &pin) in crate::pins::BUTTON_GPIOS.iter().enumerate() {
        raw[i] = !crate::drivers::hw_init::gpio_read(pin);
    }
    raw
}
