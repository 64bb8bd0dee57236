//! Hidden diagnostics console.
//!
//! Four read-only pages over the live device state, refreshed at most
//! every 400 ms to avoid flicker. Entered via the 2 s hold of buttons
//! 2+3 from any state; buttons 1/2 page backwards/forwards; a 1.5 s
//! hold of button 3 exits. Nothing here mutates assessment, pet, or
//! telemetry state.

use core::fmt::Write;

use crate::assessment::AssessmentResult;
use crate::clock::TimeSyncState;
use crate::drivers::button::InputSnapshot;
use crate::fsm::context::UiCommands;
use crate::pet::PetState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagPage {
    Network,
    Telemetry,
    Buttons,
    Pet,
}

const PAGE_ORDER: [DiagPage; 4] = [
    DiagPage::Network,
    DiagPage::Telemetry,
    DiagPage::Buttons,
    DiagPage::Pet,
];

/// Read-only view the console renders from, assembled by the
/// diagnostics state handler out of context fields.
pub struct DiagData<'a> {
    pub sync: &'a TimeSyncState,
    pub ble_connected: bool,
    pub ring_len: usize,
    pub last_result: Option<&'a AssessmentResult>,
    pub input: &'a InputSnapshot,
    pub pet: &'a PetState,
}

#[derive(Debug, Clone, Copy)]
pub struct DiagView {
    page: usize,
    last_render_ms: u32,
    /// Forces an immediate render (entry, page change).
    dirty: bool,
}

impl DiagView {
    pub fn new() -> Self {
        Self {
            page: 0,
            last_render_ms: 0,
            dirty: true,
        }
    }

    /// Call on console entry.
    pub fn reset(&mut self) {
        self.page = 0;
        self.dirty = true;
    }

    pub fn page(&self) -> DiagPage {
        PAGE_ORDER[self.page]
    }

    pub fn prev_page(&mut self) {
        self.page = (self.page + PAGE_ORDER.len() - 1) % PAGE_ORDER.len();
        self.dirty = true;
    }

    pub fn next_page(&mut self) {
        self.page = (self.page + 1) % PAGE_ORDER.len();
        self.dirty = true;
    }

    /// Render the current page if the refresh window elapsed (or a
    /// page change forced it).
    pub fn maybe_render(
        &mut self,
        now: u32,
        refresh_ms: u32,
        ui: &mut UiCommands,
        data: &DiagData<'_>,
    ) {
        if !self.dirty && now.wrapping_sub(self.last_render_ms) < refresh_ms {
            return;
        }
        self.dirty = false;
        self.last_render_ms = now;

        let mut line0: heapless::String<16> = heapless::String::new();
        let mut line1: heapless::String<16> = heapless::String::new();

        match self.page() {
            DiagPage::Network => {
                let _ = write!(
                    line0,
                    "Sync:{} Join:{}",
                    yn(data.sync.synced),
                    yn(data.sync.joined)
                );
                match data.sync.last_ip {
                    Some([a, b, c, d]) => {
                        let _ = write!(line1, "{a}.{b}.{c}.{d}");
                    }
                    None => {
                        let _ = write!(line1, "no ip");
                    }
                }
            }
            DiagPage::Telemetry => {
                let _ = write!(
                    line0,
                    "BLE:{} q:{}",
                    if data.ble_connected { "con" } else { "adv" },
                    data.ring_len
                );
                match data.last_result {
                    Some(r) => {
                        let _ = write!(line1, "tot:{} alert:{}", r.total, r.alert_level);
                    }
                    None => {
                        let _ = write!(line1, "no result");
                    }
                }
            }
            DiagPage::Buttons => {
                let p = data.input.pressed;
                let _ = write!(
                    line0,
                    "B1:{} B2:{} B3:{}",
                    u8::from(p[0]),
                    u8::from(p[1]),
                    u8::from(p[2])
                );
                let held = data.input.held_ms.iter().copied().max().unwrap_or(0);
                let _ = write!(line1, "hold:{held}ms");
            }
            DiagPage::Pet => {
                let _ = write!(
                    line0,
                    "H:{} U:{} C:{}",
                    data.pet.happiness, data.pet.hunger, data.pet.cleanliness
                );
                match data.last_result {
                    Some(r) => {
                        let _ = write!(line1, "risk:{}", r.alert_level);
                    }
                    None => {
                        let _ = write!(line1, "risk:-");
                    }
                }
            }
        }

        ui.set_lines(&line0, &line1);
        ui.set_backlight(30, 30, 60);
    }
}

impl Default for DiagView {
    fn default() -> Self {
        Self::new()
    }
}

fn yn(flag: bool) -> &'static str {
    if flag { "Y" } else { "N" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeSyncState;

    fn data<'a>(
        sync: &'a TimeSyncState,
        input: &'a InputSnapshot,
        pet: &'a PetState,
    ) -> DiagData<'a> {
        DiagData {
            sync,
            ble_connected: false,
            ring_len: 3,
            last_result: None,
            input,
            pet,
        }
    }

    #[test]
    fn pages_cycle_in_both_directions() {
        let mut view = DiagView::new();
        assert_eq!(view.page(), DiagPage::Network);
        view.next_page();
        assert_eq!(view.page(), DiagPage::Telemetry);
        view.prev_page();
        view.prev_page();
        assert_eq!(view.page(), DiagPage::Pet);
        view.next_page();
        assert_eq!(view.page(), DiagPage::Network);
    }

    #[test]
    fn render_is_rate_limited() {
        let sync = TimeSyncState::default();
        let input = InputSnapshot::default();
        let pet = PetState::new();
        let mut view = DiagView::new();
        let mut ui = UiCommands::new();

        view.maybe_render(1000, 400, &mut ui, &data(&sync, &input, &pet));
        assert!(ui.take_dirty());
        assert_eq!(ui.line0(), "Sync:N Join:N");
        assert_eq!(ui.line1(), "no ip");

        // 200 ms later: inside the refresh window, nothing re-rendered.
        view.maybe_render(1200, 400, &mut ui, &data(&sync, &input, &pet));
        assert!(!ui.take_dirty());

        // Page change forces an immediate render.
        view.next_page();
        view.maybe_render(1250, 400, &mut ui, &data(&sync, &input, &pet));
        assert_eq!(ui.line0(), "BLE:adv q:3");
        assert_eq!(ui.line1(), "no result");
    }

    #[test]
    fn network_page_shows_ip_when_known() {
        let sync = TimeSyncState {
            synced: true,
            last_ip: Some([10, 0, 0, 7]),
            ..TimeSyncState::default()
        };
        let input = InputSnapshot::default();
        let pet = PetState::new();
        let mut view = DiagView::new();
        let mut ui = UiCommands::new();
        view.maybe_render(0, 400, &mut ui, &data(&sync, &input, &pet));
        assert_eq!(ui.line0(), "Sync:Y Join:N");
        assert_eq!(ui.line1(), "10.0.0.7");
    }

    #[test]
    fn pet_page_reports_gauges_and_risk() {
        let sync = TimeSyncState::default();
        let input = InputSnapshot::default();
        let pet = PetState::new();
        let result = AssessmentResult::from_scores(0, 2, 2, 2, 2, 600);
        let mut view = DiagView::new();
        let mut ui = UiCommands::new();

        let mut d = data(&sync, &input, &pet);
        d.last_result = Some(&result);
        view.reset();
        view.next_page();
        view.next_page();
        view.next_page(); // Pet page
        view.maybe_render(0, 400, &mut ui, &d);
        assert_eq!(ui.line0(), "H:80 U:20 C:80");
        assert_eq!(ui.line1(), "risk:1");
    }
}
