//! Telemetry data model: interaction log events and the bounded
//! in-RAM history ring.
//!
//! Binary frame encoding lives in [`records`]; the BLE adapter only
//! ever sees finished frames.

pub mod records;

use heapless::Deque;

/// How many interaction events are retained in RAM.
/// Oldest entries are evicted first once full.
pub const INTERACTION_RING_CAP: usize = 20;

/// What the user did with the pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InteractionKind {
    Feed = 0,
    Play = 1,
    Clean = 2,
    MoodSelect = 3,
    Game = 4,
}

impl InteractionKind {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Feed),
            1 => Some(Self::Play),
            2 => Some(Self::Clean),
            3 => Some(Self::MoodSelect),
            4 => Some(Self::Game),
            _ => None,
        }
    }
}

/// One logged pet interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionEvent {
    /// Unix seconds when synced, uptime seconds otherwise.
    pub timestamp: u32,
    pub kind: InteractionKind,
    /// Milliseconds from prompt to button press. 0 when not timed.
    pub response_ms: u16,
    pub success: bool,
    /// Self-reported mood (0..=2). `None` for interactions without one.
    pub mood: Option<u8>,
}

/// Bounded FIFO history of interaction events.
///
/// Push never fails: when the ring is full the oldest entry is
/// discarded to make room.
#[derive(Debug, Default)]
pub struct InteractionRing {
    buf: Deque<InteractionEvent, INTERACTION_RING_CAP>,
}

impl InteractionRing {
    pub const fn new() -> Self {
        Self { buf: Deque::new() }
    }

    pub fn push(&mut self, event: InteractionEvent) {
        if self.buf.is_full() {
            let _ = self.buf.pop_front();
        }
        // Cannot fail: we just freed a slot if the ring was full.
        let _ = self.buf.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Oldest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = &InteractionEvent> {
        self.buf.iter()
    }

    /// Most recent entry, if any.
    pub fn latest(&self) -> Option<&InteractionEvent> {
        self.buf.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(ts: u32) -> InteractionEvent {
        InteractionEvent {
            timestamp: ts,
            kind: InteractionKind::Feed,
            response_ms: 0,
            success: true,
            mood: None,
        }
    }

    #[test]
    fn ring_keeps_insertion_order() {
        let mut ring = InteractionRing::new();
        for ts in 0..5 {
            ring.push(ev(ts));
        }
        let stamps: Vec<u32> = ring.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![0, 1, 2, 3, 4]);
        assert_eq!(ring.latest().map(|e| e.timestamp), Some(4));
    }

    #[test]
    fn ring_evicts_oldest_when_full() {
        let mut ring = InteractionRing::new();
        for ts in 1..=(INTERACTION_RING_CAP as u32 + 1) {
            ring.push(ev(ts));
        }
        assert_eq!(ring.len(), INTERACTION_RING_CAP);
        // The 21st insert displaced the 1st; the front is now the 2nd.
        assert_eq!(ring.iter().next().map(|e| e.timestamp), Some(2));
        assert_eq!(
            ring.latest().map(|e| e.timestamp),
            Some(INTERACTION_RING_CAP as u32 + 1)
        );
    }

    #[test]
    fn kind_round_trips_through_u8() {
        for kind in [
            InteractionKind::Feed,
            InteractionKind::Play,
            InteractionKind::Clean,
            InteractionKind::MoodSelect,
            InteractionKind::Game,
        ] {
            assert_eq!(InteractionKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(InteractionKind::from_u8(200), None);
    }
}
