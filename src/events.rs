//! Interrupt-driven event system.
//!
//! Events are produced by the BLE stack callbacks (GATT connect /
//! disconnect, subscription changes) and consumed by the main control
//! loop, which processes them one at a time in FIFO order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ BLE stack   │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Software    │────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// System event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// A BLE central connected to the GATT server.
    BleConnected = 10,
    /// The BLE central disconnected.
    BleDisconnected = 11,
    /// A central subscribed to one of the notify characteristics.
    BleSubscribed = 12,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// ISRs and the BLE stack write (produce), main loop reads (consume).
// Uses atomic head/tail indices.  The buffer is intentionally
// kept in a static so ISR callbacks can access it.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: EVENT_BUFFER is accessed exclusively through push_event /
// pop_event. Producer (push_event): timer / BLE callback context — one
// writer. Consumer (pop_event): main-loop task — one reader. The
// Acquire/Release pairing on head/tail enforces the SPSC discipline.
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from ISR context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full — drop event.
    }

    // SAFETY: Single producer; the slot at `head` is not visible to the
    // consumer until the Release store below publishes it.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback.
/// Processes events in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Check if the event queue is empty.
pub fn queue_is_empty() -> bool {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);
    tail == head
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        10 => Some(Event::BleConnected),
        11 => Some(Event::BleDisconnected),
        12 => Some(Event::BleSubscribed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The queue is a process-wide static, so everything runs in one
    // test to avoid interleaving with a parallel test thread.
    #[test]
    fn queue_fifo_order_and_overflow() {
        while pop_event().is_some() {}

        assert!(push_event(Event::BleConnected));
        assert!(push_event(Event::BleSubscribed));
        assert!(push_event(Event::BleDisconnected));
        assert_eq!(pop_event(), Some(Event::BleConnected));
        assert_eq!(pop_event(), Some(Event::BleSubscribed));
        assert_eq!(pop_event(), Some(Event::BleDisconnected));
        assert_eq!(pop_event(), None);

        // Capacity is CAP - 1: head == tail means empty.
        for _ in 0..(EVENT_QUEUE_CAP - 1) {
            assert!(push_event(Event::BleSubscribed));
        }
        assert!(!push_event(Event::BleConnected));
        assert_eq!(queue_len(), EVENT_QUEUE_CAP - 1);
        while pop_event().is_some() {}
        assert!(queue_is_empty());
    }
}
