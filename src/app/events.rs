//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them — log to serial, capture in
//! tests, etc.

use crate::assessment::AssessmentResult;
use crate::fsm::StateId;
use crate::telemetry::InteractionKind;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy)]
pub enum AppEvent {
    /// The application service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// An assessment finished (real or injected) and its record was
    /// queued for telemetry.
    AssessmentCompleted(AssessmentResult),

    /// A pet interaction was logged to the ring buffer.
    /// `notified` reports whether the best-effort BLE mirror went out.
    InteractionLogged {
        kind: InteractionKind,
        notified: bool,
    },
}
