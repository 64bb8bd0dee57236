//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A future MQTT or BLE adapter would implement the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::AssessmentCompleted(r) => {
                info!(
                    "ASSESS | O={} M={} A={} E={} | total={}/12 alert={} | \
                     avg_resp={}ms | ts={}",
                    r.orientation,
                    r.memory,
                    r.attention,
                    r.executive,
                    r.total,
                    r.alert_level,
                    r.avg_response_ms,
                    r.timestamp,
                );
            }
            AppEvent::InteractionLogged { kind, notified } => {
                info!(
                    "INTERACT | kind={:?} | ble={}",
                    kind,
                    if *notified { "sent" } else { "skipped" },
                );
            }
        }
    }
}
