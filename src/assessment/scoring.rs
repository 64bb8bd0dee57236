//! Score aggregation and the answer-rotation primitives.
//!
//! All mappings here are fixed clinical conventions shared with the
//! backend; changing any threshold breaks longitudinal comparability
//! of stored results.

/// Completed assessment record, the unit retained on-device (latest
/// only) and transmitted over the assessment characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentResult {
    /// Unix seconds when synced, uptime-seconds surrogate otherwise.
    pub timestamp: u32,
    pub orientation: u8,
    pub memory: u8,
    pub attention: u8,
    pub executive: u8,
    /// Always the sum of the four sub-scores (0..=12).
    pub total: u8,
    /// Mean of every recorded response latency across all sub-tests.
    pub avg_response_ms: u16,
    /// 0 = green .. 3 = red, derived from `total`.
    pub alert_level: u8,
}

impl AssessmentResult {
    /// Build a result from raw sub-scores, deriving `total` and
    /// `alert_level` so the invariants hold by construction.
    pub fn from_scores(
        timestamp: u32,
        orientation: u8,
        memory: u8,
        attention: u8,
        executive: u8,
        avg_response_ms: u16,
    ) -> Self {
        let total = orientation + memory + attention + executive;
        Self {
            timestamp,
            orientation,
            memory,
            attention,
            executive,
            total,
            avg_response_ms,
            alert_level: alert_level(total),
        }
    }
}

/// Clinical risk bucket from total score.
/// ≥10 green, ≥7 yellow, ≥4 orange, else red.
pub fn alert_level(total: u8) -> u8 {
    if total >= 10 {
        0
    } else if total >= 7 {
        1
    } else if total >= 4 {
        2
    } else {
        3
    }
}

/// Map the raw attention hit count (0..=5) onto the 0..=3 sub-score.
pub fn attention_scale(hits: u8) -> u8 {
    if hits >= 4 {
        3
    } else if hits >= 3 {
        2
    } else if hits >= 2 {
        1
    } else {
        0
    }
}

/// Map the executive match count (0..=4) onto the 0..=3 sub-score.
/// Deliberately coarse: one match scores the same as zero. This
/// mirrors the established scale and must not be "fixed" locally.
pub fn executive_scale(matches: u8) -> u8 {
    if matches == 4 {
        3
    } else if matches >= 2 {
        2
    } else {
        0
    }
}

/// Cyclic rotation of a 3-element option set: the item at index `i`
/// moves to `(i + shift) % 3`.
pub fn rotate3<T: Copy>(items: [T; 3], shift: u8) -> [T; 3] {
    let mut out = items;
    for (i, item) in items.iter().enumerate() {
        out[(i + shift as usize) % 3] = *item;
    }
    out
}

/// Where the option originally at `index` lands after [`rotate3`]
/// with the same `shift`.
pub fn rotated_index(index: usize, shift: u8) -> usize {
    (index + shift as usize) % 3
}
