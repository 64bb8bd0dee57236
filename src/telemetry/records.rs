//! Fixed-size binary frames for the BLE notify characteristics.
//!
//! Both frames are little-endian and zero-padded to their full MTU-safe
//! length so the companion app can parse at fixed offsets:
//!
//! ```text
//! Assessment frame (32 bytes)          Interaction frame (16 bytes)
//!  0..4   timestamp        u32 LE       0..4   timestamp     u32 LE
//!  4      orientation      u8           4      kind          u8
//!  5      memory           u8           5..7   response_ms   u16 LE
//!  6      attention        u8           7      success       u8 (0/1)
//!  7      executive        u8           8      mood          i8 (-1 = n/a)
//!  8      total            u8           9..16  zero padding
//!  9..11  avg_response_ms  u16 LE
//!  11     alert_level      u8
//!  12..32 zero padding
//! ```

use crate::assessment::AssessmentResult;
use crate::telemetry::{InteractionEvent, InteractionKind};

pub const ASSESSMENT_FRAME_LEN: usize = 32;
pub const INTERACTION_FRAME_LEN: usize = 16;

/// Serialize an assessment result into its notify frame.
pub fn encode_assessment(result: &AssessmentResult) -> [u8; ASSESSMENT_FRAME_LEN] {
    let mut frame = [0u8; ASSESSMENT_FRAME_LEN];
    frame[0..4].copy_from_slice(&result.timestamp.to_le_bytes());
    frame[4] = result.orientation;
    frame[5] = result.memory;
    frame[6] = result.attention;
    frame[7] = result.executive;
    frame[8] = result.total;
    frame[9..11].copy_from_slice(&result.avg_response_ms.to_le_bytes());
    frame[11] = result.alert_level;
    frame
}

/// Parse an assessment notify frame. Returns `None` on short input.
pub fn decode_assessment(frame: &[u8]) -> Option<AssessmentResult> {
    if frame.len() < 12 {
        return None;
    }
    Some(AssessmentResult {
        timestamp: u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]),
        orientation: frame[4],
        memory: frame[5],
        attention: frame[6],
        executive: frame[7],
        total: frame[8],
        avg_response_ms: u16::from_le_bytes([frame[9], frame[10]]),
        alert_level: frame[11],
    })
}

/// Serialize an interaction event into its notify frame.
pub fn encode_interaction(event: &InteractionEvent) -> [u8; INTERACTION_FRAME_LEN] {
    let mut frame = [0u8; INTERACTION_FRAME_LEN];
    frame[0..4].copy_from_slice(&event.timestamp.to_le_bytes());
    frame[4] = event.kind as u8;
    frame[5..7].copy_from_slice(&event.response_ms.to_le_bytes());
    frame[7] = event.success as u8;
    frame[8] = match event.mood {
        Some(m) => m as i8 as u8,
        None => (-1i8) as u8,
    };
    frame
}

/// Parse an interaction notify frame. Returns `None` on short input
/// or an unknown interaction kind.
pub fn decode_interaction(frame: &[u8]) -> Option<InteractionEvent> {
    if frame.len() < 9 {
        return None;
    }
    let kind = InteractionKind::from_u8(frame[4])?;
    let mood = match frame[8] as i8 {
        m if m < 0 => None,
        m => Some(m as u8),
    };
    Some(InteractionEvent {
        timestamp: u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]),
        kind,
        response_ms: u16::from_le_bytes([frame[5], frame[6]]),
        success: frame[7] != 0,
        mood,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assessment_frame_layout() {
        let result = AssessmentResult {
            timestamp: 0x0102_0304,
            orientation: 3,
            memory: 2,
            attention: 3,
            executive: 2,
            total: 10,
            avg_response_ms: 0x0405,
            alert_level: 0,
        };
        let frame = encode_assessment(&result);
        assert_eq!(frame.len(), ASSESSMENT_FRAME_LEN);
        // Little-endian timestamp at offset 0.
        assert_eq!(&frame[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&frame[4..9], &[3, 2, 3, 2, 10]);
        assert_eq!(&frame[9..11], &[0x05, 0x04]);
        assert_eq!(frame[11], 0);
        assert!(frame[12..].iter().all(|&b| b == 0));
        assert_eq!(decode_assessment(&frame), Some(result));
    }

    #[test]
    fn interaction_frame_layout() {
        let event = InteractionEvent {
            timestamp: 1_700_000_000,
            kind: InteractionKind::Game,
            response_ms: 1234,
            success: true,
            mood: None,
        };
        let frame = encode_interaction(&event);
        assert_eq!(frame.len(), INTERACTION_FRAME_LEN);
        assert_eq!(frame[4], InteractionKind::Game as u8);
        assert_eq!(frame[7], 1);
        // Mood n/a is the sentinel -1.
        assert_eq!(frame[8] as i8, -1);
        assert!(frame[9..].iter().all(|&b| b == 0));
        assert_eq!(decode_interaction(&frame), Some(event));
    }

    #[test]
    fn interaction_mood_sentinel() {
        let mut event = InteractionEvent {
            timestamp: 7,
            kind: InteractionKind::MoodSelect,
            response_ms: 0,
            success: true,
            mood: Some(2),
        };
        let frame = encode_interaction(&event);
        assert_eq!(frame[8], 2);
        assert_eq!(decode_interaction(&frame), Some(event));

        event.mood = None;
        let frame = encode_interaction(&event);
        assert_eq!(decode_interaction(&frame).and_then(|e| e.mood), None);
    }

    #[test]
    fn decode_rejects_short_frames() {
        assert!(decode_assessment(&[0u8; 11]).is_none());
        assert!(decode_interaction(&[0u8; 8]).is_none());
        assert!(decode_interaction(&[0u8, 0, 0, 0, 99, 0, 0, 0, 0]).is_none());
    }
}
