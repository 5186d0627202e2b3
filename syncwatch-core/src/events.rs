use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::SessionId;

pub type CommandSender = Sender<PlaybackCommand>;
pub type CommandReceiver = Receiver<PlaybackCommand>;

/// A play, pause, or seek intent asserted by one participant of a room.
///
/// This is the broadcast wire payload, serializing to
/// `{"type":"play","time":12.5,"sender_id":"user_...","timestamp":1724567890123}`.
/// Events are ephemeral; nothing beyond the authoritative room fields they
/// update is ever persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub kind: SyncEventKind,
    /// The playback position this event asserts, in seconds.
    pub time: f32,
    pub sender_id: SessionId,
    /// Origin timestamp, used to order conflicting events between peers.
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub emitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEventKind {
    Play,
    Pause,
    Seek,
}

/// What a media element attached to a session should do next. Emitted for
/// applied peer intent and for drift corrections, never for the client's
/// own actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackCommand {
    /// Resume playback at the given position, in seconds.
    Play { position: f32 },
    /// Pause playback, leaving the position untouched.
    Pause,
    /// Jump to the given position without changing the play/pause flag.
    Seek { position: f32 },
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_format() {
        let event = SyncEvent {
            kind: SyncEventKind::Play,
            time: 12.5,
            sender_id: SessionId::from("user_1724567890123_abc123xyz"),
            emitted_at: Utc.timestamp_millis_opt(1_724_567_890_123).unwrap(),
        };

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "play",
                "time": 12.5,
                "sender_id": "user_1724567890123_abc123xyz",
                "timestamp": 1_724_567_890_123_i64,
            })
        );
    }

    #[test]
    fn test_wire_roundtrip() {
        let payload = r#"{"type":"seek","time":42.0,"sender_id":"user_1_a","timestamp":1000}"#;
        let event: SyncEvent = serde_json::from_str(payload).unwrap();

        assert_eq!(event.kind, SyncEventKind::Seek);
        assert_eq!(event.time, 42.0);
        assert_eq!(event.emitted_at.timestamp_millis(), 1000);

        let back: SyncEvent = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(back, event);
    }
}
