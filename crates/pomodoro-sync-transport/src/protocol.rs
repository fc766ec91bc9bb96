//! Wire protocol for client-coordinator communication.

use pomodoro_sync_core::{
    Command, PresetType, SessionType, Snapshot, TaskId, TaskRef, TimerEvent,
    state::{MAX_ROUND, MIN_ROUND},
};
use serde::{Deserialize, Serialize};

/// Protocol error. Any inbound frame that fails here is a malformed message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed message: {0}")]
    Invalid(String),
}

/// Message from client to coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start the timer for a task.
    Start {
        task_id: TaskId,
        session_type: SessionType,
        /// Seconds to count down from.
        duration: u64,
        preset_type: PresetType,
    },
    /// Pause the running timer.
    Pause,
    /// Resume a paused timer.
    Resume,
    /// Stop the timer.
    Stop,
    /// Advance to the next session.
    SkipToNext,
    /// Ask for a fresh `timer_sync` and report the selected preset.
    SyncRequest { preset_type: PresetType },
}

impl From<Command> for ClientMessage {
    fn from(command: Command) -> Self {
        match command {
            Command::Start {
                task_id,
                session_type,
                duration_secs,
                preset_type,
            } => Self::Start {
                task_id,
                session_type,
                duration: duration_secs,
                preset_type,
            },
            Command::Pause => Self::Pause,
            Command::Resume => Self::Resume,
            Command::Stop => Self::Stop,
            Command::SkipToNext => Self::SkipToNext,
            Command::SyncRequest { preset_type } => Self::SyncRequest { preset_type },
        }
    }
}

/// Payload of `timer_sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSyncData {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub session_type: SessionType,
    /// Seconds remaining.
    pub remaining_time: u64,
    pub is_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_task: Option<TaskRef>,
    /// Monotonic sequence number (optional extension).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl TimerSyncData {
    fn validate(&mut self) -> Result<(), ProtocolError> {
        match self.round_number {
            // Zero is how older coordinators say "no round info".
            Some(0) => self.round_number = None,
            Some(round) if !(MIN_ROUND..=MAX_ROUND).contains(&round) => {
                return Err(ProtocolError::Invalid(format!(
                    "round_number {round} outside {MIN_ROUND}..={MAX_ROUND}"
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

impl From<TimerSyncData> for Snapshot {
    fn from(data: TimerSyncData) -> Self {
        Self {
            task_id: data.task_id,
            session_type: data.session_type,
            remaining_secs: data.remaining_time,
            is_paused: data.is_paused,
            round_number: data.round_number,
            active_task: data.active_task,
            seq: data.seq,
        }
    }
}

/// Message from coordinator to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authoritative timer snapshot.
    TimerSync { data: TimerSyncData },
    /// The coordinator stopped the timer.
    TimerStopped,
}

impl ServerMessage {
    /// Convert into the reducer event it triggers.
    #[must_use]
    pub fn into_event(self) -> TimerEvent {
        match self {
            Self::TimerSync { data } => TimerEvent::SnapshotReceived(data.into()),
            Self::TimerStopped => TimerEvent::StoppedReceived,
        }
    }
}

/// Decode and validate an inbound frame.
///
/// # Errors
/// Returns error if the frame is not JSON, carries an unknown `type`, misses a
/// required field, or fails range validation.
pub fn decode(frame: &str) -> Result<ServerMessage, ProtocolError> {
    let mut msg: ServerMessage = serde_json::from_str(frame)?;
    if let ServerMessage::TimerSync { data } = &mut msg {
        data.validate()?;
    }
    Ok(msg)
}

/// Encode an outbound message.
///
/// # Errors
/// Returns error if serialization fails.
pub fn encode(msg: &ClientMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn as_value(msg: &ClientMessage) -> Value {
        serde_json::from_str(&encode(msg).unwrap()).unwrap()
    }

    #[test]
    fn test_start_wire_shape() {
        let msg = ClientMessage::from(Command::Start {
            task_id: TaskId::Number(12),
            session_type: SessionType::Work,
            duration_secs: 1500,
            preset_type: PresetType::Short,
        });

        assert_eq!(
            as_value(&msg),
            json!({
                "type": "start",
                "task_id": 12,
                "session_type": "work",
                "duration": 1500,
                "preset_type": "short"
            })
        );
    }

    #[test]
    fn test_unit_commands_wire_shape() {
        assert_eq!(as_value(&ClientMessage::Pause), json!({"type": "pause"}));
        assert_eq!(as_value(&ClientMessage::Resume), json!({"type": "resume"}));
        assert_eq!(as_value(&ClientMessage::Stop), json!({"type": "stop"}));
        assert_eq!(
            as_value(&ClientMessage::SkipToNext),
            json!({"type": "skip_to_next"})
        );
        assert_eq!(
            as_value(&ClientMessage::SyncRequest {
                preset_type: PresetType::Long
            }),
            json!({"type": "sync_request", "preset_type": "long"})
        );
    }

    #[test]
    fn test_decode_timer_sync() {
        let msg = decode(
            r#"{"type":"timer_sync","data":{"task_id":"t-9","session_type":"short_break",
                "remaining_time":290,"is_paused":false,"round_number":2,
                "active_task":{"id":"t-9","title":"Email"}}}"#,
        )
        .unwrap();

        let TimerEvent::SnapshotReceived(snapshot) = msg.into_event() else {
            panic!("Wrong event type");
        };
        assert_eq!(snapshot.session_type, SessionType::ShortBreak);
        assert_eq!(snapshot.remaining_secs, 290);
        assert_eq!(snapshot.round_number, Some(2));
        assert_eq!(snapshot.active_task, Some(TaskRef::new("t-9", "Email")));
        assert_eq!(snapshot.seq, None);
    }

    #[test]
    fn test_decode_partial_timer_sync() {
        let msg = decode(
            r#"{"type":"timer_sync","data":{"task_id":null,"session_type":"work",
                "remaining_time":10,"is_paused":true,"round_number":null,"active_task":null}}"#,
        )
        .unwrap();

        let TimerEvent::SnapshotReceived(snapshot) = msg.into_event() else {
            panic!("Wrong event type");
        };
        assert_eq!(snapshot.round_number, None);
        assert_eq!(snapshot.active_task, None);
        assert!(snapshot.is_paused);
    }

    #[test]
    fn test_decode_timer_stopped() {
        let msg = decode(r#"{"type":"timer_stopped"}"#).unwrap();
        assert_eq!(msg.into_event(), TimerEvent::StoppedReceived);
    }

    #[test]
    fn test_round_zero_means_absent() {
        let msg = decode(
            r#"{"type":"timer_sync","data":{"session_type":"work","remaining_time":5,
                "is_paused":false,"round_number":0}}"#,
        )
        .unwrap();
        let ServerMessage::TimerSync { data } = msg else {
            panic!("Wrong message type");
        };
        assert_eq!(data.round_number, None);
    }

    #[test]
    fn test_rejects_malformed_frames() {
        let cases = [
            "not json",
            r#"{"type":"timer_paused"}"#,
            r#"{"data":{}}"#,
            r#"{"type":"timer_sync","data":{"session_type":"work","is_paused":false}}"#,
            r#"{"type":"timer_sync","data":{"session_type":"nap","remaining_time":1,"is_paused":false}}"#,
            r#"{"type":"timer_sync","data":{"session_type":"work","remaining_time":-3,"is_paused":false}}"#,
            r#"{"type":"timer_sync","data":{"session_type":"work","remaining_time":1,"is_paused":false,"round_number":5}}"#,
        ];

        for frame in cases {
            assert!(decode(frame).is_err(), "accepted: {frame}");
        }
    }
}
