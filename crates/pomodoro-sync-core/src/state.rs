//! Local mirror of the authoritative timer and the reducer that drives it.
//!
//! `SessionState` fields are private: the only way to obtain a different state
//! is `reduce`, which applies one `TimerEvent` and returns the next state.

use serde::Serialize;

use crate::{PresetType, SessionType, Settings, TaskContext, TaskId, TaskRef, resolve};

/// Remaining time shown before any snapshot or settings are known.
pub const DEFAULT_TIME_LEFT_SECS: u64 = 25 * 60;

/// First round of a cycle.
pub const MIN_ROUND: u8 = 1;

/// Last round of a cycle.
pub const MAX_ROUND: u8 = 4;

/// Authoritative timer state pushed or pulled from the remote coordinator.
///
/// Optional fields that are absent leave the mirrored value untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub task_id: Option<TaskId>,
    pub session_type: SessionType,
    pub remaining_secs: u64,
    pub is_paused: bool,
    pub round_number: Option<u8>,
    pub active_task: Option<TaskRef>,
    /// Monotonic sequence number, when the coordinator sends one.
    pub seq: Option<u64>,
}

/// Intent sent to the remote coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start {
        task_id: TaskId,
        session_type: SessionType,
        duration_secs: u64,
        preset_type: PresetType,
    },
    Pause,
    Resume,
    Stop,
    SkipToNext,
    SyncRequest {
        preset_type: PresetType,
    },
}

impl Command {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::SkipToNext => "skip_to_next",
            Self::SyncRequest { .. } => "sync_request",
        }
    }
}

/// Everything that can move a `SessionState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A command left the client. Recorded for tracing only: state is never
    /// changed until a snapshot confirms the command.
    CommandIssued(Command),
    SnapshotReceived(Snapshot),
    StoppedReceived,
    PresetChanged(PresetType),
    /// The session moved to another channel. Sequence numbers from the new
    /// coordinator are unrelated to the old ones.
    ChannelRebound,
}

/// Inputs the reducer reads but does not own.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReduceContext<'a> {
    pub settings: Option<&'a Settings>,
    /// Discard sequenced snapshots that are not newer than the last applied one.
    pub reject_stale: bool,
}

/// What the reducer did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event was applied (the state may still be equal to the previous one).
    Applied,
    /// The event carries no state change.
    Ignored,
    /// A sequenced snapshot older than the applied one was discarded.
    Stale { incoming: u64, applied: u64 },
}

/// Result of `reduce`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduced {
    pub state: SessionState,
    pub outcome: Outcome,
}

/// Timer state mirrored from the remote coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    time_left_secs: u64,
    is_running: bool,
    session_type: SessionType,
    round_number: u8,
    preset_type: PresetType,
    active_task: Option<TaskRef>,
    last_seq: Option<u64>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            time_left_secs: DEFAULT_TIME_LEFT_SECS,
            is_running: false,
            session_type: SessionType::Work,
            round_number: MIN_ROUND,
            preset_type: PresetType::Short,
            active_task: None,
            last_seq: None,
        }
    }
}

impl SessionState {
    /// Initial state on attach. The displayed task starts as the selected one.
    #[must_use]
    pub fn new(context: &TaskContext) -> Self {
        Self {
            active_task: context.task.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn time_left_secs(&self) -> u64 {
        self.time_left_secs
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.is_running
    }

    #[must_use]
    pub const fn session_type(&self) -> SessionType {
        self.session_type
    }

    #[must_use]
    pub const fn round_number(&self) -> u8 {
        self.round_number
    }

    #[must_use]
    pub const fn preset_type(&self) -> PresetType {
        self.preset_type
    }

    #[must_use]
    pub const fn active_task(&self) -> Option<&TaskRef> {
        self.active_task.as_ref()
    }

    /// Sequence number of the last applied snapshot, if it carried one.
    #[must_use]
    pub const fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Skip is only offered while the timer runs.
    #[must_use]
    pub const fn can_skip(&self) -> bool {
        self.is_running
    }
}

/// Apply one event to `state`, returning the next state.
///
/// Pure: no I/O, and the input state is left untouched.
#[must_use]
pub fn reduce(state: &SessionState, event: &TimerEvent, ctx: ReduceContext<'_>) -> Reduced {
    let mut next = state.clone();

    let outcome = match event {
        TimerEvent::CommandIssued(_) => Outcome::Ignored,
        TimerEvent::SnapshotReceived(snapshot) => {
            if let Some(stale) = stale_check(state, snapshot, ctx.reject_stale) {
                return Reduced {
                    state: next,
                    outcome: stale,
                };
            }
            apply_snapshot(&mut next, snapshot);
            Outcome::Applied
        }
        TimerEvent::StoppedReceived => {
            next.is_running = false;
            recompute_time_left(&mut next, ctx.settings);
            Outcome::Applied
        }
        TimerEvent::PresetChanged(preset) => {
            next.preset_type = *preset;
            recompute_time_left(&mut next, ctx.settings);
            Outcome::Applied
        }
        TimerEvent::ChannelRebound => {
            next.last_seq = None;
            Outcome::Applied
        }
    };

    Reduced {
        state: next,
        outcome,
    }
}

fn stale_check(state: &SessionState, snapshot: &Snapshot, reject_stale: bool) -> Option<Outcome> {
    if !reject_stale {
        return None;
    }
    match (snapshot.seq, state.last_seq) {
        (Some(incoming), Some(applied)) if incoming <= applied => {
            Some(Outcome::Stale { incoming, applied })
        }
        _ => None,
    }
}

fn apply_snapshot(state: &mut SessionState, snapshot: &Snapshot) {
    state.time_left_secs = snapshot.remaining_secs;
    state.session_type = snapshot.session_type;
    state.is_running = !snapshot.is_paused;
    if let Some(round) = snapshot.round_number {
        state.round_number = round.clamp(MIN_ROUND, MAX_ROUND);
    }
    if let Some(task) = &snapshot.active_task {
        state.active_task = Some(task.clone());
    }
    if snapshot.seq.is_some() {
        state.last_seq = snapshot.seq;
    }
}

fn recompute_time_left(state: &mut SessionState, settings: Option<&Settings>) {
    if let Some(secs) = resolve(settings, state.preset_type, state.session_type) {
        state.time_left_secs = secs;
    }
}
