//! Display values derived from the mirrored state.
//!
//! Renderers call these; nothing here draws anything.

use crate::{SessionState, SessionType, TaskRef, state::MAX_ROUND};

/// A control the renderer may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Pause,
    Resume,
    Stop,
    Skip,
}

/// Format seconds as `MM:SS`. Minutes are not folded into hours.
#[must_use]
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Heading for the current session.
#[must_use]
pub fn session_label(session_type: SessionType, active_task: Option<&TaskRef>) -> String {
    match (session_type, active_task) {
        (SessionType::Work, Some(task)) => format!("Work Session - {}", task.title),
        (SessionType::Work, None) => "Work Session".to_string(),
        (SessionType::ShortBreak, _) => "Short Break".to_string(),
        (SessionType::LongBreak, _) => "Long Break".to_string(),
    }
}

/// `Round n/4`.
#[must_use]
pub fn round_label(round: u8) -> String {
    format!("Round {round}/{MAX_ROUND}")
}

impl SessionState {
    /// Primary controls: start or pause/resume, plus stop.
    ///
    /// Skip is offered separately, gated by `can_skip`.
    #[must_use]
    pub fn primary_controls(&self) -> Vec<Control> {
        if self.can_skip() {
            vec![Control::Pause, Control::Resume, Control::Stop]
        } else {
            vec![Control::Start, Control::Stop]
        }
    }


    /// Clock text for the remaining time.
    #[must_use]
    pub fn clock(&self) -> String {
        format_clock(self.time_left_secs())
    }

    /// Heading text for the current session.
    #[must_use]
    pub fn label(&self) -> String {
        session_label(self.session_type(), self.active_task())
    }
}
