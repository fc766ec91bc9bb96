//! Domain vocabulary shared by every layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of session the timer is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// Focused work.
    #[default]
    Work,
    /// Break between work sessions.
    ShortBreak,
    /// Break after the last round.
    LongBreak,
}

impl SessionType {
    /// Wire name of the session type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::ShortBreak => "short_break",
            Self::LongBreak => "long_break",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which duration table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetType {
    #[default]
    Short,
    Long,
}

impl PresetType {
    /// Wire name of the preset.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for PresetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task identifier as issued by the task collaborator.
///
/// Accepted as either a JSON number or a string and echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A task as supplied by the task collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: TaskId,
    pub title: String,
}

impl TaskRef {
    /// Create a task reference.
    #[must_use]
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Durations, in minutes, for one preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetDurations {
    pub work_duration: u32,
    pub short_break: u32,
    pub long_break: u32,
}

impl PresetDurations {
    /// Minutes configured for `session_type`.
    #[must_use]
    pub const fn minutes_for(&self, session_type: SessionType) -> u32 {
        match session_type {
            SessionType::Work => self.work_duration,
            SessionType::ShortBreak => self.short_break,
            SessionType::LongBreak => self.long_break,
        }
    }
}

/// Duration tables keyed by preset, as supplied by the settings collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<PresetDurations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<PresetDurations>,
}

impl Settings {
    /// Settings with both presets populated.
    #[must_use]
    pub const fn new(short: PresetDurations, long: PresetDurations) -> Self {
        Self {
            short: Some(short),
            long: Some(long),
        }
    }

    /// Parse settings from the collaborator's JSON shape.
    ///
    /// # Errors
    /// Returns error if the JSON does not match the settings shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Durations table for `preset`, if configured.
    #[must_use]
    pub const fn preset(&self, preset: PresetType) -> Option<&PresetDurations> {
        match preset {
            PresetType::Short => self.short.as_ref(),
            PresetType::Long => self.long.as_ref(),
        }
    }
}
