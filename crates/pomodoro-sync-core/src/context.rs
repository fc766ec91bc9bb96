//! Task context a timer session attaches to.

use serde::{Deserialize, Serialize};

use crate::{Settings, TaskRef};

/// Collaborator inputs for one attached timer.
///
/// Carries the currently selected task and the duration settings. Either may
/// be absent: starting requires a task, duration resolution requires settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    /// Task selected by the user, sent as `task_id` on start.
    #[serde(default)]
    pub task: Option<TaskRef>,

    /// Duration tables from the settings collaborator.
    #[serde(default)]
    pub settings: Option<Settings>,
}

impl TaskContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the selected task.
    #[must_use]
    pub fn with_task(mut self, task: TaskRef) -> Self {
        self.task = Some(task);
        self
    }

    /// Set the duration settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }
}
