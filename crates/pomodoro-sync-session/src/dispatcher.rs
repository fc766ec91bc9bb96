//! Command dispatcher.
//!
//! Turns user intents into outbound frames. It never touches `SessionState`:
//! a command only takes effect once a snapshot confirms it.

use std::sync::Arc;

use pomodoro_sync_core::{Channel, Command, PresetType, SessionType, TaskRef};
use pomodoro_sync_transport::{ClientMessage, encode};

use crate::{DispatchError, SkipMode};

/// Sends commands over a channel.
pub struct CommandDispatcher<C: ?Sized> {
    channel: Arc<C>,
    skip_mode: SkipMode,
}

impl<C: ?Sized> Clone for CommandDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            skip_mode: self.skip_mode,
        }
    }
}

impl<C: Channel + ?Sized> CommandDispatcher<C> {
    /// Create a dispatcher for `channel`.
    #[must_use]
    pub const fn new(channel: Arc<C>, skip_mode: SkipMode) -> Self {
        Self { channel, skip_mode }
    }

    /// Ask the coordinator to start `task`.
    ///
    /// Returns the commands that were sent.
    ///
    /// # Errors
    /// Returns `ConnectionUnavailable` if the channel is closed, then
    /// `NoTaskSelected` if there is no task. Nothing is sent in either case.
    pub fn start(
        &self,
        task: Option<&TaskRef>,
        session_type: SessionType,
        time_left_secs: u64,
        preset_type: PresetType,
    ) -> Result<Vec<Command>, DispatchError> {
        self.ensure_connected()?;
        let task = task.ok_or(DispatchError::NoTaskSelected)?;

        let command = Command::Start {
            task_id: task.id.clone(),
            session_type,
            duration_secs: time_left_secs,
            preset_type,
        };
        Ok(vec![self.transmit(command)?])
    }

    /// # Errors
    /// Returns `ConnectionUnavailable` if the channel is closed.
    pub fn pause(&self) -> Result<Vec<Command>, DispatchError> {
        self.simple(Command::Pause)
    }

    /// # Errors
    /// Returns `ConnectionUnavailable` if the channel is closed.
    pub fn resume(&self) -> Result<Vec<Command>, DispatchError> {
        self.simple(Command::Resume)
    }

    /// # Errors
    /// Returns `ConnectionUnavailable` if the channel is closed.
    pub fn stop(&self) -> Result<Vec<Command>, DispatchError> {
        self.simple(Command::Stop)
    }

    /// Skip to the next session.
    ///
    /// A no-op when the timer is not running, regardless of connection state.
    /// The wire form depends on `SkipMode`.
    ///
    /// # Errors
    /// Returns `ConnectionUnavailable` if running and the channel is closed.
    /// With `StopThenSkip`, a failure on the second frame is reported after
    /// `stop` has already gone out.
    pub fn skip_to_next(&self, is_running: bool) -> Result<Vec<Command>, DispatchError> {
        if !is_running {
            tracing::debug!("Skip ignored: timer not running");
            return Ok(Vec::new());
        }
        self.ensure_connected()?;

        match self.skip_mode {
            SkipMode::Atomic => Ok(vec![self.transmit(Command::SkipToNext)?]),
            SkipMode::StopThenSkip => {
                let stop = self.transmit(Command::Stop)?;
                let skip = self.transmit(Command::SkipToNext)?;
                Ok(vec![stop, skip])
            }
        }
    }

    /// Ask for a fresh snapshot, reporting the selected preset.
    ///
    /// # Errors
    /// Returns `ConnectionUnavailable` if the channel is closed.
    pub fn request_sync(&self, preset_type: PresetType) -> Result<Vec<Command>, DispatchError> {
        self.simple(Command::SyncRequest { preset_type })
    }

    fn simple(&self, command: Command) -> Result<Vec<Command>, DispatchError> {
        self.ensure_connected()?;
        Ok(vec![self.transmit(command)?])
    }

    fn ensure_connected(&self) -> Result<(), DispatchError> {
        if self.channel.is_connected() {
            Ok(())
        } else {
            Err(DispatchError::ConnectionUnavailable)
        }
    }

    fn transmit(&self, command: Command) -> Result<Command, DispatchError> {
        let frame = encode(&ClientMessage::from(command.clone()))?;
        if let Err(e) = self.channel.send(frame) {
            tracing::error!("Failed to send {}: {e}", command.name());
            return Err(e.into());
        }
        tracing::trace!(command = command.name(), "Sent command");
        Ok(command)
    }
}
