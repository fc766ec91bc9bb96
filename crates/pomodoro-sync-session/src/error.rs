//! Command dispatch errors.

use pomodoro_sync_core::ChannelError;
use pomodoro_sync_transport::ProtocolError;

/// Why a command was not sent.
///
/// All of these are surfaced to the user; none are retried.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Not connected to server")]
    ConnectionUnavailable,
    #[error("No task selected")]
    NoTaskSelected,
    #[error("Encode error: {0}")]
    Encode(#[from] ProtocolError),
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}
