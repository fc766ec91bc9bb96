//! Transport layer for pomodoro timer sync.
//!
//! Provides:
//! - Wire protocol (tagged JSON envelopes) with validation on decode
//! - In-process bridge channel (feature: bridge)

pub mod protocol;

#[cfg(feature = "bridge")]
pub mod bridge;

#[cfg(feature = "bridge")]
pub use bridge::{BridgeChannel, RemoteEnd};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage, TimerSyncData, decode, encode};
