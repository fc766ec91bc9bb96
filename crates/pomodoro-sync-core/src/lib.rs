//! Core abstractions for mirroring a remotely owned pomodoro timer.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionState` - Local mirror of the authoritative timer, mutated only by `reduce`
//! - `resolve` - Canonical duration for a (preset, session type) pair
//! - `TaskContext` - The task and settings a client attaches to
//! - `Channel` trait and `Subscription` handle for the message transport
//! - Display helpers consumed by renderers

pub mod context;
pub mod display;
pub mod duration;
pub mod state;
pub mod traits;
pub mod types;

pub use context::TaskContext;
pub use duration::resolve;
pub use state::{
    Command, Outcome, ReduceContext, Reduced, SessionState, Snapshot, TimerEvent, reduce,
};
pub use traits::{Channel, ChannelError, Subscription};
pub use types::{PresetDurations, PresetType, SessionType, Settings, TaskId, TaskRef};
