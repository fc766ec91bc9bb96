//! Timer session orchestration for pomodoro clients.
//!
//! Provides:
//! - `TimerSession` - Attach to a task context, reconcile inbound snapshots, issue commands
//! - `CommandDispatcher` - Turn user intents into outbound frames
//! - `SyncRequester` - Periodic `sync_request` while connected
//! - `SyncConfig` - Cadence, skip behaviour and stale snapshot policy

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod sync;

pub use config::{SkipMode, SyncConfig};
pub use dispatcher::CommandDispatcher;
pub use error::DispatchError;
pub use session::{Intent, SessionUpdate, TimerSession};
pub use sync::SyncRequester;
