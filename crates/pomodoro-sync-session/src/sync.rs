//! Periodic resynchronization.

use std::time::Duration;

use pomodoro_sync_core::{Channel, PresetType};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

use crate::CommandDispatcher;

/// Background task sending `sync_request` on a fixed cadence while connected.
///
/// The first request goes out one period after the channel reports connected.
/// Ticking stops on disconnect and restarts on reconnect. Dropping the handle
/// cancels the task.
pub struct SyncRequester {
    handle: JoinHandle<()>,
}

impl SyncRequester {
    /// Spawn the requester on the current runtime.
    #[must_use]
    pub fn spawn<C>(
        dispatcher: CommandDispatcher<C>,
        connection: watch::Receiver<bool>,
        preset: watch::Receiver<PresetType>,
        period: Duration,
    ) -> Self
    where
        C: Channel + ?Sized + 'static,
    {
        let handle = tokio::spawn(run(dispatcher, connection, preset, period));
        Self { handle }
    }

    /// Stop the task. No request is sent after this returns.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for SyncRequester {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run<C>(
    dispatcher: CommandDispatcher<C>,
    mut connection: watch::Receiver<bool>,
    preset: watch::Receiver<PresetType>,
    period: Duration,
) where
    C: Channel + ?Sized,
{
    loop {
        while !*connection.borrow_and_update() {
            if connection.changed().await.is_err() {
                return;
            }
        }

        tracing::debug!(?period, "Channel connected, starting resync");
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let preset_type = *preset.borrow();
                    if let Err(e) = dispatcher.request_sync(preset_type) {
                        tracing::warn!("Sync request not sent: {e}");
                    }
                }
                changed = connection.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*connection.borrow_and_update() {
                        tracing::debug!("Channel disconnected, pausing resync");
                        break;
                    }
                }
            }
        }
    }
}
