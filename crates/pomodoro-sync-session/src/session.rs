//! Timer session: the attach/detach unit tying state, channel and commands together.

use std::sync::Arc;

use pomodoro_sync_core::{
    Channel, Command, Outcome, PresetType, ReduceContext, Reduced, SessionState, Settings,
    Subscription, TaskContext, TaskRef, TimerEvent, reduce,
};
use pomodoro_sync_transport::decode;
use tokio::sync::{mpsc, watch};

use crate::{CommandDispatcher, DispatchError, SyncConfig, SyncRequester};

/// User intent delivered to `TimerSession::run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start,
    Pause,
    Resume,
    Stop,
    SkipToNext,
    SelectPreset(PresetType),
    SelectTask(Option<TaskRef>),
    UpdateSettings(Option<Settings>),
    Detach,
}

/// Output of `TimerSession::run`.
#[derive(Debug)]
pub enum SessionUpdate {
    /// The mirrored state after an applied event.
    State(SessionState),
    /// A command was refused before anything was sent.
    Refused(DispatchError),
}

/// Local mirror of one remote timer, attached to a task context.
///
/// Attaching subscribes to the channel and starts periodic resync; detaching
/// (or dropping) cancels both. All state changes go through `reduce`.
pub struct TimerSession<C>
where
    C: Channel + ?Sized + 'static,
{
    channel: Arc<C>,
    config: SyncConfig,
    context: TaskContext,
    state: SessionState,
    dispatcher: CommandDispatcher<C>,
    preset_tx: watch::Sender<PresetType>,
    subscription: Option<Subscription>,
    sync: Option<SyncRequester>,
}

impl<C> TimerSession<C>
where
    C: Channel + ?Sized + 'static,
{
    /// Attach to `context` over `channel`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn attach(channel: Arc<C>, context: TaskContext, config: SyncConfig) -> Self {
        let state = SessionState::new(&context);
        let (preset_tx, _) = watch::channel(state.preset_type());
        let dispatcher = CommandDispatcher::new(Arc::clone(&channel), config.skip_mode);

        let mut session = Self {
            channel,
            config,
            context,
            state,
            dispatcher,
            preset_tx,
            subscription: None,
            sync: None,
        };
        session.bind();
        session
    }

    /// Current mirrored state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current task context.
    #[must_use]
    pub const fn context(&self) -> &TaskContext {
        &self.context
    }

    /// Channel the session is bound to.
    #[must_use]
    pub const fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// Swap the channel. The old subscription and resync task are torn down
    /// before the new ones are created, and the snapshot sequence baseline
    /// starts over.
    pub fn rebind(&mut self, channel: Arc<C>) {
        self.unbind();
        self.apply(TimerEvent::ChannelRebound);
        self.dispatcher = CommandDispatcher::new(Arc::clone(&channel), self.config.skip_mode);
        self.channel = channel;
        self.bind();
    }

    /// Detach: unsubscribe and stop resync.
    pub fn detach(mut self) {
        self.unbind();
    }

    /// Replace the selected task. The displayed task follows snapshots only.
    pub fn set_current_task(&mut self, task: Option<TaskRef>) {
        self.context.task = task;
    }

    /// Replace the duration settings used for local recomputation.
    pub fn set_settings(&mut self, settings: Option<Settings>) {
        self.context.settings = settings;
    }

    /// Select a preset. Remaining time is recomputed locally right away and
    /// the next `sync_request` reports the new preset.
    pub fn select_preset(&mut self, preset: PresetType) -> &SessionState {
        self.apply(TimerEvent::PresetChanged(preset));
        self.preset_tx.send_replace(preset);
        &self.state
    }

    /// Decode and apply one inbound frame.
    ///
    /// Malformed frames are logged and discarded. Returns whether the state
    /// was updated.
    pub fn handle_frame(&mut self, frame: &str) -> bool {
        match decode(frame) {
            Ok(msg) => self.apply(msg.into_event()) == Outcome::Applied,
            Err(e) => {
                tracing::warn!("Discarding inbound frame: {e}");
                false
            }
        }
    }

    /// Wait for the next inbound frame that updates the state.
    ///
    /// Returns `None` once the channel stops delivering frames.
    pub async fn next_update(&mut self) -> Option<&SessionState> {
        loop {
            let frame = self.subscription.as_mut()?.recv().await?;
            if self.handle_frame(&frame) {
                return Some(&self.state);
            }
        }
    }

    /// # Errors
    /// Returns `ConnectionUnavailable` or `NoTaskSelected`; nothing is sent.
    pub fn start(&mut self) -> Result<(), DispatchError> {
        let sent = self.dispatcher.start(
            self.context.task.as_ref(),
            self.state.session_type(),
            self.state.time_left_secs(),
            self.state.preset_type(),
        );
        self.record(sent)
    }

    /// # Errors
    /// Returns `ConnectionUnavailable` if the channel is closed.
    pub fn pause(&mut self) -> Result<(), DispatchError> {
        let sent = self.dispatcher.pause();
        self.record(sent)
    }

    /// # Errors
    /// Returns `ConnectionUnavailable` if the channel is closed.
    pub fn resume(&mut self) -> Result<(), DispatchError> {
        let sent = self.dispatcher.resume();
        self.record(sent)
    }

    /// # Errors
    /// Returns `ConnectionUnavailable` if the channel is closed.
    pub fn stop(&mut self) -> Result<(), DispatchError> {
        let sent = self.dispatcher.stop();
        self.record(sent)
    }

    /// Skip to the next session; a no-op unless the timer is running.
    ///
    /// # Errors
    /// Returns `ConnectionUnavailable` if running and the channel is closed.
    pub fn skip_to_next(&mut self) -> Result<(), DispatchError> {
        let sent = self.dispatcher.skip_to_next(self.state.is_running());
        self.record(sent)
    }

    /// Drive the session from inbound frames and user intents until
    /// `Intent::Detach` arrives, the intent sender is dropped, or the update
    /// receiver is dropped.
    pub async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        updates: mpsc::Sender<SessionUpdate>,
    ) {
        loop {
            tokio::select! {
                frame = next_frame(&mut self.subscription) => {
                    let Some(frame) = frame else {
                        tracing::debug!("Inbound stream closed");
                        self.subscription = None;
                        continue;
                    };
                    if self.handle_frame(&frame)
                        && updates.send(SessionUpdate::State(self.state.clone())).await.is_err()
                    {
                        tracing::debug!("Update receiver dropped, detaching");
                        break;
                    }
                }
                intent = intents.recv() => {
                    match intent {
                        None | Some(Intent::Detach) => break,
                        Some(intent) => {
                            let Some(update) = self.handle_intent(intent) else {
                                continue;
                            };
                            if updates.send(update).await.is_err() {
                                tracing::debug!("Update receiver dropped, detaching");
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.detach();
    }

    fn handle_intent(&mut self, intent: Intent) -> Option<SessionUpdate> {
        let result = match intent {
            Intent::Start => self.start(),
            Intent::Pause => self.pause(),
            Intent::Resume => self.resume(),
            Intent::Stop => self.stop(),
            Intent::SkipToNext => self.skip_to_next(),
            Intent::SelectPreset(preset) => {
                return Some(SessionUpdate::State(self.select_preset(preset).clone()));
            }
            Intent::SelectTask(task) => {
                self.set_current_task(task);
                return None;
            }
            Intent::UpdateSettings(settings) => {
                self.set_settings(settings);
                return None;
            }
            Intent::Detach => return None,
        };
        result.err().map(SessionUpdate::Refused)
    }

    fn record(&mut self, sent: Result<Vec<Command>, DispatchError>) -> Result<(), DispatchError> {
        match sent {
            Ok(commands) => {
                for command in commands {
                    self.apply(TimerEvent::CommandIssued(command));
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Command refused: {e}");
                Err(e)
            }
        }
    }

    fn apply(&mut self, event: TimerEvent) -> Outcome {
        let Reduced { state, outcome } = reduce(
            &self.state,
            &event,
            ReduceContext {
                settings: self.context.settings.as_ref(),
                reject_stale: self.config.reject_stale_snapshots,
            },
        );

        match outcome {
            Outcome::Applied => tracing::debug!(
                time_left = state.time_left_secs(),
                running = state.is_running(),
                session_type = %state.session_type(),
                round = state.round_number(),
                preset = %state.preset_type(),
                "Applied {event:?}"
            ),
            Outcome::Ignored => tracing::trace!("Recorded {event:?}"),
            Outcome::Stale { incoming, applied } => {
                tracing::warn!(incoming, applied, "Discarding stale snapshot");
            }
        }

        self.state = state;
        outcome
    }

    fn bind(&mut self) {
        self.subscription = Some(self.channel.subscribe());
        self.sync = Some(SyncRequester::spawn(
            self.dispatcher.clone(),
            self.channel.connection(),
            self.preset_tx.subscribe(),
            self.config.sync_interval(),
        ));
        tracing::debug!("Timer session bound to channel");
    }

    fn unbind(&mut self) {
        if let Some(sync) = self.sync.take() {
            sync.cancel();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            tracing::debug!("Timer session unbound from channel");
        }
    }
}

impl<C> Drop for TimerSession<C>
where
    C: Channel + ?Sized + 'static,
{
    fn drop(&mut self) {
        self.unbind();
    }
}

async fn next_frame(subscription: &mut Option<Subscription>) -> Option<String> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pomodoro_sync_core::{PresetDurations, SessionType};
    use pomodoro_sync_transport::{BridgeChannel, ClientMessage, RemoteEnd};

    use super::*;

    fn settings() -> Settings {
        Settings::new(
            PresetDurations {
                work_duration: 25,
                short_break: 5,
                long_break: 15,
            },
            PresetDurations {
                work_duration: 50,
                short_break: 10,
                long_break: 30,
            },
        )
    }

    fn attach(context: TaskContext) -> (TimerSession<BridgeChannel>, RemoteEnd) {
        let (channel, remote) = BridgeChannel::new();
        remote.connect();
        let session = TimerSession::attach(Arc::new(channel), context, SyncConfig::default());
        (session, remote)
    }

    #[tokio::test]
    async fn test_malformed_frame_is_discarded() {
        let (mut session, _remote) = attach(TaskContext::new());
        let before = session.state().clone();

        assert!(!session.handle_frame("{\"type\":\"timer_sync\""));
        assert!(!session.handle_frame("{\"type\":\"explode\"}"));
        assert_eq!(session.state(), &before);

        assert!(session.handle_frame(
            r#"{"type":"timer_sync","data":{"task_id":1,"session_type":"work","remaining_time":61,"is_paused":false}}"#
        ));
        assert_eq!(session.state().time_left_secs(), 61);
    }

    #[tokio::test]
    async fn test_commands_do_not_touch_state() {
        let task = TaskRef::new(2_i64, "Deep work");
        let (mut session, mut remote) = attach(TaskContext::new().with_task(task));
        let before = session.state().clone();

        session.start().unwrap();
        session.pause().unwrap();
        session.stop().unwrap();

        assert_eq!(session.state(), &before);
        assert_eq!(remote.drain().len(), 3);
    }

    #[tokio::test]
    async fn test_preset_change_without_round_trip() {
        let (mut session, mut remote) =
            attach(TaskContext::new().with_settings(settings()));

        let state = session.select_preset(PresetType::Long);
        assert_eq!(state.time_left_secs(), 3000);
        assert_eq!(state.session_type(), SessionType::Work);
        assert!(remote.drain().is_empty());
    }

    #[tokio::test]
    async fn test_detach_unsubscribes() {
        let (channel, remote) = BridgeChannel::new();
        let channel = Arc::new(channel);
        let session =
            TimerSession::attach(Arc::clone(&channel), TaskContext::new(), SyncConfig::default());
        assert_eq!(channel.subscriber_count(), 1);

        session.detach();
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(remote.push_raw("{\"type\":\"timer_stopped\"}"), 0);
    }

    #[tokio::test]
    async fn test_rebind_moves_subscription() {
        let (first, _first_remote) = BridgeChannel::new();
        let (second, mut second_remote) = BridgeChannel::new();
        let first = Arc::new(first);
        let second = Arc::new(second);

        let mut session =
            TimerSession::attach(Arc::clone(&first), TaskContext::new(), SyncConfig::default());
        session.rebind(Arc::clone(&second));

        assert_eq!(first.subscriber_count(), 0);
        assert_eq!(second.subscriber_count(), 1);

        second_remote.connect();
        session.resume().unwrap();
        assert_eq!(second_remote.drain(), vec![ClientMessage::Resume]);
    }

    #[tokio::test]
    async fn test_run_reports_refusals_and_updates() {
        let (session, remote) = attach(TaskContext::new().with_settings(settings()));
        let (intent_tx, intent_rx) = mpsc::channel(8);
        let (update_tx, mut update_rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(intent_rx, update_tx));

        intent_tx.send(Intent::Start).await.unwrap();
        assert!(matches!(
            update_rx.recv().await,
            Some(SessionUpdate::Refused(DispatchError::NoTaskSelected))
        ));

        remote
            .push_raw(r#"{"type":"timer_sync","data":{"session_type":"long_break","remaining_time":840,"is_paused":false,"round_number":4}}"#);
        let Some(SessionUpdate::State(state)) = update_rx.recv().await else {
            panic!("expected state update");
        };
        assert_eq!(state.session_type(), SessionType::LongBreak);
        assert_eq!(state.round_number(), 4);
        assert!(state.is_running());

        intent_tx.send(Intent::Detach).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_next_update_waits_for_valid_frame() {
        let (mut session, remote) = attach(TaskContext::new());

        let mut update = tokio_test::task::spawn(session.next_update());
        tokio_test::assert_pending!(update.poll());

        remote.push_raw("not json");
        assert!(update.is_woken());
        tokio_test::assert_pending!(update.poll());

        remote.push_raw(
            r#"{"type":"timer_sync","data":{"session_type":"work","remaining_time":42,"is_paused":false}}"#,
        );
        let state = tokio_test::assert_ready!(update.poll()).unwrap();
        assert_eq!(state.time_left_secs(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_detaches_when_update_receiver_is_dropped() {
        let (channel, mut remote) = BridgeChannel::new();
        let channel = Arc::new(channel);
        remote.connect();
        let session =
            TimerSession::attach(Arc::clone(&channel), TaskContext::new(), SyncConfig::default());
        let (_intent_tx, intent_rx) = mpsc::channel(8);
        let (update_tx, update_rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(intent_rx, update_tx));
        drop(update_rx);

        remote.push_raw(r#"{"type":"timer_stopped"}"#);
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("run loop should exit")
            .unwrap();
        assert_eq!(channel.subscriber_count(), 0);

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert!(remote.drain().is_empty());
    }
}
