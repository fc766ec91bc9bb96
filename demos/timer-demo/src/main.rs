//! Timer sync demo against a simulated coordinator.
//!
//! Run with: cargo run -p timer-demo [config.json]
//!
//! The optional argument is a `SyncConfig` JSON file. Set `RUST_LOG=debug` to
//! see every reconciled event.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use pomodoro_sync_core::{
    PresetDurations, PresetType, SessionState, SessionType, Settings, TaskContext, TaskRef,
    display::{Control, round_label},
};
use pomodoro_sync_session::{Intent, SessionUpdate, SyncConfig, TimerSession};
use pomodoro_sync_transport::{BridgeChannel, ClientMessage, RemoteEnd, ServerMessage, TimerSyncData};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            SyncConfig::from_json(&json).context("parsing sync config")?
        }
        None => SyncConfig::default(),
    };
    tracing::info!(?config, "Starting timer demo");

    let settings = demo_settings();
    let task = TaskRef::new(1_i64, "Write release notes");
    let (channel, remote) = BridgeChannel::new();
    let coordinator =
        tokio::spawn(Coordinator::new(settings.clone(), vec![task.clone()]).run(remote));

    let context = TaskContext::new().with_settings(settings);
    let session = TimerSession::attach(Arc::new(channel), context, config);

    let (intent_tx, intent_rx) = mpsc::channel(16);
    let (update_tx, mut update_rx) = mpsc::channel(64);
    let session_task = tokio::spawn(session.run(intent_rx, update_tx));

    let printer = tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            match update {
                SessionUpdate::State(state) => render(&state),
                SessionUpdate::Refused(e) => tracing::warn!("{e}"),
            }
        }
    });

    let script = [
        (Intent::Start, 1),
        (Intent::SelectTask(Some(task)), 0),
        (Intent::Start, 3),
        (Intent::Pause, 2),
        (Intent::Resume, 2),
        (Intent::SkipToNext, 2),
        (Intent::SelectPreset(PresetType::Long), 2),
        (Intent::Stop, 2),
        (Intent::Detach, 0),
    ];
    for (intent, wait_secs) in script {
        tracing::info!(?intent, "User intent");
        intent_tx.send(intent).await.context("session stopped early")?;
        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
    }

    session_task.await.context("session task panicked")?;
    printer.await.context("printer task panicked")?;
    coordinator.abort();
    Ok(())
}

fn render(state: &SessionState) {
    let mut controls = state.primary_controls();
    if state.can_skip() {
        controls.push(Control::Skip);
    }
    tracing::info!(
        "{} | {} | {} | {} | {controls:?}",
        round_label(state.round_number()),
        state.clock(),
        state.label(),
        if state.is_running() { "running" } else { "paused" }
    );
}

fn demo_settings() -> Settings {
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

/// Minimal stand-in for the remote timer authority.
struct Coordinator {
    settings: Settings,
    preset: PresetType,
    session_type: SessionType,
    round: u8,
    remaining: u64,
    paused: bool,
    catalog: Vec<TaskRef>,
    task: Option<TaskRef>,
    seq: u64,
}

impl Coordinator {
    fn new(settings: Settings, catalog: Vec<TaskRef>) -> Self {
        Self {
            settings,
            preset: PresetType::Short,
            session_type: SessionType::Work,
            round: 1,
            remaining: 25 * 60,
            paused: true,
            catalog,
            task: None,
            seq: 0,
        }
    }

    async fn run(mut self, mut remote: RemoteEnd) {
        remote.connect();
        let mut clock = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = clock.tick() => {
                    if !self.paused {
                        self.remaining = self.remaining.saturating_sub(1);
                        if self.remaining == 0 {
                            self.advance();
                        }
                    }
                }
                msg = remote.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg, &remote);
                }
            }
        }
    }

    fn handle(&mut self, msg: ClientMessage, remote: &RemoteEnd) {
        match msg {
            ClientMessage::Start {
                task_id,
                session_type,
                duration,
                preset_type,
            } => {
                self.task = self.catalog.iter().find(|t| t.id == task_id).cloned();
                if self.task.is_none() {
                    tracing::warn!(%task_id, "Coordinator has no such task");
                }
                self.session_type = session_type;
                self.remaining = duration;
                self.preset = preset_type;
                self.paused = false;
            }
            ClientMessage::Pause => self.paused = true,
            ClientMessage::Resume => self.paused = false,
            ClientMessage::Stop => {
                self.paused = true;
                self.remaining = self.duration();
                if let Err(e) = remote.push(&ServerMessage::TimerStopped) {
                    tracing::error!("Coordinator failed to push: {e}");
                }
                return;
            }
            ClientMessage::SkipToNext => {
                self.advance();
                self.paused = true;
            }
            ClientMessage::SyncRequest { preset_type } => self.preset = preset_type,
        }
        self.push_sync(remote);
    }

    fn advance(&mut self) {
        self.session_type = match self.session_type {
            SessionType::Work if self.round >= 4 => SessionType::LongBreak,
            SessionType::Work => SessionType::ShortBreak,
            SessionType::ShortBreak => {
                self.round += 1;
                SessionType::Work
            }
            SessionType::LongBreak => {
                self.round = 1;
                SessionType::Work
            }
        };
        self.remaining = self.duration();
    }

    fn duration(&self) -> u64 {
        pomodoro_sync_core::resolve(Some(&self.settings), self.preset, self.session_type)
            .unwrap_or(25 * 60)
    }

    fn push_sync(&mut self, remote: &RemoteEnd) {
        self.seq += 1;
        let data = TimerSyncData {
            task_id: self.task.as_ref().map(|t| t.id.clone()),
            session_type: self.session_type,
            remaining_time: self.remaining,
            is_paused: self.paused,
            round_number: Some(self.round),
            active_task: self.task.clone(),
            seq: Some(self.seq),
        };
        if let Err(e) = remote.push(&ServerMessage::TimerSync { data }) {
            tracing::error!("Coordinator failed to push: {e}");
        }
    }
}
