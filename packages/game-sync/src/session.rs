//! One game session: a single task that owns every piece of mutable state.
//!
//! Transport events, consumer commands, timer ticks and completed network
//! calls are serialized through one `select!` loop, so the engine only ever
//! has one writer. Network calls run in a [`JoinSet`] owned by the loop and
//! are aborted with it on teardown.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::authority::{ActionRequest, Authority};
use crate::config::SyncConfig;
use crate::dispatch::{ActionDispatcher, Dispatched};
use crate::domain::{ActionId, GameAction, GameSnapshot, Roster};
use crate::error::{AuthorityError, SyncError};
use crate::presence::{PresenceStatus, PresenceTracker};
use crate::recovery::{Recovered, RecoveryManager, RecoveryStep, RecoveryTrigger};
use crate::sync::{SyncEngine, SyncPhase};
use crate::transport::{
    ChannelEvent, ConnectionState, ConnectionStatus, RealtimeTransport, TransportChannel,
};
use crate::turn_timeout::TurnTimeoutMonitor;

const COMMAND_BUFFER: usize = 32;
const NOTICE_BUFFER: usize = 64;

pub struct SessionParams {
    pub game_code: String,
    pub player_name: String,
    pub roster: Roster,
    pub config: SyncConfig,
}

/// Connection health as consumers see it.
#[derive(Debug, Clone, PartialEq)]
pub struct Connectivity {
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
    /// Reconnect attempts exhausted; only a manual reconnect helps.
    pub fatal: bool,
}

impl Connectivity {
    fn from_state(state: &ConnectionState) -> Self {
        Self {
            status: state.status,
            reconnect_attempts: state.reconnect_attempts,
            last_error: state.last_error.clone(),
            fatal: state.failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub phase: SyncPhase,
    pub pending: usize,
    pub in_doubt: bool,
    pub last_synced_at: Option<OffsetDateTime>,
    pub presence: BTreeMap<String, PresenceStatus>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            pending: 0,
            in_doubt: false,
            last_synced_at: None,
            presence: BTreeMap::new(),
        }
    }
}

/// Things worth telling the player about that are not state.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Connection lost, another attempt is scheduled.
    Reconnecting { attempt: u32, retry_in: Duration },
    Recovering { trigger: RecoveryTrigger },
    /// An action was dropped from the ledger.
    ActionFailed { action_id: ActionId, error: SyncError },
    SkipSubmitted { position: u8 },
    /// The session can no longer make progress on its own.
    Fatal(SyncError),
}

type Reply = oneshot::Sender<Result<ActionId, SyncError>>;

enum Command {
    Submit { action: GameAction, reply: Reply },
    Reconnect,
}

enum TaskOutcome {
    Dispatch {
        client_id: ActionId,
        result: Result<Dispatched, SyncError>,
        reply: Option<Reply>,
    },
    Fetch(Result<Recovered, AuthorityError>),
}

enum Wake {
    Shutdown,
    Command(Command),
    Channel(ChannelEvent),
    Task(Result<TaskOutcome, JoinError>),
    RecoveryDue,
    TurnCheck,
}

/// Consumer side of a running session.
///
/// Dropping the handle tears the session down; [`shutdown`](Self::shutdown)
/// does the same and waits for it to finish.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Option<GameSnapshot>>,
    view: watch::Receiver<SessionView>,
    connectivity: watch::Receiver<Connectivity>,
    notices: broadcast::Sender<Notice>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Displayed state: authoritative plus optimistic effects.
    pub fn current_snapshot(&self) -> Option<GameSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity.borrow().status == ConnectionStatus::Connected
    }

    pub fn has_pending_actions(&self) -> bool {
        self.view.borrow().pending > 0
    }

    pub fn last_synced_at(&self) -> Option<OffsetDateTime> {
        self.view.borrow().last_synced_at
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity.borrow().clone()
    }

    /// Apply `action` optimistically and wait for the authority's answer.
    pub async fn submit(&self, action: GameAction) -> Result<ActionId, SyncError> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::Submit { action, reply })
            .await
            .map_err(|_| SyncError::SessionClosed)?;
        answer.await.map_err(|_| SyncError::SessionClosed)?
    }

    /// Resubscribe immediately with a fresh attempt budget.
    pub async fn reconnect(&self) -> Result<(), SyncError> {
        self.commands
            .send(Command::Reconnect)
            .await
            .map_err(|_| SyncError::SessionClosed)
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<GameSnapshot>> {
        self.snapshot.clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn subscribe_connectivity(&self) -> watch::Receiver<Connectivity> {
        self.connectivity.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "Session task ended abnormally");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct GameSession<T> {
    game_code: String,
    channel: TransportChannel<T>,
    engine: SyncEngine,
    presence: PresenceTracker,
    turn_timeout: TurnTimeoutMonitor,
    dispatcher: ActionDispatcher,
    recovery: RecoveryManager,
    tasks: JoinSet<TaskOutcome>,
    fetch_in_flight: bool,
    recovery_at: Option<Instant>,
    turn_check: Interval,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    snapshot_tx: watch::Sender<Option<GameSnapshot>>,
    view_tx: watch::Sender<SessionView>,
    connectivity_tx: watch::Sender<Connectivity>,
    notices: broadcast::Sender<Notice>,
}

impl<T: RealtimeTransport + 'static> GameSession<T> {
    /// Spawn the session task. Must be called from within a tokio runtime.
    pub fn start(transport: T, authority: Arc<dyn Authority>, params: SessionParams) -> SessionHandle {
        let SessionParams {
            game_code,
            player_name,
            roster,
            config,
        } = params;
        let now = Instant::now();

        let channel = TransportChannel::new(transport, config.transport.clone(), player_name.clone());
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (view_tx, view_rx) = watch::channel(SessionView::default());
        let (connectivity_tx, connectivity_rx) =
            watch::channel(Connectivity::from_state(channel.state()));
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);
        let cancel = CancellationToken::new();

        let check_every = config.turn_timeout.check_interval;
        let mut turn_check = interval_at(now + check_every, check_every);
        turn_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let session = GameSession {
            game_code,
            channel,
            engine: SyncEngine::new(player_name.clone(), roster),
            presence: PresenceTracker::new(config.presence.clone(), now),
            turn_timeout: TurnTimeoutMonitor::new(
                config.turn_timeout.clone(),
                player_name,
            ),
            dispatcher: ActionDispatcher::new(authority.clone(), config.dispatch.clone()),
            recovery: RecoveryManager::new(authority, config.recovery.clone()),
            tasks: JoinSet::new(),
            fetch_in_flight: false,
            recovery_at: None,
            turn_check,
            commands,
            cancel: cancel.clone(),
            snapshot_tx,
            view_tx,
            connectivity_tx,
            notices: notices.clone(),
        };

        let task = tokio::spawn(session.run());

        SessionHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            view: view_rx,
            connectivity: connectivity_rx,
            notices,
            cancel,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        info!(game_code = %self.game_code, player = %self.engine.player_name(), "Session starting");
        self.engine.begin_sync();
        self.channel.connect(self.game_code.clone());
        self.spawn_fetch();
        self.publish();

        loop {
            let has_tasks = !self.tasks.is_empty();
            let recovery_at = self.recovery_at;
            let turn_checks = self.turn_timeout.config().enabled;

            let wake = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Wake::Shutdown,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => Wake::Shutdown,
                },
                Some(joined) = self.tasks.join_next(), if has_tasks => Wake::Task(joined),
                event = self.channel.next_event() => Wake::Channel(event),
                _ = sleep_until(recovery_at.unwrap_or_else(Instant::now)), if recovery_at.is_some() => Wake::RecoveryDue,
                _ = self.turn_check.tick(), if turn_checks => Wake::TurnCheck,
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Command(cmd) => self.on_command(cmd),
                Wake::Channel(event) => self.on_channel_event(event),
                Wake::Task(Ok(outcome)) => self.on_task(outcome),
                Wake::Task(Err(err)) => {
                    error!(error = %err, "Session task failed");
                    self.fetch_in_flight = false;
                }
                Wake::RecoveryDue => {
                    self.recovery_at = None;
                    self.spawn_fetch();
                }
                Wake::TurnCheck => self.check_turn(),
            }
            self.publish();
        }

        self.teardown().await;
    }

    async fn teardown(mut self) {
        self.recovery_at = None;
        self.tasks.shutdown().await;
        self.channel.disconnect().await;
        self.connectivity_tx
            .send_replace(Connectivity::from_state(self.channel.state()));
        info!(game_code = %self.game_code, "Session closed");
        drop(self.engine);
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Submit { action, reply } => self.submit(action, Some(reply)),
            Command::Reconnect => {
                info!("Manual reconnect requested");
                self.channel.reconnect();
            }
        }
    }

    fn submit(&mut self, action: GameAction, reply: Option<Reply>) {
        let entry = match self.engine.apply_local_optimistic(action) {
            Ok(entry) => entry,
            Err(err) => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(err));
                }
                return;
            }
        };

        let request = ActionRequest::from_pending(&self.game_code, &entry);
        let pending_count = self.engine.pending_len();
        let dispatcher = self.dispatcher.clone();
        let client_id = entry.action_id;
        debug!(action_id = %client_id, action_type = %request.action_type, "Dispatching action");

        self.tasks.spawn(async move {
            let result = dispatcher.dispatch(&request, pending_count).await;
            TaskOutcome::Dispatch {
                client_id,
                result,
                reply,
            }
        });
    }

    fn spawn_fetch(&mut self) {
        if self.fetch_in_flight {
            return;
        }
        self.fetch_in_flight = true;
        let recovery = self.recovery.clone();
        let game_code = self.game_code.clone();
        self.tasks
            .spawn(async move { TaskOutcome::Fetch(recovery.fetch(&game_code).await) });
    }

    fn begin_recovery(&mut self, trigger: RecoveryTrigger) -> bool {
        let started = self.recovery.start(&mut self.engine, trigger);
        if started {
            self.notify(Notice::Recovering { trigger });
        }
        started
    }

    fn start_recovery(&mut self, trigger: RecoveryTrigger) {
        if self.begin_recovery(trigger) {
            self.recovery_at = None;
            self.spawn_fetch();
        }
    }

    fn on_task(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Dispatch {
                client_id,
                result,
                reply,
            } => self.on_dispatched(client_id, result, reply),
            TaskOutcome::Fetch(result) => {
                self.fetch_in_flight = false;
                self.on_fetched(result);
            }
        }
    }

    fn on_dispatched(
        &mut self,
        client_id: ActionId,
        result: Result<Dispatched, SyncError>,
        reply: Option<Reply>,
    ) {
        let answer = match result {
            Ok(dispatched) => {
                self.engine
                    .confirm_dispatch(&client_id, &dispatched.receipt, dispatched.busy_retries);
                Ok(dispatched.receipt.action_id)
            }
            Err(err @ SyncError::Network { .. }) => {
                // the authority may still have it; recovery decides
                self.start_recovery(RecoveryTrigger::NetworkFailure);
                Err(err)
            }
            Err(err) => {
                self.engine.reject(&client_id);
                self.notify(Notice::ActionFailed {
                    action_id: client_id,
                    error: err.clone(),
                });
                if matches!(err, SyncError::Conflict { .. }) {
                    self.start_recovery(RecoveryTrigger::Conflict);
                }
                Err(err)
            }
        };

        if let Some(reply) = reply {
            let _ = reply.send(answer);
        }
    }

    fn on_fetched(&mut self, result: Result<Recovered, AuthorityError>) {
        match result {
            Ok(recovered) => {
                self.recovery_at = None;
                self.recovery.complete(&mut self.engine, recovered);
            }
            Err(err) => {
                if self.engine.phase() == SyncPhase::Syncing {
                    self.begin_recovery(RecoveryTrigger::InitialLoad);
                }
                if self.engine.phase() != SyncPhase::Recovering {
                    return;
                }
                match self.recovery.on_failure(&mut self.engine, &err) {
                    RecoveryStep::Retry { delay, .. } => {
                        self.recovery_at = Some(Instant::now() + delay);
                    }
                    RecoveryStep::Exhausted { attempts } => {
                        self.recovery_at = None;
                        self.notify(Notice::Fatal(SyncError::recovery_exhausted(attempts)));
                    }
                }
            }
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {}
            ChannelEvent::Disconnected {
                attempt, retry_in, ..
            } => {
                self.notify(Notice::Reconnecting { attempt, retry_in });
                if self.engine.authoritative().is_some() {
                    self.start_recovery(RecoveryTrigger::Disconnected);
                }
            }
            ChannelEvent::RemoteUpdate(snapshot) => {
                self.engine.apply_remote(snapshot);
            }
            ChannelEvent::Presence(event) => {
                self.presence.observe(&event, Instant::now());
            }
            ChannelEvent::ActionResult { action_id, error } => match error {
                None => {
                    self.engine.acknowledge(&action_id);
                }
                Some(detail) => {
                    if self.engine.reject(&action_id).is_some() {
                        self.notify(Notice::ActionFailed {
                            action_id,
                            error: SyncError::validation(detail),
                        });
                    }
                }
            },
            ChannelEvent::Failed(err) => {
                self.notify(Notice::Fatal(err));
            }
        }
    }

    fn check_turn(&mut self) {
        if self.engine.phase() != SyncPhase::Synced {
            return;
        }
        let Some(snapshot) = self.engine.authoritative() else {
            return;
        };
        let skip = self.turn_timeout.check(
            snapshot,
            self.engine.roster(),
            &self.presence,
            Instant::now(),
        );
        if let Some(action) = skip {
            if let GameAction::SkipTurn { position } = action {
                self.notify(Notice::SkipSubmitted { position });
            }
            self.submit(action, None);
        }
    }

    fn notify(&self, notice: Notice) {
        // no receivers is fine
        let _ = self.notices.send(notice);
    }

    fn publish(&mut self) {
        let displayed = self.engine.displayed().cloned();
        self.snapshot_tx.send_if_modified(|current| {
            if *current != displayed {
                *current = displayed;
                true
            } else {
                false
            }
        });

        let view = SessionView {
            phase: self.engine.phase(),
            pending: self.engine.pending_len(),
            in_doubt: self.engine.is_in_doubt(),
            last_synced_at: self.engine.last_synced_at(),
            presence: self.presence.statuses(Instant::now()),
        };
        self.view_tx.send_if_modified(|current| {
            if *current != view {
                *current = view;
                true
            } else {
                false
            }
        });

        let connectivity = Connectivity::from_state(self.channel.state());
        self.connectivity_tx.send_if_modified(|current| {
            if *current != connectivity {
                *current = connectivity;
                true
            } else {
                false
            }
        });
    }
}
