//! Client driver: one worker thread owning one session.
//!
//! The worker multiplexes local commands and remote envelopes with
//! `crossbeam_channel::select!`, ticking at the configured poll interval so the
//! remote-choice timeout fires even when nothing arrives. Everything the
//! session reports is forwarded as [`ClientUpdate`]s. Updates never block the
//! worker: when the consumer falls behind they are dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, never, select, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::engine::SimulationEngine;
use crate::error::{SyncError, SyncResult};
use crate::event::BattleEvent;
use crate::lobby::Role;
use crate::transport::{BroadcastChannel, Envelope};

use super::{SyncNotice, SyncPhase, SyncSession};

/// Requests sent to a client worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Submit a local choice.
    Submit(String),
    /// Republish the outbox.
    RetryUnsent,
    /// Stop the worker.
    Shutdown,
}

/// What a client worker reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientUpdate {
    /// Newly translated battle events, in order.
    Events(Vec<BattleEvent>),
    /// A session notice.
    Notice(SyncNotice),
    /// The session moved to a new phase.
    Phase(SyncPhase),
    /// The engine is waiting on the local player for a new decision.
    ChoiceRequested {
        /// Engine turn at the decision point.
        turn: u32,
    },
    /// A call failed. Fatal errors leave the session `Desynced`.
    Error(SyncError),
}

/// Handle on a running client worker.
#[derive(Debug)]
pub struct ClientHandle<E, C> {
    commands: Sender<ClientCommand>,
    updates: Receiver<ClientUpdate>,
    dropped_updates: Arc<AtomicU64>,
    join: Option<JoinHandle<SyncSession<E, C>>>,
}

/// Starts a worker thread that owns `session` and consumes `remote`.
///
/// # Panics
///
/// Panics if the OS refuses to spawn the thread.
pub fn spawn_client<E, C>(name: &str, session: SyncSession<E, C>, remote: Receiver<Envelope>) -> ClientHandle<E, C>
where
    E: SimulationEngine + Send + 'static,
    C: BroadcastChannel + 'static,
{
    let capacity = session.config().channel_capacity.max(1);
    let (command_tx, command_rx) = bounded::<ClientCommand>(capacity);
    let (update_tx, update_rx) = bounded::<ClientUpdate>(capacity);
    let dropped_updates = Arc::new(AtomicU64::new(0));

    let worker = Worker {
        session,
        updates: update_tx,
        dropped: Arc::clone(&dropped_updates),
        last_phase: None,
        requested_at: None,
    };
    let join = thread::Builder::new()
        .name(format!("everymon-{name}"))
        .spawn(move || worker.run(command_rx, remote))
        .expect("failed to spawn everymon client worker");

    ClientHandle {
        commands: command_tx,
        updates: update_rx,
        dropped_updates,
        join: Some(join),
    }
}

impl<E, C> ClientHandle<E, C> {
    /// Queues a local choice.
    ///
    /// # Errors
    ///
    /// Internal error if the worker is gone.
    pub fn submit(&self, choice: impl Into<String>) -> SyncResult<()> {
        self.command(ClientCommand::Submit(choice.into()))
    }

    /// Asks the worker to republish its outbox.
    ///
    /// # Errors
    ///
    /// Internal error if the worker is gone.
    pub fn retry_unsent(&self) -> SyncResult<()> {
        self.command(ClientCommand::RetryUnsent)
    }

    /// Update stream.
    #[must_use]
    pub const fn updates(&self) -> &Receiver<ClientUpdate> {
        &self.updates
    }

    /// Updates dropped because the stream was full.
    #[must_use]
    pub fn dropped_updates(&self) -> u64 {
        self.dropped_updates.load(Ordering::Relaxed)
    }

    /// Stops the worker and hands the session back.
    #[must_use]
    pub fn shutdown(mut self) -> Option<SyncSession<E, C>> {
        let _ = self.commands.send(ClientCommand::Shutdown);
        self.join.take().and_then(|join| join.join().ok())
    }

    fn command(&self, cmd: ClientCommand) -> SyncResult<()> {
        self.commands
            .send(cmd)
            .map_err(|_| SyncError::internal("client worker has stopped"))
    }
}

impl<E, C> Drop for ClientHandle<E, C> {
    fn drop(&mut self) {
        // Detach; the worker exits once it sees the command channel close.
        let _ = self.commands.try_send(ClientCommand::Shutdown);
    }
}

struct Worker<E, C> {
    session: SyncSession<E, C>,
    updates: Sender<ClientUpdate>,
    dropped: Arc<AtomicU64>,
    last_phase: Option<SyncPhase>,
    /// Log length at the last announced decision point.
    requested_at: Option<usize>,
}

impl<E: SimulationEngine, C: BroadcastChannel> Worker<E, C> {
    fn run(mut self, commands: Receiver<ClientCommand>, remote: Receiver<Envelope>) -> SyncSession<E, C> {
        let tick = self.session.config().poll_interval();
        let mut remote = remote;
        self.flush();

        loop {
            select! {
                recv(commands) -> cmd => match cmd {
                    Ok(ClientCommand::Submit(choice)) => {
                        let result = self.session.submit_local(&choice);
                        self.report(result);
                    }
                    Ok(ClientCommand::RetryUnsent) => {
                        if let Err(e) = self.session.retry_unsent() {
                            self.emit(ClientUpdate::Error(e));
                        }
                    }
                    Ok(ClientCommand::Shutdown) | Err(_) => break,
                },
                recv(remote) -> envelope => match envelope {
                    Ok(envelope) => {
                        let result = self.session.ingest_envelope(&envelope);
                        self.report(result);
                    }
                    Err(_) => {
                        debug!("remote channel closed");
                        remote = never();
                    }
                },
                default(tick) => {}
            }

            for notice in self.session.poll(Instant::now()) {
                self.emit(ClientUpdate::Notice(notice));
            }
            self.flush();
        }

        debug!(phase = %self.session.phase(), "client worker stopped");
        self.session
    }

    fn report(&mut self, result: SyncResult<Vec<SyncNotice>>) {
        match result {
            Ok(notices) => {
                for notice in notices {
                    self.emit(ClientUpdate::Notice(notice));
                }
            }
            Err(e) => self.emit(ClientUpdate::Error(e)),
        }
    }

    /// Forwards new events, a phase change and a new decision point, if any.
    fn flush(&mut self) {
        let events = self.session.take_events();
        if !events.is_empty() {
            self.emit(ClientUpdate::Events(events));
        }

        let phase = self.session.phase();
        if self.last_phase != Some(phase) {
            self.last_phase = Some(phase);
            self.emit(ClientUpdate::Phase(phase));
        }

        if !matches!(phase, SyncPhase::TeamPreview | SyncPhase::CombatLocalTurn) {
            return;
        }
        let (Some(side), Some(adapter)) = (self.session.role().and_then(Role::side), self.session.adapter()) else {
            return;
        };
        let mark = adapter.log().len();
        if adapter.awaiting_choice(side) && self.requested_at != Some(mark) {
            self.requested_at = Some(mark);
            let turn = adapter.current_turn();
            self.emit(ClientUpdate::ChoiceRequested { turn });
        }
    }

    fn emit(&self, update: ClientUpdate) {
        match self.updates.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!(dropped, "client update stream is not being drained");
                }
            }
        }
    }
}
