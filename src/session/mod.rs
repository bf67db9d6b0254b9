//! Per-client synchronization state machine.
//!
//! Each client runs its own replica of the battle. The session broadcasts the
//! local player's choices and digest checkpoints, applies the opponent's
//! choices once the local replica reaches their turn, and compares digests
//! at every shared checkpoint. A single mismatch ends the match: there is no
//! reconciliation.
//!
//! ```text
//! AwaitingRole -> TeamPreview -> CombatLocalTurn <-> CombatRemotePending -> Complete
//!                                         \________________\__________________-> Desynced
//! ```

pub mod buffer;
pub mod driver;

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::adapter::BattleAdapter;
use crate::config::SyncConfig;
use crate::engine::SimulationEngine;
use crate::error::{EngineError, ProtocolError, SyncError, SyncResult, TransportError};
use crate::event::BattleEvent;
use crate::lobby::Role;
use crate::side::Side;
use crate::transport::{BroadcastChannel, Envelope};
use crate::wire::{PlayerMove, SyncState, WireMessage};

pub use buffer::ChoiceBuffer;
pub use driver::{spawn_client, ClientCommand, ClientHandle, ClientUpdate};

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// No role or adapter yet.
    AwaitingRole,
    /// Turn 0: lead selection.
    TeamPreview,
    /// The engine expects a choice from the local player.
    CombatLocalTurn,
    /// Waiting on the opponent (always the case for spectators).
    CombatRemotePending,
    /// A winner was declared.
    Complete,
    /// Replicas diverged. Terminal.
    Desynced,
}

impl SyncPhase {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingRole => "awaiting_role",
            Self::TeamPreview => "team_preview",
            Self::CombatLocalTurn => "combat_local_turn",
            Self::CombatRemotePending => "combat_remote_pending",
            Self::Complete => "complete",
            Self::Desynced => "desynced",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Things that happened while handling one call, for the consumer to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// A choice reached the local engine.
    ChoiceApplied {
        /// Choosing side.
        player: Side,
        /// Turn the choice was made in.
        turn: u32,
        /// False for the local player's own choice.
        remote: bool,
    },
    /// A remote choice is held until the local replica can take it.
    ChoiceBuffered {
        /// Choosing side.
        player: Side,
        /// Turn the choice belongs to.
        turn: u32,
    },
    /// A remote choice for a turn already passed was discarded.
    StaleChoiceDropped {
        /// Choosing side.
        player: Side,
        /// Turn the choice belonged to.
        turn: u32,
    },
    /// A remote digest matched the local checkpoint.
    DigestVerified {
        /// Publishing side.
        player: Side,
        /// Checkpoint turn.
        turn: u32,
    },
    /// A message could not be published and sits in the outbox.
    Unsent {
        /// Event name.
        event: &'static str,
        /// Turn the message refers to.
        turn: u32,
    },
    /// The opponent has not chosen within the configured timeout.
    OpponentUnresponsive {
        /// How long the local side has waited.
        waited: Duration,
    },
    /// The battle ended.
    MatchComplete {
        /// Winner's display name.
        winner: String,
    },
}

/// One client's synchronization session over a broadcast channel.
pub struct SyncSession<E, C> {
    config: SyncConfig,
    channel: C,
    role: Option<Role>,
    adapter: Option<BattleAdapter<E>>,
    phase: SyncPhase,
    buffer: ChoiceBuffer,
    pending_digests: BTreeMap<u32, Vec<SyncState>>,
    published: Option<u32>,
    outbox: VecDeque<WireMessage>,
    desync: Option<ProtocolError>,
    waiting_since: Option<Instant>,
    unresponsive_reported: bool,
}

impl<E, C> fmt::Debug for SyncSession<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSession")
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("buffered", &self.buffer.len())
            .field("outbox", &self.outbox.len())
            .field("published", &self.published)
            .finish_non_exhaustive()
    }
}

impl<E: SimulationEngine, C: BroadcastChannel> SyncSession<E, C> {
    /// A session in `AwaitingRole`. Remote messages ingested before
    /// [`begin`](Self::begin) are held.
    #[must_use]
    pub fn new(channel: C, config: SyncConfig) -> Self {
        Self {
            config,
            channel,
            role: None,
            adapter: None,
            phase: SyncPhase::AwaitingRole,
            buffer: ChoiceBuffer::new(),
            pending_digests: BTreeMap::new(),
            published: None,
            outbox: VecDeque::new(),
            desync: None,
            waiting_since: None,
            unresponsive_reported: false,
        }
    }

    /// Takes a role and a started adapter, and publishes the turn-0 digest.
    ///
    /// # Errors
    ///
    /// `InvalidPhase` if already begun, `InvalidConfig` for an out-of-range
    /// config, `NotStarted` if the adapter was not started, or a fatal
    /// protocol error if held messages diverge.
    pub fn begin(&mut self, role: Role, adapter: BattleAdapter<E>) -> SyncResult<Vec<SyncNotice>> {
        if self.phase != SyncPhase::AwaitingRole {
            return Err(self.invalid_phase("begin a session").into());
        }
        self.config.validate()?;
        if !adapter.is_started() {
            return Err(EngineError::NotStarted.into());
        }

        self.role = Some(role);
        self.adapter = Some(adapter);
        info!(%role, "session begun");

        let mut notices = Vec::new();
        self.after_state_change(&mut notices)?;
        Ok(notices)
    }

    /// Applies a local choice, then broadcasts it with the latest checkpoint.
    ///
    /// # Errors
    ///
    /// `IllegalChoice` (nothing is broadcast), `InvalidPhase` for spectators
    /// or outside the local player's turn, `Desynced` after divergence.
    pub fn submit_local(&mut self, choice: &str) -> SyncResult<Vec<SyncNotice>> {
        self.ensure_live()?;
        let Some(Role::Player(side)) = self.role else {
            return Err(self.invalid_phase("submit a choice without a player role").into());
        };
        if !matches!(self.phase, SyncPhase::TeamPreview | SyncPhase::CombatLocalTurn) {
            return Err(self.invalid_phase("submit a choice").into());
        }

        let adapter = self.adapter_mut()?;
        let turn = adapter.current_turn();
        let outgoing = WireMessage::from(PlayerMove {
            player: side,
            choice: choice.to_string(),
            turn,
        });
        outgoing.encode()?;

        adapter.apply_choice(side, choice)?;
        debug!(%side, choice, turn, "local choice applied");

        let mut notices = vec![SyncNotice::ChoiceApplied {
            player: side,
            turn,
            remote: false,
        }];
        self.send(outgoing, &mut notices)?;

        if let Some(latest) = self.adapter_ref()?.latest_checkpoint() {
            self.send(
                WireMessage::from(SyncState {
                    player: side,
                    hash: latest.digest,
                    turn: latest.turn,
                }),
                &mut notices,
            )?;
            self.published = self.published.max(Some(latest.turn));
        }

        self.after_state_change(&mut notices)?;
        Ok(notices)
    }

    /// Handles a raw envelope from the channel.
    ///
    /// # Errors
    ///
    /// Transport errors for undecodable payloads, plus everything
    /// [`ingest`](Self::ingest) returns.
    pub fn ingest_envelope(&mut self, envelope: &Envelope) -> SyncResult<Vec<SyncNotice>> {
        self.ensure_live()?;
        let message = WireMessage::decode(&envelope.event, &envelope.payload)?;
        self.ingest(message)
    }

    /// Handles a remote message.
    ///
    /// # Errors
    ///
    /// `DigestMismatch` or `RemoteChoiceRejected` when divergence is detected
    /// (the session is then `Desynced`), `BufferFull` when a future-turn
    /// message cannot be held, `Desynced` after divergence.
    pub fn ingest(&mut self, message: WireMessage) -> SyncResult<Vec<SyncNotice>> {
        self.ensure_live()?;
        let mut notices = Vec::new();

        if Some(message.player()) == self.role.and_then(Role::side) {
            trace!(event = message.event(), "ignoring own echo");
            return Ok(notices);
        }

        self.waiting_since = None;
        self.unresponsive_reported = false;

        match message {
            WireMessage::PlayerMove(m) => self.receive_choice(m, &mut notices)?,
            WireMessage::SyncState(s) => self.receive_digest(s, &mut notices)?,
        }

        if self.adapter.is_some() {
            self.after_state_change(&mut notices)?;
        }
        Ok(notices)
    }

    /// Timeout check, driven by the caller's clock.
    ///
    /// The first call after the local side starts waiting on the opponent
    /// starts the clock. Once the configured timeout has elapsed, a single
    /// `OpponentUnresponsive` notice is returned for that wait.
    pub fn poll(&mut self, now: Instant) -> Vec<SyncNotice> {
        let Some(timeout) = self.config.remote_choice_timeout() else {
            return Vec::new();
        };
        if !self.waiting_on_remote() {
            self.waiting_since = None;
            self.unresponsive_reported = false;
            return Vec::new();
        }

        let since = *self.waiting_since.get_or_insert(now);
        let waited = now.saturating_duration_since(since);
        if self.unresponsive_reported || waited < timeout {
            return Vec::new();
        }

        self.unresponsive_reported = true;
        warn!(waited_ms = waited.as_millis(), "opponent has not chosen in time");
        vec![SyncNotice::OpponentUnresponsive { waited }]
    }

    /// Republishes the outbox in order.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the channel is still down; the remaining messages stay
    /// queued.
    pub fn retry_unsent(&mut self) -> SyncResult<usize> {
        let sent = self.flush_outbox()?;
        if sent > 0 {
            info!(sent, "outbox flushed");
        }
        Ok(sent)
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Role, once begun.
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        self.role
    }

    /// The adapter, once begun.
    #[must_use]
    pub fn adapter(&self) -> Option<&BattleAdapter<E>> {
        self.adapter.as_ref()
    }

    /// Mutable adapter access (for draining the event queue).
    pub fn adapter_mut(&mut self) -> SyncResult<&mut BattleAdapter<E>> {
        self.adapter.as_mut().ok_or_else(|| invalid_phase_error(self.phase, "access the adapter"))
    }

    /// Drains the translated events accumulated so far.
    pub fn take_events(&mut self) -> Vec<BattleEvent> {
        self.adapter
            .as_mut()
            .map(|a| a.queue_mut().collect())
            .unwrap_or_default()
    }

    /// The divergence that ended the session, if any.
    #[must_use]
    pub const fn desync_reason(&self) -> Option<&ProtocolError> {
        self.desync.as_ref()
    }

    /// Messages waiting in the outbox.
    #[must_use]
    pub fn unsent_len(&self) -> usize {
        self.outbox.len()
    }

    /// Remote messages held for future turns.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.pending_digests.values().map(Vec::len).sum::<usize>()
    }

    /// The publishing channel.
    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn adapter_ref(&self) -> SyncResult<&BattleAdapter<E>> {
        self.adapter.as_ref().ok_or_else(|| invalid_phase_error(self.phase, "access the adapter"))
    }

    fn ensure_live(&self) -> SyncResult<()> {
        if self.desync.is_some() {
            return Err(ProtocolError::Desynced.into());
        }
        Ok(())
    }

    fn invalid_phase(&self, action: &str) -> ProtocolError {
        ProtocolError::InvalidPhase {
            phase: self.phase.to_string(),
            action: action.to_string(),
        }
    }

    /// Sides whose choices arrive over the wire.
    fn remote_sides(&self) -> &'static [Side] {
        match self.role {
            Some(Role::Player(Side::P1)) => &[Side::P2],
            Some(Role::Player(Side::P2)) => &[Side::P1],
            Some(Role::Spectator) | None => &Side::BOTH,
        }
    }

    fn waiting_on_remote(&self) -> bool {
        let (Some(Role::Player(side)), Some(adapter)) = (self.role, self.adapter.as_ref()) else {
            return false;
        };
        self.desync.is_none()
            && !adapter.is_finished()
            && !adapter.awaiting_choice(side)
            && adapter.awaiting_choice(side.opponent())
    }

    fn receive_choice(&mut self, m: PlayerMove, notices: &mut Vec<SyncNotice>) -> Result<(), ProtocolError> {
        if let Some(adapter) = self.adapter.as_ref() {
            if adapter.is_finished() || m.turn < adapter.current_turn() {
                warn!(
                    player = %m.player,
                    turn = m.turn,
                    local_turn = adapter.current_turn(),
                    "dropping stale remote choice"
                );
                notices.push(SyncNotice::StaleChoiceDropped {
                    player: m.player,
                    turn: m.turn,
                });
                return Ok(());
            }
        }

        // Earlier arrivals for the same key go first.
        let ready = !self.buffer.contains(m.turn, m.player)
            && self
                .adapter
                .as_ref()
                .is_some_and(|a| m.turn == a.current_turn() && a.awaiting_choice(m.player));
        if ready {
            return self.apply_remote(m.player, m.turn, m.choice, notices);
        }

        self.ensure_capacity()?;
        debug!(player = %m.player, turn = m.turn, "buffering remote choice");
        notices.push(SyncNotice::ChoiceBuffered {
            player: m.player,
            turn: m.turn,
        });
        self.buffer.push(m.turn, m.player, m.choice);
        Ok(())
    }

    /// Choices and digests held for later share one limit.
    fn ensure_capacity(&self) -> Result<(), ProtocolError> {
        if self.buffered_len() >= self.config.max_buffered_messages {
            return Err(ProtocolError::BufferFull {
                capacity: self.config.max_buffered_messages,
            });
        }
        Ok(())
    }

    fn receive_digest(&mut self, s: SyncState, notices: &mut Vec<SyncNotice>) -> Result<(), ProtocolError> {
        let latest = self.adapter.as_ref().and_then(BattleAdapter::latest_checkpoint).map(|c| c.turn);
        match latest {
            Some(latest) if s.turn <= latest => self.verify_digest(&s, notices),
            _ => {
                self.ensure_capacity()?;
                debug!(player = %s.player, turn = s.turn, "holding digest for a future turn");
                self.pending_digests.entry(s.turn).or_default().push(s);
                Ok(())
            }
        }
    }

    fn verify_digest(&mut self, s: &SyncState, notices: &mut Vec<SyncNotice>) -> Result<(), ProtocolError> {
        let Some(local) = self.adapter.as_ref().and_then(|a| a.checkpoint(s.turn)) else {
            debug!(turn = s.turn, "no local checkpoint for digest, ignoring");
            return Ok(());
        };

        if local.digest == s.hash {
            info!(player = %s.player, turn = s.turn, "digest verified");
            notices.push(SyncNotice::DigestVerified {
                player: s.player,
                turn: s.turn,
            });
            return Ok(());
        }

        Err(self.mark_desynced(ProtocolError::DigestMismatch {
            turn: s.turn,
            local: local.digest,
            remote: s.hash.clone(),
            remote_player: s.player,
        }))
    }

    fn mark_desynced(&mut self, reason: ProtocolError) -> ProtocolError {
        error!(%reason, "session desynced");
        self.desync = Some(reason.clone());
        self.phase = SyncPhase::Desynced;
        reason
    }

    fn after_state_change(&mut self, notices: &mut Vec<SyncNotice>) -> SyncResult<()> {
        self.drain_buffer(notices)?;
        self.check_pending_digests(notices)?;
        self.publish_new_checkpoints(notices)?;
        self.refresh_phase(notices);
        Ok(())
    }

    fn drain_buffer(&mut self, notices: &mut Vec<SyncNotice>) -> Result<(), ProtocolError> {
        loop {
            let Some(adapter) = self.adapter.as_ref() else {
                return Ok(());
            };
            if adapter.is_finished() {
                return Ok(());
            }
            let turn = adapter.current_turn();

            for (stale_turn, player, choice) in self.buffer.discard_before(turn) {
                warn!(%player, turn = stale_turn, choice, "dropping buffered choice for a passed turn");
                notices.push(SyncNotice::StaleChoiceDropped {
                    player,
                    turn: stale_turn,
                });
            }

            let mut progressed = false;
            for &player in self.remote_sides() {
                let awaiting = self.adapter.as_ref().is_some_and(|a| a.awaiting_choice(player));
                if !awaiting {
                    continue;
                }
                if let Some(choice) = self.buffer.pop(turn, player) {
                    self.apply_remote(player, turn, choice, notices)?;
                    progressed = true;
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    fn apply_remote(
        &mut self,
        player: Side,
        turn: u32,
        choice: String,
        notices: &mut Vec<SyncNotice>,
    ) -> Result<(), ProtocolError> {
        let Some(adapter) = self.adapter.as_mut() else {
            return Ok(());
        };
        match adapter.apply_choice(player, &choice) {
            Ok(()) => {
                debug!(%player, turn, choice, "remote choice applied");
                notices.push(SyncNotice::ChoiceApplied {
                    player,
                    turn,
                    remote: true,
                });
                Ok(())
            }
            Err(e) => Err(self.mark_desynced(ProtocolError::RemoteChoiceRejected {
                player,
                choice,
                turn,
                reason: e.to_string(),
            })),
        }
    }

    fn check_pending_digests(&mut self, notices: &mut Vec<SyncNotice>) -> Result<(), ProtocolError> {
        let Some(latest) = self.adapter.as_ref().and_then(BattleAdapter::latest_checkpoint) else {
            return Ok(());
        };
        let later = self.pending_digests.split_off(&(latest.turn + 1));
        let ready = std::mem::replace(&mut self.pending_digests, later);
        for s in ready.into_values().flatten() {
            self.verify_digest(&s, notices)?;
        }
        Ok(())
    }

    fn publish_new_checkpoints(&mut self, notices: &mut Vec<SyncNotice>) -> SyncResult<()> {
        let Some(Role::Player(side)) = self.role else {
            return Ok(());
        };
        let from = self.published.map_or(0, |t| t + 1);
        let fresh: Vec<_> = self.adapter_ref()?.checkpoints_from(from).collect();
        for checkpoint in fresh {
            self.send(
                WireMessage::from(SyncState {
                    player: side,
                    hash: checkpoint.digest,
                    turn: checkpoint.turn,
                }),
                notices,
            )?;
            self.published = Some(checkpoint.turn);
        }
        Ok(())
    }

    fn refresh_phase(&mut self, notices: &mut Vec<SyncNotice>) {
        let next = self.derive_phase();
        if next == self.phase {
            return;
        }
        info!(from = %self.phase, to = %next, "phase changed");
        self.phase = next;

        if next == SyncPhase::Complete {
            if let Some(winner) = self.adapter.as_ref().and_then(BattleAdapter::winner) {
                notices.push(SyncNotice::MatchComplete {
                    winner: winner.to_string(),
                });
            }
        }
    }

    fn derive_phase(&self) -> SyncPhase {
        if self.desync.is_some() {
            return SyncPhase::Desynced;
        }
        let Some(adapter) = self.adapter.as_ref() else {
            return SyncPhase::AwaitingRole;
        };
        if adapter.is_finished() {
            return SyncPhase::Complete;
        }
        if adapter.current_turn() == 0 {
            return SyncPhase::TeamPreview;
        }
        match self.role.and_then(Role::side) {
            Some(side) if adapter.awaiting_choice(side) => SyncPhase::CombatLocalTurn,
            _ => SyncPhase::CombatRemotePending,
        }
    }

    fn send(&mut self, message: WireMessage, notices: &mut Vec<SyncNotice>) -> SyncResult<()> {
        let bytes = message.encode()?;

        if !self.outbox.is_empty() {
            // Keep publish order: anything older must go out first.
            match self.flush_outbox() {
                Ok(_) | Err(TransportError::Unavailable { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if self.outbox.is_empty() {
            match self.channel.publish(message.event(), &bytes) {
                Ok(()) => {
                    trace!(event = message.event(), turn = message.turn(), "published");
                    return Ok(());
                }
                Err(e @ TransportError::Unavailable { .. }) => {
                    warn!(error = %e, event = message.event(), "publish failed, keeping message for retry");
                }
                Err(e) => return Err(e.into()),
            }
        }

        notices.push(SyncNotice::Unsent {
            event: message.event(),
            turn: message.turn(),
        });
        self.outbox.push_back(message);
        Ok(())
    }

    fn flush_outbox(&mut self) -> Result<usize, TransportError> {
        let mut sent = 0;
        while let Some(message) = self.outbox.front() {
            let bytes = message.encode()?;
            self.channel.publish(message.event(), &bytes)?;
            self.outbox.pop_front();
            sent += 1;
        }
        Ok(sent)
    }
}

fn invalid_phase_error(phase: SyncPhase, action: &str) -> SyncError {
    ProtocolError::InvalidPhase {
        phase: phase.to_string(),
        action: action.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::ValidationError;
    use crate::seed::MatchSeed;
    use crate::sim::ReferenceBattle;
    use crate::team::samples;

    /// Records publishes; can be switched off or made to fail.
    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<WireMessage>>>,
        down: Arc<AtomicBool>,
        fail: Arc<Mutex<Option<TransportError>>>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<WireMessage> {
            self.sent.lock().unwrap().clone()
        }

        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn fail_with(&self, err: TransportError) {
            *self.fail.lock().unwrap() = Some(err);
        }
    }

    impl BroadcastChannel for Recorder {
        fn publish(&self, event: &str, payload: &[u8]) -> Result<(), TransportError> {
            if let Some(err) = self.fail.lock().unwrap().clone() {
                return Err(err);
            }
            if !self.is_connected() {
                return Err(TransportError::Unavailable {
                    channel: "test".to_string(),
                });
            }
            self.sent.lock().unwrap().push(WireMessage::decode(event, payload)?);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.down.load(Ordering::SeqCst)
        }
    }

    fn session(role: Role, config: SyncConfig) -> (SyncSession<ReferenceBattle, Recorder>, Recorder) {
        let rec = Recorder::default();
        let mut adapter = BattleAdapter::reference(MatchSeed::new([1, 2, 3, 4]));
        adapter
            .start_battle(&samples::fire_starter(), &samples::water_starter())
            .unwrap();
        let mut s = SyncSession::new(rec.clone(), config);
        s.begin(role, adapter).unwrap();
        (s, rec)
    }

    #[test]
    fn test_begin_publishes_turn_zero() {
        let (s, rec) = session(Role::Player(Side::P1), SyncConfig::default());
        assert_eq!(s.phase(), SyncPhase::TeamPreview);
        let sent = rec.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], WireMessage::SyncState(st) if st.turn == 0 && st.player == Side::P1));
    }

    #[test]
    fn test_spectator_cannot_submit() {
        let (mut s, rec) = session(Role::Spectator, SyncConfig::default());
        assert!(rec.sent().is_empty());
        let err = s.submit_local("team 1").unwrap_err();
        assert!(matches!(err, SyncError::Protocol(ProtocolError::InvalidPhase { .. })));
    }

    #[test]
    fn test_illegal_choice_not_broadcast() {
        let (mut s, rec) = session(Role::Player(Side::P1), SyncConfig::default());
        let before = rec.sent().len();
        let err = s.submit_local("move 1").unwrap_err();
        assert!(err.is_illegal_choice());
        assert_eq!(rec.sent().len(), before);
    }

    #[test]
    fn test_begin_twice_rejected() {
        let (mut s, _rec) = session(Role::Player(Side::P1), SyncConfig::default());
        let adapter = BattleAdapter::reference(MatchSeed::new([1, 2, 3, 4]));
        assert!(s.begin(Role::Player(Side::P1), adapter).is_err());
    }

    #[test]
    fn test_unstarted_adapter_rejected() {
        let mut s: SyncSession<ReferenceBattle, Recorder> = SyncSession::new(Recorder::default(), SyncConfig::default());
        let err = s
            .begin(Role::Player(Side::P1), BattleAdapter::reference(MatchSeed::new([0, 0, 0, 0])))
            .unwrap_err();
        assert_eq!(err, SyncError::Engine(EngineError::NotStarted));
    }

    #[test]
    fn test_outbox_keeps_order() {
        let (mut s, rec) = session(Role::Player(Side::P1), SyncConfig::default());
        rec.set_down(true);

        let notices = s.submit_local("team 1").unwrap();
        assert!(notices.iter().any(|n| matches!(n, SyncNotice::Unsent { event: "player_move", .. })));
        assert_eq!(s.unsent_len(), 2);
        assert!(s.retry_unsent().unwrap_err().is_retryable());

        rec.set_down(false);
        assert_eq!(s.retry_unsent().unwrap(), 2);
        let sent = rec.sent();
        assert!(matches!(&sent[1], WireMessage::PlayerMove(m) if m.choice == "team 1"));
        assert!(matches!(&sent[2], WireMessage::SyncState(_)));
    }

    #[test]
    fn test_outbox_flush_propagates_fatal_errors() {
        let (mut s, rec) = session(Role::Player(Side::P1), SyncConfig::default());
        rec.set_down(true);
        s.submit_local("team 1").unwrap();
        assert_eq!(s.unsent_len(), 2);

        rec.set_down(false);
        let too_large = TransportError::PayloadTooLarge { size: 70_000, max: 65_536 };
        rec.fail_with(too_large.clone());

        // The opponent's choice advances to turn 1, whose digest tries to go out.
        let err = s
            .ingest(WireMessage::from(PlayerMove {
                player: Side::P2,
                choice: "team 1".to_string(),
                turn: 0,
            }))
            .unwrap_err();
        assert_eq!(err, SyncError::Transport(too_large));
        assert!(!err.is_retryable());
        assert_eq!(s.unsent_len(), 2);
        assert_eq!(rec.sent().len(), 1);
    }

    #[test]
    fn test_adapter_access_before_begin_is_invalid_phase() {
        let mut s: SyncSession<ReferenceBattle, Recorder> = SyncSession::new(Recorder::default(), SyncConfig::default());
        let err = s.adapter_mut().unwrap_err();
        assert!(matches!(
            err,
            SyncError::Protocol(ProtocolError::InvalidPhase { ref action, .. }) if action == "access the adapter"
        ));
    }

    #[test]
    fn test_begin_rejects_invalid_config() {
        let mut s: SyncSession<ReferenceBattle, Recorder> = SyncSession::new(
            Recorder::default(),
            SyncConfig {
                max_buffered_messages: 0,
                ..SyncConfig::default()
            },
        );
        let mut adapter = BattleAdapter::reference(MatchSeed::new([1, 2, 3, 4]));
        adapter
            .start_battle(&samples::fire_starter(), &samples::water_starter())
            .unwrap();

        let err = s.begin(Role::Player(Side::P1), adapter).unwrap_err();
        assert!(matches!(err, SyncError::Validation(ValidationError::InvalidConfig { .. })));
        assert_eq!(s.phase(), SyncPhase::AwaitingRole);
    }

    #[test]
    fn test_timeout_reported_once_per_wait() {
        let config = SyncConfig {
            remote_choice_timeout_ms: Some(1_000),
            ..SyncConfig::default()
        };
        let (mut s, _rec) = session(Role::Player(Side::P1), config);
        let t0 = Instant::now();

        assert!(s.poll(t0).is_empty());
        s.submit_local("team 1").unwrap();
        assert!(s.poll(t0).is_empty());
        assert!(s.poll(t0 + Duration::from_millis(999)).is_empty());

        let notices = s.poll(t0 + Duration::from_millis(1_000));
        assert_eq!(
            notices,
            vec![SyncNotice::OpponentUnresponsive {
                waited: Duration::from_millis(1_000),
            }]
        );
        assert!(s.poll(t0 + Duration::from_secs(5)).is_empty());
        assert_eq!(s.phase(), SyncPhase::TeamPreview);
    }
}
