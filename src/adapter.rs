//! Simulation adapter: owns one engine, translates its log and fingerprints it.
//!
//! Every state change drains the new log lines through the translator into the
//! [`EventQueue`] and folds them into a running BLAKE3 digest. The digest is
//! snapshotted into a checkpoint whenever a `turn` line is drained (turn 0 right
//! after start), so two replicas can compare their state at a given turn even
//! when one of them has already moved past it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::SimulationEngine;
use crate::error::EngineError;
use crate::event::{BattleEvent, EventQueue};
use crate::seed::MatchSeed;
use crate::side::Side;
use crate::sim::ReferenceBattle;
use crate::team::TeamSpec;
use crate::translate::{LogTranslator, TranslatorStats};

/// Fingerprint of the engine log at a turn boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateDigest {
    /// Turn the fingerprint belongs to.
    pub turn: u32,
    /// Lowercase hex BLAKE3 hash, 64 characters.
    pub digest: String,
}

/// Drives one engine instance on behalf of one client.
#[derive(Debug)]
pub struct BattleAdapter<E> {
    engine: E,
    translator: LogTranslator,
    queue: EventQueue,
    hasher: blake3::Hasher,
    checkpoints: BTreeMap<u32, String>,
    started: bool,
    winner: Option<String>,
}

impl BattleAdapter<ReferenceBattle> {
    /// Adapter over the built-in reference engine.
    #[must_use]
    pub fn reference(seed: MatchSeed) -> Self {
        Self::new(ReferenceBattle::new(seed))
    }
}

impl<E: SimulationEngine> BattleAdapter<E> {
    /// Wraps an engine that has not had any players set.
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            translator: LogTranslator::new(),
            queue: EventQueue::new(),
            hasher: blake3::Hasher::new(),
            checkpoints: BTreeMap::new(),
            started: false,
            winner: None,
        }
    }

    /// Sets both players, emits the synthetic start event and records the
    /// turn-0 checkpoint.
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` on a second call, or the engine's `PlayerRejected`.
    pub fn start_battle(&mut self, team_a: &TeamSpec, team_b: &TeamSpec) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::AlreadyStarted);
        }

        self.engine.set_player(Side::P1, team_a)?;
        self.engine.set_player(Side::P2, team_b)?;
        self.started = true;

        self.queue.add(BattleEvent::Start {
            players: [team_a.name.clone(), team_b.name.clone()],
        });
        self.drain();
        self.checkpoints.insert(0, self.hex());

        info!(p1 = %team_a.name, p2 = %team_b.name, "battle started");
        Ok(())
    }

    /// Forwards a choice to the engine and drains whatever it logged.
    ///
    /// # Errors
    ///
    /// `NotStarted` before [`start_battle`](Self::start_battle), `BattleOver`
    /// after a winner was declared, or the engine's `IllegalChoice`. A failed
    /// call changes nothing.
    pub fn apply_choice(&mut self, side: Side, command: &str) -> Result<(), EngineError> {
        if !self.started {
            return Err(EngineError::NotStarted);
        }
        if self.winner.is_some() {
            return Err(EngineError::BattleOver);
        }

        self.engine.choose(side, command)?;
        let consumed = self.drain();
        debug!(%side, command, consumed, turn = self.current_turn(), "choice applied");
        Ok(())
    }

    /// The engine's turn counter.
    #[must_use]
    pub fn current_turn(&self) -> u32 {
        self.engine.turn()
    }

    /// Digest of everything drained so far, labelled with the current turn.
    #[must_use]
    pub fn state_digest(&self) -> StateDigest {
        StateDigest {
            turn: self.current_turn(),
            digest: self.hex(),
        }
    }

    /// Digest recorded at the start of `turn`, if that turn has been reached.
    #[must_use]
    pub fn checkpoint(&self, turn: u32) -> Option<StateDigest> {
        self.checkpoints.get(&turn).map(|digest| StateDigest {
            turn,
            digest: digest.clone(),
        })
    }

    /// Most recent checkpoint. After a win this is the terminal digest.
    #[must_use]
    pub fn latest_checkpoint(&self) -> Option<StateDigest> {
        self.checkpoints.last_key_value().map(|(turn, digest)| StateDigest {
            turn: *turn,
            digest: digest.clone(),
        })
    }

    /// Checkpoints for `from` and every later turn, in turn order.
    pub fn checkpoints_from(&self, from: u32) -> impl Iterator<Item = StateDigest> + '_ {
        self.checkpoints.range(from..).map(|(turn, digest)| StateDigest {
            turn: *turn,
            digest: digest.clone(),
        })
    }

    /// Winner's display name once the `win` line was drained.
    #[must_use]
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Returns true once a winner is known.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// Returns true after a successful [`start_battle`](Self::start_battle).
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether the engine expects a choice from `side` right now.
    #[must_use]
    pub fn awaiting_choice(&self, side: Side) -> bool {
        self.started && self.winner.is_none() && self.engine.awaiting_choice(side)
    }

    /// Translated events not yet consumed.
    #[must_use]
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Mutable access for consumers draining the queue.
    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }

    /// Translator counters.
    #[must_use]
    pub fn translator_stats(&self) -> TranslatorStats {
        self.translator.stats()
    }

    /// The raw engine log.
    #[must_use]
    pub fn log(&self) -> &[String] {
        self.engine.log()
    }

    /// The wrapped engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn hex(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }

    fn drain(&mut self) -> usize {
        let Self {
            engine,
            translator,
            queue,
            hasher,
            checkpoints,
            winner,
            ..
        } = self;

        translator.advance(engine.log(), |line, event| {
            hasher.update(&(line.len() as u64).to_le_bytes());
            hasher.update(line.as_bytes());

            match &event {
                Some(BattleEvent::Turn { number }) => {
                    checkpoints.insert(*number, hasher.finalize().to_hex().to_string());
                }
                Some(BattleEvent::Win { winner: name }) => {
                    let final_turn = checkpoints.last_key_value().map_or(0, |(t, _)| *t);
                    checkpoints.insert(final_turn + 1, hasher.finalize().to_hex().to_string());
                    *winner = Some(name.clone());
                    info!(winner = %name, final_turn, "battle finished");
                }
                _ => {}
            }

            if let Some(event) = event {
                queue.add(event);
            }
        })
    }
}
