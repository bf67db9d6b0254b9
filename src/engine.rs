//! The simulation-engine contract consumed by the adapter.
//!
//! The engine is the single source of truth for battle rules. The adapter
//! never reaches into its internals: it sets players, forwards choices, and
//! reads the append-only log and the turn counter.

use crate::error::EngineError;
use crate::side::Side;
use crate::team::TeamSpec;

/// A deterministic turn-based battle engine.
///
/// Implementations must be deterministic: two instances built from the same
/// seed and fed the same ordered sequence of `set_player` and `choose` calls
/// must produce identical logs.
pub trait SimulationEngine {
    /// Registers a player's team. Called once per side before any choice.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::PlayerRejected` if the team cannot be used.
    fn set_player(&mut self, side: Side, spec: &TeamSpec) -> Result<(), EngineError>;

    /// Submits a command such as `team 213`, `move 1`, `move ember`, `switch 2`.
    ///
    /// A rejected command leaves the engine exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::IllegalChoice` if the command is not legal for the
    /// side's current decision point.
    fn choose(&mut self, side: Side, command: &str) -> Result<(), EngineError>;

    /// Every line emitted so far. Lines are only ever appended.
    fn log(&self) -> &[String];

    /// Current turn; 0 during team preview.
    fn turn(&self) -> u32;

    /// Whether the current decision point expects a choice from `side` that
    /// has not been submitted yet.
    fn awaiting_choice(&self, side: Side) -> bool;
}

impl<E: SimulationEngine + ?Sized> SimulationEngine for Box<E> {
    fn set_player(&mut self, side: Side, spec: &TeamSpec) -> Result<(), EngineError> {
        (**self).set_player(side, spec)
    }

    fn choose(&mut self, side: Side, command: &str) -> Result<(), EngineError> {
        (**self).choose(side, command)
    }

    fn log(&self) -> &[String] {
        (**self).log()
    }

    fn turn(&self) -> u32 {
        (**self).turn()
    }

    fn awaiting_choice(&self, side: Side) -> bool {
        (**self).awaiting_choice(side)
    }
}
