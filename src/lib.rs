//! # Everymon - lockstep synchronization for turn-based battles
//!
//! Each player runs an independent replica of a deterministic battle engine.
//! Everymon keeps the replicas in step over an unreliable broadcast channel
//! and turns the engine's textual log into a typed event stream.
//!
//! ## Core Concepts
//!
//! - **Adapter**: owns one engine, feeds it choices, translates its log into
//!   [`BattleEvent`]s and fingerprints it with BLAKE3 per turn
//! - **Log Translator**: incremental, cursor-based parser for the `|`-delimited log
//! - **Sync Session**: per-client state machine that exchanges choices and
//!   digests, buffers out-of-order messages and detects divergence
//! - **Broadcast Channel**: fire-and-forget room pub/sub; [`LocalBus`] is the
//!   in-process implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use everymon::team::samples;
//! use everymon::{BattleAdapter, LocalBus, MatchSeed, Role, Side, SyncConfig, SyncSession};
//!
//! let bus = LocalBus::default();
//! let (channel, _inbox) = bus.join("battle:AB12");
//!
//! let mut adapter = BattleAdapter::reference(MatchSeed::new([1, 2, 3, 4]));
//! adapter.start_battle(&samples::fire_starter(), &samples::water_starter())?;
//!
//! let mut session = SyncSession::new(channel, SyncConfig::default());
//! session.begin(Role::Player(Side::P1), adapter)?;
//! session.submit_local("team 1")?;
//! # Ok::<(), everymon::SyncError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod event;
pub mod seed;
pub mod side;
pub mod team;

// Engine boundary and translation
pub mod adapter;
pub mod engine;
pub mod sim;
pub mod translate;

// Synchronization
pub mod config;
pub mod lobby;
pub mod session;
pub mod transport;
pub mod wire;

// Re-export primary types at crate root for convenience
pub use adapter::{BattleAdapter, StateDigest};
pub use config::SyncConfig;
pub use engine::SimulationEngine;
pub use error::{EngineError, ProtocolError, SyncError, SyncResult, TransportError, ValidationError};
pub use event::{BattleEvent, EventQueue, TextCue};
pub use lobby::{LobbyCode, LobbyState, Role, SessionRecord};
pub use seed::MatchSeed;
pub use session::{SyncNotice, SyncPhase, SyncSession};
pub use side::{Combatant, Side};
pub use sim::ReferenceBattle;
pub use team::{PokemonSet, StatsTable, TeamSpec};
pub use translate::{LogTranslator, TranslatorStats, LOG_GRAMMAR_VERSION};
pub use transport::{BroadcastChannel, Envelope, LocalBus, LocalChannel};
pub use wire::{PlayerMove, SyncState, WireMessage};
