//! Built-in reference engine.
//!
//! A small deterministic singles simulator that speaks the same log grammar
//! as the engine the protocol was designed around. It is the default engine
//! for tests and the demo binary; any other [`SimulationEngine`] can be
//! plugged into the adapter instead.
//!
//! [`SimulationEngine`]: crate::engine::SimulationEngine

pub mod battle;
pub mod choice;
pub mod dex;

pub use battle::ReferenceBattle;
