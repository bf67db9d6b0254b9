//! Error types for the Everymon protocol.
//!
//! Every layer has its own strongly typed error enum built with thiserror.
//! The top-level [`SyncError`] collects them so callers can pattern match on
//! the layer that failed and decide whether the session is still usable.

use thiserror::Error;

use crate::side::Side;

/// Validation errors for inputs that never reach the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Lobby code '{code}' must be 4 characters from A-Z and 0-9")]
    InvalidLobbyCode {
        code: String,
    },

    #[error("Team for {side} is invalid: {reason}")]
    InvalidTeam {
        side: Side,
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },
}

/// Errors raised by a simulation engine or by the adapter that owns it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Illegal choice '{choice}' for {side}: {reason}")]
    IllegalChoice {
        side: Side,
        choice: String,
        reason: String,
    },

    #[error("Player {side} rejected: {reason}")]
    PlayerRejected {
        side: Side,
        reason: String,
    },

    #[error("Battle has not been started")]
    NotStarted,

    #[error("Battle has already been started")]
    AlreadyStarted,

    #[error("Battle is over")]
    BattleOver,
}

/// Protocol-level errors raised by the synchronization state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("State digest mismatch at turn {turn}: local {local}, remote ({remote_player}) {remote}")]
    DigestMismatch {
        turn: u32,
        local: String,
        remote: String,
        remote_player: Side,
    },

    #[error("Remote choice '{choice}' from {player} for turn {turn} was rejected locally: {reason}")]
    RemoteChoiceRejected {
        player: Side,
        choice: String,
        turn: u32,
        reason: String,
    },

    #[error("Session is desynced; abandon and restart the match")]
    Desynced,

    #[error("Cannot {action} while {phase}")]
    InvalidPhase {
        phase: String,
        action: String,
    },

    #[error("Remote message buffer is full ({capacity} messages)")]
    BufferFull {
        capacity: usize,
    },
}

/// Transport errors for the broadcast channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Channel '{channel}' is not connected")]
    Unavailable {
        channel: String,
    },

    #[error("Failed to serialize '{event}' payload: {message}")]
    SerializationFailed {
        event: String,
        message: String,
    },

    #[error("Failed to deserialize '{event}' payload: {message}")]
    DeserializationFailed {
        event: String,
        message: String,
    },

    #[error("Unknown event '{event}'")]
    UnknownEvent {
        event: String,
    },

    #[error("Payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },
}

/// Top-level error type for the Everymon protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SyncError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the engine rejected a locally submitted choice.
    #[must_use]
    pub const fn is_illegal_choice(&self) -> bool {
        matches!(self, Self::Engine(EngineError::IllegalChoice { .. }))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if the session can no longer continue.
    ///
    /// Desync in any form ends the match; the user must abandon and restart.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol(
                ProtocolError::DigestMismatch { .. }
                    | ProtocolError::RemoteChoiceRejected { .. }
                    | ProtocolError::Desynced
            ) | Self::Internal { .. }
        )
    }

    /// Returns true if the same call may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => matches!(e, TransportError::Unavailable { .. }),
            Self::Protocol(e) => matches!(e, ProtocolError::BufferFull { .. }),
            Self::Validation(_) | Self::Engine(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for Everymon operations.
pub type SyncResult<T> = Result<T, SyncError>;
