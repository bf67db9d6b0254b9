//! Wire messages exchanged over the broadcast channel.
//!
//! Two events share one room: `player_move` carries a choice and `sync_state`
//! carries a digest checkpoint. Payloads are JSON objects:
//!
//! ```text
//! player_move  {"player":"p1","choice":"move 1","turn":3}
//! sync_state   {"player":"p2","hash":"<64 hex chars>","turn":3}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::side::Side;

/// Largest accepted payload.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024; // 64 KiB

/// Event name for choices.
pub const PLAYER_MOVE: &str = "player_move";

/// Event name for digests.
pub const SYNC_STATE: &str = "sync_state";

/// A player's choice, stamped with the sender's turn at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMove {
    /// Side that made the choice.
    pub player: Side,
    /// Raw command text.
    pub choice: String,
    /// Sender's turn when the choice was made.
    pub turn: u32,
}

/// A digest checkpoint published by one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Publishing side.
    pub player: Side,
    /// Hex BLAKE3 digest of the sender's log at `turn`.
    pub hash: String,
    /// Checkpoint turn.
    pub turn: u32,
}

/// Any message on the room channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// `player_move`
    PlayerMove(PlayerMove),
    /// `sync_state`
    SyncState(SyncState),
}

impl WireMessage {
    /// Channel event name for this message.
    #[must_use]
    pub const fn event(&self) -> &'static str {
        match self {
            Self::PlayerMove(_) => PLAYER_MOVE,
            Self::SyncState(_) => SYNC_STATE,
        }
    }

    /// Sending side.
    #[must_use]
    pub const fn player(&self) -> Side {
        match self {
            Self::PlayerMove(m) => m.player,
            Self::SyncState(s) => s.player,
        }
    }

    /// Turn the message refers to.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        match self {
            Self::PlayerMove(m) => m.turn,
            Self::SyncState(s) => s.turn,
        }
    }

    /// Serializes the payload (without the event name).
    ///
    /// # Errors
    ///
    /// `SerializationFailed`, or `PayloadTooLarge` above [`MAX_PAYLOAD_BYTES`].
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let bytes = match self {
            Self::PlayerMove(m) => serde_json::to_vec(m),
            Self::SyncState(s) => serde_json::to_vec(s),
        }
        .map_err(|e| TransportError::SerializationFailed {
            event: self.event().to_string(),
            message: e.to_string(),
        })?;

        if bytes.len() > MAX_PAYLOAD_BYTES {
            return Err(TransportError::PayloadTooLarge {
                size: bytes.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }
        Ok(bytes)
    }

    /// Parses a payload received under `event`.
    ///
    /// # Errors
    ///
    /// `UnknownEvent`, `PayloadTooLarge` or `DeserializationFailed`.
    pub fn decode(event: &str, payload: &[u8]) -> Result<Self, TransportError> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }

        match event {
            PLAYER_MOVE => parse(event, payload).map(Self::PlayerMove),
            SYNC_STATE => parse(event, payload).map(Self::SyncState),
            other => Err(TransportError::UnknownEvent {
                event: other.to_string(),
            }),
        }
    }
}

fn parse<T: DeserializeOwned>(event: &str, payload: &[u8]) -> Result<T, TransportError> {
    serde_json::from_slice(payload).map_err(|e| TransportError::DeserializationFailed {
        event: event.to_string(),
        message: e.to_string(),
    })
}

impl From<PlayerMove> for WireMessage {
    fn from(m: PlayerMove) -> Self {
        Self::PlayerMove(m)
    }
}

impl From<SyncState> for WireMessage {
    fn from(s: SyncState) -> Self {
        Self::SyncState(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_move_payload_shape() {
        let msg = WireMessage::from(PlayerMove {
            player: Side::P1,
            choice: "move 1".to_string(),
            turn: 3,
        });
        let bytes = msg.encode().unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"player":"p1","choice":"move 1","turn":3}"#
        );
        assert_eq!(WireMessage::decode(msg.event(), &bytes).unwrap(), msg);
    }

    #[test]
    fn test_sync_state_from_foreign_json() {
        let payload = br#"{"turn": 2, "hash": "abc", "player": "p2"}"#;
        let msg = WireMessage::decode("sync_state", payload).unwrap();
        assert_eq!(msg.player(), Side::P2);
        assert_eq!(msg.turn(), 2);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            WireMessage::decode("chat", b"{}"),
            Err(TransportError::UnknownEvent { .. })
        ));
        assert!(matches!(
            WireMessage::decode("player_move", br#"{"player":"p3","choice":"x","turn":1}"#),
            Err(TransportError::DeserializationFailed { .. })
        ));
        let huge = vec![b' '; MAX_PAYLOAD_BYTES + 1];
        assert!(matches!(
            WireMessage::decode("player_move", &huge),
            Err(TransportError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_choice() {
        let msg = WireMessage::from(PlayerMove {
            player: Side::P1,
            choice: "x".repeat(MAX_PAYLOAD_BYTES),
            turn: 1,
        });
        assert!(matches!(msg.encode(), Err(TransportError::PayloadTooLarge { .. })));
    }
}
