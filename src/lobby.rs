//! Lobby session records and role resolution.
//!
//! The lobby service itself is external; this module models the record it
//! hands out. A record moving to [`LobbyState::Battling`] is the signal for
//! both clients to build their adapters from the agreed [`MatchSeed`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::seed::MatchSeed;
use crate::side::Side;
use crate::transport::room_channel;

/// Length of a lobby code.
pub const LOBBY_CODE_LEN: usize = 4;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A validated 4-character lobby code (`A-Z`, `0-9`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LobbyCode(String);

impl LobbyCode {
    /// Validates a code. Lowercase input is accepted and upper-cased.
    ///
    /// # Errors
    ///
    /// `InvalidLobbyCode` if the code has the wrong length or alphabet.
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let upper = code.trim().to_ascii_uppercase();
        let valid = upper.len() == LOBBY_CODE_LEN && upper.bytes().all(|b| CODE_ALPHABET.contains(&b));
        if !valid {
            return Err(ValidationError::InvalidLobbyCode {
                code: code.to_string(),
            });
        }
        Ok(Self(upper))
    }

    /// Draws a random code.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        let code = (0..LOBBY_CODE_LEN)
            .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    /// The code text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Broadcast room for this lobby, `battle:<CODE>`.
    #[must_use]
    pub fn channel(&self) -> String {
        room_channel(&self.0)
    }
}

impl fmt::Display for LobbyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LobbyCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LobbyCode {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<LobbyCode> for String {
    fn from(code: LobbyCode) -> Self {
        code.0
    }
}

/// Lobby lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyState {
    /// Host is waiting for a guest.
    Waiting,
    /// Both players are in; adapters may be created.
    Battling,
}

/// A client's part in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Plays one side.
    Player(Side),
    /// Watches and verifies both sides.
    Spectator,
}

impl Role {
    /// The played side, if any.
    #[must_use]
    pub const fn side(self) -> Option<Side> {
        match self {
            Self::Player(side) => Some(side),
            Self::Spectator => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(side) => write!(f, "player {side}"),
            Self::Spectator => f.write_str("spectator"),
        }
    }
}

/// The lobby's record of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Join code.
    pub code: LobbyCode,
    /// User who created the lobby; plays p1.
    pub host_id: Uuid,
    /// User who joined; plays p2.
    #[serde(default)]
    pub guest_id: Option<Uuid>,
    /// Lifecycle state.
    pub state: LobbyState,
    /// Agreed seed, set when the match starts.
    #[serde(default)]
    pub seed: Option<MatchSeed>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A new waiting lobby hosted by `host_id`.
    #[must_use]
    pub fn open(code: LobbyCode, host_id: Uuid) -> Self {
        Self {
            code,
            host_id,
            guest_id: None,
            state: LobbyState::Waiting,
            seed: None,
            created_at: Utc::now(),
        }
    }

    /// Seats a guest, fixes the seed and moves to `Battling`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the lobby is not waiting or the host joins their own lobby.
    pub fn admit(&mut self, guest_id: Uuid, seed: MatchSeed) -> Result<(), ValidationError> {
        if self.state != LobbyState::Waiting || self.guest_id.is_some() {
            return Err(ValidationError::InvalidConfig {
                reason: format!("lobby {} is not accepting players", self.code),
            });
        }
        if guest_id == self.host_id {
            return Err(ValidationError::InvalidConfig {
                reason: "host cannot join their own lobby as guest".to_string(),
            });
        }
        self.guest_id = Some(guest_id);
        self.seed = Some(seed);
        self.state = LobbyState::Battling;
        Ok(())
    }

    /// Host plays p1, guest plays p2, anyone else spectates.
    #[must_use]
    pub fn role_for(&self, user: Uuid) -> Role {
        if user == self.host_id {
            Role::Player(Side::P1)
        } else if self.guest_id == Some(user) {
            Role::Player(Side::P2)
        } else {
            Role::Spectator
        }
    }

    /// The agreed seed once the match is ready to start.
    ///
    /// # Errors
    ///
    /// `MissingField("seed")` unless the record is `Battling` with a seed.
    pub fn battle_seed(&self) -> Result<MatchSeed, ValidationError> {
        match (self.state, self.seed) {
            (LobbyState::Battling, Some(seed)) => Ok(seed),
            _ => Err(ValidationError::MissingField {
                field: "seed".to_string(),
            }),
        }
    }

    /// Broadcast room for this match.
    #[must_use]
    pub fn channel(&self) -> String {
        self.code.channel()
    }
}
