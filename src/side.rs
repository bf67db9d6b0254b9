//! Player sides and combatant identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two players in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The lobby host.
    P1,
    /// The lobby guest.
    P2,
}

impl Side {
    /// Both sides in protocol order.
    pub const BOTH: [Self; 2] = [Self::P1, Self::P2];

    /// Wire token for this side.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "p1",
            Self::P2 => "p2",
        }
    }

    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }

    /// Zero-based index (p1 = 0).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::P1 => 0,
            Self::P2 => 1,
        }
    }

    /// Attribute a log token such as `p1a: Sparky` or `p2` to a side by prefix.
    #[must_use]
    pub fn from_token_prefix(token: &str) -> Option<Self> {
        let token = token.trim_start();
        if token.starts_with("p1") {
            Some(Self::P1)
        } else if token.starts_with("p2") {
            Some(Self::P2)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p1" => Ok(Self::P1),
            "p2" => Ok(Self::P2),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

/// A pokemon on the field, identified by its side and display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combatant {
    /// Owning side.
    pub side: Side,
    /// Display name (nickname), without the slot prefix.
    pub name: String,
}

impl Combatant {
    /// Creates a combatant.
    #[must_use]
    pub fn new(side: Side, name: impl Into<String>) -> Self {
        Self {
            side,
            name: name.into(),
        }
    }

    /// Parses a slot token of the form `p1a: Name`.
    ///
    /// Returns `None` when the side prefix or the `:` separator is missing,
    /// or when the name is empty.
    #[must_use]
    pub fn parse_slot(token: &str) -> Option<Self> {
        let side = Side::from_token_prefix(token)?;
        let (_, name) = token.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(side, name))
    }

    /// Renders the slot token used in the engine log (`p1a: Name`).
    #[must_use]
    pub fn slot_token(&self) -> String {
        format!("{}a: {}", self.side, self.name)
    }
}

impl fmt::Display for Combatant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}a: {}", self.side, self.name)
    }
}
