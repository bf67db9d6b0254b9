//! Match seeds agreed through the lobby.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Seed shared by both replicas of a match.
///
/// Serialized as a 4-element integer array, the shape the lobby record stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchSeed([u32; 4]);

impl MatchSeed {
    /// Wraps explicit seed words.
    #[must_use]
    pub const fn new(words: [u32; 4]) -> Self {
        Self(words)
    }

    /// Draws a fresh random seed.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// The raw seed words.
    #[must_use]
    pub const fn words(&self) -> [u32; 4] {
        self.0
    }

    /// Derives 32 bytes of RNG key material for a named purpose.
    ///
    /// Different contexts yield independent streams from the same seed.
    #[must_use]
    pub fn derive(&self, context: &str) -> [u8; 32] {
        let mut material = [0u8; 16];
        for (chunk, word) in material.chunks_exact_mut(4).zip(self.0) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        blake3::derive_key(context, &material)
    }
}

impl fmt::Display for MatchSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a},{b},{c},{d}")
    }
}

impl FromStr for MatchSeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<u32> = s
            .split(',')
            .map(|w| w.trim().parse::<u32>().map_err(|e| format!("invalid seed word '{w}': {e}")))
            .collect::<Result<_, _>>()?;
        let words: [u32; 4] = words
            .try_into()
            .map_err(|v: Vec<u32>| format!("seed needs 4 words, got {}", v.len()))?;
        Ok(Self(words))
    }
}
