use std::collections::{BTreeMap, VecDeque};

use crate::side::Side;

/// Remote choices waiting for the local replica to reach their turn.
///
/// Keyed by `(turn, player)`; each key keeps arrival order. Unbounded: the
/// owning session enforces the limit shared with held digests.
#[derive(Debug, Default)]
pub struct ChoiceBuffer {
    entries: BTreeMap<(u32, Side), VecDeque<String>>,
    len: usize,
}

impl ChoiceBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a choice behind any earlier one for the same key.
    pub fn push(&mut self, turn: u32, player: Side, choice: String) {
        self.entries.entry((turn, player)).or_default().push_back(choice);
        self.len += 1;
    }

    /// Removes the oldest choice for a key.
    pub fn pop(&mut self, turn: u32, player: Side) -> Option<String> {
        let queue = self.entries.get_mut(&(turn, player))?;
        let choice = queue.pop_front();
        if queue.is_empty() {
            self.entries.remove(&(turn, player));
        }
        if choice.is_some() {
            self.len -= 1;
        }
        choice
    }

    /// Whether anything is held for a key.
    #[must_use]
    pub fn contains(&self, turn: u32, player: Side) -> bool {
        self.entries.contains_key(&(turn, player))
    }

    /// Removes and returns every choice for turns before `turn`.
    pub fn discard_before(&mut self, turn: u32) -> Vec<(u32, Side, String)> {
        let keep = self.entries.split_off(&(turn, Side::P1));
        let stale = std::mem::replace(&mut self.entries, keep);

        let mut out = Vec::new();
        for ((t, player), choices) in stale {
            self.len -= choices.len();
            out.extend(choices.into_iter().map(|c| (t, player, c)));
        }
        out
    }

    /// Number of held choices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
