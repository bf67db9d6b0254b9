//! Typed battle events produced from the engine log.
//!
//! [`BattleEvent`] is a closed sum type: consumers match on it exhaustively,
//! so adding a new event kind is a compile-time-checked change.

/// FIFO buffer of translated events.
pub mod queue;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::side::{Combatant, Side};

pub use queue::EventQueue;

/// Kind of annotation carried by a [`BattleEvent::Text`] event.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCue {
    SuperEffective,
    Resisted,
    Immune,
    CriticalHit,
    Miss,
    Fail,
    Message,
}

impl TextCue {
    /// Default rendering for the cue, given the combatant it names.
    #[must_use]
    pub fn render(self, subject: Option<&Combatant>) -> String {
        let name = subject.map_or("the target", |c| c.name.as_str());
        match self {
            Self::SuperEffective => "It's super effective!".to_string(),
            Self::Resisted => "It's not very effective...".to_string(),
            Self::Immune => format!("It doesn't affect {name}..."),
            Self::CriticalHit => "A critical hit!".to_string(),
            Self::Miss => format!("{name} avoided the attack!"),
            Self::Fail => "But it failed!".to_string(),
            Self::Message => String::new(),
        }
    }
}

/// One renderable moment of a battle.
///
/// Events are immutable once constructed and appear in the exact order of the
/// log lines they were translated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    /// Synthetic event emitted by the adapter before any engine output.
    Start {
        players: [String; 2],
    },

    /// A pokemon used a move.
    Move {
        actor: Combatant,
        move_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Combatant>,
    },

    /// HP dropped; `pct` is the remaining HP percentage.
    Damage {
        target: Combatant,
        hp: u32,
        max_hp: u32,
        pct: u8,
    },

    /// HP restored; `pct` is the resulting HP percentage.
    Heal {
        target: Combatant,
        hp: u32,
        max_hp: u32,
        pct: u8,
    },

    /// A pokemon fainted. Only produced from dedicated faint lines.
    Faint {
        target: Combatant,
    },

    /// A pokemon entered the field.
    Switch {
        target: Combatant,
        species: String,
        level: u8,
        hp: u32,
        max_hp: u32,
    },

    /// An annotation such as an effectiveness marker.
    Text {
        cue: TextCue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<Combatant>,
        message: String,
    },

    /// A new turn began.
    Turn {
        number: u32,
    },

    /// Terminal event naming the winning player.
    Win {
        winner: String,
    },
}

impl BattleEvent {
    /// Short kind tag, matching the serialized `type` field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Move { .. } => "move",
            Self::Damage { .. } => "damage",
            Self::Heal { .. } => "heal",
            Self::Faint { .. } => "faint",
            Self::Switch { .. } => "switch",
            Self::Text { .. } => "text",
            Self::Turn { .. } => "turn",
            Self::Win { .. } => "win",
        }
    }

    /// The side this event is attributed to, if any.
    #[must_use]
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Move { actor, .. } => Some(actor.side),
            Self::Damage { target, .. }
            | Self::Heal { target, .. }
            | Self::Faint { target }
            | Self::Switch { target, .. } => Some(target.side),
            Self::Text { subject, .. } => subject.as_ref().map(|c| c.side),
            Self::Start { .. } | Self::Turn { .. } | Self::Win { .. } => None,
        }
    }

    /// Returns true for the terminal `win` event.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Win { .. })
    }
}

impl fmt::Display for BattleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start { players } => write!(f, "{} vs. {}", players[0], players[1]),
            Self::Move { actor, move_name, .. } => write!(f, "{} used {move_name}!", actor.name),
            Self::Damage { target, pct, .. } => write!(f, "{} is at {pct}% HP", target.name),
            Self::Heal { target, pct, .. } => write!(f, "{} restored HP to {pct}%", target.name),
            Self::Faint { target } => write!(f, "{} fainted!", target.name),
            Self::Switch { target, species, .. } => {
                write!(f, "{} sent out {} ({species})!", target.side, target.name)
            }
            Self::Text { message, .. } => f.write_str(message),
            Self::Turn { number } => write!(f, "== Turn {number} =="),
            Self::Win { winner } => write!(f, "{winner} won the battle!"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_matches_serde_tag() {
        let ev = BattleEvent::Faint {
            target: Combatant::new(Side::P2, "Splashy"),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], ev.kind());
    }

    #[test]
    fn test_event_side_attribution() {
        let ev = BattleEvent::Move {
            actor: Combatant::new(Side::P1, "Sparky"),
            move_name: "Ember".to_string(),
            target: Some(Combatant::new(Side::P2, "Splashy")),
        };
        assert_eq!(ev.side(), Some(Side::P1));
        assert_eq!(BattleEvent::Turn { number: 1 }.side(), None);
    }

    #[test]
    fn test_display() {
        let ev = BattleEvent::Win {
            winner: "Player 2".to_string(),
        };
        assert!(ev.is_terminal());
        assert_eq!(ev.to_string(), "Player 2 won the battle!");
    }

    #[test]
    fn test_cue_render_names_subject() {
        let c = Combatant::new(Side::P2, "Splashy");
        assert_eq!(TextCue::Immune.render(Some(&c)), "It doesn't affect Splashy...");
        assert_eq!(TextCue::Resisted.render(None), "It's not very effective...");
    }
}
