//! Team specifications handed to the engine at battle start.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::side::Side;

/// Maximum party size.
pub const MAX_TEAM_SIZE: usize = 6;

/// Maximum number of moves per set.
pub const MAX_MOVES: usize = 4;

const MAX_EV: u16 = 252;
const MAX_EV_TOTAL: u16 = 510;
const MAX_IV: u16 = 31;

/// One value per stat.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StatsTable {
    pub hp: u16,
    pub atk: u16,
    pub def: u16,
    pub spa: u16,
    pub spd: u16,
    pub spe: u16,
}

impl StatsTable {
    /// The same value for every stat.
    #[must_use]
    pub const fn splat(v: u16) -> Self {
        Self {
            hp: v,
            atk: v,
            def: v,
            spa: v,
            spd: v,
            spe: v,
        }
    }

    /// Perfect individual values.
    #[must_use]
    pub const fn max_ivs() -> Self {
        Self::splat(MAX_IV)
    }

    /// Iterate over all six values in `hp, atk, def, spa, spd, spe` order.
    pub fn values(&self) -> impl Iterator<Item = u16> {
        [self.hp, self.atk, self.def, self.spa, self.spd, self.spe].into_iter()
    }

    /// Sum of all six values.
    #[must_use]
    pub fn total(&self) -> u16 {
        self.values().sum()
    }
}

/// A single team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonSet {
    /// Display name (nickname) used in the log.
    pub name: String,
    /// Species id, e.g. `charmander`.
    pub species: String,
    /// Move ids, in slot order.
    pub moves: Vec<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub ability: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub item: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub gender: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub evs: StatsTable,
    #[serde(default = "StatsTable::max_ivs")]
    #[allow(missing_docs)]
    pub ivs: StatsTable,
    #[allow(missing_docs)]
    pub level: u8,
    #[serde(default)]
    #[allow(missing_docs)]
    pub nature: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub shiny: bool,
}

impl PokemonSet {
    /// Builds a level-50 set with neutral spreads.
    #[must_use]
    pub fn new(name: impl Into<String>, species: impl Into<String>, moves: &[&str]) -> Self {
        Self {
            name: name.into(),
            species: species.into(),
            moves: moves.iter().map(|m| (*m).to_string()).collect(),
            ability: String::new(),
            item: String::new(),
            gender: "M".to_string(),
            evs: StatsTable::default(),
            ivs: StatsTable::max_ivs(),
            level: 50,
            nature: "Serious".to_string(),
            shiny: false,
        }
    }

    /// Sets the level.
    #[must_use]
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Sets effort values.
    #[must_use]
    pub fn with_evs(mut self, evs: StatsTable) -> Self {
        self.evs = evs;
        self
    }
}

/// A player's name and party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSpec {
    /// Player display name, reported in `win` lines.
    pub name: String,
    /// Party in slot order; slot 1 leads unless team preview reorders it.
    pub team: Vec<PokemonSet>,
}

impl TeamSpec {
    /// Creates a team spec.
    #[must_use]
    pub fn new(name: impl Into<String>, team: Vec<PokemonSet>) -> Self {
        Self {
            name: name.into(),
            team,
        }
    }

    /// Structural validation that does not depend on any engine's data.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTeam` describing the first problem found.
    pub fn validate(&self, side: Side) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidTeam { side, reason };

        if self.name.trim().is_empty() {
            return Err(invalid("player name is empty".to_string()));
        }
        if self.team.is_empty() || self.team.len() > MAX_TEAM_SIZE {
            return Err(invalid(format!(
                "team must have 1 to {MAX_TEAM_SIZE} members, got {}",
                self.team.len()
            )));
        }

        for (idx, set) in self.team.iter().enumerate() {
            let slot = idx + 1;
            if set.name.trim().is_empty() {
                return Err(invalid(format!("slot {slot} has no name")));
            }
            if set.name.contains('|') {
                return Err(invalid(format!("slot {slot} name contains '|'")));
            }
            if self.team[..idx].iter().any(|other| other.name == set.name) {
                return Err(invalid(format!("duplicate name '{}'", set.name)));
            }
            if set.moves.is_empty() || set.moves.len() > MAX_MOVES {
                return Err(invalid(format!(
                    "'{}' must know 1 to {MAX_MOVES} moves, got {}",
                    set.name,
                    set.moves.len()
                )));
            }
            if !(1..=100).contains(&set.level) {
                return Err(invalid(format!("'{}' has level {}", set.name, set.level)));
            }
            if set.evs.values().any(|v| v > MAX_EV) || set.evs.total() > MAX_EV_TOTAL {
                return Err(invalid(format!("'{}' has an illegal EV spread", set.name)));
            }
            if set.ivs.values().any(|v| v > MAX_IV) {
                return Err(invalid(format!("'{}' has an illegal IV spread", set.name)));
            }
        }

        Ok(())
    }
}

/// Bundled teams for demos and tests.
pub mod samples {
    use super::{PokemonSet, StatsTable, TeamSpec};

    /// One Fire-type starter.
    #[must_use]
    pub fn fire_starter() -> TeamSpec {
        TeamSpec::new("Player 1", vec![PokemonSet::new("Sparky", "charmander", &["ember", "scratch"])])
    }

    /// One Water-type starter.
    #[must_use]
    pub fn water_starter() -> TeamSpec {
        TeamSpec::new("Player 2", vec![PokemonSet::new("Splashy", "squirtle", &["watergun", "tackle"])])
    }

    fn special(spe: u16) -> StatsTable {
        StatsTable {
            hp: 4,
            atk: 0,
            def: 0,
            spa: 252,
            spd: 0,
            spe,
        }
    }

    fn physical() -> StatsTable {
        StatsTable {
            hp: 252,
            atk: 252,
            def: 4,
            spa: 0,
            spd: 0,
            spe: 0,
        }
    }

    /// Six-member team for the host.
    #[must_use]
    pub fn full_p1() -> TeamSpec {
        TeamSpec::new(
            "Player 1",
            vec![
                PokemonSet::new("Charizard", "charizard", &["flamethrower", "airslash", "dragonpulse", "roost"])
                    .with_evs(special(252)),
                PokemonSet::new("Gengar", "gengar", &["shadowball", "sludgebomb", "thunderbolt", "recover"])
                    .with_evs(special(252)),
                PokemonSet::new("Dragonite", "dragonite", &["dragonclaw", "extremespeed", "firepunch", "roost"])
                    .with_evs(physical()),
                PokemonSet::new("Scizor", "scizor", &["bulletpunch", "xscissor", "roost", "quickattack"])
                    .with_evs(physical()),
                PokemonSet::new("Rotom-Wash", "rotomwash", &["hydropump", "thunderbolt", "recover"])
                    .with_evs(special(0)),
                PokemonSet::new("Garchomp", "garchomp", &["earthquake", "dragonclaw", "crunch", "firepunch"])
                    .with_evs(physical()),
            ],
        )
    }

    /// Six-member team for the guest.
    #[must_use]
    pub fn full_p2() -> TeamSpec {
        TeamSpec::new(
            "Player 2",
            vec![
                PokemonSet::new("Blastoise", "blastoise", &["surf", "icebeam", "crunch", "recover"])
                    .with_evs(special(0)),
                PokemonSet::new("Venusaur", "venusaur", &["gigadrain", "sludgebomb", "earthquake", "recover"])
                    .with_evs(special(0)),
                PokemonSet::new("Pikachu", "pikachu", &["thunderbolt", "quickattack", "surf"])
                    .with_evs(special(252)),
                PokemonSet::new("Snorlax", "snorlax", &["bodyslam", "crunch", "earthquake", "recover"])
                    .with_evs(physical()),
                PokemonSet::new("Gyarados", "gyarados", &["waterfall", "crunch", "earthquake", "icebeam"])
                    .with_evs(physical()),
                PokemonSet::new("Lucario", "lucario", &["aurasphere", "flashcannon", "extremespeed", "crunch"])
                    .with_evs(special(252)),
            ],
        )
    }
}
