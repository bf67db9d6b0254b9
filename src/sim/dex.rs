//! Static species, move and type data for the reference engine.

/// Elemental types.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

/// Single-type matchup in halves: 0 immune, 1 resisted, 2 neutral, 4 super effective.
#[must_use]
pub fn matchup(attack: Type, defend: Type) -> u32 {
    use Type::{
        Bug, Dark, Dragon, Electric, Fairy, Fighting, Fire, Flying, Ghost, Grass, Ground, Ice, Normal, Poison,
        Psychic, Rock, Steel, Water,
    };

    let (strong, weak, immune): (&[Type], &[Type], &[Type]) = match attack {
        Normal => (&[], &[Rock, Steel], &[Ghost]),
        Fire => (&[Grass, Ice, Bug, Steel], &[Fire, Water, Rock, Dragon], &[]),
        Water => (&[Fire, Ground, Rock], &[Water, Grass, Dragon], &[]),
        Electric => (&[Water, Flying], &[Electric, Grass, Dragon], &[Ground]),
        Grass => (&[Water, Ground, Rock], &[Fire, Grass, Poison, Flying, Bug, Dragon, Steel], &[]),
        Ice => (&[Grass, Ground, Flying, Dragon], &[Fire, Water, Ice, Steel], &[]),
        Fighting => (&[Normal, Ice, Rock, Dark, Steel], &[Poison, Flying, Psychic, Bug, Fairy], &[Ghost]),
        Poison => (&[Grass, Fairy], &[Poison, Ground, Rock, Ghost], &[Steel]),
        Ground => (&[Fire, Electric, Poison, Rock, Steel], &[Grass, Bug], &[Flying]),
        Flying => (&[Grass, Fighting, Bug], &[Electric, Rock, Steel], &[]),
        Psychic => (&[Fighting, Poison], &[Psychic, Steel], &[Dark]),
        Bug => (&[Grass, Psychic, Dark], &[Fire, Fighting, Poison, Flying, Ghost, Steel, Fairy], &[]),
        Rock => (&[Fire, Ice, Flying, Bug], &[Fighting, Ground, Steel], &[]),
        Ghost => (&[Psychic, Ghost], &[Dark], &[Normal]),
        Dragon => (&[Dragon], &[Steel], &[Fairy]),
        Dark => (&[Psychic, Ghost], &[Fighting, Dark, Fairy], &[]),
        Steel => (&[Ice, Rock, Fairy], &[Fire, Water, Electric, Steel], &[]),
        Fairy => (&[Fighting, Dragon, Dark], &[Fire, Poison, Steel], &[]),
    };

    if immune.contains(&defend) {
        0
    } else if strong.contains(&defend) {
        4
    } else if weak.contains(&defend) {
        1
    } else {
        2
    }
}

/// Combined effectiveness against a (possibly dual-typed) defender, in quarters.
///
/// 4 is neutral; 8 and 16 are super effective; 1 and 2 are resisted; 0 is immune.
#[must_use]
pub fn effectiveness(attack: Type, defender: &[Type]) -> u32 {
    match defender {
        [single] => matchup(attack, *single) * 2,
        [first, second, ..] => matchup(attack, *first) * matchup(attack, *second),
        [] => 4,
    }
}

/// Damage category of a move.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Physical,
    Special,
    Status,
}

/// Secondary behaviour of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveEffect {
    /// Plain damage (or nothing, for status moves without an effect).
    None,
    /// User restores half its max HP.
    HealHalf,
    /// User restores half the damage dealt.
    Drain,
}

/// Static move data.
#[allow(missing_docs)]
#[derive(Debug)]
pub struct MoveData {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: Type,
    pub category: Category,
    pub power: u32,
    /// Hit chance in percent; 0 never misses.
    pub accuracy: u32,
    pub pp: u8,
    pub priority: i8,
    pub effect: MoveEffect,
}

/// Static species data.
#[allow(missing_docs)]
#[derive(Debug)]
pub struct Species {
    pub id: &'static str,
    pub name: &'static str,
    pub types: &'static [Type],
    /// Base stats in `hp, atk, def, spa, spd, spe` order.
    pub base: [u32; 6],
}

macro_rules! mv {
    ($id:literal, $name:literal, $kind:ident, $cat:ident, $power:literal, $acc:literal, $pp:literal, $prio:literal, $effect:ident) => {
        MoveData {
            id: $id,
            name: $name,
            kind: Type::$kind,
            category: Category::$cat,
            power: $power,
            accuracy: $acc,
            pp: $pp,
            priority: $prio,
            effect: MoveEffect::$effect,
        }
    };
}

static MOVES: &[MoveData] = &[
    mv!("ember", "Ember", Fire, Special, 40, 100, 25, 0, None),
    mv!("scratch", "Scratch", Normal, Physical, 40, 100, 35, 0, None),
    mv!("watergun", "Water Gun", Water, Special, 40, 100, 25, 0, None),
    mv!("tackle", "Tackle", Normal, Physical, 40, 100, 35, 0, None),
    mv!("vinewhip", "Vine Whip", Grass, Physical, 45, 100, 25, 0, None),
    mv!("thundershock", "Thunder Shock", Electric, Special, 40, 100, 30, 0, None),
    mv!("flamethrower", "Flamethrower", Fire, Special, 90, 100, 15, 0, None),
    mv!("airslash", "Air Slash", Flying, Special, 75, 95, 15, 0, None),
    mv!("dragonpulse", "Dragon Pulse", Dragon, Special, 85, 100, 10, 0, None),
    mv!("roost", "Roost", Flying, Status, 0, 0, 5, 0, HealHalf),
    mv!("recover", "Recover", Normal, Status, 0, 0, 5, 0, HealHalf),
    mv!("shadowball", "Shadow Ball", Ghost, Special, 80, 100, 15, 0, None),
    mv!("sludgebomb", "Sludge Bomb", Poison, Special, 90, 100, 10, 0, None),
    mv!("thunderbolt", "Thunderbolt", Electric, Special, 90, 100, 15, 0, None),
    mv!("dragonclaw", "Dragon Claw", Dragon, Physical, 80, 100, 15, 0, None),
    mv!("extremespeed", "Extreme Speed", Normal, Physical, 80, 100, 5, 2, None),
    mv!("firepunch", "Fire Punch", Fire, Physical, 75, 100, 15, 0, None),
    mv!("bulletpunch", "Bullet Punch", Steel, Physical, 40, 100, 30, 1, None),
    mv!("xscissor", "X-Scissor", Bug, Physical, 80, 100, 15, 0, None),
    mv!("quickattack", "Quick Attack", Normal, Physical, 40, 100, 30, 1, None),
    mv!("hydropump", "Hydro Pump", Water, Special, 110, 80, 5, 0, None),
    mv!("earthquake", "Earthquake", Ground, Physical, 100, 100, 10, 0, None),
    mv!("crunch", "Crunch", Dark, Physical, 80, 100, 15, 0, None),
    mv!("surf", "Surf", Water, Special, 90, 100, 15, 0, None),
    mv!("icebeam", "Ice Beam", Ice, Special, 90, 100, 10, 0, None),
    mv!("gigadrain", "Giga Drain", Grass, Special, 75, 100, 10, 0, Drain),
    mv!("bodyslam", "Body Slam", Normal, Physical, 85, 100, 15, 0, None),
    mv!("waterfall", "Waterfall", Water, Physical, 80, 100, 15, 0, None),
    mv!("aurasphere", "Aura Sphere", Fighting, Special, 80, 0, 20, 0, None),
    mv!("flashcannon", "Flash Cannon", Steel, Special, 80, 100, 10, 0, None),
];

static SPECIES: &[Species] = &[
    Species { id: "charmander", name: "Charmander", types: &[Type::Fire], base: [39, 52, 43, 60, 50, 65] },
    Species { id: "squirtle", name: "Squirtle", types: &[Type::Water], base: [44, 48, 65, 50, 64, 43] },
    Species { id: "bulbasaur", name: "Bulbasaur", types: &[Type::Grass, Type::Poison], base: [45, 49, 49, 65, 65, 45] },
    Species { id: "charizard", name: "Charizard", types: &[Type::Fire, Type::Flying], base: [78, 84, 78, 109, 85, 100] },
    Species { id: "blastoise", name: "Blastoise", types: &[Type::Water], base: [79, 83, 100, 85, 105, 78] },
    Species { id: "venusaur", name: "Venusaur", types: &[Type::Grass, Type::Poison], base: [80, 82, 83, 100, 100, 80] },
    Species { id: "pikachu", name: "Pikachu", types: &[Type::Electric], base: [35, 55, 40, 50, 50, 90] },
    Species { id: "gengar", name: "Gengar", types: &[Type::Ghost, Type::Poison], base: [60, 65, 60, 130, 75, 110] },
    Species { id: "dragonite", name: "Dragonite", types: &[Type::Dragon, Type::Flying], base: [91, 134, 95, 100, 100, 80] },
    Species { id: "scizor", name: "Scizor", types: &[Type::Bug, Type::Steel], base: [70, 130, 100, 55, 80, 65] },
    Species { id: "rotomwash", name: "Rotom-Wash", types: &[Type::Electric, Type::Water], base: [50, 65, 107, 105, 107, 86] },
    Species { id: "garchomp", name: "Garchomp", types: &[Type::Dragon, Type::Ground], base: [108, 130, 95, 80, 85, 102] },
    Species { id: "snorlax", name: "Snorlax", types: &[Type::Normal], base: [160, 110, 65, 65, 110, 30] },
    Species { id: "gyarados", name: "Gyarados", types: &[Type::Water, Type::Flying], base: [95, 125, 79, 60, 100, 81] },
    Species { id: "lucario", name: "Lucario", types: &[Type::Fighting, Type::Steel], base: [70, 110, 70, 115, 70, 90] },
];

/// Normalizes a display name or id to an id: lowercase ASCII alphanumerics only.
#[must_use]
pub fn to_id(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Looks up a move by id or display name.
#[must_use]
pub fn find_move(name: &str) -> Option<&'static MoveData> {
    let id = to_id(name);
    MOVES.iter().find(|m| m.id == id)
}

/// Looks up a species by id or display name.
#[must_use]
pub fn find_species(name: &str) -> Option<&'static Species> {
    let id = to_id(name);
    SPECIES.iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_water_matchups() {
        assert_eq!(effectiveness(Type::Fire, &[Type::Water]), 2);
        assert_eq!(effectiveness(Type::Water, &[Type::Fire]), 8);
        assert_eq!(effectiveness(Type::Fire, &[Type::Grass]), 8);
    }

    #[test]
    fn test_dual_type_stacking() {
        // Electric vs Water/Flying is 4x.
        assert_eq!(effectiveness(Type::Electric, &[Type::Water, Type::Flying]), 16);
        // Ground vs Fire/Flying: immune through Flying.
        assert_eq!(effectiveness(Type::Ground, &[Type::Fire, Type::Flying]), 0);
        // Fire vs Bug/Steel is 4x.
        assert_eq!(effectiveness(Type::Fire, &[Type::Bug, Type::Steel]), 16);
    }

    #[test]
    fn test_immunities() {
        assert_eq!(matchup(Type::Normal, Type::Ghost), 0);
        assert_eq!(matchup(Type::Dragon, Type::Fairy), 0);
        assert_eq!(matchup(Type::Poison, Type::Steel), 0);
    }

    #[test]
    fn test_lookup_by_name_or_id() {
        assert_eq!(find_move("Water Gun").map(|m| m.id), Some("watergun"));
        assert_eq!(find_move("watergun").map(|m| m.name), Some("Water Gun"));
        assert_eq!(find_species("Rotom-Wash").map(|s| s.id), Some("rotomwash"));
        assert!(find_move("hyperbeam").is_none());
    }

    #[test]
    fn test_sample_teams_use_known_data() {
        for team in [crate::team::samples::full_p1(), crate::team::samples::full_p2()] {
            for set in &team.team {
                assert!(find_species(&set.species).is_some(), "species {}", set.species);
                for m in &set.moves {
                    assert!(find_move(m).is_some(), "move {m}");
                }
            }
        }
    }
}
