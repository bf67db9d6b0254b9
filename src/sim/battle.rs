use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::engine::SimulationEngine;
use crate::error::EngineError;
use crate::seed::MatchSeed;
use crate::side::{Combatant, Side};
use crate::team::{PokemonSet, TeamSpec};

use super::choice::{self, Command, MoveRef};
use super::dex::{self, Category, MoveData, MoveEffect, Species};

const RNG_CONTEXT: &str = "everymon reference engine v1";
const CRIT_ODDS: u32 = 24;
/// Sort bucket for switches, above every move priority.
const SWITCH_PRIORITY: i32 = 7;

const HP: usize = 0;
const ATK: usize = 1;
const DEF: usize = 2;
const SPA: usize = 3;
const SPD: usize = 4;
const SPE: usize = 5;

#[derive(Debug)]
struct MoveSlot {
    data: &'static MoveData,
    pp: u8,
}

#[derive(Debug)]
struct Mon {
    name: String,
    species: &'static Species,
    gender: String,
    level: u32,
    moves: Vec<MoveSlot>,
    stats: [u32; 6],
    hp: u32,
}

impl Mon {
    fn from_set(set: &PokemonSet) -> Result<Self, String> {
        let species = dex::find_species(&set.species).ok_or_else(|| format!("unknown species '{}'", set.species))?;
        let moves = set
            .moves
            .iter()
            .map(|m| {
                dex::find_move(m)
                    .map(|data| MoveSlot { data, pp: data.pp })
                    .ok_or_else(|| format!("unknown move '{m}'"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let level = u32::from(set.level);
        let evs: Vec<u32> = set.evs.values().map(u32::from).collect();
        let ivs: Vec<u32> = set.ivs.values().map(u32::from).collect();
        let mut stats = [0u32; 6];
        for (i, stat) in stats.iter_mut().enumerate() {
            let core = (2 * species.base[i] + ivs[i] + evs[i] / 4) * level / 100;
            *stat = if i == HP { core + level + 10 } else { core + 5 };
        }

        Ok(Self {
            name: set.name.clone(),
            species,
            gender: set.gender.clone(),
            level,
            moves,
            hp: stats[HP],
            stats,
        })
    }

    fn is_fainted(&self) -> bool {
        self.hp == 0
    }

    fn details(&self) -> String {
        match self.gender.as_str() {
            "M" | "F" => format!("{}, L{}, {}", self.species.name, self.level, self.gender),
            _ => format!("{}, L{}", self.species.name, self.level),
        }
    }

    fn hp_token(&self) -> String {
        if self.is_fainted() {
            "0 fnt".to_string()
        } else {
            format!("{}/{}", self.hp, self.stats[HP])
        }
    }
}

#[derive(Debug)]
struct SideState {
    name: String,
    party: Vec<Mon>,
    active: usize,
}

impl SideState {
    fn active(&self) -> &Mon {
        &self.party[self.active]
    }

    fn active_mut(&mut self) -> &mut Mon {
        &mut self.party[self.active]
    }

    fn first_healthy_bench(&self) -> Option<usize> {
        (0..self.party.len()).find(|&i| i != self.active && !self.party[i].is_fainted())
    }

    fn has_healthy(&self) -> bool {
        self.party.iter().any(|m| !m.is_fainted())
    }

    /// Moves the listed slots (0-based) to the front, keeping the rest in order.
    fn reorder(&mut self, order: &[usize]) {
        let mut taken: Vec<Option<Mon>> = std::mem::take(&mut self.party).into_iter().map(Some).collect();
        let mut party = Vec::with_capacity(taken.len());
        for &i in order {
            if let Some(mon) = taken.get_mut(i).and_then(Option::take) {
                party.push(mon);
            }
        }
        party.extend(taken.into_iter().flatten());
        self.party = party;
        self.active = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Setup,
    TeamPreview,
    Move,
    ForcedSwitch([bool; 2]),
    Ended,
}

impl Phase {
    const fn name(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::TeamPreview => "team preview",
            Self::Move => "move selection",
            Self::ForcedSwitch(_) => "a forced switch",
            Self::Ended => "the end of the battle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Team(Vec<usize>),
    Move(usize),
    Switch(usize),
}

/// Deterministic singles battle used as the default engine.
///
/// It implements a compact subset of the familiar rules: team preview, speed
/// and priority ordering, STAB, the full type chart, critical hits, damage
/// rolls, accuracy, PP, healing and drain moves, and forced switches after a
/// faint. Abilities, items, natures and status conditions are not modelled.
///
/// The log follows the line grammar understood by [`crate::translate`].
#[derive(Debug)]
pub struct ReferenceBattle {
    rng: ChaCha8Rng,
    log: Vec<String>,
    turn: u32,
    staged: [Option<SideState>; 2],
    sides: Vec<SideState>,
    phase: Phase,
    pending: [Option<Action>; 2],
}

impl ReferenceBattle {
    /// Creates an empty battle; both players must be set before any choice.
    #[must_use]
    pub fn new(seed: MatchSeed) -> Self {
        Self {
            rng: ChaCha8Rng::from_seed(seed.derive(RNG_CONTEXT)),
            log: Vec::new(),
            turn: 0,
            staged: [None, None],
            sides: Vec::new(),
            phase: Phase::Setup,
            pending: [None, None],
        }
    }

    /// Returns true once a winner has been declared.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Current HP and max HP of a side's active pokemon.
    #[must_use]
    pub fn active_hp(&self, side: Side) -> Option<(u32, u32)> {
        self.sides.get(side.index()).map(|s| (s.active().hp, s.active().stats[HP]))
    }

    /// Display name of a side's active pokemon.
    #[must_use]
    pub fn active_name(&self, side: Side) -> Option<&str> {
        self.sides.get(side.index()).map(|s| s.active().name.as_str())
    }

    fn push(&mut self, line: String) {
        self.log.push(line);
    }

    fn slot(&self, side: Side) -> String {
        Combatant::new(side, self.sides[side.index()].active().name.clone()).slot_token()
    }

    fn validate(&self, side: Side, command: Command) -> Result<Action, String> {
        let state = &self.sides[side.index()];
        match (self.phase, command) {
            (Phase::TeamPreview, Command::Team(slots)) => {
                let mut order = Vec::with_capacity(slots.len());
                for slot in slots {
                    if slot > state.party.len() {
                        return Err(format!("team slot {slot} is out of range"));
                    }
                    if order.contains(&(slot - 1)) {
                        return Err(format!("team slot {slot} listed twice"));
                    }
                    order.push(slot - 1);
                }
                Ok(Action::Team(order))
            }
            (Phase::TeamPreview, Command::Default) => Ok(Action::Team(Vec::new())),
            (Phase::Move, Command::Move(reference)) => {
                let active = state.active();
                let idx = match reference {
                    MoveRef::Slot(slot) => {
                        if slot > active.moves.len() {
                            return Err(format!("{} has no move in slot {slot}", active.name));
                        }
                        slot - 1
                    }
                    MoveRef::Id(id) => active
                        .moves
                        .iter()
                        .position(|m| m.data.id == id)
                        .ok_or_else(|| format!("{} does not know '{id}'", active.name))?,
                };
                if active.moves[idx].pp == 0 {
                    return Err(format!("{} has no PP left", active.moves[idx].data.name));
                }
                Ok(Action::Move(idx))
            }
            (Phase::Move, Command::Default) => state
                .active()
                .moves
                .iter()
                .position(|m| m.pp > 0)
                .map(Action::Move)
                .ok_or_else(|| "no move has PP left".to_string()),
            (Phase::Move | Phase::ForcedSwitch(_), Command::Switch(slot)) => {
                let Some(mon) = state.party.get(slot - 1) else {
                    return Err(format!("party slot {slot} is empty"));
                };
                if slot - 1 == state.active && !mon.is_fainted() {
                    return Err(format!("{} is already in battle", mon.name));
                }
                if mon.is_fainted() {
                    return Err(format!("{} has fainted", mon.name));
                }
                Ok(Action::Switch(slot - 1))
            }
            (Phase::ForcedSwitch(_), Command::Default) => state
                .first_healthy_bench()
                .map(Action::Switch)
                .ok_or_else(|| "no healthy pokemon to switch in".to_string()),
            (phase, command) => Err(format!("{command:?} is not allowed during {}", phase.name())),
        }
    }

    fn ready(&self) -> bool {
        Side::BOTH.iter().all(|s| !self.awaiting_choice(*s))
    }

    fn resolve(&mut self) {
        match self.phase {
            Phase::TeamPreview => self.resolve_team_preview(),
            Phase::Move => self.resolve_turn(),
            Phase::ForcedSwitch(_) => self.resolve_forced_switches(),
            Phase::Setup | Phase::Ended => {}
        }
        self.pending = [None, None];
    }

    fn resolve_team_preview(&mut self) {
        for side in Side::BOTH {
            if let Some(Action::Team(order)) = self.pending[side.index()].take() {
                self.sides[side.index()].reorder(&order);
            }
        }
        self.push("|start".to_string());
        for side in Side::BOTH {
            self.log_switch(side);
        }
        self.begin_turn();
    }

    fn resolve_turn(&mut self) {
        struct Entry {
            side: Side,
            action: Action,
            priority: i32,
            speed: u32,
            tiebreak: u32,
        }

        let mut entries = Vec::with_capacity(2);
        for side in Side::BOTH {
            let Some(action) = self.pending[side.index()].take() else {
                continue;
            };
            let active = self.sides[side.index()].active();
            let priority = match action {
                Action::Move(idx) => i32::from(active.moves[idx].data.priority),
                Action::Switch(_) | Action::Team(_) => SWITCH_PRIORITY,
            };
            let speed = active.stats[SPE];
            let tiebreak = self.rng.gen();
            entries.push(Entry {
                side,
                action,
                priority,
                speed,
                tiebreak,
            });
        }
        entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.speed.cmp(&a.speed))
                .then(a.tiebreak.cmp(&b.tiebreak))
        });

        for entry in entries {
            match entry.action {
                Action::Switch(slot) => {
                    self.sides[entry.side.index()].active = slot;
                    self.log_switch(entry.side);
                }
                Action::Move(idx) => self.use_move(entry.side, idx),
                Action::Team(_) => {}
            }
            if self.phase == Phase::Ended {
                return;
            }
        }

        self.push("|upkeep".to_string());
        let needs = [
            self.sides[0].active().is_fainted(),
            self.sides[1].active().is_fainted(),
        ];
        if needs.iter().any(|n| *n) {
            self.phase = Phase::ForcedSwitch(needs);
        } else {
            self.begin_turn();
        }
    }

    fn resolve_forced_switches(&mut self) {
        for side in Side::BOTH {
            if let Some(Action::Switch(slot)) = self.pending[side.index()].take() {
                self.sides[side.index()].active = slot;
                self.log_switch(side);
            }
        }
        self.begin_turn();
    }

    fn begin_turn(&mut self) {
        self.turn += 1;
        self.push("|".to_string());
        self.push(format!("|turn|{}", self.turn));
        self.phase = Phase::Move;
    }

    fn log_switch(&mut self, side: Side) {
        let mon = self.sides[side.index()].active();
        let line = format!("|switch|{}|{}|{}", self.slot(side), mon.details(), mon.hp_token());
        self.push(line);
    }

    fn use_move(&mut self, side: Side, idx: usize) {
        let foe = side.opponent();
        if self.sides[side.index()].active().is_fainted() {
            return;
        }

        let data = {
            let slot = &mut self.sides[side.index()].active_mut().moves[idx];
            slot.pp = slot.pp.saturating_sub(1);
            slot.data
        };
        let user = self.slot(side);

        if data.category == Category::Status {
            self.push(format!("|move|{user}|{}|{user}", data.name));
            let max_hp = self.sides[side.index()].active().stats[HP];
            if data.effect != MoveEffect::HealHalf || !self.heal(side, max_hp / 2, "") {
                self.push(format!("|-fail|{user}"));
            }
            return;
        }

        let target = self.slot(foe);
        self.push(format!("|move|{user}|{}|{target}", data.name));

        if data.accuracy > 0 && self.rng.gen_range(0..100) >= data.accuracy {
            self.push(format!("|-miss|{user}|{target}"));
            return;
        }

        let eff = dex::effectiveness(data.kind, self.sides[foe.index()].active().species.types);
        if eff == 0 {
            self.push(format!("|-immune|{target}"));
            return;
        }

        let crit = self.rng.gen_ratio(1, CRIT_ODDS);
        let roll = self.rng.gen_range(85..=100);
        let damage = self.damage(side, data, eff, crit, roll);

        if crit {
            self.push(format!("|-crit|{target}"));
        }
        if eff > 4 {
            self.push(format!("|-supereffective|{target}"));
        } else if eff < 4 {
            self.push(format!("|-resisted|{target}"));
        }

        let dealt = {
            let defender = self.sides[foe.index()].active_mut();
            let dealt = damage.min(defender.hp);
            defender.hp -= dealt;
            dealt
        };
        let token = self.sides[foe.index()].active().hp_token();
        self.push(format!("|-damage|{target}|{token}"));

        if data.effect == MoveEffect::Drain && dealt > 0 {
            self.heal(side, (dealt / 2).max(1), "|[from] drain");
        }

        if self.sides[foe.index()].active().is_fainted() {
            self.push(format!("|faint|{target}"));
            if !self.sides[foe.index()].has_healthy() {
                self.finish(side);
            }
        }
    }

    /// Restores HP; returns false (and logs nothing) if already at full HP.
    fn heal(&mut self, side: Side, amount: u32, suffix: &str) -> bool {
        let mon = self.sides[side.index()].active_mut();
        if mon.hp >= mon.stats[HP] {
            return false;
        }
        mon.hp = (mon.hp + amount).min(mon.stats[HP]);
        let token = mon.hp_token();
        let line = format!("|-heal|{}|{token}{suffix}", self.slot(side));
        self.push(line);
        true
    }

    fn damage(&self, side: Side, data: &MoveData, eff: u32, crit: bool, roll: u32) -> u32 {
        let user = self.sides[side.index()].active();
        let foe = self.sides[side.opponent().index()].active();
        let (atk, def) = match data.category {
            Category::Physical => (user.stats[ATK], foe.stats[DEF]),
            Category::Special | Category::Status => (user.stats[SPA], foe.stats[SPD]),
        };

        let mut dmg = ((2 * user.level / 5 + 2) * data.power * atk / def.max(1)) / 50 + 2;
        if crit {
            dmg = dmg * 3 / 2;
        }
        dmg = dmg * roll / 100;
        if user.species.types.contains(&data.kind) {
            dmg = dmg * 3 / 2;
        }
        (dmg * eff / 4).max(1)
    }

    fn finish(&mut self, winner: Side) {
        let line = format!("|win|{}", self.sides[winner.index()].name);
        self.push(line);
        self.phase = Phase::Ended;
        debug!(%winner, turn = self.turn, "battle finished");
    }
}

impl SimulationEngine for ReferenceBattle {
    fn set_player(&mut self, side: Side, spec: &TeamSpec) -> Result<(), EngineError> {
        let reject = |reason: String| EngineError::PlayerRejected { side, reason };

        if self.phase != Phase::Setup {
            return Err(reject("the battle has already begun".to_string()));
        }
        if self.staged[side.index()].is_some() {
            return Err(reject("player is already set".to_string()));
        }
        spec.validate(side).map_err(|e| reject(e.to_string()))?;
        let party = spec.team.iter().map(Mon::from_set).collect::<Result<Vec<_>, _>>().map_err(&reject)?;

        self.push(format!("|player|{side}|{}|", spec.name));
        self.staged[side.index()] = Some(SideState {
            name: spec.name.clone(),
            party,
            active: 0,
        });

        if self.staged.iter().all(Option::is_some) {
            let [Some(p1), Some(p2)] = std::mem::take(&mut self.staged) else {
                return Ok(());
            };
            self.sides = vec![p1, p2];

            for side in Side::BOTH {
                let line = format!("|teamsize|{side}|{}", self.sides[side.index()].party.len());
                self.push(line);
            }
            self.push("|gen|9".to_string());
            self.push("|tier|[Gen 9] Custom Game".to_string());
            self.push("|clearpoke".to_string());
            for side in Side::BOTH {
                let lines: Vec<String> = self.sides[side.index()]
                    .party
                    .iter()
                    .map(|m| format!("|poke|{side}|{}|", m.details()))
                    .collect();
                self.log.extend(lines);
            }
            self.push("|teampreview".to_string());
            self.phase = Phase::TeamPreview;
        }
        Ok(())
    }

    fn choose(&mut self, side: Side, command: &str) -> Result<(), EngineError> {
        let illegal = |reason: String| EngineError::IllegalChoice {
            side,
            choice: command.to_string(),
            reason,
        };

        match self.phase {
            Phase::Setup => return Err(illegal("players have not joined yet".to_string())),
            Phase::Ended => return Err(illegal("the battle is over".to_string())),
            _ => {}
        }
        if !self.awaiting_choice(side) {
            return Err(illegal(format!("no decision is pending for {side}")));
        }

        let parsed = choice::parse(command).map_err(&illegal)?;
        let action = self.validate(side, parsed).map_err(&illegal)?;
        debug!(%side, command, turn = self.turn, "choice accepted");
        self.pending[side.index()] = Some(action);

        if self.ready() {
            self.resolve();
        }
        Ok(())
    }

    fn log(&self) -> &[String] {
        &self.log
    }

    fn turn(&self) -> u32 {
        self.turn
    }

    fn awaiting_choice(&self, side: Side) -> bool {
        let idx = side.index();
        let required = match self.phase {
            Phase::TeamPreview | Phase::Move => true,
            Phase::ForcedSwitch(needs) => needs[idx],
            Phase::Setup | Phase::Ended => false,
        };
        required && self.pending[idx].is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::samples;

    fn started(seed: [u32; 4]) -> ReferenceBattle {
        let mut b = ReferenceBattle::new(MatchSeed::new(seed));
        b.set_player(Side::P1, &samples::fire_starter()).unwrap();
        b.set_player(Side::P2, &samples::water_starter()).unwrap();
        b
    }

    fn has_line(b: &ReferenceBattle, line: &str) -> bool {
        b.log().iter().any(|l| l == line)
    }

    #[test]
    fn test_team_preview_then_turn_one() {
        let mut b = started([1, 2, 3, 4]);
        assert!(has_line(&b, "|teampreview"));
        assert_eq!(b.turn(), 0);
        assert!(b.awaiting_choice(Side::P1));

        b.choose(Side::P1, "team 1").unwrap();
        assert!(!b.awaiting_choice(Side::P1));
        assert!(b.awaiting_choice(Side::P2));
        assert_eq!(b.turn(), 0);

        b.choose(Side::P2, "team 1").unwrap();
        assert_eq!(b.turn(), 1);
        assert!(has_line(&b, "|turn|1"));
        assert!(b.log().iter().any(|l| l.starts_with("|switch|p1a: Sparky|Charmander, L50, M|")));
    }

    #[test]
    fn test_fire_vs_water_markers() {
        let mut b = started([1, 2, 3, 4]);
        b.choose(Side::P1, "team 1").unwrap();
        b.choose(Side::P2, "team 1").unwrap();
        b.choose(Side::P1, "move ember").unwrap();
        b.choose(Side::P2, "move watergun").unwrap();

        assert!(has_line(&b, "|-resisted|p2a: Splashy"));
        assert!(has_line(&b, "|-supereffective|p1a: Sparky"));
        assert_eq!(b.turn(), 2);
    }

    #[test]
    fn test_illegal_choices_leave_state_untouched() {
        let mut b = started([1, 2, 3, 4]);
        let before = b.log().len();

        let err = b.choose(Side::P1, "move 1").unwrap_err();
        assert!(matches!(err, EngineError::IllegalChoice { side: Side::P1, .. }));

        b.choose(Side::P1, "team 1").unwrap();
        b.choose(Side::P2, "team 1").unwrap();
        let turn = b.turn();

        for bad in ["move 3", "move hyperbeam", "switch 1", "switch 2", "team 1", "dance"] {
            assert!(b.choose(Side::P1, bad).is_err(), "{bad} should be illegal");
        }
        assert_eq!(b.turn(), turn);
        assert!(b.log().len() > before);
        assert!(b.awaiting_choice(Side::P1));
    }

    #[test]
    fn test_double_submission_rejected() {
        let mut b = started([1, 2, 3, 4]);
        b.choose(Side::P1, "team 1").unwrap();
        assert!(b.choose(Side::P1, "team 1").is_err());
    }

    #[test]
    fn test_players_must_be_set_first() {
        let mut b = ReferenceBattle::new(MatchSeed::new([0, 0, 0, 0]));
        assert!(b.choose(Side::P1, "team 1").is_err());
        b.set_player(Side::P1, &samples::fire_starter()).unwrap();
        assert!(b.set_player(Side::P1, &samples::fire_starter()).is_err());
    }

    #[test]
    fn test_unknown_species_rejected() {
        let mut b = ReferenceBattle::new(MatchSeed::new([0, 0, 0, 0]));
        let spec = TeamSpec::new("Player 1", vec![PokemonSet::new("Mew", "mew", &["tackle"])]);
        let err = b.set_player(Side::P1, &spec).unwrap_err();
        assert!(matches!(err, EngineError::PlayerRejected { .. }));
        assert!(b.log().is_empty());
    }

    #[test]
    fn test_same_seed_same_log() {
        let play = |seed| {
            let mut b = ReferenceBattle::new(MatchSeed::new(seed));
            b.set_player(Side::P1, &samples::full_p1()).unwrap();
            b.set_player(Side::P2, &samples::full_p2()).unwrap();
            b.choose(Side::P1, "team 123456").unwrap();
            b.choose(Side::P2, "team 123456").unwrap();
            for _ in 0..5 {
                for side in Side::BOTH {
                    if b.awaiting_choice(side) {
                        b.choose(side, "default").unwrap();
                    }
                }
            }
            b.log().to_vec()
        };
        assert_eq!(play([7, 7, 7, 7]), play([7, 7, 7, 7]));
    }

    #[test]
    fn test_battle_runs_to_a_winner_with_defaults() {
        let mut b = started([3, 1, 4, 1]);
        b.choose(Side::P1, "default").unwrap();
        b.choose(Side::P2, "default").unwrap();
        for _ in 0..200 {
            if b.is_ended() {
                break;
            }
            for side in Side::BOTH {
                if b.awaiting_choice(side) {
                    b.choose(side, "default").unwrap();
                }
            }
        }
        assert!(b.is_ended());
        assert!(b.log().last().unwrap().starts_with("|win|"));
        assert!(b.choose(Side::P1, "move 1").is_err());
    }

    #[test]
    fn test_damage_formula_reference_values() {
        let b = {
            let mut b = started([1, 1, 1, 1]);
            b.choose(Side::P1, "team 1").unwrap();
            b.choose(Side::P2, "team 1").unwrap();
            b
        };
        let ember = dex::find_move("ember").unwrap();
        // 22 * 40 * 80 / 84 / 50 + 2 = 18, full roll, 1.5x STAB, 0.5x resisted.
        assert_eq!(b.damage(Side::P1, ember, 2, false, 100), 13);
        assert_eq!(b.active_hp(Side::P2), Some((119, 119)));
    }
}
