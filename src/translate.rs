//! Log translation: engine log lines to typed [`BattleEvent`]s.
//!
//! The engine is a black box exposing an append-only, line-oriented,
//! `|`-delimited log. This module is written against that grammar only:
//!
//! ```text
//! |move|p1a: Sparky|Ember|p2a: Splashy
//! |-resisted|p2a: Splashy
//! |-damage|p2a: Splashy|88/110
//! |faint|p2a: Splashy
//! |turn|2
//! |win|Player 1
//! ```
//!
//! Unknown line types are skipped and counted, never treated as errors, so a
//! newer engine can add line kinds without breaking older translators.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::event::{BattleEvent, EventQueue, TextCue};
use crate::side::Combatant;

/// Version of the log grammar this translator understands.
pub const LOG_GRAMMAR_VERSION: u32 = 1;

/// Level assumed when a switch line carries no `L<n>` detail.
const DEFAULT_LEVEL: u8 = 100;

/// Counters describing what the translator has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslatorStats {
    /// Lines considered (every line is considered exactly once).
    pub lines_seen: u64,
    /// Events produced.
    pub events_emitted: u64,
    /// Damage/heal lines deliberately dropped because they report a faint.
    pub suppressed: u64,
    /// Unrecognized or malformed lines.
    pub parse_skips: u64,
    /// Turn lines that did not follow the previous turn by exactly one.
    pub turn_anomalies: u64,
}

/// Result of parsing a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line maps to an event.
    Event(BattleEvent),
    /// The line was understood but intentionally produces no event.
    Suppressed,
    /// The line type is unknown or its fields are malformed.
    Unrecognized,
}

/// Incremental translator holding the cursor into one engine's log.
#[derive(Debug, Default)]
pub struct LogTranslator {
    cursor: usize,
    last_turn: Option<u32>,
    stats: TranslatorStats,
}

impl LogTranslator {
    /// Creates a translator positioned at the start of the log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next log line to consider.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> TranslatorStats {
        self.stats
    }

    /// Consider every line appended since the last call.
    ///
    /// `visit` receives each new line together with the event it produced, if
    /// any. The cursor advances by exactly the number of lines visited, which
    /// is also the return value.
    pub fn advance<F>(&mut self, log: &[String], mut visit: F) -> usize
    where
        F: FnMut(&str, Option<BattleEvent>),
    {
        let Some(fresh) = log.get(self.cursor..) else {
            warn!(
                cursor = self.cursor,
                log_len = log.len(),
                "engine log is shorter than the translator cursor"
            );
            return 0;
        };

        for line in fresh {
            let event = self.translate(line);
            visit(line, event);
        }

        self.cursor += fresh.len();
        fresh.len()
    }

    /// Translate all new lines straight into `queue`.
    pub fn drain_into(&mut self, log: &[String], queue: &mut EventQueue) -> usize {
        self.advance(log, |_, event| {
            if let Some(event) = event {
                queue.add(event);
            }
        })
    }

    fn translate(&mut self, line: &str) -> Option<BattleEvent> {
        self.stats.lines_seen += 1;

        match parse_line(line) {
            LineOutcome::Event(event) => {
                if let BattleEvent::Turn { number } = event {
                    self.check_turn(number);
                }
                self.stats.events_emitted += 1;
                Some(event)
            }
            LineOutcome::Suppressed => {
                self.stats.suppressed += 1;
                None
            }
            LineOutcome::Unrecognized => {
                self.stats.parse_skips += 1;
                debug!(line, "skipping unrecognized log line");
                None
            }
        }
    }

    fn check_turn(&mut self, number: u32) {
        let expected = self.last_turn.map_or(1, |t| t.saturating_add(1));
        if number != expected {
            self.stats.turn_anomalies += 1;
            warn!(expected, got = number, "turn numbers are not consecutive");
        }
        self.last_turn = Some(number);
    }
}

/// Parse one raw log line.
///
/// This is a pure function; the cursor and counters live in [`LogTranslator`].
#[must_use]
pub fn parse_line(line: &str) -> LineOutcome {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 2 {
        return LineOutcome::Unrecognized;
    }

    let parsed = match parts[1] {
        "move" => parse_move(&parts),
        "-damage" => return parse_hp_change(&parts, false),
        "-heal" => return parse_hp_change(&parts, true),
        "faint" => field(&parts, 2)
            .and_then(Combatant::parse_slot)
            .map(|target| BattleEvent::Faint { target }),
        "switch" | "drag" | "replace" => parse_switch(&parts),
        "turn" => field(&parts, 2)
            .and_then(|n| n.trim().parse::<u32>().ok())
            .map(|number| BattleEvent::Turn { number }),
        "win" => field(&parts, 2)
            .filter(|w| !w.trim().is_empty())
            .map(|w| BattleEvent::Win {
                winner: w.trim().to_string(),
            }),
        "-supereffective" => parse_marker(&parts, TextCue::SuperEffective, 2),
        "-resisted" => parse_marker(&parts, TextCue::Resisted, 2),
        "-immune" => parse_marker(&parts, TextCue::Immune, 2),
        "-crit" => parse_marker(&parts, TextCue::CriticalHit, 2),
        "-fail" => parse_marker(&parts, TextCue::Fail, 2),
        // |-miss|SOURCE|TARGET: the target is the one that avoided the hit.
        "-miss" => parse_marker(&parts, TextCue::Miss, 3).or_else(|| parse_marker(&parts, TextCue::Miss, 2)),
        "message" | "-message" => parts.get(2..).filter(|rest| !rest.is_empty()).map(|rest| BattleEvent::Text {
            cue: TextCue::Message,
            subject: None,
            message: rest.join("|"),
        }),
        _ => None,
    };

    parsed.map_or(LineOutcome::Unrecognized, LineOutcome::Event)
}

fn field<'a>(parts: &[&'a str], idx: usize) -> Option<&'a str> {
    parts.get(idx).copied()
}

fn parse_move(parts: &[&str]) -> Option<BattleEvent> {
    let actor = Combatant::parse_slot(field(parts, 2)?)?;
    let move_name = field(parts, 3)?.trim();
    if move_name.is_empty() {
        return None;
    }
    let target = field(parts, 4).and_then(Combatant::parse_slot);
    Some(BattleEvent::Move {
        actor,
        move_name: move_name.to_string(),
        target,
    })
}

fn parse_hp_change(parts: &[&str], heal: bool) -> LineOutcome {
    let Some(target) = field(parts, 2).and_then(Combatant::parse_slot) else {
        return LineOutcome::Unrecognized;
    };
    let Some(hp) = field(parts, 3).and_then(HpToken::parse) else {
        return LineOutcome::Unrecognized;
    };

    // Faints are reported by their own line, never inferred from HP.
    if hp.fainted || hp.current == 0 {
        return LineOutcome::Suppressed;
    }
    let Some(max_hp) = hp.max else {
        return LineOutcome::Unrecognized;
    };

    let pct = hp_percent(hp.current, max_hp);
    let event = if heal {
        BattleEvent::Heal {
            target,
            hp: hp.current,
            max_hp,
            pct,
        }
    } else {
        BattleEvent::Damage {
            target,
            hp: hp.current,
            max_hp,
            pct,
        }
    };
    LineOutcome::Event(event)
}

fn parse_switch(parts: &[&str]) -> Option<BattleEvent> {
    let target = Combatant::parse_slot(field(parts, 2)?)?;
    let mut details = field(parts, 3)?.split(',').map(str::trim);
    let species = details.next().filter(|s| !s.is_empty())?.to_string();
    let level = details
        .find_map(|d| d.strip_prefix('L').and_then(|l| l.parse::<u8>().ok()))
        .unwrap_or(DEFAULT_LEVEL);
    let hp = HpToken::parse(field(parts, 4)?)?;
    Some(BattleEvent::Switch {
        target,
        species,
        level,
        hp: hp.current,
        max_hp: hp.max.unwrap_or(0),
    })
}

fn parse_marker(parts: &[&str], cue: TextCue, idx: usize) -> Option<BattleEvent> {
    let subject = Combatant::parse_slot(field(parts, idx)?)?;
    let message = cue.render(Some(&subject));
    Some(BattleEvent::Text {
        cue,
        subject: Some(subject),
        message,
    })
}

/// `floor(current / max * 100)`, with a zero max reported as 0%.
#[must_use]
pub fn hp_percent(current: u32, max: u32) -> u8 {
    if max == 0 {
        return 0;
    }
    let pct = (u64::from(current) * 100 / u64::from(max)).min(100);
    u8::try_from(pct).unwrap_or(100)
}

/// A parsed `current/max[ status]` HP token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HpToken {
    current: u32,
    max: Option<u32>,
    fainted: bool,
}

impl HpToken {
    fn parse(token: &str) -> Option<Self> {
        static HP_RE: OnceLock<Regex> = OnceLock::new();
        let re = HP_RE.get_or_init(|| {
            Regex::new(r"^(\d+)(?:/(\d+))?(?:\s+([a-z]+))?$").expect("HP token regex is valid")
        });

        let caps = re.captures(token.trim())?;
        let current = caps.get(1)?.as_str().parse().ok()?;
        let max = match caps.get(2) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        let fainted = caps.get(3).is_some_and(|s| s.as_str() == "fnt");
        Some(Self { current, max, fainted })
    }
}
