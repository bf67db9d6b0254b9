//! Choice command grammar.
//!
//! ```text
//! team 213        lead order for team preview (1-based slots)
//! move 1          move by slot
//! move ember      move by id or name
//! switch 3        switch to party slot 3
//! default         engine picks the first legal option
//! ```

use super::dex::to_id;

/// Reference to a move in a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRef {
    /// 1-based move slot.
    Slot(usize),
    /// Move id.
    Id(String),
}

/// A parsed command, not yet checked against the battle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 1-based party slots in the requested order.
    Team(Vec<usize>),
    /// Use a move.
    Move(MoveRef),
    /// Switch to a 1-based party slot.
    Switch(usize),
    /// Let the engine decide.
    Default,
}

/// Parses a raw command.
///
/// # Errors
///
/// Returns a human-readable reason when the text does not match the grammar.
pub fn parse(raw: &str) -> Result<Command, String> {
    let raw = raw.trim();
    let (verb, arg) = raw.split_once(char::is_whitespace).unwrap_or((raw, ""));
    let arg = arg.trim();

    match verb {
        "team" => {
            if arg.is_empty() {
                return Err("team order is empty".to_string());
            }
            let slots = arg
                .chars()
                .filter(|c| !c.is_whitespace() && *c != ',')
                .map(|c| {
                    c.to_digit(10)
                        .map(|d| d as usize)
                        .filter(|d| *d > 0)
                        .ok_or_else(|| format!("invalid team slot '{c}'"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Team(slots))
        }
        "move" => {
            if arg.is_empty() {
                return Err("move needs a slot or a name".to_string());
            }
            match arg.parse::<usize>() {
                Ok(0) => Err("move slots start at 1".to_string()),
                Ok(slot) => Ok(Command::Move(MoveRef::Slot(slot))),
                Err(_) => Ok(Command::Move(MoveRef::Id(to_id(arg)))),
            }
        }
        "switch" => match arg.parse::<usize>() {
            Ok(0) | Err(_) => Err(format!("invalid switch slot '{arg}'")),
            Ok(slot) => Ok(Command::Switch(slot)),
        },
        "default" if arg.is_empty() => Ok(Command::Default),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command '{other}'")),
    }
}
