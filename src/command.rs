use std::path::Path;

use tracing::warn;

use crate::frame::Slot;
use crate::{Result, WallError};

/// A parsed console or config-file command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bind (or, with an empty URL, clear) a slot's source.
    SetUrl { slot: Slot, url: String },
    /// Re-read the config file and reapply its `url` lines.
    Reload,
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "\
Console commands:
  url <1..4> <url>   set the source URL for a slot; <url> may be $VAR
  url <1..4>         clear the slot (tears down its decoder)
  cfg                reload URLs from the config file
  q | quit           exit
  help               show this message";

/// Parse one line of input. Blank lines and `#` comments yield `Ok(None)`;
/// malformed input is an error and must leave all state unchanged.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let mut tokens = line.split_whitespace();
    let Some(first) = tokens.next() else {
        return Ok(None);
    };
    if first.starts_with('#') {
        return Ok(None);
    }

    match first {
        "url" => {
            let number = tokens
                .next()
                .ok_or_else(|| WallError::InvalidCommand(line.to_string()))?;
            let number: u32 = number
                .parse()
                .map_err(|_| WallError::InvalidCommand(line.to_string()))?;
            let slot = match number {
                1..=4 => Slot::from_index(number as usize - 1),
                _ => None,
            }
            .ok_or(WallError::InvalidSlot(number))?;

            let url = tokens.next().map(resolve_value).unwrap_or_default();
            Ok(Some(Command::SetUrl { slot, url }))
        }
        "cfg" => Ok(Some(Command::Reload)),
        "help" => Ok(Some(Command::Help)),
        "q" | "quit" => Ok(Some(Command::Quit)),
        _ => Err(WallError::InvalidCommand(line.to_string())),
    }
}

/// `$VARNAME` substitutes the named environment variable's value; an unset
/// variable resolves to an empty URL, which clears the slot.
fn resolve_value(value: &str) -> String {
    match value.strip_prefix('$') {
        Some(name) => std::env::var(name).unwrap_or_default(),
        None => value.to_string(),
    }
}

/// Re-read a config source and return its `url` assignments in file order.
/// Anything that is not a `url` line, a comment or blank is reported and
/// skipped.
pub fn read_config(path: &Path) -> Result<Vec<Command>> {
    let contents = std::fs::read_to_string(path)?;
    let mut commands = Vec::new();
    for line in contents.lines() {
        match parse_line(line) {
            Ok(Some(command @ Command::SetUrl { .. })) => commands.push(command),
            Ok(None) => {}
            Ok(Some(_)) | Err(_) => warn!("Wrong config line: {}", line),
        }
    }
    Ok(commands)
}
