//! Line commands understood by the host loop.

use std::fmt;

use crate::core::address::Address;
use crate::core::identity::Prop;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// External arrival: deep-link handling and strategy apply.
    Open(Address),
    /// In-app navigation: always pushes.
    Push(Address),
    Pop(Option<Prop>),
    Back,
    Lock,
    Unlock,
    Show,
    Json,
    Diag,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    MissingAddress(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown(word) => write!(f, "unknown command '{word}' (try 'help')"),
            CommandError::MissingAddress(cmd) => write!(f, "'{cmd}' needs an address"),
        }
    }
}

impl std::error::Error for CommandError {}

pub const HELP: &str = "\
open <address>   deep link (handler or strategy)
push <address>   navigate in-app
pop [value]      pop the active stack, optionally with a result
back             system back
lock | unlock    toggle guards on guarded routes
show             list every path
json             dump a snapshot as JSON
diag             report claim problems
quit";

/// Integers become `Prop::Int`, everything else a string.
fn pop_value(raw: &str) -> Prop {
    raw.parse::<i64>().map_or_else(|_| Prop::from(raw), Prop::Int)
}

/// `Ok(None)` for blank lines and `#` comments.
pub fn parse_command(line: &str) -> Result<Option<HostCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let address = |cmd: &'static str| {
        if rest.is_empty() {
            Err(CommandError::MissingAddress(cmd))
        } else {
            Ok(Address::parse(rest))
        }
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "open" => HostCommand::Open(address("open")?),
        "push" | "go" => HostCommand::Push(address("push")?),
        "pop" => HostCommand::Pop((!rest.is_empty()).then(|| pop_value(rest))),
        "back" => HostCommand::Back,
        "lock" => HostCommand::Lock,
        "unlock" => HostCommand::Unlock,
        "show" | "ls" => HostCommand::Show,
        "json" => HostCommand::Json,
        "diag" => HostCommand::Diag,
        "help" | "?" => HostCommand::Help,
        "quit" | "exit" => HostCommand::Quit,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("# setup"), Ok(None));
    }

    #[test]
    fn test_address_commands() {
        assert_eq!(
            parse_command("open app://x/users/7?tab=a"),
            Ok(Some(HostCommand::Open(Address::parse("/users/7?tab=a"))))
        );
        assert_eq!(
            parse_command("PUSH  /home "),
            Ok(Some(HostCommand::Push(Address::parse("/home"))))
        );
        assert_eq!(parse_command("open"), Err(CommandError::MissingAddress("open")));
    }

    #[test]
    fn test_pop_value() {
        assert_eq!(parse_command("pop"), Ok(Some(HostCommand::Pop(None))));
        assert_eq!(
            parse_command("pop 42"),
            Ok(Some(HostCommand::Pop(Some(Prop::Int(42)))))
        );
        assert_eq!(
            parse_command("pop saved draft"),
            Ok(Some(HostCommand::Pop(Some(Prop::from("saved draft")))))
        );
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_command("teleport /x").unwrap_err();
        assert_eq!(err, CommandError::Unknown("teleport".to_string()));
        assert!(err.to_string().contains("help"));
    }
}
