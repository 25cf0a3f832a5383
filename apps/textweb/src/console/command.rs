//! Parsing of console input lines.

use core::fmt;
use tw_core::SearchEngine;

pub(crate) const DEFAULT_VISIT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProxyCommand {
    On,
    Off,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Empty,
    Open(String),
    Follow(usize),
    Back,
    Forward,
    Reload,
    History,
    Block {
        domain: String,
        reason: Option<String>,
    },
    Unblock(String),
    Blocklist,
    Visits(usize),
    Bookmark(Option<String>),
    Unbookmark,
    Bookmarks,
    Proxy(ProxyCommand),
    Engine(SearchEngine),
    Help,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommandError {
    MissingArgument { usage: &'static str },
    InvalidArgument { usage: &'static str, value: String },
    Unknown(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument { usage } => write!(f, "Usage: {usage}"),
            Self::InvalidArgument { usage, value } => {
                write!(f, "Invalid argument `{value}`. Usage: {usage}")
            }
            Self::Unknown(command) => write!(
                f,
                "Unknown command: {command}\nType 'open [url]' to navigate, 'help' for commands, or 'exit' to quit"
            ),
        }
    }
}

impl std::error::Error for CommandError {}

pub(crate) fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }

    if let Ok(id) = line.parse::<usize>() {
        return Ok(Command::Follow(id));
    }

    let (name, argument) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let argument = (!argument.is_empty()).then_some(argument);

    match name.to_ascii_lowercase().as_str() {
        "open" | "go" => required(argument, "open <url|search text>")
            .map(|target| Command::Open(target.to_owned())),
        "follow" | "link" => {
            let usage = "follow <n>";
            let value = required(argument, usage)?;
            parse_number(value, usage).map(Command::Follow)
        }
        "back" => Ok(Command::Back),
        "forward" => Ok(Command::Forward),
        "reload" | "refresh" => Ok(Command::Reload),
        "history" => Ok(Command::History),
        "block" => {
            let value = required(argument, "block <domain> [reason]")?;
            let (domain, reason) = match value.split_once(char::is_whitespace) {
                Some((domain, reason)) => (domain, Some(reason.trim().to_owned())),
                None => (value, None),
            };
            Ok(Command::Block {
                domain: domain.to_owned(),
                reason,
            })
        }
        "unblock" => required(argument, "unblock <domain>")
            .map(|domain| Command::Unblock(domain.to_owned())),
        "blocklist" => Ok(Command::Blocklist),
        "visits" => match argument {
            Some(value) => parse_number(value, "visits [limit]").map(Command::Visits),
            None => Ok(Command::Visits(DEFAULT_VISIT_LIMIT)),
        },
        "bookmark" => Ok(Command::Bookmark(argument.map(str::to_owned))),
        "unbookmark" => Ok(Command::Unbookmark),
        "bookmarks" => Ok(Command::Bookmarks),
        "proxy" => {
            let usage = "proxy on|off|status";
            match argument.map(str::to_ascii_lowercase).as_deref() {
                Some("on") => Ok(Command::Proxy(ProxyCommand::On)),
                Some("off") => Ok(Command::Proxy(ProxyCommand::Off)),
                Some("status") | None => Ok(Command::Proxy(ProxyCommand::Status)),
                Some(other) => Err(CommandError::InvalidArgument {
                    usage,
                    value: other.to_owned(),
                }),
            }
        }
        "engine" => {
            let usage = "engine google|duckduckgo";
            let value = required(argument, usage)?;
            value
                .parse::<SearchEngine>()
                .map(Command::Engine)
                .map_err(|_| CommandError::InvalidArgument {
                    usage,
                    value: value.to_owned(),
                })
        }
        "help" | "?" => Ok(Command::Help),
        "exit" | "quit" => Ok(Command::Exit),
        other => Err(CommandError::Unknown(other.to_owned())),
    }
}

fn required<'a>(argument: Option<&'a str>, usage: &'static str) -> Result<&'a str, CommandError> {
    argument.ok_or(CommandError::MissingArgument { usage })
}

fn parse_number(value: &str, usage: &'static str) -> Result<usize, CommandError> {
    value
        .parse::<usize>()
        .ok()
        .filter(|number| *number > 0)
        .ok_or_else(|| CommandError::InvalidArgument {
            usage,
            value: value.to_owned(),
        })
}
