//! Text commands typed into the shell, mapped to viewer messages.

use std::path::PathBuf;

use fem_shell_core::Msg;

use super::constants::HELP_LINES;
use crate::platform::app::ShellEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Load(PathBuf),
    Execute,
    Abort,
    Save(PathBuf),
    Status,
    Help,
    Quit,
    Usage(&'static str),
    Unknown(String),
    Empty,
}

pub(crate) fn parse(line: &str) -> Command {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "open" | "load" | "new" if rest.is_empty() => Command::Usage("open <path>"),
        "open" | "load" | "new" => Command::Load(PathBuf::from(unquote(rest))),
        "run" | "execute" => Command::Execute,
        "abort" | "stop" => Command::Abort,
        "save" if rest.is_empty() => Command::Usage("save <path>"),
        "save" => Command::Save(PathBuf::from(unquote(rest))),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(word.to_string()),
    }
}

/// Strips one pair of matching quotes so paths with spaces can be typed.
fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

pub(crate) fn into_events(command: Command) -> Vec<ShellEvent> {
    let msgs = match command {
        Command::Load(path) => vec![Msg::InputLoaded(path)],
        Command::Execute => vec![Msg::ExecuteRequested],
        Command::Abort => vec![Msg::AbortRequested],
        Command::Save(path) => vec![Msg::SaveLogRequested(path)],
        Command::Status => vec![Msg::StatusRequested],
        Command::Help => HELP_LINES
            .iter()
            .map(|line| Msg::Notice((*line).to_string()))
            .collect(),
        Command::Quit => return vec![ShellEvent::Quit],
        Command::Usage(usage) => vec![Msg::Notice(format!("Usage: {usage}"))],
        Command::Unknown(word) => vec![Msg::Notice(format!(
            "Unknown command `{word}`; type `help` for a list."
        ))],
        Command::Empty => Vec::new(),
    };
    msgs.into_iter().map(ShellEvent::Msg).collect()
}
