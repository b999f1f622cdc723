//! Text input and interactive playback commands.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::error::CliError;

/// Read the whole text from `file`, or from stdin when `None`.
pub fn read_text(file: Option<&Path>) -> Result<String, CliError> {
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{}: {e}", path.display()))),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// A playback command typed during `narrate speak --interactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Pause,
    Resume,
    /// Restart at a sentence index.
    Jump(usize),
    Stop,
    Quit,
    Help,
}

pub const CONTROL_HELP: &str = "commands: p = pause, r = resume, j N = jump to sentence N, \
                                s = stop, q = quit, ? = help";

impl Control {
    /// Parse one input line. Returns `None` for blank lines, and an error
    /// message for anything unrecognised.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let mut words = line.split_whitespace();
        let command = words.next()?;

        let parsed = match command.to_ascii_lowercase().as_str() {
            "p" | "pause" => Ok(Self::Pause),
            "r" | "resume" => Ok(Self::Resume),
            "s" | "stop" => Ok(Self::Stop),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            "?" | "h" | "help" => Ok(Self::Help),
            "j" | "jump" => match words.next().map(str::parse::<usize>) {
                Some(Ok(index)) => Ok(Self::Jump(index)),
                Some(Err(_)) => Err(format!("not a sentence index: {line:?}")),
                None => Err("jump needs a sentence index, e.g. `j 3`".to_string()),
            },
            _ => Err(format!("unknown command {command:?} ({CONTROL_HELP})")),
        };
        Some(parsed)
    }
}
