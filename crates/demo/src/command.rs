// Prompt commands: `<1-3> load|play|stop`, `status`, `wait`, `help`, `quit`

use crate::panel::Control;
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  <1-3> load|play|stop   press a control on a panel
  status                 show every panel
  wait                   wait for pending loads
  help                   show this text
  quit                   exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `panel` is zero-based
    Press { panel: usize, control: Control },
    Status,
    Wait,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("panel must be 1-3, got {0}")]
    Panel(String),

    #[error("unknown control: {0} (expected load, play or stop)")]
    Control(String),

    #[error("missing control after panel {0}")]
    MissingControl(usize),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut words = input.split_whitespace();
        let first = words.next().ok_or(ParseCommandError::Empty)?;

        let command = match first.to_ascii_lowercase().as_str() {
            "status" | "s" => Command::Status,
            "wait" | "w" => Command::Wait,
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            word if word.chars().all(|c| c.is_ascii_digit()) => {
                let panel = match word.parse::<usize>() {
                    Ok(n @ 1..=3) => n - 1,
                    _ => return Err(ParseCommandError::Panel(word.to_string())),
                };
                let control = words
                    .next()
                    .ok_or(ParseCommandError::MissingControl(panel + 1))?;
                let control = match control.to_ascii_lowercase().as_str() {
                    "load" => Control::Load,
                    "play" => Control::Play,
                    "stop" => Control::Stop,
                    other => return Err(ParseCommandError::Control(other.to_string())),
                };
                Command::Press { panel, control }
            }
            other => return Err(ParseCommandError::Unknown(other.to_string())),
        };

        match words.next() {
            Some(extra) => Err(ParseCommandError::Unknown(extra.to_string())),
            None => Ok(command),
        }
    }
}

/// Split a `;`-separated script into commands, skipping blanks
pub fn parse_script(script: &str) -> Result<Vec<Command>, ParseCommandError> {
    script
        .split(';')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect()
}
