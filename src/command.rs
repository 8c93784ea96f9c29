//! Line-oriented control commands and their effect on the engine.

use crate::engine::{GoalConfirmation, TimerEngine};
use crate::models::{SettingsUpdate, TimerMode, ValidationError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: {0}")]
    NotANumber(String),
}

/// A request from the controlling terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Pause,
    Reset,
    Switch(TimerMode),
    Settings(SettingsUpdate),
    Goal(u32),
    Status,
    Quit,
}

impl Command {
    /// Parses one input line such as `start`, `long` or `set focus 50`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();

        let command = match head.as_str() {
            "start" | "resume" => Command::Start,
            "pause" => Command::Pause,
            "reset" => Command::Reset,
            "focus" => Command::Switch(TimerMode::Focus),
            "short" => Command::Switch(TimerMode::ShortBreak),
            "long" => Command::Switch(TimerMode::LongBreak),
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            "goal" => {
                let minutes = words.next().ok_or(CommandError::Usage("goal <minutes>"))?;
                Command::Goal(number(minutes)?)
            }
            "set" => {
                const USAGE: &str = "set <focus|short|long|cycle> <n>";
                let field = words.next().ok_or(CommandError::Usage(USAGE))?;
                let value = number(words.next().ok_or(CommandError::Usage(USAGE))?)?;
                let update = match field {
                    "focus" => SettingsUpdate::duration(TimerMode::Focus, value),
                    "short" => SettingsUpdate::duration(TimerMode::ShortBreak, value),
                    "long" => SettingsUpdate::duration(TimerMode::LongBreak, value),
                    "cycle" => SettingsUpdate::cycle(value),
                    _ => return Err(CommandError::Usage(USAGE)),
                };
                Command::Settings(update)
            }
            _ => return Err(CommandError::Unknown(head)),
        };

        Ok(command)
    }
}

fn number(word: &str) -> Result<u32, CommandError> {
    word.parse()
        .map_err(|_| CommandError::NotANumber(word.to_string()))
}

/// Result of applying a command.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// User requested quit.
    Quit,
    /// Timer or settings changed, status needs reprinting.
    StateChanged,
    /// The daily goal was updated.
    GoalUpdated(GoalConfirmation),
    /// The engine refused the change.
    Rejected(ValidationError),
}

/// Applies a command to the engine.
pub fn apply(engine: &mut TimerEngine, command: Command) -> EventResult {
    match command {
        Command::Start => {
            engine.start();
            EventResult::StateChanged
        }
        Command::Pause => {
            engine.pause();
            EventResult::StateChanged
        }
        Command::Reset => {
            engine.reset();
            EventResult::StateChanged
        }
        Command::Switch(mode) => {
            engine.switch_mode(mode);
            EventResult::StateChanged
        }
        Command::Settings(update) => match engine.update_settings(update) {
            Ok(()) => EventResult::StateChanged,
            Err(e) => EventResult::Rejected(e),
        },
        Command::Goal(minutes) => match engine.update_daily_goal(minutes) {
            Ok(confirmation) => EventResult::GoalUpdated(confirmation),
            Err(e) => EventResult::Rejected(e),
        },
        Command::Status => {
            engine.refresh_day();
            EventResult::StateChanged
        }
        Command::Quit => EventResult::Quit,
    }
}
