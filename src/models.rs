//! Data models for the study timer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Shortest and longest duration (in minutes) any mode may be configured to.
pub const MIN_DURATION_MINS: u32 = 1;
pub const MAX_DURATION_MINS: u32 = 120;

/// Daily goal used when the goal store has nothing for the user.
pub const DEFAULT_DAILY_GOAL_MINS: u32 = 120;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be between 1 and 120 minutes, got {value}")]
    DurationOutOfRange { field: &'static str, value: u32 },
    #[error("sessionsBeforeLongBreak must be at least 1")]
    ZeroCycleLength,
    #[error("daily goal must be at least 1 minute")]
    ZeroDailyGoal,
    #[error("unknown timer mode: {0}")]
    UnknownMode(String),
}

/// The three kinds of countdown the timer can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    /// The literal stored in the `session_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak => "short_break",
            Self::LongBreak => "long_break",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Focus => "Focus",
            Self::ShortBreak => "Short Break",
            Self::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(Self::Focus),
            "short_break" => Ok(Self::ShortBreak),
            "long_break" => Ok(Self::LongBreak),
            other => Err(ValidationError::UnknownMode(other.to_string())),
        }
    }
}

/// User-configurable durations and long-break cadence.
///
/// Serialized in camelCase so the stored JSON keeps the
/// `{focusDuration, shortBreakDuration, longBreakDuration, sessionsBeforeLongBreak}` shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Focus session length in minutes.
    pub focus_duration: u32,
    /// Short break length in minutes.
    pub short_break_duration: u32,
    /// Long break length in minutes.
    pub long_break_duration: u32,
    /// Completed focus sessions between long breaks.
    pub sessions_before_long_break: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            sessions_before_long_break: 4,
        }
    }
}

impl Settings {
    /// Configured duration of `mode` in minutes.
    pub fn duration(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Focus => self.focus_duration,
            TimerMode::ShortBreak => self.short_break_duration,
            TimerMode::LongBreak => self.long_break_duration,
        }
    }

    /// Configured duration of `mode` in seconds.
    pub fn duration_secs(&self, mode: TimerMode) -> u32 {
        self.duration(mode) * 60
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_duration("focusDuration", self.focus_duration)?;
        check_duration("shortBreakDuration", self.short_break_duration)?;
        check_duration("longBreakDuration", self.long_break_duration)?;
        if self.sessions_before_long_break == 0 {
            return Err(ValidationError::ZeroCycleLength);
        }
        Ok(())
    }

    /// Returns a copy with `update` merged in, rejecting out-of-range values.
    pub fn merged(&self, update: &SettingsUpdate) -> Result<Settings, ValidationError> {
        let merged = Settings {
            focus_duration: update.focus_duration.unwrap_or(self.focus_duration),
            short_break_duration: update
                .short_break_duration
                .unwrap_or(self.short_break_duration),
            long_break_duration: update
                .long_break_duration
                .unwrap_or(self.long_break_duration),
            sessions_before_long_break: update
                .sessions_before_long_break
                .unwrap_or(self.sessions_before_long_break),
        };
        merged.validate()?;
        Ok(merged)
    }
}

fn check_duration(field: &'static str, value: u32) -> Result<(), ValidationError> {
    if (MIN_DURATION_MINS..=MAX_DURATION_MINS).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::DurationOutOfRange { field, value })
    }
}

/// A partial settings change; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_break_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_before_long_break: Option<u32>,
}

impl SettingsUpdate {
    /// An update that changes only the duration of `mode`.
    pub fn duration(mode: TimerMode, minutes: u32) -> Self {
        let mut update = Self::default();
        match mode {
            TimerMode::Focus => update.focus_duration = Some(minutes),
            TimerMode::ShortBreak => update.short_break_duration = Some(minutes),
            TimerMode::LongBreak => update.long_break_duration = Some(minutes),
        }
        update
    }

    pub fn cycle(sessions: u32) -> Self {
        Self {
            sessions_before_long_break: Some(sessions),
            ..Self::default()
        }
    }
}

/// Countdown state owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub mode: TimerMode,
    pub remaining_secs: u32,
    /// Length the countdown was armed with; `remaining_secs` never exceeds it.
    pub planned_secs: u32,
    pub running: bool,
}

impl TimerState {
    /// An idle countdown for `mode` at full length.
    pub fn armed(mode: TimerMode, settings: &Settings) -> Self {
        let secs = settings.duration_secs(mode);
        Self {
            mode,
            remaining_secs: secs,
            planned_secs: secs,
            running: false,
        }
    }

    /// Fraction of the countdown elapsed, clamped to [0, 1].
    pub fn progress(&self) -> f64 {
        if self.planned_secs == 0 {
            return 1.0;
        }
        (1.0 - self.remaining_secs as f64 / self.planned_secs as f64).clamp(0.0, 1.0)
    }

    /// Whole minutes of the armed countdown.
    pub fn planned_minutes(&self) -> u32 {
        self.planned_secs / 60
    }
}

/// Focus totals for a single local day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyStats {
    pub completed_focus_sessions: u32,
    pub today_study_minutes: u32,
    pub daily_goal_minutes: u32,
    /// The local date these totals belong to.
    pub date: NaiveDate,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            completed_focus_sessions: 0,
            today_study_minutes: 0,
            daily_goal_minutes: DEFAULT_DAILY_GOAL_MINS,
            date,
        }
    }

    /// Resets the day's totals when `today` is past the tracked date.
    /// Returns true if a rollover happened.
    pub fn check_day_rollover(&mut self, today: NaiveDate) -> bool {
        if self.date == today {
            return false;
        }
        self.completed_focus_sessions = 0;
        self.today_study_minutes = 0;
        self.date = today;
        true
    }

    /// Records a completed focus session of `duration_mins`.
    pub fn complete_focus(&mut self, duration_mins: u32) {
        self.completed_focus_sessions += 1;
        self.today_study_minutes += duration_mins;
    }

    /// True when the most recent focus session closes a long-break cycle.
    pub fn is_long_break_due(&self, sessions_before_long_break: u32) -> bool {
        sessions_before_long_break > 0
            && self.completed_focus_sessions > 0
            && self.completed_focus_sessions % sessions_before_long_break == 0
    }

    /// Fraction of the daily goal reached, capped at 1.
    pub fn progress(&self) -> f64 {
        if self.daily_goal_minutes == 0 {
            return 1.0;
        }
        (self.today_study_minutes as f64 / self.daily_goal_minutes as f64).min(1.0)
    }
}

/// A completed session as returned by the session store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_type: TimerMode,
    pub duration_minutes: u32,
}
