//! The study timer state machine.
//!
//! ```text
//! Idle(mode, remaining) --start--> Running(mode, remaining)
//! Running --pause--> Idle (remaining kept)
//! Running --tick at 0--> Idle(next mode, full length)
//! any --reset / switch_mode--> Idle(mode, full length)
//! ```
//!
//! The engine owns the countdown and the day's totals. Stores are written
//! after the in-memory transition has committed; a store failure never
//! undoes a transition and is queued for the caller instead.

use crate::models::{
    DailyStats, Settings, SettingsUpdate, TimerMode, TimerState, ValidationError,
    DEFAULT_DAILY_GOAL_MINS,
};
use crate::notifications::Notifier;
use crate::store::{GoalStore, SessionStore, SettingsStore, StoreError, UserId};
use crate::timer::{self, Clock, Subscription, SubscriptionId};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;

/// Emitted when a countdown runs out.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    FocusComplete {
        /// Focus sessions completed today, including this one.
        count: u32,
        minutes: u32,
        next: TimerMode,
    },
    BreakComplete {
        mode: TimerMode,
    },
}

impl CompletionEvent {
    /// Mode the timer was switched to after completion.
    pub fn next_mode(&self) -> TimerMode {
        match self {
            Self::FocusComplete { next, .. } => *next,
            Self::BreakComplete { .. } => TimerMode::Focus,
        }
    }
}

/// Store interaction that can fail without affecting the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LoadSettings,
    SaveSettings,
    LoadSessions,
    RecordSession,
    LoadGoal,
    SaveGoal,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoadSettings => "load settings",
            Self::SaveSettings => "save settings",
            Self::LoadSessions => "load today's sessions",
            Self::RecordSession => "record session",
            Self::LoadGoal => "load daily goal",
            Self::SaveGoal => "save daily goal",
        })
    }
}

/// A store failure reported to the caller after the fact.
#[derive(Debug)]
pub struct PersistenceFailure {
    pub operation: Operation,
    pub error: StoreError,
}

impl fmt::Display for PersistenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not {}: {}", self.operation, self.error)
    }
}

/// Confirmation returned by `update_daily_goal`.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalConfirmation {
    pub minutes: u32,
}

impl fmt::Display for GoalConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Daily goal set to {}h {}m",
            self.minutes / 60,
            self.minutes % 60
        )
    }
}

/// Everything the engine talks to outside its own memory.
pub struct Collaborators {
    pub settings: Box<dyn SettingsStore>,
    pub sessions: Box<dyn SessionStore>,
    pub goals: Box<dyn GoalStore>,
    pub clock: Box<dyn Clock>,
    pub notifier: Box<dyn Notifier>,
}

pub struct TimerEngine {
    state: TimerState,
    settings: Settings,
    stats: DailyStats,
    user: Option<UserId>,
    deps: Collaborators,
    /// Present exactly while the state is Running.
    ticks: Option<Subscription>,
    failures: Vec<PersistenceFailure>,
    /// Source of the local calendar date.
    today: Box<dyn Fn() -> NaiveDate>,
}

impl TimerEngine {
    /// Creates an idle engine in Focus mode, hydrated from the stores.
    ///
    /// Without a user only settings are loaded; counters start at zero and
    /// stay local for the engine's lifetime.
    pub fn new(user: Option<UserId>, deps: Collaborators) -> Self {
        Self::with_calendar(user, deps, Box::new(|| Local::now().date_naive()))
    }

    pub(crate) fn with_calendar(
        user: Option<UserId>,
        deps: Collaborators,
        today: Box<dyn Fn() -> NaiveDate>,
    ) -> Self {
        let mut engine = Self {
            state: TimerState::armed(TimerMode::Focus, &Settings::default()),
            settings: Settings::default(),
            stats: DailyStats::new(today()),
            user,
            deps,
            ticks: None,
            failures: Vec::new(),
            today,
        };
        engine.load_settings();
        engine.state = TimerState::armed(TimerMode::Focus, &engine.settings);
        engine.hydrate_today();
        engine
    }

    fn load_settings(&mut self) {
        match self.deps.settings.load() {
            Ok(Some(saved)) => match saved.validate() {
                Ok(()) => self.settings = saved,
                Err(e) => log::warn!("Ignoring stored settings ({}), using defaults", e),
            },
            Ok(None) => {}
            Err(e) => self.report(Operation::LoadSettings, e),
        }
    }

    fn hydrate_today(&mut self) {
        let Some(user) = self.user.clone() else {
            log::info!("No user identity; study totals stay local");
            return;
        };

        match self
            .deps
            .sessions
            .query_sessions_since(&user, local_midnight(self.stats.date))
        {
            Ok(records) => {
                let focus = records
                    .iter()
                    .filter(|r| r.session_type == TimerMode::Focus);
                self.stats.completed_focus_sessions = focus.clone().count() as u32;
                self.stats.today_study_minutes = focus.map(|r| r.duration_minutes).sum();
            }
            Err(e) => self.report(Operation::LoadSessions, e),
        }

        match self.deps.goals.get_goal(&user) {
            Ok(Some(minutes)) if minutes > 0 => self.stats.daily_goal_minutes = minutes,
            Ok(_) => self.stats.daily_goal_minutes = DEFAULT_DAILY_GOAL_MINS,
            Err(e) => self.report(Operation::LoadGoal, e),
        }

        log::info!(
            "Hydrated {}: {} sessions, {} of {} minutes today",
            user,
            self.stats.completed_focus_sessions,
            self.stats.today_study_minutes,
            self.stats.daily_goal_minutes
        );
    }

    /// Starts (or resumes) the countdown. No-op when already running.
    pub fn start(&mut self) {
        if self.state.running {
            return;
        }
        self.refresh_day();
        self.state.running = true;
        let subscription = self.deps.clock.subscribe();
        log::debug!("Acquired tick stream {}", subscription.id());
        self.ticks = Some(subscription);
    }

    /// Pauses the countdown, keeping the remaining time.
    pub fn pause(&mut self) {
        if self.state.running {
            self.stop();
        }
    }

    /// Stops the countdown and rewinds the current mode to its full length.
    pub fn reset(&mut self) {
        self.stop();
        self.state = TimerState::armed(self.state.mode, &self.settings);
    }

    /// Stops the countdown and arms `mode` at full length without starting it.
    pub fn switch_mode(&mut self, mode: TimerMode) {
        self.stop();
        self.state = TimerState::armed(mode, &self.settings);
    }

    fn stop(&mut self) {
        self.state.running = false;
        if let Some(subscription) = self.ticks.take() {
            log::debug!("Released tick stream {}", subscription.id());
        }
    }

    /// Handles a tick from the clock, ignoring ticks from released streams.
    pub fn handle_tick(&mut self, subscription: SubscriptionId) -> (bool, Option<CompletionEvent>) {
        match &self.ticks {
            Some(active) if active.id() == subscription => self.tick(),
            _ => {
                log::trace!("Dropping stale tick from stream {}", subscription);
                (false, None)
            }
        }
    }

    /// Advances the timer by one second.
    /// Returns (state_changed, optional_completion_event).
    pub fn tick(&mut self) -> (bool, Option<CompletionEvent>) {
        if !self.state.running {
            return (false, None);
        }
        self.refresh_day();

        if self.state.remaining_secs > 0 {
            self.state.remaining_secs -= 1;
            (true, None)
        } else {
            (true, Some(self.complete_session()))
        }
    }

    fn complete_session(&mut self) -> CompletionEvent {
        self.stop();
        let mode = self.state.mode;
        let minutes = self.state.planned_minutes();

        let recorded = self
            .user
            .as_ref()
            .map(|user| self.deps.sessions.record_session(user, mode, minutes));
        if let Some(Err(e)) = recorded {
            self.report(Operation::RecordSession, e);
        }

        let event = match mode {
            TimerMode::Focus => {
                self.stats.complete_focus(minutes);
                let next = if self
                    .stats
                    .is_long_break_due(self.settings.sessions_before_long_break)
                {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                };
                CompletionEvent::FocusComplete {
                    count: self.stats.completed_focus_sessions,
                    minutes,
                    next,
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => CompletionEvent::BreakComplete { mode },
        };

        self.state = TimerState::armed(event.next_mode(), &self.settings);
        log::info!(
            "{} session of {} min complete, next up: {}",
            mode,
            minutes,
            event.next_mode()
        );

        if let Err(e) = self.deps.notifier.notify(&event) {
            log::debug!("Completion signal failed: {}", e);
        }

        event
    }

    /// Resets the day's totals if the local date moved on.
    pub fn refresh_day(&mut self) {
        let today = (self.today)();
        if self.stats.check_day_rollover(today) {
            log::info!("New day {}, study totals reset", today);
        }
    }

    /// Merges `update` into the settings and saves them.
    ///
    /// A running countdown is never shortened or extended. When idle, the
    /// countdown is re-armed only if the active mode's duration changed.
    pub fn update_settings(&mut self, update: SettingsUpdate) -> Result<(), ValidationError> {
        let merged = self.settings.merged(&update)?;
        let mode = self.state.mode;
        let active_changed = merged.duration(mode) != self.settings.duration(mode);
        self.settings = merged;

        if !self.state.running && active_changed {
            self.state = TimerState::armed(mode, &self.settings);
        }

        if let Err(e) = self.deps.settings.save(&self.settings) {
            self.report(Operation::SaveSettings, e);
        }
        Ok(())
    }

    /// Sets the daily goal, saving it for the signed-in user.
    pub fn update_daily_goal(&mut self, minutes: u32) -> Result<GoalConfirmation, ValidationError> {
        if minutes == 0 {
            return Err(ValidationError::ZeroDailyGoal);
        }
        self.refresh_day();
        self.stats.daily_goal_minutes = minutes;

        let saved = self
            .user
            .as_ref()
            .map(|user| self.deps.goals.set_goal(user, minutes));
        if let Some(Err(e)) = saved {
            self.report(Operation::SaveGoal, e);
        }

        let confirmation = GoalConfirmation { minutes };
        log::info!("{}", confirmation);
        Ok(confirmation)
    }

    fn report(&mut self, operation: Operation, error: StoreError) {
        log::warn!("Could not {}: {}", operation, error);
        self.failures.push(PersistenceFailure { operation, error });
    }

    /// Takes the store failures queued since the last call.
    pub fn drain_failures(&mut self) -> Vec<PersistenceFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn stats(&self) -> &DailyStats {
        &self.stats
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn mode(&self) -> TimerMode {
        self.state.mode
    }

    pub fn remaining_secs(&self) -> u32 {
        self.state.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn completed_focus_sessions(&self) -> u32 {
        self.stats.completed_focus_sessions
    }

    pub fn today_study_minutes(&self) -> u32 {
        self.stats.today_study_minutes
    }

    pub fn daily_goal_minutes(&self) -> u32 {
        self.stats.daily_goal_minutes
    }

    /// Remaining time as `MM:SS`.
    pub fn formatted_time(&self) -> String {
        timer::format_time(self.state.remaining_secs)
    }

    pub fn progress_percent(&self) -> u32 {
        timer::percent(self.state.progress())
    }

    pub fn daily_progress_percent(&self) -> u32 {
        timer::percent(self.stats.progress())
    }

    pub fn status_line(&self) -> String {
        timer::format_status(&self.state, &self.stats)
    }
}

/// Start of `date` in local time, as a UTC instant.
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        // Midnight fell in a DST gap.
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
