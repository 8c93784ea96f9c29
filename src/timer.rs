//! Tick sources for the countdown and text formatting of timer state.

use crate::command::Command;
use crate::models::{DailyStats, TimerState};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Identifies which subscription produced a tick.
pub type SubscriptionId = u64;

/// Messages delivered to the main loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerMessage {
    /// One second elapsed on the given subscription.
    Tick(SubscriptionId),
    /// A parsed line from the controlling terminal.
    Command(Command),
    /// The controlling terminal closed its input.
    InputClosed,
}

/// Handle to an active tick stream. Dropping it stops the stream.
pub struct Subscription {
    id: SubscriptionId,
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, cancel: impl FnOnce() + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// A source of one-per-second ticks.
pub trait Clock {
    fn subscribe(&mut self) -> Subscription;
}

/// Wall-clock ticker backed by one thread per subscription.
pub struct SystemClock {
    tx: Sender<TimerMessage>,
    interval: Duration,
    next_id: SubscriptionId,
}

impl SystemClock {
    pub fn new(tx: Sender<TimerMessage>) -> Self {
        Self {
            tx,
            interval: Duration::from_secs(1),
            next_id: 0,
        }
    }
}

impl Clock for SystemClock {
    fn subscribe(&mut self) -> Subscription {
        self.next_id += 1;
        let id = self.next_id;
        let tx = self.tx.clone();
        let interval = self.interval;
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        thread::spawn(move || {
            // Deadlines are anchored to the start so sleeps don't accumulate drift.
            let mut deadline = Instant::now() + interval;
            loop {
                let wait = deadline.saturating_duration_since(Instant::now());
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {
                        if tx.send(TimerMessage::Tick(id)).is_err() {
                            break;
                        }
                        deadline += interval;
                    }
                    // Either an explicit stop or the guard was dropped.
                    _ => break,
                }
            }
        });

        Subscription::new(id, move || drop(stop_tx))
    }
}

/// Formats time in MM:SS format.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Converts a 0..=1 fraction to a rounded whole percentage.
pub fn percent(fraction: f64) -> u32 {
    (fraction * 100.0).round() as u32
}

/// One-line summary of the countdown and the day's progress.
pub fn format_status(state: &TimerState, stats: &DailyStats) -> String {
    let marker = if state.running { "▶" } else { "⏸" };
    format!(
        "{} {} {} ({}%) | today {}/{} min ({}%), {} session{}",
        marker,
        state.mode.label(),
        format_time(state.remaining_secs),
        percent(state.progress()),
        stats.today_study_minutes,
        stats.daily_goal_minutes,
        percent(stats.progress()),
        stats.completed_focus_sessions,
        if stats.completed_focus_sessions == 1 { "" } else { "s" },
    )
}

#[cfg(test)]
pub use manual::ManualClock;
