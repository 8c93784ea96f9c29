//! Completion signals: desktop notification plus a chime.

use crate::audio::{AudioError, AudioPlayer};
use crate::engine::CompletionEvent;
use crate::models::TimerMode;
use notify_rust::Notification;
use std::rc::Rc;
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),
}

/// Fire-and-forget completion signal. The engine ignores any error returned.
pub trait Notifier {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotifyError>;
}

impl<T: Notifier + ?Sized> Notifier for Rc<T> {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotifyError> {
        (**self).notify(event)
    }
}

/// Notification title for a completion.
pub fn completion_title(event: &CompletionEvent) -> &'static str {
    match event {
        CompletionEvent::FocusComplete { .. } => "Focus session complete!",
        CompletionEvent::BreakComplete { .. } => "Break complete!",
    }
}

/// Notification body for a completion.
pub fn completion_body(event: &CompletionEvent) -> String {
    match event {
        CompletionEvent::FocusComplete { count, next, .. } => {
            let plural = if *count == 1 { "" } else { "s" };
            let up_next = match next {
                TimerMode::LongBreak => "You've earned a long break.",
                _ => "Time for a short break.",
            };
            format!(
                "Great work! You've completed {} session{} today.\n{}",
                count, plural, up_next
            )
        }
        CompletionEvent::BreakComplete { .. } => "Ready for another focus session?".to_string(),
    }
}

/// Shows a system notification and plays the chime, each when enabled.
pub struct DesktopNotifier {
    audio: Option<AudioPlayer>,
    notifications_enabled: bool,
}

impl DesktopNotifier {
    /// Audio is opened on the calling thread; a missing device only disables the chime.
    pub fn new(sound_enabled: bool, notifications_enabled: bool) -> Self {
        let audio = if sound_enabled {
            match AudioPlayer::new() {
                Ok(player) => Some(player),
                Err(e) => {
                    log::warn!("Audio unavailable, chime disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            audio,
            notifications_enabled,
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotifyError> {
        if self.notifications_enabled {
            let summary = completion_title(event);
            let body = completion_body(event);
            // Runs in a background thread to avoid blocking the tick loop.
            thread::spawn(move || {
                if let Err(e) = Notification::new().summary(summary).body(&body).show() {
                    log::debug!("Failed to show notification: {}", e);
                }
            });
        }

        if let Some(ref audio) = self.audio {
            audio.play_chime()?;
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod recording {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Notifier that remembers every event and can be told to fail.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub events: RefCell<Vec<CompletionEvent>>,
        pub fail: Cell<bool>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: &CompletionEvent) -> Result<(), NotifyError> {
            self.events.borrow_mut().push(event.clone());
            if self.fail.get() {
                return Err(NotifyError::Audio(AudioError::Stream(
                    rodio::StreamError::NoDevice,
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_body_singular() {
        let event = CompletionEvent::FocusComplete {
            count: 1,
            minutes: 25,
            next: TimerMode::ShortBreak,
        };
        assert_eq!(completion_title(&event), "Focus session complete!");
        assert_eq!(
            completion_body(&event),
            "Great work! You've completed 1 session today.\nTime for a short break."
        );
    }

    #[test]
    fn test_focus_body_plural_long_break() {
        let event = CompletionEvent::FocusComplete {
            count: 4,
            minutes: 25,
            next: TimerMode::LongBreak,
        };
        assert_eq!(
            completion_body(&event),
            "Great work! You've completed 4 sessions today.\nYou've earned a long break."
        );
    }

    #[test]
    fn test_break_body() {
        let event = CompletionEvent::BreakComplete {
            mode: TimerMode::ShortBreak,
        };
        assert_eq!(completion_title(&event), "Break complete!");
        assert_eq!(completion_body(&event), "Ready for another focus session?");
    }

    #[test]
    #[ignore = "Requires system notification interaction"]
    fn test_desktop_notification() {
        let notifier = DesktopNotifier::new(false, true);
        notifier
            .notify(&CompletionEvent::BreakComplete {
                mode: TimerMode::LongBreak,
            })
            .unwrap();
    }
}
