//! Collaborator interfaces for durable settings, sessions and goals.
//!
//! The engine only talks to these traits; `persistence::Database` is the
//! SQLite implementation and `store::memory` provides fakes for tests.

use crate::models::{SessionRecord, Settings, TimerMode};
use crate::persistence::DatabaseError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Identity of the signed-in user that durable records are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    /// Returns `None` for blank identities.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device-local settings persistence.
pub trait SettingsStore {
    /// Returns `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Settings>, StoreError>;
    fn save(&self, settings: &Settings) -> Result<(), StoreError>;
}

/// Completed sessions keyed by user.
pub trait SessionStore {
    /// Inserts a session; the store assigns the completion timestamp.
    fn record_session(
        &self,
        user: &UserId,
        session_type: TimerMode,
        duration_minutes: u32,
    ) -> Result<(), StoreError>;

    fn query_sessions_since(
        &self,
        user: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, StoreError>;
}

/// One daily goal per user.
pub trait GoalStore {
    fn get_goal(&self, user: &UserId) -> Result<Option<u32>, StoreError>;
    /// Upsert keyed on the user.
    fn set_goal(&self, user: &UserId, minutes: u32) -> Result<(), StoreError>;
}

impl<T: SettingsStore + ?Sized> SettingsStore for Rc<T> {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        (**self).load()
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        (**self).save(settings)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Rc<T> {
    fn record_session(
        &self,
        user: &UserId,
        session_type: TimerMode,
        duration_minutes: u32,
    ) -> Result<(), StoreError> {
        (**self).record_session(user, session_type, duration_minutes)
    }

    fn query_sessions_since(
        &self,
        user: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        (**self).query_sessions_since(user, since)
    }
}

impl<T: GoalStore + ?Sized> GoalStore for Rc<T> {
    fn get_goal(&self, user: &UserId) -> Result<Option<u32>, StoreError> {
        (**self).get_goal(user)
    }

    fn set_goal(&self, user: &UserId, minutes: u32) -> Result<(), StoreError> {
        (**self).set_goal(user, minutes)
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory stores that count calls and can be told to fail.

    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// The error every fake returns once told to fail.
    fn offline() -> StoreError {
        StoreError::Database(DatabaseError::Sqlite(rusqlite::Error::InvalidQuery))
    }

    #[derive(Default)]
    pub struct MemorySettings {
        pub saved: RefCell<Option<Settings>>,
        pub saves: Cell<u32>,
        pub fail: Cell<bool>,
    }

    impl SettingsStore for MemorySettings {
        fn load(&self) -> Result<Option<Settings>, StoreError> {
            if self.fail.get() {
                return Err(offline());
            }
            Ok(*self.saved.borrow())
        }

        fn save(&self, settings: &Settings) -> Result<(), StoreError> {
            self.saves.set(self.saves.get() + 1);
            if self.fail.get() {
                return Err(offline());
            }
            *self.saved.borrow_mut() = Some(*settings);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MemorySessions {
        pub rows: RefCell<Vec<(UserId, SessionRecord, DateTime<Utc>)>>,
        pub inserts: Cell<u32>,
        pub queries: Cell<u32>,
        pub fail: Cell<bool>,
    }

    impl MemorySessions {
        pub fn seed(&self, user: &UserId, record: SessionRecord, at: DateTime<Utc>) {
            self.rows.borrow_mut().push((user.clone(), record, at));
        }
    }

    impl SessionStore for MemorySessions {
        fn record_session(
            &self,
            user: &UserId,
            session_type: TimerMode,
            duration_minutes: u32,
        ) -> Result<(), StoreError> {
            self.inserts.set(self.inserts.get() + 1);
            if self.fail.get() {
                return Err(offline());
            }
            self.rows.borrow_mut().push((
                user.clone(),
                SessionRecord {
                    session_type,
                    duration_minutes,
                },
                Utc::now(),
            ));
            Ok(())
        }

        fn query_sessions_since(
            &self,
            user: &UserId,
            since: DateTime<Utc>,
        ) -> Result<Vec<SessionRecord>, StoreError> {
            self.queries.set(self.queries.get() + 1);
            if self.fail.get() {
                return Err(offline());
            }
            Ok(self
                .rows
                .borrow()
                .iter()
                .filter(|(u, _, at)| u == user && *at >= since)
                .map(|(_, record, _)| *record)
                .collect())
        }
    }

    #[derive(Default)]
    pub struct MemoryGoals {
        pub goals: RefCell<HashMap<UserId, u32>>,
        pub writes: Cell<u32>,
        pub fail: Cell<bool>,
    }

    impl GoalStore for MemoryGoals {
        fn get_goal(&self, user: &UserId) -> Result<Option<u32>, StoreError> {
            if self.fail.get() {
                return Err(offline());
            }
            Ok(self.goals.borrow().get(user).copied())
        }

        fn set_goal(&self, user: &UserId, minutes: u32) -> Result<(), StoreError> {
            self.writes.set(self.writes.get() + 1);
            if self.fail.get() {
                return Err(offline());
            }
            self.goals.borrow_mut().insert(user.clone(), minutes);
            Ok(())
        }
    }
}
