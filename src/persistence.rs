//! SQLite persistence layer for settings, study sessions and daily goals.

use crate::models::{SessionRecord, Settings, TimerMode};
use crate::store::{GoalStore, SessionStore, SettingsStore, StoreError, UserId};
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Well-known key the serialized settings live under.
pub const SETTINGS_KEY: &str = "timer-settings";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory")]
    DirectoryCreation,
    #[error("Unknown session type in database: {0}")]
    UnknownSessionType(String),
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database at `path`, initializing tables if needed.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|_| DatabaseError::DirectoryCreation)?;
        }

        let conn = Connection::open(path)?;
        Self::initialize_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing).
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS study_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                session_type TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_study_sessions_user_completed
                ON study_sessions (user_id, completed_at);

            CREATE TABLE IF NOT EXISTS study_goals (
                user_id TEXT PRIMARY KEY,
                daily_goal_minutes INTEGER NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Default location of the database file in the platform data directory.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("com", "studytimer", "StudyTimer")
            .map(|dirs| dirs.data_dir().join("studytimer.db"))
            .unwrap_or_else(|| PathBuf::from("studytimer.db"))
    }

    /// Loads saved settings, or `None` if nothing has been saved.
    pub fn load_settings(&self) -> Result<Option<Settings>, DatabaseError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                [SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    /// Saves settings under the well-known key.
    pub fn save_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(settings)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            [SETTINGS_KEY, json.as_str()],
        )?;
        Ok(())
    }

    /// Inserts a completed session stamped with the current time.
    pub fn insert_session(
        &self,
        user_id: &str,
        session_type: TimerMode,
        duration_minutes: u32,
    ) -> Result<(), DatabaseError> {
        self.insert_session_at(user_id, session_type, duration_minutes, Utc::now())
    }

    fn insert_session_at(
        &self,
        user_id: &str,
        session_type: TimerMode,
        duration_minutes: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO study_sessions (user_id, session_type, duration_minutes, completed_at)
             VALUES (?, ?, ?, ?)",
            params![
                user_id,
                session_type.as_str(),
                duration_minutes,
                timestamp(completed_at),
            ],
        )?;
        Ok(())
    }

    /// Returns every session the user completed at or after `since`.
    pub fn sessions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_type, duration_minutes FROM study_sessions
             WHERE user_id = ? AND completed_at >= ?
             ORDER BY completed_at",
        )?;
        let rows = stmt.query_map(params![user_id, timestamp(since)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (session_type, duration_minutes) = row?;
            let session_type = session_type
                .parse::<TimerMode>()
                .map_err(|_| DatabaseError::UnknownSessionType(session_type))?;
            records.push(SessionRecord {
                session_type,
                duration_minutes,
            });
        }
        Ok(records)
    }

    /// Gets the user's daily goal, if one was ever set.
    pub fn daily_goal(&self, user_id: &str) -> Result<Option<u32>, DatabaseError> {
        let goal = self
            .conn
            .query_row(
                "SELECT daily_goal_minutes FROM study_goals WHERE user_id = ?",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(goal)
    }

    /// Sets the user's daily goal, replacing any previous value.
    pub fn upsert_daily_goal(&self, user_id: &str, minutes: u32) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO study_goals (user_id, daily_goal_minutes) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET daily_goal_minutes = excluded.daily_goal_minutes",
            params![user_id, minutes],
        )?;
        Ok(())
    }
}

/// Fixed-width UTC timestamps so lexical order matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SettingsStore for Database {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        Ok(self.load_settings()?)
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        Ok(self.save_settings(settings)?)
    }
}

impl SessionStore for Database {
    fn record_session(
        &self,
        user: &UserId,
        session_type: TimerMode,
        duration_minutes: u32,
    ) -> Result<(), StoreError> {
        Ok(self.insert_session(user.as_str(), session_type, duration_minutes)?)
    }

    fn query_sessions_since(
        &self,
        user: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self.sessions_since(user.as_str(), since)?)
    }
}

impl GoalStore for Database {
    fn get_goal(&self, user: &UserId) -> Result<Option<u32>, StoreError> {
        Ok(self.daily_goal(user.as_str())?)
    }

    fn set_goal(&self, user: &UserId, minutes: u32) -> Result<(), StoreError> {
        Ok(self.upsert_daily_goal(user.as_str(), minutes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_database_creation() {
        let db = Database::new_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_settings_absent_until_saved() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(db.load_settings().unwrap(), None);

        let custom = Settings {
            focus_duration: 50,
            short_break_duration: 10,
            long_break_duration: 20,
            sessions_before_long_break: 3,
        };
        db.save_settings(&custom).unwrap();

        assert_eq!(db.load_settings().unwrap(), Some(custom));
    }

    #[test]
    fn test_settings_overwrite() {
        let db = Database::new_in_memory().unwrap();

        db.save_settings(&Settings {
            focus_duration: 30,
            ..Settings::default()
        })
        .unwrap();
        db.save_settings(&Settings {
            focus_duration: 45,
            ..Settings::default()
        })
        .unwrap();

        let loaded = db.load_settings().unwrap().unwrap();
        assert_eq!(loaded.focus_duration, 45);
    }

    #[test]
    fn test_settings_stored_as_camel_case_json() {
        let db = Database::new_in_memory().unwrap();
        db.save_settings(&Settings::default()).unwrap();

        let raw: String = db
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                [SETTINGS_KEY],
                |row| row.get(0),
            )
            .unwrap();
        assert!(raw.contains("\"focusDuration\":25"));
        assert!(raw.contains("\"sessionsBeforeLongBreak\":4"));
    }

    #[test]
    fn test_corrupt_settings_is_json_error() {
        let db = Database::new_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO settings (key, value) VALUES (?, 'not json')",
                [SETTINGS_KEY],
            )
            .unwrap();

        assert!(matches!(db.load_settings(), Err(DatabaseError::Json(_))));
    }

    #[test]
    fn test_sessions_since_filters_by_user_and_time() {
        let db = Database::new_in_memory().unwrap();
        let now = Utc::now();
        let midnight = now - Duration::hours(2);

        db.insert_session_at("ada", TimerMode::Focus, 25, now - Duration::hours(30))
            .unwrap();
        db.insert_session_at("ada", TimerMode::Focus, 25, now - Duration::hours(1))
            .unwrap();
        db.insert_session_at("ada", TimerMode::ShortBreak, 5, now)
            .unwrap();
        db.insert_session_at("bob", TimerMode::Focus, 50, now)
            .unwrap();

        let records = db.sessions_since("ada", midnight).unwrap();
        assert_eq!(
            records,
            vec![
                SessionRecord {
                    session_type: TimerMode::Focus,
                    duration_minutes: 25
                },
                SessionRecord {
                    session_type: TimerMode::ShortBreak,
                    duration_minutes: 5
                },
            ]
        );
    }

    #[test]
    fn test_insert_session_is_visible_immediately() {
        let db = Database::new_in_memory().unwrap();
        let before = Utc::now() - Duration::seconds(1);

        db.insert_session("ada", TimerMode::LongBreak, 15).unwrap();

        let records = db.sessions_since("ada", before).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_type, TimerMode::LongBreak);
    }

    #[test]
    fn test_unknown_session_type_is_reported() {
        let db = Database::new_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO study_sessions (user_id, session_type, duration_minutes, completed_at)
                 VALUES ('ada', 'nap', 10, ?)",
                [timestamp(Utc::now())],
            )
            .unwrap();

        let result = db.sessions_since("ada", Utc::now() - Duration::hours(1));
        assert!(matches!(result, Err(DatabaseError::UnknownSessionType(t)) if t == "nap"));
    }

    #[test]
    fn test_goal_upsert_keeps_one_row_per_user() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(db.daily_goal("ada").unwrap(), None);

        db.upsert_daily_goal("ada", 90).unwrap();
        db.upsert_daily_goal("ada", 150).unwrap();
        db.upsert_daily_goal("bob", 60).unwrap();

        assert_eq!(db.daily_goal("ada").unwrap(), Some(150));
        assert_eq!(db.daily_goal("bob").unwrap(), Some(60));

        let rows: u32 = db
            .conn
            .query_row("SELECT COUNT(*) FROM study_goals", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_store_traits_round_through_database() {
        let db = Database::new_in_memory().unwrap();
        let user = UserId::new("ada").unwrap();

        GoalStore::set_goal(&db, &user, 45).unwrap();
        assert_eq!(GoalStore::get_goal(&db, &user).unwrap(), Some(45));

        SessionStore::record_session(&db, &user, TimerMode::Focus, 25).unwrap();
        let since = Utc::now() - Duration::minutes(5);
        assert_eq!(db.query_sessions_since(&user, since).unwrap().len(), 1);
    }

    #[test]
    fn test_file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("studytimer.db");

        {
            let db = Database::open(&path).unwrap();
            db.save_settings(&Settings {
                focus_duration: 40,
                ..Settings::default()
            })
            .unwrap();
            db.upsert_daily_goal("ada", 200).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.load_settings().unwrap().unwrap().focus_duration, 40);
        assert_eq!(db.daily_goal("ada").unwrap(), Some(200));
    }
}
