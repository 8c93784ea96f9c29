//! Study timer - focus/break countdown with daily study goals.
//!
//! `engine::TimerEngine` is the state machine; everything it persists to
//! goes through the traits in `store`, so it runs the same against the
//! SQLite `persistence::Database` or in-memory fakes.

pub mod audio;
pub mod command;
pub mod config;
pub mod engine;
pub mod models;
pub mod notifications;
pub mod persistence;
pub mod store;
pub mod timer;
