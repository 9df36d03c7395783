//! # huddle-store
//!
//! Persistent state for Huddle, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection`.  Besides typed CRUD helpers it enforces the
//! consistency rules of the chat directory, the message log and the call-room
//! registry: every operation takes the caller's resolved identity as an
//! explicit argument and runs as a single transaction.

pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod rooms;
pub mod sessions;
pub mod users;

mod error;
mod sql;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use users::NewUser;
