use huddle_shared::RoomId;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The caller is not a participant of the chat, or the chat does not
    /// exist.  Both cases share one error so chat ids cannot be discovered.
    #[error("Not a participant of this chat")]
    Forbidden,

    /// A referenced user, room or asset does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Registration with an email that already has an account.
    #[error("Email is already registered")]
    EmailTaken,

    /// The request violates a data-model rule.
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// The room was deactivated when its last participant left.
    #[error("Room {0} has ended")]
    RoomClosed(RoomId),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
