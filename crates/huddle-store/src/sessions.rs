//! Bearer-token sessions.  A session maps an opaque token to the user it was
//! issued for; the server resolves it on every request.

use rand::RngCore;
use rusqlite::{params, OptionalExtension};

use huddle_shared::constants::SESSION_TOKEN_BYTES;
use huddle_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Session;
use crate::sql::{now, ts_to_sql, uuid_from_sql};

impl Database {
    /// Issue a fresh token for `user_id`.
    pub fn create_session(&self, user_id: &UserId) -> Result<Session> {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        let session = Session {
            token: hex::encode(bytes),
            user_id: *user_id,
            created_at: now(),
        };

        self.conn()
            .execute(
                "INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![
                    session.token,
                    session.user_id.to_string(),
                    ts_to_sql(&session.created_at),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::NotFound("user")
                }
                other => StoreError::Sqlite(other),
            })?;

        tracing::debug!(user = %user_id, "session created");
        Ok(session)
    }

    /// The user a token belongs to, or `None` for unknown tokens.
    pub fn resolve_session(&self, token: &str) -> Result<Option<UserId>> {
        let id_str: Option<String> = self
            .conn()
            .query_row(
                "SELECT user_id FROM sessions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id_str
            .map(|s| uuid_from_sql(0, &s).map(UserId))
            .transpose()?)
    }

    /// Returns `true` if a session was removed.
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }
}
