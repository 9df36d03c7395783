//! The message log: append-only history per chat.
//!
//! Sending a message also refreshes the chat's denormalized last-message
//! fields.  Both writes commit together; the summary is a cache and the
//! `messages` table stays authoritative.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use huddle_shared::constants::MAX_MESSAGE_SIZE;
use huddle_shared::{AssetId, ChatId, MessageId, MessageKind, UserId};

use crate::chats::load_member_chat;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageEntry};
use crate::sql::{now, ts_from_sql, ts_to_sql, unknown_variant, uuid_from_sql};
use crate::users::load_user;

const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, content, kind, asset_id, created_at";

impl Database {
    /// Append a message from `caller` to `chat_id`.
    ///
    /// The stored time is never earlier than the newest message already in
    /// the chat, so history cannot be reordered by a clock step backwards.
    pub fn send_message(
        &mut self,
        caller: &UserId,
        chat_id: &ChatId,
        content: &str,
        kind: MessageKind,
    ) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(StoreError::Invalid("message content must not be empty".into()));
        }
        if content.len() > MAX_MESSAGE_SIZE {
            return Err(StoreError::Invalid(format!(
                "message content exceeds {MAX_MESSAGE_SIZE} bytes"
            )));
        }

        let tx = self.write_tx()?;
        load_member_chat(&tx, caller, chat_id)?;

        let current = now();
        let created_at = newest_time(&tx, chat_id)?
            .filter(|newest| *newest > current)
            .unwrap_or(current);

        let message = Message {
            id: MessageId::new(),
            chat_id: *chat_id,
            sender_id: *caller,
            content: content.to_string(),
            kind,
            created_at,
        };

        tx.execute(
            "INSERT INTO messages (id, chat_id, sender_id, content, kind, asset_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                message.chat_id.to_string(),
                message.sender_id.to_string(),
                message.content,
                message.kind.as_str(),
                message.kind.asset_id().map(|a| a.to_string()),
                ts_to_sql(&message.created_at),
            ],
        )?;
        tx.execute(
            "UPDATE chats SET last_message = ?1, last_message_at = ?2 WHERE id = ?3",
            params![
                message.content,
                ts_to_sql(&message.created_at),
                chat_id.to_string(),
            ],
        )?;
        tx.commit()?;

        tracing::debug!(
            chat = %chat_id,
            message = %message.id,
            kind = message.kind.as_str(),
            "message sent"
        );
        Ok(message)
    }

    /// Full history of a chat, oldest first, with sender records.
    pub fn get_chat_messages(&self, caller: &UserId, chat_id: &ChatId) -> Result<Vec<MessageEntry>> {
        let conn = self.conn();
        load_member_chat(conn, caller, chat_id)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE chat_id = ?1
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![chat_id.to_string()], row_to_message)?;
        let messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(messages.len());
        for message in messages {
            let sender = load_user(conn, &message.sender_id)?;
            entries.push(MessageEntry { message, sender });
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn latest_message(conn: &Connection, chat_id: &ChatId) -> Result<Option<Message>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages
                 WHERE chat_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1"
            ),
            params![chat_id.to_string()],
            row_to_message,
        )
        .optional()?)
}

fn newest_time(conn: &Connection, chat_id: &ChatId) -> Result<Option<DateTime<Utc>>> {
    let newest: Option<String> = conn.query_row(
        "SELECT MAX(created_at) FROM messages WHERE chat_id = ?1",
        params![chat_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(newest.as_deref().map(|s| ts_from_sql(0, s)).transpose()?)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let chat_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let kind_str: String = row.get(4)?;
    let asset_str: Option<String> = row.get(5)?;
    let created_str: String = row.get(6)?;

    let kind = match (kind_str.as_str(), asset_str) {
        ("text", None) => MessageKind::Text,
        ("image", Some(asset)) => MessageKind::Image {
            asset_id: AssetId(uuid_from_sql(5, &asset)?),
        },
        _ => return Err(unknown_variant(4, &kind_str)),
    };

    Ok(Message {
        id: MessageId(uuid_from_sql(0, &id_str)?),
        chat_id: ChatId(uuid_from_sql(1, &chat_str)?),
        sender_id: UserId(uuid_from_sql(2, &sender_str)?),
        content: row.get(3)?,
        kind,
        created_at: ts_from_sql(6, &created_str)?,
    })
}
