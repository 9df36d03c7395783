//! The chat directory: which chats a user belongs to, and creation of direct
//! and group chats.
//!
//! Membership lives in `chat_participants`, indexed by user, so listing a
//! user's chats never scans the whole `chats` table.

use rusqlite::{params, Connection, OptionalExtension};

use huddle_shared::constants::DIRECT_CHAT_FALLBACK_NAME;
use huddle_shared::{ChatId, ChatKind, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::latest_message;
use crate::models::{Chat, ChatSummary};
use crate::sql::{now, ts_from_sql, ts_to_sql, unknown_variant, uuid_from_sql};
use crate::users::load_user;

const CHAT_COLUMNS: &str =
    "c.id, c.name, c.kind, c.created_by, c.avatar, c.last_message, c.last_message_at, c.created_at";

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Every chat `caller` participates in, newest activity first, with
    /// participant records and the latest message resolved.
    pub fn list_user_chats(&self, caller: &UserId) -> Result<Vec<ChatSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHAT_COLUMNS}
             FROM chats c
             JOIN chat_participants p ON p.chat_id = c.id
             WHERE p.user_id = ?1
             ORDER BY COALESCE(c.last_message_at, c.created_at) DESC"
        ))?;
        let rows = stmt.query_map(params![caller.to_string()], row_to_chat)?;
        let chats = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        let mut summaries = Vec::with_capacity(chats.len());
        for mut chat in chats {
            chat.participants = load_participants(conn, &chat.id)?;

            let mut members = Vec::with_capacity(chat.participants.len());
            for id in &chat.participants {
                if let Some(user) = load_user(conn, id)? {
                    members.push(user);
                }
            }
            let latest = latest_message(conn, &chat.id)?;

            summaries.push(ChatSummary {
                chat,
                members,
                latest_message: latest,
            });
        }
        Ok(summaries)
    }

    /// Fetch a chat the caller participates in.  A missing chat is reported
    /// as [`StoreError::Forbidden`], same as one the caller is not part of.
    pub fn get_chat(&self, caller: &UserId, chat_id: &ChatId) -> Result<Chat> {
        load_member_chat(self.conn(), caller, chat_id)
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Return the direct chat between `caller` and `other`, creating it if
    /// none exists.  Lookup and insert share one write transaction, so
    /// concurrent first calls from both sides converge on a single chat.
    pub fn create_direct_chat(&mut self, caller: &UserId, other: &UserId) -> Result<ChatId> {
        if caller == other {
            return Err(StoreError::Invalid(
                "a direct chat needs two different users".into(),
            ));
        }

        let tx = self.write_tx()?;

        if let Some(existing) = find_direct_chat(&tx, caller, other)? {
            tracing::debug!(chat = %existing, "direct chat already exists");
            return Ok(existing);
        }

        let other_user = load_user(&tx, other)?.ok_or(StoreError::NotFound("user"))?;
        let name = other_user
            .label()
            .unwrap_or(DIRECT_CHAT_FALLBACK_NAME)
            .to_string();

        let chat_id = insert_chat(&tx, &name, ChatKind::Direct, caller, &[*caller, *other])?;
        tx.commit()?;

        tracing::info!(chat = %chat_id, caller = %caller, other = %other, "direct chat created");
        Ok(chat_id)
    }

    /// Create a group chat of `caller` plus `members`.  The caller is added
    /// even when missing from `members`; duplicates are dropped.
    pub fn create_group_chat(
        &mut self,
        caller: &UserId,
        name: &str,
        members: &[UserId],
    ) -> Result<ChatId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Invalid("group name must not be empty".into()));
        }

        let mut participants = vec![*caller];
        for id in members {
            if !participants.contains(id) {
                participants.push(*id);
            }
        }
        if participants.len() < 2 {
            return Err(StoreError::Invalid(
                "a group needs at least one member besides its creator".into(),
            ));
        }

        let tx = self.write_tx()?;
        for id in &participants[1..] {
            if load_user(&tx, id)?.is_none() {
                return Err(StoreError::NotFound("user"));
            }
        }
        let chat_id = insert_chat(&tx, name, ChatKind::Group, caller, &participants)?;
        tx.commit()?;

        tracing::info!(
            chat = %chat_id,
            caller = %caller,
            members = participants.len(),
            "group chat created"
        );
        Ok(chat_id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a chat for a participant; anything else is `Forbidden`.
pub(crate) fn load_member_chat(conn: &Connection, caller: &UserId, chat_id: &ChatId) -> Result<Chat> {
    match load_chat(conn, chat_id)? {
        Some(chat) if chat.has_participant(caller) => Ok(chat),
        _ => Err(StoreError::Forbidden),
    }
}

pub(crate) fn load_chat(conn: &Connection, chat_id: &ChatId) -> Result<Option<Chat>> {
    let chat = conn
        .query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM chats c WHERE c.id = ?1"),
            params![chat_id.to_string()],
            row_to_chat,
        )
        .optional()?;

    match chat {
        Some(mut chat) => {
            chat.participants = load_participants(conn, chat_id)?;
            Ok(Some(chat))
        }
        None => Ok(None),
    }
}

fn load_participants(conn: &Connection, chat_id: &ChatId) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM chat_participants WHERE chat_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![chat_id.to_string()], |row| {
        let s: String = row.get(0)?;
        uuid_from_sql(0, &s).map(UserId)
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// The direct chat whose participant set is exactly `{a, b}`, oldest first
/// in case a legacy duplicate exists.
fn find_direct_chat(conn: &Connection, a: &UserId, b: &UserId) -> Result<Option<ChatId>> {
    let id_str: Option<String> = conn
        .query_row(
            "SELECT c.id
             FROM chats c
             JOIN chat_participants pa ON pa.chat_id = c.id AND pa.user_id = ?1
             JOIN chat_participants pb ON pb.chat_id = c.id AND pb.user_id = ?2
             WHERE c.kind = 'direct'
               AND (SELECT COUNT(*) FROM chat_participants p WHERE p.chat_id = c.id) = 2
             ORDER BY c.created_at ASC
             LIMIT 1",
            params![a.to_string(), b.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(id_str
        .map(|s| uuid_from_sql(0, &s).map(ChatId))
        .transpose()?)
}

fn insert_chat(
    conn: &Connection,
    name: &str,
    kind: ChatKind,
    creator: &UserId,
    participants: &[UserId],
) -> Result<ChatId> {
    debug_assert!(participants.contains(creator));

    let chat_id = ChatId::new();
    conn.execute(
        "INSERT INTO chats (id, name, kind, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            chat_id.to_string(),
            name,
            kind.as_str(),
            creator.to_string(),
            ts_to_sql(&now()),
        ],
    )?;

    let mut stmt =
        conn.prepare("INSERT INTO chat_participants (chat_id, user_id) VALUES (?1, ?2)")?;
    for id in participants {
        stmt.execute(params![chat_id.to_string(), id.to_string()])?;
    }

    Ok(chat_id)
}

/// Map a row selected with [`CHAT_COLUMNS`]; participants are filled in by
/// the caller.
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let id_str: String = row.get(0)?;
    let kind_str: String = row.get(2)?;
    let creator_str: String = row.get(3)?;
    let last_at_str: Option<String> = row.get(6)?;
    let created_str: String = row.get(7)?;

    let kind = ChatKind::parse(&kind_str).ok_or_else(|| unknown_variant(2, &kind_str))?;
    let last_message_at = last_at_str
        .as_deref()
        .map(|s| ts_from_sql(6, s))
        .transpose()?;

    Ok(Chat {
        id: ChatId(uuid_from_sql(0, &id_str)?),
        name: row.get(1)?,
        kind,
        participants: Vec::new(),
        created_by: UserId(uuid_from_sql(3, &creator_str)?),
        avatar: row.get(4)?,
        last_message: row.get(5)?,
        last_message_at,
        created_at: ts_from_sql(7, &created_str)?,
    })
}
