//! The call-room registry.  Voice and video rooms share one table; video
//! rooms additionally carry the provider URL.
//!
//! A room moves `active -> inactive` exactly once, when its last participant
//! leaves.  Nothing moves it back; a new call gets a new room.

use rusqlite::{params, Connection, OptionalExtension};

use huddle_shared::{ChatId, RoomId, RoomKind, RoomMedia, UserId};

use crate::chats::load_member_chat;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::CallRoom;
use crate::sql::{now, ts_from_sql, ts_to_sql, unknown_variant, uuid_from_sql};

const ROOM_COLUMNS: &str = "id, name, chat_id, kind, room_url, is_active, created_by, created_at";

impl Database {
    /// Open a new room in `chat_id` with `caller` as its only participant.
    pub fn create_room(
        &mut self,
        caller: &UserId,
        chat_id: &ChatId,
        name: &str,
        media: RoomMedia,
    ) -> Result<CallRoom> {
        let tx = self.write_tx()?;
        load_member_chat(&tx, caller, chat_id)?;

        let room = CallRoom {
            id: RoomId::new(),
            name: name.to_string(),
            chat_id: *chat_id,
            is_active: true,
            participants: vec![*caller],
            media,
            created_by: *caller,
            created_at: now(),
        };

        tx.execute(
            "INSERT INTO call_rooms (id, name, chat_id, kind, room_url, is_active, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
            params![
                room.id.to_string(),
                room.name,
                room.chat_id.to_string(),
                room.media.kind().as_str(),
                room.media.room_url(),
                room.created_by.to_string(),
                ts_to_sql(&room.created_at),
            ],
        )?;
        add_participant(&tx, &room.id, caller)?;
        tx.commit()?;

        tracing::info!(
            room = %room.id,
            chat = %chat_id,
            kind = room.media.kind().as_str(),
            "call room created"
        );
        Ok(room)
    }

    /// Add `caller` to an active room.  Joining twice is a no-op.
    pub fn join_room(&mut self, caller: &UserId, room_id: &RoomId) -> Result<CallRoom> {
        let tx = self.write_tx()?;
        let mut room = load_room(&tx, room_id)?.ok_or(StoreError::NotFound("room"))?;

        if !room.is_active {
            return Err(StoreError::RoomClosed(*room_id));
        }
        if room.participants.contains(caller) {
            return Ok(room);
        }

        add_participant(&tx, room_id, caller)?;
        tx.commit()?;

        room.participants.push(*caller);
        tracing::debug!(room = %room_id, user = %caller, "joined room");
        Ok(room)
    }

    /// Remove `caller` from a room, deactivating it when nobody is left.
    /// Leaving a room one is not in only re-runs the emptiness check.
    pub fn leave_room(&mut self, caller: &UserId, room_id: &RoomId) -> Result<CallRoom> {
        let tx = self.write_tx()?;
        let mut room = load_room(&tx, room_id)?.ok_or(StoreError::NotFound("room"))?;

        tx.execute(
            "DELETE FROM room_participants WHERE room_id = ?1 AND user_id = ?2",
            params![room_id.to_string(), caller.to_string()],
        )?;
        room.participants.retain(|id| id != caller);

        if room.participants.is_empty() && room.is_active {
            tx.execute(
                "UPDATE call_rooms SET is_active = 0 WHERE id = ?1",
                params![room_id.to_string()],
            )?;
            room.is_active = false;
            tracing::info!(room = %room_id, "call room ended");
        }
        tx.commit()?;

        tracing::debug!(room = %room_id, user = %caller, "left room");
        Ok(room)
    }

    pub fn get_room(&self, room_id: &RoomId) -> Result<CallRoom> {
        load_room(self.conn(), room_id)?.ok_or(StoreError::NotFound("room"))
    }

    /// Active rooms of one media kind in a chat, oldest first.
    ///
    /// Only authentication is required here; chat membership is not checked.
    pub fn list_active_rooms(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        kind: RoomKind,
    ) -> Result<Vec<CallRoom>> {
        tracing::trace!(caller = %caller, chat = %chat_id, kind = kind.as_str(), "listing rooms");

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ROOM_COLUMNS}
             FROM call_rooms
             WHERE chat_id = ?1 AND is_active = 1 AND kind = ?2
             ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![chat_id.to_string(), kind.as_str()], row_to_room)?;
        let mut rooms = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        for room in &mut rooms {
            room.participants = load_room_participants(conn, &room.id)?;
        }
        Ok(rooms)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn add_participant(conn: &Connection, room_id: &RoomId, user: &UserId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO room_participants (room_id, user_id) VALUES (?1, ?2)",
        params![room_id.to_string(), user.to_string()],
    )?;
    Ok(())
}

fn load_room(conn: &Connection, room_id: &RoomId) -> Result<Option<CallRoom>> {
    let room = conn
        .query_row(
            &format!("SELECT {ROOM_COLUMNS} FROM call_rooms WHERE id = ?1"),
            params![room_id.to_string()],
            row_to_room,
        )
        .optional()?;

    match room {
        Some(mut room) => {
            room.participants = load_room_participants(conn, room_id)?;
            Ok(Some(room))
        }
        None => Ok(None),
    }
}

fn load_room_participants(conn: &Connection, room_id: &RoomId) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM room_participants WHERE room_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![room_id.to_string()], |row| {
        let s: String = row.get(0)?;
        uuid_from_sql(0, &s).map(UserId)
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallRoom> {
    let id_str: String = row.get(0)?;
    let chat_str: String = row.get(2)?;
    let kind_str: String = row.get(3)?;
    let room_url: Option<String> = row.get(4)?;
    let is_active: i32 = row.get(5)?;
    let creator_str: String = row.get(6)?;
    let created_str: String = row.get(7)?;

    let media = match (RoomKind::parse(&kind_str), room_url) {
        (Some(RoomKind::Voice), _) => RoomMedia::Voice,
        (Some(RoomKind::Video), Some(room_url)) => RoomMedia::Video { room_url },
        _ => return Err(unknown_variant(3, &kind_str)),
    };

    Ok(CallRoom {
        id: RoomId(uuid_from_sql(0, &id_str)?),
        name: row.get(1)?,
        chat_id: ChatId(uuid_from_sql(2, &chat_str)?),
        is_active: is_active != 0,
        participants: Vec::new(),
        media,
        created_by: UserId(uuid_from_sql(6, &creator_str)?),
        created_at: ts_from_sql(7, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    struct Fixture {
        db: Database,
        u1: User,
        u2: User,
        outsider: User,
        chat_id: ChatId,
    }

    fn fixture() -> Fixture {
        let mut db = Database::open_in_memory().unwrap();
        let u1 = db.find_or_create_user("u1@example.com", Some("U1")).unwrap();
        let u2 = db.find_or_create_user("u2@example.com", Some("U2")).unwrap();
        let outsider = db.find_or_create_user("x@example.com", Some("X")).unwrap();
        let chat_id = db.create_direct_chat(&u1.id, &u2.id).unwrap();
        Fixture {
            db,
            u1,
            u2,
            outsider,
            chat_id,
        }
    }

    fn video() -> RoomMedia {
        RoomMedia::Video {
            room_url: "https://example.daily.co/room".into(),
        }
    }

    #[test]
    fn video_room_join_then_both_leave() {
        let Fixture {
            mut db,
            u1,
            u2,
            chat_id,
            ..
        } = fixture();

        let room = db.create_room(&u1.id, &chat_id, "U1-video-1", video()).unwrap();
        assert!(room.is_active);
        assert_eq!(room.participants, vec![u1.id]);

        let joined = db.join_room(&u2.id, &room.id).unwrap();
        assert_eq!(joined.participants, vec![u1.id, u2.id]);

        let after_first = db.leave_room(&u1.id, &room.id).unwrap();
        assert!(after_first.is_active);
        assert_eq!(after_first.participants, vec![u2.id]);

        db.leave_room(&u2.id, &room.id).unwrap();
        let stored = db.get_room(&room.id).unwrap();
        assert!(!stored.is_active);
        assert!(stored.participants.is_empty());
        assert_eq!(stored.media, video());
    }

    #[test]
    fn join_is_idempotent() {
        let Fixture {
            mut db,
            u1,
            u2,
            chat_id,
            ..
        } = fixture();
        let room = db.create_room(&u1.id, &chat_id, "call", RoomMedia::Voice).unwrap();

        db.join_room(&u2.id, &room.id).unwrap();
        let twice = db.join_room(&u2.id, &room.id).unwrap();
        db.join_room(&u1.id, &room.id).unwrap();

        assert_eq!(twice.participants.len(), 2);
        assert_eq!(db.get_room(&room.id).unwrap().participants, vec![u1.id, u2.id]);
    }

    #[test]
    fn deactivation_is_permanent() {
        let Fixture {
            mut db,
            u1,
            u2,
            chat_id,
            ..
        } = fixture();
        let room = db.create_room(&u1.id, &chat_id, "call", RoomMedia::Voice).unwrap();

        let left = db.leave_room(&u1.id, &room.id).unwrap();
        assert!(!left.is_active);

        assert!(matches!(
            db.join_room(&u2.id, &room.id),
            Err(StoreError::RoomClosed(id)) if id == room.id
        ));

        // Repeated leave keeps it inactive and empty.
        let again = db.leave_room(&u1.id, &room.id).unwrap();
        assert!(!again.is_active);
        assert!(again.participants.is_empty());
        assert!(!db.get_room(&room.id).unwrap().is_active);
    }

    #[test]
    fn leave_by_non_participant_changes_nothing() {
        let Fixture {
            mut db,
            u1,
            u2,
            chat_id,
            ..
        } = fixture();
        let room = db.create_room(&u1.id, &chat_id, "call", RoomMedia::Voice).unwrap();

        let after = db.leave_room(&u2.id, &room.id).unwrap();
        assert!(after.is_active);
        assert_eq!(after.participants, vec![u1.id]);
    }

    #[test]
    fn unknown_room_is_not_found() {
        let Fixture { mut db, u1, .. } = fixture();
        let missing = RoomId::new();

        assert!(matches!(
            db.join_room(&u1.id, &missing),
            Err(StoreError::NotFound("room"))
        ));
        assert!(matches!(
            db.leave_room(&u1.id, &missing),
            Err(StoreError::NotFound("room"))
        ));
    }

    #[test]
    fn only_participants_create_rooms() {
        let Fixture {
            mut db,
            outsider,
            chat_id,
            ..
        } = fixture();

        assert!(matches!(
            db.create_room(&outsider.id, &chat_id, "call", RoomMedia::Voice),
            Err(StoreError::Forbidden)
        ));
        assert!(matches!(
            db.create_room(&outsider.id, &ChatId::new(), "call", RoomMedia::Voice),
            Err(StoreError::Forbidden)
        ));
    }

    #[test]
    fn active_listing_filters_kind_and_state() {
        let Fixture {
            mut db,
            u1,
            outsider,
            chat_id,
            ..
        } = fixture();

        let voice = db.create_room(&u1.id, &chat_id, "v", RoomMedia::Voice).unwrap();
        let ended = db.create_room(&u1.id, &chat_id, "old", video()).unwrap();
        db.leave_room(&u1.id, &ended.id).unwrap();
        let live = db.create_room(&u1.id, &chat_id, "new", video()).unwrap();

        let videos = db.list_active_rooms(&u1.id, &chat_id, RoomKind::Video).unwrap();
        assert_eq!(videos.iter().map(|r| r.id).collect::<Vec<_>>(), vec![live.id]);
        assert_eq!(videos[0].participants, vec![u1.id]);

        let voices = db.list_active_rooms(&u1.id, &chat_id, RoomKind::Voice).unwrap();
        assert_eq!(voices.iter().map(|r| r.id).collect::<Vec<_>>(), vec![voice.id]);

        // Membership is not re-checked for listing.
        assert_eq!(
            db.list_active_rooms(&outsider.id, &chat_id, RoomKind::Video)
                .unwrap()
                .len(),
            1
        );
    }
}
