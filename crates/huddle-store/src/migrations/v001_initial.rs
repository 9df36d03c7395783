//! v001 -- Initial schema creation.
//!
//! Creates the tables: `users`, `sessions`, `chats`, `chat_participants`,
//! `messages`, `call_rooms` and `room_participants`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name         TEXT,
    email        TEXT UNIQUE,
    image        TEXT,
    is_anonymous INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at   TEXT NOT NULL                -- RFC-3339, microseconds
);

-- ----------------------------------------------------------------
-- Sessions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY NOT NULL,     -- hex, 32 random bytes
    user_id    TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id              TEXT PRIMARY KEY NOT NULL, -- UUID v4
    name            TEXT NOT NULL,
    kind            TEXT NOT NULL CHECK (kind IN ('direct', 'group')),
    created_by      TEXT NOT NULL,
    avatar          TEXT,
    last_message    TEXT,
    last_message_at TEXT,
    created_at      TEXT NOT NULL,

    FOREIGN KEY (created_by) REFERENCES users(id)
);

-- Participant membership; rowid order is insertion order.
CREATE TABLE IF NOT EXISTS chat_participants (
    chat_id TEXT NOT NULL,
    user_id TEXT NOT NULL,

    PRIMARY KEY (chat_id, user_id),
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_chat_participants_user
    ON chat_participants(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    chat_id    TEXT NOT NULL,
    sender_id  TEXT NOT NULL,
    content    TEXT NOT NULL,
    kind       TEXT NOT NULL CHECK (kind IN ('text', 'image')),
    asset_id   TEXT,                          -- set iff kind = 'image'
    created_at TEXT NOT NULL,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
    ON messages(chat_id, created_at);

-- ----------------------------------------------------------------
-- Call rooms (voice and video)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS call_rooms (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    name       TEXT NOT NULL,
    chat_id    TEXT NOT NULL,
    kind       TEXT NOT NULL CHECK (kind IN ('voice', 'video')),
    room_url   TEXT,                          -- set iff kind = 'video'
    is_active  INTEGER NOT NULL DEFAULT 1,    -- boolean 0/1
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE,
    FOREIGN KEY (created_by) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_call_rooms_chat_active
    ON call_rooms(chat_id, is_active);

CREATE TABLE IF NOT EXISTS room_participants (
    room_id TEXT NOT NULL,
    user_id TEXT NOT NULL,

    PRIMARY KEY (room_id, user_id),
    FOREIGN KEY (room_id) REFERENCES call_rooms(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
