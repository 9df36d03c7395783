/// Application name
pub const APP_NAME: &str = "Huddle";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Maximum message content length in bytes (16 KiB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Maximum uploaded asset size in bytes (20 MiB)
pub const MAX_ASSET_SIZE: usize = 20 * 1024 * 1024;

/// Name given to a direct chat when the other user has neither name nor email
pub const DIRECT_CHAT_FALLBACK_NAME: &str = "Direct Chat";

/// Random bytes in a session token (hex-encoded on the wire)
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Lifetime of a one-shot upload ticket in seconds
pub const UPLOAD_TICKET_TTL_SECS: u64 = 3600;

/// Video provider defaults
pub const VIDEO_MAX_PARTICIPANTS: u32 = 10;
pub const VIDEO_ROOM_TTL_SECS: i64 = 3600;
pub const VIDEO_TIMEOUT_SECS: u64 = 10;
