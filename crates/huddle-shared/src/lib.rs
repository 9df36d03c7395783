//! Types shared by the Huddle store and server: identifier newtypes, the
//! closed kinds of chats, messages and call rooms, and global constants.

pub mod constants;
pub mod types;

pub use types::*;
