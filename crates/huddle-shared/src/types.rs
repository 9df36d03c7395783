use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Stable identity of a user account.
    UserId
);
uuid_id!(ChatId);
uuid_id!(MessageId);
uuid_id!(
    /// Identifier of a voice or video call room.
    RoomId
);
uuid_id!(
    /// Identifier of a binary object in the asset store.
    AssetId
);

// ---------------------------------------------------------------------------
// Chat kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// Exactly two participants, at most one chat per unordered pair.
    Direct,
    Group,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Message kind
// ---------------------------------------------------------------------------

/// What a message carries besides its text.  Image messages reference an
/// asset that was uploaded beforehand; their content is the file name label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image {
        #[serde(rename = "assetId")]
        asset_id: AssetId,
    },
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image { .. } => "image",
        }
    }

    pub fn asset_id(&self) -> Option<AssetId> {
        match self {
            Self::Text => None,
            Self::Image { asset_id } => Some(*asset_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Call rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Voice,
    Video,
}

impl RoomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "voice" => Some(Self::Voice),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Media of a call room.  Video rooms are hosted by the external provider and
/// carry the URL clients open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RoomMedia {
    Voice,
    Video {
        #[serde(rename = "roomUrl")]
        room_url: String,
    },
}

impl RoomMedia {
    pub fn kind(&self) -> RoomKind {
        match self {
            Self::Voice => RoomKind::Voice,
            Self::Video { .. } => RoomKind::Video,
        }
    }

    pub fn room_url(&self) -> Option<&str> {
        match self {
            Self::Voice => None,
            Self::Video { room_url } => Some(room_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_wire_shape() {
        let asset_id = AssetId::new();
        let json = serde_json::to_value(MessageKind::Image { asset_id }).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["assetId"], asset_id.to_string());

        let text: MessageKind = serde_json::from_str(r#"{"kind":"text"}"#).unwrap();
        assert_eq!(text, MessageKind::Text);
        assert_eq!(text.asset_id(), None);
    }

    #[test]
    fn image_without_asset_is_rejected() {
        assert!(serde_json::from_str::<MessageKind>(r#"{"kind":"image"}"#).is_err());
    }

    #[test]
    fn room_media_kind() {
        let video = RoomMedia::Video {
            room_url: "https://example.daily.co/x".into(),
        };
        assert_eq!(video.kind(), RoomKind::Video);
        assert_eq!(video.room_url(), Some("https://example.daily.co/x"));
        assert_eq!(RoomMedia::Voice.room_url(), None);
    }

    #[test]
    fn kinds_parse_their_own_names() {
        for kind in [ChatKind::Direct, ChatKind::Group] {
            assert_eq!(ChatKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RoomKind::parse("video"), Some(RoomKind::Video));
        assert_eq!(RoomKind::parse("screen"), None);
    }
}
