//! Pack-management API seam and error-code classification.

use async_trait::async_trait;

use crate::error::PlatformError;

/// A sticker payload, tagged by kind.
#[derive(Debug, Clone)]
pub enum PackItem {
    /// Still image (lossless PNG bytes).
    Still(Vec<u8>),
    /// Compressed-vector animation (gzip-compressed payload).
    Vector(Vec<u8>),
    /// Short silent VP9 video.
    Video(Vec<u8>),
}

impl PackItem {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Still(b) | Self::Vector(b) | Self::Video(b) => b,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }
}

/// A sticker as reported by the platform when querying a set.
#[derive(Debug, Clone)]
pub struct RemoteSticker {
    /// Platform-assigned content identifier.
    pub file_id: String,
    /// Emoji tag, if any.
    pub emoji: Option<String>,
}

/// A sticker set as reported by the platform.
#[derive(Debug, Clone)]
pub struct RemoteStickerSet {
    pub title: String,
    pub is_animated: bool,
    pub is_video: bool,
    /// Platform-side owner, when the platform discloses it.
    pub owner_id: Option<i64>,
    /// Items in set order.
    pub items: Vec<RemoteSticker>,
}

/// External pack-management API.
#[async_trait]
pub trait PackPlatformApi: Send + Sync {
    async fn create_sticker_set(
        &self,
        owner_id: i64,
        name: &str,
        title: &str,
        first: PackItem,
        emoji: &str,
    ) -> Result<(), PlatformError>;

    async fn add_sticker_to_set(
        &self,
        owner_id: i64,
        name: &str,
        item: PackItem,
        emoji: &str,
    ) -> Result<(), PlatformError>;

    async fn get_sticker_set(&self, name: &str) -> Result<RemoteStickerSet, PlatformError>;

    async fn delete_sticker(&self, file_id: &str) -> Result<(), PlatformError>;

    async fn set_sticker_position(&self, file_id: &str, position: u32)
    -> Result<(), PlatformError>;
}

/// Classified cause of a pack-management API rejection.
///
/// Known platform error codes map to a specific cause; everything else is
/// surfaced as [`PlatformErrorKind::Other`] with the raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    /// Pack slug is malformed or refers to no set.
    InvalidName,
    /// Pack slug is already taken.
    NameOccupied,
    /// The user owns too many sets.
    TooManyPacks,
    /// The set holds the maximum number of stickers.
    TooManyStickers,
    /// Still image has invalid dimensions or encoding.
    InvalidDimensions,
    /// Compressed-vector payload rejected.
    InvalidAnimatedPayload,
    /// Video payload rejected.
    InvalidVideoPayload,
    /// Unrecognized code; raw message carried through.
    Other,
}

impl std::fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidName => "invalid pack name",
            Self::NameOccupied => "pack name already taken",
            Self::TooManyPacks => "too many packs",
            Self::TooManyStickers => "too many stickers in pack",
            Self::InvalidDimensions => "invalid sticker dimensions",
            Self::InvalidAnimatedPayload => "invalid animated sticker",
            Self::InvalidVideoPayload => "invalid video sticker",
            Self::Other => "platform error",
        };
        write!(f, "{}", s)
    }
}

/// Classify a raw platform error code or message.
pub fn classify_platform_error(raw: &str) -> PlatformErrorKind {
    let upper = raw.to_ascii_uppercase();
    if upper.contains("PACK_SHORT_NAME_OCCUPIED") || upper.contains("ALREADY OCCUPIED") {
        PlatformErrorKind::NameOccupied
    } else if upper.contains("PACK_SHORT_NAME_INVALID") || upper.contains("STICKERSET_INVALID") {
        PlatformErrorKind::InvalidName
    } else if upper.contains("PACKS_TOO_MUCH") {
        PlatformErrorKind::TooManyPacks
    } else if upper.contains("STICKERS_TOO_MUCH") {
        PlatformErrorKind::TooManyStickers
    } else if upper.contains("STICKER_PNG_DIMENSIONS") || upper.contains("STICKER_PNG_NOPNG") {
        PlatformErrorKind::InvalidDimensions
    } else if upper.contains("STICKER_TGS_NOTGS") {
        PlatformErrorKind::InvalidAnimatedPayload
    } else if upper.contains("STICKER_VIDEO_NOWEBM") || upper.contains("STICKER_VIDEO_BIG") {
        PlatformErrorKind::InvalidVideoPayload
    } else {
        PlatformErrorKind::Other
    }
}

/// Build a classified API error from a raw platform code and message.
/// Intended for [`PackPlatformApi`] implementations.
pub fn api_error(code: impl Into<String>, message: impl Into<String>) -> PlatformError {
    let code = code.into();
    let message = message.into();
    PlatformError::Api {
        kind: classify_platform_error(&code),
        code: Some(code),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        assert_eq!(
            classify_platform_error("PACK_SHORT_NAME_OCCUPIED"),
            PlatformErrorKind::NameOccupied
        );
        assert_eq!(
            classify_platform_error("PACK_SHORT_NAME_INVALID"),
            PlatformErrorKind::InvalidName
        );
        assert_eq!(
            classify_platform_error("PACKS_TOO_MUCH"),
            PlatformErrorKind::TooManyPacks
        );
        assert_eq!(
            classify_platform_error("STICKERS_TOO_MUCH"),
            PlatformErrorKind::TooManyStickers
        );
        assert_eq!(
            classify_platform_error("STICKER_PNG_DIMENSIONS"),
            PlatformErrorKind::InvalidDimensions
        );
        assert_eq!(
            classify_platform_error("STICKER_TGS_NOTGS"),
            PlatformErrorKind::InvalidAnimatedPayload
        );
        assert_eq!(
            classify_platform_error("STICKER_VIDEO_NOWEBM"),
            PlatformErrorKind::InvalidVideoPayload
        );
    }

    #[test]
    fn test_classify_message_text() {
        assert_eq!(
            classify_platform_error("sticker set name is already occupied"),
            PlatformErrorKind::NameOccupied
        );
    }

    #[test]
    fn test_classify_unknown_falls_back_to_other() {
        assert_eq!(
            classify_platform_error("FLOOD_WAIT_30"),
            PlatformErrorKind::Other
        );
    }

    #[test]
    fn test_api_error_carries_code_and_kind() {
        let err = api_error("STICKERS_TOO_MUCH", "set is full");
        match err {
            PlatformError::Api { kind, code, .. } => {
                assert_eq!(kind, PlatformErrorKind::TooManyStickers);
                assert_eq!(code.as_deref(), Some("STICKERS_TOO_MUCH"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_pack_item_kind_accessors() {
        assert!(PackItem::Vector(vec![0x1f, 0x8b]).is_vector());
        assert!(PackItem::Video(vec![]).is_video());
        assert!(!PackItem::Still(vec![]).is_vector());
        assert_eq!(PackItem::Still(vec![1, 2]).bytes(), &[1, 2]);
    }
}
