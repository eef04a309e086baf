//! Persistence entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a platform user, as delivered with each inbound event.
/// Upserted on first interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Platform-assigned user id.
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Kind of a stored sticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickerType {
    Static,
    Animated,
    Video,
}

impl StickerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Animated => "animated",
            Self::Video => "video",
        }
    }

    pub fn from_str_loose(raw: &str) -> Self {
        match raw {
            "animated" => Self::Animated,
            "video" => Self::Video,
            _ => Self::Static,
        }
    }
}

impl std::fmt::Display for StickerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, ordered collection of stickers.
///
/// Ids are random, never sequential, so creation order is not exposed.
/// `owner_id` is NULL for imported packs whose platform-side owner is not a
/// known local user.
#[derive(Debug, Clone, PartialEq)]
pub struct StickerPack {
    pub id: Uuid,
    /// Platform-unique slug.
    pub name: String,
    /// Display title.
    pub title: String,
    pub owner_id: Option<i64>,
    pub is_animated: bool,
    pub is_video: bool,
    pub created_at: DateTime<Utc>,
    /// Bumped on every sticker addition.
    pub last_modified: DateTime<Utc>,
}

impl StickerPack {
    /// Build a new pack with a freshly generated opaque id.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        owner_id: Option<i64>,
        sticker_type: StickerType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            title: title.into(),
            owner_id,
            is_animated: sticker_type == StickerType::Animated,
            is_video: sticker_type == StickerType::Video,
            created_at: now,
            last_modified: now,
        }
    }
}

/// A sticker recorded after the platform confirmed its file identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Sticker {
    pub id: Uuid,
    pub pack_id: Uuid,
    /// Platform-assigned content identifier.
    pub file_id: String,
    pub emoji: Option<String>,
    /// 0-based append order, monotonic per pack.
    pub position: i32,
    pub sticker_type: StickerType,
    pub created_at: DateTime<Utc>,
}

/// The relation granting a user visibility and optionally edit rights over
/// a pack. Unique per (user, pack).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPackMembership {
    pub user_id: i64,
    pub pack_id: Uuid,
    pub can_edit: bool,
    pub is_favorite: bool,
    pub added_at: DateTime<Utc>,
}

/// Point-read statistics for a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    pub sticker_count: i64,
    pub favorite_count: i64,
}
