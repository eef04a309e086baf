//! Repository seam for pack persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::storage::models::{
    PackStats, Sticker, StickerPack, StickerType, UserInfo, UserPackMembership,
};

/// CRUD and transactional compound operations over users, packs, stickers,
/// and memberships.
///
/// Every compound operation applies all of its writes or none of them; a
/// failure rolls back and re-raises to the caller.
#[async_trait]
pub trait PackRepository: Send + Sync {
    /// Create or refresh a user row (upsert by id).
    async fn upsert_user(&self, user: &UserInfo) -> Result<(), DatabaseError>;

    /// Insert a pack together with its creator's editable membership.
    async fn create_pack(&self, pack: &StickerPack, creator: i64) -> Result<(), DatabaseError>;

    /// Insert an imported pack, its known stickers, and a membership for the
    /// importing user, in one transaction. No-ops on the pack row when the
    /// slug already exists locally.
    async fn import_pack(
        &self,
        pack: &StickerPack,
        stickers: &[(String, Option<String>)],
        user_id: i64,
        can_edit: bool,
    ) -> Result<StickerPack, DatabaseError>;

    /// Record a confirmed sticker at the next position and bump the pack's
    /// `last_modified`, in one transaction.
    async fn record_sticker(
        &self,
        pack_id: Uuid,
        file_id: &str,
        emoji: Option<&str>,
        sticker_type: StickerType,
    ) -> Result<Sticker, DatabaseError>;

    /// Remove a user's membership. When no memberships remain and the user
    /// is not the recorded owner, the pack is deleted and its stickers
    /// cascade. Returns whether the pack was deleted.
    async fn remove_membership(&self, user_id: i64, pack_id: Uuid)
    -> Result<bool, DatabaseError>;

    /// Flip the favorite flag on a membership.
    async fn set_favorite(
        &self,
        user_id: i64,
        pack_id: Uuid,
        favorite: bool,
    ) -> Result<(), DatabaseError>;

    /// Packs visible to a user: favorites first, then most recently
    /// modified.
    async fn list_packs_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<(StickerPack, UserPackMembership)>, DatabaseError>;

    /// Stickers of a pack in ascending position order.
    async fn list_stickers(&self, pack_id: Uuid) -> Result<Vec<Sticker>, DatabaseError>;

    /// Look up a pack by slug.
    async fn get_pack_by_name(&self, name: &str) -> Result<Option<StickerPack>, DatabaseError>;

    /// Whether the user may mutate the pack: recorded owner or a membership
    /// with `can_edit`.
    async fn can_edit(&self, user_id: i64, pack_id: Uuid) -> Result<bool, DatabaseError>;

    /// Sticker and favorite counts for a pack.
    async fn pack_stats(&self, pack_id: Uuid) -> Result<PackStats, DatabaseError>;
}
