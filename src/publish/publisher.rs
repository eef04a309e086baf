//! Pack publishing orchestration.
//!
//! Bridges the conversion pipeline, the external pack-management API, and
//! the repository. Platform writes and database writes are not atomic across
//! the network boundary; when the platform accepted a sticker but the local
//! write fails, the gap is logged and surfaced, never rolled back (the
//! platform offers no compensating delete for the just-added item).

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::assets::AssetStore;
use crate::error::{Error, MediaError, PublishError, SessionError};
use crate::media::{
    ConversionProfile, MediaCodec, MediaKind, VideoValidator, detect_kind, validate_tgs,
};
use crate::platform::{PackItem, PackPlatformApi};
use crate::publish::slug::extract_pack_ref;
use crate::storage::{PackRepository, Sticker, StickerPack, StickerType};

/// Publishes packs and stickers to the external platform and reconciles the
/// results into the repository.
pub struct PackPublisher {
    api: Arc<dyn PackPlatformApi>,
    repo: Arc<dyn PackRepository>,
    codec: MediaCodec,
    video: VideoValidator,
    assets: Arc<AssetStore>,
    sticker_profile: ConversionProfile,
    default_emoji: String,
}

impl PackPublisher {
    pub fn new(
        api: Arc<dyn PackPlatformApi>,
        repo: Arc<dyn PackRepository>,
        codec: MediaCodec,
        video: VideoValidator,
        assets: Arc<AssetStore>,
        default_emoji: impl Into<String>,
    ) -> Self {
        Self {
            api,
            repo,
            codec,
            video,
            assets,
            // Pack ingestion always normalizes stills, even ones already
            // within bounds, so every pack renders uniformly.
            sticker_profile: ConversionProfile::sticker().forced(),
            default_emoji: default_emoji.into(),
        }
    }

    /// Turn raw downloaded bytes into a typed pack payload.
    ///
    /// Stills are resized and re-encoded; compressed-vector payloads are
    /// validated and passed through untouched; videos are validated against
    /// the platform limits and then normalized by the transcoder.
    pub async fn prepare_item(
        &self,
        data: Vec<u8>,
        user_id: i64,
    ) -> Result<(PackItem, StickerType), MediaError> {
        match detect_kind(&data) {
            kind if kind.is_raster() => {
                let converted = self.codec.convert(&data, &self.sticker_profile)?;
                Ok((PackItem::Still(converted.data), StickerType::Static))
            }
            MediaKind::Gzip => {
                validate_tgs(&data)?;
                Ok((PackItem::Vector(data), StickerType::Animated))
            }
            MediaKind::WebM => {
                let bytes = self.prepare_video(data, user_id).await?;
                Ok((PackItem::Video(bytes), StickerType::Video))
            }
            MediaKind::AnimatedWebP => Err(MediaError::UnsupportedKind {
                detail: "animated WebP cannot be published as a sticker".to_string(),
            }),
            other => Err(MediaError::UnsupportedKind {
                detail: format!("{other:?}"),
            }),
        }
    }

    /// Validate a video against the platform limits, then normalize it with
    /// the transcoder. Both staged files are deleted before returning.
    async fn prepare_video(&self, data: Vec<u8>, user_id: i64) -> Result<Vec<u8>, MediaError> {
        let input = self.assets.stage("video_in", user_id, &data, "webm").await?;
        let output = self.assets.reserve("video_out", user_id, "webm");

        let outcome = match self.video.validate(input.path()).await {
            Ok(probe) => {
                debug!(codec = %probe.codec, fps = probe.fps, "Video within limits, normalizing");
                match self.video.transcode(input.path(), output.path()).await {
                    Ok(()) => output.read().await.map_err(MediaError::from),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        };

        input.remove().await;
        output.remove().await;
        outcome
    }

    /// Create a new pack on the platform with its first sticker, then record
    /// both locally. The slug was generated when the title was accepted; an
    /// occupied-name rejection surfaces to the caller for a re-prompt.
    pub async fn create_pack(
        &self,
        user_id: i64,
        name: &str,
        title: &str,
        media: Vec<u8>,
        emoji: Option<&str>,
    ) -> Result<StickerPack, Error> {
        let (item, sticker_type) = self.prepare_item(media, user_id).await?;
        let emoji = emoji.unwrap_or(&self.default_emoji);

        self.api
            .create_sticker_set(user_id, name, title, item, emoji)
            .await?;

        let pack = StickerPack::new(name, title, Some(user_id), sticker_type);
        if let Err(err) = self.repo.create_pack(&pack, user_id).await {
            warn!(
                pack = %name,
                user_id,
                error = %err,
                "Platform set created but local pack write failed; set is untracked"
            );
            return Err(err.into());
        }

        let file_id = self.confirmed_file_id(name, 0).await?;
        self.record_confirmed(&pack, &file_id, Some(emoji), sticker_type)
            .await?;

        info!(pack = %name, user_id, "Created pack with first sticker");
        Ok(pack)
    }

    /// Append a sticker to an existing pack the user may edit.
    pub async fn add_sticker(
        &self,
        user_id: i64,
        pack_name: &str,
        media: Vec<u8>,
        emoji: Option<&str>,
    ) -> Result<Sticker, Error> {
        let pack = self
            .repo
            .get_pack_by_name(pack_name)
            .await?
            .ok_or_else(|| PublishError::PackNotFound {
                name: pack_name.to_string(),
            })?;
        if !self.repo.can_edit(user_id, pack.id).await? {
            return Err(PublishError::NotPermitted {
                user_id,
                name: pack_name.to_string(),
            }
            .into());
        }

        let (item, sticker_type) = self.prepare_item(media, user_id).await?;
        let emoji = emoji.unwrap_or(&self.default_emoji);
        let expected = self.repo.list_stickers(pack.id).await?.len() as i32;

        self.api
            .add_sticker_to_set(user_id, pack_name, item, emoji)
            .await?;

        let file_id = self.confirmed_file_id(pack_name, expected).await?;
        let sticker = match self
            .repo
            .record_sticker(pack.id, &file_id, Some(emoji), sticker_type)
            .await
        {
            Ok(sticker) => sticker,
            Err(err) => {
                warn!(
                    pack = %pack_name,
                    file_id = %file_id,
                    error = %err,
                    "Platform accepted sticker but local write failed; item is untracked"
                );
                return Err(err.into());
            }
        };

        info!(pack = %pack_name, position = sticker.position, "Added sticker to pack");
        Ok(sticker)
    }

    /// Import an external pack by slug or share URL. Membership is read-only
    /// unless the importing user is the platform-recognized owner, in which
    /// case it is promoted to editable. Returns the stored pack and whether
    /// the user may edit it.
    pub async fn import_pack(
        &self,
        user_id: i64,
        reference: &str,
    ) -> Result<(StickerPack, bool), Error> {
        let name = extract_pack_ref(reference).ok_or_else(|| SessionError::InvalidPackRef {
            input: reference.to_string(),
        })?;

        let remote = self.api.get_sticker_set(&name).await?;
        let sticker_type = if remote.is_video {
            StickerType::Video
        } else if remote.is_animated {
            StickerType::Animated
        } else {
            StickerType::Static
        };
        let can_edit = remote.owner_id == Some(user_id);
        // Foreign platform owners are not local users; record ownership only
        // when it can be attributed to the importer.
        let owner_id = remote.owner_id.filter(|id| *id == user_id);

        let stickers: Vec<(String, Option<String>)> = remote
            .items
            .into_iter()
            .map(|item| (item.file_id, item.emoji))
            .collect();
        let pack = StickerPack::new(name.clone(), remote.title, owner_id, sticker_type);
        let stored = self
            .repo
            .import_pack(&pack, &stickers, user_id, can_edit)
            .await?;

        info!(pack = %name, user_id, can_edit, "Imported external pack");
        Ok((stored, can_edit))
    }

    /// Re-query the set and read the platform-assigned content identifier at
    /// the expected append position.
    async fn confirmed_file_id(&self, name: &str, position: i32) -> Result<String, Error> {
        let set = self.api.get_sticker_set(name).await?;
        set.items
            .get(position as usize)
            .map(|item| item.file_id.clone())
            .ok_or_else(|| {
                PublishError::MissingFileId {
                    name: name.to_string(),
                    position,
                }
                .into()
            })
    }

    async fn record_confirmed(
        &self,
        pack: &StickerPack,
        file_id: &str,
        emoji: Option<&str>,
        sticker_type: StickerType,
    ) -> Result<(), Error> {
        if let Err(err) = self
            .repo
            .record_sticker(pack.id, file_id, emoji, sticker_type)
            .await
        {
            warn!(
                pack = %pack.name,
                file_id = %file_id,
                error = %err,
                "Platform accepted sticker but local write failed; item is untracked"
            );
            return Err(err.into());
        }
        Ok(())
    }
}
