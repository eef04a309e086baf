//! End-to-end conversation journeys against in-memory collaborators.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use packsmith::assets::AssetStore;
use packsmith::error::{DatabaseError, PlatformError};
use packsmith::media::{MediaCodec, VideoValidator};
use packsmith::platform::{
    ChatId, FileMeta, FileRef, FileSource, PackItem, PackPlatformApi, RemoteSticker,
    RemoteStickerSet, ReplyAction, ReplySink, api_error,
};
use packsmith::publish::PackPublisher;
use packsmith::session::{
    ConversationEngine, InboundEvent, MediaAttachment, Mode, PackStep, SessionStore,
};
use packsmith::storage::{
    PackRepository, PackStats, Sticker, StickerPack, StickerType, UserInfo, UserPackMembership,
};
use uuid::Uuid;

const CHAT: ChatId = 100;

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

fn user(id: i64) -> UserInfo {
    UserInfo {
        id,
        username: Some(format!("user{id}")),
        first_name: Some("Test".to_string()),
        last_name: None,
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([180, 40, 40, 255]),
    ));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode test png");
    out.into_inner()
}

/// Attachment metadata sized well above the thumbnail threshold.
fn attachment(id: &str) -> MediaAttachment {
    MediaAttachment::new(FileRef::new(id), 6 * 1024 * 1024)
}

fn thumbnail(id: &str) -> MediaAttachment {
    MediaAttachment::new(FileRef::new(id), 40 * 1024)
}

// ---------------------------------------------------------------------------
// In-memory collaborators
// ---------------------------------------------------------------------------

struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl FileSource for MemorySource {
    async fn resolve(&self, file: &FileRef) -> Result<FileMeta, PlatformError> {
        let data = self
            .files
            .get(file.as_str())
            .ok_or_else(|| PlatformError::DownloadFailed {
                reason: format!("unknown file {}", file.as_str()),
            })?;
        Ok(FileMeta {
            byte_size: data.len() as u64,
            kind_hint: None,
        })
    }

    async fn download(&self, file: &FileRef) -> Result<Vec<u8>, PlatformError> {
        self.files
            .get(file.as_str())
            .cloned()
            .ok_or_else(|| PlatformError::DownloadFailed {
                reason: format!("unknown file {}", file.as_str()),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Document(String),
    Text(String),
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSink {
    fn log(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t),
                Sent::Document(_) => None,
            })
            .collect()
    }

    fn documents(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Document(name) => Some(name),
                Sent::Text(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send_document(
        &self,
        _chat: ChatId,
        _path: &std::path::Path,
        filename: &str,
    ) -> Result<(), PlatformError> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Document(filename.to_string()));
        Ok(())
    }

    async fn send_text(
        &self,
        _chat: ChatId,
        text: &str,
        _actions: &[ReplyAction],
    ) -> Result<(), PlatformError> {
        self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        Ok(())
    }
}

#[derive(Clone)]
struct FakeSet {
    title: String,
    owner_id: Option<i64>,
    is_animated: bool,
    is_video: bool,
    items: Vec<RemoteSticker>,
}

#[derive(Default)]
struct FakePlatform {
    sets: Mutex<HashMap<String, FakeSet>>,
    fail_next_create: Mutex<Option<&'static str>>,
}

impl FakePlatform {
    fn seed_set(&self, name: &str, title: &str, owner_id: Option<i64>, items: usize) {
        let items = (0..items)
            .map(|i| RemoteSticker {
                file_id: format!("file_{name}_{i}"),
                emoji: Some("\u{1F600}".to_string()),
            })
            .collect();
        self.sets.lock().unwrap().insert(
            name.to_string(),
            FakeSet {
                title: title.to_string(),
                owner_id,
                is_animated: false,
                is_video: false,
                items,
            },
        );
    }
}

#[async_trait]
impl PackPlatformApi for FakePlatform {
    async fn create_sticker_set(
        &self,
        owner_id: i64,
        name: &str,
        title: &str,
        _first: PackItem,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        if let Some(code) = self.fail_next_create.lock().unwrap().take() {
            return Err(api_error(code, "rejected by platform"));
        }
        let mut sets = self.sets.lock().unwrap();
        if sets.contains_key(name) {
            return Err(api_error("PACK_SHORT_NAME_OCCUPIED", "name taken"));
        }
        sets.insert(
            name.to_string(),
            FakeSet {
                title: title.to_string(),
                owner_id: Some(owner_id),
                is_animated: false,
                is_video: false,
                items: vec![RemoteSticker {
                    file_id: format!("file_{name}_0"),
                    emoji: Some(emoji.to_string()),
                }],
            },
        );
        Ok(())
    }

    async fn add_sticker_to_set(
        &self,
        _owner_id: i64,
        name: &str,
        _item: PackItem,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        let mut sets = self.sets.lock().unwrap();
        let set = sets
            .get_mut(name)
            .ok_or_else(|| api_error("STICKERSET_INVALID", "no such set"))?;
        let position = set.items.len();
        set.items.push(RemoteSticker {
            file_id: format!("file_{name}_{position}"),
            emoji: Some(emoji.to_string()),
        });
        Ok(())
    }

    async fn get_sticker_set(&self, name: &str) -> Result<RemoteStickerSet, PlatformError> {
        let sets = self.sets.lock().unwrap();
        let set = sets
            .get(name)
            .ok_or_else(|| api_error("STICKERSET_INVALID", "no such set"))?;
        Ok(RemoteStickerSet {
            title: set.title.clone(),
            is_animated: set.is_animated,
            is_video: set.is_video,
            owner_id: set.owner_id,
            items: set.items.clone(),
        })
    }

    async fn delete_sticker(&self, _file_id: &str) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn set_sticker_position(
        &self,
        _file_id: &str,
        _position: u32,
    ) -> Result<(), PlatformError> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryRepo {
    users: Mutex<HashMap<i64, UserInfo>>,
    packs: Mutex<Vec<StickerPack>>,
    stickers: Mutex<Vec<Sticker>>,
    memberships: Mutex<Vec<UserPackMembership>>,
}

#[async_trait]
impl PackRepository for MemoryRepo {
    async fn upsert_user(&self, user: &UserInfo) -> Result<(), DatabaseError> {
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }

    async fn create_pack(&self, pack: &StickerPack, creator: i64) -> Result<(), DatabaseError> {
        self.packs.lock().unwrap().push(pack.clone());
        self.memberships.lock().unwrap().push(UserPackMembership {
            user_id: creator,
            pack_id: pack.id,
            can_edit: true,
            is_favorite: false,
            added_at: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn import_pack(
        &self,
        pack: &StickerPack,
        stickers: &[(String, Option<String>)],
        user_id: i64,
        can_edit: bool,
    ) -> Result<StickerPack, DatabaseError> {
        let stored = {
            let mut packs = self.packs.lock().unwrap();
            match packs.iter().find(|p| p.name == pack.name) {
                Some(existing) => existing.clone(),
                None => {
                    packs.push(pack.clone());
                    pack.clone()
                }
            }
        };
        {
            let mut all = self.stickers.lock().unwrap();
            if !all.iter().any(|s| s.pack_id == stored.id) {
                for (position, (file_id, emoji)) in stickers.iter().enumerate() {
                    all.push(Sticker {
                        id: Uuid::new_v4(),
                        pack_id: stored.id,
                        file_id: file_id.clone(),
                        emoji: emoji.clone(),
                        position: position as i32,
                        sticker_type: StickerType::Static,
                        created_at: chrono::Utc::now(),
                    });
                }
            }
        }
        let mut memberships = self.memberships.lock().unwrap();
        match memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.pack_id == stored.id)
        {
            Some(m) => m.can_edit = m.can_edit || can_edit,
            None => memberships.push(UserPackMembership {
                user_id,
                pack_id: stored.id,
                can_edit,
                is_favorite: false,
                added_at: chrono::Utc::now(),
            }),
        }
        Ok(stored)
    }

    async fn record_sticker(
        &self,
        pack_id: Uuid,
        file_id: &str,
        emoji: Option<&str>,
        sticker_type: StickerType,
    ) -> Result<Sticker, DatabaseError> {
        let position = self
            .stickers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.pack_id == pack_id)
            .count() as i32;
        let sticker = Sticker {
            id: Uuid::new_v4(),
            pack_id,
            file_id: file_id.to_string(),
            emoji: emoji.map(str::to_string),
            position,
            sticker_type,
            created_at: chrono::Utc::now(),
        };
        self.stickers.lock().unwrap().push(sticker.clone());
        if let Some(pack) = self
            .packs
            .lock()
            .unwrap()
            .iter_mut()
            .find(|p| p.id == pack_id)
        {
            pack.last_modified = sticker.created_at;
        }
        Ok(sticker)
    }

    async fn remove_membership(&self, user_id: i64, pack_id: Uuid) -> Result<bool, DatabaseError> {
        let mut memberships = self.memberships.lock().unwrap();
        memberships.retain(|m| !(m.user_id == user_id && m.pack_id == pack_id));
        let remaining = memberships.iter().filter(|m| m.pack_id == pack_id).count();
        drop(memberships);

        let owner = self
            .packs
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == pack_id)
            .and_then(|p| p.owner_id);
        if remaining == 0 && owner != Some(user_id) {
            self.packs.lock().unwrap().retain(|p| p.id != pack_id);
            self.stickers.lock().unwrap().retain(|s| s.pack_id != pack_id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn set_favorite(
        &self,
        user_id: i64,
        pack_id: Uuid,
        favorite: bool,
    ) -> Result<(), DatabaseError> {
        let mut memberships = self.memberships.lock().unwrap();
        let membership = memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.pack_id == pack_id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user_pack_membership".to_string(),
                id: format!("{user_id}/{pack_id}"),
            })?;
        membership.is_favorite = favorite;
        Ok(())
    }

    async fn list_packs_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<(StickerPack, UserPackMembership)>, DatabaseError> {
        let memberships = self.memberships.lock().unwrap();
        let packs = self.packs.lock().unwrap();
        let mut result: Vec<(StickerPack, UserPackMembership)> = memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                packs
                    .iter()
                    .find(|p| p.id == m.pack_id)
                    .map(|p| (p.clone(), m.clone()))
            })
            .collect();
        result.sort_by(|(pa, ma), (pb, mb)| {
            mb.is_favorite
                .cmp(&ma.is_favorite)
                .then(pb.last_modified.cmp(&pa.last_modified))
        });
        Ok(result)
    }

    async fn list_stickers(&self, pack_id: Uuid) -> Result<Vec<Sticker>, DatabaseError> {
        let mut stickers: Vec<Sticker> = self
            .stickers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.pack_id == pack_id)
            .cloned()
            .collect();
        stickers.sort_by_key(|s| s.position);
        Ok(stickers)
    }

    async fn get_pack_by_name(&self, name: &str) -> Result<Option<StickerPack>, DatabaseError> {
        Ok(self
            .packs
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn can_edit(&self, user_id: i64, pack_id: Uuid) -> Result<bool, DatabaseError> {
        let owned = self
            .packs
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.id == pack_id && p.owner_id == Some(user_id));
        let editable = self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.user_id == user_id && m.pack_id == pack_id && m.can_edit);
        Ok(owned || editable)
    }

    async fn pack_stats(&self, pack_id: Uuid) -> Result<PackStats, DatabaseError> {
        let sticker_count = self
            .stickers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.pack_id == pack_id)
            .count() as i64;
        let favorite_count = self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.pack_id == pack_id && m.is_favorite)
            .count() as i64;
        Ok(PackStats {
            sticker_count,
            favorite_count,
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    engine: ConversationEngine,
    sink: Arc<RecordingSink>,
    api: Arc<FakePlatform>,
    repo: Arc<MemoryRepo>,
    sessions: Arc<SessionStore>,
    _temp: TempDir,
}

impl Harness {
    fn new(files: Vec<(&str, Vec<u8>)>) -> Self {
        init_tracing();
        let temp = TempDir::new().expect("tempdir");
        let assets = Arc::new(AssetStore::new(temp.path()).expect("asset store"));
        let source = Arc::new(MemorySource {
            files: files
                .into_iter()
                .map(|(id, data)| (id.to_string(), data))
                .collect(),
        });
        let sink = Arc::new(RecordingSink::default());
        let api = Arc::new(FakePlatform::default());
        let repo = Arc::new(MemoryRepo::default());
        let sessions = Arc::new(SessionStore::new());

        let publisher = Arc::new(PackPublisher::new(
            Arc::clone(&api) as Arc<dyn PackPlatformApi>,
            Arc::clone(&repo) as Arc<dyn PackRepository>,
            MediaCodec::new(),
            VideoValidator::new("ffprobe", "ffmpeg"),
            Arc::clone(&assets),
            "\u{1F600}",
        ));
        let engine = ConversationEngine::new(
            source,
            Arc::clone(&sink) as Arc<dyn ReplySink>,
            publisher,
            Arc::clone(&repo) as Arc<dyn PackRepository>,
            MediaCodec::new(),
            assets,
            Arc::clone(&sessions),
            "stickerbot",
        );
        Self {
            engine,
            sink,
            api,
            repo,
            sessions,
            _temp: temp,
        }
    }

    async fn step(&self) -> Option<PackStep> {
        self.sessions.get_or_create(CHAT).await.lock().await.step()
    }

    async fn mode(&self) -> Option<Mode> {
        self.sessions.get_or_create(CHAT).await.lock().await.mode()
    }

    async fn current_pack(&self) -> Option<String> {
        self.sessions
            .get_or_create(CHAT)
            .await
            .lock()
            .await
            .current_pack_name()
            .map(str::to_string)
    }
}

// ---------------------------------------------------------------------------
// Journeys
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_media_before_mode_selection_is_rejected() {
    let h = Harness::new(vec![("a", png(64, 64))]);
    let out = h
        .engine
        .handle_event(CHAT, &user(1), InboundEvent::Media(vec![attachment("a")]))
        .await;
    assert_eq!(out.converted, 0);
    assert!(h.sink.documents().is_empty());
    assert_eq!(h.sink.texts().len(), 1);
}

#[tokio::test]
async fn test_icon_mode_converts_and_replies_with_document() {
    let h = Harness::new(vec![("a", png(640, 480))]);
    let u = user(1);
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:icon".to_string()))
        .await;
    assert_eq!(h.mode().await, Some(Mode::Icon));

    let out = h
        .engine
        .handle_event(CHAT, &u, InboundEvent::Media(vec![attachment("a")]))
        .await;
    assert_eq!(out.converted, 1);
    assert_eq!(out.failed, 0);
    let docs = h.sink.documents();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].starts_with("icon_1_"), "got {}", docs[0]);
}

#[tokio::test]
async fn test_batch_failure_does_not_abort_remaining_items() {
    let h = Harness::new(vec![
        ("ok1", png(300, 300)),
        ("broken", vec![0u8; 4096]),
        ("ok2", png(200, 400)),
    ]);
    let u = user(1);
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:sticker".to_string()))
        .await;

    let out = h
        .engine
        .handle_event(
            CHAT,
            &u,
            InboundEvent::Media(vec![
                attachment("ok1"),
                attachment("broken"),
                attachment("ok2"),
            ]),
        )
        .await;
    assert_eq!(out.converted, 2);
    assert_eq!(out.failed, 1);
    assert_eq!(out.skipped, 0);

    // Results arrive in submission order: document, failure text, document.
    let log = h.sink.log();
    let kinds: Vec<bool> = log
        .iter()
        .skip(1) // mode-selection confirmation
        .map(|s| matches!(s, Sent::Document(_)))
        .collect();
    assert_eq!(kinds, vec![true, false, true]);
}

#[tokio::test]
async fn test_thumbnails_are_skipped_in_multi_item_batches() {
    let h = Harness::new(vec![("big", png(300, 300)), ("thumb", png(32, 32))]);
    let u = user(1);
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:icon".to_string()))
        .await;

    let out = h
        .engine
        .handle_event(
            CHAT,
            &u,
            InboundEvent::Media(vec![attachment("big"), thumbnail("thumb")]),
        )
        .await;
    assert_eq!(out.converted, 1);
    assert_eq!(out.skipped, 1);
    assert_eq!(out.failed, 0);

    // A lone small attachment is not a thumbnail.
    let out = h
        .engine
        .handle_event(CHAT, &u, InboundEvent::Media(vec![thumbnail("thumb")]))
        .await;
    assert_eq!(out.converted, 1);
    assert_eq!(out.skipped, 0);
}

#[tokio::test]
async fn test_pack_creation_journey() {
    let h = Harness::new(vec![("s1", png(512, 512)), ("s2", png(400, 300))]);
    let u = user(7);

    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    assert_eq!(h.step().await, Some(PackStep::Menu));

    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:new".to_string()))
        .await;
    assert_eq!(h.step().await, Some(PackStep::AwaitingName));

    // Too-short title is re-prompted, state unchanged.
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Text("ab".to_string()))
        .await;
    assert_eq!(h.step().await, Some(PackStep::AwaitingName));

    h.engine
        .handle_event(CHAT, &u, InboundEvent::Text("My Cool Pack!!".to_string()))
        .await;
    assert_eq!(h.step().await, Some(PackStep::AwaitingFirstSticker));
    let name = h.current_pack().await.expect("slug stored");
    assert!(name.starts_with("mycoolpack_"), "got {name}");
    assert!(name.ends_with("_by_stickerbot"), "got {name}");

    let out = h
        .engine
        .handle_event(CHAT, &u, InboundEvent::Media(vec![attachment("s1")]))
        .await;
    assert_eq!(out.converted, 1);
    assert_eq!(h.step().await, Some(PackStep::AddingStickers));

    let out = h
        .engine
        .handle_event(CHAT, &u, InboundEvent::Media(vec![attachment("s2")]))
        .await;
    assert_eq!(out.converted, 1);

    // Both stickers recorded with platform-confirmed ids, in order.
    let pack = h
        .repo
        .get_pack_by_name(&name)
        .await
        .unwrap()
        .expect("pack stored");
    assert_eq!(pack.owner_id, Some(7));
    let stickers = h.repo.list_stickers(pack.id).await.unwrap();
    assert_eq!(stickers.len(), 2);
    assert_eq!(stickers[0].position, 0);
    assert_eq!(stickers[1].position, 1);
    assert_eq!(stickers[0].file_id, format!("file_{name}_0"));
    assert_eq!(stickers[1].file_id, format!("file_{name}_1"));

    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:done".to_string()))
        .await;
    assert_eq!(h.step().await, Some(PackStep::Menu));
    assert!(
        h.sink
            .texts()
            .iter()
            .any(|t| t.contains(&format!("https://t.me/addstickers/{name}"))),
        "finish reply carries the share link"
    );
}

#[tokio::test]
async fn test_occupied_name_returns_to_naming() {
    let h = Harness::new(vec![("s1", png(256, 256))]);
    let u = user(7);
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:new".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Text("Taken Name".to_string()))
        .await;

    *h.api.fail_next_create.lock().unwrap() = Some("PACK_SHORT_NAME_OCCUPIED");
    let out = h
        .engine
        .handle_event(CHAT, &u, InboundEvent::Media(vec![attachment("s1")]))
        .await;
    assert_eq!(out.failed, 1);
    assert_eq!(h.step().await, Some(PackStep::AwaitingName));
    assert!(h.repo.get_pack_by_name("anything").await.unwrap().is_none());
}

#[tokio::test]
async fn test_import_external_pack_read_only() {
    let h = Harness::new(vec![]);
    let u = user(1);
    h.api.seed_set("cats_7_by_otherbot", "Cats", Some(99), 3);

    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:import".to_string()))
        .await;
    h.engine
        .handle_event(
            CHAT,
            &u,
            InboundEvent::Text("https://t.me/addstickers/cats_7_by_otherbot".to_string()),
        )
        .await;

    // Not the platform owner: read-only membership, back at the menu.
    assert_eq!(h.step().await, Some(PackStep::Menu));
    let pack = h
        .repo
        .get_pack_by_name("cats_7_by_otherbot")
        .await
        .unwrap()
        .expect("imported");
    assert!(!h.repo.can_edit(1, pack.id).await.unwrap());
    assert_eq!(h.repo.list_stickers(pack.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_import_own_pack_promotes_to_editable() {
    let h = Harness::new(vec![]);
    let owner = user(99);
    h.api.seed_set("cats_7_by_otherbot", "Cats", Some(99), 2);

    h.engine
        .handle_event(CHAT, &owner, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &owner, InboundEvent::Callback("pack:import".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &owner, InboundEvent::Text("cats_7_by_otherbot".to_string()))
        .await;

    assert_eq!(h.step().await, Some(PackStep::AddingStickers));
    assert_eq!(h.current_pack().await.as_deref(), Some("cats_7_by_otherbot"));
    let pack = h
        .repo
        .get_pack_by_name("cats_7_by_otherbot")
        .await
        .unwrap()
        .unwrap();
    assert!(h.repo.can_edit(99, pack.id).await.unwrap());
}

#[tokio::test]
async fn test_import_by_forwarded_sticker() {
    let h = Harness::new(vec![]);
    let u = user(1);
    h.api.seed_set("dogs_3_by_otherbot", "Dogs", Some(50), 1);

    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:import".to_string()))
        .await;

    let mut forwarded = attachment("whatever");
    forwarded.sticker_set_name = Some("dogs_3_by_otherbot".to_string());
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Media(vec![forwarded]))
        .await;

    assert!(
        h.repo
            .get_pack_by_name("dogs_3_by_otherbot")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_invalid_pack_reference_is_reprompted() {
    let h = Harness::new(vec![]);
    let u = user(1);
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:import".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Text("not a pack!!".to_string()))
        .await;
    // Still waiting for a usable reference.
    assert_eq!(h.step().await, Some(PackStep::AwaitingImportRef));
}

#[tokio::test]
async fn test_cancel_returns_to_menu_and_reset_goes_idle() {
    let h = Harness::new(vec![]);
    let u = user(1);
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:new".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("cancel".to_string()))
        .await;
    assert_eq!(h.mode().await, Some(Mode::Packs));
    assert_eq!(h.step().await, Some(PackStep::Menu));

    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("reset".to_string()))
        .await;
    assert_eq!(h.mode().await, None);
    assert_eq!(h.step().await, None);
}

#[tokio::test]
async fn test_remove_last_membership_deletes_unowned_pack() {
    let h = Harness::new(vec![]);
    let u = user(1);
    h.api.seed_set("cats_7_by_otherbot", "Cats", None, 1);
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:import".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Text("cats_7_by_otherbot".to_string()))
        .await;

    h.engine
        .handle_event(
            CHAT,
            &u,
            InboundEvent::Callback("pack:remove:cats_7_by_otherbot".to_string()),
        )
        .await;
    assert!(
        h.repo
            .get_pack_by_name("cats_7_by_otherbot")
            .await
            .unwrap()
            .is_none(),
        "orphaned pack is deleted with its stickers"
    );
}

#[tokio::test]
async fn test_favorite_toggle_reorders_pack_list() {
    let h = Harness::new(vec![]);
    let u = user(1);
    h.api.seed_set("aa_1_by_otherbot", "AA", None, 1);
    h.api.seed_set("bb_2_by_otherbot", "BB", None, 1);
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("mode:packs".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:import".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Text("aa_1_by_otherbot".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Callback("pack:import".to_string()))
        .await;
    h.engine
        .handle_event(CHAT, &u, InboundEvent::Text("bb_2_by_otherbot".to_string()))
        .await;

    h.engine
        .handle_event(
            CHAT,
            &u,
            InboundEvent::Callback("pack:fav:aa_1_by_otherbot".to_string()),
        )
        .await;

    let packs = h.repo.list_packs_for_user(1).await.unwrap();
    assert_eq!(packs.len(), 2);
    assert_eq!(packs[0].0.name, "aa_1_by_otherbot");
    assert!(packs[0].1.is_favorite);
}
