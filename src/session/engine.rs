//! Conversation engine.
//!
//! Dispatches inbound events against each chat's session state: standalone
//! conversions are run through the codec and replied as documents, pack
//! flows go through the publisher. The per-chat session lock is held for
//! the whole event, so one chat's events are handled strictly in arrival
//! order while other chats proceed concurrently.

use std::sync::Arc;

use tracing::{error, warn};

use crate::assets::AssetStore;
use crate::error::{Error, PlatformError};
use crate::media::{ConversionProfile, MediaCodec};
use crate::platform::{
    ChatId, FileRef, FileSource, MAX_SOURCE_BYTES, PlatformErrorKind, ReplyAction, ReplySink,
};
use crate::publish::{PackPublisher, generate_slug};
use crate::session::state::{Mode, PackStep, Session};
use crate::session::store::SessionStore;
use crate::storage::{PackRepository, UserInfo};

/// Minimum pack title length after trimming.
const MIN_TITLE_CHARS: usize = 3;

/// Attachments below this fraction of the size ceiling are treated as
/// thumbnails when they arrive inside a multi-item batch.
const THUMBNAIL_DIVISOR: u64 = 10;

/// One media item within an inbound message.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub file: FileRef,
    /// Size as reported by the platform, before download.
    pub byte_size: u64,
    /// Emoji tag carried by sticker attachments.
    pub emoji: Option<String>,
    /// Pack slug embedded in a forwarded sticker, when present.
    pub sticker_set_name: Option<String>,
}

impl MediaAttachment {
    pub fn new(file: FileRef, byte_size: u64) -> Self {
        Self {
            file,
            byte_size,
            emoji: None,
            sticker_set_name: None,
        }
    }
}

/// Inbound event classes.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A labeled action was invoked; carries the action's raw data string.
    Callback(String),
    /// Photo/document/sticker message with one or more attachments.
    Media(Vec<MediaAttachment>),
    /// Free text.
    Text(String),
}

/// Parsed callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    SelectIcon,
    SelectSticker,
    SelectPacks,
    NewPack,
    ImportPack,
    FinishPack,
    ListPacks,
    RemovePack(String),
    ToggleFavorite(String),
    Cancel,
    StartOver,
}

impl CallbackAction {
    /// Parse the opaque data string attached to a reply action.
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "mode:icon" => Some(Self::SelectIcon),
            "mode:sticker" => Some(Self::SelectSticker),
            "mode:packs" => Some(Self::SelectPacks),
            "pack:new" => Some(Self::NewPack),
            "pack:import" => Some(Self::ImportPack),
            "pack:done" => Some(Self::FinishPack),
            "pack:list" => Some(Self::ListPacks),
            "cancel" => Some(Self::Cancel),
            "reset" => Some(Self::StartOver),
            other => {
                if let Some(slug) = other.strip_prefix("pack:remove:") {
                    Some(Self::RemovePack(slug.to_string()))
                } else if let Some(slug) = other.strip_prefix("pack:fav:") {
                    Some(Self::ToggleFavorite(slug.to_string()))
                } else {
                    None
                }
            }
        }
    }

    /// The data string that round-trips through [`parse`](Self::parse).
    pub fn data(&self) -> String {
        match self {
            Self::SelectIcon => "mode:icon".to_string(),
            Self::SelectSticker => "mode:sticker".to_string(),
            Self::SelectPacks => "mode:packs".to_string(),
            Self::NewPack => "pack:new".to_string(),
            Self::ImportPack => "pack:import".to_string(),
            Self::FinishPack => "pack:done".to_string(),
            Self::ListPacks => "pack:list".to_string(),
            Self::RemovePack(slug) => format!("pack:remove:{slug}"),
            Self::ToggleFavorite(slug) => format!("pack:fav:{slug}"),
            Self::Cancel => "cancel".to_string(),
            Self::StartOver => "reset".to_string(),
        }
    }
}

/// Per-event processing tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Items converted or published successfully.
    pub converted: usize,
    /// Items that failed terminally.
    pub failed: usize,
    /// Thumbnail-sized items silently skipped in a batch.
    pub skipped: usize,
    /// Replies delivered to the chat.
    pub replies: usize,
}

/// The conversation engine. One instance serves all chats.
pub struct ConversationEngine {
    source: Arc<dyn FileSource>,
    sink: Arc<dyn ReplySink>,
    publisher: Arc<PackPublisher>,
    repo: Arc<dyn PackRepository>,
    codec: MediaCodec,
    assets: Arc<AssetStore>,
    sessions: Arc<SessionStore>,
    bot_handle: String,
    icon_profile: ConversionProfile,
    sticker_profile: ConversionProfile,
}

impl ConversationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn FileSource>,
        sink: Arc<dyn ReplySink>,
        publisher: Arc<PackPublisher>,
        repo: Arc<dyn PackRepository>,
        codec: MediaCodec,
        assets: Arc<AssetStore>,
        sessions: Arc<SessionStore>,
        bot_handle: impl Into<String>,
    ) -> Self {
        Self {
            source,
            sink,
            publisher,
            repo,
            codec,
            assets,
            sessions,
            bot_handle: bot_handle.into(),
            icon_profile: ConversionProfile::icon(),
            sticker_profile: ConversionProfile::sticker(),
        }
    }

    /// Handle one inbound event for a chat.
    ///
    /// This is the catch-all boundary: no error escapes. Anything unhandled
    /// is logged and turned into a generic failure reply, and the engine
    /// keeps serving other chats.
    pub async fn handle_event(
        &self,
        chat_id: ChatId,
        user: &UserInfo,
        event: InboundEvent,
    ) -> EventOutcome {
        if let Err(err) = self.repo.upsert_user(user).await {
            warn!(chat_id, user_id = user.id, error = %err, "User upsert failed");
        }

        let session = self.sessions.get_or_create(chat_id).await;
        let mut session = session.lock().await;
        session.touch();

        let mut outcome = EventOutcome::default();
        let result = match event {
            InboundEvent::Callback(data) => {
                self.on_callback(&mut session, user, &data, &mut outcome).await
            }
            InboundEvent::Text(text) => {
                self.on_text(&mut session, user, &text, &mut outcome).await
            }
            InboundEvent::Media(attachments) => {
                self.on_media(&mut session, user, attachments, &mut outcome)
                    .await
            }
        };

        if let Err(err) = result {
            error!(chat_id, error = %err, "Event handling failed");
            self.say(chat_id, "Something went wrong. Please try again.", &[], &mut outcome)
                .await;
        }
        outcome
    }

    async fn on_callback(
        &self,
        session: &mut Session,
        user: &UserInfo,
        data: &str,
        outcome: &mut EventOutcome,
    ) -> Result<(), Error> {
        let chat = session.chat_id;
        let Some(action) = CallbackAction::parse(data) else {
            warn!(chat, data, "Unrecognized callback data");
            self.say(chat, "That action is no longer available.", &[], outcome)
                .await;
            return Ok(());
        };

        match action {
            CallbackAction::SelectIcon => {
                session.select_conversion(Mode::Icon);
                self.say(chat, "Icon mode: send me an image and I'll return a 100x100 icon.", &[], outcome)
                    .await;
            }
            CallbackAction::SelectSticker => {
                session.select_conversion(Mode::Sticker);
                self.say(chat, "Sticker mode: send me an image and I'll return a sticker-ready file.", &[], outcome)
                    .await;
            }
            CallbackAction::SelectPacks => {
                session.enter_packs();
                self.say(chat, "Pack management. What would you like to do?", &pack_menu_actions(), outcome)
                    .await;
            }
            CallbackAction::NewPack => {
                session.begin_naming();
                self.say(
                    chat,
                    "Send a title for your new pack (at least 3 characters).",
                    &[ReplyAction::new("Cancel", CallbackAction::Cancel.data())],
                    outcome,
                )
                .await;
            }
            CallbackAction::ImportPack => {
                session.begin_import();
                self.say(
                    chat,
                    "Send a pack link or name, or forward me a sticker from the pack.",
                    &[ReplyAction::new("Cancel", CallbackAction::Cancel.data())],
                    outcome,
                )
                .await;
            }
            CallbackAction::FinishPack => {
                if session.step() == Some(PackStep::AddingStickers) {
                    let link = session
                        .current_pack_name()
                        .map(share_link)
                        .unwrap_or_default();
                    session.finish_adding();
                    self.say(
                        chat,
                        &format!("Done! Your pack is at {link}"),
                        &pack_menu_actions(),
                        outcome,
                    )
                    .await;
                } else {
                    self.say(chat, "Nothing to finish right now.", &[], outcome).await;
                }
            }
            CallbackAction::ListPacks => {
                self.list_packs(chat, user, outcome).await?;
            }
            CallbackAction::RemovePack(slug) => {
                self.remove_pack(chat, user, &slug, outcome).await?;
            }
            CallbackAction::ToggleFavorite(slug) => {
                self.toggle_favorite(chat, user, &slug, outcome).await?;
            }
            CallbackAction::Cancel => {
                session.cancel();
                if session.mode() == Some(Mode::Packs) {
                    self.say(chat, "Cancelled.", &pack_menu_actions(), outcome).await;
                } else {
                    self.say(chat, "Cancelled.", &[], outcome).await;
                }
            }
            CallbackAction::StartOver => {
                session.reset();
                self.say(chat, "Let's start over. Pick a mode:", &mode_actions(), outcome)
                    .await;
            }
        }
        Ok(())
    }

    async fn on_text(
        &self,
        session: &mut Session,
        user: &UserInfo,
        text: &str,
        outcome: &mut EventOutcome,
    ) -> Result<(), Error> {
        let chat = session.chat_id;
        match (session.mode(), session.step()) {
            (Some(Mode::Packs), Some(PackStep::AwaitingName)) => {
                let title = text.trim();
                if title.chars().count() < MIN_TITLE_CHARS {
                    self.say(
                        chat,
                        &format!("That title is too short; it needs at least {MIN_TITLE_CHARS} characters."),
                        &[],
                        outcome,
                    )
                    .await;
                    return Ok(());
                }
                let name = generate_slug(title, &self.bot_handle);
                session.accept_title(name, title);
                self.say(
                    chat,
                    &format!("Got it. Now send the first sticker for \"{title}\"."),
                    &[ReplyAction::new("Cancel", CallbackAction::Cancel.data())],
                    outcome,
                )
                .await;
            }
            (Some(Mode::Packs), Some(PackStep::AwaitingImportRef)) => {
                self.import(session, user, text, outcome).await?;
            }
            (Some(Mode::Icon | Mode::Sticker), _) => {
                self.say(chat, "Send me an image to convert, not text.", &[], outcome)
                    .await;
            }
            (Some(Mode::Packs), _) => {
                self.say(chat, "Pick an action first:", &pack_menu_actions(), outcome)
                    .await;
            }
            (None, _) => {
                self.say(chat, "Hi! Pick what you'd like to do:", &mode_actions(), outcome)
                    .await;
            }
        }
        Ok(())
    }

    async fn on_media(
        &self,
        session: &mut Session,
        user: &UserInfo,
        attachments: Vec<MediaAttachment>,
        outcome: &mut EventOutcome,
    ) -> Result<(), Error> {
        let chat = session.chat_id;
        if attachments.is_empty() {
            self.say(chat, "I didn't find any media in that message.", &[], outcome)
                .await;
            return Ok(());
        }

        match (session.mode(), session.step()) {
            (Some(Mode::Icon), _) => {
                self.convert_batch(session, user, attachments, &self.icon_profile, outcome)
                    .await;
            }
            (Some(Mode::Sticker), _) => {
                self.convert_batch(session, user, attachments, &self.sticker_profile, outcome)
                    .await;
            }
            (Some(Mode::Packs), Some(PackStep::AwaitingFirstSticker)) => {
                self.create_with_first(session, user, attachments, outcome)
                    .await?;
            }
            (Some(Mode::Packs), Some(PackStep::AddingStickers)) => {
                self.append_batch(session, user, attachments, outcome).await;
            }
            (Some(Mode::Packs), Some(PackStep::AwaitingImportRef)) => {
                // A forwarded sticker carries its pack's slug.
                match attachments.iter().find_map(|a| a.sticker_set_name.clone()) {
                    Some(slug) => self.import(session, user, &slug, outcome).await?,
                    None => {
                        self.say(
                            chat,
                            "That sticker doesn't belong to a pack. Send a pack link or name instead.",
                            &[],
                            outcome,
                        )
                        .await;
                    }
                }
            }
            (Some(Mode::Packs), _) => {
                self.say(chat, "Pick an action first:", &pack_menu_actions(), outcome)
                    .await;
            }
            (None, _) => {
                self.say(chat, "Pick a mode before sending media:", &mode_actions(), outcome)
                    .await;
            }
        }
        Ok(())
    }

    /// Standalone conversion of a batch: strictly in arrival order, each
    /// item independent, thumbnails skipped when the batch has siblings.
    async fn convert_batch(
        &self,
        session: &mut Session,
        user: &UserInfo,
        attachments: Vec<MediaAttachment>,
        profile: &ConversionProfile,
        outcome: &mut EventOutcome,
    ) {
        let chat = session.chat_id;
        let batch = attachments.len();
        for attachment in attachments {
            if batch > 1 && attachment.byte_size < MAX_SOURCE_BYTES / THUMBNAIL_DIVISOR {
                outcome.skipped += 1;
                continue;
            }
            match self.convert_one(session, user, &attachment, profile).await {
                Ok(()) => outcome.converted += 1,
                Err(err) => {
                    outcome.failed += 1;
                    warn!(chat, error = %err, "Conversion failed");
                    self.say(chat, &format!("Could not convert that one: {}", user_facing(&err)), &[], outcome)
                        .await;
                }
            }
        }
    }

    async fn convert_one(
        &self,
        session: &mut Session,
        user: &UserInfo,
        attachment: &MediaAttachment,
        profile: &ConversionProfile,
    ) -> Result<(), Error> {
        let chat = session.chat_id;
        let data = self.source.download(&attachment.file).await?;
        let asset = self
            .codec
            .convert_to_file(&data, profile, &self.assets, user.id)
            .await?;
        session.track_staged(asset.path());

        let sent = self
            .sink
            .send_document(chat, asset.path(), &asset.file_name())
            .await;
        let path = asset.path().to_path_buf();
        asset.remove().await;
        session.untrack_staged(&path);
        sent.map_err(Error::from)
    }

    /// First sticker of a new pack: creates the set, then appends any
    /// remaining attachments in order.
    async fn create_with_first(
        &self,
        session: &mut Session,
        user: &UserInfo,
        attachments: Vec<MediaAttachment>,
        outcome: &mut EventOutcome,
    ) -> Result<(), Error> {
        let chat = session.chat_id;
        let (Some(name), Some(title)) = (
            session.current_pack_name().map(str::to_string),
            session.current_pack_title().map(str::to_string),
        ) else {
            warn!(chat, "First-sticker state without a stored pack name");
            session.enter_packs();
            self.say(chat, "Pick an action first:", &pack_menu_actions(), outcome)
                .await;
            return Ok(());
        };

        let mut iter = attachments.into_iter();
        let first = match iter.next() {
            Some(first) => first,
            None => return Ok(()),
        };

        let data = match self.source.download(&first.file).await {
            Ok(data) => data,
            Err(err) => {
                outcome.failed += 1;
                self.say(chat, &format!("Download failed: {err}"), &[], outcome).await;
                return Ok(());
            }
        };

        match self
            .publisher
            .create_pack(user.id, &name, &title, data, first.emoji.as_deref())
            .await
        {
            Ok(pack) => {
                outcome.converted += 1;
                session.begin_adding(pack.name.clone());
                self.say(
                    chat,
                    &format!(
                        "Created \"{title}\"! {} Send more stickers to add them, or finish.",
                        share_link(&pack.name)
                    ),
                    &adding_actions(),
                    outcome,
                )
                .await;
                let rest: Vec<MediaAttachment> = iter.collect();
                if !rest.is_empty() {
                    self.append_batch(session, user, rest, outcome).await;
                }
            }
            Err(Error::Platform(err)) if err.is_name_occupied() => {
                outcome.failed += 1;
                session.begin_naming();
                self.say(chat, "That name is already taken. Send a different title.", &[], outcome)
                    .await;
            }
            Err(err @ (Error::Media(_) | Error::Platform(_))) => {
                outcome.failed += 1;
                self.say(chat, &format!("Couldn't use that file: {}", user_facing(&err)), &[], outcome)
                    .await;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Append a batch to the current pack: in order, independent failures.
    async fn append_batch(
        &self,
        session: &mut Session,
        user: &UserInfo,
        attachments: Vec<MediaAttachment>,
        outcome: &mut EventOutcome,
    ) {
        let chat = session.chat_id;
        let Some(name) = session.current_pack_name().map(str::to_string) else {
            warn!(chat, "Append state without a stored pack name");
            return;
        };

        let batch = attachments.len();
        for attachment in attachments {
            if batch > 1 && attachment.byte_size < MAX_SOURCE_BYTES / THUMBNAIL_DIVISOR {
                outcome.skipped += 1;
                continue;
            }
            let data = match self.source.download(&attachment.file).await {
                Ok(data) => data,
                Err(err) => {
                    outcome.failed += 1;
                    self.say(chat, &format!("Download failed: {err}"), &[], outcome).await;
                    continue;
                }
            };
            match self
                .publisher
                .add_sticker(user.id, &name, data, attachment.emoji.as_deref())
                .await
            {
                Ok(sticker) => {
                    outcome.converted += 1;
                    self.say(chat, &format!("Added sticker #{}.", sticker.position + 1), &[], outcome)
                        .await;
                }
                Err(err) => {
                    outcome.failed += 1;
                    warn!(chat, pack = %name, error = %err, "Sticker append failed");
                    self.say(chat, &format!("Couldn't add that one: {}", user_facing(&err)), &[], outcome)
                        .await;
                }
            }
        }
    }

    async fn import(
        &self,
        session: &mut Session,
        user: &UserInfo,
        reference: &str,
        outcome: &mut EventOutcome,
    ) -> Result<(), Error> {
        let chat = session.chat_id;
        match self.publisher.import_pack(user.id, reference).await {
            Ok((pack, true)) => {
                session.begin_adding(pack.name.clone());
                self.say(
                    chat,
                    &format!(
                        "Imported \"{}\" and you own it. Send stickers to add them, or finish.",
                        pack.title
                    ),
                    &adding_actions(),
                    outcome,
                )
                .await;
            }
            Ok((pack, false)) => {
                session.enter_packs();
                self.say(
                    chat,
                    &format!("Imported \"{}\" to your list (read-only).", pack.title),
                    &pack_menu_actions(),
                    outcome,
                )
                .await;
            }
            Err(Error::Session(err)) => {
                self.say(chat, &err.to_string(), &[], outcome).await;
            }
            Err(Error::Platform(PlatformError::Api { kind, message, .. })) => {
                let text = match kind {
                    PlatformErrorKind::Other => message,
                    kind => kind.to_string(),
                };
                self.say(chat, &format!("Import failed: {text}"), &[], outcome).await;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    async fn list_packs(
        &self,
        chat: ChatId,
        user: &UserInfo,
        outcome: &mut EventOutcome,
    ) -> Result<(), Error> {
        let packs = self.repo.list_packs_for_user(user.id).await?;
        if packs.is_empty() {
            self.say(chat, "You don't have any packs yet.", &pack_menu_actions(), outcome)
                .await;
            return Ok(());
        }
        let mut lines = Vec::with_capacity(packs.len());
        for (pack, membership) in &packs {
            let stats = self.repo.pack_stats(pack.id).await?;
            let marker = if membership.is_favorite { "* " } else { "" };
            lines.push(format!(
                "{marker}{} ({} stickers) - {}",
                pack.title,
                stats.sticker_count,
                share_link(&pack.name)
            ));
        }
        self.say(chat, &lines.join("\n"), &pack_menu_actions(), outcome).await;
        Ok(())
    }

    async fn remove_pack(
        &self,
        chat: ChatId,
        user: &UserInfo,
        slug: &str,
        outcome: &mut EventOutcome,
    ) -> Result<(), Error> {
        let Some(pack) = self.repo.get_pack_by_name(slug).await? else {
            self.say(chat, "That pack is no longer in your list.", &[], outcome).await;
            return Ok(());
        };
        let deleted = self.repo.remove_membership(user.id, pack.id).await?;
        let text = if deleted {
            format!("Removed \"{}\" and deleted it (no one else had it).", pack.title)
        } else {
            format!("Removed \"{}\" from your list.", pack.title)
        };
        self.say(chat, &text, &pack_menu_actions(), outcome).await;
        Ok(())
    }

    async fn toggle_favorite(
        &self,
        chat: ChatId,
        user: &UserInfo,
        slug: &str,
        outcome: &mut EventOutcome,
    ) -> Result<(), Error> {
        let packs = self.repo.list_packs_for_user(user.id).await?;
        let Some((pack, membership)) = packs.into_iter().find(|(pack, _)| pack.name == slug)
        else {
            self.say(chat, "That pack is not in your list.", &[], outcome).await;
            return Ok(());
        };
        let favorite = !membership.is_favorite;
        self.repo.set_favorite(user.id, pack.id, favorite).await?;
        let text = if favorite {
            format!("\"{}\" marked as a favorite.", pack.title)
        } else {
            format!("\"{}\" is no longer a favorite.", pack.title)
        };
        self.say(chat, &text, &pack_menu_actions(), outcome).await;
        Ok(())
    }

    async fn say(
        &self,
        chat: ChatId,
        text: &str,
        actions: &[ReplyAction],
        outcome: &mut EventOutcome,
    ) {
        match self.sink.send_text(chat, text, actions).await {
            Ok(()) => outcome.replies += 1,
            Err(err) => warn!(chat, error = %err, "Failed to send reply"),
        }
    }
}

fn share_link(name: &str) -> String {
    format!("https://t.me/addstickers/{name}")
}

fn mode_actions() -> Vec<ReplyAction> {
    vec![
        ReplyAction::new("Icon", CallbackAction::SelectIcon.data()),
        ReplyAction::new("Sticker", CallbackAction::SelectSticker.data()),
        ReplyAction::new("Packs", CallbackAction::SelectPacks.data()),
    ]
}

fn pack_menu_actions() -> Vec<ReplyAction> {
    vec![
        ReplyAction::new("New pack", CallbackAction::NewPack.data()),
        ReplyAction::new("Import pack", CallbackAction::ImportPack.data()),
        ReplyAction::new("My packs", CallbackAction::ListPacks.data()),
        ReplyAction::new("Start over", CallbackAction::StartOver.data()),
    ]
}

fn adding_actions() -> Vec<ReplyAction> {
    vec![
        ReplyAction::new("Finish", CallbackAction::FinishPack.data()),
        ReplyAction::new("Cancel", CallbackAction::Cancel.data()),
    ]
}

/// Reduce an internal error to text fit for the chat.
fn user_facing(err: &Error) -> String {
    match err {
        Error::Platform(PlatformError::Api { kind, message, .. }) => match kind {
            PlatformErrorKind::Other => message.clone(),
            kind => kind.to_string(),
        },
        Error::Platform(err) => err.to_string(),
        Error::Media(err) => err.to_string(),
        Error::Session(err) => err.to_string(),
        _ => "internal error".to_string(),
    }
}
