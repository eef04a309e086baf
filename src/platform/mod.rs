//! External platform collaborator seams.
//!
//! The core never talks to a bot framework directly. It consumes three
//! implementation-agnostic interfaces:
//! - [`FileSource`]: resolve and download file content by opaque reference.
//! - [`ReplySink`]: send documents and text (with labeled actions) back to a
//!   chat.
//! - [`PackPlatformApi`]: the external pack-management API (create set,
//!   add-to-set, query set).

mod api;
mod sink;
mod source;

pub use api::{
    PackItem, PackPlatformApi, PlatformErrorKind, RemoteSticker, RemoteStickerSet, api_error,
    classify_platform_error,
};
pub use sink::{ReplyAction, ReplySink};
pub use source::{FileMeta, FileRef, FileSource, HttpFileSource, MAX_SOURCE_BYTES};

/// Chat identifier assigned by the messaging platform.
pub type ChatId = i64;
