//! packsmith — core engine for a sticker-bot service.
//!
//! Accepts images and stickers from a messaging platform, converts them to
//! platform-compliant sticker/icon assets, and persists per-user collections
//! ("packs") in PostgreSQL.
//!
//! The crate is built around five components:
//! - [`media`]: resize/pad/re-encode pipeline with named profiles, plus
//!   validity checks for animated and video sticker variants.
//! - [`assets`]: staged temporary files with scoped release and age sweep.
//! - [`session`]: per-chat conversation state machine and idle sweeper.
//! - [`storage`]: pack/sticker/user persistence with transactional writes.
//! - [`publish`]: orchestration against the external pack-management API.
//!
//! The messaging framework itself is an external collaborator: the core
//! consumes the [`platform::FileSource`], [`platform::ReplySink`], and
//! [`platform::PackPlatformApi`] seams and knows nothing about how they are
//! implemented.

pub mod assets;
pub mod config;
pub mod error;
pub mod media;
pub mod platform;
pub mod publish;
pub mod session;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
