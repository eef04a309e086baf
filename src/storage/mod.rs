//! Pack persistence.
//!
//! Users, packs, stickers, and memberships live in PostgreSQL. Compound
//! writes run inside single transactions; reads are plain point reads.
//! No component outside this module touches persistence directly.

mod models;
mod postgres;
mod repository;

pub use models::{
    PackStats, Sticker, StickerPack, StickerType, UserInfo, UserPackMembership,
};
pub use postgres::{PostgresPackRepository, connect, run_migrations};
pub use repository::PackRepository;
