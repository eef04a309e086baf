//! Pack publishing.
//!
//! Slug generation/parsing and the orchestration that pushes payloads to
//! the external pack-management API and records confirmed stickers.

mod publisher;
mod slug;

pub use publisher::PackPublisher;
pub use slug::{extract_pack_ref, generate_slug, is_valid_slug, slug_from_title};
