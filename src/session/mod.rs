//! Per-chat conversation state and event dispatch.
//!
//! A chat's events are serialized behind its session lock; idle sessions
//! and their staged files are expired by a periodic sweep.

mod engine;
mod state;
mod store;
mod sweep;

pub use engine::{
    CallbackAction, ConversationEngine, EventOutcome, InboundEvent, MediaAttachment,
};
pub use state::{Mode, PackStep, Session};
pub use store::SessionStore;
pub use sweep::{SessionSweeper, SweepOutcome, SweeperConfig};
