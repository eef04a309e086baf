//! Per-chat conversation state.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::platform::ChatId;

/// Top-level interaction mode selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Standalone conversion to a 100x100 icon.
    Icon,
    /// Standalone conversion to a padded sticker still.
    Sticker,
    /// Pack management.
    Packs,
}

/// Sub-state within pack management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackStep {
    Menu,
    AwaitingName,
    AwaitingFirstSticker,
    AddingStickers,
    AwaitingImportRef,
}

/// Conversation state for one chat.
///
/// Owned exclusively by the engine behind a per-chat lock; all mutation goes
/// through the transition methods below so the invariants hold: `step` is
/// populated only when `mode == Packs`, and `current_pack_name` is populated
/// whenever `step` is `AwaitingFirstSticker` or `AddingStickers`.
#[derive(Debug)]
pub struct Session {
    pub chat_id: ChatId,
    mode: Option<Mode>,
    step: Option<PackStep>,
    current_pack_name: Option<String>,
    current_pack_title: Option<String>,
    staged_paths: Vec<PathBuf>,
    last_activity: Instant,
}

impl Session {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            mode: None,
            step: None,
            current_pack_name: None,
            current_pack_title: None,
            staged_paths: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn step(&self) -> Option<PackStep> {
        self.step
    }

    pub fn current_pack_name(&self) -> Option<&str> {
        self.current_pack_name.as_deref()
    }

    pub fn current_pack_title(&self) -> Option<&str> {
        self.current_pack_title.as_deref()
    }

    /// Refresh the activity timestamp. Called on every access.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    #[cfg(test)]
    pub(crate) fn backdate(&mut self, by: Duration) {
        self.last_activity = Instant::now() - by;
    }

    /// Enter a standalone conversion mode, discarding any pack flow.
    pub fn select_conversion(&mut self, mode: Mode) {
        debug_assert!(mode != Mode::Packs);
        self.mode = Some(mode);
        self.clear_pack_flow();
    }

    /// Enter pack management at the menu.
    pub fn enter_packs(&mut self) {
        self.mode = Some(Mode::Packs);
        self.step = Some(PackStep::Menu);
        self.current_pack_name = None;
        self.current_pack_title = None;
    }

    pub fn begin_naming(&mut self) {
        self.mode = Some(Mode::Packs);
        self.step = Some(PackStep::AwaitingName);
    }

    pub fn begin_import(&mut self) {
        self.mode = Some(Mode::Packs);
        self.step = Some(PackStep::AwaitingImportRef);
    }

    /// Accept a title: store the pre-generated slug and wait for the first
    /// sticker.
    pub fn accept_title(&mut self, name: impl Into<String>, title: impl Into<String>) {
        self.current_pack_name = Some(name.into());
        self.current_pack_title = Some(title.into());
        self.step = Some(PackStep::AwaitingFirstSticker);
    }

    /// Enter the append loop for the named pack.
    pub fn begin_adding(&mut self, name: impl Into<String>) {
        self.mode = Some(Mode::Packs);
        self.current_pack_name = Some(name.into());
        self.step = Some(PackStep::AddingStickers);
    }

    /// Explicit "finish" from the append loop.
    pub fn finish_adding(&mut self) {
        self.step = Some(PackStep::Menu);
        self.current_pack_name = None;
        self.current_pack_title = None;
    }

    /// Cancel the current pack sub-flow. Mode is preserved: back to the pack
    /// menu when in pack management, otherwise to idle.
    pub fn cancel(&mut self) {
        if self.mode == Some(Mode::Packs) {
            self.enter_packs();
        } else {
            self.clear_pack_flow();
        }
    }

    /// Full reset to idle.
    pub fn reset(&mut self) {
        self.mode = None;
        self.clear_pack_flow();
    }

    fn clear_pack_flow(&mut self) {
        self.step = None;
        self.current_pack_name = None;
        self.current_pack_title = None;
    }

    /// Record a staged file this session is responsible for.
    pub fn track_staged(&mut self, path: impl Into<PathBuf>) {
        self.staged_paths.push(path.into());
    }

    /// Forget a staged file that was already deleted.
    pub fn untrack_staged(&mut self, path: &Path) {
        self.staged_paths.retain(|p| p != path);
    }

    /// Hand off all tracked files, e.g. to the expiry sweep.
    pub fn take_staged(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.staged_paths)
    }

    pub fn staged_paths(&self) -> &[PathBuf] {
        &self.staged_paths
    }
}
