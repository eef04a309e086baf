//! Concurrent session registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::platform::ChatId;
use crate::session::state::Session;

/// All live sessions, keyed by chat.
///
/// Each session sits behind its own async mutex; the engine holds that lock
/// for the duration of one inbound event, so a chat's events are handled
/// one at a time in arrival order while different chats proceed in parallel.
pub struct SessionStore {
    sessions: RwLock<HashMap<ChatId, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the session for a chat, creating an idle one if absent.
    pub async fn get_or_create(&self, chat_id: ChatId) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&chat_id) {
                return Arc::clone(session);
            }
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(chat_id)))),
        )
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove every session idle beyond `max_idle` and hand back the staged
    /// files each one still owned.
    pub async fn remove_idle(&self, max_idle: Duration) -> Vec<(ChatId, Vec<PathBuf>)> {
        let mut sessions = self.sessions.write().await;
        let mut expired: Vec<ChatId> = Vec::new();
        for (chat_id, session) in sessions.iter() {
            let session = session.lock().await;
            if session.idle_for() > max_idle {
                expired.push(*chat_id);
            }
        }

        let mut removed = Vec::with_capacity(expired.len());
        for chat_id in expired {
            if let Some(session) = sessions.remove(&chat_id) {
                let staged = session.lock().await.take_staged();
                debug!(chat_id, staged = staged.len(), "Removed idle session");
                removed.push((chat_id, staged));
            }
        }
        removed
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
