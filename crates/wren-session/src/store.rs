use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use crate::session::{session_id, AgentSession};

#[derive(Debug, Error)]
/// Enumerates supported `SessionStoreError` values.
pub enum SessionStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("session store lock poisoned")]
    Poisoned,
}

/// Trait contract for `SessionStore` behavior.
///
/// Store access is treated as fast and synchronous by the agent loop; a
/// turn performs exactly one `get_or_create` and one `save`.
pub trait SessionStore: Send + Sync {
    fn get_or_create(
        &self,
        channel_type: &str,
        chat_id: &str,
    ) -> Result<AgentSession, SessionStoreError>;

    fn save(&self, session: &AgentSession) -> Result<(), SessionStoreError>;
}

/// Session store backed by a process-local map. Used in tests and for
/// channels that do not need durability.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<BTreeMap<String, AgentSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(
        &self,
        channel_type: &str,
        chat_id: &str,
    ) -> Result<AgentSession, SessionStoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::Poisoned)?;
        let session = sessions
            .entry(session_id(channel_type, chat_id))
            .or_insert_with(|| AgentSession::new(channel_type, chat_id));
        Ok(session.clone())
    }

    fn save(&self, session: &AgentSession) -> Result<(), SessionStoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::Poisoned)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }
}

/// Session store writing one JSON document per session under a directory.
///
/// Writes go through a temp file followed by a rename so a crashed save
/// never leaves a torn document behind.
pub struct JsonSessionStore {
    dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn session_path(&self, channel_type: &str, chat_id: &str) -> PathBuf {
        let file_name = sanitize_file_name(&session_id(channel_type, chat_id));
        self.dir.join(format!("{file_name}.json"))
    }

    fn load(&self, path: &Path) -> Result<Option<AgentSession>, SessionStoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let session = serde_json::from_str(&raw)?;
        Ok(Some(session))
    }
}

impl SessionStore for JsonSessionStore {
    fn get_or_create(
        &self,
        channel_type: &str,
        chat_id: &str,
    ) -> Result<AgentSession, SessionStoreError> {
        let path = self.session_path(channel_type, chat_id);
        if let Some(session) = self.load(&path)? {
            debug!(
                session_id = %session.id,
                messages = session.messages.len(),
                "loaded session"
            );
            return Ok(session);
        }
        Ok(AgentSession::new(channel_type, chat_id))
    }

    fn save(&self, session: &AgentSession) -> Result<(), SessionStoreError> {
        let path = self.session_path(&session.channel_type, &session.chat_id);
        let rendered = serde_json::to_string_pretty(session)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, rendered)?;
        fs::rename(&temp_path, &path)?;
        debug!(session_id = %session.id, path = %path.display(), "saved session");
        Ok(())
    }
}

fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
