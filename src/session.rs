//! Chat sessions and the current-session pointer, persisted under `chat_sessions`
//! and `current_session_id`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    config::StoreConfig,
    graph::GraphSnapshot,
    storage::{self, KeyValueStore},
};

pub const SESSIONS_KEY: &str = "chat_sessions";
pub const CURRENT_SESSION_KEY: &str = "current_session_id";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session name is empty")]
    EmptyName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Last saved graph, overlay already folded in.
    #[serde(default)]
    pub workflow_config: Option<GraphSnapshot>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        // stored with millisecond precision, keep the in-memory value identical
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            workflow_config: None,
        }
    }

    /// `updated_at` strictly increases, even for edits within one millisecond.
    fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at + TimeDelta::milliseconds(1));
    }
}

fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[derive(Debug)]
struct SessionState {
    /// Newest first, never empty.
    sessions: Vec<Session>,
    current_id: String,
}

impl SessionState {
    fn position(&self, id: &str) -> Option<usize> {
        self.sessions.iter().position(|session| session.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }
}

/// Session records with a current-session pointer, persisted to a key-value store.
///
/// Every mutation is written out before it returns. The state lock is held across
/// the write, so writes land in the order the mutations were made.
#[derive(Debug)]
pub struct SessionStore<S> {
    storage: S,
    config: StoreConfig,
    state: Mutex<SessionState>,
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Load sessions from `storage`. Missing or unreadable data yields one fresh session.
    pub async fn open(storage: S, config: StoreConfig) -> Self {
        let loaded = storage::load_json::<_, Vec<Session>>(&storage, SESSIONS_KEY).await;
        let loaded = match loaded {
            Ok(sessions) => sessions.unwrap_or_default(),
            Err(e) => {
                tracing::error!("| session store | failed to load sessions: {e}");
                Vec::new()
            }
        };
        let saved_current =
            storage::load_json::<_, String>(&storage, CURRENT_SESSION_KEY).await;
        let saved_current = match saved_current {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("| session store | failed to load current session id: {e}");
                None
            }
        };

        let mut dirty = false;
        let sessions = if loaded.is_empty() {
            dirty = true;
            vec![Session::new(&config.default_session_name)]
        } else {
            loaded
        };
        let current_id = match saved_current {
            Some(id) if sessions.iter().any(|session| session.id == id) => id,
            _ => {
                dirty = true;
                sessions[0].id.clone()
            }
        };

        tracing::info!(
            "| session store | loaded {} sessions, current: {current_id}",
            sessions.len()
        );
        let store = Self {
            storage,
            config,
            state: Mutex::new(SessionState {
                sessions,
                current_id,
            }),
        };
        if dirty {
            let state = store.state.lock().await;
            store.persist(&state).await;
            drop(state);
        }
        store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.state.lock().await.sessions.clone()
    }

    pub async fn session(&self, id: &str) -> Option<Session> {
        let state = self.state.lock().await;
        state.sessions.iter().find(|session| session.id == id).cloned()
    }

    pub async fn current_id(&self) -> String {
        self.state.lock().await.current_id.clone()
    }

    pub async fn current(&self) -> Option<Session> {
        let state = self.state.lock().await;
        state
            .sessions
            .iter()
            .find(|session| session.id == state.current_id)
            .cloned()
    }

    /// Create a session at the front of the list and make it current.
    /// Without a name (or with a blank one) the configured default name is used.
    pub async fn create(&self, name: Option<&str>) -> Session {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.config.default_session_name.as_str());
        let session = Session::new(name);

        let mut state = self.state.lock().await;
        state.sessions.insert(0, session.clone());
        state.current_id.clone_from(&session.id);
        self.persist(&state).await;

        tracing::info!("| session store | created session {}", session.id);
        session
    }

    /// Remove a session. The store is refilled with a fresh session if this was the last one.
    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        let index = state
            .position(id)
            .ok_or_else(|| SessionError::NotFound(id.to_owned()))?;
        state.sessions.remove(index);

        if state.sessions.is_empty() {
            state
                .sessions
                .push(Session::new(&self.config.default_session_name));
        }
        if state.current_id == id {
            state.current_id = state.sessions[0].id.clone();
        }
        self.persist(&state).await;

        tracing::info!("| session store | deleted session {id}");
        Ok(())
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<(), SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        let mut state = self.state.lock().await;
        let session = state
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_owned()))?;
        session.name = name.to_owned();
        session.touch();
        self.persist(&state).await;
        Ok(())
    }

    pub async fn switch(&self, id: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if state.position(id).is_none() {
            return Err(SessionError::NotFound(id.to_owned()));
        }
        state.current_id = id.to_owned();
        self.persist(&state).await;
        Ok(())
    }

    pub async fn add_message(&self, message: Message) {
        self.update_current(|session| session.messages.push(message))
            .await;
    }

    pub async fn set_messages(&self, messages: Vec<Message>) {
        self.update_current(|session| session.messages = messages)
            .await;
    }

    /// Store the graph snapshot of session `id`. Returns `false` for an unknown id.
    pub async fn update_workflow_config(&self, id: &str, snapshot: Option<GraphSnapshot>) -> bool {
        let mut state = self.state.lock().await;
        let Some(session) = state.get_mut(id) else {
            tracing::debug!("| session store | dropped snapshot for unknown session {id}");
            return false;
        };
        session.workflow_config = snapshot;
        session.touch();
        self.persist(&state).await;
        true
    }

    async fn update_current(&self, update: impl FnOnce(&mut Session)) {
        let mut state = self.state.lock().await;
        let current_id = state.current_id.clone();
        let Some(session) = state.get_mut(&current_id) else {
            return;
        };
        update(session);
        session.touch();
        self.persist(&state).await;
    }

    async fn persist(&self, state: &SessionState) {
        if let Err(e) = storage::save_json(&self.storage, SESSIONS_KEY, &state.sessions).await {
            tracing::error!("| session store | failed to save sessions: {e}");
        }
        let saved = storage::save_json(&self.storage, CURRENT_SESSION_KEY, &state.current_id).await;
        if let Err(e) = saved {
            tracing::error!("| session store | failed to save current session id: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        editor::FlowEditor,
        storage::{FileStore, MemoryStore, StorageError},
    };

    async fn memory_store() -> SessionStore<MemoryStore> {
        SessionStore::open(MemoryStore::new(), StoreConfig::default()).await
    }

    #[tokio::test]
    async fn test_open_empty_storage_creates_default() {
        let store = memory_store().await;
        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "New Chat");
        assert_eq!(store.current_id().await, sessions[0].id);
        // the default session is written out right away
        assert_eq!(store.storage().len(), 2);
    }

    #[tokio::test]
    async fn test_create_goes_first_and_becomes_current() {
        let store = memory_store().await;
        let created = store.create(Some("  Research  ")).await;
        assert_eq!(created.name, "Research");
        assert_eq!(created.created_at, created.updated_at);
        assert!(created.workflow_config.is_none());

        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, created.id);
        assert_eq!(store.current_id().await, created.id);

        let unnamed = store.create(Some(" ")).await;
        assert_eq!(unnamed.name, "New Chat");
    }

    #[tokio::test]
    async fn test_store_is_never_empty() {
        let store = memory_store().await;
        let only = store.current_id().await;
        store.delete(&only).await.unwrap();

        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_ne!(sessions[0].id, only);
        assert_eq!(store.current_id().await, sessions[0].id);
    }

    #[tokio::test]
    async fn test_delete_current_moves_pointer() {
        let store = memory_store().await;
        let first = store.current_id().await;
        let second = store.create(None).await;
        let third = store.create(None).await;

        store.delete(&third.id).await.unwrap();
        assert_eq!(store.current_id().await, second.id);

        store.delete(&first).await.unwrap();
        assert_eq!(store.current_id().await, second.id);
        assert_eq!(
            store.delete("missing").await,
            Err(SessionError::NotFound("missing".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_rename_and_messages_bump_updated_at() {
        let store = memory_store().await;
        let session = store.current().await.unwrap();

        store.rename(&session.id, " Budget ").await.unwrap();
        let renamed = store.current().await.unwrap();
        assert_eq!(renamed.name, "Budget");
        assert!(renamed.updated_at > session.updated_at);

        store.add_message(Message::user("hi")).await;
        let messaged = store.current().await.unwrap();
        assert_eq!(messaged.messages.len(), 1);
        assert_eq!(messaged.messages[0].role, Role::User);
        assert!(messaged.updated_at > renamed.updated_at);

        assert_eq!(
            store.rename(&session.id, "   ").await,
            Err(SessionError::EmptyName)
        );
        store.set_messages(Vec::new()).await;
        assert!(store.current().await.unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_switch_rejects_unknown_id() {
        let store = memory_store().await;
        let first = store.current_id().await;
        store.create(None).await;

        store.switch(&first).await.unwrap();
        assert_eq!(store.current_id().await, first);
        assert!(store.switch("nope").await.is_err());
        assert_eq!(store.current_id().await, first);
    }

    #[tokio::test]
    async fn test_update_workflow_config_targets_explicit_id() {
        let store = memory_store().await;
        let background = store.current_id().await;
        store.create(None).await;

        let mut editor = FlowEditor::new();
        editor.load_example();
        assert!(
            store
                .update_workflow_config(&background, Some(editor.snapshot()))
                .await
        );
        assert!(!store.update_workflow_config("ghost", None).await);

        assert!(store.current().await.unwrap().workflow_config.is_none());
        assert!(
            store
                .session(&background)
                .await
                .unwrap()
                .workflow_config
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_reload_restores_sessions_and_pointer() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = StoreConfig::default().storage_dir(dir.path());

        let store = SessionStore::open(FileStore::from_config(&config), config.clone()).await;
        let first = store.current_id().await;
        store.create(Some("Second")).await;
        store.switch(&first).await?;
        let mut editor = FlowEditor::new();
        editor.load_example();
        store.update_workflow_config(&first, Some(editor.snapshot())).await;
        let before = store.sessions().await;
        drop(store);

        let reopened = SessionStore::open(FileStore::from_config(&config), config).await;
        assert_eq!(reopened.sessions().await, before);
        assert_eq!(reopened.current_id().await, first);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_storage_yields_default_session() {
        let storage = MemoryStore::new();
        storage
            .set(SESSIONS_KEY, b"[{\"broken\"".to_vec())
            .await
            .unwrap();
        let store = SessionStore::open(storage, StoreConfig::default()).await;
        assert_eq!(store.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_pointer_falls_back_to_first() {
        let storage = MemoryStore::new();
        let sessions = vec![Session::new("a"), Session::new("b")];
        storage::save_json(&storage, SESSIONS_KEY, &sessions)
            .await
            .unwrap();
        storage::save_json(&storage, CURRENT_SESSION_KEY, "gone")
            .await
            .unwrap();

        let store = SessionStore::open(storage, StoreConfig::default()).await;
        assert_eq!(store.current_id().await, sessions[0].id);
    }

    #[test]
    fn test_record_layout() {
        let session = Session::new("n");
        let value = serde_json::to_value(&session).unwrap();
        assert!(value["createdAt"].is_i64());
        assert!(value["updatedAt"].is_i64());
        assert!(value["workflowConfig"].is_null());
        assert!(value["messages"].as_array().unwrap().is_empty());
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            Err(std::io::Error::other("disk unplugged").into())
        }

        async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk unplugged").into())
        }
    }

    #[tokio::test]
    async fn test_storage_failures_are_swallowed() {
        let store = SessionStore::open(FailingStore, StoreConfig::default()).await;
        let created = store.create(Some("still works")).await;
        assert_eq!(store.current_id().await, created.id);
        assert_eq!(store.sessions().await.len(), 2);
    }
}
