//! One editor bound to one session at a time.

use std::sync::Arc;

use crate::{
    autosave::Autosave,
    config::StoreConfig,
    editor::{EditorError, FlowEditor},
    session::{Session, SessionError, SessionStore},
    simulation::{RunReport, SIMULATED_LATENCY},
    storage::KeyValueStore,
};

/// The editor bound to the session it is showing, with debounced persistence.
///
/// The editor always belongs to exactly one session. Before it is pointed at another
/// session its pending write is flushed under the old id and its state is cleared.
#[derive(Debug)]
pub struct Workspace<S> {
    store: Arc<SessionStore<S>>,
    autosave: Autosave<S>,
    editor: FlowEditor,
    session_id: String,
}

impl<S: KeyValueStore> Workspace<S> {
    pub async fn open(storage: S, config: StoreConfig) -> Self {
        let store = Arc::new(SessionStore::open(storage, config).await);
        Self::with_store(store).await
    }

    pub async fn with_store(store: Arc<SessionStore<S>>) -> Self {
        let autosave = Autosave::new(Arc::clone(&store));
        let mut workspace = Self {
            store,
            autosave,
            editor: FlowEditor::new(),
            session_id: String::new(),
        };
        workspace.load_current().await;
        workspace
    }

    pub fn store(&self) -> &Arc<SessionStore<S>> {
        &self.store
    }

    pub fn autosave(&self) -> &Autosave<S> {
        &self.autosave
    }

    pub fn editor(&self) -> &FlowEditor {
        &self.editor
    }

    /// Id of the session the editor is showing.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Apply an edit and schedule the resulting snapshot for saving.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut FlowEditor) -> R) -> R {
        let result = f(&mut self.editor);
        self.on_graph_changed();
        result
    }

    /// Schedule a save of the current graph. An empty canvas is never saved.
    pub fn on_graph_changed(&mut self) {
        if self.editor.graph().is_empty() {
            return;
        }
        let snapshot = self.editor.snapshot();
        self.autosave.schedule(&self.session_id, snapshot);
    }

    pub async fn run(&mut self) -> Result<RunReport, EditorError> {
        let report = self.editor.run(SIMULATED_LATENCY).await?;
        self.on_graph_changed();
        Ok(report)
    }

    pub async fn switch_session(&mut self, id: &str) -> Result<(), SessionError> {
        if self.store.session(id).await.is_none() {
            return Err(SessionError::NotFound(id.to_owned()));
        }
        self.leave_session().await;
        self.store.switch(id).await?;
        self.load_current().await;
        Ok(())
    }

    pub async fn create_session(&mut self, name: Option<&str>) -> Session {
        self.leave_session().await;
        let session = self.store.create(name).await;
        self.load_current().await;
        session
    }

    /// Delete a session; its pending save is discarded.
    pub async fn delete_session(&mut self, id: &str) -> Result<(), SessionError> {
        self.autosave.cancel(id);
        self.store.delete(id).await?;
        if id == self.session_id {
            self.load_current().await;
        }
        Ok(())
    }

    pub async fn rename_session(&self, id: &str, name: &str) -> Result<(), SessionError> {
        self.store.rename(id, name).await
    }

    /// Write every pending save, e.g. before shutdown.
    pub async fn close(&self) {
        self.autosave.flush_all().await;
    }

    async fn leave_session(&mut self) {
        self.autosave.flush(&self.session_id).await;
        self.editor.clear();
    }

    async fn load_current(&mut self) {
        self.editor.clear();
        let Some(session) = self.store.current().await else {
            return;
        };
        tracing::info!(
            "| workspace | Session: {} | Name: {}",
            session.id,
            session.name
        );
        self.session_id = session.id;
        if let Some(snapshot) = session.workflow_config {
            self.editor.load_snapshot(snapshot);
        }
    }
}
