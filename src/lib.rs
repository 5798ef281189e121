//! Agent-flow converts declarative agent workflows into editable node graphs and back.
//! It also provides the tool catalog agents draw from and a session store that keeps
//! each session's last saved graph.
pub mod autosave;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod editor;
pub mod graph;
pub mod overlay;
pub mod session;
pub mod simulation;
pub mod storage;
pub mod topology;
pub mod workflow;
pub mod workspace;

pub use catalog::{Tool, ToolCatalog, ToolCategory};
pub use config::StoreConfig;
pub use convert::{Diagnostic, export_workflow, import_workflow};
pub use editor::FlowEditor;
pub use graph::{GraphSnapshot, VisualGraph};
pub use session::SessionStore;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use workflow::{AgentConfig, WorkflowConfig};
pub use workspace::Workspace;
