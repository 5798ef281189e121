//! The editing model behind the canvas: graph edits, overlay edits and simulated runs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    catalog::ToolCatalog,
    convert::{self, ConvertError, Diagnostic, WorkflowDocument},
    graph::{
        AgentKind, AgentNodeData, ConnectOutcome, Edge, GraphError, GraphSnapshot, Node, Position,
        VisualGraph,
    },
    overlay::Overlay,
    simulation::{self, RunReport, SimulationError},
    topology::WorkflowTopology,
    workflow::{ExportFile, WorkflowConfig},
};

const NEW_AGENT_INSTRUCTIONS: &str = "Write the agent's instructions here...";
const NEW_AGENT_DESCRIPTION: &str = "Describe what this agent is responsible for...";

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Convert error: {0}")]
    ConvertError(#[from] ConvertError),
    #[error("Graph error: {0}")]
    GraphError(#[from] GraphError),
    #[error("Simulation error: {0}")]
    SimulationError(#[from] SimulationError),
    #[error("Agent not found: {0}")]
    AgentNotFound(String),
}

/// Editing state of one open workflow: the visual graph, the live overlay and the
/// text typed into the input node.
///
/// Every method runs on the caller's event loop; nothing here is shared or locked.
#[derive(Clone, Debug, Default)]
pub struct FlowEditor {
    graph: VisualGraph,
    overlay: Overlay,
    user_input: String,
    loaded: bool,
}

impl FlowEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &VisualGraph {
        &self.graph
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    /// Whether a workflow or snapshot has been loaded since the last clear.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn clear(&mut self) {
        self.graph = VisualGraph::new();
        self.overlay.clear();
        self.user_input.clear();
        self.loaded = false;
    }

    pub fn load_workflow(&mut self, config: &WorkflowConfig) -> Vec<Diagnostic> {
        self.clear();
        let imported = convert::import_workflow(config);
        self.graph = imported.graph;
        self.overlay = imported.overlay;
        self.loaded = true;
        imported.diagnostics
    }

    pub fn load_example(&mut self) -> Vec<Diagnostic> {
        self.load_workflow(&WorkflowConfig::example())
    }

    pub fn load_snapshot(&mut self, snapshot: GraphSnapshot) {
        self.clear();
        let (graph, overlay) = snapshot.into_parts();
        self.user_input = graph
            .nodes
            .iter()
            .find_map(|node| match node {
                Node::Input { data, .. } => Some(data.user_input.clone()),
                _ => None,
            })
            .unwrap_or_default();
        self.loaded = !graph.is_empty();
        self.graph = graph;
        self.overlay = overlay;
    }

    pub fn load_document(&mut self, document: WorkflowDocument) -> Vec<Diagnostic> {
        match document {
            WorkflowDocument::Workflow(config) => self.load_workflow(&config),
            WorkflowDocument::Snapshot(snapshot) => {
                self.load_snapshot(snapshot);
                Vec::new()
            }
        }
    }

    /// Parse an uploaded file and load it. On malformed input nothing changes.
    pub fn import_json(&mut self, json: &str) -> Result<Vec<Diagnostic>, EditorError> {
        let document = convert::parse_document(json)?;
        Ok(self.load_document(document))
    }

    pub fn connect(&mut self, source: &str, target: &str) -> Result<ConnectOutcome, EditorError> {
        Ok(self.graph.connect(source, target)?)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Option<Edge> {
        self.graph.disconnect(edge_id)
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<(), EditorError> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_owned()))?;
        node.set_position(position);
        Ok(())
    }

    /// Add a placeholder agent named `NewAgent<n>` and return its name.
    pub fn add_agent(&mut self) -> String {
        let mut number = self.graph.agent_count() + 1;
        while self.graph.node(&format!("NewAgent{number}")).is_some() {
            number += 1;
        }
        let name = format!("NewAgent{number}");

        let data = AgentNodeData {
            name: name.clone(),
            instructions: NEW_AGENT_INSTRUCTIONS.to_owned(),
            handoff_description: Some(NEW_AGENT_DESCRIPTION.to_owned()),
            kind: AgentKind::Default,
            ..Default::default()
        };
        if let Err(e) = self
            .graph
            .add_node(Node::agent(data, Position::added_agent_slot(number)))
        {
            tracing::error!("| flow editor | {e}");
        }
        self.overlay.set_instructions(&name, NEW_AGENT_INSTRUCTIONS);
        self.overlay
            .set_handoff_description(&name, NEW_AGENT_DESCRIPTION);

        tracing::debug!("| flow editor | added agent {name}");
        name
    }

    pub fn remove_agent(&mut self, name: &str) -> Result<(), EditorError> {
        self.graph.remove_agent(name)?;
        self.overlay.forget(name);
        Ok(())
    }

    pub fn set_instructions(&mut self, agent: &str, instructions: &str) -> Result<(), EditorError> {
        self.ensure_agent(agent)?;
        self.overlay.set_instructions(agent, instructions);
        Ok(())
    }

    pub fn set_handoff_description(
        &mut self,
        agent: &str,
        description: &str,
    ) -> Result<(), EditorError> {
        self.ensure_agent(agent)?;
        self.overlay.set_handoff_description(agent, description);
        Ok(())
    }

    /// Replace an agent's tool selection; unknown tool ids are dropped and reported.
    pub fn set_tools(
        &mut self,
        agent: &str,
        tools: &[String],
    ) -> Result<Vec<Diagnostic>, EditorError> {
        self.ensure_agent(agent)?;
        let (known, unknown) = ToolCatalog::global().partition_known(tools);
        self.overlay.set_tools(agent, known);
        Ok(unknown
            .into_iter()
            .map(|tool| Diagnostic::UnknownTool {
                agent: agent.to_owned(),
                tool,
            })
            .collect())
    }

    pub fn set_user_input(&mut self, input: impl Into<String>) {
        self.user_input = input.into();
        if let Some(data) = self.graph.input_data_mut() {
            data.user_input.clone_from(&self.user_input);
        }
    }

    fn ensure_agent(&self, agent: &str) -> Result<(), EditorError> {
        if self.graph.is_agent(agent) {
            Ok(())
        } else {
            Err(EditorError::AgentNotFound(agent.to_owned()))
        }
    }

    /// Fold the overlay into the node payloads and capture the result.
    pub fn snapshot(&mut self) -> GraphSnapshot {
        self.overlay.apply_to(&mut self.graph);
        GraphSnapshot {
            nodes: self.graph.nodes.clone(),
            edges: self.graph.edges.clone(),
            overlay: self.overlay.clone(),
        }
    }

    pub fn export(&self) -> Result<WorkflowConfig, EditorError> {
        Ok(convert::export_workflow(&self.graph, &self.overlay)?)
    }

    pub fn export_file(&self, now: DateTime<Utc>) -> Result<ExportFile, EditorError> {
        let config = self.export()?;
        let file = ExportFile::new(&config, now).map_err(ConvertError::from)?;
        tracing::info!(
            "| flow editor | exported {} agents to {}",
            config.agents.len(),
            file.file_name
        );
        Ok(file)
    }

    pub fn topology(&self) -> Result<WorkflowTopology, EditorError> {
        Ok(WorkflowTopology::from_workflow(&self.export()?))
    }

    /// Simulated run; the fabricated output is written into the output node.
    pub async fn run(&mut self, latency: Duration) -> Result<RunReport, EditorError> {
        if !self.loaded {
            return Err(SimulationError::NotLoaded.into());
        }
        if self.user_input.trim().is_empty() {
            return Err(SimulationError::EmptyInput.into());
        }
        if let Some(output) = self.graph.output_data_mut() {
            output.result.clear();
        }

        let workflow = self.export()?;
        let report = simulation::simulate_run(&workflow, &self.user_input, latency).await?;

        if let Some(output) = self.graph.output_data_mut() {
            output.result.clone_from(&report.final_output);
        }
        Ok(report)
    }
}
