//! Conversion between a declarative [`WorkflowConfig`] and an editable [`VisualGraph`].
//!
//! Import never rejects a well-formed workflow. Unknown tools, a starter that names no
//! agent, handoffs to missing agents and repeated agent names are dropped and reported
//! as [`Diagnostic`]s.

use std::{collections::HashSet, fmt::Display};

use serde_json::Value;
use thiserror::Error;

use crate::{
    catalog::ToolCatalog,
    graph::{
        AgentKind, AgentNodeData, GraphSnapshot, INPUT_NODE_ID, Node, OUTPUT_NODE_ID, Position,
        VisualGraph,
    },
    overlay::Overlay,
    workflow::{AgentConfig, WorkflowConfig},
};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Document is neither a workflow nor a graph snapshot")]
    UnrecognizedDocument,
    #[error("Nothing to export: the graph has no agent nodes")]
    EmptyWorkflow,
}

/// A reference that import (or tool selection) could not resolve and dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    UnknownTool { agent: String, tool: String },
    MissingStarter { starter: String },
    DanglingHandoff { agent: String, target: String },
    DuplicateHandoff { agent: String, target: String },
    DuplicateAgent { name: String },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnknownTool { agent, tool } => {
                write!(f, "agent '{agent}' references unknown tool '{tool}'")
            }
            Diagnostic::MissingStarter { starter } => {
                write!(f, "starter agent '{starter}' is not defined")
            }
            Diagnostic::DanglingHandoff { agent, target } => {
                write!(f, "agent '{agent}' hands off to undefined agent '{target}'")
            }
            Diagnostic::DuplicateHandoff { agent, target } => {
                write!(f, "agent '{agent}' hands off to '{target}' more than once")
            }
            Diagnostic::DuplicateAgent { name } => {
                write!(f, "agent '{name}' is defined more than once")
            }
        }
    }
}

/// Result of importing a workflow.
#[derive(Clone, Debug, PartialEq)]
pub struct Imported {
    pub graph: VisualGraph,
    /// Seeded with every agent's editable fields.
    pub overlay: Overlay,
    pub diagnostics: Vec<Diagnostic>,
}

/// A parsed import file.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowDocument {
    Workflow(WorkflowConfig),
    Snapshot(GraphSnapshot),
}

/// Detect which of the two import shapes `json` holds and parse it.
pub fn parse_document(json: &str) -> Result<WorkflowDocument, ConvertError> {
    let value: Value = serde_json::from_str(json)?;
    let Some(object) = value.as_object() else {
        return Err(ConvertError::UnrecognizedDocument);
    };

    if object.contains_key("nodes") && object.contains_key("edges") {
        Ok(WorkflowDocument::Snapshot(serde_json::from_value(value)?))
    } else if object.contains_key("agents") {
        Ok(WorkflowDocument::Workflow(serde_json::from_value(value)?))
    } else {
        Err(ConvertError::UnrecognizedDocument)
    }
}

pub fn import_workflow(config: &WorkflowConfig) -> Imported {
    let catalog = ToolCatalog::global();
    let mut graph = VisualGraph::new();
    let mut overlay = Overlay::new();
    let mut diagnostics = Vec::new();

    push_fixed(&mut graph, Node::input());

    // A repeated name keeps its first definition; later ones are dropped whole.
    let mut defined = HashSet::with_capacity(config.agents.len());
    let mut agents = Vec::with_capacity(config.agents.len());
    for agent in &config.agents {
        if defined.insert(agent.name.as_str()) {
            agents.push(agent);
        } else {
            diagnostics.push(Diagnostic::DuplicateAgent {
                name: agent.name.clone(),
            });
        }
    }

    for (index, agent) in agents.iter().enumerate() {
        let (tools, unknown) = catalog.partition_known(&agent.tools);
        diagnostics.extend(unknown.into_iter().map(|tool| Diagnostic::UnknownTool {
            agent: agent.name.clone(),
            tool,
        }));

        let data = AgentNodeData {
            name: agent.name.clone(),
            instructions: agent.instructions.clone(),
            handoff_description: agent.handoff_description.clone(),
            tools,
            handoffs: Vec::new(),
            output_parameters: agent.output_parameters.clone(),
            is_starter: agent.name == config.starter_agent,
            kind: AgentKind::from_name(&agent.name),
        };
        overlay.set_instructions(&agent.name, &agent.instructions);
        if let Some(description) = &agent.handoff_description {
            overlay.set_handoff_description(&agent.name, description);
        }
        overlay.set_tools(&agent.name, data.tools.clone());

        if let Err(e) = graph.add_node(Node::agent(data, Position::agent_slot(index))) {
            tracing::warn!("| workflow import | {e}");
        }
    }

    push_fixed(&mut graph, Node::output(Position::output_slot(agents.len())));

    if defined.contains(config.starter_agent.as_str()) {
        graph.push_edge(INPUT_NODE_ID, &config.starter_agent);
    } else {
        diagnostics.push(Diagnostic::MissingStarter {
            starter: config.starter_agent.clone(),
        });
    }

    for agent in &agents {
        push_handoffs(&mut graph, agent, &defined, &mut diagnostics);
    }

    // An agent that hands off to nobody is a terminus of the workflow.
    for agent in agents.iter().filter(|agent| agent.handoffs.is_empty()) {
        graph.push_edge(&agent.name, OUTPUT_NODE_ID);
    }

    graph.sync_handoffs();

    for diagnostic in &diagnostics {
        tracing::warn!("| workflow import | dropped reference: {diagnostic}");
    }
    tracing::info!(
        "| workflow import | {} agents, {} edges, {} dropped references",
        graph.agent_count(),
        graph.edges.len(),
        diagnostics.len()
    );

    Imported {
        graph,
        overlay,
        diagnostics,
    }
}

fn push_fixed(graph: &mut VisualGraph, node: Node) {
    if let Err(e) = graph.add_node(node) {
        tracing::warn!("| workflow import | {e}");
    }
}

fn push_handoffs(
    graph: &mut VisualGraph,
    agent: &AgentConfig,
    names: &HashSet<&str>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut seen = HashSet::with_capacity(agent.handoffs.len());
    for target in &agent.handoffs {
        if !names.contains(target.as_str()) {
            diagnostics.push(Diagnostic::DanglingHandoff {
                agent: agent.name.clone(),
                target: target.clone(),
            });
        } else if !seen.insert(target.as_str()) {
            diagnostics.push(Diagnostic::DuplicateHandoff {
                agent: agent.name.clone(),
                target: target.clone(),
            });
        } else {
            graph.push_edge(&agent.name, target);
        }
    }
}

/// Rebuild the declarative workflow from the graph, preferring overlay edits.
pub fn export_workflow(
    graph: &VisualGraph,
    overlay: &Overlay,
) -> Result<WorkflowConfig, ConvertError> {
    let agents = graph.agents().collect::<Vec<_>>();
    let Some((first_id, _)) = agents.first() else {
        return Err(ConvertError::EmptyWorkflow);
    };

    let starter_agent = graph
        .edges_from(INPUT_NODE_ID)
        .next()
        .map(|edge| edge.target.clone())
        .or_else(|| {
            agents
                .iter()
                .find(|(_, data)| data.is_starter)
                .map(|(id, _)| (*id).to_owned())
        })
        .unwrap_or_else(|| (*first_id).to_owned());

    let agents = agents
        .iter()
        .map(|(id, data)| {
            let resolved = overlay.resolve(data);
            AgentConfig {
                name: data.name.clone(),
                instructions: resolved.instructions.to_owned(),
                handoff_description: resolved.handoff_description.map(str::to_owned),
                tools: resolved.tools.to_vec(),
                handoffs: graph
                    .edges_from(id)
                    .filter(|edge| graph.is_agent(&edge.target))
                    .map(|edge| edge.target.clone())
                    .collect(),
                output_parameters: data.output_parameters.clone(),
            }
        })
        .collect();

    Ok(WorkflowConfig {
        starter_agent,
        agents,
    })
}
