//! Visual graph: positioned nodes and directed edges as a flow editor renders them.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overlay::Overlay;

pub const INPUT_NODE_ID: &str = "input-node";
pub const OUTPUT_NODE_ID: &str = "output-node";

const INPUT_TYPE: &str = "Text/JSON";
const OUTPUT_TYPE: &str = "Structured Result";

// Grid used when laying out imported agents.
const GRID_COLUMNS: usize = 3;
const GRID_ORIGIN: Position = Position { x: 100.0, y: 250.0 };
const COLUMN_PITCH: f64 = 380.0;
const ROW_PITCH: f64 = 400.0;

pub const INPUT_POSITION: Position = Position { x: 400.0, y: 50.0 };

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    #[error("Node already exists: {0}")]
    DuplicateNode(String),
    #[error("Node '{0}' can not be connected to itself")]
    SelfLoop(String),
    #[error("Can not connect '{from}' to '{to}'")]
    InvalidConnection { from: String, to: String },
    #[error("Node '{0}' is part of every graph and can not be removed")]
    FixedNode(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Grid slot of the `index`-th imported agent.
    pub fn agent_slot(index: usize) -> Self {
        Self {
            x: GRID_ORIGIN.x + (index % GRID_COLUMNS) as f64 * COLUMN_PITCH,
            y: GRID_ORIGIN.y + (index / GRID_COLUMNS) as f64 * ROW_PITCH,
        }
    }

    /// Output node sits one row below the last row of agents.
    pub fn output_slot(agent_count: usize) -> Self {
        let rows = agent_count.div_ceil(GRID_COLUMNS);
        Self {
            x: INPUT_POSITION.x,
            y: GRID_ORIGIN.y + rows as f64 * ROW_PITCH,
        }
    }

    /// Diagonal offset for the `number`-th agent added by hand, so new nodes don't stack.
    pub fn added_agent_slot(number: usize) -> Self {
        let step = number.saturating_sub(1) as f64 * 100.0;
        Self {
            x: 400.0 + step,
            y: 200.0 + step,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Input,
    Agent,
    Output,
}

/// Display category of an agent, guessed from its name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Extraction,
    Calculation,
    Report,
    #[default]
    Default,
}

impl AgentKind {
    pub fn from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("extract") {
            AgentKind::Extraction
        } else if name.contains("calculation") || name.contains("calculate") {
            AgentKind::Calculation
        } else if name.contains("report") || name.contains("generation") {
            AgentKind::Report
        } else {
            AgentKind::Default
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputData {
    pub input_type: String,
    #[serde(default)]
    pub user_input: String,
}

impl Default for InputData {
    fn default() -> Self {
        Self {
            input_type: INPUT_TYPE.to_owned(),
            user_input: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputData {
    pub output_type: String,
    #[serde(default)]
    pub result: String,
}

impl Default for OutputData {
    fn default() -> Self {
        Self {
            output_type: OUTPUT_TYPE.to_owned(),
            result: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentNodeData {
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub handoff_description: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Mirrors the agent's outgoing agent edges, kept in sync after every edge change.
    #[serde(default)]
    pub handoffs: Vec<String>,
    #[serde(default)]
    pub output_parameters: Option<serde_json::Value>,
    #[serde(default, rename = "isStarter")]
    pub is_starter: bool,
    #[serde(default, rename = "type")]
    pub kind: AgentKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    #[serde(rename = "inputNode")]
    Input {
        id: String,
        position: Position,
        data: InputData,
    },
    #[serde(rename = "agentNode")]
    Agent {
        id: String,
        position: Position,
        data: AgentNodeData,
    },
    #[serde(rename = "outputNode")]
    Output {
        id: String,
        position: Position,
        data: OutputData,
    },
}

impl Node {
    pub fn input() -> Self {
        Node::Input {
            id: INPUT_NODE_ID.to_owned(),
            position: INPUT_POSITION,
            data: InputData::default(),
        }
    }

    pub fn output(position: Position) -> Self {
        Node::Output {
            id: OUTPUT_NODE_ID.to_owned(),
            position,
            data: OutputData::default(),
        }
    }

    /// Agent nodes are keyed by the agent's name.
    pub fn agent(data: AgentNodeData, position: Position) -> Self {
        Node::Agent {
            id: data.name.clone(),
            position,
            data,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Node::Input { id, .. } | Node::Agent { id, .. } | Node::Output { id, .. } => id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Input { .. } => NodeKind::Input,
            Node::Agent { .. } => NodeKind::Agent,
            Node::Output { .. } => NodeKind::Output,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Node::Input { position, .. }
            | Node::Agent { position, .. }
            | Node::Output { position, .. } => *position,
        }
    }

    pub fn set_position(&mut self, to: Position) {
        match self {
            Node::Input { position, .. }
            | Node::Agent { position, .. }
            | Node::Output { position, .. } => *position = to,
        }
    }

    pub fn as_agent(&self) -> Option<&AgentNodeData> {
        match self {
            Node::Agent { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn as_agent_mut(&mut self) -> Option<&mut AgentNodeData> {
        match self {
            Node::Agent { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// Where an edge came from, which is also how it is colored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// input -> starter agent
    Starter,
    /// agent -> agent
    #[default]
    Handoff,
    /// agent -> output
    Terminal,
}

impl EdgeKind {
    pub fn between(source: &str, target: &str) -> Self {
        if source == INPUT_NODE_ID {
            EdgeKind::Starter
        } else if target == OUTPUT_NODE_ID {
            EdgeKind::Terminal
        } else {
            EdgeKind::Handoff
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            EdgeKind::Starter => "#3b82f6",
            EdgeKind::Handoff => "#8b5cf6",
            EdgeKind::Terminal => "#10b981",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: edge_id(&source, &target),
            kind: EdgeKind::between(&source, &target),
            source,
            target,
        }
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// `input-<agent>`, `<agent>-<target>`, `<agent>-output`
fn edge_id(source: &str, target: &str) -> String {
    let source = if source == INPUT_NODE_ID { "input" } else { source };
    let target = if target == OUTPUT_NODE_ID { "output" } else { target };
    format!("{source}-{target}")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    Added { replaced: Option<Edge> },
    AlreadyConnected,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl VisualGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id() == id)
    }

    pub fn agent(&self, id: &str) -> Option<&AgentNodeData> {
        self.node(id).and_then(Node::as_agent)
    }

    pub fn agent_mut(&mut self, id: &str) -> Option<&mut AgentNodeData> {
        self.node_mut(id).and_then(Node::as_agent_mut)
    }

    pub fn is_agent(&self, id: &str) -> bool {
        self.agent(id).is_some()
    }

    /// Agent nodes in node order, as `(id, payload)`.
    pub fn agents(&self) -> impl Iterator<Item = (&str, &AgentNodeData)> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Agent { id, data, .. } => Some((id.as_str(), data)),
            _ => None,
        })
    }

    pub fn agent_count(&self) -> usize {
        self.agents().count()
    }

    pub fn output_data_mut(&mut self) -> Option<&mut OutputData> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Output { data, .. } => Some(data),
            _ => None,
        })
    }

    pub fn input_data_mut(&mut self) -> Option<&mut InputData> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Input { data, .. } => Some(data),
            _ => None,
        })
    }

    pub fn edges_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.source == source)
    }

    pub fn edges_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.target == target)
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.source == source && edge.target == target)
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.node(node.id()).is_some() {
            return Err(GraphError::DuplicateNode(node.id().to_owned()));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Append a derived edge without arity checks, used while building a graph from a workflow.
    pub(crate) fn push_edge(&mut self, source: &str, target: &str) {
        let mut edge = Edge::new(source, target);
        edge.id = self.unique_edge_id(edge.id);
        self.edges.push(edge);
    }

    fn unique_edge_id(&self, id: String) -> String {
        if !self.edges.iter().any(|edge| edge.id == id) {
            return id;
        }
        (2..)
            .map(|n| format!("{id}-{n}"))
            .find(|candidate| !self.edges.iter().any(|edge| &edge.id == candidate))
            .unwrap_or(id)
    }

    /// Interactive edge creation.
    ///
    /// The input node keeps at most one outgoing edge and the output node at most one
    /// incoming edge; a new connection replaces the old one in the same step. Agent
    /// nodes take any number of edges in both directions.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<ConnectOutcome, GraphError> {
        for id in [source, target] {
            if self.node(id).is_none() {
                return Err(GraphError::NodeNotFound(id.to_owned()));
            }
        }
        if source == target {
            return Err(GraphError::SelfLoop(source.to_owned()));
        }
        if source == OUTPUT_NODE_ID
            || target == INPUT_NODE_ID
            || (source == INPUT_NODE_ID && target == OUTPUT_NODE_ID)
        {
            return Err(GraphError::InvalidConnection {
                from: source.to_owned(),
                to: target.to_owned(),
            });
        }
        if self.has_edge(source, target) {
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let replaced_at = if source == INPUT_NODE_ID {
            self.edges.iter().position(|edge| edge.source == INPUT_NODE_ID)
        } else if target == OUTPUT_NODE_ID {
            self.edges.iter().position(|edge| edge.target == OUTPUT_NODE_ID)
        } else {
            None
        };
        let replaced = replaced_at.map(|index| self.edges.remove(index));

        self.push_edge(source, target);
        self.sync_handoffs();

        tracing::debug!(
            "| visual graph | connected {source} -> {target}, replaced: {:?}",
            replaced.as_ref().map(|edge| &edge.id)
        );
        Ok(ConnectOutcome::Added { replaced })
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Option<Edge> {
        let index = self.edges.iter().position(|edge| edge.id == edge_id)?;
        let edge = self.edges.remove(index);
        self.sync_handoffs();
        Some(edge)
    }

    /// Remove an agent node together with every edge touching it.
    pub fn remove_agent(&mut self, id: &str) -> Result<Node, GraphError> {
        if id == INPUT_NODE_ID || id == OUTPUT_NODE_ID {
            return Err(GraphError::FixedNode(id.to_owned()));
        }
        let index = self
            .nodes
            .iter()
            .position(|node| node.id() == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_owned()))?;
        let node = self.nodes.remove(index);
        self.edges
            .retain(|edge| edge.source != id && edge.target != id);
        self.sync_handoffs();
        Ok(node)
    }

    /// Recompute every agent payload's `handoffs` from the agent -> agent edges.
    pub fn sync_handoffs(&mut self) {
        let handoffs = self
            .agents()
            .map(|(id, _)| {
                let targets = self
                    .edges_from(id)
                    .filter(|edge| self.is_agent(&edge.target))
                    .map(|edge| edge.target.clone())
                    .collect::<Vec<_>>();
                (id.to_owned(), targets)
            })
            .collect::<Vec<_>>();

        for (id, targets) in handoffs {
            if let Some(data) = self.agent_mut(&id) {
                data.handoffs = targets;
            }
        }
    }
}

/// Serialized editor state: the graph plus the live overlay maps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(flatten)]
    pub overlay: Overlay,
}

impl GraphSnapshot {
    pub fn into_parts(self) -> (VisualGraph, Overlay) {
        let mut graph = VisualGraph {
            nodes: self.nodes,
            edges: self.edges,
        };
        // Snapshots written by other editors may carry no provenance.
        for edge in &mut graph.edges {
            edge.kind = EdgeKind::between(&edge.source, &edge.target);
        }
        graph.sync_handoffs();
        (graph, self.overlay)
    }
}
