//! Live per-agent edits that have not been folded into the graph yet.
//!
//! While an editing session is open an overlay entry is the authoritative value for
//! that agent, even when it is an empty string. Node payloads are refreshed from the
//! overlay whenever the editor persists, never the other way round.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::{AgentNodeData, VisualGraph};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    #[serde(default, rename = "agentInstructions")]
    pub instructions: BTreeMap<String, String>,
    #[serde(default, rename = "agentHandoffDescs")]
    pub handoff_descriptions: BTreeMap<String, String>,
    #[serde(default, rename = "agentTools")]
    pub tools: BTreeMap<String, Vec<String>>,
}

/// An agent's editable fields after the overlay has been applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAgent<'a> {
    pub instructions: &'a str,
    pub handoff_description: Option<&'a str>,
    pub tools: &'a [String],
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
            && self.handoff_descriptions.is_empty()
            && self.tools.is_empty()
    }

    pub fn clear(&mut self) {
        self.instructions.clear();
        self.handoff_descriptions.clear();
        self.tools.clear();
    }

    pub fn set_instructions(&mut self, agent: impl Into<String>, instructions: impl Into<String>) {
        self.instructions.insert(agent.into(), instructions.into());
    }

    pub fn set_handoff_description(
        &mut self,
        agent: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.handoff_descriptions
            .insert(agent.into(), description.into());
    }

    pub fn set_tools(&mut self, agent: impl Into<String>, tools: Vec<String>) {
        self.tools.insert(agent.into(), tools);
    }

    /// Drop every entry of a removed agent.
    pub fn forget(&mut self, agent: &str) {
        self.instructions.remove(agent);
        self.handoff_descriptions.remove(agent);
        self.tools.remove(agent);
    }

    pub fn resolve<'a>(&'a self, data: &'a AgentNodeData) -> ResolvedAgent<'a> {
        ResolvedAgent {
            instructions: self
                .instructions
                .get(&data.name)
                .map_or(data.instructions.as_str(), String::as_str),
            handoff_description: self
                .handoff_descriptions
                .get(&data.name)
                .map(String::as_str)
                .or(data.handoff_description.as_deref()),
            tools: self
                .tools
                .get(&data.name)
                .map_or(data.tools.as_slice(), Vec::as_slice),
        }
    }

    /// Write overlay values into the matching agent payloads.
    pub fn apply_to(&self, graph: &mut VisualGraph) {
        for node in &mut graph.nodes {
            let Some(data) = node.as_agent_mut() else {
                continue;
            };
            if let Some(instructions) = self.instructions.get(&data.name) {
                data.instructions.clone_from(instructions);
            }
            if let Some(description) = self.handoff_descriptions.get(&data.name) {
                data.handoff_description = Some(description.clone());
            }
            if let Some(tools) = self.tools.get(&data.name) {
                data.tools.clone_from(tools);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, Position};

    fn data() -> AgentNodeData {
        AgentNodeData {
            name: "A".to_owned(),
            instructions: "stored".to_owned(),
            handoff_description: Some("stored desc".to_owned()),
            tools: vec!["read".to_owned()],
            ..Default::default()
        }
    }

    #[test]
    fn test_payload_is_fallback() {
        let overlay = Overlay::new();
        let data = data();
        let resolved = overlay.resolve(&data);
        assert_eq!(resolved.instructions, "stored");
        assert_eq!(resolved.handoff_description, Some("stored desc"));
        assert_eq!(resolved.tools, ["read".to_owned()]);
    }

    #[test]
    fn test_overlay_wins_even_when_empty() {
        let mut overlay = Overlay::new();
        overlay.set_instructions("A", "");
        overlay.set_handoff_description("A", "edited desc");
        overlay.set_tools("A", vec![]);

        let data = data();
        let resolved = overlay.resolve(&data);
        assert_eq!(resolved.instructions, "");
        assert_eq!(resolved.handoff_description, Some("edited desc"));
        assert!(resolved.tools.is_empty());
    }

    #[test]
    fn test_apply_refreshes_payload() {
        let mut graph = VisualGraph::new();
        graph
            .add_node(Node::agent(data(), Position::default()))
            .unwrap();

        let mut overlay = Overlay::new();
        overlay.set_instructions("A", "edited");
        overlay.apply_to(&mut graph);

        let agent = graph.agent("A").unwrap();
        assert_eq!(agent.instructions, "edited");
        assert_eq!(agent.handoff_description.as_deref(), Some("stored desc"));
        // the overlay itself is untouched by applying it
        assert_eq!(overlay.instructions.len(), 1);
    }

    #[test]
    fn test_serialized_keys() {
        let mut overlay = Overlay::new();
        overlay.set_instructions("A", "i");
        let value = serde_json::to_value(&overlay).unwrap();
        assert_eq!(value["agentInstructions"]["A"], "i");
        assert!(value["agentHandoffDescs"].as_object().unwrap().is_empty());
    }
}
