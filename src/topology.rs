//! Handoff graph analysis on petgraph.

use std::collections::{HashMap, HashSet, hash_map};

use petgraph::{
    Direction,
    graph::NodeIndex,
    prelude::StableGraph,
    visit::Bfs,
};

use crate::workflow::WorkflowConfig;

/// Read-only handoff graph of a workflow, for analysis and visualization.
pub struct WorkflowTopology {
    starter: String,
    graph: StableGraph<String, ()>,
    // Map from agent name to node index for quick lookup
    name_to_node: HashMap<String, NodeIndex>,
}

impl WorkflowTopology {
    /// Handoffs to agents that are not defined are ignored.
    pub fn from_workflow(config: &WorkflowConfig) -> Self {
        let mut graph = StableGraph::new();
        let mut name_to_node = HashMap::new();

        for agent in &config.agents {
            if let hash_map::Entry::Vacant(e) = name_to_node.entry(agent.name.clone()) {
                e.insert(graph.add_node(agent.name.clone()));
            }
        }

        for agent in &config.agents {
            let from = name_to_node[&agent.name];
            for target in &agent.handoffs {
                if let Some(&to) = name_to_node.get(target) {
                    if graph.find_edge(from, to).is_none() {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        Self {
            starter: config.starter_agent.clone(),
            graph,
            name_to_node,
        }
    }

    pub fn agent_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn handoff_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Handoff loops are legal (an agent may hand back to a triage agent), this only reports them.
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        self.graph.node_indices().any(|node| {
            !visited.contains(&node) && self.is_cyclic_util(node, &mut visited, &mut rec_stack)
        })
    }

    fn is_cyclic_util(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);

        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            if !visited.contains(&neighbor) {
                if self.is_cyclic_util(neighbor, visited, rec_stack) {
                    return true;
                }
            } else if rec_stack.contains(&neighbor) {
                return true;
            }
        }

        rec_stack.remove(&node);
        false
    }

    /// Agents no handoff chain from the starter reaches, in workflow order.
    pub fn unreachable_agents(&self) -> Vec<String> {
        let mut reachable = HashSet::new();
        if let Some(&start) = self.name_to_node.get(&self.starter) {
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(node) = bfs.next(&self.graph) {
                reachable.insert(node);
            }
        }

        self.graph
            .node_indices()
            .filter(|node| !reachable.contains(node))
            .filter_map(|node| self.graph.node_weight(node).cloned())
            .collect()
    }

    /// Every simple path from the starter to an agent without handoffs.
    ///
    /// A path that would revisit an agent is cut there and not reported.
    pub fn find_execution_paths(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        if let Some(&start) = self.name_to_node.get(&self.starter) {
            let mut current_path = Vec::new();
            self.dfs_paths(start, &mut current_path, &mut paths);
        }
        paths
    }

    fn dfs_paths(
        &self,
        node_idx: NodeIndex,
        current_path: &mut Vec<NodeIndex>,
        all_paths: &mut Vec<Vec<String>>,
    ) {
        if current_path.contains(&node_idx) {
            return;
        }
        current_path.push(node_idx);

        let mut neighbors = self
            .graph
            .neighbors_directed(node_idx, Direction::Outgoing)
            .peekable();
        if neighbors.peek().is_none() {
            all_paths.push(
                current_path
                    .iter()
                    .filter_map(|idx| self.graph.node_weight(*idx).cloned())
                    .collect(),
            );
        } else {
            // petgraph walks neighbors newest edge first
            let mut neighbors = neighbors.collect::<Vec<_>>();
            neighbors.reverse();
            for neighbor in neighbors {
                self.dfs_paths(neighbor, current_path, all_paths);
            }
        }

        current_path.pop();
    }

    /// Graphviz rendering; the starter is drawn with a double border.
    pub fn export_dot(&self) -> String {
        let mut dot = String::from("digraph {\n");

        for node_idx in self.graph.node_indices() {
            if let Some(name) = self.graph.node_weight(node_idx) {
                let shape = if *name == self.starter {
                    ", peripheries=2"
                } else {
                    ""
                };
                dot.push_str(&format!("    \"{name}\" [label=\"{name}\"{shape}];\n"));
            }
        }

        for edge in self.graph.edge_indices() {
            if let Some((source, target)) = self.graph.edge_endpoints(edge) {
                if let (Some(source), Some(target)) =
                    (self.graph.node_weight(source), self.graph.node_weight(target))
                {
                    dot.push_str(&format!("    \"{source}\" -> \"{target}\";\n"));
                }
            }
        }

        dot.push_str("}\n");
        dot
    }
}
