use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use crate::error::GraphDefinitionError;

use super::edge::{ConditionalEdge, Edge};
use super::node::Node;

/// Mutable description of a workflow graph.
///
/// Nothing is validated until `freeze()`, which either returns an immutable
/// `FrozenGraph` or the first definition defect found.
#[derive(Debug, Default)]
pub struct GraphSpec {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    conditionals: Vec<ConditionalEdge>,
    joins: Vec<(String, Vec<String>)>,
    start: Option<String>,
    terminal: Option<String>,
}

impl GraphSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// `to` runs after every completion of `from`.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    pub fn add_conditional_edge(&mut self, edge: ConditionalEdge) -> &mut Self {
        self.conditionals.push(edge);
        self
    }

    /// `join` waits for a fresh completion of every predecessor before each run.
    pub fn add_join<I, S>(&mut self, predecessors: I, join: impl Into<String>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.joins
            .push((join.into(), predecessors.into_iter().map(Into::into).collect()));
        self
    }

    pub fn set_start(&mut self, name: impl Into<String>) -> &mut Self {
        self.start = Some(name.into());
        self
    }

    pub fn set_terminal(&mut self, name: impl Into<String>) -> &mut Self {
        self.terminal = Some(name.into());
        self
    }

    /// Validate the definition and make it immutable.
    pub fn freeze(self) -> Result<FrozenGraph, GraphDefinitionError> {
        let mut nodes: HashMap<String, Arc<Node>> = HashMap::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            let name = node.name().to_string();
            if nodes.contains_key(&name) {
                return Err(GraphDefinitionError::DuplicateNode(name));
            }
            order.push(name.clone());
            nodes.insert(name, Arc::new(node));
        }

        let known = |referenced_by: String, name: &str| {
            if nodes.contains_key(name) {
                Ok(())
            } else {
                Err(GraphDefinitionError::UnknownNode {
                    referenced_by,
                    name: name.to_string(),
                })
            }
        };

        let start = self.start.ok_or(GraphDefinitionError::MissingStart)?;
        known("start".into(), &start)?;
        let terminal = self.terminal.ok_or(GraphDefinitionError::MissingTerminal)?;
        known("terminal".into(), &terminal)?;

        for name in &order {
            for dep in nodes[name].deps() {
                known(format!("deps of '{}'", name), dep)?;
            }
        }
        for edge in &self.edges {
            known(format!("edge {} -> {}", edge.from, edge.to), &edge.from)?;
            known(format!("edge {} -> {}", edge.from, edge.to), &edge.to)?;
        }

        let mut conditionals: HashMap<String, ConditionalEdge> = HashMap::new();
        for edge in self.conditionals {
            let from = edge.from().to_string();
            known("conditional edge".into(), &from)?;
            if edge.candidates().is_empty() {
                return Err(GraphDefinitionError::EmptyCandidates(from));
            }
            for candidate in edge.candidates() {
                known(format!("conditional edge from '{}'", from), candidate)?;
            }
            if conditionals.contains_key(&from) {
                return Err(GraphDefinitionError::DuplicateConditionalEdge(from));
            }
            conditionals.insert(from, edge);
        }

        let mut joins: HashMap<String, Vec<String>> = HashMap::new();
        for (join, preds) in self.joins {
            known("join".into(), &join)?;
            if preds.is_empty() {
                return Err(GraphDefinitionError::EmptyJoin(join));
            }
            for pred in &preds {
                known(format!("join '{}'", join), pred)?;
            }
            if joins.contains_key(&join) {
                return Err(GraphDefinitionError::DuplicateJoin(join));
            }
            joins.insert(join, preds);
        }

        // What a completion of each node triggers, in declaration order
        let mut triggers: HashMap<String, Vec<String>> = HashMap::new();
        let mut push_trigger = |from: &str, to: &str| {
            let targets = triggers.entry(from.to_string()).or_default();
            if !targets.iter().any(|t| t == to) {
                targets.push(to.to_string());
            }
        };
        for edge in &self.edges {
            push_trigger(&edge.from, &edge.to);
        }
        for name in &order {
            for dep in nodes[name].deps() {
                push_trigger(dep, name);
            }
        }
        for (join, preds) in &joins {
            for pred in preds {
                push_trigger(pred, join);
            }
        }

        let graph = FrozenGraph {
            name: self.name,
            nodes,
            order,
            triggers,
            conditionals,
            joins,
            start,
            terminal,
            lints: vec![],
        };
        graph.validate_topology()
    }
}

/// A validated, immutable workflow graph. Cheap to share across runs.
#[derive(Debug)]
pub struct FrozenGraph {
    name: String,
    nodes: HashMap<String, Arc<Node>>,
    order: Vec<String>,
    triggers: HashMap<String, Vec<String>>,
    conditionals: HashMap<String, ConditionalEdge>,
    joins: HashMap<String, Vec<String>>,
    start: String,
    terminal: String,
    lints: Vec<String>,
}

impl FrozenGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    pub fn node(&self, name: &str) -> Option<&Arc<Node>> {
        self.nodes.get(name)
    }

    /// Node names in declaration order.
    pub fn node_names(&self) -> &[String] {
        &self.order
    }

    /// Nodes triggered unconditionally when `name` completes.
    pub fn triggered_by(&self, name: &str) -> &[String] {
        self.triggers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn conditional_from(&self, name: &str) -> Option<&ConditionalEdge> {
        self.conditionals.get(name)
    }

    pub fn join_predecessors(&self, join: &str) -> Option<&[String]> {
        self.joins.get(join).map(Vec::as_slice)
    }

    /// Joins that list `name` as a predecessor.
    pub fn joins_fed_by<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.order
            .iter()
            .filter(move |j| {
                self.joins
                    .get(j.as_str())
                    .is_some_and(|preds| preds.iter().any(|p| p == name))
            })
            .map(String::as_str)
    }

    /// Keys some node reads that no node writes: the run's required inputs.
    pub fn required_inputs(&self) -> Vec<String> {
        let written: HashSet<&str> = self
            .nodes
            .values()
            .flat_map(|n| n.outputs().iter().map(String::as_str))
            .collect();
        let required: BTreeSet<&str> = self
            .nodes
            .values()
            .flat_map(|n| n.reads().iter().map(String::as_str))
            .filter(|k| !written.contains(k))
            .collect();
        required.into_iter().map(str::to_string).collect()
    }

    /// Definition-time warnings (loops closed by unbounded conditional edges).
    pub fn lints(&self) -> &[String] {
        &self.lints
    }

    fn validate_topology(mut self) -> Result<Self, GraphDefinitionError> {
        let mut structural: DiGraph<&str, ()> = DiGraph::new();
        let index: HashMap<&str, NodeIndex> = self
            .order
            .iter()
            .map(|n| (n.as_str(), structural.add_node(n.as_str())))
            .collect();

        for (from, targets) in &self.triggers {
            for to in targets {
                structural.add_edge(index[from.as_str()], index[to.as_str()], ());
            }
        }

        // Only conditional edges may close a loop
        for scc in tarjan_scc(&structural) {
            if is_cycle(&structural, &scc) {
                let mut names: Vec<String> =
                    scc.iter().map(|i| structural[*i].to_string()).collect();
                names.sort();
                return Err(GraphDefinitionError::UnconditionalCycle(names));
            }
        }

        let mut full = structural.clone();
        for (from, edge) in &self.conditionals {
            for to in edge.candidates() {
                full.add_edge(index[from.as_str()], index[to.as_str()], ());
            }
        }

        if !has_path_connecting(
            &full,
            index[self.start.as_str()],
            index[self.terminal.as_str()],
            None,
        ) {
            return Err(GraphDefinitionError::TerminalUnreachable {
                start: self.start.clone(),
                terminal: self.terminal.clone(),
            });
        }

        let mut lints = Vec::new();
        for scc in tarjan_scc(&full) {
            if !is_cycle(&full, &scc) {
                continue;
            }
            let members: HashSet<&str> = scc.iter().map(|i| full[*i]).collect();
            let mut closing: Vec<&ConditionalEdge> = self
                .conditionals
                .values()
                .filter(|e| {
                    members.contains(e.from())
                        && e.candidates().iter().any(|c| members.contains(c.as_str()))
                })
                .collect();
            closing.sort_by(|a, b| a.from().cmp(b.from()));
            for edge in closing {
                match edge.bound() {
                    Some(bound) => {
                        debug!(graph = %self.name, from = %edge.from(), bound, "Bounded conditional loop");
                    }
                    None => {
                        warn!(
                            graph = %self.name,
                            from = %edge.from(),
                            "Conditional edge closes a loop with no declared bound"
                        );
                        lints.push(format!(
                            "conditional edge from '{}' closes a loop with no declared bound",
                            edge.from()
                        ));
                    }
                }
            }
        }
        self.lints = lints;

        Ok(self)
    }
}

fn is_cycle(graph: &DiGraph<&str, ()>, scc: &[NodeIndex]) -> bool {
    scc.len() > 1 || scc.iter().any(|i| graph.contains_edge(*i, *i))
}
