use std::collections::{HashMap, VecDeque};
use std::io;

use pisa_isa::Instruction;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Operation,
    RegisterAddress,
    Immediate,
}

/// Classification assigned to data nodes by the performance modeler: nodes
/// on the graph boundary span the DRAM tier, interior nodes are transient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryClass {
    Register,
    MemoryCache,
}

/// Per-node scheduling state, written by the performance modeler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleState {
    pub scheduled: bool,
    pub start_time: i64,
    pub end_time: i64,
    pub last_access_time: i64,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            scheduled: false,
            start_time: -1,
            end_time: -1,
            last_access_time: -1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    kind: NodeKind,
    label: String,
    instruction: Option<usize>,
    pub schedule: ScheduleState,
    pub memory_class: Option<MemoryClass>,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Index of the backing instruction in the stream the graph was built
    /// from; `None` for data nodes.
    pub fn instruction(&self) -> Option<usize> {
        self.instruction
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NodeFilter {
    pub registers: bool,
    pub immediates: bool,
    pub operations: bool,
}

impl NodeFilter {
    pub fn all() -> Self {
        Self {
            registers: true,
            immediates: true,
            operations: true,
        }
    }

    pub fn operations_only() -> Self {
        Self {
            registers: false,
            immediates: false,
            operations: true,
        }
    }

    fn admits(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Operation => self.operations,
            NodeKind::RegisterAddress => self.registers,
            NodeKind::Immediate => self.immediates,
        }
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node {0:?} does not exist or was removed")]
    NodeNotFound(NodeId),
}

/// Directed dependency graph over operation and data nodes.
///
/// Node ids are stable across removals and clones; removed slots stay dead.
/// Edges are deduplicated, so in/out degree counts distinct neighbors.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    ins: Vec<Vec<NodeId>>,
    outs: Vec<Vec<NodeId>>,
    alive: Vec<bool>,
    live: usize,
}

impl DependencyGraph {
    /// Builds the combined op/data graph per the data-flow rule: reads target
    /// the latest node bound to a location, every write allocates a fresh
    /// data node and rebinds the location.
    pub fn from_instructions(instructions: &[Instruction]) -> Self {
        let mut graph = Self::default();
        let mut bindings: HashMap<String, NodeId> = HashMap::new();

        for (index, instr) in instructions.iter().enumerate() {
            let op = graph.push_node(Node {
                kind: NodeKind::Operation,
                label: format!("{}_{}", instr.opcode, graph.nodes.len()),
                instruction: Some(index),
                schedule: ScheduleState::default(),
                memory_class: None,
            });

            for operand in &instr.inputs {
                let data = match bindings.get(operand.location()) {
                    Some(&existing) => existing,
                    None => {
                        let kind = if operand.is_immediate() {
                            NodeKind::Immediate
                        } else {
                            NodeKind::RegisterAddress
                        };
                        let node = graph.push_node(Node {
                            kind,
                            label: operand.location().to_string(),
                            instruction: None,
                            schedule: ScheduleState::default(),
                            memory_class: None,
                        });
                        bindings.insert(operand.location().to_string(), node);
                        node
                    }
                };
                graph.add_edge(data, op);
            }

            for operand in &instr.outputs {
                let data = graph.push_node(Node {
                    kind: NodeKind::RegisterAddress,
                    label: operand.location().to_string(),
                    instruction: None,
                    schedule: ScheduleState::default(),
                    memory_class: None,
                });
                graph.add_edge(op, data);
                bindings.insert(operand.location().to_string(), data);
            }
        }

        graph
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.ins.push(Vec::new());
        self.outs.push(Vec::new());
        self.alive.push(true);
        self.live += 1;
        id
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId) {
        if from == to || self.outs[from.index()].contains(&to) {
            return;
        }
        self.outs[from.index()].push(to);
        self.ins[to.index()].push(from);
    }

    pub fn node_count(&self) -> usize {
        self.live
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len() && self.alive[id.index()]
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        if self.contains(id) {
            Ok(&self.nodes[id.index()])
        } else {
            Err(GraphError::NodeNotFound(id))
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        if self.contains(id) {
            Ok(&mut self.nodes[id.index()])
        } else {
            Err(GraphError::NodeNotFound(id))
        }
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len())
            .map(|index| NodeId(index as u32))
            .filter(|id| self.alive[id.index()])
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.ins[id.index()].len()
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.outs[id.index()].len()
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.ins[id.index()]
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        &self.outs[id.index()]
    }

    /// Live nodes with no incoming edges, filtered by kind.
    pub fn input_nodes(&self, filter: NodeFilter) -> Vec<NodeId> {
        self.node_ids()
            .filter(|&id| self.in_degree(id) == 0 && filter.admits(self.nodes[id.index()].kind))
            .collect()
    }

    /// Live nodes with no outgoing edges.
    pub fn output_nodes(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|&id| self.out_degree(id) == 0)
            .collect()
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        if !self.contains(id) {
            return Err(GraphError::NodeNotFound(id));
        }
        let preds = std::mem::take(&mut self.ins[id.index()]);
        let succs = std::mem::take(&mut self.outs[id.index()]);
        for pred in preds {
            self.outs[pred.index()].retain(|&out| out != id);
        }
        for succ in succs {
            self.ins[succ.index()].retain(|&inn| inn != id);
        }
        self.alive[id.index()] = false;
        self.live -= 1;
        Ok(())
    }

    /// Removes a node, reconnecting every predecessor to every successor.
    pub fn remove_node_maintain_connections(&mut self, id: NodeId) -> Result<(), GraphError> {
        if !self.contains(id) {
            return Err(GraphError::NodeNotFound(id));
        }
        let preds = self.ins[id.index()].clone();
        let succs = self.outs[id.index()].clone();
        self.remove_node(id)?;
        for &pred in &preds {
            for &succ in &succs {
                self.add_edge(pred, succ);
            }
        }
        Ok(())
    }

    /// Op-only view: data nodes dropped, op→op connections preserved.
    pub fn instruction_graph(&self) -> Self {
        self.reduced(|kind| kind != NodeKind::Operation)
    }

    /// Data-only view: op nodes dropped, data→data connections preserved.
    pub fn data_graph(&self) -> Self {
        self.reduced(|kind| kind == NodeKind::Operation)
    }

    fn reduced(&self, drop: impl Fn(NodeKind) -> bool) -> Self {
        let mut graph = self.clone();
        let doomed: Vec<NodeId> = graph
            .node_ids()
            .filter(|&id| drop(graph.nodes[id.index()].kind))
            .collect();
        for id in doomed {
            graph
                .remove_node_maintain_connections(id)
                .expect("node listed as live");
        }
        graph
    }

    /// Topological peel: repeatedly extracts the in-degree-0 node set as one
    /// layer until the graph is consumed.
    pub fn input_layers(&self) -> Vec<Vec<NodeId>> {
        let mut consumable = self.clone();
        let mut layers = Vec::new();
        while consumable.node_count() > 0 {
            let layer = consumable.input_nodes(NodeFilter::all());
            if layer.is_empty() {
                break;
            }
            for &id in &layer {
                consumable.remove_node(id).expect("layer node is live");
            }
            layers.push(layer);
        }
        layers
    }

    /// Induced subgraph of everything reachable from `start` following
    /// in-edges (`ancestors`) and/or out-edges (`dependents`).
    pub fn dependency_subgraph(
        &self,
        start: NodeId,
        ancestors: bool,
        dependents: bool,
    ) -> Result<Self, GraphError> {
        if !self.contains(start) {
            return Err(GraphError::NodeNotFound(start));
        }
        let mut visited = vec![false; self.nodes.len()];
        visited[start.index()] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            let visit = |next: NodeId, visited: &mut Vec<bool>, queue: &mut VecDeque<NodeId>| {
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    queue.push_back(next);
                }
            };
            if ancestors {
                for &pred in self.predecessors(id) {
                    visit(pred, &mut visited, &mut queue);
                }
            }
            if dependents {
                for &succ in self.successors(id) {
                    visit(succ, &mut visited, &mut queue);
                }
            }
        }

        let mut graph = self.clone();
        let doomed: Vec<NodeId> = graph
            .node_ids()
            .filter(|id| !visited[id.index()])
            .collect();
        for id in doomed {
            graph.remove_node(id).expect("node listed as live");
        }
        Ok(graph)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DotExportOptions {
    pub show_ids: bool,
}

/// Writes the graph as GraphViz dot: operations as boxes, data nodes as
/// ellipses, boundary nodes tinted like the input/output coloring of the
/// rendered dependency plots.
pub fn export_dot(
    graph: &DependencyGraph,
    out: &mut impl io::Write,
    options: DotExportOptions,
) -> io::Result<()> {
    writeln!(out, "digraph dependencies {{")?;
    for id in graph.node_ids() {
        let node = graph.node(id).expect("listed node is live");
        let mut label = node.label().to_string();
        if options.show_ids {
            label = format!("{label} [{}]", id.as_u32());
        }
        let fill = if graph.in_degree(id) == 0 {
            "skyblue3"
        } else if graph.out_degree(id) == 0 {
            "seagreen1"
        } else {
            "white"
        };
        let shape = match node.kind() {
            NodeKind::Operation => "box",
            NodeKind::RegisterAddress | NodeKind::Immediate => "ellipse",
        };
        writeln!(
            out,
            "  n{} [label=\"{label}\", shape={shape}, style=filled, fillcolor=\"{fill}\"];",
            id.as_u32()
        )?;
    }
    for id in graph.node_ids() {
        for succ in graph.successors(id) {
            writeln!(out, "  n{} -> n{};", id.as_u32(), succ.as_u32())?;
        }
    }
    writeln!(out, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pisa_isa::{Instruction, Operand};

    fn reg(name: &str) -> Operand {
        Operand::register(name)
    }

    fn diamond() -> Vec<Instruction> {
        vec![
            Instruction::add(13, reg("c"), reg("a"), reg("b"), 0),
            Instruction::add(13, reg("d"), reg("a"), reg("b"), 0),
            Instruction::mul(13, reg("e"), reg("c"), reg("d"), 0),
        ]
    }

    #[test]
    fn builds_combined_graph() {
        let graph = DependencyGraph::from_instructions(&diamond());
        // 3 ops, 2 shared input leaves, 3 fresh outputs.
        assert_eq!(graph.node_count(), 8);
        assert_eq!(graph.input_nodes(NodeFilter::all()).len(), 2);
        assert_eq!(graph.output_nodes().len(), 1);
    }

    #[test]
    fn rewrites_create_fresh_data_nodes() {
        let program = vec![
            Instruction::add(13, reg("c"), reg("a"), reg("b"), 0),
            Instruction::add(13, reg("c"), reg("a"), reg("b"), 0),
            Instruction::mul(13, reg("d"), reg("c"), reg("a"), 0),
        ];
        let graph = DependencyGraph::from_instructions(&program);
        // Two distinct `c` nodes; the read targets the second one.
        let c_nodes: Vec<NodeId> = graph
            .node_ids()
            .filter(|&id| graph.node(id).unwrap().label() == "c")
            .collect();
        assert_eq!(c_nodes.len(), 2);
        let read = c_nodes
            .iter()
            .copied()
            .find(|&id| graph.out_degree(id) > 0)
            .expect("one c node feeds the mul");
        assert_eq!(read, *c_nodes.iter().max().unwrap());
    }

    #[test]
    fn immediates_become_immediate_nodes() {
        let program = vec![Instruction::muli(13, reg("d"), reg("a"), reg("i0"), 0)];
        let graph = DependencyGraph::from_instructions(&program);
        let kinds: Vec<NodeKind> = graph
            .node_ids()
            .map(|id| graph.node(id).unwrap().kind())
            .collect();
        assert!(kinds.contains(&NodeKind::Immediate));
    }

    #[test]
    fn instruction_graph_layers_match_dependencies() {
        let graph = DependencyGraph::from_instructions(&diamond()).instruction_graph();
        assert_eq!(graph.node_count(), 3);
        let layers = graph.input_layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].len(), 2);
        assert_eq!(layers[1].len(), 1);
    }

    #[test]
    fn layer_peel_respects_anti_dependencies() {
        let program = vec![
            Instruction::add(13, reg("c"), reg("a"), reg("b"), 0),
            Instruction::mac(13, reg("c"), reg("a"), reg("b"), 0),
        ];
        let graph = DependencyGraph::from_instructions(&program).instruction_graph();
        let layers = graph.input_layers();
        assert_eq!(layers.len(), 2, "mac reads the add's output");
    }

    #[test]
    fn remove_maintain_connections_bridges_edges() {
        let mut graph = DependencyGraph::from_instructions(&diamond());
        let op = graph
            .node_ids()
            .find(|&id| graph.node(id).unwrap().label().starts_with("mul"))
            .expect("mul node");
        let preds = graph.predecessors(op).to_vec();
        let succs = graph.successors(op).to_vec();
        graph.remove_node_maintain_connections(op).expect("remove");
        for &pred in &preds {
            for &succ in &succs {
                assert!(graph.successors(pred).contains(&succ));
            }
        }
    }

    #[test]
    fn dependency_subgraph_traces_dependents() {
        let graph = DependencyGraph::from_instructions(&diamond());
        let a = graph
            .node_ids()
            .find(|&id| graph.node(id).unwrap().label() == "a")
            .expect("input a");
        let downstream = graph
            .dependency_subgraph(a, false, true)
            .expect("subgraph from a");
        // a itself, two adds, c, d, mul, e.
        assert_eq!(downstream.node_count(), 7);
        let upstream = graph.dependency_subgraph(a, true, false).expect("ancestors");
        assert_eq!(upstream.node_count(), 1);
    }

    #[test]
    fn dot_export_lists_nodes_and_edges() {
        let graph = DependencyGraph::from_instructions(&diamond());
        let mut out = Vec::new();
        export_dot(&graph, &mut out, DotExportOptions::default()).expect("export");
        let text = String::from_utf8(out).expect("utf8 dot");
        assert!(text.starts_with("digraph dependencies {"));
        assert!(text.contains("shape=box"));
        assert!(text.contains("label=\"a\""));
        assert!(text.contains("->"));
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn missing_node_is_an_error() {
        let mut graph = DependencyGraph::from_instructions(&diamond());
        let id = graph.node_ids().next().unwrap();
        graph.remove_node(id).expect("first removal succeeds");
        assert!(matches!(
            graph.remove_node(id),
            Err(GraphError::NodeNotFound(_))
        ));
    }
}
