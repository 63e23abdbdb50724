//! Input-to-output connectivity of a single multiplexer.
//!
//! A multiplexer is modelled as a directed graph where data flows from input nodes, possibly through internal
//! fan-in nodes, to output nodes. Every edge is a switch controlled by one configuration (memory) bit, either
//! directly or through its complement.
//!
//! Multi-level multiplexers are never emitted as a whole. They are split into branch graphs: one-level,
//! single-output graphs that each describe one physical selection stage and can be shared between every
//! multiplexer that uses a stage of the same shape.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use petgraph::{prelude::*, visit::{EdgeRef, NodeIndexable, Topo}};
use serde::{Deserialize, Serialize};

use crate::error::{MuxGenError, Result};

/// A configuration bit of a multiplexer, numbered from zero.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MemId(pub usize);

impl MemId {
    /// Position of the bit in the configuration port.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A multiplexer graph node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MuxNode {
    /// A data input, numbered in creation order.
    Input(usize),
    /// A fan-in node between two selection stages.
    Internal,
    /// A data output, numbered in creation order.
    Output(usize),
}

/// The switch on an edge: which bit controls it and whether it conducts on the complement of that bit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MuxEdge {
    /// Controlling bit.
    pub mem: MemId,
    /// Conducts when the bit is 0.
    pub inverted: bool,
}

/// Connectivity of one multiplexer: data inputs, fan-in nodes and outputs joined by switch edges.
///
/// Every edge refers to an allocated configuration bit and no two edges join the same pair of nodes. Graphs
/// built through [`Self::add_edge`] hold this by construction; deserialized graphs are checked on load.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "MuxGraphData")]
pub struct MuxGraph {
    graph: StableGraph<MuxNode, MuxEdge, Directed>,
    num_inputs: usize,
    num_outputs: usize,
    num_mems: usize,
}

/// Unchecked serialized form of a [`MuxGraph`].
#[derive(Deserialize)]
struct MuxGraphData {
    graph: StableGraph<MuxNode, MuxEdge, Directed>,
    num_inputs: usize,
    num_outputs: usize,
    num_mems: usize,
}

impl TryFrom<MuxGraphData> for MuxGraph {
    type Error = MuxGenError;

    fn try_from(data: MuxGraphData) -> Result<Self> {
        let graph = Self {
            graph: data.graph,
            num_inputs: data.num_inputs,
            num_outputs: data.num_outputs,
            num_mems: data.num_mems,
        };
        graph.validate()?;
        Ok(graph)
    }
}

impl MuxGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-stage `size`:1 multiplexer with one configuration bit per input.
    #[must_use]
    pub fn one_level(size: usize) -> Self {
        let mut graph = Self::new();
        let inputs = (0..size).map(|_| graph.add_input()).collect::<Vec<_>>();
        let output = graph.add_output();
        let mems = (0..size).map(|_| graph.add_mem()).collect::<Vec<_>>();
        graph.add_stage(&inputs, output, &mems);
        graph
    }

    /// A tree of 2:1 stages. All stages of one level share a single bit, the second input of each stage
    /// conducts on its complement.
    #[must_use]
    pub fn tree(size: usize) -> Self {
        Self::build_levels(size, 2)
    }

    /// A multiplexer with at most `levels` selection stages, each as narrow as possible.
    #[must_use]
    pub fn multi_level(size: usize, levels: usize) -> Self {
        Self::build_levels(size, branch_width(size, levels.max(1)))
    }

    fn build_levels(size: usize, width: usize) -> Self {
        let mut graph = Self::new();
        let mut frontier = (0..size).map(|_| graph.add_input()).collect::<Vec<_>>();

        loop {
            let last = frontier.len() <= width;
            let bits = if width == 2 { 1 } else { frontier.len().min(width) };
            let mems = (0..bits).map(|_| graph.add_mem()).collect::<Vec<_>>();

            let mut next = Vec::with_capacity(frontier.len() / width + 1);
            for chunk in frontier.chunks(width) {
                // A lone leftover is not worth a stage; it joins the next level as is.
                if chunk.len() == 1 && !last {
                    next.push(chunk[0]);
                    continue;
                }

                let sink = if last { graph.add_output() } else { graph.add_internal() };
                graph.add_stage(chunk, sink, &mems);
                next.push(sink);
            }

            if last {
                break;
            }
            frontier = next;
        }

        graph
    }

    fn add_stage(&mut self, sources: &[NodeIndex], sink: NodeIndex, mems: &[MemId]) {
        for (position, &source) in sources.iter().enumerate() {
            if let [mem] = mems {
                self.connect(source, sink, *mem, position % 2 == 1);
            } else {
                self.connect(source, sink, mems[position], false);
            }
        }
    }

    /// Add a data input numbered after the existing ones.
    pub fn add_input(&mut self) -> NodeIndex {
        let node = self.graph.add_node(MuxNode::Input(self.num_inputs));
        self.num_inputs += 1;
        node
    }

    /// Add a fan-in node between two stages.
    pub fn add_internal(&mut self) -> NodeIndex {
        self.graph.add_node(MuxNode::Internal)
    }

    /// Add a data output numbered after the existing ones.
    pub fn add_output(&mut self) -> NodeIndex {
        let node = self.graph.add_node(MuxNode::Output(self.num_outputs));
        self.num_outputs += 1;
        node
    }

    /// Allocate the next configuration bit.
    pub fn add_mem(&mut self) -> MemId {
        let mem = MemId(self.num_mems);
        self.num_mems += 1;
        mem
    }

    /// Connect `from` to `to` through a switch controlled by `mem`.
    ///
    /// # Errors
    ///
    /// Fails if the two nodes are already connected or if `mem` was not allocated with [`Self::add_mem`].
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, mem: MemId, inverted: bool) -> Result<EdgeIndex> {
        if mem.index() >= self.num_mems {
            return Err(MuxGenError::UnknownMemory { mem: mem.index(), available: self.num_mems });
        }
        if self.graph.find_edge(from, to).is_some() {
            return Err(MuxGenError::DuplicateEdge { from: from.index(), to: to.index() });
        }
        Ok(self.connect(from, to, mem, inverted))
    }

    fn connect(&mut self, from: NodeIndex, to: NodeIndex, mem: MemId, inverted: bool) -> EdgeIndex {
        self.graph.add_edge(from, to, MuxEdge { mem, inverted })
    }

    /// Check the invariants [`Self::add_edge`] and the node constructors maintain.
    ///
    /// # Errors
    ///
    /// Fails if an edge refers to an unallocated bit, if two edges join the same nodes, or if the input or
    /// output nodes are not numbered `0..n` for the declared counts.
    pub fn validate(&self) -> Result<()> {
        let mut connected = HashSet::new();
        for (from, to, edge) in self.edge_list() {
            if edge.mem.index() >= self.num_mems {
                return Err(MuxGenError::UnknownMemory { mem: edge.mem.index(), available: self.num_mems });
            }
            if !connected.insert((from, to)) {
                return Err(MuxGenError::DuplicateEdge { from, to });
            }
        }

        let input_ids = self.graph.node_indices().filter_map(|node| self.input_id(node));
        check_numbering("input", input_ids, self.num_inputs)?;

        let output_ids = self.graph.node_indices().filter_map(|node| self.output_id(node));
        check_numbering("output", output_ids, self.num_outputs)
    }

    /// Input nodes in input-id order.
    pub fn inputs(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices().filter(move |node| matches!(self.graph[*node], MuxNode::Input(_)))
    }

    /// Output nodes in output-id order.
    pub fn outputs(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices().filter(move |node| matches!(self.graph[*node], MuxNode::Output(_)))
    }

    /// Input nodes paired with their ids.
    pub fn inputs_by_id(&self) -> impl Iterator<Item = (usize, NodeIndex)> + '_ {
        self.inputs().filter_map(move |node| Some((self.input_id(node)?, node)))
    }

    /// Output nodes paired with their ids.
    pub fn outputs_by_id(&self) -> impl Iterator<Item = (usize, NodeIndex)> + '_ {
        self.outputs().filter_map(move |node| Some((self.output_id(node)?, node)))
    }

    /// Id of an input node, `None` for other nodes.
    #[must_use]
    pub fn input_id(&self, node: NodeIndex) -> Option<usize> {
        match self.graph.node_weight(node)? {
            MuxNode::Input(id) => Some(*id),
            _ => None,
        }
    }

    /// Id of an output node, `None` for other nodes.
    #[must_use]
    pub fn output_id(&self, node: NodeIndex) -> Option<usize> {
        match self.graph.node_weight(node)? {
            MuxNode::Output(id) => Some(*id),
            _ => None,
        }
    }

    /// Number of data inputs.
    #[must_use]
    pub const fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Number of data outputs.
    #[must_use]
    pub const fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Number of configuration bits.
    #[must_use]
    pub const fn num_memory_bits(&self) -> usize {
        self.num_mems
    }

    /// Number of switches.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// The edge from `input` to `output`, if any. There is never more than one.
    #[must_use]
    pub fn find_edges(&self, input: NodeIndex, output: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(input, output)
    }

    /// Bit controlling `edge`.
    #[must_use]
    pub fn edge_mem(&self, edge: EdgeIndex) -> MemId {
        self.graph[edge].mem
    }

    /// Whether `edge` conducts on the complement of its bit.
    #[must_use]
    pub fn edge_uses_inverted_mem(&self, edge: EdgeIndex) -> bool {
        self.graph[edge].inverted
    }

    /// Length of the longest input-to-output path.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        let mut depth = vec![0; self.graph.node_bound()];
        let mut levels = 0;

        let mut topo = Topo::new(&self.graph);
        while let Some(node) = topo.next(&self.graph) {
            let node_depth = self
                .graph
                .neighbors_directed(node, Incoming)
                .map(|source| depth[source.index()] + 1)
                .max()
                .unwrap_or(0);
            depth[node.index()] = node_depth;

            if let MuxNode::Output(_) = self.graph[node] {
                levels = levels.max(node_depth);
            }
        }

        levels
    }

    /// Split the graph into one branch graph per distinct stage fan-in, leaves before root.
    ///
    /// A graph with a single level is its own and only branch.
    #[must_use]
    pub fn decompose(&self) -> Vec<Self> {
        if self.num_levels() == 1 {
            return vec![self.clone()];
        }

        let mut fan_ins_done = HashSet::new();
        let mut branches = Vec::new();

        let mut topo = Topo::new(&self.graph);
        while let Some(node) = topo.next(&self.graph) {
            if let MuxNode::Input(_) = self.graph[node] {
                continue;
            }

            let fan_in = self.graph.edges_directed(node, Incoming).count();
            if !fan_ins_done.insert(fan_in) {
                continue;
            }

            branches.push(self.branch_graph(node));
        }

        branches
    }

    /// The stage feeding `root` as a standalone one-level graph. Bits are renumbered in first-use order so
    /// that stages sharing a bit keep sharing it.
    fn branch_graph(&self, root: NodeIndex) -> Self {
        let weights = self
            .graph
            .edges_directed(root, Incoming)
            .sorted_by_key(|edge| edge.id())
            .map(|edge| *edge.weight())
            .collect::<Vec<_>>();

        let mut branch = Self::new();
        let inputs = weights.iter().map(|_| branch.add_input()).collect::<Vec<_>>();
        let output = branch.add_output();
        let mut mems = HashMap::new();

        for (input, weight) in inputs.into_iter().zip(weights) {
            let mem = match mems.get(&weight.mem) {
                Some(mem) => *mem,
                None => {
                    let mem = branch.add_mem();
                    mems.insert(weight.mem, mem);
                    mem
                }
            };
            branch.connect(input, output, mem, weight.inverted);
        }

        branch
    }

    fn edge_list(&self) -> impl Iterator<Item = (usize, usize, MuxEdge)> + '_ {
        self.graph.edge_indices().filter_map(move |edge| {
            let (source, target) = self.graph.edge_endpoints(edge)?;
            Some((source.index(), target.index(), self.graph[edge]))
        })
    }
}

impl PartialEq for MuxGraph {
    fn eq(&self, other: &Self) -> bool {
        self.num_mems == other.num_mems
            && self.graph.node_indices().map(|node| self.graph[node]).eq(other.graph.node_indices().map(|node| other.graph[node]))
            && self.edge_list().eq(other.edge_list())
    }
}

impl Eq for MuxGraph {}

fn check_numbering(kind: &'static str, ids: impl Iterator<Item = usize>, declared: usize) -> Result<()> {
    let ids = ids.sorted().collect::<Vec<_>>();
    if ids.iter().copied().eq(0..declared) {
        Ok(())
    } else {
        Err(MuxGenError::NodeNumbering { kind, declared })
    }
}

/// Smallest stage width `k` such that `levels` stages of `k`:1 cover `size` inputs.
fn branch_width(size: usize, levels: usize) -> usize {
    let span = |width: usize| (0..levels).try_fold(1_usize, |acc, _| acc.checked_mul(width));

    let mut width = 2;
    while span(width).map_or(false, |span| span < size) {
        width += 1;
    }
    width
}

#[cfg(test)]
mod tests {
    use super::{branch_width, MemId, MuxEdge, MuxGraph};
    use crate::error::MuxGenError;

    #[test]
    fn one_level_decomposes_to_itself() {
        let graph = MuxGraph::one_level(4);

        assert_eq!(graph.num_levels(), 1);
        assert_eq!(graph.num_memory_bits(), 4);
        assert_eq!(graph.decompose(), vec![graph.clone()]);
    }

    #[test]
    fn tree_of_eight() {
        let graph = MuxGraph::tree(8);

        assert_eq!(graph.num_inputs(), 8);
        assert_eq!(graph.num_outputs(), 1);
        assert_eq!(graph.num_levels(), 3);
        assert_eq!(graph.num_memory_bits(), 3);

        let branches = graph.decompose();
        assert_eq!(branches.len(), 1);

        let branch = &branches[0];
        assert_eq!(branch.num_inputs(), 2);
        assert_eq!(branch.num_memory_bits(), 1);
        assert_eq!(branch.num_levels(), 1);

        let output = branch.outputs().next().unwrap();
        let polarity = branch
            .inputs()
            .map(|input| {
                let edge = branch.find_edges(input, output).unwrap();
                (branch.edge_mem(edge), branch.edge_uses_inverted_mem(edge))
            })
            .collect::<Vec<_>>();
        assert_eq!(polarity, vec![(MemId(0), false), (MemId(0), true)]);
    }

    #[test]
    fn tree_with_leftover_input() {
        let graph = MuxGraph::tree(5);

        assert_eq!(graph.num_levels(), 3);
        assert_eq!(graph.num_memory_bits(), 3);
        assert_eq!(graph.num_edges(), 8);
    }

    #[test]
    fn multi_level_branches_come_leaves_first() {
        let graph = MuxGraph::multi_level(6, 2);
        assert_eq!(graph.num_levels(), 2);

        let sizes = graph.decompose().iter().map(MuxGraph::num_inputs).collect::<Vec<_>>();
        assert_eq!(sizes, vec![3, 2]);
    }

    #[test]
    fn multi_level_one_hot_branch() {
        let graph = MuxGraph::multi_level(16, 2);
        assert_eq!(graph.num_memory_bits(), 8);

        let branches = graph.decompose();
        assert_eq!(branches, vec![MuxGraph::one_level(4)]);
    }

    #[test]
    fn hand_built_two_levels() {
        let mut graph = MuxGraph::new();
        let in0 = graph.add_input();
        let in1 = graph.add_input();
        let in2 = graph.add_input();
        let mid = graph.add_internal();
        let out = graph.add_output();
        let mem0 = graph.add_mem();
        let mem1 = graph.add_mem();

        graph.add_edge(in0, mid, mem0, false).unwrap();
        graph.add_edge(in1, mid, mem0, true).unwrap();
        graph.add_edge(mid, out, mem1, false).unwrap();
        graph.add_edge(in2, out, mem1, true).unwrap();

        assert_eq!(graph.num_levels(), 2);
        assert!(graph.find_edges(in0, out).is_none());
        assert_eq!(graph.input_id(in2), Some(2));
        assert_eq!(graph.output_id(out), Some(0));
        assert_eq!(graph.input_id(mid), None);

        // Both stages are 2:1, so only one branch survives.
        assert_eq!(graph.decompose(), vec![MuxGraph::tree(2)]);
    }

    #[test]
    fn duplicate_edge_is_rejected() {
        let mut graph = MuxGraph::new();
        let input = graph.add_input();
        let output = graph.add_output();
        let mem = graph.add_mem();

        graph.add_edge(input, output, mem, false).unwrap();
        assert!(matches!(
            graph.add_edge(input, output, mem, true),
            Err(MuxGenError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn unknown_memory_is_rejected() {
        let mut graph = MuxGraph::new();
        let input = graph.add_input();
        let output = graph.add_output();

        assert!(matches!(
            graph.add_edge(input, output, MemId(0), false),
            Err(MuxGenError::UnknownMemory { mem: 0, available: 0 })
        ));
    }

    #[test]
    fn widths() {
        assert_eq!(branch_width(16, 2), 4);
        assert_eq!(branch_width(17, 2), 5);
        assert_eq!(branch_width(8, 3), 2);
        assert_eq!(branch_width(2, 1), 2);
    }

    #[test]
    fn stored_graph_loads_back() {
        let graph = MuxGraph::tree(4);
        let text = toml::to_string(&graph).unwrap();

        assert_eq!(toml::from_str::<MuxGraph>(&text).unwrap(), graph);
    }

    #[test]
    fn tampered_memory_count_is_rejected_on_load() {
        let text = toml::to_string(&MuxGraph::one_level(2)).unwrap();
        assert!(text.contains("num_mems = 2"));

        let error = toml::from_str::<MuxGraph>(&text.replace("num_mems = 2", "num_mems = 1")).unwrap_err();
        assert!(error.to_string().contains("edge refers to bit 1"), "{}", error);
    }

    #[test]
    fn tampered_node_count_is_rejected_on_load() {
        let text = toml::to_string(&MuxGraph::one_level(2)).unwrap();
        assert!(text.contains("num_inputs = 2"));

        let error = toml::from_str::<MuxGraph>(&text.replace("num_inputs = 2", "num_inputs = 3")).unwrap_err();
        assert!(error.to_string().contains("not numbered 0..3"), "{}", error);
    }

    #[test]
    fn validate_catches_parallel_edges() {
        let mut graph = MuxGraph::one_level(2);
        assert!(graph.validate().is_ok());

        let input = graph.inputs().next().unwrap();
        let output = graph.outputs().next().unwrap();
        graph.graph.add_edge(input, output, MuxEdge { mem: MemId(1), inverted: true });

        assert!(matches!(graph.validate(), Err(MuxGenError::DuplicateEdge { .. })));
    }
}
