//! Compact representation of all traces through a network.
//!
//! Multi-path forwarding makes the number of complete traces exponential in
//! the number of hops, while the decisions taken at each hop are shared by
//! many traces. A [`TraceDag`] stores every decision once, as a node in an
//! arena, and a trace is any path from a root to a leaf. Node ids are
//! indices into the arena.
//!
//! # Example
//!
//! ```
//! use num_bigint::BigUint;
//! use netbdd::trace::{FlowDisposition, Hop};
//! use netbdd::trace_dag::{Node, TraceDag};
//!
//! let leaf = Node::leaf(Hop::new("b", vec![]), None, FlowDisposition::NoRoute, None).unwrap();
//! let root = Node::inner(Hop::new("a", vec![]), None, vec![1]).unwrap();
//! let dag = TraceDag::new(vec![root, leaf], vec![0]).unwrap();
//!
//! assert_eq!(dag.size(), BigUint::from(1u32));
//! let trace = dag.traces().next().unwrap();
//! assert_eq!(trace.trace.hops.len(), 2);
//! ```

use log::debug;
use num_bigint::BigUint;

use crate::error::TraceDagError;
use crate::trace::{FirewallSessionTraceInfo, Flow, FlowDisposition, Hop, Trace, TraceAndReverseFlow};

/// One hop of one or more traces.
///
/// A node either ends its traces (it has a disposition) or continues them
/// (it has successors), never both. Only a successful leaf carries the
/// return flow.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Node {
    hop: Hop,
    firewall_session_info: Option<FirewallSessionTraceInfo>,
    disposition: Option<FlowDisposition>,
    return_flow: Option<Flow>,
    successors: Vec<usize>,
}

impl Node {
    pub fn new(
        hop: Hop,
        firewall_session_info: Option<FirewallSessionTraceInfo>,
        disposition: Option<FlowDisposition>,
        return_flow: Option<Flow>,
        successors: Vec<usize>,
    ) -> Result<Self, TraceDagError> {
        match (disposition, successors.is_empty()) {
            (Some(_), false) => return Err(TraceDagError::DispositionAndSuccessors),
            (None, true) => return Err(TraceDagError::NoDispositionNorSuccessors),
            _ => {}
        }
        match (disposition, &return_flow) {
            (Some(d), None) if d.is_successful() => {
                return Err(TraceDagError::MissingReturnFlow(d.to_string()));
            }
            (Some(d), Some(_)) if !d.is_successful() => return Err(TraceDagError::UnexpectedReturnFlow),
            (None, Some(_)) => return Err(TraceDagError::UnexpectedReturnFlow),
            _ => {}
        }
        Ok(Self {
            hop,
            firewall_session_info,
            disposition,
            return_flow,
            successors,
        })
    }

    /// A node ending its traces with `disposition`.
    pub fn leaf(
        hop: Hop,
        firewall_session_info: Option<FirewallSessionTraceInfo>,
        disposition: FlowDisposition,
        return_flow: Option<Flow>,
    ) -> Result<Self, TraceDagError> {
        Self::new(hop, firewall_session_info, Some(disposition), return_flow, Vec::new())
    }

    /// A node continuing its traces through `successors`.
    pub fn inner(
        hop: Hop,
        firewall_session_info: Option<FirewallSessionTraceInfo>,
        successors: Vec<usize>,
    ) -> Result<Self, TraceDagError> {
        Self::new(hop, firewall_session_info, None, None, successors)
    }

    pub fn hop(&self) -> &Hop {
        &self.hop
    }
    pub fn firewall_session_info(&self) -> Option<&FirewallSessionTraceInfo> {
        self.firewall_session_info.as_ref()
    }
    pub fn disposition(&self) -> Option<FlowDisposition> {
        self.disposition
    }
    pub fn return_flow(&self) -> Option<&Flow> {
        self.return_flow.as_ref()
    }
    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    pub fn is_leaf(&self) -> bool {
        self.successors.is_empty()
    }
}

/// An immutable DAG of [`Node`]s whose root-to-leaf paths are traces.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TraceDag {
    nodes: Vec<Node>,
    roots: Vec<usize>,
}

impl TraceDag {
    /// Creates a DAG, checking that every id is in range and that there
    /// are no cycles.
    pub fn new(nodes: Vec<Node>, roots: Vec<usize>) -> Result<Self, TraceDagError> {
        let len = nodes.len();
        for (node, n) in nodes.iter().enumerate() {
            if let Some(&successor) = n.successors.iter().find(|&&s| s >= len) {
                return Err(TraceDagError::SuccessorOutOfRange { node, successor, len });
            }
        }
        if let Some(&root) = roots.iter().find(|&&r| r >= len) {
            return Err(TraceDagError::RootOutOfRange { root, len });
        }

        let dag = Self { nodes, roots };
        dag.check_acyclic()?;
        debug!(
            "Created trace DAG with {} nodes, {} edges and {} roots",
            dag.count_nodes(),
            dag.count_edges(),
            dag.roots.len()
        );
        Ok(dag)
    }

    fn check_acyclic(&self) -> Result<(), TraceDagError> {
        #[derive(Copy, Clone, Eq, PartialEq)]
        enum Color {
            White,
            Grey,
            Black,
        }

        let mut color = vec![Color::White; self.nodes.len()];
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for start in 0..self.nodes.len() {
            if color[start] != Color::White {
                continue;
            }
            color[start] = Color::Grey;
            stack.push((start, 0));
            while let Some(frame) = stack.last_mut() {
                let (id, next) = *frame;
                match self.nodes[id].successors.get(next) {
                    Some(&child) => {
                        frame.1 += 1;
                        match color[child] {
                            Color::White => {
                                color[child] = Color::Grey;
                                stack.push((child, 0));
                            }
                            Color::Grey => return Err(TraceDagError::Cycle(child)),
                            Color::Black => {}
                        }
                    }
                    None => {
                        color[id] = Color::Black;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn count_edges(&self) -> usize {
        self.nodes.iter().map(|n| n.successors.len()).sum()
    }

    /// Number of traces, that is, of root-to-leaf paths.
    ///
    /// Each node's path count is computed once, so this is linear in the
    /// size of the DAG even when the result is exponential.
    pub fn size(&self) -> BigUint {
        let counts = self.path_counts();
        let total: BigUint = self
            .roots
            .iter()
            .filter_map(|&r| counts[r].as_ref())
            .sum();
        debug!("Trace DAG represents {} traces", total);
        total
    }

    /// Path counts of the nodes reachable from the roots.
    fn path_counts(&self) -> Vec<Option<BigUint>> {
        let mut counts: Vec<Option<BigUint>> = vec![None; self.nodes.len()];
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for &root in &self.roots {
            if counts[root].is_some() {
                continue;
            }
            stack.push((root, 0));
            while let Some(frame) = stack.last_mut() {
                let (id, next) = *frame;
                let successors = &self.nodes[id].successors;
                if let Some(&child) = successors.get(next) {
                    frame.1 += 1;
                    if counts[child].is_none() {
                        stack.push((child, 0));
                    }
                } else {
                    let count = if successors.is_empty() {
                        BigUint::from(1u32)
                    } else {
                        successors.iter().filter_map(|&c| counts[c].as_ref()).sum()
                    };
                    counts[id] = Some(count);
                    stack.pop();
                }
            }
        }
        counts
    }

    /// Iterates over all traces, depth-first from each root in order.
    ///
    /// Traces are reconstructed lazily, holding only the current path.
    /// Every call starts over from the first root.
    pub fn traces(&self) -> Traces<'_> {
        Traces {
            dag: self,
            next_root: 0,
            stack: Vec::new(),
            hops: Vec::new(),
            sessions: Vec::new(),
        }
    }
}

/// Frame on the traversal stack.
#[derive(Debug)]
struct Frame {
    id: usize,
    /// Position of the next successor to explore.
    next: usize,
}

/// Iterator over the traces of a [`TraceDag`].
///
/// Created by [`TraceDag::traces()`].
pub struct Traces<'a> {
    dag: &'a TraceDag,
    next_root: usize,
    stack: Vec<Frame>,
    /// Hops of the nodes on the stack.
    hops: Vec<&'a Hop>,
    /// Sessions installed by the nodes on the stack.
    sessions: Vec<&'a FirewallSessionTraceInfo>,
}

impl<'a> Traces<'a> {
    fn enter(&mut self, id: usize) {
        let dag = self.dag;
        let node = &dag.nodes[id];
        self.stack.push(Frame { id, next: 0 });
        self.hops.push(&node.hop);
        if let Some(session) = &node.firewall_session_info {
            self.sessions.push(session);
        }
    }

    fn leave(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.hops.pop();
            if self.dag.nodes[frame.id].firewall_session_info.is_some() {
                self.sessions.pop();
            }
        }
    }
}

impl Iterator for Traces<'_> {
    type Item = TraceAndReverseFlow;

    fn next(&mut self) -> Option<Self::Item> {
        let dag = self.dag;
        loop {
            let Some(frame) = self.stack.last_mut() else {
                let &root = dag.roots.get(self.next_root)?;
                self.next_root += 1;
                self.enter(root);
                continue;
            };

            let node = &dag.nodes[frame.id];
            if let Some(disposition) = node.disposition {
                let item = TraceAndReverseFlow {
                    trace: Trace {
                        disposition,
                        hops: self.hops.iter().map(|&h| h.clone()).collect(),
                    },
                    reverse_flow: node.return_flow.clone(),
                    new_firewall_sessions: self.sessions.iter().map(|&s| s.clone()).collect(),
                };
                self.leave();
                return Some(item);
            }

            if let Some(&child) = node.successors.get(frame.next) {
                frame.next += 1;
                self.enter(child);
            } else {
                self.leave();
            }
        }
    }
}
