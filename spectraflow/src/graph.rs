use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use crate::error::{EngineError, Result};
use crate::node::{Node, port_kind};
use crate::types::Value;

/// A typed edge between two named ports.  Several edges may share the same
/// `(src, dst)` pair; the dependency between the pair survives until the
/// last of them is removed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Edge {
    src: usize,
    src_port: String,
    dst: usize,
    dst_port: String,
}

struct Slot {
    node: Box<dyn Node>,
    upstreams: Vec<usize>,
    downstreams: Vec<usize>,
}

/// Owns the nodes and edges and co-ordinates execution: topological order
/// with insertion-order tie-break, dirty-bit propagation and per-node
/// memoized outputs.  Nodes are addressed externally by unique name and
/// held internally in an index-stable store.
#[derive(Default)]
pub struct Graph {
    slots: Vec<Slot>,
    names: HashMap<String, usize>,
    edges: Vec<Edge>,
    stale: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            names: HashMap::new(),
            edges: Vec::new(),
            stale: false,
        }
    }

    /// Registers a node, returning its index in the store.
    pub fn add_node(&mut self, node: Box<dyn Node>) -> Result<usize> {
        let name = node.name().to_string();
        if self.names.contains_key(&name) {
            return Err(EngineError::DuplicateName(name));
        }
        let index = self.slots.len();
        self.names.insert(name, index);
        self.slots.push(Slot {
            node,
            upstreams: Vec::new(),
            downstreams: Vec::new(),
        });
        self.stale = true;
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))
    }

    pub fn node(&self, name: &str) -> Result<&dyn Node> {
        Ok(self.slots[self.index_of(name)?].node.as_ref())
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Result<&mut Box<dyn Node>> {
        let index = self.index_of(name)?;
        Ok(&mut self.slots[index].node)
    }

    /// The names of the upstream nodes the named node depends on.
    pub fn dependencies(&self, name: &str) -> Result<Vec<&str>> {
        let index = self.index_of(name)?;
        Ok(self.slots[index]
            .upstreams
            .iter()
            .map(|&up| self.slots[up].node.name())
            .collect())
    }

    /// Wires `src.src_port` into `dst.dst_port`.  The destination port must
    /// be free, the kinds must agree and the new dependency must not close
    /// a loop; the check happens before the edge is recorded.
    pub fn connect(&mut self, src: &str, src_port: &str, dst: &str, dst_port: &str) -> Result<()> {
        let src_ix = self.index_of(src)?;
        let dst_ix = self.index_of(dst)?;
        let src_kind = port_kind(self.slots[src_ix].node.output_ports(), src_port)
            .ok_or_else(|| EngineError::validation(src, format!("unknown output port {src_port}")))?;
        let dst_kind = port_kind(self.slots[dst_ix].node.input_ports(), dst_port)
            .ok_or_else(|| EngineError::validation(dst, format!("unknown input port {dst_port}")))?;
        if src_kind != dst_kind {
            return Err(EngineError::validation(
                dst,
                format!("cannot connect {src}.{src_port} ({src_kind}) to {dst}.{dst_port} ({dst_kind})"),
            ));
        }
        if self.edges.iter().any(|e| e.dst == dst_ix && e.dst_port == dst_port) {
            return Err(EngineError::PortOccupied {
                node: dst.to_string(),
                port: dst_port.to_string(),
            });
        }
        if src_ix == dst_ix || self.reaches(dst_ix, src_ix) {
            return Err(EngineError::CycleIntroduced {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        self.edges.push(Edge {
            src: src_ix,
            src_port: src_port.to_string(),
            dst: dst_ix,
            dst_port: dst_port.to_string(),
        });
        if !self.slots[dst_ix].upstreams.contains(&src_ix) {
            self.slots[dst_ix].upstreams.push(src_ix);
            self.slots[src_ix].downstreams.push(dst_ix);
        }
        self.mark_subtree_dirty(dst_ix);
        self.stale = true;
        Ok(())
    }

    /// Removes a single edge.  The dependency between the pair is dropped
    /// only when no other edge between them remains; downstream nodes are
    /// marked dirty either way.
    pub fn remove_connection(&mut self, src: &str, src_port: &str, dst: &str, dst_port: &str) -> Result<()> {
        let src_ix = self.index_of(src)?;
        let dst_ix = self.index_of(dst)?;
        let position = self
            .edges
            .iter()
            .position(|e| {
                e.src == src_ix && e.src_port == src_port && e.dst == dst_ix && e.dst_port == dst_port
            })
            .ok_or_else(|| {
                EngineError::validation(dst, format!("no connection {src}.{src_port} -> {dst}.{dst_port}"))
            })?;
        self.edges.remove(position);
        if !self.edges.iter().any(|e| e.src == src_ix && e.dst == dst_ix) {
            self.slots[dst_ix].upstreams.retain(|&up| up != src_ix);
            self.slots[src_ix].downstreams.retain(|&down| down != dst_ix);
        }
        self.mark_subtree_dirty(dst_ix);
        self.stale = true;
        Ok(())
    }

    /// Sets a parameter on the named node and transitively dirties every
    /// descendant before the next execute.
    pub fn set_parameter(&mut self, node: &str, name: &str, value: Value) -> Result<()> {
        let index = self.index_of(node)?;
        self.slots[index].node.set_parameter(name, value)?;
        self.mark_subtree_dirty(index);
        self.stale = true;
        Ok(())
    }

    /// Feeds an input port directly, dirtying the node and its descendants.
    /// Ports fed by an edge are overwritten on the next execute.
    pub fn set_input(&mut self, node: &str, name: &str, value: Value) -> Result<()> {
        let index = self.index_of(node)?;
        self.slots[index].node.set_input(name, value)?;
        self.mark_subtree_dirty(index);
        self.stale = true;
        Ok(())
    }

    /// True when any node needs re-execution.
    pub fn is_dirty(&self) -> bool {
        self.stale || self.slots.iter().any(|slot| slot.node.is_dirty())
    }

    /// Drops every node's outputs; the next execute recomputes the graph.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.node.reset();
        }
        self.stale = true;
    }

    fn mark_subtree_dirty(&mut self, index: usize) {
        let mut seen = vec![false; self.slots.len()];
        let mut stack = vec![index];
        while let Some(ix) = stack.pop() {
            if seen[ix] {
                continue;
            }
            seen[ix] = true;
            self.slots[ix].node.core_mut().touch();
            stack.extend(self.slots[ix].downstreams.iter().copied());
        }
    }

    /// Can `to` be reached from `from` by walking downstream?
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut seen = vec![false; self.slots.len()];
        let mut stack = vec![from];
        while let Some(ix) = stack.pop() {
            if ix == to {
                return true;
            }
            if seen[ix] {
                continue;
            }
            seen[ix] = true;
            stack.extend(self.slots[ix].downstreams.iter().copied());
        }
        false
    }

    /// Kahn's algorithm over the dependency set.  Zero-indegree nodes are
    /// emitted in insertion order; any remainder means a cycle.
    fn topological_order(&self) -> Result<Vec<usize>> {
        let count = self.slots.len();
        let mut indegree: Vec<usize> = self.slots.iter().map(|slot| slot.upstreams.len()).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
            .filter(|&ix| indegree[ix] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(count);
        while let Some(Reverse(ix)) = ready.pop() {
            order.push(ix);
            for &down in &self.slots[ix].downstreams {
                indegree[down] -= 1;
                if indegree[down] == 0 {
                    ready.push(Reverse(down));
                }
            }
        }
        if order.len() != count {
            return Err(EngineError::CycleDetected);
        }
        Ok(order)
    }

    /// Executes every stale part of the graph in topological order.
    ///
    /// A node's inputs are refreshed along its incoming edges when the node
    /// is about to run or its source ran on this pass; clean nodes with
    /// clean upstreams are skipped entirely and keep their memoized
    /// outputs.  A node failure aborts the pass: earlier nodes keep their
    /// fresh outputs, the rest stay dirty.
    pub fn execute(&mut self) -> Result<()> {
        let order = self.topological_order()?;
        let timer = Instant::now();
        let mut ran = vec![false; self.slots.len()];
        let mut executed = 0usize;
        for &ix in &order {
            let dirty = self.slots[ix].node.is_dirty();
            let refresh: Vec<(usize, String, String)> = self
                .edges
                .iter()
                .filter(|e| e.dst == ix && (dirty || ran[e.src]))
                .map(|e| (e.src, e.src_port.clone(), e.dst_port.clone()))
                .collect();
            for (src, src_port, dst_port) in refresh {
                let value = self.slots[src]
                    .node
                    .core()
                    .output(&src_port)
                    .cloned()
                    .ok_or_else(|| EngineError::missing_output(self.slots[src].node.name(), &src_port))?;
                self.slots[ix].node.set_input(&dst_port, value)?;
            }
            if self.slots[ix].node.is_dirty() {
                self.slots[ix].node.execute()?;
                ran[ix] = true;
                executed += 1;
            }
        }
        self.stale = false;
        debug!("executed {executed}/{} nodes in {:?}", order.len(), timer.elapsed());
        Ok(())
    }

    /// Reads an output port, executing first if anything is stale.
    pub fn get_node_output(&mut self, node: &str, port: &str) -> Result<Value> {
        if self.is_dirty() {
            self.execute()?;
        }
        let index = self.index_of(node)?;
        self.slots[index]
            .node
            .core()
            .output(port)
            .cloned()
            .ok_or_else(|| EngineError::missing_output(node, port))
    }

    /// Emits the graph as a Graphviz DOT string: one box per node tagged
    /// with its dirty state, one edge per connection labelled with the
    /// port pair it carries and the port's kind.  Output is deterministic,
    /// so snapshots diff cleanly.
    pub fn emit_dot(&self) -> String {
        let mut buf = String::new();
        buf.push_str("digraph pipeline {\n");
        buf.push_str("    rankdir=LR;\n");
        buf.push_str("    node [shape=box, fontsize=10];\n");
        buf.push_str("    edge [fontsize=9];\n");
        for (ix, slot) in self.slots.iter().enumerate() {
            let state = if slot.node.is_dirty() { "dirty" } else { "clean" };
            buf.push_str(&format!(
                "    n{ix} [label=\"{}\\n{state}\"];\n",
                dot_escape(slot.node.name())
            ));
        }
        for edge in &self.edges {
            let kind = port_kind(self.slots[edge.src].node.output_ports(), &edge.src_port)
                .map(|kind| format!(" ({kind})"))
                .unwrap_or_default();
            buf.push_str(&format!(
                "    n{} -> n{} [label=\"{}{kind} -> {}\"];\n",
                edge.src,
                edge.dst,
                dot_escape(&edge.src_port),
                dot_escape(&edge.dst_port)
            ));
        }
        buf.push_str("}\n");
        buf
    }
}

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
