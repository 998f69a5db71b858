//! DAG construction and topological ordering.
//!
//! A [`DagBuilder`] is a cheap handle onto a shared, growing graph. Every
//! `load`/`window`/`map`/`join` call adds exactly one node, records the edges
//! from its input(s) and returns a new handle positioned on that node, so
//! pipelines read top-down:
//!
//! ```
//! use std::time::Duration;
//! use windflow::dag::DagBuilder;
//! use windflow::handler::{GenerateHandler, MergeHandler};
//! use windflow::node::*;
//!
//! let dag = DagBuilder::new();
//! let summed = dag
//!     .load(GenerateHandler::default(), [with_name("events")])
//!     .window([with_name("per-second"), with_fixed_window(Duration::from_secs(1))])
//!     .map(MergeHandler::sum(), [with_name("sum"), with_accumulate()]);
//!
//! let built = dag.build()?;
//! assert_eq!(built.len(), 3);
//! assert_eq!(summed.name(), Some("sum".to_string()));
//! # anyhow::Result::<()>::Ok(())
//! ```
//!
//! [`DagBuilder::build`] runs Kahn's algorithm; duplicate names, dangling
//! inputs and cycles are reported as [`DagError`]s.

use crate::error::DagError;
use crate::handler::Handler;
use crate::node::{DoJoin, DoLoad, DoMap, DoWindow, Node, NodeContext, NodeOption};
use crate::node_id::NodeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{self, Display, Formatter};
use std::hash::Hash;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct DagInner {
    next_id: u64,
    nodes: Vec<(NodeId, Arc<Node>)>,
    edges: Vec<(NodeId, NodeId)>,
    names: HashMap<String, NodeId>,
    problems: Vec<DagError>,
}

/// Fluent, shareable DAG builder positioned on a current node.
#[derive(Clone)]
pub struct DagBuilder {
    inner: Arc<Mutex<DagInner>>,
    scope: String,
    current: Option<(NodeId, Arc<Node>)>,
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::with_scope("")
    }

    /// Named nodes and sources become `"{scope}.{name}"`; unnamed nodes with an
    /// input become `"{input}.{kind}{id}"`.
    pub fn with_scope(scope: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DagInner::default())),
            scope: scope.into(),
            current: None,
        }
    }

    /// The node this handle is positioned on.
    pub fn node(&self) -> Option<&Arc<Node>> {
        self.current.as_ref().map(|(_, n)| n)
    }

    pub fn name(&self) -> Option<String> {
        self.node().map(|n| n.name().to_string())
    }

    pub fn load<H: Handler + 'static>(&self, handler: H, options: impl IntoIterator<Item = NodeOption>) -> Self {
        let on_load: Arc<dyn Handler> = Arc::new(handler);
        self.add("load", options, Vec::new(), |ctx, _| Node::Load(DoLoad { ctx, on_load }))
    }

    pub fn window(&self, options: impl IntoIterator<Item = NodeOption>) -> Self {
        self.add("window", options, self.current.iter().cloned().collect(), |ctx, mut inputs| {
            Node::Window(DoWindow { ctx, input: inputs.remove(0) })
        })
    }

    pub fn map<H: Handler + 'static>(&self, handler: H, options: impl IntoIterator<Item = NodeOption>) -> Self {
        let on_map: Arc<dyn Handler> = Arc::new(handler);
        self.add("map", options, self.current.iter().cloned().collect(), |ctx, mut inputs| {
            Node::Map(DoMap { ctx, on_map, input: inputs.remove(0) })
        })
    }

    /// Merge two streams by forwarding every message of both.
    pub fn join(&self, a: &DagBuilder, b: &DagBuilder, options: impl IntoIterator<Item = NodeOption>) -> Self {
        self.join_all(&[a, b], options)
    }

    pub fn join_all(&self, inputs: &[&DagBuilder], options: impl IntoIterator<Item = NodeOption>) -> Self {
        let inputs: Vec<(NodeId, Arc<Node>)> = inputs.iter().filter_map(|b| b.current.clone()).collect();
        self.add("join", options, inputs, |ctx, inputs| Node::Join(DoJoin { ctx, inputs }))
    }

    fn add<F>(
        &self,
        kind: &str,
        options: impl IntoIterator<Item = NodeOption>,
        inputs: Vec<(NodeId, Arc<Node>)>,
        make: F,
    ) -> Self
    where
        F: FnOnce(NodeContext, Vec<Arc<Node>>) -> Node,
    {
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = NodeId::new(g.next_id);
        g.next_id += 1;

        // Unnamed children nest under their first input, which is already scoped.
        let mut ctx = NodeContext::from_options(options);
        match inputs.first() {
            Some((_, parent)) if ctx.name.is_empty() => {
                ctx.name = format!("{}.{kind}{}", parent.name(), id.raw());
            }
            _ => {
                if ctx.name.is_empty() {
                    ctx.name = format!("{kind}{}", id.raw());
                }
                if !self.scope.is_empty() {
                    ctx.name = format!("{}.{}", self.scope, ctx.name);
                }
            }
        }

        if kind != "load" && inputs.is_empty() {
            g.problems.push(DagError::MissingInput(ctx.name.clone()));
            return self.clone();
        }
        if g.names.contains_key(&ctx.name) {
            g.problems.push(DagError::DuplicateNode(ctx.name.clone()));
        } else {
            g.names.insert(ctx.name.clone(), id);
        }

        for (from, _) in &inputs {
            g.edges.push((*from, id));
        }
        let node = Arc::new(make(ctx, inputs.into_iter().map(|(_, n)| n).collect()));
        g.nodes.push((id, Arc::clone(&node)));

        Self {
            inner: Arc::clone(&self.inner),
            scope: self.scope.clone(),
            current: Some((id, node)),
        }
    }

    /// Linear scan by scoped name; an introspection aid, not get-or-create.
    pub fn get_by_name(&self, name: &str) -> Result<Arc<Node>, DagError> {
        let g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        g.nodes
            .iter()
            .find(|(_, n)| n.name() == name)
            .map(|(_, n)| Arc::clone(n))
            .ok_or_else(|| DagError::NodeNotFound(name.to_string()))
    }

    /// Validate the graph and return its nodes in topological order, sources first.
    pub fn build(&self) -> Result<Dag, DagError> {
        let g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(problem) = g.problems.first() {
            return Err(problem.clone());
        }
        if g.nodes.is_empty() {
            return Err(DagError::EmptyDag);
        }

        let ids: Vec<NodeId> = g.nodes.iter().map(|(id, _)| *id).collect();
        let by_id: HashMap<NodeId, &Arc<Node>> = g.nodes.iter().map(|(id, n)| (*id, n)).collect();
        let order = kahn_sort(&ids, &g.edges).map_err(|e| match e {
            DagError::CycleDetected(who) => {
                let named = ids
                    .iter()
                    .find(|id| id.to_string() == who)
                    .and_then(|id| by_id.get(id))
                    .map(|n| n.name().to_string());
                DagError::CycleDetected(named.unwrap_or(who))
            }
            other => other,
        })?;

        let name_of = |id: &NodeId| by_id.get(id).map(|n| n.name().to_string()).unwrap_or_default();
        Ok(Dag {
            nodes: order.iter().filter_map(|id| by_id.get(id).map(|n| Arc::clone(n))).collect(),
            edges: g.edges.iter().map(|(a, b)| (name_of(a), name_of(b))).collect(),
        })
    }
}

/// Kahn's algorithm over an explicit node and edge list.
///
/// Ties are broken by `Ord` so the output is deterministic. Fails with
/// [`DagError::CycleDetected`] naming the first node left unprocessed.
pub fn kahn_sort<T>(nodes: &[T], edges: &[(T, T)]) -> Result<Vec<T>, DagError>
where
    T: Copy + Eq + Hash + Ord + Display,
{
    let mut in_degree: HashMap<T, usize> = nodes.iter().map(|n| (*n, 0)).collect();
    let mut outgoing: HashMap<T, Vec<T>> = HashMap::new();
    for (from, to) in edges {
        for n in [from, to] {
            if !in_degree.contains_key(n) {
                return Err(DagError::NodeNotFound(n.to_string()));
            }
        }
        *in_degree.entry(*to).or_insert(0) += 1;
        outgoing.entry(*from).or_default().push(*to);
    }

    let mut initial: Vec<T> = nodes.iter().copied().filter(|n| in_degree[n] == 0).collect();
    initial.sort();
    let mut queue: VecDeque<T> = initial.into();

    let mut order = Vec::with_capacity(nodes.len());
    let mut seen: HashSet<T> = HashSet::new();
    while let Some(n) = queue.pop_front() {
        if !seen.insert(n) {
            continue;
        }
        order.push(n);
        let mut promoted = Vec::new();
        for target in outgoing.get(&n).map(Vec::as_slice).unwrap_or_default() {
            if let Some(deg) = in_degree.get_mut(target) {
                *deg = deg.saturating_sub(1);
                if *deg == 0 {
                    promoted.push(*target);
                }
            }
        }
        promoted.sort();
        queue.extend(promoted);
    }

    if order.len() < in_degree.len() {
        let stuck = nodes.iter().find(|n| !seen.contains(n)).copied();
        return Err(DagError::CycleDetected(
            stuck.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
        ));
    }
    Ok(order)
}

/// A validated DAG: nodes in topological order plus named edges.
#[derive(Debug, Clone)]
pub struct Dag {
    nodes: Vec<Arc<Node>>,
    edges: Vec<(String, String)>,
}

impl Dag {
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Arc<Node>> {
        self.nodes
    }

    /// `(from, to)` pairs by node name, in declaration order.
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    /// Position of a node in the topological order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name() == name)
    }
}

impl Deref for Dag {
    type Target = [Arc<Node>];

    fn deref(&self) -> &Self::Target {
        &self.nodes
    }
}

impl Display for Dag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "DAG ({} nodes, {} edges)", self.nodes.len(), self.edges.len())?;
        for (step, node) in self.nodes.iter().enumerate() {
            let inputs: Vec<&str> = node.inputs().iter().map(|n| n.name()).collect();
            write!(f, "  {step}: {} {}", node.kind(), node.name())?;
            if !inputs.is_empty() {
                write!(f, " <- {}", inputs.join(", "))?;
            }
            let ctx = node.ctx();
            match &**node {
                Node::Window(_) => writeln!(f, " [{:?} | {:?}]", ctx.window(), ctx.trigger())?,
                Node::Map(_) => writeln!(f, " [{:?}]", ctx.flush_mode())?,
                Node::Load(_) | Node::Join(_) => writeln!(f)?,
            }
        }
        Ok(())
    }
}
