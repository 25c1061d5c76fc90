//! Assembly of a trigger tree into a graph and its depth-ordered traversal.

use log::info;
use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use std::collections::HashMap;
use std::sync::Arc;

use crate::build::Build;

/// A build and its distance from the root of the flow.
#[derive(Debug, Clone)]
pub struct FlowEntry {
    pub build: Arc<Build>,
    pub depth: usize,
}

/// Directed graph of builds connected by "triggered" edges, keyed by
/// `job#number` identifiers.
pub struct BuildFlow {
    graph: DiGraph<Arc<Build>, ()>,
    index: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl BuildFlow {
    /// Expands `root`'s children transitively, adding one node per distinct
    /// build and one edge per parent/child pair.
    ///
    /// A build reached a second time gets the extra edge but is not
    /// expanded again.
    ///
    /// Edges start at the build whose console printed the trigger line, not
    /// at the child's recorded upstream cause. The two differ only when a
    /// child names a different upstream than the console that started it.
    pub async fn assemble(root: Arc<Build>) -> Self {
        let mut graph = DiGraph::new();
        let root_node = graph.add_node(Arc::clone(&root));
        let mut flow = Self {
            graph,
            index: HashMap::from([(root.id(), root_node)]),
            root: root_node,
        };

        let mut stack = vec![(root, root_node)];
        while let Some((parent, parent_node)) = stack.pop() {
            let mut expand = Vec::new();
            for child in parent.children().await {
                let (child_node, is_new) = flow.insert(child);
                flow.graph.update_edge(parent_node, child_node, ());
                if is_new {
                    expand.push((Arc::clone(child), child_node));
                }
            }
            stack.extend(expand.into_iter().rev());
        }

        info!(
            "Assembled build flow with {} builds and {} trigger edges",
            flow.graph.node_count(),
            flow.graph.edge_count()
        );
        flow
    }

    fn insert(&mut self, build: &Arc<Build>) -> (NodeIndex, bool) {
        let id = build.id();
        if let Some(&node) = self.index.get(&id) {
            return (node, false);
        }
        let node = self.graph.add_node(Arc::clone(build));
        self.index.insert(id, node);
        (node, true)
    }

    pub fn root(&self) -> &Arc<Build> {
        &self.graph[self.root]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// `(parent, child)` identifier pairs in insertion order.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.graph
            .edge_references()
            .map(|edge| (self.graph[edge.source()].id(), self.graph[edge.target()].id()))
            .collect()
    }

    /// Depth-first order from the root.
    ///
    /// Siblings appear in the order their trigger lines were logged. Each
    /// depth is the shortest path length from the root, which is what the
    /// indentation of the printed tree shows.
    pub fn traversal(&self) -> Vec<FlowEntry> {
        let depths = dijkstra(&self.graph, self.root, None, |_| 1usize);
        let mut dfs = Dfs::new(&self.graph, self.root);
        let mut entries = Vec::with_capacity(self.graph.node_count());

        while let Some(node) = dfs.next(&self.graph) {
            entries.push(FlowEntry {
                build: Arc::clone(&self.graph[node]),
                depth: depths.get(&node).copied().unwrap_or_default(),
            });
        }

        entries
    }
}
