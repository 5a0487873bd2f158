//! A renderable view of the calling-context trees, annotated with the
//! aggregated sample counts. The display format mimicks how the firefox
//! profiler lays out its call tree:
//!
//! ```text
//! │ RATIO │ TOTAL │ SELF  │ TREE
//! │       │       │       │
//! │ 100.0 │ 8     │ 0     │ main
//! │ 62.5  │ 5     │ 5     │ ├─ at::_ops::mm::call
//! │ 37.5  │ 3     │ 3     │ └─ at::_ops::relu::call
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use crate::analysis::AnalysisError;
use crate::model::NodeRef;
use crate::schema::{NodeId, Snapshot, Uint};

#[derive(Debug, Default)]
pub struct CallTree<'p> {
    pub children: Vec<Node<'p>>,
}

#[derive(Debug)]
pub struct Node<'p> {
    pub name: &'p str,
    /// Samples attributed directly to this node (leaf contribution).
    pub count: Uint,
    /// Aggregated samples of this node's whole subtree.
    pub subtotal: Uint,
    pub subtree: CallTree<'p>,
}

impl<'p> CallTree<'p> {
    /// Builds one view over all of the snapshot's trees. Each tree root
    /// becomes a top-level child; siblings are ordered by descending
    /// subtotal. `counts` is the map produced by
    /// [`aggregate_samples`](crate::analysis::aggregate_samples).
    pub fn from_snapshot(
        snapshot: &'p Snapshot,
        counts: &HashMap<NodeId, Uint>,
    ) -> Result<Self, AnalysisError> {
        let mut children = Vec::new();
        for tree in &snapshot.cpu_calling_ctx_tree {
            let root = NodeRef::root(tree)
                .ok_or(AnalysisError::MissingNode { id: tree.root_id })?;
            let mut visiting = HashSet::new();
            children.push(build_node(root, counts, &mut visiting)?);
        }
        children.sort_by_key(|node| std::cmp::Reverse(node.subtotal));
        Ok(CallTree { children })
    }

    /// Drops every subtree whose subtotal falls below `limit` percent of the
    /// total sample count.
    pub fn prune(&mut self, limit: f64) {
        let total = self.total();
        self.prune_inner(total, limit);
    }

    fn total(&self) -> Uint {
        self.children.iter().map(|node| node.subtotal).sum()
    }

    fn prune_inner(&mut self, total: Uint, limit: f64) {
        self.children.retain_mut(|node| {
            let percentage = node.subtotal as f64 / total as f64 * 100.0;
            if percentage < limit {
                false
            } else {
                node.subtree.prune_inner(total, limit);
                true
            }
        });
    }
}

fn build_node<'p>(
    node: NodeRef<'p>,
    counts: &HashMap<NodeId, Uint>,
    visiting: &mut HashSet<NodeId>,
) -> Result<Node<'p>, AnalysisError> {
    if !visiting.insert(node.id()) {
        return Err(AnalysisError::CyclicTree(node.id()));
    }

    let subtotal = counts.get(&node.id()).copied().unwrap_or(0);

    let mut children = Vec::new();
    for &child_id in node.child_ids() {
        let child = node
            .child(child_id)
            .ok_or(AnalysisError::MissingNode { id: child_id })?;
        children.push(build_node(child, counts, visiting)?);
    }
    children.sort_by_key(|child| std::cmp::Reverse(child.subtotal));

    visiting.remove(&node.id());

    let count = if children.is_empty() { subtotal } else { 0 };
    Ok(Node {
        name: node.func_name(),
        count,
        subtotal,
        subtree: CallTree { children },
    })
}

impl<'p> Display for CallTree<'p> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn inner(
            f: &mut std::fmt::Formatter<'_>,
            node: &Node<'_>,
            total: Uint,
            prefix: &str,
            marker: &str,
        ) -> std::fmt::Result {
            let percentage = if total == 0 {
                0.0
            } else {
                node.subtotal as f64 / total as f64 * 100.0
            };

            writeln!(
                f,
                "│ {:<5.1} │ {:<7} │ {:<7} │ {}{}{}",
                percentage, node.subtotal, node.count, prefix, marker, node.name
            )?;

            let extension = match marker {
                "" => "",
                "├─ " => "│  ",
                _ => "   ",
            };
            let child_prefix = format!("{prefix}{extension}");

            let mut children = node.subtree.children.iter().peekable();
            while let Some(child) = children.next() {
                let child_marker = if children.peek().is_none() {
                    "└─ "
                } else {
                    "├─ "
                };
                inner(f, child, total, &child_prefix, child_marker)?;
            }

            Ok(())
        }

        writeln!(f, "│ RATIO │  TOTAL  │  SELF   │ TREE")?;
        writeln!(f, "│       │         │         │     ")?;

        let total = self.total();
        for child in &self.children {
            inner(f, child, total, "", "")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use itertools::Itertools;

    use super::CallTree;
    use crate::analysis::{AnalysisError, aggregate_samples};
    use crate::schema::{
        CallingContextNode, CallingContextTree, NodeId, PcSamplingData, PcSamplingPcData,
        PcSamplingStallReason, Snapshot,
    };

    fn node(id: NodeId, func_name: &str, child_ids: &[NodeId]) -> CallingContextNode {
        CallingContextNode {
            id,
            func_name: func_name.to_owned(),
            parent_id: 0,
            pc: 0,
            parent_pc: 0,
            offset: 0,
            child_ids: child_ids.to_vec(),
        }
    }

    fn sample_snapshot() -> Snapshot {
        let records = vec![("mm_kernel", 10, 5), ("relu_kernel", 11, 3)]
            .into_iter()
            .map(|(name, parent, samples)| PcSamplingPcData {
                function_name: name.to_owned(),
                parent_cpu_pc_id: parent,
                stall_reason: vec![PcSamplingStallReason {
                    reason: "mem".to_owned(),
                    samples,
                }],
                ..Default::default()
            })
            .collect_vec();

        let nodes = vec![
            node(1, "main", &[10, 11]),
            node(10, "at::_ops::mm::call", &[]),
            node(11, "at::_ops::relu::call", &[]),
        ];

        Snapshot {
            pc_sampling_data: vec![PcSamplingData {
                p_pc_data: records,
                ..Default::default()
            }],
            cpu_calling_ctx_tree: vec![CallingContextTree {
                root_id: 1,
                root_pc: 0,
                node_map: nodes.into_iter().map(|n| (n.id, n)).collect(),
            }],
        }
    }

    #[test]
    fn orders_siblings_by_subtotal() {
        let snapshot = sample_snapshot();
        let counts = aggregate_samples(&snapshot).unwrap();

        let tree = CallTree::from_snapshot(&snapshot, &counts).unwrap();

        let root = &tree.children[0];
        assert_eq!(root.name, "main");
        assert_eq!(root.subtotal, 8);
        assert_eq!(root.count, 0);
        let names = root
            .subtree
            .children
            .iter()
            .map(|child| child.name)
            .collect_vec();
        assert_eq!(names, vec!["at::_ops::mm::call", "at::_ops::relu::call"]);
    }

    #[test]
    fn renders_the_profiler_table() {
        let snapshot = sample_snapshot();
        let counts = aggregate_samples(&snapshot).unwrap();

        let rendered = CallTree::from_snapshot(&snapshot, &counts)
            .unwrap()
            .to_string();

        assert!(rendered.starts_with("│ RATIO │  TOTAL  │  SELF   │ TREE"));
        assert!(rendered.contains("main"));
        assert!(rendered.contains("└─ at::_ops::relu::call"));
    }

    #[test]
    fn prune_drops_small_subtrees() {
        let snapshot = sample_snapshot();
        let counts = aggregate_samples(&snapshot).unwrap();
        let mut tree = CallTree::from_snapshot(&snapshot, &counts).unwrap();

        // relu is 3 of 8 samples, 37.5%.
        tree.prune(50.0);

        let root = &tree.children[0];
        assert_eq!(root.subtree.children.len(), 1);
        assert_eq!(root.subtree.children[0].name, "at::_ops::mm::call");
    }

    #[test]
    fn missing_child_fails_construction() {
        let snapshot = Snapshot {
            pc_sampling_data: vec![],
            cpu_calling_ctx_tree: vec![CallingContextTree {
                root_id: 1,
                root_pc: 0,
                node_map: [(1, node(1, "main", &[42]))].into_iter().collect(),
            }],
        };

        let err = CallTree::from_snapshot(&snapshot, &HashMap::new()).unwrap_err();

        assert_eq!(err, AnalysisError::MissingNode { id: 42 });
    }
}
