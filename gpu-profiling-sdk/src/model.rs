//! The module defines entities for traversing the snapshot, without dealing
//! with its raw layout directly. They only encode how the pieces link
//! together, and do not store attributes.
//!
//! As an example, lets suppose we want the total sample count of every PC
//! record in a snapshot, regardless of which buffer it arrived in:
//!
//! ```no_run
//! # use gpu_profiling_sdk::schema::Snapshot;
//! # use gpu_profiling_sdk::model::records;
//! # let snapshot: Snapshot = todo!();
//! let total: u64 = records(&snapshot).map(|record| record.total_samples()).sum();
//! ```

use crate::schema::{
    CallingContextNode, CallingContextTree, NodeId, PcSamplingPcData, Snapshot, Uint,
};

/// One PC record, with its per-stall-reason counts folded behind accessors.
#[derive(Copy, Clone)]
pub struct Record<'p> {
    data: &'p PcSamplingPcData,
}

/// A node of a calling-context tree, bound to the tree that owns it so that
/// children can be resolved.
#[derive(Copy, Clone)]
pub struct NodeRef<'p> {
    tree: &'p CallingContextTree,
    node: &'p CallingContextNode,
}

/// Iterates every PC record of the snapshot, across all collection buffers.
pub fn records(snapshot: &Snapshot) -> impl Iterator<Item = Record<'_>> {
    snapshot
        .pc_sampling_data
        .iter()
        .flat_map(|buffer| &buffer.p_pc_data)
        .map(Record::new)
}

/// Iterates every calling-context node of the snapshot, across all trees.
pub fn nodes(snapshot: &Snapshot) -> impl Iterator<Item = &CallingContextNode> {
    snapshot
        .cpu_calling_ctx_tree
        .iter()
        .flat_map(|tree| tree.node_map.values())
}

impl<'p> Record<'p> {
    pub fn new(data: &'p PcSamplingPcData) -> Self {
        Self { data }
    }

    pub fn function_name(&self) -> &'p str {
        &self.data.function_name
    }

    /// The calling-context node this record's samples are attributed to.
    pub fn parent_id(&self) -> NodeId {
        self.data.parent_cpu_pc_id
    }

    /// The record's sample count: the sum over all of its stall reasons.
    pub fn total_samples(&self) -> Uint {
        self.data.stall_reason.iter().map(|s| s.samples).sum()
    }

    pub fn stall_samples(self) -> impl Iterator<Item = (&'p str, Uint)> {
        self.data
            .stall_reason
            .iter()
            .map(|s| (s.reason.as_str(), s.samples))
    }
}

impl<'p> NodeRef<'p> {
    /// Binds the node with the given identifier, if the tree contains it.
    pub fn new(tree: &'p CallingContextTree, id: NodeId) -> Option<Self> {
        tree.node_map.get(&id).map(|node| Self { tree, node })
    }

    pub fn root(tree: &'p CallingContextTree) -> Option<Self> {
        Self::new(tree, tree.root_id)
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn func_name(&self) -> &'p str {
        &self.node.func_name
    }

    pub fn child_ids(&self) -> &'p [NodeId] {
        &self.node.child_ids
    }

    pub fn is_leaf(&self) -> bool {
        self.node.child_ids.is_empty()
    }

    pub fn child(&self, id: NodeId) -> Option<NodeRef<'p>> {
        NodeRef::new(self.tree, id)
    }
}
