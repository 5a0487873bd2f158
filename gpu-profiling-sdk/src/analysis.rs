//! Sample-count aggregation over a snapshot, and the distribution builders
//! on top of it.
//!
//! Raw PC records attribute their samples to *leaf* calling-context nodes,
//! through each record's parent node identifier. Everything above the leaves
//! is recovered by a bottom-up pass over each calling-context tree: a
//! non-leaf node's count is the sum of its children's counts. Node
//! identifiers are unique across all trees of a snapshot, so one flat
//! node-to-count map accumulates the results of every tree.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use thiserror::Error;
use tracing::debug;

use crate::filter::{LayerRule, OpNameFilter};
use crate::model::{nodes, records};
use crate::schema::{CallingContextTree, NodeId, Snapshot, Uint};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// A child identifier referenced by a node does not exist in its tree's
    /// node map. Skipping it would understate every ancestor's count without
    /// signal, so the whole pass fails instead.
    #[error("calling-context node {id} is missing from its tree")]
    MissingNode { id: NodeId },
    /// The node was reached again while its own subtree was still being
    /// summed. Trees are acyclic by contract; this is a malformed snapshot.
    #[error("cyclic structure detected at calling-context node {0}")]
    CyclicTree(NodeId),
}

/// The named sample-count distributions derived from one snapshot.
#[derive(Debug, Default)]
pub struct Distributions {
    /// Per stall-reason label, the sample counts observed for it across all
    /// PC records, in record iteration order.
    pub stall_reasons: HashMap<String, Vec<Uint>>,
    /// Per kernel function name, total samples.
    pub kernels: HashMap<String, Uint>,
    /// Per operator name (names passing the operator filter), total samples
    /// aggregated over the calling-context trees.
    pub operators: HashMap<String, Uint>,
    /// Per model-layer label. Empty unless a [`LayerRule`] is supplied.
    pub layers: HashMap<String, Uint>,
}

impl Distributions {
    /// Builds all distributions in one pass over the snapshot, sharing a
    /// single tree aggregation between the operator and layer builders.
    ///
    /// Fails only if the calling-context trees are malformed; the kernel and
    /// stall-reason builders do not depend on the trees, so a caller that
    /// wants them despite a malformed tree can call
    /// [`kernel_distribution`] and [`stall_reason_distribution`] directly.
    pub fn collect(
        snapshot: &Snapshot,
        op_filter: &impl OpNameFilter,
        layer_rule: Option<&dyn LayerRule>,
    ) -> Result<Self, AnalysisError> {
        let counts = aggregate_samples(snapshot)?;
        Ok(Self {
            stall_reasons: stall_reason_distribution(snapshot),
            kernels: kernel_distribution(snapshot),
            operators: operator_buckets(snapshot, &counts, op_filter),
            layers: layer_rule
                .map(|rule| layer_buckets(snapshot, &counts, rule))
                .unwrap_or_default(),
        })
    }
}

/// Sums each PC record's samples onto the record's parent node identifier.
///
/// This seeds the leaf level of the tree aggregation: the resulting map is
/// keyed by the identifiers of the trees' leaf nodes.
pub fn leaf_sample_counts(snapshot: &Snapshot) -> HashMap<NodeId, Uint> {
    let mut counts: HashMap<NodeId, Uint> = HashMap::new();
    for record in records(snapshot) {
        *counts.entry(record.parent_id()).or_default() += record.total_samples();
    }
    counts
}

/// Resolves the sample count of every node of every calling-context tree.
///
/// Runs one post-order traversal per tree root, accumulating into a single
/// map. Node identifiers are globally unique across trees, so an identifier
/// collision would silently overwrite; that uniqueness is an input invariant,
/// not a checked condition.
pub fn aggregate_samples(snapshot: &Snapshot) -> Result<HashMap<NodeId, Uint>, AnalysisError> {
    let leaf_counts = leaf_sample_counts(snapshot);

    let mut counts = HashMap::new();
    for tree in &snapshot.cpu_calling_ctx_tree {
        let mut visiting = HashSet::new();
        let total = aggregate_node(tree, tree.root_id, &leaf_counts, &mut counts, &mut visiting)?;
        debug!(root = tree.root_id, total, "aggregated calling-context tree");
    }

    Ok(counts)
}

/// Returns the resolved count of `id` and records it, along with every node
/// beneath it, into `counts`.
fn aggregate_node(
    tree: &CallingContextTree,
    id: NodeId,
    leaf_counts: &HashMap<NodeId, Uint>,
    counts: &mut HashMap<NodeId, Uint>,
    visiting: &mut HashSet<NodeId>,
) -> Result<Uint, AnalysisError> {
    let node = tree
        .node_map
        .get(&id)
        .ok_or(AnalysisError::MissingNode { id })?;

    if !visiting.insert(id) {
        return Err(AnalysisError::CyclicTree(id));
    }

    let total = if node.child_ids.is_empty() {
        leaf_counts.get(&id).copied().unwrap_or(0)
    } else {
        // Children's sums take precedence: a direct sample contribution on a
        // non-leaf identifier is not added on top.
        if leaf_counts.contains_key(&id) {
            debug!(node = id, "ignoring direct sample contribution on non-leaf node");
        }
        let mut sum = 0;
        for &child in &node.child_ids {
            sum += aggregate_node(tree, child, leaf_counts, counts, visiting)?;
        }
        sum
    };

    visiting.remove(&id);

    // Written at most once per run; ids are unique across trees.
    counts.insert(id, total);

    Ok(total)
}

/// Tabulates total samples per kernel function name, straight off the PC
/// records.
pub fn kernel_distribution(snapshot: &Snapshot) -> HashMap<String, Uint> {
    let mut dist: HashMap<String, Uint> = HashMap::new();
    for record in records(snapshot) {
        *dist.entry(record.function_name().to_owned()).or_default() += record.total_samples();
    }
    dist
}

/// Groups the sample counts observed for each stall-reason label, in record
/// iteration order.
///
/// Each label keeps the full sequence of observations rather than a single
/// total; a per-label total is the sum of its sequence.
pub fn stall_reason_distribution(snapshot: &Snapshot) -> HashMap<String, Vec<Uint>> {
    records(snapshot)
        .flat_map(|record| record.stall_samples())
        .map(|(reason, samples)| (reason.to_owned(), samples))
        .into_group_map()
}

/// Tabulates aggregated samples per operator name, for every
/// calling-context node whose function name passes `filter`.
pub fn operator_distribution(
    snapshot: &Snapshot,
    filter: &impl OpNameFilter,
) -> Result<HashMap<String, Uint>, AnalysisError> {
    let counts = aggregate_samples(snapshot)?;
    Ok(operator_buckets(snapshot, &counts, filter))
}

/// Tabulates aggregated samples per model-layer label, as assigned by
/// `rule`. Nodes for which the rule yields no layer are skipped.
pub fn layer_distribution(
    snapshot: &Snapshot,
    rule: &impl LayerRule,
) -> Result<HashMap<String, Uint>, AnalysisError> {
    let counts = aggregate_samples(snapshot)?;
    Ok(layer_buckets(snapshot, &counts, rule))
}

fn operator_buckets(
    snapshot: &Snapshot,
    counts: &HashMap<NodeId, Uint>,
    filter: &impl OpNameFilter,
) -> HashMap<String, Uint> {
    let mut dist: HashMap<String, Uint> = HashMap::new();
    // The same operator can appear at several call sites, each with its own
    // node id; all of them accumulate into one bucket per name.
    for node in nodes(snapshot) {
        if !filter.is_operator(&node.func_name) {
            continue;
        }
        *dist.entry(node.func_name.clone()).or_default() +=
            counts.get(&node.id).copied().unwrap_or(0);
    }
    dist
}

fn layer_buckets(
    snapshot: &Snapshot,
    counts: &HashMap<NodeId, Uint>,
    rule: &dyn LayerRule,
) -> HashMap<String, Uint> {
    let mut dist: HashMap<String, Uint> = HashMap::new();
    for node in nodes(snapshot) {
        let Some(layer) = rule.layer_of(&node.func_name) else {
            continue;
        };
        *dist.entry(layer).or_default() += counts.get(&node.id).copied().unwrap_or(0);
    }
    dist
}
