//! Contains definitions for deserializing a GPU profiling snapshot, as
//! serialized by the profiling service: the collected PC-sampling buffers
//! plus the per-thread CPU calling-context trees.
//!
//! # Data Model
//!
//! PC samples and calling-context trees are linked through node identifiers.
//! Each PC record carries the identifier of the calling-context node it was
//! attributed to; node identifiers are unique across *all* trees of a
//! snapshot, so a single flat `NodeId`-keyed map is valid snapshot-wide.
//!
//! As an example, lets suppose we want to find the kernel name and the
//! CPU-side calling context for a given record:
//!
//! ```no_run
//! # use gpu_profiling_sdk::schema::Snapshot;
//! # let snapshot: Snapshot = todo!();
//! let record = &snapshot.pc_sampling_data[0].p_pc_data[3];
//! let kernel: &str = &record.function_name;
//! let tree = &snapshot.cpu_calling_ctx_tree[0];
//! let context = &tree.node_map[&record.parent_cpu_pc_id];
//! ```

use std::collections::HashMap;

use serde::Deserialize;

pub type Uint = u64;
pub type Address = u64;

/// Identifier of a calling-context node, unique across all trees in a
/// snapshot.
pub type NodeId = u64;

/// A fully decoded profiling snapshot.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    /// One entry per collected PC-sampling buffer.
    pub pc_sampling_data: Vec<PcSamplingData>,
    /// One calling-context tree per profiled CPU thread.
    pub cpu_calling_ctx_tree: Vec<CallingContextTree>,
}

/// One PC-sampling collection buffer, with the bookkeeping counters reported
/// by the sampler alongside the records themselves.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct PcSamplingData {
    /// Number of distinct PCs the sampler was asked to collect.
    #[serde(default)]
    pub collect_num_pcs: Uint,
    /// Total samples seen during the collection window, including samples
    /// that were not attributed to any PC record.
    #[serde(default)]
    pub total_samples: Uint,
    /// Samples dropped by the sampler under buffer pressure.
    #[serde(default)]
    pub dropped_samples: Uint,
    /// Number of PC records in this buffer.
    #[serde(default)]
    pub total_num_pcs: Uint,
    /// PCs still buffered on the device when the snapshot was taken.
    #[serde(default)]
    pub remaining_num_pcs: Uint,
    #[serde(default)]
    pub range_id: Uint,
    /// Samples that landed in non-user kernels (driver helpers and the like).
    #[serde(default)]
    pub non_usr_kernels_total_samples: Uint,
    /// The PC records of this buffer.
    #[serde(default)]
    pub p_pc_data: Vec<PcSamplingPcData>,
}

/// One PC record: the samples observed at a single (kernel function,
/// program counter) pair, broken down by stall reason.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct PcSamplingPcData {
    /// Demangled name of the kernel function owning the sampled PC.
    pub function_name: String,
    /// Identifier of the calling-context node this record was attributed to.
    /// The node is a leaf of one of the snapshot's trees.
    #[serde(rename = "parentCPUPCID")]
    pub parent_cpu_pc_id: NodeId,
    /// CRC of the cubin the PC belongs to.
    #[serde(default)]
    pub cubin_crc: Uint,
    /// Offset of the sampled PC within its function.
    #[serde(default)]
    pub pc_offset: Address,
    #[serde(default)]
    pub function_index: Uint,
    /// Per-stall-reason sample counts for this PC.
    #[serde(default)]
    pub stall_reason: Vec<PcSamplingStallReason>,
}

/// Samples attributed to one stall reason at one PC.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct PcSamplingStallReason {
    /// Resolved stall-reason label, e.g. `"memory_dependency"`.
    pub reason: String,
    pub samples: Uint,
}

/// A calling-context tree for one profiled CPU thread. The shape of the tree
/// is encoded in each node's `child_ids`; `node_map` owns every node of the
/// tree, keyed by identifier.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CallingContextTree {
    #[serde(rename = "rootID")]
    pub root_id: NodeId,
    #[serde(default)]
    pub root_pc: Address,
    pub node_map: HashMap<NodeId, CallingContextNode>,
}

/// One node of a calling-context tree: a distinct calling context observed
/// on the CPU side while kernels were being launched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CallingContextNode {
    pub id: NodeId,
    /// Demangled function name of this calling context.
    pub func_name: String,
    /// Identifier of the parent node, 0 for roots.
    #[serde(rename = "parentID", default)]
    pub parent_id: NodeId,
    /// Program counter of the call site.
    #[serde(default)]
    pub pc: Address,
    #[serde(rename = "parentPC", default)]
    pub parent_pc: Address,
    #[serde(default)]
    pub offset: Address,
    /// Identifiers of the child nodes; empty for leaves.
    #[serde(rename = "childIDs", default)]
    pub child_ids: Vec<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::Snapshot;

    #[test]
    fn deserializes_snapshot_document() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "pcSamplingData": [
                    {
                        "collectNumPcs": 2,
                        "totalSamples": 9,
                        "droppedSamples": 1,
                        "totalNumPcs": 2,
                        "remainingNumPcs": 0,
                        "rangeId": 0,
                        "nonUsrKernelsTotalSamples": 0,
                        "pPcData": [
                            {
                                "functionName": "volta_sgemm_128x64_nn",
                                "parentCPUPCID": 7,
                                "cubinCrc": 123456,
                                "pcOffset": 48,
                                "functionIndex": 0,
                                "stallReason": [
                                    { "reason": "memory_dependency", "samples": 5 },
                                    { "reason": "execution_dependency", "samples": 3 }
                                ]
                            }
                        ]
                    }
                ],
                "cpuCallingCtxTree": [
                    {
                        "rootID": 1,
                        "rootPc": 4096,
                        "nodeMap": {
                            "1": {
                                "id": 1,
                                "funcName": "main",
                                "parentID": 0,
                                "pc": 4096,
                                "parentPC": 0,
                                "offset": 0,
                                "childIDs": [7]
                            },
                            "7": {
                                "id": 7,
                                "funcName": "at::_ops::mm::call",
                                "parentID": 1,
                                "pc": 8192,
                                "parentPC": 4096,
                                "offset": 64,
                                "childIDs": []
                            }
                        }
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.pc_sampling_data.len(), 1);
        let record = &snapshot.pc_sampling_data[0].p_pc_data[0];
        assert_eq!(record.function_name, "volta_sgemm_128x64_nn");
        assert_eq!(record.parent_cpu_pc_id, 7);
        assert_eq!(record.stall_reason.len(), 2);

        let tree = &snapshot.cpu_calling_ctx_tree[0];
        assert_eq!(tree.root_id, 1);
        assert_eq!(tree.node_map[&1].child_ids, vec![7]);
        assert!(tree.node_map[&7].child_ids.is_empty());
    }
}
