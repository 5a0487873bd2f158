use std::fs::File;

use gpu_profiling_sdk::{analysis::aggregate_samples, schema::Snapshot, tree::CallTree};

pub fn main() {
    let path = std::env::args()
        .nth(1)
        .expect("expected snapshot path as first argument");
    let file = File::open(path).expect("failed to open snapshot");
    let snapshot: Snapshot =
        serde_json::from_reader(file).expect("failed to deserialize snapshot");

    let counts = aggregate_samples(&snapshot).expect("failed to aggregate snapshot");
    let mut tree = CallTree::from_snapshot(&snapshot, &counts).expect("malformed snapshot");
    tree.prune(1.0);

    println!("{}", tree);
}
