use std::fs::File;

use gpu_profiling_sdk::{
    analysis::Distributions, filter::SubstringFilter, schema::Snapshot,
};

pub fn main() {
    let path = std::env::args()
        .nth(1)
        .expect("expected snapshot path as first argument");
    let file = File::open(path).expect("failed to open snapshot");
    let snapshot: Snapshot =
        serde_json::from_reader(file).expect("failed to deserialize snapshot");

    let distributions = Distributions::collect(&snapshot, &SubstringFilter::default(), None)
        .expect("failed to aggregate snapshot");

    println!("== kernels ==");
    for (name, samples) in &distributions.kernels {
        println!("{samples:>8}  {name}");
    }

    println!("== operators ==");
    for (name, samples) in &distributions.operators {
        println!("{samples:>8}  {name}");
    }

    println!("== stall reasons ==");
    for (reason, samples) in &distributions.stall_reasons {
        let total: u64 = samples.iter().sum();
        println!("{total:>8}  {reason}");
    }
}
