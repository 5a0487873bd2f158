//! Analysis SDK for GPU PC-sampling snapshots.
//!
//! A snapshot pairs the PC-sampling records collected on the device with the
//! CPU calling-context trees that were active while kernels were launched.
//! This crate deserializes such snapshots ([`schema`]), propagates leaf-level
//! sample counts up through the calling-context trees, and derives the named
//! sample-count distributions used by profiling reports ([`analysis`]): by
//! stall reason, by kernel function, by logical operator, and by model layer.
//!
//! It does not capture profiling data or talk to any device; the caller is
//! responsible for obtaining the snapshot and for rendering the results.

pub mod analysis;
pub mod filter;
pub mod model;
pub mod schema;
pub mod tree;
