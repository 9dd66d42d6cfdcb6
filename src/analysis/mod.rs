//! Analysis modules.
//!
//! The aggregator turns record snapshots into dashboard values.

pub mod aggregator;

pub use aggregator::*;
