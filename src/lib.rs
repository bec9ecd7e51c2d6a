//! Two-stage protein mediation screen.
//!
//! Stage 1 screens mediators for association with each upstream factor,
//! Stage 2 decomposes factor -> outcome effects through each surviving
//! candidate, and the reconciler repairs partially completed shard runs.

pub mod error;
pub mod logging;
pub mod types;

pub mod config;
pub mod df_utils;
pub mod io;
pub mod parallel;
pub mod qc;
pub mod schema;

pub mod artifacts;
pub mod association;
pub mod correction;
pub mod data;
pub mod design;
pub mod filter;
pub mod genotype;
pub mod mediation;
pub mod pipeline;
pub mod reconcile;
pub mod shard;
