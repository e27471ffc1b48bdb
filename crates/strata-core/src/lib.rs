//! strata-core — Core library for the strata version control system.
//!
//! Strata keeps content-addressed blobs and commits under `.strata/`,
//! tracks branches in a single reference table and merges divergent
//! lines of history with a three-way, per-file classification.

pub mod commit;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod graph;
pub mod hash;
pub mod lock;
pub mod merge;
pub mod object;
pub mod overlay;
pub mod reconcile;
pub mod refs;
pub mod repo;
pub mod state;
pub mod workdir;

pub use error::{StrataError, StrataResult};
pub use repo::{AddOutcome, MergeOutcome, Repository};
