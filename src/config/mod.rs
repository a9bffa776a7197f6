//! Configuration model
//!
//! Error taxonomy, environment-derived settings, the two-level config tree,
//! the staged merge builder, and the deterministic INI writer.

pub mod builder;
pub mod tree;
pub mod types;
pub mod writer;
