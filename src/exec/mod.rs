//! Execution Control
//!
//! Terminal process-image replacement behind a mockable boundary.

pub mod handoff;
