//! Safety & provisioning
//!
//! Path containment for every directory the entrypoint manages, and the
//! write-probe loop that proves mounted storage is genuinely usable.

pub mod paths;
pub mod probe;
