//! UID/GID transitions for privilege dropping.
//!
//! CRITICAL: setresgid MUST be called BEFORE setresuid.

mod transition;
mod validation;

pub use transition::{current_ids, drop_privileges, verify_transition, ProcessIds};
pub use validation::validate_target;
