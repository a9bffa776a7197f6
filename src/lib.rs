//! initbox: a declarative container entrypoint engine
//!
//! Synthesizes the downstream application's configuration file from a single
//! immutable environment snapshot, enforces path safety for every directory it
//! manages, waits for mounted storage to be genuinely writable, drops root
//! privileges, and replaces itself with the application process.
//!
//! # Architecture
//!
//! The crate is organized by boot-pipeline stage:
//!
//! ## Environment ([`env`])
//! - [`env::EnvSnapshot`]: immutable process environment, captured once
//! - [`env::sanitize`]: whitespace/quote normalization of raw values
//! - [`env::overrides`]: `SAB__section__[subsection__]option` parsing
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: error taxonomy, settings, privilege target
//! - [`config::tree`]: two-level section/option tree with tagged entries
//! - [`config::builder`]: staged merge of defaults and overrides
//! - [`config::writer`]: deterministic INI rendering with atomic replace
//!
//! ## Safety ([`safety`])
//! - [`safety::paths`]: allow-listed root containment for managed paths
//! - [`safety::probe`]: write/fsync/unlink storage readiness probing
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::credentials`]: UID/GID transition with post-drop verification
//!
//! ## Execution Control ([`exec`])
//! - [`exec::handoff`]: terminal process-image replacement behind a
//!   mockable [`exec::handoff::Launcher`] boundary
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: structured boot lifecycle events
//!
//! # Design Principles
//!
//! 1. **One snapshot** - no component re-reads the ambient environment
//! 2. **Deterministic output** - identical environment, identical bytes
//! 3. **Reject, never clamp** - unsafe paths abort the boot
//! 4. **Probe, don't stat** - writability is proven by writing
//! 5. **Verified transitions** - a privilege drop that cannot be confirmed
//!    is a fatal defect, not a warning

// Environment
pub mod env;

// Configuration
pub mod config;

// Safety
pub mod safety;

// Kernel Primitives
pub mod kernel;

// Execution Control
pub mod exec;

// Observability
pub mod observability;

// Boot pipeline orchestration
pub mod boot;

// CLI entrypoint wiring for the initbox binary
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::{EntrypointError, PrivilegeTarget, Result, Settings};
pub use env::EnvSnapshot;
