//! Kernel primitives
//!
//! Thin, explicit wrappers over the credential syscalls the entrypoint needs.

pub mod credentials;
