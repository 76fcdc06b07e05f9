//! Kiln - a build-description language core
//!
//! This is the root workspace crate that provides integration tests.
//! The actual implementation is in the workspace member crates.

// Re-export main crates for convenience
pub use kiln_ast as ast;
pub use kiln_data as data;
pub use kiln_pipeline as pipeline;
