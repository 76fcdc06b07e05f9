//! Metadata store for the Kiln recipe language
//!
//! A recipe evaluates to layered key/value metadata: string variables with
//! named flags, weak defaults, a per-variable write history, and override
//! tokens that fold qualified variables onto their base names. This crate
//! owns that store plus the textual reference expansion and the whole-store
//! update passes the evaluation pipeline runs around finalization.

mod expand;

pub mod error;
pub mod reserved;
pub mod store;
pub mod update;

pub use error::{DataError, Result};
pub use reserved::{flags, vars};
pub use store::{DataStore, Provenance, VarOp};
pub use update::{apply_overrides, expand_keys};
