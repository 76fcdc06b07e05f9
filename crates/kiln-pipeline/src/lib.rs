//! Finalization and variant expansion for evaluated stores
//!
//! After a unit's statements have been applied, [`finalize`] runs the fixed
//! post-evaluation sequence on the store, and [`multi_finalize`] expands one
//! store into every declared variant, finalizing each in isolation.

pub mod finalize;
pub mod variants;

pub use finalize::finalize;
pub use variants::{multi_finalize, VariantMap};
