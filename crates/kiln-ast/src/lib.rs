//! Statement AST and evaluation for the Kiln recipe language
//!
//! A parsed file is an ordered [`StatementGroup`]; applying it to a
//! [`kiln_data::DataStore`] is the language's entire effect. Everything the
//! language reaches beyond the store (file inclusion, class inheritance,
//! events, scripting, tasks, signatures) goes through the trait seams in
//! [`providers`].

pub mod error;
pub mod memory;
pub mod nodes;
pub mod providers;

pub use error::{EvalError, Result};
pub use memory::{
    InsertedMethod, MemoryEventBus, MemoryMethodPool, MemorySignatures, RegisteredHandler,
    StoreTaskRegistry,
};
pub use nodes::{
    Assignment, Origin, Statement, StatementGroup, StatementKind, ANONYMOUS_MARKER,
};
pub use providers::{
    ClassInheritor, EventBus, FileIncluder, IncludePolicy, MethodPool, Notification, Providers,
    ScriptEngine, SignatureWriter, TaskRegistry,
};
