//! Reserved variable and flag names
//!
//! The evaluation pipeline keeps its bookkeeping in ordinary store entries;
//! these constants keep the spelling in one place. Names starting with a
//! double underscore are internal lists maintained by statement evaluation
//! and finalization, the rest are recipe-visible.

/// Reserved variable names.
pub mod vars {
    /// Whitespace-joined list of pending task names.
    pub const TASKS: &str = "__TASKS";

    /// Whitespace-joined list of deleted task names.
    pub const DELETED_TASKS: &str = "__DELETED_TASKS";

    /// Effective task list after deletions, written at materialization.
    pub const SCHEDULED_TASKS: &str = "__SCHEDULED_TASKS";

    /// Synthesized names of anonymous functions, in registration order.
    pub const DEFERRED_FUNCS: &str = "__DEFERRED_FUNCS";

    /// Function names registered as event handlers.
    pub const EVENT_HANDLERS: &str = "__EVENT_HANDLERS";

    /// Reason a variant declined to finalize, recorded by the pipeline.
    pub const SKIPPED: &str = "__SKIPPED";

    /// Sorted names of all non-baseline variants, written after expansion.
    pub const VARIANTS: &str = "__VARIANTS";

    /// Append files to merge into the store before finalization.
    pub const APPEND_FILES: &str = "__APPEND_FILES";

    /// Caller-supplied filter: only these variant names are materialized.
    pub const ONLY_FINALIZE: &str = "__ONLY_FINALIZE";

    /// Transitive file dependencies of the parse, recorded at finalization.
    pub const INCLUDED_FILES: &str = "__INCLUDED_FILES";

    /// Colon-separated override tokens currently in effect.
    pub const OVERRIDES: &str = "OVERRIDES";

    /// Whitespace-separated version declarations, ranges allowed.
    pub const VERSIONS: &str = "VERSIONS";

    /// Whitespace-separated class-extension declarations.
    pub const EXTENSIONS: &str = "EXTENSIONS";

    /// The primary version of the unit.
    pub const VERSION: &str = "VERSION";

    /// Base version a spawned version variant was derived from.
    pub const BASE_VERSION: &str = "BASE_VERSION";

    /// The primary name of the unit.
    pub const NAME: &str = "NAME";

    /// Class currently being applied by a class-extension variant.
    pub const EXTEND_CLASS: &str = "EXTEND_CLASS";

    /// Argument of a colon-qualified class-extension declaration.
    pub const EXTEND_VARIANT: &str = "EXTEND_VARIANT";
}

/// Reserved flag names.
pub mod flags {
    /// Variable is exported to task environments.
    pub const EXPORT: &str = "export";

    /// Variable holds an executable function body.
    pub const FUNC: &str = "func";

    /// Function runs on the scripting engine rather than a shell.
    pub const SCRIPTED: &str = "scripted";

    /// Function runs with elevated privileges.
    pub const PRIVILEGED: &str = "privileged";

    /// Function is a wrapper generated by an export-functions statement.
    pub const WRAPPER: &str = "wrapper";

    /// Working directories a function wants prepared.
    pub const DIRS: &str = "dirs";

    /// Variable names a registered task.
    pub const TASK: &str = "task";

    /// Tasks this one must run before.
    pub const BEFORE: &str = "before";

    /// Tasks this one must run after.
    pub const AFTER: &str = "after";

    /// Variable names an event handler.
    pub const HANDLER: &str = "handler";

    /// Whitespace-separated event names a handler subscribes to.
    pub const EVENT_MASK: &str = "eventmask";

    /// Weak default: supplies the value while none has been assigned.
    pub const DEFAULT: &str = "defaultval";
}
