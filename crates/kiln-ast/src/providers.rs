//! Collaborator seams for statement evaluation and finalization
//!
//! The core never owns file access, class lookup, event dispatch, script
//! execution, or task scheduling; a driver supplies those behind these
//! traits. A driver that implements all of them on one type builds the
//! bundle with [`Providers::from_driver`]. Includers and inheritors are
//! expected to re-enter statement evaluation for the resolved target,
//! which is why every mutating call receives the store.

use kiln_data::DataStore;

use crate::error::Result;

/// Whether a missing include target fails the parse or is ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludePolicy {
    Required,
    Optional,
}

/// Pipeline notifications delivered through the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification<'a> {
    /// Fired before finalization mutates the store
    PreFinalize { file: &'a str },
    /// Fired once a store is fully finalized
    Parsed { file: &'a str },
}

impl Notification<'_> {
    /// The file the notification refers to
    pub fn file(&self) -> &str {
        match self {
            Notification::PreFinalize { file } | Notification::Parsed { file } => file,
        }
    }

    /// Stable name for logging and recording
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::PreFinalize { .. } => "pre-finalize",
            Notification::Parsed { .. } => "parsed",
        }
    }
}

/// Resolves included files and applies their statements to the store
pub trait FileIncluder {
    /// Apply the target file's statements to `d`
    ///
    /// Fails only when the target cannot be located and the policy is
    /// [`IncludePolicy::Required`].
    fn include(
        &self,
        from: &str,
        path: &str,
        line: u32,
        d: &mut DataStore,
        policy: IncludePolicy,
    ) -> Result<()>;

    /// Transitive set of files the store's parse depended on
    fn file_depends(&self, d: &DataStore) -> Vec<String> {
        let _ = d;
        Vec::new()
    }
}

/// Looks up class definitions by name and applies them to the store
pub trait ClassInheritor {
    fn inherit(&self, classes: &str, from: &str, line: u32, d: &mut DataStore) -> Result<()>;
}

/// Event handler registration and lifecycle notification dispatch
pub trait EventBus {
    fn register(&self, name: &str, body: Option<&str>, mask: &[String]) -> Result<()>;

    fn fire(&self, event: Notification<'_>, d: &mut DataStore) -> Result<()>;
}

/// Executes scripting-language source with the store bound as `d`
pub trait ScriptEngine {
    fn execute(&self, source: &str, d: &mut DataStore) -> Result<()>;
}

/// Makes function bodies available to the script engine by name
pub trait MethodPool {
    fn insert_method(&self, name: &str, source: &str, file: &str) -> Result<()>;
}

/// Task bookkeeping and final task-graph assembly
pub trait TaskRegistry {
    fn add_task(
        &self,
        task: &str,
        before: Option<&str>,
        after: Option<&str>,
        d: &mut DataStore,
    ) -> Result<()>;

    fn delete_task(&self, task: &str, d: &mut DataStore) -> Result<()>;

    /// Assemble the effective task graph from the pending and deleted lists
    fn materialize(&self, tasks: &[String], deleted: &[String], d: &mut DataStore) -> Result<()>;
}

/// Records a build signature for a finalized store
pub trait SignatureWriter {
    fn finalize(&self, file: &str, d: &mut DataStore, variant: Option<&str>) -> Result<()>;
}

/// Borrowed bundle of every collaborator the pipeline needs
#[derive(Clone, Copy)]
pub struct Providers<'a> {
    pub includes: &'a dyn FileIncluder,
    pub classes: &'a dyn ClassInheritor,
    pub events: &'a dyn EventBus,
    pub scripts: &'a dyn ScriptEngine,
    pub methods: &'a dyn MethodPool,
    pub tasks: &'a dyn TaskRegistry,
    pub signatures: &'a dyn SignatureWriter,
}

impl<'a> Providers<'a> {
    /// Bundle a single driver that implements every collaborator trait
    pub fn from_driver<D>(driver: &'a D) -> Self
    where
        D: FileIncluder
            + ClassInheritor
            + EventBus
            + ScriptEngine
            + MethodPool
            + TaskRegistry
            + SignatureWriter,
    {
        Self {
            includes: driver,
            classes: driver,
            events: driver,
            scripts: driver,
            methods: driver,
            tasks: driver,
            signatures: driver,
        }
    }
}
