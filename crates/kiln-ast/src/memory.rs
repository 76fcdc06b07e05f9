//! In-memory collaborator implementations
//!
//! [`StoreTaskRegistry`] keeps task bookkeeping in the store itself and is
//! the implementation real drivers are expected to use. The `Memory*`
//! types record what the pipeline asked of them behind `RwLock`s; they
//! back drivers that have no real event bus, method pool, or signature
//! cache, and they make pipeline behavior easy to assert in tests.

use std::collections::HashMap;
use std::sync::RwLock;

use kiln_data::{flags, vars, DataStore, Provenance};

use crate::error::Result;
use crate::providers::{EventBus, MethodPool, Notification, SignatureWriter, TaskRegistry};

/// Task registry that keeps all bookkeeping in the store
///
/// Pending and deleted names live in the reserved list variables, ordering
/// hints in per-task flags, so forked variants carry their task state with
/// them for free.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreTaskRegistry;

impl StoreTaskRegistry {
    pub fn new() -> Self {
        Self
    }

    fn merge_flag_words(d: &mut DataStore, task: &str, flag: &str, words: &str) {
        let mut merged: Vec<String> = d
            .get_flag(task, flag)
            .map(|v| v.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        for word in words.split_whitespace() {
            if !merged.iter().any(|w| w == word) {
                merged.push(word.to_string());
            }
        }
        d.set_flag(task, flag, merged.join(" "), Provenance::internal());
    }
}

impl TaskRegistry for StoreTaskRegistry {
    fn add_task(
        &self,
        task: &str,
        before: Option<&str>,
        after: Option<&str>,
        d: &mut DataStore,
    ) -> Result<()> {
        d.set_flag(task, flags::TASK, "1", Provenance::internal());
        if !d.get_list(vars::TASKS).iter().any(|t| t == task) {
            d.append_to_list(vars::TASKS, task);
        }
        if let Some(before) = before {
            Self::merge_flag_words(d, task, flags::BEFORE, before);
        }
        if let Some(after) = after {
            Self::merge_flag_words(d, task, flags::AFTER, after);
        }
        Ok(())
    }

    fn delete_task(&self, task: &str, d: &mut DataStore) -> Result<()> {
        if !d.get_list(vars::DELETED_TASKS).iter().any(|t| t == task) {
            d.append_to_list(vars::DELETED_TASKS, task);
        }
        Ok(())
    }

    fn materialize(&self, tasks: &[String], deleted: &[String], d: &mut DataStore) -> Result<()> {
        let mut scheduled = Vec::new();
        for task in tasks {
            if deleted.iter().any(|t| t == task) {
                continue;
            }
            let name = d.expand(task)?;
            d.set_flag(name.as_str(), flags::TASK, "1", Provenance::internal());
            scheduled.push(name);
        }
        d.set_var(
            vars::SCHEDULED_TASKS,
            scheduled.join(" "),
            Provenance::internal(),
        );
        Ok(())
    }
}

/// Source registered with a method pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedMethod {
    pub source: String,
    pub file: String,
}

/// Method pool backed by an in-memory map
#[derive(Debug, Default)]
pub struct MemoryMethodPool {
    methods: RwLock<HashMap<String, InsertedMethod>>,
}

impl MemoryMethodPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source registered under `name`, if any
    pub fn get(&self, name: &str) -> Option<InsertedMethod> {
        self.methods.read().unwrap().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.read().unwrap().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.read().unwrap().is_empty()
    }
}

impl MethodPool for MemoryMethodPool {
    fn insert_method(&self, name: &str, source: &str, file: &str) -> Result<()> {
        self.methods.write().unwrap().insert(
            name.to_string(),
            InsertedMethod {
                source: source.to_string(),
                file: file.to_string(),
            },
        );
        Ok(())
    }
}

/// Handler registration recorded by [`MemoryEventBus`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredHandler {
    pub name: String,
    pub body: Option<String>,
    pub mask: Vec<String>,
}

/// Event bus that records registrations and fired notifications
#[derive(Debug, Default)]
pub struct MemoryEventBus {
    handlers: RwLock<Vec<RegisteredHandler>>,
    fired: RwLock<Vec<String>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handlers(&self) -> Vec<RegisteredHandler> {
        self.handlers.read().unwrap().clone()
    }

    /// Fired notifications as `"<kind> <file>"` strings, in order
    pub fn fired(&self) -> Vec<String> {
        self.fired.read().unwrap().clone()
    }
}

impl EventBus for MemoryEventBus {
    fn register(&self, name: &str, body: Option<&str>, mask: &[String]) -> Result<()> {
        self.handlers.write().unwrap().push(RegisteredHandler {
            name: name.to_string(),
            body: body.map(String::from),
            mask: mask.to_vec(),
        });
        Ok(())
    }

    fn fire(&self, event: Notification<'_>, _d: &mut DataStore) -> Result<()> {
        self.fired
            .write()
            .unwrap()
            .push(format!("{} {}", event.kind(), event.file()));
        Ok(())
    }
}

/// Signature writer that records each finalized (file, variant) pair
#[derive(Debug, Default)]
pub struct MemorySignatures {
    seen: RwLock<Vec<(String, Option<String>)>>,
}

impl MemorySignatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<(String, Option<String>)> {
        self.seen.read().unwrap().clone()
    }
}

impl SignatureWriter for MemorySignatures {
    fn finalize(&self, file: &str, _d: &mut DataStore, variant: Option<&str>) -> Result<()> {
        self.seen
            .write()
            .unwrap()
            .push((file.to_string(), variant.map(String::from)));
        Ok(())
    }
}
