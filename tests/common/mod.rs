//! Shared provider bundle for the integration tests
//!
//! Include and inherit resolve against canned statement groups, and script
//! execution dispatches `name(d)` calls to closures registered per function
//! name, mirroring how a real driver would wire the pipeline.

use std::collections::HashMap;
use std::sync::RwLock;

use kiln::ast::memory::{MemoryEventBus, MemoryMethodPool, MemorySignatures, StoreTaskRegistry};
use kiln::ast::providers::{
    ClassInheritor, EventBus, FileIncluder, IncludePolicy, MethodPool, Notification, Providers,
    ScriptEngine, SignatureWriter, TaskRegistry,
};
use kiln::ast::{EvalError, Result, StatementGroup};
use kiln::data::DataStore;

pub type ScriptBody = Box<dyn Fn(&mut DataStore) -> Result<()>>;

#[derive(Default)]
pub struct FakeDriver {
    pub events: MemoryEventBus,
    pub methods: MemoryMethodPool,
    pub tasks: StoreTaskRegistry,
    pub signatures: MemorySignatures,
    files: HashMap<String, StatementGroup>,
    classes: HashMap<String, StatementGroup>,
    bodies: RwLock<HashMap<String, ScriptBody>>,
    includes: RwLock<Vec<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, group: StatementGroup) -> Self {
        self.files.insert(path.to_string(), group);
        self
    }

    pub fn with_class(mut self, name: &str, group: StatementGroup) -> Self {
        self.classes.insert(name.to_string(), group);
        self
    }

    pub fn with_body(
        self,
        name: &str,
        body: impl Fn(&mut DataStore) -> Result<()> + 'static,
    ) -> Self {
        self.bodies
            .write()
            .unwrap()
            .insert(name.to_string(), Box::new(body));
        self
    }

    /// Every include resolved so far, in order
    pub fn included(&self) -> Vec<String> {
        self.includes.read().unwrap().clone()
    }
}

impl FileIncluder for FakeDriver {
    fn include(
        &self,
        _from: &str,
        path: &str,
        _line: u32,
        d: &mut DataStore,
        policy: IncludePolicy,
    ) -> Result<()> {
        match self.files.get(path) {
            Some(group) => {
                self.includes.write().unwrap().push(path.to_string());
                group.eval(d, &Providers::from_driver(self))
            }
            None if policy == IncludePolicy::Optional => Ok(()),
            None => Err(EvalError::IncludeFailed {
                path: path.to_string(),
                reason: "no such file".to_string(),
            }),
        }
    }

    fn file_depends(&self, _d: &DataStore) -> Vec<String> {
        self.includes.read().unwrap().clone()
    }
}

impl ClassInheritor for FakeDriver {
    fn inherit(&self, classes: &str, _from: &str, _line: u32, d: &mut DataStore) -> Result<()> {
        for class in classes.split_whitespace() {
            let Some(group) = self.classes.get(class) else {
                return Err(EvalError::InheritFailed {
                    class: class.to_string(),
                    reason: "no such class".to_string(),
                });
            };
            group.eval(d, &Providers::from_driver(self))?;
        }
        Ok(())
    }
}

impl EventBus for FakeDriver {
    fn register(&self, name: &str, body: Option<&str>, mask: &[String]) -> Result<()> {
        self.events.register(name, body, mask)
    }

    fn fire(&self, event: Notification<'_>, d: &mut DataStore) -> Result<()> {
        self.events.fire(event, d)
    }
}

impl ScriptEngine for FakeDriver {
    fn execute(&self, source: &str, d: &mut DataStore) -> Result<()> {
        for line in source.lines() {
            let name = line.trim_end_matches("(d)");
            if let Some(body) = self.bodies.read().unwrap().get(name) {
                body(d)?;
            }
        }
        Ok(())
    }
}

impl MethodPool for FakeDriver {
    fn insert_method(&self, name: &str, source: &str, file: &str) -> Result<()> {
        self.methods.insert_method(name, source, file)
    }
}

impl TaskRegistry for FakeDriver {
    fn add_task(
        &self,
        task: &str,
        before: Option<&str>,
        after: Option<&str>,
        d: &mut DataStore,
    ) -> Result<()> {
        self.tasks.add_task(task, before, after, d)
    }

    fn delete_task(&self, task: &str, d: &mut DataStore) -> Result<()> {
        self.tasks.delete_task(task, d)
    }

    fn materialize(&self, tasks: &[String], deleted: &[String], d: &mut DataStore) -> Result<()> {
        self.tasks.materialize(tasks, deleted, d)
    }
}

impl SignatureWriter for FakeDriver {
    fn finalize(&self, file: &str, d: &mut DataStore, variant: Option<&str>) -> Result<()> {
        self.signatures.finalize(file, d, variant)
    }
}
