//! Statement AST for the Kiln recipe language
//!
//! One node per parsed construct, immutable once built. [`Statement::eval`]
//! applies a construct to a metadata store, calling out to the provider
//! bundle where the language reaches beyond the store itself. Statement
//! order is the semantic backbone of the language: later statements observe
//! everything earlier ones did, and the whole override system depends on
//! that.

use serde::{Deserialize, Serialize};
use tracing::debug;

use kiln_data::{apply_overrides, flags, vars, DataStore, Provenance, VarOp};

use crate::error::Result;
use crate::providers::{IncludePolicy, Providers};

/// Function name marking a body as anonymous, deferred to finalization
pub const ANONYMOUS_MARKER: &str = "__anonymous";

/// Source location a statement was parsed from, for diagnostics only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub file: String,
    pub line: u32,
}

impl Origin {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    fn prov(&self, op: VarOp) -> Provenance {
        Provenance::at(self.file.as_str(), self.line, op)
    }
}

/// One variable assignment with its operation markers
///
/// Markers are independent captures from the parser; evaluation resolves
/// their precedence (see [`Statement::eval`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub key: String,
    /// Flag scope: reads and writes target this flag of `key`, not its value
    pub flag: Option<String>,
    /// `export`: also mark the key exported
    pub export: bool,
    /// `?=`: keep any current value
    pub conditional: bool,
    /// `??=`: store into the weak-default flag
    pub lazy_default: bool,
    /// `:=`: expand against a snapshot of the store at assignment time
    pub immediate: bool,
    /// `+=`: current value, one space, the literal
    pub append: bool,
    /// `=+`: the literal, one space, the current value
    pub prepend: bool,
    /// `.=`: current value then the literal, no separator
    pub post_concat: bool,
    /// `=.`: the literal then the current value, no separator
    pub pre_concat: bool,
    pub value: String,
}

impl Assignment {
    /// Plain `key = value` with no markers
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

/// Parsed construct kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    /// Pull another file's statements into this store
    Include { target: String, required: bool },
    /// Mark a variable for export to task environments
    Export { var: String },
    /// Variable assignment, see [`Assignment`]
    Assign(Assignment),
    /// Named or anonymous function-body registration
    Function { name: String, body: Vec<String> },
    /// Inline scripting-language function registration
    ScriptFunction {
        name: String,
        module: String,
        body: Vec<String>,
    },
    /// Overwrite the scripted/privileged markers on a function
    FunctionFlags {
        name: String,
        scripted: bool,
        privileged: bool,
    },
    /// Generate public wrappers for a class's private implementations
    ExportFunctions { class: String, functions: String },
    /// Register a task with optional ordering hints
    AddTask {
        task: String,
        before: Option<String>,
        after: Option<String>,
    },
    /// Remove a previously registered task
    DeleteTask { task: String },
    /// Register event handlers by function name
    AddHandlers { handlers: String },
    /// Apply the named classes' statements to this store
    Inherit { classes: String },
}

/// One parsed statement with its source origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub origin: Origin,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(origin: Origin, kind: StatementKind) -> Self {
        Self { origin, kind }
    }

    /// Apply this statement to the store
    pub fn eval(&self, d: &mut DataStore, p: &Providers<'_>) -> Result<()> {
        match &self.kind {
            StatementKind::Include { target, required } => {
                self.eval_include(target, *required, d, p)
            }
            StatementKind::Export { var } => {
                d.set_flag(var.as_str(), flags::EXPORT, "1", self.origin.prov(VarOp::Export));
                Ok(())
            }
            StatementKind::Assign(assignment) => self.eval_assign(assignment, d),
            StatementKind::Function { name, body } => self.eval_function(name, body, d, p),
            StatementKind::ScriptFunction { name, module, body } => {
                self.eval_script_function(name, module, body, d, p)
            }
            StatementKind::FunctionFlags {
                name,
                scripted,
                privileged,
            } => {
                self.eval_function_flags(name, *scripted, *privileged, d);
                Ok(())
            }
            StatementKind::ExportFunctions { class, functions } => {
                self.eval_export_functions(class, functions, d);
                Ok(())
            }
            StatementKind::AddTask {
                task,
                before,
                after,
            } => p.tasks.add_task(task, before.as_deref(), after.as_deref(), d),
            StatementKind::DeleteTask { task } => p.tasks.delete_task(task, d),
            StatementKind::AddHandlers { handlers } => {
                self.eval_add_handlers(handlers, d);
                Ok(())
            }
            StatementKind::Inherit { classes } => {
                p.classes
                    .inherit(classes, &self.origin.file, self.origin.line, d)
            }
        }
    }

    fn eval_include(
        &self,
        target: &str,
        required: bool,
        d: &mut DataStore,
        p: &Providers<'_>,
    ) -> Result<()> {
        let path = d.expand(target)?;
        let policy = if required {
            IncludePolicy::Required
        } else {
            IncludePolicy::Optional
        };
        debug!(from = %self.origin.file, target = %path, ?policy, "including file");
        p.includes
            .include(&self.origin.file, &path, self.origin.line, d, policy)
    }

    fn eval_assign(&self, a: &Assignment, d: &mut DataStore) -> Result<()> {
        if a.export {
            d.set_flag(
                a.key.as_str(),
                flags::EXPORT,
                "1",
                self.origin.prov(VarOp::Export),
            );
        }

        let (op, value) = if a.conditional {
            match current_value(a, d) {
                Some(current) => (VarOp::SetIfUnset, current),
                None => (VarOp::SetIfUnset, a.value.clone()),
            }
        } else if a.immediate {
            // snapshot semantics: later mutations must not leak into the
            // stored result, so overrides resolve on a private fork
            let mut snapshot = d.fork();
            apply_overrides(&mut snapshot)?;
            (VarOp::Immediate, snapshot.expand(&a.value)?)
        } else if a.append {
            let current = current_value(a, d).unwrap_or_default();
            (VarOp::Append, format!("{} {}", current, a.value))
        } else if a.prepend {
            let current = current_value(a, d).unwrap_or_default();
            (VarOp::Prepend, format!("{} {}", a.value, current))
        } else if a.post_concat {
            let current = current_value(a, d).unwrap_or_default();
            (VarOp::PostConcat, format!("{}{}", current, a.value))
        } else if a.pre_concat {
            let current = current_value(a, d).unwrap_or_default();
            (VarOp::PreConcat, format!("{}{}", a.value, current))
        } else {
            (VarOp::Set, a.value.clone())
        };

        let prov = self.origin.prov(op).with_detail(a.value.as_str());
        match (&a.flag, a.lazy_default) {
            (Some(flag), _) => d.set_flag(a.key.as_str(), flag.as_str(), value, prov),
            (None, true) => d.set_flag(a.key.as_str(), flags::DEFAULT, value, prov),
            (None, false) => d.set_var(a.key.as_str(), value, prov),
        }
        Ok(())
    }

    fn eval_function(
        &self,
        name: &str,
        body: &[String],
        d: &mut DataStore,
        p: &Providers<'_>,
    ) -> Result<()> {
        let text = body.join("\n");
        if name == ANONYMOUS_MARKER {
            let func = anonymous_name(&self.origin);
            let source = format!("def {func}(d):\n{text}");
            p.methods.insert_method(&func, &source, &self.origin.file)?;
            d.append_to_list(vars::DEFERRED_FUNCS, &func);
            d.set_var(func.as_str(), source, self.origin.prov(VarOp::Set));
        } else {
            d.set_flag(name, flags::FUNC, "1", self.origin.prov(VarOp::Set));
            d.set_var(name, text, self.origin.prov(VarOp::Set));
        }
        Ok(())
    }

    fn eval_script_function(
        &self,
        name: &str,
        module: &str,
        body: &[String],
        d: &mut DataStore,
        p: &Providers<'_>,
    ) -> Result<()> {
        let text = body.join("\n");
        p.methods.insert_method(module, &text, &self.origin.file)?;
        d.set_flag(name, flags::FUNC, "1", self.origin.prov(VarOp::Set));
        d.set_flag(name, flags::SCRIPTED, "1", self.origin.prov(VarOp::Set));
        d.set_var(name, text, self.origin.prov(VarOp::Set));
        Ok(())
    }

    fn eval_function_flags(&self, name: &str, scripted: bool, privileged: bool, d: &mut DataStore) {
        // full overwrite of both markers, never a merge with earlier ones
        if scripted {
            d.set_flag(name, flags::SCRIPTED, "1", self.origin.prov(VarOp::Set));
        } else {
            d.del_flag(name, flags::SCRIPTED);
        }
        if privileged {
            d.set_flag(name, flags::PRIVILEGED, "1", self.origin.prov(VarOp::Set));
        } else {
            d.del_flag(name, flags::PRIVILEGED);
        }
    }

    fn eval_export_functions(&self, class: &str, functions: &str, d: &mut DataStore) {
        for func in functions.split_whitespace() {
            let private = format!("{class}_{func}");

            // first writer wins: never clobber a user-supplied function
            if d.get_var(func).is_some() && d.get_flag(func, flags::WRAPPER).is_none() {
                continue;
            }

            if d.get_var(func).is_some() {
                d.del_flag(func, flags::SCRIPTED);
                d.del_flag(func, flags::FUNC);
            }

            for flag in [flags::FUNC, flags::SCRIPTED] {
                if let Some(value) = d.get_flag(&private, flag).map(String::from) {
                    d.set_flag(func, flag, value, self.origin.prov(VarOp::Set));
                }
            }
            if let Some(dirs) = d.get_flag(&private, flags::DIRS).map(String::from) {
                d.set_flag(func, flags::DIRS, dirs, self.origin.prov(VarOp::Set));
            } else if let Some(dirs) = d.get_flag(func, flags::DIRS).map(String::from) {
                d.set_flag(private.as_str(), flags::DIRS, dirs, self.origin.prov(VarOp::Set));
            }

            let body = if d.get_flag(&private, flags::SCRIPTED).is_some() {
                format!("    exec_func('{private}', d)\n")
            } else {
                format!("    {private}\n")
            };
            d.set_var(func, body, self.origin.prov(VarOp::Set));
            d.set_flag(func, flags::WRAPPER, "1", self.origin.prov(VarOp::Set));
        }
    }

    fn eval_add_handlers(&self, handlers: &str, d: &mut DataStore) {
        for handler in handlers.split_whitespace() {
            d.append_to_list(vars::EVENT_HANDLERS, handler);
            d.set_flag(handler, flags::HANDLER, "1", self.origin.prov(VarOp::Set));
        }
    }
}

/// Current value under the assignment's scope: the flag when one is named,
/// else the plain value with weak defaults ignored
fn current_value(a: &Assignment, d: &DataStore) -> Option<String> {
    match &a.flag {
        Some(flag) => d.get_flag(&a.key, flag).map(String::from),
        None => d.get_var_no_default(&a.key).map(String::from),
    }
}

/// Deterministic function name for an anonymous body at an origin
fn anonymous_name(origin: &Origin) -> String {
    let mangled: String = origin
        .file
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("__anon_{}_{}", origin.line, mangled)
}

/// Ordered statements for one parsed file
///
/// Builders mirror the parser's capture groups; a task statement without a
/// captured function name is dropped here rather than erroring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementGroup {
    statements: Vec<Statement>,
}

impl StatementGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn push_include(&mut self, origin: Origin, target: impl Into<String>, required: bool) {
        self.push(Statement::new(
            origin,
            StatementKind::Include {
                target: target.into(),
                required,
            },
        ));
    }

    pub fn push_export(&mut self, origin: Origin, var: impl Into<String>) {
        self.push(Statement::new(
            origin,
            StatementKind::Export { var: var.into() },
        ));
    }

    pub fn push_assignment(&mut self, origin: Origin, assignment: Assignment) {
        self.push(Statement::new(origin, StatementKind::Assign(assignment)));
    }

    pub fn push_function(&mut self, origin: Origin, name: impl Into<String>, body: Vec<String>) {
        self.push(Statement::new(
            origin,
            StatementKind::Function {
                name: name.into(),
                body,
            },
        ));
    }

    pub fn push_script_function(
        &mut self,
        origin: Origin,
        name: impl Into<String>,
        module: impl Into<String>,
        body: Vec<String>,
    ) {
        self.push(Statement::new(
            origin,
            StatementKind::ScriptFunction {
                name: name.into(),
                module: module.into(),
                body,
            },
        ));
    }

    pub fn push_function_flags(
        &mut self,
        origin: Origin,
        name: impl Into<String>,
        scripted: bool,
        privileged: bool,
    ) {
        self.push(Statement::new(
            origin,
            StatementKind::FunctionFlags {
                name: name.into(),
                scripted,
                privileged,
            },
        ));
    }

    pub fn push_export_functions(
        &mut self,
        origin: Origin,
        class: impl Into<String>,
        functions: impl Into<String>,
    ) {
        self.push(Statement::new(
            origin,
            StatementKind::ExportFunctions {
                class: class.into(),
                functions: functions.into(),
            },
        ));
    }

    /// Dropped silently when no task name was captured
    pub fn push_add_task(
        &mut self,
        origin: Origin,
        task: Option<&str>,
        before: Option<&str>,
        after: Option<&str>,
    ) {
        let Some(task) = task else { return };
        self.push(Statement::new(
            origin,
            StatementKind::AddTask {
                task: task.to_string(),
                before: before.map(String::from),
                after: after.map(String::from),
            },
        ));
    }

    /// Dropped silently when no task name was captured
    pub fn push_del_task(&mut self, origin: Origin, task: Option<&str>) {
        let Some(task) = task else { return };
        self.push(Statement::new(
            origin,
            StatementKind::DeleteTask {
                task: task.to_string(),
            },
        ));
    }

    pub fn push_handlers(&mut self, origin: Origin, handlers: impl Into<String>) {
        self.push(Statement::new(
            origin,
            StatementKind::AddHandlers {
                handlers: handlers.into(),
            },
        ));
    }

    pub fn push_inherit(&mut self, origin: Origin, classes: impl Into<String>) {
        self.push(Statement::new(
            origin,
            StatementKind::Inherit {
                classes: classes.into(),
            },
        ));
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }

    /// Apply every statement in order
    pub fn eval(&self, d: &mut DataStore, p: &Providers<'_>) -> Result<()> {
        for statement in &self.statements {
            statement.eval(d, p)?;
        }
        Ok(())
    }
}
