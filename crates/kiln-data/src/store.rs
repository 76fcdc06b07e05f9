//! Mutable metadata store for recipe evaluation
//!
//! Variables hold an optional string value plus named string flags; every
//! write is recorded in a per-variable history. A store forks into a fully
//! isolated copy for variant processing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expand;
use crate::reserved::flags;

/// Operation kind recorded with each write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarOp {
    /// Plain assignment
    #[default]
    Set,
    /// Conditional assignment, applied only when the key was unset
    SetIfUnset,
    /// Assignment expanded against a snapshot at assignment time
    Immediate,
    /// Space-separated append
    Append,
    /// Space-separated prepend
    Prepend,
    /// Concatenation after the current value
    PostConcat,
    /// Concatenation before the current value
    PreConcat,
    /// Export marker
    Export,
    /// Override-qualified value folded onto its base name
    Override,
    /// Pipeline bookkeeping
    Internal,
}

impl std::fmt::Display for VarOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VarOp::Set => "set",
            VarOp::SetIfUnset => "set-if-unset",
            VarOp::Immediate => "immediate",
            VarOp::Append => "append",
            VarOp::Prepend => "prepend",
            VarOp::PostConcat => "post-concat",
            VarOp::PreConcat => "pre-concat",
            VarOp::Export => "export",
            VarOp::Override => "override",
            VarOp::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Where a write came from
///
/// Recorded for diagnostics and history only; never consulted when values
/// are read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub op: VarOp,
    /// Raw literal or other human-readable context for the write
    pub detail: Option<String>,
}

impl Provenance {
    /// Provenance carrying only an operation kind
    pub fn for_op(op: VarOp) -> Self {
        Self {
            op,
            ..Self::default()
        }
    }

    /// Provenance for pipeline bookkeeping with no source location
    pub fn internal() -> Self {
        Self::for_op(VarOp::Internal)
    }

    /// Provenance attributed to a source location
    pub fn at(file: &str, line: u32, op: VarOp) -> Self {
        Self {
            file: Some(file.to_string()),
            line: Some(line),
            op,
            detail: None,
        }
    }

    /// Attach the raw literal (or similar context) to the record
    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}

/// One variable: optional value, flags, write history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Variable {
    value: Option<String>,
    flags: HashMap<String, String>,
    history: Vec<Provenance>,
}

/// Mutable metadata store
///
/// Lookups of undefined variables or flags yield `None`, never an error;
/// callers define identity behavior for absence (append treats it as the
/// empty string, conditional assignment treats it as "not set").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataStore {
    vars: HashMap<String, Variable>,
}

impl DataStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    /// Plain variable lookup
    ///
    /// Falls back to the `defaultval` flag (the weak default) while no
    /// value has been assigned.
    pub fn get_var(&self, name: &str) -> Option<&str> {
        let var = self.vars.get(name)?;
        var.value
            .as_deref()
            .or_else(|| var.flags.get(flags::DEFAULT).map(String::as_str))
    }

    /// Variable lookup that ignores weak defaults
    pub fn get_var_no_default(&self, name: &str) -> Option<&str> {
        self.vars.get(name)?.value.as_deref()
    }

    /// Flag lookup
    pub fn get_flag(&self, name: &str, flag: &str) -> Option<&str> {
        self.vars.get(name)?.flags.get(flag).map(String::as_str)
    }

    /// Assign a value, recording the write in the variable's history
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>, prov: Provenance) {
        let var = self.vars.entry(name.into()).or_default();
        var.value = Some(value.into());
        var.history.push(prov);
    }

    /// Assign a flag value, recording the write
    pub fn set_flag(
        &mut self,
        name: impl Into<String>,
        flag: impl Into<String>,
        value: impl Into<String>,
        prov: Provenance,
    ) {
        let var = self.vars.entry(name.into()).or_default();
        var.flags.insert(flag.into(), value.into());
        var.history.push(prov);
    }

    /// Remove a variable entirely, value and flags and history
    pub fn del_var(&mut self, name: &str) {
        self.vars.remove(name);
    }

    /// Remove a single flag; missing variables and flags are ignored
    pub fn del_flag(&mut self, name: &str, flag: &str) {
        if let Some(var) = self.vars.get_mut(name) {
            var.flags.remove(flag);
        }
    }

    /// Move a variable to a new name
    ///
    /// Merges into any existing target: the moved value and flags win on
    /// conflict, the target keeps its other flags, histories concatenate.
    pub fn rename_var(&mut self, old: &str, new: impl Into<String>) {
        let Some(moved) = self.vars.remove(old) else {
            return;
        };
        let target = self.vars.entry(new.into()).or_default();
        if moved.value.is_some() {
            target.value = moved.value;
        }
        target.flags.extend(moved.flags);
        target.history.extend(moved.history);
    }

    /// Write history recorded for a variable, oldest first
    pub fn history(&self, name: &str) -> &[Provenance] {
        self.vars
            .get(name)
            .map(|v| v.history.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate the names of every variable in the store, in no fixed order
    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Whether the variable exists at all, as a value or flags
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the store holds no variables
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Expand `${NAME}` references in `text` against this store
    pub fn expand(&self, text: &str) -> Result<String> {
        expand::expand(self, text)
    }

    /// Fully isolated copy for variant processing
    ///
    /// Mutating either store after the fork never affects the other.
    pub fn fork(&self) -> DataStore {
        self.clone()
    }

    /// Read a whitespace-joined list variable
    pub fn get_list(&self, name: &str) -> Vec<String> {
        self.get_var(name)
            .map(|v| v.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Append one word to a whitespace-joined list variable
    ///
    /// Duplicates are kept; callers that need set semantics check first.
    pub fn append_to_list(&mut self, name: &str, word: &str) {
        let joined = match self.get_var(name) {
            Some(current) if !current.is_empty() => format!("{current} {word}"),
            _ => word.to_string(),
        };
        self.set_var(name, joined, Provenance::internal());
    }
}
