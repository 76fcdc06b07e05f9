//! The finalization sequence
//!
//! Finalization turns an evaluated store into a complete unit: handlers are
//! registered, keys and overrides resolve, deferred functions run, and the
//! task graph is assembled. The step order is fixed; every unit and every
//! variant goes through the same sequence exactly once.

use tracing::debug;

use kiln_ast::providers::{Notification, Providers};
use kiln_ast::Result;
use kiln_data::{apply_overrides, expand_keys, flags, vars, DataStore, Provenance};

/// Finalize an evaluated store
///
/// `variant` names the variant being finalized, `None` for the baseline;
/// it is forwarded to the signature writer untouched. A skip raised by a
/// deferred function aborts the sequence and surfaces to the caller.
pub fn finalize(
    file: &str,
    d: &mut DataStore,
    p: &Providers<'_>,
    variant: Option<&str>,
) -> Result<()> {
    register_handlers(d, p)?;

    p.events.fire(Notification::PreFinalize { file }, d)?;

    expand_keys(d)?;
    apply_overrides(d)?;

    run_deferred_functions(d, p)?;

    // deferred functions may have written override-qualified names
    apply_overrides(d)?;

    let tasks = d.get_list(vars::TASKS);
    let deleted = d.get_list(vars::DELETED_TASKS);
    p.tasks.materialize(&tasks, &deleted, d)?;

    p.signatures.finalize(file, d, variant)?;

    let depends = p.includes.file_depends(d);
    if !depends.is_empty() {
        d.set_var(
            vars::INCLUDED_FILES,
            depends.join(" "),
            Provenance::internal(),
        );
    }

    p.events.fire(Notification::Parsed { file }, d)
}

/// Register every function on the handler list with the event bus
///
/// The subscription mask comes from the handler's `eventmask` flag,
/// expanded and whitespace-split; an absent flag subscribes to everything.
fn register_handlers(d: &DataStore, p: &Providers<'_>) -> Result<()> {
    for name in d.get_list(vars::EVENT_HANDLERS) {
        let mask: Vec<String> = match d.get_flag(&name, flags::EVENT_MASK) {
            Some(raw) => d
                .expand(raw)?
                .split_whitespace()
                .map(String::from)
                .collect(),
            None => Vec::new(),
        };
        p.events.register(&name, d.get_var(&name), &mask)?;
    }
    Ok(())
}

/// Run the deferred anonymous functions as one script, in registration order
fn run_deferred_functions(d: &mut DataStore, p: &Providers<'_>) -> Result<()> {
    let funcs = d.get_list(vars::DEFERRED_FUNCS);
    if funcs.is_empty() {
        return Ok(());
    }
    debug!(count = funcs.len(), "running deferred functions");
    let calls: Vec<String> = funcs.iter().map(|name| format!("{name}(d)")).collect();
    p.scripts.execute(&calls.join("\n"), d)
}
