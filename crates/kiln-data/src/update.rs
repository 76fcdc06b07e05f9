//! Whole-store update passes run around finalization
//!
//! Key expansion turns computed variable names into concrete ones; override
//! application folds `<base>:<token>` variables onto their base name for
//! every active override token.

use tracing::debug;

use crate::error::Result;
use crate::reserved::vars;
use crate::store::{DataStore, Provenance, VarOp};

/// Rename every variable whose name embeds `${...}` to its expanded name
///
/// Renames run in sorted original-name order so the merge outcome is
/// deterministic when two computed names collide.
pub fn expand_keys(d: &mut DataStore) -> Result<()> {
    let mut renames = Vec::new();
    for name in d.var_names() {
        if !name.contains("${") {
            continue;
        }
        let expanded = d.expand(name)?;
        if expanded != name {
            renames.push((name.to_string(), expanded));
        }
    }
    renames.sort();

    for (old, new) in renames {
        debug!(%old, %new, "expanding variable key");
        d.rename_var(&old, new);
    }
    Ok(())
}

/// Fold override-qualified variables onto their base names
///
/// Override tokens come from the reserved overrides variable (expanded,
/// colon-separated, absent reads as none) and apply left to right, so the
/// rightmost token wins when several qualify the same base.
pub fn apply_overrides(d: &mut DataStore) -> Result<()> {
    let raw = match d.get_var(vars::OVERRIDES) {
        Some(raw) => raw.to_string(),
        None => return Ok(()),
    };
    let joined = d.expand(&raw)?;
    let tokens: Vec<&str> = joined.split(':').filter(|t| !t.is_empty()).collect();

    for token in tokens {
        let suffix = format!(":{token}");
        let mut qualified: Vec<String> = d
            .var_names()
            .filter(|n| n.len() > suffix.len() && n.ends_with(suffix.as_str()))
            .map(String::from)
            .collect();
        qualified.sort();

        for name in qualified {
            let base = name[..name.len() - suffix.len()].to_string();
            if let Some(value) = d.get_var(&name).map(String::from) {
                let prov = Provenance::for_op(VarOp::Override).with_detail(name.as_str());
                d.set_var(base, value, prov);
            }
            d.del_var(&name);
        }
    }
    Ok(())
}
