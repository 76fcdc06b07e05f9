//! Variant expansion
//!
//! One unit file can produce several finalized stores: the baseline, one
//! per declared version, and one per class extension stacked over each of
//! those. Every variant is an isolated fork of the caller's store; a skip
//! in one never reaches another.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use kiln_ast::error::EvalError;
use kiln_ast::providers::{IncludePolicy, Providers};
use kiln_ast::Result;
use kiln_data::{vars, DataStore, Provenance};

use crate::finalize::finalize;

/// Finalized stores keyed by variant name, the baseline under `""`
pub type VariantMap = BTreeMap<String, DataStore>;

static VERSION_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?P<from>[0-9]+)-(?P<to>[0-9]+)\]").unwrap());

/// Merge append files, finalize the baseline, and expand declared variants
///
/// Returns every resulting store keyed by variant name. The caller's store
/// receives the merged appends and the variant bookkeeping but is never
/// finalized itself; the finalized baseline is returned under `""` instead.
pub fn multi_finalize(file: &str, d: &mut DataStore, p: &Providers<'_>) -> Result<VariantMap> {
    let appends = match d.get_var(vars::APPEND_FILES) {
        Some(raw) => d.expand(raw)?,
        None => String::new(),
    };
    for append in appends.split_whitespace() {
        debug!(file, append, "merging append file");
        p.includes.include(file, append, 0, d, IncludePolicy::Required)?;
    }

    let only: Option<BTreeSet<String>> = d
        .get_var(vars::ONLY_FINALIZE)
        .map(|raw| raw.split_whitespace().map(String::from).collect());
    let allowed = |name: &str| only.as_ref().map_or(true, |set| set.contains(name));

    let mut baseline = d.fork();
    finalize_or_skip(file, &mut baseline, p, None)?;

    let decls = match baseline.get_var(vars::VERSIONS) {
        Some(raw) => baseline.expand(raw)?,
        None => String::new(),
    };
    let decls: Vec<String> = decls.split_whitespace().map(String::from).collect();

    let mut spawned: Vec<(String, DataStore)> = Vec::new();
    if !decls.is_empty() {
        let primary = match baseline.get_var(vars::VERSION) {
            Some(raw) => Some(baseline.expand(raw)?),
            None => None,
        };

        let mut versions = expand_version_ranges(decls);

        // `version:base` declares which base version a variant derives
        // from; an empty base is consumed but declares nothing
        let mut base_versions: HashMap<String, String> = HashMap::new();
        for decl in &mut versions {
            let parts: Vec<&str> = decl.split(':').collect();
            if parts.len() == 2 {
                if !parts[1].is_empty() {
                    base_versions.insert(parts[0].to_string(), parts[1].to_string());
                }
                *decl = parts[0].to_string();
            }
        }

        let declared_primary = primary.as_deref().and_then(|pv| {
            if base_versions.contains_key(pv) {
                return None;
            }
            versions.iter().position(|v| v == pv)
        });
        if let Some(pos) = declared_primary {
            // the baseline already is the store for the primary version
            versions.remove(pos);
        } else if let Some(promoted) = versions.pop() {
            // the baseline was finalized under the old primary version;
            // replace it with one finalized under the promoted version
            let mut fork = d.fork();
            apply_version(&promoted, &mut fork, &base_versions, primary.as_deref())?;
            debug!(file, version = %promoted, "promoting version to baseline");

            // later forks of the caller's store must see the promoted
            // version as their primary
            d.set_var(vars::VERSION, promoted.as_str(), Provenance::internal());
            if let Some(base) = base_versions
                .get(&promoted)
                .map(String::as_str)
                .or(primary.as_deref())
            {
                d.set_var(vars::BASE_VERSION, base, Provenance::internal());
            }

            finalize_or_skip(file, &mut fork, p, None)?;
            baseline = fork;
        }

        for version in versions {
            if !allowed(&version) {
                continue;
            }
            debug!(file, version = %version, "spawning version variant");
            let mut fork = d.fork();
            apply_version(&version, &mut fork, &base_versions, primary.as_deref())?;
            spawned.push((version, fork));
        }
    }

    let extended = match baseline.get_var(vars::EXTENSIONS) {
        Some(raw) => baseline.expand(raw)?,
        None => String::new(),
    };
    let extensions: Vec<Extension> = extended
        .split_whitespace()
        .map(Extension::parse)
        .collect();
    if !extensions.is_empty() {
        // deferred functions may have introduced the declarations; keep the
        // caller's store in agreement with the finalized baseline
        d.set_var(vars::EXTENSIONS, extended.as_str(), Provenance::internal());
        let primary_name = baseline.get_var(vars::NAME).map(String::from);

        let mut stacked: Vec<(String, DataStore)> = Vec::new();
        for ext in &extensions {
            let name = ext.label().to_string();
            if !allowed(&name) {
                continue;
            }
            debug!(file, class = %ext.class, variant = %name, "spawning extension variant");
            let mut fork = d.fork();
            apply_extension(ext, primary_name.as_deref(), file, &mut fork, p)?;
            stacked.push((name, fork));
        }
        for (base_name, base_store) in &spawned {
            for ext in &extensions {
                let name = format!("{}-{}", base_name, ext.label());
                if !allowed(&name) {
                    continue;
                }
                debug!(file, class = %ext.class, variant = %name, "spawning extension variant");
                let mut fork = base_store.fork();
                apply_extension(ext, primary_name.as_deref(), file, &mut fork, p)?;
                stacked.push((name, fork));
            }
        }
        spawned.extend(stacked);
    }

    for (name, store) in spawned.iter_mut() {
        finalize_or_skip(file, store, p, Some(name.as_str()))?;
    }

    if !spawned.is_empty() {
        let mut names: Vec<&str> = spawned.iter().map(|(name, _)| name.as_str()).collect();
        names.sort_unstable();
        d.set_var(vars::VARIANTS, names.join(" "), Provenance::internal());
    }

    let mut variants = VariantMap::new();
    variants.insert(String::new(), baseline);
    for (name, store) in spawned {
        variants.insert(name, store);
    }
    Ok(variants)
}

/// Finalize one store, converting a skip into a recorded no-op
fn finalize_or_skip(
    file: &str,
    d: &mut DataStore,
    p: &Providers<'_>,
    variant: Option<&str>,
) -> Result<()> {
    match finalize(file, d, p, variant) {
        Err(EvalError::Skipped(reason)) => {
            debug!(file, variant = variant.unwrap_or(""), %reason, "unit skipped");
            d.set_var(vars::SKIPPED, reason, Provenance::internal());
            Ok(())
        }
        other => other,
    }
}

/// Unroll `[from-to]` ranges inside version declarations
///
/// A range expands in place to one declaration per integer, ascending, and
/// expanded declarations are re-examined, so nested ranges unroll too. An
/// empty range drops its declaration; a bound too large for `u64` leaves
/// the declaration literal.
fn expand_version_ranges(decls: Vec<String>) -> Vec<String> {
    let mut stream: VecDeque<String> = decls.into();
    let mut out = Vec::new();
    while let Some(decl) = stream.pop_front() {
        let Some(captures) = VERSION_RANGE.captures(&decl) else {
            out.push(decl);
            continue;
        };
        let (Ok(from), Ok(to)) = (
            captures["from"].parse::<u64>(),
            captures["to"].parse::<u64>(),
        ) else {
            out.push(decl);
            continue;
        };
        let span = captures.get(0).unwrap();
        for n in (from..=to).rev() {
            stream.push_front(format!(
                "{}{}{}",
                &decl[..span.start()],
                n,
                &decl[span.end()..]
            ));
        }
    }
    out
}

/// Apply one version to a store: set the version variables and extend the
/// override tokens
fn apply_version(
    version: &str,
    d: &mut DataStore,
    base_versions: &HashMap<String, String>,
    fallback_base: Option<&str>,
) -> Result<()> {
    let overrides = match d.get_var(vars::OVERRIDES) {
        Some(raw) => d.expand(raw)?,
        None => String::new(),
    };
    let mut tokens: Vec<String> = overrides
        .split(':')
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    d.set_var(vars::VERSION, version, Provenance::internal());
    tokens.push(version.to_string());

    match base_versions
        .get(version)
        .map(String::as_str)
        .or(fallback_base)
    {
        Some(base) => {
            d.set_var(vars::BASE_VERSION, base, Provenance::internal());
            tokens.push(base.to_string());
        }
        None => d.del_var(vars::BASE_VERSION),
    }

    d.set_var(vars::OVERRIDES, tokens.join(":"), Provenance::internal());
    Ok(())
}

/// One class-extension declaration, `class` or `class:argument`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Extension {
    class: String,
    argument: Option<String>,
}

impl Extension {
    /// Anything after a second colon is ignored; an empty argument counts
    /// as absent.
    fn parse(decl: &str) -> Self {
        let mut parts = decl.splitn(3, ':');
        let class = parts.next().unwrap_or_default().to_string();
        let argument = parts
            .next()
            .filter(|a| !a.is_empty())
            .map(String::from);
        Self { class, argument }
    }

    /// Variant label: the argument when present, otherwise the class name
    fn label(&self) -> &str {
        self.argument.as_deref().unwrap_or(&self.class)
    }
}

/// Apply one class extension to a store and inherit its class
fn apply_extension(
    ext: &Extension,
    primary_name: Option<&str>,
    file: &str,
    d: &mut DataStore,
    p: &Providers<'_>,
) -> Result<()> {
    match &ext.argument {
        Some(argument) => {
            d.set_var(vars::EXTEND_CLASS, ext.class.as_str(), Provenance::internal());
            d.set_var(vars::EXTEND_VARIANT, argument.as_str(), Provenance::internal());
        }
        None => {
            if let Some(name) = primary_name {
                d.set_var(
                    vars::NAME,
                    format!("{name}-{}", ext.class),
                    Provenance::internal(),
                );
            }
        }
    }
    p.classes.inherit(&ext.class, file, 0, d)
}
