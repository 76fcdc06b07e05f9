//! Variable-reference expansion
//!
//! `${NAME}` references resolve recursively against the store. A name
//! containing `@`, `:`, whitespace or braces is never treated as a
//! reference (inline script fragments like `${@...}` and override-qualified
//! names must survive verbatim), and references to undefined variables are
//! left in place.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DataError, Result};
use crate::store::DataStore;

static VAR_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{[^{}@\n\t :]+\}").unwrap());

pub(crate) fn expand(d: &DataStore, text: &str) -> Result<String> {
    let mut in_flight = Vec::new();
    expand_with(d, text, &mut in_flight)
}

fn expand_with(d: &DataStore, text: &str, in_flight: &mut Vec<String>) -> Result<String> {
    if !text.contains("${") {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for reference in VAR_REF.find_iter(text) {
        out.push_str(&text[last..reference.start()]);
        last = reference.end();

        let name = &text[reference.start() + 2..reference.end() - 1];
        match d.get_var(name) {
            None => out.push_str(reference.as_str()),
            Some(value) => {
                if in_flight.iter().any(|n| n == name) {
                    return Err(DataError::CircularReference {
                        var: name.to_string(),
                    });
                }
                in_flight.push(name.to_string());
                let expanded = expand_with(d, value, in_flight)?;
                in_flight.pop();
                out.push_str(&expanded);
            }
        }
    }
    out.push_str(&text[last..]);
    Ok(out)
}
