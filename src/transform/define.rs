//! `define` and `provide` stages, appended to script chains per session.

use regex::{Captures, Regex};

use super::{DefineOptions, Dependency, ModuleKind, Payload, ProvideOptions, StageError};

/// Replace every identifier path in `options.values` with its source text.
pub(super) fn define(options: &DefineOptions, mut payload: Payload) -> Result<Payload, StageError> {
    if options.values.is_empty() {
        return Ok(payload);
    }
    require_script(&payload)?;

    // Longest key first so `process.env.A_B` wins over `process.env.A`
    let mut keys: Vec<&String> = options.values.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = Regex::new(&format!(r"(^|[^\w$.])({alternation})\b"))
        .map_err(|err| StageError::Parse(err.to_string()))?;

    let source = std::str::from_utf8(&payload.bytes)?;
    let replaced = pattern.replace_all(source, |caps: &Captures<'_>| {
        let value = options.values.get(&caps[2]).map_or(&caps[2], String::as_str);
        format!("{}{value}", &caps[1])
    });
    payload.bytes = replaced.into_owned().into_bytes();
    Ok(payload)
}

/// Import modules for free identifiers (`_` → `lodash`).
///
/// The import is prepended to line 1 so line mappings stay valid.
pub(super) fn provide(options: &ProvideOptions, mut payload: Payload) -> Result<Payload, StageError> {
    if options.bindings.is_empty() {
        return Ok(payload);
    }
    require_script(&payload)?;

    let source = std::str::from_utf8(&payload.bytes)?;
    let mut prelude = String::new();
    let mut provided = Vec::new();
    for (identifier, module) in &options.bindings {
        if uses_free(source, identifier)? {
            prelude.push_str(&format!(
                "var {identifier} = require({}); ",
                serde_json::to_string(module).unwrap_or_default()
            ));
            provided.push(module.clone());
        }
    }
    if prelude.is_empty() {
        return Ok(payload);
    }

    let mut bytes = prelude.into_bytes();
    bytes.extend_from_slice(&payload.bytes);
    payload.bytes = bytes;
    for module in provided {
        payload.depend(Dependency::import(module));
    }
    Ok(payload)
}

/// Used and not declared in this module.
fn uses_free(source: &str, identifier: &str) -> Result<bool, StageError> {
    let escaped = regex::escape(identifier);
    let usage = Regex::new(&format!(r"(?:^|[^\w$.]){escaped}(?:[^\w$]|$)"))
        .map_err(|err| StageError::Parse(err.to_string()))?;
    let declaration = Regex::new(&format!(
        r"(?:\b(?:var|let|const|function|class)\s+|[(,]\s*){escaped}(?:[^\w$]|$)"
    ))
    .map_err(|err| StageError::Parse(err.to_string()))?;
    Ok(usage.is_match(source) && !declaration.is_match(source))
}

fn require_script(payload: &Payload) -> Result<(), StageError> {
    if payload.kind == ModuleKind::Script {
        Ok(())
    } else {
        Err(StageError::WrongKind {
            expected: ModuleKind::Script.as_str(),
            found: payload.kind.as_str(),
        })
    }
}
