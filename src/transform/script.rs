//! `script` stage: reference scan and ES module lowering.
//!
//! Recognized forms, all matched at statement start:
//!
//! ```text
//! import d from "m"            var d = require.d(require("m"));
//! import * as ns from "m"      var ns = require("m");
//! import { a, b as c } from "m"
//! import "m"                   require("m");
//! export * from "m"
//! export { a } from "m"
//! export { a, b as c }
//! export const x = ...         const x = ...   (+ exports.x at the end)
//! export function f() {}       function f() {} (+ exports.f on line 1)
//! export default expr          exports.default = expr
//! import("m")                  Promise.resolve().then(...)
//! ```
//!
//! Every rewrite keeps the newline count of the text it replaces, so line
//! `n` of the output is line `n` of the source.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::{Dependency, ModuleKind, Payload, ScriptOptions, SourceMapFragment, StageContext, StageError};

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^([ \t]*)import\s*(?:([\w$*{}\s,]+?)\s*from\s*)?["']([^"'\n]+)["'][ \t]*;?"#,
    )
    .unwrap()
});

static EXPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^([ \t]*)export\s*(\*(?:\s*as\s+[\w$]+)?|\{[^}]*\})\s*from\s*["']([^"'\n]+)["'][ \t]*;?"#,
    )
    .unwrap()
});

static EXPORT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)export\s*\{([^}]*)\}[ \t]*;?").unwrap());

static EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)export\s+((?:async\s+)?function\s*\*?|class|const|let|var)\s*([\w$]+)")
        .unwrap()
});

static EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)export\s+default\s+").unwrap());

static REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#).unwrap());

static DYNAMIC_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bimport\s*\(\s*["']([^"'\n]+)["']\s*\)"#).unwrap());

const ES_MODULE_MARKER: &str = "Object.defineProperty(exports, \"__esModule\", { value: true });";

pub(super) fn apply(
    options: &ScriptOptions,
    ctx: &StageContext<'_>,
    mut payload: Payload,
) -> Result<Payload, StageError> {
    let source = std::str::from_utf8(&payload.bytes)?.to_string();

    for specifier in scan(&source) {
        payload.depend(Dependency::import(specifier));
    }

    let output = if options.lower_esm {
        lower(&source)
    } else {
        source.clone()
    };

    if payload.source_map.is_none() {
        payload.source_map = Some(SourceMapFragment {
            source: ctx.id.to_string(),
            content: source,
        });
    }
    payload.bytes = output.into_bytes();
    payload.kind = ModuleKind::Script;
    Ok(payload)
}

/// Referenced specifiers in source order.
pub fn scan(source: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for caps in IMPORT.captures_iter(source) {
        found.push((caps.get(0).map_or(0, |m| m.start()), caps[3].to_string()));
    }
    for caps in EXPORT_FROM.captures_iter(source) {
        found.push((caps.get(0).map_or(0, |m| m.start()), caps[3].to_string()));
    }
    for regex in [&*REQUIRE, &*DYNAMIC_IMPORT] {
        for caps in regex.captures_iter(source) {
            found.push((caps.get(0).map_or(0, |m| m.start()), caps[1].to_string()));
        }
    }
    found.sort_by_key(|(offset, _)| *offset);

    let mut specifiers: Vec<String> = Vec::with_capacity(found.len());
    for (_, specifier) in found {
        if !specifiers.contains(&specifier) {
            specifiers.push(specifier);
        }
    }
    specifiers
}

/// Lower static module syntax to the chunk runtime's `require`/`exports`.
pub fn lower(source: &str) -> String {
    let mut lowering = Lowering::default();

    let text = EXPORT_FROM.replace_all(source, |caps: &Captures<'_>| {
        lowering.exported = true;
        let statement = lowering.export_from(&caps[2], &caps[3]);
        keep_lines(&caps[1], statement, &caps[0])
    });
    let text = IMPORT.replace_all(&text, |caps: &Captures<'_>| {
        let statement = match caps.get(2) {
            Some(clause) => lowering.import(clause.as_str(), &caps[3]),
            None => format!("require({});", quote(&caps[3])),
        };
        keep_lines(&caps[1], statement, &caps[0])
    });
    let text = EXPORT_LIST.replace_all(&text, |caps: &Captures<'_>| {
        lowering.exported = true;
        let assignments: Vec<String> = bindings(&caps[2])
            .map(|(local, exported)| format!("exports.{exported} = {local};"))
            .collect();
        keep_lines(&caps[1], assignments.join(" "), &caps[0])
    });
    let text = EXPORT_DECL.replace_all(&text, |caps: &Captures<'_>| {
        lowering.exported = true;
        let keyword = caps[2].trim_end();
        let name = caps[3].to_string();
        if keyword.contains("function") {
            lowering.hoisted.push(name.clone());
        } else {
            lowering.trailing.push(name.clone());
        }
        keep_lines(&caps[1], format!("{keyword} {name}"), &caps[0])
    });
    let text = EXPORT_DEFAULT.replace_all(&text, |caps: &Captures<'_>| {
        lowering.exported = true;
        format!("{}exports.default = ", &caps[1])
    });
    let text = DYNAMIC_IMPORT.replace_all(&text, |caps: &Captures<'_>| {
        format!(
            "Promise.resolve().then(function () {{ return require({}); }})",
            quote(&caps[1])
        )
    });

    lowering.finish(&text)
}

#[derive(Default)]
struct Lowering {
    counter: usize,
    exported: bool,
    /// Function exports, assigned on line 1 (declarations are hoisted)
    hoisted: Vec<String>,
    /// Binding exports, assigned after the module body
    trailing: Vec<String>,
}

impl Lowering {
    fn temp(&mut self) -> String {
        let name = format!("__weft_{}", self.counter);
        self.counter += 1;
        name
    }

    fn import(&mut self, clause: &str, specifier: &str) -> String {
        let clause = clause.trim();
        let required = format!("require({})", quote(specifier));

        let (default, rest) = match clause.find([',', '{', '*']) {
            Some(0) => (None, clause),
            Some(i) => (
                Some(clause[..i].trim()),
                clause[i..].trim_start_matches([',', ' ', '\t', '\n', '\r']),
            ),
            None => (Some(clause), ""),
        };
        let default = default.filter(|d| !d.is_empty());

        let namespace = rest
            .strip_prefix('*')
            .and_then(|r| r.trim_start().strip_prefix("as"))
            .map(str::trim);
        let named = rest
            .find('{')
            .and_then(|start| rest[start + 1..].find('}').map(|end| &rest[start + 1..start + 1 + end]));

        let mut declarations = Vec::new();
        let holder = match (namespace, named) {
            (Some(ns), _) => {
                declarations.push(format!("{ns} = {required}"));
                ns.to_string()
            }
            (None, Some(_)) => {
                let temp = self.temp();
                declarations.push(format!("{temp} = {required}"));
                temp
            }
            (None, None) => {
                if let Some(default) = default {
                    return format!("var {default} = require.d({required});");
                }
                return format!("{required};");
            }
        };
        if let Some(default) = default {
            declarations.push(format!("{default} = require.d({holder})"));
        }
        if let Some(named) = named {
            for (imported, local) in bindings(named) {
                declarations.push(format!("{local} = {holder}.{imported}"));
            }
        }
        format!("var {};", declarations.join(", "))
    }

    fn export_from(&mut self, clause: &str, specifier: &str) -> String {
        let required = format!("require({})", quote(specifier));
        if let Some(star) = clause.strip_prefix('*') {
            return match star.trim_start().strip_prefix("as") {
                Some(name) => format!("exports.{} = {required};", name.trim()),
                None => format!(
                    "(function (s) {{ for (var k in s) if (k !== \"default\" && !(k in exports)) exports[k] = s[k]; }})({required});"
                ),
            };
        }

        let temp = self.temp();
        let mut statements = vec![format!("var {temp} = {required};")];
        let inner = clause.trim_start_matches('{').trim_end_matches('}');
        for (imported, exported) in bindings(inner) {
            statements.push(format!("exports.{exported} = {temp}.{imported};"));
        }
        statements.join(" ")
    }

    fn finish(self, body: &str) -> String {
        if !self.exported {
            return body.to_string();
        }

        let mut out = String::with_capacity(body.len() + 128);
        out.push_str(ES_MODULE_MARKER);
        for name in &self.hoisted {
            out.push_str(&format!(" exports.{name} = {name};"));
        }
        out.push(' ');
        out.push_str(body);
        if !self.trailing.is_empty() {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            for name in &self.trailing {
                out.push_str(&format!("exports.{name} = {name};\n"));
            }
        }
        out
    }
}

/// `a, b as c` → `(a, a), (b, c)`.
fn bindings(list: &str) -> impl Iterator<Item = (&str, &str)> {
    list.split(',').filter_map(|item| {
        let item = item.trim();
        if item.is_empty() {
            return None;
        }
        let mut parts = item.split_whitespace();
        let first = parts.next()?;
        match (parts.next(), parts.next()) {
            (Some("as"), Some(second)) => Some((first, second)),
            _ => Some((first, first)),
        }
    })
}

fn quote(specifier: &str) -> String {
    serde_json::to_string(specifier).unwrap_or_else(|_| format!("\"{specifier}\""))
}

/// Indent + replacement + as many newlines as the replaced text held.
fn keep_lines(indent: &str, statement: String, replaced: &str) -> String {
    let newlines = replaced.matches('\n').count();
    let mut out = String::with_capacity(indent.len() + statement.len() + newlines);
    out.push_str(indent);
    out.push_str(&statement);
    out.extend(std::iter::repeat_n('\n', newlines));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_in_source_order() {
        let source = r#"import a from "./a";
const b = require('./b');
export { c } from "./c";
import "./styles.scss";
const lazy = () => import("./lazy");
import a2 from "./a";
"#;
        assert_eq!(scan(source), ["./a", "./b", "./c", "./styles.scss", "./lazy"]);
    }

    #[test]
    fn test_lower_default_and_named_imports() {
        let lowered = lower("import $ from \"jquery\";\nimport { a, b as c } from './util';\n");
        assert!(lowered.contains("var $ = require.d(require(\"jquery\"));"));
        assert!(lowered.contains("var __weft_0 = require(\"./util\"), a = __weft_0.a, c = __weft_0.b;"));
    }

    #[test]
    fn test_lower_namespace_with_default() {
        let lowered = lower("import d, * as ns from \"m\";");
        assert_eq!(lowered, "var ns = require(\"m\"), d = require.d(ns);");
    }

    #[test]
    fn test_lower_side_effect_import() {
        assert_eq!(lower("import './styles.scss';"), "require(\"./styles.scss\");");
    }

    #[test]
    fn test_lower_preserves_line_count() {
        let source = "import {\n  a,\n  b\n} from './m';\nconsole.log(a, b);\nexport default 1;\n";
        let lowered = lower(source);
        assert_eq!(lowered.lines().count(), source.lines().count());
        assert_eq!(lowered.lines().nth(4), Some("console.log(a, b);"));
    }

    #[test]
    fn test_lower_exports() {
        let lowered = lower("export const x = 1;\nexport function f() {}\nexport default f;\n");
        let first = lowered.lines().next().unwrap_or_default();
        assert!(first.starts_with(ES_MODULE_MARKER));
        assert!(first.contains("exports.f = f;"));
        assert!(first.ends_with("const x = 1;"));
        assert!(lowered.contains("exports.default = f;"));
        assert!(lowered.trim_end().ends_with("exports.x = x;"));
    }

    #[test]
    fn test_lower_export_list_and_reexports() {
        let lowered = lower("export { a, b as default };\nexport * from './all';\nexport * as ns from './ns';\n");
        assert!(lowered.contains("exports.a = a; exports.default = b;"));
        assert!(lowered.contains("require(\"./all\")"));
        assert!(lowered.contains("exports.ns = require(\"./ns\");"));
    }

    #[test]
    fn test_lower_dynamic_import() {
        let lowered = lower("load(() => import('./page'));");
        assert!(lowered.contains("return require(\"./page\");"));
    }

    #[test]
    fn test_plain_commonjs_is_untouched() {
        let source = "var _ = require('lodash');\nmodule.exports = _.noop;\n";
        assert_eq!(lower(source), source);
    }
}
