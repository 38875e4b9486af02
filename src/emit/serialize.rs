//! Module and chunk serialization.
//!
//! A chunk is the runtime prelude, one `define` per member module, then a
//! `run` per entry root:
//!
//! ```text
//! <runtime>
//! __weft.define("src/js/index.js", {"./util": "src/js/util.js"}, function (module, exports, require) {
//! ...module body, line for line...
//! });
//! __weft.run("src/js/index.js");
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;

use super::assets::AssetTable;
use super::sourcemap::{SourceMapBuilder, line_count};
use crate::chunk::Chunk;
use crate::core::ModuleId;
use crate::embed::RUNTIME_JS;
use crate::graph::{Module, ModuleGraph};
use crate::transform::{DependencyKind, Emission, ModuleKind, rewrite_attributes, rewrite_urls};

/// Module bytes with asset references replaced by emitted URLs. Only
/// stylesheets and markup carry such references.
pub fn rewritten_bytes<'a>(
    graph: &ModuleGraph,
    module: &'a Module,
    assets: &AssetTable,
    from_dir: Option<&str>,
) -> Cow<'a, [u8]> {
    let has_urls = graph
        .edges(&module.id)
        .iter()
        .any(|edge| edge.kind == DependencyKind::Url);
    if !has_urls {
        return Cow::Borrowed(&module.output);
    }

    let lookup = |raw: &str| {
        graph
            .edges(&module.id)
            .iter()
            .find(|edge| edge.kind == DependencyKind::Url && edge.raw == raw)
            .and_then(|edge| assets.url(&edge.target, from_dir))
    };
    match module.kind {
        ModuleKind::Style => Cow::Owned(rewrite_urls(&module.text(), lookup).into_bytes()),
        ModuleKind::Markup => Cow::Owned(rewrite_attributes(&module.text(), lookup).into_bytes()),
        ModuleKind::Script | ModuleKind::Asset => Cow::Borrowed(&module.output),
    }
}

/// A module factory registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Complete `__weft.define(...)` statement, newline-terminated
    pub text: String,
    /// Lines of the body; the body starts on the second line of `text`
    pub body_lines: usize,
}

/// Render the `define` statement for `module`.
pub fn define(graph: &ModuleGraph, module: &Module, assets: &AssetTable) -> Definition {
    let deps: BTreeMap<&str, &str> = graph
        .edges(&module.id)
        .iter()
        .filter(|edge| edge.kind == DependencyKind::Import)
        .map(|edge| (edge.specifier.as_str(), edge.target.as_str()))
        .collect();

    let mut body = body(graph, module, assets);
    if !body.ends_with('\n') {
        body.push('\n');
    }

    let text = format!(
        "__weft.define({}, {}, function (module, exports, require) {{\n{body}}});\n",
        json_string(module.id.as_str()),
        serde_json::to_string(&deps).unwrap_or_else(|_| "{}".into()),
    );
    Definition {
        body_lines: line_count(&body),
        text,
    }
}

fn body(graph: &ModuleGraph, module: &Module, assets: &AssetTable) -> String {
    if matches!(module.emission, Emission::File { .. } | Emission::Url { .. }) {
        let url = assets.url(&module.id, None).unwrap_or_default();
        return format!("module.exports = {};", json_string(&url));
    }

    match module.kind {
        ModuleKind::Script => module.text().into_owned(),
        ModuleKind::Style => {
            let mut out = style_requires(graph, &module.id);
            if module.emission == Emission::Extract {
                out.push_str("// extracted");
                return out;
            }
            let css = rewritten_bytes(graph, module, assets, None);
            let css = String::from_utf8_lossy(&css);
            let id = json_string(module.id.as_str());
            out.push_str(&format!(
                "var style = document.querySelector(\"style[data-weft-id=\" + JSON.stringify({id}) + \"]\");\n\
                 if (!style) {{\n\
                 \x20 style = document.createElement(\"style\");\n\
                 \x20 style.setAttribute(\"data-weft-id\", {id});\n\
                 \x20 document.head.appendChild(style);\n\
                 }}\n\
                 style.textContent = {};\n\
                 module.exports = style.textContent;",
                json_string(&css)
            ));
            out
        }
        ModuleKind::Markup => {
            let html = rewritten_bytes(graph, module, assets, None);
            format!("module.exports = {};", json_string(&String::from_utf8_lossy(&html)))
        }
        ModuleKind::Asset => format!("module.exports = {};", json_string(&module.text())),
    }
}

/// `@import`ed stylesheets are evaluated before the importing one.
fn style_requires(graph: &ModuleGraph, id: &ModuleId) -> String {
    graph
        .edges(id)
        .iter()
        .filter(|edge| edge.kind == DependencyKind::Import)
        .map(|edge| format!("require({});\n", json_string(&edge.specifier)))
        .collect()
}

fn json_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".into())
}

/// Serialized chunk code, plus its line map when requested.
pub fn chunk_code(
    graph: &ModuleGraph,
    chunk: &Chunk,
    assets: &AssetTable,
    with_map: bool,
) -> (String, Option<SourceMapBuilder>) {
    let mut code = String::with_capacity(RUNTIME_JS.len() + 1024);
    let mut map = with_map.then(SourceMapBuilder::new);

    code.push_str(RUNTIME_JS);
    code.push('\n');
    if let Some(map) = map.as_mut() {
        map.skip_lines(line_count(&code));
    }

    for id in &chunk.modules {
        let Some(module) = graph.module(id) else {
            continue;
        };
        let definition = define(graph, module, assets);
        if let Some(map) = map.as_mut() {
            match &module.source_map {
                Some(fragment) => {
                    let source = map.add_source(&fragment.source, &fragment.content);
                    map.skip_lines(1);
                    map.map_lines(source, definition.body_lines);
                    map.skip_lines(1);
                }
                None => map.skip_lines(definition.body_lines + 2),
            }
        }
        code.push_str(&definition.text);
    }

    for root in &chunk.roots {
        code.push_str(&format!("__weft.run({});\n", json_string(root.as_str())));
    }
    (code, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::graph::tests::module;
    use crate::transform::SourceMapFragment;
    use std::sync::Arc;

    fn with(id: &str, kind: ModuleKind, emission: Emission, text: &str) -> Arc<Module> {
        let mut m = (*module(id, 0)).clone();
        m.kind = kind;
        m.emission = emission;
        m.output = text.as_bytes().to_vec();
        Arc::new(m)
    }

    fn url_edge(raw: &str, target: &str) -> Edge {
        Edge {
            raw: raw.into(),
            specifier: raw.into(),
            target: ModuleId::new(target),
            kind: DependencyKind::Url,
        }
    }

    fn logo_table(public_path: &str) -> AssetTable {
        let mut table = AssetTable::new(public_path);
        table.insert(
            ModuleId::new("src/img/logo.png"),
            super::super::assets::AssetLocation::File {
                path: "img/logo.png".into(),
                url_path: "img/logo.png".into(),
            },
        );
        table
    }

    #[test]
    fn test_define_maps_specifiers_and_keeps_lines() {
        let mut graph = ModuleGraph::new();
        graph.insert(
            with("src/a.js", ModuleKind::Script, Emission::Inline, "var b = require(\"./b\");\nexports.x = b;"),
            vec![Edge {
                raw: "./b".into(),
                specifier: "./b".into(),
                target: ModuleId::new("src/b.js"),
                kind: DependencyKind::Import,
            }],
        );
        let module = graph.module(&ModuleId::new("src/a.js")).unwrap().clone();
        let definition = define(&graph, &module, &AssetTable::default());
        assert!(definition.text.starts_with(
            "__weft.define(\"src/a.js\", {\"./b\":\"src/b.js\"}, function (module, exports, require) {\n"
        ));
        assert!(definition.text.ends_with("exports.x = b;\n});\n"));
        assert_eq!(definition.body_lines, 2);
    }

    #[test]
    fn test_css_urls_relative_to_stylesheet() {
        let mut graph = ModuleGraph::new();
        let css = with(
            "src/css/app.css",
            ModuleKind::Style,
            Emission::Extract,
            ".a { background: url(../img/logo.png); }",
        );
        graph.insert(css.clone(), vec![url_edge("../img/logo.png", "src/img/logo.png")]);

        let out = rewritten_bytes(&graph, &css, &logo_table(""), Some("css"));
        assert_eq!(&*out, b".a { background: url(../img/logo.png); }".as_slice());
        let out = rewritten_bytes(&graph, &css, &logo_table("/static/"), Some("css"));
        assert_eq!(&*out, b".a { background: url(/static/img/logo.png); }".as_slice());
    }

    #[test]
    fn test_markup_exports_rewritten_text() {
        let mut graph = ModuleGraph::new();
        let html = with(
            "src/partial.html",
            ModuleKind::Markup,
            Emission::Inline,
            "<img src=\"./img/logo.png\">",
        );
        graph.insert(html.clone(), vec![url_edge("./img/logo.png", "src/img/logo.png")]);
        let definition = define(&graph, &html, &logo_table(""));
        assert!(definition.text.contains("module.exports = \"<img src=\\\"img/logo.png\\\">\";"));
    }

    #[test]
    fn test_chunk_line_map() {
        let mut graph = ModuleGraph::new();
        let mut a = (*with("src/a.js", ModuleKind::Script, Emission::Inline, "one;\ntwo;")).clone();
        a.source_map = Some(SourceMapFragment {
            source: "src/a.js".into(),
            content: "one;\ntwo;".into(),
        });
        graph.insert(Arc::new(a), Vec::new());
        let chunk = Chunk {
            name: "main".into(),
            modules: vec![ModuleId::new("src/a.js")],
            is_entry: true,
            roots: vec![ModuleId::new("src/a.js")],
            rank: 0,
        };

        let (code, map) = chunk_code(&graph, &chunk, &AssetTable::default(), true);
        assert!(code.ends_with("__weft.run(\"src/a.js\");\n"));
        let map = map.unwrap().build("main.js");
        let runtime_lines = line_count(RUNTIME_JS) + usize::from(RUNTIME_JS.ends_with('\n'));
        let mapped: Vec<usize> = map
            .mappings
            .split(';')
            .enumerate()
            .filter(|(_, segment)| !segment.is_empty())
            .map(|(line, _)| line)
            .collect();
        assert_eq!(mapped, [runtime_lines + 1, runtime_lines + 2]);
    }
}
