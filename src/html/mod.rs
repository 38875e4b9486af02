//! Entry document.
//!
//! Takes the configured template (the transformed module when a rule
//! matched it, with asset references rewritten to emitted URLs), optionally
//! renders it with Handlebars, then injects `<link>` tags for stylesheets before `</head>` and
//! `<script>` tags for chunks, in load order, before `</body>`. Every
//! injected URL comes from the manifest; a name it lacks fails the pass.

use serde_json::json;
use std::fs;
use std::sync::Arc;

use crate::core::{BuildError, BuildSession, TransformError};
use crate::emit::{AssetTable, Manifest, Output, OutputKind, rewritten_bytes};
use crate::graph::ModuleGraph;
use crate::transform::{ModuleKind, render_template};
use crate::utils::hash::ContentHash;
use crate::utils::path::join_url;
use crate::config::HtmlSection;

/// Names and URLs the document is assembled from.
pub struct DocumentInputs<'a> {
    pub graph: &'a ModuleGraph,
    pub assets: &'a AssetTable,
    pub manifest: &'a Manifest,
    pub scripts: &'a [String],
    pub stylesheets: &'a [String],
    pub build_hash: ContentHash,
}

/// Render the document and, when configured, the favicon copy.
pub fn render(
    session: &BuildSession,
    section: &HtmlSection,
    inputs: &DocumentInputs<'_>,
) -> Result<Vec<Output>, BuildError> {
    let DocumentInputs {
        graph,
        assets,
        manifest,
        scripts,
        stylesheets,
        build_hash,
    } = *inputs;
    let failed = |stage: &str, cause: String| TransformError {
        file: section.template.clone(),
        stage: stage.to_string(),
        cause,
    };

    let document_module = graph.document().filter(|m| m.kind == ModuleKind::Markup);
    let mut template = match document_module {
        Some(module) => {
            let dir = section.filename.rfind('/').map(|i| &section.filename[..i]);
            String::from_utf8(rewritten_bytes(graph, module, assets, dir).into_owned())
                .map_err(|e| failed("read", e.to_string()))?
        }
        None => fs::read_to_string(&section.template).map_err(|e| failed("read", e.to_string()))?,
    };
    if section.render {
        let data = json!({
            "title": section.title,
            "mode": session.mode.as_str(),
            "publicPath": session.public_path,
        });
        template = render_template(&template, &data).map_err(|e| failed("template", e.to_string()))?;
    }

    let mut outputs = Vec::new();
    let mut head = String::new();

    if let Some(favicon) = &section.favicon {
        let bytes = fs::read(favicon).map_err(|e| TransformError {
            file: favicon.clone(),
            stage: "read".into(),
            cause: e.to_string(),
        })?;
        let name = favicon
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "favicon.ico".into());
        head.push_str(&format!("<link rel=\"icon\" href=\"{}\">", href(session, section, &name, build_hash)));
        outputs.push(Output {
            logical: name.clone(),
            path: name,
            bytes: Arc::from(bytes),
            kind: OutputKind::Asset,
            modules: Default::default(),
        });
    }

    let mut document = template.into_bytes();
    if section.inject {
        for name in stylesheets {
            let path = manifest.require(name)?;
            head.push_str(&format!(
                "<link href=\"{}\" rel=\"stylesheet\">",
                href(session, section, path, build_hash)
            ));
        }
        let mut body = String::new();
        for name in scripts {
            let path = manifest.require(name)?;
            body.push_str(&format!(
                "<script type=\"text/javascript\" src=\"{}\"></script>",
                href(session, section, path, build_hash)
            ));
        }
        document = inject_before(&document, b"</head>", &head, false);
        document = inject_before(&document, b"</body>", &body, true);
    }

    outputs.push(Output {
        logical: section.filename.clone(),
        path: section.filename.clone(),
        bytes: Arc::from(document),
        kind: OutputKind::Document,
        modules: document_module.map(|m| m.id.clone()).into_iter().collect(),
    });
    Ok(outputs)
}

fn href(session: &BuildSession, section: &HtmlSection, path: &str, build_hash: ContentHash) -> String {
    let url = join_url(&session.public_path, path);
    if section.append_hash {
        format!("{url}?{}", build_hash.short(20))
    } else {
        url
    }
}

/// Insert `snippet` before the last `closing` tag (ASCII case-insensitive).
/// Without one, the snippet goes at the end (`append`) or the start.
pub fn inject_before(content: &[u8], closing: &[u8], snippet: &str, append: bool) -> Vec<u8> {
    if snippet.is_empty() {
        return content.to_vec();
    }
    let position = content
        .windows(closing.len())
        .rposition(|w| w.eq_ignore_ascii_case(closing))
        .unwrap_or(if append { content.len() } else { 0 });

    let mut result = Vec::with_capacity(content.len() + snippet.len());
    result.extend_from_slice(&content[..position]);
    result.extend_from_slice(snippet.as_bytes());
    result.extend_from_slice(&content[position..]);
    result
}
