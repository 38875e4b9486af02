//! `style` and `extract` stages.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::{
    Dependency, Emission, ModuleKind, Payload, StageError, StyleOptions, is_external, url_specifier,
};

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?([^;\n]*);?"#).unwrap()
});

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*(["']?)([^"')]+?)(["']?)\s*\)"#).unwrap());

pub(super) fn apply(options: &StyleOptions, mut payload: Payload) -> Result<Payload, StageError> {
    let source = std::str::from_utf8(&payload.bytes)?;

    let mut dependencies = Vec::new();
    let output = if options.import {
        IMPORT
            .replace_all(source, |caps: &Captures<'_>| {
                let reference = &caps[1];
                // Media-qualified and remote imports stay in the stylesheet.
                if is_external(reference) || !caps[2].trim().is_empty() {
                    return caps[0].to_string();
                }
                let specifier = url_specifier(reference).unwrap_or_else(|| reference.to_string());
                dependencies.push(Dependency::import(specifier));
                String::new()
            })
            .into_owned()
    } else {
        source.to_string()
    };

    if options.url {
        for caps in URL.captures_iter(&output) {
            let raw = caps[2].trim();
            if let Some(specifier) = url_specifier(raw) {
                dependencies.push(Dependency::url(raw, specifier));
            }
        }
    }

    for dependency in dependencies {
        payload.depend(dependency);
    }
    payload.bytes = output.into_bytes();
    payload.kind = ModuleKind::Style;
    Ok(payload)
}

/// Mark a stylesheet for extraction.
pub(super) fn extract(mut payload: Payload) -> Result<Payload, StageError> {
    if payload.kind != ModuleKind::Style {
        return Err(StageError::WrongKind {
            expected: ModuleKind::Style.as_str(),
            found: payload.kind.as_str(),
        });
    }
    payload.emission = Emission::Extract;
    Ok(payload)
}

/// Rewrite `url()` references through `lookup`; unknown references stay.
pub fn rewrite_urls(css: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    URL.replace_all(css, |caps: &Captures<'_>| match lookup(caps[2].trim()) {
        Some(url) => format!("url({}{url}{})", &caps[1], &caps[3]),
        None => caps[0].to_string(),
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(css: &str) -> Payload {
        apply(&StyleOptions::default(), Payload::source(css.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn test_imports_become_dependencies_and_are_removed() {
        let payload = run("@import './base.scss';\n@import url(\"theme.css\");\nbody { color: red; }\n");
        let text = String::from_utf8(payload.bytes.clone()).unwrap();
        assert!(!text.contains("@import"));
        assert_eq!(text.lines().count(), 3);
        let specifiers: Vec<_> = payload.dependencies.iter().map(|d| d.specifier.as_str()).collect();
        assert_eq!(specifiers, ["./base.scss", "./theme.css"]);
        assert_eq!(payload.kind, ModuleKind::Style);
    }

    #[test]
    fn test_remote_and_media_imports_stay() {
        let payload = run("@import url(https://fonts.example.com/a.css);\n@import 'print.css' print;\n");
        let text = String::from_utf8(payload.bytes).unwrap();
        assert!(text.contains("fonts.example.com"));
        assert!(text.contains("print.css"));
        assert!(payload.dependencies.is_empty());
    }

    #[test]
    fn test_url_references() {
        let payload = run(".logo { background: url('../img/logo.png'); }\n.x { background: url(data:image/png;base64,AA); }\n@font-face { src: url(fonts/a.woff2?v=1); }");
        let deps: Vec<_> = payload
            .dependencies
            .iter()
            .map(|d| (d.raw.as_str(), d.specifier.as_str()))
            .collect();
        assert_eq!(
            deps,
            [("../img/logo.png", "../img/logo.png"), ("fonts/a.woff2?v=1", "./fonts/a.woff2")]
        );
    }

    #[test]
    fn test_extract_requires_style() {
        let payload = Payload::source(b"x".to_vec());
        assert!(matches!(extract(payload), Err(StageError::WrongKind { .. })));

        let extracted = extract(run("a{}")).unwrap();
        assert_eq!(extracted.emission, Emission::Extract);
    }

    #[test]
    fn test_rewrite_urls() {
        let css = ".a { background: url('img/a.png') } .b { background: url(other.png) }";
        let rewritten = rewrite_urls(css, |raw| (raw == "img/a.png").then(|| "/static/a.1234.png".to_string()));
        assert!(rewritten.contains("url('/static/a.1234.png')"));
        assert!(rewritten.contains("url(other.png)"));
    }
}
