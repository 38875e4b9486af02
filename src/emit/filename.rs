//! Output file name templates.
//!
//! | Placeholder      | Value                                        |
//! |------------------|----------------------------------------------|
//! | `[name]`         | chunk, stylesheet or source file stem        |
//! | `[ext]`          | source extension, without the dot            |
//! | `[hash]`         | first 20 hex digits of the content hash      |
//! | `[contenthash]`  | same as `[hash]`                             |
//! | `[hash:N]`       | first N hex digits                           |
//!
//! Anything after `?` is a query: it is kept on the public URL but never
//! becomes part of the file path (`[name].[ext]?[hash]`).

use regex::Regex;
use std::sync::LazyLock;

use crate::utils::hash::ContentHash;

const DEFAULT_HASH_LEN: usize = 20;

static HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:content)?hash(?::(\d+))?\]").unwrap());

/// Hash placeholder plus one separator in front of it, for dev stripping.
static HASH_WITH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.\-_]?\[(?:content)?hash(?::\d+)?\]").unwrap());

/// A rendered template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    /// Path relative to the output directory, `/`-separated
    pub path: String,
    /// Rendered query, without the `?`
    pub query: Option<String>,
}

impl OutputName {
    /// Path plus query, as it appears in a URL.
    pub fn url_path(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

/// What a template is rendered with.
#[derive(Debug, Clone, Copy)]
pub struct NameParts<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    pub hash: ContentHash,
}

/// Render `template`.
///
/// With `hash_names` off, hash placeholders are removed together with the
/// separator in front of them. With it on, a path without a hash
/// placeholder gets `.[hash:8]` before its extension (`insert_hash`).
pub fn render(template: &str, parts: NameParts<'_>, hash_names: bool, insert_hash: bool) -> OutputName {
    let (path, query) = match template.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (template, None),
    };

    let path = if !hash_names {
        HASH_WITH_SEPARATOR.replace_all(path, "").into_owned()
    } else if insert_hash && !HASH.is_match(path) && !query.is_some_and(|q| HASH.is_match(q)) {
        with_hash_before_extension(path)
    } else {
        path.to_string()
    };

    let query = query
        .map(|q| {
            if hash_names {
                q.to_string()
            } else {
                HASH.replace_all(q, "").into_owned()
            }
        })
        .filter(|q| !q.is_empty())
        .map(|q| substitute(&q, parts));

    OutputName {
        path: substitute(&path, parts),
        query,
    }
}

/// Directory part of a template once `[name]` is known, `""` for the
/// output root. Independent of the hash.
pub fn directory(template: &str, name: &str) -> String {
    let path = template.split('?').next().unwrap_or(template);
    let path = path.replace("[name]", name);
    match path.rfind('/') {
        Some(i) => path[..i].to_string(),
        None => String::new(),
    }
}

fn with_hash_before_extension(path: &str) -> String {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let at = file_start + dot;
            format!("{}.[hash:8]{}", &path[..at], &path[at..])
        }
        _ => format!("{path}.[hash:8]"),
    }
}

fn substitute(template: &str, parts: NameParts<'_>) -> String {
    let hex = parts.hash.to_hex();
    let rendered = HASH.replace_all(template, |caps: &regex::Captures<'_>| {
        let len = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(DEFAULT_HASH_LEN)
            .min(hex.len());
        hex[..len].to_string()
    });
    rendered.replace("[name]", parts.name).replace("[ext]", parts.ext)
}

/// Split a source file name into `([name], [ext])`.
pub fn stem_and_ext(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], &file_name[dot + 1..]),
        _ => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts<'a>(name: &'a str, ext: &'a str) -> NameParts<'a> {
        NameParts {
            name,
            ext,
            hash: ContentHash::of("content"),
        }
    }

    fn hex(len: usize) -> String {
        ContentHash::of("content").short(len)
    }

    #[test]
    fn test_dev_strips_hashes() {
        let name = render("js/[name].[hash].js", parts("main", "js"), false, true);
        assert_eq!(name.path, "js/main.js");
        assert_eq!(name.query, None);

        let name = render("img/[name].[ext]?[hash:5]", parts("logo", "png"), false, false);
        assert_eq!(name.url_path(), "img/logo.png");
    }

    #[test]
    fn test_prod_inserts_hash() {
        let name = render("js/[name].bundle.js", parts("main", "js"), true, true);
        assert_eq!(name.path, format!("js/main.bundle.{}.js", hex(8)));

        let name = render("[name]", parts("main", "js"), true, true);
        assert_eq!(name.path, format!("main.{}", hex(8)));
    }

    #[test]
    fn test_explicit_hash_lengths() {
        let name = render("[name].[hash:5].css", parts("styles", "css"), true, true);
        assert_eq!(name.path, format!("styles.{}.css", hex(5)));

        let name = render("[name].[contenthash].js", parts("a", "js"), true, true);
        assert_eq!(name.path, format!("a.{}.js", hex(20)));
    }

    #[test]
    fn test_query_stays_out_of_path() {
        let name = render("[name].[ext]?[hash:5]", parts("logo", "svg"), true, true);
        assert_eq!(name.path, "logo.svg");
        assert_eq!(name.query, Some(hex(5)));
        assert_eq!(name.url_path(), format!("logo.svg?{}", hex(5)));
    }

    #[test]
    fn test_directory() {
        assert_eq!(directory("css/[name].[hash].css", "styles"), "css");
        assert_eq!(directory("[name].css", "styles"), "");
        assert_eq!(directory("[name]/index.css", "app"), "app");
    }

    #[test]
    fn test_stem_and_ext() {
        assert_eq!(stem_and_ext("logo.min.png"), ("logo.min", "png"));
        assert_eq!(stem_and_ext("Makefile"), ("Makefile", ""));
        assert_eq!(stem_and_ext(".env"), (".env", ""));
    }
}
