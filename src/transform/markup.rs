//! `html` stage: attribute reference scan.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::{Dependency, HtmlOptions, ModuleKind, Payload, StageError, url_specifier};

static ATTRIBUTE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s[\w:-]+\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

pub(super) fn apply(options: &HtmlOptions, mut payload: Payload) -> Result<Payload, StageError> {
    let source = std::str::from_utf8(&payload.bytes)?;
    for raw in scan(source, &options.attributes)? {
        if let Some(specifier) = url_specifier(&raw) {
            payload.depend(Dependency::url(raw, specifier));
        }
    }
    payload.kind = ModuleKind::Markup;
    Ok(payload)
}

/// Values of the configured `tag:attribute` pairs, in document order.
fn scan(html: &str, attributes: &[String]) -> Result<Vec<String>, StageError> {
    let targets: Vec<(&str, &str)> = attributes
        .iter()
        .filter_map(|pair| pair.split_once(':'))
        .collect();

    let dom = tl::parse(html, tl::ParserOptions::default())
        .map_err(|err| StageError::Parse(format!("{err:?}")))?;

    let mut values = Vec::new();
    for node in dom.nodes() {
        let Some(tag) = node.as_tag() else {
            continue;
        };
        let name = tag.name().as_utf8_str().to_ascii_lowercase();
        for (key, value) in tag.attributes().iter() {
            let Some(value) = value else {
                continue;
            };
            let key: &str = key.as_ref();
            let wanted = targets.iter().any(|&(tag_name, attribute)| {
                (tag_name == "*" || tag_name.eq_ignore_ascii_case(&name))
                    && attribute.eq_ignore_ascii_case(key)
            });
            if wanted {
                values.push(value.to_string());
            }
        }
    }
    Ok(values)
}

/// Rewrite quoted attribute values through `lookup`; unknown values stay.
pub fn rewrite_attributes(html: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ATTRIBUTE_VALUE
        .replace_all(html, |caps: &Captures<'_>| {
            let (quote, value) = match (caps.get(2), caps.get(3)) {
                (Some(value), _) => ('"', value.as_str()),
                (None, Some(value)) => ('\'', value.as_str()),
                (None, None) => return caps[0].to_string(),
            };
            match lookup(value) {
                Some(url) => format!("{}{quote}{url}{quote}", &caps[1]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
