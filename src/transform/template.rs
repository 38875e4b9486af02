//! `template` stage: Handlebars render with configured data.

use handlebars::Handlebars;

use super::{ModuleKind, Payload, StageError, TemplateOptions};

pub(super) fn apply(options: &TemplateOptions, mut payload: Payload) -> Result<Payload, StageError> {
    let source = std::str::from_utf8(&payload.bytes)?;
    let rendered = render(source, &options.data)?;
    payload.bytes = rendered.into_bytes();
    payload.kind = ModuleKind::Markup;
    Ok(payload)
}

/// Render `template` against `data`. Missing fields render empty.
pub fn render(template: &str, data: &serde_json::Value) -> Result<String, StageError> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.set_strict_mode(false);
    registry
        .render_template(template, data)
        .map_err(|err| StageError::Render(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_with_data() {
        let options = TemplateOptions {
            data: json!({ "title": "Hello", "items": ["a", "b"] }),
        };
        let payload = Payload::source(b"<h1>{{title}}</h1>{{#each items}}<i>{{this}}</i>{{/each}}".to_vec());
        let out = apply(&options, payload).unwrap();
        assert_eq!(out.bytes, b"<h1>Hello</h1><i>a</i><i>b</i>");
        assert_eq!(out.kind, ModuleKind::Markup);
    }

    #[test]
    fn test_missing_fields_render_empty() {
        assert_eq!(render("[{{nope}}]", &json!({})).unwrap(), "[]");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = render("{{#if}}", &json!({})).unwrap_err();
        assert!(matches!(err, StageError::Render(_)));
    }
}
