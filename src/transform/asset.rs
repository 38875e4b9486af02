//! `image`, `file` and `url` stages.

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use super::{Emission, FileOptions, ImageOptions, ModuleKind, Payload, StageContext, StageError, UrlOptions};

/// SVG cleanup; other images pass through untouched.
pub(super) fn image(
    options: &ImageOptions,
    ctx: &StageContext<'_>,
    mut payload: Payload,
) -> Result<Payload, StageError> {
    let is_svg = ctx
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

    if is_svg && (options.remove_title || options.remove_comments) {
        payload.bytes = clean_svg(&payload.bytes, options)?;
    }
    payload.kind = ModuleKind::Asset;
    Ok(payload)
}

pub(super) fn file(options: &FileOptions, mut payload: Payload) -> Payload {
    payload.emission = Emission::File {
        name: options.name.clone(),
        output_path: options.output_path.clone(),
    };
    payload
}

pub(super) fn url(options: &UrlOptions, mut payload: Payload) -> Payload {
    payload.emission = Emission::Url {
        name: options.name.clone(),
        output_path: options.output_path.clone(),
        limit: options.limit,
    };
    payload
}

fn clean_svg(content: &[u8], options: &ImageOptions) -> Result<Vec<u8>, StageError> {
    let mut reader = Reader::from_reader(content);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(content.len())));
    // Nesting depth inside a dropped <title>
    let mut skipping = 0usize;

    loop {
        let event = reader.read_event().map_err(|err| {
            StageError::Parse(format!(
                "SVG parse error at position {}: {err}",
                reader.error_position()
            ))
        })?;
        match event {
            Event::Eof => break,
            Event::Start(ref elem) if skipping > 0 || is_title(options, elem.name().as_ref()) => {
                skipping += 1;
            }
            Event::End(_) if skipping > 0 => {
                skipping -= 1;
            }
            _ if skipping > 0 => {}
            Event::Empty(ref elem) if is_title(options, elem.name().as_ref()) => {}
            Event::Comment(_) if options.remove_comments => {}
            event => writer
                .write_event(event)
                .map_err(|err| StageError::Parse(err.to_string()))?,
        }
    }

    Ok(writer.into_inner().into_inner())
}

fn is_title(options: &ImageOptions, name: &[u8]) -> bool {
    options.remove_title && name == b"title"
}
