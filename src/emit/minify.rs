//! Chunk-level minification: oxc for scripts, lightningcss for stylesheets.
//!
//! A chunk that fails to parse is emitted as is; the pass does not fail on
//! minifier limitations.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::log;

/// Minify a script chunk. Top-level names are kept; chunks share the
/// `__weft` global.
pub fn minify_js(name: &str, source: &str) -> String {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if !ret.errors.is_empty() {
        log!("minify"; "{name}: {} parse errors, left unminified", ret.errors.len());
        return source.to_string();
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code
}

/// Minify a stylesheet.
pub fn minify_css(name: &str, source: &str) -> String {
    let minified = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|err| err.to_string())
        .and_then(|sheet| {
            sheet
                .to_css(PrinterOptions {
                    minify: true,
                    ..PrinterOptions::default()
                })
                .map(|out| out.code)
                .map_err(|err| err.to_string())
        });
    match minified {
        Ok(code) => code,
        Err(err) => {
            log!("minify"; "{name}: {err}, left unminified");
            source.to_string()
        }
    }
}
