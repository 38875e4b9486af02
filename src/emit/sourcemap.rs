//! Source map v3 for script chunks.
//!
//! Every built-in script stage keeps line structure, so a chunk maps line
//! for line: one segment at column 0 per generated line that belongs to a
//! module body.

use serde::Serialize;

const VERSION: u32 = 3;
const BASE64_DIGITS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMap {
    pub version: u32,
    pub file: String,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent")]
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// `(source index, source line)` per generated line.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<String>,
    contents: Vec<String>,
    lines: Vec<Option<(usize, usize)>>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, name: &str, content: &str) -> usize {
        self.sources.push(name.to_string());
        self.contents.push(content.to_string());
        self.sources.len() - 1
    }

    /// Append `count` generated lines with no mapping.
    pub fn skip_lines(&mut self, count: usize) {
        self.lines.extend(std::iter::repeat_n(None, count));
    }

    /// Append `count` generated lines mapped to lines `0..count` of `source`.
    pub fn map_lines(&mut self, source: usize, count: usize) {
        self.lines.extend((0..count).map(|line| Some((source, line))));
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn build(self, file: &str) -> SourceMap {
        let mut mappings = String::new();
        let (mut last_source, mut last_line) = (0i64, 0i64);

        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                mappings.push(';');
            }
            if let Some((source, source_line)) = *line {
                let (source, source_line) = (source as i64, source_line as i64);
                encode_vlq(&mut mappings, 0);
                encode_vlq(&mut mappings, source - last_source);
                encode_vlq(&mut mappings, source_line - last_line);
                encode_vlq(&mut mappings, 0);
                last_source = source;
                last_line = source_line;
            }
        }

        SourceMap {
            version: VERSION,
            file: file.to_string(),
            sources: self.sources,
            sources_content: self.contents,
            names: Vec::new(),
            mappings,
        }
    }
}

/// Base64 VLQ: sign in the lowest bit, five data bits per digit.
fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 { ((-value) << 1) | 1 } else { value << 1 };
    loop {
        let mut digit = (vlq & 0b1_1111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64_DIGITS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Number of lines in `text` as a generated-code line count.
pub fn line_count(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.matches('\n').count() + usize::from(!text.ends_with('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut out = String::new();
        encode_vlq(&mut out, value);
        out
    }

    #[test]
    fn test_vlq_digits() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-17), "jB");
    }

    #[test]
    fn test_line_mappings() {
        let mut builder = SourceMapBuilder::new();
        builder.skip_lines(2);
        let a = builder.add_source("src/a.js", "one\ntwo");
        builder.map_lines(a, 2);
        builder.skip_lines(1);
        let b = builder.add_source("src/b.js", "x");
        builder.map_lines(b, 1);

        let map = builder.build("main.js");
        assert_eq!(map.sources, ["src/a.js", "src/b.js"]);
        assert_eq!(map.mappings, ";;AAAA;AACA;;ACDA");
        assert!(map.to_json().contains("\"sourcesContent\""));
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\n"), 1);
        assert_eq!(line_count("a\nb"), 2);
    }
}
