//! Source map support.
//!
//! Provides a byte-offset line index (with UTF-16 columns, as browsers and
//! bundlers expect), base64 VLQ encoding, and a builder producing Source Map v3
//! documents.

use serde::Serialize;

/// Base64 VLQ encoding as used by the `mappings` field.
pub mod vlq {
    const BASE64_CHARS: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    const VLQ_BASE_SHIFT: u32 = 5;
    const VLQ_BASE: i64 = 1 << VLQ_BASE_SHIFT;
    const VLQ_BASE_MASK: i64 = VLQ_BASE - 1;
    const VLQ_CONTINUATION_BIT: i64 = VLQ_BASE;

    /// Encode a single value.
    pub fn encode(value: i64) -> String {
        let mut out = String::new();
        encode_into(value, &mut out);
        out
    }

    /// Encode a single value, appending to `out`.
    pub fn encode_into(value: i64, out: &mut String) {
        let mut vlq = if value < 0 {
            ((-value) << 1) | 1
        } else {
            value << 1
        };
        loop {
            let mut digit = vlq & VLQ_BASE_MASK;
            vlq >>= VLQ_BASE_SHIFT;
            if vlq > 0 {
                digit |= VLQ_CONTINUATION_BIT;
            }
            out.push(BASE64_CHARS[digit as usize] as char);
            if vlq == 0 {
                break;
            }
        }
    }

    /// Decode one value from the front of `input`.
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn decode(input: &str) -> Option<(i64, usize)> {
        let mut result: i64 = 0;
        let mut shift = 0;
        for (i, byte) in input.bytes().enumerate() {
            let digit = BASE64_CHARS.iter().position(|&c| c == byte)? as i64;
            result += (digit & VLQ_BASE_MASK) << shift;
            if digit & VLQ_CONTINUATION_BIT == 0 {
                let negative = result & 1 == 1;
                let value = result >> 1;
                return Some((if negative { -value } else { value }, i + 1));
            }
            shift += VLQ_BASE_SHIFT;
        }
        None
    }
}

/// Maps byte offsets of a text to `(line, utf16_column)` positions.
#[derive(Debug)]
pub struct LineIndex<'t> {
    text: &'t str,
    line_starts: Vec<u32>,
}

impl<'t> LineIndex<'t> {
    /// Build the index for `text`.
    pub fn new(text: &'t str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { text, line_starts }
    }

    /// Zero-based line and UTF-16 column of a byte offset.
    pub fn position(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.text.len() as u32);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line] as usize;
        let column = self
            .text
            .get(start..offset as usize)
            .map(|prefix| prefix.encode_utf16().count())
            .unwrap_or(0);
        (line as u32, column as u32)
    }

    /// Byte offsets at which lines start, strictly inside `start..end`.
    pub fn line_starts_within(&self, start: u32, end: u32) -> impl Iterator<Item = u32> + '_ {
        let first = match self.line_starts.binary_search(&start) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        self.line_starts[first..]
            .iter()
            .copied()
            .take_while(move |&s| s < end)
    }

    /// The full text of the (zero-based) line containing `offset`.
    pub fn line_text(&self, offset: u32) -> &'t str {
        let (line, _) = self.position(offset);
        let start = self.line_starts[line as usize] as usize;
        let end = self
            .line_starts
            .get(line as usize + 1)
            .map(|&s| s as usize)
            .unwrap_or(self.text.len());
        self.text[start..end].trim_end_matches(['\n', '\r'])
    }
}

/// A single generated → original position pair (all zero-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub original_line: u32,
    pub original_column: u32,
}

/// A Source Map v3 document for a single source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    /// Serialize to the JSON wire form.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode the `mappings` field back into position pairs.
    pub fn decode_mappings(&self) -> Vec<Mapping> {
        let mut decoded = Vec::new();
        let mut original_line = 0i64;
        let mut original_column = 0i64;
        for (generated_line, line) in self.mappings.split(';').enumerate() {
            let mut generated_column = 0i64;
            for segment in line.split(',').filter(|s| !s.is_empty()) {
                let mut fields = [0i64; 4];
                let mut rest = segment;
                for field in fields.iter_mut() {
                    match vlq::decode(rest) {
                        Some((value, consumed)) => {
                            *field = value;
                            rest = &rest[consumed..];
                        }
                        None => break,
                    }
                }
                generated_column += fields[0];
                original_line += fields[2];
                original_column += fields[3];
                decoded.push(Mapping {
                    generated_line: generated_line as u32,
                    generated_column: generated_column as u32,
                    original_line: original_line as u32,
                    original_column: original_column as u32,
                });
            }
        }
        decoded
    }
}

/// Accumulates mappings and encodes them into a [`SourceMap`].
#[derive(Debug)]
pub struct SourceMapBuilder {
    file: String,
    source_content: String,
    mappings: Vec<Mapping>,
}

impl SourceMapBuilder {
    /// Create a builder for a map whose only source is `file`.
    pub fn new(file: impl Into<String>, source_content: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source_content: source_content.into(),
            mappings: Vec::new(),
        }
    }

    /// Add one mapping.
    pub fn add_mapping(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    /// Encode the collected mappings.
    pub fn build(mut self) -> SourceMap {
        self.mappings.sort();
        self.mappings.dedup_by(|b, a| {
            a.generated_line == b.generated_line && a.generated_column == b.generated_column
        });

        let mut out = String::new();
        let mut current_line = 0u32;
        let mut prev_generated_column = 0i64;
        let mut prev_original_line = 0i64;
        let mut prev_original_column = 0i64;
        let mut first_in_line = true;

        for mapping in &self.mappings {
            while current_line < mapping.generated_line {
                out.push(';');
                current_line += 1;
                prev_generated_column = 0;
                first_in_line = true;
            }
            if !first_in_line {
                out.push(',');
            }
            first_in_line = false;

            vlq::encode_into(mapping.generated_column as i64 - prev_generated_column, &mut out);
            // Single source, index delta is always zero.
            vlq::encode_into(0, &mut out);
            vlq::encode_into(mapping.original_line as i64 - prev_original_line, &mut out);
            vlq::encode_into(mapping.original_column as i64 - prev_original_column, &mut out);

            prev_generated_column = mapping.generated_column as i64;
            prev_original_line = mapping.original_line as i64;
            prev_original_column = mapping.original_column as i64;
        }

        SourceMap {
            version: 3,
            file: self.file.clone(),
            sources: vec![self.file],
            sources_content: vec![self.source_content],
            names: Vec::new(),
            mappings: out,
        }
    }
}
