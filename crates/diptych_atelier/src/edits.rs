//! Span edits over the original text.
//!
//! A rewrite never touches a syntax tree. Each [`Edit`] replaces a byte range
//! with a sequence of [`Piece`]s, either new text or a retained range of the
//! original. Retained ranges are rendered recursively, so an edit nested in
//! a retained range still applies. Edits that are neither nested nor
//! disjoint lose to the one that starts first.

use diptych_carton::source_map::{LineIndex, Mapping, SourceMap, SourceMapBuilder};
use oxc_span::Span;

/// Part of the replacement of an [`Edit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Original text of this range, with nested edits applied.
    Source(Span),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub pieces: Vec<Piece>,
}

impl Edit {
    #[inline]
    pub fn is_insertion(&self) -> bool {
        self.span.start == self.span.end
    }
}

/// Whether `inner` lies within `outer`.
#[inline]
pub fn span_contains(outer: Span, inner: Span) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

/// Extend `span` over one directly following line break, so removing a
/// statement does not leave an empty line behind.
pub fn with_line_break(source: &str, span: Span) -> Span {
    let rest = source.get(span.end as usize..).unwrap_or_default();
    let extra = if rest.starts_with("\r\n") {
        2
    } else if rest.starts_with('\n') {
        1
    } else {
        0
    };
    Span::new(span.start, span.end + extra)
}

/// Output of rendering an [`EditSet`].
#[derive(Debug, Clone)]
pub struct Rendered {
    pub code: String,
    pub map: SourceMap,
}

/// All edits of one compilation.
#[derive(Debug, Default, Clone)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn replace(&mut self, span: Span, pieces: Vec<Piece>) {
        self.edits.push(Edit { span, pieces });
    }

    pub fn replace_with_text(&mut self, span: Span, text: impl Into<String>) {
        self.replace(span, vec![Piece::Text(text.into())]);
    }

    /// Replace `span` by the (edited) text of `kept`.
    pub fn replace_with_source(&mut self, span: Span, kept: Span) {
        self.replace(span, vec![Piece::Source(kept)]);
    }

    pub fn remove(&mut self, span: Span) {
        self.replace(span, Vec::new());
    }

    /// Insert `text` at byte offset `at`. Insertions at the same offset keep
    /// their order.
    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.replace(Span::new(at, at), vec![Piece::Text(text.into())]);
    }

    /// Whether the original text of `span` survives rendering.
    pub fn retained(&self, span: Span) -> bool {
        self.edits
            .iter()
            .filter(|edit| !edit.is_insertion() && span_contains(edit.span, span))
            .all(|edit| {
                edit.pieces.iter().any(|piece| match piece {
                    Piece::Source(kept) => span_contains(*kept, span),
                    Piece::Text(_) => false,
                })
            })
    }

    /// Apply every edit to `source` and build a source map for `file`.
    pub fn render(&self, file: &str, source: &str) -> Rendered {
        let mut edits = self.edits.clone();
        // Outer edits before the edits they contain, insertions first.
        edits.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then_with(|| (!a.is_insertion()).cmp(&!b.is_insertion()))
                .then_with(|| b.span.end.cmp(&a.span.end))
        });

        let mut renderer = Renderer {
            source,
            index: LineIndex::new(source),
            edits: &edits,
            applied: vec![false; edits.len()],
            out: String::with_capacity(source.len()),
            line: 0,
            column: 0,
            map: SourceMapBuilder::new(file, source),
        };
        renderer.range(0, source.len() as u32);

        Rendered {
            code: renderer.out,
            map: renderer.map.build(),
        }
    }
}

struct Renderer<'s> {
    source: &'s str,
    index: LineIndex<'s>,
    edits: &'s [Edit],
    applied: Vec<bool>,
    out: String,
    line: u32,
    column: u32,
    map: SourceMapBuilder,
}

impl Renderer<'_> {
    fn range(&mut self, start: u32, end: u32) {
        let edits = self.edits;
        let mut cursor = start;
        for (i, edit) in edits.iter().enumerate() {
            if self.applied[i] || edit.span.start < cursor || edit.span.end > end {
                continue;
            }
            self.copy(cursor, edit.span.start);
            self.applied[i] = true;
            for piece in &edit.pieces {
                match piece {
                    Piece::Source(kept) => self.range(kept.start, kept.end),
                    Piece::Text(text) => self.text(text, edit.span.start),
                }
            }
            cursor = edit.span.end;
        }
        self.copy(cursor, end);
    }

    fn copy(&mut self, start: u32, end: u32) {
        if start >= end {
            return;
        }
        let mut segment_start = start;
        let line_starts: Vec<u32> = self.index.line_starts_within(start, end).collect();
        for segment_end in line_starts.into_iter().chain(std::iter::once(end)) {
            self.mark(segment_start);
            let segment = &self.source[segment_start as usize..segment_end as usize];
            self.out.push_str(segment);
            self.advance(segment);
            segment_start = segment_end;
        }
    }

    fn text(&mut self, text: &str, origin: u32) {
        if text.is_empty() {
            return;
        }
        self.mark(origin);
        self.out.push_str(text);
        self.advance(text);
    }

    fn mark(&mut self, original_offset: u32) {
        let (original_line, original_column) = self.index.position(original_offset);
        self.map.add_mapping(Mapping {
            generated_line: self.line,
            generated_column: self.column,
            original_line,
            original_column,
        });
    }

    fn advance(&mut self, written: &str) {
        match written.rfind('\n') {
            Some(last) => {
                self.line += written.matches('\n').count() as u32;
                self.column = written[last + 1..].encode_utf16().count() as u32;
            }
            None => self.column += written.encode_utf16().count() as u32,
        }
    }
}
