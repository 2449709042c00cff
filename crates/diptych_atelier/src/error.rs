//! Error and diagnostic types for compilation.

use diptych_carton::source_map::LineIndex;
use diptych_croquis::ResolveError;
use oxc_span::Span;
use serde::Serialize;

/// Error type for compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A configured library could not be resolved.
    #[error("initialization failed: {0}")]
    Initialization(#[from] ResolveError),

    /// The compiled file itself does not parse.
    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    /// A recognized factory is used in a way that cannot be rewritten.
    #[error("{message}\n  --> {file}:{line}:{column}\n   | {source_line}")]
    InvalidUsage {
        file: String,
        message: String,
        /// One-based.
        line: u32,
        /// One-based, in UTF-16 code units.
        column: u32,
        source_line: String,
    },
}

impl CompileError {
    /// Build an [`CompileError::InvalidUsage`] located at `span` of `source`.
    pub fn invalid_usage(
        file: &str,
        source: &str,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        let index = LineIndex::new(source);
        let (line, column) = index.position(span.start);
        CompileError::InvalidUsage {
            file: file.to_string(),
            message: message.into(),
            line: line + 1,
            column: column + 1,
            source_line: index.line_text(span.start).to_string(),
        }
    }
}

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
}

/// A non-fatal finding reported alongside the compiled output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileDiagnostic {
    pub severity: Severity,
    pub message: String,
    /// One-based.
    pub line: u32,
    /// One-based, in UTF-16 code units.
    pub column: u32,
}

impl CompileDiagnostic {
    pub fn warning(source: &str, span: Span, message: impl Into<String>) -> Self {
        let (line, column) = LineIndex::new(source).position(span.start);
        Self {
            severity: Severity::Warning,
            message: message.into(),
            line: line + 1,
            column: column + 1,
        }
    }
}
