//! The closed enumeration of failure kinds produced by loading, validating,
//! and querying mappings.
//!
//! Variants are grouped the way the governing design groups them: parser and
//! loader failures are fatal to a `load`, `Match`-family failures are caught
//! locally at the two specified recovery points (an enclosing `Match` catches
//! `UseAfter`, and `best_references` catches anything per-reftype), and
//! everything else propagates to the caller.

use annotate_snippets::display_list::{DisplayList, FormatOptions};
use annotate_snippets::snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation};
use std::fmt;

/// A source position used to annotate `FormatError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrdsError {
    /// The restricted grammar was violated, or an unsafe construct was used.
    FormatError { file: String, pos: SourcePos, message: String },
    /// `header.sha1sum` did not match the recomputed digest.
    ChecksumError { file: String, expected: String, computed: String },
    /// A required header key (`mapping`, `parkey`, `sha1sum`, ...) was absent.
    MissingHeaderKeyError { file: String, key: String },
    /// The loader hit an unexpected fault evaluating an otherwise
    /// structurally valid file (e.g. a cycle, or a child invariant mismatch).
    MappingError { file: String, message: String },
    /// A required `Match` parameter was missing from the header.
    MissingParameterError { parameter: String },
    /// A `Match` parameter's value was not in its declared value set.
    BadValueError { parameter: String, value: String },
    /// No `Match` case survived winnowing.
    MatchingError { message: String },
    /// Two or more cases tied for the best winnowing weight.
    AmbiguousMatchError { message: String },
    /// No `UseAfter` key was `<=` the query timestamp.
    UseAfterError { query: String },
    /// Raised only by offline `validate()`, never by `choose()`.
    ValidationError { message: String },
}

impl CrdsError {
    /// True for the `LookupError` family: failures an enclosing `Match` is
    /// permitted to catch in order to fall through to the next-best group.
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            CrdsError::UseAfterError { .. } | CrdsError::MatchingError { .. }
        )
    }
}

impl fmt::Display for CrdsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrdsError::FormatError { file, pos, message } => {
                write!(f, "{file}:{pos}: format error: {message}")
            }
            CrdsError::ChecksumError { file, expected, computed } => write!(
                f,
                "{file}: checksum error: header declares {expected} but file hashes to {computed}"
            ),
            CrdsError::MissingHeaderKeyError { file, key } => {
                write!(f, "{file}: missing required header key '{key}'")
            }
            CrdsError::MappingError { file, message } => write!(f, "{file}: {message}"),
            CrdsError::MissingParameterError { parameter } => {
                write!(f, "required parameter '{parameter}' not defined")
            }
            CrdsError::BadValueError { parameter, value } => {
                write!(f, "value '{value}' is not valid for parameter '{parameter}'")
            }
            CrdsError::MatchingError { message } => write!(f, "no match: {message}"),
            CrdsError::AmbiguousMatchError { message } => write!(f, "ambiguous match: {message}"),
            CrdsError::UseAfterError { query } => {
                write!(f, "no applicable use-after date for '{query}'")
            }
            CrdsError::ValidationError { message } => write!(f, "validation error: {message}"),
        }
    }
}

impl std::error::Error for CrdsError {}

pub type Result<T> = std::result::Result<T, CrdsError>;

impl CrdsError {
    /// Renders a `FormatError` as an `annotate-snippets` source snippet
    /// pointing at the offending line, for a CLI or editor integration to
    /// print instead of the plain one-line `Display` form. Every other
    /// variant falls back to `Display`, since only `FormatError` carries a
    /// source position.
    pub fn render(&self, source: &str) -> String {
        let CrdsError::FormatError { file, pos, message } = self else {
            return self.to_string();
        };
        let line_text = source.lines().nth(pos.line.saturating_sub(1) as usize).unwrap_or("");
        let col = pos.column.saturating_sub(1) as usize;
        let end = (col + 1).min(line_text.len());
        let snippet = Snippet {
            title: Some(Annotation { label: Some(message.as_str()), id: None, annotation_type: AnnotationType::Error }),
            footer: vec![],
            slices: vec![Slice {
                source: line_text,
                line_start: pos.line as usize,
                origin: Some(file.as_str()),
                fold: false,
                annotations: vec![SourceAnnotation { label: "here", annotation_type: AnnotationType::Error, range: (col, end) }],
            }],
            opt: FormatOptions { color: false, ..Default::default() },
        };
        DisplayList::from(snippet).to_string()
    }
}
