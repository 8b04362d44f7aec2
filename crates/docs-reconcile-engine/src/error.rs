//! Error taxonomy shared by the parser, generators and the apply oracle.

use thiserror::Error;

use crate::model::Span;

/// Malformed snapshot text. Fatal for the whole diff.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("malformed snapshot at offset {offset}: {reason} near `{fragment}`")]
    Malformed {
        offset: usize,
        reason: String,
        fragment: String,
    },

    #[error("<{tag}> is not allowed inside <{parent}> near `{fragment}`")]
    MisplacedElement {
        tag: String,
        parent: String,
        fragment: String,
    },

    #[error("text outside any block near `{fragment}`")]
    StrayText { fragment: String },
}

/// A named invariant an operation would violate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("index {index} is below the segment minimum {minimum}")]
    IndexBelowMinimum { index: u32, minimum: u32 },

    #[error("index {index} is at or past the segment end {end}")]
    IndexPastEnd { index: u32, end: u32 },

    #[error("insertion at {index} targets the start of a table; target the preceding paragraph")]
    InsertAtTableStart { index: u32 },

    #[error("index {index} addresses a table row or cell marker")]
    InsideTableStructure { index: u32 },

    #[error("range [{start}, {end}) would delete the segment's final newline at {terminator}")]
    DeletesFinalTerminator { start: u32, end: u32, terminator: u32 },

    #[error("range [{start}, {end}) would delete the lone newline of the cell ending at {terminator}")]
    DeletesCellTerminator { start: u32, end: u32, terminator: u32 },

    #[error("index {index} does not address paragraph text")]
    NotTextPosition { index: u32 },

    #[error("index {index} splits a UTF-16 surrogate pair")]
    SplitsSurrogatePair { index: u32 },

    #[error("range [{start}, {end}) is empty")]
    EmptyRange { start: u32, end: u32 },

    #[error("range [{start}, {end}) cuts through a table or other structural element")]
    PartialStructureDeletion { start: u32, end: u32 },

    #[error("deleting the newline at {index} would merge a paragraph into the table after it")]
    TerminatorBeforeTable { index: u32 },

    #[error("no table starts at index {index}")]
    TableNotFound { index: u32 },

    #[error("row {row} is out of range for a table with {rows} rows")]
    RowOutOfRange { row: i64, rows: usize },

    #[error("column {column} is out of range for a table with {columns} columns")]
    ColumnOutOfRange { column: i64, columns: usize },

    #[error("table dimensions must be positive, got {rows}x{columns}")]
    NonPositiveDimension { rows: i64, columns: i64 },

    #[error("cannot delete the only remaining row or column of the table at {table_start}")]
    LastRowOrColumn { table_start: u32 },

    #[error("tab {0:?} does not exist")]
    TabNotFound(Option<String>),

    #[error("segment {0:?} does not exist")]
    SegmentNotFound(String),

    #[error("literal newline inside paragraph text `{fragment}`")]
    EmbeddedNewline { fragment: String },

    #[error("unsupported edit: {what}")]
    UnsupportedEdit { what: String },
}

/// A change node addresses a pristine node whose span no longer matches.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("stale pristine state in {segment}: {what} expected at {expected:?}, found {found:?}")]
pub struct StructuralMismatchError {
    pub segment: String,
    pub what: String,
    pub expected: Span,
    pub found: Option<Span>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    StructuralMismatch(#[from] StructuralMismatchError),

    #[error("invalid comment anchor: {0}")]
    Anchor(#[from] serde_json::Error),

    #[error("applying the generated operations did not reproduce the current snapshot")]
    VerificationFailed { expected: String, actual: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
