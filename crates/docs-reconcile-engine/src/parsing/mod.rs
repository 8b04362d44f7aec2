//! Snapshot text to indexed [`Document`].

pub mod builder;
pub mod cursor;
pub mod xml;

use crate::error::Error;
use crate::indexing::index_document;
use crate::model::Document;

/// Parses a snapshot and indexes every segment.
///
/// Literal newlines inside paragraph text are rejected before any block is
/// built; tags the parser does not know become one-unit opaque leaves.
pub fn parse(text: &str) -> Result<Document, Error> {
    let nodes = xml::parse_tree(text)?;
    let mut document = builder::build_document(nodes)?;
    index_document(&mut document);
    Ok(document)
}
