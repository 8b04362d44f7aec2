//! The document block model: tabs own segments, segments own blocks.

pub mod block;
pub mod document;
pub mod span;
pub mod style;

pub use block::*;
pub use document::*;
pub use span::Span;
pub use style::*;
