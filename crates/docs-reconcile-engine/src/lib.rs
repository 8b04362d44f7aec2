pub mod apply;
pub mod comments;
pub mod diff;
pub mod error;
pub mod generate;
pub mod indexing;
pub mod model;
pub mod ops;
pub mod parsing;
pub mod pipeline;
pub mod snapshot;

// Re-export key types for easier usage
pub use apply::apply;
pub use comments::{
    BlockComment, BlockRef, CommentAnchor, CommentRefPosition, assign_anchors,
    comment_ref_positions, overlapping_blocks, strip_comment_refs,
};
pub use diff::{ChangeNode, ChangeOp, ChangeTree, DiffOptions, NodeKind, SegmentChange, diff};
pub use error::{Error, ParseError, Result, StructuralMismatchError, ValidationError};
pub use generate::generate;
pub use indexing::{index_document, index_segment};
pub use model::{Block, Document, Segment, SegmentId, Span};
pub use ops::Operation;
pub use parsing::parse;
pub use pipeline::{ReconcileOptions, Reconciled, Snapshots, SpanIndex, reconcile, verify};
pub use snapshot::{to_structural_xml, to_xml};
