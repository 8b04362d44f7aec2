//! The reconcile pipeline: two snapshots in, one operation batch out.
//!
//! ```text
//! pristine text ─ parse ─ index ─┐
//!                                ├─ diff ─ generate ─ operations
//! current text ─ strip refs ─ parse ┘                    │
//!                                       apply (verify) ──┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::apply::apply;
use crate::comments::{
    BlockComment, CommentAnchor, CommentRefPosition, assign_anchors, comment_ref_positions,
    strip_comment_refs,
};
use crate::diff::{ChangeTree, DiffOptions, diff};
use crate::error::{Error, Result, StructuralMismatchError};
use crate::generate::generate;
use crate::model::{Document, Segment, Span};
use crate::ops::Operation;
use crate::parsing::parse;
use crate::snapshot::segment_to_xml;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOptions {
    pub diff: DiffOptions,
    /// Run the generated batch through the apply oracle and require it to
    /// reproduce the current snapshot.
    pub verify: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            diff: DiffOptions::default(),
            verify: true,
        }
    }
}

/// Top-level block spans of every segment, keyed `"{tab}/{segment}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanIndex {
    pub segments: BTreeMap<String, Vec<Span>>,
}

impl SpanIndex {
    pub fn of(document: &Document) -> Self {
        let mut segments = BTreeMap::new();
        for (t, tab) in document.tabs.iter().enumerate() {
            for segment in tab.segments() {
                segments.insert(key(t, segment), segment.blocks.iter().map(|b| b.span()).collect());
            }
        }
        Self { segments }
    }

    /// Checks `fresh` against this prior index. Segments the prior index
    /// does not know are not checked.
    pub fn check(&self, fresh: &SpanIndex) -> Result<(), StructuralMismatchError> {
        for (segment, spans) in &self.segments {
            let found = fresh.segments.get(segment);
            for (i, expected) in spans.iter().enumerate() {
                let got = found.and_then(|f| f.get(i)).copied();
                if got != Some(*expected) {
                    return Err(StructuralMismatchError {
                        segment: segment.clone(),
                        what: format!("block #{i}"),
                        expected: *expected,
                        found: got,
                    });
                }
            }
            if let Some(extra) = found.and_then(|f| f.get(spans.len())) {
                return Err(StructuralMismatchError {
                    segment: segment.clone(),
                    what: format!("block #{}", spans.len()),
                    expected: Span::point(extra.start),
                    found: Some(*extra),
                });
            }
        }
        Ok(())
    }
}

fn key(tab: usize, segment: &Segment) -> String {
    format!("{tab}/{}", segment.id)
}

/// Both sides of a reconciliation, parsed and indexed.
#[derive(Debug, Clone)]
pub struct Snapshots {
    pub pristine: Document,
    /// The current snapshot without comment refs.
    pub current: Document,
    /// Comment refs found in the current snapshot.
    pub comment_refs: Vec<CommentRefPosition>,
}

impl Snapshots {
    pub fn parse(pristine: &str, current: &str) -> Result<Self> {
        let pristine = parse(pristine)?;
        let comment_refs = comment_ref_positions(&parse(current)?);
        let current = parse(&strip_comment_refs(current)?)?;
        Ok(Self {
            pristine,
            current,
            comment_refs,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reconciled<'a> {
    pub operations: Vec<Operation>,
    pub tree: ChangeTree<'a>,
    pub comment_refs: Vec<CommentRefPosition>,
    /// Remote comments snapped onto pristine body blocks.
    pub comments: Vec<BlockComment>,
}

/// Diffs the snapshots and generates the batch that turns pristine into
/// current.
pub fn reconcile<'a>(
    snapshots: &'a Snapshots,
    anchors: &[CommentAnchor],
    prior: Option<&SpanIndex>,
    options: &ReconcileOptions,
) -> Result<Reconciled<'a>> {
    let pristine = &snapshots.pristine;
    if let Some(prior) = prior {
        prior.check(&SpanIndex::of(pristine))?;
    }

    let tree = diff(pristine, &snapshots.current, &options.diff)?;
    tree.verify_against(pristine)?;
    let operations = generate(&tree, &options.diff)?;
    log::debug!("reconcile: {} operations", operations.len());

    if options.verify {
        verify(pristine, &snapshots.current, &operations)?;
    }

    let comments = match pristine.body() {
        Some(body) => assign_anchors(&body.blocks, anchors),
        None => Vec::new(),
    };
    Ok(Reconciled {
        operations,
        tree,
        comment_refs: snapshots.comment_refs.clone(),
        comments,
    })
}

/// Applies `operations` to `pristine` and compares every segment present
/// on both sides with `current`. Segments removed from current must be gone;
/// newly added ones are created empty and not compared.
pub fn verify(pristine: &Document, current: &Document, operations: &[Operation]) -> Result<()> {
    let mut applied = apply(pristine, operations)?;
    applied.strip_annotations();
    let mut current = current.clone();
    current.strip_annotations();

    for (t, before) in pristine.tabs.iter().enumerate() {
        let (Some(after), Some(target)) = (applied.tabs.get(t), current.tabs.get(t)) else {
            continue;
        };
        for segment in before.segments() {
            let expected = target.segment(&segment.id).map(segment_to_xml);
            let actual = after.segment(&segment.id).map(segment_to_xml);
            if expected != actual {
                return Err(Error::VerificationFailed {
                    expected: expected.unwrap_or_default(),
                    actual: actual.unwrap_or_default(),
                });
            }
        }
    }
    Ok(())
}
