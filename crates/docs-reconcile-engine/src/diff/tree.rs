//! The change tree: what changed between pristine and current, addressed by
//! pristine spans.

use serde::Serialize;

use crate::error::StructuralMismatchError;
use crate::model::{Block, Document, Segment, SegmentId, Span, TableCell, TableRow};

use super::text::TextEdit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Added,
    Deleted,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Paragraph,
    Table,
    Row,
    Column,
    Cell,
    SectionBreak,
    TableOfContents,
    Opaque,
}

impl NodeKind {
    pub fn of(block: &Block) -> Self {
        match block {
            Block::Paragraph(_) => NodeKind::Paragraph,
            Block::Table(_) => NodeKind::Table,
            Block::SectionBreak(_) => NodeKind::SectionBreak,
            Block::TableOfContents(_) => NodeKind::TableOfContents,
            Block::Opaque(_) => NodeKind::Opaque,
        }
    }
}

/// What a node points at on either side.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Block(&'a Block),
    Row(&'a TableRow),
    Cell(&'a TableCell),
}

impl<'a> Subject<'a> {
    pub fn block(self) -> Option<&'a Block> {
        match self {
            Subject::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn cell(self) -> Option<&'a TableCell> {
        match self {
            Subject::Cell(c) => Some(c),
            _ => None,
        }
    }

    pub fn span(self) -> Span {
        match self {
            Subject::Block(b) => b.span(),
            Subject::Row(r) => r.span,
            Subject::Cell(c) => c.span,
        }
    }
}

/// Row and column correspondence of a modified table: for every current
/// row or column, the pristine one it continues, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableMatch {
    pub rows: Vec<Option<usize>>,
    pub columns: Vec<Option<usize>>,
}

impl TableMatch {
    pub fn surviving_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().flatten().copied()
    }

    /// True when at least one row and one column carry over.
    pub fn survives(&self) -> bool {
        self.rows.iter().any(Option::is_some) && self.columns.iter().any(Option::is_some)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeNode<'a> {
    pub kind: NodeKind,
    pub op: ChangeOp,
    /// Position among the pristine siblings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pristine_index: Option<usize>,
    /// Position among the current siblings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,
    /// For additions, the pristine sibling the node goes in front of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pristine_span: Option<Span>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_xml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_xml: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<TextEdit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChangeNode<'a>>,
    #[serde(skip)]
    pub before: Option<Subject<'a>>,
    #[serde(skip)]
    pub after: Option<Subject<'a>>,
}

impl<'a> ChangeNode<'a> {
    pub(crate) fn new(kind: NodeKind, op: ChangeOp) -> Self {
        Self {
            kind,
            op,
            pristine_index: None,
            current_index: None,
            slot: None,
            pristine_span: None,
            before_xml: None,
            after_xml: None,
            text: Vec::new(),
            table: None,
            children: Vec::new(),
            before: None,
            after: None,
        }
    }

    /// Walks this node and its descendants, depth first.
    pub fn walk(&self, f: &mut dyn FnMut(&ChangeNode<'a>)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

/// Changes of one segment. Segments without changes are not listed.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentChange<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
    /// Position of the tab in the pristine document.
    pub tab_index: usize,
    pub segment: SegmentId,
    pub op: ChangeOp,
    pub changes: Vec<ChangeNode<'a>>,
    #[serde(skip)]
    pub pristine: Option<&'a Segment>,
    #[serde(skip)]
    pub current: Option<&'a Segment>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeTree<'a> {
    pub segments: Vec<SegmentChange<'a>>,
}

impl<'a> ChangeTree<'a> {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of nodes at every depth.
    pub fn node_count(&self) -> usize {
        let mut n = 0;
        for segment in &self.segments {
            for node in &segment.changes {
                node.walk(&mut |_| n += 1);
            }
        }
        n
    }

    /// Checks that every pristine span the tree carries still addresses
    /// the same node in `document`.
    pub fn verify_against(&self, document: &Document) -> Result<(), StructuralMismatchError> {
        for change in &self.segments {
            if change.op == ChangeOp::Added {
                continue;
            }
            let segment = document
                .tabs
                .get(change.tab_index)
                .and_then(|t| t.segment(&change.segment));
            let Some(segment) = segment else {
                return Err(StructuralMismatchError {
                    segment: change.segment.to_string(),
                    what: "segment".into(),
                    expected: Span::default(),
                    found: None,
                });
            };
            verify_blocks(&change.segment, &segment.blocks, &change.changes)?;
        }
        Ok(())
    }
}

fn mismatch(
    segment: &SegmentId,
    node: &ChangeNode<'_>,
    expected: Span,
    found: Option<Span>,
) -> StructuralMismatchError {
    let what = match node.pristine_index {
        Some(i) => format!("{:?} #{i}", node.kind),
        None => format!("{:?}", node.kind),
    };
    StructuralMismatchError {
        segment: segment.to_string(),
        what: what.to_lowercase(),
        expected,
        found,
    }
}

fn verify_blocks(
    segment: &SegmentId,
    blocks: &[Block],
    nodes: &[ChangeNode<'_>],
) -> Result<(), StructuralMismatchError> {
    for node in nodes {
        let (Some(i), Some(expected)) = (node.pristine_index, node.pristine_span) else {
            continue;
        };
        let found = blocks.get(i).map(Block::span);
        if found != Some(expected) {
            return Err(mismatch(segment, node, expected, found));
        }
        if let Some(Block::Table(table)) = blocks.get(i) {
            verify_rows(segment, &table.rows, &node.children)?;
        }
    }
    Ok(())
}

fn verify_rows(
    segment: &SegmentId,
    rows: &[TableRow],
    nodes: &[ChangeNode<'_>],
) -> Result<(), StructuralMismatchError> {
    for node in nodes.iter().filter(|n| n.kind == NodeKind::Row) {
        let (Some(i), Some(expected)) = (node.pristine_index, node.pristine_span) else {
            continue;
        };
        let row = rows.get(i);
        if row.map(|r| r.span) != Some(expected) {
            return Err(mismatch(segment, node, expected, row.map(|r| r.span)));
        }
        let Some(row) = row else { continue };
        for cell_node in node.children.iter().filter(|n| n.kind == NodeKind::Cell) {
            let (Some(c), Some(expected)) = (cell_node.pristine_index, cell_node.pristine_span)
            else {
                continue;
            };
            let cell = row.cells.get(c);
            if cell.map(|c| c.span) != Some(expected) {
                return Err(mismatch(segment, cell_node, expected, cell.map(|c| c.span)));
            }
            if let Some(cell) = cell {
                verify_blocks(segment, &cell.content, &cell_node.children)?;
            }
        }
    }
    Ok(())
}
