//! Pristine vs current alignment into a [`ChangeTree`].
//!
//! Segments are matched by id within tabs matched by id (or by position when
//! neither document names its tabs). Block sequences are aligned with
//! [`align::align`], recursing into modified tables row by row and cell by
//! cell. Every node keeps the pristine span it addresses.

pub mod align;
pub mod text;
pub mod tree;

use crate::error::{Result, ValidationError};
use crate::model::{Block, Document, Tab, Table, TableCell, TableRow, blocks_plain_text};
use crate::snapshot::{block_key, block_to_xml, cell_key, cell_to_xml, row_key, row_to_xml};

use self::align::{Pairing, align, pair_lone_gaps, similarity, slots};
pub use self::text::{TextEdit, TextEditKind};
pub use self::tree::{
    ChangeNode, ChangeOp, ChangeTree, NodeKind, SegmentChange, Subject, TableMatch,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Minimum character similarity for two paragraphs to count as one
    /// modified paragraph rather than a deletion plus an addition. A gap
    /// holding one paragraph on each side pairs them regardless.
    pub similarity_threshold: f32,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
        }
    }
}

pub fn diff<'a>(
    pristine: &'a Document,
    current: &'a Document,
    options: &DiffOptions,
) -> Result<ChangeTree<'a>> {
    let mut tree = ChangeTree::default();
    for (tab_index, old_tab, new_tab) in match_tabs(pristine, current)? {
        for change in diff_tab(tab_index, old_tab, new_tab, options) {
            tree.segments.push(change);
        }
    }
    log::debug!(
        "diff: {} changed segments, {} nodes",
        tree.segments.len(),
        tree.node_count()
    );
    Ok(tree)
}

fn match_tabs<'a>(
    pristine: &'a Document,
    current: &'a Document,
) -> Result<Vec<(usize, &'a Tab, &'a Tab)>> {
    let unnamed = |d: &Document| d.tabs.iter().all(|t| t.id.is_none());
    if unnamed(pristine) && unnamed(current) {
        if pristine.tabs.len() != current.tabs.len() {
            return Err(ValidationError::UnsupportedEdit {
                what: "adding or removing a tab".into(),
            }
            .into());
        }
        return Ok(pristine
            .tabs
            .iter()
            .zip(&current.tabs)
            .enumerate()
            .map(|(i, (a, b))| (i, a, b))
            .collect());
    }
    let mut out = Vec::new();
    for (i, tab) in pristine.tabs.iter().enumerate() {
        let other = current
            .tabs
            .iter()
            .find(|t| t.id == tab.id)
            .ok_or_else(|| ValidationError::UnsupportedEdit {
                what: format!("removing tab {:?}", tab.id),
            })?;
        out.push((i, tab, other));
    }
    if let Some(added) = current
        .tabs
        .iter()
        .find(|t| !pristine.tabs.iter().any(|p| p.id == t.id))
    {
        return Err(ValidationError::UnsupportedEdit {
            what: format!("adding tab {:?}", added.id),
        }
        .into());
    }
    Ok(out)
}

fn diff_tab<'a>(
    tab_index: usize,
    pristine: &'a Tab,
    current: &'a Tab,
    options: &DiffOptions,
) -> Vec<SegmentChange<'a>> {
    let mut out = Vec::new();
    for old in pristine.segments() {
        match current.segment(&old.id) {
            Some(new) => {
                let changes = diff_blocks(&old.blocks, &new.blocks, options);
                if !changes.is_empty() {
                    out.push(SegmentChange {
                        tab_id: pristine.id.clone(),
                        tab_index,
                        segment: old.id.clone(),
                        op: ChangeOp::Modified,
                        changes,
                        pristine: Some(old),
                        current: Some(new),
                    });
                }
            }
            None => out.push(SegmentChange {
                tab_id: pristine.id.clone(),
                tab_index,
                segment: old.id.clone(),
                op: ChangeOp::Deleted,
                changes: Vec::new(),
                pristine: Some(old),
                current: None,
            }),
        }
    }
    for new in current.segments() {
        if pristine.segment(&new.id).is_none() {
            out.push(SegmentChange {
                tab_id: pristine.id.clone(),
                tab_index,
                segment: new.id.clone(),
                op: ChangeOp::Added,
                changes: Vec::new(),
                pristine: None,
                current: Some(new),
            });
        }
    }
    out
}

/// Aligns two block containers and describes every difference.
pub fn diff_blocks<'a>(
    pristine: &'a [Block],
    current: &'a [Block],
    options: &DiffOptions,
) -> Vec<ChangeNode<'a>> {
    let threshold = options.similarity_threshold;
    let pairings: Vec<Pairing> = align(
        pristine,
        current,
        block_key,
        |a, b| block_score(a, b, threshold),
        Some(both_paragraphs),
    );
    let pairings: Vec<Pairing> = pair_lone_gaps(pairings, |i, j| {
        both_paragraphs(&pristine[i], &current[j])
    })
    .into_iter()
    .flat_map(|pairing| match pairing {
        Pairing::Modified(i, j) if rebuilt(&pristine[i], &current[j]) => {
            vec![Pairing::Deleted(i), Pairing::Added(j)]
        }
        other => vec![other],
    })
    .collect();
    let slots = slots(&pairings, pristine.len());
    let mut out = Vec::new();
    for pairing in pairings {
        match pairing {
            Pairing::Equal(..) => {}
            Pairing::Deleted(i) => {
                let block = &pristine[i];
                let mut node = ChangeNode::new(NodeKind::of(block), ChangeOp::Deleted);
                node.pristine_index = Some(i);
                node.pristine_span = Some(block.span());
                node.before_xml = Some(block_to_xml(block));
                node.before = Some(Subject::Block(block));
                out.push(node);
            }
            Pairing::Added(j) => {
                let block = &current[j];
                let mut node = ChangeNode::new(NodeKind::of(block), ChangeOp::Added);
                node.current_index = Some(j);
                node.slot = slots.iter().find(|(k, _)| *k == j).map(|(_, s)| *s);
                node.after_xml = Some(block_to_xml(block));
                node.after = Some(Subject::Block(block));
                out.push(node);
            }
            Pairing::Modified(i, j) => {
                out.push(modified_block(i, &pristine[i], j, &current[j], options));
            }
        }
    }
    out
}

/// Two paired tables with no row or column in common are replaced outright.
fn rebuilt(before: &Block, after: &Block) -> bool {
    match (before, after) {
        (Block::Table(p), Block::Table(q)) => !match_table(p, q).survives(),
        _ => false,
    }
}

fn both_paragraphs(a: &Block, b: &Block) -> bool {
    a.is_paragraph() && b.is_paragraph()
}

fn block_score(a: &Block, b: &Block, threshold: f32) -> Option<f32> {
    match (a, b) {
        (Block::Paragraph(x), Block::Paragraph(y)) => {
            Some(similarity(&x.plain_text(), &y.plain_text())).filter(|s| *s >= threshold)
        }
        (Block::Table(x), Block::Table(y)) => table_score(x, y),
        (Block::TableOfContents(x), Block::TableOfContents(y)) => Some(similarity(
            &blocks_plain_text(&x.children),
            &blocks_plain_text(&y.children),
        )),
        _ => None,
    }
}

/// Tables always pair when their ids allow it. A shared id outranks any
/// content score and an equal shape breaks ties between similar tables.
fn table_score(a: &Table, b: &Table) -> Option<f32> {
    let mut score = similarity(&table_text(a), &table_text(b));
    match (&a.id, &b.id) {
        (Some(x), Some(y)) if x != y => return None,
        (Some(_), Some(_)) => score += 2.0,
        _ => {}
    }
    if a.rows.len() == b.rows.len() && a.column_count() == b.column_count() {
        score += 1.0;
    }
    Some(score)
}

fn table_text(table: &Table) -> String {
    table
        .rows
        .iter()
        .map(TableRow::plain_text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn modified_block<'a>(
    i: usize,
    before: &'a Block,
    j: usize,
    after: &'a Block,
    options: &DiffOptions,
) -> ChangeNode<'a> {
    let mut node = ChangeNode::new(NodeKind::of(before), ChangeOp::Modified);
    node.pristine_index = Some(i);
    node.current_index = Some(j);
    node.pristine_span = Some(before.span());
    node.before_xml = Some(block_to_xml(before));
    node.after_xml = Some(block_to_xml(after));
    node.before = Some(Subject::Block(before));
    node.after = Some(Subject::Block(after));
    match (before, after) {
        (Block::Paragraph(p), Block::Paragraph(q)) => node.text = text::text_edits(p, q),
        (Block::Table(p), Block::Table(q)) => {
            let (matching, children) = diff_table(p, q, options);
            node.table = Some(matching);
            node.children = children;
        }
        _ => {}
    }
    node
}

/// Row and column alignment of a modified table. With no surviving row or
/// column the correspondence is empty and the table is rebuilt.
pub fn match_table(pristine: &Table, current: &Table) -> TableMatch {
    let row_pairs = align(
        &pristine.rows,
        &current.rows,
        row_key,
        |a, b| Some(similarity(&a.plain_text(), &b.plain_text())),
        None,
    );
    let mut rows = vec![None; current.rows.len()];
    let mut matched = Vec::new();
    for pairing in &row_pairs {
        if let Pairing::Equal(i, j) | Pairing::Modified(i, j) = *pairing {
            rows[j] = Some(i);
            matched.push((i, j));
        }
    }

    let old_columns = pristine.column_count();
    let new_columns = current.column_count();
    let columns = if matched.is_empty() {
        vec![None; new_columns]
    } else if old_columns == new_columns {
        (0..new_columns).map(Some).collect()
    } else {
        let old_sigs: Vec<Column> = (0..old_columns)
            .map(|c| Column::of(c, matched.iter().map(|(i, _)| &pristine.rows[*i])))
            .collect();
        let new_sigs: Vec<Column> = (0..new_columns)
            .map(|c| Column::of(c, matched.iter().map(|(_, j)| &current.rows[*j])))
            .collect();
        let mut columns = vec![None; new_columns];
        for pairing in align(
            &old_sigs,
            &new_sigs,
            |c| c.key.clone(),
            |a, b| Some(similarity(&a.text, &b.text)),
            None,
        ) {
            if let Pairing::Equal(i, j) | Pairing::Modified(i, j) = pairing {
                columns[j] = Some(i);
            }
        }
        columns
    };

    if columns.iter().all(Option::is_none) {
        return TableMatch {
            rows: vec![None; current.rows.len()],
            columns,
        };
    }
    TableMatch { rows, columns }
}

struct Column {
    key: String,
    text: String,
}

impl Column {
    fn of<'r>(index: usize, rows: impl Iterator<Item = &'r TableRow>) -> Self {
        let mut key = String::new();
        let mut text = Vec::new();
        for row in rows {
            match row.cells.get(index) {
                Some(cell) => {
                    key.push_str(&cell_key(cell));
                    text.push(blocks_plain_text(&cell.content));
                }
                None => key.push_str("<td/>"),
            }
        }
        Self {
            key,
            text: text.join("\n"),
        }
    }
}

fn diff_table<'a>(
    pristine: &'a Table,
    current: &'a Table,
    options: &DiffOptions,
) -> (TableMatch, Vec<ChangeNode<'a>>) {
    let matching = match_table(pristine, current);
    let mut children = Vec::new();

    let kept_columns: Vec<usize> = matching.columns.iter().flatten().copied().collect();
    for c in (0..pristine.column_count()).filter(|c| !kept_columns.contains(c)) {
        let mut node = ChangeNode::new(NodeKind::Column, ChangeOp::Deleted);
        node.pristine_index = Some(c);
        children.push(node);
    }
    for (c, _) in matching.columns.iter().enumerate().filter(|(_, m)| m.is_none()) {
        let mut node = ChangeNode::new(NodeKind::Column, ChangeOp::Added);
        node.current_index = Some(c);
        children.push(node);
    }

    let kept_rows: Vec<usize> = matching.surviving_rows().collect();
    for (i, row) in pristine.rows.iter().enumerate() {
        if !kept_rows.contains(&i) {
            children.push(row_node(ChangeOp::Deleted, Some((i, row)), None));
        }
    }
    let mut pending_added = Vec::new();
    for (j, row) in current.rows.iter().enumerate() {
        match matching.rows[j] {
            None => pending_added.push(j),
            Some(i) => {
                for added in pending_added.drain(..) {
                    let after = Some((added, &current.rows[added]));
                    let mut node = row_node(ChangeOp::Added, None, after);
                    node.slot = Some(i);
                    children.push(node);
                }
                let cells = diff_row(&pristine.rows[i], row, &matching.columns, options);
                if !cells.is_empty() {
                    let mut node = row_node(
                        ChangeOp::Modified,
                        Some((i, &pristine.rows[i])),
                        Some((j, row)),
                    );
                    node.children = cells;
                    children.push(node);
                }
            }
        }
    }
    for added in pending_added {
        let mut node = row_node(ChangeOp::Added, None, Some((added, &current.rows[added])));
        node.slot = Some(pristine.rows.len());
        children.push(node);
    }
    (matching, children)
}

fn row_node<'a>(
    op: ChangeOp,
    before: Option<(usize, &'a TableRow)>,
    after: Option<(usize, &'a TableRow)>,
) -> ChangeNode<'a> {
    let mut node = ChangeNode::new(NodeKind::Row, op);
    if let Some((i, row)) = before {
        node.pristine_index = Some(i);
        node.pristine_span = Some(row.span);
        node.before_xml = Some(row_to_xml(row));
        node.before = Some(Subject::Row(row));
    }
    if let Some((j, row)) = after {
        node.current_index = Some(j);
        node.after_xml = Some(row_to_xml(row));
        node.after = Some(Subject::Row(row));
    }
    node
}

fn diff_row<'a>(
    pristine: &'a TableRow,
    current: &'a TableRow,
    columns: &[Option<usize>],
    options: &DiffOptions,
) -> Vec<ChangeNode<'a>> {
    let mut out = Vec::new();
    for (c, cell) in current.cells.iter().enumerate() {
        let old = columns
            .get(c)
            .copied()
            .flatten()
            .and_then(|o| pristine.cells.get(o).map(|cell| (o, cell)));
        match old {
            Some((o, old)) => {
                if cell_key(old) == cell_key(cell) {
                    continue;
                }
                let mut node = cell_node(ChangeOp::Modified, Some((o, old)), Some((c, cell)));
                node.children = diff_blocks(&old.content, &cell.content, options);
                out.push(node);
            }
            None => out.push(cell_node(ChangeOp::Added, None, Some((c, cell)))),
        }
    }
    out
}

fn cell_node<'a>(
    op: ChangeOp,
    before: Option<(usize, &'a TableCell)>,
    after: Option<(usize, &'a TableCell)>,
) -> ChangeNode<'a> {
    let mut node = ChangeNode::new(NodeKind::Cell, op);
    if let Some((i, cell)) = before {
        node.pristine_index = Some(i);
        node.pristine_span = Some(cell.span);
        node.before_xml = Some(cell_to_xml(cell));
        node.before = Some(Subject::Cell(cell));
    }
    if let Some((j, cell)) = after {
        node.current_index = Some(j);
        node.after_xml = Some(cell_to_xml(cell));
        node.after = Some(Subject::Cell(cell));
    }
    node
}
