//! Operations for tables: cell content first, then structure, then the
//! content of cells the structure changes brought in.

use crate::diff::{ChangeNode, ChangeOp, NodeKind, diff_blocks};
use crate::error::ValidationError;
use crate::indexing::{CellLayout, Indexer, detect_layout};
use crate::model::{Table, TableCell, TableRow};

use super::Emitter;
use super::container::container;

/// Turns `pristine` into `current`, given the modified table's node.
pub(crate) fn modified(
    emit: &mut Emitter,
    pristine: &Table,
    current: &Table,
    node: &ChangeNode<'_>,
) -> Result<(), ValidationError> {
    let Some(matching) = &node.table else {
        return Ok(());
    };
    let start = pristine.span.start;

    // Cells present on both sides, bottom right to top left.
    let mut cells: Vec<(usize, usize, &ChangeNode<'_>, usize, usize)> = Vec::new();
    for row in children(node, NodeKind::Row, ChangeOp::Modified) {
        let (Some(ri), Some(rj)) = (row.pristine_index, row.current_index) else {
            continue;
        };
        for cell in row
            .children
            .iter()
            .filter(|c| c.kind == NodeKind::Cell && c.op == ChangeOp::Modified)
        {
            if let (Some(ci), Some(cj)) = (cell.pristine_index, cell.current_index) {
                cells.push((ri, ci, cell, rj, cj));
            }
        }
    }
    cells.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    for (ri, ci, cell, rj, cj) in cells {
        let (Some(old), Some(new)) = (
            pristine.rows.get(ri).and_then(|r| r.cells.get(ci)),
            current.rows.get(rj).and_then(|r| r.cells.get(cj)),
        ) else {
            continue;
        };
        container(emit, &old.content, &new.content, &cell.children)?;
    }

    let mut deleted_rows = indices(node, NodeKind::Row, ChangeOp::Deleted, |n| n.pristine_index);
    deleted_rows.sort_unstable_by(|a, b| b.cmp(a));
    for row in deleted_rows {
        emit.delete_row(start, row);
    }
    let mut deleted_columns =
        indices(node, NodeKind::Column, ChangeOp::Deleted, |n| n.pristine_index);
    deleted_columns.sort_unstable_by(|a, b| b.cmp(a));
    for column in deleted_columns {
        emit.delete_column(start, column);
    }

    let mut added_columns = indices(node, NodeKind::Column, ChangeOp::Added, |n| n.current_index);
    added_columns.sort_unstable();
    for &column in &added_columns {
        match column.checked_sub(1) {
            Some(left) => emit.insert_column(start, left, true),
            None => emit.insert_column(start, 0, false),
        }
    }
    let mut added_rows = indices(node, NodeKind::Row, ChangeOp::Added, |n| n.current_index);
    added_rows.sort_unstable();
    for &row in &added_rows {
        match row.checked_sub(1) {
            Some(above) => emit.insert_row(start, above, true),
            None => emit.insert_row(start, 0, false),
        }
    }

    if !added_rows.is_empty() || !added_columns.is_empty() {
        // The table as it stands now: current shape, kept cells already
        // edited to their current content, new cells empty.
        let mut shaped = Table {
            id: None,
            rows: current
                .rows
                .iter()
                .enumerate()
                .map(|(j, row)| TableRow {
                    cells: row
                        .cells
                        .iter()
                        .enumerate()
                        .map(|(c, cell)| {
                            let kept = matching.rows[j].is_some()
                                && matching.columns.get(c).copied().flatten().is_some();
                            if kept { cell.clone() } else { TableCell::empty() }
                        })
                        .collect(),
                    span: Default::default(),
                })
                .collect(),
            column_widths: Vec::new(),
            span: Default::default(),
        };
        Indexer::new(start).table_with_layout(&mut shaped, detect_layout(pristine));
        let fresh: Vec<(usize, usize)> = current
            .rows
            .iter()
            .enumerate()
            .flat_map(|(j, row)| (0..row.cells.len()).map(move |c| (j, c)))
            .filter(|&(j, c)| {
                matching.rows[j].is_none() || matching.columns.get(c).copied().flatten().is_none()
            })
            .collect();
        fill_cells(emit, &shaped, current, fresh)?;
    }

    for c in 0..current.column_count() {
        let old = matching
            .columns
            .get(c)
            .copied()
            .flatten()
            .and_then(|o| pristine.column_widths.get(o).copied().flatten());
        let new = current.column_widths.get(c).copied().flatten();
        if old != new {
            emit.column_width(start, c, new);
        }
    }
    Ok(())
}

/// Fills a table just inserted at `start` with the content of `table`.
pub(crate) fn fill_added(
    emit: &mut Emitter,
    start: u32,
    table: &Table,
) -> Result<(), ValidationError> {
    let mut shaped = Table::empty(table.rows.len(), table.column_count());
    Indexer::new(start).table_with_layout(&mut shaped, CellLayout::Marked);
    let every: Vec<(usize, usize)> = table
        .rows
        .iter()
        .enumerate()
        .flat_map(|(j, row)| (0..row.cells.len()).map(move |c| (j, c)))
        .collect();
    fill_cells(emit, &shaped, table, every)?;
    for (c, width) in table.column_widths.iter().enumerate() {
        if width.is_some() {
            emit.column_width(start, c, *width);
        }
    }
    Ok(())
}

/// Diffs each listed cell of `shaped` against the same cell of `target`
/// and emits the edits, last cell first.
fn fill_cells(
    emit: &mut Emitter,
    shaped: &Table,
    target: &Table,
    mut cells: Vec<(usize, usize)>,
) -> Result<(), ValidationError> {
    let options = *emit.options();
    cells.sort_unstable_by(|a, b| b.cmp(a));
    for (j, c) in cells {
        let (Some(have), Some(want)) = (
            shaped.rows.get(j).and_then(|r| r.cells.get(c)),
            target.rows.get(j).and_then(|r| r.cells.get(c)),
        ) else {
            continue;
        };
        let changes = diff_blocks(&have.content, &want.content, &options);
        container(emit, &have.content, &want.content, &changes)?;
    }
    Ok(())
}

fn children<'n, 'a>(
    node: &'n ChangeNode<'a>,
    kind: NodeKind,
    op: ChangeOp,
) -> impl Iterator<Item = &'n ChangeNode<'a>> {
    node.children
        .iter()
        .filter(move |n| n.kind == kind && n.op == op)
}

fn indices(
    node: &ChangeNode<'_>,
    kind: NodeKind,
    op: ChangeOp,
    index: fn(&ChangeNode<'_>) -> Option<usize>,
) -> Vec<usize> {
    children(node, kind, op).filter_map(index).collect()
}
