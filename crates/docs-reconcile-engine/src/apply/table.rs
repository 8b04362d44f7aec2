//! Table structure operations.

use crate::error::ValidationError;
use crate::indexing::index_segment;
use crate::model::{Block, Inline, Segment, Table, TableCell, TableRow, TextRun, TextStyle};
use crate::ops::{TableCellLocation, TableColumnProperties};

use super::content::{self, place_table, table_at_mut};
use super::normalize::normalize_blocks;
use super::validate::check_index;

/// Splits the paragraph at `index` and puts a `rows x columns` table of
/// empty cells between the two halves.
///
/// When the first half is an empty heading, its text style carries over to
/// the new cells.
pub(crate) fn insert_table(
    segment: &mut Segment,
    index: u32,
    rows: i32,
    columns: i32,
) -> Result<(), ValidationError> {
    if rows < 1 || columns < 1 {
        return Err(ValidationError::NonPositiveDimension {
            rows: rows.into(),
            columns: columns.into(),
        });
    }
    check_index(segment, index)?;
    content::insert_text(&mut segment.blocks, index, "\n")?;
    normalize_blocks(&mut segment.blocks);
    index_segment(segment);

    let mut table = Table::empty(rows as usize, columns as usize);
    if let Some(style) = heading_style_before(&segment.blocks, index + 1) {
        for cell in table.rows.iter_mut().flat_map(|r| &mut r.cells) {
            if let Some(Block::Paragraph(p)) = cell.content.first_mut() {
                p.elements = vec![Inline::Text(TextRun::new("\n", style.clone()))];
            }
        }
    }
    place_table(&mut segment.blocks, index + 1, table)
        .map_err(|_| ValidationError::NotTextPosition { index })
}

/// Text style of an empty heading paragraph ending at `at`, if there is one:
/// its terminator's own style when it has one, else its named style's.
fn heading_style_before(blocks: &[Block], at: u32) -> Option<TextStyle> {
    for block in blocks {
        match block {
            Block::Paragraph(p) if p.span.end == at => {
                if !p.is_empty() || !p.style.named.is_heading() {
                    return None;
                }
                let own = p.terminator_style().filter(|s| !s.is_plain()).cloned();
                return Some(own.unwrap_or_else(|| p.style.named.text_style()));
            }
            Block::Table(t) if t.span.contains(at) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    if cell.span.contains(at) {
                        return heading_style_before(&cell.content, at);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn located<'s>(
    segment: &'s mut Segment,
    location: &TableCellLocation,
) -> Result<&'s mut Table, ValidationError> {
    let index = location.table_start_location.index;
    table_at_mut(&mut segment.blocks, index).ok_or(ValidationError::TableNotFound { index })
}

fn row_index(table: &Table, row: i32) -> Result<usize, ValidationError> {
    usize::try_from(row)
        .ok()
        .filter(|r| *r < table.rows.len())
        .ok_or(ValidationError::RowOutOfRange {
            row: row.into(),
            rows: table.rows.len(),
        })
}

fn column_index(table: &Table, column: i32) -> Result<usize, ValidationError> {
    let columns = table.column_count();
    usize::try_from(column)
        .ok()
        .filter(|c| *c < columns)
        .ok_or(ValidationError::ColumnOutOfRange {
            column: column.into(),
            columns,
        })
}

pub(crate) fn insert_row(
    segment: &mut Segment,
    location: &TableCellLocation,
    below: bool,
) -> Result<(), ValidationError> {
    let table = located(segment, location)?;
    let row = row_index(table, location.row_index)?;
    column_index(table, location.column_index)?;
    let cells = (0..table.column_count()).map(|_| TableCell::empty()).collect();
    let at = if below { row + 1 } else { row };
    table.rows.insert(
        at,
        TableRow {
            cells,
            span: Default::default(),
        },
    );
    Ok(())
}

pub(crate) fn insert_column(
    segment: &mut Segment,
    location: &TableCellLocation,
    right: bool,
) -> Result<(), ValidationError> {
    let table = located(segment, location)?;
    row_index(table, location.row_index)?;
    let column = column_index(table, location.column_index)?;
    let at = if right { column + 1 } else { column };
    for row in &mut table.rows {
        let at = at.min(row.cells.len());
        row.cells.insert(at, TableCell::empty());
    }
    let at = at.min(table.column_widths.len());
    table.column_widths.insert(at, None);
    Ok(())
}

pub(crate) fn delete_row(
    segment: &mut Segment,
    location: &TableCellLocation,
) -> Result<(), ValidationError> {
    let table_start = location.table_start_location.index;
    let table = located(segment, location)?;
    let row = row_index(table, location.row_index)?;
    if table.rows.len() == 1 {
        return Err(ValidationError::LastRowOrColumn { table_start });
    }
    table.rows.remove(row);
    Ok(())
}

pub(crate) fn delete_column(
    segment: &mut Segment,
    location: &TableCellLocation,
) -> Result<(), ValidationError> {
    let table_start = location.table_start_location.index;
    let table = located(segment, location)?;
    row_index(table, location.row_index)?;
    let column = column_index(table, location.column_index)?;
    if table.column_count() == 1 {
        return Err(ValidationError::LastRowOrColumn { table_start });
    }
    for row in &mut table.rows {
        if column < row.cells.len() {
            row.cells.remove(column);
        }
    }
    if column < table.column_widths.len() {
        table.column_widths.remove(column);
    }
    Ok(())
}

pub(crate) fn update_columns(
    segment: &mut Segment,
    table_start: u32,
    columns: &[i32],
    properties: &TableColumnProperties,
) -> Result<(), ValidationError> {
    let table = table_at_mut(&mut segment.blocks, table_start).ok_or(
        ValidationError::TableNotFound { index: table_start },
    )?;
    let indices = columns
        .iter()
        .map(|c| column_index(table, *c))
        .collect::<Result<Vec<_>, _>>()?;
    let count = table.column_count();
    table.column_widths.resize(count, None);
    let width = properties.width_points();
    for column in indices {
        table.column_widths[column] = width;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::index_segment;
    use crate::ops::Route;
    use crate::parsing::parse;
    use crate::snapshot::blocks_to_xml;
    use pretty_assertions::assert_eq;

    fn body(input: &str) -> Segment {
        parse(input).unwrap().tabs.remove(0).body
    }

    #[test]
    fn insert_table_splits_paragraph() {
        let mut segment = body("<p>abcd</p>");
        insert_table(&mut segment, 3, 1, 2).unwrap();
        assert_eq!(
            blocks_to_xml(&segment.blocks),
            "<p>ab</p><table><tr><td><p></p></td><td><p></p></td></tr></table><p>cd</p>"
        );
    }

    #[test]
    fn insert_table_rejects_empty_dimensions() {
        let mut segment = body("<p>abcd</p>");
        assert_eq!(
            insert_table(&mut segment, 3, 0, 2),
            Err(ValidationError::NonPositiveDimension { rows: 0, columns: 2 })
        );
    }

    #[test]
    fn only_an_empty_heading_lends_its_style() {
        let bold = TextStyle {
            bold: true,
            ..TextStyle::default()
        };
        let mut segment = body("<h2></h2><h2>a</h2><p></p><p>x</p>");
        for block in &mut segment.blocks {
            if let Block::Paragraph(p) = block {
                let text = p.plain_text();
                p.elements = vec![Inline::Text(TextRun::new(format!("{text}\n"), bold.clone()))];
            }
        }
        index_segment(&mut segment);
        // h2 "" 1..2, h2 "a" 2..4, p "" 4..5, p "x" 5..7
        assert_eq!(heading_style_before(&segment.blocks, 2), Some(bold));
        assert_eq!(heading_style_before(&segment.blocks, 4), None);
        assert_eq!(heading_style_before(&segment.blocks, 5), None);
    }

    #[test]
    fn row_and_column_bounds() {
        let mut segment = body("<p>a</p><table><tr><td>x</td><td>y</td></tr></table><p></p>");
        let route = Route::default();
        assert_eq!(
            delete_row(&mut segment, &route.cell(3, 0, 0)),
            Err(ValidationError::LastRowOrColumn { table_start: 3 })
        );
        assert_eq!(
            insert_row(&mut segment, &route.cell(3, 1, 0), true),
            Err(ValidationError::RowOutOfRange { row: 1, rows: 1 })
        );
        assert_eq!(
            insert_column(&mut segment, &route.cell(3, 0, -1), true),
            Err(ValidationError::ColumnOutOfRange {
                column: -1,
                columns: 2
            })
        );
        assert_eq!(
            delete_column(&mut segment, &route.cell(9, 0, 0)),
            Err(ValidationError::TableNotFound { index: 9 })
        );

        insert_row(&mut segment, &route.cell(3, 0, 0), false).unwrap();
        delete_column(&mut segment, &route.cell(3, 0, 1)).unwrap();
        assert_eq!(
            blocks_to_xml(&segment.blocks),
            "<p>a</p><table><tr><td><p></p></td></tr><tr><td><p>x</p></td></tr></table><p></p>"
        );
    }
}
