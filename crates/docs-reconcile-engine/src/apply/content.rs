//! Index-addressed walks over a block container.

use crate::error::ValidationError;
use crate::model::{Block, Paragraph, Table, TableCell, TextField, TextStyle};

use super::units;

/// The cell whose content holds `index`. Row and cell markers are not
/// addressable.
fn cell_at_mut(table: &mut Table, index: u32) -> Result<&mut TableCell, ValidationError> {
    let row = table
        .rows
        .iter_mut()
        .find(|r| r.span.contains(index))
        .ok_or(ValidationError::InsideTableStructure { index })?;
    if index == row.span.start {
        return Err(ValidationError::InsideTableStructure { index });
    }
    let cell = row
        .cells
        .iter_mut()
        .find(|c| c.span.contains(index))
        .ok_or(ValidationError::InsideTableStructure { index })?;
    if index < cell.content_start() {
        return Err(ValidationError::InsideTableStructure { index });
    }
    Ok(cell)
}

pub(crate) fn insert_text(
    blocks: &mut [Block],
    index: u32,
    text: &str,
) -> Result<(), ValidationError> {
    let block = blocks
        .iter_mut()
        .find(|b| b.span().contains(index))
        .ok_or(ValidationError::NotTextPosition { index })?;
    match block {
        Block::Paragraph(p) => units::insert_text(p, index, text),
        Block::Table(t) => {
            if index == t.span.start {
                return Err(ValidationError::InsertAtTableStart { index });
            }
            insert_text(&mut cell_at_mut(t, index)?.content, index, text)
        }
        Block::SectionBreak(_) | Block::TableOfContents(_) | Block::Opaque(_) => {
            Err(ValidationError::NotTextPosition { index })
        }
    }
}

/// Deletes `[start, end)` from a container, then merges every paragraph
/// that lost its terminator into the paragraph after it. The merged
/// paragraph keeps the first paragraph's style and bullet.
pub(crate) fn delete_range(
    blocks: &mut Vec<Block>,
    start: u32,
    end: u32,
) -> Result<(), ValidationError> {
    let mut i = 0;
    while i < blocks.len() {
        let span = blocks[i].span();
        if !span.overlaps(start, end) {
            i += 1;
            continue;
        }
        if start <= span.start && span.end <= end {
            blocks.remove(i);
            continue;
        }
        match &mut blocks[i] {
            Block::Paragraph(p) => units::delete(p, start.max(span.start), end.min(span.end))?,
            Block::Table(t) => {
                let cell = t
                    .rows
                    .iter_mut()
                    .flat_map(|r| &mut r.cells)
                    .find(|c| c.content_start() <= start && end <= c.span.end)
                    .ok_or(ValidationError::PartialStructureDeletion { start, end })?;
                if end == cell.span.end {
                    return Err(ValidationError::DeletesCellTerminator {
                        start,
                        end,
                        terminator: end - 1,
                    });
                }
                delete_range(&mut cell.content, start, end)?;
            }
            Block::SectionBreak(_) | Block::TableOfContents(_) | Block::Opaque(_) => {
                return Err(ValidationError::PartialStructureDeletion { start, end });
            }
        }
        i += 1;
    }
    merge_unterminated(blocks, start, end)
}

fn merge_unterminated(
    blocks: &mut Vec<Block>,
    start: u32,
    end: u32,
) -> Result<(), ValidationError> {
    let mut i = 0;
    while i < blocks.len() {
        let terminator = match &blocks[i] {
            Block::Paragraph(p) if !units::has_terminator(p) => p.span.end.saturating_sub(1),
            _ => {
                i += 1;
                continue;
            }
        };
        match blocks.get(i + 1) {
            Some(Block::Paragraph(_)) => {}
            Some(_) => return Err(ValidationError::TerminatorBeforeTable { index: terminator }),
            None => {
                return Err(ValidationError::DeletesFinalTerminator {
                    start,
                    end,
                    terminator,
                });
            }
        }
        let next = blocks.remove(i + 1);
        if let (Block::Paragraph(p), Block::Paragraph(next)) = (&mut blocks[i], next) {
            p.elements.extend(next.elements);
            p.compact();
        }
    }
    Ok(())
}

/// Visits every paragraph overlapping `[start, end)`, descending into
/// table cells and tables of contents.
pub(crate) fn for_each_paragraph(
    blocks: &mut [Block],
    start: u32,
    end: u32,
    f: &mut dyn FnMut(&mut Paragraph),
) {
    for block in blocks {
        if !block.span().overlaps(start, end) {
            continue;
        }
        match block {
            Block::Paragraph(p) => f(p),
            Block::Table(t) => {
                for cell in t.rows.iter_mut().flat_map(|r| &mut r.cells) {
                    if cell.span.overlaps(start, end) {
                        for_each_paragraph(&mut cell.content, start, end, f);
                    }
                }
            }
            Block::TableOfContents(toc) => for_each_paragraph(&mut toc.children, start, end, f),
            Block::SectionBreak(_) | Block::Opaque(_) => {}
        }
    }
}

pub(crate) fn restyle_text(
    blocks: &mut [Block],
    start: u32,
    end: u32,
    style: &TextStyle,
    fields: &[TextField],
) {
    for_each_paragraph(blocks, start, end, &mut |p| {
        units::restyle(p, start, end, style, fields);
    });
}

/// Finds the table starting at `start`, searching nested cells too.
pub(crate) fn table_at_mut(blocks: &mut [Block], start: u32) -> Option<&mut Table> {
    let block = blocks.iter_mut().find(|b| b.span().contains(start))?;
    match block {
        Block::Table(t) => {
            if t.span.start == start {
                return Some(t);
            }
            let cell = t
                .rows
                .iter_mut()
                .flat_map(|r| &mut r.cells)
                .find(|c| c.span.contains(start))?;
            table_at_mut(&mut cell.content, start)
        }
        Block::TableOfContents(toc) => table_at_mut(&mut toc.children, start),
        _ => None,
    }
}

/// Inserts `table` in front of the paragraph that starts at `at`, provided
/// a paragraph also ends there. Returns the table back when no container
/// has such a split point.
pub(crate) fn place_table(blocks: &mut Vec<Block>, at: u32, mut table: Table) -> Result<(), Table> {
    let split = blocks.iter().position(|b| b.span().start == at && b.is_paragraph());
    if let Some(pos) = split
        && pos > 0
        && blocks[pos - 1].is_paragraph()
    {
        blocks.insert(pos, Block::Table(table));
        return Ok(());
    }
    for block in blocks.iter_mut() {
        if !block.span().contains(at) {
            continue;
        }
        if let Block::Table(t) = block {
            for cell in t.rows.iter_mut().flat_map(|r| &mut r.cells) {
                if cell.span.contains(at) {
                    match place_table(&mut cell.content, at, table) {
                        Ok(()) => return Ok(()),
                        Err(back) => table = back,
                    }
                }
            }
        }
    }
    Err(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse;
    use crate::snapshot::blocks_to_xml;
    use pretty_assertions::assert_eq;

    fn body(input: &str) -> Vec<Block> {
        parse(input).unwrap().tabs.remove(0).body.blocks
    }

    #[test]
    fn delete_across_paragraphs_keeps_first_style() {
        let mut blocks = body("<h1>First</h1><p>Second</p><p>Third</p>");
        delete_range(&mut blocks, 6, 13).unwrap();
        assert_eq!(blocks_to_xml(&blocks), "<h1>First</h1><p>Third</p>");
    }

    #[test]
    fn delete_of_whole_table_is_allowed() {
        let mut blocks = body("<p>a</p><table><tr><td>x</td></tr></table><p>b</p>");
        let span = blocks[1].span();
        delete_range(&mut blocks, span.start, span.end).unwrap();
        assert_eq!(blocks_to_xml(&blocks), "<p>a</p><p>b</p>");
    }

    #[test]
    fn partial_table_deletion_is_rejected() {
        let mut blocks = body("<p>a</p><table><tr><td>x</td></tr></table><p>b</p>");
        assert_eq!(
            delete_range(&mut blocks, 2, 5),
            Err(ValidationError::PartialStructureDeletion { start: 2, end: 5 })
        );
    }

    #[test]
    fn terminator_before_table_is_rejected() {
        let mut blocks = body("<p>a</p><table><tr><td>x</td></tr></table><p>b</p>");
        assert_eq!(
            delete_range(&mut blocks, 2, 3),
            Err(ValidationError::TerminatorBeforeTable { index: 2 })
        );
    }

    #[test]
    fn cell_terminator_is_protected() {
        // table at 3, row 4, cell 5, content "x\n" at 6..8
        let mut blocks = body("<p>a</p><table><tr><td>x</td></tr></table><p>b</p>");
        assert_eq!(
            delete_range(&mut blocks, 6, 8),
            Err(ValidationError::DeletesCellTerminator {
                start: 6,
                end: 8,
                terminator: 7
            })
        );
        delete_range(&mut blocks, 6, 7).unwrap();
        assert_eq!(
            blocks_to_xml(&blocks),
            "<p>a</p><table><tr><td><p></p></td></tr></table><p>b</p>"
        );
    }

    #[test]
    fn insert_targets_cell_content_only() {
        let mut blocks = body("<p>a</p><table><tr><td>x</td></tr></table><p>b</p>");
        assert_eq!(
            insert_text(&mut blocks, 3, "!"),
            Err(ValidationError::InsertAtTableStart { index: 3 })
        );
        assert_eq!(
            insert_text(&mut blocks, 4, "!"),
            Err(ValidationError::InsideTableStructure { index: 4 })
        );
        assert_eq!(
            insert_text(&mut blocks, 5, "!"),
            Err(ValidationError::InsideTableStructure { index: 5 })
        );
        insert_text(&mut blocks, 6, "!").unwrap();
        assert_eq!(
            blocks_to_xml(&blocks),
            "<p>a</p><table><tr><td><p>!x</p></td></tr></table><p>b</p>"
        );
    }

    #[test]
    fn finds_nested_tables() {
        let mut blocks = body(
            "<table><tr><td><p>a</p><table><tr><td>z</td></tr></table><p></p></td></tr></table><p></p>",
        );
        // outer 1, row 2, cell 3, "a\n" 4..6, inner table at 6
        assert!(table_at_mut(&mut blocks, 6).is_some());
        assert!(table_at_mut(&mut blocks, 1).is_some());
        assert!(table_at_mut(&mut blocks, 4).is_none());
    }
}
