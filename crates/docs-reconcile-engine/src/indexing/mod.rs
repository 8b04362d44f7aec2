//! Span computation.
//!
//! Counting rules, in UTF-16 code units:
//!
//! - a paragraph is its inline length, terminator included
//! - a section break, an opaque block and a non-equation special inline are 1
//! - an equation is its declared `length`
//! - a table is 1, plus 1 per row, plus 1 per cell marker, plus cell content
//! - a table of contents is 1 plus its children
//!
//! The indexer threads an owned running offset through a recursive walk and
//! rewrites every span from scratch. Nothing is ever shifted in place.

pub mod invariants;

use crate::model::{
    Block, Document, Inline, Paragraph, Segment, Span, Table, TableCell, origin_for, utf16_len,
};

/// How cells of a table occupy index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLayout {
    /// Every cell opens with its own one-unit marker.
    Marked,
    /// Cell content starts right where the cell starts.
    Unmarked,
}

impl CellLayout {
    pub fn cell_marker_len(self) -> u32 {
        match self {
            CellLayout::Marked => 1,
            CellLayout::Unmarked => 0,
        }
    }
}

/// Probes the first cell that already carries a span. Cells that have never
/// been indexed are skipped, and a table with none is [`CellLayout::Marked`].
pub fn detect_layout(table: &Table) -> CellLayout {
    let probe = table
        .rows
        .iter()
        .flat_map(|r| &r.cells)
        .find(|c| !c.span.is_empty());
    let Some(cell) = probe else {
        return CellLayout::Marked;
    };
    match cell.content.first().map(Block::span) {
        Some(content) if content.start == cell.span.start => CellLayout::Unmarked,
        _ => CellLayout::Marked,
    }
}

pub struct Indexer {
    offset: u32,
}

impl Indexer {
    pub fn new(origin: u32) -> Self {
        Self { offset: origin }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn blocks(&mut self, blocks: &mut [Block]) {
        for block in blocks {
            self.block(block);
        }
    }

    fn block(&mut self, block: &mut Block) {
        let start = self.offset;
        match block {
            Block::Paragraph(p) => self.paragraph(p),
            Block::Table(t) => self.table(t),
            Block::TableOfContents(toc) => {
                self.offset += 1;
                self.blocks(&mut toc.children);
            }
            Block::SectionBreak(_) | Block::Opaque(_) => self.offset += 1,
        }
        *block.span_mut() = Span::new(start, self.offset);
    }

    fn paragraph(&mut self, p: &mut Paragraph) {
        let start = self.offset;
        self.inlines(&mut p.elements);
        p.span = Span::new(start, self.offset);
    }

    fn inlines(&mut self, elements: &mut [Inline]) {
        for element in elements {
            let start = self.offset;
            match element {
                Inline::Text(run) => {
                    self.offset += utf16_len(&run.content);
                    run.span = Span::new(start, self.offset);
                }
                Inline::Special(special) => {
                    self.offset += special.length();
                    special.span = Span::new(start, self.offset);
                }
                Inline::CommentRef(cref) => {
                    self.inlines(&mut cref.children);
                    cref.span = Span::new(start, self.offset);
                }
            }
        }
    }

    fn table(&mut self, table: &mut Table) {
        let layout = detect_layout(table);
        self.table_with_layout(table, layout);
    }

    /// Indexes a table with an explicit cell layout instead of probing it.
    pub fn table_with_layout(&mut self, table: &mut Table, layout: CellLayout) {
        let start = self.offset;
        self.offset += 1;
        for row in &mut table.rows {
            let row_start = self.offset;
            self.offset += 1;
            for cell in &mut row.cells {
                self.cell(cell, layout);
            }
            row.span = Span::new(row_start, self.offset);
        }
        table.span = Span::new(start, self.offset);
    }

    fn cell(&mut self, cell: &mut TableCell, layout: CellLayout) {
        let start = self.offset;
        self.offset += layout.cell_marker_len();
        self.blocks(&mut cell.content);
        cell.span = Span::new(start, self.offset);
    }

    /// Consumes the indexer, returning the exclusive end offset.
    pub fn finish(self) -> u32 {
        self.offset
    }
}

/// Indexes a top-level block sequence and returns its end offset.
pub fn index_blocks(blocks: &mut [Block], is_body: bool) -> u32 {
    let mut indexer = Indexer::new(origin_for(is_body, blocks));
    indexer.blocks(blocks);
    indexer.finish()
}

/// Indexes `blocks` as if they started at `origin`.
pub fn index_blocks_at(blocks: &mut [Block], origin: u32) -> u32 {
    let mut indexer = Indexer::new(origin);
    indexer.blocks(blocks);
    indexer.finish()
}

pub fn index_segment(segment: &mut Segment) -> u32 {
    index_blocks(&mut segment.blocks, segment.id.is_body())
}

/// Recomputes every span of every segment of every tab.
pub fn index_document(document: &mut Document) {
    for tab in &mut document.tabs {
        for segment in tab.segments_mut() {
            index_segment(segment);
        }
    }
}

/// Length of a block in code units, without touching its spans.
pub fn measure(block: &Block) -> u32 {
    match block {
        Block::Paragraph(p) => measure_inlines(&p.elements),
        Block::Table(t) => {
            let marker = detect_layout(t).cell_marker_len();
            1 + t
                .rows
                .iter()
                .map(|row| {
                    1 + row
                        .cells
                        .iter()
                        .map(|c| marker + measure_blocks(&c.content))
                        .sum::<u32>()
                })
                .sum::<u32>()
        }
        Block::TableOfContents(toc) => 1 + measure_blocks(&toc.children),
        Block::SectionBreak(_) | Block::Opaque(_) => 1,
    }
}

pub fn measure_blocks(blocks: &[Block]) -> u32 {
    blocks.iter().map(measure).sum()
}

pub fn measure_inlines(elements: &[Inline]) -> u32 {
    elements
        .iter()
        .map(|e| match e {
            Inline::Text(run) => utf16_len(&run.content),
            Inline::Special(s) => s.length(),
            Inline::CommentRef(c) => measure_inlines(&c.children),
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SectionBreak, SegmentId, TextRun, TextStyle};
    use pretty_assertions::assert_eq;

    fn para(text: &str) -> Block {
        Block::Paragraph(Paragraph::with_text(text))
    }

    fn spans(blocks: &[Block]) -> Vec<(u32, u32)> {
        blocks
            .iter()
            .map(|b| (b.span().start, b.span().end))
            .collect()
    }

    #[test]
    fn body_starts_at_one() {
        let mut blocks = vec![para("Hello"), para("World")];
        let end = index_blocks(&mut blocks, true);
        assert_eq!(spans(&blocks), vec![(1, 7), (7, 13)]);
        assert_eq!(end, 13);
    }

    #[test]
    fn leading_section_break_starts_at_zero() {
        let mut blocks = vec![
            Block::SectionBreak(SectionBreak {
                span: Span::default(),
            }),
            para("Hi"),
        ];
        index_blocks(&mut blocks, true);
        assert_eq!(spans(&blocks), vec![(0, 1), (1, 4)]);
    }

    #[test]
    fn header_starts_at_zero() {
        let mut segment = Segment::new(SegmentId::Header("h".into()));
        index_segment(&mut segment);
        assert_eq!(spans(&segment.blocks), vec![(0, 1)]);
    }

    #[test]
    fn astral_characters_count_twice() {
        let mut blocks = vec![para("a😀")];
        index_blocks(&mut blocks, false);
        assert_eq!(spans(&blocks), vec![(0, 4)]);
    }

    #[test]
    fn table_markers() {
        // 2x1 table: table marker, then per row a row marker, a cell marker
        // and a one-unit empty paragraph.
        let mut blocks = vec![para("A"), Block::Table(Table::empty(2, 1)), para("")];
        index_blocks(&mut blocks, true);
        assert_eq!(spans(&blocks), vec![(1, 3), (3, 10), (10, 11)]);
        let Block::Table(table) = &blocks[1] else {
            unreachable!()
        };
        assert_eq!(table.rows[0].span, Span::new(4, 7));
        assert_eq!(table.rows[0].cells[0].span, Span::new(5, 7));
        assert_eq!(table.rows[0].cells[0].content_start(), 6);
        assert_eq!(table.rows[1].span, Span::new(7, 10));
        assert_eq!(measure(&blocks[1]), 7);
    }

    #[test]
    fn unmarked_layout_is_detected_and_kept() {
        let mut table = Table::empty(1, 2);
        // Spans as delivered by a server that omits cell markers.
        table.rows[0].cells[0].span = Span::new(3, 4);
        *table.rows[0].cells[0].content[0].span_mut() = Span::new(3, 4);
        assert_eq!(detect_layout(&table), CellLayout::Unmarked);

        let mut blocks = vec![para("A"), Block::Table(table), para("")];
        index_blocks(&mut blocks, true);
        let Block::Table(table) = &blocks[1] else {
            unreachable!()
        };
        // 1 (table) + 1 (row) + 1 + 1 (two bare cells)
        assert_eq!(table.span, Span::new(3, 7));
        assert_eq!(table.rows[0].cells[1].span, Span::new(6, 7));
        assert_eq!(detect_layout(table), CellLayout::Unmarked);
    }

    #[test]
    fn probe_skips_cells_never_indexed() {
        let mut table = Table::empty(1, 2);
        table.rows[0].cells[1].span = Span::new(5, 6);
        *table.rows[0].cells[1].content[0].span_mut() = Span::new(5, 6);
        assert_eq!(detect_layout(&table), CellLayout::Unmarked);
        assert_eq!(detect_layout(&Table::empty(2, 2)), CellLayout::Marked);
    }

    #[test]
    fn runs_get_contiguous_spans() {
        let mut p = Paragraph::with_text("");
        p.elements = vec![
            Inline::Text(TextRun::new("ab", TextStyle::default())),
            Inline::Text(TextRun::new(
                "c\n",
                TextStyle {
                    bold: true,
                    ..TextStyle::default()
                },
            )),
        ];
        let mut blocks = vec![Block::Paragraph(p)];
        index_blocks(&mut blocks, false);
        let Block::Paragraph(p) = &blocks[0] else {
            unreachable!()
        };
        let run_spans: Vec<_> = p
            .elements
            .iter()
            .map(|e| match e {
                Inline::Text(r) => r.span,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(run_spans, vec![Span::new(0, 2), Span::new(2, 4)]);
    }

    #[test]
    fn nested_table_in_cell() {
        let mut outer = Table::empty(1, 1);
        outer.rows[0].cells[0].content = vec![
            para(""),
            Block::Table(Table::empty(1, 1)),
            para(""),
        ];
        let mut blocks = vec![Block::Table(outer), para("")];
        index_blocks(&mut blocks, false);
        // outer: 1 + row 1 + cell 1 + (1 + 4 + 1)
        assert_eq!(spans(&blocks), vec![(0, 9), (9, 10)]);
    }
}
