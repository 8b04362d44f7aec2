//! Assertions over indexed trees, for tests and debug checks.

use crate::model::{Block, Inline, Segment};

/// Panics unless every sibling span abuts the next and the first block
/// starts at the segment origin.
pub fn check(segment: &Segment) {
    assert_eq!(
        segment.blocks.first().map(|b| b.span().start),
        Some(segment.origin()),
        "first block of {} does not start at its origin",
        segment.id
    );
    check_blocks(&segment.blocks);
    if let Some(Block::Paragraph(last)) = segment.blocks.last() {
        assert!(
            last.terminator_style().is_some(),
            "last paragraph of {} has no terminator",
            segment.id
        );
    }
}

fn check_blocks(blocks: &[Block]) {
    for pair in blocks.windows(2) {
        assert_eq!(
            pair[0].span().end,
            pair[1].span().start,
            "gap or overlap between {:?} and {:?}",
            pair[0].span(),
            pair[1].span()
        );
    }
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                let mut at = p.span.start;
                check_inlines(&p.elements, &mut at);
                assert_eq!(at, p.span.end, "runs do not fill paragraph {:?}", p.span);
            }
            Block::Table(t) => {
                for row in &t.rows {
                    assert!(t.span.start < row.span.start && row.span.end <= t.span.end);
                    for cell in &row.cells {
                        assert!(row.span.start < cell.span.start && cell.span.end <= row.span.end);
                        check_blocks(&cell.content);
                    }
                }
            }
            Block::TableOfContents(toc) => check_blocks(&toc.children),
            Block::SectionBreak(_) | Block::Opaque(_) => {
                assert_eq!(block.span().len(), 1);
            }
        }
    }
}

fn check_inlines(elements: &[Inline], at: &mut u32) {
    for element in elements {
        match element {
            Inline::Text(run) => {
                assert_eq!(run.span.start, *at, "run starts at a gap");
                *at = run.span.end;
            }
            Inline::Special(s) => {
                assert_eq!(s.span.start, *at, "special starts at a gap");
                *at = s.span.end;
            }
            Inline::CommentRef(c) => check_inlines(&c.children, at),
        }
    }
}
