//! Post-operation canonicalization: split runs at embedded terminators,
//! keep link styling off terminators, drop empty runs, then reindex.

use std::collections::BTreeSet;

use crate::indexing::index_document;
use crate::model::{Block, Document, Inline, Paragraph, SpecialKind, TextRun};

use super::units;

/// Footnote ids referenced from each tab, in tab order.
pub fn footnote_refs(document: &Document) -> Vec<BTreeSet<String>> {
    document
        .tabs
        .iter()
        .map(|tab| {
            let mut ids = BTreeSet::new();
            for segment in tab.segments() {
                collect_footnote_refs(&segment.blocks, &mut ids);
            }
            ids
        })
        .collect()
}

fn collect_footnote_refs(blocks: &[Block], ids: &mut BTreeSet<String>) {
    fn inlines(elements: &[Inline], ids: &mut BTreeSet<String>) {
        for element in elements {
            match element {
                Inline::Special(s) if s.kind == SpecialKind::FootnoteRef => {
                    if let Some(id) = s.attr("id") {
                        ids.insert(id.to_string());
                    }
                }
                Inline::CommentRef(c) => inlines(&c.children, ids),
                _ => {}
            }
        }
    }
    for block in blocks {
        match block {
            Block::Paragraph(p) => inlines(&p.elements, ids),
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    collect_footnote_refs(&cell.content, ids);
                }
            }
            Block::TableOfContents(toc) => collect_footnote_refs(&toc.children, ids),
            Block::SectionBreak(_) | Block::Opaque(_) => {}
        }
    }
}

/// Normalizes every segment of every tab and reindexes the document.
/// Footnotes whose reference was present in `referenced_before` but is now
/// gone are dropped.
pub fn normalize(document: &mut Document, referenced_before: &[BTreeSet<String>]) {
    for tab in &mut document.tabs {
        for segment in tab.segments_mut() {
            normalize_blocks(&mut segment.blocks);
        }
    }

    let referenced_now = footnote_refs(document);
    for (i, tab) in document.tabs.iter_mut().enumerate() {
        let (Some(before), Some(now)) = (referenced_before.get(i), referenced_now.get(i)) else {
            continue;
        };
        tab.footnotes.retain(|segment| {
            let id = segment.id.routing_id().unwrap_or_default();
            let vanished = before.contains(id) && !now.contains(id);
            if vanished {
                log::debug!("dropping footnote {id}: its reference was deleted");
            }
            !vanished
        });
    }

    index_document(document);
}

pub(crate) fn normalize_blocks(blocks: &mut Vec<Block>) {
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks.drain(..) {
        match block {
            Block::Paragraph(p) => {
                for mut piece in units::split_at_newlines(p) {
                    fix_terminator(&mut piece);
                    out.push(Block::Paragraph(piece));
                }
            }
            Block::Table(mut t) => {
                for cell in t.rows.iter_mut().flat_map(|r| &mut r.cells) {
                    normalize_blocks(&mut cell.content);
                }
                out.push(Block::Table(t));
            }
            Block::TableOfContents(mut toc) => {
                normalize_blocks(&mut toc.children);
                out.push(Block::TableOfContents(toc));
            }
            other => out.push(other),
        }
    }
    *blocks = out;
}

/// Link and foreground color never survive onto a paragraph terminator.
fn fix_terminator(p: &mut Paragraph) {
    p.compact();
    let Some(Inline::Text(run)) = p.elements.last_mut() else {
        return;
    };
    if !run.content.ends_with('\n') || (run.style.link.is_none() && run.style.foreground.is_none())
    {
        return;
    }
    let mut style = run.style.clone();
    style.link = None;
    style.foreground = None;
    if run.content == "\n" {
        run.style = style;
    } else {
        run.content.pop();
        p.elements.push(Inline::Text(TextRun::new("\n", style)));
    }
    p.compact();
}
