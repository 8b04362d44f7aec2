//! Operations for one block container: a segment body or a table cell.
//!
//! Work is ordered by pristine position, last first. A modified block at
//! `i` is visited before the gap that ends at `i`, and a gap is the run of
//! deleted pristine blocks in front of a surviving block together with the
//! blocks added there.
//!
//! Added blocks go in through one of two anchors:
//!
//! - prefix: when the gap is followed by a paragraph, content is inserted
//!   at that paragraph's start and split off in front of it
//! - suffix: otherwise content is inserted before the terminator of the
//!   paragraph that closes the gap, splitting it from the back

use std::collections::BTreeMap;

use crate::diff::{ChangeNode, ChangeOp};
use crate::error::ValidationError;
use crate::model::{Block, Bullet, Paragraph, ParagraphStyle, TextStyle};

use super::Emitter;
use super::paragraph::{
    inherited_style, insertable_text, modified as modified_paragraph, paragraph_changes,
    style_inserted,
};
use super::table;

#[derive(Default)]
struct Gap<'n, 'a> {
    /// First pristine block of the deleted run, if any.
    deleted_from: Option<usize>,
    added: Vec<&'n ChangeNode<'a>>,
}

enum Event<'n, 'a> {
    Modified(&'n ChangeNode<'a>),
    Gap(usize, Gap<'n, 'a>),
}

pub(crate) fn container(
    emit: &mut Emitter,
    pristine: &[Block],
    current: &[Block],
    changes: &[ChangeNode<'_>],
) -> Result<(), ValidationError> {
    for event in events(pristine.len(), changes) {
        match event {
            Event::Modified(node) => modified(emit, pristine, current, node)?,
            Event::Gap(end, gap) => {
                let mut added: Vec<usize> =
                    gap.added.iter().filter_map(|n| n.current_index).collect();
                added.sort_unstable();
                additions(emit, pristine, current, end, &added)?;
                if let Some(from) = gap.deleted_from {
                    deletion(emit, pristine, from, end)?;
                }
            }
        }
    }
    Ok(())
}

/// Modified blocks and gaps, last first.
fn events<'n, 'a>(len: usize, changes: &'n [ChangeNode<'a>]) -> Vec<Event<'n, 'a>> {
    let mut gaps: BTreeMap<usize, Gap<'n, 'a>> = BTreeMap::new();
    let mut deleted: Vec<usize> = changes
        .iter()
        .filter(|n| n.op == ChangeOp::Deleted)
        .filter_map(|n| n.pristine_index)
        .collect();
    deleted.sort_unstable();
    let mut k = 0;
    while k < deleted.len() {
        let from = deleted[k];
        let mut end = from + 1;
        while k + 1 < deleted.len() && deleted[k + 1] == end {
            k += 1;
            end += 1;
        }
        gaps.entry(end).or_default().deleted_from = Some(from);
        k += 1;
    }
    for node in changes.iter().filter(|n| n.op == ChangeOp::Added) {
        let slot = node.slot.unwrap_or(len);
        gaps.entry(slot).or_default().added.push(node);
    }

    let mut keyed: Vec<((usize, u8), Event<'n, 'a>)> = gaps
        .into_iter()
        .map(|(end, gap)| ((end, 0), Event::Gap(end, gap)))
        .collect();
    for node in changes.iter().filter(|n| n.op == ChangeOp::Modified) {
        if let Some(i) = node.pristine_index {
            keyed.push(((i, 1), Event::Modified(node)));
        }
    }
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    keyed.into_iter().map(|(_, event)| event).collect()
}

fn modified(
    emit: &mut Emitter,
    pristine: &[Block],
    current: &[Block],
    node: &ChangeNode<'_>,
) -> Result<(), ValidationError> {
    let (Some(i), Some(j)) = (node.pristine_index, node.current_index) else {
        return Ok(());
    };
    match (pristine.get(i), current.get(j)) {
        (Some(Block::Paragraph(p)), Some(Block::Paragraph(q))) => modified_paragraph(emit, p, q),
        (Some(Block::Table(p)), Some(Block::Table(q))) => table::modified(emit, p, q, node),
        (Some(Block::TableOfContents(toc)), _) => {
            log::warn!("table of contents at {} changed; left as is", toc.span.start);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Inserts `current[added]` (ascending) in front of pristine block `end`.
fn additions(
    emit: &mut Emitter,
    pristine: &[Block],
    current: &[Block],
    end: usize,
    added: &[usize],
) -> Result<(), ValidationError> {
    if added.is_empty() {
        return Ok(());
    }
    let prefix = pristine
        .get(end)
        .filter(|b| b.is_paragraph())
        .map(|b| b.span().start);
    let anchor = match prefix {
        Some(_) => None,
        None => Some(closing_paragraph(pristine, end)?),
    };

    for (k, &c) in added.iter().enumerate().rev() {
        let next_is_table = added
            .get(k + 1)
            .is_some_and(|n| matches!(current[*n], Block::Table(_)));
        match (&current[c], prefix, anchor) {
            (Block::Paragraph(q), Some(b), _) => {
                let mut text = insertable_text(&q.tokens())?;
                if !next_is_table {
                    text.push('\n');
                }
                emit.insert_text(b, text);
                style_inserted(emit, b, &q.tokens(), &TextStyle::default());
                let (style, bullet) = following_paragraph(current, c);
                paragraph_changes(emit, b, &style, bullet.as_ref(), q);
            }
            (Block::Paragraph(q), None, Some(pv)) => {
                let at = pv.span.end - 1;
                let text = insertable_text(&q.tokens())?;
                emit.insert_text(at, format!("\n{text}"));
                let pv_tokens = pv.tokens();
                let base = inherited_style(&pv_tokens, pv_tokens.len());
                style_inserted(emit, at + 1, &q.tokens(), &base);
                paragraph_changes(emit, at + 1, &pv.style, pv.bullet.as_ref(), q);
            }
            (Block::Table(t), Some(b), _) => {
                emit.insert_table(b, t.rows.len(), t.column_count());
                table::fill_added(emit, b + 1, t)?;
                if k == 0 {
                    emit.delete(b, b + 1);
                }
            }
            (Block::Table(t), None, Some(pv)) => {
                let followed = added
                    .get(k + 1)
                    .is_some_and(|n| current[*n].is_paragraph());
                if !followed {
                    return Err(ValidationError::UnsupportedEdit {
                        what: "adding a table that no paragraph follows".into(),
                    });
                }
                let at = pv.span.end;
                emit.insert_table(at, t.rows.len(), t.column_count());
                table::fill_added(emit, at + 1, t)?;
                emit.delete(at, at + 1);
            }
            (block, _, _) => {
                return Err(ValidationError::UnsupportedEdit {
                    what: format!("adding a {}", block.kind_name()),
                });
            }
        }
    }
    Ok(())
}

/// The paragraph right in front of pristine block `end`, which suffix
/// insertions split from the back.
fn closing_paragraph(pristine: &[Block], end: usize) -> Result<&Paragraph, ValidationError> {
    end.checked_sub(1)
        .and_then(|k| pristine[k].as_paragraph())
        .ok_or_else(|| ValidationError::UnsupportedEdit {
            what: match pristine.get(end) {
                Some(block) => format!("inserting in front of a {}", block.kind_name()),
                None => "inserting at the end of a container".into(),
            },
        })
}

/// Paragraph style and bullet that a prefix insertion in front of current
/// block `c + 1` picks up from the split.
fn following_paragraph(
    current: &[Block],
    c: usize,
) -> (ParagraphStyle, Option<Bullet>) {
    current[c + 1..]
        .iter()
        .find_map(Block::as_paragraph)
        .map(|p| (p.style.clone(), p.bullet.clone()))
        .unwrap_or_default()
}

/// Deletes pristine blocks `[from, end)`.
///
/// Between two paragraphs the range is shifted back by one so the
/// preceding paragraph keeps its place and the run's last terminator takes
/// over. An empty preceding paragraph would vanish whole under the shift,
/// so it only happens when nothing else ends the container; the surviving
/// terminator then gets the preceding paragraph's style and bullet back.
fn deletion(
    emit: &mut Emitter,
    pristine: &[Block],
    from: usize,
    end: usize,
) -> Result<(), ValidationError> {
    if pristine[from..end]
        .iter()
        .any(|b| matches!(b, Block::SectionBreak(_)))
    {
        return Err(ValidationError::UnsupportedEdit {
            what: "deleting a section break".into(),
        });
    }
    let start = pristine[from].span().start;
    let stop = pristine[end - 1].span().end;
    let previous = from.checked_sub(1).and_then(|k| pristine[k].as_paragraph());
    let (Some(previous), Block::Paragraph(last)) = (previous, &pristine[end - 1]) else {
        emit.delete(start, stop);
        return Ok(());
    };
    if previous.span.len() > 1 {
        emit.delete(start - 1, stop - 1);
    } else if end < pristine.len() {
        emit.delete(start, stop);
    } else {
        emit.delete(start - 1, stop - 1);
        paragraph_changes(emit, start - 1, &last.style, last.bullet.as_ref(), previous);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::apply::apply;
    use crate::diff::{DiffOptions, diff};
    use crate::generate::generate;
    use crate::ops::Operation;
    use crate::parsing::parse;
    use crate::snapshot::to_structural_xml;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn reconcile(old: &str, new: &str) -> Vec<Operation> {
        let pristine = parse(old).unwrap();
        let current = parse(new).unwrap();
        let options = DiffOptions::default();
        let tree = diff(&pristine, &current, &options).unwrap();
        let ops = generate(&tree, &options).unwrap();
        let applied = apply(&pristine, &ops).unwrap();
        assert_eq!(to_structural_xml(&applied), to_structural_xml(&current));
        ops
    }

    fn json(ops: &[Operation]) -> String {
        serde_json::to_string(ops).unwrap()
    }

    #[test]
    fn deleting_a_middle_paragraph_takes_the_previous_terminator() {
        let ops = reconcile(
            "<p>First</p><p>Second</p><p>Third</p>",
            "<p>First</p><p>Third</p>",
        );
        insta::assert_snapshot!(json(&ops), @r#"[{"deleteContentRange":{"range":{"startIndex":6,"endIndex":13}}}]"#);
    }

    #[test]
    fn empty_paragraph_in_front_of_a_deletion_is_left_alone() {
        let ops = reconcile(
            "<p>Intro</p><p></p><h2>Old section</h2><p>Body</p>",
            "<p>Intro</p><p></p><p>Body</p>",
        );
        insta::assert_snapshot!(json(&ops), @r#"[{"deleteContentRange":{"range":{"startIndex":8,"endIndex":20}}}]"#);
    }

    #[test]
    fn trailing_deletion_after_an_empty_paragraph_restores_its_style() {
        let ops = reconcile("<p>Intro</p><p></p><h2>Old</h2>", "<p>Intro</p><p></p>");
        insta::assert_snapshot!(json(&ops), @r#"[{"deleteContentRange":{"range":{"startIndex":7,"endIndex":11}}},{"updateParagraphStyle":{"range":{"startIndex":7,"endIndex":8},"paragraphStyle":{"namedStyleType":"NORMAL_TEXT"},"fields":"namedStyleType"}}]"#);
    }

    #[test]
    fn added_paragraph_is_split_off_the_next_one() {
        let ops = reconcile("<p>a</p><p>c</p>", "<p>a</p><p>b</p><p>c</p>");
        insta::assert_snapshot!(json(&ops), @r#"[{"insertText":{"text":"b\n","location":{"index":3}}}]"#);
    }

    #[test]
    fn paragraph_in_front_of_a_table_splits_the_previous_one() {
        let ops = reconcile(
            "<p>a</p><table><tr><td>x</td></tr></table><p></p>",
            "<p>a</p><p>new</p><table><tr><td>x</td></tr></table><p></p>",
        );
        insta::assert_snapshot!(json(&ops), @r#"[{"insertText":{"text":"\nnew","location":{"index":2}}}]"#);
    }

    #[test]
    fn new_heading_at_the_top() {
        let ops = reconcile("<p>x</p>", "<h1>T</h1><p>x</p>");
        let names: Vec<&str> = ops.iter().map(Operation::name).collect();
        assert_eq!(names, vec!["insertText", "updateParagraphStyle"]);
    }

    #[rstest]
    #[case("<p>one</p><p>two</p><p>three</p>", "<p>one!</p><p>three?</p>")]
    #[case("<p>one</p><p>two</p>", "<p>zero</p><p>one</p><p>two</p><p>2.5</p><p>two</p>")]
    #[case("<p>a</p><p>b</p><p>c</p><p>d</p>", "<p>a</p><p>d</p>")]
    #[case(
        "<h1>Title</h1><p>body</p>",
        r#"<h1>Title</h1><li type="bullet">one</li><li type="bullet" level="1">two</li><p>body</p>"#
    )]
    #[case(
        "<p>a</p><table><tr><td>x</td></tr></table><p>b</p>",
        "<p>a</p><p>b</p>"
    )]
    #[case(
        "<p>intro</p><p>end</p>",
        "<p>intro</p><table><tr><td>t</td></tr></table><p>mid</p><table><tr><td>u</td></tr></table><p>end</p>"
    )]
    fn mixed_edits_reach_the_current_document(#[case] old: &str, #[case] new: &str) {
        reconcile(old, new);
    }
}
