//! Comment anchors and comment-ref markup.
//!
//! Remote comments arrive as raw `[offset, offset + length)` anchors. They
//! are snapped onto the top-level body blocks they touch. In the other
//! direction, `<comment-ref>` wrappers in an edited snapshot mark where a
//! new comment should go; their positions are read off the indexed
//! document and the wrappers are stripped before diffing.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Block, Document, Inline, OBJECT_CHAR, Span};
use crate::parsing::xml::{Token, Tokenizer};

const COMMENT_REF_TAG: &str = "comment-ref";

/// A top-level block touched by an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockRef {
    pub index: usize,
    pub span: Span,
}

/// Every block whose span overlaps `[start, end)`. Section breaks are not
/// content and never match.
pub fn overlapping_blocks(blocks: &[Block], start: u32, end: u32) -> Vec<BlockRef> {
    blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| !matches!(b, Block::SectionBreak(_)))
        .filter(|(_, b)| b.span().overlaps(start, end))
        .map(|(index, b)| BlockRef {
            index,
            span: b.span(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawAnchor {
    #[serde(default)]
    a: Vec<RawAnnotation>,
}

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    txt: Option<RawRange>,
}

#[derive(Debug, Deserialize)]
struct RawRange {
    o: u32,
    #[serde(default)]
    l: u32,
}

/// A remote comment's anchor over body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentAnchor {
    pub comment_id: String,
    pub start: u32,
    pub end: u32,
}

impl CommentAnchor {
    /// Reads the anchor JSON of comment `comment_id`. Only the first text
    /// annotation counts; without one the comment has no anchor.
    pub fn from_json(comment_id: impl Into<String>, json: &str) -> Result<Option<Self>> {
        let raw: RawAnchor = serde_json::from_str(json)?;
        let Some(range) = raw.a.into_iter().find_map(|a| a.txt) else {
            return Ok(None);
        };
        Ok(Some(Self {
            comment_id: comment_id.into(),
            start: range.o,
            end: range.o + range.l,
        }))
    }
}

/// The comment shown on a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockComment {
    pub block: BlockRef,
    pub comment_id: String,
}

/// Snaps `anchors` onto `blocks`. Where several anchors touch the same
/// block, the one listed first keeps it.
pub fn assign_anchors(blocks: &[Block], anchors: &[CommentAnchor]) -> Vec<BlockComment> {
    let mut owners: BTreeMap<usize, BlockComment> = BTreeMap::new();
    for anchor in anchors {
        for block in overlapping_blocks(blocks, anchor.start, anchor.end) {
            owners.entry(block.index).or_insert_with(|| BlockComment {
                block,
                comment_id: anchor.comment_id.clone(),
            });
        }
    }
    owners.into_values().collect()
}

/// Where a comment ref sits in an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRefPosition {
    pub comment_ref_id: String,
    pub start_index: u32,
    pub end_index: u32,
    pub quoted_text: String,
}

/// Comment refs of the first tab's body, in document order.
///
/// A ref outside the body, or a second ref with an id already seen, cannot
/// become a comment; it is logged and skipped.
pub fn comment_ref_positions(document: &Document) -> Vec<CommentRefPosition> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for (t, tab) in document.tabs.iter().enumerate() {
        for segment in tab.segments() {
            let mut found = Vec::new();
            collect_blocks(&segment.blocks, &mut found);
            for position in found {
                if t > 0 || !segment.id.is_body() {
                    log::warn!(
                        "comment ref {} in {} is not in the body; skipped",
                        position.comment_ref_id,
                        segment.id
                    );
                } else if !seen.insert(position.comment_ref_id.clone()) {
                    log::warn!("duplicate comment ref {}; skipped", position.comment_ref_id);
                } else {
                    out.push(position);
                }
            }
        }
    }
    out
}

fn collect_blocks(blocks: &[Block], out: &mut Vec<CommentRefPosition>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => collect_inlines(&p.elements, out),
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    collect_blocks(&cell.content, out);
                }
            }
            Block::TableOfContents(toc) => collect_blocks(&toc.children, out),
            Block::SectionBreak(_) | Block::Opaque(_) => {}
        }
    }
}

fn collect_inlines(elements: &[Inline], out: &mut Vec<CommentRefPosition>) {
    for element in elements {
        if let Inline::CommentRef(cref) = element {
            out.push(CommentRefPosition {
                comment_ref_id: cref.id.clone(),
                start_index: cref.span.start,
                end_index: cref.span.end,
                quoted_text: quoted(&cref.children),
            });
            collect_inlines(&cref.children, out);
        }
    }
}

fn quoted(elements: &[Inline]) -> String {
    let mut text = String::new();
    for element in elements {
        match element {
            Inline::Text(run) => text.push_str(run.content.trim_end_matches('\n')),
            Inline::Special(_) => text.push(OBJECT_CHAR),
            Inline::CommentRef(cref) => text.push_str(&quoted(&cref.children)),
        }
    }
    text
}

/// Removes every `<comment-ref>` wrapper from a snapshot, keeping what it
/// wraps. Everything else is copied byte for byte.
pub fn strip_comment_refs(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    for token in Tokenizer::new(text) {
        let token = token.map_err(Error::from)?;
        match token {
            Token::Open { name, .. } | Token::Close { name, .. } if name == COMMENT_REF_TAG => {}
            other => out.push_str(other.raw()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn body(input: &str) -> Vec<Block> {
        parse(input).unwrap().tabs.remove(0).body.blocks
    }

    #[rstest]
    // "One\n" 1..5, "Two\n" 5..9, "Three\n" 9..15
    #[case(1, 2, vec![0])]
    #[case(4, 6, vec![0, 1])]
    #[case(5, 9, vec![1])]
    #[case(8, 12, vec![1, 2])]
    #[case(15, 20, vec![])]
    fn anchors_snap_to_whole_blocks(#[case] start: u32, #[case] end: u32, #[case] expected: Vec<usize>) {
        let blocks = body("<p>One</p><p>Two</p><p>Three</p>");
        let got: Vec<usize> = overlapping_blocks(&blocks, start, end)
            .iter()
            .map(|b| b.index)
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn section_breaks_are_skipped() {
        let blocks = body("<sectionbreak/><p>a</p>");
        let got = overlapping_blocks(&blocks, 0, 2);
        assert_eq!(got, vec![BlockRef { index: 1, span: Span::new(1, 3) }]);
    }

    #[test]
    fn only_the_first_text_annotation_counts() {
        let anchor = CommentAnchor::from_json(
            "c1",
            r#"{"r":"head","a":[{"txt":{"o":4,"l":3}},{"txt":{"o":40,"l":1}}]}"#,
        )
        .unwrap();
        assert_eq!(
            anchor,
            Some(CommentAnchor {
                comment_id: "c1".into(),
                start: 4,
                end: 7,
            })
        );
        assert_eq!(CommentAnchor::from_json("c2", r#"{"r":"head","a":[]}"#).unwrap(), None);
        assert!(CommentAnchor::from_json("c3", "not json").is_err());
    }

    #[test]
    fn first_registered_anchor_keeps_the_block() {
        let blocks = body("<p>One</p><p>Two</p>");
        let anchors = [
            CommentAnchor { comment_id: "first".into(), start: 2, end: 3 },
            CommentAnchor { comment_id: "second".into(), start: 1, end: 7 },
        ];
        let assigned = assign_anchors(&blocks, &anchors);
        let got: Vec<(usize, &str)> = assigned
            .iter()
            .map(|c| (c.block.index, c.comment_id.as_str()))
            .collect();
        assert_eq!(got, vec![(0, "first"), (1, "second")]);
    }

    #[test]
    fn comment_ref_positions_come_from_the_body() {
        let doc = parse(
            r#"<doc><body><p>Hi <comment-ref id="a">there</comment-ref></p>
               <p><comment-ref id="a">again</comment-ref></p></body>
               <header id="h"><p><comment-ref id="b">top</comment-ref></p></header></doc>"#,
        )
        .unwrap();
        assert_eq!(
            comment_ref_positions(&doc),
            vec![CommentRefPosition {
                comment_ref_id: "a".into(),
                start_index: 4,
                end_index: 9,
                quoted_text: "there".into(),
            }]
        );
    }

    #[test]
    fn stripping_keeps_everything_but_the_wrappers() {
        let text = r#"<p class="x">a <comment-ref id="c"><b>b</b> &amp; c</comment-ref>!</p>"#;
        let stripped = strip_comment_refs(text).unwrap();
        insta::assert_snapshot!(stripped, @r#"<p class="x">a <b>b</b> &amp; c!</p>"#);
    }

    #[test]
    fn nested_refs_are_stripped_recursively() {
        let text = r#"<p><comment-ref id="a">x<comment-ref id="b">y</comment-ref></comment-ref></p>"#;
        assert_eq!(strip_comment_refs(text).unwrap(), "<p>xy</p>");
    }
}
