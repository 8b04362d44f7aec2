//! Character-level diff of a modified paragraph.

use serde::Serialize;
use similar::{Algorithm, DiffTag, capture_diff_slices};

use crate::model::{Paragraph, StyledToken, Token};

/// One hunk of a token diff, as index ranges into the old and new tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub tag: DiffTag,
    pub old: std::ops::Range<usize>,
    pub new: std::ops::Range<usize>,
}

/// Diffs two token sequences by content only. Style changes inside equal
/// hunks are left for the caller.
pub fn hunks(old: &[StyledToken], new: &[StyledToken]) -> Vec<Hunk> {
    let old_tokens: Vec<&Token> = old.iter().map(|t| &t.token).collect();
    let new_tokens: Vec<&Token> = new.iter().map(|t| &t.token).collect();
    capture_diff_slices(Algorithm::Myers, &old_tokens, &new_tokens)
        .into_iter()
        .map(|op| {
            let (tag, old, new) = op.as_tag_tuple();
            Hunk { tag, old, new }
        })
        .collect()
}

/// Index of every token boundary: `out[k]` is where token `k` starts and the
/// last entry is where the content ends.
pub fn boundaries(start: u32, tokens: &[StyledToken]) -> Vec<u32> {
    let mut out = Vec::with_capacity(tokens.len() + 1);
    let mut at = start;
    out.push(at);
    for t in tokens {
        at += t.token.width();
        out.push(at);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEditKind {
    Delete,
    Insert,
}

/// A delete or insert sub-range of a modified paragraph, anchored to the
/// pristine span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub kind: TextEditKind,
    pub start: u32,
    pub end: u32,
    pub text: String,
}

pub fn text_edits(pristine: &Paragraph, current: &Paragraph) -> Vec<TextEdit> {
    let old = pristine.tokens();
    let new = current.tokens();
    let at = boundaries(pristine.span.start, &old);
    let mut out = Vec::new();
    for hunk in hunks(&old, &new) {
        let start = at[hunk.old.start];
        if matches!(hunk.tag, DiffTag::Delete | DiffTag::Replace) {
            out.push(TextEdit {
                kind: TextEditKind::Delete,
                start,
                end: at[hunk.old.end],
                text: render(&old[hunk.old.clone()]),
            });
        }
        if matches!(hunk.tag, DiffTag::Insert | DiffTag::Replace) {
            out.push(TextEdit {
                kind: TextEditKind::Insert,
                start,
                end: start,
                text: render(&new[hunk.new.clone()]),
            });
        }
    }
    out
}

fn render(tokens: &[StyledToken]) -> String {
    tokens
        .iter()
        .map(|t| match &t.token {
            Token::Char(c) => c.to_string(),
            Token::Special { tag, .. } => format!("<{tag}/>"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse;
    use pretty_assertions::assert_eq;

    fn first_paragraph(input: &str) -> Paragraph {
        let doc = parse(input).unwrap();
        doc.tabs[0].body.blocks[0]
            .as_paragraph()
            .cloned()
            .unwrap()
    }

    #[test]
    fn single_word_edit_stays_local() {
        let old = first_paragraph("<p>Hello World</p>");
        let new = first_paragraph("<p>Hello Universe</p>");
        let edits = text_edits(&old, &new);
        assert!(edits.iter().all(|e| e.start >= 7));
        let inserted: String = edits
            .iter()
            .filter(|e| e.kind == TextEditKind::Insert)
            .map(|e| e.text.as_str())
            .collect();
        assert!(inserted.contains("Unive") || inserted.contains("niv"));
    }

    #[test]
    fn boundaries_count_utf16() {
        let p = first_paragraph("<p>a😀b</p>");
        assert_eq!(boundaries(1, &p.tokens()), vec![1, 2, 4, 5]);
    }

    #[test]
    fn style_only_change_has_no_hunks_besides_equal() {
        let old = first_paragraph("<p>abc</p>");
        let new = first_paragraph("<p>a<b>b</b>c</p>");
        let hunks = hunks(&old.tokens(), &new.tokens());
        assert!(hunks.iter().all(|h| h.tag == DiffTag::Equal));
        assert_eq!(text_edits(&old, &new), vec![]);
    }
}
