//! Text and paragraph-level operations.

use similar::DiffTag;

use crate::diff::text::{boundaries, hunks};
use crate::error::ValidationError;
use crate::model::{
    Bullet, Paragraph, ParagraphStyle, StyledToken, TextStyle, Token, level_indent,
};
use crate::ops::{Dimension, ParagraphStyleFields};

use super::Emitter;

/// Paragraph content as insertable text.
pub(crate) fn insertable_text(tokens: &[StyledToken]) -> Result<String, ValidationError> {
    tokens
        .iter()
        .map(|t| match &t.token {
            Token::Char(c) => Ok(*c),
            Token::Special { tag, .. } => Err(ValidationError::UnsupportedEdit {
                what: format!("inserting <{tag}/>"),
            }),
        })
        .collect()
}

/// Style of text inserted right after `tokens[..at]` in the same paragraph.
pub(crate) fn inherited_style(tokens: &[StyledToken], at: usize) -> TextStyle {
    match at.checked_sub(1).map(|k| &tokens[k]) {
        Some(StyledToken {
            token: Token::Char(_),
            style,
        }) => style.clone(),
        _ => TextStyle::default(),
    }
}

/// Restyles freshly inserted `tokens` starting at `start`, assuming they
/// were inserted with style `base`.
pub(crate) fn style_inserted(
    emit: &mut Emitter,
    start: u32,
    tokens: &[StyledToken],
    base: &TextStyle,
) {
    let at = boundaries(start, tokens);
    let mut k = 0;
    while k < tokens.len() {
        let style = &tokens[k].style;
        let fields = base.differing_fields(style);
        let mut end = k + 1;
        while end < tokens.len() && tokens[end].style == *style {
            end += 1;
        }
        if !fields.is_empty() && matches!(tokens[k].token, Token::Char(_)) {
            emit.text_style(at[k], at[end], style, &fields);
        }
        k = end;
    }
}

/// Emits the paragraph style and bullet changes that turn a paragraph
/// styled `style` with `bullet` into `target`. `at` is any index inside it.
pub(crate) fn paragraph_changes(
    emit: &mut Emitter,
    at: u32,
    style: &ParagraphStyle,
    bullet: Option<&Bullet>,
    target: &Paragraph,
) {
    let mut fields = Vec::new();
    let mut payload = ParagraphStyleFields::default();
    if style.named != target.style.named {
        fields.push("namedStyleType");
        payload.named_style_type = Some(target.style.named);
    }
    if style.alignment != target.style.alignment {
        fields.push("alignment");
        payload.alignment = target.style.alignment;
    }
    if !fields.is_empty() {
        emit.paragraph_style(at, payload, &fields);
    }

    let level = match (bullet, &target.bullet) {
        (None, None) => None,
        (Some(_), None) => {
            emit.delete_bullets(at);
            None
        }
        (None, Some(new)) => {
            emit.create_bullets(at, new.kind);
            (new.nesting_level > 0).then_some(new.nesting_level)
        }
        (Some(old), Some(new)) if old.kind != new.kind => {
            emit.delete_bullets(at);
            emit.create_bullets(at, new.kind);
            (new.nesting_level > 0).then_some(new.nesting_level)
        }
        (Some(old), Some(new)) => {
            (old.nesting_level != new.nesting_level).then_some(new.nesting_level)
        }
    };
    if let Some(level) = level {
        let payload = ParagraphStyleFields {
            indent_start: Some(Dimension::points(level_indent(level))),
            ..ParagraphStyleFields::default()
        };
        emit.paragraph_style(at, payload, &["indentStart"]);
    }
}

/// Character-level edits of a paragraph present on both sides, from its
/// last hunk to its first, followed by paragraph-level changes.
pub(crate) fn modified(
    emit: &mut Emitter,
    pristine: &Paragraph,
    current: &Paragraph,
) -> Result<(), ValidationError> {
    let old = pristine.tokens();
    let new = current.tokens();
    let at = boundaries(pristine.span.start, &old);
    for hunk in hunks(&old, &new).iter().rev() {
        match hunk.tag {
            DiffTag::Equal => restyle_equal(
                emit,
                &at,
                &old[hunk.old.clone()],
                &new[hunk.new.clone()],
                hunk.old.start,
            ),
            DiffTag::Delete => emit.delete(at[hunk.old.start], at[hunk.old.end]),
            DiffTag::Insert | DiffTag::Replace => {
                if hunk.tag == DiffTag::Replace {
                    emit.delete(at[hunk.old.start], at[hunk.old.end]);
                }
                let inserted = &new[hunk.new.clone()];
                let start = at[hunk.old.start];
                let base = inherited_style(&old, hunk.old.start);
                emit.insert_text(start, insertable_text(inserted)?);
                style_inserted(emit, start, inserted, &base);
            }
        }
    }
    paragraph_changes(
        emit,
        pristine.span.start,
        &pristine.style,
        pristine.bullet.as_ref(),
        current,
    );
    Ok(())
}

/// Style updates for an equal hunk. `old` and `new` are the hunk's tokens
/// and `offset` is where the hunk starts among the pristine tokens.
fn restyle_equal(
    emit: &mut Emitter,
    at: &[u32],
    old: &[StyledToken],
    new: &[StyledToken],
    offset: usize,
) {
    let change = |k: usize| {
        let target: &TextStyle = &new[k].style;
        let fields = old[k].style.differing_fields(target);
        (!fields.is_empty()).then_some((fields, target))
    };
    let len = old.len();
    let mut k = 0;
    while k < len {
        let Some(first) = change(k) else {
            k += 1;
            continue;
        };
        let mut end = k + 1;
        while end < len && change(end).as_ref() == Some(&first) {
            end += 1;
        }
        emit.text_style(at[offset + k], at[offset + end], first.1, &first.0);
        k = end;
    }
}
