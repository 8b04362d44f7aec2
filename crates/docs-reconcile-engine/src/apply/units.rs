//! Paragraph content as a flat sequence of indivisible units.
//!
//! Mutating a paragraph flattens it into units (one per char or special),
//! edits the sequence and rebuilds runs. Comment refs do not survive this
//! round, which matches what the server does to edited anchors.

use crate::error::ValidationError;
use crate::model::{Inline, Paragraph, SpecialInline, TextField, TextRun, TextStyle, compact_inlines};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Unit {
    Char(char, TextStyle),
    Special(SpecialInline),
}

impl Unit {
    pub(crate) fn width(&self) -> u32 {
        match self {
            Unit::Char(c, _) => c.len_utf16() as u32,
            Unit::Special(s) => s.length(),
        }
    }

    fn is_newline(&self) -> bool {
        matches!(self, Unit::Char('\n', _))
    }
}

pub(crate) fn to_units(elements: &[Inline]) -> Vec<Unit> {
    let mut out = Vec::new();
    push_units(elements, &mut out);
    out
}

fn push_units(elements: &[Inline], out: &mut Vec<Unit>) {
    for element in elements {
        match element {
            Inline::Text(run) => out.extend(run.content.chars().map(|c| Unit::Char(c, run.style.clone()))),
            Inline::Special(s) => out.push(Unit::Special(s.clone())),
            Inline::CommentRef(cref) => push_units(&cref.children, out),
        }
    }
}

pub(crate) fn from_units(units: Vec<Unit>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::new();
    for unit in units {
        match unit {
            Unit::Char(c, style) => match out.last_mut() {
                Some(Inline::Text(run)) if run.style == style => run.content.push(c),
                _ => out.push(Inline::Text(TextRun::new(c.to_string(), style))),
            },
            Unit::Special(s) => out.push(Inline::Special(s)),
        }
    }
    compact_inlines(&mut out);
    out
}

/// Position in `units` whose cumulative width from `base` equals `index`.
fn boundary(units: &[Unit], base: u32, index: u32) -> Result<usize, ValidationError> {
    let mut pos = base;
    for (k, unit) in units.iter().enumerate() {
        if pos == index {
            return Ok(k);
        }
        let next = pos + unit.width();
        if index < next {
            return Err(match unit {
                Unit::Char(..) => ValidationError::SplitsSurrogatePair { index },
                Unit::Special(_) => ValidationError::NotTextPosition { index },
            });
        }
        pos = next;
    }
    if pos == index {
        Ok(units.len())
    } else {
        Err(ValidationError::NotTextPosition { index })
    }
}

/// Style new text takes at unit position `k`: the char before it in the
/// same paragraph, or the default after a special or at the start.
fn inherited_style(units: &[Unit], k: usize) -> TextStyle {
    match k.checked_sub(1).and_then(|prev| units.get(prev)) {
        Some(Unit::Char(_, style)) => style.clone(),
        _ => TextStyle::default(),
    }
}

pub(crate) fn insert_text(
    p: &mut Paragraph,
    index: u32,
    text: &str,
) -> Result<(), ValidationError> {
    let mut units = to_units(&p.elements);
    let k = boundary(&units, p.span.start, index)?;
    let style = inherited_style(&units, k);
    units.splice(k..k, text.chars().map(|c| Unit::Char(c, style.clone())));
    p.elements = from_units(units);
    Ok(())
}

/// Removes the units inside `[start, end)`, which must be clamped to the
/// paragraph. May remove the terminator.
pub(crate) fn delete(p: &mut Paragraph, start: u32, end: u32) -> Result<(), ValidationError> {
    let units = to_units(&p.elements);
    let mut kept = Vec::with_capacity(units.len());
    let mut pos = p.span.start;
    for unit in units {
        let next = pos + unit.width();
        let inside = start <= pos && next <= end;
        let outside = next <= start || pos >= end;
        if !inside && !outside {
            return Err(match unit {
                Unit::Char(..) => ValidationError::SplitsSurrogatePair {
                    index: if pos < start { start } else { end },
                },
                Unit::Special(_) => ValidationError::PartialStructureDeletion { start, end },
            });
        }
        if outside {
            kept.push(unit);
        }
        pos = next;
    }
    p.elements = from_units(kept);
    Ok(())
}

/// Copies `fields` from `style` onto every char overlapping `[start, end)`.
pub(crate) fn restyle(
    p: &mut Paragraph,
    start: u32,
    end: u32,
    style: &TextStyle,
    fields: &[TextField],
) {
    let mut units = to_units(&p.elements);
    let mut pos = p.span.start;
    for unit in &mut units {
        let next = pos + unit.width();
        if pos < end && next > start
            && let Unit::Char(_, current) = unit
        {
            current.apply_fields(style, fields);
        }
        pos = next;
    }
    p.elements = from_units(units);
}

/// Splits a paragraph after every newline. Each piece copies the paragraph
/// style and bullet. Trailing content with no newline stays in the last piece.
pub(crate) fn split_at_newlines(p: Paragraph) -> Vec<Paragraph> {
    let units = to_units(&p.elements);
    let newlines = units.iter().filter(|u| u.is_newline()).count();
    let terminated = units.last().is_some_and(Unit::is_newline);
    if newlines <= 1 && (terminated || newlines == 0) {
        return vec![p];
    }
    let mut pieces = Vec::new();
    let mut current = Vec::new();
    for unit in units {
        let ends = unit.is_newline();
        current.push(unit);
        if ends {
            pieces.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        match pieces.last_mut() {
            Some(last) if !terminated => last.extend(current),
            _ => pieces.push(current),
        }
    }
    pieces
        .into_iter()
        .map(|units| Paragraph {
            elements: from_units(units),
            style: p.style.clone(),
            bullet: p.bullet.clone(),
            span: p.span,
        })
        .collect()
}

pub(crate) fn has_terminator(p: &Paragraph) -> bool {
    fn last_char(elements: &[Inline]) -> Option<char> {
        match elements.last()? {
            Inline::Text(run) => run.content.chars().last(),
            Inline::Special(_) => None,
            Inline::CommentRef(c) => last_char(&c.children),
        }
    }
    last_char(&p.elements) == Some('\n')
}
