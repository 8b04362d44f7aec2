//! The apply/reindex oracle.
//!
//! Operations mutate an owned document without touching indices. After
//! every operation the whole document is normalized and reindexed from
//! scratch, so each operation in a batch sees the indices the server
//! would report at that point.

mod content;
pub mod normalize;
mod table;
mod units;
mod validate;

use uuid::Uuid;

use crate::error::ValidationError;
use crate::model::{Bullet, Document, ListDef, ListKind, Segment, SegmentId, Tab, level_indent};
use crate::ops::{Location, Operation, Range, parse_text_fields};

use self::validate::{check_index, check_range};

/// Applies `operations` in order to a copy of `document`.
///
/// The first operation that violates an invariant aborts the batch.
pub fn apply(document: &Document, operations: &[Operation]) -> Result<Document, ValidationError> {
    let mut working = document.clone();
    for (i, op) in operations.iter().enumerate() {
        log::trace!("applying operation {i}: {}", op.name());
        apply_one(&mut working, op)?;
    }
    Ok(working)
}

/// Applies a single operation in place, then normalizes and reindexes.
pub fn apply_one(document: &mut Document, op: &Operation) -> Result<(), ValidationError> {
    let referenced = normalize::footnote_refs(document);
    dispatch(document, op)?;
    normalize::normalize(document, &referenced);
    Ok(())
}

fn dispatch(document: &mut Document, op: &Operation) -> Result<(), ValidationError> {
    match op {
        Operation::InsertText(op) => {
            let segment = segment_at(document, &op.location)?;
            check_index(segment, op.location.index)?;
            content::insert_text(&mut segment.blocks, op.location.index, &op.text)
        }
        Operation::DeleteContentRange(op) => {
            let segment = segment_for(document, &op.range)?;
            let (start, end) = (op.range.start_index, op.range.end_index);
            check_range(segment, start, end, false)?;
            content::delete_range(&mut segment.blocks, start, end)
        }
        Operation::UpdateTextStyle(op) => {
            let segment = segment_for(document, &op.range)?;
            check_range(segment, op.range.start_index, op.range.end_index, true)?;
            content::restyle_text(
                &mut segment.blocks,
                op.range.start_index,
                op.range.end_index,
                &op.text_style.to_style(),
                &parse_text_fields(&op.fields),
            );
            Ok(())
        }
        Operation::UpdateParagraphStyle(op) => {
            let tab = tab_mut(document, op.range.tab_id.as_deref())?;
            let lists = tab.lists.clone();
            let segment = segment_in(tab, op.range.segment_id.as_deref())?;
            check_range(segment, op.range.start_index, op.range.end_index, true)?;
            let fields = paragraph_fields(&op.fields);
            content::for_each_paragraph(
                &mut segment.blocks,
                op.range.start_index,
                op.range.end_index,
                &mut |p| {
                    let style = &op.paragraph_style;
                    if fields.named {
                        p.style.named = style.named_style_type.unwrap_or_default();
                    }
                    if fields.alignment {
                        p.style.alignment = style.alignment;
                    }
                    if fields.indent_start {
                        p.style.indent_start = style.indent_start.as_ref().map(|d| d.magnitude);
                        if let (Some(bullet), Some(indent)) = (&mut p.bullet, p.style.indent_start)
                            && let Some(list) = lists.get(&bullet.list_id)
                        {
                            bullet.nesting_level = list.nesting_level_for(indent);
                        }
                    }
                },
            );
            Ok(())
        }
        Operation::CreateParagraphBullets(op) => {
            let tab = tab_mut(document, op.range.tab_id.as_deref())?;
            let kind = ListKind::from_preset(&op.bullet_preset);
            let list_id = tab.next_list_id();
            tab.lists.insert(list_id.clone(), ListDef::new(kind));
            let segment = segment_in(tab, op.range.segment_id.as_deref())?;
            check_range(segment, op.range.start_index, op.range.end_index, true)?;
            content::for_each_paragraph(
                &mut segment.blocks,
                op.range.start_index,
                op.range.end_index,
                &mut |p| {
                    p.bullet = Some(Bullet {
                        list_id: list_id.clone(),
                        kind,
                        nesting_level: 0,
                    });
                    p.style.indent_start = Some(level_indent(0));
                },
            );
            Ok(())
        }
        Operation::DeleteParagraphBullets(op) => {
            let segment = segment_for(document, &op.range)?;
            check_range(segment, op.range.start_index, op.range.end_index, true)?;
            content::for_each_paragraph(
                &mut segment.blocks,
                op.range.start_index,
                op.range.end_index,
                &mut |p| {
                    p.bullet = None;
                    p.style.indent_start = None;
                },
            );
            Ok(())
        }
        Operation::InsertTable(op) => {
            let segment = segment_at(document, &op.location)?;
            table::insert_table(segment, op.location.index, op.rows, op.columns)
        }
        Operation::InsertTableRow(op) => {
            let location = &op.table_cell_location;
            let segment = segment_at(document, &location.table_start_location)?;
            table::insert_row(segment, location, op.insert_below)
        }
        Operation::InsertTableColumn(op) => {
            let location = &op.table_cell_location;
            let segment = segment_at(document, &location.table_start_location)?;
            table::insert_column(segment, location, op.insert_right)
        }
        Operation::DeleteTableRow(op) => {
            let location = &op.table_cell_location;
            let segment = segment_at(document, &location.table_start_location)?;
            table::delete_row(segment, location)
        }
        Operation::DeleteTableColumn(op) => {
            let location = &op.table_cell_location;
            let segment = segment_at(document, &location.table_start_location)?;
            table::delete_column(segment, location)
        }
        Operation::UpdateTableColumnProperties(op) => {
            let segment = segment_at(document, &op.table_start_location)?;
            table::update_columns(
                segment,
                op.table_start_location.index,
                &op.column_indices,
                &op.table_column_properties,
            )
        }
        Operation::CreateHeader(op) => {
            let tab = tab_mut(document, section_tab(op.section_break_location.as_ref()))?;
            let id = mint_segment_id();
            log::debug!("created header {id}");
            tab.headers.push(Segment::new(SegmentId::Header(id)));
            Ok(())
        }
        Operation::CreateFooter(op) => {
            let tab = tab_mut(document, section_tab(op.section_break_location.as_ref()))?;
            let id = mint_segment_id();
            log::debug!("created footer {id}");
            tab.footers.push(Segment::new(SegmentId::Footer(id)));
            Ok(())
        }
        Operation::DeleteHeader(op) => {
            let tab = tab_mut(document, op.tab_id.as_deref())?;
            let before = tab.headers.len();
            tab.headers.retain(|s| s.id.routing_id() != Some(op.header_id.as_str()));
            if tab.headers.len() == before {
                return Err(ValidationError::SegmentNotFound(op.header_id.clone()));
            }
            Ok(())
        }
        Operation::DeleteFooter(op) => {
            let tab = tab_mut(document, op.tab_id.as_deref())?;
            let before = tab.footers.len();
            tab.footers.retain(|s| s.id.routing_id() != Some(op.footer_id.as_str()));
            if tab.footers.len() == before {
                return Err(ValidationError::SegmentNotFound(op.footer_id.clone()));
            }
            Ok(())
        }
    }
}

fn section_tab(location: Option<&Location>) -> Option<&str> {
    location.and_then(|l| l.tab_id.as_deref())
}

fn mint_segment_id() -> String {
    format!("kix.{}", Uuid::new_v4().simple())
}

fn tab_mut<'d>(
    document: &'d mut Document,
    tab_id: Option<&str>,
) -> Result<&'d mut Tab, ValidationError> {
    document
        .tab_mut(tab_id)
        .ok_or_else(|| ValidationError::TabNotFound(tab_id.map(str::to_string)))
}

fn segment_in<'t>(
    tab: &'t mut Tab,
    routing: Option<&str>,
) -> Result<&'t mut Segment, ValidationError> {
    tab.segment_by_routing_mut(routing)
        .ok_or_else(|| ValidationError::SegmentNotFound(routing.unwrap_or("body").to_string()))
}

fn segment_at<'d>(
    document: &'d mut Document,
    location: &Location,
) -> Result<&'d mut Segment, ValidationError> {
    let tab = tab_mut(document, location.tab_id.as_deref())?;
    segment_in(tab, location.segment_id.as_deref())
}

fn segment_for<'d>(
    document: &'d mut Document,
    range: &Range,
) -> Result<&'d mut Segment, ValidationError> {
    let tab = tab_mut(document, range.tab_id.as_deref())?;
    segment_in(tab, range.segment_id.as_deref())
}

struct ParagraphFieldMask {
    named: bool,
    alignment: bool,
    indent_start: bool,
}

fn paragraph_fields(mask: &str) -> ParagraphFieldMask {
    let all = mask.trim() == "*";
    let has = |name: &str| all || mask.split(',').any(|f| f.trim() == name);
    ParagraphFieldMask {
        named: has("namedStyleType"),
        alignment: has("alignment"),
        indent_start: has("indentStart"),
    }
}
