//! Change tree to an ordered batch of operations.
//!
//! Every operation addresses the pristine document. Within a container the
//! generator works from the bottom up, so an emitted operation only ever
//! shifts content that later operations no longer look at.

mod container;
mod paragraph;
mod table;

use crate::diff::{ChangeOp, ChangeTree, DiffOptions, SegmentChange};
use crate::error::ValidationError;
use crate::model::{ListKind, SegmentId, TextField, TextStyle};
use crate::ops::{
    CreateFooter, CreateHeader, CreateParagraphBullets, DeleteContentRange, DeleteFooter,
    DeleteHeader, DeleteParagraphBullets, DeleteTableColumn, DeleteTableRow, InsertTable,
    InsertTableColumn, InsertTableRow, InsertText, Location, Operation, ParagraphStyleFields,
    Route, TableColumnProperties, TextStyleFields, UpdateParagraphStyle,
    UpdateTableColumnProperties, UpdateTextStyle, text_fields_mask,
};

/// Turns a change tree into one batch. Segments are independent index
/// spaces, so their operations are simply concatenated.
pub fn generate(
    tree: &ChangeTree<'_>,
    options: &DiffOptions,
) -> Result<Vec<Operation>, ValidationError> {
    let mut ops = Vec::new();
    for change in &tree.segments {
        let before = ops.len();
        segment(change, options, &mut ops)?;
        log::debug!("{}: {} operations", change.segment, ops.len() - before);
    }
    Ok(ops)
}

fn route_for(change: &SegmentChange<'_>) -> Route {
    Route {
        tab_id: change.tab_id.clone().filter(|_| change.tab_index > 0),
        segment_id: change.segment.routing_id().map(str::to_string),
    }
}

fn segment(
    change: &SegmentChange<'_>,
    options: &DiffOptions,
    ops: &mut Vec<Operation>,
) -> Result<(), ValidationError> {
    let route = route_for(change);
    match (change.op, &change.segment) {
        (ChangeOp::Modified, _) => {
            let (Some(pristine), Some(current)) = (change.pristine, change.current) else {
                return Ok(());
            };
            let mut emit = Emitter::new(route, *options);
            container::container(&mut emit, &pristine.blocks, &current.blocks, &change.changes)?;
            ops.extend(emit.ops);
        }
        (ChangeOp::Added, SegmentId::Header(_)) => {
            ops.push(Operation::CreateHeader(CreateHeader {
                kind: "DEFAULT".into(),
                section_break_location: section_break(&route),
            }));
        }
        (ChangeOp::Added, SegmentId::Footer(_)) => {
            ops.push(Operation::CreateFooter(CreateFooter {
                kind: "DEFAULT".into(),
                section_break_location: section_break(&route),
            }));
        }
        (ChangeOp::Deleted, SegmentId::Header(id)) => {
            ops.push(Operation::DeleteHeader(DeleteHeader {
                header_id: id.clone(),
                tab_id: route.tab_id.clone(),
            }));
        }
        (ChangeOp::Deleted, SegmentId::Footer(id)) => {
            ops.push(Operation::DeleteFooter(DeleteFooter {
                footer_id: id.clone(),
                tab_id: route.tab_id.clone(),
            }));
        }
        (ChangeOp::Deleted, SegmentId::Footnote(id)) => {
            log::warn!("footnote {id} removed; it goes away with its reference");
        }
        (op, id) => {
            return Err(ValidationError::UnsupportedEdit {
                what: format!("{op:?} {id}").to_lowercase(),
            });
        }
    }
    Ok(())
}

/// Off the first tab, a new header or footer is attached to the tab's
/// implicit section break.
fn section_break(route: &Route) -> Option<Location> {
    let tab_id = route.tab_id.clone()?;
    let body = Route {
        tab_id: Some(tab_id),
        segment_id: None,
    };
    Some(body.location(0))
}

/// Collects operations routed to one segment.
pub(crate) struct Emitter {
    route: Route,
    options: DiffOptions,
    pub(crate) ops: Vec<Operation>,
}

impl Emitter {
    pub(crate) fn new(route: Route, options: DiffOptions) -> Self {
        Self {
            route,
            options,
            ops: Vec::new(),
        }
    }

    pub(crate) fn options(&self) -> &DiffOptions {
        &self.options
    }

    pub(crate) fn insert_text(&mut self, index: u32, text: String) {
        if text.is_empty() {
            return;
        }
        self.ops.push(Operation::InsertText(InsertText {
            text,
            location: self.route.location(index),
        }));
    }

    pub(crate) fn delete(&mut self, start: u32, end: u32) {
        self.ops.push(Operation::DeleteContentRange(DeleteContentRange {
            range: self.route.range(start, end),
        }));
    }

    pub(crate) fn text_style(
        &mut self,
        start: u32,
        end: u32,
        style: &TextStyle,
        fields: &[TextField],
    ) {
        self.ops.push(Operation::UpdateTextStyle(UpdateTextStyle {
            range: self.route.range(start, end),
            text_style: TextStyleFields::from_style(style, fields),
            fields: text_fields_mask(fields),
        }));
    }

    pub(crate) fn paragraph_style(
        &mut self,
        at: u32,
        style: ParagraphStyleFields,
        fields: &[&str],
    ) {
        self.ops.push(Operation::UpdateParagraphStyle(UpdateParagraphStyle {
            range: self.route.range(at, at + 1),
            paragraph_style: style,
            fields: fields.join(","),
        }));
    }

    pub(crate) fn create_bullets(&mut self, at: u32, kind: ListKind) {
        self.ops.push(Operation::CreateParagraphBullets(CreateParagraphBullets {
            range: self.route.range(at, at + 1),
            bullet_preset: kind.preset().into(),
        }));
    }

    pub(crate) fn delete_bullets(&mut self, at: u32) {
        self.ops.push(Operation::DeleteParagraphBullets(DeleteParagraphBullets {
            range: self.route.range(at, at + 1),
        }));
    }

    pub(crate) fn insert_table(&mut self, at: u32, rows: usize, columns: usize) {
        self.ops.push(Operation::InsertTable(InsertTable {
            rows: rows as i32,
            columns: columns as i32,
            location: self.route.location(at),
        }));
    }

    pub(crate) fn insert_row(&mut self, table_start: u32, row: usize, below: bool) {
        self.ops.push(Operation::InsertTableRow(InsertTableRow {
            table_cell_location: self.route.cell(table_start, row as i32, 0),
            insert_below: below,
        }));
    }

    pub(crate) fn insert_column(&mut self, table_start: u32, column: usize, right: bool) {
        self.ops.push(Operation::InsertTableColumn(InsertTableColumn {
            table_cell_location: self.route.cell(table_start, 0, column as i32),
            insert_right: right,
        }));
    }

    pub(crate) fn delete_row(&mut self, table_start: u32, row: usize) {
        self.ops.push(Operation::DeleteTableRow(DeleteTableRow {
            table_cell_location: self.route.cell(table_start, row as i32, 0),
        }));
    }

    pub(crate) fn delete_column(&mut self, table_start: u32, column: usize) {
        self.ops.push(Operation::DeleteTableColumn(DeleteTableColumn {
            table_cell_location: self.route.cell(table_start, 0, column as i32),
        }));
    }

    pub(crate) fn column_width(&mut self, table_start: u32, column: usize, width: Option<f32>) {
        self.ops
            .push(Operation::UpdateTableColumnProperties(UpdateTableColumnProperties {
                table_start_location: self.route.location(table_start),
                column_indices: vec![column as i32],
                table_column_properties: TableColumnProperties::for_width(width),
                fields: "width,widthType".into(),
            }));
    }
}
