//! Low-level edit operations, serialized exactly as batch-update requests.
//!
//! Every operation is a single-key JSON object (`{"insertText": {...}}`).
//! Routing fields (`tabId`, `segmentId`) are omitted when they address the
//! default body.

use serde::{Deserialize, Serialize};

use crate::model::{Alignment, Baseline, Color, NamedStyle, TextField, TextStyle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    InsertText(InsertText),
    DeleteContentRange(DeleteContentRange),
    UpdateTextStyle(UpdateTextStyle),
    UpdateParagraphStyle(UpdateParagraphStyle),
    CreateParagraphBullets(CreateParagraphBullets),
    DeleteParagraphBullets(DeleteParagraphBullets),
    InsertTable(InsertTable),
    InsertTableRow(InsertTableRow),
    InsertTableColumn(InsertTableColumn),
    DeleteTableRow(DeleteTableRow),
    DeleteTableColumn(DeleteTableColumn),
    UpdateTableColumnProperties(UpdateTableColumnProperties),
    CreateHeader(CreateHeader),
    CreateFooter(CreateFooter),
    DeleteHeader(DeleteHeader),
    DeleteFooter(DeleteFooter),
}

impl Operation {
    /// The request name as it appears as the JSON key.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::InsertText(_) => "insertText",
            Operation::DeleteContentRange(_) => "deleteContentRange",
            Operation::UpdateTextStyle(_) => "updateTextStyle",
            Operation::UpdateParagraphStyle(_) => "updateParagraphStyle",
            Operation::CreateParagraphBullets(_) => "createParagraphBullets",
            Operation::DeleteParagraphBullets(_) => "deleteParagraphBullets",
            Operation::InsertTable(_) => "insertTable",
            Operation::InsertTableRow(_) => "insertTableRow",
            Operation::InsertTableColumn(_) => "insertTableColumn",
            Operation::DeleteTableRow(_) => "deleteTableRow",
            Operation::DeleteTableColumn(_) => "deleteTableColumn",
            Operation::UpdateTableColumnProperties(_) => "updateTableColumnProperties",
            Operation::CreateHeader(_) => "createHeader",
            Operation::CreateFooter(_) => "createFooter",
            Operation::DeleteHeader(_) => "deleteHeader",
            Operation::DeleteFooter(_) => "deleteFooter",
        }
    }

    /// The lowest index the operation addresses, or `None` for segment-level
    /// requests.
    pub fn start_index(&self) -> Option<u32> {
        Some(match self {
            Operation::InsertText(op) => op.location.index,
            Operation::DeleteContentRange(op) => op.range.start_index,
            Operation::UpdateTextStyle(op) => op.range.start_index,
            Operation::UpdateParagraphStyle(op) => op.range.start_index,
            Operation::CreateParagraphBullets(op) => op.range.start_index,
            Operation::DeleteParagraphBullets(op) => op.range.start_index,
            Operation::InsertTable(op) => op.location.index,
            Operation::InsertTableRow(op) => op.table_cell_location.table_start_location.index,
            Operation::InsertTableColumn(op) => {
                op.table_cell_location.table_start_location.index
            }
            Operation::DeleteTableRow(op) => op.table_cell_location.table_start_location.index,
            Operation::DeleteTableColumn(op) => {
                op.table_cell_location.table_start_location.index
            }
            Operation::UpdateTableColumnProperties(op) => op.table_start_location.index,
            Operation::CreateHeader(_)
            | Operation::CreateFooter(_)
            | Operation::DeleteHeader(_)
            | Operation::DeleteFooter(_) => return None,
        })
    }

    pub fn is_structural_table_delete(&self) -> bool {
        matches!(
            self,
            Operation::DeleteTableRow(_) | Operation::DeleteTableColumn(_)
        )
    }
}

/// Tab and segment an operation is routed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    pub tab_id: Option<String>,
    pub segment_id: Option<String>,
}

impl Route {
    pub fn location(&self, index: u32) -> Location {
        Location {
            index,
            segment_id: self.segment_id.clone(),
            tab_id: self.tab_id.clone(),
        }
    }

    pub fn range(&self, start_index: u32, end_index: u32) -> Range {
        Range {
            start_index,
            end_index,
            segment_id: self.segment_id.clone(),
            tab_id: self.tab_id.clone(),
        }
    }

    pub fn cell(&self, table_start: u32, row_index: i32, column_index: i32) -> TableCellLocation {
        TableCellLocation {
            table_start_location: self.location(table_start),
            row_index,
            column_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
}

impl Location {
    pub fn route(&self) -> Route {
        Route {
            tab_id: self.tab_id.clone(),
            segment_id: self.segment_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub start_index: u32,
    pub end_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
}

impl Range {
    pub fn route(&self) -> Route {
        Route {
            tab_id: self.tab_id.clone(),
            segment_id: self.segment_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCellLocation {
    pub table_start_location: Location,
    pub row_index: i32,
    pub column_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertText {
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteContentRange {
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTextStyle {
    pub range: Range,
    pub text_style: TextStyleFields,
    /// Comma-separated field mask; `*` means every field.
    pub fields: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyleFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_offset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<OptionalColor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionalColor {
    pub color: ColorValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorValue {
    pub rgb_color: RgbColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgbColor {
    #[serde(default)]
    pub red: f32,
    #[serde(default)]
    pub green: f32,
    #[serde(default)]
    pub blue: f32,
}

impl TextStyleFields {
    /// Payload setting `fields` to their values in `style`. Unset optional
    /// values are left out, which clears them.
    pub fn from_style(style: &TextStyle, fields: &[TextField]) -> Self {
        let mut out = Self::default();
        for field in fields {
            match field {
                TextField::Bold => out.bold = Some(style.bold),
                TextField::Italic => out.italic = Some(style.italic),
                TextField::Underline => out.underline = Some(style.underline),
                TextField::Strikethrough => out.strikethrough = Some(style.strikethrough),
                TextField::BaselineOffset => {
                    out.baseline_offset = Some(
                        match style.baseline {
                            Some(Baseline::Superscript) => "SUPERSCRIPT",
                            Some(Baseline::Subscript) => "SUBSCRIPT",
                            None => "NONE",
                        }
                        .to_string(),
                    );
                }
                TextField::Link => {
                    out.link = style.link.clone().map(|url| Link { url });
                }
                TextField::ForegroundColor => {
                    out.foreground_color = style.foreground.map(|c| {
                        let [red, green, blue] = c.unit_channels();
                        OptionalColor {
                            color: ColorValue {
                                rgb_color: RgbColor { red, green, blue },
                            },
                        }
                    });
                }
            }
        }
        out
    }

    /// The style these fields describe; anything absent is unset.
    pub fn to_style(&self) -> TextStyle {
        TextStyle {
            bold: self.bold.unwrap_or(false),
            italic: self.italic.unwrap_or(false),
            underline: self.underline.unwrap_or(false),
            strikethrough: self.strikethrough.unwrap_or(false),
            baseline: match self.baseline_offset.as_deref() {
                Some("SUPERSCRIPT") => Some(Baseline::Superscript),
                Some("SUBSCRIPT") => Some(Baseline::Subscript),
                _ => None,
            },
            link: self.link.as_ref().map(|l| l.url.clone()),
            foreground: self.foreground_color.as_ref().map(|c| {
                let rgb = &c.color.rgb_color;
                Color::from_unit_channels([rgb.red, rgb.green, rgb.blue])
            }),
        }
    }
}

pub fn text_fields_mask(fields: &[TextField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a text-style field mask. Unknown names are ignored.
pub fn parse_text_fields(mask: &str) -> Vec<TextField> {
    if mask.trim() == "*" {
        return TextField::ALL.to_vec();
    }
    mask.split(',')
        .filter_map(|name| TextField::from_name(name.trim()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParagraphStyle {
    pub range: Range,
    pub paragraph_style: ParagraphStyleFields,
    pub fields: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphStyleFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named_style_type: Option<NamedStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent_start: Option<Dimension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub magnitude: f32,
    pub unit: String,
}

impl Dimension {
    pub fn points(magnitude: f32) -> Self {
        Self {
            magnitude,
            unit: "PT".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParagraphBullets {
    pub range: Range,
    pub bullet_preset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteParagraphBullets {
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertTable {
    pub rows: i32,
    pub columns: i32,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertTableRow {
    pub table_cell_location: TableCellLocation,
    pub insert_below: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertTableColumn {
    pub table_cell_location: TableCellLocation,
    pub insert_right: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTableRow {
    pub table_cell_location: TableCellLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTableColumn {
    pub table_cell_location: TableCellLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableColumnProperties {
    pub table_start_location: Location,
    pub column_indices: Vec<i32>,
    pub table_column_properties: TableColumnProperties,
    pub fields: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnProperties {
    pub width_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Dimension>,
}

impl TableColumnProperties {
    pub fn for_width(width: Option<f32>) -> Self {
        match width {
            Some(w) => Self {
                width_type: "FIXED_WIDTH".into(),
                width: Some(Dimension::points(w)),
            },
            None => Self {
                width_type: "EVENLY_DISTRIBUTED".into(),
                width: None,
            },
        }
    }

    pub fn width_points(&self) -> Option<f32> {
        match self.width_type.as_str() {
            "FIXED_WIDTH" => self.width.as_ref().map(|d| d.magnitude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHeader {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_break_location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFooter {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_break_location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteHeader {
    pub header_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFooter {
    pub footer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
}
