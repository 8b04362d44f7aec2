//! Text and paragraph styling.
//!
//! Field names match the remote batch-update schema so masks built here can
//! be written straight into `fields` strings.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Baseline {
    Superscript,
    Subscript,
}

/// An RGB foreground color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub [u8; 3]);

fn hex_color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^#([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$")
            .expect("Invalid color regex")
    })
}

impl Color {
    /// Parses `#rrggbb`. Returns `None` for anything else.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let caps = hex_color_re().captures(s.trim())?;
        let mut rgb = [0u8; 3];
        for (slot, i) in rgb.iter_mut().zip(1..=3) {
            *slot = u8::from_str_radix(caps.get(i)?.as_str(), 16).ok()?;
        }
        Some(Self(rgb))
    }

    /// Channel values in `0.0..=1.0` as the remote API expects them.
    pub fn unit_channels(self) -> [f32; 3] {
        self.0.map(|c| f32::from(c) / 255.0)
    }

    pub fn from_unit_channels(channels: [f32; 3]) -> Self {
        Self(channels.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// Character-level style carried by a text run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub baseline: Option<Baseline>,
    pub link: Option<String>,
    pub foreground: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    BaselineOffset,
    Link,
    ForegroundColor,
}

impl TextField {
    pub const ALL: [TextField; 7] = [
        TextField::Bold,
        TextField::Italic,
        TextField::Underline,
        TextField::Strikethrough,
        TextField::BaselineOffset,
        TextField::Link,
        TextField::ForegroundColor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TextField::Bold => "bold",
            TextField::Italic => "italic",
            TextField::Underline => "underline",
            TextField::Strikethrough => "strikethrough",
            TextField::BaselineOffset => "baselineOffset",
            TextField::Link => "link",
            TextField::ForegroundColor => "foregroundColor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl TextStyle {
    /// Fields whose values differ between `self` and `other`, in schema order.
    pub fn differing_fields(&self, other: &TextStyle) -> Vec<TextField> {
        TextField::ALL
            .into_iter()
            .filter(|field| !self.field_eq(other, *field))
            .collect()
    }

    fn field_eq(&self, other: &TextStyle, field: TextField) -> bool {
        match field {
            TextField::Bold => self.bold == other.bold,
            TextField::Italic => self.italic == other.italic,
            TextField::Underline => self.underline == other.underline,
            TextField::Strikethrough => self.strikethrough == other.strikethrough,
            TextField::BaselineOffset => self.baseline == other.baseline,
            TextField::Link => self.link == other.link,
            TextField::ForegroundColor => self.foreground == other.foreground,
        }
    }

    /// Copies the listed fields from `source`; a field unset there is cleared here.
    pub fn apply_fields(&mut self, source: &TextStyle, fields: &[TextField]) {
        for field in fields {
            match field {
                TextField::Bold => self.bold = source.bold,
                TextField::Italic => self.italic = source.italic,
                TextField::Underline => self.underline = source.underline,
                TextField::Strikethrough => self.strikethrough = source.strikethrough,
                TextField::BaselineOffset => self.baseline = source.baseline,
                TextField::Link => self.link.clone_from(&source.link),
                TextField::ForegroundColor => self.foreground = source.foreground,
            }
        }
    }

    pub fn is_plain(&self) -> bool {
        *self == TextStyle::default()
    }
}

/// Named paragraph styles, serialized with the remote API's enum names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedStyle {
    #[default]
    #[serde(rename = "NORMAL_TEXT")]
    NormalText,
    #[serde(rename = "TITLE")]
    Title,
    #[serde(rename = "SUBTITLE")]
    Subtitle,
    #[serde(rename = "HEADING_1")]
    Heading1,
    #[serde(rename = "HEADING_2")]
    Heading2,
    #[serde(rename = "HEADING_3")]
    Heading3,
    #[serde(rename = "HEADING_4")]
    Heading4,
    #[serde(rename = "HEADING_5")]
    Heading5,
    #[serde(rename = "HEADING_6")]
    Heading6,
}

impl NamedStyle {
    /// Title, subtitle and the six heading levels.
    pub fn is_heading(self) -> bool {
        !matches!(self, NamedStyle::NormalText)
    }

    pub fn heading(level: u8) -> Option<Self> {
        Some(match level {
            1 => NamedStyle::Heading1,
            2 => NamedStyle::Heading2,
            3 => NamedStyle::Heading3,
            4 => NamedStyle::Heading4,
            5 => NamedStyle::Heading5,
            6 => NamedStyle::Heading6,
            _ => return None,
        })
    }

    /// Text style the named style lends to text typed into it, limited to
    /// the fields a [`TextStyle`] carries.
    pub fn text_style(self) -> TextStyle {
        const GREY: Color = Color([0x66, 0x66, 0x66]);
        match self {
            NamedStyle::Subtitle | NamedStyle::Heading4 | NamedStyle::Heading5 => TextStyle {
                foreground: Some(GREY),
                ..TextStyle::default()
            },
            NamedStyle::Heading3 => TextStyle {
                foreground: Some(Color([0x43, 0x43, 0x43])),
                ..TextStyle::default()
            },
            NamedStyle::Heading6 => TextStyle {
                italic: true,
                foreground: Some(GREY),
                ..TextStyle::default()
            },
            NamedStyle::NormalText
            | NamedStyle::Title
            | NamedStyle::Heading1
            | NamedStyle::Heading2 => TextStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Alignment {
    Start,
    Center,
    End,
    Justified,
}

impl Alignment {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "start" | "left" => Some(Alignment::Start),
            "center" => Some(Alignment::Center),
            "end" | "right" => Some(Alignment::End),
            "justified" | "justify" => Some(Alignment::Justified),
            _ => None,
        }
    }

    pub fn as_attr(self) -> &'static str {
        match self {
            Alignment::Start => "start",
            Alignment::Center => "center",
            Alignment::End => "end",
            Alignment::Justified => "justified",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    pub named: NamedStyle,
    pub alignment: Option<Alignment>,
    /// Indent of the first line box in points. Only bullets use it; their
    /// nesting level is derived from it.
    pub indent_start: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Bullet,
    Number,
}

impl ListKind {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "bullet" | "disc" => Some(ListKind::Bullet),
            "number" | "decimal" => Some(ListKind::Number),
            _ => None,
        }
    }

    pub fn as_attr(self) -> &'static str {
        match self {
            ListKind::Bullet => "bullet",
            ListKind::Number => "number",
        }
    }

    /// The bullet preset used when creating a list of this kind.
    pub fn preset(self) -> &'static str {
        match self {
            ListKind::Bullet => "BULLET_DISC_CIRCLE_SQUARE",
            ListKind::Number => "NUMBERED_DECIMAL_ALPHA_ROMAN",
        }
    }

    pub fn from_preset(preset: &str) -> Self {
        if preset.starts_with("NUMBERED") {
            ListKind::Number
        } else {
            ListKind::Bullet
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bullet {
    pub list_id: String,
    pub kind: ListKind,
    pub nesting_level: u8,
}

pub const MAX_NESTING_LEVEL: u8 = 8;

/// A list definition: the per-level indent table bullets are matched against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDef {
    pub kind: ListKind,
    pub level_indents: Vec<f32>,
}

impl ListDef {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            level_indents: (0..=MAX_NESTING_LEVEL).map(level_indent).collect(),
        }
    }

    /// The level whose indent is closest to `indent_start`.
    pub fn nesting_level_for(&self, indent_start: f32) -> u8 {
        self.level_indents
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - indent_start)
                    .abs()
                    .total_cmp(&(*b - indent_start).abs())
            })
            .map_or(0, |(level, _)| level as u8)
    }
}

/// Default indent for a nesting level, in points.
pub fn level_indent(level: u8) -> f32 {
    36.0 * f32::from(level + 1)
}
