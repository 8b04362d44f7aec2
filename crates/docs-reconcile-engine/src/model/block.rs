//! Typed block tree. Indices live in the `span` fields and are only
//! meaningful after the indexer has run.

use serde::Serialize;

use super::span::Span;
use super::style::{Bullet, ParagraphStyle, TextStyle};

/// Length of `s` in UTF-16 code units.
pub fn utf16_len(s: &str) -> u32 {
    s.encode_utf16().count() as u32
}

/// Object replacement character standing in for a special inline in flattened text.
pub const OBJECT_CHAR: char = '\u{fffc}';

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    SectionBreak(SectionBreak),
    TableOfContents(TableOfContents),
    /// A block tag the parser does not know; occupies one code unit.
    Opaque(OpaqueBlock),
}

impl Block {
    pub fn span(&self) -> Span {
        match self {
            Block::Paragraph(p) => p.span,
            Block::Table(t) => t.span,
            Block::SectionBreak(s) => s.span,
            Block::TableOfContents(t) => t.span,
            Block::Opaque(o) => o.span,
        }
    }

    pub fn span_mut(&mut self) -> &mut Span {
        match self {
            Block::Paragraph(p) => &mut p.span,
            Block::Table(t) => &mut t.span,
            Block::SectionBreak(s) => &mut s.span,
            Block::TableOfContents(t) => &mut t.span,
            Block::Opaque(o) => &mut o.span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Block::Paragraph(_) => "paragraph",
            Block::Table(_) => "table",
            Block::SectionBreak(_) => "sectionbreak",
            Block::TableOfContents(_) => "toc",
            Block::Opaque(_) => "opaque",
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Block::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_paragraph(&self) -> bool {
        matches!(self, Block::Paragraph(_))
    }

    /// Visible text with special inlines as [`OBJECT_CHAR`], paragraphs
    /// separated by newlines. Used for similarity scoring and quoting.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Paragraph(p) => p.plain_text(),
            Block::Table(t) => t
                .rows
                .iter()
                .map(TableRow::plain_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Block::TableOfContents(toc) => blocks_plain_text(&toc.children),
            Block::SectionBreak(_) | Block::Opaque(_) => String::new(),
        }
    }
}

impl Block {
    /// Removes comment refs and table ids. Neither occupies index space and
    /// no edit operation can produce them.
    pub fn strip_annotations(&mut self) {
        match self {
            Block::Paragraph(p) => flatten_comment_refs(&mut p.elements),
            Block::Table(t) => {
                t.id = None;
                for cell in t.rows.iter_mut().flat_map(|r| &mut r.cells) {
                    cell.content.iter_mut().for_each(Block::strip_annotations);
                }
            }
            Block::TableOfContents(toc) => {
                toc.children.iter_mut().for_each(Block::strip_annotations);
            }
            Block::SectionBreak(_) | Block::Opaque(_) => {}
        }
    }
}

pub fn blocks_plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(Block::plain_text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paragraph {
    /// Inline content. The last text run ends with the paragraph terminator `\n`.
    pub elements: Vec<Inline>,
    pub style: ParagraphStyle,
    pub bullet: Option<Bullet>,
    pub span: Span,
}

impl Paragraph {
    /// A paragraph holding only its terminator.
    pub fn empty() -> Self {
        Self::with_text("")
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            elements: vec![Inline::Text(TextRun::new(
                format!("{text}\n"),
                TextStyle::default(),
            ))],
            style: ParagraphStyle::default(),
            bullet: None,
            span: Span::default(),
        }
    }

    /// Content tokens in order, excluding the terminator.
    pub fn tokens(&self) -> Vec<StyledToken> {
        let mut out = Vec::new();
        collect_tokens(&self.elements, &mut out);
        if matches!(out.last(), Some(t) if t.token == Token::Char('\n')) {
            out.pop();
        }
        out
    }

    pub fn plain_text(&self) -> String {
        self.tokens()
            .iter()
            .map(|t| match &t.token {
                Token::Char(c) => *c,
                Token::Special { .. } => OBJECT_CHAR,
            })
            .collect()
    }

    /// True when the paragraph holds nothing but its terminator.
    pub fn is_empty(&self) -> bool {
        self.tokens().is_empty()
    }

    /// Drops empty text runs and merges adjacent runs with equal style,
    /// recursing into comment refs.
    pub fn compact(&mut self) {
        compact_inlines(&mut self.elements);
    }

    /// Style of the terminator run, if the paragraph is well formed.
    pub fn terminator_style(&self) -> Option<&TextStyle> {
        match self.elements.last() {
            Some(Inline::Text(run)) if run.content.ends_with('\n') => Some(&run.style),
            _ => None,
        }
    }
}

pub fn compact_inlines(elements: &mut Vec<Inline>) {
    let mut out: Vec<Inline> = Vec::with_capacity(elements.len());
    for mut element in elements.drain(..) {
        match &mut element {
            Inline::Text(run) if run.content.is_empty() => continue,
            Inline::CommentRef(cref) => compact_inlines(&mut cref.children),
            _ => {}
        }
        if let (Some(Inline::Text(prev)), Inline::Text(run)) = (out.last_mut(), &element)
            && prev.style == run.style
        {
            prev.content.push_str(&run.content);
            continue;
        }
        out.push(element);
    }
    *elements = out;
}

/// Promotes the children of every comment ref into its parent, recursively.
pub fn flatten_comment_refs(elements: &mut Vec<Inline>) {
    if !elements.iter().any(|e| matches!(e, Inline::CommentRef(_))) {
        return;
    }
    let mut out = Vec::with_capacity(elements.len());
    for element in elements.drain(..) {
        match element {
            Inline::CommentRef(mut cref) => {
                flatten_comment_refs(&mut cref.children);
                out.extend(cref.children);
            }
            other => out.push(other),
        }
    }
    *elements = out;
    compact_inlines(elements);
}

fn collect_tokens(elements: &[Inline], out: &mut Vec<StyledToken>) {
    for element in elements {
        match element {
            Inline::Text(run) => out.extend(run.content.chars().map(|c| StyledToken {
                token: Token::Char(c),
                style: run.style.clone(),
            })),
            Inline::Special(special) => out.push(StyledToken {
                token: Token::Special {
                    tag: special.kind.tag().to_string(),
                    attrs: special.attrs.clone(),
                    width: special.length(),
                },
                style: TextStyle::default(),
            }),
            Inline::CommentRef(cref) => collect_tokens(&cref.children, out),
        }
    }
}

/// One indivisible unit of paragraph content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token {
    Char(char),
    Special {
        tag: String,
        attrs: Vec<(String, String)>,
        width: u32,
    },
}

impl Token {
    /// Width in UTF-16 code units.
    pub fn width(&self) -> u32 {
        match self {
            Token::Char(c) => c.len_utf16() as u32,
            Token::Special { width, .. } => *width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyledToken {
    pub token: Token,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Inline {
    Text(TextRun),
    Special(SpecialInline),
    CommentRef(CommentRef),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub content: String,
    pub style: TextStyle,
    pub span: Span,
}

impl TextRun {
    pub fn new(content: impl Into<String>, style: TextStyle) -> Self {
        Self {
            content: content.into(),
            style,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SpecialKind {
    Image,
    PageBreak,
    FootnoteRef,
    AutoText,
    HorizontalRule,
    ColumnBreak,
    Person,
    RichLink,
    Date,
    Equation,
    /// Unknown inline tag, kept as a one-unit leaf.
    Unknown(String),
}

impl SpecialKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "image" => SpecialKind::Image,
            "pagebreak" => SpecialKind::PageBreak,
            "footnoteref" => SpecialKind::FootnoteRef,
            "autotext" => SpecialKind::AutoText,
            "hr" => SpecialKind::HorizontalRule,
            "columnbreak" => SpecialKind::ColumnBreak,
            "person" => SpecialKind::Person,
            "richlink" => SpecialKind::RichLink,
            "date" => SpecialKind::Date,
            "equation" => SpecialKind::Equation,
            _ => return None,
        })
    }

    pub fn tag(&self) -> &str {
        match self {
            SpecialKind::Image => "image",
            SpecialKind::PageBreak => "pagebreak",
            SpecialKind::FootnoteRef => "footnoteref",
            SpecialKind::AutoText => "autotext",
            SpecialKind::HorizontalRule => "hr",
            SpecialKind::ColumnBreak => "columnbreak",
            SpecialKind::Person => "person",
            SpecialKind::RichLink => "richlink",
            SpecialKind::Date => "date",
            SpecialKind::Equation => "equation",
            SpecialKind::Unknown(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialInline {
    pub kind: SpecialKind,
    pub attrs: Vec<(String, String)>,
    pub span: Span,
}

impl SpecialInline {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Code units consumed: an equation's declared `length` (1 when missing
    /// or malformed), 1 for everything else.
    pub fn length(&self) -> u32 {
        match self.kind {
            SpecialKind::Equation => self
                .attr("length")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|len| *len > 0)
                .unwrap_or(1),
            _ => 1,
        }
    }
}

/// Wrapper marking the text a comment is anchored to. Occupies no code units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRef {
    pub id: String,
    pub children: Vec<Inline>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// Stable id from the snapshot, used only for alignment.
    pub id: Option<String>,
    pub rows: Vec<TableRow>,
    /// One entry per column; `None` means evenly distributed.
    pub column_widths: Vec<Option<f32>>,
    pub span: Span,
}

impl Table {
    /// An `rows x columns` table of empty cells.
    pub fn empty(rows: usize, columns: usize) -> Self {
        Self {
            id: None,
            rows: (0..rows)
                .map(|_| TableRow {
                    cells: (0..columns).map(|_| TableCell::empty()).collect(),
                    span: Span::default(),
                })
                .collect(),
            column_widths: vec![None; columns],
            span: Span::default(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    pub span: Span,
}

impl TableRow {
    pub fn plain_text(&self) -> String {
        self.cells
            .iter()
            .map(|c| blocks_plain_text(&c.content))
            .collect::<Vec<_>>()
            .join("\t")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCell {
    pub content: Vec<Block>,
    pub span: Span,
}

impl TableCell {
    pub fn empty() -> Self {
        Self {
            content: vec![Block::Paragraph(Paragraph::empty())],
            span: Span::default(),
        }
    }

    /// Index of the cell's first content unit, whatever the layout.
    pub fn content_start(&self) -> u32 {
        self.content
            .first()
            .map_or(self.span.start, |b| b.span().start)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionBreak {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableOfContents {
    pub children: Vec<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpaqueBlock {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_counts_astral_as_two() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("é"), 1);
        assert_eq!(utf16_len("😀"), 2);
        assert_eq!(utf16_len("a😀b"), 4);
    }

    #[test]
    fn tokens_exclude_terminator() {
        let p = Paragraph::with_text("hi");
        let tokens: Vec<_> = p.tokens().into_iter().map(|t| t.token).collect();
        assert_eq!(tokens, vec![Token::Char('h'), Token::Char('i')]);
        assert!(Paragraph::empty().is_empty());
    }

    #[test]
    fn equation_length_defaults_to_one() {
        let mut eq = SpecialInline {
            kind: SpecialKind::Equation,
            attrs: vec![("length".into(), "5".into())],
            span: Span::default(),
        };
        assert_eq!(eq.length(), 5);
        eq.attrs = vec![("length".into(), "bogus".into())];
        assert_eq!(eq.length(), 1);
        eq.attrs.clear();
        assert_eq!(eq.length(), 1);
    }

    #[test]
    fn compact_merges_equal_runs() {
        let bold = TextStyle {
            bold: true,
            ..TextStyle::default()
        };
        let mut p = Paragraph::empty();
        p.elements = vec![
            Inline::Text(TextRun::new("a", bold.clone())),
            Inline::Text(TextRun::new("", TextStyle::default())),
            Inline::Text(TextRun::new("b", bold.clone())),
            Inline::Text(TextRun::new("\n", TextStyle::default())),
        ];
        p.compact();
        assert_eq!(
            p.elements,
            vec![
                Inline::Text(TextRun::new("ab", bold)),
                Inline::Text(TextRun::new("\n", TextStyle::default())),
            ]
        );
    }

    #[test]
    fn flatten_promotes_nested_refs() {
        let inner = Inline::CommentRef(CommentRef {
            id: "c2".into(),
            children: vec![Inline::Text(TextRun::new("b", TextStyle::default()))],
            span: Span::default(),
        });
        let mut elements = vec![
            Inline::CommentRef(CommentRef {
                id: "c1".into(),
                children: vec![Inline::Text(TextRun::new("a", TextStyle::default())), inner],
                span: Span::default(),
            }),
            Inline::Text(TextRun::new("c\n", TextStyle::default())),
        ];
        flatten_comment_refs(&mut elements);
        assert_eq!(
            elements,
            vec![Inline::Text(TextRun::new("abc\n", TextStyle::default()))]
        );
    }

    #[test]
    fn plain_text_marks_specials() {
        let p = Paragraph {
            elements: vec![
                Inline::Text(TextRun::new("a", TextStyle::default())),
                Inline::Special(SpecialInline {
                    kind: SpecialKind::Image,
                    attrs: vec![],
                    span: Span::default(),
                }),
                Inline::Text(TextRun::new("b\n", TextStyle::default())),
            ],
            style: ParagraphStyle::default(),
            bullet: None,
            span: Span::default(),
        };
        assert_eq!(p.plain_text(), format!("a{OBJECT_CHAR}b"));
    }
}
