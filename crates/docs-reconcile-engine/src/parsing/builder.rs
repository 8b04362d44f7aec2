use std::collections::BTreeMap;

use crate::error::{Error, ParseError, ValidationError};
use crate::model::{
    Alignment, Baseline, Block, Bullet, Color, CommentRef, Document, Inline, ListDef, ListKind,
    MAX_NESTING_LEVEL, NamedStyle, OpaqueBlock, Paragraph, ParagraphStyle, SectionBreak, Segment,
    SegmentId, Span, SpecialInline, SpecialKind, Tab, Table, TableCell, TableOfContents, TableRow,
    TextRun, TextStyle, level_indent,
};

use super::cursor::excerpt;
use super::xml::{Element, Node};

const PARAGRAPH_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "title", "subtitle", "li",
];
const SEGMENT_TAGS: &[&str] = &["body", "header", "footer", "footnote", "tab", "doc"];

fn misplaced(tag: &str, parent: &str, el: &Element) -> Error {
    ParseError::MisplacedElement {
        tag: tag.to_string(),
        parent: parent.to_string(),
        fragment: format!("<{}> at offset {}", el.name, el.offset),
    }
    .into()
}

fn malformed(el: &Element, reason: &str) -> Error {
    ParseError::Malformed {
        offset: el.offset,
        reason: reason.to_string(),
        fragment: format!("<{}>", el.name),
    }
    .into()
}

/// Builds a document from a parsed node forest. Accepts a `<doc>` root, a
/// sequence of `<tab>`s, segment elements, or a bare run of blocks.
pub fn build_document(nodes: Vec<Node>) -> Result<Document, Error> {
    let mut content = elements_only(nodes, "document")?;
    if let [only] = content.as_slice()
        && only.name == "doc"
    {
        let doc = content.remove(0);
        content = elements_only(doc.children, "doc")?;
    }

    let tabs = if content.iter().any(|e| e.name == "tab") {
        content
            .into_iter()
            .map(|el| {
                if el.name != "tab" {
                    return Err(misplaced(&el.name, "doc", &el));
                }
                let id = el.attr("id").map(str::to_string);
                let children = elements_only(el.children, "tab")?;
                TabBuilder::new(id).build(children)
            })
            .collect::<Result<Vec<_>, _>>()?
    } else {
        vec![TabBuilder::new(None).build(content)?]
    };

    Ok(Document { tabs })
}

/// Keeps element nodes, dropping whitespace-only text. Any other text at
/// this level is stray.
fn elements_only(nodes: Vec<Node>, parent: &str) -> Result<Vec<Element>, Error> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Element(el) => out.push(el),
            Node::Text { text, .. } if text.trim().is_empty() => {}
            Node::Text { text, .. } => {
                return Err(ParseError::StrayText {
                    fragment: format!("{} (in <{parent}>)", excerpt(text.trim())),
                }
                .into());
            }
        }
    }
    Ok(out)
}

struct TabBuilder {
    id: Option<String>,
    lists: BTreeMap<String, ListDef>,
}

impl TabBuilder {
    fn new(id: Option<String>) -> Self {
        Self {
            id,
            lists: BTreeMap::new(),
        }
    }

    fn build(mut self, children: Vec<Element>) -> Result<Tab, Error> {
        let mut tab = Tab::new(self.id.clone());
        let mut loose = Vec::new();
        let mut body = None;

        for el in children {
            match el.name.as_str() {
                "body" => {
                    let children = elements_only(el.children, "body")?;
                    body = Some(self.blocks(children, "body")?);
                }
                "header" | "footer" | "footnote" => {
                    let id = el
                        .attr("id")
                        .ok_or_else(|| malformed(&el, "segment is missing its id"))?
                        .to_string();
                    let segment_id = match el.name.as_str() {
                        "header" => SegmentId::Header(id),
                        "footer" => SegmentId::Footer(id),
                        _ => SegmentId::Footnote(id),
                    };
                    let parent = el.name.clone();
                    let blocks = self.blocks(elements_only(el.children, &parent)?, &parent)?;
                    let segment = Segment {
                        id: segment_id,
                        blocks,
                    };
                    match segment.id {
                        SegmentId::Header(_) => tab.headers.push(segment),
                        SegmentId::Footer(_) => tab.footers.push(segment),
                        _ => tab.footnotes.push(segment),
                    }
                }
                _ => loose.push(el),
            }
        }

        if !loose.is_empty() {
            if body.is_some() {
                return Err(misplaced(&loose[0].name, "tab", &loose[0]));
            }
            body = Some(self.blocks(loose, "body")?);
        }
        if let Some(blocks) = body {
            tab.body.blocks = blocks;
        }
        tab.lists = self.lists;
        Ok(tab)
    }

    /// Builds a block container and seals it: every table or table of
    /// contents is followed by a paragraph, and the container ends with one.
    fn blocks(&mut self, elements: Vec<Element>, parent: &str) -> Result<Vec<Block>, Error> {
        let mut out: Vec<Block> = Vec::new();
        let mut open_list: Option<(ListKind, String)> = None;
        for el in elements {
            let block = self.block(el, parent, &mut open_list)?;
            if !matches!(&block, Block::Paragraph(p) if p.bullet.is_some()) {
                open_list = None;
            }
            out.push(block);
        }
        seal(&mut out);
        Ok(out)
    }

    fn block(
        &mut self,
        el: Element,
        parent: &str,
        open_list: &mut Option<(ListKind, String)>,
    ) -> Result<Block, Error> {
        let name = el.name.as_str();
        if PARAGRAPH_TAGS.contains(&name) {
            return self.paragraph(el, open_list).map(Block::Paragraph);
        }
        match name {
            "table" => self.table(el).map(Block::Table),
            "sectionbreak" => Ok(Block::SectionBreak(SectionBreak {
                span: Span::default(),
            })),
            "toc" => {
                let children = elements_only(el.children, "toc")?;
                Ok(Block::TableOfContents(TableOfContents {
                    children: self.blocks(children, "toc")?,
                    span: Span::default(),
                }))
            }
            _ if SEGMENT_TAGS.contains(&name)
                || is_inline_tag(name)
                || matches!(name, "tr" | "td" | "th") =>
            {
                Err(misplaced(name, parent, &el))
            }
            _ => Ok(Block::Opaque(OpaqueBlock {
                tag: el.name,
                attrs: el.attrs,
                span: Span::default(),
            })),
        }
    }

    fn paragraph(
        &mut self,
        el: Element,
        open_list: &mut Option<(ListKind, String)>,
    ) -> Result<Paragraph, Error> {
        let named = match el.name.as_str() {
            "title" => NamedStyle::Title,
            "subtitle" => NamedStyle::Subtitle,
            tag => tag
                .strip_prefix('h')
                .and_then(|n| n.parse::<u8>().ok())
                .and_then(NamedStyle::heading)
                .unwrap_or_default(),
        };
        let mut style = ParagraphStyle {
            named,
            alignment: el.attr("align").and_then(Alignment::from_attr),
            indent_start: None,
        };

        let bullet = if el.name == "li" {
            let kind = el
                .attr("type")
                .and_then(ListKind::from_attr)
                .unwrap_or(ListKind::Bullet);
            let level = el
                .attr("level")
                .and_then(|l| l.trim().parse::<u8>().ok())
                .unwrap_or(0)
                .min(MAX_NESTING_LEVEL);
            let list_id = match open_list {
                Some((open_kind, id)) if *open_kind == kind => id.clone(),
                _ => {
                    let id = self.next_list_id();
                    self.lists.insert(id.clone(), ListDef::new(kind));
                    *open_list = Some((kind, id.clone()));
                    id
                }
            };
            style.indent_start = Some(level_indent(level));
            Some(Bullet {
                list_id,
                kind,
                nesting_level: level,
            })
        } else {
            None
        };

        let mut elements = Vec::new();
        inlines(el.children, &TextStyle::default(), &mut elements)?;
        elements.push(Inline::Text(TextRun::new("\n", TextStyle::default())));
        let mut paragraph = Paragraph {
            elements,
            style,
            bullet,
            span: Span::default(),
        };
        paragraph.compact();
        Ok(paragraph)
    }

    fn next_list_id(&self) -> String {
        format!("list.{}", self.lists.len())
    }

    fn table(&mut self, el: Element) -> Result<Table, Error> {
        let id = el.attr("id").map(str::to_string);
        let widths = el.attr("widths").map(parse_widths).unwrap_or_default();
        let offset = el.offset;

        let mut rows = Vec::new();
        for row_el in elements_only(el.children, "table")? {
            if row_el.name != "tr" {
                return Err(misplaced(&row_el.name, "table", &row_el));
            }
            let mut cells = Vec::new();
            for cell_el in elements_only_keep_inline(row_el.children) {
                if !matches!(cell_el.name.as_str(), "td" | "th") {
                    return Err(misplaced(&cell_el.name, "tr", &cell_el));
                }
                cells.push(self.cell(cell_el)?);
            }
            rows.push(TableRow {
                cells,
                span: Span::default(),
            });
        }
        if rows.is_empty() {
            return Err(ParseError::Malformed {
                offset,
                reason: "table has no rows".into(),
                fragment: "<table>".into(),
            }
            .into());
        }

        let columns = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0).max(1);
        for row in &mut rows {
            row.cells.resize_with(columns, TableCell::empty);
        }
        let mut column_widths = widths;
        column_widths.resize(columns, None);

        Ok(Table {
            id,
            rows,
            column_widths,
            span: Span::default(),
        })
    }

    /// A cell holding only inline content is shorthand for one paragraph.
    fn cell(&mut self, el: Element) -> Result<TableCell, Error> {
        let holds_blocks = el.children.iter().any(|n| match n {
            Node::Element(child) => !is_inline_tag(&child.name),
            Node::Text { .. } => false,
        });
        let content = if holds_blocks {
            let children = elements_only(el.children, "td")?;
            self.blocks(children, "td")?
        } else if el.children.is_empty() {
            vec![Block::Paragraph(Paragraph::empty())]
        } else {
            let shorthand = Element {
                name: "p".into(),
                attrs: Vec::new(),
                children: el.children,
                offset: el.offset,
            };
            vec![Block::Paragraph(self.paragraph(shorthand, &mut None)?)]
        };
        Ok(TableCell {
            content,
            span: Span::default(),
        })
    }
}

/// Like [`elements_only`] for row children, where text is never meaningful.
fn elements_only_keep_inline(nodes: Vec<Node>) -> Vec<Element> {
    nodes
        .into_iter()
        .filter_map(|n| match n {
            Node::Element(el) => Some(el),
            Node::Text { .. } => None,
        })
        .collect()
}

fn seal(blocks: &mut Vec<Block>) {
    let mut i = 0;
    while i < blocks.len() {
        let needs_paragraph = matches!(blocks[i], Block::Table(_) | Block::TableOfContents(_))
            && !blocks.get(i + 1).is_some_and(Block::is_paragraph);
        if needs_paragraph {
            blocks.insert(i + 1, Block::Paragraph(Paragraph::empty()));
        }
        i += 1;
    }
    if !blocks.last().is_some_and(Block::is_paragraph) {
        blocks.push(Block::Paragraph(Paragraph::empty()));
    }
}

fn parse_widths(value: &str) -> Vec<Option<f32>> {
    value
        .split(',')
        .map(|w| w.trim().parse::<f32>().ok().filter(|w| *w > 0.0))
        .collect()
}

fn is_inline_tag(name: &str) -> bool {
    matches!(
        name,
        "b" | "strong"
            | "i"
            | "em"
            | "u"
            | "s"
            | "strike"
            | "del"
            | "sup"
            | "sub"
            | "a"
            | "span"
            | "comment-ref"
    ) || SpecialKind::from_tag(name).is_some()
}

fn inlines(nodes: Vec<Node>, style: &TextStyle, out: &mut Vec<Inline>) -> Result<(), Error> {
    for node in nodes {
        let el = match node {
            Node::Text { text, .. } => {
                if text.contains(['\n', '\r']) {
                    return Err(ValidationError::EmbeddedNewline {
                        fragment: excerpt(&text),
                    }
                    .into());
                }
                out.push(Inline::Text(TextRun::new(text, style.clone())));
                continue;
            }
            Node::Element(el) => el,
        };

        let mut inner = style.clone();
        match el.name.as_str() {
            "b" | "strong" => inner.bold = true,
            "i" | "em" => inner.italic = true,
            "u" => inner.underline = true,
            "s" | "strike" | "del" => inner.strikethrough = true,
            "sup" => inner.baseline = Some(Baseline::Superscript),
            "sub" => inner.baseline = Some(Baseline::Subscript),
            "a" => inner.link = el.attr("href").map(str::to_string),
            "span" => {
                if let Some(color) = el.attr("color").and_then(Color::parse_hex) {
                    inner.foreground = Some(color);
                }
            }
            "comment-ref" => {
                let id = el
                    .attr("id")
                    .ok_or_else(|| malformed(&el, "comment-ref is missing its id"))?
                    .to_string();
                let mut children = Vec::new();
                inlines(el.children, style, &mut children)?;
                out.push(Inline::CommentRef(CommentRef {
                    id,
                    children,
                    span: Span::default(),
                }));
                continue;
            }
            name if PARAGRAPH_TAGS.contains(&name)
                || SEGMENT_TAGS.contains(&name)
                || matches!(name, "table" | "tr" | "td" | "th" | "sectionbreak" | "toc") =>
            {
                return Err(misplaced(name, "paragraph", &el));
            }
            name => {
                let kind = SpecialKind::from_tag(name)
                    .unwrap_or_else(|| SpecialKind::Unknown(name.to_string()));
                out.push(Inline::Special(SpecialInline {
                    kind,
                    attrs: el.attrs,
                    span: Span::default(),
                }));
                continue;
            }
        }
        inlines(el.children, &inner, out)?;
    }
    Ok(())
}
