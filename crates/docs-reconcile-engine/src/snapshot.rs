//! Canonical snapshot text for documents and blocks.
//!
//! The canonical form is what the diff compares for exact matches and what
//! round-trip checks compare for structural equality, so it deliberately
//! omits spans and list ids.

use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::model::{
    Baseline, Block, Document, Inline, NamedStyle, Paragraph, Segment, Tab, Table, TableCell,
    TableRow, TextStyle,
};

pub fn to_xml(document: &Document) -> String {
    let tabbed = document.tabs.len() > 1 || document.tabs.iter().any(|t| t.id.is_some());
    let mut out = String::from("<doc>\n");
    for tab in &document.tabs {
        if tabbed {
            match &tab.id {
                Some(id) => {
                    let _ = writeln!(out, "<tab id=\"{}\">", encode_double_quoted_attribute(id));
                }
                None => out.push_str("<tab>\n"),
            }
        }
        write_tab(&mut out, tab);
        if tabbed {
            out.push_str("</tab>\n");
        }
    }
    out.push_str("</doc>\n");
    out
}

/// Canonical form without comment refs or table ids: the structural
/// equality key used when comparing an applied document with its target.
pub fn to_structural_xml(document: &Document) -> String {
    let mut stripped = document.clone();
    stripped.strip_annotations();
    to_xml(&stripped)
}

/// Equality key for one block during alignment.
pub fn block_key(block: &Block) -> String {
    let mut stripped = block.clone();
    stripped.strip_annotations();
    block_to_xml(&stripped)
}

fn write_tab(out: &mut String, tab: &Tab) {
    for segment in tab.segments() {
        out.push_str(&segment_to_xml(segment));
    }
}

pub fn segment_to_xml(segment: &Segment) -> String {
    let mut out = String::new();
    match segment.id.routing_id() {
        Some(id) => {
            let _ = writeln!(
                out,
                "<{} id=\"{}\">",
                segment.id.tag(),
                encode_double_quoted_attribute(id)
            );
        }
        None => out.push_str("<body>\n"),
    }
    for block in &segment.blocks {
        out.push_str(&block_to_xml(block));
        out.push('\n');
    }
    let _ = writeln!(out, "</{}>", segment.id.tag());
    out
}

pub fn block_to_xml(block: &Block) -> String {
    let mut out = String::new();
    write_block(&mut out, block);
    out
}

pub fn blocks_to_xml(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        write_block(&mut out, block);
    }
    out
}

fn write_block(out: &mut String, block: &Block) {
    match block {
        Block::Paragraph(p) => write_paragraph(out, p),
        Block::Table(t) => write_table(out, t),
        Block::SectionBreak(_) => out.push_str("<sectionbreak/>"),
        Block::TableOfContents(toc) => {
            out.push_str("<toc>");
            for child in &toc.children {
                write_block(out, child);
            }
            out.push_str("</toc>");
        }
        Block::Opaque(o) => {
            out.push('<');
            out.push_str(&o.tag);
            write_attrs(out, &o.attrs);
            out.push_str("/>");
        }
    }
}

fn paragraph_tag(p: &Paragraph) -> String {
    if p.bullet.is_some() {
        return "li".into();
    }
    match p.style.named {
        NamedStyle::NormalText => "p".into(),
        NamedStyle::Title => "title".into(),
        NamedStyle::Subtitle => "subtitle".into(),
        NamedStyle::Heading1 => "h1".into(),
        NamedStyle::Heading2 => "h2".into(),
        NamedStyle::Heading3 => "h3".into(),
        NamedStyle::Heading4 => "h4".into(),
        NamedStyle::Heading5 => "h5".into(),
        NamedStyle::Heading6 => "h6".into(),
    }
}

fn write_paragraph(out: &mut String, p: &Paragraph) {
    let tag = paragraph_tag(p);
    out.push('<');
    out.push_str(&tag);
    if let Some(bullet) = &p.bullet {
        let _ = write!(out, " type=\"{}\"", bullet.kind.as_attr());
        if bullet.nesting_level > 0 {
            let _ = write!(out, " level=\"{}\"", bullet.nesting_level);
        }
    }
    if let Some(alignment) = p.style.alignment {
        let _ = write!(out, " align=\"{}\"", alignment.as_attr());
    }
    out.push('>');
    out.push_str(&paragraph_inner_xml(p));
    let _ = write!(out, "</{tag}>");
}

/// Inline content of a paragraph without its terminator.
pub fn paragraph_inner_xml(p: &Paragraph) -> String {
    let mut out = String::new();
    let last = p.elements.len().saturating_sub(1);
    for (i, element) in p.elements.iter().enumerate() {
        write_inline(&mut out, element, i == last);
    }
    out
}

fn write_inline(out: &mut String, element: &Inline, is_last: bool) {
    match element {
        Inline::Text(run) => {
            let text = if is_last {
                run.content.strip_suffix('\n').unwrap_or(&run.content)
            } else {
                &run.content
            };
            if !text.is_empty() {
                write_run(out, text, &run.style);
            }
        }
        Inline::Special(s) => {
            out.push('<');
            out.push_str(s.kind.tag());
            write_attrs(out, &s.attrs);
            out.push_str("/>");
        }
        Inline::CommentRef(c) => {
            let _ = write!(
                out,
                "<comment-ref id=\"{}\">",
                encode_double_quoted_attribute(&c.id)
            );
            let last = c.children.len().saturating_sub(1);
            for (i, child) in c.children.iter().enumerate() {
                write_inline(out, child, is_last && i == last);
            }
            out.push_str("</comment-ref>");
        }
    }
}

fn write_run(out: &mut String, text: &str, style: &TextStyle) {
    let mut close = Vec::new();
    if let Some(link) = &style.link {
        let _ = write!(out, "<a href=\"{}\">", encode_double_quoted_attribute(link));
        close.push("</a>");
    }
    if let Some(color) = style.foreground {
        let _ = write!(out, "<span color=\"{color}\">");
        close.push("</span>");
    }
    for (on, open, end) in [
        (style.bold, "<b>", "</b>"),
        (style.italic, "<i>", "</i>"),
        (style.underline, "<u>", "</u>"),
        (style.strikethrough, "<s>", "</s>"),
        (style.baseline == Some(Baseline::Superscript), "<sup>", "</sup>"),
        (style.baseline == Some(Baseline::Subscript), "<sub>", "</sub>"),
    ] {
        if on {
            out.push_str(open);
            close.push(end);
        }
    }
    out.push_str(&encode_text(text));
    for end in close.iter().rev() {
        out.push_str(end);
    }
}

fn write_table(out: &mut String, table: &Table) {
    out.push_str("<table");
    if let Some(id) = &table.id {
        let _ = write!(out, " id=\"{}\"", encode_double_quoted_attribute(id));
    }
    if table.column_widths.iter().any(Option::is_some) {
        let widths: Vec<String> = table
            .column_widths
            .iter()
            .map(|w| w.map(|w| w.to_string()).unwrap_or_default())
            .collect();
        let _ = write!(out, " widths=\"{}\"", widths.join(","));
    }
    out.push('>');
    for row in &table.rows {
        write_row(out, row);
    }
    out.push_str("</table>");
}

fn write_row(out: &mut String, row: &TableRow) {
    out.push_str("<tr>");
    for cell in &row.cells {
        write_cell(out, cell);
    }
    out.push_str("</tr>");
}

fn write_cell(out: &mut String, cell: &TableCell) {
    out.push_str("<td>");
    for block in &cell.content {
        write_block(out, block);
    }
    out.push_str("</td>");
}

pub fn row_to_xml(row: &TableRow) -> String {
    let mut out = String::new();
    write_row(&mut out, row);
    out
}

pub fn cell_to_xml(cell: &TableCell) -> String {
    let mut out = String::new();
    write_cell(&mut out, cell);
    out
}

/// Equality key for one row during alignment.
pub fn row_key(row: &TableRow) -> String {
    let mut out = String::from("<tr>");
    for cell in &row.cells {
        out.push_str(&cell_key(cell));
    }
    out.push_str("</tr>");
    out
}

pub fn cell_key(cell: &TableCell) -> String {
    let mut out = String::from("<td>");
    for block in &cell.content {
        out.push_str(&block_key(block));
    }
    out.push_str("</td>");
    out
}

fn write_attrs(out: &mut String, attrs: &[(String, String)]) {
    for (k, v) in attrs {
        let _ = write!(out, " {k}=\"{}\"", encode_double_quoted_attribute(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn body_xml(input: &str) -> String {
        let doc = parse(input).unwrap();
        blocks_to_xml(&doc.tabs[0].body.blocks)
    }

    #[rstest]
    #[case("<p>Hello</p>")]
    #[case("<h1>Title &amp; more</h1>")]
    #[case(r#"<li type="number" level="2">x</li>"#)]
    #[case(r#"<p align="center">a<b>b</b><a href="https://e.x/?a=1&amp;b=2">c</a></p>"#)]
    #[case(r##"<p><a href="u"><span color="#1155cc"><b>x</b></span></a></p>"##)]
    #[case(r#"<p>x<image src="a.png"/><equation length="3"/></p>"#)]
    #[case(r#"<p>a<comment-ref id="c1">b<i>c</i></comment-ref></p>"#)]
    #[case(r#"<table id="t1" widths="100,"><tr><td><p>a</p></td><td><p></p></td></tr></table><p></p>"#)]
    #[case("<sectionbreak/><p>a</p>")]
    #[case("<toc><p>entry</p></toc><p></p>")]
    fn canonical_form_is_stable(#[case] input: &str) {
        let once = body_xml(input);
        assert_eq!(once, input);
        assert_eq!(body_xml(&once), once);
    }

    #[test]
    fn document_form() {
        let doc = parse(r#"<p>a</p><footer id="f"><p>b</p></footer>"#).unwrap();
        assert_eq!(
            to_xml(&doc),
            "<doc>\n<body>\n<p>a</p>\n</body>\n<footer id=\"f\">\n<p>b</p>\n</footer>\n</doc>\n"
        );
        assert_eq!(parse(&to_xml(&doc)).unwrap(), doc);
    }

    #[test]
    fn tabbed_document_form() {
        let doc = parse(r#"<doc><tab id="t.0"><p>a</p></tab></doc>"#).unwrap();
        assert_eq!(
            to_xml(&doc),
            "<doc>\n<tab id=\"t.0\">\n<body>\n<p>a</p>\n</body>\n</tab>\n</doc>\n"
        );
    }

    #[test]
    fn structural_key_ignores_comment_refs_and_table_ids() {
        let marked = parse(r#"<p>a<comment-ref id="c1">b</comment-ref></p>"#).unwrap();
        let plain = parse("<p>ab</p>").unwrap();
        assert_eq!(
            block_key(&marked.tabs[0].body.blocks[0]),
            block_key(&plain.tabs[0].body.blocks[0])
        );

        let with_id = parse(r#"<table id="t9"><tr><td>x</td></tr></table>"#).unwrap();
        let without = parse("<table><tr><td>x</td></tr></table>").unwrap();
        assert_eq!(to_structural_xml(&with_id), to_structural_xml(&without));
    }

    #[test]
    fn special_characters_are_escaped() {
        let doc = parse("<p>a &lt; b &amp;&amp; c</p>").unwrap();
        insta::assert_snapshot!(block_to_xml(&doc.tabs[0].body.blocks[0]), @"<p>a &lt; b &amp;&amp; c</p>");
    }
}
