//! A small XML reader for the snapshot format.
//!
//! [`Tokenizer`] is lossless: every token keeps its raw source slice, so
//! callers can rewrite a snapshot by dropping tokens. [`parse_tree`] builds
//! an element tree on top of it with decoded text and attributes.

use std::borrow::Cow;

use crate::error::ParseError;

use super::cursor::{Cursor, excerpt};

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Text {
        raw: &'a str,
        offset: usize,
    },
    Open {
        name: &'a str,
        attrs: Vec<(String, String)>,
        self_closing: bool,
        raw: &'a str,
        offset: usize,
    },
    Close {
        name: &'a str,
        raw: &'a str,
        offset: usize,
    },
    /// Comments, declarations and processing instructions.
    Skipped { raw: &'a str },
}

impl<'a> Token<'a> {
    pub fn raw(&self) -> &'a str {
        match self {
            Token::Text { raw, .. }
            | Token::Open { raw, .. }
            | Token::Close { raw, .. }
            | Token::Skipped { raw } => raw,
        }
    }
}

pub struct Tokenizer<'a> {
    cur: Cursor<'a>,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            cur: Cursor::new(input, 0),
            failed: false,
        }
    }

    fn error(&self, offset: usize, reason: &str) -> ParseError {
        ParseError::Malformed {
            offset,
            reason: reason.to_string(),
            fragment: excerpt(self.cur.s.get(offset..).unwrap_or("")),
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        let start = self.cur.i;
        if self.cur.peek() != Some(b'<') {
            self.cur.skip_while(|b| b != b'<');
            return Ok(Token::Text {
                raw: self.cur.since(start),
                offset: self.cur.base + start,
            });
        }

        if self.cur.starts_with(b"<!--") {
            self.cur.bump_n(4);
            return match self.cur.take_until("-->") {
                Some(_) => Ok(Token::Skipped {
                    raw: self.cur.since(start),
                }),
                None => Err(self.error(start, "unterminated comment")),
            };
        }
        if self.cur.starts_with(b"<?") || self.cur.starts_with(b"<!") {
            let end = if self.cur.starts_with(b"<?") { "?>" } else { ">" };
            self.cur.bump_n(2);
            return match self.cur.take_until(end) {
                Some(_) => Ok(Token::Skipped {
                    raw: self.cur.since(start),
                }),
                None => Err(self.error(start, "unterminated declaration")),
            };
        }

        self.cur.bump();
        let closing = self.cur.peek() == Some(b'/');
        if closing {
            self.cur.bump();
        }
        let name = self.name();
        if name.is_empty() {
            return Err(self.error(start, "expected a tag name"));
        }

        if closing {
            self.cur.skip_ws();
            if self.cur.bump() != Some(b'>') {
                return Err(self.error(start, "expected `>` to end closing tag"));
            }
            return Ok(Token::Close {
                name,
                raw: self.cur.since(start),
                offset: self.cur.base + start,
            });
        }

        let mut attrs = Vec::new();
        loop {
            self.cur.skip_ws();
            match self.cur.peek() {
                Some(b'>') => {
                    self.cur.bump();
                    return Ok(Token::Open {
                        name,
                        attrs,
                        self_closing: false,
                        raw: self.cur.since(start),
                        offset: self.cur.base + start,
                    });
                }
                Some(b'/') => {
                    self.cur.bump();
                    if self.cur.bump() != Some(b'>') {
                        return Err(self.error(start, "expected `/>`"));
                    }
                    return Ok(Token::Open {
                        name,
                        attrs,
                        self_closing: true,
                        raw: self.cur.since(start),
                        offset: self.cur.base + start,
                    });
                }
                Some(_) => attrs.push(self.attribute(start)?),
                None => return Err(self.error(start, "unterminated tag")),
            }
        }
    }

    fn name(&mut self) -> &'a str {
        let from = self.cur.i;
        self.cur
            .skip_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'));
        self.cur.since(from)
    }

    fn attribute(&mut self, tag_start: usize) -> Result<(String, String), ParseError> {
        let name = self.name();
        if name.is_empty() {
            return Err(self.error(tag_start, "invalid attribute"));
        }
        self.cur.skip_ws();
        if self.cur.peek() != Some(b'=') {
            return Ok((name.to_string(), String::new()));
        }
        self.cur.bump();
        self.cur.skip_ws();
        let quote = match self.cur.bump() {
            Some(q @ (b'"' | b'\'')) => q as char,
            _ => return Err(self.error(tag_start, "attribute value must be quoted")),
        };
        let Some(value) = self.cur.take_until(quote.encode_utf8(&mut [0; 4])) else {
            return Err(self.error(tag_start, "unterminated attribute value"));
        };
        Ok((name.to_string(), decode(value).into_owned()))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cur.eof() {
            return None;
        }
        let token = self.next_token();
        self.failed = token.is_err();
        Some(token)
    }
}

pub fn decode(raw: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(raw)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text { text: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// Byte offset of the opening tag.
    pub offset: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parses `input` into a forest of nodes.
pub fn parse_tree(input: &str) -> Result<Vec<Node>, ParseError> {
    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<Node> = Vec::new();

    fn push(stack: &mut [Element], roots: &mut Vec<Node>, node: Node) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }

    for token in Tokenizer::new(input) {
        match token? {
            Token::Text { raw, offset } => push(
                &mut stack,
                &mut roots,
                Node::Text {
                    text: decode(raw).into_owned(),
                    offset,
                },
            ),
            Token::Open {
                name,
                attrs,
                self_closing,
                offset,
                ..
            } => {
                let element = Element {
                    name: name.to_string(),
                    attrs,
                    children: Vec::new(),
                    offset,
                };
                if self_closing {
                    push(&mut stack, &mut roots, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Token::Close { name, offset, .. } => {
                let Some(open) = stack.pop() else {
                    return Err(ParseError::Malformed {
                        offset,
                        reason: format!("unexpected closing tag </{name}>"),
                        fragment: excerpt(&input[offset..]),
                    });
                };
                if open.name != name {
                    return Err(ParseError::Malformed {
                        offset,
                        reason: format!("</{name}> does not close <{}>", open.name),
                        fragment: excerpt(&input[open.offset..]),
                    });
                }
                push(&mut stack, &mut roots, Node::Element(open));
            }
            Token::Skipped { .. } => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::Malformed {
            offset: open.offset,
            reason: format!("<{}> is never closed", open.name),
            fragment: excerpt(&input[open.offset..]),
        });
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(node: &Node) -> &Element {
        match node {
            Node::Element(e) => e,
            Node::Text { .. } => panic!("expected element, got {node:?}"),
        }
    }

    #[test]
    fn tokens_are_lossless() {
        let input = r#"<doc><!-- note --><p a="1">x &amp; y</p><br/></doc>"#;
        let rebuilt: String = Tokenizer::new(input)
            .map(|t| t.unwrap().raw())
            .collect();
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn nested_elements_and_entities() {
        let nodes = parse_tree(r#"<p align="center">a <b>b&lt;</b></p>"#).unwrap();
        assert_eq!(nodes.len(), 1);
        let p = element(&nodes[0]);
        assert_eq!(p.name, "p");
        assert_eq!(p.attr("align"), Some("center"));
        assert_eq!(p.children.len(), 2);
        let b = element(&p.children[1]);
        assert_eq!(
            b.children,
            vec![Node::Text {
                text: "b<".into(),
                offset: 23
            }]
        );
    }

    #[test]
    fn single_quoted_and_bare_attributes() {
        let nodes = parse_tree("<li type='number' checked/>").unwrap();
        let li = element(&nodes[0]);
        assert_eq!(li.attr("type"), Some("number"));
        assert_eq!(li.attr("checked"), Some(""));
    }

    #[test]
    fn mismatched_close_reports_open_tag() {
        let err = parse_tree("<p><b>x</i></p>").unwrap_err();
        let ParseError::Malformed { reason, fragment, .. } = err else {
            panic!("unexpected error kind");
        };
        assert_eq!(reason, "</i> does not close <b>");
        assert!(fragment.starts_with("<b>x"));
    }

    #[test]
    fn unclosed_element_is_an_error() {
        assert!(matches!(
            parse_tree("<p>never closed"),
            Err(ParseError::Malformed { offset: 0, .. })
        ));
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        assert!(parse_tree("<p class=\"x").is_err());
        assert!(parse_tree("<p x=1>").is_err());
        assert!(parse_tree("</>").is_err());
    }
}
