use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::block::{Block, Paragraph};
use super::style::ListDef;

/// Identifies a content stream within a tab.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SegmentId {
    Body,
    Header(String),
    Footer(String),
    Footnote(String),
}

impl SegmentId {
    pub fn is_body(&self) -> bool {
        matches!(self, SegmentId::Body)
    }

    /// The `segmentId` routing value; `None` for the body.
    pub fn routing_id(&self) -> Option<&str> {
        match self {
            SegmentId::Body => None,
            SegmentId::Header(id) | SegmentId::Footer(id) | SegmentId::Footnote(id) => Some(id),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            SegmentId::Body => "body",
            SegmentId::Header(_) => "header",
            SegmentId::Footer(_) => "footer",
            SegmentId::Footnote(_) => "footnote",
        }
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.routing_id() {
            Some(id) => write!(f, "{}:{id}", self.tag()),
            None => f.write_str("body"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub id: SegmentId,
    pub blocks: Vec<Block>,
}

impl Segment {
    /// A segment holding one empty paragraph.
    pub fn new(id: SegmentId) -> Self {
        Self {
            id,
            blocks: vec![Block::Paragraph(Paragraph::empty())],
        }
    }

    /// Index of the first block: 0 for non-body segments and for a body
    /// that opens with an explicit section break, otherwise 1.
    pub fn origin(&self) -> u32 {
        origin_for(self.id.is_body(), &self.blocks)
    }

    /// Lowest index an operation may address.
    pub fn min_index(&self) -> u32 {
        u32::from(self.id.is_body())
    }

    /// Exclusive end index. Only meaningful after indexing.
    pub fn end(&self) -> u32 {
        self.blocks.last().map_or(self.origin(), |b| b.span().end)
    }
}

pub fn origin_for(is_body: bool, blocks: &[Block]) -> u32 {
    match blocks.first() {
        _ if !is_body => 0,
        Some(Block::SectionBreak(_)) => 0,
        _ => 1,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tab {
    pub id: Option<String>,
    pub body: Segment,
    pub headers: Vec<Segment>,
    pub footers: Vec<Segment>,
    pub footnotes: Vec<Segment>,
    /// List definitions keyed by list id.
    pub lists: BTreeMap<String, ListDef>,
}

impl Tab {
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            body: Segment::new(SegmentId::Body),
            headers: Vec::new(),
            footers: Vec::new(),
            footnotes: Vec::new(),
            lists: BTreeMap::new(),
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        std::iter::once(&self.body)
            .chain(&self.headers)
            .chain(&self.footers)
            .chain(&self.footnotes)
    }

    pub fn segments_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        std::iter::once(&mut self.body)
            .chain(&mut self.headers)
            .chain(&mut self.footers)
            .chain(&mut self.footnotes)
    }

    pub fn segment(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments().find(|s| &s.id == id)
    }

    pub fn segment_mut(&mut self, id: &SegmentId) -> Option<&mut Segment> {
        self.segments_mut().find(|s| &s.id == id)
    }

    /// Finds a segment by its routing id alone; `None` means the body.
    pub fn segment_by_routing(&self, routing: Option<&str>) -> Option<&Segment> {
        match routing {
            None => Some(&self.body),
            Some(r) => self.segments().find(|s| s.id.routing_id() == Some(r)),
        }
    }

    pub fn segment_by_routing_mut(&mut self, routing: Option<&str>) -> Option<&mut Segment> {
        match routing {
            None => Some(&mut self.body),
            Some(r) => self.segments_mut().find(|s| s.id.routing_id() == Some(r)),
        }
    }

    /// Mints a list id not used in this tab.
    pub fn next_list_id(&self) -> String {
        let mut n = self.lists.len();
        loop {
            let id = format!("list.{n}");
            if !self.lists.contains_key(&id) {
                return id;
            }
            n += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub tabs: Vec<Tab>,
}

impl Document {
    /// A single-tab document with an empty body.
    pub fn new() -> Self {
        Self {
            tabs: vec![Tab::new(None)],
        }
    }

    /// Looks a tab up by id; `None` addresses the first tab.
    pub fn tab(&self, id: Option<&str>) -> Option<&Tab> {
        match id {
            None => self.tabs.first(),
            Some(id) => self.tabs.iter().find(|t| t.id.as_deref() == Some(id)),
        }
    }

    pub fn tab_mut(&mut self, id: Option<&str>) -> Option<&mut Tab> {
        match id {
            None => self.tabs.first_mut(),
            Some(id) => self.tabs.iter_mut().find(|t| t.id.as_deref() == Some(id)),
        }
    }

    pub fn body(&self) -> Option<&Segment> {
        self.tabs.first().map(|t| &t.body)
    }

    /// Drops comment refs and table ids everywhere; see
    /// [`Block::strip_annotations`].
    pub fn strip_annotations(&mut self) {
        for tab in &mut self.tabs {
            for segment in tab.segments_mut() {
                segment.blocks.iter_mut().for_each(Block::strip_annotations);
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
