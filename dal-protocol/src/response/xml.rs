//! XML responses.

use super::deliver;
use crate::envelope::ResponseEnvelope;
use crate::error::ProtocolError;
use crate::record::{Record, RecordVisitor, RowData};
use crate::tags;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Element of a parsed response document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: RowData,
    pub children: Vec<Element>,
}

impl Element {
    /// Depth-first, document-order walk over this element and its
    /// descendants.
    fn walk<'a>(&'a self, out: &mut Vec<&'a Element>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }

    fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.walk(&mut out);
        out
    }

    fn find_first(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_first(name))
    }
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, ProtocolError> {
    let mut element = Element {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        ..Default::default()
    };
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

/// Parses a document into its root element.
pub fn parse_document(xml: &str) -> Result<Element, ProtocolError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let finished = match reader.read_event()? {
            Event::Start(e) => {
                stack.push(start_element(&e)?);
                None
            }
            Event::Empty(e) => Some(start_element(&e)?),
            Event::End(_) => stack.pop(),
            Event::Eof => break,
            _ => None,
        };

        if let Some(element) = finished {
            match stack.last_mut() {
                Some(parent) => parent.children.push(element),
                None if root.is_none() => root = Some(element),
                None => {
                    return Err(ProtocolError::Xml(format!(
                        "more than one root element ('{}')",
                        element.name
                    )))
                }
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(ProtocolError::Xml(format!("unclosed element '{}'", open.name)));
    }
    root.ok_or_else(|| ProtocolError::Xml("no root element".to_string()))
}

/// XML response parsed into an element tree.
#[derive(Debug, Clone)]
pub struct XmlResponse {
    envelope: ResponseEnvelope,
    root: Element,
}

impl XmlResponse {
    pub fn new(envelope: ResponseEnvelope) -> Result<Self, ProtocolError> {
        if envelope.looks_like_doctype() {
            return Err(ProtocolError::Doctype);
        }
        let root = parse_document(&envelope.body)?;
        Ok(Self { envelope, root })
    }

    pub fn envelope(&self) -> &ResponseEnvelope {
        &self.envelope
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Attributes of the first `Error` element, as `name=value` joined by
    /// ", ".
    pub fn error_message(&self) -> Option<String> {
        self.root.find_first(tags::ERROR).map(|e| {
            if e.attributes.is_empty() {
                return "Unknown error: empty element".to_string();
            }
            e.attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        })
    }

    fn check_error(&self) -> Result<(), ProtocolError> {
        match self.error_message() {
            Some(msg) => Err(ProtocolError::ServerReported(msg)),
            None => Ok(()),
        }
    }

    fn to_record(&self, element: &Element) -> Record {
        let mut record = Record::new(self.envelope.url.clone(), element.name.clone());
        record.fields = element.attributes.clone();
        for child in &element.children {
            if !child.children.is_empty() {
                record.warn(format!(
                    "elements below '{}/{}' ignored",
                    element.name, child.name
                ));
            }
            record.add_nested(child.name.clone(), child.attributes.clone());
        }
        record
    }

    /// Record for the first element named `tag`; empty if none.
    pub fn first_record(&self, tag: &str) -> Result<Record, ProtocolError> {
        self.check_error()?;
        Ok(self
            .root
            .find_first(tag)
            .map(|e| self.to_record(e))
            .unwrap_or_else(|| Record::new(self.envelope.url.clone(), tag)))
    }

    /// Tag names declared by `RecordMeta` elements. An element without a
    /// `TagName` makes the response malformed.
    pub fn record_meta_tags(&self) -> Result<Vec<String>, ProtocolError> {
        self.root
            .descendants()
            .into_iter()
            .filter(|e| e.name == tags::RECORD_META)
            .map(|e| {
                e.attributes
                    .get(tags::ATTR_TAG_NAME)
                    .filter(|t| !t.is_empty())
                    .cloned()
                    .ok_or_else(|| {
                        ProtocolError::Malformed(format!(
                            "{} element without {} in response from {}",
                            tags::RECORD_META,
                            tags::ATTR_TAG_NAME,
                            self.envelope.url
                        ))
                    })
            })
            .collect()
    }

    pub fn visit_records(
        &self,
        visitor: &mut dyn RecordVisitor,
        wanted: &[&str],
        include_empty: bool,
    ) -> Result<bool, ProtocolError> {
        self.check_error()?;

        let meta;
        let wanted: Vec<&str> = if wanted.is_empty() {
            meta = self.record_meta_tags()?;
            if meta.is_empty() {
                return Err(ProtocolError::Malformed(format!(
                    "no {} tag names in response from {}",
                    tags::RECORD_META,
                    self.envelope.url
                )));
            }
            meta.iter().map(String::as_str).collect()
        } else {
            wanted.to_vec()
        };

        for element in self.root.descendants() {
            if !wanted.contains(&element.name.as_str()) {
                continue;
            }
            let record = self.to_record(element);
            if deliver(visitor, &element.name, &record, include_empty).is_break() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
