// crates/pob-core/src/xml.rs
//
// Owned element tree built from quick-xml events.
// Build documents are small and are walked out of order (items are resolved
// before the item sets that reference them), so the streaming events are
// collected into a tree first.
//
// Text handling:
// - text, CDATA and entity references are concatenated per element, untrimmed
// - whitespace-only text is kept; item blocks trim their own lines

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::collections::BTreeMap;
use std::str;

use crate::parse::{ParseError, ParseResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// First attribute among `keys` with a non-blank value.
    pub fn first_attr(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.attr(key))
            .find(|value| !value.trim().is_empty())
    }

    /// First direct child named `name` (ASCII case-insensitive).
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Direct children named `name` (ASCII case-insensitive), in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Parse `xml` into its root element.
pub fn parse_document(xml: &str) -> ParseResult<Element> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                stack.push(element_from_start(&e)?);
            }

            Event::Empty(e) => {
                let element = element_from_start(&e)?;
                close_element(element, &mut stack, &mut root);
            }

            Event::End(e) => {
                let name = local_name_end(&e)?;
                let element = stack.pop().ok_or_else(|| {
                    ParseError::Structure(format!("closing {name} but no element open"))
                })?;
                close_element(element, &mut stack, &mut root);
            }

            Event::Text(t) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&t.decode()?);
                }
            }

            Event::CData(c) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&c.decode()?);
                }
            }

            Event::GeneralRef(r) => {
                if let Some(open) = stack.last_mut() {
                    if let Some(ch) = r.resolve_char_ref()? {
                        open.text.push(ch);
                    } else {
                        let entity = r.decode()?;
                        match resolve_predefined_entity(&entity) {
                            Some(resolved) => open.text.push_str(resolved),
                            None => {
                                open.text.push('&');
                                open.text.push_str(&entity);
                                open.text.push(';');
                            }
                        }
                    }
                }
            }

            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Structure(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| ParseError::Structure("no root element found".into()))
}

fn close_element(element: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        // Only the first top-level element is kept.
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn element_from_start(e: &BytesStart<'_>) -> ParseResult<Element> {
    Ok(Element {
        name: local_name_start(e)?,
        attrs: attrs_to_map(e)?,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attrs_to_map(e: &BytesStart<'_>) -> ParseResult<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for a in e.attributes() {
        let a = a?;
        let key = str::from_utf8(a.key.as_ref())?.to_string();
        let val = a.unescape_value()?.to_string();
        out.insert(key, val);
    }
    Ok(out)
}

fn local_name_start(e: &BytesStart<'_>) -> ParseResult<String> {
    Ok(str::from_utf8(e.name().as_ref())?.to_string())
}

fn local_name_end(e: &BytesEnd<'_>) -> ParseResult<String> {
    Ok(str::from_utf8(e.name().as_ref())?.to_string())
}
