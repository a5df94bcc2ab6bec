use anyhow::{Result, bail};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

/// Translate an XML document into a generic nested mapping.
///
/// Conversion rules:
/// - attributes merge into their element's mapping as sibling keys
/// - children are grouped under their tag name as an ordered sequence, even
///   when only one child is present (the document root included)
/// - an element with no attributes and no children collapses to its text;
///   a mixed element keeps its text under `#text`
pub fn xml_to_value(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut document = OpenElement::new(String::new());
    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(OpenElement::from_start(&e)?),
            Event::Empty(e) => {
                let (tag, value) = OpenElement::from_start(&e)?.close();
                attach(stack.last_mut().unwrap_or(&mut document), tag, value);
            }
            Event::Text(t) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let Some(open) = stack.pop() else {
                    bail!("closing tag without a matching opening tag");
                };
                let (tag, value) = open.close();
                attach(stack.last_mut().unwrap_or(&mut document), tag, value);
            }
            Event::Eof => break,
            _ => {} // declarations, comments, processing instructions
        }
    }

    if !stack.is_empty() {
        bail!("document ended with {} unclosed element(s)", stack.len());
    }

    Ok(Value::Object(document.map))
}

struct OpenElement {
    tag: String,
    map: Map<String, Value>,
    text: String,
    has_children: bool,
}

impl OpenElement {
    fn new(tag: String) -> OpenElement {
        OpenElement {
            tag,
            map: Map::new(),
            text: String::new(),
            has_children: false,
        }
    }

    fn from_start(e: &BytesStart) -> Result<OpenElement> {
        let mut open = OpenElement::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            open.map.insert(key, Value::String(value));
        }
        Ok(open)
    }

    fn close(self) -> (String, Value) {
        let OpenElement {
            tag,
            mut map,
            text,
            has_children,
        } = self;
        let text = text.trim();
        let value = if map.is_empty() && !has_children {
            Value::String(text.to_string())
        } else {
            if !text.is_empty() {
                map.insert("#text".to_string(), Value::String(text.to_string()));
            }
            Value::Object(map)
        };
        (tag, value)
    }
}

fn attach(parent: &mut OpenElement, tag: String, value: Value) {
    parent.has_children = true;
    let slot = parent
        .map
        .entry(tag)
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        // a child element shadows a like-named attribute
        *slot = Value::Array(Vec::new());
    }
    if let Value::Array(items) = slot {
        items.push(value);
    }
}
