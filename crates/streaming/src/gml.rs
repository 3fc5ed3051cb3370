//! Flattens GML feature-info responses into per-feature leaf maps.
//!
//! Any element whose children are all text-only elements is a feature; its
//! leaves become `name -> text` entries. Elements in the `gml` namespace
//! (geometry, bounding boxes, feature members) never become leaves; their
//! text is dropped but non-gml descendants still count.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::error::FetchError;

const GML_PREFIX: &[u8] = b"gml";

#[derive(Default)]
struct Frame {
    name: String,
    text: String,
    leaves: Map<String, Value>,
    has_children: bool,
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn is_gml(e: &BytesStart<'_>) -> bool {
    e.name().prefix().is_some_and(|p| p.as_ref() == GML_PREFIX)
}

fn parse_error(e: impl std::fmt::Display) -> FetchError {
    FetchError::Parse(e.to_string())
}

/// Leaf maps of every feature in `xml`, in document order.
pub fn parse_features(xml: &str) -> Result<Vec<Map<String, Value>>, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // One entry per open element: true for gml elements, which get no frame.
    let mut open: Vec<bool> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut features = Vec::new();

    loop {
        match reader.read_event().map_err(parse_error)? {
            Event::Start(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.has_children = true;
                }
                let gml = is_gml(&e);
                open.push(gml);
                if !gml {
                    stack.push(Frame {
                        name: local_name(&e),
                        ..Frame::default()
                    });
                }
            }
            Event::Empty(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.has_children = true;
                    if !is_gml(&e) {
                        parent.leaves.insert(local_name(&e), Value::String(String::new()));
                    }
                }
            }
            Event::Text(t) => {
                if open.last() == Some(&false)
                    && let Some(frame) = stack.last_mut()
                {
                    frame.text.push_str(&t.unescape().map_err(parse_error)?);
                }
            }
            Event::CData(c) => {
                if open.last() == Some(&false)
                    && let Some(frame) = stack.last_mut()
                {
                    frame.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let Some(gml) = open.pop() else {
                    return Err(FetchError::Parse("unbalanced end tag".to_string()));
                };
                if gml {
                    continue;
                }
                let Some(frame) = stack.pop() else {
                    return Err(FetchError::Parse("unbalanced end tag".to_string()));
                };
                if !frame.has_children {
                    if let Some(parent) = stack.last_mut() {
                        parent.leaves.insert(frame.name, Value::String(frame.text));
                    }
                } else if !frame.leaves.is_empty() {
                    features.push(frame.leaves);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(FetchError::Parse("unexpected end of document".to_string()));
    }
    Ok(features)
}
