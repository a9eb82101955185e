use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::core::ProvodkaError;

/// An owned XML element tree.
///
/// Namespace prefixes are stripped from element and attribute names while
/// building, so lookups use bare local names regardless of which prefix (or
/// none) a given exporter chose — the FNS and CommerceML files in the wild
/// disagree on this constantly. The reader honors the encoding declared in
/// the prolog; УПД bodies are typically windows-1251.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

fn parse_err(e: impl std::fmt::Display) -> ProvodkaError {
    ProvodkaError::Parsing(format!("XML error: {e}"))
}

/// Build an [`XmlNode`] tree from raw file bytes.
pub fn parse_xml_bytes(bytes: &[u8]) -> Result<XmlNode, ProvodkaError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(parse_err)? {
            Event::Start(ref e) => {
                let node = node_from_tag(&reader, e)?;
                stack.push(node);
            }
            Event::Empty(ref e) => {
                let node = node_from_tag(&reader, e)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(ref e) => {
                if let Some(top) = stack.last_mut() {
                    let decoded = reader.decoder().decode(e.as_ref()).map_err(parse_err)?;
                    let unescaped = quick_xml::escape::unescape(&decoded).map_err(parse_err)?;
                    top.text.push_str(unescaped.trim());
                }
            }
            Event::CData(ref e) => {
                if let Some(top) = stack.last_mut() {
                    let decoded = reader.decoder().decode(e.as_ref()).map_err(parse_err)?;
                    top.text.push_str(decoded.trim());
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| parse_err("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| parse_err("document has no root element"))
}

fn node_from_tag<R>(reader: &Reader<R>, e: &BytesStart<'_>) -> Result<XmlNode, ProvodkaError> {
    let decoder = reader.decoder();
    let name = decoder
        .decode(e.local_name().as_ref())
        .map_err(parse_err)?
        .into_owned();

    let mut attributes = Vec::new();
    for attr in e.attributes().flatten() {
        let key = decoder
            .decode(attr.key.local_name().as_ref())
            .map_err(parse_err)?
            .into_owned();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(parse_err)?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlNode {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> Result<(), ProvodkaError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    } else {
        return Err(parse_err("multiple root elements"));
    }
    Ok(())
}

impl XmlNode {
    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Non-empty attribute value, whitespace-trimmed.
    pub fn attr_nonempty(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Element text if it is non-empty after trimming.
    pub fn text(&self) -> Option<&str> {
        let t = self.text.trim();
        if t.is_empty() { None } else { Some(t) }
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name, in document order.
    pub fn children_named<'n>(&self, name: &'n str) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant with the given name, depth-first.
    pub fn descendant(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given name, depth-first.
    pub fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.descendants_named(name, out);
        }
    }

    /// Resolve a slash-separated path with ElementTree `.//A/B` semantics:
    /// the first segment is searched anywhere below this node, the remaining
    /// segments as nested children. Every candidate for the first segment is
    /// tried until one resolves the whole path.
    pub fn find(&self, path: &str) -> Option<&XmlNode> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (first, rest) = segments.split_first()?;

        let mut candidates = Vec::new();
        self.descendants_named(first, &mut candidates);
        for candidate in candidates {
            if let Some(found) = resolve_children(candidate, rest) {
                return Some(found);
            }
        }
        None
    }

    /// Evaluate an ordered list of fallback paths and return the first match.
    /// This is how schema-version variance is handled: adding a new variant
    /// means appending a path, not another branch.
    pub fn find_first<'a>(&'a self, paths: &[&str]) -> Option<&'a XmlNode> {
        paths.iter().find_map(|p| self.find(p))
    }
}

fn resolve_children<'a>(node: &'a XmlNode, segments: &[&str]) -> Option<&'a XmlNode> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(node);
    };
    for child in node.children_named(first) {
        if let Some(found) = resolve_children(child, rest) {
            return Some(found);
        }
    }
    None
}

/// Safe text extraction from an optional node.
pub fn safe_text(node: Option<&XmlNode>) -> Option<&str> {
    node.and_then(XmlNode::text)
}
