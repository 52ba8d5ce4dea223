use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Minimal owned XML element tree for walking Junos RPC replies.
///
/// Namespace prefixes are dropped from tag names, attributes are kept
/// as (local name, value) pairs, and text is the concatenation of the
/// element's own text nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => stack.push(Self::from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let element = Self::from_start(&e)?;
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().context("invalid XML text")?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    let data = e.into_inner();
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| anyhow!("unbalanced closing tag"))?;
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(anyhow!(
                        "XML parse error at position {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                }
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(anyhow!("unexpected end of document inside <{}>", stack[stack.len() - 1].tag));
        }
        root.ok_or_else(|| anyhow!("empty XML document"))
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Element> {
        let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.context("invalid XML attribute")?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().context("invalid XML attribute value")?;
            attributes.push((key, value.into_owned()));
        }
        Ok(Element {
            tag,
            attributes,
            ..Default::default()
        })
    }

    /// Trimmed text of this element
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given tag
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// First element with the given tag, searching self and then all
    /// descendants in document order
    pub fn find(&self, tag: &str) -> Option<&Element> {
        if self.tag == tag {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(tag))
    }

    /// Every element with the given tag, self included, in document order
    pub fn iter(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect(tag, &mut found);
        found
    }

    fn collect<'a>(&'a self, tag: &str, found: &mut Vec<&'a Element>) {
        if self.tag == tag {
            found.push(self);
        }
        for child in &self.children {
            child.collect(tag, found);
        }
    }

    /// Trimmed text of the first direct child with the given tag
    pub fn child_text(&self, tag: &str) -> Option<String> {
        self.child(tag).map(|c| c.text().to_string())
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"<?xml version="1.0"?>
<rpc-reply xmlns:junos="http://xml.juniper.net/junos/15.1R5/junos" message-id="1">
  <software-information>
    <host-name>mx1</host-name>
    <product-model>mx480</product-model>
    <junos:comment>ignored namespace</junos:comment>
    <package-information><name>junos</name></package-information>
    <package-information><name>jbase</name></package-information>
    <empty-flag/>
  </software-information>
</rpc-reply>"#;

    #[test]
    fn test_parse_and_navigate() {
        let root = Element::parse(REPLY).unwrap();
        assert_eq!(root.tag, "rpc-reply");
        assert_eq!(root.attribute("message-id"), Some("1"));

        let info = root.find("software-information").unwrap();
        assert_eq!(info.child_text("host-name").as_deref(), Some("mx1"));
        assert_eq!(info.child_text("comment").as_deref(), Some("ignored namespace"));
        assert!(info.child("empty-flag").is_some());
        assert_eq!(info.child_text("missing"), None);

        let names: Vec<_> = root
            .iter("package-information")
            .iter()
            .filter_map(|p| p.child_text("name"))
            .collect();
        assert_eq!(names, vec!["junos", "jbase"]);
    }

    #[test]
    fn test_child_is_direct_only() {
        let root = Element::parse(REPLY).unwrap();
        assert!(root.child("host-name").is_none());
        assert!(root.find("host-name").is_some());
    }

    #[test]
    fn test_unescapes_text() {
        let root = Element::parse("<a><b>x &amp; y</b></a>").unwrap();
        assert_eq!(root.child_text("b").as_deref(), Some("x & y"));
    }

    #[test]
    fn test_rejects_truncated_document() {
        assert!(Element::parse("<a><b>text</b>").is_err());
        assert!(Element::parse("").is_err());
    }
}
