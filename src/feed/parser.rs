use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted before the document is rejected.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },
    #[error("Unclosed element <{0}>")]
    Unclosed(String),
    #[error("Document has no root element")]
    NoRoot,
    #[error("Nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

/// One element of a parsed XML document.
///
/// Names keep their namespace prefix (`media:content`), attributes keep
/// document order, and text plus CDATA content directly inside the element is
/// concatenated into `text`. Repeated children stay as separate entries, so a
/// tag that appears once or many times is read the same way through
/// [`XmlNode::children_named`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    /// First child with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given qualified name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text content of the first child named `name`, if that child exists.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}

/// Parses raw bytes into an element tree rooted at the document element.
///
/// The character encoding comes from a byte order mark or the
/// `encoding="..."` declaration, defaulting to UTF-8.
pub fn parse_document(bytes: &[u8]) -> Result<XmlNode, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| XmlError::Syntax {
                position: reader.buffer_position(),
                message: e.to_string(),
            })?;
        // Switches encoding once the XML declaration has been read
        let decoder = reader.decoder();

        match event {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::TooDeep);
                }
                stack.push(node_from_start(&start, decoder));
            }
            Event::Empty(start) => {
                let node = node_from_start(&start, decoder);
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                // quick-xml checks that end names match their start tags
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = match text.unescape() {
                        Ok(s) => s.into_owned(),
                        // Undeclared HTML entities (&nbsp; and friends) are
                        // common in feeds; keep the raw text.
                        Err(_) => decode_lossy(decoder, &text),
                    };
                    push_text(current, &decoded);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    push_text(current, &decode_lossy(decoder, &data));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            // carry nothing the feed model needs.
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::Unclosed(open.name.clone()));
    }

    root.ok_or(XmlError::NoRoot)
}

/// Decodes `bytes` in the document's encoding, replacing what does not fit.
fn decode_lossy(decoder: Decoder, bytes: &[u8]) -> String {
    match decoder.decode(bytes) {
        Ok(s) => s.into_owned(),
        Err(_) => {
            let (text, _) = decoder.encoding().decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

fn node_from_start(start: &BytesStart<'_>, decoder: Decoder) -> XmlNode {
    let name = decode_lossy(decoder, start.name().as_ref());
    let attributes = start
        .attributes()
        .filter_map(Result::ok)
        .map(|attr| {
            let key = decode_lossy(decoder, attr.key.as_ref());
            let value = match attr.decode_and_unescape_value(decoder) {
                Ok(v) => v.into_owned(),
                Err(_) => decode_lossy(decoder, &attr.value),
            };
            (key, value)
        })
        .collect();

    XmlNode {
        name,
        attributes,
        ..XmlNode::default()
    }
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            // Only the first top-level element is the document; stray
            // siblings after it are ignored.
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

fn push_text(node: &mut XmlNode, text: &str) {
    if text.is_empty() {
        return;
    }
    if !node.text.is_empty() {
        node.text.push(' ');
    }
    node.text.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_structure() {
        let xml = br#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Tech</title>
    <item><title>One</title></item>
    <item><title>Two</title></item>
  </channel>
</rss>"#;
        let root = parse_document(xml).unwrap();
        assert_eq!(root.name, "rss");
        assert_eq!(root.attr("version"), Some("2.0"));

        let channel = root.child("channel").unwrap();
        assert_eq!(channel.child_text("title"), Some("Tech"));
        let titles: Vec<_> = channel
            .children_named("item")
            .filter_map(|i| i.child_text("title"))
            .collect();
        assert_eq!(titles, vec!["One", "Two"]);
    }

    #[test]
    fn test_cdata_and_entities() {
        let xml = br#"<item>
  <description><![CDATA[<p>Hello <img src="a.png"></p>]]></description>
  <title>Fish &amp; Chips</title>
  <summary>&lt;b&gt;bold&lt;/b&gt;</summary>
</item>"#;
        let item = parse_document(xml).unwrap();
        assert_eq!(
            item.child_text("description"),
            Some(r#"<p>Hello <img src="a.png"></p>"#)
        );
        assert_eq!(item.child_text("title"), Some("Fish & Chips"));
        assert_eq!(item.child_text("summary"), Some("<b>bold</b>"));
    }

    #[test]
    fn test_namespaced_empty_elements_keep_attributes() {
        let xml = br#"<item xmlns:media="http://search.yahoo.com/mrss/">
  <media:content url="https://img.example.com/x.jpg" medium="image"/>
  <enclosure url="https://img.example.com/e.jpg" type="image/jpeg" />
</item>"#;
        let item = parse_document(xml).unwrap();
        assert_eq!(
            item.child("media:content").and_then(|m| m.attr("url")),
            Some("https://img.example.com/x.jpg")
        );
        assert_eq!(
            item.child("enclosure").and_then(|m| m.attr("type")),
            Some("image/jpeg")
        );
    }

    #[test]
    fn test_undeclared_entity_keeps_raw_text() {
        let item = parse_document(b"<t>a&nbsp;b</t>").unwrap();
        assert_eq!(item.text, "a&nbsp;b");
    }

    #[test]
    fn test_declared_latin1_encoding_is_decoded() {
        let mut xml = br#"<?xml version="1.0" encoding="ISO-8859-1"?>
<rss><channel><item><title>Caf"#
            .to_vec();
        xml.push(0xE9);
        xml.extend_from_slice(br#"</title><link href="/men"#);
        xml.push(0xFC);
        xml.extend_from_slice(b"\"/><description><![CDATA[d");
        xml.push(0xE9);
        xml.extend_from_slice(b"j");
        xml.push(0xE0);
        xml.extend_from_slice(b"]]></description></item></channel></rss>");

        let root = parse_document(&xml).unwrap();
        let item = root.child("channel").and_then(|c| c.child("item")).unwrap();
        assert_eq!(item.child_text("title"), Some("Café"));
        assert_eq!(item.child("link").and_then(|l| l.attr("href")), Some("/menü"));
        assert_eq!(item.child_text("description"), Some("déjà"));
    }

    #[test]
    fn test_utf8_without_declaration() {
        let root = parse_document("<t>naïve</t>".as_bytes()).unwrap();
        assert_eq!(root.text, "naïve");
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(parse_document(b"<not valid xml").is_err());
        assert!(parse_document(b"<rss><channel></rss>").is_err());
        assert!(parse_document(b"<rss><channel>").is_err());
    }

    #[test]
    fn test_empty_document_has_no_root() {
        assert!(matches!(parse_document(b""), Err(XmlError::NoRoot)));
        assert!(matches!(
            parse_document(b"<?xml version=\"1.0\"?>"),
            Err(XmlError::NoRoot)
        ));
    }
}
