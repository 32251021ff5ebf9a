//! Small XML string helpers shared by the encoders and the argument binder.
//!
//! Grounded in the teacher's `soap::envelope` capture loop and in
//! `niveau0-soap-client-rs/soapus-runtime`'s `add_namespace_to_root` /
//! body-extraction technique (`examples/other_examples/25cce027_...-envelope.rs.rs`).

use quick_xml::events::Event;
use quick_xml::Reader;

/// Strips a namespace prefix off a qualified XML name (`"tns:Add"` -> `"Add"`).
pub fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    match s.rfind(':') {
        Some(idx) => s[idx + 1..].to_string(),
        None => s.to_string(),
    }
}

/// Plain text content of a captured `<local>...</local>` fragment, ignoring any
/// nested elements. Used for simple header values such as WS-Addressing `Action`.
pub fn element_text(captured: &str) -> String {
    let mut reader = Reader::from_str(captured);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(t)) => text.push_str(&t.unescape().unwrap_or_default()),
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    text
}

/// Text content of a named child element inside a captured fragment, used for
/// WS-Addressing's `<ReplyTo><Address>...</Address></ReplyTo>`.
pub fn nested_text(captured: &str, child_local_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(captured);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_child = false;
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if local_name(e.name().as_ref()) == child_local_name => {
                in_child = true;
            }
            Ok(Event::Text(t)) if in_child => {
                text.push_str(&t.unescape().unwrap_or_default());
            }
            Ok(Event::End(e)) if local_name(e.name().as_ref()) == child_local_name => {
                return Some(text);
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

/// Escapes the three characters that would otherwise break well-formedness when
/// spliced into generated XML text content (fault reasons, out-parameter and
/// response-header values read back off a response object).
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn is_blank(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .map(|s| s.trim().is_empty())
        .unwrap_or(false)
}

/// Adds an `xmlns="..."` declaration to the root element of a serialized XML
/// fragment. Many interoperable SOAP clients expect the body element itself to
/// carry the contract namespace rather than relying on one declared elsewhere.
pub fn add_namespace_to_root(xml: &str, namespace: &str) -> String {
    let Some(pos) = xml.find('>') else {
        return xml.to_string();
    };
    if pos > 0 && xml.as_bytes()[pos - 1] == b'/' {
        let insert_pos = pos - 1;
        format!(
            "{} xmlns=\"{}\" {}",
            &xml[..insert_pos],
            namespace,
            &xml[insert_pos..]
        )
    } else {
        format!("{} xmlns=\"{}\"{}", &xml[..pos], namespace, &xml[pos..])
    }
}

/// Strips the outermost element's tags from a serialized XML fragment, returning
/// only its inner content (used when embedding a parameter value inside a
/// hand-built wrapper element for wire compatibility).
pub fn strip_outer_element(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0i32;
    let mut content = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth > 1 {
                    content.push('<');
                    content.push_str(&local_name(e.name().as_ref()));
                    content.push('>');
                }
            }
            Ok(Event::End(e)) => {
                if depth > 1 {
                    content.push_str("</");
                    content.push_str(&local_name(e.name().as_ref()));
                    content.push('>');
                }
                depth -= 1;
                if depth <= 0 {
                    break;
                }
            }
            Ok(Event::Text(t)) => content.push_str(&t.unescape().unwrap_or_default()),
            Ok(Event::Empty(e)) => {
                if depth >= 1 {
                    content.push('<');
                    content.push_str(&local_name(e.name().as_ref()));
                    content.push_str("/>");
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix() {
        assert_eq!(local_name(b"tns:Add"), "Add");
        assert_eq!(local_name(b"Add"), "Add");
    }

    #[test]
    fn adds_namespace_to_open_tag() {
        let xml = "<Add><a>1</a></Add>";
        let out = add_namespace_to_root(xml, "http://example.com/calc");
        assert!(out.starts_with("<Add xmlns=\"http://example.com/calc\">"));
    }

    #[test]
    fn adds_namespace_to_self_closing_tag() {
        let xml = "<n/>";
        let out = add_namespace_to_root(xml, "http://example.com/calc");
        assert_eq!(out, "<n xmlns=\"http://example.com/calc\" />");
    }

    #[test]
    fn extracts_nested_text() {
        let captured = "<ReplyTo><Address>http://client/</Address></ReplyTo>";
        assert_eq!(
            nested_text(captured, "Address"),
            Some("http://client/".to_string())
        );
    }

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(escape("a & b <c> d"), "a &amp; b &lt;c&gt; d");
    }

    #[test]
    fn strips_outer_element() {
        let xml = "<AddResponse><AddResult>3</AddResult></AddResponse>";
        assert_eq!(strip_outer_element(xml), "<AddResult>3</AddResult>");
    }
}
