//! XML document reading
//!
//! Parses XML text into the namespace-aware event stream, resolving
//! prefixes with a scoped namespace context and reporting namespace
//! declarations as prefix-mapping events.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, QName};
use crate::xml::events::{EventRecorder, XmlEvent, XmlHandler};

/// Parse an XML document, feeding events into the handler.
pub fn parse_document(xml: &str, handler: &mut dyn XmlHandler) -> Result<()> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(false);

    let mut context = NamespaceContext::new();
    let mut element_stack: Vec<(QName, Vec<String>)> = Vec::new();
    let mut buf = Vec::new();

    handler.start_document()?;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                open_element(&start, &mut context, &mut element_stack, handler)?;
            }
            Ok(Event::Empty(start)) => {
                open_element(&start, &mut context, &mut element_stack, handler)?;
                close_element(&mut context, &mut element_stack, handler)?;
            }
            Ok(Event::End(_)) => {
                close_element(&mut context, &mut element_stack, handler)?;
            }
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                if !element_stack.is_empty() {
                    handler.characters(&unescaped)?;
                }
            }
            Ok(Event::CData(cdata)) => {
                let text = String::from_utf8_lossy(&cdata).into_owned();
                if !element_stack.is_empty() {
                    handler.characters(&text)?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "error parsing XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {} // Comments, processing instructions, declarations.
        }
        buf.clear();
    }

    handler.end_document()
}

/// Parse an XML document into a recorded event list.
pub fn read_events(xml: &str) -> Result<Vec<XmlEvent>> {
    let mut recorder = EventRecorder::new();
    parse_document(xml, &mut recorder)?;
    Ok(recorder.events)
}

fn open_element(
    start: &BytesStart<'_>,
    context: &mut NamespaceContext,
    element_stack: &mut Vec<(QName, Vec<String>)>,
    handler: &mut dyn XmlHandler,
) -> Result<()> {
    context.push_scope();

    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
        .to_string();

    // First pass: namespace declarations open before the element.
    let mut plain_attrs: Vec<(String, String)> = Vec::new();
    let mut declared_prefixes: Vec<String> = Vec::new();
    for attr_result in start.attributes() {
        let attr = attr_result
            .map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {}", e)))?
            .into_owned();

        if key == "xmlns" {
            context.declare("", value.clone());
            declared_prefixes.push(String::new());
            handler.start_prefix_mapping("", &value)?;
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            context.declare(prefix, value.clone());
            declared_prefixes.push(prefix.to_string());
            handler.start_prefix_mapping(prefix, &value)?;
        } else {
            plain_attrs.push((key, value));
        }
    }

    // Second pass: resolve names now that this element's declarations
    // are in scope.
    let name = context.resolve(&raw_name, true)?;
    let mut attributes = Vec::with_capacity(plain_attrs.len());
    for (key, value) in plain_attrs {
        attributes.push((context.resolve(&key, false)?, value));
    }

    handler.start_element(&name, &attributes)?;
    element_stack.push((name, declared_prefixes));
    Ok(())
}

fn close_element(
    context: &mut NamespaceContext,
    element_stack: &mut Vec<(QName, Vec<String>)>,
    handler: &mut dyn XmlHandler,
) -> Result<()> {
    let (name, declared_prefixes) = element_stack
        .pop()
        .ok_or_else(|| Error::Xml("unbalanced end tag".to_string()))?;

    handler.end_element(&name)?;
    for prefix in declared_prefixes.iter().rev() {
        handler.end_prefix_mapping(prefix)?;
    }
    context.pop_scope();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_simple_document() {
        let events = read_events("<root><a>hi</a></root>").unwrap();
        assert_eq!(
            events,
            vec![
                XmlEvent::StartDocument,
                XmlEvent::StartElement {
                    name: QName::local("root"),
                    attributes: vec![],
                },
                XmlEvent::StartElement {
                    name: QName::local("a"),
                    attributes: vec![],
                },
                XmlEvent::Characters("hi".to_string()),
                XmlEvent::EndElement {
                    name: QName::local("a")
                },
                XmlEvent::EndElement {
                    name: QName::local("root")
                },
                XmlEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn test_namespace_resolution() {
        let events =
            read_events(r#"<p:root xmlns:p="urn:test" p:attr="v"/>"#).unwrap();

        assert!(events.contains(&XmlEvent::StartPrefixMapping {
            prefix: "p".to_string(),
            namespace: "urn:test".to_string(),
        }));
        assert!(events.contains(&XmlEvent::StartElement {
            name: QName::namespaced("urn:test", "root"),
            attributes: vec![(QName::namespaced("urn:test", "attr"), "v".to_string())],
        }));
        assert!(events.contains(&XmlEvent::EndPrefixMapping {
            prefix: "p".to_string(),
        }));
    }

    #[test]
    fn test_default_namespace_applies_to_elements_only() {
        let events = read_events(r#"<root xmlns="urn:d" id="1"/>"#).unwrap();
        assert!(events.contains(&XmlEvent::StartElement {
            name: QName::namespaced("urn:d", "root"),
            attributes: vec![(QName::local("id"), "1".to_string())],
        }));
    }

    #[test]
    fn test_empty_element_emits_both_tags() {
        let events = read_events("<root><leaf/></root>").unwrap();
        let starts = events
            .iter()
            .filter(|e| matches!(e, XmlEvent::StartElement { .. }))
            .count();
        let ends = events
            .iter()
            .filter(|e| matches!(e, XmlEvent::EndElement { .. }))
            .count();
        assert_eq!(starts, 2);
        assert_eq!(ends, 2);
    }

    #[test]
    fn test_malformed_document_fails() {
        assert!(read_events("<root><a></root>").is_err());
    }
}
