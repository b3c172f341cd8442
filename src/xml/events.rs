//! XML events and handlers
//!
//! The event vocabulary mirrors a namespace-aware streaming parser:
//! document boundaries, prefix mappings, elements with resolved QNames
//! and attributes, and character data.

use crate::error::Result;
use crate::namespaces::QName;

/// One namespace-aware XML event
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    /// Document start
    StartDocument,
    /// A namespace prefix comes into scope ("" for the default namespace)
    StartPrefixMapping {
        /// The prefix
        prefix: String,
        /// The namespace URI
        namespace: String,
    },
    /// An element starts; attribute names are resolved
    StartElement {
        /// Element qualified name
        name: QName,
        /// Attributes in document order
        attributes: Vec<(QName, String)>,
    },
    /// Character data
    Characters(String),
    /// An element ends
    EndElement {
        /// Element qualified name
        name: QName,
    },
    /// A namespace prefix goes out of scope
    EndPrefixMapping {
        /// The prefix
        prefix: String,
    },
    /// Document end
    EndDocument,
}

impl XmlEvent {
    /// Replay this event into a handler
    pub fn dispatch(&self, handler: &mut dyn XmlHandler) -> Result<()> {
        match self {
            XmlEvent::StartDocument => handler.start_document(),
            XmlEvent::StartPrefixMapping { prefix, namespace } => {
                handler.start_prefix_mapping(prefix, namespace)
            }
            XmlEvent::StartElement { name, attributes } => {
                handler.start_element(name, attributes)
            }
            XmlEvent::Characters(text) => handler.characters(text),
            XmlEvent::EndElement { name } => handler.end_element(name),
            XmlEvent::EndPrefixMapping { prefix } => handler.end_prefix_mapping(prefix),
            XmlEvent::EndDocument => handler.end_document(),
        }
    }
}

/// A namespace-aware XML event sink.
///
/// All methods default to no-ops so implementations override what they
/// consume.
#[allow(unused_variables)]
pub trait XmlHandler {
    /// Document start
    fn start_document(&mut self) -> Result<()> {
        Ok(())
    }

    /// A prefix mapping opens ("" is the default namespace)
    fn start_prefix_mapping(&mut self, prefix: &str, namespace: &str) -> Result<()> {
        Ok(())
    }

    /// An element starts
    fn start_element(&mut self, name: &QName, attributes: &[(QName, String)]) -> Result<()> {
        Ok(())
    }

    /// Character data
    fn characters(&mut self, text: &str) -> Result<()> {
        Ok(())
    }

    /// An element ends
    fn end_element(&mut self, name: &QName) -> Result<()> {
        Ok(())
    }

    /// A prefix mapping closes
    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
        Ok(())
    }

    /// Document end
    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Records every event it receives, for buffering and replay
#[derive(Debug, Default)]
pub struct EventRecorder {
    /// The recorded events in arrival order
    pub events: Vec<XmlEvent>,
}

impl EventRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay the recorded events into another handler
    pub fn replay(&self, handler: &mut dyn XmlHandler) -> Result<()> {
        for event in &self.events {
            event.dispatch(handler)?;
        }
        Ok(())
    }

    /// The recorded element/characters events, ignoring document and
    /// prefix bookkeeping. Useful for structural comparison in tests.
    pub fn structural_events(&self) -> Vec<&XmlEvent> {
        self.events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    XmlEvent::StartElement { .. }
                        | XmlEvent::EndElement { .. }
                        | XmlEvent::Characters(_)
                )
            })
            .collect()
    }
}

impl XmlHandler for EventRecorder {
    fn start_document(&mut self) -> Result<()> {
        self.events.push(XmlEvent::StartDocument);
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, namespace: &str) -> Result<()> {
        self.events.push(XmlEvent::StartPrefixMapping {
            prefix: prefix.to_string(),
            namespace: namespace.to_string(),
        });
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &[(QName, String)]) -> Result<()> {
        self.events.push(XmlEvent::StartElement {
            name: name.clone(),
            attributes: attributes.to_vec(),
        });
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.events.push(XmlEvent::Characters(text.to_string()));
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        self.events.push(XmlEvent::EndElement { name: name.clone() });
        Ok(())
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
        self.events.push(XmlEvent::EndPrefixMapping {
            prefix: prefix.to_string(),
        });
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.events.push(XmlEvent::EndDocument);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_replay() {
        let mut recorder = EventRecorder::new();
        recorder.start_document().unwrap();
        recorder
            .start_element(&QName::local("root"), &[])
            .unwrap();
        recorder.characters("hi").unwrap();
        recorder.end_element(&QName::local("root")).unwrap();
        recorder.end_document().unwrap();

        let mut copy = EventRecorder::new();
        recorder.replay(&mut copy).unwrap();
        assert_eq!(recorder.events, copy.events);
    }

    #[test]
    fn test_structural_events_filter() {
        let mut recorder = EventRecorder::new();
        recorder.start_document().unwrap();
        recorder.start_prefix_mapping("p", "urn:x").unwrap();
        recorder
            .start_element(&QName::local("root"), &[])
            .unwrap();
        recorder.end_element(&QName::local("root")).unwrap();
        recorder.end_document().unwrap();

        assert_eq!(recorder.structural_events().len(), 2);
    }
}
