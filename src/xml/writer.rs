//! XML document writing
//!
//! An [`XmlHandler`] that serializes the event stream back to XML text.
//! Prefix mappings announced before an element become `xmlns` attributes
//! on it; namespaces with no in-scope prefix are declared on demand.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::xml::events::XmlHandler;

/// Serializes XML events to a text document
pub struct XmlTextWriter {
    writer: Writer<Cursor<Vec<u8>>>,
    // Mappings announced but not yet attached to an element.
    pending: Vec<(String, String)>,
    // Stack of per-element (prefix, namespace) scopes.
    scopes: Vec<Vec<(String, String)>>,
    auto_prefix: usize,
}

impl XmlTextWriter {
    /// Create a writer
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
            pending: Vec::new(),
            scopes: Vec::new(),
            auto_prefix: 0,
        }
    }

    /// The serialized document
    pub fn into_string(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| Error::Xml(format!("produced non-UTF8 output: {}", e)))
    }

    fn prefix_for(&self, namespace: &str) -> Option<&str> {
        for scope in self.scopes.iter().rev() {
            for (prefix, ns) in scope.iter().rev() {
                if ns == namespace {
                    return Some(prefix.as_str());
                }
            }
        }
        for (prefix, ns) in self.pending.iter().rev() {
            if ns == namespace {
                return Some(prefix.as_str());
            }
        }
        None
    }

    fn qualified(&mut self, name: &QName, use_default: bool) -> String {
        match &name.namespace {
            None => name.local_name.clone(),
            Some(ns) => match self.prefix_for(ns) {
                Some("") if use_default => name.local_name.clone(),
                Some("") => {
                    // Attributes cannot use the default namespace.
                    let prefix = self.declare_auto(ns.clone());
                    format!("{}:{}", prefix, name.local_name)
                }
                Some(prefix) => format!("{}:{}", prefix, name.local_name),
                None => {
                    let prefix = self.declare_auto(ns.clone());
                    format!("{}:{}", prefix, name.local_name)
                }
            },
        }
    }

    fn declare_auto(&mut self, namespace: String) -> String {
        let prefix = format!("gen{}", self.auto_prefix);
        self.auto_prefix += 1;
        self.pending.push((prefix.clone(), namespace));
        prefix
    }
}

impl Default for XmlTextWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlHandler for XmlTextWriter {
    fn start_prefix_mapping(&mut self, prefix: &str, namespace: &str) -> Result<()> {
        self.pending.push((prefix.to_string(), namespace.to_string()));
        Ok(())
    }

    fn start_element(&mut self, name: &QName, attributes: &[(QName, String)]) -> Result<()> {
        let tag_name = self.qualified(name, true);

        let mut resolved_attrs: Vec<(String, String)> = Vec::with_capacity(attributes.len());
        for (attr_name, value) in attributes {
            let key = self.qualified(attr_name, false);
            resolved_attrs.push((key, value.clone()));
        }

        let declared: Vec<(String, String)> = self.pending.drain(..).collect();

        let mut start = BytesStart::new(tag_name);
        for (prefix, namespace) in &declared {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            start.push_attribute((key.as_str(), namespace.as_str()));
        }
        for (key, value) in &resolved_attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        self.scopes.push(declared);

        self.writer
            .write_event(Event::Start(start))
            .map_err(|e| Error::Xml(format!("failed to write start tag: {}", e)))?;
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| Error::Xml(format!("failed to write text: {}", e)))
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        let tag_name = self.qualified(name, true);
        self.scopes.pop();
        self.writer
            .write_event(Event::End(BytesEnd::new(tag_name)))
            .map_err(|e| Error::Xml(format!("failed to write end tag: {}", e)))
    }
}
