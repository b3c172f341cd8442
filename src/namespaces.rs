//! XML namespace handling
//!
//! This module provides qualified names (QNames), scoped namespace prefix
//! mappings for document parsing, and the prefix allocator used when
//! binary content reintroduces namespaces on the way back to XML.

use std::fmt;

use crate::error::{Error, Result};

/// XSD namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace (`xsi:` attributes)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Qualified name (QName) - combination of namespace URI and local name.
///
/// An empty namespace is equivalent to an absent one; both normalize
/// to `None` so pairwise equality behaves as the XML data model requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<String>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName, normalizing an empty namespace to none
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        let namespace = namespace.map(|s| s.into()).filter(|s| !s.is_empty());
        Self {
            namespace,
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        QName::new(Some(namespace), local_name)
    }

    /// Create an XSD built-in type QName
    pub fn xsd(local_name: impl Into<String>) -> Self {
        QName::namespaced(XSD_NAMESPACE, local_name)
    }

    /// Namespace URI, treating absence as the empty string
    pub fn namespace_or_empty(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }

    /// Parse a `{namespace}local` (Clark notation) string
    pub fn from_clark(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix('{') {
            let (ns, local) = rest
                .split_once('}')
                .ok_or_else(|| Error::Xml(format!("malformed expanded name: '{}'", s)))?;
            if local.is_empty() {
                return Err(Error::Xml(format!("empty local name in '{}'", s)));
            }
            Ok(QName::namespaced(ns, local))
        } else if s.is_empty() {
            Err(Error::Xml("empty qualified name".to_string()))
        } else {
            Ok(QName::local(s))
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Scoped namespace context for resolving prefixes while reading a document.
///
/// Each element pushes a scope; declarations land in the innermost scope
/// and resolution searches from innermost to outermost.
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    // (prefix, namespace) pairs; empty prefix is the default namespace.
    scopes: Vec<Vec<(String, String)>>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Open a new scope (one per element)
    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Close the innermost scope, returning its declared prefixes
    pub fn pop_scope(&mut self) -> Vec<String> {
        self.scopes
            .pop()
            .map(|decls| decls.into_iter().map(|(p, _)| p).collect())
            .unwrap_or_default()
    }

    /// Declare a prefix in the innermost scope ("" for the default namespace)
    pub fn declare(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        if self.scopes.is_empty() {
            self.scopes.push(Vec::new());
        }
        let scope = self.scopes.last_mut().unwrap();
        scope.push((prefix.into(), namespace.into()));
    }

    /// Resolve a prefix to its namespace ("" for the default namespace)
    pub fn namespace_for(&self, prefix: &str) -> Option<&str> {
        for scope in self.scopes.iter().rev() {
            for (p, ns) in scope.iter().rev() {
                if p == prefix {
                    return if ns.is_empty() { None } else { Some(ns.as_str()) };
                }
            }
        }
        match prefix {
            "xml" => Some(XML_NAMESPACE),
            "xmlns" => Some(XMLNS_NAMESPACE),
            _ => None,
        }
    }

    /// Resolve a `prefix:local` (or bare) name to a QName.
    ///
    /// Unprefixed names take the default namespace when `use_default` is
    /// set (element names) and no namespace otherwise (attribute names).
    pub fn resolve(&self, prefixed_name: &str, use_default: bool) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .namespace_for(prefix)
                .ok_or_else(|| Error::Xml(format!("unknown namespace prefix: '{}'", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else if use_default {
            Ok(QName::new(self.namespace_for(""), prefixed_name))
        } else {
            Ok(QName::local(prefixed_name))
        }
    }
}

/// Allocates `ns0, ns1, ...` prefixes for namespaces the binary stream
/// reintroduces while reading. Fresh per document.
#[derive(Debug, Default)]
pub struct PrefixAllocator {
    next: usize,
}

impl PrefixAllocator {
    /// Create a new allocator starting at `ns0`
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next unused prefix
    pub fn allocate(&mut self) -> String {
        let prefix = format!("ns{}", self.next);
        self.next += 1;
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace.as_deref(), Some("http://example.com"));
        assert_eq!(qname.local_name, "element");
    }

    #[test]
    fn test_qname_empty_namespace_is_absent() {
        let qname = QName::new(Some(""), "element");
        assert_eq!(qname, QName::local("element"));
    }

    #[test]
    fn test_qname_display() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");

        let qname_local = QName::local("element");
        assert_eq!(qname_local.to_string(), "element");
    }

    #[test]
    fn test_qname_from_clark() {
        let qname = QName::from_clark("{urn:a}x").unwrap();
        assert_eq!(qname, QName::namespaced("urn:a", "x"));

        let bare = QName::from_clark("x").unwrap();
        assert_eq!(bare, QName::local("x"));

        assert!(QName::from_clark("{urn:a").is_err());
        assert!(QName::from_clark("").is_err());
    }

    #[test]
    fn test_scoped_resolution() {
        let mut ctx = NamespaceContext::new();
        ctx.push_scope();
        ctx.declare("a", "urn:outer");
        ctx.push_scope();
        ctx.declare("a", "urn:inner");

        assert_eq!(ctx.namespace_for("a"), Some("urn:inner"));
        ctx.pop_scope();
        assert_eq!(ctx.namespace_for("a"), Some("urn:outer"));
    }

    #[test]
    fn test_resolve_default_namespace() {
        let mut ctx = NamespaceContext::new();
        ctx.push_scope();
        ctx.declare("", "urn:default");

        let elem = ctx.resolve("child", true).unwrap();
        assert_eq!(elem, QName::namespaced("urn:default", "child"));

        // Attributes never take the default namespace.
        let attr = ctx.resolve("id", false).unwrap();
        assert_eq!(attr, QName::local("id"));
    }

    #[test]
    fn test_resolve_unknown_prefix() {
        let ctx = NamespaceContext::new();
        assert!(ctx.resolve("missing:x", true).is_err());
    }

    #[test]
    fn test_xml_prefix_is_predeclared() {
        let ctx = NamespaceContext::new();
        let qname = ctx.resolve("xml:lang", false).unwrap();
        assert_eq!(qname.namespace.as_deref(), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_prefix_allocator() {
        let mut alloc = PrefixAllocator::new();
        assert_eq!(alloc.allocate(), "ns0");
        assert_eq!(alloc.allocate(), "ns1");
    }
}
