//! Error types for xmlrec
//!
//! This module defines all error types used throughout the crate.
//! The schema walker, state machine generator and simple-type engine are
//! strict; the path finder consumes `UnknownElement`/`NoPathMatches` errors
//! internally to drive its backtracking search.

use std::fmt;
use thiserror::Error;

use crate::namespaces::QName;

/// Result type alias using the xmlrec Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlrec operations
#[derive(Error, Debug)]
pub enum Error {
    /// A simple type restricts a base type this crate does not know
    #[error("unknown base type: {0}")]
    UnknownBaseType(QName),

    /// A restriction was applied to a type that cannot carry it
    #[error("invalid restriction: {0}")]
    InvalidRestriction(String),

    /// A literal fell outside the bounds of its facets
    #[error("facet violation: {0}")]
    FacetViolation(#[from] FacetViolation),

    /// A type, element, attribute, or group reference has no target
    #[error("unresolved {kind} reference: {name}")]
    UnresolvedReference {
        /// Kind of reference (type, element, attribute, group, ...)
        kind: &'static str,
        /// The referenced qualified name
        name: QName,
    },

    /// An element QName is absent from the state machine
    #[error("unknown element: {0}")]
    UnknownElement(QName),

    /// All admissible paths through the state machine were exhausted
    #[error("no path matches the document: {0}")]
    NoPathMatches(String),

    /// `xsi:nil="true"` appeared on a non-nillable element
    #[error("element {0} is not nillable")]
    NilabilityConflict(QName),

    /// Literal conversion failed for every union member at write time
    #[error("unwritable value for {element}: {reason}")]
    UnwritableValue {
        /// Element that carried the value
        element: QName,
        /// Why no union member accepted it
        reason: String,
    },

    /// Literal conversion failed at read time
    #[error("unreadable value: {0}")]
    UnreadableValue(String),

    /// A record schema arrived without the required XSD linkage
    #[error("record schema is not linked to an XML schema: {0}")]
    UnlinkedSchema(String),

    /// The record schema does not structurally match the document tree
    #[error("record schema mismatch: {0}")]
    RecordSchemaMismatch(String),

    /// Invalid transcoder configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid schema component construction
    #[error("schema error: {0}")]
    Schema(String),

    /// Resource limit exceeded
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Error from the binary codec collaborator
    #[error("codec error: {0}")]
    Codec(String),

    /// XML parsing or serialization error
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Shorthand for an unresolved reference error
    pub fn unresolved(kind: &'static str, name: QName) -> Self {
        Error::UnresolvedReference { kind, name }
    }

    /// True when the error only signals that the current search branch is
    /// dead, so the path finder may consume it and try another branch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UnknownElement(_) | Error::NoPathMatches(_))
    }
}

/// A literal fell outside the bounds declared by a facet
#[derive(Debug, Clone)]
pub struct FacetViolation {
    /// The offending literal (after whitespace normalization)
    pub value: String,
    /// Name of the violated facet (length, pattern, maxInclusive, ...)
    pub facet: &'static str,
    /// The bound the literal violated, if one applies
    pub bound: Option<String>,
    /// The type the facet belongs to, if named
    pub type_name: Option<QName>,
}

impl FacetViolation {
    /// Create a new facet violation for a literal
    pub fn new(facet: &'static str, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            facet,
            bound: None,
            type_name: None,
        }
    }

    /// Set the violated bound
    pub fn with_bound(mut self, bound: impl Into<String>) -> Self {
        self.bound = Some(bound.into());
        self
    }

    /// Set the owning type name
    pub fn with_type_name(mut self, name: QName) -> Self {
        self.type_name = Some(name);
        self
    }
}

impl fmt::Display for FacetViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value {:?} violates facet '{}'", self.value, self.facet)?;

        if let Some(ref bound) = self.bound {
            write!(f, " (bound: {})", bound)?;
        }

        if let Some(ref name) = self.type_name {
            write!(f, " of type {}", name)?;
        }

        Ok(())
    }
}

impl std::error::Error for FacetViolation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_violation_display() {
        let err = FacetViolation::new("maxInclusive", "300")
            .with_bound("255")
            .with_type_name(QName::local("shade"));

        let msg = format!("{}", err);
        assert!(msg.contains("maxInclusive"));
        assert!(msg.contains("300"));
        assert!(msg.contains("255"));
        assert!(msg.contains("shade"));
    }

    #[test]
    fn test_facet_violation_conversion() {
        let violation = FacetViolation::new("pattern", "abc");
        let err: Error = violation.into();
        assert!(matches!(err, Error::FacetViolation(_)));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::UnknownElement(QName::local("x")).is_retryable());
        assert!(Error::NoPathMatches("end".into()).is_retryable());
        assert!(!Error::UnlinkedSchema("no property".into()).is_retryable());
    }

    #[test]
    fn test_unresolved_reference_display() {
        let err = Error::unresolved("group", QName::namespaced("urn:x", "g"));
        assert!(format!("{}", err).contains("group"));
        assert!(format!("{}", err).contains("g"));
    }
}
