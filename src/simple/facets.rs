//! XSD constraining facets
//!
//! Facet kinds, the facet set attached to every simple type, whitespace
//! normalization modes, and the merge rule used when a restriction
//! narrows its base type.
//!
//! Reference: https://www.w3.org/TR/xmlschema-2/#rf-facets

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Facet kinds constraining simple types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FacetKind {
    /// Exact value length
    Length,
    /// Minimum value length
    MinLength,
    /// Maximum value length
    MaxLength,
    /// Regular expression constraint
    Pattern,
    /// Enumerated value set
    Enumeration,
    /// White space processing
    WhiteSpace,
    /// Inclusive upper bound
    MaxInclusive,
    /// Exclusive upper bound
    MaxExclusive,
    /// Inclusive lower bound
    MinInclusive,
    /// Exclusive lower bound
    MinExclusive,
    /// Maximum number of significant digits
    TotalDigits,
    /// Maximum number of fractional digits
    FractionDigits,
}

impl FacetKind {
    /// The facet's XSD element name
    pub fn as_str(&self) -> &'static str {
        match self {
            FacetKind::Length => "length",
            FacetKind::MinLength => "minLength",
            FacetKind::MaxLength => "maxLength",
            FacetKind::Pattern => "pattern",
            FacetKind::Enumeration => "enumeration",
            FacetKind::WhiteSpace => "whiteSpace",
            FacetKind::MaxInclusive => "maxInclusive",
            FacetKind::MaxExclusive => "maxExclusive",
            FacetKind::MinInclusive => "minInclusive",
            FacetKind::MinExclusive => "minExclusive",
            FacetKind::TotalDigits => "totalDigits",
            FacetKind::FractionDigits => "fractionDigits",
        }
    }

    /// Whether a restriction may carry several facets of this kind
    pub fn is_repeatable(&self) -> bool {
        matches!(self, FacetKind::Enumeration)
    }
}

/// A single facet restriction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    /// Lexical facet value
    pub value: String,
    /// Whether derived types may not relax this facet
    pub fixed: bool,
}

impl Facet {
    /// Create a non-fixed facet
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            fixed: false,
        }
    }

    /// Create a fixed facet
    pub fn fixed(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            fixed: true,
        }
    }
}

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace, then collapse runs and trim
    Collapse,
}

impl WhiteSpace {
    /// Parse from a facet value
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "preserve" => Ok(WhiteSpace::Preserve),
            "replace" => Ok(WhiteSpace::Replace),
            "collapse" => Ok(WhiteSpace::Collapse),
            _ => Err(Error::Schema(format!(
                "invalid whiteSpace value: '{}'; must be 'preserve', 'replace', or 'collapse'",
                s
            ))),
        }
    }

    /// The facet's lexical value
    pub fn as_str(&self) -> &'static str {
        match self {
            WhiteSpace::Preserve => "preserve",
            WhiteSpace::Replace => "replace",
            WhiteSpace::Collapse => "collapse",
        }
    }

    /// Normalize a string according to this mode
    pub fn normalize(&self, s: &str) -> String {
        // XML whitespace is exactly #x20, #x9, #xD, #xA; Unicode spaces
        // stay untouched.
        const XML_WS: [char; 4] = [' ', '\t', '\r', '\n'];

        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => {
                let mut out = String::with_capacity(s.len());
                for word in s.split(&XML_WS[..]).filter(|w| !w.is_empty()) {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(word);
                }
                out
            }
        }
    }
}

/// The set of facets effective on a simple type.
///
/// Each kind holds a list of restrictions; only enumeration carries more
/// than one. The merge rule is: child restrictions override the parent's
/// for non-enumeration kinds, enumerations append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSet {
    facets: BTreeMap<FacetKind, Vec<Facet>>,
}

impl FacetSet {
    /// Create an empty facet set
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no facets are present
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Add a facet, replacing any prior one of a non-repeatable kind
    pub fn set(&mut self, kind: FacetKind, facet: Facet) {
        if kind.is_repeatable() {
            let list = self.facets.entry(kind).or_default();
            if !list.contains(&facet) {
                list.push(facet);
            }
        } else {
            self.facets.insert(kind, vec![facet]);
        }
    }

    /// Builder-style [`FacetSet::set`]
    pub fn with(mut self, kind: FacetKind, value: impl Into<String>) -> Self {
        self.set(kind, Facet::new(value));
        self
    }

    /// The single facet of a non-repeatable kind, if present
    pub fn get(&self, kind: FacetKind) -> Option<&Facet> {
        self.facets.get(&kind).and_then(|list| list.first())
    }

    /// All facets of a kind
    pub fn get_all(&self, kind: FacetKind) -> &[Facet] {
        self.facets.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The enumeration value set, if any
    pub fn enumeration(&self) -> &[Facet] {
        self.get_all(FacetKind::Enumeration)
    }

    /// The effective white space mode, if declared
    pub fn white_space(&self) -> Option<WhiteSpace> {
        self.get(FacetKind::WhiteSpace)
            .and_then(|f| WhiteSpace::parse(&f.value).ok())
    }

    /// Iterate over all (kind, facets) entries in kind order
    pub fn iter(&self) -> impl Iterator<Item = (FacetKind, &[Facet])> {
        self.facets.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Merge a child restriction over a parent's facets.
    ///
    /// Non-enumeration kinds: the child's facet replaces the parent's.
    /// Enumeration: the value lists are unioned, parent values first.
    pub fn merge(parent: &FacetSet, child: &FacetSet) -> FacetSet {
        let mut merged = parent.clone();
        for (kind, facets) in child.iter() {
            if kind.is_repeatable() {
                for facet in facets {
                    merged.set(kind, facet.clone());
                }
            } else if let Some(facet) = facets.first() {
                merged.set(kind, facet.clone());
            }
        }
        merged
    }
}
