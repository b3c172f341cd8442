//! Canonical simple-type information
//!
//! [`SimpleTypeInfo`] is the form scope computation reduces every XSD
//! type expression to, and the only type description the transducer
//! consumes: a base type plus merged facets (atomic), a list, a union,
//! or an opaque complex marker.

use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::simple::base::BaseSimpleType;
use crate::simple::facets::{FacetSet, WhiteSpace};

/// A canonicalized simple-type expression
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleTypeInfo {
    /// An atomic value with its effective facets
    Atomic {
        /// The base simple type
        base: BaseSimpleType,
        /// Facets merged down the derivation chain
        facets: FacetSet,
        /// Closest user-recognized ancestor type, if registered
        user_recognized: Option<QName>,
    },
    /// A whitespace-separated list of items
    List {
        /// The item type
        item: Box<SimpleTypeInfo>,
        /// Facets applying to the list as a whole
        facets: FacetSet,
    },
    /// A value matching one of several member types
    Union {
        /// Member types in declaration order
        members: Vec<SimpleTypeInfo>,
        /// Facets applying to the union as a whole
        facets: FacetSet,
    },
    /// Complex content; carries only mixedness
    Complex {
        /// Whether text may interleave with child elements
        mixed: bool,
    },
}

impl SimpleTypeInfo {
    /// An atomic info without extra facets
    pub fn atomic(base: BaseSimpleType) -> Self {
        SimpleTypeInfo::Atomic {
            base,
            facets: FacetSet::new(),
            user_recognized: None,
        }
    }

    /// A complex info
    pub fn complex(mixed: bool) -> Self {
        SimpleTypeInfo::Complex { mixed }
    }

    /// True for atomic, list, and union kinds
    pub fn is_simple(&self) -> bool {
        !matches!(self, SimpleTypeInfo::Complex { .. })
    }

    /// True when instances may interleave text with child elements
    pub fn is_mixed(&self) -> bool {
        matches!(self, SimpleTypeInfo::Complex { mixed: true })
    }

    /// The facets attached at this level, if the kind carries any
    pub fn facets(&self) -> Option<&FacetSet> {
        match self {
            SimpleTypeInfo::Atomic { facets, .. }
            | SimpleTypeInfo::List { facets, .. }
            | SimpleTypeInfo::Union { facets, .. } => Some(facets),
            SimpleTypeInfo::Complex { .. } => None,
        }
    }

    /// The user-recognized ancestor type, if any
    pub fn user_recognized(&self) -> Option<&QName> {
        match self {
            SimpleTypeInfo::Atomic {
                user_recognized, ..
            } => user_recognized.as_ref(),
            _ => None,
        }
    }

    /// Record the closest user-recognized ancestor type
    pub fn set_user_recognized(&mut self, name: Option<QName>) {
        if let SimpleTypeInfo::Atomic {
            user_recognized, ..
        } = self
        {
            if name.is_some() {
                *user_recognized = name;
            }
        }
    }

    /// The effective whitespace mode for literals of this type.
    ///
    /// Falls back to XSD defaults when no facet declares one: preserve
    /// for string-family atomics, collapse everywhere else.
    pub fn white_space(&self) -> WhiteSpace {
        if let Some(ws) = self.facets().and_then(|f| f.white_space()) {
            return ws;
        }
        match self {
            SimpleTypeInfo::Atomic { base, .. } if base.is_string_like() => WhiteSpace::Preserve,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Produce a restriction of this type with the merged facet set.
    ///
    /// The merged facets replace this type's own; the structure (atomic
    /// base, list item, union members) and the user-recognized marker are
    /// preserved. Restricting complex content is an error.
    pub fn restrict(&self, merged: FacetSet) -> Result<SimpleTypeInfo> {
        match self {
            SimpleTypeInfo::Atomic {
                base,
                user_recognized,
                ..
            } => Ok(SimpleTypeInfo::Atomic {
                base: *base,
                facets: merged,
                user_recognized: user_recognized.clone(),
            }),
            SimpleTypeInfo::List { item, .. } => Ok(SimpleTypeInfo::List {
                item: item.clone(),
                facets: merged,
            }),
            SimpleTypeInfo::Union { members, .. } => Ok(SimpleTypeInfo::Union {
                members: members.clone(),
                facets: merged,
            }),
            SimpleTypeInfo::Complex { .. } => Err(Error::InvalidRestriction(
                "complex content cannot be restricted as a simple type".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple::facets::FacetKind;

    #[test]
    fn test_restrict_atomic_preserves_base() {
        let info = SimpleTypeInfo::Atomic {
            base: BaseSimpleType::Int,
            facets: FacetSet::new().with(FacetKind::MaxInclusive, "100"),
            user_recognized: Some(QName::local("myInt")),
        };

        let merged = FacetSet::new().with(FacetKind::MaxInclusive, "10");
        let restricted = info.restrict(merged).unwrap();

        match restricted {
            SimpleTypeInfo::Atomic {
                base,
                facets,
                user_recognized,
            } => {
                assert_eq!(base, BaseSimpleType::Int);
                assert_eq!(facets.get(FacetKind::MaxInclusive).unwrap().value, "10");
                assert_eq!(user_recognized, Some(QName::local("myInt")));
            }
            other => panic!("expected atomic, got {:?}", other),
        }
    }

    #[test]
    fn test_restrict_complex_fails() {
        let info = SimpleTypeInfo::complex(false);
        let err = info.restrict(FacetSet::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidRestriction(_)));
    }

    #[test]
    fn test_white_space_defaults() {
        let string_info = SimpleTypeInfo::atomic(BaseSimpleType::String);
        assert_eq!(string_info.white_space(), WhiteSpace::Preserve);

        let int_info = SimpleTypeInfo::atomic(BaseSimpleType::Int);
        assert_eq!(int_info.white_space(), WhiteSpace::Collapse);
    }

    #[test]
    fn test_white_space_facet_wins() {
        let info = SimpleTypeInfo::Atomic {
            base: BaseSimpleType::String,
            facets: FacetSet::new().with(FacetKind::WhiteSpace, "collapse"),
            user_recognized: None,
        };
        assert_eq!(info.white_space(), WhiteSpace::Collapse);
    }

    #[test]
    fn test_is_simple() {
        assert!(SimpleTypeInfo::atomic(BaseSimpleType::Boolean).is_simple());
        assert!(!SimpleTypeInfo::complex(true).is_simple());
        assert!(SimpleTypeInfo::complex(true).is_mixed());
    }
}
