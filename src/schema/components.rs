//! XSD schema components
//!
//! Particles, element and attribute declarations, model groups, wildcards
//! and type definitions. Components are immutable once placed in a
//! [`crate::schema::SchemaCollection`]; construction is by chained builder
//! methods.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#components

use std::sync::Arc;

use crate::namespaces::QName;
use crate::simple::facets::FacetKind;

/// Occurrence bounds of a grammar slot (minOccurs, maxOccurs).
/// An unbounded maximum is None.
///
/// The path finder treats these as a budget: a slot that has matched
/// `count` occurrences may take another while [`Occurs::admits_another`]
/// holds, and may be left behind once [`Occurs::satisfied_by`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self::new(1, Some(1))
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self::new(0, Some(1))
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self::new(0, None)
    }

    /// Whether a slot already matched `count` times may match once more
    pub fn admits_another(&self, count: u32) -> bool {
        self.max.map_or(true, |max| count < max)
    }

    /// Whether `count` occurrences meet the declared minimum
    pub fn satisfied_by(&self, count: u32) -> bool {
        count >= self.min
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Attribute use constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUse {
    /// The attribute must be present
    Required,
    /// The attribute may be present
    #[default]
    Optional,
    /// The attribute must not be present
    Prohibited,
}

/// An attribute declaration
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// Attribute qualified name
    pub name: QName,
    /// Named simple type, if referenced by QName
    pub type_name: Option<QName>,
    /// Anonymous simple type, if declared inline
    pub inline_type: Option<Arc<SimpleTypeDef>>,
    /// Use constraint
    pub use_: AttributeUse,
    /// Default value
    pub default_value: Option<String>,
    /// Fixed value
    pub fixed_value: Option<String>,
}

impl AttributeDecl {
    /// Create an optional attribute declaration
    pub fn new(name: QName) -> Self {
        Self {
            name,
            type_name: None,
            inline_type: None,
            use_: AttributeUse::Optional,
            default_value: None,
            fixed_value: None,
        }
    }

    /// Set the named type
    pub fn with_type_name(mut self, type_name: QName) -> Self {
        self.type_name = Some(type_name);
        self
    }

    /// Set an anonymous inline type
    pub fn with_inline_type(mut self, def: SimpleTypeDef) -> Self {
        self.inline_type = Some(Arc::new(def));
        self
    }

    /// Set the use constraint
    pub fn with_use(mut self, use_: AttributeUse) -> Self {
        self.use_ = use_;
        self
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Set the fixed value
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed_value = Some(value.into());
        self
    }
}

/// One entry in a complex type's attribute list
#[derive(Debug, Clone)]
pub enum AttrUse {
    /// A local attribute declaration
    Decl(Arc<AttributeDecl>),
    /// A reference to a global attribute declaration
    Ref(QName),
    /// A reference to an attribute group
    GroupRef(QName),
}

/// A named attribute group definition
#[derive(Debug, Clone)]
pub struct AttributeGroupDef {
    /// Group qualified name
    pub name: QName,
    /// Members, in declaration order; group refs expand recursively
    pub members: Vec<AttrUse>,
}

impl AttributeGroupDef {
    /// Create an attribute group
    pub fn new(name: QName, members: Vec<AttrUse>) -> Self {
        Self { name, members }
    }
}

/// Wildcard namespace constraint
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceConstraint {
    /// `##any`: any namespace
    #[default]
    Any,
    /// `##other`: any namespace other than the target namespace
    Other(Option<String>),
    /// An explicit namespace list; None entries stand for `##local`
    List(Vec<Option<String>>),
}

impl NamespaceConstraint {
    /// Check whether a namespace satisfies this constraint
    pub fn admits(&self, namespace: Option<&str>) -> bool {
        match self {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => namespace != target.as_deref(),
            NamespaceConstraint::List(allowed) => allowed
                .iter()
                .any(|entry| entry.as_deref() == namespace),
        }
    }
}

/// Wildcard processing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessContents {
    /// No validation of matched content; the transcoder drops it
    Skip,
    /// Validate when a declaration is available
    #[default]
    Lax,
    /// Matched content must be declared
    Strict,
}

/// An `xsd:any` element wildcard
#[derive(Debug, Clone, Default)]
pub struct AnyElement {
    /// Allowed namespaces
    pub namespace: NamespaceConstraint,
    /// Processing mode
    pub process_contents: ProcessContents,
}

impl AnyElement {
    /// Wildcard admitting anything, skipped by the transcoder
    pub fn skip_any() -> Self {
        Self {
            namespace: NamespaceConstraint::Any,
            process_contents: ProcessContents::Skip,
        }
    }
}

/// An `xsd:anyAttribute` wildcard
#[derive(Debug, Clone, Default)]
pub struct AnyAttribute {
    /// Allowed namespaces
    pub namespace: NamespaceConstraint,
    /// Processing mode
    pub process_contents: ProcessContents,
}

impl AnyAttribute {
    /// Merge two wildcards across an extension chain: the child keeps its
    /// processing mode while the namespace sets union.
    pub fn merged_with(&self, base: &AnyAttribute) -> AnyAttribute {
        let namespace = match (&self.namespace, &base.namespace) {
            (NamespaceConstraint::Any, _) | (_, NamespaceConstraint::Any) => {
                NamespaceConstraint::Any
            }
            (NamespaceConstraint::List(a), NamespaceConstraint::List(b)) => {
                let mut merged = a.clone();
                for ns in b {
                    if !merged.contains(ns) {
                        merged.push(ns.clone());
                    }
                }
                NamespaceConstraint::List(merged)
            }
            (other, _) => other.clone(),
        };
        AnyAttribute {
            namespace,
            process_contents: self.process_contents,
        }
    }
}

/// An element inside a particle: a local declaration or a global reference
#[derive(Debug, Clone)]
pub enum ElementRef {
    /// A local element declaration
    Decl(Arc<ElementDecl>),
    /// A reference to a global element declaration
    Ref(QName),
}

/// Model group compositor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Children in declaration order
    Sequence,
    /// Exactly one child per occurrence
    Choice,
    /// Children in any order
    All,
}

/// The term of a particle
#[derive(Debug, Clone)]
pub enum Term {
    /// An element declaration or reference
    Element(ElementRef),
    /// An inline model group
    Group(GroupKind, Vec<Particle>),
    /// A reference to a named model group
    GroupRef(QName),
    /// An element wildcard
    Any(AnyElement),
}

/// A positioned schema fragment with occurrence bounds
#[derive(Debug, Clone)]
pub struct Particle {
    /// Occurrence bounds
    pub occurs: Occurs,
    /// The fragment
    pub term: Term,
}

impl Particle {
    /// Create a particle with the given bounds
    pub fn new(occurs: Occurs, term: Term) -> Self {
        Self { occurs, term }
    }

    /// Create a particle occurring exactly once
    pub fn once(term: Term) -> Self {
        Self::new(Occurs::once(), term)
    }

    /// A sequence group particle
    pub fn sequence(occurs: Occurs, children: Vec<Particle>) -> Self {
        Self::new(occurs, Term::Group(GroupKind::Sequence, children))
    }

    /// A choice group particle
    pub fn choice(occurs: Occurs, children: Vec<Particle>) -> Self {
        Self::new(occurs, Term::Group(GroupKind::Choice, children))
    }

    /// An all group particle
    pub fn all(occurs: Occurs, children: Vec<Particle>) -> Self {
        Self::new(occurs, Term::Group(GroupKind::All, children))
    }

    /// A particle holding a local element declaration
    pub fn element(occurs: Occurs, decl: ElementDecl) -> Self {
        Self::new(occurs, Term::Element(ElementRef::Decl(Arc::new(decl))))
    }

    /// A particle referencing a global element
    pub fn element_ref(occurs: Occurs, name: QName) -> Self {
        Self::new(occurs, Term::Element(ElementRef::Ref(name)))
    }
}

/// An element declaration
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// Element qualified name
    pub name: QName,
    /// Named type, if referenced by QName
    pub type_name: Option<QName>,
    /// Anonymous type, if declared inline
    pub inline_type: Option<Arc<TypeDef>>,
    /// Whether `xsi:nil="true"` is permitted on instances
    pub nillable: bool,
    /// Default value
    pub default_value: Option<String>,
    /// Fixed value
    pub fixed_value: Option<String>,
    /// Head of the substitution group this element belongs to
    pub substitution_group: Option<QName>,
    /// Whether the element is abstract (only substitutes may appear)
    pub is_abstract: bool,
}

impl ElementDecl {
    /// Create an element declaration
    pub fn new(name: QName) -> Self {
        Self {
            name,
            type_name: None,
            inline_type: None,
            nillable: false,
            default_value: None,
            fixed_value: None,
            substitution_group: None,
            is_abstract: false,
        }
    }

    /// Set the named type
    pub fn with_type_name(mut self, type_name: QName) -> Self {
        self.type_name = Some(type_name);
        self
    }

    /// Set an anonymous inline type
    pub fn with_inline_type(mut self, def: TypeDef) -> Self {
        self.inline_type = Some(Arc::new(def));
        self
    }

    /// Mark the element nillable
    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Set the fixed value
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed_value = Some(value.into());
        self
    }

    /// Place the element in a substitution group
    pub fn with_substitution_group(mut self, head: QName) -> Self {
        self.substitution_group = Some(head);
        self
    }

    /// Mark the element abstract
    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

/// A named model group definition
#[derive(Debug, Clone)]
pub struct GroupDef {
    /// Group qualified name
    pub name: QName,
    /// Compositor kind
    pub kind: GroupKind,
    /// Child particles
    pub particles: Vec<Particle>,
}

impl GroupDef {
    /// Create a named model group
    pub fn new(name: QName, kind: GroupKind, particles: Vec<Particle>) -> Self {
        Self { name, kind, particles }
    }
}

/// A facet declared on a simple-type restriction
#[derive(Debug, Clone)]
pub struct FacetDecl {
    /// Facet kind
    pub kind: FacetKind,
    /// Lexical facet value
    pub value: String,
    /// Whether derived types may not relax this facet
    pub fixed: bool,
}

impl FacetDecl {
    /// Create a non-fixed facet declaration
    pub fn new(kind: FacetKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            fixed: false,
        }
    }
}

/// Base of a simple-type derivation step
#[derive(Debug, Clone)]
pub enum SimpleBase {
    /// A named type
    Named(QName),
    /// An anonymous inline type
    Inline(Arc<SimpleTypeDef>),
}

/// Derivation of a simple type
#[derive(Debug, Clone)]
pub enum SimpleDerivation {
    /// `xsd:restriction`
    Restriction {
        /// The restricted base
        base: SimpleBase,
        /// Declared facets
        facets: Vec<FacetDecl>,
    },
    /// `xsd:list`
    List {
        /// The item type
        item: SimpleBase,
    },
    /// `xsd:union`
    Union {
        /// The member types, in declaration order
        members: Vec<SimpleBase>,
    },
}

/// A simple type definition
#[derive(Debug, Clone)]
pub struct SimpleTypeDef {
    /// Type name; None for anonymous types
    pub name: Option<QName>,
    /// Derivation
    pub derivation: SimpleDerivation,
}

impl SimpleTypeDef {
    /// An anonymous restriction of a named base
    pub fn restriction(base: QName, facets: Vec<FacetDecl>) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::Restriction {
                base: SimpleBase::Named(base),
                facets,
            },
        }
    }

    /// An anonymous list of a named item type
    pub fn list(item: QName) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::List {
                item: SimpleBase::Named(item),
            },
        }
    }

    /// An anonymous union of named member types
    pub fn union(members: Vec<QName>) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::Union {
                members: members.into_iter().map(SimpleBase::Named).collect(),
            },
        }
    }

    /// Name the type
    pub fn named(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }
}

/// Content derivation of a complex type
#[derive(Debug, Clone)]
pub enum ComplexDerivation {
    /// Content declared directly on the type (no contentModel wrapper)
    Direct {
        /// Child particle
        particle: Option<Particle>,
        /// Declared attributes
        attributes: Vec<AttrUse>,
        /// Attribute wildcard
        any_attribute: Option<AnyAttribute>,
    },
    /// `complexContent/extension`
    ComplexExtension {
        /// The extended base type
        base: QName,
        /// Particle appended after the base particle
        particle: Option<Particle>,
        /// Attributes added to the base's
        attributes: Vec<AttrUse>,
        /// Attribute wildcard merged with the base's
        any_attribute: Option<AnyAttribute>,
    },
    /// `complexContent/restriction`
    ComplexRestriction {
        /// The restricted base type
        base: QName,
        /// Replacement particle (no particle inheritance)
        particle: Option<Particle>,
        /// Attribute overrides
        attributes: Vec<AttrUse>,
        /// Replacement attribute wildcard
        any_attribute: Option<AnyAttribute>,
    },
    /// `simpleContent/extension`
    SimpleExtension {
        /// The extended base type
        base: QName,
        /// Attributes added to the base's
        attributes: Vec<AttrUse>,
        /// Attribute wildcard
        any_attribute: Option<AnyAttribute>,
    },
    /// `simpleContent/restriction`
    SimpleRestriction {
        /// The restricted base type
        base: QName,
        /// Facets narrowing the base's simple content
        facets: Vec<FacetDecl>,
        /// Attribute overrides
        attributes: Vec<AttrUse>,
        /// Replacement attribute wildcard
        any_attribute: Option<AnyAttribute>,
    },
}

/// A complex type definition
#[derive(Debug, Clone)]
pub struct ComplexTypeDef {
    /// Type name; None for anonymous types
    pub name: Option<QName>,
    /// Whether text may interleave with child elements
    pub mixed: bool,
    /// Content derivation
    pub derivation: ComplexDerivation,
}

impl ComplexTypeDef {
    /// An anonymous complex type with direct content
    pub fn direct(particle: Option<Particle>, attributes: Vec<AttrUse>) -> Self {
        Self {
            name: None,
            mixed: false,
            derivation: ComplexDerivation::Direct {
                particle,
                attributes,
                any_attribute: None,
            },
        }
    }

    /// An empty complex type (no children, no attributes)
    pub fn empty() -> Self {
        Self::direct(None, Vec::new())
    }

    /// Name the type
    pub fn named(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Mark the type mixed
    pub fn mixed(mut self) -> Self {
        self.mixed = true;
        self
    }

    /// Set the derivation
    pub fn with_derivation(mut self, derivation: ComplexDerivation) -> Self {
        self.derivation = derivation;
        self
    }
}

/// A type definition: simple or complex
#[derive(Debug, Clone)]
pub enum TypeDef {
    /// A simple type
    Simple(SimpleTypeDef),
    /// A complex type
    Complex(ComplexTypeDef),
}

impl TypeDef {
    /// The type's name, if it has one
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeDef::Simple(def) => def.name.as_ref(),
            TypeDef::Complex(def) => def.name.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_presets() {
        assert_eq!(Occurs::once(), Occurs::new(1, Some(1)));
        assert_eq!(Occurs::optional(), Occurs::new(0, Some(1)));
        assert_eq!(Occurs::zero_or_more(), Occurs::new(0, None));
        assert_eq!(Occurs::default(), Occurs::once());
    }

    #[test]
    fn test_occurs_budget() {
        let occurs = Occurs::new(2, Some(5));
        assert!(!occurs.satisfied_by(1));
        assert!(occurs.satisfied_by(2));
        assert!(occurs.admits_another(4));
        assert!(!occurs.admits_another(5));

        let unbounded = Occurs::zero_or_more();
        assert!(unbounded.admits_another(1000));
        assert!(unbounded.satisfied_by(0));
    }

    #[test]
    fn test_namespace_constraint() {
        assert!(NamespaceConstraint::Any.admits(Some("urn:x")));
        assert!(NamespaceConstraint::Any.admits(None));

        let other = NamespaceConstraint::Other(Some("urn:target".into()));
        assert!(other.admits(Some("urn:x")));
        assert!(!other.admits(Some("urn:target")));

        let list = NamespaceConstraint::List(vec![Some("urn:a".into()), None]);
        assert!(list.admits(Some("urn:a")));
        assert!(list.admits(None));
        assert!(!list.admits(Some("urn:b")));
    }

    #[test]
    fn test_any_attribute_merge() {
        let child = AnyAttribute {
            namespace: NamespaceConstraint::List(vec![Some("urn:a".into())]),
            process_contents: ProcessContents::Skip,
        };
        let base = AnyAttribute {
            namespace: NamespaceConstraint::List(vec![Some("urn:b".into())]),
            process_contents: ProcessContents::Strict,
        };

        let merged = child.merged_with(&base);
        assert_eq!(merged.process_contents, ProcessContents::Skip);
        match merged.namespace {
            NamespaceConstraint::List(ns) => {
                assert_eq!(ns.len(), 2);
            }
            other => panic!("expected list constraint, got {:?}", other),
        }
    }

    #[test]
    fn test_element_builder() {
        let elem = ElementDecl::new(QName::local("item"))
            .with_type_name(QName::xsd("string"))
            .nillable()
            .with_default("hello");

        assert_eq!(elem.name.local_name, "item");
        assert!(elem.nillable);
        assert_eq!(elem.default_value.as_deref(), Some("hello"));
        assert!(elem.fixed_value.is_none());
    }

    #[test]
    fn test_particle_constructors() {
        let seq = Particle::sequence(
            Occurs::once(),
            vec![Particle::element(
                Occurs::optional(),
                ElementDecl::new(QName::local("a")),
            )],
        );

        match seq.term {
            Term::Group(GroupKind::Sequence, ref children) => assert_eq!(children.len(), 1),
            ref other => panic!("expected sequence, got {:?}", other),
        }
    }
}
