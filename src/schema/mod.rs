//! Read-only XSD component model
//!
//! This module defines the schema-collection handle the transcoder
//! consumes. The XSD parser itself is a collaborator; it (or test code)
//! constructs these components programmatically and hands the finished
//! [`SchemaCollection`] to the walker.

pub mod collection;
pub mod components;

pub use collection::SchemaCollection;
pub use components::{
    AnyAttribute, AnyElement, AttrUse, AttributeDecl, AttributeGroupDef, AttributeUse,
    ComplexDerivation, ComplexTypeDef, ElementDecl, ElementRef, FacetDecl, GroupDef, GroupKind,
    NamespaceConstraint, Occurs, Particle, ProcessContents, SimpleBase, SimpleDerivation,
    SimpleTypeDef, Term, TypeDef,
};
