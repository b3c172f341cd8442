//! Simple-type model and facet engine
//!
//! Classifies and canonicalizes XSD simple-type expressions into the form
//! the transducer consumes directly: a base simple type, a merged facet
//! set, and literal parse/print conversions.

pub mod base;
pub mod facets;
pub mod info;
pub mod literal;

pub use base::{builtin_info, facet_set_for, is_builtin, BaseSimpleType};
pub use facets::{Facet, FacetKind, FacetSet, WhiteSpace};
pub use info::SimpleTypeInfo;
pub use literal::{parse_literal, print_literal, Value};
