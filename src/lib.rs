//! # xmlrec
//!
//! A schema-aware transcoder between XML documents conforming to an XML
//! Schema (XSD) and a compact record-oriented binary serialization, and
//! back.
//!
//! The XSD supplies element grammar, cardinality, and simple-type
//! facets; a structurally matching record schema supplies the binary
//! layout; a compiled state machine joins them so that arbitrary XSD
//! constructs (sequences, choices, all groups, substitution groups,
//! unbounded repetition, wildcards, mixed content, nilability,
//! defaults and fixed values, simple-type unions and lists) stream
//! without buffering the whole document.
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmlrec::machine::StateMachine;
//! use xmlrec::record::generate_record_schema;
//! use xmlrec::transducer::{decode_to_events, encode_events};
//! use xmlrec::xml::read_events;
//!
//! let machine = StateMachine::compile(&collection, &root_tag)?;
//! let schema = generate_record_schema(&collection, &root_tag, None)?;
//!
//! let events = read_events(xml)?;
//! let (bytes, _reports) = encode_events(&machine, &schema, events)?;
//! let replayed = decode_to_events(&machine, &schema, bytes)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and namespaces
pub mod names;
pub mod namespaces;

// Collaborator surfaces
pub mod binary;
pub mod config;
pub mod schema;
pub mod xml;

// Simple types and scoping
pub mod scope;
pub mod simple;

// Schema traversal and the compiled state graph
pub mod machine;
pub mod walker;

// Per-document structures and matching
pub mod doc;
pub mod pathfinder;

// Record schemas and the transducer
pub mod applier;
pub mod record;
pub mod transducer;

// Re-exports for convenience
pub use error::{Error, Result};
pub use namespaces::QName;

/// Version of the xmlrec crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
