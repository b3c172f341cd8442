//! Record schemas
//!
//! The record-oriented schema model that drives the binary layout: JSON
//! de/serialization, the `xmlSchemas` linkage property tying a record
//! schema back to its XSD, and the default generator deriving a record
//! schema from a schema collection.

pub mod generator;
pub mod schema;

pub use generator::generate_record_schema;
pub use schema::{Field, RecordSchema, SchemaKind, XmlSchemasProperty};
