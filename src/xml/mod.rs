//! XML event interface
//!
//! The namespace-aware start/characters/end event stream the path finder
//! and transducer consume and produce, plus quick-xml adapters between
//! that stream and XML text.

pub mod events;
pub mod reader;
pub mod writer;

pub use events::{EventRecorder, XmlEvent, XmlHandler};
pub use reader::{parse_document, read_events};
pub use writer::XmlTextWriter;
