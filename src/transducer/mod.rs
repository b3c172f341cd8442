//! Transducer
//!
//! Drives document → binary (writer) and binary → document (reader)
//! over the annotated path, honoring facet-defined simple-type
//! semantics, defaults and fixed values, nil handling, and mixed
//! content.

pub mod reader;
pub mod writer;

pub use reader::RecordReader;
pub use writer::RecordWriter;

use crate::applier::{MismatchReport, SchemaApplier};
use crate::binary::decoder::ByteBufferDecoder;
use crate::binary::encoder::ByteBufferEncoder;
use crate::error::Result;
use crate::machine::node::StateMachine;
use crate::pathfinder::PathFinder;
use crate::record::schema::RecordSchema;
use crate::xml::events::{EventRecorder, XmlEvent};

/// Transcode a document event stream to binary against a record schema.
/// Returns the encoded bytes and any per-element schema mismatches.
pub fn encode_events(
    machine: &StateMachine,
    schema: &RecordSchema,
    events: Vec<XmlEvent>,
) -> Result<(Vec<u8>, Vec<MismatchReport>)> {
    let mut path = PathFinder::find(machine, events)?;

    let mut applier = SchemaApplier::new(machine);
    applier.apply(&mut path, schema)?;
    let reports = applier.reports().to_vec();

    let writer = RecordWriter::new(machine, schema);
    let mut encoder = ByteBufferEncoder::new();
    writer.write(&path, &mut encoder)?;
    Ok((encoder.into_bytes(), reports))
}

/// Transcode binary back to a document event stream.
pub fn decode_to_events(
    machine: &StateMachine,
    schema: &RecordSchema,
    bytes: Vec<u8>,
) -> Result<Vec<XmlEvent>> {
    let reader = RecordReader::new(schema.clone())?;
    let mut decoder = ByteBufferDecoder::new(bytes);
    let mut recorder = EventRecorder::new();
    reader.read(machine, &mut decoder, &mut recorder)?;
    Ok(recorder.events)
}
