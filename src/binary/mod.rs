//! Binary codec interface
//!
//! The write/read primitives the transducer drives. The traits are the
//! collaborator surface; [`ByteBufferEncoder`] and [`ByteBufferDecoder`]
//! are the in-repo implementation: zigzag varints for integers,
//! little-endian floats, length-prefixed bytes and strings, and counted
//! blocks with a zero terminator for arrays and maps.

pub mod decoder;
pub mod encoder;

pub use decoder::{BinaryDecoder, ByteBufferDecoder};
pub use encoder::{BinaryEncoder, ByteBufferEncoder};
