//! Per-document structures
//!
//! The document tree ([`DocumentNode`]) maps state machine nodes to their
//! concrete occurrences in one parse; the path ([`PathNode`]) is the
//! ordered walk through that tree. Both are owned and recycled by the
//! [`NodePool`]; their identity is valid only within a single parse.

pub mod document;
pub mod path;
pub mod pool;

pub use document::{DocId, DocumentNode, UserContent};
pub use path::{Direction, PathId, PathNode};
pub use pool::NodePool;
