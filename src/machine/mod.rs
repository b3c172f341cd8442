//! State machine over an XSD
//!
//! A reusable directed graph of typed states compiled from walker events.
//! The graph is immutable once built and safely shareable across threads;
//! per-document structures reference its nodes by arena index.

pub mod generator;
pub mod node;

pub use generator::StateMachineGenerator;
pub use node::{ElementState, StateId, StateKind, StateMachine, StateMachineNode};
