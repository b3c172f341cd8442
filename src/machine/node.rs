//! State machine nodes
//!
//! Nodes live in an arena owned by the [`StateMachine`]; edges are arena
//! indices, which lets recursive schemas form cycles without reference
//! cycles. ELEMENT nodes are shared whenever the same element QName is
//! referenced from multiple positions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::machine::generator::StateMachineGenerator;
use crate::namespaces::QName;
use crate::schema::components::{AnyElement, Occurs};
use crate::schema::SchemaCollection;
use crate::scope::ResolvedAttribute;
use crate::simple::info::SimpleTypeInfo;
use crate::walker::SchemaWalker;

/// Index of a state in the machine's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// The raw arena index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Payload of an ELEMENT state
#[derive(Debug, Clone)]
pub struct ElementState {
    /// Element qualified name
    pub qname: QName,
    /// Canonical type information
    pub type_info: Arc<SimpleTypeInfo>,
    /// Attribute closure in declaration order
    pub attributes: Vec<ResolvedAttribute>,
    /// Whether `xsi:nil="true"` is permitted
    pub nillable: bool,
    /// Default value
    pub default_value: Option<String>,
    /// Fixed value
    pub fixed_value: Option<String>,
}

/// The kind of a state machine node
#[derive(Debug, Clone)]
pub enum StateKind {
    /// An element, matched against start tags
    Element(ElementState),
    /// An element wildcard
    Any(AnyElement),
    /// A substitution group: one member per occurrence
    SubstitutionGroup,
    /// A sequence group: children in edge order
    Sequence,
    /// A choice group: one branch per occurrence
    Choice,
    /// An all group: children in any order
    All,
}

/// One vertex of the compiled state graph
#[derive(Debug, Clone)]
pub struct StateMachineNode {
    /// Node kind and payload
    pub kind: StateKind,
    /// Occurrence bounds at the node's position in the grammar
    pub occurs: Occurs,
    /// Ordered outgoing edges; order is authoritative for matching
    pub next: Vec<StateId>,
}

impl StateMachineNode {
    /// The element payload, for ELEMENT nodes
    pub fn element(&self) -> Option<&ElementState> {
        match &self.kind {
            StateKind::Element(state) => Some(state),
            _ => None,
        }
    }

    /// True for group-like nodes (sequence, choice, all, substitution)
    pub fn is_group(&self) -> bool {
        matches!(
            self.kind,
            StateKind::Sequence | StateKind::Choice | StateKind::All | StateKind::SubstitutionGroup
        )
    }

    /// A short label for diagnostics
    pub fn label(&self) -> String {
        match &self.kind {
            StateKind::Element(state) => format!("element {}", state.qname),
            StateKind::Any(_) => "any".to_string(),
            StateKind::SubstitutionGroup => "substitutionGroup".to_string(),
            StateKind::Sequence => "sequence".to_string(),
            StateKind::Choice => "choice".to_string(),
            StateKind::All => "all".to_string(),
        }
    }
}

/// The compiled, immutable state graph for one root element
#[derive(Debug)]
pub struct StateMachine {
    pub(crate) nodes: Vec<StateMachineNode>,
    pub(crate) start: StateId,
    pub(crate) elements: HashMap<QName, StateId>,
}

impl StateMachine {
    /// Compile the state machine for a root element of a schema collection
    pub fn compile(collection: &SchemaCollection, root: &QName) -> Result<Arc<StateMachine>> {
        let mut walker = SchemaWalker::new(collection);
        let mut generator = StateMachineGenerator::new();
        walker.walk(root, &mut generator)?;
        Ok(Arc::new(generator.finish()?))
    }

    /// The node behind a state id
    pub fn node(&self, id: StateId) -> &StateMachineNode {
        &self.nodes[id.0]
    }

    /// The start node (one per root element)
    pub fn start(&self) -> StateId {
        self.start
    }

    /// Look up the shared ELEMENT node for a QName
    pub fn element_by_qname(&self, name: &QName) -> Option<StateId> {
        self.elements.get(name).copied()
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the machine holds no states
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
