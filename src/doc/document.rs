//! Document tree nodes
//!
//! One [`DocumentNode`] tracks every occurrence of one state machine node
//! under a specific parent context: the iteration count, which outgoing
//! edges were taken per iteration, the sequence position, and the
//! record-schema decoration applied by the schema applier.

use std::collections::BTreeMap;

use crate::machine::node::StateId;
use crate::record::schema::RecordSchema;

/// Index of a document node in the pool's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(pub(crate) usize);

impl DocId {
    /// The raw arena index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Record-schema decoration set by the schema applier
#[derive(Debug, Clone)]
pub struct UserContent {
    /// The record (or map) schema matched to this element
    pub schema: RecordSchema,
    /// The member index when the containing context is a union
    pub union_index: Option<u32>,
    /// Number of annotated child records, for array sizing
    pub child_count: u32,
}

/// One instantiation of a state in a specific document
#[derive(Debug, Clone)]
pub struct DocumentNode {
    /// The state this node instantiates
    pub state: StateId,
    /// The parent document node
    pub parent: Option<DocId>,
    /// How many times this state has been (re-)entered on the current path
    pub iteration: u32,
    /// Current child edge position, for SEQUENCE states
    pub sequence_position: usize,
    /// Whether the element received character content
    pub received_content: bool,
    /// Decoration applied by the schema applier
    pub user_slot: Option<UserContent>,
    // iteration -> branch edge index -> child node
    children: BTreeMap<u32, BTreeMap<usize, DocId>>,
}

impl DocumentNode {
    pub(crate) fn new(state: StateId, parent: Option<DocId>) -> Self {
        Self {
            state,
            parent,
            iteration: 1,
            sequence_position: 0,
            received_content: false,
            user_slot: None,
            children: BTreeMap::new(),
        }
    }

    pub(crate) fn rebind(&mut self, state: StateId, parent: Option<DocId>) {
        self.state = state;
        self.parent = parent;
        self.iteration = 1;
        self.sequence_position = 0;
        self.received_content = false;
        self.user_slot = None;
        self.children.clear();
    }

    /// The child taken along `branch` during `iteration`, if any
    pub fn child_at(&self, iteration: u32, branch: usize) -> Option<DocId> {
        self.children
            .get(&iteration)
            .and_then(|branches| branches.get(&branch))
            .copied()
    }

    /// The branches taken during `iteration`, in edge order
    pub fn branches_at(&self, iteration: u32) -> impl Iterator<Item = (usize, DocId)> + '_ {
        self.children
            .get(&iteration)
            .into_iter()
            .flat_map(|branches| branches.iter().map(|(&b, &d)| (b, d)))
    }

    /// All children across iterations, in (iteration, edge) order
    pub fn all_children(&self) -> impl Iterator<Item = DocId> + '_ {
        self.children
            .values()
            .flat_map(|branches| branches.values().copied())
    }

    pub(crate) fn set_child(&mut self, iteration: u32, branch: usize, child: DocId) {
        self.children
            .entry(iteration)
            .or_default()
            .insert(branch, child);
    }

    pub(crate) fn remove_child(&mut self, child: DocId) {
        for branches in self.children.values_mut() {
            branches.retain(|_, &mut id| id != child);
        }
        self.children.retain(|_, branches| !branches.is_empty());
    }
}
