//! Path nodes
//!
//! A doubly-linked walk through the document tree. Each node privately
//! carries the undo information for the document mutation its creation
//! performed, so recycling a path tail restores the tree exactly.

use crate::doc::document::DocId;
use crate::machine::node::StateId;

/// Index of a path node in the pool's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(pub(crate) usize);

impl PathId {
    /// The raw arena index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The direction a path node moves through the document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Descend into a child state
    Child,
    /// Re-enter the same state as a new iteration
    Sibling,
    /// Ascend to the parent state
    Parent,
    /// Character content within the current element
    Content,
}

// Reverses this node's effect on the document tree when the path tail is
// recycled during backtracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DocUndo {
    #[default]
    None,
    // The step created the document node; releasing cascades.
    Created(DocId),
    // The step re-entered an existing node; restore its iteration.
    Reentered { doc: DocId, prev_iteration: u32 },
    // The step flagged character content on the element.
    Content { doc: DocId, prev_received: bool },
}

/// One ordered step of a concrete traversal
#[derive(Debug, Clone)]
pub struct PathNode {
    /// The movement this step performs
    pub direction: Direction,
    /// The state arrived at
    pub state: StateId,
    /// The document node arrived at, when one exists
    pub doc: Option<DocId>,
    /// Iteration of the state along the current path
    pub iteration: u32,
    /// Iteration recorded on the document node (equal when `doc` is set)
    pub doc_iteration: u32,
    /// Outgoing edge index leading to the next path node (-1 when unset)
    pub next_state_index: i32,
    /// Previous node in the walk
    pub prev: Option<PathId>,
    /// Next node in the walk
    pub next: Option<PathId>,
    pub(crate) doc_undo: DocUndo,
    // Sequence position on a document node before this step advanced it.
    pub(crate) seq_undo: Option<(DocId, usize)>,
}

impl PathNode {
    pub(crate) fn new(direction: Direction, state: StateId, prev: Option<PathId>) -> Self {
        Self {
            direction,
            state,
            doc: None,
            iteration: 0,
            doc_iteration: 0,
            next_state_index: -1,
            prev,
            next: None,
            doc_undo: DocUndo::None,
            seq_undo: None,
        }
    }

    pub(crate) fn rebind(&mut self, direction: Direction, state: StateId, prev: Option<PathId>) {
        self.direction = direction;
        self.state = state;
        self.doc = None;
        self.iteration = 0;
        self.doc_iteration = 0;
        self.next_state_index = -1;
        self.prev = prev;
        self.next = None;
        self.doc_undo = DocUndo::None;
        self.seq_undo = None;
    }
}
