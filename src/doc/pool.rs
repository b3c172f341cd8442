//! Node pool
//!
//! Owns every [`DocumentNode`] and [`PathNode`] of one transcode and
//! recycles them through free-lists, so backtracking does not allocate.
//! Releasing a path node recycles the tail of its chain and reverses
//! each step's document mutation in reverse order; releasing a document
//! node cascades to its descendants. The pool is not thread-safe; one
//! transcode runs against one pool.

use crate::doc::document::{DocId, DocumentNode};
use crate::doc::path::{Direction, DocUndo, PathId, PathNode};
use crate::machine::node::StateId;

/// Arena + free-lists for document and path nodes
#[derive(Debug, Default)]
pub struct NodePool {
    docs: Vec<DocumentNode>,
    paths: Vec<PathNode>,
    free_docs: Vec<DocId>,
    free_paths: Vec<PathId>,
}

impl NodePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a document node bound to `state` under `parent`
    pub fn acquire_document(&mut self, state: StateId, parent: Option<DocId>) -> DocId {
        match self.free_docs.pop() {
            Some(id) => {
                self.docs[id.0].rebind(state, parent);
                id
            }
            None => {
                let id = DocId(self.docs.len());
                self.docs.push(DocumentNode::new(state, parent));
                id
            }
        }
    }

    /// Acquire a path node moving `direction` into `state` after `prev`.
    /// The predecessor's forward link is updated.
    pub fn acquire_path(
        &mut self,
        direction: Direction,
        state: StateId,
        prev: Option<PathId>,
    ) -> PathId {
        let id = match self.free_paths.pop() {
            Some(id) => {
                self.paths[id.0].rebind(direction, state, prev);
                id
            }
            None => {
                let id = PathId(self.paths.len());
                self.paths.push(PathNode::new(direction, state, prev));
                id
            }
        };
        if let Some(prev_id) = prev {
            self.paths[prev_id.0].next = Some(id);
        }
        id
    }

    /// Immutable access to a document node
    pub fn doc(&self, id: DocId) -> &DocumentNode {
        &self.docs[id.0]
    }

    /// Mutable access to a document node
    pub fn doc_mut(&mut self, id: DocId) -> &mut DocumentNode {
        &mut self.docs[id.0]
    }

    /// Immutable access to a path node
    pub fn path(&self, id: PathId) -> &PathNode {
        &self.paths[id.0]
    }

    /// Mutable access to a path node
    pub fn path_mut(&mut self, id: PathId) -> &mut PathNode {
        &mut self.paths[id.0]
    }

    /// Release `from` and every path node after it, reversing document
    /// mutations newest-first so the tree returns to its prior shape.
    pub fn release_path_tail(&mut self, from: PathId) {
        let predecessor = self.paths[from.0].prev;

        let mut chain = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.paths[id.0].next;
        }

        for &id in chain.iter().rev() {
            self.undo_step(id);
            self.paths[id.0].next = None;
            self.paths[id.0].prev = None;
            self.free_paths.push(id);
        }

        // Unlink the released tail from its predecessor.
        if let Some(prev) = predecessor {
            self.paths[prev.0].next = None;
            self.paths[prev.0].next_state_index = -1;
        }
    }

    fn undo_step(&mut self, id: PathId) {
        let (doc_undo, seq_undo) = {
            let node = &self.paths[id.0];
            (node.doc_undo, node.seq_undo)
        };

        match doc_undo {
            DocUndo::None => {}
            DocUndo::Created(doc) => self.release_document(doc),
            DocUndo::Reentered {
                doc,
                prev_iteration,
            } => {
                self.docs[doc.0].iteration = prev_iteration;
            }
            DocUndo::Content { doc, prev_received } => {
                self.docs[doc.0].received_content = prev_received;
            }
        }

        if let Some((doc, prev_pos)) = seq_undo {
            self.docs[doc.0].sequence_position = prev_pos;
        }
    }

    /// Release a document node and all of its descendants, unlinking it
    /// from its parent's child map.
    pub fn release_document(&mut self, id: DocId) {
        if let Some(parent) = self.docs[id.0].parent {
            self.docs[parent.0].remove_child(id);
        }
        self.release_document_subtree(id);
    }

    fn release_document_subtree(&mut self, id: DocId) {
        let children: Vec<DocId> = self.docs[id.0].all_children().collect();
        for child in children {
            self.release_document_subtree(child);
        }
        let state = self.docs[id.0].state;
        self.docs[id.0].rebind(state, None);
        self.free_docs.push(id);
    }

    /// Drop every node; the pool must be cleared (or dropped) between
    /// transcodes.
    pub fn clear(&mut self) {
        self.docs.clear();
        self.paths.clear();
        self.free_docs.clear();
        self.free_paths.clear();
    }

    /// Number of document nodes currently in use
    pub fn live_documents(&self) -> usize {
        self.docs.len() - self.free_docs.len()
    }

    /// Number of path nodes currently in use
    pub fn live_paths(&self) -> usize {
        self.paths.len() - self.free_paths.len()
    }
}
