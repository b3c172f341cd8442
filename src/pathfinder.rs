//! Path finder
//!
//! Given the state machine and a stream of XML events, produces the chain
//! of path nodes that walks the document in order while staying consistent
//! with the state graph. Ambiguous branch points push checkpoints; a dead
//! end rewinds to the most recent checkpoint, recycles the path and
//! document nodes created after it, and tries the next admissible branch
//! in graph order.

use std::collections::HashMap;

use crate::doc::document::{DocId, UserContent};
use crate::doc::path::{Direction, DocUndo, PathId};
use crate::doc::pool::NodePool;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::machine::node::{StateId, StateKind, StateMachine};
use crate::namespaces::{QName, XSI_NAMESPACE};
use crate::xml::events::{XmlEvent, XmlHandler};

/// The finished walk of one document
#[derive(Debug)]
pub struct DocumentPath {
    /// Pool owning every node referenced by the walk
    pub pool: NodePool,
    /// Head of the path chain (direction CHILD, no predecessor)
    pub head: PathId,
    /// Root document node
    pub root: DocId,
    /// The buffered document events, for transducer replay
    pub events: Vec<XmlEvent>,
}

impl DocumentPath {
    /// The record-schema decoration of a document node, if applied
    pub fn user_content(&self, doc: DocId) -> Option<&UserContent> {
        self.pool.doc(doc).user_slot.as_ref()
    }
}

// One movement of a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    // Enter the machine's start state (document root only).
    Root,
    // Descend along the given outgoing edge of the current state.
    Child { edge: usize },
    // Re-enter the current state as a new iteration.
    Sibling,
    // Ascend to the parent state.
    Parent,
}

type Candidate = Vec<Step>;

// A branch point: the position before the chosen candidate was applied,
// plus the candidates not yet tried.
struct Checkpoint {
    event_index: usize,
    cursor: Option<PathId>,
    current_doc: Option<DocId>,
    element_closed: bool,
    depth: usize,
    alternatives: Vec<Candidate>,
}

// Virtual position within one state during candidate search. Real frames
// mirror live document nodes; virtual frames stand for groups entered
// during the search only.
#[derive(Debug, Clone)]
struct Frame {
    state: StateId,
    doc: Option<DocId>,
    iteration: u32,
    seq_pos: usize,
    // Edge occurrence bumps made by this search branch.
    virtual_counts: Vec<(usize, u32)>,
    // Guards against iterating a group twice without consuming anything.
    just_iterated: bool,
    // Suppresses the descend that duplicates the element-sibling move.
    skip_edge: Option<usize>,
}

impl Frame {
    fn real(pool: &NodePool, doc: DocId) -> Self {
        let node = pool.doc(doc);
        Frame {
            state: node.state,
            doc: Some(doc),
            iteration: node.iteration,
            seq_pos: node.sequence_position,
            virtual_counts: Vec::new(),
            just_iterated: false,
            skip_edge: None,
        }
    }

    fn virtual_entry(state: StateId, existing: Option<(DocId, u32)>) -> Self {
        Frame {
            state,
            doc: existing.map(|(d, _)| d),
            iteration: existing.map(|(_, it)| it + 1).unwrap_or(1),
            seq_pos: 0,
            virtual_counts: Vec::new(),
            just_iterated: false,
            skip_edge: None,
        }
    }

    fn bump(&mut self, edge: usize, delta: i32) {
        if let Some(entry) = self.virtual_counts.iter_mut().find(|(e, _)| *e == edge) {
            entry.1 = (entry.1 as i32 + delta).max(0) as u32;
        } else if delta > 0 {
            self.virtual_counts.push((edge, delta as u32));
        }
    }
}

/// Streaming matcher with backtracking over the state machine
pub struct PathFinder<'a> {
    machine: &'a StateMachine,
    limits: Limits,
    pool: NodePool,
    events: Vec<XmlEvent>,
    next_event: usize,
    head: Option<PathId>,
    root_doc: Option<DocId>,
    cursor: Option<PathId>,
    current_doc: Option<DocId>,
    element_closed: bool,
    depth: usize,
    skip_depth: usize,
    checkpoints: Vec<Checkpoint>,
    emptiable: HashMap<StateId, bool>,
    document_ended: bool,
}

impl<'a> PathFinder<'a> {
    /// Create a finder over a compiled state machine
    pub fn new(machine: &'a StateMachine) -> Self {
        Self::with_limits(machine, Limits::default())
    }

    /// Create a finder with explicit limits
    pub fn with_limits(machine: &'a StateMachine, limits: Limits) -> Self {
        Self {
            machine,
            limits,
            pool: NodePool::new(),
            events: Vec::new(),
            next_event: 0,
            head: None,
            root_doc: None,
            cursor: None,
            current_doc: None,
            element_closed: false,
            depth: 0,
            skip_depth: 0,
            checkpoints: Vec::new(),
            emptiable: HashMap::new(),
            document_ended: false,
        }
    }

    /// Run a complete event stream through the finder
    pub fn find(machine: &'a StateMachine, events: Vec<XmlEvent>) -> Result<DocumentPath> {
        let mut finder = PathFinder::new(machine);
        for event in events {
            finder.accept(event)?;
        }
        finder.finish()
    }

    /// Feed one event
    pub fn accept(&mut self, event: XmlEvent) -> Result<()> {
        self.limits.check_buffered_events(self.events.len() + 1)?;
        self.events.push(event);
        self.drain()
    }

    /// Complete the walk, returning the path, document tree and events
    pub fn finish(mut self) -> Result<DocumentPath> {
        self.drain()?;
        if !self.document_ended {
            return Err(Error::NoPathMatches(
                "event stream ended before end of document".to_string(),
            ));
        }
        let head = self
            .head
            .ok_or_else(|| Error::NoPathMatches("document held no root element".to_string()))?;
        let root = self
            .root_doc
            .ok_or_else(|| Error::NoPathMatches("document held no root element".to_string()))?;
        Ok(DocumentPath {
            pool: self.pool,
            head,
            root,
            events: self.events,
        })
    }

    fn drain(&mut self) -> Result<()> {
        while self.next_event < self.events.len() {
            let event = self.events[self.next_event].clone();
            match self.process(&event) {
                Ok(()) => self.next_event += 1,
                Err(e) if e.is_retryable() => self.backtrack(e)?,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn process(&mut self, event: &XmlEvent) -> Result<()> {
        match event {
            XmlEvent::StartElement { name, attributes } => self.on_start(name, attributes),
            XmlEvent::Characters(text) => self.on_characters(text),
            XmlEvent::EndElement { name } => self.on_end(name),
            XmlEvent::EndDocument => self.on_end_document(),
            _ => Ok(()),
        }
    }

    // ---------------------------------------------------------------
    // Event handling
    // ---------------------------------------------------------------

    fn on_start(&mut self, name: &QName, attributes: &[(QName, String)]) -> Result<()> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }

        self.limits.check_document_depth(self.depth + 1)?;

        let mut candidates = self.find_candidates(name)?;
        if candidates.is_empty() {
            return Err(Error::UnknownElement(name.clone()));
        }

        let chosen = candidates.remove(0);
        if !candidates.is_empty() {
            self.limits.check_checkpoints(self.checkpoints.len() + 1)?;
            self.checkpoints.push(Checkpoint {
                event_index: self.next_event,
                cursor: self.cursor,
                current_doc: self.current_doc,
                element_closed: self.element_closed,
                depth: self.depth,
                alternatives: candidates,
            });
        }

        self.apply(&chosen, name, attributes)
    }

    fn on_characters(&mut self, text: &str) -> Result<()> {
        if self.skip_depth > 0 {
            return Ok(());
        }

        let open = match self.open_element() {
            Some(doc) => doc,
            None => {
                // Text outside the root element; the parser only surfaces
                // this for whitespace between markup.
                return Ok(());
            }
        };

        let is_whitespace = text.chars().all(char::is_whitespace);
        let state_id = self.pool.doc(open).state;
        let is_simple = self
            .machine
            .node(state_id)
            .element()
            .map(|e| e.type_info.is_simple())
            .unwrap_or(false);

        if is_whitespace && !is_simple {
            return Ok(());
        }

        let prev_received = self.pool.doc(open).received_content;
        self.pool.doc_mut(open).received_content = true;

        let node = self
            .pool
            .acquire_path(Direction::Content, state_id, self.cursor);
        let iteration = self.pool.doc(open).iteration;
        {
            let path = self.pool.path_mut(node);
            path.doc = Some(open);
            path.iteration = iteration;
            path.doc_iteration = iteration;
            path.doc_undo = DocUndo::Content {
                doc: open,
                prev_received,
            };
        }
        self.cursor = Some(node);
        Ok(())
    }

    fn on_end(&mut self, name: &QName) -> Result<()> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            if self.skip_depth == 0 {
                self.element_closed = true;
                self.depth -= 1;
            }
            return Ok(());
        }

        let current = self.current_doc.ok_or_else(|| {
            Error::NoPathMatches(format!("end of {} before any element started", name))
        })?;

        if !self.element_closed {
            // Closing the element we just opened: its content must be
            // satisfiable with nothing consumed.
            let state_id = self.pool.doc(current).state;
            let edges: Vec<StateId> = self.machine.node(state_id).next.clone();
            for edge_state in edges {
                if !self.is_emptiable(edge_state) {
                    return Err(Error::NoPathMatches(format!(
                        "element {} closed with required content unmatched",
                        name
                    )));
                }
            }
            self.element_closed = true;
            self.depth -= 1;
            return Ok(());
        }

        // Walk up from the closed child element to the element being
        // closed, verifying every group exited along the way.
        let mut doc = self.pool.doc(current).parent.ok_or_else(|| {
            Error::NoPathMatches(format!("unexpected end of {}", name))
        })?;

        loop {
            let state_id = self.pool.doc(doc).state;
            let node = self.machine.node(state_id);

            if let Some(element) = node.element() {
                if element.qname != *name {
                    return Err(Error::NoPathMatches(format!(
                        "end tag {} does not close element {}",
                        name, element.qname
                    )));
                }
                self.emit_parent(doc)?;
                self.current_doc = Some(doc);
                self.element_closed = true;
                self.depth -= 1;
                return Ok(());
            }

            // A group being exited: its current iteration must be
            // completable and its iteration count must meet its minimum.
            self.verify_group_exit(doc)?;
            self.emit_parent(doc)?;

            doc = self.pool.doc(doc).parent.ok_or_else(|| {
                Error::NoPathMatches(format!("no enclosing element matches end tag {}", name))
            })?;
        }
    }

    fn on_end_document(&mut self) -> Result<()> {
        if self.depth != 0 || !self.element_closed {
            return Err(Error::NoPathMatches(
                "document ended with elements still open".to_string(),
            ));
        }

        // The root element may sit under group states (a substitution
        // group at the start); exit and verify them on the way out.
        let mut doc = self.current_doc.ok_or_else(|| {
            Error::NoPathMatches("document ended with no root element".to_string())
        })?;
        while let Some(parent) = self.pool.doc(doc).parent {
            self.verify_group_exit(parent)?;
            self.emit_parent(parent)?;
            doc = parent;
        }
        if Some(doc) != self.root_doc {
            return Err(Error::NoPathMatches(
                "document ended away from the root element".to_string(),
            ));
        }

        self.checkpoints.clear();
        self.document_ended = true;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Backtracking
    // ---------------------------------------------------------------

    fn backtrack(&mut self, source: Error) -> Result<()> {
        loop {
            let checkpoint = match self.checkpoints.last_mut() {
                Some(cp) if !cp.alternatives.is_empty() => cp,
                Some(_) => {
                    self.checkpoints.pop();
                    continue;
                }
                None => {
                    return Err(Error::NoPathMatches(format!(
                        "all admissible paths exhausted ({})",
                        source
                    )))
                }
            };

            let alternative = checkpoint.alternatives.remove(0);
            let event_index = checkpoint.event_index;
            let cursor = checkpoint.cursor;
            let current_doc = checkpoint.current_doc;
            let element_closed = checkpoint.element_closed;
            let depth = checkpoint.depth;

            // Recycle everything created after the branch point.
            match cursor {
                Some(c) => {
                    if let Some(next) = self.pool.path(c).next {
                        self.pool.release_path_tail(next);
                    }
                }
                None => {
                    if let Some(head) = self.head {
                        self.pool.release_path_tail(head);
                    }
                    self.head = None;
                    self.root_doc = None;
                }
            }

            self.cursor = cursor;
            self.current_doc = current_doc;
            self.element_closed = element_closed;
            self.depth = depth;
            self.skip_depth = 0;

            let (name, attributes) = match &self.events[event_index] {
                XmlEvent::StartElement { name, attributes } => {
                    (name.clone(), attributes.clone())
                }
                other => {
                    return Err(Error::NoPathMatches(format!(
                        "checkpoint does not reference a start tag: {:?}",
                        other
                    )))
                }
            };

            self.apply(&alternative, &name, &attributes)?;
            self.next_event = event_index + 1;
            return Ok(());
        }
    }

    // ---------------------------------------------------------------
    // Applying a candidate
    // ---------------------------------------------------------------

    fn apply(&mut self, steps: &[Step], name: &QName, attributes: &[(QName, String)]) -> Result<()> {
        for step in steps {
            match *step {
                Step::Root => {
                    let start = self.machine.start();
                    let doc = self.pool.acquire_document(start, None);
                    let node = self.pool.acquire_path(Direction::Child, start, self.cursor);
                    {
                        let path = self.pool.path_mut(node);
                        path.doc = Some(doc);
                        path.iteration = 1;
                        path.doc_iteration = 1;
                        path.doc_undo = DocUndo::Created(doc);
                    }
                    self.head = Some(node);
                    self.root_doc = Some(doc);
                    self.cursor = Some(node);
                    self.current_doc = Some(doc);
                }
                Step::Child { edge } => {
                    let parent_doc = self.current_doc.expect("child step without a position");
                    let parent_state = self.pool.doc(parent_doc).state;
                    let child_state = self.machine.node(parent_state).next[edge];
                    let parent_iter = self.pool.doc(parent_doc).iteration;

                    // Advance the sequence position; the undo restores it.
                    let seq_undo = {
                        let parent = self.pool.doc_mut(parent_doc);
                        let prev = parent.sequence_position;
                        parent.sequence_position = edge;
                        Some((parent_doc, prev))
                    };

                    let (child_doc, doc_undo) =
                        match self.pool.doc(parent_doc).child_at(parent_iter, edge) {
                            Some(existing) => {
                                let prev_iteration = self.pool.doc(existing).iteration;
                                self.pool.doc_mut(existing).iteration = prev_iteration + 1;
                                (
                                    existing,
                                    DocUndo::Reentered {
                                        doc: existing,
                                        prev_iteration,
                                    },
                                )
                            }
                            None => {
                                let created =
                                    self.pool.acquire_document(child_state, Some(parent_doc));
                                self.pool
                                    .doc_mut(parent_doc)
                                    .set_child(parent_iter, edge, created);
                                (created, DocUndo::Created(created))
                            }
                        };

                    if let Some(prev) = self.cursor {
                        self.pool.path_mut(prev).next_state_index = edge as i32;
                    }

                    let iteration = self.pool.doc(child_doc).iteration;
                    let node =
                        self.pool
                            .acquire_path(Direction::Child, child_state, self.cursor);
                    {
                        let path = self.pool.path_mut(node);
                        path.doc = Some(child_doc);
                        path.iteration = iteration;
                        path.doc_iteration = iteration;
                        path.doc_undo = doc_undo;
                        path.seq_undo = seq_undo;
                    }
                    if self.head.is_none() {
                        self.head = Some(node);
                    }
                    self.cursor = Some(node);
                    self.current_doc = Some(child_doc);
                }
                Step::Sibling => {
                    let doc = self.current_doc.expect("sibling step without a position");
                    let state = self.pool.doc(doc).state;
                    let prev_iteration = self.pool.doc(doc).iteration;
                    let prev_pos = self.pool.doc(doc).sequence_position;
                    {
                        let d = self.pool.doc_mut(doc);
                        d.iteration = prev_iteration + 1;
                        d.sequence_position = 0;
                    }

                    let node = self.pool.acquire_path(Direction::Sibling, state, self.cursor);
                    {
                        let path = self.pool.path_mut(node);
                        path.doc = Some(doc);
                        path.iteration = prev_iteration + 1;
                        path.doc_iteration = prev_iteration + 1;
                        path.doc_undo = DocUndo::Reentered {
                            doc,
                            prev_iteration,
                        };
                        path.seq_undo = Some((doc, prev_pos));
                    }
                    self.cursor = Some(node);
                    self.current_doc = Some(doc);
                }
                Step::Parent => {
                    let doc = self.current_doc.expect("parent step without a position");
                    let parent_doc = self.pool.doc(doc).parent.expect("parent step at the root");
                    let parent_state = self.pool.doc(parent_doc).state;
                    let iteration = self.pool.doc(parent_doc).iteration;

                    let node =
                        self.pool
                            .acquire_path(Direction::Parent, parent_state, self.cursor);
                    {
                        let path = self.pool.path_mut(node);
                        path.doc = Some(parent_doc);
                        path.iteration = iteration;
                        path.doc_iteration = iteration;
                    }
                    self.cursor = Some(node);
                    self.current_doc = Some(parent_doc);
                }
            }
        }

        // The candidate lands on the matched element or wildcard.
        let landing = self.current_doc.expect("candidate landed nowhere");
        let landing_state = self.pool.doc(landing).state;
        match &self.machine.node(landing_state).kind {
            StateKind::Element(element) => {
                if has_nil_true(attributes) && !element.nillable {
                    return Err(Error::NilabilityConflict(name.clone()));
                }
                self.element_closed = false;
                self.depth += 1;
            }
            StateKind::Any(_) => {
                self.element_closed = false;
                self.depth += 1;
                self.skip_depth = 1;
            }
            other => {
                return Err(Error::NoPathMatches(format!(
                    "candidate landed on a group state ({:?})",
                    other
                )))
            }
        }
        Ok(())
    }

    fn emit_parent(&mut self, doc: DocId) -> Result<()> {
        let state = self.pool.doc(doc).state;
        let iteration = self.pool.doc(doc).iteration;
        let node = self.pool.acquire_path(Direction::Parent, state, self.cursor);
        {
            let path = self.pool.path_mut(node);
            path.doc = Some(doc);
            path.iteration = iteration;
            path.doc_iteration = iteration;
        }
        self.cursor = Some(node);
        Ok(())
    }

    // The innermost element still open, if any.
    fn open_element(&self) -> Option<DocId> {
        let mut doc = self.current_doc?;
        if self.element_closed {
            doc = self.pool.doc(doc).parent?;
        }
        loop {
            let state = self.pool.doc(doc).state;
            if self.machine.node(state).element().is_some() {
                return Some(doc);
            }
            doc = self.pool.doc(doc).parent?;
        }
    }

    // ---------------------------------------------------------------
    // Candidate search
    // ---------------------------------------------------------------

    fn find_candidates(&mut self, target: &QName) -> Result<Vec<Candidate>> {
        let mut elements = Vec::new();
        let mut wildcards = Vec::new();

        match self.current_doc {
            None => {
                // Document start: enter the machine's start state.
                let start = self.machine.start();
                match &self.machine.node(start).kind {
                    StateKind::Element(element) => {
                        if element.qname == *target {
                            elements.push(vec![Step::Root]);
                        }
                    }
                    StateKind::Any(any) => {
                        if any.namespace.admits(target.namespace.as_deref()) {
                            wildcards.push(vec![Step::Root]);
                        }
                    }
                    _ => {
                        let mut stack = vec![Frame::virtual_entry(start, None)];
                        let mut steps = vec![Step::Root];
                        self.explore(
                            &mut stack,
                            &mut steps,
                            target,
                            &mut elements,
                            &mut wildcards,
                            1,
                        )?;
                    }
                }
            }
            Some(current) => {
                if self.element_closed {
                    // The closed element may repeat as a sibling.
                    let state = self.pool.doc(current).state;
                    let iteration = self.pool.doc(current).iteration;
                    let node = self.machine.node(state);
                    if let Some(element) = node.element() {
                        if element.qname == *target && node.occurs.admits_another(iteration) {
                            elements.push(vec![Step::Sibling]);
                        }
                    } else if matches!(node.kind, StateKind::Any(_)) {
                        if let StateKind::Any(any) = &node.kind {
                            if any.namespace.admits(target.namespace.as_deref())
                                && node.occurs.admits_another(iteration)
                            {
                                wildcards.push(vec![Step::Sibling]);
                            }
                        }
                    }

                    // Otherwise continue in the enclosing groups, up to
                    // (but not past) the innermost open element.
                    let mut chain = Vec::new();
                    let mut doc = self.pool.doc(current).parent;
                    while let Some(d) = doc {
                        let s = self.pool.doc(d).state;
                        if self.machine.node(s).element().is_some() {
                            break;
                        }
                        chain.push(d);
                        doc = self.pool.doc(d).parent;
                    }

                    if !chain.is_empty() {
                        chain.reverse();
                        let mut stack: Vec<Frame> = chain
                            .iter()
                            .map(|&d| Frame::real(&self.pool, d))
                            .collect();
                        // Steps ascend from the closed element into the
                        // innermost group before the search continues.
                        let mut steps = vec![Step::Parent];
                        if let Some(frame) = stack.last_mut() {
                            frame.skip_edge = Some(frame.seq_pos);
                        }
                        self.explore(
                            &mut stack,
                            &mut steps,
                            target,
                            &mut elements,
                            &mut wildcards,
                            1,
                        )?;
                    }
                } else {
                    // Inside a freshly opened element: descend into its
                    // content model.
                    let mut stack = vec![Frame::real(&self.pool, current)];
                    let mut steps = Vec::new();
                    self.explore(
                        &mut stack,
                        &mut steps,
                        target,
                        &mut elements,
                        &mut wildcards,
                        1,
                    )?;
                }
            }
        }

        elements.extend(wildcards);
        self.limits.check_candidates(elements.len())?;
        Ok(elements)
    }

    fn explore(
        &mut self,
        stack: &mut Vec<Frame>,
        steps: &mut Vec<Step>,
        target: &QName,
        elements: &mut Vec<Candidate>,
        wildcards: &mut Vec<Candidate>,
        depth: usize,
    ) -> Result<()> {
        self.limits.check_search_depth(depth)?;

        let state = stack.last().expect("explore without a frame").state;
        let kind_tag = match &self.machine.node(state).kind {
            StateKind::Element(_) => 0,
            StateKind::Sequence => 1,
            StateKind::Choice | StateKind::SubstitutionGroup => 2,
            StateKind::All => 3,
            StateKind::Any(_) => return Ok(()),
        };

        match kind_tag {
            0 => {
                // An open element: its content roots, in order.
                let edge_count = self.machine.node(state).next.len();
                for edge in 0..edge_count {
                    if self.edge_has_budget(stack, edge) {
                        self.try_edge(stack, steps, edge, target, elements, wildcards, depth)?;
                    }
                }
                Ok(())
            }
            1 => self.explore_sequence(stack, steps, target, elements, wildcards, depth),
            2 => self.explore_choice(stack, steps, target, elements, wildcards, depth),
            _ => self.explore_all(stack, steps, target, elements, wildcards, depth),
        }
    }

    fn explore_sequence(
        &mut self,
        stack: &mut Vec<Frame>,
        steps: &mut Vec<Step>,
        target: &QName,
        elements: &mut Vec<Candidate>,
        wildcards: &mut Vec<Candidate>,
        depth: usize,
    ) -> Result<()> {
        let state = stack.last().unwrap().state;
        let edge_count = self.machine.node(state).next.len();

        let mut pos = stack.last().unwrap().seq_pos;
        let mut end_reached = true;

        while pos < edge_count {
            let child_state = self.machine.node(state).next[pos];
            let child_occurs = self.machine.node(child_state).occurs;
            let count = self.occurrences(stack.last().unwrap(), pos);

            if child_occurs.admits_another(count) {
                self.try_edge(stack, steps, pos, target, elements, wildcards, depth)?;
            }

            if child_occurs.satisfied_by(count) || (count == 0 && self.is_emptiable(child_state)) {
                pos += 1;
            } else {
                end_reached = false;
                break;
            }
        }

        if end_reached {
            self.end_of_group_moves(stack, steps, target, elements, wildcards, depth)?;
        }
        Ok(())
    }

    fn explore_choice(
        &mut self,
        stack: &mut Vec<Frame>,
        steps: &mut Vec<Step>,
        target: &QName,
        elements: &mut Vec<Candidate>,
        wildcards: &mut Vec<Candidate>,
        depth: usize,
    ) -> Result<()> {
        let state = stack.last().unwrap().state;
        let edge_count = self.machine.node(state).next.len();

        let mut chosen: Option<(usize, u32)> = None;
        for edge in 0..edge_count {
            let count = self.occurrences(stack.last().unwrap(), edge);
            if count > 0 {
                chosen = Some((edge, count));
                break;
            }
        }

        let completable = match chosen {
            Some((edge, count)) => {
                let child_state = self.machine.node(state).next[edge];
                let child_occurs = self.machine.node(child_state).occurs;
                // The chosen branch may keep repeating within this
                // occurrence of the choice.
                if child_occurs.admits_another(count) {
                    self.try_edge(stack, steps, edge, target, elements, wildcards, depth)?;
                }
                child_occurs.satisfied_by(count)
            }
            None => {
                let mut any_emptiable = false;
                for edge in 0..edge_count {
                    let child_state = self.machine.node(state).next[edge];
                    if self.machine.node(child_state).occurs.admits_another(0) {
                        self.try_edge(stack, steps, edge, target, elements, wildcards, depth)?;
                    }
                    if self.is_emptiable(child_state) {
                        any_emptiable = true;
                    }
                }
                any_emptiable
            }
        };

        if completable {
            self.end_of_group_moves(stack, steps, target, elements, wildcards, depth)?;
        }
        Ok(())
    }

    fn explore_all(
        &mut self,
        stack: &mut Vec<Frame>,
        steps: &mut Vec<Step>,
        target: &QName,
        elements: &mut Vec<Candidate>,
        wildcards: &mut Vec<Candidate>,
        depth: usize,
    ) -> Result<()> {
        let state = stack.last().unwrap().state;
        let edge_count = self.machine.node(state).next.len();

        let mut completable = true;
        for edge in 0..edge_count {
            let child_state = self.machine.node(state).next[edge];
            let child_occurs = self.machine.node(child_state).occurs;
            let count = self.occurrences(stack.last().unwrap(), edge);

            if child_occurs.admits_another(count) {
                self.try_edge(stack, steps, edge, target, elements, wildcards, depth)?;
            }
            if !child_occurs.satisfied_by(count) && !(count == 0 && self.is_emptiable(child_state)) {
                completable = false;
            }
        }

        if completable {
            self.end_of_group_moves(stack, steps, target, elements, wildcards, depth)?;
        }
        Ok(())
    }

    // Moves available once a group's current iteration is satisfied:
    // start another iteration, or leave the group and continue above.
    fn end_of_group_moves(
        &mut self,
        stack: &mut Vec<Frame>,
        steps: &mut Vec<Step>,
        target: &QName,
        elements: &mut Vec<Candidate>,
        wildcards: &mut Vec<Candidate>,
        depth: usize,
    ) -> Result<()> {
        let frame = stack.last().unwrap();
        let state = frame.state;
        let occurs = self.machine.node(state).occurs;
        let is_real = frame.doc.is_some() && frame.iteration == self.pool.doc(frame.doc.unwrap()).iteration;

        // Iterate: another pass over the group, if bounds allow and the
        // previous pass consumed something.
        if occurs.admits_another(frame.iteration) && !frame.just_iterated {
            let saved = frame.clone();
            {
                let frame = stack.last_mut().unwrap();
                frame.iteration += 1;
                frame.seq_pos = 0;
                frame.virtual_counts.clear();
                frame.just_iterated = true;
                frame.skip_edge = None;
            }
            steps.push(Step::Sibling);
            self.explore(stack, steps, target, elements, wildcards, depth + 1)?;
            steps.pop();
            *stack.last_mut().unwrap() = saved;
        }

        // Leave: continue the search in the enclosing group. Virtual
        // frames never pop (entering a group only to leave it matches
        // nothing the skip rules would not).
        if is_real && occurs.satisfied_by(stack.last().unwrap().iteration) {
            if stack.len() > 1 {
                let popped = stack.pop().unwrap();
                steps.push(Step::Parent);
                self.explore(stack, steps, target, elements, wildcards, depth + 1)?;
                steps.pop();
                stack.push(popped);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn try_edge(
        &mut self,
        stack: &mut Vec<Frame>,
        steps: &mut Vec<Step>,
        edge: usize,
        target: &QName,
        elements: &mut Vec<Candidate>,
        wildcards: &mut Vec<Candidate>,
        depth: usize,
    ) -> Result<()> {
        {
            let frame = stack.last().unwrap();
            if frame.skip_edge == Some(edge) {
                return Ok(());
            }
        }

        let parent_state = stack.last().unwrap().state;
        let child_state = self.machine.node(parent_state).next[edge];

        match &self.machine.node(child_state).kind {
            StateKind::Element(element) => {
                if element.qname == *target {
                    let mut candidate = steps.clone();
                    candidate.push(Step::Child { edge });
                    elements.push(candidate);
                }
                Ok(())
            }
            StateKind::Any(any) => {
                if any.namespace.admits(target.namespace.as_deref()) {
                    let mut candidate = steps.clone();
                    candidate.push(Step::Child { edge });
                    wildcards.push(candidate);
                }
                Ok(())
            }
            _ => {
                // Entering a group: look for an existing instance under
                // the parent's effective iteration.
                let existing = {
                    let frame = stack.last().unwrap();
                    frame.doc.and_then(|d| {
                        self.pool
                            .doc(d)
                            .child_at(frame.iteration, edge)
                            .map(|c| (c, self.pool.doc(c).iteration))
                    })
                };

                stack.last_mut().unwrap().bump(edge, 1);
                stack.push(Frame::virtual_entry(child_state, existing));
                steps.push(Step::Child { edge });

                let result = self.explore(stack, steps, target, elements, wildcards, depth + 1);

                steps.pop();
                stack.pop();
                stack.last_mut().unwrap().bump(edge, -1);
                result
            }
        }
    }

    fn edge_has_budget(&self, stack: &[Frame], edge: usize) -> bool {
        let frame = stack.last().unwrap();
        let child_state = self.machine.node(frame.state).next[edge];
        let count = self.occurrences(frame, edge);
        self.machine.node(child_state).occurs.admits_another(count)
    }

    // Occurrences of the child along `edge` within the frame's current
    // iteration: live document children plus this search branch's bumps.
    fn occurrences(&self, frame: &Frame, edge: usize) -> u32 {
        let real = frame
            .doc
            .and_then(|d| self.pool.doc(d).child_at(frame.iteration, edge))
            .map(|c| self.pool.doc(c).iteration)
            .unwrap_or(0);
        let virtual_ = frame
            .virtual_counts
            .iter()
            .find(|(e, _)| *e == edge)
            .map(|(_, c)| *c)
            .unwrap_or(0);
        real + virtual_
    }

    // ---------------------------------------------------------------
    // Minimum-occurrence verification
    // ---------------------------------------------------------------

    fn verify_group_exit(&mut self, doc: DocId) -> Result<()> {
        let state = self.pool.doc(doc).state;
        let iteration = self.pool.doc(doc).iteration;
        let occurs = self.machine.node(state).occurs;

        if !occurs.satisfied_by(iteration) {
            return Err(Error::NoPathMatches(format!(
                "group {} occurred {} times, fewer than its minimum {}",
                self.machine.node(state).label(),
                iteration,
                occurs.min
            )));
        }

        let edge_count = self.machine.node(state).next.len();
        let is_choice_like = matches!(
            self.machine.node(state).kind,
            StateKind::Choice | StateKind::SubstitutionGroup
        );

        if is_choice_like {
            let mut satisfied = false;
            for edge in 0..edge_count {
                let child_state = self.machine.node(state).next[edge];
                let count = self
                    .pool
                    .doc(doc)
                    .child_at(iteration, edge)
                    .map(|c| self.pool.doc(c).iteration)
                    .unwrap_or(0);
                if count > 0 && self.machine.node(child_state).occurs.satisfied_by(count) {
                    satisfied = true;
                    break;
                }
                if count == 0 && self.is_emptiable(child_state) {
                    satisfied = true;
                }
            }
            if !satisfied && edge_count > 0 {
                return Err(Error::NoPathMatches(format!(
                    "choice {} closed with no branch satisfied",
                    self.machine.node(state).label()
                )));
            }
            return Ok(());
        }

        for edge in 0..edge_count {
            let child_state = self.machine.node(state).next[edge];
            let child_occurs = self.machine.node(child_state).occurs;
            let count = self
                .pool
                .doc(doc)
                .child_at(iteration, edge)
                .map(|c| self.pool.doc(c).iteration)
                .unwrap_or(0);
            if !child_occurs.satisfied_by(count) && !(count == 0 && self.is_emptiable(child_state)) {
                return Err(Error::NoPathMatches(format!(
                    "group {} closed with child {} under its minimum",
                    self.machine.node(state).label(),
                    self.machine.node(child_state).label()
                )));
            }
        }
        Ok(())
    }

    fn is_emptiable(&mut self, state: StateId) -> bool {
        if let Some(&cached) = self.emptiable.get(&state) {
            return cached;
        }

        let node = self.machine.node(state);
        let result = match &node.kind {
            StateKind::Element(_) | StateKind::Any(_) => node.occurs.min == 0,
            StateKind::Sequence | StateKind::All => {
                node.occurs.min == 0 || {
                    let children = node.next.clone();
                    children.iter().all(|&c| self.is_emptiable(c))
                }
            }
            StateKind::Choice | StateKind::SubstitutionGroup => {
                node.occurs.min == 0 || {
                    let children = node.next.clone();
                    children.iter().any(|&c| self.is_emptiable(c))
                }
            }
        };
        self.emptiable.insert(state, result);
        result
    }
}

fn has_nil_true(attributes: &[(QName, String)]) -> bool {
    attributes.iter().any(|(name, value)| {
        name.namespace.as_deref() == Some(XSI_NAMESPACE)
            && name.local_name == "nil"
            && (value == "true" || value == "1")
    })
}

impl<'a> XmlHandler for PathFinder<'a> {
    fn start_document(&mut self) -> Result<()> {
        self.accept(XmlEvent::StartDocument)
    }

    fn start_prefix_mapping(&mut self, prefix: &str, namespace: &str) -> Result<()> {
        self.accept(XmlEvent::StartPrefixMapping {
            prefix: prefix.to_string(),
            namespace: namespace.to_string(),
        })
    }

    fn start_element(&mut self, name: &QName, attributes: &[(QName, String)]) -> Result<()> {
        self.accept(XmlEvent::StartElement {
            name: name.clone(),
            attributes: attributes.to_vec(),
        })
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.accept(XmlEvent::Characters(text.to_string()))
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        self.accept(XmlEvent::EndElement { name: name.clone() })
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
        self.accept(XmlEvent::EndPrefixMapping {
            prefix: prefix.to_string(),
        })
    }

    fn end_document(&mut self) -> Result<()> {
        self.accept(XmlEvent::EndDocument)
    }
}
