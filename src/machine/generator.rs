//! State machine generator
//!
//! A [`SchemaVisitor`] that consumes walker events and emits the state
//! graph. A stack tracks the construction context; the ELEMENT registry
//! lets a previously visited element link to its existing node, which is
//! how recursive schemas become cycles in the graph.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::machine::node::{ElementState, StateId, StateKind, StateMachine, StateMachineNode};
use crate::namespaces::QName;
use crate::schema::components::{AnyAttribute, AnyElement, ElementDecl, Occurs};
use crate::scope::ResolvedAttribute;
use crate::simple::info::SimpleTypeInfo;
use crate::walker::SchemaVisitor;

struct StackEntry {
    state: StateId,
    // Reused ELEMENT nodes must not accumulate attributes twice; the
    // applier also treats their subtrees as already covered.
    is_ignored: bool,
}

/// Builds a [`StateMachine`] from walker events.
#[derive(Default)]
pub struct StateMachineGenerator {
    nodes: Vec<StateMachineNode>,
    elements: HashMap<QName, StateId>,
    stack: Vec<StackEntry>,
    start: Option<StateId>,
    // The substitution-group node awaiting its head's occurrence bounds.
    pending_group_occurs: Option<StateId>,
}

impl StateMachineGenerator {
    /// Create an empty generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish construction, yielding the immutable machine
    pub fn finish(self) -> Result<StateMachine> {
        let start = self
            .start
            .ok_or_else(|| Error::Schema("the schema walk produced no states".to_string()))?;
        if !self.stack.is_empty() {
            return Err(Error::Schema(
                "unbalanced walker events: construction stack is not empty".to_string(),
            ));
        }
        Ok(StateMachine {
            nodes: self.nodes,
            start,
            elements: self.elements,
        })
    }

    fn alloc(&mut self, kind: StateKind, occurs: Occurs) -> StateId {
        let id = StateId(self.nodes.len());
        self.nodes.push(StateMachineNode {
            kind,
            occurs,
            next: Vec::new(),
        });
        if self.start.is_none() {
            self.start = Some(id);
        }
        id
    }

    fn link_from_top(&mut self, child: StateId) {
        if let Some(entry) = self.stack.last() {
            let parent = entry.state;
            self.nodes[parent.0].next.push(child);
        }
    }

    fn push(&mut self, state: StateId, is_ignored: bool) {
        self.stack.push(StackEntry { state, is_ignored });
    }

    fn pop(&mut self) -> Result<StackEntry> {
        self.stack
            .pop()
            .ok_or_else(|| Error::Schema("unbalanced walker events: empty stack".to_string()))
    }
}

impl SchemaVisitor for StateMachineGenerator {
    fn on_enter_element(
        &mut self,
        element: &Arc<ElementDecl>,
        occurs: Occurs,
        type_info: &Arc<SimpleTypeInfo>,
        previously_visited: bool,
    ) -> Result<()> {
        let (state, is_ignored) = match self.elements.get(&element.name) {
            Some(&existing) => (existing, true),
            None => {
                let state = self.alloc(
                    StateKind::Element(ElementState {
                        qname: element.name.clone(),
                        type_info: Arc::clone(type_info),
                        attributes: Vec::new(),
                        nillable: element.nillable,
                        default_value: element.default_value.clone(),
                        fixed_value: element.fixed_value.clone(),
                    }),
                    occurs,
                );
                self.elements.insert(element.name.clone(), state);
                (state, previously_visited)
            }
        };

        // A substitution group adopts the occurrence bounds of its head.
        if let Some(group) = self.pending_group_occurs.take() {
            self.nodes[group.0].occurs = occurs;
        }

        self.link_from_top(state);
        self.push(state, is_ignored);
        Ok(())
    }

    fn on_exit_element(
        &mut self,
        _element: &Arc<ElementDecl>,
        _type_info: &Arc<SimpleTypeInfo>,
        _previously_visited: bool,
    ) -> Result<()> {
        self.pop()?;
        Ok(())
    }

    fn on_visit_attribute(
        &mut self,
        _element: &Arc<ElementDecl>,
        attribute: &ResolvedAttribute,
    ) -> Result<()> {
        let entry = self
            .stack
            .last()
            .ok_or_else(|| Error::Schema("attribute event outside an element".to_string()))?;
        if entry.is_ignored {
            return Ok(());
        }
        let state = entry.state;
        match &mut self.nodes[state.0].kind {
            StateKind::Element(element_state) => {
                element_state.attributes.push(attribute.clone());
                Ok(())
            }
            other => Err(Error::Schema(format!(
                "attribute event on a non-element state ({:?})",
                other
            ))),
        }
    }

    fn on_enter_substitution_group(&mut self, _base: &Arc<ElementDecl>) -> Result<()> {
        let state = self.alloc(StateKind::SubstitutionGroup, Occurs::once());
        self.link_from_top(state);
        self.push(state, false);
        self.pending_group_occurs = Some(state);
        Ok(())
    }

    fn on_exit_substitution_group(&mut self, _base: &Arc<ElementDecl>) -> Result<()> {
        self.exit_group()
    }

    fn on_enter_all_group(&mut self, occurs: Occurs) -> Result<()> {
        self.enter_group(StateKind::All, occurs)
    }

    fn on_exit_all_group(&mut self) -> Result<()> {
        self.exit_group()
    }

    fn on_enter_choice_group(&mut self, occurs: Occurs) -> Result<()> {
        self.enter_group(StateKind::Choice, occurs)
    }

    fn on_exit_choice_group(&mut self) -> Result<()> {
        self.exit_group()
    }

    fn on_enter_sequence_group(&mut self, occurs: Occurs) -> Result<()> {
        self.enter_group(StateKind::Sequence, occurs)
    }

    fn on_exit_sequence_group(&mut self) -> Result<()> {
        self.exit_group()
    }

    fn on_visit_any(&mut self, any: &AnyElement, occurs: Occurs) -> Result<()> {
        let state = self.alloc(StateKind::Any(any.clone()), occurs);
        self.link_from_top(state);
        Ok(())
    }

    fn on_visit_any_attribute(
        &mut self,
        _element: &Arc<ElementDecl>,
        _any_attribute: &AnyAttribute,
    ) -> Result<()> {
        // Attribute wildcards occupy no grammar slot.
        Ok(())
    }
}

impl StateMachineGenerator {
    fn enter_group(&mut self, kind: StateKind, occurs: Occurs) -> Result<()> {
        let state = self.alloc(kind, occurs);
        self.link_from_top(state);
        self.push(state, false);
        Ok(())
    }

    fn exit_group(&mut self) -> Result<()> {
        let entry = self.pop()?;
        self.pending_group_occurs = None;

        // Link-time elision: a group that gathered no children is removed
        // from its parent's edges.
        let node = &self.nodes[entry.state.0];
        if node.is_group() && node.next.is_empty() {
            if let Some(parent) = self.stack.last() {
                let parent_state = parent.state;
                if let Some(pos) = self.nodes[parent_state.0]
                    .next
                    .iter()
                    .rposition(|&id| id == entry.state)
                {
                    self.nodes[parent_state.0].next.remove(pos);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::components::{ComplexTypeDef, Particle, TypeDef};
    use crate::schema::SchemaCollection;
    use crate::walker::SchemaWalker;

    fn compile(collection: &SchemaCollection, root: &str) -> StateMachine {
        let mut walker = SchemaWalker::new(collection);
        let mut generator = StateMachineGenerator::new();
        walker.walk(&QName::local(root), &mut generator).unwrap();
        generator.finish().unwrap()
    }

    fn string_element(name: &str) -> ElementDecl {
        ElementDecl::new(QName::local(name)).with_type_name(QName::xsd("string"))
    }

    #[test]
    fn test_sequence_graph_shape() {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("root")).with_inline_type(TypeDef::Complex(
                    ComplexTypeDef::direct(
                        Some(Particle::sequence(
                            Occurs::once(),
                            vec![
                                Particle::element(Occurs::once(), string_element("a")),
                                Particle::element(Occurs::new(0, None), string_element("b")),
                            ],
                        )),
                        vec![],
                    ),
                )),
            )
            .unwrap();

        let machine = compile(&collection, "root");

        let root = machine.node(machine.start());
        assert!(matches!(root.kind, StateKind::Element(_)));
        assert_eq!(root.next.len(), 1);

        let seq = machine.node(root.next[0]);
        assert!(matches!(seq.kind, StateKind::Sequence));
        assert_eq!(seq.next.len(), 2);

        let a = machine.node(seq.next[0]);
        assert_eq!(a.element().unwrap().qname, QName::local("a"));
        assert_eq!(a.occurs, Occurs::once());

        let b = machine.node(seq.next[1]);
        assert_eq!(b.element().unwrap().qname, QName::local("b"));
        assert_eq!(b.occurs, Occurs::new(0, None));
    }

    #[test]
    fn test_recursive_schema_links_existing_node() {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("node")).with_inline_type(TypeDef::Complex(
                    ComplexTypeDef::direct(
                        Some(Particle::sequence(
                            Occurs::once(),
                            vec![Particle::element_ref(
                                Occurs::optional(),
                                QName::local("node"),
                            )],
                        )),
                        vec![],
                    ),
                )),
            )
            .unwrap();

        let machine = compile(&collection, "node");

        let root_id = machine.start();
        let root = machine.node(root_id);
        let seq = machine.node(root.next[0]);

        // The sequence's child element is the root node itself.
        assert_eq!(seq.next[0], root_id);
    }

    #[test]
    fn test_empty_group_is_elided() {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("root")).with_inline_type(TypeDef::Complex(
                    ComplexTypeDef::direct(
                        Some(Particle::sequence(Occurs::once(), vec![])),
                        vec![],
                    ),
                )),
            )
            .unwrap();

        let machine = compile(&collection, "root");
        let root = machine.node(machine.start());
        assert!(root.next.is_empty());
    }

    #[test]
    fn test_substitution_group_start_node() {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("record"))
                    .with_inline_type(TypeDef::Complex(ComplexTypeDef::empty())),
            )
            .unwrap();
        collection
            .add_element(
                ElementDecl::new(QName::local("firstMap"))
                    .with_inline_type(TypeDef::Complex(ComplexTypeDef::empty()))
                    .with_substitution_group(QName::local("record")),
            )
            .unwrap();

        let machine = compile(&collection, "record");

        let start = machine.node(machine.start());
        assert!(matches!(start.kind, StateKind::SubstitutionGroup));
        assert_eq!(start.next.len(), 2);

        let head = machine.node(start.next[0]);
        assert_eq!(head.element().unwrap().qname, QName::local("record"));
        let substitute = machine.node(start.next[1]);
        assert_eq!(substitute.element().unwrap().qname, QName::local("firstMap"));
    }

    #[test]
    fn test_attributes_attach_once() {
        use crate::schema::components::{AttrUse, AttributeDecl};

        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("pair")).with_inline_type(TypeDef::Complex(
                    ComplexTypeDef::direct(
                        Some(Particle::sequence(
                            Occurs::once(),
                            vec![
                                Particle::element_ref(Occurs::optional(), QName::local("pair")),
                                Particle::element_ref(Occurs::optional(), QName::local("pair")),
                            ],
                        )),
                        vec![AttrUse::Decl(Arc::new(
                            AttributeDecl::new(QName::local("id"))
                                .with_type_name(QName::xsd("ID")),
                        ))],
                    ),
                )),
            )
            .unwrap();

        let machine = compile(&collection, "pair");
        let root = machine.node(machine.start());
        assert_eq!(root.element().unwrap().attributes.len(), 1);
    }

    #[test]
    fn test_element_registry_lookup() {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("root")).with_inline_type(TypeDef::Complex(
                    ComplexTypeDef::direct(
                        Some(Particle::element(Occurs::once(), string_element("leaf"))),
                        vec![],
                    ),
                )),
            )
            .unwrap();

        let machine = compile(&collection, "root");
        assert!(machine.element_by_qname(&QName::local("leaf")).is_some());
        assert!(machine.element_by_qname(&QName::local("missing")).is_none());
    }
}
