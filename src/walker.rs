//! Schema walker
//!
//! Depth-first traversal of an XSD starting from a named root element,
//! notifying a visitor as it descends. Substitution groups are discovered
//! up front from the collection's global elements; previously visited
//! element QNames are reported but not recursed into, which terminates
//! cycles in recursive schemas.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::Result;
use crate::namespaces::QName;
use crate::schema::components::{
    AnyAttribute, AnyElement, ElementDecl, ElementRef, GroupKind, Occurs, Particle, Term, TypeDef,
};
use crate::schema::SchemaCollection;
use crate::scope::{ResolvedAttribute, Scope, ScopeCache, Scoper};
use crate::simple::base::builtin_info;
use crate::simple::info::SimpleTypeInfo;

/// Visitor notified during a schema walk.
///
/// The contract is event order; implementations override what they need.
#[allow(unused_variables)]
pub trait SchemaVisitor {
    /// An element is entered; `previously_visited` elements are not
    /// recursed into
    fn on_enter_element(
        &mut self,
        element: &Arc<ElementDecl>,
        occurs: Occurs,
        type_info: &Arc<SimpleTypeInfo>,
        previously_visited: bool,
    ) -> Result<()> {
        Ok(())
    }

    /// An element is exited
    fn on_exit_element(
        &mut self,
        element: &Arc<ElementDecl>,
        type_info: &Arc<SimpleTypeInfo>,
        previously_visited: bool,
    ) -> Result<()> {
        Ok(())
    }

    /// An attribute of the current element is visited
    fn on_visit_attribute(
        &mut self,
        element: &Arc<ElementDecl>,
        attribute: &ResolvedAttribute,
    ) -> Result<()> {
        Ok(())
    }

    /// A substitution group headed by `base` is entered
    fn on_enter_substitution_group(&mut self, base: &Arc<ElementDecl>) -> Result<()> {
        Ok(())
    }

    /// A substitution group headed by `base` is exited
    fn on_exit_substitution_group(&mut self, base: &Arc<ElementDecl>) -> Result<()> {
        Ok(())
    }

    /// An all group is entered
    fn on_enter_all_group(&mut self, occurs: Occurs) -> Result<()> {
        Ok(())
    }

    /// An all group is exited
    fn on_exit_all_group(&mut self) -> Result<()> {
        Ok(())
    }

    /// A choice group is entered
    fn on_enter_choice_group(&mut self, occurs: Occurs) -> Result<()> {
        Ok(())
    }

    /// A choice group is exited
    fn on_exit_choice_group(&mut self) -> Result<()> {
        Ok(())
    }

    /// A sequence group is entered
    fn on_enter_sequence_group(&mut self, occurs: Occurs) -> Result<()> {
        Ok(())
    }

    /// A sequence group is exited
    fn on_exit_sequence_group(&mut self) -> Result<()> {
        Ok(())
    }

    /// An element wildcard is visited (never expanded)
    fn on_visit_any(&mut self, any: &AnyElement, occurs: Occurs) -> Result<()> {
        Ok(())
    }

    /// The current element's attribute wildcard is visited
    fn on_visit_any_attribute(
        &mut self,
        element: &Arc<ElementDecl>,
        any_attribute: &AnyAttribute,
    ) -> Result<()> {
        Ok(())
    }
}

/// Depth-first walker over a schema collection.
pub struct SchemaWalker<'a> {
    collection: &'a SchemaCollection,
    scope_cache: ScopeCache,
    user_recognized: HashSet<QName>,
    substitutions: HashMap<QName, Vec<Arc<ElementDecl>>>,
    visited: HashSet<QName>,
    // Heads currently being expanded; cyclic substitution groups are
    // not walked twice.
    active_substitutions: HashSet<QName>,
}

impl<'a> SchemaWalker<'a> {
    /// Create a walker, building the substitution-group pre-index from
    /// the collection's global elements in declaration order.
    pub fn new(collection: &'a SchemaCollection) -> Self {
        let mut substitutions: HashMap<QName, Vec<Arc<ElementDecl>>> = HashMap::new();
        for element in collection.elements_in_order() {
            if let Some(head) = &element.substitution_group {
                substitutions
                    .entry(head.clone())
                    .or_default()
                    .push(Arc::clone(element));
            }
        }

        Self {
            collection,
            scope_cache: ScopeCache::new(),
            user_recognized: HashSet::new(),
            substitutions,
            visited: HashSet::new(),
            active_substitutions: HashSet::new(),
        }
    }

    /// Register simple-type QNames the caller handles natively
    pub fn with_user_recognized_types(mut self, types: HashSet<QName>) -> Self {
        self.user_recognized = types;
        self
    }

    /// The substitutes registered for a group head, in declaration order
    pub fn substitutes_of(&self, head: &QName) -> &[Arc<ElementDecl>] {
        self.substitutions
            .get(head)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Walk the schema from the named root element.
    pub fn walk(&mut self, root: &QName, visitor: &mut dyn SchemaVisitor) -> Result<()> {
        self.visited.clear();
        self.active_substitutions.clear();
        let element = Arc::clone(self.collection.resolve_element(root)?);
        self.walk_element(&element, Occurs::once(), visitor)
    }

    fn walk_element(
        &mut self,
        element: &Arc<ElementDecl>,
        occurs: Occurs,
        visitor: &mut dyn SchemaVisitor,
    ) -> Result<()> {
        let substitutes = self.substitutions.get(&element.name).cloned();

        match substitutes {
            Some(substitutes) if self.active_substitutions.insert(element.name.clone()) => {
                visitor.on_enter_substitution_group(element)?;
                self.walk_single(element, occurs, visitor)?;
                for substitute in &substitutes {
                    self.walk_element(substitute, Occurs::once(), visitor)?;
                }
                visitor.on_exit_substitution_group(element)?;
                self.active_substitutions.remove(&element.name);
                Ok(())
            }
            _ => self.walk_single(element, occurs, visitor),
        }
    }

    fn walk_single(
        &mut self,
        element: &Arc<ElementDecl>,
        occurs: Occurs,
        visitor: &mut dyn SchemaVisitor,
    ) -> Result<()> {
        let scope = self.scope_of_element(element)?;
        let previously_visited = self.visited.contains(&element.name);

        visitor.on_enter_element(element, occurs, &scope.type_info, previously_visited)?;

        if !previously_visited {
            self.visited.insert(element.name.clone());

            for attribute in &scope.attributes {
                visitor.on_visit_attribute(element, attribute)?;
            }
            if let Some(any_attribute) = &scope.any_attribute {
                visitor.on_visit_any_attribute(element, any_attribute)?;
            }

            if let Some(particle) = scope.particle.clone() {
                self.walk_particle(&particle, visitor)?;
            }
        }

        visitor.on_exit_element(element, &scope.type_info, previously_visited)
    }

    fn walk_particle(
        &mut self,
        particle: &Particle,
        visitor: &mut dyn SchemaVisitor,
    ) -> Result<()> {
        match &particle.term {
            Term::Element(element_ref) => {
                let element = self.resolve_element_ref(element_ref)?;
                self.walk_element(&element, particle.occurs, visitor)
            }
            Term::Group(kind, children) => {
                self.walk_group(*kind, particle.occurs, children, visitor)
            }
            Term::GroupRef(name) => {
                let group = Arc::clone(self.collection.resolve_group(name)?);
                self.walk_group(group.kind, particle.occurs, &group.particles, visitor)
            }
            Term::Any(any) => visitor.on_visit_any(any, particle.occurs),
        }
    }

    fn walk_group(
        &mut self,
        kind: GroupKind,
        occurs: Occurs,
        children: &[Particle],
        visitor: &mut dyn SchemaVisitor,
    ) -> Result<()> {
        match kind {
            GroupKind::Sequence => visitor.on_enter_sequence_group(occurs)?,
            GroupKind::Choice => visitor.on_enter_choice_group(occurs)?,
            GroupKind::All => visitor.on_enter_all_group(occurs)?,
        }

        for child in children {
            self.walk_particle(child, visitor)?;
        }

        match kind {
            GroupKind::Sequence => visitor.on_exit_sequence_group(),
            GroupKind::Choice => visitor.on_exit_choice_group(),
            GroupKind::All => visitor.on_exit_all_group(),
        }
    }

    // An element reference resolves to the global declaration; the
    // reference only contributes its occurrence bounds (already carried
    // by the particle).
    fn resolve_element_ref(&self, element_ref: &ElementRef) -> Result<Arc<ElementDecl>> {
        match element_ref {
            ElementRef::Decl(decl) => Ok(Arc::clone(decl)),
            ElementRef::Ref(name) => Ok(Arc::clone(self.collection.resolve_element(name)?)),
        }
    }

    /// Compute the scope of an element's type.
    pub fn scope_of_element(&mut self, element: &ElementDecl) -> Result<Arc<Scope>> {
        let mut scoper = Scoper::new(
            self.collection,
            &mut self.scope_cache,
            &self.user_recognized,
        );

        if let Some(inline) = &element.inline_type {
            scoper.scope_of(inline)
        } else if let Some(type_name) = &element.type_name {
            scoper.scope_of_name(type_name)
        } else {
            // No declared type: anyType, carrying text but no children.
            Ok(Arc::new(Scope {
                type_info: Arc::new(builtin_info(&QName::xsd("anyType"))?),
                attributes: Vec::new(),
                particle: None,
                any_attribute: None,
            }))
        }
    }

    /// The schema collection this walker traverses
    pub fn collection(&self) -> &SchemaCollection {
        self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::components::{ComplexTypeDef, SimpleTypeDef};

    #[derive(Default)]
    struct EventLog {
        events: Vec<String>,
    }

    impl SchemaVisitor for EventLog {
        fn on_enter_element(
            &mut self,
            element: &Arc<ElementDecl>,
            _occurs: Occurs,
            _type_info: &Arc<SimpleTypeInfo>,
            previously_visited: bool,
        ) -> Result<()> {
            self.events.push(format!(
                "enter {}{}",
                element.name.local_name,
                if previously_visited { " (again)" } else { "" }
            ));
            Ok(())
        }

        fn on_exit_element(
            &mut self,
            element: &Arc<ElementDecl>,
            _type_info: &Arc<SimpleTypeInfo>,
            _previously_visited: bool,
        ) -> Result<()> {
            self.events.push(format!("exit {}", element.name.local_name));
            Ok(())
        }

        fn on_visit_attribute(
            &mut self,
            _element: &Arc<ElementDecl>,
            attribute: &ResolvedAttribute,
        ) -> Result<()> {
            self.events
                .push(format!("attr {}", attribute.name.local_name));
            Ok(())
        }

        fn on_enter_substitution_group(&mut self, base: &Arc<ElementDecl>) -> Result<()> {
            self.events
                .push(format!("enter subst {}", base.name.local_name));
            Ok(())
        }

        fn on_exit_substitution_group(&mut self, base: &Arc<ElementDecl>) -> Result<()> {
            self.events
                .push(format!("exit subst {}", base.name.local_name));
            Ok(())
        }

        fn on_enter_sequence_group(&mut self, _occurs: Occurs) -> Result<()> {
            self.events.push("enter seq".to_string());
            Ok(())
        }

        fn on_exit_sequence_group(&mut self) -> Result<()> {
            self.events.push("exit seq".to_string());
            Ok(())
        }
    }

    fn two_child_collection() -> SchemaCollection {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("root")).with_inline_type(TypeDef::Complex(
                    ComplexTypeDef::direct(
                        Some(Particle::sequence(
                            Occurs::once(),
                            vec![
                                Particle::element(
                                    Occurs::once(),
                                    ElementDecl::new(QName::local("a"))
                                        .with_type_name(QName::xsd("string")),
                                ),
                                Particle::element(
                                    Occurs::once(),
                                    ElementDecl::new(QName::local("b"))
                                        .with_type_name(QName::xsd("int")),
                                ),
                            ],
                        )),
                        vec![],
                    ),
                )),
            )
            .unwrap();
        collection
    }

    #[test]
    fn test_walk_event_order() {
        let collection = two_child_collection();
        let mut walker = SchemaWalker::new(&collection);
        let mut log = EventLog::default();
        walker.walk(&QName::local("root"), &mut log).unwrap();

        assert_eq!(
            log.events,
            vec![
                "enter root",
                "enter seq",
                "enter a",
                "exit a",
                "enter b",
                "exit b",
                "exit seq",
                "exit root",
            ]
        );
    }

    #[test]
    fn test_walk_substitution_group() {
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
        collection
            .add_element(
                ElementDecl::new(QName::local("secondMap"))
                    .with_inline_type(TypeDef::Complex(ComplexTypeDef::empty()))
                    .with_substitution_group(QName::local("record")),
            )
            .unwrap();

        let mut walker = SchemaWalker::new(&collection);
        let mut log = EventLog::default();
        walker.walk(&QName::local("record"), &mut log).unwrap();

        assert_eq!(
            log.events,
            vec![
                "enter subst record",
                "enter record",
                "exit record",
                "enter firstMap",
                "exit firstMap",
                "enter secondMap",
                "exit secondMap",
                "exit subst record",
            ]
        );
    }

    #[test]
    fn test_recursive_schema_terminates() {
        // tree -> node, node -> node (recursion through the child ref).
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

        let mut walker = SchemaWalker::new(&collection);
        let mut log = EventLog::default();
        walker.walk(&QName::local("node"), &mut log).unwrap();

        assert_eq!(
            log.events,
            vec![
                "enter node",
                "enter seq",
                "enter node (again)",
                "exit node",
                "exit seq",
                "exit node",
            ]
        );
    }

    #[test]
    fn test_attributes_visited_before_children() {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("root")).with_inline_type(TypeDef::Complex(
                    ComplexTypeDef::direct(
                        Some(Particle::element(
                            Occurs::once(),
                            ElementDecl::new(QName::local("child"))
                                .with_type_name(QName::xsd("string")),
                        )),
                        vec![crate::schema::components::AttrUse::Decl(Arc::new(
                            crate::schema::components::AttributeDecl::new(QName::local("id"))
                                .with_type_name(QName::xsd("ID")),
                        ))],
                    ),
                )),
            )
            .unwrap();

        let mut walker = SchemaWalker::new(&collection);
        let mut log = EventLog::default();
        walker.walk(&QName::local("root"), &mut log).unwrap();

        assert_eq!(
            log.events,
            vec![
                "enter root",
                "attr id",
                "enter child",
                "exit child",
                "exit root",
            ]
        );
    }

    #[test]
    fn test_simple_typed_element() {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("item")).with_inline_type(TypeDef::Simple(
                    SimpleTypeDef::restriction(QName::xsd("token"), vec![]),
                )),
            )
            .unwrap();

        let mut walker = SchemaWalker::new(&collection);
        let mut log = EventLog::default();
        walker.walk(&QName::local("item"), &mut log).unwrap();
        assert_eq!(log.events, vec!["enter item", "exit item"]);
    }
}
