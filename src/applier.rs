//! Schema applier
//!
//! Decorates each ELEMENT document node with its record-schema handle:
//! the matched record (or map), the union index when the containing
//! context is a union, and the count of child records. Structural
//! mismatches are reported per element, never fatally; the transducer
//! skips undecorated subtrees.

use std::collections::HashMap;

use crate::doc::document::{DocId, UserContent};
use crate::doc::pool::NodePool;
use crate::error::{Error, Result};
use crate::machine::node::{StateKind, StateMachine};
use crate::namespaces::QName;
use crate::pathfinder::DocumentPath;
use crate::record::schema::{RecordSchema, SchemaKind};
use crate::simple::base::BaseSimpleType;

/// A non-fatal structural mismatch between document and record schema
#[derive(Debug, Clone)]
pub struct MismatchReport {
    /// The element the mismatch was found on
    pub element: QName,
    /// What failed to line up
    pub reason: String,
}

/// Applies a record schema over a finished document tree
pub struct SchemaApplier<'m> {
    machine: &'m StateMachine,
    names: HashMap<String, RecordSchema>,
    reports: Vec<MismatchReport>,
}

impl<'m> SchemaApplier<'m> {
    /// Create an applier for one state machine
    pub fn new(machine: &'m StateMachine) -> Self {
        Self {
            machine,
            names: HashMap::new(),
            reports: Vec::new(),
        }
    }

    /// The mismatches found by the last [`SchemaApplier::apply`]
    pub fn reports(&self) -> &[MismatchReport] {
        &self.reports
    }

    /// Decorate the document tree under `path` with `schema`.
    pub fn apply(&mut self, path: &mut DocumentPath, schema: &RecordSchema) -> Result<()> {
        self.names = schema.named_types();
        self.reports.clear();

        let root_element = self.root_element(&path.pool, path.root)?;
        let root_qname = self
            .element_qname(&path.pool, root_element)
            .ok_or_else(|| Error::RecordSchemaMismatch("the root is not an element".to_string()))?;

        match schema.kind() {
            SchemaKind::Union { members } => {
                match self.match_member(members, &root_qname) {
                    Some((index, member)) => {
                        self.annotate(&mut path.pool, root_element, member, Some(index as u32))
                    }
                    None => Err(Error::RecordSchemaMismatch(format!(
                        "no union member matches root element {}",
                        root_qname
                    ))),
                }
            }
            SchemaKind::Record { name, .. } => {
                if name != &root_qname.local_name {
                    return Err(Error::RecordSchemaMismatch(format!(
                        "record {} does not match root element {}",
                        name, root_qname
                    )));
                }
                self.annotate(&mut path.pool, root_element, schema.clone(), None)
            }
            SchemaKind::Map { .. } => {
                self.annotate(&mut path.pool, root_element, schema.clone(), None)
            }
            other => Err(Error::RecordSchemaMismatch(format!(
                "unsupported root schema kind {:?}",
                other
            ))),
        }
    }

    // The single element under the root state (which may be a
    // substitution group).
    fn root_element(&self, pool: &NodePool, root: DocId) -> Result<DocId> {
        let mut doc = root;
        loop {
            let state = pool.doc(doc).state;
            if self.machine.node(state).element().is_some() {
                return Ok(doc);
            }
            let iteration = pool.doc(doc).iteration;
            doc = pool
                .doc(doc)
                .branches_at(iteration)
                .map(|(_, d)| d)
                .next()
                .ok_or_else(|| {
                    Error::RecordSchemaMismatch("the document tree has no root element".to_string())
                })?;
        }
    }

    fn element_qname(&self, pool: &NodePool, doc: DocId) -> Option<QName> {
        let state = pool.doc(doc).state;
        self.machine.node(state).element().map(|e| e.qname.clone())
    }

    fn annotate(
        &mut self,
        pool: &mut NodePool,
        doc: DocId,
        schema: RecordSchema,
        union_index: Option<u32>,
    ) -> Result<()> {
        // Resolve the element-facing record: a map's values record holds
        // the fields. A map-typed element must carry an ID attribute to
        // serve as the key.
        let record = match schema.kind() {
            SchemaKind::Map { values } => {
                if !self.has_id_attribute(pool, doc) {
                    let qname = self.element_qname(pool, doc).unwrap_or_else(|| {
                        QName::local("?")
                    });
                    self.reports.push(MismatchReport {
                        element: qname,
                        reason: "map-typed element lacks an ID attribute".to_string(),
                    });
                    return Ok(());
                }
                values.resolve(&self.names)?.clone()
            }
            SchemaKind::Record { .. } => schema.clone(),
            SchemaKind::Ref(_) => schema.resolve(&self.names)?.clone(),
            other => {
                return Err(Error::RecordSchemaMismatch(format!(
                    "element cannot take schema kind {:?}",
                    other
                )))
            }
        };

        // The content field (last) supplies the child member context.
        let content_schema = record
            .record_fields()
            .and_then(|fields| fields.last())
            .map(|f| f.schema.clone());

        let (item_members, items_are_union): (Vec<RecordSchema>, bool) =
            match content_schema.as_ref().map(|s| s.kind()) {
                Some(SchemaKind::Array { items }) => match items.kind() {
                    SchemaKind::Union { members } => (members.clone(), true),
                    _ => (vec![items.clone()], false),
                },
                _ => (Vec::new(), false),
            };

        let children = self.collect_child_elements(pool, doc);
        let mut child_count = 0u32;

        for child in &children {
            let child_qname = match self.element_qname(pool, *child) {
                Some(qname) => qname,
                None => continue, // wildcard slot: never annotated
            };

            match self.match_member(&item_members, &child_qname) {
                Some((index, member)) => {
                    child_count += pool.doc(*child).iteration;
                    let tag = items_are_union.then_some(index as u32);
                    self.annotate(pool, *child, member, tag)?;
                }
                None => {
                    self.reports.push(MismatchReport {
                        element: child_qname.clone(),
                        reason: format!(
                            "no record member for child element {}",
                            child_qname
                        ),
                    });
                }
            }
        }

        pool.doc_mut(doc).user_slot = Some(UserContent {
            schema,
            union_index,
            child_count,
        });
        Ok(())
    }

    // Element and wildcard document nodes reachable through group nodes,
    // across every iteration, without descending into elements.
    fn collect_child_elements(&self, pool: &NodePool, doc: DocId) -> Vec<DocId> {
        let mut out = Vec::new();
        let mut queue: Vec<DocId> = pool.doc(doc).all_children().collect();
        while let Some(d) = queue.pop() {
            let state = pool.doc(d).state;
            match self.machine.node(state).kind {
                StateKind::Element(_) | StateKind::Any(_) => {
                    if !out.contains(&d) {
                        out.push(d);
                    }
                }
                _ => queue.extend(pool.doc(d).all_children()),
            }
        }
        out
    }

    // Match a record or map member to an element by local name and
    // namespace (maps match through their values record).
    fn match_member(
        &self,
        members: &[RecordSchema],
        qname: &QName,
    ) -> Option<(usize, RecordSchema)> {
        for (index, member) in members.iter().enumerate() {
            let resolved = match member.resolve(&self.names) {
                Ok(r) => r.clone(),
                Err(_) => continue,
            };
            let matches = match resolved.kind() {
                SchemaKind::Record {
                    name, namespace, ..
                } => name == &qname.local_name && namespace.as_deref() == qname.namespace.as_deref(),
                SchemaKind::Map { values } => values
                    .resolve(&self.names)
                    .ok()
                    .and_then(|v| v.record_name().map(|n| n == qname.local_name))
                    .unwrap_or(false),
                _ => false,
            };
            if matches {
                return Some((index, resolved));
            }
        }
        None
    }

    fn has_id_attribute(&self, pool: &NodePool, doc: DocId) -> bool {
        let state = pool.doc(doc).state;
        self.machine
            .node(state)
            .element()
            .map(|e| {
                e.attributes.iter().any(|a| {
                    matches!(
                        a.type_info.as_ref(),
                        crate::simple::info::SimpleTypeInfo::Atomic {
                            base: BaseSimpleType::Id,
                            ..
                        }
                    )
                })
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::QName;
    use crate::pathfinder::PathFinder;
    use crate::record::generator::generate_record_schema;
    use crate::schema::components::{
        ComplexTypeDef, ElementDecl, Occurs, Particle, TypeDef,
    };
    use crate::schema::SchemaCollection;
    use crate::xml::reader::read_events;

    fn string_element(name: &str) -> ElementDecl {
        ElementDecl::new(QName::local(name)).with_type_name(QName::xsd("string"))
    }

    fn sequence_collection() -> SchemaCollection {
        let mut collection = SchemaCollection::new();
        collection
            .add_element(
                ElementDecl::new(QName::local("root")).with_inline_type(TypeDef::Complex(
                    ComplexTypeDef::direct(
                        Some(Particle::sequence(
                            Occurs::once(),
                            vec![
                                Particle::element(Occurs::once(), string_element("a")),
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
    fn test_apply_annotates_all_elements() {
        let collection = sequence_collection();
        let machine =
            crate::machine::node::StateMachine::compile(&collection, &QName::local("root"))
                .unwrap();
        let schema = generate_record_schema(&collection, &QName::local("root"), None).unwrap();

        let mut path = PathFinder::find(
            &machine,
            read_events("<root><a>hi</a><b>42</b></root>").unwrap(),
        )
        .unwrap();

        let mut applier = SchemaApplier::new(&machine);
        applier.apply(&mut path, &schema).unwrap();
        assert!(applier.reports().is_empty());

        let root_content = path.user_content(path.root).unwrap();
        assert_eq!(root_content.child_count, 2);
        assert_eq!(root_content.union_index, None);

        // The children got union indices within the content item union.
        let seq_doc = path.pool.doc(path.root).child_at(1, 0).unwrap();
        let a_doc = path.pool.doc(seq_doc).child_at(1, 0).unwrap();
        let b_doc = path.pool.doc(seq_doc).child_at(1, 1).unwrap();
        assert_eq!(path.user_content(a_doc).unwrap().union_index, Some(0));
        assert_eq!(path.user_content(b_doc).unwrap().union_index, Some(1));
    }

    #[test]
    fn test_apply_union_root_for_substitution_group() {
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

        let machine =
            crate::machine::node::StateMachine::compile(&collection, &QName::local("record"))
                .unwrap();
        let schema =
            generate_record_schema(&collection, &QName::local("record"), None).unwrap();

        let mut path =
            PathFinder::find(&machine, read_events("<firstMap/>").unwrap()).unwrap();
        let mut applier = SchemaApplier::new(&machine);
        applier.apply(&mut path, &schema).unwrap();

        let root_element = applier.root_element(&path.pool, path.root).unwrap();
        let content = path.user_content(root_element).unwrap();
        assert_eq!(content.union_index, Some(1));
    }

    #[test]
    fn test_mismatch_is_reported_not_fatal() {
        let collection = sequence_collection();
        let machine =
            crate::machine::node::StateMachine::compile(&collection, &QName::local("root"))
                .unwrap();

        // A schema whose content union lacks the 'b' record.
        let schema = RecordSchema::record(
            "root",
            None,
            vec![crate::record::schema::Field {
                name: "content".to_string(),
                schema: RecordSchema::array(RecordSchema::union(vec![RecordSchema::record(
                    "a",
                    None,
                    vec![crate::record::schema::Field {
                        name: "content".to_string(),
                        schema: RecordSchema::string(),
                    }],
                )])),
            }],
        );

        let mut path = PathFinder::find(
            &machine,
            read_events("<root><a>hi</a><b>42</b></root>").unwrap(),
        )
        .unwrap();

        let mut applier = SchemaApplier::new(&machine);
        applier.apply(&mut path, &schema).unwrap();

        assert_eq!(applier.reports().len(), 1);
        assert_eq!(applier.reports()[0].element, QName::local("b"));

        // Only the matched child counts toward array sizing.
        assert_eq!(path.user_content(path.root).unwrap().child_count, 1);
    }
}
