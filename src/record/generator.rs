//! Default record-schema generation
//!
//! Derives the record schema structurally matching an XSD: one record per
//! element with attribute fields first and the content as the last field,
//! arrays of unions for complex content, unions of member records for
//! substitution groups, and named references for recursive elements.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::names::is_valid_ncname;
use crate::namespaces::QName;
use crate::record::schema::{Field, RecordSchema, SchemaKind, XmlSchemasProperty};
use crate::schema::components::{AttributeUse, ElementDecl, Occurs};
use crate::schema::SchemaCollection;
use crate::scope::ResolvedAttribute;
use crate::simple::base::BaseSimpleType;
use crate::simple::facets::FacetKind;
use crate::simple::info::SimpleTypeInfo;
use crate::walker::{SchemaVisitor, SchemaWalker};

/// Generate the default record schema for a root element, attaching the
/// `xmlSchemas` property when one is supplied.
pub fn generate_record_schema(
    collection: &SchemaCollection,
    root: &QName,
    xml_schemas: Option<XmlSchemasProperty>,
) -> Result<RecordSchema> {
    let mut walker = SchemaWalker::new(collection);
    let mut generator = RecordSchemaGenerator::new();
    walker.walk(root, &mut generator)?;
    let schema = generator.finish()?;
    match xml_schemas {
        Some(property) => attach_linkage(schema, property),
        None => Ok(schema),
    }
}

// A union root (substitution group) stores the linkage on its first
// record member.
fn attach_linkage(
    schema: RecordSchema,
    property: XmlSchemasProperty,
) -> Result<RecordSchema> {
    match schema.kind() {
        SchemaKind::Union { members } => {
            let mut rebuilt = members.clone();
            let first = rebuilt
                .iter()
                .position(|m| matches!(m.kind(), SchemaKind::Record { .. }))
                .ok_or_else(|| {
                    Error::Schema("union root has no record member".to_string())
                })?;
            rebuilt[first] = rebuilt[first].clone().with_xml_schemas(property)?;
            Ok(RecordSchema::union(rebuilt))
        }
        _ => schema.with_xml_schemas(property),
    }
}

enum GenFrame {
    Element {
        qname: QName,
        record_name: String,
        type_info: Arc<SimpleTypeInfo>,
        attrs: Vec<Field>,
        children: Vec<RecordSchema>,
        nillable: bool,
    },
    // A previously visited element; resolves to a named reference.
    Visited {
        record_name: String,
    },
    Substitution {
        members: Vec<RecordSchema>,
    },
}

/// Visitor that builds the record schema during a schema walk
pub struct RecordSchemaGenerator {
    stack: Vec<GenFrame>,
    record_names: HashMap<QName, String>,
    used_names: HashSet<String>,
    result: Option<RecordSchema>,
}

impl RecordSchemaGenerator {
    /// Create an empty generator
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            record_names: HashMap::new(),
            used_names: HashSet::new(),
            result: None,
        }
    }

    /// The generated root schema
    pub fn finish(self) -> Result<RecordSchema> {
        self.result
            .ok_or_else(|| Error::Schema("the schema walk produced no records".to_string()))
    }

    fn record_name_for(&mut self, qname: &QName) -> String {
        if let Some(existing) = self.record_names.get(qname) {
            return existing.clone();
        }
        let mut name = qname.local_name.clone();
        let mut counter = 2;
        while self.used_names.contains(&name) {
            name = format!("{}{}", qname.local_name, counter);
            counter += 1;
        }
        self.used_names.insert(name.clone());
        self.record_names.insert(qname.clone(), name.clone());
        name
    }

    fn add_child(&mut self, schema: RecordSchema) {
        fn name_key(schema: &RecordSchema) -> Option<String> {
            match schema.kind() {
                SchemaKind::Record { name, .. } => Some(name.clone()),
                SchemaKind::Ref(name) => Some(name.clone()),
                _ => None,
            }
        }

        // A record and a reference to it stand for the same member.
        let push = |list: &mut Vec<RecordSchema>, schema: RecordSchema| {
            let duplicate = match name_key(&schema) {
                Some(key) => list.iter().any(|c| name_key(c).as_deref() == Some(&key)),
                None => list.contains(&schema),
            };
            if !duplicate {
                list.push(schema);
            }
        };

        for frame in self.stack.iter_mut().rev() {
            match frame {
                GenFrame::Element { children, .. } => {
                    push(children, schema);
                    return;
                }
                GenFrame::Substitution { members } => {
                    push(members, schema);
                    return;
                }
                GenFrame::Visited { .. } => continue,
            }
        }
        self.result = Some(schema);
    }

    fn simple_schema(&mut self, info: &SimpleTypeInfo, name_hint: &str) -> RecordSchema {
        match info {
            SimpleTypeInfo::Atomic { base, facets, .. } => {
                let symbols: Vec<String> = facets
                    .enumeration()
                    .iter()
                    .map(|f| f.value.clone())
                    .collect();
                if !symbols.is_empty()
                    && !base.is_numeric()
                    && symbols.iter().all(|s| is_valid_ncname(s))
                {
                    let mut enum_name = format!("{}Type", name_hint);
                    let mut counter = 2;
                    while self.used_names.contains(&enum_name) {
                        enum_name = format!("{}Type{}", name_hint, counter);
                        counter += 1;
                    }
                    self.used_names.insert(enum_name.clone());
                    return RecordSchema::enum_(enum_name, symbols);
                }

                match base {
                    BaseSimpleType::Boolean => RecordSchema::boolean(),
                    BaseSimpleType::Float => RecordSchema::float(),
                    BaseSimpleType::Double => RecordSchema::double(),
                    BaseSimpleType::Int | BaseSimpleType::Short | BaseSimpleType::Byte => {
                        RecordSchema::int()
                    }
                    BaseSimpleType::UnsignedShort | BaseSimpleType::UnsignedByte => {
                        RecordSchema::int()
                    }
                    BaseSimpleType::Long
                    | BaseSimpleType::UnsignedInt
                    | BaseSimpleType::UnsignedLong => RecordSchema::long(),
                    BaseSimpleType::Decimal => {
                        // Integer-restricted decimals fit a long; the rest
                        // carry full precision as doubles.
                        let integral = facets
                            .get(FacetKind::FractionDigits)
                            .map(|f| f.value == "0")
                            .unwrap_or(false);
                        if integral {
                            RecordSchema::long()
                        } else {
                            RecordSchema::double()
                        }
                    }
                    BaseSimpleType::HexBinary | BaseSimpleType::Base64Binary => {
                        RecordSchema::bytes()
                    }
                    _ => RecordSchema::string(),
                }
            }
            SimpleTypeInfo::List { item, .. } => {
                RecordSchema::array(self.simple_schema(item, name_hint))
            }
            SimpleTypeInfo::Union { members, .. } => {
                let mut schemas: Vec<RecordSchema> = Vec::new();
                for member in members {
                    let schema = self.simple_schema(member, name_hint);
                    if !schemas.contains(&schema) {
                        schemas.push(schema);
                    }
                }
                RecordSchema::union(schemas)
            }
            SimpleTypeInfo::Complex { .. } => RecordSchema::string(),
        }
    }
}

impl Default for RecordSchemaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaVisitor for RecordSchemaGenerator {
    fn on_enter_element(
        &mut self,
        element: &Arc<ElementDecl>,
        _occurs: Occurs,
        type_info: &Arc<SimpleTypeInfo>,
        previously_visited: bool,
    ) -> Result<()> {
        if previously_visited {
            let record_name = self.record_name_for(&element.name);
            self.stack.push(GenFrame::Visited { record_name });
            return Ok(());
        }

        let record_name = self.record_name_for(&element.name);
        self.stack.push(GenFrame::Element {
            qname: element.name.clone(),
            record_name,
            type_info: Arc::clone(type_info),
            attrs: Vec::new(),
            children: Vec::new(),
            nillable: element.nillable,
        });
        Ok(())
    }

    fn on_exit_element(
        &mut self,
        element: &Arc<ElementDecl>,
        _type_info: &Arc<SimpleTypeInfo>,
        _previously_visited: bool,
    ) -> Result<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| Error::Schema("unbalanced walker events".to_string()))?;

        match frame {
            GenFrame::Visited { record_name } => {
                self.add_child(RecordSchema::named_ref(record_name));
                Ok(())
            }
            GenFrame::Element {
                qname,
                record_name,
                type_info,
                attrs,
                children,
                nillable,
            } => {
                let content = match type_info.as_ref() {
                    SimpleTypeInfo::Complex { mixed } => {
                        let mut items = children;
                        if *mixed {
                            let text = RecordSchema::string();
                            if !items.contains(&text) {
                                items.push(text);
                            }
                        }
                        if items.is_empty() {
                            RecordSchema::null()
                        } else {
                            RecordSchema::array(RecordSchema::union(items))
                        }
                    }
                    simple => {
                        let value =
                            self.simple_schema(simple, &qname.local_name);
                        if nillable || element.default_value.is_some() {
                            RecordSchema::union(vec![RecordSchema::null(), value])
                        } else {
                            value
                        }
                    }
                };

                let mut fields = attrs;
                fields.push(Field {
                    name: "content".to_string(),
                    schema: content,
                });

                let record =
                    RecordSchema::record(record_name, qname.namespace.clone(), fields);
                self.add_child(record);
                Ok(())
            }
            GenFrame::Substitution { .. } => {
                Err(Error::Schema("unbalanced substitution group".to_string()))
            }
        }
    }

    fn on_visit_attribute(
        &mut self,
        _element: &Arc<ElementDecl>,
        attribute: &ResolvedAttribute,
    ) -> Result<()> {
        let value = self.simple_schema(&attribute.type_info, &attribute.name.local_name);
        let schema = if attribute.use_ == AttributeUse::Required {
            value
        } else {
            RecordSchema::union(vec![RecordSchema::null(), value])
        };

        if let Some(GenFrame::Element { attrs, .. }) = self.stack.last_mut() {
            attrs.push(Field {
                name: attribute.name.local_name.clone(),
                schema,
            });
        }
        Ok(())
    }

    fn on_enter_substitution_group(&mut self, _base: &Arc<ElementDecl>) -> Result<()> {
        self.stack.push(GenFrame::Substitution {
            members: Vec::new(),
        });
        Ok(())
    }

    fn on_exit_substitution_group(&mut self, _base: &Arc<ElementDecl>) -> Result<()> {
        // The substitution frame sits beneath the frames its members
        // pushed and popped; it is on top again now.
        match self.stack.pop() {
            Some(GenFrame::Substitution { members }) => {
                self.add_child(RecordSchema::union(members));
                Ok(())
            }
            _ => Err(Error::Schema("unbalanced substitution group".to_string())),
        }
    }
}
