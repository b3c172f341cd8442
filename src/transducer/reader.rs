//! Record reader: binary → XML events
//!
//! Mirrors the writer: reads each record's union tag, its attribute
//! fields, and its content field, replaying the document into an XML
//! handler. QName-typed content reintroduces its namespace through
//! freshly allocated prefixes scoped to the element.

use std::collections::HashMap;

use crate::binary::decoder::BinaryDecoder;
use crate::error::{Error, Result};
use crate::machine::node::{ElementState, StateMachine};
use crate::namespaces::{PrefixAllocator, QName};
use crate::record::schema::{RecordSchema, SchemaKind, XmlSchemasProperty};
use crate::simple::base::BaseSimpleType;
use crate::simple::info::SimpleTypeInfo;
use crate::simple::literal::{print_literal, Value};
use crate::xml::events::XmlHandler;

/// Reads the binary form back into an XML event stream
#[derive(Debug)]
pub struct RecordReader {
    schema: RecordSchema,
    names: HashMap<String, RecordSchema>,
    root_tag: QName,
}

impl RecordReader {
    /// Create a reader over a record schema. The schema must carry the
    /// `xmlSchemas` linkage property (on the root record, or on the
    /// first record member when the root is a union).
    pub fn new(schema: RecordSchema) -> Result<Self> {
        let property = Self::linkage(&schema)?;
        let root_tag = property.root_tag.clone();
        let names = schema.named_types();
        Ok(Self {
            schema,
            names,
            root_tag,
        })
    }

    /// The root element the schema is linked to
    pub fn root_tag(&self) -> &QName {
        &self.root_tag
    }

    /// The schema's XSD linkage
    pub fn xml_schemas(&self) -> Result<&XmlSchemasProperty> {
        Self::linkage(&self.schema)
    }

    fn linkage(schema: &RecordSchema) -> Result<&XmlSchemasProperty> {
        if let Some(property) = schema.xml_schemas() {
            return Ok(property);
        }
        if let Some(members) = schema.union_members() {
            for member in members {
                if let Some(property) = member.xml_schemas() {
                    return Ok(property);
                }
            }
        }
        Err(Error::UnlinkedSchema(
            "record schema lacks the xmlSchemas property".to_string(),
        ))
    }

    /// Replay one binary document into the handler.
    pub fn read(
        &self,
        machine: &StateMachine,
        decoder: &mut dyn BinaryDecoder,
        handler: &mut dyn XmlHandler,
    ) -> Result<()> {
        handler.start_document()?;

        let root = match self.schema.kind() {
            SchemaKind::Union { members } => {
                let tag = decoder.read_index()? as usize;
                members
                    .get(tag)
                    .ok_or_else(|| {
                        Error::UnreadableValue(format!("union tag {} out of range", tag))
                    })?
                    .clone()
            }
            _ => self.schema.clone(),
        };

        let mut allocator = PrefixAllocator::new();
        self.read_element(&root, machine, decoder, handler, &mut allocator)?;
        handler.end_document()
    }

    fn read_element(
        &self,
        schema: &RecordSchema,
        machine: &StateMachine,
        decoder: &mut dyn BinaryDecoder,
        handler: &mut dyn XmlHandler,
        allocator: &mut PrefixAllocator,
    ) -> Result<()> {
        let resolved = schema.resolve(&self.names)?.clone();
        match resolved.kind() {
            SchemaKind::Map { values } => {
                // One element per map entry; the key was derived from the
                // ID attribute and is discarded on the way out.
                let values = values.resolve(&self.names)?.clone();
                let mut count = decoder.read_map_start()?;
                while count > 0 {
                    for _ in 0..count {
                        let _key = decoder.read_string()?;
                        self.read_record(&values, machine, decoder, handler, allocator)?;
                    }
                    count = decoder.read_map_next()?;
                }
                Ok(())
            }
            SchemaKind::Record { .. } => {
                self.read_record(&resolved, machine, decoder, handler, allocator)
            }
            other => Err(Error::UnreadableValue(format!(
                "element schema must be a record or map, got {:?}",
                other
            ))),
        }
    }

    fn read_record(
        &self,
        record: &RecordSchema,
        machine: &StateMachine,
        decoder: &mut dyn BinaryDecoder,
        handler: &mut dyn XmlHandler,
        allocator: &mut PrefixAllocator,
    ) -> Result<()> {
        let (name, namespace) = match record.kind() {
            SchemaKind::Record {
                name, namespace, ..
            } => (name.clone(), namespace.clone()),
            other => {
                return Err(Error::UnreadableValue(format!(
                    "expected a record, got {:?}",
                    other
                )))
            }
        };
        let qname = QName::new(namespace, name);
        let element = machine
            .element_by_qname(&qname)
            .map(|id| machine.node(id))
            .and_then(|node| node.element());

        let fields = record
            .record_fields()
            .ok_or_else(|| Error::UnreadableValue("record without fields".to_string()))?;
        if fields.is_empty() {
            return Err(Error::UnreadableValue(format!(
                "record for {} has no content field",
                qname
            )));
        }

        // Attribute fields first.
        let mut attributes: Vec<(QName, String)> = Vec::new();
        for field in &fields[..fields.len() - 1] {
            if let Some(value) = self.read_value(&field.schema, decoder)? {
                let type_info = element.and_then(|e| attribute_info(e, &field.name));
                let text = self.print_value(&value, type_info, &field.schema)?;
                attributes.push((QName::local(field.name.clone()), text));
            }
        }

        let content_schema = fields[fields.len() - 1].schema.clone();
        let type_info = element.map(|e| e.type_info.as_ref());

        match content_schema.kind() {
            SchemaKind::Null => {
                decoder.read_null()?;
                handler.start_element(&qname, &attributes)?;
                handler.end_element(&qname)
            }
            SchemaKind::Array { items } if self.has_structured_items(items) => {
                handler.start_element(&qname, &attributes)?;
                let mut count = decoder.read_array_start()?;
                while count > 0 {
                    for _ in 0..count {
                        self.read_array_item(items, machine, decoder, handler, allocator)?;
                    }
                    count = decoder.read_array_next()?;
                }
                handler.end_element(&qname)
            }
            _ => {
                // Simple content (including list values as arrays of
                // primitives).
                let value = self.read_value(&content_schema, decoder)?;
                match value {
                    None => {
                        handler.start_element(&qname, &attributes)?;
                        handler.end_element(&qname)
                    }
                    Some(value) => {
                        let is_qname_content = matches!(
                            type_info,
                            Some(SimpleTypeInfo::Atomic {
                                base: BaseSimpleType::QName,
                                ..
                            })
                        );
                        if is_qname_content {
                            self.emit_qname_content(
                                &qname,
                                &attributes,
                                &value,
                                allocator,
                                handler,
                            )
                        } else {
                            let text =
                                self.print_value(&value, type_info, &content_schema)?;
                            handler.start_element(&qname, &attributes)?;
                            handler.characters(&text)?;
                            handler.end_element(&qname)
                        }
                    }
                }
            }
        }
    }

    // Array items holding records, maps, or references carry child
    // elements; all-primitive items are a simple list value.
    fn has_structured_items(&self, items: &RecordSchema) -> bool {
        let structured = |schema: &RecordSchema| {
            matches!(
                schema.kind(),
                SchemaKind::Record { .. } | SchemaKind::Map { .. } | SchemaKind::Ref(_)
            )
        };
        match items.kind() {
            SchemaKind::Union { members } => members.iter().any(structured),
            _ => structured(items),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read_array_item(
        &self,
        items: &RecordSchema,
        machine: &StateMachine,
        decoder: &mut dyn BinaryDecoder,
        handler: &mut dyn XmlHandler,
        allocator: &mut PrefixAllocator,
    ) -> Result<()> {
        let member = match items.union_members() {
            Some(members) => {
                let tag = decoder.read_index()? as usize;
                members
                    .get(tag)
                    .ok_or_else(|| {
                        Error::UnreadableValue(format!("item union tag {} out of range", tag))
                    })?
                    .clone()
            }
            None => items.clone(),
        };

        match member.kind() {
            // Mixed content: a string item is interleaved text.
            SchemaKind::String => {
                let text = decoder.read_string()?;
                handler.characters(&text)
            }
            _ => self.read_element(&member, machine, decoder, handler, allocator),
        }
    }

    fn emit_qname_content(
        &self,
        qname: &QName,
        attributes: &[(QName, String)],
        value: &Value,
        allocator: &mut PrefixAllocator,
        handler: &mut dyn XmlHandler,
    ) -> Result<()> {
        let stored = match value {
            Value::String(s) => QName::from_clark(s)?,
            Value::QName(q) => q.clone(),
            other => {
                return Err(Error::UnreadableValue(format!(
                    "QName content holds {:?}",
                    other
                )))
            }
        };

        match &stored.namespace {
            Some(namespace) => {
                // A fresh prefix scoped to this element, opened before
                // the start tag and closed after the end tag.
                let prefix = allocator.allocate();
                handler.start_prefix_mapping(&prefix, namespace)?;
                handler.start_element(qname, attributes)?;
                handler.characters(&format!("{}:{}", prefix, stored.local_name))?;
                handler.end_element(qname)?;
                handler.end_prefix_mapping(&prefix)
            }
            None => {
                handler.start_element(qname, attributes)?;
                handler.characters(&stored.local_name)?;
                handler.end_element(qname)
            }
        }
    }

    // Read a typed value; None stands for a null (absent) value.
    fn read_value(
        &self,
        schema: &RecordSchema,
        decoder: &mut dyn BinaryDecoder,
    ) -> Result<Option<Value>> {
        match schema.kind() {
            SchemaKind::Union { members } => {
                let tag = decoder.read_index()? as usize;
                let member = members.get(tag).ok_or_else(|| {
                    Error::UnreadableValue(format!("union tag {} out of range", tag))
                })?;
                self.read_value(member, decoder)
            }
            SchemaKind::Null => {
                decoder.read_null()?;
                Ok(None)
            }
            SchemaKind::Boolean => Ok(Some(Value::Boolean(decoder.read_boolean()?))),
            SchemaKind::Int => Ok(Some(Value::Int(i64::from(decoder.read_int()?)))),
            SchemaKind::Long => Ok(Some(Value::Int(decoder.read_long()?))),
            SchemaKind::Float => Ok(Some(Value::Float(decoder.read_float()?))),
            SchemaKind::Double => Ok(Some(Value::Double(decoder.read_double()?))),
            SchemaKind::Bytes => Ok(Some(Value::Bytes(decoder.read_bytes()?))),
            SchemaKind::String => Ok(Some(Value::String(decoder.read_string()?))),
            SchemaKind::Enum { symbols, .. } => {
                let ordinal = decoder.read_enum()? as usize;
                let symbol = symbols.get(ordinal).ok_or_else(|| {
                    Error::UnreadableValue(format!("enum ordinal {} out of range", ordinal))
                })?;
                Ok(Some(Value::String(symbol.clone())))
            }
            SchemaKind::Array { items } => {
                let mut values = Vec::new();
                let mut count = decoder.read_array_start()?;
                while count > 0 {
                    for _ in 0..count {
                        match self.read_value(items, decoder)? {
                            Some(v) => values.push(v),
                            None => {}
                        }
                    }
                    count = decoder.read_array_next()?;
                }
                Ok(Some(Value::List(values)))
            }
            other => Err(Error::UnreadableValue(format!(
                "schema kind {:?} is not a simple value",
                other
            ))),
        }
    }

    // Print through the simple-type engine when type information is
    // available; fall back to schema-driven canonical forms.
    fn print_value(
        &self,
        value: &Value,
        type_info: Option<&SimpleTypeInfo>,
        schema: &RecordSchema,
    ) -> Result<String> {
        if let Some(info) = type_info {
            if info.is_simple() {
                if let Ok(text) = print_literal(info, value) {
                    return Ok(text);
                }
            }
        }
        generic_print(value, schema)
    }
}

fn attribute_info<'e>(element: &'e ElementState, name: &str) -> Option<&'e SimpleTypeInfo> {
    element
        .attributes
        .iter()
        .find(|a| a.name.local_name == name)
        .map(|a| a.type_info.as_ref())
}

fn generic_print(value: &Value, schema: &RecordSchema) -> Result<String> {
    use base64::Engine;

    let text = match value {
        Value::Boolean(b) => {
            if *b { "true".to_string() } else { "false".to_string() }
        }
        Value::Int(i) => i.to_string(),
        Value::Unsigned(u) => u.to_string(),
        Value::Float(f) => float_text(f64::from(*f)),
        Value::Double(d) => float_text(*d),
        Value::Decimal(d) => d.normalize().to_string(),
        Value::String(s) => s.clone(),
        Value::QName(q) => q.to_string(),
        Value::Bytes(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        Value::List(items) => {
            let item_schema = match schema.kind() {
                SchemaKind::Array { items } => items.clone(),
                _ => RecordSchema::string(),
            };
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(generic_print(item, &item_schema)?);
            }
            parts.join(" ")
        }
    };
    Ok(text)
}

fn float_text(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        value.to_string()
    }
}
