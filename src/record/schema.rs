//! Record schema model
//!
//! A record schema mirrors the XSD structurally: one record per element,
//! attribute fields first, the element content as the last field. Schemas
//! serialize to and from a compact JSON form; recursion is broken
//! with named references.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value as Json};

use crate::error::{Error, Result};
use crate::namespaces::QName;

/// One field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field schema
    pub schema: RecordSchema,
}

/// The `xmlSchemas` property linking a record schema to its XSD
#[derive(Debug, Clone, PartialEq)]
pub struct XmlSchemasProperty {
    /// Base URI for resolving schema locations
    pub base_uri: Option<String>,
    /// Schema URLs
    pub urls: Vec<String>,
    /// Schema file paths
    pub files: Vec<String>,
    /// The root element the schema collection is walked from
    pub root_tag: QName,
}

/// The kinds of record schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// No value
    Null,
    /// True/false
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// Single-precision float
    Float,
    /// Double-precision float
    Double,
    /// Byte sequence
    Bytes,
    /// Character data
    String,
    /// A named enumeration of symbols
    Enum {
        /// Enum name
        name: String,
        /// Symbols in ordinal order
        symbols: Vec<String>,
    },
    /// A sequence of items
    Array {
        /// Item schema
        items: RecordSchema,
    },
    /// String-keyed map
    Map {
        /// Value schema
        values: RecordSchema,
    },
    /// One of several member schemas, tagged by index
    Union {
        /// Members in declared order
        members: Vec<RecordSchema>,
    },
    /// A named record
    Record {
        /// Record name (the element local name)
        name: String,
        /// The element's XML namespace
        namespace: Option<String>,
        /// Fields: attributes first, content last
        fields: Vec<Field>,
        /// XSD linkage, present on the root record
        xml_schemas: Option<XmlSchemasProperty>,
    },
    /// A reference to a previously defined record, by name
    Ref(String),
}

/// A cheaply cloneable handle to a schema node
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    inner: Arc<SchemaKind>,
}

impl RecordSchema {
    /// Wrap a schema kind
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            inner: Arc::new(kind),
        }
    }

    /// The null schema
    pub fn null() -> Self {
        Self::new(SchemaKind::Null)
    }

    /// The boolean schema
    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    /// The int schema
    pub fn int() -> Self {
        Self::new(SchemaKind::Int)
    }

    /// The long schema
    pub fn long() -> Self {
        Self::new(SchemaKind::Long)
    }

    /// The float schema
    pub fn float() -> Self {
        Self::new(SchemaKind::Float)
    }

    /// The double schema
    pub fn double() -> Self {
        Self::new(SchemaKind::Double)
    }

    /// The bytes schema
    pub fn bytes() -> Self {
        Self::new(SchemaKind::Bytes)
    }

    /// The string schema
    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    /// An enum schema
    pub fn enum_(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self::new(SchemaKind::Enum {
            name: name.into(),
            symbols,
        })
    }

    /// An array schema
    pub fn array(items: RecordSchema) -> Self {
        Self::new(SchemaKind::Array { items })
    }

    /// A map schema
    pub fn map(values: RecordSchema) -> Self {
        Self::new(SchemaKind::Map { values })
    }

    /// A union schema
    pub fn union(members: Vec<RecordSchema>) -> Self {
        Self::new(SchemaKind::Union { members })
    }

    /// A record schema
    pub fn record(
        name: impl Into<String>,
        namespace: Option<String>,
        fields: Vec<Field>,
    ) -> Self {
        Self::new(SchemaKind::Record {
            name: name.into(),
            namespace,
            fields,
            xml_schemas: None,
        })
    }

    /// A named reference
    pub fn named_ref(name: impl Into<String>) -> Self {
        Self::new(SchemaKind::Ref(name.into()))
    }

    /// The schema kind
    pub fn kind(&self) -> &SchemaKind {
        &self.inner
    }

    /// True for the null schema
    pub fn is_null(&self) -> bool {
        matches!(self.kind(), SchemaKind::Null)
    }

    /// The union members, if this is a union
    pub fn union_members(&self) -> Option<&[RecordSchema]> {
        match self.kind() {
            SchemaKind::Union { members } => Some(members),
            _ => None,
        }
    }

    /// The index of the null member, if this is a union holding one
    pub fn null_member_index(&self) -> Option<usize> {
        self.union_members()?
            .iter()
            .position(|m| m.is_null())
    }

    /// The record fields, if this is a record
    pub fn record_fields(&self) -> Option<&[Field]> {
        match self.kind() {
            SchemaKind::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// The record name, if this is a record
    pub fn record_name(&self) -> Option<&str> {
        match self.kind() {
            SchemaKind::Record { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The `xmlSchemas` property, if present on this record
    pub fn xml_schemas(&self) -> Option<&XmlSchemasProperty> {
        match self.kind() {
            SchemaKind::Record { xml_schemas, .. } => xml_schemas.as_ref(),
            _ => None,
        }
    }

    /// Attach the `xmlSchemas` property to a record schema
    pub fn with_xml_schemas(self, property: XmlSchemasProperty) -> Result<Self> {
        match self.kind().clone() {
            SchemaKind::Record {
                name,
                namespace,
                fields,
                ..
            } => Ok(Self::new(SchemaKind::Record {
                name,
                namespace,
                fields,
                xml_schemas: Some(property),
            })),
            _ => Err(Error::Schema(
                "only record schemas carry the xmlSchemas property".to_string(),
            )),
        }
    }

    /// Every named record reachable from this schema, keyed by name.
    /// Named references terminate the walk, so recursion is safe.
    pub fn named_types(&self) -> HashMap<String, RecordSchema> {
        let mut out = HashMap::new();
        self.collect_named(&mut out);
        out
    }

    fn collect_named(&self, out: &mut HashMap<String, RecordSchema>) {
        match self.kind() {
            SchemaKind::Record { name, fields, .. } => {
                if out.contains_key(name) {
                    return;
                }
                out.insert(name.clone(), self.clone());
                for field in fields {
                    field.schema.collect_named(out);
                }
            }
            SchemaKind::Array { items } => items.collect_named(out),
            SchemaKind::Map { values } => values.collect_named(out),
            SchemaKind::Union { members } => {
                for member in members {
                    member.collect_named(out);
                }
            }
            _ => {}
        }
    }

    /// Resolve a named reference against a name registry; non-reference
    /// schemas resolve to themselves.
    pub fn resolve<'s>(
        &'s self,
        names: &'s HashMap<String, RecordSchema>,
    ) -> Result<&'s RecordSchema> {
        match self.kind() {
            SchemaKind::Ref(name) => names
                .get(name)
                .ok_or_else(|| Error::Schema(format!("unresolved record reference '{}'", name))),
            _ => Ok(self),
        }
    }

    // ---------------------------------------------------------------
    // JSON conversion
    // ---------------------------------------------------------------

    /// Serialize to the JSON schema form
    pub fn to_json(&self) -> Json {
        let mut defined = Vec::new();
        self.to_json_inner(&mut defined)
    }

    fn to_json_inner(&self, defined: &mut Vec<String>) -> Json {
        match self.kind() {
            SchemaKind::Null => json!("null"),
            SchemaKind::Boolean => json!("boolean"),
            SchemaKind::Int => json!("int"),
            SchemaKind::Long => json!("long"),
            SchemaKind::Float => json!("float"),
            SchemaKind::Double => json!("double"),
            SchemaKind::Bytes => json!("bytes"),
            SchemaKind::String => json!("string"),
            SchemaKind::Enum { name, symbols } => json!({
                "type": "enum",
                "name": name,
                "symbols": symbols,
            }),
            SchemaKind::Array { items } => json!({
                "type": "array",
                "items": items.to_json_inner(defined),
            }),
            SchemaKind::Map { values } => json!({
                "type": "map",
                "values": values.to_json_inner(defined),
            }),
            SchemaKind::Union { members } => Json::Array(
                members
                    .iter()
                    .map(|m| m.to_json_inner(defined))
                    .collect(),
            ),
            SchemaKind::Ref(name) => json!(name),
            SchemaKind::Record {
                name,
                namespace,
                fields,
                xml_schemas,
            } => {
                if defined.iter().any(|d| d == name) {
                    return json!(name);
                }
                defined.push(name.clone());

                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("record"));
                obj.insert("name".to_string(), json!(name));
                if let Some(ns) = namespace {
                    obj.insert("namespace".to_string(), json!(ns));
                }
                obj.insert(
                    "fields".to_string(),
                    Json::Array(
                        fields
                            .iter()
                            .map(|f| {
                                json!({
                                    "name": f.name,
                                    "type": f.schema.to_json_inner(defined),
                                })
                            })
                            .collect(),
                    ),
                );
                if let Some(prop) = xml_schemas {
                    obj.insert("xmlSchemas".to_string(), xml_schemas_to_json(prop));
                }
                Json::Object(obj)
            }
        }
    }

    /// Parse the JSON schema form
    pub fn from_json(json: &Json) -> Result<Self> {
        let mut defined = Vec::new();
        Self::from_json_inner(json, &mut defined)
    }

    fn from_json_inner(json: &Json, defined: &mut Vec<String>) -> Result<Self> {
        match json {
            Json::String(name) => match name.as_str() {
                "null" => Ok(Self::null()),
                "boolean" => Ok(Self::boolean()),
                "int" => Ok(Self::int()),
                "long" => Ok(Self::long()),
                "float" => Ok(Self::float()),
                "double" => Ok(Self::double()),
                "bytes" => Ok(Self::bytes()),
                "string" => Ok(Self::string()),
                other if defined.iter().any(|d| d == other) => {
                    Ok(Self::named_ref(other.to_string()))
                }
                other => Err(Error::Schema(format!("unknown schema type '{}'", other))),
            },
            Json::Array(members) => {
                let mut parsed = Vec::with_capacity(members.len());
                for member in members {
                    parsed.push(Self::from_json_inner(member, defined)?);
                }
                Ok(Self::union(parsed))
            }
            Json::Object(obj) => {
                let type_name = obj
                    .get("type")
                    .and_then(Json::as_str)
                    .ok_or_else(|| Error::Schema("schema object lacks a type".to_string()))?;
                match type_name {
                    "record" => {
                        let name = obj
                            .get("name")
                            .and_then(Json::as_str)
                            .ok_or_else(|| Error::Schema("record lacks a name".to_string()))?
                            .to_string();
                        defined.push(name.clone());

                        let namespace = obj
                            .get("namespace")
                            .and_then(Json::as_str)
                            .map(str::to_string);
                        let mut fields = Vec::new();
                        for field in obj
                            .get("fields")
                            .and_then(Json::as_array)
                            .ok_or_else(|| Error::Schema("record lacks fields".to_string()))?
                        {
                            let field_name = field
                                .get("name")
                                .and_then(Json::as_str)
                                .ok_or_else(|| {
                                    Error::Schema("record field lacks a name".to_string())
                                })?
                                .to_string();
                            let field_type = field.get("type").ok_or_else(|| {
                                Error::Schema("record field lacks a type".to_string())
                            })?;
                            fields.push(Field {
                                name: field_name,
                                schema: Self::from_json_inner(field_type, defined)?,
                            });
                        }

                        let xml_schemas = obj
                            .get("xmlSchemas")
                            .map(xml_schemas_from_json)
                            .transpose()?;

                        Ok(Self::new(SchemaKind::Record {
                            name,
                            namespace,
                            fields,
                            xml_schemas,
                        }))
                    }
                    "enum" => {
                        let name = obj
                            .get("name")
                            .and_then(Json::as_str)
                            .ok_or_else(|| Error::Schema("enum lacks a name".to_string()))?;
                        let symbols = obj
                            .get("symbols")
                            .and_then(Json::as_array)
                            .ok_or_else(|| Error::Schema("enum lacks symbols".to_string()))?
                            .iter()
                            .filter_map(Json::as_str)
                            .map(str::to_string)
                            .collect();
                        Ok(Self::enum_(name, symbols))
                    }
                    "array" => {
                        let items = obj
                            .get("items")
                            .ok_or_else(|| Error::Schema("array lacks items".to_string()))?;
                        Ok(Self::array(Self::from_json_inner(items, defined)?))
                    }
                    "map" => {
                        let values = obj
                            .get("values")
                            .ok_or_else(|| Error::Schema("map lacks values".to_string()))?;
                        Ok(Self::map(Self::from_json_inner(values, defined)?))
                    }
                    other => Self::from_json_inner(&json!(other), defined),
                }
            }
            other => Err(Error::Schema(format!(
                "unsupported schema JSON node: {}",
                other
            ))),
        }
    }
}

fn xml_schemas_to_json(prop: &XmlSchemasProperty) -> Json {
    let mut obj = Map::new();
    if let Some(base_uri) = &prop.base_uri {
        obj.insert("baseUri".to_string(), json!(base_uri));
    }
    if !prop.urls.is_empty() {
        obj.insert("urls".to_string(), json!(prop.urls));
    }
    if !prop.files.is_empty() {
        obj.insert("files".to_string(), json!(prop.files));
    }
    obj.insert(
        "rootTag".to_string(),
        json!({
            "namespace": prop.root_tag.namespace_or_empty(),
            "localPart": prop.root_tag.local_name,
        }),
    );
    Json::Object(obj)
}

fn xml_schemas_from_json(json: &Json) -> Result<XmlSchemasProperty> {
    let root_tag = json
        .get("rootTag")
        .ok_or_else(|| Error::UnlinkedSchema("xmlSchemas lacks a rootTag".to_string()))?;
    let local = root_tag
        .get("localPart")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::UnlinkedSchema("rootTag lacks a localPart".to_string()))?;
    let namespace = root_tag.get("namespace").and_then(Json::as_str).unwrap_or("");

    let string_list = |key: &str| -> Vec<String> {
        json.get(key)
            .and_then(Json::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Json::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok(XmlSchemasProperty {
        base_uri: json
            .get("baseUri")
            .and_then(Json::as_str)
            .map(str::to_string),
        urls: string_list("urls"),
        files: string_list("files"),
        root_tag: QName::new(Some(namespace), local),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> RecordSchema {
        RecordSchema::record(
            "root",
            Some("urn:test".to_string()),
            vec![
                Field {
                    name: "id".to_string(),
                    schema: RecordSchema::union(vec![
                        RecordSchema::null(),
                        RecordSchema::string(),
                    ]),
                },
                Field {
                    name: "content".to_string(),
                    schema: RecordSchema::array(RecordSchema::union(vec![
                        RecordSchema::record(
                            "item",
                            None,
                            vec![Field {
                                name: "content".to_string(),
                                schema: RecordSchema::long(),
                            }],
                        ),
                        RecordSchema::string(),
                    ])),
                },
            ],
        )
    }

    #[test]
    fn test_json_round_trip() {
        let schema = sample_record();
        let json = schema.to_json();
        let parsed = RecordSchema::from_json(&json).unwrap();
        assert_eq!(schema, parsed);
    }

    #[test]
    fn test_recursive_schema_uses_refs() {
        let node = RecordSchema::record(
            "node",
            None,
            vec![Field {
                name: "content".to_string(),
                schema: RecordSchema::array(RecordSchema::union(vec![
                    RecordSchema::named_ref("node"),
                ])),
            }],
        );

        let json = node.to_json();
        // The nested occurrence is the bare name.
        assert_eq!(json["fields"][0]["type"]["items"][0], json!("node"));

        let parsed = RecordSchema::from_json(&json).unwrap();
        let names = parsed.named_types();
        assert!(names.contains_key("node"));

        let inner = match parsed.record_fields().unwrap()[0].schema.kind() {
            SchemaKind::Array { items } => items.union_members().unwrap()[0].clone(),
            other => panic!("expected array, got {:?}", other),
        };
        assert!(matches!(inner.kind(), SchemaKind::Ref(name) if name == "node"));
        assert!(inner.resolve(&names).is_ok());
    }

    #[test]
    fn test_union_null_member_index() {
        let union = RecordSchema::union(vec![RecordSchema::string(), RecordSchema::null()]);
        assert_eq!(union.null_member_index(), Some(1));
        assert_eq!(RecordSchema::string().null_member_index(), None);
    }

    #[test]
    fn test_xml_schemas_property_round_trip() {
        let schema = sample_record()
            .with_xml_schemas(XmlSchemasProperty {
                base_uri: Some("http://example.com/".to_string()),
                urls: vec![],
                files: vec!["schema.xsd".to_string()],
                root_tag: QName::namespaced("urn:test", "root"),
            })
            .unwrap();

        let json = schema.to_json();
        assert_eq!(json["xmlSchemas"]["rootTag"]["localPart"], json!("root"));

        let parsed = RecordSchema::from_json(&json).unwrap();
        let prop = parsed.xml_schemas().unwrap();
        assert_eq!(prop.files, vec!["schema.xsd"]);
        assert_eq!(prop.root_tag, QName::namespaced("urn:test", "root"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(RecordSchema::from_json(&json!("frob")).is_err());
    }

    #[test]
    fn test_with_xml_schemas_requires_record() {
        let err = RecordSchema::string()
            .with_xml_schemas(XmlSchemasProperty {
                base_uri: None,
                urls: vec![],
                files: vec![],
                root_tag: QName::local("x"),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
