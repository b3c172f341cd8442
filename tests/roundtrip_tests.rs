//! End-to-end transcoding tests: XML → binary → XML over programmatic
//! schema collections.

use std::sync::Arc;

use xmlrec::config::TranscoderConfig;
use xmlrec::machine::StateMachine;
use xmlrec::namespaces::QName;
use xmlrec::record::{generate_record_schema, RecordSchema};
use xmlrec::schema::{
    AttrUse, AttributeDecl, AttributeUse, ComplexTypeDef, ElementDecl, Occurs, Particle,
    SchemaCollection, SimpleTypeDef, TypeDef,
};
use xmlrec::transducer::{decode_to_events, encode_events, RecordReader};
use xmlrec::xml::{read_events, XmlEvent};

fn string_element(name: &str) -> ElementDecl {
    ElementDecl::new(QName::local(name)).with_type_name(QName::xsd("string"))
}

fn linked_schema(collection: &SchemaCollection, root: &str) -> RecordSchema {
    let config = TranscoderConfig::builder()
        .schema_file("schema.xsd")
        .root_tag(QName::local(root))
        .build()
        .unwrap();
    generate_record_schema(
        collection,
        &QName::local(root),
        Some(config.to_xml_schemas_property()),
    )
    .unwrap()
}

fn compile(collection: &SchemaCollection, root: &str) -> Arc<StateMachine> {
    StateMachine::compile(collection, &QName::local(root)).unwrap()
}

// Structural view of an event stream: elements and text only, with
// whitespace-only text dropped (the writer never carries it).
fn structural(events: &[XmlEvent]) -> Vec<XmlEvent> {
    events
        .iter()
        .filter(|e| match e {
            XmlEvent::StartElement { .. } | XmlEvent::EndElement { .. } => true,
            XmlEvent::Characters(text) => !text.chars().all(char::is_whitespace),
            _ => false,
        })
        .cloned()
        .collect()
}

fn round_trip(collection: &SchemaCollection, root: &str, xml: &str) -> Vec<XmlEvent> {
    let machine = compile(collection, root);
    let schema = linked_schema(collection, root);

    let events = read_events(xml).unwrap();
    let (bytes, reports) = encode_events(&machine, &schema, events).unwrap();
    assert!(reports.is_empty(), "unexpected mismatches: {:?}", reports);

    decode_to_events(&machine, &schema, bytes).unwrap()
}

#[test]
fn root_only_round_trips() {
    let mut collection = SchemaCollection::new();
    collection
        .add_element(
            ElementDecl::new(QName::local("root"))
                .with_inline_type(TypeDef::Complex(ComplexTypeDef::empty())),
        )
        .unwrap();

    let machine = compile(&collection, "root");
    let schema = linked_schema(&collection, "root");

    let events = read_events("<root/>").unwrap();
    let (bytes, _) = encode_events(&machine, &schema, events.clone()).unwrap();
    // One record whose single field is NULL: nothing on the wire.
    assert!(bytes.is_empty());

    let replayed = decode_to_events(&machine, &schema, bytes).unwrap();
    assert_eq!(structural(&replayed), structural(&events));
}

fn two_children_collection() -> SchemaCollection {
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
fn two_children_in_sequence_round_trip() {
    let collection = two_children_collection();
    let replayed = round_trip(&collection, "root", "<root><a>hi</a><b>42</b></root>");

    assert_eq!(
        structural(&replayed),
        vec![
            XmlEvent::StartElement {
                name: QName::local("root"),
                attributes: vec![],
            },
            XmlEvent::StartElement {
                name: QName::local("a"),
                attributes: vec![],
            },
            XmlEvent::Characters("hi".to_string()),
            XmlEvent::EndElement {
                name: QName::local("a")
            },
            XmlEvent::StartElement {
                name: QName::local("b"),
                attributes: vec![],
            },
            XmlEvent::Characters("42".to_string()),
            XmlEvent::EndElement {
                name: QName::local("b")
            },
            XmlEvent::EndElement {
                name: QName::local("root")
            },
        ]
    );
}

#[test]
fn binary_round_trips_byte_for_byte() {
    let collection = two_children_collection();
    let machine = compile(&collection, "root");
    let schema = linked_schema(&collection, "root");

    let events = read_events("<root><a>hi</a><b>42</b></root>").unwrap();
    let (bytes, _) = encode_events(&machine, &schema, events).unwrap();

    let replayed = decode_to_events(&machine, &schema, bytes.clone()).unwrap();
    let (bytes_again, _) = encode_events(&machine, &schema, replayed).unwrap();
    assert_eq!(bytes, bytes_again);
}

#[test]
fn choice_backtracks_onto_long_branch() {
    let short_branch = Particle::sequence(
        Occurs::once(),
        vec![
            Particle::element(Occurs::once(), string_element("q")),
            Particle::element(Occurs::once(), string_element("e")),
        ],
    );
    let long_branch = Particle::sequence(
        Occurs::once(),
        vec![
            Particle::element_ref(Occurs::once(), QName::local("q")),
            Particle::element_ref(Occurs::once(), QName::local("e")),
            Particle::element(
                Occurs::once(),
                ElementDecl::new(QName::local("u"))
                    .with_type_name(QName::xsd("unsignedLong")),
            ),
        ],
    );

    let mut collection = SchemaCollection::new();
    collection.add_element(string_element("q")).unwrap();
    collection.add_element(string_element("e")).unwrap();
    collection
        .add_element(
            ElementDecl::new(QName::local("root")).with_inline_type(TypeDef::Complex(
                ComplexTypeDef::direct(
                    Some(Particle::choice(
                        Occurs::once(),
                        vec![short_branch, long_branch],
                    )),
                    vec![],
                ),
            )),
        )
        .unwrap();

    let replayed = round_trip(
        &collection,
        "root",
        "<root><q>x</q><e>y</e><u>9007199254740993</u></root>",
    );
    let texts: Vec<&XmlEvent> = replayed
        .iter()
        .filter(|e| matches!(e, XmlEvent::Characters(_)))
        .collect();
    assert_eq!(
        texts,
        vec![
            &XmlEvent::Characters("x".to_string()),
            &XmlEvent::Characters("y".to_string()),
            &XmlEvent::Characters("9007199254740993".to_string()),
        ]
    );
}

#[test]
fn substitution_group_tags_the_union() {
    let value_type = ComplexTypeDef::direct(
        Some(Particle::element(Occurs::optional(), string_element("value"))),
        vec![AttrUse::Decl(Arc::new(
            AttributeDecl::new(QName::local("id"))
                .with_type_name(QName::xsd("ID"))
                .with_use(AttributeUse::Required),
        ))],
    );

    let mut collection = SchemaCollection::new();
    collection
        .add_element(
            ElementDecl::new(QName::local("record"))
                .with_inline_type(TypeDef::Complex(value_type.clone())),
        )
        .unwrap();
    collection
        .add_element(
            ElementDecl::new(QName::local("firstMap"))
                .with_inline_type(TypeDef::Complex(value_type.clone()))
                .with_substitution_group(QName::local("record")),
        )
        .unwrap();
    collection
        .add_element(
            ElementDecl::new(QName::local("secondMap"))
                .with_inline_type(TypeDef::Complex(value_type))
                .with_substitution_group(QName::local("record")),
        )
        .unwrap();

    let machine = compile(&collection, "record");
    let schema = linked_schema(&collection, "record");

    let events = read_events(r#"<firstMap id="x"><value/></firstMap>"#).unwrap();
    let (bytes, reports) = encode_events(&machine, &schema, events.clone()).unwrap();
    assert!(reports.is_empty());

    // The leading union tag selects firstMap (member 1, zigzag 2).
    assert_eq!(bytes[0], 2);

    let replayed = decode_to_events(&machine, &schema, bytes).unwrap();
    assert_eq!(structural(&replayed), structural(&events));
}

#[test]
fn mixed_content_preserves_interleaved_text() {
    let mut collection = SchemaCollection::new();
    collection
        .add_element(
            ElementDecl::new(QName::local("m")).with_inline_type(TypeDef::Complex(
                ComplexTypeDef::direct(
                    Some(Particle::sequence(
                        Occurs::once(),
                        vec![
                            Particle::element(
                                Occurs::new(0, None),
                                ElementDecl::new(QName::local("num"))
                                    .with_type_name(QName::xsd("unsignedLong")),
                            ),
                            Particle::element(Occurs::new(0, None), string_element("word")),
                        ],
                    )),
                    vec![],
                )
                .mixed(),
            )),
        )
        .unwrap();

    let replayed = round_trip(
        &collection,
        "m",
        "<m>before <num>7</num> middle <word>w</word> after</m>",
    );

    assert_eq!(
        structural(&replayed),
        vec![
            XmlEvent::StartElement {
                name: QName::local("m"),
                attributes: vec![],
            },
            XmlEvent::Characters("before ".to_string()),
            XmlEvent::StartElement {
                name: QName::local("num"),
                attributes: vec![],
            },
            XmlEvent::Characters("7".to_string()),
            XmlEvent::EndElement {
                name: QName::local("num")
            },
            XmlEvent::Characters(" middle ".to_string()),
            XmlEvent::StartElement {
                name: QName::local("word"),
                attributes: vec![],
            },
            XmlEvent::Characters("w".to_string()),
            XmlEvent::EndElement {
                name: QName::local("word")
            },
            XmlEvent::Characters(" after".to_string()),
            XmlEvent::EndElement {
                name: QName::local("m")
            },
        ]
    );
}

#[test]
fn nillable_element_with_default() {
    let mut collection = SchemaCollection::new();
    collection
        .add_element(
            ElementDecl::new(QName::local("defaulted"))
                .with_type_name(QName::xsd("string"))
                .nillable()
                .with_default("hello"),
        )
        .unwrap();

    let machine = compile(&collection, "defaulted");
    let schema = linked_schema(&collection, "defaulted");

    // xsi:nil="true" produces a null content field.
    let nil_events = read_events(
        r#"<defaulted xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:nil="true"/>"#,
    )
    .unwrap();
    let (nil_bytes, _) = encode_events(&machine, &schema, nil_events).unwrap();
    let replayed = decode_to_events(&machine, &schema, nil_bytes).unwrap();
    assert!(!replayed
        .iter()
        .any(|e| matches!(e, XmlEvent::Characters(_))));

    // An empty element falls back to the declared default.
    let empty_events = read_events("<defaulted/>").unwrap();
    let (bytes, _) = encode_events(&machine, &schema, empty_events).unwrap();
    let replayed = decode_to_events(&machine, &schema, bytes).unwrap();
    assert!(replayed
        .iter()
        .any(|e| matches!(e, XmlEvent::Characters(t) if t == "hello")));
}

#[test]
fn attributes_round_trip_with_defaults() {
    let mut collection = SchemaCollection::new();
    collection
        .add_element(
            ElementDecl::new(QName::local("root")).with_inline_type(TypeDef::Complex(
                ComplexTypeDef::direct(
                    None,
                    vec![
                        AttrUse::Decl(Arc::new(
                            AttributeDecl::new(QName::local("count"))
                                .with_type_name(QName::xsd("int"))
                                .with_use(AttributeUse::Required),
                        )),
                        AttrUse::Decl(Arc::new(
                            AttributeDecl::new(QName::local("mode"))
                                .with_type_name(QName::xsd("string"))
                                .with_default("fast"),
                        )),
                        AttrUse::Decl(Arc::new(
                            AttributeDecl::new(QName::local("note"))
                                .with_type_name(QName::xsd("string")),
                        )),
                    ],
                ),
            )),
        )
        .unwrap();

    let replayed = round_trip(&collection, "root", r#"<root count="5"/>"#);

    match &replayed[1] {
        XmlEvent::StartElement { attributes, .. } => {
            // Required value, default applied, absent optional dropped.
            assert_eq!(
                attributes,
                &vec![
                    (QName::local("count"), "5".to_string()),
                    (QName::local("mode"), "fast".to_string()),
                ]
            );
        }
        other => panic!("expected a start tag, got {:?}", other),
    }
}

#[test]
fn list_content_round_trips() {
    let mut collection = SchemaCollection::new();
    collection
        .add_element(
            ElementDecl::new(QName::local("nums")).with_inline_type(TypeDef::Simple(
                SimpleTypeDef::list(QName::xsd("unsignedLong")),
            )),
        )
        .unwrap();

    let replayed = round_trip(&collection, "nums", "<nums> 1 2  3 </nums>");
    assert!(replayed
        .iter()
        .any(|e| matches!(e, XmlEvent::Characters(t) if t == "1 2 3")));
}

#[test]
fn union_content_prefers_non_textual_members() {
    let mut collection = SchemaCollection::new();
    collection
        .add_element(
            ElementDecl::new(QName::local("v")).with_inline_type(TypeDef::Simple(
                SimpleTypeDef::union(vec![QName::xsd("long"), QName::xsd("string")]),
            )),
        )
        .unwrap();

    let machine = compile(&collection, "v");
    let schema = linked_schema(&collection, "v");

    // "42" fits the long member: one tag byte + zigzag(42).
    let (bytes, _) = encode_events(&machine, &schema, read_events("<v>42</v>").unwrap()).unwrap();
    assert_eq!(bytes, vec![0, 84]);

    // "forty-two" falls through to the string member.
    let (bytes, _) =
        encode_events(&machine, &schema, read_events("<v>forty-two</v>").unwrap()).unwrap();
    assert_eq!(bytes[0], 2);

    let replayed = decode_to_events(&machine, &schema, bytes).unwrap();
    assert!(replayed
        .iter()
        .any(|e| matches!(e, XmlEvent::Characters(t) if t == "forty-two")));
}

#[test]
fn qname_content_reintroduces_prefix() {
    let mut collection = SchemaCollection::new();
    collection
        .add_element(
            ElementDecl::new(QName::local("ref")).with_type_name(QName::xsd("QName")),
        )
        .unwrap();

    let machine = compile(&collection, "ref");
    let schema = linked_schema(&collection, "ref");

    let events =
        read_events(r#"<ref xmlns:p="urn:types">p:thing</ref>"#).unwrap();
    let (bytes, _) = encode_events(&machine, &schema, events).unwrap();
    let replayed = decode_to_events(&machine, &schema, bytes).unwrap();

    // The namespace comes back under a generated prefix opened before
    // the start tag and closed after the end tag.
    assert_eq!(
        replayed,
        vec![
            XmlEvent::StartDocument,
            XmlEvent::StartPrefixMapping {
                prefix: "ns0".to_string(),
                namespace: "urn:types".to_string(),
            },
            XmlEvent::StartElement {
                name: QName::local("ref"),
                attributes: vec![],
            },
            XmlEvent::Characters("ns0:thing".to_string()),
            XmlEvent::EndElement {
                name: QName::local("ref")
            },
            XmlEvent::EndPrefixMapping {
                prefix: "ns0".to_string()
            },
            XmlEvent::EndDocument,
        ]
    );
}

#[test]
fn reader_rejects_unlinked_schema() {
    let collection = two_children_collection();
    let unlinked =
        generate_record_schema(&collection, &QName::local("root"), None).unwrap();

    let err = RecordReader::new(unlinked).unwrap_err();
    assert!(matches!(err, xmlrec::Error::UnlinkedSchema(_)));
}

#[test]
fn whitespace_between_children_does_not_survive() {
    let collection = two_children_collection();
    let replayed = round_trip(
        &collection,
        "root",
        "<root>\n  <a>hi</a>\n  <b>42</b>\n</root>",
    );
    let texts: Vec<&XmlEvent> = replayed
        .iter()
        .filter(|e| matches!(e, XmlEvent::Characters(_)))
        .collect();
    assert_eq!(texts.len(), 2);
}

#[test]
fn namespaced_document_round_trips() {
    let ns = "urn:example";
    let mut collection = SchemaCollection::new();
    collection.add_namespace(ns);
    collection
        .add_element(
            ElementDecl::new(QName::namespaced(ns, "root")).with_inline_type(TypeDef::Complex(
                ComplexTypeDef::direct(
                    Some(Particle::element(
                        Occurs::once(),
                        ElementDecl::new(QName::namespaced(ns, "leaf"))
                            .with_type_name(QName::xsd("string")),
                    )),
                    vec![],
                ),
            )),
        )
        .unwrap();

    let machine = StateMachine::compile(&collection, &QName::namespaced(ns, "root")).unwrap();
    let config = TranscoderConfig::builder()
        .schema_file("schema.xsd")
        .root_tag(QName::namespaced(ns, "root"))
        .build()
        .unwrap();
    let schema = generate_record_schema(
        &collection,
        &QName::namespaced(ns, "root"),
        Some(config.to_xml_schemas_property()),
    )
    .unwrap();

    let events =
        read_events(r#"<root xmlns="urn:example"><leaf>x</leaf></root>"#).unwrap();
    let (bytes, _) = encode_events(&machine, &schema, events.clone()).unwrap();
    let replayed = decode_to_events(&machine, &schema, bytes).unwrap();

    assert_eq!(structural(&replayed), structural(&events));
}
