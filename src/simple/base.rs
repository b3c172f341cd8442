//! Built-in simple types
//!
//! The base simple types the transducer understands, the registry of XSD
//! built-in type names, and the implicit facets each built-in carries.
//! The upstream schema model does not ship the built-ins' facets, so
//! they are enumerated here as XSD 1.0 declares them.
//!
//! Reference: https://www.w3.org/TR/xmlschema-2/#built-in-datatypes

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::namespaces::{QName, XSD_NAMESPACE};
use crate::simple::facets::{Facet, FacetKind, FacetSet};
use crate::simple::info::SimpleTypeInfo;

/// The base simple types recognized downstream.
///
/// Derived built-ins (`token`, `NCName`, `unsignedShort`, ...) reduce to
/// one of these plus an implicit facet set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseSimpleType {
    /// `xsd:anyType` (the root of the hierarchy)
    AnyType,
    /// `xsd:anySimpleType`
    AnySimpleType,
    /// `xsd:string` and the name family
    String,
    /// `xsd:boolean`
    Boolean,
    /// `xsd:decimal` and the unbounded integer family
    Decimal,
    /// `xsd:double`
    Double,
    /// `xsd:float`
    Float,
    /// `xsd:base64Binary`
    Base64Binary,
    /// `xsd:hexBinary`
    HexBinary,
    /// `xsd:QName`
    QName,
    /// `xsd:ID` (usable as a map key)
    Id,
    /// `xsd:duration`
    Duration,
    /// `xsd:dateTime`
    DateTime,
    /// `xsd:time`
    Time,
    /// `xsd:date`
    Date,
    /// `xsd:gYearMonth`
    GYearMonth,
    /// `xsd:gYear`
    GYear,
    /// `xsd:gMonthDay`
    GMonthDay,
    /// `xsd:gDay`
    GDay,
    /// `xsd:gMonth`
    GMonth,
    /// `xsd:long`
    Long,
    /// `xsd:int`
    Int,
    /// `xsd:short`
    Short,
    /// `xsd:byte`
    Byte,
    /// `xsd:unsignedLong`
    UnsignedLong,
    /// `xsd:unsignedInt`
    UnsignedInt,
    /// `xsd:unsignedShort`
    UnsignedShort,
    /// `xsd:unsignedByte`
    UnsignedByte,
}

impl BaseSimpleType {
    /// True for the bounded and unbounded integer family and decimal
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BaseSimpleType::Decimal
                | BaseSimpleType::Double
                | BaseSimpleType::Float
                | BaseSimpleType::Long
                | BaseSimpleType::Int
                | BaseSimpleType::Short
                | BaseSimpleType::Byte
                | BaseSimpleType::UnsignedLong
                | BaseSimpleType::UnsignedInt
                | BaseSimpleType::UnsignedShort
                | BaseSimpleType::UnsignedByte
        )
    }

    /// True for types whose values are character data with no further
    /// structure (the string/name family and the date/time family)
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            BaseSimpleType::AnyType
                | BaseSimpleType::AnySimpleType
                | BaseSimpleType::String
                | BaseSimpleType::Id
                | BaseSimpleType::Duration
                | BaseSimpleType::DateTime
                | BaseSimpleType::Time
                | BaseSimpleType::Date
                | BaseSimpleType::GYearMonth
                | BaseSimpleType::GYear
                | BaseSimpleType::GMonthDay
                | BaseSimpleType::GDay
                | BaseSimpleType::GMonth
        )
    }

    /// True for binary-valued types
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            BaseSimpleType::Base64Binary | BaseSimpleType::HexBinary
        )
    }
}

struct Builtin {
    base: BaseSimpleType,
    parent: Option<&'static str>,
    facets: &'static [(FacetKind, &'static str)],
}

// Patterns below are the XSD 1.0 implicit patterns with the \i and \c
// multi-character escapes expanded to explicit classes.
static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    use BaseSimpleType as B;
    use FacetKind as F;

    let mut m = HashMap::new();
    let mut add = |name: &'static str,
                   base: B,
                   parent: Option<&'static str>,
                   facets: &'static [(F, &'static str)]| {
        m.insert(name, Builtin { base, parent, facets });
    };

    add("anyType", B::AnyType, None, &[]);
    add("anySimpleType", B::AnySimpleType, Some("anyType"), &[]);

    // String family
    add("string", B::String, Some("anySimpleType"), &[(F::WhiteSpace, "preserve")]);
    add("normalizedString", B::String, Some("string"), &[(F::WhiteSpace, "replace")]);
    add("token", B::String, Some("normalizedString"), &[(F::WhiteSpace, "collapse")]);
    add(
        "language",
        B::String,
        Some("token"),
        &[(F::Pattern, "[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*")],
    );
    add("NMTOKEN", B::String, Some("token"), &[(F::Pattern, "[\\-.0-9:A-Za-z_]+")]);
    add("Name", B::String, Some("token"), &[(F::Pattern, "[:A-Za-z_][\\-.0-9:A-Za-z_]*")]);
    add("NCName", B::String, Some("Name"), &[(F::Pattern, "[A-Za-z_][\\-.0-9A-Za-z_]*")]);
    add("ID", B::Id, Some("NCName"), &[]);
    add("IDREF", B::String, Some("NCName"), &[]);
    add("ENTITY", B::String, Some("NCName"), &[]);
    add("anyURI", B::String, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);

    // Booleans, numbers
    add("boolean", B::Boolean, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("decimal", B::Decimal, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("float", B::Float, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("double", B::Double, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add(
        "integer",
        B::Decimal,
        Some("decimal"),
        &[(F::FractionDigits, "0"), (F::Pattern, "[\\-+]?[0-9]+")],
    );
    add("nonPositiveInteger", B::Decimal, Some("integer"), &[(F::MaxInclusive, "0")]);
    add("negativeInteger", B::Decimal, Some("nonPositiveInteger"), &[(F::MaxInclusive, "-1")]);
    add(
        "long",
        B::Long,
        Some("integer"),
        &[
            (F::MinInclusive, "-9223372036854775808"),
            (F::MaxInclusive, "9223372036854775807"),
        ],
    );
    add(
        "int",
        B::Int,
        Some("long"),
        &[(F::MinInclusive, "-2147483648"), (F::MaxInclusive, "2147483647")],
    );
    add(
        "short",
        B::Short,
        Some("int"),
        &[(F::MinInclusive, "-32768"), (F::MaxInclusive, "32767")],
    );
    add(
        "byte",
        B::Byte,
        Some("short"),
        &[(F::MinInclusive, "-128"), (F::MaxInclusive, "127")],
    );
    add("nonNegativeInteger", B::Decimal, Some("integer"), &[(F::MinInclusive, "0")]);
    add("positiveInteger", B::Decimal, Some("nonNegativeInteger"), &[(F::MinInclusive, "1")]);
    add(
        "unsignedLong",
        B::UnsignedLong,
        Some("nonNegativeInteger"),
        &[(F::MinInclusive, "0"), (F::MaxInclusive, "18446744073709551615")],
    );
    add(
        "unsignedInt",
        B::UnsignedInt,
        Some("unsignedLong"),
        &[(F::MaxInclusive, "4294967295")],
    );
    add(
        "unsignedShort",
        B::UnsignedShort,
        Some("unsignedInt"),
        &[(F::MaxInclusive, "65535")],
    );
    add(
        "unsignedByte",
        B::UnsignedByte,
        Some("unsignedShort"),
        &[(F::MaxInclusive, "255")],
    );

    // Binary, names, dates
    add("hexBinary", B::HexBinary, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("base64Binary", B::Base64Binary, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("QName", B::QName, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("NOTATION", B::QName, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("duration", B::Duration, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("dateTime", B::DateTime, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("time", B::Time, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("date", B::Date, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("gYearMonth", B::GYearMonth, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("gYear", B::GYear, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("gMonthDay", B::GMonthDay, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("gDay", B::GDay, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);
    add("gMonth", B::GMonth, Some("anySimpleType"), &[(F::WhiteSpace, "collapse")]);

    // List built-ins reduce to lists over their item type elsewhere; the
    // registry still needs them so references resolve.
    add("NMTOKENS", B::String, Some("NMTOKEN"), &[]);
    add("IDREFS", B::String, Some("IDREF"), &[]);
    add("ENTITIES", B::String, Some("ENTITY"), &[]);

    m
});

// The built-in list types, expressed as (list name, item name).
const LIST_BUILTINS: &[(&str, &str)] = &[
    ("NMTOKENS", "NMTOKEN"),
    ("IDREFS", "IDREF"),
    ("ENTITIES", "ENTITY"),
];

/// Whether the given QName names an XSD built-in simple type
pub fn is_builtin(name: &QName) -> bool {
    name.namespace.as_deref() == Some(XSD_NAMESPACE)
        && BUILTINS.contains_key(name.local_name.as_str())
}

/// The implicit facets declared directly on an XSD built-in type.
///
/// Returns None for QNames outside the built-in registry. The result is
/// only this type's own facets; use [`builtin_info`] for the effective
/// set merged down the derivation chain.
pub fn facet_set_for(name: &QName) -> Option<FacetSet> {
    if name.namespace.as_deref() != Some(XSD_NAMESPACE) {
        return None;
    }
    let builtin = BUILTINS.get(name.local_name.as_str())?;
    let mut facets = FacetSet::new();
    for (kind, value) in builtin.facets {
        facets.set(*kind, Facet::new(*value));
    }
    Some(facets)
}

fn effective_facets(local: &str) -> FacetSet {
    let mut chain = Vec::new();
    let mut cursor = Some(local);
    while let Some(name) = cursor {
        chain.push(name);
        cursor = BUILTINS.get(name).and_then(|b| b.parent);
    }

    let mut merged = FacetSet::new();
    for name in chain.into_iter().rev() {
        if let Some(own) = facet_set_for(&QName::xsd(name)) {
            merged = FacetSet::merge(&merged, &own);
        }
    }
    merged
}

/// Resolve a built-in type QName to its [`SimpleTypeInfo`], with the
/// facets merged down the built-in derivation chain.
pub fn builtin_info(name: &QName) -> Result<SimpleTypeInfo> {
    let local = name.local_name.as_str();
    if name.namespace.as_deref() != Some(XSD_NAMESPACE) {
        return Err(Error::UnknownBaseType(name.clone()));
    }

    if let Some(&(_, item)) = LIST_BUILTINS.iter().find(|(list, _)| *list == local) {
        let item_info = builtin_info(&QName::xsd(item))?;
        return Ok(SimpleTypeInfo::List {
            item: Box::new(item_info),
            facets: FacetSet::new().with(FacetKind::MinLength, "1"),
        });
    }

    let builtin = BUILTINS
        .get(local)
        .ok_or_else(|| Error::UnknownBaseType(name.clone()))?;

    Ok(SimpleTypeInfo::Atomic {
        base: builtin.base,
        facets: effective_facets(local),
        user_recognized: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_builtin() {
        assert!(is_builtin(&QName::xsd("string")));
        assert!(is_builtin(&QName::xsd("unsignedByte")));
        assert!(!is_builtin(&QName::xsd("frobnicate")));
        assert!(!is_builtin(&QName::local("string")));
    }

    #[test]
    fn test_facet_set_for_token() {
        let facets = facet_set_for(&QName::xsd("token")).unwrap();
        assert_eq!(
            facets.get(FacetKind::WhiteSpace).unwrap().value,
            "collapse"
        );
    }

    #[test]
    fn test_effective_facets_follow_chain() {
        // NCName inherits token's collapse through Name.
        let info = builtin_info(&QName::xsd("NCName")).unwrap();
        match info {
            SimpleTypeInfo::Atomic { base, facets, .. } => {
                assert_eq!(base, BaseSimpleType::String);
                assert_eq!(
                    facets.get(FacetKind::WhiteSpace).unwrap().value,
                    "collapse"
                );
                assert!(facets.get(FacetKind::Pattern).is_some());
            }
            other => panic!("expected atomic, got {:?}", other),
        }
    }

    #[test]
    fn test_bounded_integer_facets() {
        let info = builtin_info(&QName::xsd("unsignedByte")).unwrap();
        match info {
            SimpleTypeInfo::Atomic { base, facets, .. } => {
                assert_eq!(base, BaseSimpleType::UnsignedByte);
                assert_eq!(facets.get(FacetKind::MaxInclusive).unwrap().value, "255");
                // minInclusive 0 inherited from unsignedLong's chain.
                assert_eq!(facets.get(FacetKind::MinInclusive).unwrap().value, "0");
            }
            other => panic!("expected atomic, got {:?}", other),
        }
    }

    #[test]
    fn test_unbounded_integer_is_decimal_based() {
        let info = builtin_info(&QName::xsd("positiveInteger")).unwrap();
        match info {
            SimpleTypeInfo::Atomic { base, facets, .. } => {
                assert_eq!(base, BaseSimpleType::Decimal);
                assert_eq!(facets.get(FacetKind::MinInclusive).unwrap().value, "1");
                assert_eq!(facets.get(FacetKind::FractionDigits).unwrap().value, "0");
            }
            other => panic!("expected atomic, got {:?}", other),
        }
    }

    #[test]
    fn test_list_builtin() {
        let info = builtin_info(&QName::xsd("NMTOKENS")).unwrap();
        assert!(matches!(info, SimpleTypeInfo::List { .. }));
    }

    #[test]
    fn test_unknown_base_type() {
        let err = builtin_info(&QName::xsd("nonsense")).unwrap_err();
        assert!(matches!(err, Error::UnknownBaseType(_)));
    }
}
