//! Literal parsing and printing
//!
//! Converts between the lexical space of a simple type and the typed
//! values the binary codec carries, applying whitespace normalization
//! and facet checks on the way in and canonical lexical forms on the
//! way out.

use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{Error, FacetViolation, Result};
use crate::names::is_valid_qname;
use crate::namespaces::{NamespaceContext, QName};
use crate::simple::base::BaseSimpleType;
use crate::simple::facets::{FacetKind, FacetSet};
use crate::simple::info::SimpleTypeInfo;

lazy_static! {
    /// XSD boolean lexical mapping
    pub static ref XSD_BOOLEAN_MAP: HashMap<&'static str, bool> = {
        let mut m = HashMap::new();
        m.insert("false", false);
        m.insert("0", false);
        m.insert("true", true);
        m.insert("1", true);
        m
    };
}

/// A typed simple value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean
    Boolean(bool),
    /// A signed integer (int/short/byte family and long)
    Int(i64),
    /// An unsigned integer beyond the signed range
    Unsigned(u64),
    /// A single-precision float
    Float(f32),
    /// A double-precision float
    Double(f64),
    /// An exact decimal
    Decimal(Decimal),
    /// Binary data (hex or base64 on the lexical side)
    Bytes(Vec<u8>),
    /// Character data
    String(String),
    /// A resolved qualified name
    QName(QName),
    /// A whitespace-separated list of items
    List(Vec<Value>),
}

/// Parse a literal against a simple type, normalizing whitespace and
/// enforcing facets. `ns` supplies prefix resolution for QName values.
pub fn parse_literal(
    info: &SimpleTypeInfo,
    text: &str,
    ns: Option<&NamespaceContext>,
) -> Result<Value> {
    let normalized = info.white_space().normalize(text);

    match info {
        SimpleTypeInfo::Atomic { base, facets, .. } => parse_atomic(*base, facets, &normalized, ns),
        SimpleTypeInfo::List { item, facets } => {
            let items: Vec<&str> = normalized.split_whitespace().collect();
            check_length_facets(facets, items.len())?;

            let mut values = Vec::with_capacity(items.len());
            for token in items {
                values.push(parse_literal(item, token, ns)?);
            }
            Ok(Value::List(values))
        }
        SimpleTypeInfo::Union { members, facets } => {
            check_enumeration(facets, &normalized)?;
            for member in members {
                if let Ok(value) = parse_literal(member, &normalized, ns) {
                    return Ok(value);
                }
            }
            Err(Error::UnreadableValue(format!(
                "'{}' matches no member of the union",
                normalized
            )))
        }
        SimpleTypeInfo::Complex { .. } => Err(Error::Schema(
            "cannot parse a literal against complex content".to_string(),
        )),
    }
}

fn parse_atomic(
    base: BaseSimpleType,
    facets: &FacetSet,
    text: &str,
    ns: Option<&NamespaceContext>,
) -> Result<Value> {
    check_pattern(facets, text)?;
    check_enumeration(facets, text)?;

    let value = match base {
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
        | BaseSimpleType::GMonth => {
            check_length_facets(facets, text.chars().count())?;
            Value::String(text.to_string())
        }
        BaseSimpleType::Boolean => {
            let value = XSD_BOOLEAN_MAP.get(text).copied().ok_or_else(|| {
                Error::UnreadableValue(format!("'{}' is not a valid boolean", text))
            })?;
            Value::Boolean(value)
        }
        BaseSimpleType::Decimal => {
            let dec = Decimal::from_str(text).map_err(|_| {
                Error::UnreadableValue(format!("'{}' is not a valid decimal", text))
            })?;
            check_numeric_bounds(facets, dec)?;
            check_digit_facets(facets, &dec)?;
            Value::Decimal(dec)
        }
        BaseSimpleType::Double => {
            let value = parse_xsd_float(text)?;
            Value::Double(value)
        }
        BaseSimpleType::Float => {
            let value = parse_xsd_float(text)?;
            Value::Float(value as f32)
        }
        BaseSimpleType::Long | BaseSimpleType::Int | BaseSimpleType::Short | BaseSimpleType::Byte => {
            let value = text.parse::<i64>().map_err(|_| {
                Error::UnreadableValue(format!("'{}' is not a valid integer", text))
            })?;
            check_numeric_bounds(facets, Decimal::from(value))?;
            Value::Int(value)
        }
        BaseSimpleType::UnsignedInt | BaseSimpleType::UnsignedShort | BaseSimpleType::UnsignedByte => {
            let value = text.parse::<u64>().map_err(|_| {
                Error::UnreadableValue(format!("'{}' is not a valid unsigned integer", text))
            })?;
            check_numeric_bounds(facets, Decimal::from(value))?;
            Value::Int(value as i64)
        }
        BaseSimpleType::UnsignedLong => {
            let value = text.parse::<u64>().map_err(|_| {
                Error::UnreadableValue(format!("'{}' is not a valid unsigned long", text))
            })?;
            check_numeric_bounds(facets, Decimal::from(value))?;
            if value <= i64::MAX as u64 {
                Value::Int(value as i64)
            } else {
                Value::Unsigned(value)
            }
        }
        BaseSimpleType::HexBinary => {
            let bytes = parse_hex(text)?;
            check_length_facets(facets, bytes.len())?;
            Value::Bytes(bytes)
        }
        BaseSimpleType::Base64Binary => {
            let cleaned = text.replace(' ', "");
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(cleaned.as_bytes())
                .map_err(|_| {
                    Error::UnreadableValue(format!("'{}' is not valid base64", text))
                })?;
            check_length_facets(facets, bytes.len())?;
            Value::Bytes(bytes)
        }
        BaseSimpleType::QName => {
            if !is_valid_qname(text) {
                return Err(Error::UnreadableValue(format!(
                    "'{}' is not a valid QName",
                    text
                )));
            }
            let qname = match ns {
                Some(ctx) => ctx.resolve(text, true)?,
                None => QName::from_clark(text)?,
            };
            Value::QName(qname)
        }
    };

    Ok(value)
}

/// Print a typed value in the canonical lexical form of a simple type.
///
/// QName values with a namespace print in `{namespace}local` form; the
/// reader rewrites them against its allocated prefixes.
pub fn print_literal(info: &SimpleTypeInfo, value: &Value) -> Result<String> {
    match info {
        SimpleTypeInfo::Atomic { base, .. } => print_atomic(*base, value),
        SimpleTypeInfo::List { item, .. } => match value {
            Value::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item_value in items {
                    parts.push(print_literal(item, item_value)?);
                }
                Ok(parts.join(" "))
            }
            single => print_literal(item, single),
        },
        SimpleTypeInfo::Union { members, .. } => {
            for member in members {
                if let Ok(text) = print_literal(member, value) {
                    return Ok(text);
                }
            }
            Err(Error::UnreadableValue(
                "value matches no member of the union".to_string(),
            ))
        }
        SimpleTypeInfo::Complex { .. } => Err(Error::Schema(
            "cannot print a literal for complex content".to_string(),
        )),
    }
}

fn print_atomic(base: BaseSimpleType, value: &Value) -> Result<String> {
    let text = match (base, value) {
        (BaseSimpleType::Boolean, Value::Boolean(b)) => {
            if *b { "true".to_string() } else { "false".to_string() }
        }
        (BaseSimpleType::Decimal, Value::Decimal(d)) => d.normalize().to_string(),
        (BaseSimpleType::Decimal, Value::Int(i)) => i.to_string(),
        (BaseSimpleType::Double, Value::Double(d)) => print_xsd_float(*d),
        (BaseSimpleType::Float, Value::Float(f)) => print_xsd_float(*f as f64),
        (
            BaseSimpleType::Long
            | BaseSimpleType::Int
            | BaseSimpleType::Short
            | BaseSimpleType::Byte
            | BaseSimpleType::UnsignedInt
            | BaseSimpleType::UnsignedShort
            | BaseSimpleType::UnsignedByte,
            Value::Int(i),
        ) => i.to_string(),
        (BaseSimpleType::UnsignedLong, Value::Int(i)) => i.to_string(),
        (BaseSimpleType::UnsignedLong, Value::Unsigned(u)) => u.to_string(),
        (BaseSimpleType::HexBinary, Value::Bytes(bytes)) => print_hex(bytes),
        (BaseSimpleType::Base64Binary, Value::Bytes(bytes)) => {
            base64::engine::general_purpose::STANDARD.encode(bytes)
        }
        (BaseSimpleType::QName, Value::QName(qname)) => qname.to_string(),
        (BaseSimpleType::QName, Value::String(s)) => s.clone(),
        (_, Value::String(s)) if base.is_string_like() => s.clone(),
        (base, value) => {
            return Err(Error::UnreadableValue(format!(
                "value {:?} does not fit base type {:?}",
                value, base
            )))
        }
    };
    Ok(text)
}

fn parse_xsd_float(text: &str) -> Result<f64> {
    match text {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => text
            .parse::<f64>()
            .map_err(|_| Error::UnreadableValue(format!("'{}' is not a valid float", text))),
    }
}

fn print_xsd_float(value: f64) -> String {
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

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::UnreadableValue(format!(
            "'{}' is not a valid hex encoding",
            text
        )));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| Error::UnreadableValue(format!("invalid hex byte in '{}'", text)))
        })
        .collect()
}

fn print_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

// Expands the XSD \i and \c multi-character escapes so user patterns
// compile under the regex crate.
fn translate_xsd_pattern(pattern: &str) -> String {
    pattern
        .replace("\\i", "[:A-Za-z_]")
        .replace("\\c", "[\\-.0-9:A-Za-z_]")
}

fn check_pattern(facets: &FacetSet, text: &str) -> Result<()> {
    if let Some(facet) = facets.get(FacetKind::Pattern) {
        let translated = translate_xsd_pattern(&facet.value);
        let regex = Regex::new(&format!("^(?:{})$", translated)).map_err(|e| {
            Error::Schema(format!("invalid pattern facet '{}': {}", facet.value, e))
        })?;
        if !regex.is_match(text) {
            return Err(FacetViolation::new("pattern", text)
                .with_bound(facet.value.clone())
                .into());
        }
    }
    Ok(())
}

fn check_enumeration(facets: &FacetSet, text: &str) -> Result<()> {
    let allowed = facets.enumeration();
    if !allowed.is_empty() && !allowed.iter().any(|f| f.value == text) {
        return Err(FacetViolation::new("enumeration", text).into());
    }
    Ok(())
}

fn check_length_facets(facets: &FacetSet, len: usize) -> Result<()> {
    if let Some(facet) = facets.get(FacetKind::Length) {
        let expected: usize = facet
            .value
            .parse()
            .map_err(|_| Error::Schema(format!("invalid length facet '{}'", facet.value)))?;
        if len != expected {
            return Err(FacetViolation::new("length", len.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    if let Some(facet) = facets.get(FacetKind::MinLength) {
        let min: usize = facet
            .value
            .parse()
            .map_err(|_| Error::Schema(format!("invalid minLength facet '{}'", facet.value)))?;
        if len < min {
            return Err(FacetViolation::new("minLength", len.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    if let Some(facet) = facets.get(FacetKind::MaxLength) {
        let max: usize = facet
            .value
            .parse()
            .map_err(|_| Error::Schema(format!("invalid maxLength facet '{}'", facet.value)))?;
        if len > max {
            return Err(FacetViolation::new("maxLength", len.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    Ok(())
}

fn check_numeric_bounds(facets: &FacetSet, value: Decimal) -> Result<()> {
    let bound = |facet_value: &str| -> Result<Decimal> {
        Decimal::from_str(facet_value)
            .map_err(|_| Error::Schema(format!("invalid numeric facet bound '{}'", facet_value)))
    };

    if let Some(facet) = facets.get(FacetKind::MinInclusive) {
        if value < bound(&facet.value)? {
            return Err(FacetViolation::new("minInclusive", value.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    if let Some(facet) = facets.get(FacetKind::MinExclusive) {
        if value <= bound(&facet.value)? {
            return Err(FacetViolation::new("minExclusive", value.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    if let Some(facet) = facets.get(FacetKind::MaxInclusive) {
        if value > bound(&facet.value)? {
            return Err(FacetViolation::new("maxInclusive", value.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    if let Some(facet) = facets.get(FacetKind::MaxExclusive) {
        if value >= bound(&facet.value)? {
            return Err(FacetViolation::new("maxExclusive", value.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    Ok(())
}

fn check_digit_facets(facets: &FacetSet, value: &Decimal) -> Result<()> {
    let normalized = value.normalize();

    if let Some(facet) = facets.get(FacetKind::FractionDigits) {
        let max: u32 = facet
            .value
            .parse()
            .map_err(|_| Error::Schema(format!("invalid fractionDigits facet '{}'", facet.value)))?;
        if normalized.scale() > max {
            return Err(FacetViolation::new("fractionDigits", value.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    if let Some(facet) = facets.get(FacetKind::TotalDigits) {
        let max: usize = facet
            .value
            .parse()
            .map_err(|_| Error::Schema(format!("invalid totalDigits facet '{}'", facet.value)))?;
        let digits = normalized
            .abs()
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .count();
        if digits > max {
            return Err(FacetViolation::new("totalDigits", value.to_string())
                .with_bound(facet.value.clone())
                .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple::base::builtin_info;

    fn info(local: &str) -> SimpleTypeInfo {
        builtin_info(&QName::xsd(local)).unwrap()
    }

    #[test]
    fn test_parse_boolean() {
        let ty = info("boolean");
        assert_eq!(parse_literal(&ty, " true ", None).unwrap(), Value::Boolean(true));
        assert_eq!(parse_literal(&ty, "0", None).unwrap(), Value::Boolean(false));
        assert!(parse_literal(&ty, "yes", None).is_err());
    }

    #[test]
    fn test_parse_int_bounds() {
        let ty = info("unsignedByte");
        assert_eq!(parse_literal(&ty, "255", None).unwrap(), Value::Int(255));

        let err = parse_literal(&ty, "256", None).unwrap_err();
        assert!(matches!(err, Error::FacetViolation(_)));
    }

    #[test]
    fn test_parse_unsigned_long_overflow_into_unsigned() {
        let ty = info("unsignedLong");
        let max = parse_literal(&ty, "18446744073709551615", None).unwrap();
        assert_eq!(max, Value::Unsigned(u64::MAX));

        let small = parse_literal(&ty, "42", None).unwrap();
        assert_eq!(small, Value::Int(42));
    }

    #[test]
    fn test_parse_float_specials() {
        let ty = info("double");
        assert_eq!(
            parse_literal(&ty, "INF", None).unwrap(),
            Value::Double(f64::INFINITY)
        );
        match parse_literal(&ty, "NaN", None).unwrap() {
            Value::Double(d) => assert!(d.is_nan()),
            other => panic!("expected double, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_hex_and_base64() {
        let hex = info("hexBinary");
        assert_eq!(
            parse_literal(&hex, "0aFF", None).unwrap(),
            Value::Bytes(vec![0x0a, 0xff])
        );
        assert!(parse_literal(&hex, "0a1", None).is_err());

        let b64 = info("base64Binary");
        assert_eq!(
            parse_literal(&b64, "aGk=", None).unwrap(),
            Value::Bytes(b"hi".to_vec())
        );
    }

    #[test]
    fn test_parse_qname_with_context() {
        let ty = info("QName");
        let mut ctx = NamespaceContext::new();
        ctx.push_scope();
        ctx.declare("p", "urn:test");

        let value = parse_literal(&ty, "p:item", Some(&ctx)).unwrap();
        assert_eq!(value, Value::QName(QName::namespaced("urn:test", "item")));
    }

    #[test]
    fn test_parse_list() {
        let ty = SimpleTypeInfo::List {
            item: Box::new(info("unsignedLong")),
            facets: FacetSet::new(),
        };
        let value = parse_literal(&ty, " 1  2 3 ", None).unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_parse_union_first_match_wins() {
        let ty = SimpleTypeInfo::Union {
            members: vec![info("int"), info("string")],
            facets: FacetSet::new(),
        };
        assert_eq!(parse_literal(&ty, "12", None).unwrap(), Value::Int(12));
        assert_eq!(
            parse_literal(&ty, "twelve", None).unwrap(),
            Value::String("twelve".to_string())
        );
    }

    #[test]
    fn test_parse_enumeration() {
        let mut ty = info("string");
        if let SimpleTypeInfo::Atomic { ref mut facets, .. } = ty {
            facets.set(FacetKind::Enumeration, crate::simple::facets::Facet::new("red"));
            facets.set(FacetKind::Enumeration, crate::simple::facets::Facet::new("green"));
        }

        assert!(parse_literal(&ty, "red", None).is_ok());
        assert!(parse_literal(&ty, "blue", None).is_err());
    }

    #[test]
    fn test_parse_pattern_facet() {
        let ty = info("language");
        assert!(parse_literal(&ty, "en-US", None).is_ok());
        assert!(parse_literal(&ty, "123", None).is_err());
    }

    #[test]
    fn test_print_canonical_forms() {
        assert_eq!(
            print_literal(&info("boolean"), &Value::Boolean(true)).unwrap(),
            "true"
        );
        assert_eq!(
            print_literal(&info("double"), &Value::Double(f64::NEG_INFINITY)).unwrap(),
            "-INF"
        );
        assert_eq!(
            print_literal(&info("hexBinary"), &Value::Bytes(vec![0x0a, 0xff])).unwrap(),
            "0AFF"
        );
        assert_eq!(
            print_literal(
                &info("decimal"),
                &Value::Decimal(Decimal::from_str("1.500").unwrap())
            )
            .unwrap(),
            "1.5"
        );
    }

    #[test]
    fn test_print_list_roundtrip() {
        let ty = SimpleTypeInfo::List {
            item: Box::new(info("int")),
            facets: FacetSet::new(),
        };
        let value = parse_literal(&ty, "1 2 3", None).unwrap();
        assert_eq!(print_literal(&ty, &value).unwrap(), "1 2 3");
    }

    #[test]
    fn test_whitespace_collapse_before_parse() {
        let ty = info("token");
        assert_eq!(
            parse_literal(&ty, "  a   b ", None).unwrap(),
            Value::String("a b".to_string())
        );
    }
}
