//! Event records as seen by the decoder.
//!
//! The decoder only ever reads a named field and appends new ones, so any host
//! record type can take part by implementing [`EventRecord`]. [`Message`] is a
//! small concrete record used by the command-line host and the tests.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::error::{Error, Result};

/// A single field value.
///
/// There is no unsigned variant; unsigned database values are widened to
/// `i64`. `Bytes` holding valid JSON is written out verbatim.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    String(String),
    Bytes(Vec<u8>),
    Integer(i64),
    Double(f64),
    Bool(bool),
}

impl FieldValue {
    /// The textual content of the value, if it is a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Classify one JSON value as parsed. Strings, booleans and numbers that
    /// print back identically become scalars; everything else keeps its exact
    /// source text.
    fn from_raw(raw: &RawValue) -> FieldValue {
        let text = raw.get();
        let scalar = match text.as_bytes().first() {
            Some(b'"') => serde_json::from_str::<String>(text).ok().map(FieldValue::String),
            Some(b't') => Some(FieldValue::Bool(true)),
            Some(b'f') => Some(FieldValue::Bool(false)),
            Some(b'-' | b'0'..=b'9') => number(text),
            _ => None,
        };
        scalar.unwrap_or_else(|| FieldValue::Bytes(text.as_bytes().to_vec()))
    }
}

fn number(text: &str) -> Option<FieldValue> {
    if let Ok(i) = text.parse::<i64>() {
        let mut buf = itoa::Buffer::new();
        return (buf.format(i) == text).then_some(FieldValue::Integer(i));
    }
    let d = text.parse::<f64>().ok()?;
    let printed = serde_json::to_string(&d).ok()?;
    (printed == text).then_some(FieldValue::Double(d))
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Double(d) => serializer.serialize_f64(*d),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            // Embedded JSON (location arrays, JSON-object output) is emitted inline
            FieldValue::Bytes(bytes) => match serde_json::from_slice::<&RawValue>(bytes) {
                Ok(raw) => raw.serialize(serializer),
                Err(_) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            },
        }
    }
}

/// The record interface the decoder needs from its host.
pub trait EventRecord {
    /// Read a field by name. When a name occurs more than once the first wins.
    fn field(&self, name: &str) -> Option<&FieldValue>;

    /// Append a new field. Existing fields are never replaced.
    fn add_field(&mut self, name: &str, value: FieldValue) -> Result<()>;
}

/// A named field in a [`Message`].
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// An ordered list of fields; names may repeat.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    fields: Vec<Field>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append used when assembling records by hand.
    #[must_use]
    pub fn with_field<V: Into<FieldValue>>(mut self, name: &str, value: V) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    /// All fields, in insertion order.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a message from a single JSON object, keeping field order.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Message> {
        serde_json::from_slice(bytes)
    }

    /// Serialize the message as a single-line JSON object.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl EventRecord for Message {
    fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    fn add_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidFieldName {
                name: name.to_string(),
            });
        }
        self.fields.push(Field {
            name: name.to_string(),
            value,
        });
        Ok(())
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

struct MessageVisitor;

impl<'de> Visitor<'de> for MessageVisitor {
    type Value = Message;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Message, A::Error> {
        let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(8));
        while let Some((name, raw)) = access.next_entry::<String, Box<RawValue>>()? {
            fields.push(Field {
                name,
                value: FieldValue::from_raw(&raw),
            });
        }
        Ok(Message { fields })
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Message, D::Error> {
        deserializer.deserialize_map(MessageVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_field_order() {
        let msg = Message::from_json(br#"{"zeta":"z","alpha":1,"mid":true}"#).unwrap();
        let names: Vec<&str> = msg.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(msg.to_json().unwrap(), br#"{"zeta":"z","alpha":1,"mid":true}"#);
    }

    #[test]
    fn json_value_types() {
        let msg = Message::from_json(
            br#"{"s":"x","i":-3,"d":1.5,"b":false,"o":{"k":[1]},"n":null}"#,
        )
        .unwrap();
        assert_eq!(msg.field("s"), Some(&FieldValue::String("x".into())));
        assert_eq!(msg.field("i"), Some(&FieldValue::Integer(-3)));
        assert_eq!(msg.field("d"), Some(&FieldValue::Double(1.5)));
        assert_eq!(msg.field("b"), Some(&FieldValue::Bool(false)));
        assert_eq!(msg.field("o"), Some(&FieldValue::Bytes(br#"{"k":[1]}"#.to_vec())));
        assert_eq!(msg.field("n"), Some(&FieldValue::Bytes(b"null".to_vec())));
    }

    #[test]
    fn passthrough_fields_are_written_back_unchanged() {
        let line = br#"{"o":{"z":1,"a":2},"n":18446744073709551615,"f":1.50,"e":1e3,"z":-0,"a":[3,{"y":null,"b":true}]}"#;
        let msg = Message::from_json(line).unwrap();
        assert_eq!(
            msg.field("n"),
            Some(&FieldValue::Bytes(b"18446744073709551615".to_vec()))
        );
        assert_eq!(msg.field("f"), Some(&FieldValue::Bytes(b"1.50".to_vec())));
        assert_eq!(msg.field("z"), Some(&FieldValue::Bytes(b"-0".to_vec())));
        assert_eq!(msg.to_json().unwrap(), line.to_vec());
    }

    #[test]
    fn embedded_objects_keep_key_order() {
        let mut msg = Message::new().with_field("ip", "81.2.69.160");
        msg.add_field(
            "geoip",
            FieldValue::Bytes(br#"{"location":[-0.0931,51.5142],"country_code":"GB"}"#.to_vec()),
        )
        .unwrap();
        assert_eq!(
            msg.to_json().unwrap(),
            br#"{"ip":"81.2.69.160","geoip":{"location":[-0.0931,51.5142],"country_code":"GB"}}"#
                .to_vec()
        );
    }

    #[test]
    fn bytes_holding_json_are_inlined() {
        let mut msg = Message::new();
        msg.add_field("loc", FieldValue::Bytes(b"[1.5,2]".to_vec()))
            .unwrap();
        msg.add_field("raw", FieldValue::Bytes(b"not json".to_vec()))
            .unwrap();
        assert_eq!(msg.to_json().unwrap(), br#"{"loc":[1.5,2],"raw":"not json"}"#);
    }

    #[test]
    fn duplicate_names_keep_first_for_reads() {
        let msg = Message::new().with_field("a", "one").with_field("a", "two");
        assert_eq!(msg.len(), 2);
        assert_eq!(msg.field("a").and_then(FieldValue::as_str), Some("one"));
    }

    #[test]
    fn empty_field_name_rejected() {
        let mut msg = Message::new();
        assert!(matches!(
            msg.add_field("", FieldValue::Bool(true)),
            Err(Error::InvalidFieldName { .. })
        ));
        assert!(msg.is_empty());
    }

    #[test]
    fn non_object_json_is_an_error() {
        assert!(Message::from_json(b"[1,2,3]").is_err());
    }
}
