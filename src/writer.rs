//! Writing extracted attributes back into a record.

use std::io::Write;
use std::slice;

use tracing::warn;

use crate::attributes::{format_coordinate, AttributeSet, AttributeValue};
use crate::record::{EventRecord, FieldValue};

/// How attributes land in the record.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputShape {
    /// One field per attribute, named `<prefix>_<attribute>`.
    #[default]
    Fields,
    /// A single field named `<prefix>` holding a JSON object.
    JsonObject,
}

/// Appends attribute sets to records under a fixed prefix.
#[derive(Clone, Debug)]
pub struct FieldWriter {
    prefix: String,
    shape: OutputShape,
}

impl FieldWriter {
    pub fn new<S: Into<String>>(prefix: S, shape: OutputShape) -> Self {
        Self {
            prefix: prefix.into(),
            shape,
        }
    }

    /// Append `attrs` to `record`, returning how many fields were added.
    ///
    /// Fields the record refuses are logged and skipped.
    pub fn write<R: EventRecord + ?Sized>(&self, record: &mut R, attrs: &AttributeSet) -> usize {
        self.write_all(record, slice::from_ref(attrs))
    }

    /// Append the attributes of several lookups for the same address.
    ///
    /// In JSON-object mode every set lands in the one `<prefix>` object, in
    /// the order given.
    pub fn write_all<R: EventRecord + ?Sized>(&self, record: &mut R, sets: &[AttributeSet]) -> usize {
        if sets.iter().all(AttributeSet::is_empty) {
            return 0;
        }
        match self.shape {
            OutputShape::Fields => {
                let mut added = 0;
                for (name, value) in sets.iter().flatten() {
                    let field = format!("{}_{}", self.prefix, name);
                    if append(record, &field, field_value(value)) {
                        added += 1;
                    }
                }
                added
            }
            OutputShape::JsonObject => {
                let json = json_object(sets);
                usize::from(append(record, &self.prefix, FieldValue::Bytes(json)))
            }
        }
    }
}

fn append<R: EventRecord + ?Sized>(record: &mut R, name: &str, value: FieldValue) -> bool {
    match record.add_field(name, value) {
        Ok(()) => true,
        Err(err) => {
            warn!(field = name, error = %err, "could not add field");
            false
        }
    }
}

fn field_value(value: &AttributeValue) -> FieldValue {
    match value {
        AttributeValue::Str(s) => FieldValue::String(s.clone()),
        AttributeValue::Int(i) => FieldValue::Integer(*i),
        AttributeValue::Bool(b) => FieldValue::Bool(*b),
        // Records cannot hold arrays, so the pair travels as JSON bytes
        AttributeValue::Location { .. } => {
            let mut buf = Vec::with_capacity(40);
            write_json_value(&mut buf, value);
            FieldValue::Bytes(buf)
        }
    }
}

/// Build `{"name":value,...}` from every set, in order.
fn json_object(sets: &[AttributeSet]) -> Vec<u8> {
    let count: usize = sets.iter().map(AttributeSet::len).sum();
    let mut buf = Vec::with_capacity(32 * count + 2);
    buf.push(b'{');
    for (i, (name, value)) in sets.iter().flatten().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        buf.push(b'"');
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b"\":");
        write_json_value(&mut buf, value);
    }
    buf.push(b'}');
    buf
}

fn write_json_value(buf: &mut Vec<u8>, value: &AttributeValue) {
    match value {
        AttributeValue::Str(s) => {
            // Only the escaping is delegated; writing to a Vec cannot fail
            let _ = serde_json::to_writer(&mut *buf, s);
        }
        AttributeValue::Int(i) => {
            let mut itoa_buf = itoa::Buffer::new();
            buf.extend_from_slice(itoa_buf.format(*i).as_bytes());
        }
        AttributeValue::Bool(b) => {
            let text: &[u8] = if *b { b"true" } else { b"false" };
            buf.extend_from_slice(text);
        }
        AttributeValue::Location {
            latitude,
            longitude,
        } => {
            let _ = write!(
                buf,
                "[{},{}]",
                format_coordinate(*longitude),
                format_coordinate(*latitude)
            );
        }
    }
}
