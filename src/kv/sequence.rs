//! Length-prefixed multi-field byte sequences used to encode rows and keys.
//!
//! A sequence is an ordered list of variable-length fields. Fields are terminated by the reserved
//! separator byte `0x1E` (ASCII record separator); a null field is encoded as the single byte
//! `0x00` sentinel. Ciphertext fields, whose bytes may legitimately contain `0x1E`, are never
//! stored with the separator scheme — see [`crate::crypto`], which instead lays out its composite
//! key as `shard_cipher || pk_cipher || u16_le(shard_cipher.len())`.

use crate::error::{Error, Result};
use crate::value::Value;

/// ASCII record separator. Terminates every plaintext field in a [`SequenceWriter`].
const SEPARATOR: u8 = 0x1E;

/// Single-byte sentinel for a null field. `0x1E` can never collide with this because the separator
/// is only ever written *after* a field's payload, never used standalone to mean "no payload".
const NULL_SENTINEL: u8 = 0x00;

// -------------------------------------------------------------------------------------------------
//
/// Builds a length-separated byte sequence one field at a time.
#[derive(Default, Debug)]
pub struct SequenceWriter {
    buffer: Vec<u8>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl SequenceWriter {
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Appends a non-null field, followed by the separator byte.
    ///
    /// # Panics
    /// Never panics, but note that if `bytes` itself contains the separator byte the resulting
    /// sequence cannot be losslessly decoded; callers must only use this for plaintext fields whose
    /// encoding guarantees the separator cannot appear (e.g. the ASCII-decimal encoding of numeric
    /// values, or raw text — ciphertexts must use [`Self::append_encoded`] instead).
    pub fn append_field(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self.buffer.push(SEPARATOR);
        self
    }

    /// Appends the one-byte null sentinel as this field's entire contents.
    pub fn append_null(&mut self) -> &mut Self {
        self.buffer.push(NULL_SENTINEL);
        self.buffer.push(SEPARATOR);
        self
    }

    /// Appends a [`Value`] using the canonical textual encoding: integers as ASCII decimal, text
    /// and datetime as their raw bytes, null as the sentinel.
    pub fn append_value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Int(v) => self.append_field(v.to_string().as_bytes()),
            Value::UInt(v) => self.append_field(v.to_string().as_bytes()),
            Value::Text(v) => self.append_field(v.as_bytes()),
            Value::DateTime(v) => self.append_field(v.as_bytes()),
            Value::Null => self.append_null(),
        }
    }

    /// Appends bytes that already carry their own length framing (used for ciphertext fields,
    /// which may contain the separator byte as part of their opaque payload). No separator is
    /// written; the caller is responsible for ensuring the bytes are self-delimiting, e.g. via a
    /// trailing length field as [`crate::crypto`] does for composite keys.
    pub fn append_encoded(&mut self, bytes_with_separator: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes_with_separator);
        self
    }

    #[must_use]
    pub fn release(self) -> Vec<u8> {
        self.buffer
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Reads back the fields written by a [`SequenceWriter`] using the separator-delimited encoding.
pub struct SequenceReader<'s> {
    fields: Vec<&'s [u8]>,
}

impl<'s> SequenceReader<'s> {
    /// Splits `bytes` into fields on the separator byte. The final separator is expected to be
    /// present (as [`SequenceWriter`] always appends one after each field); a trailing empty slice
    /// after the last separator is dropped.
    #[must_use]
    pub fn parse(bytes: &'s [u8]) -> Self {
        let mut fields: Vec<&[u8]> = bytes.split(|&b| b == SEPARATOR).collect();
        if fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }
        Self { fields }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the raw bytes of field `index`, or `None` if that field is the null sentinel.
    ///
    /// # Errors
    /// Returns [`Error::CodecError`] if `index` is out of range.
    pub fn field_at(&self, index: usize) -> Result<Option<&'s [u8]>> {
        let field = self
            .fields
            .get(index)
            .ok_or_else(|| Error::CodecError(format!("field {index} out of range")))?;
        if *field == [NULL_SENTINEL] {
            Ok(None)
        } else {
            Ok(Some(field))
        }
    }

    /// Decodes field `index` into a [`Value`] of the given [`crate::value::ColumnType`].
    ///
    /// # Errors
    /// Returns [`Error::CodecError`] if the field is out of range or its bytes are not valid for
    /// the requested type (e.g. non-UTF8 text, or non-numeric digits for an integer column).
    pub fn value_at(&self, index: usize, column_type: crate::value::ColumnType) -> Result<Value> {
        use crate::value::ColumnType;
        let Some(bytes) = self.field_at(index)? else {
            return Ok(Value::Null);
        };
        let text = || {
            std::str::from_utf8(bytes)
                .map_err(|e| Error::CodecError(format!("field {index} is not valid UTF-8: {e}")))
        };
        match column_type {
            ColumnType::Int => text()?
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| Error::CodecError(format!("field {index} is not a valid i64: {e}"))),
            ColumnType::UInt => text()?
                .parse::<u64>()
                .map(Value::UInt)
                .map_err(|e| Error::CodecError(format!("field {index} is not a valid u64: {e}"))),
            ColumnType::Text => Ok(Value::Text(text()?.to_owned())),
            ColumnType::DateTime => Ok(Value::DateTime(text()?.to_owned())),
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ColumnType;

    #[test]
    fn round_trips_non_null_values() {
        let mut writer = SequenceWriter::new();
        writer
            .append_value(&Value::UInt(7))
            .append_value(&Value::Text("hello".into()))
            .append_value(&Value::DateTime("2026-01-01".into()));
        let bytes = writer.release();

        let reader = SequenceReader::parse(&bytes);
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.value_at(0, ColumnType::UInt).unwrap(), Value::UInt(7));
        assert_eq!(
            reader.value_at(1, ColumnType::Text).unwrap(),
            Value::Text("hello".into())
        );
        assert_eq!(
            reader.value_at(2, ColumnType::DateTime).unwrap(),
            Value::DateTime("2026-01-01".into())
        );
    }

    #[test]
    fn null_field_decodes_as_null() {
        let mut writer = SequenceWriter::new();
        writer.append_null();
        let bytes = writer.release();
        let reader = SequenceReader::parse(&bytes);
        assert_eq!(reader.value_at(0, ColumnType::Int).unwrap(), Value::Null);
    }

    #[test]
    fn separator_never_appears_inside_ascii_numeric_fields() {
        // The record-separator byte (0x1E) cannot appear in an ASCII decimal rendering of an
        // integer, so round-tripping negative and large values is always safe.
        let mut writer = SequenceWriter::new();
        writer.append_value(&Value::Int(i64::MIN));
        writer.append_value(&Value::UInt(u64::MAX));
        let bytes = writer.release();
        let reader = SequenceReader::parse(&bytes);
        assert_eq!(reader.value_at(0, ColumnType::Int).unwrap(), Value::Int(i64::MIN));
        assert_eq!(reader.value_at(1, ColumnType::UInt).unwrap(), Value::UInt(u64::MAX));
    }

    #[test]
    fn out_of_range_field_errors() {
        let reader = SequenceReader::parse(b"");
        assert!(reader.field_at(0).is_err());
    }

    #[quickcheck_macros::quickcheck]
    fn quickcheck_int_round_trip(v: i64) -> bool {
        let mut writer = SequenceWriter::new();
        writer.append_value(&Value::Int(v));
        let bytes = writer.release();
        let reader = SequenceReader::parse(&bytes);
        reader.value_at(0, ColumnType::Int).unwrap() == Value::Int(v)
    }

    #[quickcheck_macros::quickcheck]
    fn quickcheck_text_round_trip(s: String) -> bool {
        // Text fields must not contain the separator byte (0x1E) or this encoding is lossy by
        // design; quickcheck inputs containing it are simply skipped as out of scope for this law.
        if s.as_bytes().contains(&SEPARATOR) {
            return true;
        }
        let mut writer = SequenceWriter::new();
        writer.append_value(&Value::Text(s.clone()));
        let bytes = writer.release();
        let reader = SequenceReader::parse(&bytes);
        reader.value_at(0, ColumnType::Text).unwrap() == Value::Text(s)
    }
}
