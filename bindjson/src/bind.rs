// SPDX-License-Identifier: Apache-2.0

//! The typed conversion seam: [`JsonWrite`] and [`JsonRead`].
//!
//! Reads follow one convention throughout the crate: `json_read` is invoked
//! with the reader already positioned on the value's first token (the caller
//! ran `next_token`), and it fully consumes the value. Writes emit one
//! complete value and cannot fail; only flushing to a sink can.

use crate::base64;
use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::reader::{JsonReader, Token};
use crate::writer::JsonWriter;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// Serialize `self` as one JSON value.
pub trait JsonWrite {
    fn json_write(&self, writer: &mut JsonWriter<'_>);
}

/// Deserialize one JSON value.
pub trait JsonRead: Sized {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<Self>;
}

impl JsonWrite for bool {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        writer.write_bool(*self);
    }
}

impl JsonRead for bool {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<bool> {
        reader.read_bool()
    }
}

macro_rules! number_bind {
    ($ty:ty, $write:ident, $read:ident) => {
        impl JsonWrite for $ty {
            fn json_write(&self, writer: &mut JsonWriter<'_>) {
                writer.$write(*self);
            }
        }

        impl JsonRead for $ty {
            fn json_read(reader: &mut JsonReader<'_>) -> Result<$ty> {
                reader.$read()
            }
        }
    };
}

number_bind!(i32, write_i32, read_i32);
number_bind!(i64, write_i64, read_i64);
number_bind!(u32, write_u32, read_u32);
number_bind!(u64, write_u64, read_u64);
number_bind!(f32, write_f32, read_f32);
number_bind!(f64, write_f64, read_f64);

impl JsonWrite for Decimal {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        // Exact base-10 literal, no quoting.
        writer.write_raw(self.to_string().as_bytes());
    }
}

impl JsonRead for Decimal {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<Decimal> {
        reader.read_decimal()
    }
}

impl JsonWrite for str {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        writer.write_string(self);
    }
}

impl JsonWrite for String {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        writer.write_string(self);
    }
}

impl JsonRead for String {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<String> {
        if reader.token() != Token::String {
            return Err(reader.error_expecting("\""));
        }
        reader.read_string_owned()
    }
}

impl<T: JsonWrite + ?Sized> JsonWrite for &T {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        (*self).json_write(writer);
    }
}

impl<T: JsonWrite> JsonWrite for Option<T> {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        match self {
            None => writer.write_null(),
            Some(value) => value.json_write(writer),
        }
    }
}

impl<T: JsonRead> JsonRead for Option<T> {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<Option<T>> {
        if reader.was_null() {
            Ok(None)
        } else {
            T::json_read(reader).map(Some)
        }
    }
}

/// Binary content, encoded as a base64 string.
///
/// A distinct newtype rather than `Vec<u8>` so that byte buffers and lists
/// of small integers remain different types on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Bytes {
        Bytes(v)
    }
}

impl std::ops::Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl JsonWrite for Bytes {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        writer.write_binary(&self.0);
    }
}

impl JsonRead for Bytes {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<Bytes> {
        if reader.token() != Token::String {
            return Err(reader.error_expecting("\""));
        }
        let text = reader.read_string_owned()?;
        // Errors inside the literal are reported at their absolute offset.
        let base = reader.position().saturating_sub(text.len() + 1);
        base64::decode(text.as_bytes(), base).map(Bytes)
    }
}

pub(crate) fn write_array<T: JsonWrite>(
    writer: &mut JsonWriter<'_>,
    items: impl Iterator<Item = T>,
) {
    writer.array_start();
    for (i, item) in items.enumerate() {
        writer.member_prefix(i == 0);
        item.json_write(writer);
    }
    writer.array_end();
}

pub(crate) fn read_array<T: JsonRead>(
    reader: &mut JsonReader<'_>,
    mut push: impl FnMut(T),
) -> Result<()> {
    if reader.token() != Token::ArrayStart {
        return Err(reader.error_expecting("["));
    }
    if reader.next_token()? == Token::ArrayEnd {
        return Ok(());
    }
    loop {
        push(T::json_read(reader)?);
        if !reader.comma_or_array_end()? {
            return Ok(());
        }
        reader.next_token()?;
    }
}

impl<T: JsonWrite> JsonWrite for Vec<T> {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        write_array(writer, self.iter());
    }
}

impl<T: JsonRead> JsonRead for Vec<T> {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<Vec<T>> {
        let mut out = Vec::new();
        read_array(reader, |item| out.push(item))?;
        Ok(out)
    }
}

impl<T: JsonWrite> JsonWrite for Box<[T]> {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        write_array(writer, self.iter());
    }
}

impl<T: JsonRead> JsonRead for Box<[T]> {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<Box<[T]>> {
        Vec::<T>::json_read(reader).map(Vec::into_boxed_slice)
    }
}

impl<T: JsonWrite> JsonWrite for HashSet<T> {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        write_array(writer, self.iter());
    }
}

impl<T: JsonRead + Eq + Hash> JsonRead for HashSet<T> {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<HashSet<T>> {
        let mut out = HashSet::new();
        read_array(reader, |item| {
            out.insert(item);
        })?;
        Ok(out)
    }
}

impl<T: JsonWrite> JsonWrite for BTreeSet<T> {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        write_array(writer, self.iter());
    }
}

impl<T: JsonRead + Ord> JsonRead for BTreeSet<T> {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<BTreeSet<T>> {
        let mut out = BTreeSet::new();
        read_array(reader, |item| {
            out.insert(item);
        })?;
        Ok(out)
    }
}

/// Types usable as JSON object keys: encoded as the property-name string.
pub trait JsonKey: Sized {
    fn write_key(&self, writer: &mut JsonWriter<'_>);
    fn parse_key(text: &str, position: usize) -> Result<Self>;
}

impl JsonKey for String {
    fn write_key(&self, writer: &mut JsonWriter<'_>) {
        writer.write_string(self);
    }

    fn parse_key(text: &str, _position: usize) -> Result<String> {
        Ok(text.to_owned())
    }
}

macro_rules! integer_key {
    ($ty:ty) => {
        impl JsonKey for $ty {
            fn write_key(&self, writer: &mut JsonWriter<'_>) {
                writer.write_string(&self.to_string());
            }

            fn parse_key(text: &str, position: usize) -> Result<$ty> {
                text.parse().map_err(|_| {
                    Error::parse(
                        format!("Invalid numeric map key '{text}'"),
                        position,
                    )
                })
            }
        }
    };
}

integer_key!(i32);
integer_key!(i64);
integer_key!(u32);
integer_key!(u64);

impl JsonKey for uuid::Uuid {
    fn write_key(&self, writer: &mut JsonWriter<'_>) {
        writer.write_string(&self.hyphenated().to_string());
    }

    fn parse_key(text: &str, position: usize) -> Result<uuid::Uuid> {
        text.parse()
            .map_err(|_| Error::parse(format!("Invalid UUID map key '{text}'"), position))
    }
}

fn write_map<'a, K: JsonKey + 'a, V: JsonWrite + 'a>(
    writer: &mut JsonWriter<'_>,
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) {
    writer.object_start();
    for (i, (key, value)) in entries.enumerate() {
        writer.member_prefix(i == 0);
        key.write_key(writer);
        writer.colon();
        value.json_write(writer);
    }
    writer.object_end();
}

fn read_map<K: JsonKey, V: JsonRead>(
    reader: &mut JsonReader<'_>,
    mut insert: impl FnMut(K, V),
) -> Result<()> {
    if reader.token() != Token::ObjectStart {
        return Err(reader.error_expecting("{"));
    }
    match reader.next_token()? {
        Token::ObjectEnd => return Ok(()),
        Token::String => {}
        _ => return Err(reader.error_expecting("\"")),
    }
    loop {
        let position = reader.position();
        let key = K::parse_key(reader.read_string()?, position)?;
        reader.expect_colon()?;
        reader.next_token()?;
        let value = V::json_read(reader)?;
        insert(key, value);
        if !reader.comma_or_object_end()? {
            return Ok(());
        }
        if reader.next_token()? != Token::String {
            return Err(reader.error_expecting("\""));
        }
    }
}

impl<K: JsonKey + Eq + Hash, V: JsonWrite> JsonWrite for HashMap<K, V> {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        write_map(writer, self.iter());
    }
}

impl<K: JsonKey + Eq + Hash, V: JsonRead> JsonRead for HashMap<K, V> {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<HashMap<K, V>> {
        let mut out = HashMap::new();
        read_map(reader, |k, v| {
            out.insert(k, v);
        })?;
        Ok(out)
    }
}

impl<K: JsonKey + Ord, V: JsonWrite> JsonWrite for BTreeMap<K, V> {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        write_map(writer, self.iter());
    }
}

impl<K: JsonKey + Ord, V: JsonRead> JsonRead for BTreeMap<K, V> {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<BTreeMap<K, V>> {
        let mut out = BTreeMap::new();
        read_map(reader, |k, v| {
            out.insert(k, v);
        })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: JsonWrite>(value: &T) -> String {
        let mut writer = JsonWriter::new();
        value.json_write(&mut writer);
        String::from_utf8(writer.into_bytes()).unwrap()
    }

    fn decode<T: JsonRead>(text: &str) -> Result<T> {
        let mut reader = JsonReader::new(text.as_bytes());
        reader.next_token()?;
        let value = T::json_read(&mut reader)?;
        reader.expect_eof()?;
        Ok(value)
    }

    #[test]
    fn test_scalar_round_trips() {
        assert_eq!(encode(&1000000000i64), "1000000000");
        assert_eq!(decode::<i64>("1000000000").unwrap(), 1000000000);
        assert_eq!(decode::<bool>("true").unwrap(), true);
        assert_eq!(encode(&"hi".to_string()), "\"hi\"");
        assert_eq!(decode::<String>("\"hi\"").unwrap(), "hi");
    }

    #[test]
    fn test_option_distinguishes_null() {
        assert_eq!(encode(&None::<i64>), "null");
        assert_eq!(decode::<Option<i64>>("null").unwrap(), None);
        assert_eq!(decode::<Option<i64>>("7").unwrap(), Some(7));
    }

    #[test]
    fn test_vec_round_trip() {
        assert_eq!(encode(&vec![1i64, 2, 3]), "[1,2,3]");
        assert_eq!(decode::<Vec<i64>>("[1,2,3]").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode::<Vec<i64>>("[]").unwrap(), Vec::<i64>::new());
        assert_eq!(
            decode::<Vec<Option<i64>>>("[1,null,3]").unwrap(),
            vec![Some(1), None, Some(3)]
        );
    }

    #[test]
    fn test_nested_generic_composition() {
        let decoded: HashMap<String, Vec<Decimal>> =
            decode(r#"{"a":[1.5,2.50],"b":[]}"#).unwrap();
        assert_eq!(decoded["a"], vec!["1.5".parse().unwrap(), "2.5".parse().unwrap()]);
        assert!(decoded["b"].is_empty());
    }

    #[test]
    fn test_map_exact_bytes() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), "b".to_string());
        assert_eq!(encode(&map), r#"{"a":"b"}"#);
        assert_eq!(decode::<HashMap<String, String>>(r#"{"a":"b"}"#).unwrap(), map);
    }

    #[test]
    fn test_integer_keyed_map() {
        let mut map = BTreeMap::new();
        map.insert(5i64, true);
        assert_eq!(encode(&map), r#"{"5":true}"#);
        assert_eq!(decode::<BTreeMap<i64, bool>>(r#"{"5":true}"#).unwrap(), map);
        assert!(decode::<BTreeMap<i64, bool>>(r#"{"x":true}"#).is_err());
    }

    #[test]
    fn test_bytes_round_trip() {
        let bytes = Bytes(b"foobar".to_vec());
        assert_eq!(encode(&bytes), "\"Zm9vYmFy\"");
        assert_eq!(decode::<Bytes>("\"Zm9vYmFy\"").unwrap(), bytes);
    }

    #[test]
    fn test_bytes_rejects_malformed_base64() {
        let err = decode::<Bytes>("\"Zm!v\"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
        assert_eq!(err.position(), Some(3));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(decode::<i64>("1 2").is_err());
    }

    #[test]
    fn test_set_round_trip() {
        let set: BTreeSet<i64> = decode("[3,1,2]").unwrap();
        assert_eq!(encode(&set), "[1,2,3]");
    }
}
