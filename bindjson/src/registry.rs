// SPDX-License-Identifier: Apache-2.0

//! The converter registry and its [`Json`] facade.
//!
//! Static registrations happen during a single-threaded setup phase (this is
//! the hook a code generator calls into) and are read-only afterwards.
//! Runtime-resolved generic converters are inserted lazily and concurrently:
//! the cache uses insert-if-absent semantics, so racing resolvers may build
//! duplicate candidates but exactly one entry is kept and a half-built entry
//! is never observable.

use crate::bind::{JsonRead, JsonWrite};
use crate::decimal::Decimal;
use crate::descriptor::{JsonType, PrimitiveKind, TypeDescriptor};
use crate::dynamic::JsonValue;
use crate::error::{Error, Result};
use crate::input::{ByteSink, ByteSource};
use crate::reader::JsonReader;
use crate::writer::JsonWriter;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::Arc;

/// Policy for types with no explicit registration on the dynamic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownTypes {
    /// Fail with a `Type` error naming the blocker (default).
    Error,
    /// Decode through the schemaless [`JsonValue`] model.
    Allow,
}

/// Output and resolution options, fixed per [`Json`] instance.
#[derive(Debug, Clone)]
pub struct Settings {
    ascii_only: bool,
    indent: usize,
    unknown_types: UnknownTypes,
    max_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ascii_only: false,
            indent: 0,
            unknown_types: UnknownTypes::Error,
            max_depth: 512,
        }
    }
}

impl Settings {
    pub fn new() -> Settings {
        Settings::default()
    }

    /// Escape all non-ASCII output as `\uXXXX`.
    pub fn ascii_only(mut self, ascii_only: bool) -> Settings {
        self.ascii_only = ascii_only;
        self
    }

    /// Pretty-print with `width` spaces per nesting level.
    pub fn indent(mut self, width: usize) -> Settings {
        self.indent = width;
        self
    }

    pub fn unknown_types(mut self, policy: UnknownTypes) -> Settings {
        self.unknown_types = policy;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Settings {
        self.max_depth = max_depth;
        self
    }
}

type WriteFn = Arc<dyn Fn(&mut JsonWriter<'_>, &dyn Any) -> Result<()> + Send + Sync>;
type ReadFn = Arc<dyn Fn(&mut JsonReader<'_>) -> Result<Box<dyn Any>> + Send + Sync>;

/// An erased encode/decode pair for one descriptor.
#[derive(Clone)]
pub struct ConverterEntry {
    pub write: WriteFn,
    pub read: ReadFn,
}

impl ConverterEntry {
    /// Build an entry from a type's trait implementations.
    pub fn of<T: JsonWrite + JsonRead + 'static>() -> ConverterEntry {
        ConverterEntry {
            write: Arc::new(|writer, value| {
                let value = value.downcast_ref::<T>().ok_or_else(|| {
                    Error::type_error(format!(
                        "Converter invoked with a value that is not a {}",
                        std::any::type_name::<T>()
                    ))
                })?;
                value.json_write(writer);
                Ok(())
            }),
            read: Arc::new(|reader| {
                T::json_read(reader).map(|value| Box::new(value) as Box<dyn Any>)
            }),
        }
    }

    /// Build an entry from explicit encode/decode functions (what generated
    /// registration code emits).
    pub fn from_fns(
        write: impl Fn(&mut JsonWriter<'_>, &dyn Any) -> Result<()> + Send + Sync + 'static,
        read: impl Fn(&mut JsonReader<'_>) -> Result<Box<dyn Any>> + Send + Sync + 'static,
    ) -> ConverterEntry {
        ConverterEntry {
            write: Arc::new(write),
            read: Arc::new(read),
        }
    }
}

/// A converter over the [`JsonValue`] model, composed at runtime from a
/// descriptor.
pub struct DynConverter {
    pub write: Box<dyn Fn(&mut JsonWriter<'_>, &JsonValue) -> Result<()> + Send + Sync>,
    pub read: Box<dyn Fn(&mut JsonReader<'_>) -> Result<JsonValue> + Send + Sync>,
}

impl std::fmt::Debug for DynConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynConverter").finish_non_exhaustive()
    }
}

/// The codec facade: settings plus the shared converter registry.
pub struct Json {
    settings: Settings,
    entries: DashMap<TypeDescriptor, ConverterEntry>,
    generics: DashMap<TypeDescriptor, Arc<DynConverter>>,
}

impl Default for Json {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED: Lazy<Json> = Lazy::new(Json::new);

impl Json {
    pub fn new() -> Json {
        Json::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Json {
        Json {
            settings,
            entries: DashMap::new(),
            generics: DashMap::new(),
        }
    }

    /// A process-wide instance with default settings, for applications that
    /// do not need per-instance configuration.
    pub fn shared() -> &'static Json {
        &SHARED
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn make_writer(&self) -> JsonWriter<'static> {
        JsonWriter::new()
            .with_ascii_only(self.settings.ascii_only)
            .with_indent(self.settings.indent)
    }

    // ---- typed entry points ----

    /// Serialize a value to bytes.
    pub fn encode<T: JsonWrite + ?Sized>(&self, value: &T) -> Vec<u8> {
        let mut writer = self.make_writer();
        value.json_write(&mut writer);
        writer.into_bytes()
    }

    /// Serialize with indentation regardless of this instance's settings.
    pub fn encode_pretty<T: JsonWrite + ?Sized>(&self, value: &T) -> Vec<u8> {
        let mut writer = JsonWriter::new()
            .with_ascii_only(self.settings.ascii_only)
            .with_indent(2);
        value.json_write(&mut writer);
        writer.into_bytes()
    }

    /// Serialize into a sink, flushing the internal buffer at the end.
    pub fn encode_into<T: JsonWrite + ?Sized>(
        &self,
        value: &T,
        sink: &mut dyn ByteSink,
    ) -> Result<()> {
        let mut writer = JsonWriter::new()
            .with_ascii_only(self.settings.ascii_only)
            .with_indent(self.settings.indent)
            .with_sink(sink);
        value.json_write(&mut writer);
        writer.flush()
    }

    /// Deserialize a complete in-memory document.
    pub fn decode<T: JsonRead>(&self, bytes: &[u8]) -> Result<T> {
        let mut reader = JsonReader::new(bytes).with_max_depth(self.settings.max_depth);
        reader.next_token()?;
        let value = T::json_read(&mut reader)?;
        reader.expect_eof()?;
        Ok(value)
    }

    /// Deserialize from an incrementally refilled source.
    pub fn decode_stream<T: JsonRead>(&self, source: impl ByteSource) -> Result<T> {
        let mut reader =
            JsonReader::from_source(source).with_max_depth(self.settings.max_depth);
        reader.next_token()?;
        let value = T::json_read(&mut reader)?;
        reader.expect_eof()?;
        Ok(value)
    }

    // ---- registration (the build-time collaborator's hook) ----

    /// Register an erased converter pair for a descriptor. Later
    /// registrations for the same descriptor replace earlier ones; all
    /// registration belongs to the single-threaded setup phase.
    pub fn register_entry(&self, descriptor: TypeDescriptor, entry: ConverterEntry) {
        log::debug!("registering converter for {descriptor}");
        self.entries.insert(descriptor, entry);
    }

    /// Register a type through its trait implementations.
    pub fn register<T: JsonType + JsonWrite + JsonRead + 'static>(&self) {
        self.register_entry(T::descriptor(), ConverterEntry::of::<T>());
    }

    /// Register a runtime converter under a named descriptor, making the
    /// name resolvable on the dynamic path.
    pub fn register_generic(&self, descriptor: TypeDescriptor, converter: DynConverter) {
        self.generics.insert(descriptor, Arc::new(converter));
    }

    // ---- resolution ----

    /// Resolve an erased entry for `T`: an explicit registration for the
    /// exact descriptor wins, otherwise an entry is composed from the trait
    /// implementations and memoized (insert-once under concurrency).
    pub fn resolve_entry<T>(&self) -> ConverterEntry
    where
        T: JsonType + JsonWrite + JsonRead + 'static,
    {
        let descriptor = T::descriptor();
        if let Some(entry) = self.entries.get(&descriptor) {
            return entry.clone();
        }
        let built = ConverterEntry::of::<T>();
        self.entries.entry(descriptor).or_insert(built).clone()
    }

    /// Deserialize through a registered (or resolvable) erased entry.
    pub fn decode_registered<T: JsonType + 'static>(&self, bytes: &[u8]) -> Result<T> {
        let descriptor = T::descriptor();
        let entry = self.lookup_entry(&descriptor)?;
        let mut reader = JsonReader::new(bytes).with_max_depth(self.settings.max_depth);
        reader.next_token()?;
        let value = (entry.read)(&mut reader)?;
        reader.expect_eof()?;
        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            Error::type_error(format!(
                "Registered converter for {descriptor} produced a different type"
            ))
        })
    }

    /// Serialize through a registered erased entry.
    pub fn encode_registered<T: JsonType + 'static>(&self, value: &T) -> Result<Vec<u8>> {
        let descriptor = T::descriptor();
        let entry = self.lookup_entry(&descriptor)?;
        let mut writer = self.make_writer();
        (entry.write)(&mut writer, value)?;
        Ok(writer.into_bytes())
    }

    fn lookup_entry(&self, descriptor: &TypeDescriptor) -> Result<ConverterEntry> {
        self.entries.get(descriptor).map(|e| e.clone()).ok_or_else(|| {
            Error::type_error(format!("No converter registered for {descriptor}"))
        })
    }

    /// Resolve a [`JsonValue`]-typed converter for any descriptor shape,
    /// recursively composing container converters. Memoized per descriptor:
    /// repeated requests are O(1), and concurrent first requests keep
    /// exactly one entry.
    pub fn resolve_generic(&self, descriptor: &TypeDescriptor) -> Result<Arc<DynConverter>> {
        self.resolve_generic_inner(descriptor).map_err(|e| {
            Error::type_error(format!("Unable to resolve {descriptor}: {}", e.message()))
        })
    }

    fn resolve_generic_inner(&self, descriptor: &TypeDescriptor) -> Result<Arc<DynConverter>> {
        if let Some(entry) = self.generics.get(descriptor) {
            return Ok(entry.clone());
        }
        // Compose outside the map lock: recursion below may touch the same
        // shard, and a racing resolver must never observe a partial entry.
        let built = self.compose(descriptor)?;
        log::debug!("composed runtime converter for {descriptor}");
        let entry = self
            .generics
            .entry(descriptor.clone())
            .or_insert(built)
            .clone();
        Ok(entry)
    }

    fn compose(&self, descriptor: &TypeDescriptor) -> Result<Arc<DynConverter>> {
        let converter = match descriptor {
            TypeDescriptor::Primitive(kind) => primitive_converter(*kind),
            TypeDescriptor::Nullable(inner) => {
                let inner = self.resolve_generic_inner(inner)?;
                nullable_converter(inner)
            }
            TypeDescriptor::ArrayOf(inner)
            | TypeDescriptor::ListOf(inner)
            | TypeDescriptor::SetOf(inner) => {
                let inner = self.resolve_generic_inner(inner)?;
                sequence_converter(inner)
            }
            TypeDescriptor::MapOf(key, value) => {
                check_map_key(key, descriptor)?;
                let value = self.resolve_generic_inner(value)?;
                map_converter(value)
            }
            TypeDescriptor::Named(name) => match self.settings.unknown_types {
                UnknownTypes::Allow => schemaless_converter(),
                UnknownTypes::Error => {
                    return Err(Error::type_error(format!(
                        "no converter registered for type '{name}'"
                    )))
                }
            },
        };
        Ok(Arc::new(converter))
    }

    /// Serialize a dynamic value through a descriptor-shaped converter.
    pub fn encode_dynamic(
        &self,
        descriptor: &TypeDescriptor,
        value: &JsonValue,
    ) -> Result<Vec<u8>> {
        let converter = self.resolve_generic(descriptor)?;
        let mut writer = self.make_writer();
        (converter.write)(&mut writer, value)?;
        Ok(writer.into_bytes())
    }

    /// Deserialize a dynamic value through a descriptor-shaped converter.
    pub fn decode_dynamic(
        &self,
        descriptor: &TypeDescriptor,
        bytes: &[u8],
    ) -> Result<JsonValue> {
        let converter = self.resolve_generic(descriptor)?;
        let mut reader = JsonReader::new(bytes).with_max_depth(self.settings.max_depth);
        reader.next_token()?;
        let value = (converter.read)(&mut reader)?;
        reader.expect_eof()?;
        Ok(value)
    }
}

fn value_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Int(_) => "integer",
        JsonValue::Float(_) => "float",
        JsonValue::Decimal(_) => "decimal",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn mismatch(expected: &str, value: &JsonValue) -> Error {
    Error::type_error(format!(
        "value of kind '{}' does not match descriptor {expected}",
        value_kind(value)
    ))
}

fn check_map_key(key: &TypeDescriptor, whole: &TypeDescriptor) -> Result<()> {
    match key {
        TypeDescriptor::Primitive(
            PrimitiveKind::String
            | PrimitiveKind::Uuid
            | PrimitiveKind::I32
            | PrimitiveKind::I64
            | PrimitiveKind::U32
            | PrimitiveKind::U64,
        ) => Ok(()),
        other => Err(Error::type_error(format!(
            "unsupported map key type {other} in {whole}"
        ))),
    }
}

fn schemaless_converter() -> DynConverter {
    DynConverter {
        write: Box::new(|writer, value| {
            value.json_write(writer);
            Ok(())
        }),
        read: Box::new(JsonValue::json_read),
    }
}

fn nullable_converter(inner: Arc<DynConverter>) -> DynConverter {
    let write_inner = Arc::clone(&inner);
    DynConverter {
        write: Box::new(move |writer, value| match value {
            JsonValue::Null => {
                writer.write_null();
                Ok(())
            }
            other => (write_inner.write)(writer, other),
        }),
        read: Box::new(move |reader| {
            if reader.was_null() {
                Ok(JsonValue::Null)
            } else {
                (inner.read)(reader)
            }
        }),
    }
}

fn sequence_converter(inner: Arc<DynConverter>) -> DynConverter {
    let write_inner = Arc::clone(&inner);
    DynConverter {
        write: Box::new(move |writer, value| {
            let JsonValue::Array(items) = value else {
                return Err(mismatch("a sequence", value));
            };
            writer.array_start();
            for (i, item) in items.iter().enumerate() {
                writer.member_prefix(i == 0);
                (write_inner.write)(writer, item)?;
            }
            writer.array_end();
            Ok(())
        }),
        read: Box::new(move |reader| {
            use crate::reader::Token;
            if reader.token() != Token::ArrayStart {
                return Err(reader.error_expecting("["));
            }
            let mut items = Vec::new();
            if reader.next_token()? == Token::ArrayEnd {
                return Ok(JsonValue::Array(items));
            }
            loop {
                items.push((inner.read)(reader)?);
                if !reader.comma_or_array_end()? {
                    return Ok(JsonValue::Array(items));
                }
                reader.next_token()?;
            }
        }),
    }
}

fn map_converter(value_conv: Arc<DynConverter>) -> DynConverter {
    let write_inner = Arc::clone(&value_conv);
    DynConverter {
        write: Box::new(move |writer, value| {
            let JsonValue::Object(entries) = value else {
                return Err(mismatch("a map", value));
            };
            writer.object_start();
            for (i, (key, entry)) in entries.iter().enumerate() {
                writer.member_prefix(i == 0);
                writer.write_string(key);
                writer.colon();
                (write_inner.write)(writer, entry)?;
            }
            writer.object_end();
            Ok(())
        }),
        read: Box::new(move |reader| {
            use crate::reader::Token;
            if reader.token() != Token::ObjectStart {
                return Err(reader.error_expecting("{"));
            }
            let mut entries = std::collections::BTreeMap::new();
            match reader.next_token()? {
                Token::ObjectEnd => return Ok(JsonValue::Object(entries)),
                Token::String => {}
                _ => return Err(reader.error_expecting("\"")),
            }
            loop {
                let key = reader.read_string_owned()?;
                reader.expect_colon()?;
                reader.next_token()?;
                entries.insert(key, (value_conv.read)(reader)?);
                if !reader.comma_or_object_end()? {
                    return Ok(JsonValue::Object(entries));
                }
                if reader.next_token()? != Token::String {
                    return Err(reader.error_expecting("\""));
                }
            }
        }),
    }
}

fn primitive_converter(kind: PrimitiveKind) -> DynConverter {
    use chrono::{DateTime, NaiveDate, Utc};
    match kind {
        PrimitiveKind::Bool => DynConverter {
            write: Box::new(|writer, value| match value {
                JsonValue::Bool(v) => {
                    writer.write_bool(*v);
                    Ok(())
                }
                other => Err(mismatch("Bool", other)),
            }),
            read: Box::new(|reader| reader.read_bool().map(JsonValue::Bool)),
        },
        PrimitiveKind::I32 => int_converter(i64::from(i32::MIN), i64::from(i32::MAX), "Int32"),
        PrimitiveKind::I64 => int_converter(i64::MIN, i64::MAX, "Int64"),
        PrimitiveKind::U32 => int_converter(0, i64::from(u32::MAX), "UInt32"),
        PrimitiveKind::U64 => DynConverter {
            write: Box::new(|writer, value| match value {
                JsonValue::Int(v) if *v >= 0 => {
                    writer.write_u64(*v as u64);
                    Ok(())
                }
                JsonValue::Decimal(d) if d.scale() <= 0 && d.mantissa() >= 0 => {
                    writer.write_raw(d.to_string().as_bytes());
                    Ok(())
                }
                other => Err(mismatch("UInt64", other)),
            }),
            read: Box::new(|reader| {
                let v = reader.read_u64()?;
                Ok(match i64::try_from(v) {
                    Ok(int) => JsonValue::Int(int),
                    Err(_) => JsonValue::Decimal(Decimal::new(v as i128, 0)),
                })
            }),
        },
        PrimitiveKind::F32 | PrimitiveKind::F64 => DynConverter {
            write: Box::new(|writer, value| match value {
                JsonValue::Float(v) => {
                    writer.write_f64(*v);
                    Ok(())
                }
                JsonValue::Int(v) => {
                    writer.write_f64(*v as f64);
                    Ok(())
                }
                JsonValue::Decimal(d) => {
                    writer.write_raw(d.to_string().as_bytes());
                    Ok(())
                }
                other => Err(mismatch("a floating point number", other)),
            }),
            read: Box::new(|reader| {
                reader.with_number_bytes(|bytes, position| {
                    use crate::parse_num::{classify, parse_f64, parse_i64, NumberClass};
                    match classify(bytes, position)? {
                        NumberClass::NonFinite => parse_f64(bytes, position).map(JsonValue::Float),
                        NumberClass::Integer => match parse_i64(bytes, position) {
                            Ok(v) => Ok(JsonValue::Int(v)),
                            Err(_) => parse_f64(bytes, position).map(JsonValue::Float),
                        },
                        NumberClass::Float => match Decimal::from_ascii(bytes, position) {
                            Ok(d) => Ok(JsonValue::Decimal(d)),
                            Err(_) => parse_f64(bytes, position).map(JsonValue::Float),
                        },
                    }
                })
            }),
        },
        PrimitiveKind::Decimal => DynConverter {
            write: Box::new(|writer, value| match value {
                JsonValue::Decimal(d) => {
                    writer.write_raw(d.to_string().as_bytes());
                    Ok(())
                }
                JsonValue::Int(v) => {
                    writer.write_i64(*v);
                    Ok(())
                }
                other => Err(mismatch("Decimal", other)),
            }),
            read: Box::new(|reader| reader.read_decimal().map(JsonValue::Decimal)),
        },
        PrimitiveKind::String => DynConverter {
            write: Box::new(|writer, value| match value {
                JsonValue::String(s) => {
                    writer.write_string(s);
                    Ok(())
                }
                other => Err(mismatch("String", other)),
            }),
            read: Box::new(|reader| {
                use crate::reader::Token;
                if reader.token() != Token::String {
                    return Err(reader.error_expecting("\""));
                }
                reader.read_string_owned().map(JsonValue::String)
            }),
        },
        PrimitiveKind::Uuid => text_converter("Uuid", |reader| {
            uuid::Uuid::json_read(reader).map(|v| v.hyphenated().to_string())
        }),
        PrimitiveKind::Date => text_converter("Date", |reader| {
            NaiveDate::json_read(reader).map(|v| v.format("%Y-%m-%d").to_string())
        }),
        PrimitiveKind::Timestamp => text_converter("Timestamp", |reader| {
            DateTime::<Utc>::json_read(reader)
                .map(|v| v.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
        }),
        PrimitiveKind::Ip => text_converter("Ip", |reader| {
            std::net::IpAddr::json_read(reader).map(|v| v.to_string())
        }),
        PrimitiveKind::Binary => text_converter("Binary", |reader| {
            let bytes = crate::bind::Bytes::json_read(reader)?;
            let mut out = Vec::new();
            crate::base64::encode_into(&mut out, &bytes);
            Ok(String::from_utf8(out).unwrap_or_default())
        }),
    }
}

fn int_converter(min: i64, max: i64, name: &'static str) -> DynConverter {
    DynConverter {
        write: Box::new(move |writer, value| match value {
            JsonValue::Int(v) if *v >= min && *v <= max => {
                writer.write_i64(*v);
                Ok(())
            }
            other => Err(mismatch(name, other)),
        }),
        read: Box::new(move |reader| {
            let v = reader.read_i64()?;
            if v < min || v > max {
                return Err(Error::parse(
                    format!("Number {v} overflows {name}"),
                    reader.position(),
                ));
            }
            Ok(JsonValue::Int(v))
        }),
    }
}

/// Converters whose canonical wire form is a validated string.
fn text_converter(
    name: &'static str,
    read: impl Fn(&mut JsonReader<'_>) -> Result<String> + Send + Sync + 'static,
) -> DynConverter {
    DynConverter {
        write: Box::new(move |writer, value| match value {
            JsonValue::String(s) => {
                writer.write_string(s);
                Ok(())
            }
            other => Err(mismatch(name, other)),
        }),
        read: Box::new(move |reader| read(reader).map(JsonValue::String)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_typed_encode_decode() {
        let json = Json::new();
        assert_eq!(json.encode(&1000000000i64), b"1000000000");
        assert_eq!(json.decode::<i64>(b"1000000000").unwrap(), 1000000000);
    }

    #[test]
    fn test_registered_entry_round_trip() {
        let json = Json::new();
        json.register::<Vec<i64>>();
        let bytes = json.encode_registered(&vec![1i64, 2, 3]).unwrap();
        assert_eq!(bytes, b"[1,2,3]");
        let back: Vec<i64> = json.decode_registered(&bytes).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_unregistered_entry_is_type_error() {
        let json = Json::new();
        let err = json.decode_registered::<Vec<i64>>(b"[1]").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Type);
        assert!(err.message().contains("List<Int64>"));
    }

    #[test]
    fn test_resolve_entry_composes_and_caches() {
        let json = Json::new();
        let entry = json.resolve_entry::<HashMap<String, Vec<i64>>>();
        let mut reader = JsonReader::new(br#"{"a":[1,2]}"#);
        reader.next_token().unwrap();
        let value = (entry.read)(&mut reader).unwrap();
        let map = value.downcast::<HashMap<String, Vec<i64>>>().unwrap();
        assert_eq!(map["a"], vec![1, 2]);
    }

    #[test]
    fn test_generic_resolution_recursive() {
        let json = Json::new();
        let descriptor = HashMap::<String, Vec<Decimal>>::descriptor();
        let decoded = json
            .decode_dynamic(&descriptor, br#"{"a":[1.5,2.50]}"#)
            .unwrap();
        let encoded = json.encode_dynamic(&descriptor, &decoded).unwrap();
        assert_eq!(encoded, br#"{"a":[1.5,2.5]}"#);
    }

    #[test]
    fn test_generic_resolution_names_blocker() {
        let json = Json::new();
        let descriptor = TypeDescriptor::ListOf(Box::new(TypeDescriptor::named("Widget")));
        let err = json.resolve_generic(&descriptor).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Type);
        assert!(err.message().contains("List<Widget>"), "{}", err.message());
        assert!(err.message().contains("'Widget'"), "{}", err.message());
    }

    #[test]
    fn test_unknown_types_opt_in() {
        let json = Json::with_settings(Settings::new().unknown_types(UnknownTypes::Allow));
        let descriptor = TypeDescriptor::named("Anything");
        let value = json.decode_dynamic(&descriptor, br#"{"x":[1,"two"]}"#).unwrap();
        assert!(matches!(value, JsonValue::Object(_)));
    }

    #[test]
    fn test_unsupported_map_key_named() {
        let json = Json::new();
        let descriptor = TypeDescriptor::MapOf(
            Box::new(TypeDescriptor::Primitive(PrimitiveKind::F64)),
            Box::new(TypeDescriptor::Primitive(PrimitiveKind::Bool)),
        );
        let err = json.resolve_generic(&descriptor).unwrap_err();
        assert!(err.message().contains("map key"), "{}", err.message());
    }

    #[test]
    fn test_generic_cache_hit_is_same_entry() {
        let json = Json::new();
        let descriptor = Vec::<i64>::descriptor();
        let first = json.resolve_generic(&descriptor).unwrap();
        let second = json.resolve_generic(&descriptor).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_generic_resolution_single_entry() {
        let json = Arc::new(Json::new());
        let descriptor = HashMap::<String, Vec<i64>>::descriptor();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let json = Arc::clone(&json);
                let descriptor = descriptor.clone();
                std::thread::spawn(move || {
                    let converter = json.resolve_generic(&descriptor).unwrap();
                    let mut reader = JsonReader::new(br#"{"k":[1,2,3]}"#);
                    reader.next_token().unwrap();
                    (converter.read)(&mut reader).unwrap()
                })
            })
            .collect();
        let results: Vec<JsonValue> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for result in &results {
            assert_eq!(result, &results[0]);
        }
        // All racers settled on one cached entry.
        let first = json.resolve_generic(&descriptor).unwrap();
        let second = json.resolve_generic(&descriptor).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_register_generic_makes_name_resolvable() {
        let json = Json::new();
        json.register_generic(
            TypeDescriptor::named("Flag"),
            DynConverter {
                write: Box::new(|writer, value| match value {
                    JsonValue::Bool(v) => {
                        writer.write_bool(*v);
                        Ok(())
                    }
                    other => Err(mismatch("Flag", other)),
                }),
                read: Box::new(|reader| reader.read_bool().map(JsonValue::Bool)),
            },
        );
        let descriptor = TypeDescriptor::ListOf(Box::new(TypeDescriptor::named("Flag")));
        let value = json.decode_dynamic(&descriptor, b"[true,false]").unwrap();
        assert_eq!(
            json.encode_dynamic(&descriptor, &value).unwrap(),
            b"[true,false]"
        );
    }

    #[test]
    fn test_shared_instance() {
        let shared = Json::shared();
        assert_eq!(shared.encode(&true), b"true");
    }

    #[test]
    fn test_encode_into_sink() {
        let json = Json::new();
        let mut sink: Vec<u8> = Vec::new();
        json.encode_into(&vec![1i64, 2], &mut sink).unwrap();
        assert_eq!(sink, b"[1,2]");
    }

    #[test]
    fn test_decode_stream() {
        let json = Json::new();
        let source = crate::input::ChunkSource::new(br#"[1,2,3]"#, 2);
        let decoded: Vec<i64> = json.decode_stream(source).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }
}
