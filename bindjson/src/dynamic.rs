// SPDX-License-Identifier: Apache-2.0

//! A schemaless document model.
//!
//! [`JsonValue`] is the decode target for payloads with no registered shape
//! and the carrier for runtime-composed generic converters. Finite numbers
//! that fit 38 significant digits are held as exact decimals so a dynamic
//! round trip never moves a value through binary floating point; only the
//! non-finite literals fall back to `Float`.

use crate::bind::{JsonRead, JsonWrite};
use crate::decimal::Decimal;
use crate::error::Result;
use crate::parse_num::{self, NumberClass};
use crate::reader::{JsonReader, Token};
use crate::writer::JsonWriter;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    /// An integer literal that fits `i64`.
    Int(i64),
    /// A non-finite literal, or a finite literal beyond `Decimal` precision.
    Float(f64),
    /// Any other finite numeric literal, held exactly.
    Decimal(Decimal),
    String(String),
    Array(Vec<JsonValue>),
    Object(BTreeMap<String, JsonValue>),
}

impl JsonValue {
    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    /// Numeric view as `f64`, for callers that accept rounding.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsonValue::Int(v) => Some(*v as f64),
            JsonValue::Float(v) => Some(*v),
            JsonValue::Decimal(v) => Some(v.to_f64()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl JsonWrite for JsonValue {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        match self {
            JsonValue::Null => writer.write_null(),
            JsonValue::Bool(v) => writer.write_bool(*v),
            JsonValue::Int(v) => writer.write_i64(*v),
            JsonValue::Float(v) => writer.write_f64(*v),
            JsonValue::Decimal(v) => writer.write_raw(v.to_string().as_bytes()),
            JsonValue::String(v) => writer.write_string(v),
            JsonValue::Array(items) => {
                writer.array_start();
                for (i, item) in items.iter().enumerate() {
                    writer.member_prefix(i == 0);
                    item.json_write(writer);
                }
                writer.array_end();
            }
            JsonValue::Object(entries) => {
                writer.object_start();
                for (i, (key, value)) in entries.iter().enumerate() {
                    writer.member_prefix(i == 0);
                    writer.write_string(key);
                    writer.colon();
                    value.json_write(writer);
                }
                writer.object_end();
            }
        }
    }
}

impl JsonRead for JsonValue {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<JsonValue> {
        match reader.token() {
            Token::Null => Ok(JsonValue::Null),
            Token::True => Ok(JsonValue::Bool(true)),
            Token::False => Ok(JsonValue::Bool(false)),
            Token::Number => reader.with_number_bytes(|bytes, position| {
                match parse_num::classify(bytes, position)? {
                    NumberClass::Integer => match parse_num::parse_i64(bytes, position) {
                        Ok(v) => Ok(JsonValue::Int(v)),
                        // Wider than i64: keep the digits exactly.
                        Err(_) => Decimal::from_ascii(bytes, position).map(JsonValue::Decimal),
                    },
                    NumberClass::Float => match Decimal::from_ascii(bytes, position) {
                        Ok(v) => Ok(JsonValue::Decimal(v)),
                        Err(_) => parse_num::parse_f64(bytes, position).map(JsonValue::Float),
                    },
                    NumberClass::NonFinite => {
                        parse_num::parse_f64(bytes, position).map(JsonValue::Float)
                    }
                }
            }),
            Token::String => reader.read_string_owned().map(JsonValue::String),
            Token::ArrayStart => {
                let mut items = Vec::new();
                if reader.next_token()? == Token::ArrayEnd {
                    return Ok(JsonValue::Array(items));
                }
                loop {
                    items.push(JsonValue::json_read(reader)?);
                    if !reader.comma_or_array_end()? {
                        return Ok(JsonValue::Array(items));
                    }
                    reader.next_token()?;
                }
            }
            Token::ObjectStart => {
                let mut entries = BTreeMap::new();
                match reader.next_token()? {
                    Token::ObjectEnd => return Ok(JsonValue::Object(entries)),
                    Token::String => {}
                    _ => return Err(reader.error_expecting("\"")),
                }
                loop {
                    let key = reader.read_string_owned()?;
                    reader.expect_colon()?;
                    reader.next_token()?;
                    let value = JsonValue::json_read(reader)?;
                    entries.insert(key, value);
                    if !reader.comma_or_object_end()? {
                        return Ok(JsonValue::Object(entries));
                    }
                    if reader.next_token()? != Token::String {
                        return Err(reader.error_expecting("\""));
                    }
                }
            }
            Token::ArrayEnd | Token::ObjectEnd | Token::Eof => {
                Err(reader.error_expecting("value"))
            }
        }
    }
}
