// SPDX-License-Identifier: Apache-2.0

//! A high-throughput JSON codec with a cached per-type converter registry.
//!
//! The crate splits into three layers:
//!
//! - **Byte layer**: [`JsonWriter`] appends tokens into a growable buffer
//!   with exact numeric formatting; [`JsonReader`] tokenizes bounded or
//!   streaming bytes with precise error positions.
//! - **Binding layer**: [`JsonWrite`]/[`JsonRead`] give types their wire
//!   form; [`ObjectFormatDescription`] and [`ArrayFormatDescription`] bind
//!   structured types by name or by position; [`MixinDescription`] handles
//!   polymorphism through a discriminator key.
//! - **Registry**: [`Json`] owns settings plus a concurrent, lazily
//!   populated cache of converters keyed by structural [`TypeDescriptor`].
//!
//! Two deliberate wire extensions: non-finite floats serialize as the bare
//! literals `NaN`, `Infinity` and `-Infinity`, and polymorphic objects
//! carry a reserved discriminator key (`"$type"`) as their first member.
//!
//! # Example
//!
//! ```
//! use bindjson::Json;
//! use std::collections::HashMap;
//!
//! let json = Json::new();
//! let mut map = HashMap::new();
//! map.insert("a".to_string(), "b".to_string());
//!
//! let bytes = json.encode(&map);
//! assert_eq!(bytes, br#"{"a":"b"}"#);
//!
//! let back: HashMap<String, String> = json.decode(&bytes).unwrap();
//! assert_eq!(back, map);
//! ```

mod array_format;
mod base64;
mod bind;
mod binding;
mod decimal;
mod descriptor;
mod dynamic;
mod error;
mod escape;
mod fmt_num;
mod input;
mod mixin;
mod net_convert;
mod object_format;
mod parse_num;
mod reader;
mod registry;
mod time_convert;
mod uuid_convert;
mod writer;

pub use array_format::{ArrayFormatBuilder, ArrayFormatDescription};
pub use bind::{Bytes, JsonKey, JsonRead, JsonWrite};
pub use binding::{name_hash, CtorSlots, Property};
pub use decimal::Decimal;
pub use descriptor::{JsonType, PrimitiveKind, TypeDescriptor};
pub use dynamic::JsonValue;
pub use error::{Error, ErrorKind, Result};
pub use input::{ByteSink, ByteSource, ChunkSource};
pub use mixin::{MixinBuilder, MixinDescription, DEFAULT_DISCRIMINATOR};
pub use object_format::{ObjectFormatBuilder, ObjectFormatDescription, UnknownPolicy};
pub use reader::{JsonReader, Token};
pub use registry::{ConverterEntry, DynConverter, Json, Settings, UnknownTypes};
pub use writer::JsonWriter;
