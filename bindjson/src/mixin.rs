// SPDX-License-Identifier: Apache-2.0

//! Polymorphic encoding through a discriminator table.
//!
//! A supertype registers its concrete variants under names. On encode the
//! runtime variant's name is emitted under a reserved key (`"$type"` by
//! convention) as the very first member; on decode that key is required
//! first and selects which format description consumes the remaining
//! members.

use crate::binding::name_hash;
use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};
use crate::object_format::ObjectFormatDescription;
use crate::reader::{JsonReader, Token};
use crate::registry::{ConverterEntry, Json};
use crate::writer::JsonWriter;
use std::any::Any;
use std::sync::Arc;

pub const DEFAULT_DISCRIMINATOR: &str = "$type";

struct MixinVariant<T> {
    name: String,
    hash: u32,
    matches: Box<dyn Fn(&T) -> bool + Send + Sync>,
    write_fields: Box<dyn Fn(&mut JsonWriter<'_>, &T) + Send + Sync>,
    read: Box<dyn Fn(&mut JsonReader<'_>) -> Result<T> + Send + Sync>,
}

/// The discriminator table for one supertype. Closed at registration time:
/// the variant set never changes afterwards.
pub struct MixinDescription<T> {
    type_name: String,
    discriminator: String,
    disc_hash: u32,
    variants: Vec<MixinVariant<T>>,
}

impl<T: 'static> MixinDescription<T> {
    pub fn builder(type_name: &str) -> MixinBuilder<T> {
        MixinBuilder {
            type_name: type_name.to_owned(),
            discriminator: DEFAULT_DISCRIMINATOR.to_owned(),
            variants: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Encode through the supertype: discriminator first, then the
    /// matching variant's members.
    pub fn write(&self, writer: &mut JsonWriter<'_>, value: &T) -> Result<()> {
        let variant = self
            .variants
            .iter()
            .find(|variant| (variant.matches)(value))
            .ok_or_else(|| {
                Error::type_error(format!(
                    "No registered variant of mixin {} matches the value",
                    self.type_name
                ))
            })?;
        writer.object_start();
        writer.member_prefix(true);
        writer.write_string(&self.discriminator);
        writer.colon();
        writer.write_string(&variant.name);
        (variant.write_fields)(writer, value);
        writer.object_end();
        Ok(())
    }

    /// Decode through the supertype; the current token must be `{` and the
    /// discriminator must be the first key.
    pub fn read(&self, reader: &mut JsonReader<'_>) -> Result<T> {
        if reader.token() != Token::ObjectStart {
            return Err(reader.error_expecting("{"));
        }
        let position = reader.position();
        if reader.next_token()? != Token::String {
            return Err(self.discriminator_error(position, None));
        }
        let hash = reader.fill_name()?;
        if hash != self.disc_hash || !reader.last_name_matches(&self.discriminator) {
            let found = reader.last_name();
            return Err(self.discriminator_error(position, Some(&found)));
        }
        if reader.next_token()? != Token::String {
            return Err(reader.error_expecting("\""));
        }
        let name_position = reader.position();
        let name = reader.read_string_owned()?;
        let hash = name_hash(&name);
        let variant = self
            .variants
            .iter()
            .find(|variant| variant.hash == hash && variant.name == name)
            .ok_or_else(|| {
                Error::schema(
                    format!(
                        "Unable to find decoder for '{}' for mixin {}",
                        name, self.type_name
                    ),
                    Some(name_position),
                )
            })?;
        (variant.read)(reader)
    }

    fn discriminator_error(&self, position: usize, found: Option<&str>) -> Error {
        let mut message = format!(
            "Expecting \"{}\" attribute as first element of mixin {}",
            self.discriminator, self.type_name
        );
        if let Some(found) = found {
            message.push_str(&format!(". Found: '{found}'"));
        }
        Error::schema(message, Some(position))
    }
}

pub struct MixinBuilder<T> {
    type_name: String,
    discriminator: String,
    variants: Vec<MixinVariant<T>>,
}

impl<T: 'static> MixinBuilder<T> {
    /// Override the reserved discriminator key.
    pub fn discriminator(mut self, name: &str) -> Self {
        self.discriminator = name.to_owned();
        self
    }

    /// Register a concrete variant under `name`. `project` recognizes and
    /// exposes the variant inside a supertype value; `wrap` lifts a decoded
    /// variant back into the supertype.
    pub fn variant<B, C>(
        mut self,
        name: &str,
        description: ObjectFormatDescription<B, C>,
        project: impl Fn(&T) -> Option<&C> + Send + Sync + 'static,
        wrap: impl Fn(C) -> T + Send + Sync + 'static,
    ) -> Self
    where
        B: 'static,
        C: 'static,
    {
        let description = Arc::new(description);
        let read_desc = Arc::clone(&description);
        let project = Arc::new(project);
        let match_project = Arc::clone(&project);
        self.variants.push(MixinVariant {
            name: name.to_owned(),
            hash: name_hash(name),
            matches: Box::new(move |value| match_project(value).is_some()),
            write_fields: Box::new(move |writer, value| {
                if let Some(concrete) = project(value) {
                    description.write_members(writer, concrete, false);
                }
            }),
            read: Box::new(move |reader| read_desc.read_tail(reader).map(&wrap)),
        });
        self
    }

    /// Validate and freeze the table. A supertype with zero variants, a
    /// duplicate variant name or an invalid discriminator fails here, at
    /// registration.
    pub fn build(self) -> Result<MixinDescription<T>> {
        if self.variants.is_empty() {
            return Err(Error::registration(format!(
                "Mixin {} was registered with zero concrete variants",
                self.type_name
            )));
        }
        if self.discriminator.is_empty() || self.discriminator.contains('"') {
            return Err(Error::registration(format!(
                "Invalid discriminator provided for mixin {}: '{}'",
                self.type_name, self.discriminator
            )));
        }
        for (i, variant) in self.variants.iter().enumerate() {
            if self.variants[..i].iter().any(|v| v.name == variant.name) {
                return Err(Error::registration(format!(
                    "Duplicate variant name '{}' in mixin {}",
                    variant.name, self.type_name
                )));
            }
        }
        Ok(MixinDescription {
            disc_hash: name_hash(&self.discriminator),
            type_name: self.type_name,
            discriminator: self.discriminator,
            variants: self.variants,
        })
    }
}

impl Json {
    /// Register a polymorphic supertype under its name.
    pub fn register_mixin<T: 'static>(&self, mixin: MixinDescription<T>) {
        let name = mixin.type_name.clone();
        let mixin = Arc::new(mixin);
        let write_mixin = Arc::clone(&mixin);
        self.register_entry(
            TypeDescriptor::named(name),
            ConverterEntry::from_fns(
                move |writer, value| {
                    let value = value.downcast_ref::<T>().ok_or_else(|| {
                        Error::type_error(format!(
                            "Converter for mixin {} invoked with a different type",
                            write_mixin.type_name
                        ))
                    })?;
                    write_mixin.write(writer, value)
                },
                move |reader| mixin.read(reader).map(|value| Box::new(value) as Box<dyn Any>),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Property;

    #[derive(Debug, Default, PartialEq, Clone)]
    struct Circle {
        radius: i64,
    }

    #[derive(Debug, Default, PartialEq, Clone)]
    struct Rect {
        w: i64,
        h: i64,
    }

    #[derive(Debug, PartialEq, Clone)]
    enum Shape {
        Circle(Circle),
        Rect(Rect),
    }

    fn circle_format() -> ObjectFormatDescription<Circle, Circle> {
        ObjectFormatDescription::<Circle, Circle>::mutable("Circle")
            .add(
                Property::new("radius")
                    .mandatory()
                    .writer(|w, c: &Circle| w.write_i64(c.radius))
                    .reader(|r, c: &mut Circle| {
                        c.radius = r.read_i64()?;
                        Ok(())
                    }),
            )
            .build()
            .unwrap()
    }

    fn rect_format() -> ObjectFormatDescription<Rect, Rect> {
        ObjectFormatDescription::<Rect, Rect>::mutable("Rect")
            .add(
                Property::new("w")
                    .mandatory()
                    .writer(|w, v: &Rect| w.write_i64(v.w))
                    .reader(|r, v: &mut Rect| {
                        v.w = r.read_i64()?;
                        Ok(())
                    }),
            )
            .add(
                Property::new("h")
                    .mandatory()
                    .writer(|w, v: &Rect| w.write_i64(v.h))
                    .reader(|r, v: &mut Rect| {
                        v.h = r.read_i64()?;
                        Ok(())
                    }),
            )
            .build()
            .unwrap()
    }

    fn shape_mixin() -> MixinDescription<Shape> {
        MixinDescription::builder("Shape")
            .variant(
                "circle",
                circle_format(),
                |shape: &Shape| match shape {
                    Shape::Circle(c) => Some(c),
                    _ => None,
                },
                Shape::Circle,
            )
            .variant(
                "rect",
                rect_format(),
                |shape: &Shape| match shape {
                    Shape::Rect(r) => Some(r),
                    _ => None,
                },
                Shape::Rect,
            )
            .build()
            .unwrap()
    }

    fn decode(mixin: &MixinDescription<Shape>, text: &str) -> Result<Shape> {
        let mut reader = JsonReader::new(text.as_bytes());
        reader.next_token()?;
        mixin.read(&mut reader)
    }

    #[test]
    fn test_discriminator_round_trip() {
        let mixin = shape_mixin();
        let shape = Shape::Rect(Rect { w: 3, h: 4 });
        let mut writer = JsonWriter::new();
        mixin.write(&mut writer, &shape).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes, br#"{"$type":"rect","w":3,"h":4}"#);
        let decoded = decode(&mixin, std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(decoded, shape);
    }

    #[test]
    fn test_variant_with_no_extra_fields() {
        let mixin = shape_mixin();
        // A circle missing its mandatory field still fails, even through
        // the mixin path.
        let err = decode(&mixin, r#"{"$type":"circle"}"#).unwrap_err();
        assert!(err.message().contains("(radius)"), "{}", err.message());
    }

    #[test]
    fn test_missing_discriminator_first() {
        let mixin = shape_mixin();
        let err = decode(&mixin, r#"{"radius":1,"$type":"circle"}"#).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Schema);
        assert!(
            err.message().contains("\"$type\" attribute as first element"),
            "{}",
            err.message()
        );
        assert!(err.message().contains("'radius'"), "{}", err.message());
    }

    #[test]
    fn test_unknown_variant_name() {
        let mixin = shape_mixin();
        let err = decode(&mixin, r#"{"$type":"hexagon","r":1}"#).unwrap_err();
        assert!(err.message().contains("'hexagon'"), "{}", err.message());
    }

    #[test]
    fn test_zero_variants_rejected() {
        let result = MixinDescription::<Shape>::builder("Shape").build();
        assert_eq!(
            result.err().map(|e| e.kind()),
            Some(crate::error::ErrorKind::Registration)
        );
    }

    #[test]
    fn test_duplicate_variant_rejected() {
        let result = MixinDescription::builder("Shape")
            .variant(
                "circle",
                circle_format(),
                |shape: &Shape| match shape {
                    Shape::Circle(c) => Some(c),
                    _ => None,
                },
                Shape::Circle,
            )
            .variant(
                "circle",
                circle_format(),
                |shape: &Shape| match shape {
                    Shape::Circle(c) => Some(c),
                    _ => None,
                },
                Shape::Circle,
            )
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_discriminator_rejected() {
        let result = MixinDescription::builder("Shape")
            .discriminator("bad\"key")
            .variant(
                "circle",
                circle_format(),
                |shape: &Shape| match shape {
                    Shape::Circle(c) => Some(c),
                    _ => None,
                },
                Shape::Circle,
            )
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_discriminator() {
        let mixin = MixinDescription::builder("Shape")
            .discriminator("kind")
            .variant(
                "circle",
                circle_format(),
                |shape: &Shape| match shape {
                    Shape::Circle(c) => Some(c),
                    _ => None,
                },
                Shape::Circle,
            )
            .build()
            .unwrap();
        let shape = Shape::Circle(Circle { radius: 5 });
        let mut writer = JsonWriter::new();
        mixin.write(&mut writer, &shape).unwrap();
        assert_eq!(writer.as_slice(), br#"{"kind":"circle","radius":5}"#);
    }
}
