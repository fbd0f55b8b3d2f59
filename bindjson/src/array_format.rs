// SPDX-License-Identifier: Apache-2.0

//! Array-format binding: `[value,...]` matched by fixed position.
//!
//! Every binding carries a distinct index; gaps between indices are legal
//! and simply never realized as elements. Decoding consumes exactly the
//! declared number of positions — a short array fails inside the slot whose
//! value is missing, a long one fails with a distinct extra-value error.

use crate::binding::{Property, ReadProp, WriteProp};
use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};
use crate::reader::{JsonReader, Token};
use crate::registry::{ConverterEntry, Json};
use crate::writer::JsonWriter;
use std::any::Any;
use std::sync::Arc;

/// Binds a structured type to the positional array format.
pub struct ArrayFormatDescription<B, T> {
    type_name: String,
    new_instance: Box<dyn Fn() -> B + Send + Sync>,
    finalize: Box<dyn Fn(B) -> Result<T> + Send + Sync>,
    write_props: Vec<WriteProp<T>>,
    read_props: Vec<ReadProp<B>>,
}

impl<T: Default + 'static> ArrayFormatDescription<T, T> {
    pub fn mutable(type_name: &str) -> ArrayFormatBuilder<T, T> {
        ArrayFormatBuilder::new(
            type_name,
            Box::new(T::default),
            Box::new(|instance| Ok(instance)),
        )
    }
}

impl<T: 'static> ArrayFormatDescription<crate::binding::CtorSlots, T> {
    pub fn constructor_bound(
        type_name: &str,
        arity: usize,
        construct: impl Fn(&mut crate::binding::CtorSlots) -> Result<T> + Send + Sync + 'static,
    ) -> ArrayFormatBuilder<crate::binding::CtorSlots, T> {
        ArrayFormatBuilder::new(
            type_name,
            Box::new(move || crate::binding::CtorSlots::new(arity)),
            Box::new(move |mut slots| construct(&mut slots)),
        )
    }
}

impl<B: 'static, T: 'static> ArrayFormatDescription<B, T> {
    pub fn builder_bound(
        type_name: &str,
        new_builder: impl Fn() -> B + Send + Sync + 'static,
        build: impl Fn(B) -> Result<T> + Send + Sync + 'static,
    ) -> ArrayFormatBuilder<B, T> {
        ArrayFormatBuilder::new(type_name, Box::new(new_builder), Box::new(build))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Number of positions on the wire.
    pub fn arity(&self) -> usize {
        self.read_props.len()
    }

    /// Encode the declared bindings in index order.
    pub fn write(&self, writer: &mut JsonWriter<'_>, value: &T) {
        writer.array_start();
        for (i, write) in self.write_props.iter().enumerate() {
            writer.member_prefix(i == 0);
            write(writer, value);
        }
        writer.array_end();
    }

    /// Decode exactly the declared number of positions; the current token
    /// must be `[`.
    pub fn read(&self, reader: &mut JsonReader<'_>) -> Result<T> {
        if reader.token() != Token::ArrayStart {
            return Err(reader.error_expecting("["));
        }
        let mut target = (self.new_instance)();
        if self.read_props.is_empty() {
            if reader.next_token()? != Token::ArrayEnd {
                return Err(reader.error_expecting("]"));
            }
            return (self.finalize)(target);
        }
        for (i, read) in self.read_props.iter().enumerate() {
            reader.next_token()?;
            read(reader, &mut target)?;
            if i + 1 < self.read_props.len() {
                // Where the next slot's value should start, for the error.
                let position = reader.position();
                if !reader.comma_or_array_end()? {
                    return Err(Error::schema(
                        format!(
                            "Expecting to read {} elements in the array while decoding {}",
                            self.read_props.len(),
                            self.type_name
                        ),
                        Some(position),
                    ));
                }
            }
        }
        if reader.comma_or_array_end()? {
            // Land on the surplus element so the error carries its offset.
            let _ = reader.next_token();
            let position = reader.position();
            return Err(Error::schema(
                format!(
                    "Expecting end of array while decoding {}: found extra value",
                    self.type_name
                ),
                Some(position),
            ));
        }
        (self.finalize)(target)
    }
}

pub struct ArrayFormatBuilder<B, T> {
    type_name: String,
    new_instance: Box<dyn Fn() -> B + Send + Sync>,
    finalize: Box<dyn Fn(B) -> Result<T> + Send + Sync>,
    props: Vec<Property<B, T>>,
}

impl<B: 'static, T: 'static> ArrayFormatBuilder<B, T> {
    fn new(
        type_name: &str,
        new_instance: Box<dyn Fn() -> B + Send + Sync>,
        finalize: Box<dyn Fn(B) -> Result<T> + Send + Sync>,
    ) -> Self {
        ArrayFormatBuilder {
            type_name: type_name.to_owned(),
            new_instance,
            finalize,
            props: Vec::new(),
        }
    }

    pub fn add(mut self, property: Property<B, T>) -> Self {
        self.props.push(property);
        self
    }

    /// Validate and freeze. A duplicate index or a binding without an index,
    /// reader or writer is a registration error, raised here rather than at
    /// first decode.
    pub fn build(self) -> Result<ArrayFormatDescription<B, T>> {
        let mut indexed: Vec<(usize, Property<B, T>)> = Vec::with_capacity(self.props.len());
        for prop in self.props {
            let index = prop.index.ok_or_else(|| {
                Error::registration(format!(
                    "Property '{}' of {} has no array index",
                    prop.name, self.type_name
                ))
            })?;
            if indexed.iter().any(|(existing, _)| *existing == index) {
                return Err(Error::registration(format!(
                    "Duplicate array index {} in registration of {}",
                    index, self.type_name
                )));
            }
            indexed.push((index, prop));
        }
        indexed.sort_by_key(|(index, _)| *index);
        let mut write_props = Vec::with_capacity(indexed.len());
        let mut read_props = Vec::with_capacity(indexed.len());
        for (_, prop) in indexed {
            let write = prop.write.ok_or_else(|| {
                Error::registration(format!(
                    "Property '{}' of {} has no writer; the array format requires both directions",
                    prop.name, self.type_name
                ))
            })?;
            let read = prop.read.ok_or_else(|| {
                Error::registration(format!(
                    "Property '{}' of {} has no reader; the array format requires both directions",
                    prop.name, self.type_name
                ))
            })?;
            write_props.push(write);
            read_props.push(read);
        }
        Ok(ArrayFormatDescription {
            type_name: self.type_name,
            new_instance: self.new_instance,
            finalize: self.finalize,
            write_props,
            read_props,
        })
    }
}

impl Json {
    /// Register both formats for one type: decoding selects by the opening
    /// token (`{` or `[`), encoding uses the object format.
    pub fn register_both_formats<B1: 'static, B2: 'static, T: 'static>(
        &self,
        object: crate::object_format::ObjectFormatDescription<B1, T>,
        array: ArrayFormatDescription<B2, T>,
    ) {
        let name = object.type_name().to_owned();
        let object = Arc::new(object);
        let array = Arc::new(array);
        let write_object = Arc::clone(&object);
        self.register_entry(
            TypeDescriptor::named(name),
            ConverterEntry::from_fns(
                move |writer, value| {
                    let value = value.downcast_ref::<T>().ok_or_else(|| {
                        Error::type_error(format!(
                            "Converter for {} invoked with a different type",
                            write_object.type_name()
                        ))
                    })?;
                    write_object.write(writer, value);
                    Ok(())
                },
                move |reader| {
                    use crate::reader::Token;
                    let value = match reader.token() {
                        Token::ObjectStart => object.read(reader)?,
                        Token::ArrayStart => array.read(reader)?,
                        _ => return Err(reader.error_expecting("{' or '[")),
                    };
                    Ok(Box::new(value) as Box<dyn Any>)
                },
            ),
        );
    }

    /// Register a type's array format under its name.
    pub fn register_array_format<B: 'static, T: 'static>(
        &self,
        description: ArrayFormatDescription<B, T>,
    ) {
        let name = description.type_name.clone();
        let description = Arc::new(description);
        let write_desc = Arc::clone(&description);
        self.register_entry(
            TypeDescriptor::named(name),
            ConverterEntry::from_fns(
                move |writer, value| {
                    let value = value.downcast_ref::<T>().ok_or_else(|| {
                        Error::type_error(format!(
                            "Converter for {} invoked with a different type",
                            write_desc.type_name
                        ))
                    })?;
                    write_desc.write(writer, value);
                    Ok(())
                },
                move |reader| {
                    description
                        .read(reader)
                        .map(|value| Box::new(value) as Box<dyn Any>)
                },
            ),
        );
    }
}
