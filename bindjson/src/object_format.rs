// SPDX-License-Identifier: Apache-2.0

//! Object-format binding: `{"field":value,...}` matched by name.
//!
//! Incoming keys dispatch on their FNV-1a hash against a sorted table; a
//! binding that collides with another (or opts in via `exact_match`) is
//! confirmed with a raw byte comparison before it accepts the key. After the
//! closing brace every mandatory binding must have been seen.

use crate::binding::{name_hash, quoted_name, CtorSlots, Property, ReadProp, WriteProp};
use crate::error::{Error, Result};
use crate::reader::{JsonReader, Token};
use crate::registry::{ConverterEntry, Json};
use crate::descriptor::TypeDescriptor;
use crate::writer::JsonWriter;
use std::any::Any;
use std::sync::Arc;

/// What to do with an incoming key no binding accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPolicy {
    /// Structurally skip the value (default).
    Skip,
    /// Fail, naming the unexpected key.
    Fail,
}

struct ReadBinding<B> {
    read: ReadProp<B>,
    mandatory_bit: u64,
}

struct DispatchRow {
    hash: u32,
    name: String,
    prop: usize,
    exact: bool,
}

/// Binds a structured type to the object format.
///
/// `B` is the decode target chosen by the assembly strategy; `T` the final
/// type. Created once at registration and read-only afterwards.
pub struct ObjectFormatDescription<B, T> {
    type_name: String,
    new_instance: Box<dyn Fn() -> B + Send + Sync>,
    finalize: Box<dyn Fn(B) -> Result<T> + Send + Sync>,
    write_props: Vec<(Vec<u8>, WriteProp<T>)>,
    read_props: Vec<ReadBinding<B>>,
    table: Vec<DispatchRow>,
    mandatory_mask: u64,
    mandatory_names: Vec<(u64, String)>,
    unknown: UnknownPolicy,
}

impl<T: Default + 'static> ObjectFormatDescription<T, T> {
    /// Mutable assembly: default-construct, then write each decoded field
    /// through its setter.
    pub fn mutable(type_name: &str) -> ObjectFormatBuilder<T, T> {
        ObjectFormatBuilder::new(
            type_name,
            Box::new(T::default),
            Box::new(|instance| Ok(instance)),
        )
    }
}

impl<T: 'static> ObjectFormatDescription<CtorSlots, T> {
    /// Constructor-bound assembly: buffer decoded values, then invoke the
    /// constructor with all of them in declared parameter order.
    pub fn constructor_bound(
        type_name: &str,
        arity: usize,
        construct: impl Fn(&mut CtorSlots) -> Result<T> + Send + Sync + 'static,
    ) -> ObjectFormatBuilder<CtorSlots, T> {
        ObjectFormatBuilder::new(
            type_name,
            Box::new(move || CtorSlots::new(arity)),
            Box::new(move |mut slots| construct(&mut slots)),
        )
    }
}

impl<B: 'static, T: 'static> ObjectFormatDescription<B, T> {
    /// Builder-bound assembly: decoded fields mutate an intermediate
    /// builder, and a terminal build step produces the immutable instance.
    pub fn builder_bound(
        type_name: &str,
        new_builder: impl Fn() -> B + Send + Sync + 'static,
        build: impl Fn(B) -> Result<T> + Send + Sync + 'static,
    ) -> ObjectFormatBuilder<B, T> {
        ObjectFormatBuilder::new(type_name, Box::new(new_builder), Box::new(build))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Encode as a complete object.
    pub fn write(&self, writer: &mut JsonWriter<'_>, value: &T) {
        writer.object_start();
        self.write_members(writer, value, true);
        writer.object_end();
    }

    /// Encode the members only; used when a discriminator was already
    /// emitted as the first member.
    pub(crate) fn write_members(&self, writer: &mut JsonWriter<'_>, value: &T, mut first: bool) {
        for (quoted, write) in &self.write_props {
            writer.member_prefix(first);
            first = false;
            writer.write_raw(quoted);
            writer.colon();
            write(writer, value);
        }
    }

    /// Decode a complete object; the current token must be `{`.
    pub fn read(&self, reader: &mut JsonReader<'_>) -> Result<T> {
        if reader.token() != Token::ObjectStart {
            return Err(reader.error_expecting("{"));
        }
        let mut target = (self.new_instance)();
        let mut seen: u64 = 0;
        match reader.next_token()? {
            Token::ObjectEnd => {}
            Token::String => self.read_members(reader, &mut target, &mut seen)?,
            _ => return Err(reader.error_expecting("\"")),
        }
        self.check_mandatory(seen, reader.position().saturating_sub(1))?;
        (self.finalize)(target)
    }

    /// Decode the members after a discriminator: the reader sits right
    /// after the discriminator's value.
    pub(crate) fn read_tail(&self, reader: &mut JsonReader<'_>) -> Result<T> {
        let mut target = (self.new_instance)();
        let mut seen: u64 = 0;
        if reader.comma_or_object_end()? {
            if reader.next_token()? != Token::String {
                return Err(reader.error_expecting("\""));
            }
            self.read_members(reader, &mut target, &mut seen)?;
        }
        self.check_mandatory(seen, reader.position().saturating_sub(1))?;
        (self.finalize)(target)
    }

    fn read_members(
        &self,
        reader: &mut JsonReader<'_>,
        target: &mut B,
        seen: &mut u64,
    ) -> Result<()> {
        loop {
            let hash = reader.fill_name()?;
            match self.dispatch(reader, hash) {
                Some(prop) => {
                    reader.next_token()?;
                    let binding = &self.read_props[prop];
                    (binding.read)(reader, target)?;
                    *seen |= binding.mandatory_bit;
                }
                None => match self.unknown {
                    UnknownPolicy::Skip => {
                        reader.next_token()?;
                        reader.skip_value()?;
                    }
                    UnknownPolicy::Fail => {
                        let position = reader.position();
                        return Err(Error::schema(
                            format!(
                                "Unknown property detected: '{}' while reading {}",
                                reader.last_name(),
                                self.type_name
                            ),
                            Some(position),
                        ));
                    }
                },
            }
            if !reader.comma_or_object_end()? {
                return Ok(());
            }
            if reader.next_token()? != Token::String {
                return Err(reader.error_expecting("\""));
            }
        }
    }

    /// Hash dispatch over the sorted table, with raw-byte confirmation
    /// where required.
    fn dispatch(&self, reader: &JsonReader<'_>, hash: u32) -> Option<usize> {
        let mut i = self.table.partition_point(|row| row.hash < hash);
        while let Some(row) = self.table.get(i) {
            if row.hash != hash {
                break;
            }
            if !row.exact || reader.last_name_matches(&row.name) {
                return Some(row.prop);
            }
            i += 1;
        }
        None
    }

    fn check_mandatory(&self, seen: u64, brace_position: usize) -> Result<()> {
        let missing = self.mandatory_mask & !seen;
        if missing == 0 {
            return Ok(());
        }
        let names: Vec<&str> = self
            .mandatory_names
            .iter()
            .filter(|(bit, _)| bit & missing != 0)
            .map(|(_, name)| name.as_str())
            .collect();
        Err(Error::schema(
            format!(
                "Mandatory properties ({}) not found while reading {}",
                names.join(", "),
                self.type_name
            ),
            Some(brace_position),
        ))
    }
}

/// Collects property declarations, then validates them into a description.
pub struct ObjectFormatBuilder<B, T> {
    type_name: String,
    new_instance: Box<dyn Fn() -> B + Send + Sync>,
    finalize: Box<dyn Fn(B) -> Result<T> + Send + Sync>,
    props: Vec<Property<B, T>>,
    unknown: UnknownPolicy,
}

impl<B: 'static, T: 'static> ObjectFormatBuilder<B, T> {
    fn new(
        type_name: &str,
        new_instance: Box<dyn Fn() -> B + Send + Sync>,
        finalize: Box<dyn Fn(B) -> Result<T> + Send + Sync>,
    ) -> Self {
        ObjectFormatBuilder {
            type_name: type_name.to_owned(),
            new_instance,
            finalize,
            props: Vec::new(),
            unknown: UnknownPolicy::Skip,
        }
    }

    pub fn on_unknown(mut self, policy: UnknownPolicy) -> Self {
        self.unknown = policy;
        self
    }

    pub fn add(mut self, property: Property<B, T>) -> Self {
        self.props.push(property);
        self
    }

    /// Validate and freeze the description. Registration errors (duplicate
    /// names or aliases, missing readers, too many properties) surface
    /// here, before any serialization is attempted.
    pub fn build(self) -> Result<ObjectFormatDescription<B, T>> {
        if self.props.len() > 64 {
            return Err(Error::registration(format!(
                "{} declares {} properties; the object format supports at most 64",
                self.type_name,
                self.props.len()
            )));
        }
        let mut write_props = Vec::new();
        let mut read_props = Vec::new();
        let mut table: Vec<DispatchRow> = Vec::new();
        let mut mandatory_mask = 0u64;
        let mut mandatory_names = Vec::new();
        for (prop_index, prop) in self.props.into_iter().enumerate() {
            let read = prop.read.ok_or_else(|| {
                Error::registration(format!(
                    "Property '{}' of {} has no reader",
                    prop.name, self.type_name
                ))
            })?;
            let mandatory_bit = if prop.mandatory {
                let bit = 1u64 << prop_index;
                mandatory_mask |= bit;
                mandatory_names.push((bit, prop.name.clone()));
                bit
            } else {
                0
            };
            if let Some(write) = prop.write {
                write_props.push((quoted_name(&prop.name), write));
            }
            for name in std::iter::once(&prop.name).chain(prop.aliases.iter()) {
                if table.iter().any(|row| row.name == *name) {
                    return Err(Error::registration(format!(
                        "Duplicate property name '{}' in registration of {}",
                        name, self.type_name
                    )));
                }
                table.push(DispatchRow {
                    hash: name_hash(name),
                    name: name.clone(),
                    prop: prop_index,
                    exact: prop.exact,
                });
            }
            read_props.push(ReadBinding {
                read,
                mandatory_bit,
            });
        }
        table.sort_by(|a, b| a.hash.cmp(&b.hash).then_with(|| a.name.cmp(&b.name)));
        // Hash collisions force exact confirmation on every involved row.
        for i in 0..table.len() {
            let collides = (i > 0 && table[i - 1].hash == table[i].hash)
                || (i + 1 < table.len() && table[i + 1].hash == table[i].hash);
            if collides {
                table[i].exact = true;
            }
        }
        Ok(ObjectFormatDescription {
            type_name: self.type_name,
            new_instance: self.new_instance,
            finalize: self.finalize,
            write_props,
            read_props,
            table,
            mandatory_mask,
            mandatory_names,
            unknown: self.unknown,
        })
    }
}

impl Json {
    /// Register a type's object format under its name, making it reachable
    /// through the erased entry path.
    pub fn register_object_format<B: 'static, T: 'static>(
        &self,
        description: ObjectFormatDescription<B, T>,
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
