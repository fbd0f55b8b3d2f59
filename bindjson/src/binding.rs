// SPDX-License-Identifier: Apache-2.0

//! Property bindings: the bricks format descriptions are built from.
//!
//! A [`Property`] pairs an encode closure over the instance with a decode
//! closure over the assembly target (the instance itself, a builder, or a
//! constructor slot buffer). Registration code — handwritten or generated —
//! declares one per field.

use crate::error::{Error, Result};
use crate::escape;
use crate::reader::JsonReader;
use crate::writer::JsonWriter;
use std::any::Any;

/// FNV-1a over the raw name bytes; must match the hash `fill_name` computes
/// while scanning keys.
pub fn name_hash(name: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in name.as_bytes() {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Pre-escaped `"name"` bytes for the encode path.
pub(crate) fn quoted_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 2);
    escape::write_escaped(&mut out, name, false);
    out
}

pub(crate) type WriteProp<T> = Box<dyn Fn(&mut JsonWriter<'_>, &T) + Send + Sync>;
pub(crate) type ReadProp<B> = Box<dyn Fn(&mut JsonReader<'_>, &mut B) -> Result<()> + Send + Sync>;

/// One field declaration: name, matching options, and accessors.
///
/// `T` is the encoded type; `B` is the decode target selected by the
/// type's assembly strategy.
pub struct Property<B, T> {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) mandatory: bool,
    pub(crate) exact: bool,
    pub(crate) index: Option<usize>,
    pub(crate) write: Option<WriteProp<T>>,
    pub(crate) read: Option<ReadProp<B>>,
}

impl<B, T> Property<B, T> {
    pub fn new(name: &str) -> Property<B, T> {
        Property {
            name: name.to_owned(),
            aliases: Vec::new(),
            mandatory: false,
            exact: false,
            index: None,
            write: None,
            read: None,
        }
    }

    /// The property must be present on decode.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// An alternative accepted source name (aliasing for migrations). All
    /// alternatives resolve to the same binding.
    pub fn alias(mut self, name: &str) -> Self {
        self.aliases.push(name.to_owned());
        self
    }

    /// Always confirm a hash match with a raw byte comparison, even without
    /// a known collision.
    pub fn exact_match(mut self) -> Self {
        self.exact = true;
        self
    }

    /// Positional slot for the array format.
    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn writer(
        mut self,
        write: impl Fn(&mut JsonWriter<'_>, &T) + Send + Sync + 'static,
    ) -> Self {
        self.write = Some(Box::new(write));
        self
    }

    pub fn reader(
        mut self,
        read: impl Fn(&mut JsonReader<'_>, &mut B) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.read = Some(Box::new(read));
        self
    }
}

/// Decode buffer for constructor-bound assembly: values are parked per
/// declared parameter position until the finalize step invokes the
/// constructor with all of them.
pub struct CtorSlots {
    slots: Vec<Option<Box<dyn Any>>>,
}

impl CtorSlots {
    pub(crate) fn new(arity: usize) -> CtorSlots {
        let mut slots = Vec::with_capacity(arity);
        slots.resize_with(arity, || None);
        CtorSlots { slots }
    }

    /// Park a decoded value in its parameter slot.
    pub fn set<V: Any>(&mut self, index: usize, value: V) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(Box::new(value));
        }
    }

    pub fn is_set(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Take a slot that is guaranteed present (a mandatory property after
    /// the mandatory check has passed).
    pub fn take<V: Any>(&mut self, index: usize) -> Result<V> {
        let slot = self
            .slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| {
                Error::registration(format!("Constructor slot {index} was never decoded"))
            })?;
        slot.downcast::<V>().map(|boxed| *boxed).map_err(|_| {
            Error::registration(format!(
                "Constructor slot {index} holds a different type than requested"
            ))
        })
    }

    /// Take a slot, falling back to `default` when the property was absent.
    pub fn take_or<V: Any>(&mut self, index: usize, default: V) -> Result<V> {
        if self.is_set(index) {
            self.take(index)
        } else {
            Ok(default)
        }
    }
}
