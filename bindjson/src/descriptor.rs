// SPDX-License-Identifier: Apache-2.0

//! Structural type descriptions: the registry's cache keys.
//!
//! A [`TypeDescriptor`] is built once per distinct type and compared
//! structurally, never by pointer: two independent requests for
//! `List<Int64>` produce equal descriptors and land on the same cache entry.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Leaf kinds with a fixed JSON encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    String,
    Decimal,
    Uuid,
    Date,
    Timestamp,
    Binary,
    Ip,
}

impl PrimitiveKind {
    fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "Bool",
            PrimitiveKind::I32 => "Int32",
            PrimitiveKind::I64 => "Int64",
            PrimitiveKind::U32 => "UInt32",
            PrimitiveKind::U64 => "UInt64",
            PrimitiveKind::F32 => "Float32",
            PrimitiveKind::F64 => "Float64",
            PrimitiveKind::String => "String",
            PrimitiveKind::Decimal => "Decimal",
            PrimitiveKind::Uuid => "Uuid",
            PrimitiveKind::Date => "Date",
            PrimitiveKind::Timestamp => "Timestamp",
            PrimitiveKind::Binary => "Binary",
            PrimitiveKind::Ip => "Ip",
        }
    }
}

/// A recursive, structural description of a serializable type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    Nullable(Box<TypeDescriptor>),
    ArrayOf(Box<TypeDescriptor>),
    ListOf(Box<TypeDescriptor>),
    SetOf(Box<TypeDescriptor>),
    MapOf(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Named(Cow<'static, str>),
}

impl TypeDescriptor {
    pub fn named(name: impl Into<Cow<'static, str>>) -> TypeDescriptor {
        TypeDescriptor::Named(name.into())
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(kind) => f.write_str(kind.name()),
            TypeDescriptor::Nullable(inner) => write!(f, "Nullable<{inner}>"),
            TypeDescriptor::ArrayOf(inner) => write!(f, "Array<{inner}>"),
            TypeDescriptor::ListOf(inner) => write!(f, "List<{inner}>"),
            TypeDescriptor::SetOf(inner) => write!(f, "Set<{inner}>"),
            TypeDescriptor::MapOf(key, value) => write!(f, "Map<{key},{value}>"),
            TypeDescriptor::Named(name) => f.write_str(name),
        }
    }
}

/// Maps a Rust type to its structural descriptor.
///
/// Container impls compose recursively, so `HashMap<String, Vec<Decimal>>`
/// describes itself as `Map<String,List<Decimal>>` with no registration
/// specific to that combination.
pub trait JsonType {
    fn descriptor() -> TypeDescriptor;
}

macro_rules! primitive_type {
    ($ty:ty, $kind:ident) => {
        impl JsonType for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::Primitive(PrimitiveKind::$kind)
            }
        }
    };
}

primitive_type!(bool, Bool);
primitive_type!(i32, I32);
primitive_type!(i64, I64);
primitive_type!(u32, U32);
primitive_type!(u64, U64);
primitive_type!(f32, F32);
primitive_type!(f64, F64);
primitive_type!(String, String);
primitive_type!(crate::decimal::Decimal, Decimal);
primitive_type!(uuid::Uuid, Uuid);
primitive_type!(chrono::NaiveDate, Date);
primitive_type!(chrono::DateTime<chrono::Utc>, Timestamp);
primitive_type!(std::net::IpAddr, Ip);
primitive_type!(std::net::Ipv4Addr, Ip);
primitive_type!(std::net::Ipv6Addr, Ip);
primitive_type!(crate::bind::Bytes, Binary);

impl<T: JsonType> JsonType for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Nullable(Box::new(T::descriptor()))
    }
}

impl<T: JsonType> JsonType for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::ListOf(Box::new(T::descriptor()))
    }
}

impl<T: JsonType> JsonType for Box<[T]> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::ArrayOf(Box::new(T::descriptor()))
    }
}

impl<T: JsonType> JsonType for HashSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::SetOf(Box::new(T::descriptor()))
    }
}

impl<T: JsonType> JsonType for BTreeSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::SetOf(Box::new(T::descriptor()))
    }
}

impl<K: JsonType, V: JsonType> JsonType for HashMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::MapOf(Box::new(K::descriptor()), Box::new(V::descriptor()))
    }
}

impl<K: JsonType, V: JsonType> JsonType for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::MapOf(Box::new(K::descriptor()), Box::new(V::descriptor()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        assert_eq!(Vec::<i64>::descriptor(), Vec::<i64>::descriptor());
        assert_eq!(
            HashMap::<String, Vec<i64>>::descriptor(),
            BTreeMap::<String, Vec<i64>>::descriptor(),
        );
        assert_ne!(Vec::<i64>::descriptor(), Vec::<i32>::descriptor());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Vec::<i64>::descriptor().to_string(), "List<Int64>");
        assert_eq!(
            HashMap::<String, Vec<crate::decimal::Decimal>>::descriptor().to_string(),
            "Map<String,List<Decimal>>"
        );
        assert_eq!(
            Option::<bool>::descriptor().to_string(),
            "Nullable<Bool>"
        );
        assert_eq!(TypeDescriptor::named("Point").to_string(), "Point");
    }

    #[test]
    fn test_hashable_cache_key() {
        let mut set = HashSet::new();
        set.insert(Vec::<i64>::descriptor());
        assert!(set.contains(&Vec::<i64>::descriptor()));
        assert!(!set.contains(&Vec::<u64>::descriptor()));
    }
}
