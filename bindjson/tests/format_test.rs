// SPDX-License-Identifier: Apache-2.0

// Object format, array format and mixin behavior through registration.

use bindjson::{
    ArrayFormatDescription, CtorSlots, ErrorKind, Json, JsonRead, JsonType, MixinDescription,
    ObjectFormatDescription, Property, TypeDescriptor, UnknownPolicy,
};

// The JsonType impls below are what generated registration code emits for
// named types: the descriptor is the registry key.
macro_rules! named_type {
    ($ty:ty, $name:literal) => {
        impl JsonType for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::named($name)
            }
        }
    };
}

#[derive(Debug, Default, PartialEq, Clone)]
struct Account {
    id: i64,
    name: String,
    tags: Vec<String>,
}

named_type!(Account, "Account");

fn account_format() -> ObjectFormatDescription<Account, Account> {
    ObjectFormatDescription::<Account, Account>::mutable("Account")
        .add(
            Property::new("id")
                .mandatory()
                .writer(|w, a: &Account| w.write_i64(a.id))
                .reader(|r, a: &mut Account| {
                    a.id = r.read_i64()?;
                    Ok(())
                }),
        )
        .add(
            Property::new("name")
                .mandatory()
                .writer(|w, a: &Account| w.write_string(&a.name))
                .reader(|r, a: &mut Account| {
                    a.name = r.read_string_owned()?;
                    Ok(())
                }),
        )
        .add(
            Property::new("tags")
                .writer(|w, a: &Account| bindjson::JsonWrite::json_write(&a.tags, w))
                .reader(|r, a: &mut Account| {
                    a.tags = Vec::<String>::json_read(r)?;
                    Ok(())
                }),
        )
        .build()
        .unwrap()
}

fn registered() -> Json {
    let json = Json::new();
    json.register_object_format(account_format());
    json
}

#[test]
fn test_object_format_round_trip_via_registry() {
    let json = registered();
    let account = Account {
        id: 9,
        name: "ada".to_string(),
        tags: vec!["x".to_string(), "y".to_string()],
    };
    let bytes = json.encode_registered(&account).unwrap();
    assert_eq!(bytes, br#"{"id":9,"name":"ada","tags":["x","y"]}"#);
    let back: Account = json.decode_registered(&bytes).unwrap();
    assert_eq!(back, account);
}

#[test]
fn test_object_format_order_independence() {
    let json = registered();
    let a: Account = json
        .decode_registered(br#"{"id":1,"name":"n","tags":[]}"#)
        .unwrap();
    let b: Account = json
        .decode_registered(br#"{"tags":[],"name":"n","id":1}"#)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_mandatory_scenario_empty_object() {
    let json = registered();
    let err = json.decode_registered::<Account>(b"{}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(
        err.message().contains("(id, name)"),
        "unexpected message: {}",
        err.message()
    );
    assert_eq!(err.position(), Some(1));
}

#[test]
fn test_unknown_property_policies() {
    // Default policy skips unknown values of any shape.
    let json = registered();
    let account: Account = json
        .decode_registered(br#"{"id":1,"junk":{"deep":[1,2,{"x":null}]},"name":"n"}"#)
        .unwrap();
    assert_eq!(account.id, 1);

    // Fail policy names the key.
    let strict = Json::new();
    strict.register_object_format(
        ObjectFormatDescription::<Account, Account>::mutable("Account")
            .on_unknown(UnknownPolicy::Fail)
            .add(Property::new("id").reader(|r, a: &mut Account| {
                a.id = r.read_i64()?;
                Ok(())
            }))
            .build()
            .unwrap(),
    );
    let err = strict
        .decode_registered::<Account>(br#"{"id":1,"junk":2}"#)
        .unwrap_err();
    assert!(err.message().contains("'junk'"), "{}", err.message());
}

#[derive(Debug, PartialEq, Clone)]
struct Vector3 {
    x: i64,
    y: i64,
    z: i64,
}

named_type!(Vector3, "Vector3");

fn vector_format() -> ArrayFormatDescription<CtorSlots, Vector3> {
    ArrayFormatDescription::constructor_bound("Vector3", 3, |slots| {
        Ok(Vector3 {
            x: slots.take(0)?,
            y: slots.take(1)?,
            z: slots.take(2)?,
        })
    })
    .add(
        Property::new("x")
            .index(0)
            .writer(|w, v: &Vector3| w.write_i64(v.x))
            .reader(|r, s: &mut CtorSlots| {
                s.set(0, r.read_i64()?);
                Ok(())
            }),
    )
    .add(
        Property::new("y")
            .index(1)
            .writer(|w, v: &Vector3| w.write_i64(v.y))
            .reader(|r, s: &mut CtorSlots| {
                s.set(1, r.read_i64()?);
                Ok(())
            }),
    )
    .add(
        Property::new("z")
            .index(2)
            .writer(|w, v: &Vector3| w.write_i64(v.z))
            .reader(|r, s: &mut CtorSlots| {
                s.set(2, r.read_i64()?);
                Ok(())
            }),
    )
    .build()
    .unwrap()
}

#[test]
fn test_array_format_constructor_scenario() {
    let json = Json::new();
    json.register_array_format(vector_format());
    let value = Vector3 { x: 1, y: 2, z: 3 };
    let bytes = json.encode_registered(&value).unwrap();
    assert_eq!(bytes, b"[1,2,3]");
    assert_eq!(json.decode_registered::<Vector3>(b"[1,2,3]").unwrap(), value);
}

#[test]
fn test_array_format_arity_errors() {
    let json = Json::new();
    json.register_array_format(vector_format());

    let err = json.decode_registered::<Vector3>(b"[1,2]").unwrap_err();
    assert!(err.position().is_some());

    let err = json.decode_registered::<Vector3>(b"[1,2,3,4]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(
        err.message().contains("found extra value"),
        "unexpected message: {}",
        err.message()
    );
    assert_eq!(err.position(), Some(7));
}

#[derive(Debug, Default, PartialEq, Clone)]
struct Wire {
    volts: i64,
}

#[derive(Debug, Default, PartialEq, Clone)]
struct Pipe {
    liters: i64,
}

#[derive(Debug, PartialEq, Clone)]
enum Conduit {
    Wire(Wire),
    Pipe(Pipe),
}

named_type!(Conduit, "Conduit");

fn conduit_mixin() -> MixinDescription<Conduit> {
    MixinDescription::builder("Conduit")
        .variant(
            "wire",
            ObjectFormatDescription::<Wire, Wire>::mutable("Wire")
                .add(
                    Property::new("volts")
                        .mandatory()
                        .writer(|w, v: &Wire| w.write_i64(v.volts))
                        .reader(|r, v: &mut Wire| {
                            v.volts = r.read_i64()?;
                            Ok(())
                        }),
                )
                .build()
                .unwrap(),
            |c: &Conduit| match c {
                Conduit::Wire(w) => Some(w),
                _ => None,
            },
            Conduit::Wire,
        )
        .variant(
            "pipe",
            ObjectFormatDescription::<Pipe, Pipe>::mutable("Pipe")
                .add(
                    Property::new("liters")
                        .mandatory()
                        .writer(|w, v: &Pipe| w.write_i64(v.liters))
                        .reader(|r, v: &mut Pipe| {
                            v.liters = r.read_i64()?;
                            Ok(())
                        }),
                )
                .build()
                .unwrap(),
            |c: &Conduit| match c {
                Conduit::Pipe(p) => Some(p),
                _ => None,
            },
            Conduit::Pipe,
        )
        .build()
        .unwrap()
}

#[test]
fn test_discriminator_fidelity_through_supertype() {
    let json = Json::new();
    json.register_mixin(conduit_mixin());

    let value = Conduit::Pipe(Pipe { liters: 20 });
    let bytes = json.encode_registered(&value).unwrap();
    assert_eq!(bytes, br#"{"$type":"pipe","liters":20}"#);
    let back: Conduit = json.decode_registered(&bytes).unwrap();
    assert_eq!(back, value);

    let wire = Conduit::Wire(Wire { volts: 230 });
    let back: Conduit = json
        .decode_registered(&json.encode_registered(&wire).unwrap())
        .unwrap();
    assert_eq!(back, wire);
}

#[test]
fn test_discriminator_must_be_first() {
    let json = Json::new();
    json.register_mixin(conduit_mixin());
    let err = json
        .decode_registered::<Conduit>(br#"{"volts":1,"$type":"wire"}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.message().contains("$type"), "{}", err.message());
}

#[derive(Debug, Default, PartialEq, Clone)]
struct Pair {
    a: i64,
    b: i64,
}

named_type!(Pair, "Pair");

#[test]
fn test_both_formats_negotiated_by_opening_token() {
    let json = Json::new();
    json.register_both_formats(
        ObjectFormatDescription::<Pair, Pair>::mutable("Pair")
            .add(
                Property::new("a")
                    .writer(|w, p: &Pair| w.write_i64(p.a))
                    .reader(|r, p: &mut Pair| {
                        p.a = r.read_i64()?;
                        Ok(())
                    }),
            )
            .add(
                Property::new("b")
                    .writer(|w, p: &Pair| w.write_i64(p.b))
                    .reader(|r, p: &mut Pair| {
                        p.b = r.read_i64()?;
                        Ok(())
                    }),
            )
            .build()
            .unwrap(),
        ArrayFormatDescription::<Pair, Pair>::mutable("Pair")
            .add(
                Property::new("a")
                    .index(0)
                    .writer(|w, p: &Pair| w.write_i64(p.a))
                    .reader(|r, p: &mut Pair| {
                        p.a = r.read_i64()?;
                        Ok(())
                    }),
            )
            .add(
                Property::new("b")
                    .index(1)
                    .writer(|w, p: &Pair| w.write_i64(p.b))
                    .reader(|r, p: &mut Pair| {
                        p.b = r.read_i64()?;
                        Ok(())
                    }),
            )
            .build()
            .unwrap(),
    );

    let value = Pair { a: 1, b: 2 };
    // Encoding prefers the object format; decoding accepts either.
    assert_eq!(json.encode_registered(&value).unwrap(), br#"{"a":1,"b":2}"#);
    assert_eq!(json.decode_registered::<Pair>(br#"{"a":1,"b":2}"#).unwrap(), value);
    assert_eq!(json.decode_registered::<Pair>(b"[1,2]").unwrap(), value);
    assert!(json.decode_registered::<Pair>(b"7").is_err());
}

#[test]
fn test_registration_errors_are_loud_and_early() {
    // Duplicate array index.
    let result = ArrayFormatDescription::<CtorSlots, Vector3>::constructor_bound(
        "Vector3",
        2,
        |slots| {
            Ok(Vector3 {
                x: slots.take(0)?,
                y: 0,
                z: 0,
            })
        },
    )
    .add(
        Property::new("a")
            .index(1)
            .writer(|w, v: &Vector3| w.write_i64(v.x))
            .reader(|r, s: &mut CtorSlots| {
                s.set(0, r.read_i64()?);
                Ok(())
            }),
    )
    .add(
        Property::new("b")
            .index(1)
            .writer(|w, v: &Vector3| w.write_i64(v.y))
            .reader(|r, s: &mut CtorSlots| {
                s.set(1, r.read_i64()?);
                Ok(())
            }),
    )
    .build();
    assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Registration));

    // Mixin with zero variants.
    let result = MixinDescription::<Conduit>::builder("Conduit").build();
    assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Registration));
}
