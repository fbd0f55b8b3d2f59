// SPDX-License-Identifier: Apache-2.0

//! Number token parsing: a single forward scan classifies the literal, then
//! the narrowest exact representation the caller asked for is produced.

use crate::error::{Error, Result};

/// What a forward scan found in a number literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberClass {
    /// Only sign and digits.
    Integer,
    /// A `.` fraction, an exponent, or both.
    Float,
    /// `NaN`, `Infinity` or `-Infinity` (the writer's non-finite extension).
    NonFinite,
}

/// Validate JSON number grammar in one pass and classify the literal.
///
/// Grammar: `-? (0 | [1-9][0-9]*) ('.' [0-9]+)? ([eE] [+-]? [0-9]+)?`,
/// extended with the three non-finite literals.
pub(crate) fn classify(bytes: &[u8], position: usize) -> Result<NumberClass> {
    match bytes {
        b"NaN" | b"Infinity" | b"-Infinity" => return Ok(NumberClass::NonFinite),
        _ => {}
    }
    let mut rest = match bytes {
        [b'-', rest @ ..] => rest,
        _ => bytes,
    };
    let invalid = || Error::parse("Invalid number literal".to_string(), position);
    match rest {
        [b'0', tail @ ..] => {
            if let [b'0'..=b'9', ..] = tail {
                // Leading zeros are not legal JSON.
                return Err(invalid());
            }
            rest = tail;
        }
        [b'1'..=b'9', tail @ ..] => {
            rest = tail;
            while let [b'0'..=b'9', tail @ ..] = rest {
                rest = tail;
            }
        }
        _ => return Err(invalid()),
    }
    let mut class = NumberClass::Integer;
    if let [b'.', tail @ ..] = rest {
        rest = tail;
        let mut digits = false;
        while let [b'0'..=b'9', tail @ ..] = rest {
            rest = tail;
            digits = true;
        }
        if !digits {
            return Err(invalid());
        }
        class = NumberClass::Float;
    }
    if let [b'e' | b'E', tail @ ..] = rest {
        rest = match tail {
            [b'+' | b'-', t @ ..] => t,
            _ => tail,
        };
        let mut digits = false;
        while let [b'0'..=b'9', tail @ ..] = rest {
            rest = tail;
            digits = true;
        }
        if !digits {
            return Err(invalid());
        }
        class = NumberClass::Float;
    }
    if !rest.is_empty() {
        return Err(invalid());
    }
    Ok(class)
}

/// Creates an exact base-10 parser for a signed integer type.
///
/// Accumulates in negative space so `MIN` parses without overflowing on
/// negation.
macro_rules! define_signed_parser {
    ($fn_name:ident, $int_ty:ty, $what:literal) => {
        pub(crate) fn $fn_name(bytes: &[u8], position: usize) -> Result<$int_ty> {
            if classify(bytes, position)? != NumberClass::Integer {
                return Err(Error::parse(
                    concat!("Expecting ", $what, ", found decimal value").to_string(),
                    position,
                ));
            }
            let (is_negative, mut digits) = match bytes {
                [b'-', rest @ ..] => (true, rest),
                _ => (false, bytes),
            };
            let mut result: $int_ty = 0;
            while let Some((&byte, rest)) = digits.split_first() {
                let digit = (byte - b'0') as $int_ty;
                result = result
                    .checked_mul(10)
                    .and_then(|r| r.checked_sub(digit))
                    .ok_or_else(|| {
                        Error::parse(
                            concat!("Number overflows ", $what).to_string(),
                            position,
                        )
                    })?;
                digits = rest;
            }
            if is_negative {
                Ok(result)
            } else {
                result.checked_neg().ok_or_else(|| {
                    Error::parse(concat!("Number overflows ", $what).to_string(), position)
                })
            }
        }
    };
}

define_signed_parser!(parse_i32, i32, "a 32-bit integer");
define_signed_parser!(parse_i64, i64, "a 64-bit integer");

pub(crate) fn parse_u64(bytes: &[u8], position: usize) -> Result<u64> {
    if classify(bytes, position)? != NumberClass::Integer {
        return Err(Error::parse(
            "Expecting an unsigned integer, found decimal value".to_string(),
            position,
        ));
    }
    if bytes.first() == Some(&b'-') {
        return Err(Error::parse(
            "Expecting an unsigned integer, found negative value".to_string(),
            position,
        ));
    }
    let mut result: u64 = 0;
    for &byte in bytes {
        result = result
            .checked_mul(10)
            .and_then(|r| r.checked_add((byte - b'0') as u64))
            .ok_or_else(|| {
                Error::parse("Number overflows an unsigned 64-bit integer".to_string(), position)
            })?;
    }
    Ok(result)
}

pub(crate) fn parse_f64(bytes: &[u8], position: usize) -> Result<f64> {
    match classify(bytes, position)? {
        NumberClass::NonFinite => Ok(match bytes {
            b"NaN" => f64::NAN,
            b"Infinity" => f64::INFINITY,
            _ => f64::NEG_INFINITY,
        }),
        _ => {
            // Grammar is already validated; std performs the correctly
            // rounded decimal-to-binary conversion.
            let text = std::str::from_utf8(bytes)
                .map_err(|_| Error::parse("Invalid number literal".to_string(), position))?;
            text.parse()
                .map_err(|_| Error::parse("Invalid number literal".to_string(), position))
        }
    }
}

pub(crate) fn parse_f32(bytes: &[u8], position: usize) -> Result<f32> {
    Ok(parse_f64(bytes, position)? as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(classify(b"0", 0).unwrap(), NumberClass::Integer);
        assert_eq!(classify(b"-12", 0).unwrap(), NumberClass::Integer);
        assert_eq!(classify(b"1.5", 0).unwrap(), NumberClass::Float);
        assert_eq!(classify(b"1e9", 0).unwrap(), NumberClass::Float);
        assert_eq!(classify(b"-2.5E-3", 0).unwrap(), NumberClass::Float);
        assert_eq!(classify(b"NaN", 0).unwrap(), NumberClass::NonFinite);
        assert_eq!(classify(b"-Infinity", 0).unwrap(), NumberClass::NonFinite);
    }

    #[test]
    fn test_grammar_rejections() {
        for bad in [
            &b""[..],
            b"-",
            b"01",
            b"1.",
            b".5",
            b"1e",
            b"1e+",
            b"+1",
            b"0x10",
            b"1,000",
            b"Infinit",
        ] {
            assert!(classify(bad, 0).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_signed_boundaries() {
        assert_eq!(parse_i64(b"0", 0).unwrap(), 0);
        assert_eq!(parse_i64(b"1000000000", 0).unwrap(), 1000000000);
        assert_eq!(
            parse_i64(b"-9223372036854775808", 0).unwrap(),
            i64::MIN
        );
        assert_eq!(parse_i64(b"9223372036854775807", 0).unwrap(), i64::MAX);
        assert!(parse_i64(b"9223372036854775808", 0).is_err());
        assert!(parse_i64(b"-9223372036854775809", 0).is_err());
        assert_eq!(parse_i32(b"-2147483648", 0).unwrap(), i32::MIN);
        assert!(parse_i32(b"2147483648", 0).is_err());
    }

    #[test]
    fn test_integer_rejects_decimal_form() {
        assert!(parse_i64(b"1.0", 0).is_err());
        assert!(parse_i64(b"1e2", 0).is_err());
    }

    #[test]
    fn test_unsigned() {
        assert_eq!(parse_u64(b"18446744073709551615", 0).unwrap(), u64::MAX);
        assert!(parse_u64(b"18446744073709551616", 0).is_err());
        assert!(parse_u64(b"-1", 0).is_err());
    }

    #[test]
    fn test_floats() {
        assert_eq!(parse_f64(b"2.5", 0).unwrap(), 2.5);
        assert_eq!(parse_f64(b"-0.0", 0).unwrap().to_bits(), (-0.0f64).to_bits());
        assert!(parse_f64(b"NaN", 0).unwrap().is_nan());
        assert_eq!(parse_f64(b"Infinity", 0).unwrap(), f64::INFINITY);
        assert_eq!(parse_f64(b"-Infinity", 0).unwrap(), f64::NEG_INFINITY);
        assert_eq!(parse_f64(b"1e308", 0).unwrap(), 1e308);
    }
}
