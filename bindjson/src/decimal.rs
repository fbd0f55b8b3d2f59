// SPDX-License-Identifier: Apache-2.0

//! Exact base-10 decimal values.
//!
//! JSON decimal literals round-trip through [`Decimal`] without ever passing
//! through binary floating point: the value is a 128-bit integer mantissa and
//! a base-10 scale, good for 38 significant digits.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// An exact decimal number: `mantissa * 10^(-scale)`.
///
/// Always stored normalized (no trailing zero digits in the mantissa, zero is
/// scale 0), so derived equality and hashing compare numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: i32,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        scale: 0,
    };

    /// Build from raw parts, normalizing trailing zeros.
    pub fn new(mantissa: i128, scale: i32) -> Decimal {
        let mut mantissa = mantissa;
        let mut scale = scale;
        if mantissa == 0 {
            return Decimal::ZERO;
        }
        while mantissa % 10 == 0 && scale > i32::MIN {
            mantissa /= 10;
            scale -= 1;
        }
        Decimal { mantissa, scale }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    /// Number of digits after the decimal point (negative for trailing
    /// integer zeros, e.g. `5e3` has scale -3).
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Parse a JSON number literal. `position` is the literal's byte offset
    /// in the document, used for error reporting.
    pub fn from_ascii(bytes: &[u8], position: usize) -> Result<Decimal> {
        let (negative, mut rest) = match bytes {
            [b'-', rest @ ..] => (true, rest),
            _ => (false, bytes),
        };
        if rest.is_empty() {
            return Err(Error::parse("Invalid decimal literal".to_string(), position));
        }
        let mut mantissa: i128 = 0;
        let mut scale: i32 = 0;
        let mut any_digits = false;
        // Integer part.
        while let [b @ b'0'..=b'9', tail @ ..] = rest {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add((b - b'0') as i128))
                .ok_or_else(|| {
                    Error::parse("Decimal overflows 38 significant digits".to_string(), position)
                })?;
            any_digits = true;
            rest = tail;
        }
        // Fraction part.
        if let [b'.', tail @ ..] = rest {
            rest = tail;
            let mut frac_digits = false;
            while let [b @ b'0'..=b'9', tail @ ..] = rest {
                mantissa = mantissa
                    .checked_mul(10)
                    .and_then(|m| m.checked_add((b - b'0') as i128))
                    .ok_or_else(|| {
                        Error::parse(
                            "Decimal overflows 38 significant digits".to_string(),
                            position,
                        )
                    })?;
                scale += 1;
                frac_digits = true;
                rest = tail;
            }
            if !frac_digits {
                return Err(Error::parse(
                    "Invalid decimal literal: no digits after '.'".to_string(),
                    position,
                ));
            }
        }
        // Exponent part.
        if let [b'e' | b'E', tail @ ..] = rest {
            let (exp_negative, mut exp_rest) = match tail {
                [b'-', t @ ..] => (true, t),
                [b'+', t @ ..] => (false, t),
                _ => (false, tail),
            };
            let mut exp: i32 = 0;
            let mut exp_digits = false;
            while let [b @ b'0'..=b'9', t @ ..] = exp_rest {
                exp = exp
                    .checked_mul(10)
                    .and_then(|e| e.checked_add((b - b'0') as i32))
                    .ok_or_else(|| {
                        Error::parse("Decimal exponent out of range".to_string(), position)
                    })?;
                exp_digits = true;
                exp_rest = t;
            }
            if !exp_digits {
                return Err(Error::parse(
                    "Invalid decimal literal: empty exponent".to_string(),
                    position,
                ));
            }
            scale = if exp_negative {
                scale.checked_add(exp)
            } else {
                scale.checked_sub(exp)
            }
            .ok_or_else(|| Error::parse("Decimal exponent out of range".to_string(), position))?;
            rest = exp_rest;
        }
        if !any_digits || !rest.is_empty() {
            return Err(Error::parse("Invalid decimal literal".to_string(), position));
        }
        if negative {
            mantissa = -mantissa;
        }
        Ok(Decimal::new(mantissa, scale))
    }

    /// Lossy conversion for callers that accept binary rounding.
    pub fn to_f64(&self) -> f64 {
        // Going through the exact textual form reuses the platform's
        // correctly-rounded decimal-to-binary conversion.
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl From<i64> for Decimal {
    fn from(v: i64) -> Decimal {
        Decimal::new(v as i128, 0)
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Decimal> {
        Decimal::from_ascii(s.as_bytes(), 0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mantissa == 0 {
            return f.write_str("0");
        }
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        if self.scale <= 0 {
            // Integer with -scale trailing zeros.
            write!(f, "{sign}{digits}")?;
            for _ in 0..(-self.scale) {
                f.write_str("0")?;
            }
            Ok(())
        } else if (self.scale as usize) < digits.len() {
            let split = digits.len() - self.scale as usize;
            write!(f, "{sign}{}.{}", &digits[..split], &digits[split..])
        } else {
            // Leading zeros after the point: 0.00…digits
            write!(f, "{sign}0.")?;
            for _ in 0..(self.scale as usize - digits.len()) {
                f.write_str("0")?;
            }
            f.write_str(&digits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(dec("0").to_string(), "0");
        assert_eq!(dec("-0").to_string(), "0");
        assert_eq!(dec("1").to_string(), "1");
        assert_eq!(dec("-12.5").to_string(), "-12.5");
        assert_eq!(dec("0.001").to_string(), "0.001");
        assert_eq!(dec("123.456").to_string(), "123.456");
    }

    #[test]
    fn test_exponent_forms() {
        assert_eq!(dec("1e3").to_string(), "1000");
        assert_eq!(dec("1.5e3").to_string(), "1500");
        assert_eq!(dec("1e-3").to_string(), "0.001");
        assert_eq!(dec("25e-4").to_string(), "0.0025");
        assert_eq!(dec("1E+2").to_string(), "100");
    }

    #[test]
    fn test_value_equality_ignores_representation() {
        assert_eq!(dec("1.50"), dec("1.5"));
        assert_eq!(dec("1000"), dec("1e3"));
        assert_eq!(dec("0.00"), Decimal::ZERO);
        assert_ne!(dec("1.5"), dec("1.51"));
    }

    #[test]
    fn test_38_digit_precision() {
        let s = "12345678901234567890123456789012345678";
        assert_eq!(dec(s).to_string(), s);
        // One more digit overflows i128's 38-digit headroom.
        assert!("123456789012345678901234567890123456789"
            .parse::<Decimal>()
            .is_err());
    }

    #[test]
    fn test_tiny_scale_round_trip() {
        assert_eq!(dec("1e-28").to_string(), "0.0000000000000000000000000001");
    }

    #[test]
    fn test_invalid_literals() {
        for s in ["", "-", "1.", ".5", "1e", "1e+", "abc", "1x"] {
            assert!(s.parse::<Decimal>().is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(dec("2.5").to_f64(), 2.5);
        assert_eq!(dec("-1e3").to_f64(), -1000.0);
    }
}
