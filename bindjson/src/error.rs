// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Broad classification of codec failures.
///
/// Every error the crate produces falls into exactly one of these buckets,
/// so callers can branch on the failure class without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed JSON text: bad token, unterminated string, invalid escape,
    /// invalid number. Always carries a byte position.
    Parse,
    /// Structurally valid JSON that does not fit the declared binding:
    /// missing mandatory properties, unknown property when disallowed,
    /// discriminator violations, array-format arity mismatch.
    Schema,
    /// No converter available for the requested type, or a nested part of a
    /// generic type could not be resolved.
    Type,
    /// Invalid registration: duplicate field index, duplicate alias,
    /// mixin with no variants. Detected at setup time.
    Registration,
    /// Failure in the underlying byte source or sink.
    Io,
}

/// The single error type surfaced by all codec operations.
///
/// Carries the failure class, a human-readable message and, when the error
/// originated while scanning input, the byte offset where it was detected.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    position: Option<usize>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: String, position: Option<usize>) -> Self {
        Error {
            kind,
            message,
            position,
        }
    }

    /// Parse error at a known byte offset.
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        let mut message = message.into();
        message.push_str(&format!(" at position {position}"));
        Error::new(ErrorKind::Parse, message, Some(position))
    }

    /// Parse error in the original's `Expecting 'x'. Found y` shape.
    pub(crate) fn expecting(what: &str, found: u8, position: usize) -> Self {
        let found = if found.is_ascii_graphic() || found == b' ' {
            format!("'{}'", found as char)
        } else {
            format!("0x{found:02x}")
        };
        Error::new(
            ErrorKind::Parse,
            format!("Expecting '{what}' at position {position}. Found {found}"),
            Some(position),
        )
    }

    /// Parse error for running out of input mid-token.
    pub(crate) fn unexpected_end(what: &str, position: usize) -> Self {
        Error::new(
            ErrorKind::Parse,
            format!("Unexpected end of input while reading {what} at position {position}"),
            Some(position),
        )
    }

    pub(crate) fn schema(message: impl Into<String>, position: Option<usize>) -> Self {
        let mut message = message.into();
        if let Some(position) = position {
            message.push_str(&format!(" at position {position}"));
        }
        Error::new(ErrorKind::Schema, message, position)
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Type, message.into(), None)
    }

    pub(crate) fn registration(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Registration, message.into(), None)
    }

    /// Which class of failure this is.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Byte offset in the input where the failure was detected, when known.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// The human-readable description, including the position when present.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io, err.to_string(), None)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
