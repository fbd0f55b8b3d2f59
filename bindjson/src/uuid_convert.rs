// SPDX-License-Identifier: Apache-2.0

//! UUID values as canonical hyphenated strings.

use crate::bind::{JsonRead, JsonWrite};
use crate::error::{Error, Result};
use crate::reader::{JsonReader, Token};
use crate::writer::JsonWriter;
use uuid::Uuid;

impl JsonWrite for Uuid {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        let mut buf = [0u8; uuid::fmt::Hyphenated::LENGTH];
        writer.write_string(self.hyphenated().encode_lower(&mut buf));
    }
}

impl JsonRead for Uuid {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<Uuid> {
        if reader.token() != Token::String {
            return Err(reader.error_expecting("\""));
        }
        let position = reader.position();
        let text = reader.read_string()?;
        text.parse()
            .map_err(|_| Error::parse(format!("Invalid UUID value '{text}'"), position))
    }
}
