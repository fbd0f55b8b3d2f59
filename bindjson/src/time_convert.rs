// SPDX-License-Identifier: Apache-2.0

//! Dates and timestamps as ISO-8601 strings.

use crate::bind::{JsonRead, JsonWrite};
use crate::error::{Error, Result};
use crate::reader::{JsonReader, Token};
use crate::writer::JsonWriter;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

impl JsonWrite for NaiveDate {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        writer.write_string(&self.format("%Y-%m-%d").to_string());
    }
}

impl JsonRead for NaiveDate {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<NaiveDate> {
        if reader.token() != Token::String {
            return Err(reader.error_expecting("\""));
        }
        let position = reader.position();
        let text = reader.read_string()?;
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|_| Error::parse(format!("Invalid date value '{text}'"), position))
    }
}

impl JsonWrite for DateTime<Utc> {
    fn json_write(&self, writer: &mut JsonWriter<'_>) {
        writer.write_string(&self.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
}

impl JsonRead for DateTime<Utc> {
    fn json_read(reader: &mut JsonReader<'_>) -> Result<DateTime<Utc>> {
        if reader.token() != Token::String {
            return Err(reader.error_expecting("\""));
        }
        let position = reader.position();
        let text = reader.read_string()?;
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| Error::parse(format!("Invalid timestamp value '{text}'"), position))
    }
}
