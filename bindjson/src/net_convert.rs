// SPDX-License-Identifier: Apache-2.0

//! IP addresses in their standard dotted-decimal and colon-hex forms.

use crate::bind::{JsonRead, JsonWrite};
use crate::error::{Error, Result};
use crate::reader::{JsonReader, Token};
use crate::writer::JsonWriter;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

macro_rules! addr_bind {
    ($ty:ty, $what:literal) => {
        impl JsonWrite for $ty {
            fn json_write(&self, writer: &mut JsonWriter<'_>) {
                writer.write_string(&self.to_string());
            }
        }

        impl JsonRead for $ty {
            fn json_read(reader: &mut JsonReader<'_>) -> Result<$ty> {
                if reader.token() != Token::String {
                    return Err(reader.error_expecting("\""));
                }
                let position = reader.position();
                let text = reader.read_string()?;
                text.parse().map_err(|_| {
                    Error::parse(format!(concat!("Invalid ", $what, " '{}'"), text), position)
                })
            }
        }
    };
}

addr_bind!(IpAddr, "IP address");
addr_bind!(Ipv4Addr, "IPv4 address");
addr_bind!(Ipv6Addr, "IPv6 address");
