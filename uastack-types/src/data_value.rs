// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `DataValue`.

use std::io::{Read, Write};

use crate::{
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    read_i16, read_u8, write_i16, write_u8, Context, DateTime, StatusCode, Variant,
};

mod mask {
    pub const HAS_VALUE: u8 = 0x1;
    pub const HAS_STATUS: u8 = 0x2;
    pub const HAS_SOURCE_TIMESTAMP: u8 = 0x4;
    pub const HAS_SERVER_TIMESTAMP: u8 = 0x8;
    pub const HAS_SOURCE_PICOSECONDS: u8 = 0x10;
    pub const HAS_SERVER_PICOSECONDS: u8 = 0x20;
}

/// A value with a status code and timestamps describing its quality and
/// origin. Every field is optional and flagged explicitly in the encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value. An absent value means the read could not produce one, the
    /// status code says why.
    pub value: Option<Variant>,
    /// Status of the value. An absent status means Good.
    pub status: Option<StatusCode>,
    /// The time the value was observed at its source.
    pub source_timestamp: Option<DateTime>,
    /// Picoseconds part of the source timestamp.
    pub source_picoseconds: Option<i16>,
    /// The time the server obtained the value.
    pub server_timestamp: Option<DateTime>,
    /// Picoseconds part of the server timestamp.
    pub server_picoseconds: Option<i16>,
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        let mut size = 1;
        if let Some(ref value) = self.value {
            size += value.byte_len(ctx);
        }
        if self.status.is_some() {
            size += 4;
        }
        if self.source_timestamp.is_some() {
            size += 8;
            if self.source_picoseconds.is_some() {
                size += 2;
            }
        }
        if self.server_timestamp.is_some() {
            size += 8;
            if self.server_picoseconds.is_some() {
                size += 2;
            }
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask())?;
        if let Some(ref value) = self.value {
            value.encode(stream, ctx)?;
        }
        if let Some(status) = self.status {
            status.encode(stream, ctx)?;
        }
        // Picoseconds are only encoded when their timestamp is present
        if let Some(source_timestamp) = self.source_timestamp {
            source_timestamp.encode(stream, ctx)?;
            if let Some(source_picoseconds) = self.source_picoseconds {
                write_i16(stream, source_picoseconds)?;
            }
        }
        if let Some(server_timestamp) = self.server_timestamp {
            server_timestamp.encode(stream, ctx)?;
            if let Some(server_picoseconds) = self.server_picoseconds {
                write_i16(stream, server_picoseconds)?;
            }
        }
        Ok(())
    }
}

impl BinaryDecodable for DataValue {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let encoding_mask = read_u8(stream)?;
        let mut value = DataValue::default();
        if encoding_mask & mask::HAS_VALUE != 0 {
            value.value = Some(Variant::decode(stream, ctx)?);
        }
        if encoding_mask & mask::HAS_STATUS != 0 {
            value.status = Some(StatusCode::decode(stream, ctx)?);
        }
        if encoding_mask & mask::HAS_SOURCE_TIMESTAMP != 0 {
            value.source_timestamp = Some(DateTime::decode(stream, ctx)?);
            if encoding_mask & mask::HAS_SOURCE_PICOSECONDS != 0 {
                value.source_picoseconds = Some(read_i16(stream)?);
            }
        }
        if encoding_mask & mask::HAS_SERVER_TIMESTAMP != 0 {
            value.server_timestamp = Some(DateTime::decode(stream, ctx)?);
            if encoding_mask & mask::HAS_SERVER_PICOSECONDS != 0 {
                value.server_picoseconds = Some(read_i16(stream)?);
            }
        }
        Ok(value)
    }
}

macro_rules! data_value_from_impls {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for DataValue {
                fn from(value: $t) -> Self {
                    DataValue {
                        value: Some(Variant::from(value)),
                        status: Some(StatusCode::Good),
                        ..Default::default()
                    }
                }
            }
        )*
    };
}

// Enumerated explicitly rather than as a blanket `impl<T: Into<Variant>> From<T>
// for DataValue`: a blanket impl here would conflict with the standard
// library's reflexive `impl<T> From<T> for T`, since `Variant: Into<Variant>`
// trivially holds.
data_value_from_impls!(
    bool,
    i8,
    u8,
    i16,
    u16,
    i32,
    u32,
    i64,
    u64,
    f32,
    f64,
    crate::UAString,
    StatusCode,
    crate::ByteString,
    crate::ExtensionObject,
    DateTime,
    crate::Guid,
    crate::QualifiedName,
    crate::LocalizedText,
    crate::NodeId,
    crate::ExpandedNodeId,
    crate::DiagnosticInfo,
    String,
    crate::Array,
    Variant,
);

impl<'a> From<&'a str> for DataValue {
    fn from(value: &'a str) -> Self {
        DataValue {
            value: Some(Variant::from(value)),
            status: Some(StatusCode::Good),
            ..Default::default()
        }
    }
}

impl DataValue {
    /// A null data value with no fields set.
    pub fn null() -> DataValue {
        DataValue::default()
    }

    /// Create a data value with source and server timestamps set to now.
    pub fn new_now(value: impl Into<Variant>) -> DataValue {
        let now = DateTime::now();
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        }
    }

    /// Create a data value with the given status and no value, timestamped now.
    pub fn new_status_now(status: StatusCode) -> DataValue {
        DataValue {
            status: Some(status),
            server_timestamp: Some(DateTime::now()),
            ..Default::default()
        }
    }

    /// The effective status of the value; a missing status means Good.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// `true` if the value is usable, i.e. the status is not bad.
    pub fn is_valid(&self) -> bool {
        !self.status().is_bad()
    }

    /// Set the server timestamp.
    pub fn set_server_timestamp(&mut self, timestamp: DateTime) {
        self.server_timestamp = Some(timestamp);
    }

    fn encoding_mask(&self) -> u8 {
        let mut encoding_mask = 0u8;
        if self.value.is_some() {
            encoding_mask |= mask::HAS_VALUE;
        }
        if self.status.is_some() {
            encoding_mask |= mask::HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            encoding_mask |= mask::HAS_SOURCE_TIMESTAMP;
            if self.source_picoseconds.is_some() {
                encoding_mask |= mask::HAS_SOURCE_PICOSECONDS;
            }
        }
        if self.server_timestamp.is_some() {
            encoding_mask |= mask::HAS_SERVER_TIMESTAMP;
            if self.server_picoseconds.is_some() {
                encoding_mask |= mask::HAS_SERVER_PICOSECONDS;
            }
        }
        encoding_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextOwned;
    use std::io::Cursor;

    fn round_trip(v: &DataValue) {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let bytes = v.encode_to_vec(&ctx);
        assert_eq!(bytes.len(), v.byte_len(&ctx));
        let decoded = DataValue::decode(&mut Cursor::new(bytes), &ctx).unwrap();
        assert_eq!(&decoded, v);
    }

    #[test]
    fn data_value_round_trips() {
        round_trip(&DataValue::null());
        round_trip(&DataValue::new_now(Variant::Int32(42)));
        round_trip(&DataValue {
            value: Some(Variant::from("x")),
            status: Some(StatusCode::UncertainInitialValue),
            source_timestamp: Some(DateTime::now()),
            source_picoseconds: Some(100),
            server_timestamp: None,
            // Not encoded since the server timestamp is missing
            server_picoseconds: None,
        });
    }
}
