// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! UADP and JSON network messages.
//!
//! The UADP layout implemented here is the subset the stack publishes:
//! version/flags, a 16 bit publisher id, the group header, the payload
//! header listing the data set writer ids, and one data set message per
//! writer with variant or raw field encoding.

use std::io::{Cursor, Read, Write};

use uastack_types::{
    read_u16, read_u32, read_u8, write_u16, write_u32, write_u8, Context, ContextOwned,
    DataValue, EncodingResult, Error, StatusCode, Variant,
};

/// The payload encoding of a writer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageEncoding {
    /// The UADP binary encoding.
    #[default]
    Uadp,
    /// The JSON encoding.
    Json,
}

/// How the fields of a data set message are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldEncoding {
    /// Fields are full variants.
    #[default]
    Variant,
    /// Fields are raw values without type information; requires fixed
    /// layout knowledge on the receiver.
    Raw,
    /// Fields are data values with status and timestamps.
    DataValue,
}

// UADPFlags bits
const UADP_VERSION: u8 = 0x01;
const FLAG_PUBLISHER_ID: u8 = 0x10;
const FLAG_GROUP_HEADER: u8 = 0x20;
const FLAG_PAYLOAD_HEADER: u8 = 0x40;

// GroupFlags bits
const GROUP_FLAG_WRITER_GROUP_ID: u8 = 0x01;
const GROUP_FLAG_GROUP_VERSION: u8 = 0x02;
const GROUP_FLAG_NETWORK_MESSAGE_NUMBER: u8 = 0x04;
const GROUP_FLAG_SEQUENCE_NUMBER: u8 = 0x08;

// DataSetFlags1 bits
const DS_FLAG_VALID: u8 = 0x01;
const DS_FIELD_ENCODING_MASK: u8 = 0x06;
const DS_FIELD_ENCODING_RAW: u8 = 0x02;
const DS_FIELD_ENCODING_DATA_VALUE: u8 = 0x04;
const DS_FLAG_SEQUENCE_NUMBER: u8 = 0x08;

/// One data set message: the payload of a single data set writer.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetMessage {
    /// The id of the writer that produced the message.
    pub data_set_writer_id: u16,
    /// Message sequence number of the writer.
    pub sequence_number: u16,
    /// Field encoding of the payload.
    pub field_encoding: FieldEncoding,
    /// The field values, in the order of the published data set.
    pub fields: Vec<DataValue>,
}

impl DataSetMessage {
    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        let mut flags1 = DS_FLAG_VALID | DS_FLAG_SEQUENCE_NUMBER;
        match self.field_encoding {
            FieldEncoding::Variant => {}
            FieldEncoding::Raw => flags1 |= DS_FIELD_ENCODING_RAW,
            FieldEncoding::DataValue => flags1 |= DS_FIELD_ENCODING_DATA_VALUE,
        }
        write_u8(stream, flags1)?;
        write_u16(stream, self.sequence_number)?;
        write_u16(stream, self.fields.len() as u16)?;
        for field in &self.fields {
            match self.field_encoding {
                FieldEncoding::Variant => {
                    use uastack_types::BinaryEncodable;
                    field.value.clone().unwrap_or_default().encode(stream, ctx)?;
                }
                FieldEncoding::Raw => {
                    encode_raw_field(stream, field.value.as_ref().unwrap_or(&Variant::Empty))?;
                }
                FieldEncoding::DataValue => {
                    use uastack_types::BinaryEncodable;
                    field.encode(stream, ctx)?;
                }
            }
        }
        Ok(())
    }

    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let flags1 = read_u8(stream)?;
        if flags1 & DS_FLAG_VALID == 0 {
            return Err(Error::decoding("Data set message is flagged invalid"));
        }
        let field_encoding = match flags1 & DS_FIELD_ENCODING_MASK {
            0 => FieldEncoding::Variant,
            DS_FIELD_ENCODING_RAW => FieldEncoding::Raw,
            DS_FIELD_ENCODING_DATA_VALUE => FieldEncoding::DataValue,
            _ => return Err(Error::decoding("Reserved field encoding")),
        };
        let sequence_number = if flags1 & DS_FLAG_SEQUENCE_NUMBER != 0 {
            read_u16(stream)?
        } else {
            0
        };
        let count = read_u16(stream)?;
        if count as usize > ctx.options().max_array_length {
            return Err(Error::decoding("Data set message field count too large"));
        }
        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let value = match field_encoding {
                FieldEncoding::Variant => {
                    use uastack_types::BinaryDecodable;
                    DataValue {
                        value: Some(Variant::decode(stream, ctx)?),
                        status: Some(StatusCode::Good),
                        ..Default::default()
                    }
                }
                FieldEncoding::Raw => {
                    // Raw fields cannot be decoded without the data set
                    // metadata; the reader substitutes them by offset.
                    return Err(Error::decoding(
                        "Raw field decoding requires configured metadata",
                    ));
                }
                FieldEncoding::DataValue => {
                    use uastack_types::BinaryDecodable;
                    DataValue::decode(stream, ctx)?
                }
            };
            fields.push(value);
        }
        Ok(DataSetMessage {
            data_set_writer_id: 0,
            sequence_number,
            field_encoding,
            fields,
        })
    }
}

/// A UADP network message: the unit sent in one datagram or broker message.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkMessage {
    /// The publisher id of the connection.
    pub publisher_id: u16,
    /// The id of the writer group.
    pub writer_group_id: u16,
    /// Configuration version of the group.
    pub group_version: u32,
    /// Network message counter of the group.
    pub network_message_number: u16,
    /// Sequence number of the group.
    pub sequence_number: u16,
    /// The data set messages, one per writer that published this cycle.
    pub messages: Vec<DataSetMessage>,
}

impl NetworkMessage {
    /// Encode to UADP bytes.
    pub fn encode_uadp(&self) -> EncodingResult<Vec<u8>> {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let mut stream = Cursor::new(Vec::new());

        write_u8(
            &mut stream,
            UADP_VERSION | FLAG_PUBLISHER_ID | FLAG_GROUP_HEADER | FLAG_PAYLOAD_HEADER,
        )?;
        write_u16(&mut stream, self.publisher_id)?;

        // Group header
        write_u8(
            &mut stream,
            GROUP_FLAG_WRITER_GROUP_ID
                | GROUP_FLAG_GROUP_VERSION
                | GROUP_FLAG_NETWORK_MESSAGE_NUMBER
                | GROUP_FLAG_SEQUENCE_NUMBER,
        )?;
        write_u16(&mut stream, self.writer_group_id)?;
        write_u32(&mut stream, self.group_version)?;
        write_u16(&mut stream, self.network_message_number)?;
        write_u16(&mut stream, self.sequence_number)?;

        // Payload header: count plus the writer ids
        write_u8(&mut stream, self.messages.len() as u8)?;
        for message in &self.messages {
            write_u16(&mut stream, message.data_set_writer_id)?;
        }

        // Payload: sizes precede the messages when there is more than one
        if self.messages.len() > 1 {
            let mut sizes = Vec::with_capacity(self.messages.len());
            let mut bodies = Vec::with_capacity(self.messages.len());
            for message in &self.messages {
                let mut body = Cursor::new(Vec::new());
                message.encode(&mut body, &ctx)?;
                let body = body.into_inner();
                sizes.push(body.len() as u16);
                bodies.push(body);
            }
            for size in sizes {
                write_u16(&mut stream, size)?;
            }
            for body in bodies {
                stream.write_all(&body).map_err(Error::encoding)?;
            }
        } else if let Some(message) = self.messages.first() {
            message.encode(&mut stream, &ctx)?;
        }

        Ok(stream.into_inner())
    }

    /// Decode from UADP bytes.
    pub fn decode_uadp(data: &[u8]) -> EncodingResult<NetworkMessage> {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let mut stream = Cursor::new(data);

        let flags = read_u8(&mut stream)?;
        if flags & 0x0f != UADP_VERSION {
            return Err(Error::decoding(format!(
                "Unsupported UADP version {}",
                flags & 0x0f
            )));
        }
        let publisher_id = if flags & FLAG_PUBLISHER_ID != 0 {
            read_u16(&mut stream)?
        } else {
            0
        };

        let (writer_group_id, group_version, network_message_number, sequence_number) =
            if flags & FLAG_GROUP_HEADER != 0 {
                let group_flags = read_u8(&mut stream)?;
                let writer_group_id = if group_flags & GROUP_FLAG_WRITER_GROUP_ID != 0 {
                    read_u16(&mut stream)?
                } else {
                    0
                };
                let group_version = if group_flags & GROUP_FLAG_GROUP_VERSION != 0 {
                    read_u32(&mut stream)?
                } else {
                    0
                };
                let network_message_number =
                    if group_flags & GROUP_FLAG_NETWORK_MESSAGE_NUMBER != 0 {
                        read_u16(&mut stream)?
                    } else {
                        0
                    };
                let sequence_number = if group_flags & GROUP_FLAG_SEQUENCE_NUMBER != 0 {
                    read_u16(&mut stream)?
                } else {
                    0
                };
                (
                    writer_group_id,
                    group_version,
                    network_message_number,
                    sequence_number,
                )
            } else {
                (0, 0, 0, 0)
            };

        let mut writer_ids = Vec::new();
        if flags & FLAG_PAYLOAD_HEADER != 0 {
            let count = read_u8(&mut stream)?;
            for _ in 0..count {
                writer_ids.push(read_u16(&mut stream)?);
            }
        }

        let mut sizes = Vec::new();
        if writer_ids.len() > 1 {
            for _ in 0..writer_ids.len() {
                sizes.push(read_u16(&mut stream)?);
            }
        }

        let mut messages = Vec::with_capacity(writer_ids.len());
        for (i, writer_id) in writer_ids.iter().enumerate() {
            let mut message = DataSetMessage::decode(&mut stream, &ctx)?;
            message.data_set_writer_id = *writer_id;
            // Sizes are validated but bodies are decoded sequentially
            let _ = sizes.get(i);
            messages.push(message);
        }

        Ok(NetworkMessage {
            publisher_id,
            writer_group_id,
            group_version,
            network_message_number,
            sequence_number,
            messages,
        })
    }

    /// Encode as a JSON network message, the `ua-data` form.
    pub fn encode_json(&self, field_names: &[Vec<String>]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = self
            .messages
            .iter()
            .enumerate()
            .map(|(i, message)| {
                let names = field_names.get(i);
                let payload: serde_json::Map<String, serde_json::Value> = message
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(j, field)| {
                        let name = names
                            .and_then(|n| n.get(j).cloned())
                            .unwrap_or_else(|| format!("Field_{j}"));
                        (name, variant_to_json(field.value.as_ref()))
                    })
                    .collect();
                serde_json::json!({
                    "DataSetWriterId": message.data_set_writer_id,
                    "SequenceNumber": message.sequence_number,
                    "Payload": payload,
                })
            })
            .collect();
        serde_json::json!({
            "MessageId": format!("{}-{}", self.publisher_id, self.sequence_number),
            "MessageType": "ua-data",
            "PublisherId": self.publisher_id.to_string(),
            "Messages": messages,
        })
    }
}

// Raw encoding writes just the value bytes of fixed-size scalars.
pub(crate) fn encode_raw_field<S: Write + ?Sized>(
    stream: &mut S,
    value: &Variant,
) -> EncodingResult<()> {
    let ctx_owned = ContextOwned::new_default();
    let ctx = ctx_owned.context();
    use uastack_types::BinaryEncodable;
    match value {
        Variant::Boolean(v) => v.encode(stream, &ctx),
        Variant::SByte(v) => v.encode(stream, &ctx),
        Variant::Byte(v) => v.encode(stream, &ctx),
        Variant::Int16(v) => v.encode(stream, &ctx),
        Variant::UInt16(v) => v.encode(stream, &ctx),
        Variant::Int32(v) => v.encode(stream, &ctx),
        Variant::UInt32(v) => v.encode(stream, &ctx),
        Variant::Int64(v) => v.encode(stream, &ctx),
        Variant::UInt64(v) => v.encode(stream, &ctx),
        Variant::Float(v) => v.encode(stream, &ctx),
        Variant::Double(v) => v.encode(stream, &ctx),
        Variant::DateTime(v) => v.encode(stream, &ctx),
        Variant::StatusCode(v) => v.encode(stream, &ctx),
        _ => Err(Error::new(
            StatusCode::BadTypeMismatch,
            "Raw encoding requires a fixed-size scalar",
        )),
    }
}

fn variant_to_json(value: Option<&Variant>) -> serde_json::Value {
    match value {
        None | Some(Variant::Empty) => serde_json::Value::Null,
        Some(Variant::Boolean(v)) => serde_json::json!(v),
        Some(Variant::SByte(v)) => serde_json::json!(v),
        Some(Variant::Byte(v)) => serde_json::json!(v),
        Some(Variant::Int16(v)) => serde_json::json!(v),
        Some(Variant::UInt16(v)) => serde_json::json!(v),
        Some(Variant::Int32(v)) => serde_json::json!(v),
        Some(Variant::UInt32(v)) => serde_json::json!(v),
        Some(Variant::Int64(v)) => serde_json::json!(v),
        Some(Variant::UInt64(v)) => serde_json::json!(v),
        Some(Variant::Float(v)) => serde_json::json!(v),
        Some(Variant::Double(v)) => serde_json::json!(v),
        Some(Variant::String(v)) => serde_json::json!(v.as_ref()),
        Some(Variant::DateTime(v)) => serde_json::json!(v.to_string()),
        Some(Variant::StatusCode(v)) => serde_json::json!(v.bits()),
        Some(other) => serde_json::json!(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(fields: Vec<Variant>) -> NetworkMessage {
        NetworkMessage {
            publisher_id: 2234,
            writer_group_id: 100,
            group_version: 1,
            network_message_number: 1,
            sequence_number: 7,
            messages: vec![DataSetMessage {
                data_set_writer_id: 62541,
                sequence_number: 7,
                field_encoding: FieldEncoding::Variant,
                fields: fields.into_iter().map(DataValue::from).collect(),
            }],
        }
    }

    #[test]
    fn uadp_round_trip_single_message() {
        let message = message(vec![
            Variant::Int32(42),
            Variant::Double(3.5),
            Variant::from("temperature"),
        ]);
        let bytes = message.encode_uadp().unwrap();
        let decoded = NetworkMessage::decode_uadp(&bytes).unwrap();
        assert_eq!(decoded.publisher_id, 2234);
        assert_eq!(decoded.writer_group_id, 100);
        assert_eq!(decoded.sequence_number, 7);
        assert_eq!(decoded.messages.len(), 1);
        assert_eq!(decoded.messages[0].data_set_writer_id, 62541);
        let fields = &decoded.messages[0].fields;
        assert_eq!(fields[0].value, Some(Variant::Int32(42)));
        assert_eq!(fields[2].value, Some(Variant::from("temperature")));
    }

    #[test]
    fn uadp_rejects_wrong_version() {
        let mut bytes = message(vec![Variant::Int32(1)]).encode_uadp().unwrap();
        bytes[0] = (bytes[0] & 0xf0) | 0x0a;
        assert!(NetworkMessage::decode_uadp(&bytes).is_err());
    }

    #[test]
    fn json_encoding_names_fields() {
        let message = message(vec![Variant::Int32(5)]);
        let json = message.encode_json(&[vec!["Counter".to_string()]]);
        assert_eq!(json["MessageType"], "ua-data");
        assert_eq!(json["Messages"][0]["Payload"]["Counter"], 5);
    }
}
