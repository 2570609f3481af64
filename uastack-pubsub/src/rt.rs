// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The FixedSize realtime path: the network message is encoded once, the
//! byte offsets of the sequence number and of every payload field are
//! recorded, and each publish cycle only overwrites those bytes from the
//! external value cells. No encoding pass, no allocation.

use std::io::Cursor;
use std::sync::Arc;

use parking_lot::RwLock;

use uastack_types::{DataValue, Error, StatusCode, Variant};

use crate::{
    network_message::{encode_raw_field, FieldEncoding, NetworkMessage},
    writer::{FieldSource, WriterGroup},
};

// Byte size of a fixed-size scalar on the wire.
fn fixed_size_of(value: &Variant) -> Option<usize> {
    Some(match value {
        Variant::Boolean(_) | Variant::SByte(_) | Variant::Byte(_) => 1,
        Variant::Int16(_) | Variant::UInt16(_) => 2,
        Variant::Int32(_) | Variant::UInt32(_) | Variant::Float(_) | Variant::StatusCode(_) => 4,
        Variant::Int64(_) | Variant::UInt64(_) | Variant::Double(_) | Variant::DateTime(_) => 8,
        _ => return None,
    })
}

struct FieldOffset {
    offset: usize,
    size: usize,
    cell: Arc<RwLock<DataValue>>,
}

/// A pre-computed network message with known payload offsets.
pub struct RtNetworkMessage {
    buffer: Vec<u8>,
    /// Offset of the group sequence number.
    sequence_number_offset: usize,
    fields: Vec<FieldOffset>,
}

impl RtNetworkMessage {
    /// Encode the group once and record the offsets. Every field must be a
    /// fixed-size scalar backed by an external cell.
    pub(crate) fn precompute(
        publisher_id: u16,
        group: &mut WriterGroup,
    ) -> Result<RtNetworkMessage, Error> {
        // Force raw field encoding, the realtime layout has no per-field
        // type bytes.
        let mut cells = Vec::new();
        for writer in &mut group.writers {
            writer.field_encoding = FieldEncoding::Raw;
            for field in &writer.dataset.fields {
                let FieldSource::External(cell) = &field.source else {
                    return Err(Error::new(
                        StatusCode::BadTypeMismatch,
                        format!("Field {} is not externally sourced", field.name),
                    ));
                };
                let value = cell.read().value.clone().unwrap_or_default();
                let Some(size) = fixed_size_of(&value) else {
                    return Err(Error::new(
                        StatusCode::BadTypeMismatch,
                        format!("Field {} is not a fixed-size scalar", field.name),
                    ));
                };
                cells.push((cell.clone(), size));
            }
        }

        let message = NetworkMessage {
            publisher_id,
            writer_group_id: group.id,
            group_version: 1,
            network_message_number: 1,
            sequence_number: 0,
            messages: group.writers.iter_mut().map(|w| w.write()).collect(),
        };
        let buffer = message.encode_uadp()?;

        // Walk the encoded layout to find the offsets. Header layout:
        // flags(1) publisher(2) groupflags(1) group id(2) version(4)
        // nm number(2) sequence(2).
        let sequence_number_offset = 1 + 2 + 1 + 2 + 4 + 2;
        let mut offset = sequence_number_offset + 2;
        // Payload header: count(1) + writer ids
        offset += 1 + 2 * group.writers.len();
        // Message sizes when more than one message
        if group.writers.len() > 1 {
            offset += 2 * group.writers.len();
        }

        let mut fields = Vec::with_capacity(cells.len());
        let mut cell_iter = cells.into_iter();
        for writer in &group.writers {
            // Data set message header: flags1(1) sequence(2) field count(2)
            offset += 1 + 2 + 2;
            for _ in &writer.dataset.fields {
                let Some((cell, size)) = cell_iter.next() else {
                    return Err(Error::new(
                        StatusCode::BadInternalError,
                        "Offset table does not match the field list",
                    ));
                };
                fields.push(FieldOffset {
                    offset,
                    size,
                    cell,
                });
                offset += size;
            }
        }
        if offset != buffer.len() {
            return Err(Error::new(
                StatusCode::BadInternalError,
                format!(
                    "Offset table mismatch: computed {offset}, encoded {}",
                    buffer.len()
                ),
            ));
        }

        Ok(RtNetworkMessage {
            buffer,
            sequence_number_offset,
            fields,
        })
    }

    /// Patch the sequence number and the payload bytes from the external
    /// cells, returning the ready-to-send buffer.
    pub fn update(&mut self, sequence_number: u16) -> &[u8] {
        self.buffer[self.sequence_number_offset..self.sequence_number_offset + 2]
            .copy_from_slice(&sequence_number.to_le_bytes());

        for field in &self.fields {
            let value = field.cell.read().value.clone().unwrap_or_default();
            let mut scratch = Cursor::new(Vec::with_capacity(field.size));
            if encode_raw_field(&mut scratch, &value).is_ok() {
                let scratch = scratch.into_inner();
                if scratch.len() == field.size {
                    self.buffer[field.offset..field.offset + field.size]
                        .copy_from_slice(&scratch);
                }
                // A value of the wrong size leaves the previous bytes, the
                // message stays well-formed.
            }
        }
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{DataSetField, DataSetWriter, PublishedDataSet};
    use std::time::Duration;

    #[test]
    fn rt_update_patches_in_place() {
        let speed = Arc::new(RwLock::new(DataValue::from(10i32)));
        let temp = Arc::new(RwLock::new(DataValue::from(20.0f64)));

        let mut dataset = PublishedDataSet::new("ds");
        dataset
            .fields
            .push(DataSetField::external("speed", speed.clone()));
        dataset
            .fields
            .push(DataSetField::external("temp", temp.clone()));
        let mut group = WriterGroup::new(1, "g", Duration::from_millis(10));
        group.add_writer(DataSetWriter::new(1, "w", dataset));

        let mut rt = RtNetworkMessage::precompute(7, &mut group).unwrap();
        let first = rt.update(1).to_vec();

        *speed.write() = DataValue::from(11i32);
        *temp.write() = DataValue::from(21.5f64);
        let second = rt.update(2).to_vec();

        assert_eq!(first.len(), second.len());
        assert_ne!(first, second);
        // Patched bytes carry the new values
        let speed_bytes = 11i32.to_le_bytes();
        assert!(second
            .windows(speed_bytes.len())
            .any(|w| w == speed_bytes));
    }

    #[test]
    fn rt_rejects_variable_size_fields() {
        let name = Arc::new(RwLock::new(DataValue::from("hello")));
        let mut dataset = PublishedDataSet::new("ds");
        dataset.fields.push(DataSetField::external("name", name));
        let mut group = WriterGroup::new(1, "g", Duration::from_millis(10));
        group.add_writer(DataSetWriter::new(1, "w", dataset));
        assert!(RtNetworkMessage::precompute(7, &mut group).is_err());
    }
}
