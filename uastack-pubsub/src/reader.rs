// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The subscriber side: reader groups decoding received network messages
//! and data set readers dispatching field values into subscribed targets.

use std::sync::Arc;

use log::{debug, trace};
use parking_lot::RwLock;

use uastack_types::{DataValue, StatusCode};

use crate::{network_message::NetworkMessage, PubSubState};

/// One subscribed field: received values land in the target cell, which may
/// be shared with a server variable.
#[derive(Clone)]
pub struct SubscribedField {
    /// Field name, informational.
    pub name: String,
    /// The cell receiving values.
    pub target: Arc<RwLock<DataValue>>,
}

/// Consumes the data set messages of one writer.
pub struct DataSetReader {
    /// Name of the reader.
    pub name: String,
    /// The publisher id this reader listens to.
    pub publisher_id: u16,
    /// The writer group id this reader listens to.
    pub writer_group_id: u16,
    /// The data set writer id this reader listens to.
    pub data_set_writer_id: u16,
    /// The targets, in field order of the published data set.
    pub fields: Vec<SubscribedField>,
    /// State of the reader.
    pub state: PubSubState,
    last_sequence_number: Option<u16>,
}

impl DataSetReader {
    /// Create a reader for one writer's messages.
    pub fn new(
        name: &str,
        publisher_id: u16,
        writer_group_id: u16,
        data_set_writer_id: u16,
    ) -> DataSetReader {
        DataSetReader {
            name: name.to_string(),
            publisher_id,
            writer_group_id,
            data_set_writer_id,
            fields: Vec::new(),
            state: PubSubState::Disabled,
            last_sequence_number: None,
        }
    }

    /// Add a subscribed field target.
    pub fn add_field(&mut self, field: SubscribedField) {
        self.fields.push(field);
    }

    // Dispatch the fields of one matching data set message.
    fn dispatch(&mut self, sequence_number: u16, fields: &[DataValue]) {
        if let Some(last) = self.last_sequence_number {
            // Stale messages out of a reordering transport are dropped;
            // sequence numbers wrap.
            let delta = sequence_number.wrapping_sub(last);
            if delta == 0 || delta > u16::MAX / 2 {
                debug!(
                    "Reader {} dropping stale message {sequence_number}",
                    self.name
                );
                return;
            }
        }
        self.last_sequence_number = Some(sequence_number);

        for (target, value) in self.fields.iter().zip(fields.iter()) {
            *target.target.write() = value.clone();
        }
        trace!(
            "Reader {} applied {} fields of message {sequence_number}",
            self.name,
            fields.len().min(self.fields.len())
        );
    }
}

/// A group of readers fed from one connection.
pub struct ReaderGroup {
    /// Name of the group.
    pub name: String,
    /// State of the group.
    pub state: PubSubState,
    /// The readers.
    pub readers: Vec<DataSetReader>,
}

impl ReaderGroup {
    /// Create an empty reader group.
    pub fn new(name: &str) -> ReaderGroup {
        ReaderGroup {
            name: name.to_string(),
            state: PubSubState::Disabled,
            readers: Vec::new(),
        }
    }

    /// Add a reader.
    pub fn add_reader(&mut self, reader: DataSetReader) {
        self.readers.push(reader);
    }

    /// Decode a received datagram and dispatch it to matching readers.
    pub fn on_receive(&mut self, payload: &[u8]) -> Result<(), StatusCode> {
        if self.state != PubSubState::Operational {
            return Ok(());
        }
        let message = NetworkMessage::decode_uadp(payload).map_err(|e| {
            debug!("Reader group {} cannot decode message: {e}", self.name);
            e.status()
        })?;
        for data_set in &message.messages {
            for reader in &mut self.readers {
                if reader.state != PubSubState::Operational {
                    continue;
                }
                if reader.publisher_id == message.publisher_id
                    && reader.writer_group_id == message.writer_group_id
                    && reader.data_set_writer_id == data_set.data_set_writer_id
                {
                    reader.dispatch(data_set.sequence_number, &data_set.fields);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{DataSetField, DataSetWriter, PublishedDataSet, WriterGroup};
    use std::time::Duration;
    use uastack_types::Variant;

    #[test]
    fn writer_to_reader_end_to_end() {
        // Publisher side
        let source = Arc::new(RwLock::new(DataValue::from(99i32)));
        let mut dataset = PublishedDataSet::new("ds");
        dataset
            .fields
            .push(DataSetField::external("counter", source.clone()));
        let mut group = WriterGroup::new(100, "wg", Duration::from_millis(50));
        group.add_writer(DataSetWriter::new(62541, "w", dataset));
        let bytes = group.publish(2234).unwrap();

        // Subscriber side
        let target = Arc::new(RwLock::new(DataValue::null()));
        let mut reader = DataSetReader::new("r", 2234, 100, 62541);
        reader.state = PubSubState::Operational;
        reader.add_field(SubscribedField {
            name: "counter".to_string(),
            target: target.clone(),
        });
        let mut reader_group = ReaderGroup::new("rg");
        reader_group.state = PubSubState::Operational;
        reader_group.add_reader(reader);

        reader_group.on_receive(&bytes).unwrap();
        assert_eq!(target.read().value, Some(Variant::Int32(99)));
    }

    #[test]
    fn stale_sequence_numbers_are_dropped() {
        let target = Arc::new(RwLock::new(DataValue::null()));
        let mut reader = DataSetReader::new("r", 1, 1, 1);
        reader.state = PubSubState::Operational;
        reader.add_field(SubscribedField {
            name: "f".to_string(),
            target: target.clone(),
        });

        reader.dispatch(5, &[DataValue::from(1i32)]);
        assert_eq!(target.read().value, Some(Variant::Int32(1)));
        // Older sequence number: ignored
        reader.dispatch(4, &[DataValue::from(2i32)]);
        assert_eq!(target.read().value, Some(Variant::Int32(1)));
        // Newer: applied
        reader.dispatch(6, &[DataValue::from(3i32)]);
        assert_eq!(target.read().value, Some(Variant::Int32(3)));
    }
}
