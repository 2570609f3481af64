// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The publisher side: published data sets, data set writers and writer
//! groups.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;
use parking_lot::RwLock;

use uastack_core::runtime::CycleMissPolicy;
use uastack_types::{DataValue, EncodingResult, StatusCode, Variant};

use crate::{
    network_message::{DataSetMessage, FieldEncoding, MessageEncoding, NetworkMessage},
    rt::RtNetworkMessage,
    PubSubState,
};

/// Where a published field takes its value from. The external cell is the
/// same shared cell a server variable with an external value source uses,
/// enabling zero-copy publishing.
#[derive(Clone)]
pub enum FieldSource {
    /// A shared external value cell.
    External(Arc<RwLock<DataValue>>),
    /// A constant value.
    Constant(Variant),
}

/// One field of a published data set.
#[derive(Clone)]
pub struct DataSetField {
    /// Field name, used for JSON payloads.
    pub name: String,
    /// The source of the field value.
    pub source: FieldSource,
}

impl DataSetField {
    /// Create a field reading from an external cell.
    pub fn external(name: &str, cell: Arc<RwLock<DataValue>>) -> DataSetField {
        DataSetField {
            name: name.to_string(),
            source: FieldSource::External(cell),
        }
    }

    /// The current value of the field.
    pub fn sample(&self) -> DataValue {
        match &self.source {
            FieldSource::External(cell) => cell.read().clone(),
            FieldSource::Constant(value) => DataValue::from(value.clone()),
        }
    }
}

/// The publisher side definition of a data set.
#[derive(Clone, Default)]
pub struct PublishedDataSet {
    /// Name of the data set.
    pub name: String,
    /// The fields in publication order.
    pub fields: Vec<DataSetField>,
}

impl PublishedDataSet {
    /// Create an empty published data set.
    pub fn new(name: &str) -> PublishedDataSet {
        PublishedDataSet {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Field names in order, for JSON payloads.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Maps a published data set to data set messages.
pub struct DataSetWriter {
    /// Writer id carried in the payload header.
    pub id: u16,
    /// Name of the writer.
    pub name: String,
    /// The published data set.
    pub dataset: PublishedDataSet,
    /// Field encoding for the payload.
    pub field_encoding: FieldEncoding,
    /// State of the writer.
    pub state: PubSubState,
    sequence_number: u16,
}

impl DataSetWriter {
    /// Create a writer over a data set.
    pub fn new(id: u16, name: &str, dataset: PublishedDataSet) -> DataSetWriter {
        DataSetWriter {
            id,
            name: name.to_string(),
            dataset,
            field_encoding: FieldEncoding::Variant,
            state: PubSubState::Disabled,
            sequence_number: 0,
        }
    }

    /// Sample the data set into a data set message.
    pub fn write(&mut self) -> DataSetMessage {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        DataSetMessage {
            data_set_writer_id: self.id,
            sequence_number: self.sequence_number,
            field_encoding: self.field_encoding,
            fields: self.dataset.fields.iter().map(|f| f.sample()).collect(),
        }
    }
}

/// The realtime level of a writer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtLevel {
    /// Full encoding every publish cycle.
    #[default]
    None,
    /// Offsets are computed once; publish cycles patch payload bytes in
    /// place. Requires external sources and fixed-size scalar fields.
    FixedSize,
}

/// A group of writers publishing on a shared interval and encoding.
pub struct WriterGroup {
    /// Group id carried in the group header.
    pub id: u16,
    /// Name of the group.
    pub name: String,
    /// Publishing interval.
    pub publishing_interval: Duration,
    /// How late cycles reschedule.
    pub cycle_policy: CycleMissPolicy,
    /// Payload encoding.
    pub encoding: MessageEncoding,
    /// Realtime level.
    pub rt_level: RtLevel,
    /// State of the group.
    pub state: PubSubState,
    /// The writers of the group.
    pub writers: Vec<DataSetWriter>,
    sequence_number: u16,
    network_message_number: u16,
    next_publish: Instant,
    base_time: Instant,
    /// The pre-computed message of the FixedSize path.
    rt_message: Option<RtNetworkMessage>,
}

impl WriterGroup {
    /// Create a writer group.
    pub fn new(id: u16, name: &str, publishing_interval: Duration) -> WriterGroup {
        let now = Instant::now();
        WriterGroup {
            id,
            name: name.to_string(),
            publishing_interval,
            cycle_policy: CycleMissPolicy::BaseTime,
            encoding: MessageEncoding::Uadp,
            rt_level: RtLevel::None,
            state: PubSubState::Disabled,
            writers: Vec::new(),
            sequence_number: 0,
            network_message_number: 1,
            next_publish: now,
            base_time: now,
            rt_message: None,
        }
    }

    /// Add a writer to the group.
    pub fn add_writer(&mut self, writer: DataSetWriter) {
        self.writers.push(writer);
    }

    /// Whether a publish cycle is due.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_publish
    }

    /// The time of the next publish cycle.
    pub fn next_publish(&self) -> Instant {
        self.next_publish
    }

    /// Reschedule after a cycle, honoring the cycle-miss policy: with
    /// `BaseTime` the k-th cycle stays at `base + k * interval` and missed
    /// cycles are skipped, with `CurrentTime` the phase drifts.
    pub fn reschedule(&mut self, now: Instant) {
        self.next_publish = match self.cycle_policy {
            CycleMissPolicy::CurrentTime => now + self.publishing_interval,
            CycleMissPolicy::BaseTime => {
                let interval = self.publishing_interval;
                let elapsed = now.saturating_duration_since(self.base_time);
                let cycles = elapsed.as_nanos() / interval.as_nanos().max(1);
                self.base_time + interval * (cycles as u32 + 1)
            }
        };
    }

    /// Enable the FixedSize realtime path. Fails with `BadTypeMismatch`
    /// when a field is not a fixed-size scalar from an external source; the
    /// group then stays on the normal encode path.
    pub fn enable_rt(&mut self, publisher_id: u16) -> Result<(), StatusCode> {
        match RtNetworkMessage::precompute(publisher_id, self) {
            Ok(message) => {
                self.rt_level = RtLevel::FixedSize;
                self.rt_message = Some(message);
                Ok(())
            }
            Err(e) => {
                warn!("Realtime path unavailable for group {}: {e}", self.name);
                self.rt_level = RtLevel::None;
                self.rt_message = None;
                Err(e.status())
            }
        }
    }

    /// Produce the bytes of one publish cycle.
    pub fn publish(&mut self, publisher_id: u16) -> EncodingResult<Vec<u8>> {
        self.sequence_number = self.sequence_number.wrapping_add(1);

        if self.rt_level == RtLevel::FixedSize {
            // Patch the payload bytes in place, no encoding pass.
            let sequence_number = self.sequence_number;
            if let Some(rt) = self.rt_message.as_mut() {
                return Ok(rt.update(sequence_number).to_vec());
            }
        }

        let message = NetworkMessage {
            publisher_id,
            writer_group_id: self.id,
            group_version: 1,
            network_message_number: self.network_message_number,
            sequence_number: self.sequence_number,
            messages: self.writers.iter_mut().map(|w| w.write()).collect(),
        };
        match self.encoding {
            MessageEncoding::Uadp => message.encode_uadp(),
            MessageEncoding::Json => {
                let names: Vec<Vec<String>> = self
                    .writers
                    .iter()
                    .map(|w| w.dataset.field_names())
                    .collect();
                Ok(message.encode_json(&names).to_string().into_bytes())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(value: impl Into<Variant>) -> Arc<RwLock<DataValue>> {
        Arc::new(RwLock::new(DataValue::from(value.into())))
    }

    fn group_with_field(cell: Arc<RwLock<DataValue>>) -> WriterGroup {
        let mut dataset = PublishedDataSet::new("ds");
        dataset.fields.push(DataSetField::external("speed", cell));
        let mut group = WriterGroup::new(100, "group", Duration::from_millis(100));
        group.add_writer(DataSetWriter::new(1, "writer", dataset));
        group
    }

    #[test]
    fn publish_samples_external_cells() {
        let cell = cell(1i32);
        let mut group = group_with_field(cell.clone());
        let bytes = group.publish(7).unwrap();
        let decoded = NetworkMessage::decode_uadp(&bytes).unwrap();
        assert_eq!(
            decoded.messages[0].fields[0].value,
            Some(Variant::Int32(1))
        );

        *cell.write() = DataValue::from(2i32);
        let bytes = group.publish(7).unwrap();
        let decoded = NetworkMessage::decode_uadp(&bytes).unwrap();
        assert_eq!(
            decoded.messages[0].fields[0].value,
            Some(Variant::Int32(2))
        );
        // Sequence numbers advance per cycle
        assert_eq!(decoded.sequence_number, 2);
    }

    #[test]
    fn json_payload_uses_field_names() {
        let mut group = group_with_field(cell(5i32));
        group.encoding = MessageEncoding::Json;
        let bytes = group.publish(7).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["Messages"][0]["Payload"]["speed"], 5);
    }

    #[test]
    fn base_time_policy_skips_missed_cycles() {
        let mut group = group_with_field(cell(0i32));
        let base = group.base_time;
        group.reschedule(base + Duration::from_millis(450));
        assert_eq!(group.next_publish(), base + Duration::from_millis(500));
    }
}
