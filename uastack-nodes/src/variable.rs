// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Variable nodes and the sources their values come from.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use uastack_types::{
    AttributeId, DataTypeId, DataValue, DateTime, LocalizedText, NodeClass, NodeId, NumericRange,
    QualifiedName, StatusCode, TimestampsToReturn, Variant,
};

use crate::{AccessLevel, Base, Node};

/// Called on reads of a callback-backed value.
pub type OnReadValue =
    Box<dyn Fn(&NumericRange) -> Result<DataValue, StatusCode> + Send + Sync>;

/// Called on writes of a callback-backed value.
pub type OnWriteValue = Box<dyn FnMut(DataValue) -> Result<(), StatusCode> + Send + Sync>;

/// The storage behind a variable's value.
pub enum ValueSource {
    /// Stored on the node.
    Internal(DataValue),
    /// Produced and consumed by callbacks; a missing write callback makes
    /// the value read-only regardless of access level.
    Callback {
        /// Read hook.
        on_read: OnReadValue,
        /// Optional write hook.
        on_write: Option<OnWriteValue>,
    },
    /// A cell shared with something outside the node, such as a PubSub
    /// data set field. Readers take the lock briefly; the realtime path
    /// writes the cell without going through the node.
    External(Arc<RwLock<DataValue>>),
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueSource::Internal(_) => "Internal",
            ValueSource::Callback { .. } => "Callback",
            ValueSource::External(_) => "External",
        })
    }
}

impl Default for ValueSource {
    fn default() -> Self {
        ValueSource::Internal(DataValue::null())
    }
}

/// A node with a current value.
#[derive(Debug)]
pub struct Variable {
    base: Base,
    value: ValueSource,
    data_type: NodeId,
    value_rank: i32,
    array_dimensions: Option<Vec<u32>>,
    access_level: AccessLevel,
    user_access_level: AccessLevel,
    minimum_sampling_interval: f64,
    historizing: bool,
}

node_class_impls!(Variable);

impl Default for Variable {
    fn default() -> Self {
        Variable::new(
            &NodeId::null(),
            "",
            "",
            DataTypeId::BaseDataType,
            Variant::Empty,
        )
    }
}

impl Variable {
    /// Create a variable with an internal value. The value rank defaults to
    /// Any, access to read-only.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
        data_type: impl Into<NodeId>,
        value: impl Into<Variant>,
    ) -> Variable {
        Variable {
            base: Base::new(NodeClass::Variable, node_id, browse_name, display_name),
            value: ValueSource::Internal(DataValue::new_now(value)),
            data_type: data_type.into(),
            value_rank: uastack_types::value_rank::ANY,
            array_dimensions: None,
            access_level: AccessLevel::CURRENT_READ,
            user_access_level: AccessLevel::CURRENT_READ,
            minimum_sampling_interval: 0.0,
            historizing: false,
        }
    }

    /// Whether the node can be inserted.
    pub fn is_valid(&self) -> bool {
        self.base.is_valid()
    }

    /// Read the value from whatever backs it, applying the index range and
    /// stripping timestamps that were not asked for.
    pub fn value(
        &self,
        timestamps_to_return: TimestampsToReturn,
        index_range: &NumericRange,
    ) -> DataValue {
        let mut result = match &self.value {
            ValueSource::Internal(value) => value.clone(),
            ValueSource::External(cell) => cell.read().clone(),
            ValueSource::Callback { on_read, .. } => match on_read(index_range) {
                Ok(value) => value,
                Err(status) => return DataValue::new_status_now(status),
            },
        };
        if let Some((min, max)) = index_range.as_min_max() {
            match result.value.take().map(|v| v.range_of(min, max)) {
                Some(Ok(sliced)) => result.value = Some(sliced),
                Some(Err(status)) => return DataValue::new_status_now(status),
                None => {}
            }
        }
        match timestamps_to_return {
            TimestampsToReturn::Source => result.server_timestamp = None,
            TimestampsToReturn::Server => result.source_timestamp = None,
            TimestampsToReturn::Neither => {
                result.source_timestamp = None;
                result.server_timestamp = None;
            }
            _ => {}
        }
        result
    }

    /// Store a value through whatever backs it. Partial writes through an
    /// index range are not supported by this store.
    pub fn set_value(
        &mut self,
        index_range: &NumericRange,
        value: DataValue,
    ) -> Result<(), StatusCode> {
        if !index_range.is_none() {
            return Err(StatusCode::BadWriteNotSupported);
        }
        match &mut self.value {
            ValueSource::Internal(slot) => {
                *slot = value;
                Ok(())
            }
            ValueSource::External(cell) => {
                *cell.write() = value;
                Ok(())
            }
            ValueSource::Callback {
                on_write: Some(on_write),
                ..
            } => on_write(value),
            ValueSource::Callback { on_write: None, .. } => Err(StatusCode::BadNotWritable),
        }
    }

    /// Store a variant timestamped with the current time.
    pub fn set_value_now(&mut self, value: impl Into<Variant>) -> Result<(), StatusCode> {
        let mut value = DataValue::new_now(value);
        value.source_timestamp = Some(DateTime::now());
        self.set_value(&NumericRange::None, value)
    }

    /// The value source.
    pub fn value_source(&self) -> &ValueSource {
        &self.value
    }

    /// Replace the value source.
    pub fn set_value_source(&mut self, source: ValueSource) {
        self.value = source;
    }

    /// The declared data type.
    pub fn data_type(&self) -> &NodeId {
        &self.data_type
    }

    /// Set the declared data type.
    pub fn set_data_type(&mut self, data_type: NodeId) {
        self.data_type = data_type;
    }

    /// The declared value rank.
    pub fn value_rank(&self) -> i32 {
        self.value_rank
    }

    /// Set the declared value rank.
    pub fn set_value_rank(&mut self, value_rank: i32) {
        self.value_rank = value_rank;
    }

    /// The declared array dimensions.
    pub fn array_dimensions(&self) -> Option<&Vec<u32>> {
        self.array_dimensions.as_ref()
    }

    /// Set the declared array dimensions.
    pub fn set_array_dimensions(&mut self, array_dimensions: Option<Vec<u32>>) {
        self.array_dimensions = array_dimensions;
    }

    /// The access level bits.
    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    /// Set the access level bits.
    pub fn set_access_level(&mut self, access_level: AccessLevel) {
        self.access_level = access_level;
    }

    /// The user access level bits.
    pub fn user_access_level(&self) -> AccessLevel {
        self.user_access_level
    }

    /// Set the user access level bits.
    pub fn set_user_access_level(&mut self, user_access_level: AccessLevel) {
        self.user_access_level = user_access_level;
    }

    /// The minimum sampling interval in milliseconds.
    pub fn minimum_sampling_interval(&self) -> f64 {
        self.minimum_sampling_interval
    }

    /// Whether the server archives the value.
    pub fn historizing(&self) -> bool {
        self.historizing
    }
}

impl Node for Variable {
    fn get_attribute(
        &self,
        timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        index_range: &NumericRange,
    ) -> Option<DataValue> {
        let value: Variant = match attribute_id {
            AttributeId::Value => return Some(self.value(timestamps_to_return, index_range)),
            AttributeId::DataType => self.data_type.clone().into(),
            AttributeId::ValueRank => self.value_rank.into(),
            AttributeId::ArrayDimensions => {
                let dims = self.array_dimensions.as_ref()?;
                uastack_types::Array::new(
                    uastack_types::VariantScalarTypeId::UInt32,
                    dims.iter().map(|d| Variant::UInt32(*d)).collect::<Vec<_>>(),
                )
                .ok()?
                .into()
            }
            AttributeId::AccessLevel => self.access_level.bits().into(),
            AttributeId::UserAccessLevel => self.user_access_level.bits().into(),
            AttributeId::MinimumSamplingInterval => self.minimum_sampling_interval.into(),
            AttributeId::Historizing => self.historizing.into(),
            _ => {
                return self
                    .base
                    .get_attribute(timestamps_to_return, attribute_id, index_range)
            }
        };
        Some(value.into())
    }

    fn set_attribute(
        &mut self,
        attribute_id: AttributeId,
        value: Variant,
    ) -> Result<(), StatusCode> {
        match attribute_id {
            AttributeId::Value => {
                return self.set_value(&NumericRange::None, DataValue::new_now(value))
            }
            AttributeId::DataType => self.data_type = *expect_variant!(value, NodeId),
            AttributeId::ValueRank => self.value_rank = expect_variant!(value, Int32),
            AttributeId::AccessLevel => {
                self.access_level = AccessLevel::from_bits_truncate(expect_variant!(value, Byte))
            }
            AttributeId::UserAccessLevel => {
                self.user_access_level =
                    AccessLevel::from_bits_truncate(expect_variant!(value, Byte))
            }
            AttributeId::MinimumSamplingInterval => {
                self.minimum_sampling_interval = expect_variant!(value, Double)
            }
            AttributeId::Historizing => self.historizing = expect_variant!(value, Boolean),
            _ => return self.base.set_attribute(attribute_id, value),
        }
        Ok(())
    }
}
