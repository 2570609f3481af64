// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Variable type nodes.

use uastack_types::{
    AttributeId, DataTypeId, DataValue, LocalizedText, NodeClass, NodeId, NumericRange,
    QualifiedName, StatusCode, TimestampsToReturn, Variant,
};

use crate::{Base, Node};

/// A type definition for variables, constraining the data type, rank and
/// dimensions of instances and optionally giving them a starting value.
#[derive(Debug)]
pub struct VariableType {
    base: Base,
    is_abstract: bool,
    value: Option<Variant>,
    data_type: NodeId,
    value_rank: i32,
    array_dimensions: Option<Vec<u32>>,
}

node_class_impls!(VariableType);

impl VariableType {
    /// Create a variable type node.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
        is_abstract: bool,
    ) -> VariableType {
        VariableType {
            base: Base::new(NodeClass::VariableType, node_id, browse_name, display_name),
            is_abstract,
            value: None,
            data_type: DataTypeId::BaseDataType.into(),
            value_rank: uastack_types::value_rank::ANY,
            array_dimensions: None,
        }
    }

    /// Whether the type is abstract.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// The default value of instances.
    pub fn value(&self) -> Option<&Variant> {
        self.value.as_ref()
    }

    /// Set the default value of instances.
    pub fn set_value(&mut self, value: Option<Variant>) {
        self.value = value;
    }

    /// The data type of instances.
    pub fn data_type(&self) -> &NodeId {
        &self.data_type
    }

    /// Set the data type of instances.
    pub fn set_data_type(&mut self, data_type: NodeId) {
        self.data_type = data_type;
    }

    /// The value rank of instances.
    pub fn value_rank(&self) -> i32 {
        self.value_rank
    }

    /// Set the value rank of instances.
    pub fn set_value_rank(&mut self, value_rank: i32) {
        self.value_rank = value_rank;
    }

    /// The array dimensions of instances.
    pub fn array_dimensions(&self) -> Option<&Vec<u32>> {
        self.array_dimensions.as_ref()
    }
}

impl Node for VariableType {
    fn get_attribute(
        &self,
        timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        index_range: &NumericRange,
    ) -> Option<DataValue> {
        let value: Variant = match attribute_id {
            AttributeId::IsAbstract => self.is_abstract.into(),
            AttributeId::Value => self.value.clone()?,
            AttributeId::DataType => self.data_type.clone().into(),
            AttributeId::ValueRank => self.value_rank.into(),
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
            AttributeId::IsAbstract => self.is_abstract = expect_variant!(value, Boolean),
            AttributeId::Value => self.value = Some(value),
            AttributeId::DataType => self.data_type = *expect_variant!(value, NodeId),
            AttributeId::ValueRank => self.value_rank = expect_variant!(value, Int32),
            _ => return self.base.set_attribute(attribute_id, value),
        }
        Ok(())
    }
}
