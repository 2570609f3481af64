// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Data type nodes.

use uastack_types::{
    AttributeId, DataValue, LocalizedText, NodeClass, NodeId, NumericRange, QualifiedName,
    StatusCode, TimestampsToReturn, Variant,
};

use crate::{Base, Node};

/// A data type usable by variable values. The subtype tree rooted at
/// BaseDataType drives write compatibility checks.
#[derive(Debug)]
pub struct DataType {
    base: Base,
    is_abstract: bool,
}

node_class_impls!(DataType);

impl DataType {
    /// Create a data type node.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
        is_abstract: bool,
    ) -> DataType {
        DataType {
            base: Base::new(NodeClass::DataType, node_id, browse_name, display_name),
            is_abstract,
        }
    }

    /// Whether the type is abstract.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
}

impl Node for DataType {
    fn get_attribute(
        &self,
        timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        index_range: &NumericRange,
    ) -> Option<DataValue> {
        if attribute_id == AttributeId::IsAbstract {
            return Some(self.is_abstract.into());
        }
        self.base
            .get_attribute(timestamps_to_return, attribute_id, index_range)
    }

    fn set_attribute(
        &mut self,
        attribute_id: AttributeId,
        value: Variant,
    ) -> Result<(), StatusCode> {
        if attribute_id == AttributeId::IsAbstract {
            self.is_abstract = expect_variant!(value, Boolean);
            return Ok(());
        }
        self.base.set_attribute(attribute_id, value)
    }
}
