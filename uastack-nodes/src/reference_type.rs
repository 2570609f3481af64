// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Reference type nodes.

use uastack_types::{
    AttributeId, DataValue, LocalizedText, NodeClass, NodeId, NumericRange, QualifiedName,
    StatusCode, TimestampsToReturn, Variant,
};

use crate::{Base, Node};

/// Defines an edge kind between nodes. The subtype tree of reference types
/// is rooted at References; the type tree assigns each one a small index so
/// filters can be bitmask sets.
#[derive(Debug)]
pub struct ReferenceType {
    base: Base,
    symmetric: bool,
    is_abstract: bool,
    inverse_name: Option<LocalizedText>,
}

node_class_impls!(ReferenceType);

impl ReferenceType {
    /// Create a reference type node.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
        symmetric: bool,
        is_abstract: bool,
    ) -> ReferenceType {
        ReferenceType {
            base: Base::new(NodeClass::ReferenceType, node_id, browse_name, display_name),
            symmetric,
            is_abstract,
            inverse_name: None,
        }
    }

    /// Whether the reference reads the same both ways.
    pub fn symmetric(&self) -> bool {
        self.symmetric
    }

    /// Whether the type is abstract.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Name of the inverse direction, e.g. "OrganizedBy".
    pub fn inverse_name(&self) -> Option<&LocalizedText> {
        self.inverse_name.as_ref()
    }

    /// Set the name of the inverse direction.
    pub fn set_inverse_name(&mut self, inverse_name: Option<LocalizedText>) {
        self.inverse_name = inverse_name;
    }
}

impl Node for ReferenceType {
    fn get_attribute(
        &self,
        timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        index_range: &NumericRange,
    ) -> Option<DataValue> {
        match attribute_id {
            AttributeId::Symmetric => Some(self.symmetric.into()),
            AttributeId::IsAbstract => Some(self.is_abstract.into()),
            AttributeId::InverseName => self.inverse_name.clone().map(|v| v.into()),
            _ => self
                .base
                .get_attribute(timestamps_to_return, attribute_id, index_range),
        }
    }

    fn set_attribute(
        &mut self,
        attribute_id: AttributeId,
        value: Variant,
    ) -> Result<(), StatusCode> {
        match attribute_id {
            AttributeId::Symmetric => self.symmetric = expect_variant!(value, Boolean),
            AttributeId::IsAbstract => self.is_abstract = expect_variant!(value, Boolean),
            AttributeId::InverseName => {
                self.inverse_name = Some(*expect_variant!(value, LocalizedText))
            }
            _ => return self.base.set_attribute(attribute_id, value),
        }
        Ok(())
    }
}
