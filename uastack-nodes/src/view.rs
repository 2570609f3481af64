// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! View nodes.

use uastack_types::{
    AttributeId, DataValue, LocalizedText, NodeClass, NodeId, NumericRange, QualifiedName,
    StatusCode, TimestampsToReturn, Variant,
};

use crate::{Base, EventNotifier, Node};

/// A predefined subset of the address space.
#[derive(Debug)]
pub struct View {
    base: Base,
    event_notifier: EventNotifier,
    contains_no_loops: bool,
}

node_class_impls!(View);

impl View {
    /// Create a view node.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
        event_notifier: EventNotifier,
        contains_no_loops: bool,
    ) -> View {
        View {
            base: Base::new(NodeClass::View, node_id, browse_name, display_name),
            event_notifier,
            contains_no_loops,
        }
    }
}

impl Node for View {
    fn get_attribute(
        &self,
        timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        index_range: &NumericRange,
    ) -> Option<DataValue> {
        match attribute_id {
            AttributeId::EventNotifier => Some(self.event_notifier.bits().into()),
            AttributeId::ContainsNoLoops => Some(self.contains_no_loops.into()),
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
            AttributeId::EventNotifier => {
                self.event_notifier = EventNotifier::from_bits_truncate(expect_variant!(value, Byte))
            }
            AttributeId::ContainsNoLoops => {
                self.contains_no_loops = expect_variant!(value, Boolean)
            }
            _ => return self.base.set_attribute(attribute_id, value),
        }
        Ok(())
    }
}
