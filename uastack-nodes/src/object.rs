// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Object nodes.

use uastack_types::{
    AttributeId, DataValue, LocalizedText, NodeClass, NodeId, NumericRange, QualifiedName,
    StatusCode, TimestampsToReturn, Variant,
};

use crate::{Base, EventNotifier, Node};

/// A structural node. Objects group other nodes and may emit events when
/// their notifier bits say so.
#[derive(Debug)]
pub struct Object {
    base: Base,
    event_notifier: EventNotifier,
}

node_class_impls!(Object);

impl Default for Object {
    fn default() -> Self {
        Object::new(&NodeId::null(), "", "", EventNotifier::empty())
    }
}

impl Object {
    /// Create an object node.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
        event_notifier: EventNotifier,
    ) -> Object {
        Object {
            base: Base::new(NodeClass::Object, node_id, browse_name, display_name),
            event_notifier,
        }
    }

    /// Whether the node can be inserted.
    pub fn is_valid(&self) -> bool {
        self.base.is_valid()
    }

    /// The event notifier bits.
    pub fn event_notifier(&self) -> EventNotifier {
        self.event_notifier
    }

    /// Set the event notifier bits.
    pub fn set_event_notifier(&mut self, event_notifier: EventNotifier) {
        self.event_notifier = event_notifier;
    }
}

impl Node for Object {
    fn get_attribute(
        &self,
        timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        index_range: &NumericRange,
    ) -> Option<DataValue> {
        if attribute_id == AttributeId::EventNotifier {
            return Some(self.event_notifier.bits().into());
        }
        self.base
            .get_attribute(timestamps_to_return, attribute_id, index_range)
    }

    fn set_attribute(
        &mut self,
        attribute_id: AttributeId,
        value: Variant,
    ) -> Result<(), StatusCode> {
        if attribute_id == AttributeId::EventNotifier {
            self.event_notifier = EventNotifier::from_bits_truncate(expect_variant!(value, Byte));
            return Ok(());
        }
        self.base.set_attribute(attribute_id, value)
    }
}
