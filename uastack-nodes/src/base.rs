// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The common head shared by every node class.

use std::any::Any;
use std::fmt;

use uastack_types::{
    AttributeId, DataValue, LocalizedText, NodeClass, NodeId, NumericRange, QualifiedName,
    StatusCode, TimestampsToReturn, Variant, WriteMask,
};

use crate::node::{HasBase, Node};

/// Per-node application context. Callbacks read it through `get`, and
/// constructors may replace the whole cell through the node head.
pub struct Opaque(Box<dyn Any + Send + Sync>);

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque")
    }
}

impl Opaque {
    /// Wrap a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Opaque {
        Opaque(Box::new(value))
    }

    /// Downcast to a shared reference.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Downcast to a mutable reference.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }
}

/// The attributes every node carries regardless of class.
#[derive(Debug)]
pub struct Base {
    pub(crate) node_id: NodeId,
    pub(crate) node_class: NodeClass,
    /// Unique among the node's siblings once inserted.
    pub(crate) browse_name: QualifiedName,
    pub(crate) display_name: LocalizedText,
    pub(crate) description: Option<LocalizedText>,
    pub(crate) write_mask: Option<WriteMask>,
    pub(crate) user_write_mask: Option<WriteMask>,
    /// Application context attached by callbacks.
    pub(crate) context: Option<Opaque>,
    /// Set once the constructor chain has run.
    pub(crate) constructed: bool,
}

impl Base {
    /// A fresh head for a node of the given class.
    pub fn new(
        node_class: NodeClass,
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
    ) -> Base {
        Base {
            node_id: node_id.clone(),
            node_class,
            browse_name: browse_name.into(),
            display_name: display_name.into(),
            description: None,
            write_mask: None,
            user_write_mask: None,
            context: None,
            constructed: false,
        }
    }

    /// The node id.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The browse name.
    pub fn browse_name(&self) -> &QualifiedName {
        &self.browse_name
    }

    /// Replace the node id.
    pub fn set_node_id(&mut self, node_id: NodeId) {
        self.node_id = node_id;
    }

    /// Replace the browse name.
    pub fn set_browse_name(&mut self, browse_name: impl Into<QualifiedName>) {
        self.browse_name = browse_name.into();
    }

    /// A head is usable once it has a real id and a browse name.
    pub fn is_valid(&self) -> bool {
        !self.node_id.is_null() && !self.browse_name.is_null()
    }
}

impl HasBase for Base {
    fn base(&self) -> &Base {
        self
    }
    fn base_mut(&mut self) -> &mut Base {
        self
    }
}

impl Node for Base {
    fn get_attribute(
        &self,
        _timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        _index_range: &NumericRange,
    ) -> Option<DataValue> {
        let value: Variant = match attribute_id {
            AttributeId::NodeId => self.node_id.clone().into(),
            AttributeId::NodeClass => (self.node_class as i32).into(),
            AttributeId::BrowseName => self.browse_name.clone().into(),
            AttributeId::DisplayName => self.display_name.clone().into(),
            AttributeId::Description => self.description.clone()?.into(),
            AttributeId::WriteMask => self.write_mask?.bits().into(),
            AttributeId::UserWriteMask => self.user_write_mask?.bits().into(),
            _ => return None,
        };
        Some(value.into())
    }

    fn set_attribute(
        &mut self,
        attribute_id: AttributeId,
        value: Variant,
    ) -> Result<(), StatusCode> {
        match attribute_id {
            AttributeId::BrowseName => {
                self.browse_name = *expect_variant!(value, QualifiedName);
            }
            AttributeId::DisplayName => {
                self.display_name = *expect_variant!(value, LocalizedText);
            }
            AttributeId::Description => {
                self.description = Some(*expect_variant!(value, LocalizedText));
            }
            AttributeId::WriteMask => {
                self.write_mask =
                    Some(WriteMask::from_bits_truncate(expect_variant!(value, UInt32)));
            }
            AttributeId::UserWriteMask => {
                self.user_write_mask =
                    Some(WriteMask::from_bits_truncate(expect_variant!(value, UInt32)));
            }
            _ => return Err(StatusCode::BadAttributeIdInvalid),
        }
        Ok(())
    }
}
