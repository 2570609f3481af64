// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The node traits and the [`NodeType`] sum over the eight node classes.

use uastack_types::{
    AttributeId, DataValue, LocalizedText, NodeClass, NodeId, NumericRange, QualifiedName,
    StatusCode, TimestampsToReturn, Variant, WriteMask,
};

use crate::{
    Base, DataType, Method, Object, ObjectType, Opaque, ReferenceType, Variable, VariableType,
    View,
};

/// An owned node of any class.
#[derive(Debug)]
pub enum NodeType {
    /// A plain structural object.
    Object(Box<Object>),
    /// A variable carrying a value.
    Variable(Box<Variable>),
    /// A callable method.
    Method(Box<Method>),
    /// A type for objects.
    ObjectType(Box<ObjectType>),
    /// A type for variables.
    VariableType(Box<VariableType>),
    /// A type for references.
    ReferenceType(Box<ReferenceType>),
    /// A type for values.
    DataType(Box<DataType>),
    /// A predefined subset of the address space.
    View(Box<View>),
}

// Runs an expression against whichever class the node is.
macro_rules! per_class {
    ($node:expr, $inner:ident => $body:expr) => {
        match $node {
            NodeType::Object($inner) => $body,
            NodeType::Variable($inner) => $body,
            NodeType::Method($inner) => $body,
            NodeType::ObjectType($inner) => $body,
            NodeType::VariableType($inner) => $body,
            NodeType::ReferenceType($inner) => $body,
            NodeType::DataType($inner) => $body,
            NodeType::View($inner) => $body,
        }
    };
}

impl NodeType {
    /// Borrow the node through the [`Node`] trait.
    pub fn as_node(&self) -> &(dyn Node + '_) {
        per_class!(self, n => n.as_ref())
    }

    /// Borrow the node mutably through the [`Node`] trait.
    pub fn as_mut_node(&mut self) -> &mut dyn Node {
        per_class!(self, n => n.as_mut())
    }

    /// The class of the node.
    pub fn node_class(&self) -> NodeClass {
        match self {
            NodeType::Object(_) => NodeClass::Object,
            NodeType::Variable(_) => NodeClass::Variable,
            NodeType::Method(_) => NodeClass::Method,
            NodeType::ObjectType(_) => NodeClass::ObjectType,
            NodeType::VariableType(_) => NodeClass::VariableType,
            NodeType::ReferenceType(_) => NodeClass::ReferenceType,
            NodeType::DataType(_) => NodeClass::DataType,
            NodeType::View(_) => NodeClass::View,
        }
    }

    /// Replace the node id, used when the server assigns fresh ids or
    /// rewrites namespace indices.
    pub fn set_node_id(&mut self, node_id: NodeId) {
        per_class!(self, n => n.base_mut().set_node_id(node_id))
    }

    /// The node as a variable, when it is one.
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            NodeType::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The node as a mutable variable, when it is one.
    pub fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match self {
            NodeType::Variable(v) => Some(v),
            _ => None,
        }
    }
}

/// Anything with a node id.
pub trait HasNodeId {
    /// The node id.
    fn node_id(&self) -> &NodeId;
}

impl HasNodeId for NodeType {
    fn node_id(&self) -> &NodeId {
        per_class!(self, n => n.base().node_id())
    }
}

/// Wiring trait: every node class owns a [`Base`] and exposes it here, which
/// provides the whole [`NodeBase`] surface through a blanket impl.
pub trait HasBase {
    /// The common node head.
    fn base(&self) -> &Base;
    /// The common node head, mutably.
    fn base_mut(&mut self) -> &mut Base;
}

/// Access to the attributes every node class shares.
pub trait NodeBase {
    /// The node class.
    fn node_class(&self) -> NodeClass;
    /// The node id.
    fn node_id(&self) -> &NodeId;
    /// The browse name.
    fn browse_name(&self) -> &QualifiedName;
    /// The display name.
    fn display_name(&self) -> &LocalizedText;
    /// Set the display name.
    fn set_display_name(&mut self, display_name: LocalizedText);
    /// The description, when one is set.
    fn description(&self) -> Option<&LocalizedText>;
    /// Set the description.
    fn set_description(&mut self, description: LocalizedText);
    /// The write mask, when one is set.
    fn write_mask(&self) -> Option<WriteMask>;
    /// Set the write mask.
    fn set_write_mask(&mut self, write_mask: WriteMask);
    /// The user write mask, when one is set.
    fn user_write_mask(&self) -> Option<WriteMask>;
    /// Set the user write mask.
    fn set_user_write_mask(&mut self, write_mask: WriteMask);
    /// The application context cell of the node.
    fn context(&self) -> Option<&Opaque>;
    /// Set or replace the application context cell.
    fn set_context(&mut self, context: Option<Opaque>);
    /// Whether the node's constructors have run.
    fn constructed(&self) -> bool;
    /// Flip the constructed flag.
    fn set_constructed(&mut self, constructed: bool);
}

impl<T: HasBase> NodeBase for T {
    fn node_class(&self) -> NodeClass {
        self.base().node_class
    }
    fn node_id(&self) -> &NodeId {
        self.base().node_id()
    }
    fn browse_name(&self) -> &QualifiedName {
        self.base().browse_name()
    }
    fn display_name(&self) -> &LocalizedText {
        &self.base().display_name
    }
    fn set_display_name(&mut self, display_name: LocalizedText) {
        self.base_mut().display_name = display_name;
    }
    fn description(&self) -> Option<&LocalizedText> {
        self.base().description.as_ref()
    }
    fn set_description(&mut self, description: LocalizedText) {
        self.base_mut().description = Some(description);
    }
    fn write_mask(&self) -> Option<WriteMask> {
        self.base().write_mask
    }
    fn set_write_mask(&mut self, write_mask: WriteMask) {
        self.base_mut().write_mask = Some(write_mask);
    }
    fn user_write_mask(&self) -> Option<WriteMask> {
        self.base().user_write_mask
    }
    fn set_user_write_mask(&mut self, write_mask: WriteMask) {
        self.base_mut().user_write_mask = Some(write_mask);
    }
    fn context(&self) -> Option<&Opaque> {
        self.base().context.as_ref()
    }
    fn set_context(&mut self, context: Option<Opaque>) {
        self.base_mut().context = context;
    }
    fn constructed(&self) -> bool {
        self.base().constructed
    }
    fn set_constructed(&mut self, constructed: bool) {
        self.base_mut().constructed = constructed;
    }
}

/// Attribute-level access used by the Read and Write services. Class files
/// override the attributes they own and fall back to [`Base`] for the rest.
pub trait Node: NodeBase {
    /// Read one attribute. `None` when the node class does not carry it.
    fn get_attribute(
        &self,
        timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        index_range: &NumericRange,
    ) -> Option<DataValue>;

    /// Write one attribute.
    fn set_attribute(&mut self, attribute_id: AttributeId, value: Variant)
        -> Result<(), StatusCode>;
}
