// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Method nodes.

use std::fmt;

use uastack_types::{
    AttributeId, DataValue, LocalizedText, NodeClass, NodeId, NumericRange, QualifiedName,
    StatusCode, TimestampsToReturn, Variant,
};

use crate::{Base, Node};

/// The callback behind a method: `(object id, method id, inputs) -> outputs`.
pub type MethodFn =
    Box<dyn FnMut(&NodeId, &NodeId, &[Variant]) -> Result<Vec<Variant>, StatusCode> + Send + Sync>;

/// A callable node. Without a callback, calls fail with `BadNotImplemented`;
/// with the async flag set, calls go through the async operation queue
/// instead of running inline.
pub struct Method {
    base: Base,
    executable: bool,
    user_executable: bool,
    is_async: bool,
    callback: Option<MethodFn>,
}

node_class_impls!(Method);

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("base", &self.base)
            .field("executable", &self.executable)
            .field("user_executable", &self.user_executable)
            .field("is_async", &self.is_async)
            .finish()
    }
}

impl Method {
    /// Create a method node.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
        executable: bool,
        user_executable: bool,
    ) -> Method {
        Method {
            base: Base::new(NodeClass::Method, node_id, browse_name, display_name),
            executable,
            user_executable,
            is_async: false,
            callback: None,
        }
    }

    /// Whether the method may be called at all.
    pub fn executable(&self) -> bool {
        self.executable
    }

    /// Whether the current user may call the method. Never true when the
    /// method is not executable.
    pub fn user_executable(&self) -> bool {
        self.executable && self.user_executable
    }

    /// Whether calls run through the async operation queue.
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Mark calls as asynchronous.
    pub fn set_is_async(&mut self, is_async: bool) {
        self.is_async = is_async;
    }

    /// Attach or remove the call callback.
    pub fn set_callback(&mut self, callback: Option<MethodFn>) {
        self.callback = callback;
    }

    /// Run the callback for a call on `object_id`.
    pub fn invoke(
        &mut self,
        object_id: &NodeId,
        arguments: &[Variant],
    ) -> Result<Vec<Variant>, StatusCode> {
        let method_id = self.base.node_id().clone();
        match self.callback.as_mut() {
            Some(callback) => callback(object_id, &method_id, arguments),
            None => Err(StatusCode::BadNotImplemented),
        }
    }
}

impl Node for Method {
    fn get_attribute(
        &self,
        timestamps_to_return: TimestampsToReturn,
        attribute_id: AttributeId,
        index_range: &NumericRange,
    ) -> Option<DataValue> {
        match attribute_id {
            AttributeId::Executable => Some(self.executable.into()),
            AttributeId::UserExecutable => Some(self.user_executable().into()),
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
            AttributeId::Executable => self.executable = expect_variant!(value, Boolean),
            AttributeId::UserExecutable => self.user_executable = expect_variant!(value, Boolean),
            _ => return self.base.set_attribute(attribute_id, value),
        }
        Ok(())
    }
}
