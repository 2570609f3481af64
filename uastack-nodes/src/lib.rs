#![warn(missing_docs)]

//! Node representation for server address spaces: one type per node class,
//! the bidirectional reference store, and the type tree with reference type
//! indexing.

use bitflags::bitflags;

// Pull the payload out of a variant, or fail the attribute write the way
// the Write service expects.
macro_rules! expect_variant {
    ($value:expr, $variant:ident) => {
        match $value {
            uastack_types::Variant::$variant(v) => v,
            _ => return Err(uastack_types::StatusCode::BadTypeMismatch),
        }
    };
}

// Every node class owns a `base: Base` head; this wires up the conversions
// and the `HasBase` plumbing that the shared `NodeBase` impl hangs off.
macro_rules! node_class_impls {
    ($class:ident) => {
        impl From<$class> for crate::NodeType {
            fn from(value: $class) -> Self {
                crate::NodeType::$class(Box::new(value))
            }
        }

        impl crate::HasBase for $class {
            fn base(&self) -> &crate::Base {
                &self.base
            }
            fn base_mut(&mut self) -> &mut crate::Base {
                &mut self.base
            }
        }
    };
}

mod base;
mod data_type;
mod method;
mod node;
mod object;
mod object_type;
mod reference_type;
mod references;
mod type_tree;
mod variable;
mod variable_type;
mod view;

pub use base::{Base, Opaque};
pub use data_type::DataType;
pub use method::{Method, MethodFn};
pub use node::{HasBase, HasNodeId, Node, NodeBase, NodeType};
pub use object::Object;
pub use object_type::ObjectType;
pub use reference_type::ReferenceType;
pub use references::{ReferenceRef, References};
pub use type_tree::{DefaultTypeTree, ReferenceTypeSet, TypeTree, TypeTreeNode};
pub use variable::{OnReadValue, OnWriteValue, ValueSource, Variable};
pub use variable_type::VariableType;
pub use view::View;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// Which way a reference points, relative to the node it is stored with.
pub enum ReferenceDirection {
    /// From the holding node to the target.
    Forward,
    /// From the target to the holding node.
    Inverse,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Variable access level bits.
    pub struct AccessLevel: u8 {
        /// Read the current value.
        const CURRENT_READ = 1;
        /// Write the current value.
        const CURRENT_WRITE = 2;
        /// Read value history.
        const HISTORY_READ = 4;
        /// Write value history.
        const HISTORY_WRITE = 8;
        /// Change properties defining the semantics of the parent.
        const SEMANTIC_CHANGE = 16;
        /// Write the status of the current value.
        const STATUS_WRITE = 32;
        /// Write the timestamps of the current value.
        const TIMESTAMP_WRITE = 64;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Event notifier bits of objects and views.
    pub struct EventNotifier: u8 {
        /// Events can be subscribed to.
        const SUBSCRIBE_TO_EVENTS = 1;
        /// Event history can be read.
        const HISTORY_READ = 4;
        /// Event history can be written.
        const HISTORY_WRITE = 8;
    }
}
