// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Core OPC UA data types and the binary codec.
//!
//! This crate contains the built-in types (NodeId, Variant, DataValue and
//! friends), the binary encoding traits and limits, the numeric status code
//! set, and the service request/response structures used by the client and
//! server crates.

// Alias so the derive macros can refer to `opcua::types::...` from within
// this crate as well as from dependents.
#[allow(unused)]
mod opcua {
    pub use crate as types;
}

pub mod constants;

mod attribute;
mod basic_types;
mod byte_string;
mod context;
mod data_value;
mod date_time;
mod diagnostic_info;
mod encoding;
mod expanded_node_id;
mod extension_object;
mod guid;
mod localized_text;
mod node_id;
mod node_ids;
mod numeric_range;
mod qualified_name;
mod request_header;
mod response_header;
pub mod service_types;
pub mod status_code;
mod string;
mod variant;

pub use attribute::AttributeId;
pub use basic_types::*;
pub use byte_string::ByteString;
pub use context::{
    Context, ContextOwned, CustomDecodeFn, CustomTypeTable, NamespaceMap, OPC_UA_NAMESPACE,
};
pub use data_value::DataValue;
pub use date_time::DateTime;
pub use diagnostic_info::DiagnosticInfo;
pub use encoding::*;
pub use expanded_node_id::ExpandedNodeId;
pub use extension_object::ExtensionObject;
pub use guid::Guid;
pub use localized_text::LocalizedText;
pub use node_id::{Identifier, NodeId, NodeIdError};
pub use node_ids::*;
pub use numeric_range::NumericRange;
pub use qualified_name::QualifiedName;
pub use request_header::RequestHeader;
pub use response_header::ResponseHeader;
pub use service_types::*;
pub use status_code::StatusCode;
pub use string::{OutOfRange, UAString};
pub use variant::{Array, Variant, VariantScalarTypeId, VariantTypeId};

pub use uastack_macros::{BinaryDecodable, BinaryEncodable, UaEnum};

/// Identifier for a request or monitored item, unique per session.
pub type IntegerId = u32;

/// Trait implemented by messages and structures that can appear as the body
/// of an extension object, tying the type to its binary encoding node id.
pub trait MessageInfo {
    /// The object id of the binary encoding of this type.
    fn type_id(&self) -> ObjectId;
}

/// Newtype over [`NodeId`] for session authentication tokens, so they cannot
/// be confused with an address-space node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AuthenticationToken(pub NodeId);

impl AuthenticationToken {
    /// Get the wire representation of this token.
    pub fn as_node_id(&self) -> &NodeId {
        &self.0
    }
}

impl From<NodeId> for AuthenticationToken {
    fn from(value: NodeId) -> Self {
        Self(value)
    }
}
