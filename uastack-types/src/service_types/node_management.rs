// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    DiagnosticInfo, ExpandedNodeId, ExtensionObject, LocalizedText, MessageInfo, NodeClass,
    NodeId, ObjectId, QualifiedName, RequestHeader, ResponseHeader, StatusCode, UAString, Variant,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

bitflags::bitflags! {
    /// Which fields of a node attributes structure carry a value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AttributesMask: u32 {
        /// AccessLevel is set.
        const ACCESS_LEVEL = 1;
        /// ArrayDimensions is set.
        const ARRAY_DIMENSIONS = 1 << 1;
        /// ContainsNoLoops is set.
        const CONTAINS_NO_LOOPS = 1 << 3;
        /// DataType is set.
        const DATA_TYPE = 1 << 4;
        /// Description is set.
        const DESCRIPTION = 1 << 5;
        /// DisplayName is set.
        const DISPLAY_NAME = 1 << 6;
        /// EventNotifier is set.
        const EVENT_NOTIFIER = 1 << 7;
        /// Executable is set.
        const EXECUTABLE = 1 << 8;
        /// Historizing is set.
        const HISTORIZING = 1 << 9;
        /// InverseName is set.
        const INVERSE_NAME = 1 << 10;
        /// IsAbstract is set.
        const IS_ABSTRACT = 1 << 11;
        /// MinimumSamplingInterval is set.
        const MINIMUM_SAMPLING_INTERVAL = 1 << 12;
        /// Symmetric is set.
        const SYMMETRIC = 1 << 15;
        /// UserAccessLevel is set.
        const USER_ACCESS_LEVEL = 1 << 16;
        /// UserExecutable is set.
        const USER_EXECUTABLE = 1 << 17;
        /// UserWriteMask is set.
        const USER_WRITE_MASK = 1 << 18;
        /// ValueRank is set.
        const VALUE_RANK = 1 << 19;
        /// WriteMask is set.
        const WRITE_MASK = 1 << 20;
        /// Value is set.
        const VALUE = 1 << 21;
    }
}

/// Attributes of an object node, for AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ObjectAttributes {
    /// Mask of the fields that carry a value.
    pub specified_attributes: u32,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Write mask.
    pub write_mask: u32,
    /// User write mask.
    pub user_write_mask: u32,
    /// Event notifier byte.
    pub event_notifier: u8,
}

impl MessageInfo for ObjectAttributes {
    fn type_id(&self) -> ObjectId {
        ObjectId::ObjectAttributes_Encoding_DefaultBinary
    }
}

/// Attributes of a variable node, for AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct VariableAttributes {
    /// Mask of the fields that carry a value.
    pub specified_attributes: u32,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Write mask.
    pub write_mask: u32,
    /// User write mask.
    pub user_write_mask: u32,
    /// Initial value.
    pub value: Variant,
    /// Data type of the value.
    pub data_type: NodeId,
    /// Value rank.
    pub value_rank: i32,
    /// Array dimensions.
    pub array_dimensions: Option<Vec<u32>>,
    /// Access level byte.
    pub access_level: u8,
    /// User access level byte.
    pub user_access_level: u8,
    /// Minimum sampling interval in milliseconds.
    pub minimum_sampling_interval: f64,
    /// Whether the server archives the value.
    pub historizing: bool,
}

impl MessageInfo for VariableAttributes {
    fn type_id(&self) -> ObjectId {
        ObjectId::VariableAttributes_Encoding_DefaultBinary
    }
}

/// Attributes of a method node, for AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MethodAttributes {
    /// Mask of the fields that carry a value.
    pub specified_attributes: u32,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Write mask.
    pub write_mask: u32,
    /// User write mask.
    pub user_write_mask: u32,
    /// Whether the method can be called.
    pub executable: bool,
    /// Whether the method can be called by the current user.
    pub user_executable: bool,
}

impl MessageInfo for MethodAttributes {
    fn type_id(&self) -> ObjectId {
        ObjectId::MethodAttributes_Encoding_DefaultBinary
    }
}

/// Attributes of an object type node, for AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ObjectTypeAttributes {
    /// Mask of the fields that carry a value.
    pub specified_attributes: u32,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Write mask.
    pub write_mask: u32,
    /// User write mask.
    pub user_write_mask: u32,
    /// Whether the type is abstract.
    pub is_abstract: bool,
}

impl MessageInfo for ObjectTypeAttributes {
    fn type_id(&self) -> ObjectId {
        ObjectId::ObjectTypeAttributes_Encoding_DefaultBinary
    }
}

/// Attributes of a variable type node, for AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct VariableTypeAttributes {
    /// Mask of the fields that carry a value.
    pub specified_attributes: u32,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Write mask.
    pub write_mask: u32,
    /// User write mask.
    pub user_write_mask: u32,
    /// Default value of instances.
    pub value: Variant,
    /// Data type of the value.
    pub data_type: NodeId,
    /// Value rank.
    pub value_rank: i32,
    /// Array dimensions.
    pub array_dimensions: Option<Vec<u32>>,
    /// Whether the type is abstract.
    pub is_abstract: bool,
}

impl MessageInfo for VariableTypeAttributes {
    fn type_id(&self) -> ObjectId {
        ObjectId::VariableTypeAttributes_Encoding_DefaultBinary
    }
}

/// Attributes of a reference type node, for AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ReferenceTypeAttributes {
    /// Mask of the fields that carry a value.
    pub specified_attributes: u32,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Write mask.
    pub write_mask: u32,
    /// User write mask.
    pub user_write_mask: u32,
    /// Whether the type is abstract.
    pub is_abstract: bool,
    /// Whether the reference is symmetric.
    pub symmetric: bool,
    /// Name of the inverse direction.
    pub inverse_name: LocalizedText,
}

impl MessageInfo for ReferenceTypeAttributes {
    fn type_id(&self) -> ObjectId {
        ObjectId::ReferenceTypeAttributes_Encoding_DefaultBinary
    }
}

/// Attributes of a data type node, for AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DataTypeAttributes {
    /// Mask of the fields that carry a value.
    pub specified_attributes: u32,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Write mask.
    pub write_mask: u32,
    /// User write mask.
    pub user_write_mask: u32,
    /// Whether the type is abstract.
    pub is_abstract: bool,
}

impl MessageInfo for DataTypeAttributes {
    fn type_id(&self) -> ObjectId {
        ObjectId::DataTypeAttributes_Encoding_DefaultBinary
    }
}

/// Attributes of a view node, for AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ViewAttributes {
    /// Mask of the fields that carry a value.
    pub specified_attributes: u32,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Write mask.
    pub write_mask: u32,
    /// User write mask.
    pub user_write_mask: u32,
    /// Whether the view contains loops.
    pub contains_no_loops: bool,
    /// Event notifier byte.
    pub event_notifier: u8,
}

impl MessageInfo for ViewAttributes {
    fn type_id(&self) -> ObjectId {
        ObjectId::ViewAttributes_Encoding_DefaultBinary
    }
}

/// One node to add.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AddNodesItem {
    /// The parent the new node hangs off.
    pub parent_node_id: ExpandedNodeId,
    /// The reference type between parent and new node.
    pub reference_type_id: NodeId,
    /// The requested id, null to let the server assign one.
    pub requested_new_node_id: ExpandedNodeId,
    /// Browse name of the new node.
    pub browse_name: QualifiedName,
    /// Class of the new node.
    pub node_class: NodeClass,
    /// Class-specific attributes, one of the `*Attributes` structures.
    pub node_attributes: ExtensionObject,
    /// Type definition for object and variable nodes.
    pub type_definition: ExpandedNodeId,
}

/// Result of one AddNodes operation.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AddNodesResult {
    /// Status of the operation.
    pub status_code: StatusCode,
    /// The id of the added node, null on failure.
    pub added_node_id: NodeId,
}

/// Request to add nodes to the address space.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AddNodesRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The nodes to add.
    pub nodes_to_add: Option<Vec<AddNodesItem>>,
}

impl MessageInfo for AddNodesRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::AddNodesRequest_Encoding_DefaultBinary
    }
}

/// Response to AddNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AddNodesResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One result per added node in request order.
    pub results: Option<Vec<AddNodesResult>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for AddNodesResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::AddNodesResponse_Encoding_DefaultBinary
    }
}

/// One reference to add.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AddReferencesItem {
    /// Source node of the reference.
    pub source_node_id: NodeId,
    /// The reference type.
    pub reference_type_id: NodeId,
    /// Direction of the reference.
    pub is_forward: bool,
    /// Uri of the target server for remote references.
    pub target_server_uri: UAString,
    /// Target node of the reference.
    pub target_node_id: ExpandedNodeId,
    /// Class of the target node, for validation.
    pub target_node_class: NodeClass,
}

/// Request to add references between nodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AddReferencesRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The references to add.
    pub references_to_add: Option<Vec<AddReferencesItem>>,
}

impl MessageInfo for AddReferencesRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::AddReferencesRequest_Encoding_DefaultBinary
    }
}

/// Response to AddReferences.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AddReferencesResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One status per reference in request order.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for AddReferencesResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::AddReferencesResponse_Encoding_DefaultBinary
    }
}

/// One node to delete.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteNodesItem {
    /// The node to delete.
    pub node_id: NodeId,
    /// Delete references pointing at the node as well.
    pub delete_target_references: bool,
}

/// Request to delete nodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteNodesRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The nodes to delete.
    pub nodes_to_delete: Option<Vec<DeleteNodesItem>>,
}

impl MessageInfo for DeleteNodesRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::DeleteNodesRequest_Encoding_DefaultBinary
    }
}

/// Response to DeleteNodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteNodesResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One status per node in request order.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for DeleteNodesResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::DeleteNodesResponse_Encoding_DefaultBinary
    }
}

/// One reference to delete.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteReferencesItem {
    /// Source node of the reference.
    pub source_node_id: NodeId,
    /// The reference type.
    pub reference_type_id: NodeId,
    /// Direction of the reference.
    pub is_forward: bool,
    /// Target node of the reference.
    pub target_node_id: ExpandedNodeId,
    /// Delete the inverse reference as well.
    pub delete_bidirectional: bool,
}

/// Request to delete references.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteReferencesRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The references to delete.
    pub references_to_delete: Option<Vec<DeleteReferencesItem>>,
}

impl MessageInfo for DeleteReferencesRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::DeleteReferencesRequest_Encoding_DefaultBinary
    }
}

/// Response to DeleteReferences.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteReferencesResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One status per reference in request order.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for DeleteReferencesResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::DeleteReferencesResponse_Encoding_DefaultBinary
    }
}
