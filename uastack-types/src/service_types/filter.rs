// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    DataChangeTrigger, DiagnosticInfo, ExtensionObject, FilterOperator, MessageInfo, NodeId,
    ObjectId, QualifiedName, StatusCode, UAString, Variant,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// Filter passing data changes through based on trigger and deadband.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DataChangeFilter {
    /// What kinds of change trigger a notification.
    pub trigger: DataChangeTrigger,
    /// Deadband type, one of [`crate::DeadbandType`] as a u32.
    pub deadband_type: u32,
    /// Deadband value; absolute difference or percent of the EU range.
    pub deadband_value: f64,
}

impl MessageInfo for DataChangeFilter {
    fn type_id(&self) -> ObjectId {
        ObjectId::DataChangeFilter_Encoding_DefaultBinary
    }
}

/// Operand referencing another element of the same content filter.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ElementOperand {
    /// Index of the referenced element in the filter's element array.
    pub index: u32,
}

impl MessageInfo for ElementOperand {
    fn type_id(&self) -> ObjectId {
        ObjectId::ElementOperand_Encoding_DefaultBinary
    }
}

/// Literal value operand.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct LiteralOperand {
    /// The literal value.
    pub value: Variant,
}

impl MessageInfo for LiteralOperand {
    fn type_id(&self) -> ObjectId {
        ObjectId::LiteralOperand_Encoding_DefaultBinary
    }
}

/// Operand selecting an attribute of a node relative to a type definition,
/// also used as an event select clause.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SimpleAttributeOperand {
    /// The type definition the browse path starts at.
    pub type_definition_id: NodeId,
    /// Browse path from the type to the target node.
    pub browse_path: Option<Vec<QualifiedName>>,
    /// The attribute to select.
    pub attribute_id: u32,
    /// Index range into array values, text form.
    pub index_range: UAString,
}

impl MessageInfo for SimpleAttributeOperand {
    fn type_id(&self) -> ObjectId {
        ObjectId::SimpleAttributeOperand_Encoding_DefaultBinary
    }
}

/// One element of a content filter: an operator and its operands.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ContentFilterElement {
    /// The operator.
    pub filter_operator: FilterOperator,
    /// The operands, each an ElementOperand, LiteralOperand or
    /// SimpleAttributeOperand wrapped in an extension object.
    pub filter_operands: Option<Vec<ExtensionObject>>,
}

impl MessageInfo for ContentFilterElement {
    fn type_id(&self) -> ObjectId {
        ObjectId::ContentFilterElement_Encoding_DefaultBinary
    }
}

/// A where-clause: a list of elements forming an expression tree, with
/// element 0 as the root.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ContentFilter {
    /// The elements of the filter.
    pub elements: Option<Vec<ContentFilterElement>>,
}

impl MessageInfo for ContentFilter {
    fn type_id(&self) -> ObjectId {
        ObjectId::ContentFilter_Encoding_DefaultBinary
    }
}

/// Filter applied to event monitored items: which fields to select and
/// which events to include.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct EventFilter {
    /// The event fields to return, one per select clause.
    pub select_clauses: Option<Vec<SimpleAttributeOperand>>,
    /// The events to include.
    pub where_clause: ContentFilter,
}

impl MessageInfo for EventFilter {
    fn type_id(&self) -> ObjectId {
        ObjectId::EventFilter_Encoding_DefaultBinary
    }
}

/// Validation result for one content filter element.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ContentFilterElementResult {
    /// Status of the element as a whole.
    pub status_code: StatusCode,
    /// One status per operand.
    pub operand_status_codes: Option<Vec<StatusCode>>,
    /// Diagnostics for the operands.
    pub operand_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

/// Validation result for a content filter.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ContentFilterResult {
    /// One result per element.
    pub element_results: Option<Vec<ContentFilterElementResult>>,
    /// Diagnostics for the elements.
    pub element_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

/// Validation result for an event filter, returned when a monitored item
/// with an event filter is created.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct EventFilterResult {
    /// One status per select clause; failed clauses are dropped from the
    /// filter but do not fail the item.
    pub select_clause_results: Option<Vec<StatusCode>>,
    /// Diagnostics for the select clauses.
    pub select_clause_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    /// Validation result of the where clause.
    pub where_clause_result: ContentFilterResult,
}

impl MessageInfo for EventFilterResult {
    fn type_id(&self) -> ObjectId {
        ObjectId::EventFilterResult_Encoding_DefaultBinary
    }
}
