// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Validation and evaluation of event filters.
//!
//! Select clauses are validated individually: an invalid clause is dropped
//! from the installed filter but does not fail the item, its status is
//! reported in the EventFilterResult. The where clause is validated as a
//! whole at install time.

use log::debug;

use uastack_nodes::{DefaultTypeTree, TypeTree};
use uastack_types::{
    ContentFilter, ContentFilterElement, ContentFilterElementResult, ContentFilterResult,
    ElementOperand, EventFilter, EventFilterResult, FilterOperator, LiteralOperand, NodeId,
    ObjectId, ObjectTypeId, QualifiedName, SimpleAttributeOperand, StatusCode, Variant,
};

/// An event as produced by the server application: an event type plus its
/// field values addressed by browse path.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of the event, a subtype of BaseEventType.
    pub event_type: NodeId,
    /// The node that emitted the event.
    pub source_node: NodeId,
    /// Field values by browse path relative to the event type.
    pub fields: Vec<(Vec<QualifiedName>, Variant)>,
}

impl Event {
    /// Create a new event of the given type.
    pub fn new(event_type: impl Into<NodeId>, source_node: impl Into<NodeId>) -> Event {
        Event {
            event_type: event_type.into(),
            source_node: source_node.into(),
            fields: Vec::new(),
        }
    }

    /// Set a field by browse path.
    pub fn set_field(&mut self, path: &[&str], value: impl Into<Variant>) {
        self.fields.push((
            path.iter().map(|p| QualifiedName::new(0, *p)).collect(),
            value.into(),
        ));
    }

    fn field(&self, path: &[QualifiedName]) -> Variant {
        self.fields
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v.clone())
            .unwrap_or(Variant::Empty)
    }
}

/// An event filter that passed validation, with invalid select clauses
/// already removed.
#[derive(Debug)]
pub struct ValidatedEventFilter {
    select_clauses: Vec<SimpleAttributeOperand>,
    where_clause: ContentFilter,
}

impl ValidatedEventFilter {
    /// Number of surviving select clauses.
    pub fn select_len(&self) -> usize {
        self.select_clauses.len()
    }

    /// Evaluate the filter against an event. Returns the selected fields
    /// when the where clause passes.
    pub fn evaluate(&self, event: &Event, type_tree: &DefaultTypeTree) -> Option<Vec<Variant>> {
        let elements = self.where_clause.elements.as_deref().unwrap_or(&[]);
        if !elements.is_empty() && !evaluate_element(elements, 0, event, type_tree) {
            return None;
        }
        Some(
            self.select_clauses
                .iter()
                .map(|clause| {
                    let path = clause.browse_path.clone().unwrap_or_default();
                    event.field(&path)
                })
                .collect(),
        )
    }
}

/// Validate an event filter. Returns the per-clause results to report to
/// the client and the validated filter with failing select clauses removed.
/// A filter whose where clause fails validation is rejected entirely.
pub fn validate_event_filter(
    filter: &EventFilter,
    type_tree: &DefaultTypeTree,
) -> Result<(EventFilterResult, ValidatedEventFilter), StatusCode> {
    let base_event_type: NodeId = ObjectTypeId::BaseEventType.into();

    let clauses = filter.select_clauses.as_deref().unwrap_or(&[]);
    let mut clause_results = Vec::with_capacity(clauses.len());
    let mut valid_clauses = Vec::new();
    for clause in clauses {
        let status = if !type_tree.is_subtype_of(&clause.type_definition_id, &base_event_type) {
            // The select clause refers to something that is not an event type
            StatusCode::BadTypeDefinitionInvalid
        } else if clause.browse_path.as_ref().map(|p| p.is_empty()).unwrap_or(true) {
            StatusCode::BadBrowseNameInvalid
        } else {
            StatusCode::Good
        };
        if status.is_good() {
            valid_clauses.push(clause.clone());
        } else {
            debug!("Dropping invalid select clause: {status}");
        }
        clause_results.push(status);
    }

    let elements = filter.where_clause.elements.as_deref().unwrap_or(&[]);
    let mut element_results = Vec::with_capacity(elements.len());
    let mut where_ok = true;
    for element in elements {
        let result = validate_element(element, elements.len(), type_tree);
        if result.status_code.is_bad() {
            where_ok = false;
        }
        element_results.push(result);
    }

    let result = EventFilterResult {
        select_clause_results: Some(clause_results),
        select_clause_diagnostic_infos: None,
        where_clause_result: ContentFilterResult {
            element_results: Some(element_results),
            element_diagnostic_infos: None,
        },
    };

    if !where_ok {
        return Err(StatusCode::BadEventFilterInvalid);
    }

    Ok((
        result,
        ValidatedEventFilter {
            select_clauses: valid_clauses,
            where_clause: filter.where_clause.clone(),
        },
    ))
}

fn validate_element(
    element: &ContentFilterElement,
    element_count: usize,
    type_tree: &DefaultTypeTree,
) -> ContentFilterElementResult {
    let operands = element.filter_operands.as_deref().unwrap_or(&[]);

    let expected_operands = match element.filter_operator {
        FilterOperator::IsNull | FilterOperator::Not | FilterOperator::OfType => 1,
        FilterOperator::Equals
        | FilterOperator::GreaterThan
        | FilterOperator::LessThan
        | FilterOperator::GreaterThanOrEqual
        | FilterOperator::LessThanOrEqual
        | FilterOperator::Like
        | FilterOperator::And
        | FilterOperator::Or
        | FilterOperator::Cast
        | FilterOperator::BitwiseAnd
        | FilterOperator::BitwiseOr => 2,
        FilterOperator::Between => 3,
        FilterOperator::InList => 2,
        FilterOperator::InView | FilterOperator::RelatedTo => {
            return ContentFilterElementResult {
                status_code: StatusCode::BadFilterOperatorUnsupported,
                operand_status_codes: None,
                operand_diagnostic_infos: None,
            };
        }
    };
    if operands.len() < expected_operands {
        return ContentFilterElementResult {
            status_code: StatusCode::BadFilterOperandCountMismatch,
            operand_status_codes: None,
            operand_diagnostic_infos: None,
        };
    }

    let ctx_owned = uastack_types::ContextOwned::new_default();
    let ctx = ctx_owned.context();
    let mut operand_status = Vec::with_capacity(operands.len());
    for operand in operands {
        let object_id = operand.node_id.as_object_id().ok();
        let status = match object_id {
            Some(ObjectId::ElementOperand_Encoding_DefaultBinary) => {
                match operand.decode_inner::<ElementOperand>(&ctx) {
                    Ok(op) if (op.index as usize) < element_count => StatusCode::Good,
                    Ok(_) => StatusCode::BadIndexRangeInvalid,
                    Err(_) => StatusCode::BadFilterOperandInvalid,
                }
            }
            Some(ObjectId::LiteralOperand_Encoding_DefaultBinary) => {
                match operand.decode_inner::<LiteralOperand>(&ctx) {
                    Ok(op) => {
                        if element.filter_operator == FilterOperator::OfType {
                            // OfType requires a node id of an event subtype
                            match &op.value {
                                Variant::NodeId(id)
                                    if type_tree.is_subtype_of(
                                        id,
                                        &ObjectTypeId::BaseEventType.into(),
                                    ) =>
                                {
                                    StatusCode::Good
                                }
                                _ => StatusCode::BadFilterOperandInvalid,
                            }
                        } else {
                            StatusCode::Good
                        }
                    }
                    Err(_) => StatusCode::BadFilterOperandInvalid,
                }
            }
            Some(ObjectId::SimpleAttributeOperand_Encoding_DefaultBinary) => StatusCode::Good,
            _ => StatusCode::BadFilterOperandInvalid,
        };
        operand_status.push(status);
    }

    let status_code = if operand_status.iter().any(|s| s.is_bad()) {
        StatusCode::BadFilterOperandInvalid
    } else {
        StatusCode::Good
    };
    ContentFilterElementResult {
        status_code,
        operand_status_codes: Some(operand_status),
        operand_diagnostic_infos: None,
    }
}

// Recursive evaluation of one element of the where clause.
fn evaluate_element(
    elements: &[ContentFilterElement],
    index: usize,
    event: &Event,
    type_tree: &DefaultTypeTree,
) -> bool {
    let Some(element) = elements.get(index) else {
        return false;
    };
    let operands = element.filter_operands.as_deref().unwrap_or(&[]);
    let ctx_owned = uastack_types::ContextOwned::new_default();
    let ctx = ctx_owned.context();

    let value_of = |operand: &uastack_types::ExtensionObject| -> Option<Variant> {
        match operand.node_id.as_object_id().ok()? {
            ObjectId::LiteralOperand_Encoding_DefaultBinary => operand
                .decode_inner::<LiteralOperand>(&ctx)
                .ok()
                .map(|op| op.value),
            ObjectId::SimpleAttributeOperand_Encoding_DefaultBinary => operand
                .decode_inner::<SimpleAttributeOperand>(&ctx)
                .ok()
                .map(|op| event.field(&op.browse_path.unwrap_or_default())),
            _ => None,
        }
    };

    let truth_of = |operand: &uastack_types::ExtensionObject| -> bool {
        match operand.node_id.as_object_id().ok() {
            Some(ObjectId::ElementOperand_Encoding_DefaultBinary) => operand
                .decode_inner::<ElementOperand>(&ctx)
                .ok()
                .map(|op| evaluate_element(elements, op.index as usize, event, type_tree))
                .unwrap_or(false),
            _ => matches!(value_of(operand), Some(Variant::Boolean(true))),
        }
    };

    match element.filter_operator {
        FilterOperator::OfType => {
            let Some(Variant::NodeId(type_id)) = operands.first().and_then(value_of) else {
                return false;
            };
            type_tree.is_subtype_of(&event.event_type, &type_id)
        }
        FilterOperator::Equals => match (
            operands.first().and_then(value_of),
            operands.get(1).and_then(value_of),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        FilterOperator::IsNull => {
            matches!(operands.first().and_then(value_of), Some(Variant::Empty) | None)
        }
        FilterOperator::GreaterThan | FilterOperator::LessThan
        | FilterOperator::GreaterThanOrEqual | FilterOperator::LessThanOrEqual => {
            let (Some(a), Some(b)) = (
                operands.first().and_then(value_of).as_ref().and_then(variant_as_f64),
                operands.get(1).and_then(value_of).as_ref().and_then(variant_as_f64),
            ) else {
                return false;
            };
            match element.filter_operator {
                FilterOperator::GreaterThan => a > b,
                FilterOperator::LessThan => a < b,
                FilterOperator::GreaterThanOrEqual => a >= b,
                _ => a <= b,
            }
        }
        FilterOperator::Not => operands.first().map(|o| !truth_of(o)).unwrap_or(false),
        FilterOperator::And => {
            operands.len() >= 2 && truth_of(&operands[0]) && truth_of(&operands[1])
        }
        FilterOperator::Or => {
            operands.len() >= 2 && (truth_of(&operands[0]) || truth_of(&operands[1]))
        }
        _ => false,
    }
}

fn variant_as_f64(value: &Variant) -> Option<f64> {
    match value {
        Variant::SByte(v) => Some(*v as f64),
        Variant::Byte(v) => Some(*v as f64),
        Variant::Int16(v) => Some(*v as f64),
        Variant::UInt16(v) => Some(*v as f64),
        Variant::Int32(v) => Some(*v as f64),
        Variant::UInt32(v) => Some(*v as f64),
        Variant::Int64(v) => Some(*v as f64),
        Variant::UInt64(v) => Some(*v as f64),
        Variant::Float(v) => Some(*v as f64),
        Variant::Double(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_space::{load_core_namespace, AddressSpace};
    use uastack_types::{ContextOwned, DataTypeId, ExtensionObject};

    fn type_tree() -> DefaultTypeTree {
        let mut space = AddressSpace::new();
        load_core_namespace(&mut space);
        std::mem::take(space.type_tree_mut())
    }

    fn select(type_def: impl Into<NodeId>, path: &[&str]) -> SimpleAttributeOperand {
        SimpleAttributeOperand {
            type_definition_id: type_def.into(),
            browse_path: Some(path.iter().map(|p| QualifiedName::new(0, *p)).collect()),
            attribute_id: uastack_types::AttributeId::Value as u32,
            index_range: Default::default(),
        }
    }

    #[test]
    fn select_clause_with_non_event_type_is_dropped() {
        let tree = type_tree();
        let filter = EventFilter {
            select_clauses: Some(vec![
                select(ObjectTypeId::BaseEventType, &["Message"]),
                // Number is not an event type
                select(DataTypeId::Number, &["Message"]),
            ]),
            where_clause: Default::default(),
        };
        let (result, validated) = validate_event_filter(&filter, &tree).unwrap();
        let statuses = result.select_clause_results.unwrap();
        assert_eq!(statuses[0], StatusCode::Good);
        assert_eq!(statuses[1], StatusCode::BadTypeDefinitionInvalid);
        assert_eq!(validated.select_len(), 1);
    }

    #[test]
    fn of_type_with_non_event_operand_rejected() {
        let tree = type_tree();
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let operand = LiteralOperand {
            value: Variant::from(NodeId::from(DataTypeId::Number)),
        };
        let filter = EventFilter {
            select_clauses: Some(vec![select(ObjectTypeId::BaseEventType, &["Message"])]),
            where_clause: ContentFilter {
                elements: Some(vec![ContentFilterElement {
                    filter_operator: FilterOperator::OfType,
                    filter_operands: Some(vec![ExtensionObject::from_message(&operand, &ctx)]),
                }]),
            },
        };
        let err = validate_event_filter(&filter, &tree).unwrap_err();
        assert_eq!(err, StatusCode::BadEventFilterInvalid);
    }

    #[test]
    fn element_operand_out_of_range_rejected() {
        let tree = type_tree();
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let operand = ElementOperand { index: 5 };
        let filter = EventFilter {
            select_clauses: None,
            where_clause: ContentFilter {
                elements: Some(vec![ContentFilterElement {
                    filter_operator: FilterOperator::Not,
                    filter_operands: Some(vec![ExtensionObject::from_message(&operand, &ctx)]),
                }]),
            },
        };
        let err = validate_event_filter(&filter, &tree);
        assert!(err.is_err());
    }

    #[test]
    fn evaluate_of_type_and_select() {
        let tree = type_tree();
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let operand = LiteralOperand {
            value: Variant::from(NodeId::from(ObjectTypeId::BaseEventType)),
        };
        let filter = EventFilter {
            select_clauses: Some(vec![select(ObjectTypeId::BaseEventType, &["Message"])]),
            where_clause: ContentFilter {
                elements: Some(vec![ContentFilterElement {
                    filter_operator: FilterOperator::OfType,
                    filter_operands: Some(vec![ExtensionObject::from_message(&operand, &ctx)]),
                }]),
            },
        };
        let (_, validated) = validate_event_filter(&filter, &tree).unwrap();

        let mut event = Event::new(ObjectTypeId::BaseEventType, NodeId::new(0, 2253u32));
        event.set_field(&["Message"], "hello");
        let fields = validated.evaluate(&event, &tree).unwrap();
        assert_eq!(fields, vec![Variant::from("hello")]);
    }
}
