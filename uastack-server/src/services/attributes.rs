// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The attribute service set: Read and Write.

use log::debug;

use uastack_core::ResponseMessage;
use uastack_nodes::{AccessLevel, Node, NodeType};
use uastack_types::{
    AttributeId, DataValue, NodeId, NumericRange, ReadRequest, ReadResponse, ReadValueId,
    ResponseHeader, StatusCode, TimestampsToReturn, Variant, WriteRequest, WriteResponse,
    WriteValue,
};

use crate::{
    address_space::validate_value_to_write,
    server::ServerState,
};

use super::ResolvedSession;

pub(crate) fn read(
    state: &mut ServerState,
    _session: &ResolvedSession,
    request: &ReadRequest,
) -> Result<ResponseMessage, StatusCode> {
    let nodes_to_read = request.nodes_to_read.as_deref().unwrap_or(&[]);
    if nodes_to_read.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    if nodes_to_read.len() > state.info.config.limits.max_nodes_per_read {
        return Err(StatusCode::BadTooManyOperations);
    }
    if request.max_age < 0.0 {
        return Err(StatusCode::BadMaxAgeInvalid);
    }
    let timestamps_to_return = request.timestamps_to_return;
    if timestamps_to_return == TimestampsToReturn::Invalid {
        return Err(StatusCode::BadTimestampsToReturnInvalid);
    }

    let results = nodes_to_read
        .iter()
        .map(|op| read_node_value(state, op, timestamps_to_return))
        .collect();

    Ok(ReadResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

fn read_node_value(
    state: &ServerState,
    op: &ReadValueId,
    timestamps_to_return: TimestampsToReturn,
) -> DataValue {
    let Ok(attribute_id) = AttributeId::try_from(op.attribute_id) else {
        return DataValue::new_status_now(StatusCode::BadAttributeIdInvalid);
    };
    let index_range = match NumericRange::parse(&op.index_range) {
        Ok(range) => range,
        Err(status) => return DataValue::new_status_now(status),
    };
    if !op.data_encoding.is_null() && op.data_encoding.name.as_ref() != "Default Binary" {
        return DataValue::new_status_now(StatusCode::BadDataEncodingInvalid);
    }
    let Some(node) = state.address_space.find_node(&op.node_id) else {
        debug!("Read: node {} is unknown", op.node_id);
        return DataValue::new_status_now(StatusCode::BadNodeIdUnknown);
    };

    // The value attribute respects the user access level of the variable.
    if attribute_id == AttributeId::Value {
        if let NodeType::Variable(variable) = node {
            if !variable
                .user_access_level()
                .contains(AccessLevel::CURRENT_READ)
            {
                return DataValue::new_status_now(StatusCode::BadUserAccessDenied);
            }
        }
    }

    match node
        .as_node()
        .get_attribute(timestamps_to_return, attribute_id, &index_range)
    {
        Some(mut value) => {
            if attribute_id != AttributeId::Value {
                // Attribute reads other than the value are always fresh
                value.server_timestamp = Some(uastack_types::DateTime::now());
                value.status.get_or_insert(StatusCode::Good);
            }
            value
        }
        None => DataValue::new_status_now(StatusCode::BadAttributeIdInvalid),
    }
}

pub(crate) fn write(
    state: &mut ServerState,
    _session: &ResolvedSession,
    request: &WriteRequest,
) -> Result<ResponseMessage, StatusCode> {
    let nodes_to_write = request.nodes_to_write.as_deref().unwrap_or(&[]);
    if nodes_to_write.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    if nodes_to_write.len() > state.info.config.limits.max_nodes_per_write {
        return Err(StatusCode::BadTooManyOperations);
    }

    let results = nodes_to_write
        .iter()
        .map(|op| write_node_value(state, op))
        .collect();

    Ok(WriteResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

fn write_node_value(state: &mut ServerState, op: &WriteValue) -> StatusCode {
    let Ok(attribute_id) = AttributeId::try_from(op.attribute_id) else {
        return StatusCode::BadAttributeIdInvalid;
    };
    let index_range = match NumericRange::parse(&op.index_range) {
        Ok(range) => range,
        Err(status) => return status,
    };
    let Some(value) = op.value.value.clone() else {
        return StatusCode::BadNothingToDo;
    };

    if !state.address_space.node_exists(&op.node_id) {
        return StatusCode::BadNodeIdUnknown;
    }

    match attribute_id {
        AttributeId::Value => write_value_attribute(state, &op.node_id, &index_range, op),
        // Writes that alter the variable's declaration must stay compatible
        // with the current value.
        AttributeId::DataType | AttributeId::ValueRank | AttributeId::ArrayDimensions => {
            write_declaration_attribute(state, &op.node_id, attribute_id, value)
        }
        _ => {
            let writable = {
                let Some(node) = state.address_space.find_node(&op.node_id) else {
                    return StatusCode::BadNodeIdUnknown;
                };
                is_attribute_writable(node, attribute_id)
            };
            if !writable {
                return StatusCode::BadNotWritable;
            }
            let Some(node) = state.address_space.find_node_mut(&op.node_id) else {
                return StatusCode::BadNodeIdUnknown;
            };
            match node.as_mut_node().set_attribute(attribute_id, value) {
                Ok(()) => StatusCode::Good,
                Err(status) => status,
            }
        }
    }
}

fn write_value_attribute(
    state: &mut ServerState,
    node_id: &NodeId,
    index_range: &NumericRange,
    op: &WriteValue,
) -> StatusCode {
    // Validate with a shared borrow before mutating; the store is untouched
    // on failure so the node value is unchanged.
    {
        let Some(NodeType::Variable(variable)) = state.address_space.find_node(node_id) else {
            return StatusCode::BadNotWritable;
        };
        if !variable
            .user_access_level()
            .contains(AccessLevel::CURRENT_WRITE)
        {
            return StatusCode::BadUserAccessDenied;
        }
        if let Some(value) = &op.value.value {
            if let Err(status) =
                validate_value_to_write(variable, value, state.address_space.type_tree())
            {
                return status;
            }
        }
    }
    let Some(node) = state.address_space.find_node_mut(node_id) else {
        return StatusCode::BadNodeIdUnknown;
    };
    let Some(variable) = node.as_variable_mut() else {
        return StatusCode::BadNotWritable;
    };
    match variable.set_value(index_range, op.value.clone()) {
        Ok(()) => StatusCode::Good,
        Err(status) => status,
    }
}

fn write_declaration_attribute(
    state: &mut ServerState,
    node_id: &NodeId,
    attribute_id: AttributeId,
    value: Variant,
) -> StatusCode {
    // The new declaration must stay compatible with the current value.
    let compatible = {
        let Some(node) = state.address_space.find_node(node_id) else {
            return StatusCode::BadNotWritable;
        };
        let NodeType::Variable(variable) = node else {
            return StatusCode::BadNotWritable;
        };
        let mask_bit = match attribute_id {
            AttributeId::DataType => uastack_types::WriteMask::DATA_TYPE,
            AttributeId::ValueRank => uastack_types::WriteMask::VALUE_RANK,
            _ => uastack_types::WriteMask::ARRAY_DIMENSIONS,
        };
        use uastack_nodes::NodeBase;
        if !node
            .as_node()
            .user_write_mask()
            .or(node.as_node().write_mask())
            .is_some_and(|m| m.contains(mask_bit))
        {
            return StatusCode::BadNotWritable;
        }
        let current = variable
            .value(TimestampsToReturn::Neither, &NumericRange::None)
            .value
            .unwrap_or_default();
        let tree = state.address_space.type_tree();
        match (attribute_id, &value) {
            (AttributeId::DataType, Variant::NodeId(new_type)) => {
                crate::address_space::is_value_compatible(
                    &current,
                    new_type,
                    variable.value_rank(),
                    variable.array_dimensions(),
                    tree,
                )
            }
            (AttributeId::ValueRank, Variant::Int32(new_rank)) => {
                crate::address_space::is_value_compatible(
                    &current,
                    variable.data_type(),
                    *new_rank,
                    variable.array_dimensions(),
                    tree,
                )
            }
            (AttributeId::ArrayDimensions, _) => {
                // Not supported by this store
                return StatusCode::BadWriteNotSupported;
            }
            _ => return StatusCode::BadTypeMismatch,
        }
    };
    if !compatible {
        return StatusCode::BadTypeMismatch;
    }
    let Some(node) = state.address_space.find_node_mut(node_id) else {
        return StatusCode::BadNodeIdUnknown;
    };
    match node.as_mut_node().set_attribute(attribute_id, value) {
        Ok(()) => StatusCode::Good,
        Err(status) => status,
    }
}

// Non-value attributes are writable when the write mask grants it.
fn is_attribute_writable(node: &NodeType, attribute_id: AttributeId) -> bool {
    use uastack_nodes::NodeBase;
    use uastack_types::WriteMask;
    let Some(mask) = node.as_node().user_write_mask().or(node.as_node().write_mask()) else {
        return false;
    };
    let required = match attribute_id {
        AttributeId::BrowseName => WriteMask::BROWSE_NAME,
        AttributeId::DisplayName => WriteMask::DISPLAY_NAME,
        AttributeId::Description => WriteMask::DESCRIPTION,
        AttributeId::WriteMask => WriteMask::WRITE_MASK,
        AttributeId::UserWriteMask => WriteMask::USER_WRITE_MASK,
        AttributeId::IsAbstract => WriteMask::IS_ABSTRACT,
        AttributeId::Symmetric => WriteMask::SYMMETRIC,
        AttributeId::InverseName => WriteMask::INVERSE_NAME,
        AttributeId::ContainsNoLoops => WriteMask::CONTAINS_NO_LOOPS,
        AttributeId::EventNotifier => WriteMask::EVENT_NOTIFIER,
        AttributeId::AccessLevel => WriteMask::ACCESS_LEVEL,
        AttributeId::UserAccessLevel => WriteMask::USER_ACCESS_LEVEL,
        AttributeId::MinimumSamplingInterval => WriteMask::MINIMUM_SAMPLING_INTERVAL,
        AttributeId::Historizing => WriteMask::HISTORIZING,
        AttributeId::Executable => WriteMask::EXECUTABLE,
        AttributeId::UserExecutable => WriteMask::USER_EXECUTABLE,
        _ => return false,
    };
    mask.contains(required)
}
