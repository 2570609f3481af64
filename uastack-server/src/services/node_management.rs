// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The node management service set: AddNodes, AddReferences, DeleteNodes
//! and DeleteReferences.

use log::debug;

use uastack_core::ResponseMessage;
use uastack_types::{
    AddNodesRequest, AddNodesResponse, AddNodesResult, AddReferencesItem, AddReferencesRequest,
    AddReferencesResponse, Context, DeleteNodesRequest, DeleteNodesResponse,
    DeleteReferencesItem, DeleteReferencesRequest, DeleteReferencesResponse, NodeClass, NodeId,
    ResponseHeader, StatusCode,
};

use crate::{
    address_space::{add_node, AddNodeItem},
    server::ServerState,
};

use super::ResolvedSession;

pub(crate) fn add_nodes(
    state: &mut ServerState,
    _session: &ResolvedSession,
    request: &AddNodesRequest,
    ctx: &Context<'_>,
) -> Result<ResponseMessage, StatusCode> {
    let nodes_to_add = request.nodes_to_add.as_deref().unwrap_or(&[]);
    if nodes_to_add.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    if nodes_to_add.len() > state.info.config.limits.max_nodes_per_node_management {
        return Err(StatusCode::BadTooManyOperations);
    }

    let namespaces = state.encoding_context.read().namespaces().clone();
    let results = nodes_to_add
        .iter()
        .map(|op| {
            // Expanded ids must resolve to this server.
            let Some(parent_node_id) = op.parent_node_id.try_resolve(&namespaces) else {
                return AddNodesResult {
                    status_code: StatusCode::BadParentNodeIdInvalid,
                    added_node_id: NodeId::null(),
                };
            };
            let Some(requested_new_node_id) = op.requested_new_node_id.try_resolve(&namespaces)
            else {
                return AddNodesResult {
                    status_code: StatusCode::BadNodeIdRejected,
                    added_node_id: NodeId::null(),
                };
            };
            let Some(type_definition) = op.type_definition.try_resolve(&namespaces) else {
                return AddNodesResult {
                    status_code: StatusCode::BadTypeDefinitionInvalid,
                    added_node_id: NodeId::null(),
                };
            };
            let item = AddNodeItem {
                parent_node_id,
                reference_type_id: op.reference_type_id.clone(),
                requested_new_node_id,
                browse_name: op.browse_name.clone(),
                node_class: op.node_class,
                node_attributes: op.node_attributes.clone(),
                type_definition,
            };
            match add_node(&mut state.address_space, item, ctx) {
                Ok(added_node_id) => AddNodesResult {
                    status_code: StatusCode::Good,
                    added_node_id,
                },
                Err(status_code) => {
                    debug!("AddNodes operation failed: {status_code}");
                    AddNodesResult {
                        status_code,
                        added_node_id: NodeId::null(),
                    }
                }
            }
        })
        .collect();

    Ok(AddNodesResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

pub(crate) fn add_references(
    state: &mut ServerState,
    _session: &ResolvedSession,
    request: &AddReferencesRequest,
) -> Result<ResponseMessage, StatusCode> {
    let references_to_add = request.references_to_add.as_deref().unwrap_or(&[]);
    if references_to_add.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    if references_to_add.len() > state.info.config.limits.max_nodes_per_node_management {
        return Err(StatusCode::BadTooManyOperations);
    }

    let results = references_to_add
        .iter()
        .map(|op| add_reference(state, op))
        .collect();

    Ok(AddReferencesResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

fn add_reference(state: &mut ServerState, op: &AddReferencesItem) -> StatusCode {
    if !op.target_server_uri.is_null() {
        return StatusCode::BadReferenceLocalOnly;
    }
    let namespaces = state.encoding_context.read().namespaces().clone();
    let Some(target_node_id) = op.target_node_id.try_resolve(&namespaces) else {
        return StatusCode::BadTargetNodeIdInvalid;
    };
    if !state.address_space.node_exists(&op.source_node_id) {
        return StatusCode::BadSourceNodeIdInvalid;
    }
    if !state.address_space.node_exists(&target_node_id) {
        return StatusCode::BadTargetNodeIdInvalid;
    }
    if op.source_node_id == target_node_id {
        return StatusCode::BadInvalidSelfReference;
    }
    use uastack_nodes::TypeTree;
    if state.address_space.type_tree().get_node_class(&op.reference_type_id)
        != Some(NodeClass::ReferenceType)
    {
        return StatusCode::BadReferenceTypeIdInvalid;
    }

    let (source, target) = if op.is_forward {
        (op.source_node_id.clone(), target_node_id)
    } else {
        (target_node_id, op.source_node_id.clone())
    };
    if state
        .address_space
        .has_reference(&source, &target, op.reference_type_id.clone())
    {
        return StatusCode::BadDuplicateReferenceNotAllowed;
    }
    state
        .address_space
        .insert_reference(&source, &target, op.reference_type_id.clone());
    StatusCode::Good
}

pub(crate) fn delete_nodes(
    state: &mut ServerState,
    _session: &ResolvedSession,
    request: &DeleteNodesRequest,
) -> Result<ResponseMessage, StatusCode> {
    let nodes_to_delete = request.nodes_to_delete.as_deref().unwrap_or(&[]);
    if nodes_to_delete.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    if nodes_to_delete.len() > state.info.config.limits.max_nodes_per_node_management {
        return Err(StatusCode::BadTooManyOperations);
    }

    let results = nodes_to_delete
        .iter()
        .map(|op| {
            match state
                .address_space
                .delete_node(&op.node_id, op.delete_target_references)
            {
                Ok(()) => StatusCode::Good,
                Err(status) => status,
            }
        })
        .collect();

    Ok(DeleteNodesResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

pub(crate) fn delete_references(
    state: &mut ServerState,
    _session: &ResolvedSession,
    request: &DeleteReferencesRequest,
) -> Result<ResponseMessage, StatusCode> {
    let references_to_delete = request.references_to_delete.as_deref().unwrap_or(&[]);
    if references_to_delete.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    if references_to_delete.len() > state.info.config.limits.max_nodes_per_node_management {
        return Err(StatusCode::BadTooManyOperations);
    }

    let results = references_to_delete
        .iter()
        .map(|op| delete_reference(state, op))
        .collect();

    Ok(DeleteReferencesResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

fn delete_reference(state: &mut ServerState, op: &DeleteReferencesItem) -> StatusCode {
    let namespaces = state.encoding_context.read().namespaces().clone();
    let Some(target_node_id) = op.target_node_id.try_resolve(&namespaces) else {
        return StatusCode::BadTargetNodeIdInvalid;
    };
    let (source, target) = if op.is_forward {
        (op.source_node_id.clone(), target_node_id)
    } else {
        (target_node_id, op.source_node_id.clone())
    };
    // The store keeps edges bidirectional, so delete_bidirectional only
    // controls whether a one-way deletion is attempted, which this store
    // does not support.
    if !op.delete_bidirectional {
        return StatusCode::BadNotSupported;
    }
    if state
        .address_space
        .delete_reference(&source, &target, op.reference_type_id.clone())
    {
        StatusCode::Good
    } else {
        StatusCode::BadNotFound
    }
}
