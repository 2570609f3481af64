// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The Call service. Synchronous methods run inline on the service loop;
//! methods marked async are queued for worker threads and answered when the
//! aggregated response completes.

use log::debug;

use uastack_core::ResponseMessage;
use uastack_nodes::NodeType;
use uastack_types::{
    Argument, CallMethodRequest, CallMethodResult, CallRequest, CallResponse, ContextOwned,
    NodeId, NumericRange, ObjectId, ReferenceTypeId, ResponseHeader, StatusCode,
    TimestampsToReturn, Variant,
};

use crate::{address_space::is_value_compatible, server::ServerState};

use super::{ChannelInfo, HandleResult, ResolvedSession};

pub(crate) fn call(
    state: &mut ServerState,
    channel: &ChannelInfo,
    session: &ResolvedSession,
    request: &CallRequest,
    request_id: u32,
) -> HandleResult {
    let methods_to_call = request.methods_to_call.as_deref().unwrap_or(&[]);
    if methods_to_call.is_empty() {
        return HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            StatusCode::BadNothingToDo,
        ));
    }
    if methods_to_call.len() > state.info.config.limits.max_nodes_per_method_call {
        return HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            StatusCode::BadTooManyOperations,
        ));
    }

    // Partition into inline results and async operations.
    let mut any_async = false;
    let calls: Vec<Result<CallMethodResult, CallMethodRequest>> = methods_to_call
        .iter()
        .map(|op| {
            if is_async_method(state, &op.method_id) {
                any_async = true;
                Err(op.clone())
            } else {
                Ok(call_method(state, op))
            }
        })
        .collect();

    if !any_async {
        let results = calls
            .into_iter()
            .map(|c| {
                c.unwrap_or_else(|_| CallMethodResult {
                    status_code: StatusCode::BadInternalError,
                    ..Default::default()
                })
            })
            .collect();
        return HandleResult::Response(
            CallResponse {
                response_header: ResponseHeader::new_good(&request.request_header),
                results: Some(results),
                diagnostic_infos: None,
            }
            .into(),
        );
    }

    // Queue the async portion; the response is produced when the countdown
    // completes or operations time out.
    match state.async_ops.enqueue_call(
        request_id,
        request.request_header.request_handle,
        channel.secure_channel_id,
        &session.session_id,
        calls,
    ) {
        Ok(()) => {
            state.wake_workers();
            HandleResult::Deferred
        }
        Err(status) => HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            status,
        )),
    }
}

fn is_async_method(state: &ServerState, method_id: &NodeId) -> bool {
    matches!(
        state.address_space.find_node(method_id),
        Some(NodeType::Method(method)) if method.is_async()
    )
}

/// Execute one method call synchronously against the address space. Also
/// used by workers through [`sync_method_call`] when no async handler is
/// registered.
pub(crate) fn call_method(state: &mut ServerState, op: &CallMethodRequest) -> CallMethodResult {
    let failure = |status| CallMethodResult {
        status_code: status,
        ..Default::default()
    };

    if !state.address_space.node_exists(&op.object_id) {
        return failure(StatusCode::BadNodeIdUnknown);
    }

    // The method must be a component of the object, through HasComponent or
    // a subtype of it.
    let has_component: NodeId = ReferenceTypeId::HasComponent.into();
    let reachable = state
        .address_space
        .find_references(
            &op.object_id,
            Some((has_component, true)),
            uastack_types::BrowseDirection::Forward,
        )
        .any(|r| r.target_node == &op.method_id);
    if !reachable {
        debug!(
            "Method {} is not a component of object {}",
            op.method_id, op.object_id
        );
        return failure(StatusCode::BadMethodInvalid);
    }

    // Type-check the inputs against the InputArguments property.
    let inputs = op.input_arguments.as_deref().unwrap_or(&[]);
    let (executable, input_results) = {
        let Some(NodeType::Method(method)) = state.address_space.find_node(&op.method_id) else {
            return failure(StatusCode::BadMethodInvalid);
        };
        let executable = method.user_executable();
        let arguments = input_arguments_of(state, &op.method_id);
        let input_results = match arguments {
            Some(arguments) => match check_input_arguments(state, inputs, &arguments) {
                Ok(results) => results,
                Err(status) => return failure(status),
            },
            None => Vec::new(),
        };
        (executable, input_results)
    };
    if !executable {
        return failure(StatusCode::BadNotExecutable);
    }
    if input_results.iter().any(|s: &StatusCode| s.is_bad()) {
        return CallMethodResult {
            status_code: StatusCode::BadInvalidArgument,
            input_argument_results: Some(input_results),
            ..Default::default()
        };
    }

    // Invoke with the store borrowed mutably; the callback owns no locks.
    let object_id = op.object_id.clone();
    let outputs = {
        let Some(NodeType::Method(method)) = state.address_space.find_node_mut(&op.method_id)
        else {
            return failure(StatusCode::BadMethodInvalid);
        };
        method.invoke(&object_id, inputs)
    };
    match outputs {
        Ok(output_arguments) => CallMethodResult {
            status_code: StatusCode::Good,
            input_argument_results: if input_results.is_empty() {
                None
            } else {
                Some(input_results)
            },
            input_argument_diagnostic_infos: None,
            output_arguments: Some(output_arguments),
        },
        Err(status) => failure(status),
    }
}

/// Entry point for worker threads when the server has no dedicated async
/// handler: run the method against the state under the service lock.
pub fn sync_method_call(state: &mut ServerState, op: &CallMethodRequest) -> CallMethodResult {
    call_method(state, op)
}

// The InputArguments property of the method, decoded from its value.
fn input_arguments_of(state: &ServerState, method_id: &NodeId) -> Option<Vec<Argument>> {
    let property = state
        .address_space
        .find_child_by_browse_name(method_id, &"InputArguments".into())?;
    let NodeType::Variable(variable) = property else {
        return None;
    };
    let value = variable
        .value(TimestampsToReturn::Neither, &NumericRange::None)
        .value?;
    let Variant::Array(array) = value else {
        return None;
    };
    let ctx_owned = ContextOwned::new_default();
    let ctx = ctx_owned.context();
    let arguments = array
        .values
        .iter()
        .filter_map(|v| match v {
            Variant::ExtensionObject(obj)
                if obj.node_id == NodeId::from(ObjectId::Argument_Encoding_DefaultBinary) =>
            {
                obj.decode_inner::<Argument>(&ctx).ok()
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    Some(arguments)
}

fn check_input_arguments(
    state: &ServerState,
    inputs: &[Variant],
    arguments: &[Argument],
) -> Result<Vec<StatusCode>, StatusCode> {
    if inputs.len() < arguments.len() {
        return Err(StatusCode::BadArgumentsMissing);
    }
    if inputs.len() > arguments.len() {
        return Err(StatusCode::BadTooManyArguments);
    }
    let tree = state.address_space.type_tree();
    Ok(inputs
        .iter()
        .zip(arguments.iter())
        .map(|(input, argument)| {
            if is_value_compatible(
                input,
                &argument.data_type,
                argument.value_rank,
                argument.array_dimensions.as_ref(),
                tree,
            ) {
                StatusCode::Good
            } else {
                StatusCode::BadTypeMismatch
            }
        })
        .collect())
}
