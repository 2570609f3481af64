// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The subscription and monitored item service sets.

use std::time::{Duration, Instant};

use log::debug;

use uastack_core::ResponseMessage;
use uastack_types::{
    AttributeId, Context, CreateMonitoredItemsRequest, CreateMonitoredItemsResponse,
    CreateSubscriptionRequest, CreateSubscriptionResponse, DataChangeFilter, DeadbandType,
    DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse, DeleteSubscriptionsRequest,
    DeleteSubscriptionsResponse, ExtensionObject, MonitoredItemCreateRequest,
    MonitoredItemCreateResult, NumericRange, ObjectId, PublishRequest, RepublishRequest,
    RepublishResponse, ResponseHeader, SetPublishingModeRequest, SetPublishingModeResponse,
    StatusCode,
};

use crate::{
    server::ServerState,
    session::QueuedPublish,
    subscriptions::{validate_event_filter, ItemFilter, MonitoredItem},
};

use super::{ChannelInfo, HandleResult, ResolvedSession};

pub(crate) fn create_subscription(
    state: &mut ServerState,
    session: &ResolvedSession,
    request: &CreateSubscriptionRequest,
) -> Result<ResponseMessage, StatusCode> {
    if state.subscriptions.count_for_session(&session.session_id)
        >= state.info.config.limits.max_subscriptions_per_session
    {
        return Err(StatusCode::BadTooManySubscriptions);
    }

    let subscription = state
        .subscriptions
        .create(session.session_id.clone(), Instant::now());
    subscription.set_parameters(
        request.requested_publishing_interval,
        request.requested_lifetime_count,
        request.requested_max_keep_alive_count,
        request.max_notifications_per_publish,
        request.priority,
    );
    subscription.publishing_enabled = request.publishing_enabled;
    let response = CreateSubscriptionResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        subscription_id: subscription.id,
        revised_publishing_interval: subscription.publishing_interval,
        revised_lifetime_count: subscription.lifetime_count,
        revised_max_keep_alive_count: subscription.keep_alive_count,
    };
    state.wake_tick();
    Ok(response.into())
}

pub(crate) fn set_publishing_mode(
    state: &mut ServerState,
    session: &ResolvedSession,
    request: &SetPublishingModeRequest,
) -> Result<ResponseMessage, StatusCode> {
    let ids = request.subscription_ids.as_deref().unwrap_or(&[]);
    if ids.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    let results = ids
        .iter()
        .map(|id| {
            match state
                .subscriptions
                .get_for_session(*id, &session.session_id)
            {
                Ok(subscription) => {
                    subscription.publishing_enabled = request.publishing_enabled;
                    StatusCode::Good
                }
                Err(status) => status,
            }
        })
        .collect();
    Ok(SetPublishingModeResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

pub(crate) fn delete_subscriptions(
    state: &mut ServerState,
    session: &ResolvedSession,
    request: &DeleteSubscriptionsRequest,
) -> Result<ResponseMessage, StatusCode> {
    let ids = request.subscription_ids.as_deref().unwrap_or(&[]);
    if ids.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    let results = ids
        .iter()
        .map(|id| {
            match state
                .subscriptions
                .get_for_session(*id, &session.session_id)
            {
                Ok(_) => {
                    state.subscriptions.remove(*id);
                    StatusCode::Good
                }
                Err(status) => status,
            }
        })
        .collect();
    Ok(DeleteSubscriptionsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

pub(crate) fn create_monitored_items(
    state: &mut ServerState,
    session: &ResolvedSession,
    request: &CreateMonitoredItemsRequest,
    ctx: &Context<'_>,
) -> Result<ResponseMessage, StatusCode> {
    let items_to_create = request.items_to_create.as_deref().unwrap_or(&[]);
    if items_to_create.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    let limits = &state.info.config.limits;
    let max_items = limits.max_monitored_items_per_subscription;

    // Validate filters against the address space before borrowing the
    // subscription mutably.
    let prepared: Vec<Result<(MonitoredItem, ExtensionObject), StatusCode>> = items_to_create
        .iter()
        .map(|op| prepare_item(state, op, ctx))
        .collect();

    let subscription = state
        .subscriptions
        .get_for_session(request.subscription_id, &session.session_id)?;

    let results = prepared
        .into_iter()
        .map(|prepared| match prepared {
            Ok((item, filter_result)) => {
                if subscription.len() >= max_items {
                    return MonitoredItemCreateResult {
                        status_code: StatusCode::BadTooManyMonitoredItems,
                        ..Default::default()
                    };
                }
                let revised_sampling_interval = item.sampling_interval;
                let revised_queue_size = item.queue_size as u32;
                let id = subscription.create_item(item);
                MonitoredItemCreateResult {
                    status_code: StatusCode::Good,
                    monitored_item_id: id,
                    revised_sampling_interval,
                    revised_queue_size,
                    filter_result,
                }
            }
            Err(status_code) => MonitoredItemCreateResult {
                status_code,
                ..Default::default()
            },
        })
        .collect();

    state.wake_tick();
    Ok(CreateMonitoredItemsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

// Validate one monitored item creation and build the item.
fn prepare_item(
    state: &ServerState,
    op: &MonitoredItemCreateRequest,
    ctx: &Context<'_>,
) -> Result<(MonitoredItem, ExtensionObject), StatusCode> {
    let attribute_id = AttributeId::try_from(op.item_to_monitor.attribute_id)
        .map_err(|_| StatusCode::BadAttributeIdInvalid)?;
    let index_range = NumericRange::parse(&op.item_to_monitor.index_range)?;
    if !state.address_space.node_exists(&op.item_to_monitor.node_id) {
        return Err(StatusCode::BadNodeIdUnknown);
    }

    // Parse the filter: no filter, a data change filter, or an event filter
    // on the EventNotifier attribute.
    let filter_obj = &op.requested_parameters.filter;
    let mut filter_result = ExtensionObject::null();
    let filter = if filter_obj.is_null() {
        ItemFilter::None
    } else {
        match filter_obj.node_id.as_object_id() {
            Ok(ObjectId::DataChangeFilter_Encoding_DefaultBinary) => {
                let filter: DataChangeFilter = filter_obj
                    .decode_inner(ctx)
                    .map_err(|_| StatusCode::BadMonitoredItemFilterInvalid)?;
                if attribute_id != AttributeId::Value {
                    return Err(StatusCode::BadFilterNotAllowed);
                }
                if filter.deadband_type == DeadbandType::Percent as i32 as u32 {
                    // Percent deadband needs the EU range which this store
                    // does not model.
                    return Err(StatusCode::BadMonitoredItemFilterUnsupported);
                }
                if filter.deadband_type > DeadbandType::Percent as i32 as u32 {
                    return Err(StatusCode::BadDeadbandFilterInvalid);
                }
                ItemFilter::DataChange(filter)
            }
            Ok(ObjectId::EventFilter_Encoding_DefaultBinary) => {
                if attribute_id != AttributeId::EventNotifier {
                    return Err(StatusCode::BadFilterNotAllowed);
                }
                let filter: uastack_types::EventFilter = filter_obj
                    .decode_inner(ctx)
                    .map_err(|_| StatusCode::BadMonitoredItemFilterInvalid)?;
                let (result, validated) =
                    validate_event_filter(&filter, state.address_space.type_tree())?;
                filter_result = ExtensionObject::from_message(&result, ctx);
                ItemFilter::Event(validated)
            }
            _ => {
                debug!("Unknown monitored item filter {}", filter_obj.node_id);
                return Err(StatusCode::BadMonitoredItemFilterUnsupported);
            }
        }
    };

    // Revise the parameters: sampling below 10ms or negative means "use
    // sensible defaults", the queue always holds at least one entry.
    let sampling_interval = if op.requested_parameters.sampling_interval < 0.0 {
        // -1 asks for the publishing interval; sampling happens on the
        // subscription cycle either way.
        0.0
    } else {
        op.requested_parameters.sampling_interval
    };
    let queue_size = (op.requested_parameters.queue_size as usize).max(1);

    let item = MonitoredItem::new(
        0,
        op.requested_parameters.client_handle,
        op.item_to_monitor.node_id.clone(),
        attribute_id,
        index_range,
        op.monitoring_mode,
        sampling_interval,
        queue_size,
        op.requested_parameters.discard_oldest,
        filter,
        Instant::now(),
    );
    Ok((item, filter_result))
}

pub(crate) fn delete_monitored_items(
    state: &mut ServerState,
    session: &ResolvedSession,
    request: &DeleteMonitoredItemsRequest,
) -> Result<ResponseMessage, StatusCode> {
    let ids = request.monitored_item_ids.as_deref().unwrap_or(&[]);
    if ids.is_empty() {
        return Err(StatusCode::BadNothingToDo);
    }
    let subscription = state
        .subscriptions
        .get_for_session(request.subscription_id, &session.session_id)?;
    let results = ids.iter().map(|id| subscription.delete_item(*id)).collect();
    Ok(DeleteMonitoredItemsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into())
}

/// Publish: park the request on the session; a publishing cycle or
/// keep-alive consumes it later. Acknowledgements are applied on the next
/// cycle.
pub(crate) fn publish(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: &PublishRequest,
    request_id: u32,
) -> HandleResult {
    let session = match super::resolve_session(state, channel, &request.request_header) {
        Ok(session) => session,
        Err(status) => {
            return HandleResult::Response(ResponseMessage::service_fault(
                &request.request_header,
                status,
            ))
        }
    };
    if state.subscriptions.count_for_session(&session.session_id) == 0 {
        return HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            StatusCode::BadNoSubscription,
        ));
    }

    let max_queued = state.info.config.limits.max_publish_requests_per_session;
    let timeout_hint = request.request_header.timeout_hint;
    let deadline = if timeout_hint == 0 {
        Instant::now() + Duration::from_secs(60)
    } else {
        Instant::now() + Duration::from_millis(timeout_hint as u64)
    };

    // Apply the acknowledgements now; the results ride along with whatever
    // response eventually consumes this request.
    let results = request.subscription_acknowledgements.as_ref().map(|acks| {
        acks.iter()
            .map(|ack| {
                match state
                    .subscriptions
                    .get_for_session(ack.subscription_id, &session.session_id)
                {
                    Ok(subscription) => subscription.acknowledge(ack.sequence_number),
                    Err(status) => status,
                }
            })
            .collect::<Vec<_>>()
    });

    let Some(session_state) = state.sessions.get_mut(&session.session_id) else {
        return HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            StatusCode::BadSessionIdInvalid,
        ));
    };
    if session_state.publish_queue_len() >= max_queued {
        return HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            StatusCode::BadTooManyPublishRequests,
        ));
    }
    session_state.enqueue_publish(QueuedPublish {
        request_id,
        request_handle: request.request_header.request_handle,
        secure_channel_id: channel.secure_channel_id,
        results,
        deadline,
    });
    state.wake_tick();
    HandleResult::Deferred
}

pub(crate) fn republish(
    state: &mut ServerState,
    session: &ResolvedSession,
    request: &RepublishRequest,
) -> Result<ResponseMessage, StatusCode> {
    let subscription = state
        .subscriptions
        .get_for_session(request.subscription_id, &session.session_id)?;
    let Some(notification_message) = subscription.republish(request.retransmit_sequence_number)
    else {
        return Err(StatusCode::BadMessageNotAvailable);
    };
    Ok(RepublishResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        notification_message,
    }
    .into())
}
