// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The subscription engine: subscriptions with their publishing cycle,
//! keep-alive and lifetime counters, the notification retransmission queue,
//! monitored items and event filters.

pub mod event_filter;
mod monitored_item;

pub use event_filter::{validate_event_filter, Event, ValidatedEventFilter};
pub use monitored_item::{ItemFilter, MonitoredItem};

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::{debug, info};

use uastack_core::runtime::CycleMissPolicy;
use uastack_nodes::Node;
use uastack_types::{
    ContextOwned, DataChangeNotification, DateTime, EventFieldList, EventNotificationList,
    ExtensionObject, IntegerId, NodeId, NotificationMessage, StatusCode,
    StatusChangeNotification,
};

use crate::address_space::AddressSpace;

/// Revised bounds on subscription parameters.
const MIN_PUBLISHING_INTERVAL_MS: f64 = 10.0;
const MAX_KEEP_ALIVE_COUNT: u32 = 100;
const DEFAULT_KEEP_ALIVE_COUNT: u32 = 10;
/// The lifetime count must be at least three times the keep alive count.
const LIFETIME_FACTOR: u32 = 3;
/// Size of the retransmission queue per subscription.
const MAX_RETRANSMIT: usize = 32;

/// The outcome of one publishing cycle of a subscription.
pub enum TickResult {
    /// Nothing to send this cycle.
    None,
    /// A message to send through a publish response.
    Message(NotificationMessage),
    /// A keep-alive: an empty message with the next sequence number.
    KeepAlive(NotificationMessage),
    /// The subscription exceeded its lifetime without publish requests and
    /// was closed; inform the client if a request becomes available.
    Terminated,
}

/// A subscription owned by a session.
pub struct Subscription {
    /// Server assigned id, unique within the server.
    pub id: IntegerId,
    /// The owning session.
    pub session_id: NodeId,
    /// Publishing interval in milliseconds.
    pub publishing_interval: f64,
    /// Cycles without a publish request before the subscription dies.
    pub lifetime_count: u32,
    /// Empty cycles before a keep-alive is sent.
    pub keep_alive_count: u32,
    /// Maximum notifications per publish response, 0 for unlimited.
    pub max_notifications_per_publish: usize,
    /// Whether publishing is enabled.
    pub publishing_enabled: bool,
    /// Priority relative to other subscriptions of the session.
    pub priority: u8,
    /// How a late cycle is rescheduled.
    pub cycle_policy: CycleMissPolicy,

    items: HashMap<IntegerId, MonitoredItem>,
    next_item_id: IntegerId,
    next_sequence_number: u32,
    /// Consecutive cycles without a notification, drives keep-alives.
    keep_alive_counter: u32,
    /// Consecutive cycles without an available publish request.
    lifetime_counter: u32,
    /// Whether the subscription missed a publish because no request was
    /// queued.
    late: bool,
    retransmission: VecDeque<(u32, NotificationMessage)>,
    /// When the next publishing cycle is due.
    next_tick: Instant,
    base_time: Instant,
}

impl Subscription {
    fn new(id: IntegerId, session_id: NodeId, now: Instant) -> Subscription {
        Subscription {
            id,
            session_id,
            publishing_interval: 1000.0,
            lifetime_count: DEFAULT_KEEP_ALIVE_COUNT * LIFETIME_FACTOR,
            keep_alive_count: DEFAULT_KEEP_ALIVE_COUNT,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
            cycle_policy: CycleMissPolicy::CurrentTime,
            items: HashMap::new(),
            next_item_id: 1,
            next_sequence_number: 1,
            keep_alive_counter: 0,
            lifetime_counter: 0,
            late: false,
            retransmission: VecDeque::new(),
            next_tick: now,
            base_time: now,
        }
    }

    /// Revise and apply the requested parameters.
    pub fn set_parameters(
        &mut self,
        publishing_interval: f64,
        lifetime_count: u32,
        keep_alive_count: u32,
        max_notifications: u32,
        priority: u8,
    ) {
        self.publishing_interval = if publishing_interval.is_finite() {
            publishing_interval.max(MIN_PUBLISHING_INTERVAL_MS)
        } else {
            MIN_PUBLISHING_INTERVAL_MS
        };
        self.keep_alive_count = keep_alive_count.clamp(1, MAX_KEEP_ALIVE_COUNT);
        self.lifetime_count = lifetime_count.max(self.keep_alive_count * LIFETIME_FACTOR);
        self.max_notifications_per_publish = max_notifications as usize;
        self.priority = priority;
    }

    /// The interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_micros((self.publishing_interval * 1000.0) as u64)
    }

    /// Whether the publishing cycle is due.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_tick
    }

    /// When the subscription ticks next.
    pub fn next_tick(&self) -> Instant {
        self.next_tick
    }

    /// `true` when the subscription missed a publish for lack of requests.
    pub fn is_late(&self) -> bool {
        self.late
    }

    // Reschedule after a cycle, honoring the cycle-miss policy.
    fn reschedule(&mut self, now: Instant) {
        let interval = self.interval();
        self.next_tick = match self.cycle_policy {
            CycleMissPolicy::CurrentTime => now + interval,
            CycleMissPolicy::BaseTime => {
                let elapsed = now.saturating_duration_since(self.base_time);
                let cycles = elapsed.as_nanos() / interval.as_nanos().max(1);
                self.base_time + interval * (cycles as u32 + 1)
            }
        };
    }

    /// Ids of the messages in the retransmission queue.
    pub fn available_sequence_numbers(&self) -> Option<Vec<u32>> {
        if self.retransmission.is_empty() {
            None
        } else {
            Some(self.retransmission.iter().map(|(s, _)| *s).collect())
        }
    }

    /// Acknowledge a sequence number, dropping it from the retransmission
    /// queue.
    pub fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        let before = self.retransmission.len();
        self.retransmission.retain(|(s, _)| *s != sequence_number);
        if self.retransmission.len() != before {
            StatusCode::Good
        } else {
            StatusCode::BadSequenceNumberUnknown
        }
    }

    /// Fetch a message for Republish.
    pub fn republish(&self, sequence_number: u32) -> Option<NotificationMessage> {
        self.retransmission
            .iter()
            .find(|(s, _)| *s == sequence_number)
            .map(|(_, m)| m.clone())
    }

    /// Add a monitored item, returning its id.
    pub fn create_item(&mut self, mut item: MonitoredItem) -> IntegerId {
        let id = self.next_item_id;
        self.next_item_id += 1;
        item.id = id;
        self.items.insert(id, item);
        id
    }

    /// Remove a monitored item.
    pub fn delete_item(&mut self, item_id: IntegerId) -> StatusCode {
        if self.items.remove(&item_id).is_some() {
            StatusCode::Good
        } else {
            StatusCode::BadMonitoredItemIdInvalid
        }
    }

    /// Number of monitored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when the subscription has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Offer an event to every event item of this subscription.
    pub fn notify_event(&mut self, event: &Event, space: &AddressSpace) {
        for item in self.items.values_mut() {
            let fields = match &item.filter {
                ItemFilter::Event(filter) => filter.evaluate(event, space.type_tree()),
                _ => None,
            };
            if let Some(fields) = fields {
                item.notify_event(fields);
            }
        }
    }

    /// Sample every data item that is due.
    pub fn sample(&mut self, now: Instant, space: &AddressSpace) {
        for item in self.items.values_mut() {
            if item.is_event_item() || now < item.next_sample {
                continue;
            }
            let interval = Duration::from_micros((item.sampling_interval * 1000.0) as u64);
            item.next_sample = now + interval;

            let value = match space.find_node(&item.node_id) {
                Some(node) => node
                    .as_node()
                    .get_attribute(
                        uastack_types::TimestampsToReturn::Both,
                        item.attribute_id,
                        &item.index_range,
                    )
                    .unwrap_or_else(|| {
                        uastack_types::DataValue::new_status_now(StatusCode::BadAttributeIdInvalid)
                    }),
                None => uastack_types::DataValue::new_status_now(StatusCode::BadNodeIdUnknown),
            };
            item.sample_value(value);
        }
    }

    /// Run one publishing cycle. `publish_available` says whether the
    /// session has a queued publish request to carry a response.
    pub fn tick(&mut self, now: Instant, publish_available: bool) -> TickResult {
        self.reschedule(now);

        let notifications_pending =
            self.publishing_enabled && self.items.values().any(|i| i.has_notifications());

        if notifications_pending {
            if !publish_available {
                // A notification is ready but no request is queued: the
                // subscription is late and the lifetime counter runs.
                self.late = true;
                return self.count_lifetime();
            }
            self.late = false;
            self.lifetime_counter = 0;
            self.keep_alive_counter = 0;
            let message = self.build_notification_message();
            self.retransmission
                .push_back((message.sequence_number, message.clone()));
            while self.retransmission.len() > MAX_RETRANSMIT {
                self.retransmission.pop_front();
            }
            return TickResult::Message(message);
        }

        // Nothing to publish this cycle. After exactly keep_alive_count
        // empty cycles, the next cycle carries one keep-alive.
        self.keep_alive_counter += 1;
        if self.keep_alive_counter > self.keep_alive_count {
            if publish_available {
                self.keep_alive_counter = 0;
                self.lifetime_counter = 0;
                // A keep-alive carries the *next* sequence number without
                // consuming it.
                return TickResult::KeepAlive(NotificationMessage {
                    sequence_number: self.next_sequence_number,
                    publish_time: DateTime::now(),
                    notification_data: None,
                });
            }
            return self.count_lifetime();
        }
        TickResult::None
    }

    fn count_lifetime(&mut self) -> TickResult {
        self.lifetime_counter += 1;
        if self.lifetime_counter >= self.lifetime_count {
            info!("Subscription {} expired without publish requests", self.id);
            TickResult::Terminated
        } else {
            TickResult::None
        }
    }

    fn build_notification_message(&mut self) -> NotificationMessage {
        let sequence_number = self.next_sequence_number;
        // Sequence numbers wrap at u32::MAX back to 1
        self.next_sequence_number = self.next_sequence_number.checked_add(1).unwrap_or(1);

        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let max = self.max_notifications_per_publish;

        let mut data_changes = Vec::new();
        let mut events = Vec::new();
        for item in self.items.values_mut() {
            if item.is_event_item() {
                for fields in item.take_events(max) {
                    events.push(EventFieldList {
                        client_handle: item.client_handle,
                        event_fields: Some(fields),
                    });
                }
            } else {
                data_changes.extend(item.take_notifications(max));
            }
        }

        let mut notification_data = Vec::new();
        if !data_changes.is_empty() {
            notification_data.push(ExtensionObject::from_message(
                &DataChangeNotification {
                    monitored_items: Some(data_changes),
                    diagnostic_infos: None,
                },
                &ctx,
            ));
        }
        if !events.is_empty() {
            notification_data.push(ExtensionObject::from_message(
                &EventNotificationList {
                    events: Some(events),
                },
                &ctx,
            ));
        }

        NotificationMessage {
            sequence_number,
            publish_time: DateTime::now(),
            notification_data: Some(notification_data),
        }
    }

    /// The status change message sent when the subscription dies.
    pub fn status_change_message(&mut self, status: StatusCode) -> NotificationMessage {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let sequence_number = self.next_sequence_number;
        NotificationMessage {
            sequence_number,
            publish_time: DateTime::now(),
            notification_data: Some(vec![ExtensionObject::from_message(
                &StatusChangeNotification {
                    status,
                    diagnostic_info: Default::default(),
                },
                &ctx,
            )]),
        }
    }
}

/// All subscriptions of the server, keyed by id.
#[derive(Default)]
pub struct SubscriptionStore {
    subscriptions: HashMap<IntegerId, Subscription>,
    next_subscription_id: IntegerId,
}

impl SubscriptionStore {
    /// Create an empty store.
    pub fn new() -> SubscriptionStore {
        SubscriptionStore {
            subscriptions: HashMap::new(),
            next_subscription_id: 1,
        }
    }

    /// Create a subscription for a session.
    pub fn create(&mut self, session_id: NodeId, now: Instant) -> &mut Subscription {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        debug!("Created subscription {id} for session {session_id}");
        self.subscriptions
            .entry(id)
            .or_insert_with(|| Subscription::new(id, session_id, now))
    }

    /// Get a subscription.
    pub fn get_mut(&mut self, id: IntegerId) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&id)
    }

    /// Get a subscription owned by the given session.
    pub fn get_for_session(
        &mut self,
        id: IntegerId,
        session_id: &NodeId,
    ) -> Result<&mut Subscription, StatusCode> {
        match self.subscriptions.get_mut(&id) {
            Some(sub) if &sub.session_id == session_id => Ok(sub),
            Some(_) => Err(StatusCode::BadSubscriptionIdInvalid),
            None => Err(StatusCode::BadSubscriptionIdInvalid),
        }
    }

    /// Remove a subscription.
    pub fn remove(&mut self, id: IntegerId) -> Option<Subscription> {
        self.subscriptions.remove(&id)
    }

    /// Remove all subscriptions of a session, returning their ids.
    pub fn remove_for_session(&mut self, session_id: &NodeId) -> Vec<IntegerId> {
        let ids: Vec<_> = self
            .subscriptions
            .values()
            .filter(|s| &s.session_id == session_id)
            .map(|s| s.id)
            .collect();
        for id in &ids {
            self.subscriptions.remove(id);
        }
        ids
    }

    /// Number of subscriptions owned by a session.
    pub fn count_for_session(&self, session_id: &NodeId) -> usize {
        self.subscriptions
            .values()
            .filter(|s| &s.session_id == session_id)
            .count()
    }

    /// Iterate all subscriptions mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Subscription> {
        self.subscriptions.values_mut()
    }

    /// The earliest next tick over all subscriptions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.subscriptions.values().map(|s| s.next_tick()).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(now: Instant) -> Subscription {
        let mut sub = Subscription::new(1, NodeId::new(1, 1u32), now);
        sub.set_parameters(500.0, 10, 3, 0, 0);
        sub
    }

    fn item(now: Instant) -> MonitoredItem {
        MonitoredItem::new(
            0,
            42,
            NodeId::new(1, "v"),
            uastack_types::AttributeId::Value,
            Default::default(),
            Default::default(),
            500.0,
            10,
            true,
            ItemFilter::None,
            now,
        )
    }

    #[test]
    fn keep_alive_after_exactly_keep_alive_count_cycles() {
        let now = Instant::now();
        let mut sub = subscription(now);
        sub.create_item(item(now));

        // No notifications for exactly keep_alive_count = 3 cycles, then
        // exactly one keep-alive on the next cycle.
        for cycle in 1..=4 {
            let result = sub.tick(now, true);
            match (cycle, result) {
                (4, TickResult::KeepAlive(msg)) => {
                    assert_eq!(msg.sequence_number, 1);
                    assert!(msg.notification_data.is_none());
                }
                (4, _) => panic!("Expected a keep-alive on cycle 4"),
                (_, TickResult::None) => {}
                _ => panic!("Unexpected tick result on cycle {cycle}"),
            }
        }
        // Counter was reset; the next cycle is empty again
        assert!(matches!(sub.tick(now, true), TickResult::None));
    }

    #[test]
    fn notifications_consume_sequence_numbers_and_retransmit() {
        let now = Instant::now();
        let mut sub = subscription(now);
        let item_id = sub.create_item(item(now));

        sub.items
            .get_mut(&item_id)
            .unwrap()
            .sample_value(uastack_types::DataValue::from(1i32));
        let TickResult::Message(msg) = sub.tick(now, true) else {
            panic!("Expected a notification message");
        };
        assert_eq!(msg.sequence_number, 1);
        assert_eq!(sub.available_sequence_numbers(), Some(vec![1]));

        // Republish fetches the stored message until it is acknowledged
        assert!(sub.republish(1).is_some());
        assert_eq!(sub.acknowledge(1), StatusCode::Good);
        assert_eq!(sub.acknowledge(1), StatusCode::BadSequenceNumberUnknown);
        assert!(sub.republish(1).is_none());
    }

    #[test]
    fn missing_publish_requests_terminate_after_lifetime() {
        let now = Instant::now();
        let mut sub = subscription(now);
        let item_id = sub.create_item(item(now));
        sub.items
            .get_mut(&item_id)
            .unwrap()
            .sample_value(uastack_types::DataValue::from(1i32));

        // lifetime_count revised to keep_alive * 3 = 10 (requested)
        let mut terminated = false;
        for _ in 0..sub.lifetime_count {
            match sub.tick(now, false) {
                TickResult::Terminated => {
                    terminated = true;
                    break;
                }
                TickResult::None => assert!(sub.is_late()),
                _ => panic!("No publish request available, nothing should be sent"),
            }
        }
        assert!(terminated);
    }

    #[test]
    fn base_time_policy_keeps_phase() {
        let now = Instant::now();
        let mut sub = subscription(now);
        sub.cycle_policy = CycleMissPolicy::BaseTime;
        // Tick far into the future; the next tick stays on the 500ms grid
        let late = now + Duration::from_millis(1250);
        sub.tick(late, true);
        assert_eq!(sub.next_tick(), now + Duration::from_millis(1500));
    }
}
