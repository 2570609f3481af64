// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Monitored items: sampling state, the notification queue with its
//! discard policy, and data change filtering.

use std::collections::VecDeque;
use std::time::Instant;

use uastack_types::{
    AttributeId, DataChangeFilter, DataValue, DeadbandType, IntegerId, MonitoredItemNotification,
    MonitoringMode, NodeId, NumericRange, StatusCode, Variant,
};

use super::event_filter::ValidatedEventFilter;

/// The filter of a monitored item.
pub enum ItemFilter {
    /// Report every status/value change.
    None,
    /// Data change filter with trigger and deadband.
    DataChange(DataChangeFilter),
    /// Event filter with select and where clauses.
    Event(ValidatedEventFilter),
}

/// One monitored item of a subscription.
pub struct MonitoredItem {
    /// Server assigned id, unique within the subscription.
    pub id: IntegerId,
    /// Client supplied handle returned in notifications.
    pub client_handle: IntegerId,
    /// The monitored node.
    pub node_id: NodeId,
    /// The monitored attribute.
    pub attribute_id: AttributeId,
    /// Index range into array values.
    pub index_range: NumericRange,
    /// The monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// Sampling interval in milliseconds.
    pub sampling_interval: f64,
    /// Maximum queued notifications.
    pub queue_size: usize,
    /// On overflow, discard the oldest entry, else the newest.
    pub discard_oldest: bool,
    /// The installed filter.
    pub filter: ItemFilter,
    /// When the item samples next.
    pub next_sample: Instant,
    last_value: Option<DataValue>,
    queue: VecDeque<MonitoredItemNotification>,
    events: VecDeque<Vec<Variant>>,
}

impl MonitoredItem {
    /// Create a new monitored item with revised parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: IntegerId,
        client_handle: IntegerId,
        node_id: NodeId,
        attribute_id: AttributeId,
        index_range: NumericRange,
        monitoring_mode: MonitoringMode,
        sampling_interval: f64,
        queue_size: usize,
        discard_oldest: bool,
        filter: ItemFilter,
        now: Instant,
    ) -> MonitoredItem {
        MonitoredItem {
            id,
            client_handle,
            node_id,
            attribute_id,
            index_range,
            monitoring_mode,
            sampling_interval,
            queue_size: queue_size.max(1),
            discard_oldest,
            filter,
            next_sample: now,
            last_value: None,
            queue: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// `true` if this item has an event filter.
    pub fn is_event_item(&self) -> bool {
        matches!(self.filter, ItemFilter::Event(_))
    }

    /// Offer a sampled value to the item. Applies the data change filter and
    /// queues a notification when the value passes. Returns `true` if a
    /// notification was queued.
    pub fn sample_value(&mut self, value: DataValue) -> bool {
        if self.monitoring_mode == MonitoringMode::Disabled {
            return false;
        }
        if !self.value_changed(&value) {
            return false;
        }
        self.last_value = Some(value.clone());
        self.enqueue(MonitoredItemNotification {
            client_handle: self.client_handle,
            value,
        });
        true
    }

    /// Offer the selected fields of a matching event.
    pub fn notify_event(&mut self, fields: Vec<Variant>) {
        if self.monitoring_mode == MonitoringMode::Disabled {
            return;
        }
        if self.events.len() >= self.queue_size {
            if self.discard_oldest {
                self.events.pop_front();
            } else {
                self.events.pop_back();
            }
        }
        self.events.push_back(fields);
    }

    // Data change detection per the installed filter.
    fn value_changed(&self, value: &DataValue) -> bool {
        let Some(last) = &self.last_value else {
            return true;
        };
        let status_changed = last.status() != value.status();
        match &self.filter {
            ItemFilter::None => status_changed || last.value != value.value,
            ItemFilter::DataChange(filter) => {
                use uastack_types::DataChangeTrigger;
                match filter.trigger {
                    DataChangeTrigger::Status => status_changed,
                    DataChangeTrigger::StatusValue => {
                        status_changed
                            || Self::exceeds_deadband(
                                filter,
                                last.value.as_ref(),
                                value.value.as_ref(),
                            )
                    }
                    DataChangeTrigger::StatusValueTimestamp => {
                        status_changed
                            || last.source_timestamp != value.source_timestamp
                            || Self::exceeds_deadband(
                                filter,
                                last.value.as_ref(),
                                value.value.as_ref(),
                            )
                    }
                }
            }
            ItemFilter::Event(_) => false,
        }
    }

    fn exceeds_deadband(
        filter: &DataChangeFilter,
        last: Option<&Variant>,
        current: Option<&Variant>,
    ) -> bool {
        if filter.deadband_type != DeadbandType::Absolute as i32 as u32 {
            // No deadband (or the unsupported percent variant, rejected at
            // install time)
            return last != current;
        }
        match (last.and_then(as_f64), current.and_then(as_f64)) {
            (Some(last), Some(current)) => (last - current).abs() > filter.deadband_value,
            _ => last != current,
        }
    }

    // Queue with discard policy; the entry surviving an overflow carries the
    // overflow info bit in its status.
    fn enqueue(&mut self, notification: MonitoredItemNotification) {
        if self.queue.len() >= self.queue_size {
            let mut notification = notification;
            if self.discard_oldest {
                self.queue.pop_front();
                set_overflow(&mut notification);
                self.queue.push_back(notification);
            } else {
                // Discard the newest: the incoming value replaces the tail
                self.queue.pop_back();
                set_overflow(&mut notification);
                self.queue.push_back(notification);
            }
        } else {
            self.queue.push_back(notification);
        }
    }

    /// Drain up to `max` queued data change notifications, all for zero.
    pub fn take_notifications(&mut self, max: usize) -> Vec<MonitoredItemNotification> {
        let take = if max == 0 {
            self.queue.len()
        } else {
            max.min(self.queue.len())
        };
        self.queue.drain(..take).collect()
    }

    /// Drain up to `max` queued event field lists.
    pub fn take_events(&mut self, max: usize) -> Vec<Vec<Variant>> {
        let take = if max == 0 {
            self.events.len()
        } else {
            max.min(self.events.len())
        };
        self.events.drain(..take).collect()
    }

    /// `true` if notifications are queued.
    pub fn has_notifications(&self) -> bool {
        !self.queue.is_empty() || !self.events.is_empty()
    }
}

fn set_overflow(notification: &mut MonitoredItemNotification) {
    let status = notification.value.status().set_overflow();
    notification.value.status = Some(status);
}

fn as_f64(value: &Variant) -> Option<f64> {
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

    fn item(queue_size: usize, discard_oldest: bool) -> MonitoredItem {
        MonitoredItem::new(
            1,
            100,
            NodeId::new(1, "v"),
            AttributeId::Value,
            NumericRange::None,
            MonitoringMode::Reporting,
            100.0,
            queue_size,
            discard_oldest,
            ItemFilter::None,
            Instant::now(),
        )
    }

    #[test]
    fn equal_values_do_not_notify() {
        let mut item = item(10, true);
        assert!(item.sample_value(DataValue::from(1i32)));
        assert!(!item.sample_value(DataValue::from(1i32)));
        assert!(item.sample_value(DataValue::from(2i32)));
        assert_eq!(item.take_notifications(0).len(), 2);
    }

    #[test]
    fn overflow_discard_oldest_sets_overflow_bit() {
        let mut item = item(2, true);
        for i in 0..3i32 {
            item.sample_value(DataValue::from(i));
        }
        let notifications = item.take_notifications(0);
        assert_eq!(notifications.len(), 2);
        // Oldest (0) dropped; the newest entry carries the overflow bit
        assert_eq!(notifications[0].value.value, Some(Variant::Int32(1)));
        assert!(notifications[1].value.status().overflow());
    }

    #[test]
    fn absolute_deadband_filters_small_changes() {
        let mut item = item(10, true);
        item.filter = ItemFilter::DataChange(DataChangeFilter {
            trigger: Default::default(),
            deadband_type: DeadbandType::Absolute as i32 as u32,
            deadband_value: 5.0,
        });
        assert!(item.sample_value(DataValue::from(10.0f64)));
        // Within the deadband
        assert!(!item.sample_value(DataValue::from(13.0f64)));
        // Beyond the deadband
        assert!(item.sample_value(DataValue::from(16.0f64)));
    }
}
