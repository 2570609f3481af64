// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Timed, cyclic and delayed callbacks.
//!
//! The scheduler is driven by calling [`TimerScheduler::run_iterate`] with
//! the current time; due timers run first, then the delayed queue. Cyclic
//! timers are rescheduled according to their cycle-miss policy: either from
//! the current time, or keeping the phase of the original base time with
//! missed cycles skipped rather than caught up.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

/// Identifier of a registered timer.
pub type TimerId = u64;

/// What to do when a cyclic timer misses one or more cycles because the
/// loop ran late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMissPolicy {
    /// Reschedule relative to the current time; the phase drifts.
    CurrentTime,
    /// Keep the phase of the base time; the k-th cycle fires at
    /// `base_time + k * interval` or not at all.
    BaseTime,
}

type TimedCallback = Box<dyn FnMut(Instant) + Send>;
type DelayedCallback = Box<dyn FnOnce() + Send>;

struct TimerEntry {
    callback: TimedCallback,
    /// `None` for single-shot timers.
    interval: Option<Duration>,
    base_time: Instant,
    policy: CycleMissPolicy,
}

/// The callback scheduler. Single-threaded; all methods take `&mut self`
/// and callbacks run on the caller's thread during `run_iterate`.
pub struct TimerScheduler {
    next_id: TimerId,
    /// Timers ordered by their next fire time.
    queue: BTreeMap<(Instant, TimerId), TimerEntry>,
    /// Callbacks run once on the next iteration, after due timers.
    delayed: Vec<DelayedCallback>,
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerScheduler {
    /// Create an empty scheduler.
    pub fn new() -> TimerScheduler {
        TimerScheduler {
            next_id: 1,
            queue: BTreeMap::new(),
            delayed: Vec::new(),
        }
    }

    /// Register a single-shot callback at the given deadline.
    pub fn add_timed(
        &mut self,
        callback: impl FnOnce(Instant) + Send + 'static,
        deadline: Instant,
    ) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        let mut callback = Some(callback);
        self.queue.insert(
            (deadline, id),
            TimerEntry {
                callback: Box::new(move |now| {
                    if let Some(cb) = callback.take() {
                        cb(now)
                    }
                }),
                interval: None,
                base_time: deadline,
                policy: CycleMissPolicy::CurrentTime,
            },
        );
        id
    }

    /// Register a cyclic callback. The first execution is one interval after
    /// `base_time`, or after now when no base time is given.
    pub fn add_cyclic(
        &mut self,
        callback: impl FnMut(Instant) + Send + 'static,
        interval: Duration,
        base_time: Option<Instant>,
        policy: CycleMissPolicy,
        now: Instant,
    ) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        let base_time = base_time.unwrap_or(now);
        let first = Self::next_cycle(base_time, interval, now);
        self.queue.insert(
            (first, id),
            TimerEntry {
                callback: Box::new(callback),
                interval: Some(interval),
                base_time,
                policy,
            },
        );
        id
    }

    /// Remove a timer. Returns `true` if it existed.
    pub fn remove(&mut self, id: TimerId) -> bool {
        let Some(key) = self.key_of(id) else {
            return false;
        };
        self.queue.remove(&key).is_some()
    }

    /// Change the interval, base time or policy of a cyclic timer, keeping
    /// its callback. The next fire time is recomputed. Returns `false` for
    /// unknown or single-shot timers.
    pub fn modify(
        &mut self,
        id: TimerId,
        interval: Duration,
        base_time: Option<Instant>,
        policy: CycleMissPolicy,
        now: Instant,
    ) -> bool {
        let Some(key) = self.key_of(id) else {
            return false;
        };
        let Some(mut entry) = self.queue.remove(&key) else {
            return false;
        };
        if entry.interval.is_none() {
            // Single-shot timers cannot be made cyclic.
            self.queue.insert(key, entry);
            return false;
        }
        entry.interval = Some(interval);
        if let Some(base_time) = base_time {
            entry.base_time = base_time;
        }
        entry.policy = policy;
        let next = Self::next_cycle(entry.base_time, interval, now);
        self.queue.insert((next, id), entry);
        true
    }

    /// Queue a callback to run once in the next iteration, between the timed
    /// callbacks and I/O polling.
    pub fn add_delayed(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.delayed.push(Box::new(callback));
    }

    /// The next timer deadline, if any timer is registered. When
    /// [`Self::has_delayed`] is `true` the caller should iterate again
    /// without sleeping, regardless of this deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(t, _)| *t)
    }

    /// `true` if delayed callbacks are queued for the next iteration.
    pub fn has_delayed(&self) -> bool {
        !self.delayed.is_empty()
    }

    /// Run all callbacks due at `now`, then the delayed queue. Returns the
    /// next deadline.
    pub fn run_iterate(&mut self, now: Instant) -> Option<Instant> {
        loop {
            let Some((&(deadline, id), _)) = self.queue.iter().next() else {
                break;
            };
            if deadline > now {
                break;
            }
            let Some(mut entry) = self.queue.remove(&(deadline, id)) else {
                break;
            };
            (entry.callback)(now);

            if let Some(interval) = entry.interval {
                let next = match entry.policy {
                    CycleMissPolicy::CurrentTime => now + interval,
                    CycleMissPolicy::BaseTime => Self::next_cycle(entry.base_time, interval, now),
                };
                self.queue.insert((next, id), entry);
            }
        }

        // Delayed callbacks run once, after the timers of this cycle.
        // Callbacks queued from inside a delayed callback run next cycle.
        let delayed = std::mem::take(&mut self.delayed);
        for cb in delayed {
            cb();
        }

        self.next_deadline()
    }

    // The smallest base + k * interval that is strictly after now.
    fn next_cycle(base_time: Instant, interval: Duration, now: Instant) -> Instant {
        if base_time > now {
            return base_time;
        }
        let elapsed = now - base_time;
        let cycles = elapsed.as_nanos() / interval.as_nanos().max(1);
        let next = base_time + interval * (cycles as u32 + 1);
        debug_assert!(next > now);
        next
    }

    fn key_of(&self, id: TimerId) -> Option<(Instant, TimerId)> {
        self.queue
            .keys()
            .find(|(_, candidate)| *candidate == id)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn timed_callback_fires_once() {
        let mut scheduler = TimerScheduler::new();
        let start = Instant::now();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler.add_timed(move |_| { c.fetch_add(1, Ordering::SeqCst); }, start + ms(10));

        scheduler.run_iterate(start);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.run_iterate(start + ms(10));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // Single-shot, does not fire again
        scheduler.run_iterate(start + ms(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn base_time_policy_keeps_phase_and_skips_missed_cycles() {
        let mut scheduler = TimerScheduler::new();
        let base = Instant::now();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = fired.clone();
        scheduler.add_cyclic(
            move |now| f.lock().unwrap().push(now),
            ms(100),
            Some(base),
            CycleMissPolicy::BaseTime,
            base,
        );

        // First cycle on time
        scheduler.run_iterate(base + ms(100));
        // The loop stalls past three cycles; only one fire happens, and the
        // next is scheduled on-phase at base + 500ms, not base + 450ms.
        scheduler.run_iterate(base + ms(450));
        assert_eq!(fired.lock().unwrap().len(), 2);
        assert_eq!(scheduler.next_deadline(), Some(base + ms(500)));
    }

    #[test]
    fn current_time_policy_reschedules_from_now() {
        let mut scheduler = TimerScheduler::new();
        let base = Instant::now();
        scheduler.add_cyclic(
            |_| {},
            ms(100),
            Some(base),
            CycleMissPolicy::CurrentTime,
            base,
        );

        scheduler.run_iterate(base + ms(450));
        // Next fire is now + interval, the phase drifts.
        assert_eq!(scheduler.next_deadline(), Some(base + ms(550)));
    }

    #[test]
    fn delayed_callbacks_run_next_iteration_only_once() {
        let mut scheduler = TimerScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler.add_delayed(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let now = Instant::now();
        scheduler.run_iterate(now);
        scheduler.run_iterate(now + ms(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_and_modify() {
        let mut scheduler = TimerScheduler::new();
        let base = Instant::now();
        let id = scheduler.add_cyclic(|_| {}, ms(100), Some(base), CycleMissPolicy::BaseTime, base);
        assert!(scheduler.modify(id, ms(200), Some(base), CycleMissPolicy::BaseTime, base));
        assert_eq!(scheduler.next_deadline(), Some(base + ms(200)));
        assert!(scheduler.remove(id));
        assert!(!scheduler.remove(id));
        assert_eq!(scheduler.next_deadline(), None);
    }
}
