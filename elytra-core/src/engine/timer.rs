//! Cancellable one-shot timer queue.
//!
//! Entries are ordered by `(deadline, sequence)`: earliest deadline fires
//! first, and two timers with the same deadline fire in scheduling order.
//! Every live entry is reachable through its `TimerHandle`, so a single
//! timer or the whole pending set can be cancelled at any point.
//!
//! Deadlines are offsets from an origin the owner chooses (engine start for
//! the wall-clock driver, zero for simulated time).

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Cancellation token for one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// A timer removed from the queue because its deadline passed.
#[derive(Debug, PartialEq, Eq)]
pub struct Fired<T> {
    pub handle: TimerHandle,
    pub deadline: Duration,
    pub payload: T,
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: BTreeMap<(Duration, u64), T>,
    /// The pending set: every handle that can still fire.
    pending: HashMap<TimerHandle, Duration>,
    next_sequence: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            pending: HashMap::new(),
            next_sequence: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `payload` to fire at `deadline`.
    pub fn schedule(&mut self, deadline: Duration, payload: T) -> TimerHandle {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let handle = TimerHandle(sequence);
        self.entries.insert((deadline, sequence), payload);
        self.pending.insert(handle, deadline);
        handle
    }

    /// Cancel one timer. Returns its payload if it had not fired yet.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        let deadline = self.pending.remove(&handle)?;
        self.entries.remove(&(deadline, handle.0))
    }

    /// Cancel every pending timer; returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.entries.clear();
        cancelled
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.keys().next().map(|&(deadline, _)| deadline)
    }

    /// Pop the earliest timer if its deadline is `<= now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<Fired<T>> {
        let entry = self.entries.first_entry()?;
        let (deadline, sequence) = *entry.key();
        if deadline > now {
            return None;
        }
        let payload = entry.remove();
        let handle = TimerHandle(sequence);
        self.pending.remove(&handle);
        Some(Fired {
            handle,
            deadline,
            payload,
        })
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
