use std::{collections::BTreeMap, time::Duration};

use slabmap::SlabMap;

use super::Job;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    at: Duration,
    seq: u64,
}

/// Identifies a timer entry. `key` guards against reuse of the slab slot after the timer fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TimerId {
    index: usize,
    key: Key,
}

struct Entry {
    key: Key,
    job: Job,
}

/// Timers ordered by deadline, then by insertion order for equal deadlines.
#[derive(Default)]
pub(crate) struct TimerQueue {
    next_seq: u64,
    deadlines: BTreeMap<Key, usize>,
    entries: SlabMap<Entry>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, at: Duration, job: Job) -> TimerId {
        let key = Key {
            at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let index = self.entries.insert(Entry { key, job });
        self.deadlines.insert(key, index);
        TimerId { index, key }
    }

    pub fn contains(&self, id: TimerId) -> bool {
        matches!(self.entries.get(id.index), Some(e) if e.key == id.key)
    }

    /// Removes a pending timer and returns its job, so the caller can drop it later.
    pub fn remove(&mut self, id: TimerId) -> Option<Job> {
        if !self.contains(id) {
            return None;
        }
        self.deadlines.remove(&id.key);
        self.entries.remove(id.index).map(|e| e.job)
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.deadlines.keys().next().map(|key| key.at)
    }

    pub fn has_due(&self, now: Duration) -> bool {
        matches!(self.next_deadline(), Some(at) if at <= now)
    }

    pub fn pop_due(&mut self, now: Duration) -> Option<Job> {
        let (&key, &index) = self.deadlines.iter().next()?;
        if key.at > now {
            return None;
        }
        self.deadlines.remove(&key);
        self.entries.remove(index).map(|e| e.job)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }
}
