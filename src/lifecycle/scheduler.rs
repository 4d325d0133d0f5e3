//! Virtual clock and deferred task queue.

use crate::domain::TimeMs;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<T> {
    due: TimeMs,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap pops the earliest (due, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Deferred tasks ordered by due time, ties broken by scheduling order.
pub struct Scheduler<T> {
    now: TimeMs,
    next_seq: u64,
    queue: BinaryHeap<Entry<T>>,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::starting_at(TimeMs::new(0))
    }

    pub fn starting_at(now: TimeMs) -> Self {
        Self {
            now,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    pub fn now(&self) -> TimeMs {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Schedule `task` to run `delay_ms` after the current virtual time.
    /// Negative delays are treated as zero.
    pub fn schedule_after(&mut self, delay_ms: i64, task: T) -> TimeMs {
        let due = self.now.plus(delay_ms.max(0));
        self.schedule_at(due, task);
        due
    }

    pub fn schedule_at(&mut self, due: TimeMs, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry { due, seq, task });
    }

    pub fn next_due(&self) -> Option<TimeMs> {
        self.queue.peek().map(|e| e.due)
    }

    /// Pop the earliest task due at or before `until`, moving the clock to
    /// its due time. Returns `None` once nothing else is due.
    pub fn pop_due(&mut self, until: TimeMs) -> Option<(TimeMs, T)> {
        if self.queue.peek().map(|e| e.due <= until) != Some(true) {
            return None;
        }
        let entry = self.queue.pop()?;
        if entry.due > self.now {
            self.now = entry.due;
        }
        Some((entry.due, entry.task))
    }

    /// Move the clock forward once every task up to `until` has been popped.
    pub fn advance_clock(&mut self, until: TimeMs) {
        if until > self.now {
            self.now = until;
        }
    }

    /// Number of queued tasks matching `pred`.
    pub fn count(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        self.queue.iter().filter(|e| pred(&e.task)).count()
    }

    /// Queued tasks with their due times, in firing order.
    pub fn entries(&self) -> Vec<(TimeMs, &T)> {
        let mut entries: Vec<&Entry<T>> = self.queue.iter().collect();
        entries.sort_by_key(|e| (e.due, e.seq));
        entries.into_iter().map(|e| (e.due, &e.task)).collect()
    }

    /// Drop every queued task for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.queue.retain(|e| keep(&e.task));
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler<&'static str>, until: i64) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Some((_, task)) = s.pop_due(TimeMs::new(until)) {
            out.push(task);
        }
        s.advance_clock(TimeMs::new(until));
        out
    }

    #[test]
    fn test_pops_in_due_order() {
        let mut s = Scheduler::new();
        s.schedule_after(300, "c");
        s.schedule_after(100, "a");
        s.schedule_after(200, "b");
        assert_eq!(drain(&mut s, 1000), vec!["a", "b", "c"]);
        assert_eq!(s.now(), TimeMs::new(1000));
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut s = Scheduler::new();
        s.schedule_after(500, "first");
        s.schedule_after(500, "second");
        s.schedule_after(500, "third");
        assert_eq!(drain(&mut s, 500), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_not_yet_due_stays_queued() {
        let mut s = Scheduler::new();
        s.schedule_after(1000, "late");
        assert!(drain(&mut s, 999).is_empty());
        assert_eq!(s.len(), 1);
        assert_eq!(s.next_due(), Some(TimeMs::new(1000)));
        assert_eq!(drain(&mut s, 1000), vec!["late"]);
    }

    #[test]
    fn test_clock_tracks_popped_task() {
        let mut s = Scheduler::new();
        s.schedule_after(250, "x");
        let (due, _) = s.pop_due(TimeMs::new(10_000)).unwrap();
        assert_eq!(due, TimeMs::new(250));
        assert_eq!(s.now(), TimeMs::new(250));
    }

    #[test]
    fn test_entries_follow_firing_order() {
        let mut s = Scheduler::new();
        s.schedule_after(700, "late");
        s.schedule_after(100, "early");
        s.schedule_after(100, "tied");
        let order: Vec<_> = s.entries().into_iter().map(|(due, t)| (due.as_ms(), *t)).collect();
        assert_eq!(order, vec![(100, "early"), (100, "tied"), (700, "late")]);
    }

    #[test]
    fn test_retain_drops_filtered_tasks() {
        let mut s = Scheduler::new();
        s.schedule_after(100, "keep");
        s.schedule_after(200, "drop");
        s.schedule_after(300, "keep");
        s.retain(|t| *t != "drop");
        assert_eq!(s.len(), 2);
        assert_eq!(drain(&mut s, 1000), vec!["keep", "keep"]);
    }

    #[test]
    fn test_negative_delay_is_immediate() {
        let mut s = Scheduler::starting_at(TimeMs::new(50));
        let due = s.schedule_after(-10, "now");
        assert_eq!(due, TimeMs::new(50));
    }
}
