//! Timer scheduler using a BinaryHeap ordered by deadline.
//!
//! Every [`TimerKind`] has at most one live registration. Re-arming or
//! cancelling a kind bumps its generation; heap entries from an older
//! generation are skipped by `poll_expired`, the same way acknowledged
//! packets are skipped by a retransmission queue. Once stale entries
//! outnumber live ones by more than [`COMPACT_SLACK`] the heap is rebuilt
//! from live entries only.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

/// Stale heap entries tolerated beyond the live count before compaction.
pub const COMPACT_SLACK: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Head of the PMKSA cache reaches its expiration time.
    PmksaExpire,
    /// Current PMKSA entry reaches its re-authentication time.
    PmksaReauth,
    /// Periodic PTK rekey.
    PtkRekey,
}

/// Identifies one registration of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub kind: TimerKind,
    generation: u64,
}

#[derive(Debug, Clone)]
struct TimerEntry {
    deadline: Instant,
    kind: TimerKind,
    generation: u64,
}

// BinaryHeap is a max-heap; reverse so the earliest deadline is on top.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.generation == other.generation
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<TimerEntry>,
    /// Live generation and deadline per kind.
    live: HashMap<TimerKind, (u64, Instant)>,
    next_generation: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire at `deadline`, replacing any earlier registration.
    pub fn schedule(&mut self, kind: TimerKind, deadline: Instant) -> TimerHandle {
        if let Some(&(generation, current)) = self.live.get(&kind) {
            if current == deadline {
                return TimerHandle { kind, generation };
            }
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.live.insert(kind, (generation, deadline));
        self.heap.push(TimerEntry {
            deadline,
            kind,
            generation,
        });
        tracing::trace!(?kind, generation, "timer armed");
        if self.heap.len() > self.live.len() + COMPACT_SLACK {
            self.compact();
        }
        TimerHandle { kind, generation }
    }

    /// Drop heap entries that no longer match a live registration.
    fn compact(&mut self) {
        let live = &self.live;
        self.heap.retain(|entry| {
            matches!(live.get(&entry.kind), Some(&(generation, _)) if generation == entry.generation)
        });
        tracing::trace!(queued = self.heap.len(), "timer heap compacted");
    }

    /// Returns `true` if the kind was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.live.remove(&kind).is_some()
        // The heap entry stays until it surfaces in poll_expired.
    }

    /// Cancel only if `handle` is still the live registration.
    pub fn cancel_handle(&mut self, handle: TimerHandle) -> bool {
        match self.live.get(&handle.kind) {
            Some(&(generation, _)) if generation == handle.generation => {
                self.live.remove(&handle.kind);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.live.clear();
        self.heap.clear();
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.live.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.live.get(&kind).map(|&(_, deadline)| deadline)
    }

    /// Earliest live deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.live.values().map(|&(_, deadline)| deadline).min()
    }

    /// Pop every live timer whose deadline is at or before `now`, in
    /// deadline order. Fired timers are disarmed.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut fired = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            let Some(entry) = self.heap.pop() else { break };
            match self.live.get(&entry.kind) {
                Some(&(generation, _)) if generation == entry.generation => {
                    self.live.remove(&entry.kind);
                    fired.push(entry.kind);
                }
                // Cancelled or re-armed since this entry was pushed.
                _ => continue,
            }
        }
        fired
    }

    pub fn armed_count(&self) -> usize {
        self.live.len()
    }

    /// Heap entries held, stale ones included.
    pub fn queued(&self) -> usize {
        self.heap.len()
    }
}
