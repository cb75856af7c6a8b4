// THEORY:
// The `tracker` module adds memory to the pipeline. It takes the stateless list
// of `CandidateBox`es from a single frame and decides how long each one has been
// sitting there. Two independent signals come out of it:
// 1.  **Persistence**: each candidate is associated with an entry from the
//     previous frame. An entry remembers when its object was first seen; once a
//     re-detected entry is older than the persistence limit, the tracker reports
//     it. Association is a greedy IoU assignment, so a box that jitters by a
//     pixel or two keeps its identity instead of restarting its clock.
// 2.  **Occupancy**: a fixed-length window records, per frame, whether anything
//     was present at all. When every slot of the window is occupied the scene
//     has been continuously obstructed, even if no single box stayed stable.
// There is no occlusion handling: an entry that is not matched in a frame is
// dropped immediately and a reappearing object starts over.

use crate::core_modules::candidate::{BoundingBox, CandidateBox};
use std::collections::VecDeque;
use std::time::Duration;

/// A candidate the tracker has seen in consecutive frames.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntry {
    /// Unique for the lifetime of the tracker. Not persistent across resets.
    pub id: u64,
    /// Bounds from the most recent frame the entry was matched in.
    pub bounds: BoundingBox,
    pub first_seen: Duration,
}

impl TrackedEntry {
    fn new(id: u64, bounds: BoundingBox, now: Duration) -> Self {
        Self {
            id,
            bounds,
            first_seen: now,
        }
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.first_seen)
    }
}

/// Fixed-capacity FIFO of per-frame "something was present" flags.
#[derive(Debug, Clone)]
pub struct OccupancyWindow {
    entries: VecDeque<bool>,
    capacity: usize,
}

impl OccupancyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a flag, evicting the oldest one once the window is over capacity.
    pub fn push(&mut self, occupied: bool) {
        self.entries.push_back(occupied);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupied_count(&self) -> usize {
        self.entries.iter().filter(|&&occupied| occupied).count()
    }

    /// True once every frame of a full window saw at least one candidate.
    pub fn is_saturated(&self) -> bool {
        self.occupied_count() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The tracker's verdict for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerSignal {
    /// A re-detected candidate has outlived the persistence limit.
    pub persisted_long_enough: bool,
    /// The occupancy window is full of occupied frames.
    pub window_full: bool,
}

pub struct PersistenceTracker {
    entries: Vec<TrackedEntry>,
    window: OccupancyWindow,
    persistence: Duration,
    /// Minimum IoU for a candidate to inherit an existing entry.
    match_iou: f64,
    next_id: u64,
}

impl PersistenceTracker {
    pub fn new(window_capacity: usize, persistence: Duration, match_iou: f64) -> Self {
        Self {
            entries: Vec::new(),
            window: OccupancyWindow::new(window_capacity),
            persistence,
            match_iou,
            next_id: 0,
        }
    }

    /// Updates the tracked set with the candidates detected at `now`.
    pub fn update(&mut self, candidates: &[CandidateBox], now: Duration) -> TrackerSignal {
        // --- 1. Matching ---
        // Every (entry, candidate) pair above the IoU floor, best overlap first.
        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            for (j, candidate) in candidates.iter().enumerate() {
                let iou = entry.bounds.iou(&candidate.bounds);
                if iou >= self.match_iou {
                    pairs.push((iou, i, j));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut entry_taken = vec![false; self.entries.len()];
        let mut candidate_match: Vec<Option<usize>> = vec![None; candidates.len()];
        for (_, i, j) in pairs {
            if entry_taken[i] || candidate_match[j].is_some() {
                continue;
            }
            entry_taken[i] = true;
            candidate_match[j] = Some(i);
        }

        // --- 2. State Updating ---
        // Unmatched entries are not carried over.
        let mut persisted_long_enough = false;
        let mut updated = Vec::with_capacity(candidates.len());
        for (candidate, matched) in candidates.iter().zip(candidate_match) {
            let entry = match matched {
                Some(i) => {
                    let mut entry = self.entries[i].clone();
                    entry.bounds = candidate.bounds;
                    if entry.elapsed(now) > self.persistence {
                        persisted_long_enough = true;
                    }
                    entry
                }
                None => {
                    let entry = TrackedEntry::new(self.next_id, candidate.bounds, now);
                    self.next_id += 1;
                    entry
                }
            };
            updated.push(entry);
        }
        self.entries = updated;

        // --- 3. Occupancy ---
        self.window.push(!candidates.is_empty());

        TrackerSignal {
            persisted_long_enough,
            window_full: self.window.is_saturated(),
        }
    }

    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    pub fn window(&self) -> &OccupancyWindow {
        &self.window
    }

    /// Forgets every entry and empties the occupancy window.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.window.clear();
    }
}
