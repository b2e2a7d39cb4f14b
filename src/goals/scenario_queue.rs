//! Backlog of inferred goals awaiting scenario framing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

use crate::graph::{GoalPatch, GraphStore};

/// One goal waiting for a scenario sub-dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioQueueEntry {
    pub goal_id: String,
    /// Candidate data as inferred (description, type, confidence, evidence).
    pub candidate: GoalPatch,
    /// Enqueue sequence number.
    pub order: u64,
}

/// FIFO of scenario candidates. A goal is framed at most once per session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioQueue {
    entries: VecDeque<ScenarioQueueEntry>,
    processed: BTreeSet<String>,
    next_order: u64,
}

impl ScenarioQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued goal ids, front first.
    pub fn queued_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.goal_id.as_str()).collect()
    }

    pub fn is_processed(&self, goal_id: &str) -> bool {
        self.processed.contains(goal_id)
    }

    fn is_queued(&self, goal_id: &str) -> bool {
        self.entries.iter().any(|e| e.goal_id == goal_id)
    }

    fn is_settled(store: &GraphStore, goal_id: &str) -> bool {
        store.qualified_goals().contains_key(goal_id) || store.rejected_goals().contains(goal_id)
    }

    /// Append candidates, then move `priority_id` to the front if it is queued.
    ///
    /// Returns the number of entries appended.
    pub fn enqueue<I>(&mut self, candidates: I, priority_id: Option<&str>, store: &GraphStore) -> usize
    where
        I: IntoIterator<Item = (String, GoalPatch)>,
    {
        let mut added = 0;
        for (goal_id, candidate) in candidates {
            if self.is_queued(&goal_id)
                || self.is_processed(&goal_id)
                || Self::is_settled(store, &goal_id)
            {
                continue;
            }
            self.entries.push_back(ScenarioQueueEntry {
                goal_id,
                candidate,
                order: self.next_order,
            });
            self.next_order += 1;
            added += 1;
        }

        if let Some(priority) = priority_id {
            if let Some(pos) = self.entries.iter().position(|e| e.goal_id == priority) {
                if let Some(entry) = self.entries.remove(pos) {
                    self.entries.push_front(entry);
                }
            }
        }

        debug!(added, queued = self.entries.len(), "Scenario candidates enqueued");
        added
    }

    /// Pop the next goal still worth framing and mark it processed.
    pub fn dequeue_next(&mut self, store: &GraphStore) -> Option<ScenarioQueueEntry> {
        while let Some(entry) = self.entries.pop_front() {
            if self.is_processed(&entry.goal_id) || Self::is_settled(store, &entry.goal_id) {
                continue;
            }
            self.processed.insert(entry.goal_id.clone());
            return Some(entry);
        }
        None
    }
}
