//! Structural dump and restore.

use serde_json::Value;
use std::collections::BTreeSet;

use super::GraphStore;
use crate::error::{SnapshotError, SnapshotResult};

impl GraphStore {
    /// Dump the whole store as plain JSON (scalars, lists and mappings).
    pub fn dump(&self) -> SnapshotResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a store from a dump.
    ///
    /// The dump is parsed and validated in full before a store is returned,
    /// so callers either get the complete state or an error.
    pub fn restore(dump: Value) -> SnapshotResult<Self> {
        let store: GraphStore = serde_json::from_value(dump)?;
        store.validate()?;
        Ok(store)
    }

    /// Check the frontier and goal exclusivity invariants.
    pub fn validate(&self) -> SnapshotResult<()> {
        let frontier: [(&str, &BTreeSet<String>); 4] = [
            ("visited", &self.visited),
            ("pending", &self.pending),
            ("omitted", &self.omitted),
            ("rejected", &self.rejected_nodes),
        ];
        for (i, (name_a, set_a)) in frontier.iter().enumerate() {
            for (name_b, set_b) in frontier.iter().skip(i + 1) {
                if let Some(node) = set_a.intersection(set_b).next() {
                    return Err(SnapshotError::Invariant {
                        message: format!("node {} is both {} and {}", node, name_a, name_b),
                    });
                }
            }
        }

        for id in self.possible_goals.keys() {
            if self.qualified_goals.contains_key(id) || self.rejected_goals.contains(id) {
                return Err(SnapshotError::Invariant {
                    message: format!("goal {} is in more than one status bucket", id),
                });
            }
        }
        if let Some(id) = self
            .qualified_goals
            .keys()
            .find(|id| self.rejected_goals.contains(*id))
        {
            return Err(SnapshotError::Invariant {
                message: format!("goal {} is both qualified and rejected", id),
            });
        }

        Ok(())
    }
}
