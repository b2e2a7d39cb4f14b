//! Field updates, the append-only history log and the conflict table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::GraphStore;
use crate::evaluator::is_answered;

/// Source tag recorded for facts extracted from the user's own words.
pub const SOURCE_USER_INPUT: &str = "user_input";

/// A single proposed change to a node field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub node_name: String,
    pub field_name: String,
    #[serde(default)]
    pub value: Value,
    /// The user explicitly corrected an earlier answer.
    #[serde(default)]
    pub is_correction: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl FieldUpdate {
    /// Create a plain (non-correction) update.
    pub fn new(node: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self {
            node_name: node.into(),
            field_name: field.into(),
            value,
            is_correction: false,
            reasoning: None,
            source: None,
        }
    }

    /// Mark the update as a correction of an earlier answer.
    pub fn as_correction(mut self, reasoning: impl Into<String>) -> Self {
        self.is_correction = true;
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// One entry in the per-field history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldHistoryEntry {
    /// Value stored after the update (merged for portfolio fields).
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub previous_value: Option<Value>,
    pub conflict_resolved: bool,
    pub reasoning: Option<String>,
}

/// Latest correction that contradicted an answered field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub old_value: Value,
    pub new_value: Value,
    pub timestamp: DateTime<Utc>,
    pub reasoning: Option<String>,
}

/// Provenance record linking two nodes. Audit only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_node: Option<String>,
    pub to_node: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of [`GraphStore::apply_updates`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// `(node, field)` pairs written, in application order.
    pub applied: Vec<(String, String)>,
    /// `(node, field)` pairs whose update was recorded as a conflict.
    pub conflicts: Vec<(String, String)>,
    /// Updates dropped for lacking a node or field name.
    pub skipped: usize,
}

impl ApplyReport {
    /// Distinct nodes touched, in first-touched order.
    pub fn touched_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = Vec::new();
        for (node, _) in &self.applied {
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        }
        nodes
    }
}

impl GraphStore {
    /// Apply field updates in order.
    ///
    /// Mapping values merge shallowly over an existing mapping; everything
    /// else replaces. Each applied update appends exactly one history entry.
    pub fn apply_updates(&mut self, updates: &[FieldUpdate]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for update in updates {
            let node = update.node_name.trim();
            let field = update.field_name.trim();
            if node.is_empty() || field.is_empty() {
                report.skipped += 1;
                continue;
            }

            if !self.node_snapshots.contains_key(node) {
                self.traversal_order.push(node.to_string());
            }
            let snapshot = self.node_snapshots.entry(node.to_string()).or_default();
            let previous = snapshot.get(field).cloned();
            let now = Utc::now();

            let conflict = update.is_correction
                && is_answered(snapshot, field)
                && previous.as_ref() != Some(&update.value);

            if conflict {
                self.conflicts.entry(node.to_string()).or_default().insert(
                    field.to_string(),
                    ConflictRecord {
                        old_value: previous.clone().unwrap_or(Value::Null),
                        new_value: update.value.clone(),
                        timestamp: now,
                        reasoning: update.reasoning.clone(),
                    },
                );
                report.conflicts.push((node.to_string(), field.to_string()));
            }

            let stored = match (&previous, &update.value) {
                (Some(Value::Object(old)), Value::Object(new)) => {
                    let mut merged = old.clone();
                    merged.extend(new.iter().map(|(k, v)| (k.clone(), v.clone())));
                    Value::Object(merged)
                }
                _ => update.value.clone(),
            };
            snapshot.insert(field.to_string(), stored.clone());

            debug!(node = %node, field = %field, conflict, "Applied field update");

            self.field_history
                .entry(node.to_string())
                .or_default()
                .entry(field.to_string())
                .or_default()
                .push(FieldHistoryEntry {
                    value: stored,
                    timestamp: now,
                    source: update
                        .source
                        .clone()
                        .unwrap_or_else(|| SOURCE_USER_INPUT.to_string()),
                    previous_value: previous,
                    conflict_resolved: conflict,
                    reasoning: update.reasoning.clone(),
                });

            report.applied.push((node.to_string(), field.to_string()));
        }

        report
    }

    /// History entries for a field, oldest first.
    pub fn field_history(&self, node: &str, field: &str) -> &[FieldHistoryEntry] {
        self.field_history
            .get(node)
            .and_then(|fields| fields.get(field))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Latest conflict recorded for a field.
    pub fn conflict(&self, node: &str, field: &str) -> Option<&ConflictRecord> {
        self.conflicts.get(node).and_then(|fields| fields.get(field))
    }
}
