//! Mutable per-session state.
//!
//! [`GraphStore`] holds everything a session learns: node snapshots, the
//! traversal frontier, field history and conflicts, goal dictionaries, the
//! asked-question ledger and goal-understanding records. Every mutator keeps
//! two invariants:
//!
//! - a node belongs to at most one of Visited, Pending, Omitted, Rejected,
//!   and never leaves Visited once it enters;
//! - a goal id belongs to at most one of possible, qualified, rejected.
//!
//! The store is plain data and round-trips through [`GraphStore::dump`] and
//! [`GraphStore::restore`].

mod dump;
mod goals;
mod history;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

pub use goals::{
    DeferredGoal, GoalLayer, GoalPatch, GoalRecord, GoalStatus, GoalUnderstanding,
    RejectionSnapshot, LAYER_CORE_VALUE, LAYER_UNDERLYING_NEED,
};
pub use history::{
    ApplyReport, ConflictRecord, Edge, FieldHistoryEntry, FieldUpdate, SOURCE_USER_INPUT,
};

/// Field values of one node.
pub type FieldMap = BTreeMap<String, Value>;

/// Which frontier set a node currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontierState {
    Visited,
    Pending,
    Omitted,
    Rejected,
}

impl FrontierState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrontierState::Visited => "visited",
            FrontierState::Pending => "pending",
            FrontierState::Omitted => "omitted",
            FrontierState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FrontierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state owned exclusively by one orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphStore {
    node_snapshots: BTreeMap<String, FieldMap>,
    traversal_order: Vec<String>,
    edges: Vec<Edge>,

    visited: BTreeSet<String>,
    pending: BTreeSet<String>,
    omitted: BTreeSet<String>,
    rejected_nodes: BTreeSet<String>,
    omission_reasons: BTreeMap<String, String>,

    field_history: BTreeMap<String, BTreeMap<String, Vec<FieldHistoryEntry>>>,
    conflicts: BTreeMap<String, BTreeMap<String, ConflictRecord>>,

    pub(crate) possible_goals: BTreeMap<String, GoalRecord>,
    pub(crate) qualified_goals: BTreeMap<String, GoalRecord>,
    pub(crate) rejected_goals: BTreeSet<String>,
    pub(crate) rejection_snapshots: BTreeMap<String, RejectionSnapshot>,
    pub(crate) deferred_goals: BTreeMap<String, DeferredGoal>,

    asked_questions: BTreeMap<String, BTreeSet<String>>,
    goal_understandings: BTreeMap<String, GoalUnderstanding>,
}

/// Read-only goal summary handed to advisors and returned in directives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalStateView {
    pub possible: Vec<GoalRecord>,
    /// Ordered by priority, then id.
    pub qualified: Vec<GoalRecord>,
    pub rejected: Vec<String>,
    pub deferred: Vec<DeferredGoal>,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with every listed node pending.
    pub fn with_pending<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self::new();
        store.add_pending(nodes);
        store
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// All node snapshots.
    pub fn node_snapshots(&self) -> &BTreeMap<String, FieldMap> {
        &self.node_snapshots
    }

    /// Snapshot of one node; empty if nothing was collected yet.
    pub fn node_snapshot(&self, node: &str) -> &FieldMap {
        static EMPTY: FieldMap = FieldMap::new();
        self.node_snapshots.get(node).unwrap_or(&EMPTY)
    }

    /// Snapshots of visited nodes only.
    pub fn visited_snapshots(&self) -> BTreeMap<String, FieldMap> {
        self.visited
            .iter()
            .map(|n| (n.clone(), self.node_snapshot(n).clone()))
            .collect()
    }

    /// Nodes in the order they first received data.
    pub fn traversal_order(&self) -> &[String] {
        &self.traversal_order
    }

    /// Conflict table, node to field to latest conflict.
    pub fn conflicts(&self) -> &BTreeMap<String, BTreeMap<String, ConflictRecord>> {
        &self.conflicts
    }

    // ------------------------------------------------------------------
    // Frontier
    // ------------------------------------------------------------------

    pub fn visited(&self) -> &BTreeSet<String> {
        &self.visited
    }

    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    pub fn omitted(&self) -> &BTreeSet<String> {
        &self.omitted
    }

    pub fn rejected_nodes(&self) -> &BTreeSet<String> {
        &self.rejected_nodes
    }

    /// Reason recorded when a node was omitted.
    pub fn omission_reason(&self, node: &str) -> Option<&str> {
        self.omission_reasons.get(node).map(String::as_str)
    }

    /// Frontier set containing `node`, if any.
    pub fn frontier_state(&self, node: &str) -> Option<FrontierState> {
        if self.visited.contains(node) {
            Some(FrontierState::Visited)
        } else if self.pending.contains(node) {
            Some(FrontierState::Pending)
        } else if self.omitted.contains(node) {
            Some(FrontierState::Omitted)
        } else if self.rejected_nodes.contains(node) {
            Some(FrontierState::Rejected)
        } else {
            None
        }
    }

    /// Queue nodes for collection. Visited and rejected nodes are left alone;
    /// omitted nodes move back to pending.
    pub fn add_pending<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for node in nodes {
            let node = node.into();
            if self.visited.contains(&node) || self.rejected_nodes.contains(&node) {
                continue;
            }
            self.omitted.remove(&node);
            self.pending.insert(node);
        }
    }

    /// Move a node into Visited. Returns true if it was not visited before.
    pub fn mark_visited(&mut self, node: &str) -> bool {
        if self.visited.contains(node) {
            return false;
        }
        self.pending.remove(node);
        self.omitted.remove(node);
        self.rejected_nodes.remove(node);
        self.visited.insert(node.to_string());
        debug!(node = %node, "Node visited");
        true
    }

    /// Skip a node for now. No-op for visited or rejected nodes.
    pub fn omit_node(&mut self, node: &str, reason: Option<&str>) -> bool {
        if self.visited.contains(node) || self.rejected_nodes.contains(node) {
            return false;
        }
        self.pending.remove(node);
        let inserted = self.omitted.insert(node.to_string());
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            self.omission_reasons
                .insert(node.to_string(), reason.to_string());
        }
        if inserted {
            debug!(node = %node, "Node omitted");
        }
        inserted
    }

    /// Bring an omitted (or untracked) node back to pending.
    ///
    /// Returns true if the node is pending afterwards and was not before.
    pub fn revive_node(&mut self, node: &str) -> bool {
        if self.visited.contains(node)
            || self.rejected_nodes.contains(node)
            || self.pending.contains(node)
        {
            return false;
        }
        self.omitted.remove(node);
        self.omission_reasons.remove(node);
        self.pending.insert(node.to_string());
        debug!(node = %node, "Node revived");
        true
    }

    /// Permanently exclude a node. No-op for visited nodes.
    pub fn reject_node(&mut self, node: &str) -> bool {
        if self.visited.contains(node) {
            return false;
        }
        self.pending.remove(node);
        self.omitted.remove(node);
        self.rejected_nodes.insert(node.to_string())
    }

    /// Pending nodes that are not omitted.
    pub fn open_nodes(&self) -> BTreeSet<String> {
        self.pending.difference(&self.omitted).cloned().collect()
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Record a provenance edge.
    pub fn add_edge(&mut self, from: Option<&str>, to: &str, reason: impl Into<String>) {
        self.edges.push(Edge {
            from_node: from.map(str::to_string),
            to_node: to.to_string(),
            reason: reason.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    // ------------------------------------------------------------------
    // Asked-question ledger
    // ------------------------------------------------------------------

    /// Record that a field (or dotted detail path) was asked.
    pub fn mark_question_asked(&mut self, node: &str, field: &str) {
        self.asked_questions
            .entry(node.to_string())
            .or_default()
            .insert(field.to_string());
    }

    pub fn is_question_asked(&self, node: &str, field: &str) -> bool {
        self.asked_questions
            .get(node)
            .is_some_and(|fields| fields.contains(field))
    }

    /// Fields asked so far for a node.
    pub fn asked_questions(&self, node: &str) -> Option<&BTreeSet<String>> {
        self.asked_questions.get(node)
    }

    /// Fields from `candidates` not yet asked, preserving order.
    pub fn unasked_fields(&self, node: &str, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|f| !self.is_question_asked(node, f))
            .cloned()
            .collect()
    }

    /// Forget every asked question for a node.
    pub fn clear_asked_questions(&mut self, node: &str) {
        self.asked_questions.remove(node);
    }

    // ------------------------------------------------------------------
    // Goals (read side; transitions live in `goals::GoalLedger`)
    // ------------------------------------------------------------------

    pub fn possible_goals(&self) -> &BTreeMap<String, GoalRecord> {
        &self.possible_goals
    }

    pub fn qualified_goals(&self) -> &BTreeMap<String, GoalRecord> {
        &self.qualified_goals
    }

    pub fn rejected_goals(&self) -> &BTreeSet<String> {
        &self.rejected_goals
    }

    pub fn deferred_goals(&self) -> &BTreeMap<String, DeferredGoal> {
        &self.deferred_goals
    }

    pub fn rejection_snapshot(&self, goal_id: &str) -> Option<&RejectionSnapshot> {
        self.rejection_snapshots.get(goal_id)
    }

    /// Bucket currently holding `goal_id`.
    pub fn goal_status(&self, goal_id: &str) -> Option<GoalStatus> {
        if self.qualified_goals.contains_key(goal_id) {
            Some(GoalStatus::Qualified)
        } else if self.possible_goals.contains_key(goal_id) {
            Some(GoalStatus::Possible)
        } else if self.rejected_goals.contains(goal_id) {
            Some(GoalStatus::Rejected)
        } else {
            None
        }
    }

    /// Goal summary for advisors and directives.
    pub fn goal_state(&self) -> GoalStateView {
        let mut qualified: Vec<GoalRecord> = self.qualified_goals.values().cloned().collect();
        qualified.sort_by(|a, b| {
            a.priority
                .unwrap_or(u32::MAX)
                .cmp(&b.priority.unwrap_or(u32::MAX))
                .then_with(|| a.goal_id.cmp(&b.goal_id))
        });
        GoalStateView {
            possible: self.possible_goals.values().cloned().collect(),
            qualified,
            rejected: self.rejected_goals.iter().cloned().collect(),
            deferred: self.deferred_goals.values().cloned().collect(),
        }
    }

    // ------------------------------------------------------------------
    // Goal understanding
    // ------------------------------------------------------------------

    /// Store (or replace) the understanding record for a goal.
    pub fn add_goal_understanding(&mut self, understanding: GoalUnderstanding) {
        self.goal_understandings
            .insert(understanding.goal_id.clone(), understanding);
    }

    pub fn goal_understanding(&self, goal_id: &str) -> Option<&GoalUnderstanding> {
        self.goal_understandings.get(goal_id)
    }

    pub fn goal_understandings(&self) -> &BTreeMap<String, GoalUnderstanding> {
        &self.goal_understandings
    }

    /// Human-readable summary of explored goals.
    pub fn exploration_summary(&self) -> String {
        if self.goal_understandings.is_empty() {
            return "No goals explored yet.".to_string();
        }
        self.goal_understandings
            .values()
            .map(GoalUnderstanding::summary_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_exclusive(store: &GraphStore) {
        for node in store
            .visited()
            .iter()
            .chain(store.pending())
            .chain(store.omitted())
            .chain(store.rejected_nodes())
        {
            let count = [
                store.visited().contains(node),
                store.pending().contains(node),
                store.omitted().contains(node),
                store.rejected_nodes().contains(node),
            ]
            .iter()
            .filter(|b| **b)
            .count();
            assert_eq!(count, 1, "node {} in {} frontier sets", node, count);
        }
    }

    #[test]
    fn test_frontier_moves_stay_exclusive() {
        let mut store = GraphStore::with_pending(["Personal", "Income", "Loan", "Insurance"]);
        assert_exclusive(&store);

        assert!(store.omit_node("Loan", Some("no debts mentioned")));
        assert_eq!(store.omission_reason("Loan"), Some("no debts mentioned"));
        assert_exclusive(&store);

        assert!(store.reject_node("Insurance"));
        assert_exclusive(&store);

        assert!(store.mark_visited("Personal"));
        assert_exclusive(&store);

        assert!(store.revive_node("Loan"));
        assert_eq!(store.frontier_state("Loan"), Some(FrontierState::Pending));
        assert_eq!(store.omission_reason("Loan"), None);
        assert_exclusive(&store);
    }

    #[test]
    fn test_visited_is_monotonic() {
        let mut store = GraphStore::with_pending(["Personal"]);
        store.mark_visited("Personal");

        assert!(!store.omit_node("Personal", None));
        assert!(!store.reject_node("Personal"));
        assert!(!store.revive_node("Personal"));
        store.add_pending(["Personal"]);
        assert!(!store.mark_visited("Personal"));

        assert_eq!(store.frontier_state("Personal"), Some(FrontierState::Visited));
        assert!(store.pending().is_empty());
    }

    #[test]
    fn test_rejected_nodes_are_not_revived() {
        let mut store = GraphStore::with_pending(["Marriage"]);
        store.reject_node("Marriage");
        assert!(!store.revive_node("Marriage"));
        assert!(!store.omit_node("Marriage", None));
        store.add_pending(["Marriage"]);
        assert_eq!(store.frontier_state("Marriage"), Some(FrontierState::Rejected));
    }

    #[test]
    fn test_open_nodes_excludes_omitted() {
        let mut store = GraphStore::with_pending(["A", "B"]);
        store.omit_node("B", None);
        assert_eq!(store.open_nodes(), BTreeSet::from(["A".to_string()]));
        store.mark_visited("A");
        assert!(store.open_nodes().is_empty());
    }

    #[test]
    fn test_asked_question_ledger() {
        let mut store = GraphStore::new();
        store.mark_question_asked("Loan", "liabilities");
        store.mark_question_asked("Loan", "liabilities.home_loan.interest_rate");
        assert!(store.is_question_asked("Loan", "liabilities"));
        assert_eq!(
            store.unasked_fields(
                "Loan",
                &["liabilities".to_string(), "has_debt".to_string()]
            ),
            vec!["has_debt".to_string()]
        );
        store.clear_asked_questions("Loan");
        assert!(!store.is_question_asked("Loan", "liabilities"));
    }

    #[test]
    fn test_exploration_summary_empty() {
        assert_eq!(GraphStore::new().exploration_summary(), "No goals explored yet.");
    }

    #[test]
    fn test_edges_are_recorded() {
        let mut store = GraphStore::new();
        store.add_edge(None, "Personal", "question target");
        store.add_edge(Some("Personal"), "Income", "question target");
        assert_eq!(store.edges().len(), 2);
        assert_eq!(store.edges()[1].from_node.as_deref(), Some("Personal"));
    }
}
