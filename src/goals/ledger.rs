//! Goal lifecycle transitions.
//!
//! Goals move between three buckets held by [`GraphStore`]: possible,
//! qualified and rejected. Every transition goes through [`GoalLedger`] so a
//! goal id never sits in two buckets at once.

use chrono::Utc;
use tracing::{debug, info};

use crate::graph::{DeferredGoal, GoalPatch, GoalRecord, GraphStore, RejectionSnapshot};

/// Characters that mark a supplied id as prose rather than an identifier.
const PROSE_MARKERS: [char; 5] = ['.', ',', '!', '?', '\''];

/// Small tolerance for comparing confidences after float addition.
const CONFIDENCE_EPSILON: f64 = 1e-9;

/// Normalize a goal id to stable snake_case.
///
/// When the id is missing, longer than three words or contains punctuation,
/// the description is used instead (if there is one). Returns `None` when
/// nothing usable remains.
pub fn normalize_goal_id(goal_id: Option<&str>, description: Option<&str>) -> Option<String> {
    let raw = goal_id.unwrap_or("").trim();
    let looks_like_prose = raw.is_empty()
        || raw.split_whitespace().count() > 3
        || raw.contains(&PROSE_MARKERS[..]);

    let source = match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(desc) if looks_like_prose => desc,
        _ => raw,
    };

    let mut id = String::with_capacity(source.len());
    let mut pending_sep = false;
    for ch in source.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_sep && !id.is_empty() {
                id.push('_');
            }
            pending_sep = false;
            id.push(ch);
        } else {
            pending_sep = true;
        }
    }

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn normalize_description(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Why a proposed goal was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    InvalidId,
    AlreadyQualified,
    DuplicateDescription,
    RejectedWithoutNewSignal,
}

/// Result of [`GoalLedger::add_possible`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(String),
    Updated(String),
    Reopened(String),
    Dropped(DropReason),
}

impl AddOutcome {
    /// Goal id now in the possible bucket, if any.
    pub fn goal_id(&self) -> Option<&str> {
        match self {
            AddOutcome::Added(id) | AddOutcome::Updated(id) | AddOutcome::Reopened(id) => {
                Some(id)
            }
            AddOutcome::Dropped(_) => None,
        }
    }
}

/// Goal lifecycle rules.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalLedger {
    reopen_confidence_delta: f64,
}

impl Default for GoalLedger {
    fn default() -> Self {
        Self::new(0.15)
    }
}

impl GoalLedger {
    /// Ledger reopening rejected goals when confidence rises by `delta`.
    pub fn new(reopen_confidence_delta: f64) -> Self {
        Self {
            reopen_confidence_delta,
        }
    }

    /// Priority assigned to the next newly qualified goal.
    pub fn next_priority(&self, store: &GraphStore) -> u32 {
        store.qualified_goals.len() as u32 + 1
    }

    /// Propose a goal.
    ///
    /// Qualified goals and description duplicates of qualified goals are
    /// dropped. A rejected goal reopens only with new evidence or a
    /// sufficiently higher confidence.
    pub fn add_possible(
        &self,
        store: &mut GraphStore,
        goal_id: Option<&str>,
        patch: GoalPatch,
    ) -> AddOutcome {
        let Some(id) = normalize_goal_id(goal_id, patch.description.as_deref()) else {
            debug!(raw = ?goal_id, "Dropping goal with unusable id");
            return AddOutcome::Dropped(DropReason::InvalidId);
        };

        if store.qualified_goals.contains_key(&id) {
            return AddOutcome::Dropped(DropReason::AlreadyQualified);
        }

        if let Some(desc) = patch.description.as_deref().map(normalize_description) {
            let duplicate = !desc.is_empty()
                && store.qualified_goals.values().any(|g| {
                    g.description
                        .as_deref()
                        .map(normalize_description)
                        .is_some_and(|d| d == desc)
                });
            if duplicate {
                debug!(goal_id = %id, "Dropping goal duplicating a qualified description");
                return AddOutcome::Dropped(DropReason::DuplicateDescription);
            }
        }

        let mut reopened_from = None;
        if store.rejected_goals.contains(&id) {
            let previous = store.rejection_snapshots.get(&id);
            if !self.should_reopen(previous, &patch) {
                debug!(goal_id = %id, "Rejected goal re-proposed without new signal");
                return AddOutcome::Dropped(DropReason::RejectedWithoutNewSignal);
            }
            store.rejected_goals.remove(&id);
            reopened_from = Some(store.rejection_snapshots.remove(&id));
            info!(goal_id = %id, "Reopening rejected goal");
        }

        let existed = store.possible_goals.contains_key(&id);
        let record = store
            .possible_goals
            .entry(id.clone())
            .or_insert_with(|| GoalRecord::new(id.clone()));
        record.merge(&patch);

        match reopened_from {
            Some(previous) => {
                record.reopened_from_rejection = true;
                record.previous_rejection = previous;
                AddOutcome::Reopened(id)
            }
            None if existed => AddOutcome::Updated(id),
            None => AddOutcome::Added(id),
        }
    }

    fn should_reopen(&self, previous: Option<&RejectionSnapshot>, patch: &GoalPatch) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        let new_evidence = patch
            .evidence
            .as_ref()
            .is_some_and(|ev| ev.difference(&previous.evidence).next().is_some());
        let confidence_jump = match (patch.confidence, previous.confidence) {
            (Some(new), Some(old)) => {
                new + CONFIDENCE_EPSILON >= old + self.reopen_confidence_delta
            }
            _ => false,
        };
        new_evidence || confidence_jump
    }

    /// Qualify a goal, merging the supplied fields over what is known.
    ///
    /// Returns the normalized id, or `None` if the id is unusable.
    pub fn qualify(&self, store: &mut GraphStore, goal_id: &str, patch: GoalPatch) -> Option<String> {
        let id = normalize_goal_id(Some(goal_id), patch.description.as_deref())?;

        store.rejected_goals.remove(&id);
        store.rejection_snapshots.remove(&id);

        let mut record = store
            .qualified_goals
            .remove(&id)
            .or_else(|| store.possible_goals.remove(&id))
            .unwrap_or_else(|| GoalRecord::new(id.clone()));
        store.possible_goals.remove(&id);
        record.merge(&patch);

        info!(goal_id = %id, priority = ?record.priority, "Goal qualified");
        store.qualified_goals.insert(id.clone(), record);
        Some(id)
    }

    /// Reject a goal. Idempotent.
    ///
    /// Returns true if the goal changed bucket.
    pub fn reject(&self, store: &mut GraphStore, goal_id: &str) -> bool {
        let Some(id) = normalize_goal_id(Some(goal_id), None) else {
            return false;
        };

        let from_possible = store.possible_goals.remove(&id);
        let from_qualified = store.qualified_goals.remove(&id);
        let source = from_possible.or(from_qualified);

        if source.is_none() && store.rejected_goals.contains(&id) {
            return false;
        }

        let snapshot = match source {
            Some(record) => RejectionSnapshot {
                confidence: record.confidence,
                evidence: record.evidence,
                description: record.description,
                rejected_at: Utc::now(),
            },
            None => RejectionSnapshot {
                confidence: None,
                evidence: Default::default(),
                description: None,
                rejected_at: Utc::now(),
            },
        };
        store.rejection_snapshots.insert(id.clone(), snapshot);
        store.rejected_goals.insert(id.clone());
        info!(goal_id = %id, "Goal rejected");
        true
    }

    /// Record that the user wants to revisit a goal later.
    ///
    /// Deferral is tracked outside the status buckets.
    pub fn defer(&self, store: &mut GraphStore, goal_id: &str, description: Option<&str>) -> Option<String> {
        let id = normalize_goal_id(Some(goal_id), description)?;
        store.deferred_goals.insert(
            id.clone(),
            DeferredGoal {
                goal_id: id.clone(),
                description: description.map(str::to_string),
                deferred_at: Utc::now(),
            },
        );
        info!(goal_id = %id, "Goal deferred");
        Some(id)
    }

    /// Merge extracted detail fields into a qualified goal.
    pub fn merge_details(&self, store: &mut GraphStore, goal_id: &str, patch: &GoalPatch) -> bool {
        match store.qualified_goals.get_mut(goal_id) {
            Some(record) => {
                record.merge(patch);
                true
            }
            None => false,
        }
    }

    /// Close the detail sub-dialogue for a goal.
    ///
    /// A goal with no amount or timing captured is also marked deferred.
    pub fn finish_details(&self, store: &mut GraphStore, goal_id: &str) -> bool {
        match store.qualified_goals.get_mut(goal_id) {
            Some(record) => {
                record.details_complete = true;
                if !record.has_any_detail() {
                    record.details_deferred = true;
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GoalStatus;
    use pretty_assertions::assert_eq;

    fn patch(confidence: f64, evidence: &[&str]) -> GoalPatch {
        GoalPatch::default()
            .with_description("Pay off the home loan early")
            .with_confidence(confidence)
            .with_evidence(evidence.iter().copied())
    }

    #[test]
    fn test_normalize_plain_ids() {
        assert_eq!(normalize_goal_id(Some("Home Purchase"), None).as_deref(), Some("home_purchase"));
        assert_eq!(normalize_goal_id(Some("  __Retire--Early__ "), None).as_deref(), Some("retire_early"));
        assert_eq!(normalize_goal_id(Some("kids_uni_2030"), None).as_deref(), Some("kids_uni_2030"));
    }

    #[test]
    fn test_normalize_falls_back_to_description_for_prose() {
        assert_eq!(
            normalize_goal_id(Some("I want to buy a house"), Some("Buy a house")).as_deref(),
            Some("buy_a_house")
        );
        assert_eq!(
            normalize_goal_id(Some("travel!"), Some("Europe trip")).as_deref(),
            Some("europe_trip")
        );
        assert_eq!(
            normalize_goal_id(None, Some("Emergency fund")).as_deref(),
            Some("emergency_fund")
        );
        // Prose without a description is still normalized.
        assert_eq!(
            normalize_goal_id(Some("travel!"), None).as_deref(),
            Some("travel")
        );
    }

    #[test]
    fn test_normalize_invalid() {
        assert_eq!(normalize_goal_id(None, None), None);
        assert_eq!(normalize_goal_id(Some("  "), Some("!!")), None);
        assert_eq!(normalize_goal_id(Some("---"), None), None);
    }

    #[test]
    fn test_add_possible_and_update() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        assert_eq!(
            ledger.add_possible(&mut store, Some("debt_free"), patch(0.5, &["Loan"])),
            AddOutcome::Added("debt_free".to_string())
        );
        assert_eq!(
            ledger.add_possible(&mut store, Some("debt_free"), patch(0.6, &["Loan"])),
            AddOutcome::Updated("debt_free".to_string())
        );
        assert_eq!(store.possible_goals()["debt_free"].confidence, Some(0.6));
    }

    #[test]
    fn test_add_possible_drops_qualified_and_duplicates() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.qualify(
            &mut store,
            "debt_free",
            GoalPatch::default().with_description("Pay off the home loan early"),
        );

        assert_eq!(
            ledger.add_possible(&mut store, Some("debt_free"), GoalPatch::default()),
            AddOutcome::Dropped(DropReason::AlreadyQualified)
        );
        assert_eq!(
            ledger.add_possible(
                &mut store,
                Some("mortgage_freedom"),
                GoalPatch::default().with_description("  pay off the HOME loan   early "),
            ),
            AddOutcome::Dropped(DropReason::DuplicateDescription)
        );
        assert_eq!(
            ledger.add_possible(&mut store, Some("..."), GoalPatch::default()),
            AddOutcome::Dropped(DropReason::InvalidId)
        );
        assert!(store.possible_goals().is_empty());
    }

    #[test]
    fn test_reopen_rule() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.add_possible(&mut store, Some("debt_free"), patch(0.40, &["Income"]));
        assert!(ledger.reject(&mut store, "debt_free"));

        // Same evidence, identical confidence: stays rejected.
        assert_eq!(
            ledger.add_possible(&mut store, Some("debt_free"), patch(0.40, &["Income"])),
            AddOutcome::Dropped(DropReason::RejectedWithoutNewSignal)
        );
        // Small confidence gain, no new evidence: stays rejected.
        assert_eq!(
            ledger.add_possible(&mut store, Some("debt_free"), patch(0.50, &["Income"])),
            AddOutcome::Dropped(DropReason::RejectedWithoutNewSignal)
        );
        assert_eq!(store.goal_status("debt_free"), Some(GoalStatus::Rejected));

        // New evidence source reopens.
        assert_eq!(
            ledger.add_possible(&mut store, Some("debt_free"), patch(0.40, &["Income", "Savings"])),
            AddOutcome::Reopened("debt_free".to_string())
        );
        let record = &store.possible_goals()["debt_free"];
        assert!(record.reopened_from_rejection);
        assert_eq!(record.previous_rejection.as_ref().unwrap().confidence, Some(0.40));
        assert!(store.rejection_snapshot("debt_free").is_none());
    }

    #[test]
    fn test_reopen_on_confidence_jump() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.add_possible(&mut store, Some("travel"), patch(0.40, &["Savings"]));
        ledger.reject(&mut store, "travel");
        assert_eq!(
            ledger.add_possible(&mut store, Some("travel"), patch(0.55, &["Savings"])),
            AddOutcome::Reopened("travel".to_string())
        );
    }

    #[test]
    fn test_qualify_is_idempotent() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.add_possible(&mut store, Some("retirement"), patch(0.8, &["Retirement"]));

        let data = GoalPatch::default().with_priority(1).with_confidence(1.0);
        ledger.qualify(&mut store, "retirement", data.clone());
        let once = store.clone();
        ledger.qualify(&mut store, "retirement", data);
        assert_eq!(store, once);

        assert_eq!(store.goal_status("retirement"), Some(GoalStatus::Qualified));
        assert!(store.possible_goals().is_empty());
        let record = &store.qualified_goals()["retirement"];
        assert_eq!(record.evidence.len(), 1);
        assert_eq!(record.priority, Some(1));
    }

    #[test]
    fn test_qualify_clears_rejection() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.reject(&mut store, "wedding");
        ledger.qualify(&mut store, "wedding", GoalPatch::default());
        assert_eq!(store.goal_status("wedding"), Some(GoalStatus::Qualified));
        assert!(!store.rejected_goals().contains("wedding"));
    }

    #[test]
    fn test_reject_prefers_possible_data_and_is_idempotent() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.add_possible(&mut store, Some("travel"), patch(0.3, &["Savings"]));
        assert!(ledger.reject(&mut store, "travel"));
        let first = store.rejection_snapshot("travel").cloned().unwrap();
        assert_eq!(first.confidence, Some(0.3));

        assert!(!ledger.reject(&mut store, "travel"));
        assert_eq!(store.rejection_snapshot("travel"), Some(&first));
    }

    #[test]
    fn test_reject_qualified_goal() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.qualify(&mut store, "wedding", GoalPatch::default().with_confidence(0.9));
        assert!(ledger.reject(&mut store, "wedding"));
        assert_eq!(store.goal_status("wedding"), Some(GoalStatus::Rejected));
        assert_eq!(store.rejection_snapshot("wedding").unwrap().confidence, Some(0.9));
    }

    #[test]
    fn test_defer_is_tracked_separately() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.add_possible(&mut store, Some("aged_care"), GoalPatch::default());
        ledger.defer(&mut store, "aged_care", Some("Care for parents"));
        assert_eq!(store.goal_status("aged_care"), Some(GoalStatus::Possible));
        assert!(store.deferred_goals().contains_key("aged_care"));
    }

    #[test]
    fn test_finish_details_marks_deferred_without_details() {
        let ledger = GoalLedger::default();
        let mut store = GraphStore::new();
        ledger.qualify(&mut store, "travel", GoalPatch::default());
        ledger.qualify(&mut store, "retirement", GoalPatch::default());
        let mut details = GoalPatch::default();
        details.target_amount = Some(1_200_000.0);
        assert!(ledger.merge_details(&mut store, "retirement", &details));

        ledger.finish_details(&mut store, "travel");
        ledger.finish_details(&mut store, "retirement");
        assert!(store.qualified_goals()["travel"].details_deferred);
        assert!(!store.qualified_goals()["retirement"].details_deferred);
        assert!(store.qualified_goals()["retirement"].details_complete);
    }
}
