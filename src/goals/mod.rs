//! Goal lifecycle: id normalization, possible/qualified/rejected transitions,
//! the scenario backlog and the goal-type detail table.

mod ledger;
mod scenario_queue;
mod types;

pub use ledger::{normalize_goal_id, AddOutcome, DropReason, GoalLedger};
pub use scenario_queue::{ScenarioQueue, ScenarioQueueEntry};
pub use types::{effective_goal_type, missing_details, needs_details, DetailRule, GoalType};
