//! Goal outcome mapping

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::tc::traj_ctrl::GoalResult;
use serde::Serialize;

use super::state::Termination;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Summary of one finished goal, suitable for saving into the session.
#[derive(Debug, Clone, Serialize)]
pub struct GoalRecord {
    pub goal_id: u64,
    pub num_points: usize,
    pub result: GoalResult,
    pub termination: Termination,

    /// Joint configuration the goal's motion started from, `None` if it
    /// never started.
    pub start_config: Option<Vec<f64>>,

    pub duration_s: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map how a goal ended onto the result reported to the goal's owner.
///
/// There is no distinct rejected result, rejections are reported as
/// aborted.
pub fn map_outcome(termination: &Termination) -> GoalResult {
    match termination {
        Termination::Rejected(_) => GoalResult::Aborted,
        Termination::Failed(_) => GoalResult::Aborted,
        Termination::Finished => GoalResult::Succeeded,
    }
}
