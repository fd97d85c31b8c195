//! # Telecommand processor module
//!
//! The telecommand processor handles TCs coming from the script. Goals block
//! until their motion terminates, so each one is dispatched from its own
//! thread.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

// Internal
use comms_if::{
    eqpt::arm::ModeReport,
    tc::{traj_ctrl::Trajectory, Tc, TcParseError, TcType},
};
use traj_lib::traj_ctrl::{GoalRecord, TrajCtrl, TrajCtrlError};
use util::session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Threads of goals which have been dispatched.
#[derive(Default)]
pub(crate) struct GoalThreads {
    handles: Vec<JoinHandle<()>>,
    num_spawned: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum TcExecError {
    #[error(transparent)]
    Parse(#[from] TcParseError),

    #[error(transparent)]
    TrajCtrl(#[from] TrajCtrlError),

    #[error("Could not spawn goal thread: {0}")]
    SpawnGoal(std::io::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
pub(crate) fn exec(traj_ctrl: &Arc<TrajCtrl>, tc: &Tc, goals: &mut GoalThreads) {
    debug!("Recieved {:?} command", tc.tc_type);

    if let Err(e) = exec_inner(traj_ctrl, tc, goals) {
        warn!("Could not execute {:?} TC: {}", tc.tc_type, e);
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GoalThreads {
    /// Number of goal threads which have not yet been joined.
    pub(crate) fn num_pending(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every dispatched goal to terminate.
    pub(crate) fn join_all(&mut self) {
        for jh in self.handles.drain(..) {
            if jh.join().is_err() {
                error!("A goal thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn exec_inner(
    traj_ctrl: &Arc<TrajCtrl>,
    tc: &Tc,
    goals: &mut GoalThreads,
) -> Result<(), TcExecError> {
    match tc.tc_type {
        TcType::Goal => {
            let traj: Trajectory = tc.decode_payload()?;
            spawn_goal(traj_ctrl.clone(), traj, goals)?;
        }
        TcType::Preempt => traj_ctrl.request_preempt(),
        TcType::Stop => traj_ctrl.stop()?,
        TcType::SetVel => traj_ctrl.set_ptp_vel(tc.decode_payload()?)?,
        TcType::SetAcc => traj_ctrl.set_ptp_acc(tc.decode_payload()?)?,
        TcType::SetMaxError => traj_ctrl.set_max_error(tc.decode_payload()?)?,
        TcType::SetOverlapTime => traj_ctrl.set_overlap_time(tc.decode_payload()?)?,
        TcType::SetOperationMode => {
            // Stands in for the actuator reporting a mode change
            let report: ModeReport = tc.decode_payload()?;
            traj_ctrl
                .feedback()
                .update_reported_mode(&report)
                .map_err(TrajCtrlError::from)?;
        }
    }

    Ok(())
}

fn spawn_goal(
    traj_ctrl: Arc<TrajCtrl>,
    traj: Trajectory,
    goals: &mut GoalThreads,
) -> Result<(), TcExecError> {
    let jh = thread::Builder::new()
        .name(format!("goal::{}", goals.num_spawned))
        .spawn(move || match traj_ctrl.dispatch_with_record(&traj) {
            Ok(record) => save_record(record),
            Err(e) => error!("Goal dispatch failed: {}", e),
        })
        .map_err(TcExecError::SpawnGoal)?;

    goals.num_spawned += 1;
    goals.handles.push(jh);

    Ok(())
}

fn save_record(record: GoalRecord) {
    info!(
        "Goal {} finished in {:.2} s: {:?}",
        record.goal_id, record.duration_s, record.result
    );
    session::save(format!("goals/goal_{}.json", record.goal_id), record);
}
