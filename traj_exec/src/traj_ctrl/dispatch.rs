//! Goal dispatch and the follow loop thread
//!
//! [`TrajCtrl`] is the handle used by goal owners. It is shared between
//! threads: each goal is dispatched from its own thread and blocks there
//! until its motion terminates, while a dedicated thread runs the follow
//! loop at the control frequency.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::{
    eqpt::arm::OperationMode,
    tc::traj_ctrl::{GoalResult, Trajectory, Waypoint},
};
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc, Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use util::module::State;

// Internal
use super::{
    map_outcome, ActiveGoal, CancelToken, CtrlState, FailureCause, FollowLoop, GoalRecord,
    InputData, ModeArbiter, ModeStatus, Params, RejectCause, Termination, TrajCtrlError,
};
use crate::actuator::Actuator;
use crate::feedback::JointFeedback;
use crate::motion_gen::MotionGenerator;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of cycles a new goal waits for a requested preemption of the
/// executing motion before it is rejected as busy.
const PREEMPT_WAIT_CYCLES: u32 = 3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory controller handle.
pub struct TrajCtrl {
    shared: Arc<Shared>,

    follow_jh: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between goal threads and the follow loop thread.
struct Shared {
    follow: Mutex<FollowLoop>,

    feedback: Arc<JointFeedback>,

    actuator: Arc<dyn Actuator>,

    arbiter: ModeArbiter,

    /// Set by the goal owner, cleared when the follow loop acts on it or a
    /// new goal is accepted, before its mode arbitration.
    preempt: AtomicBool,

    /// Cancelled once the controller is shutting down.
    shutdown: CancelToken,

    /// Held while a goal is arbitrated and its motion begun, so that only
    /// one goal starts at a time.
    dispatch_lock: Mutex<()>,

    next_goal_id: AtomicU64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajCtrl {
    /// Create the controller and start the follow loop thread.
    pub fn new(
        params: Params,
        generator: Box<dyn MotionGenerator>,
        actuator: Arc<dyn Actuator>,
        feedback: Arc<JointFeedback>,
    ) -> Result<Self, TrajCtrlError> {
        params.validate()?;

        if feedback.dof() != params.dof() {
            return Err(TrajCtrlError::DofMismatch {
                expected: params.dof(),
                found: feedback.dof(),
            });
        }

        let mut follow = FollowLoop::new(params.clone(), generator);
        follow.init(params.clone())?;

        let shared = Arc::new(Shared {
            follow: Mutex::new(follow),
            feedback,
            actuator,
            arbiter: ModeArbiter::from_params(&params),
            preempt: AtomicBool::new(false),
            shutdown: CancelToken::new(),
            dispatch_lock: Mutex::new(()),
            next_goal_id: AtomicU64::new(0),
        });

        let thread_shared = shared.clone();
        let cycle_period = params.cycle_period();
        let follow_jh = thread::Builder::new()
            .name("traj_ctrl::follow".into())
            .spawn(move || follow_thread(thread_shared, cycle_period))
            .map_err(TrajCtrlError::ThreadSpawn)?;

        info!("TrajCtrl started");

        Ok(Self {
            shared,
            follow_jh: Mutex::new(Some(follow_jh)),
        })
    }

    /// Execute a goal, blocking until its motion terminates.
    pub fn dispatch(&self, goal: &Trajectory) -> Result<GoalResult, TrajCtrlError> {
        Ok(self.dispatch_with_record(goal)?.result)
    }

    /// Execute a goal, blocking until its motion terminates, and return a
    /// full record of how it ended.
    pub fn dispatch_with_record(&self, goal: &Trajectory) -> Result<GoalRecord, TrajCtrlError> {
        let goal_id = self.shared.next_goal_id.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();

        info!("Goal {} received with {} points", goal_id, goal.len());

        let (termination, start_config) = self.run_goal(goal_id, goal)?;
        let result = map_outcome(&termination);

        match result {
            GoalResult::Succeeded => info!("Goal {} succeeded", goal_id),
            GoalResult::Aborted => warn!("Goal {} aborted: {}", goal_id, termination),
        }

        Ok(GoalRecord {
            goal_id,
            num_points: goal.len(),
            result,
            termination,
            start_config,
            duration_s: start.elapsed().as_secs_f64(),
        })
    }

    /// Ask for the current motion to be abandoned.
    ///
    /// Acted on by the next control cycle if a motion is executing. The
    /// motion's setpoints are kept for the next goal to continue from.
    pub fn request_preempt(&self) {
        info!("Preemption requested");
        self.shared.preempt.store(true, Ordering::SeqCst);
    }

    /// Halt execution immediately.
    pub fn stop(&self) -> Result<(), TrajCtrlError> {
        self.shared.preempt.store(false, Ordering::SeqCst);
        self.shared.follow.lock()?.stop()
    }

    pub fn set_ptp_vel(&self, ptp_vel: f64) -> Result<(), TrajCtrlError> {
        self.shared.follow.lock()?.set_ptp_vel(ptp_vel);
        Ok(())
    }

    pub fn set_ptp_acc(&self, ptp_acc: f64) -> Result<(), TrajCtrlError> {
        self.shared.follow.lock()?.set_ptp_acc(ptp_acc);
        Ok(())
    }

    pub fn set_max_error(&self, max_error: f64) -> Result<(), TrajCtrlError> {
        self.shared.follow.lock()?.set_max_error(max_error);
        Ok(())
    }

    pub fn set_overlap_time(&self, overlap_time: f64) -> Result<(), TrajCtrlError> {
        self.shared.follow.lock()?.set_overlap_time(overlap_time);
        Ok(())
    }

    pub fn state(&self) -> Result<CtrlState, TrajCtrlError> {
        Ok(self.shared.follow.lock()?.state())
    }

    /// Copy of the current parameters, including runtime changes.
    pub fn params(&self) -> Result<Params, TrajCtrlError> {
        Ok(self.shared.follow.lock()?.params().clone())
    }

    pub fn feedback(&self) -> &Arc<JointFeedback> {
        &self.shared.feedback
    }

    /// Stop the follow loop.
    ///
    /// An executing goal fails on the next cycle, any goal waiting for a mode
    /// switch is rejected, and a final zero velocity demand is sent.
    pub fn shutdown(&self) -> Result<(), TrajCtrlError> {
        info!("TrajCtrl shutting down");
        self.shared.shutdown.cancel();

        let jh = self.follow_jh.lock()?.take();
        match jh {
            Some(jh) => jh.join().map_err(|_| TrajCtrlError::FollowThreadPanicked),
            None => Ok(()),
        }
    }

    /// Run a goal to its termination, also returning the configuration its
    /// motion started from, if it started.
    fn run_goal(
        &self,
        goal_id: u64,
        goal: &Trajectory,
    ) -> Result<(Termination, Option<Vec<f64>>), TrajCtrlError> {
        let points = match validate_goal(goal, self.shared.feedback.dof()) {
            Ok(p) => p,
            Err(reason) => {
                warn!("Goal {} is invalid: {}", goal_id, reason);
                return Ok((Termination::Rejected(RejectCause::InvalidGoal(reason)), None));
            }
        };

        let (done_rx, start_config) = {
            let _dispatch_guard = self.shared.dispatch_lock.lock()?;

            if !self.await_pending_preemption()? {
                warn!(
                    "Goal {} rejected, another motion is executing and has not been preempted",
                    goal_id
                );
                return Ok((Termination::Rejected(RejectCause::Busy), None));
            }

            // Any request made from here on applies to this goal's motion
            self.shared.preempt.store(false, Ordering::SeqCst);

            let status = self.shared.arbiter.request_mode(
                OperationMode::Velocity,
                self.shared.actuator.as_ref(),
                &self.shared.feedback,
                &self.shared.shutdown,
            )?;

            match status {
                ModeStatus::Ready => (),
                ModeStatus::TimedOut => {
                    return Ok((Termination::Rejected(RejectCause::ModeTimeout), None))
                }
                ModeStatus::Cancelled => {
                    return Ok((Termination::Rejected(RejectCause::Cancelled), None))
                }
            }

            let config = self.shared.feedback.configuration()?;
            let (done, done_rx) = mpsc::channel();

            // Checked under the follow lock so the follow loop's final cycle
            // always sees a goal started here.
            let mut follow = self.shared.follow.lock()?;
            if self.shared.shutdown.is_cancelled() {
                return Ok((Termination::Rejected(RejectCause::Cancelled), None));
            }

            match follow.start_motion(&points, &config, ActiveGoal { id: goal_id, done }) {
                Ok(kind) => info!("Goal {} started ({:?})", goal_id, kind),
                Err(TrajCtrlError::Busy) => {
                    return Ok((Termination::Rejected(RejectCause::Busy), None))
                }
                Err(TrajCtrlError::MotionGen(e)) => {
                    warn!("Could not begin motion for goal {}: {}", goal_id, e);
                    let cause = FailureCause::Generator(e.to_string());
                    return Ok((Termination::Failed(cause), None));
                }
                Err(e) => return Err(e),
            }

            (done_rx, config)
        };

        Ok((done_rx.recv()?, Some(start_config)))
    }

    /// Check whether a goal can start, giving a preemption which has been
    /// requested but not yet acted on up to [`PREEMPT_WAIT_CYCLES`] cycles to
    /// take effect.
    fn await_pending_preemption(&self) -> Result<bool, TrajCtrlError> {
        let cycle_period = self.shared.follow.lock()?.params().cycle_period();
        let deadline = Instant::now() + cycle_period * PREEMPT_WAIT_CYCLES;

        loop {
            // The flag is read before the state as the follow loop changes
            // the state before clearing the flag.
            let pending = self.shared.preempt.load(Ordering::SeqCst);
            if self.shared.follow.lock()?.state().accepts_goal() {
                return Ok(true);
            }

            if !pending || self.shared.shutdown.is_cancelled() || Instant::now() >= deadline {
                return Ok(false);
            }

            debug!("Waiting for the executing motion to be preempted");
            thread::sleep(cycle_period / 4);
        }
    }
}

impl Shared {
    /// Run one follow loop cycle and publish its output.
    fn cycle(&self, alive: bool) -> Result<(), TrajCtrlError> {
        let input = InputData {
            alive,
            config: self.feedback.configuration()?,
            mode: self.feedback.operation_mode()?,
            preempt_requested: self.preempt.load(Ordering::SeqCst),
        };

        let (output, report) = self.follow.lock()?.proc(&input)?;

        if report.preempted {
            self.preempt.store(false, Ordering::SeqCst);
        }

        if let Some(dems) = output {
            if let Err(e) = self.actuator.send_velocities(&dems) {
                warn!("Could not send velocity demands: {}", e);
            }
        }

        Ok(())
    }

    /// Send a single zero velocity demand.
    fn make_safe(&self) -> Result<(), TrajCtrlError> {
        let dems = self.follow.lock()?.zero_demands();
        if let Err(e) = self.actuator.send_velocities(&dems) {
            error!("Could not send final zero velocity demand: {}", e);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Follow loop thread body.
fn follow_thread(shared: Arc<Shared>, cycle_period: Duration) {
    info!(
        "Follow loop running at {:.1} Hz",
        1.0 / cycle_period.as_secs_f64()
    );

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        let alive = !shared.shutdown.is_cancelled();

        if let Err(e) = shared.cycle(alive) {
            warn!("Error during TrajCtrl processing: {}", e);
        }

        if !alive {
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Follow cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            ),
        }
    }

    if let Err(e) = shared.make_safe() {
        error!("Could not make the arm safe: {}", e);
    }

    debug!("Follow loop stopped");
}

/// Check a goal against the controller's DOF, filling in missing velocities
/// and accelerations.
fn validate_goal(goal: &Trajectory, dof: usize) -> Result<Vec<Waypoint>, String> {
    if goal.is_empty() {
        return Err("trajectory has no points".into());
    }

    goal.points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let p = p.clone().normalised();
            if p.has_dof(dof) {
                Ok(p)
            } else {
                Err(format!(
                    "point {} has {} positions, {} velocities and {} accelerations, expected {}",
                    i,
                    p.positions.len(),
                    p.velocities.len(),
                    p.accelerations.len(),
                    dof
                ))
            }
        })
        .collect()
}
