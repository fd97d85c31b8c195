//! Follow loop
//!
//! [`FollowLoop`] owns the motion generator and the controller state. Its
//! cyclic processing (see [`State::proc`]) is run once per control cycle by
//! the follow thread, and goal handling starts motions on it through
//! [`FollowLoop::start_motion`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::{
    eqpt::arm::{JointVelocities, OperationMode},
    tc::traj_ctrl::Waypoint,
};
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::sync::mpsc::Sender;
use util::module::State;

// Internal
use super::{
    splice::{prepend_current, splice},
    state::{CtrlEvent, CtrlState, FailureCause, Termination},
    Params, TrajCtrlError, WATCHDOG_CYCLES,
};
use crate::motion_gen::MotionGenerator;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Follow loop state
pub struct FollowLoop {
    pub(crate) params: Params,

    pub(crate) state: CtrlState,

    /// Number of non-executing cycles since the controller last stopped
    /// moving.
    pub(crate) watchdog_count: u32,

    pub(crate) report: StatusReport,

    generator: Box<dyn MotionGenerator>,

    active_goal: Option<ActiveGoal>,
}

/// The goal which owns the current motion.
pub struct ActiveGoal {
    pub id: u64,

    /// Receives the goal's termination, exactly once.
    pub done: Sender<Termination>,
}

/// Input data to the follow loop.
#[derive(Debug, Clone)]
pub struct InputData {
    /// False once the controller is shutting down.
    pub alive: bool,

    /// Current joint configuration.
    pub config: Vec<f64>,

    /// Mirrored actuator operation mode.
    pub mode: OperationMode,

    /// True if the goal owner has asked for the current motion to be
    /// abandoned.
    pub preempt_requested: bool,
}

/// Status report for follow loop processing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// State at the end of the cycle.
    pub state: CtrlState,

    pub watchdog_count: u32,

    /// Why the motion failed this cycle, if it did.
    pub failure: Option<FailureCause>,

    /// True if a preemption was acted on this cycle.
    pub preempted: bool,

    /// True if velocity demands were produced this cycle.
    pub published: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a motion was begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    /// Direct motion to a single target.
    PointToPoint,

    /// Spline through the goal's waypoints, starting at the current
    /// configuration.
    Trajectory,

    /// Continuation of a preempted motion.
    Spliced,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for FollowLoop {
    type InitData = Params;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = Option<JointVelocities>;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the follow loop, configuring the motion generator.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        init_data.validate()?;

        info!(
            "Starting controller with DOF: {} PTPvel: {} PTPAcc: {} maxError {}",
            init_data.dof(),
            init_data.ptp_vel,
            init_data.ptp_acc,
            init_data.max_error
        );

        self.generator.configure(&init_data.generator_config());
        self.params = init_data;
        self.state = CtrlState::Idle;
        self.watchdog_count = 0;
        self.report = StatusReport::default();

        if let Some(goal) = self.active_goal.take() {
            Self::terminate(goal, Termination::Failed(FailureCause::Stopped));
        }

        Ok(())
    }

    /// Perform one control cycle.
    ///
    /// While executing, the checks run in a fixed order: liveness and mode,
    /// then preemption, then the generator step. Each earlier check that
    /// fires ends the cycle without publishing.
    ///
    /// While not executing, zero velocity is published for the first
    /// [`WATCHDOG_CYCLES`] cycles, then nothing.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        let output = match self.state {
            CtrlState::Executing => self.proc_executing(input_data)?,
            CtrlState::Idle | CtrlState::Preempted => self.proc_watchdog(),
        };

        self.report.state = self.state;
        self.report.watchdog_count = self.watchdog_count;
        self.report.published = output.is_some();

        Ok((output, self.report.clone()))
    }
}

impl FollowLoop {
    /// Create a new follow loop around the given generator.
    ///
    /// [`State::init`] must be called before processing.
    pub fn new(params: Params, generator: Box<dyn MotionGenerator>) -> Self {
        Self {
            params,
            state: CtrlState::Idle,
            watchdog_count: 0,
            report: StatusReport::default(),
            generator,
            active_goal: None,
        }
    }

    pub fn state(&self) -> CtrlState {
        self.state
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Begin the motion for a goal which has passed mode arbitration.
    ///
    /// From `Preempted` the goal is spliced onto the abandoned motion. From
    /// `Idle` a single waypoint is a point-to-point target and anything
    /// longer is a trajectory starting at `config`.
    ///
    /// On success the goal becomes the owner of the motion and will receive
    /// its termination.
    pub fn start_motion(
        &mut self,
        points: &[Waypoint],
        config: &[f64],
        goal: ActiveGoal,
    ) -> Result<MotionKind, TrajCtrlError> {
        let dof = self.params.dof();
        if config.len() != dof {
            return Err(TrajCtrlError::DofMismatch {
                expected: dof,
                found: config.len(),
            });
        }

        let kind = match self.state {
            CtrlState::Executing => return Err(TrajCtrlError::Busy),
            CtrlState::Preempted => {
                info!("There is an old trajectory currently running, splicing");
                let retained = self.generator.retained();
                let spliced = splice(points, &retained, config)?;
                self.generator.halt();
                self.generator.begin_trajectory(&spliced, &retained.last)?;
                MotionKind::Spliced
            }
            CtrlState::Idle if points.len() == 1 => {
                self.generator.halt();
                self.generator
                    .begin_point_target(&points[0].positions, config)?;
                MotionKind::PointToPoint
            }
            CtrlState::Idle => {
                self.generator.halt();
                self.generator
                    .begin_trajectory(&prepend_current(points, config), config)?;
                MotionKind::Trajectory
            }
        };

        self.transition(CtrlEvent::GoalStarted)?;
        self.active_goal = Some(goal);

        debug!("Goal motion begun as {:?}", kind);

        Ok(kind)
    }

    /// Halt execution immediately, failing the goal that owns the motion.
    pub fn stop(&mut self) -> Result<(), TrajCtrlError> {
        info!("Stopping trajectory controller.");

        self.generator.halt();
        self.transition(CtrlEvent::Stopped)?;

        if let Some(goal) = self.active_goal.take() {
            Self::terminate(goal, Termination::Failed(FailureCause::Stopped));
        }

        Ok(())
    }

    pub fn set_ptp_vel(&mut self, ptp_vel: f64) {
        info!("Setting velocity to {}", ptp_vel);
        self.params.ptp_vel = ptp_vel;
        self.generator.set_ptp_vel(ptp_vel);
    }

    pub fn set_ptp_acc(&mut self, ptp_acc: f64) {
        info!("Setting acceleration to {}", ptp_acc);
        self.params.ptp_acc = ptp_acc;
        self.generator.set_ptp_acc(ptp_acc);
    }

    pub fn set_max_error(&mut self, max_error: f64) {
        info!("Setting allowed error to {}", max_error);
        self.params.max_error = max_error;
        self.generator.set_allowed_error(max_error);
    }

    pub fn set_overlap_time(&mut self, overlap_time: f64) {
        info!("Setting overlap time to {}", overlap_time);
        self.params.overlap_time = overlap_time;
        self.generator.set_overlap_time(overlap_time);
    }

    /// Velocity demands with every joint at zero.
    pub fn zero_demands(&self) -> JointVelocities {
        JointVelocities::zeros(&self.params.joint_names, &self.params.velocity_unit)
    }

    fn proc_executing(
        &mut self,
        input_data: &InputData,
    ) -> Result<Option<JointVelocities>, TrajCtrlError> {
        self.watchdog_count = 0;

        if !input_data.alive {
            self.fail(FailureCause::NotAlive)?;
            return Ok(None);
        }

        if input_data.mode != OperationMode::Velocity {
            warn!(
                "Actuator left velocity mode (now {}), aborting motion",
                input_data.mode
            );
            self.fail(FailureCause::ModeDrift(input_data.mode))?;
            return Ok(None);
        }

        if input_data.preempt_requested {
            info!("Preempted trajectory action");

            // The generator keeps its retained setpoints for the next splice
            self.generator.halt();
            self.transition(CtrlEvent::PreemptObserved)?;
            self.report.failure = Some(FailureCause::Preempted);
            self.report.preempted = true;

            if let Some(goal) = self.active_goal.take() {
                Self::terminate(goal, Termination::Failed(FailureCause::Preempted));
            }

            return Ok(None);
        }

        let step = match self.generator.step(&input_data.config) {
            Ok(s) => s,
            Err(e) => {
                warn!("A controller error occured: {}", e);
                self.fail(FailureCause::Generator(e.to_string()))?;
                return Ok(None);
            }
        };

        if step.velocities.len() != self.params.dof() {
            warn!(
                "Generator produced {} velocities for {} joints",
                step.velocities.len(),
                self.params.dof()
            );
            self.fail(FailureCause::Generator(format!(
                "expected {} velocities, got {}",
                self.params.dof(),
                step.velocities.len()
            )))?;
            return Ok(None);
        }

        trace!("Generator step: {:?}", step);

        if !step.moving {
            info!("Trajectory finished");
            self.transition(CtrlEvent::Finished)?;

            if let Some(goal) = self.active_goal.take() {
                Self::terminate(goal, Termination::Finished);
            }
        }

        Ok(Some(JointVelocities::from_values(
            &self.params.joint_names,
            &self.params.velocity_unit,
            &step.velocities,
        )))
    }

    fn proc_watchdog(&mut self) -> Option<JointVelocities> {
        let output = if self.watchdog_count < WATCHDOG_CYCLES {
            Some(self.zero_demands())
        } else {
            None
        };

        self.watchdog_count = self.watchdog_count.saturating_add(1);

        output
    }

    /// End the current motion as failed.
    fn fail(&mut self, cause: FailureCause) -> Result<(), TrajCtrlError> {
        self.generator.halt();
        self.transition(CtrlEvent::Failed)?;
        self.report.failure = Some(cause.clone());

        if let Some(goal) = self.active_goal.take() {
            Self::terminate(goal, Termination::Failed(cause));
        }

        Ok(())
    }

    fn transition(&mut self, event: CtrlEvent) -> Result<(), TrajCtrlError> {
        let next = self.state.next(event)?;

        // Entering a stopped state restarts the zero velocity watchdog
        if next != self.state && !next.is_executing() {
            self.watchdog_count = 0;
        }

        debug!("{} --{:?}--> {}", self.state, event, next);
        self.state = next;

        Ok(())
    }

    fn terminate(goal: ActiveGoal, termination: Termination) {
        debug!("Goal {} terminated: {}", goal.id, termination);

        // The goal owner may have given up waiting
        if goal.done.send(termination).is_err() {
            debug!("Goal {} is no longer waiting for its result", goal.id);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::motion_gen::{GeneratorConfig, MotionGenError, RetainedSetpoints, StepOutput};
    use std::sync::mpsc::{channel, Receiver};
    use std::sync::{Arc, Mutex};

    const DOF: usize = 3;

    /// Calls made on the fake generator.
    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Configure(GeneratorConfig),
        PointTarget(Vec<f64>, Vec<f64>),
        Trajectory(Vec<Waypoint>, Vec<f64>),
        Step,
        Halt,
        SetPtpVel(f64),
        SetPtpAcc(f64),
    }

    /// Generator which finishes after a fixed number of steps, optionally
    /// failing on a given step.
    struct FakeGenerator {
        calls: Arc<Mutex<Vec<Call>>>,
        steps_to_finish: usize,
        fail_on_step: Option<usize>,
        steps: usize,
        moving: bool,
        retained: RetainedSetpoints,
    }

    impl MotionGenerator for FakeGenerator {
        fn configure(&mut self, config: &GeneratorConfig) {
            self.calls.lock().unwrap().push(Call::Configure(config.clone()));
        }
        fn set_ptp_vel(&mut self, v: f64) {
            self.calls.lock().unwrap().push(Call::SetPtpVel(v));
        }
        fn set_ptp_acc(&mut self, a: f64) {
            self.calls.lock().unwrap().push(Call::SetPtpAcc(a));
        }
        fn set_allowed_error(&mut self, _: f64) {}
        fn set_overlap_time(&mut self, _: f64) {}

        fn begin_point_target(
            &mut self,
            target: &[f64],
            start: &[f64],
        ) -> Result<(), MotionGenError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::PointTarget(target.to_vec(), start.to_vec()));
            self.moving = true;
            self.steps = 0;
            Ok(())
        }

        fn begin_trajectory(
            &mut self,
            waypoints: &[Waypoint],
            start: &[f64],
        ) -> Result<(), MotionGenError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Trajectory(waypoints.to_vec(), start.to_vec()));
            self.moving = true;
            self.steps = 0;
            Ok(())
        }

        fn step(&mut self, current: &[f64]) -> Result<StepOutput, MotionGenError> {
            self.calls.lock().unwrap().push(Call::Step);
            self.steps += 1;

            if Some(self.steps) == self.fail_on_step {
                return Err(MotionGenError::TrackingError {
                    joint: 0,
                    error: 1.0,
                    allowed: 0.7,
                });
            }

            let setpoint: Vec<f64> = current.iter().map(|c| c + self.steps as f64).collect();
            self.retained.push(&setpoint);

            if self.steps >= self.steps_to_finish {
                self.moving = false;
            }

            Ok(StepOutput {
                velocities: vec![0.1 * self.steps as f64; DOF],
                moving: self.moving,
            })
        }

        fn is_moving(&self) -> bool {
            self.moving
        }

        fn halt(&mut self) {
            self.calls.lock().unwrap().push(Call::Halt);
            self.moving = false;
        }

        fn retained(&self) -> RetainedSetpoints {
            self.retained.clone()
        }
    }

    fn names() -> Vec<String> {
        vec!["arm_1_joint".into(), "arm_2_joint".into(), "arm_3_joint".into()]
    }

    fn follow_loop(
        steps_to_finish: usize,
        fail_on_step: Option<usize>,
    ) -> (FollowLoop, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let gen = FakeGenerator {
            calls: calls.clone(),
            steps_to_finish,
            fail_on_step,
            steps: 0,
            moving: false,
            retained: RetainedSetpoints::at(&[0.0; DOF]),
        };
        let params = Params::with_joints(names());
        let mut fl = FollowLoop::new(params.clone(), Box::new(gen));
        fl.init(params).unwrap();
        (fl, calls)
    }

    fn input() -> InputData {
        InputData {
            alive: true,
            config: vec![0.0; DOF],
            mode: OperationMode::Velocity,
            preempt_requested: false,
        }
    }

    fn goal(id: u64) -> (ActiveGoal, Receiver<Termination>) {
        let (done, rx) = channel();
        (ActiveGoal { id, done }, rx)
    }

    fn count_calls(calls: &Arc<Mutex<Vec<Call>>>, f: fn(&Call) -> bool) -> usize {
        calls.lock().unwrap().iter().filter(|c| f(c)).count()
    }

    #[test]
    fn test_watchdog_publishes_ten_zero_cycles() {
        let (mut fl, _) = follow_loop(1, None);

        let mut published = 0;
        for _ in 0..25 {
            let (out, report) = fl.proc(&input()).unwrap();
            if let Some(dems) = out {
                assert!(dems.is_zero());
                assert_eq!(dems.velocities.len(), DOF);
                published += 1;
            }
            assert_eq!(report.state, CtrlState::Idle);
        }

        assert_eq!(published, WATCHDOG_CYCLES as usize);
    }

    #[test]
    fn test_watchdog_restarts_after_motion() {
        let (mut fl, _) = follow_loop(2, None);

        // Exhaust the startup watchdog
        for _ in 0..20 {
            fl.proc(&input()).unwrap();
        }
        assert!(fl.proc(&input()).unwrap().0.is_none());

        let (g, rx) = goal(1);
        fl.start_motion(&[Waypoint::at_rest(&[1.0; DOF])], &[0.0; DOF], g)
            .unwrap();

        // Two executing cycles, both publish non-zero demands
        for _ in 0..2 {
            let (out, _) = fl.proc(&input()).unwrap();
            assert!(!out.unwrap().is_zero());
        }
        assert_eq!(fl.state(), CtrlState::Idle);
        assert_eq!(rx.try_recv().unwrap(), Termination::Finished);

        let mut zeros = 0;
        for _ in 0..30 {
            if let (Some(dems), _) = fl.proc(&input()).unwrap() {
                assert!(dems.is_zero());
                zeros += 1;
            }
        }
        assert_eq!(zeros, WATCHDOG_CYCLES as usize);
    }

    #[test]
    fn test_demands_follow_joint_order() {
        let (mut fl, _) = follow_loop(5, None);
        let (g, _rx) = goal(1);
        fl.start_motion(&[Waypoint::at_rest(&[1.0; DOF])], &[0.0; DOF], g)
            .unwrap();

        let (out, _) = fl.proc(&input()).unwrap();
        let dems = out.unwrap();

        assert_eq!(dems.velocities.len(), DOF);
        for (v, n) in dems.velocities.iter().zip(names().iter()) {
            assert_eq!(&v.joint_uri, n);
            assert_eq!(v.unit, "rad");
        }
    }

    #[test]
    fn test_single_point_goal_is_point_to_point() {
        let (mut fl, calls) = follow_loop(1, None);
        let (g, rx) = goal(1);

        let kind = fl
            .start_motion(&[Waypoint::at_rest(&[1.0, 2.0, 3.0])], &[0.5; DOF], g)
            .unwrap();

        assert_eq!(kind, MotionKind::PointToPoint);
        assert_eq!(fl.state(), CtrlState::Executing);
        assert!(calls
            .lock()
            .unwrap()
            .contains(&Call::PointTarget(vec![1.0, 2.0, 3.0], vec![0.5; DOF])));
        assert_eq!(count_calls(&calls, |c| matches!(c, Call::Trajectory(..))), 0);

        // Finished on the first step
        let (out, report) = fl.proc(&input()).unwrap();
        assert!(out.is_some());
        assert_eq!(report.state, CtrlState::Idle);
        assert_eq!(rx.try_recv().unwrap(), Termination::Finished);
    }

    #[test]
    fn test_multi_point_goal_prepends_current() {
        let (mut fl, calls) = follow_loop(1, None);
        let (g, _rx) = goal(1);
        let points = vec![
            Waypoint::at_rest(&[1.0; DOF]),
            Waypoint::at_rest(&[2.0; DOF]),
        ];

        let kind = fl.start_motion(&points, &[0.5; DOF], g).unwrap();
        assert_eq!(kind, MotionKind::Trajectory);

        let calls = calls.lock().unwrap();
        let (waypoints, start) = calls
            .iter()
            .find_map(|c| match c {
                Call::Trajectory(w, s) => Some((w.clone(), s.clone())),
                _ => None,
            })
            .unwrap();

        assert_eq!(waypoints.len(), 3);
        assert_eq!(waypoints[0], Waypoint::at_rest(&[0.5; DOF]));
        assert_eq!(&waypoints[1..], &points[..]);
        assert_eq!(start, vec![0.5; DOF]);
    }

    #[test]
    fn test_preempt_then_splice() {
        let (mut fl, calls) = follow_loop(100, None);
        let (g, rx) = goal(1);
        fl.start_motion(
            &[Waypoint::at_rest(&[1.0; DOF]), Waypoint::at_rest(&[2.0; DOF])],
            &[0.0; DOF],
            g,
        )
        .unwrap();

        // Ticks 1 to 4 execute normally
        for _ in 0..4 {
            assert!(fl.proc(&input()).unwrap().0.is_some());
        }

        // Tick 5 sees the preemption
        let mut preempt = input();
        preempt.preempt_requested = true;
        let steps_before = count_calls(&calls, |c| matches!(c, Call::Step));
        let (out, report) = fl.proc(&preempt).unwrap();

        assert!(out.is_none());
        assert!(report.preempted);
        assert_eq!(report.failure, Some(FailureCause::Preempted));
        assert_eq!(report.state, CtrlState::Preempted);
        assert!(!report.state.is_executing());
        assert_eq!(count_calls(&calls, |c| matches!(c, Call::Step)), steps_before);
        assert_eq!(
            rx.try_recv().unwrap(),
            Termination::Failed(FailureCause::Preempted)
        );

        // The next goal is spliced onto the four most recent setpoints
        let retained = RetainedSetpoints {
            last: vec![4.0; DOF],
            last1: vec![3.0; DOF],
            last2: vec![2.0; DOF],
            last3: vec![1.0; DOF],
        };
        let current = vec![0.25; DOF];
        let new_points = vec![Waypoint::at_rest(&[9.0; DOF])];
        let (g, _rx) = goal(2);
        let kind = fl.start_motion(&new_points, &current, g).unwrap();

        assert_eq!(kind, MotionKind::Spliced);
        assert_eq!(fl.state(), CtrlState::Executing);

        let calls = calls.lock().unwrap();
        let (waypoints, start) = calls
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Trajectory(w, s) => Some((w.clone(), s.clone())),
                _ => None,
            })
            .unwrap();

        let positions: Vec<Vec<f64>> = waypoints.iter().map(|w| w.positions.clone()).collect();
        assert_eq!(
            positions,
            vec![
                current.clone(),
                retained.last3.clone(),
                retained.last2.clone(),
                retained.last1.clone(),
                retained.last.clone(),
                vec![9.0; DOF],
            ]
        );
        assert_eq!(start, retained.last);
        // Single point goals are never treated as point targets when splicing
        assert_eq!(count_calls_in(&calls, |c| matches!(c, Call::PointTarget(..))), 0);
    }

    fn count_calls_in(calls: &[Call], f: fn(&Call) -> bool) -> usize {
        calls.iter().filter(|c| f(c)).count()
    }

    #[test]
    fn test_mode_drift_fails_goal() {
        let (mut fl, _) = follow_loop(100, None);
        let (g, rx) = goal(1);
        fl.start_motion(&[Waypoint::at_rest(&[1.0; DOF])], &[0.0; DOF], g)
            .unwrap();

        let mut drifted = input();
        drifted.mode = OperationMode::Position;
        // Preemption is not looked at once the mode check fails
        drifted.preempt_requested = true;

        let (out, report) = fl.proc(&drifted).unwrap();
        assert!(out.is_none());
        assert!(!report.preempted);
        assert_eq!(report.state, CtrlState::Idle);
        assert_eq!(
            rx.try_recv().unwrap(),
            Termination::Failed(FailureCause::ModeDrift(OperationMode::Position))
        );
    }

    #[test]
    fn test_not_alive_fails_goal() {
        let (mut fl, _) = follow_loop(100, None);
        let (g, rx) = goal(1);
        fl.start_motion(&[Waypoint::at_rest(&[1.0; DOF])], &[0.0; DOF], g)
            .unwrap();

        let mut dead = input();
        dead.alive = false;

        let (out, report) = fl.proc(&dead).unwrap();
        assert!(out.is_none());
        assert_eq!(report.failure, Some(FailureCause::NotAlive));
        assert_eq!(
            rx.try_recv().unwrap(),
            Termination::Failed(FailureCause::NotAlive)
        );
    }

    #[test]
    fn test_generator_error_fails_goal() {
        let (mut fl, _) = follow_loop(100, Some(3));
        let (g, rx) = goal(1);
        fl.start_motion(&[Waypoint::at_rest(&[1.0; DOF])], &[0.0; DOF], g)
            .unwrap();

        assert!(fl.proc(&input()).unwrap().0.is_some());
        assert!(fl.proc(&input()).unwrap().0.is_some());

        let (out, report) = fl.proc(&input()).unwrap();
        assert!(out.is_none());
        assert_eq!(report.state, CtrlState::Idle);
        assert!(matches!(
            rx.try_recv().unwrap(),
            Termination::Failed(FailureCause::Generator(_))
        ));

        // Watchdog takes over on the next cycle
        let (out, _) = fl.proc(&input()).unwrap();
        assert!(out.unwrap().is_zero());
    }

    #[test]
    fn test_busy_while_executing() {
        let (mut fl, _) = follow_loop(100, None);
        let (g, _rx) = goal(1);
        fl.start_motion(&[Waypoint::at_rest(&[1.0; DOF])], &[0.0; DOF], g)
            .unwrap();

        let (g, _rx2) = goal(2);
        assert!(matches!(
            fl.start_motion(&[Waypoint::at_rest(&[2.0; DOF])], &[0.0; DOF], g),
            Err(TrajCtrlError::Busy)
        ));
    }

    #[test]
    fn test_stop_fails_goal() {
        let (mut fl, calls) = follow_loop(100, None);
        let (g, rx) = goal(1);
        fl.start_motion(&[Waypoint::at_rest(&[1.0; DOF])], &[0.0; DOF], g)
            .unwrap();
        fl.proc(&input()).unwrap();

        fl.stop().unwrap();

        assert_eq!(fl.state(), CtrlState::Idle);
        assert_eq!(
            rx.try_recv().unwrap(),
            Termination::Failed(FailureCause::Stopped)
        );
        assert!(calls.lock().unwrap().contains(&Call::Halt));

        // Stop from idle is harmless
        fl.stop().unwrap();
        assert_eq!(fl.state(), CtrlState::Idle);
    }

    #[test]
    fn test_runtime_setters_reach_generator() {
        let (mut fl, calls) = follow_loop(1, None);
        fl.set_ptp_vel(0.3);
        fl.set_ptp_acc(0.9);

        assert_eq!(fl.params().ptp_vel, 0.3);
        assert_eq!(fl.params().ptp_acc, 0.9);

        let calls = calls.lock().unwrap();
        assert!(calls.contains(&Call::SetPtpVel(0.3)));
        assert!(calls.contains(&Call::SetPtpAcc(0.9)));
        assert!(matches!(calls[0], Call::Configure(ref c) if c.dof == DOF));
    }
}
