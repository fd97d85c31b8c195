//! Piecewise-linear motion generator
//!
//! Moves a position setpoint through each waypoint in turn at the
//! point-to-point velocity limit, with every joint scaled so they arrive
//! together. Velocity and acceleration hints in the waypoints are not used.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;
use std::time::Duration;

use comms_if::tc::traj_ctrl::Waypoint;
use log::{debug, trace};

use crate::motion_gen::{
    GeneratorConfig, MotionGenError, MotionGenerator, RetainedSetpoints, StepOutput,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Fraction of the allowed tracking error within which a waypoint counts as
/// reached.
const REACHED_FRACTION: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct LinearGenerator {
    config: GeneratorConfig,

    /// Control cycle period.
    ///
    /// Units: seconds
    dt: f64,

    /// Waypoints still to be reached, next first.
    targets: VecDeque<Vec<f64>>,

    /// Current position setpoint.
    setpoint: Vec<f64>,

    moving: bool,

    retained: RetainedSetpoints,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LinearGenerator {
    pub fn new(cycle_period: Duration) -> Self {
        Self {
            config: GeneratorConfig {
                dof: 0,
                ptp_vel: 0.0,
                ptp_acc: 0.0,
                allowed_error: 0.0,
                overlap_time: 0.0,
            },
            dt: cycle_period.as_secs_f64(),
            targets: VecDeque::new(),
            setpoint: Vec::new(),
            moving: false,
            retained: RetainedSetpoints::at(&[]),
        }
    }

    fn check_dof(&self, values: &[f64]) -> Result<(), MotionGenError> {
        if values.len() == self.config.dof {
            Ok(())
        } else {
            Err(MotionGenError::DofMismatch {
                expected: self.config.dof,
                found: values.len(),
            })
        }
    }

    fn begin(&mut self, targets: VecDeque<Vec<f64>>, start: &[f64]) {
        self.targets = targets;
        self.setpoint = start.to_vec();
        self.moving = true;

        debug!("Linear motion begun through {} targets", self.targets.len());
    }

    fn reached_tolerance(&self) -> f64 {
        self.config.allowed_error * REACHED_FRACTION
    }

    /// Drop every leading target the setpoint already sits on.
    fn pop_reached(&mut self) {
        let tol = self.reached_tolerance();
        while let Some(target) = self.targets.front() {
            if max_abs_diff(target, &self.setpoint) <= tol {
                self.targets.pop_front();
            } else {
                break;
            }
        }
    }
}

impl MotionGenerator for LinearGenerator {
    fn configure(&mut self, config: &GeneratorConfig) {
        self.config = config.clone();
        self.targets.clear();
        self.setpoint = vec![0.0; config.dof];
        self.moving = false;
        self.retained = RetainedSetpoints::at(&self.setpoint);
    }

    fn set_ptp_vel(&mut self, ptp_vel: f64) {
        self.config.ptp_vel = ptp_vel;
    }

    fn set_ptp_acc(&mut self, ptp_acc: f64) {
        self.config.ptp_acc = ptp_acc;
    }

    fn set_allowed_error(&mut self, allowed_error: f64) {
        self.config.allowed_error = allowed_error;
    }

    fn set_overlap_time(&mut self, overlap_time: f64) {
        self.config.overlap_time = overlap_time;
    }

    fn begin_point_target(
        &mut self,
        target: &[f64],
        start: &[f64],
    ) -> Result<(), MotionGenError> {
        self.check_dof(target)?;
        self.check_dof(start)?;

        self.begin(VecDeque::from(vec![target.to_vec()]), start);
        Ok(())
    }

    fn begin_trajectory(
        &mut self,
        waypoints: &[Waypoint],
        start: &[f64],
    ) -> Result<(), MotionGenError> {
        if waypoints.is_empty() {
            return Err(MotionGenError::EmptyTrajectory);
        }
        self.check_dof(start)?;
        for wp in waypoints {
            self.check_dof(&wp.positions)?;
        }

        self.begin(
            waypoints.iter().map(|wp| wp.positions.clone()).collect(),
            start,
        );
        Ok(())
    }

    fn step(&mut self, current: &[f64]) -> Result<StepOutput, MotionGenError> {
        self.check_dof(current)?;

        if !self.moving {
            return Ok(StepOutput {
                velocities: vec![0.0; self.config.dof],
                moving: false,
            });
        }

        for (joint, (c, s)) in current.iter().zip(self.setpoint.iter()).enumerate() {
            let error = (c - s).abs();
            if error > self.config.allowed_error {
                self.moving = false;
                return Err(MotionGenError::TrackingError {
                    joint,
                    error,
                    allowed: self.config.allowed_error,
                });
            }
        }

        self.pop_reached();

        let previous = self.setpoint.clone();

        if let Some(target) = self.targets.front() {
            let max_step = self.config.ptp_vel * self.dt;
            let dist = max_abs_diff(target, &self.setpoint);

            if dist <= max_step {
                self.setpoint = target.clone();
            } else {
                let scale = max_step / dist;
                for (s, t) in self.setpoint.iter_mut().zip(target.iter()) {
                    *s += (t - *s) * scale;
                }
            }
        }

        self.pop_reached();
        self.moving = !self.targets.is_empty();
        self.retained.push(&self.setpoint);

        let velocities = self
            .setpoint
            .iter()
            .zip(previous.iter())
            .map(|(s, p)| (s - p) / self.dt)
            .collect();

        trace!("Linear setpoint: {:?}", self.setpoint);

        Ok(StepOutput {
            velocities,
            moving: self.moving,
        })
    }

    fn is_moving(&self) -> bool {
        self.moving
    }

    fn halt(&mut self) {
        self.targets.clear();
        self.moving = false;
    }

    fn retained(&self) -> RetainedSetpoints {
        self.retained.clone()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
