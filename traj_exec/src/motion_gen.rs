//! # Motion generator interface
//!
//! The trajectory controller does not generate motion itself. Each control cycle it asks a
//! [`MotionGenerator`] for the joint velocities that advance the current motion, and the
//! generator keeps a short history of its position setpoints so a preempted motion can be
//! continued smoothly by the next goal.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::tc::traj_ctrl::Waypoint;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Configuration passed to a generator when the controller starts up.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Number of joints.
    pub dof: usize,

    /// Point-to-point velocity limit.
    ///
    /// Units: radians/second
    pub ptp_vel: f64,

    /// Point-to-point acceleration limit.
    ///
    /// Units: radians/second^2
    pub ptp_acc: f64,

    /// Maximum allowed tracking error before the generator reports an error.
    ///
    /// Units: radians
    pub allowed_error: f64,

    /// Blending window between trajectory segments.
    ///
    /// Units: seconds
    pub overlap_time: f64,
}

/// Output of one generator step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Velocity demand for each joint, in joint order.
    ///
    /// Units: radians/second
    pub velocities: Vec<f64>,

    /// False once the motion has finished.
    pub moving: bool,
}

/// The four most recent position setpoints produced by a generator.
///
/// `last` is the most recent, `last3` the oldest.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedSetpoints {
    pub last: Vec<f64>,
    pub last1: Vec<f64>,
    pub last2: Vec<f64>,
    pub last3: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors reported by a motion generator.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum MotionGenError {
    #[error("Expected {expected} joint values but got {found}")]
    DofMismatch { expected: usize, found: usize },

    #[error("Cannot begin a trajectory with no waypoints")]
    EmptyTrajectory,

    #[error("Tracking error on joint {joint} of {error:.4} rad exceeds the allowed {allowed:.4} rad")]
    TrackingError {
        joint: usize,
        error: f64,
        allowed: f64,
    },
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A motion generator driven once per control cycle.
///
/// Implementations must be `Send` as the generator is owned by the follow loop thread but
/// motions are begun from goal handling threads.
pub trait MotionGenerator: Send {
    /// Apply the full configuration, discarding any motion in progress.
    fn configure(&mut self, config: &GeneratorConfig);

    fn set_ptp_vel(&mut self, ptp_vel: f64);

    fn set_ptp_acc(&mut self, ptp_acc: f64);

    fn set_allowed_error(&mut self, allowed_error: f64);

    fn set_overlap_time(&mut self, overlap_time: f64);

    /// Begin a direct motion to `target` starting from `start`.
    fn begin_point_target(&mut self, target: &[f64], start: &[f64])
        -> Result<(), MotionGenError>;

    /// Begin a motion through `waypoints` starting from `start`.
    fn begin_trajectory(&mut self, waypoints: &[Waypoint], start: &[f64])
        -> Result<(), MotionGenError>;

    /// Advance the motion by one control cycle given the current joint configuration.
    fn step(&mut self, current: &[f64]) -> Result<StepOutput, MotionGenError>;

    /// True while a motion is in progress.
    fn is_moving(&self) -> bool;

    /// Abandon the current motion. The retained setpoints are kept.
    fn halt(&mut self);

    /// The most recent position setpoints, used to splice a new trajectory onto a preempted one.
    fn retained(&self) -> RetainedSetpoints;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RetainedSetpoints {
    /// All four setpoints at the given configuration.
    pub fn at(config: &[f64]) -> Self {
        Self {
            last: config.to_vec(),
            last1: config.to_vec(),
            last2: config.to_vec(),
            last3: config.to_vec(),
        }
    }

    /// Shift in a new most-recent setpoint, dropping the oldest.
    pub fn push(&mut self, setpoint: &[f64]) {
        self.last3 = std::mem::take(&mut self.last2);
        self.last2 = std::mem::take(&mut self.last1);
        self.last1 = std::mem::replace(&mut self.last, setpoint.to_vec());
    }
}
