//! # Trajectory control goals

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One sample along a joint-space path.
///
/// All three vectors are index-aligned to the controller's joint ordering. Velocities and
/// accelerations may be omitted in goals, in which case they are treated as zero.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Waypoint {
    /// Units: radians
    pub positions: Vec<f64>,

    /// Units: radians/second
    #[serde(default)]
    pub velocities: Vec<f64>,

    /// Units: radians/second^2
    #[serde(default)]
    pub accelerations: Vec<f64>,
}

/// An ordered sequence of waypoints, in temporal order along the path.
///
/// A trajectory of exactly one waypoint is a point-to-point target rather than a spline path.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub points: Vec<Waypoint>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Terminal result of a trajectory goal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalResult {
    Succeeded,
    Aborted,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Waypoint {
    /// A waypoint at the given positions with zero velocity and acceleration.
    pub fn at_rest(positions: &[f64]) -> Self {
        Self {
            positions: positions.to_vec(),
            velocities: vec![0.0; positions.len()],
            accelerations: vec![0.0; positions.len()],
        }
    }

    /// Fill missing velocity and acceleration arrays with zeros so that all three have the
    /// same length as the positions.
    pub fn normalised(mut self) -> Self {
        let n = self.positions.len();
        if self.velocities.is_empty() {
            self.velocities = vec![0.0; n];
        }
        if self.accelerations.is_empty() {
            self.accelerations = vec![0.0; n];
        }
        self
    }

    /// True if every array has exactly `dof` entries.
    pub fn has_dof(&self, dof: usize) -> bool {
        self.positions.len() == dof
            && self.velocities.len() == dof
            && self.accelerations.len() == dof
    }
}

impl Trajectory {
    pub fn new(points: Vec<Waypoint>) -> Self {
        Self { points }
    }

    /// Build a trajectory from a list of position vectors, all at rest.
    pub fn from_positions(positions: &[Vec<f64>]) -> Self {
        Self {
            points: positions.iter().map(|p| Waypoint::at_rest(p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True if this trajectory is a single point-to-point target.
    pub fn is_point_target(&self) -> bool {
        self.points.len() == 1
    }
}
