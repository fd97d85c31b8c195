//! # Arm Equipment Messages
//!
//! Messages exchanged between the trajectory controller and a velocity-controlled arm: joint
//! state feedback flowing in, velocity demands and operation mode requests flowing out.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default unit tag attached to every joint velocity demand.
pub const DEFAULT_VELOCITY_UNIT: &str = "rad";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single joint's velocity demand.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointValue {
    /// Identifier of the joint this value applies to.
    pub joint_uri: String,

    /// Unit of `value`.
    pub unit: String,

    /// The demanded velocity.
    pub value: f64,
}

/// Velocity demands for every joint of the arm, in the configured joint order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JointVelocities {
    pub velocities: Vec<JointValue>,
}

/// Joint state feedback keyed by joint name.
///
/// The names may be in any order and may include joints this controller does not drive.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct JointStates {
    pub name: Vec<String>,

    /// Units: radians
    pub position: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Control mode of the actuator.
///
/// Owned by the actuator, the controller only mirrors it and requests changes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Undefined,
    Velocity,
    Position,
}

/// An operation mode as reported by the actuator, either by name or by its reconfiguration
/// index (0, 1, 2).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ModeReport {
    Index(i64),
    Name(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointVelocities {
    /// Build a demand from the joint names and per-joint values, which must be index-aligned.
    pub fn from_values(joint_names: &[String], unit: &str, values: &[f64]) -> Self {
        Self {
            velocities: joint_names
                .iter()
                .zip(values.iter())
                .map(|(name, value)| JointValue {
                    joint_uri: name.clone(),
                    unit: unit.to_string(),
                    value: *value,
                })
                .collect(),
        }
    }

    /// Build an all-zero demand for the given joints.
    pub fn zeros(joint_names: &[String], unit: &str) -> Self {
        Self::from_values(joint_names, unit, &vec![0.0; joint_names.len()])
    }

    /// The demanded values in joint order.
    pub fn values(&self) -> Vec<f64> {
        self.velocities.iter().map(|v| v.value).collect()
    }

    /// True if every demanded value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.velocities.iter().all(|v| v.value == 0.0)
    }
}

impl OperationMode {
    /// Parse a mode from the string reported by the actuator.
    ///
    /// Returns `None` for unrecognised strings, the caller decides what that means.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "undefined" => Some(OperationMode::Undefined),
            "velocity" => Some(OperationMode::Velocity),
            "position" => Some(OperationMode::Position),
            _ => None,
        }
    }

    /// Parse from the integer enumeration used by runtime reconfiguration (0, 1, 2).
    pub fn from_index(i: i64) -> Option<Self> {
        match i {
            0 => Some(OperationMode::Undefined),
            1 => Some(OperationMode::Velocity),
            2 => Some(OperationMode::Position),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Undefined => "undefined",
            OperationMode::Velocity => "velocity",
            OperationMode::Position => "position",
        }
    }
}

impl ModeReport {
    /// The reported mode, or `None` if it is not recognised.
    pub fn mode(&self) -> Option<OperationMode> {
        match self {
            ModeReport::Index(i) => OperationMode::from_index(*i),
            ModeReport::Name(s) => OperationMode::from_str(s),
        }
    }
}

impl fmt::Display for ModeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeReport::Index(i) => write!(f, "{}", i),
            ModeReport::Name(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl Default for OperationMode {
    fn default() -> Self {
        OperationMode::Undefined
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
