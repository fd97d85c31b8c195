//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::arm::{OperationMode, DEFAULT_VELOCITY_UNIT};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use util::time::secs_to_duration;

// Internal
use super::TrajCtrlError;
use crate::motion_gen::GeneratorConfig;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Longest accepted cycle period, mode switch timeout or poll period.
///
/// Units: seconds
const MAX_PERIOD_S: f64 = 3600.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Names of the controlled joints. The order defines the index of each
    /// joint in every configuration, waypoint and velocity demand.
    pub joint_names: Vec<String>,

    /// Point-to-point velocity limit
    ///
    /// Units: radians/second
    #[serde(default = "default_ptp_vel")]
    pub ptp_vel: f64,

    /// Point-to-point acceleration limit
    ///
    /// Units: radians/second^2
    #[serde(default = "default_ptp_acc")]
    pub ptp_acc: f64,

    /// Maximum allowed tracking error
    ///
    /// Units: radians
    #[serde(default = "default_max_error")]
    pub max_error: f64,

    /// Blending window between trajectory segments
    ///
    /// Units: seconds
    #[serde(default = "default_overlap_time")]
    pub overlap_time: f64,

    /// How long to wait for the actuator to confirm velocity mode before
    /// rejecting a goal
    ///
    /// Units: seconds
    #[serde(default = "default_mode_switch_timeout_s")]
    pub mode_switch_timeout_s: f64,

    /// Sampling interval of the mirrored operation mode while waiting for a
    /// mode switch
    ///
    /// Units: seconds
    #[serde(default = "default_mode_poll_period_s")]
    pub mode_poll_period_s: f64,

    /// Control frequency of the follow loop
    ///
    /// Units: hertz
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    /// Operation mode assumed before the actuator reports one
    #[serde(default)]
    pub operation_mode: OperationMode,

    /// Unit tag attached to velocity demands
    #[serde(default = "default_velocity_unit")]
    pub velocity_unit: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Parameters with every optional field at its default.
    pub fn with_joints(joint_names: Vec<String>) -> Self {
        Self {
            joint_names,
            ptp_vel: default_ptp_vel(),
            ptp_acc: default_ptp_acc(),
            max_error: default_max_error(),
            overlap_time: default_overlap_time(),
            mode_switch_timeout_s: default_mode_switch_timeout_s(),
            mode_poll_period_s: default_mode_poll_period_s(),
            frequency_hz: default_frequency_hz(),
            operation_mode: OperationMode::default(),
            velocity_unit: default_velocity_unit(),
        }
    }

    /// Check the parameters describe a usable controller.
    pub fn validate(&self) -> Result<(), TrajCtrlError> {
        if self.joint_names.is_empty() {
            return Err(TrajCtrlError::InvalidParams(
                "joint_names must contain at least one joint".into(),
            ));
        }

        let mut seen = HashSet::new();
        for name in self.joint_names.iter() {
            if !seen.insert(name) {
                return Err(TrajCtrlError::InvalidParams(format!(
                    "joint name \"{}\" appears more than once",
                    name
                )));
            }
        }

        for (name, value) in [
            ("frequency_hz", self.frequency_hz),
            ("mode_switch_timeout_s", self.mode_switch_timeout_s),
            ("mode_poll_period_s", self.mode_poll_period_s),
        ]
        .iter()
        {
            if !(value.is_finite() && *value > 0.0) {
                return Err(TrajCtrlError::InvalidParams(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        for (name, secs) in [
            ("1 / frequency_hz", 1.0 / self.frequency_hz),
            ("mode_switch_timeout_s", self.mode_switch_timeout_s),
            ("mode_poll_period_s", self.mode_poll_period_s),
        ]
        .iter()
        {
            if *secs > MAX_PERIOD_S {
                return Err(TrajCtrlError::InvalidParams(format!(
                    "{} must be at most {} s, got {}",
                    name, MAX_PERIOD_S, secs
                )));
            }
        }

        Ok(())
    }

    /// Number of controlled joints.
    pub fn dof(&self) -> usize {
        self.joint_names.len()
    }

    /// Period of one follow loop cycle.
    pub fn cycle_period(&self) -> Duration {
        secs_to_duration(1.0 / self.frequency_hz)
    }

    pub fn mode_switch_timeout(&self) -> Duration {
        secs_to_duration(self.mode_switch_timeout_s)
    }

    pub fn mode_poll_period(&self) -> Duration {
        secs_to_duration(self.mode_poll_period_s)
    }

    /// The configuration handed to the motion generator.
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            dof: self.dof(),
            ptp_vel: self.ptp_vel,
            ptp_acc: self.ptp_acc,
            allowed_error: self.max_error,
            overlap_time: self.overlap_time,
        }
    }
}

fn default_ptp_vel() -> f64 {
    0.7
}

fn default_ptp_acc() -> f64 {
    0.2
}

fn default_max_error() -> f64 {
    0.7
}

fn default_overlap_time() -> f64 {
    0.4
}

fn default_mode_switch_timeout_s() -> f64 {
    2.0
}

fn default_mode_poll_period_s() -> f64 {
    0.1
}

fn default_frequency_hz() -> f64 {
    100.0
}

fn default_velocity_unit() -> String {
    DEFAULT_VELOCITY_UNIT.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_from_toml() {
        let p: Params =
            util::params::from_str("joint_names = [\"j1\", \"j2\", \"j3\"]\n").unwrap();

        assert_eq!(p.dof(), 3);
        assert_eq!(p.ptp_vel, 0.7);
        assert_eq!(p.ptp_acc, 0.2);
        assert_eq!(p.max_error, 0.7);
        assert_eq!(p.overlap_time, 0.4);
        assert_eq!(p.mode_switch_timeout(), Duration::from_secs(2));
        assert_eq!(p.mode_poll_period(), Duration::from_millis(100));
        assert_eq!(p.cycle_period(), Duration::from_millis(10));
        assert_eq!(p.operation_mode, OperationMode::Undefined);
        assert_eq!(p.velocity_unit, "rad");
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_overrides_from_toml() {
        let p: Params = util::params::from_str(
            "joint_names = [\"j1\"]\nfrequency_hz = 50.0\noperation_mode = \"velocity\"\n",
        )
        .unwrap();

        assert_eq!(p.cycle_period(), Duration::from_millis(20));
        assert_eq!(p.operation_mode, OperationMode::Velocity);
    }

    #[test]
    fn test_validate() {
        assert!(Params::with_joints(vec![]).validate().is_err());
        assert!(Params::with_joints(vec!["a".into(), "a".into()])
            .validate()
            .is_err());

        let mut p = Params::with_joints(vec!["a".into()]);
        p.frequency_hz = 0.0;
        assert!(p.validate().is_err());

        let mut p = Params::with_joints(vec!["a".into()]);
        p.mode_switch_timeout_s = f64::NAN;
        assert!(p.validate().is_err());

        let mut p = Params::with_joints(vec!["a".into()]);
        p.mode_switch_timeout_s = 1e20;
        assert!(p.validate().is_err());

        let mut p = Params::with_joints(vec!["a".into()]);
        p.frequency_hz = 1e-9;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_generator_config() {
        let p = Params::with_joints(vec!["a".into(), "b".into()]);
        let cfg = p.generator_config();
        assert_eq!(cfg.dof, 2);
        assert_eq!(cfg.allowed_error, p.max_error);
        assert_eq!(cfg.overlap_time, p.overlap_time);
    }
}
