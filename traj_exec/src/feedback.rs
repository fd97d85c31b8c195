//! # Feedback mirror
//!
//! Holds the latest joint configuration and actuator operation mode as reported by the arm.
//! Feedback arrives asynchronously and is read by both the follow loop and goal handling, so
//! every field sits behind its own lock.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use comms_if::eqpt::arm::{JointStates, ModeReport, OperationMode};
use log::{info, warn};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Mirror of the arm's joint configuration and operation mode.
#[derive(Debug)]
pub struct JointFeedback {
    /// Fixed joint ordering, established at startup. Defines the DOF.
    joint_names: Vec<String>,

    /// Latest joint positions, index-aligned to `joint_names`.
    ///
    /// Units: radians
    config: Mutex<Vec<f64>>,

    /// Latest mode reported by the actuator.
    mode: Mutex<OperationMode>,

    /// Notified on every mode update.
    mode_changed: Condvar,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Feedback lock is poisoned")]
    PoisonError,

    #[error("Joint state has {names} names but {positions} positions")]
    MalformedJointState { names: usize, positions: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointFeedback {
    /// Create a new mirror with all joints at zero.
    pub fn new(joint_names: Vec<String>, initial_mode: OperationMode) -> Self {
        let dof = joint_names.len();
        Self {
            joint_names,
            config: Mutex::new(vec![0.0; dof]),
            mode: Mutex::new(initial_mode),
            mode_changed: Condvar::new(),
        }
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn dof(&self) -> usize {
        self.joint_names.len()
    }

    /// Update from a name-keyed joint state message.
    ///
    /// Joints which are not configured are ignored. Returns the number of configured joints that
    /// were updated.
    pub fn update_joint_states(&self, states: &JointStates) -> Result<usize, FeedbackError> {
        if states.name.len() != states.position.len() {
            warn!(
                "Ignoring joint state with {} names and {} positions",
                states.name.len(),
                states.position.len()
            );
            return Err(FeedbackError::MalformedJointState {
                names: states.name.len(),
                positions: states.position.len(),
            });
        }

        let mut config = self.config.lock()?;
        let mut num_updated = 0;

        for (name, pos) in states.name.iter().zip(states.position.iter()) {
            if let Some(i) = self.joint_names.iter().position(|n| n == name) {
                config[i] = *pos;
                num_updated += 1;
            }
        }

        Ok(num_updated)
    }

    /// Update from the low-level controller's actual positions, which are already in joint order.
    ///
    /// Entries beyond the DOF are ignored, missing entries leave the previous value in place.
    pub fn update_controller_state(&self, positions: &[f64]) -> Result<(), FeedbackError> {
        let mut config = self.config.lock()?;
        for (c, p) in config.iter_mut().zip(positions.iter()) {
            *c = *p;
        }
        Ok(())
    }

    /// Update the mirrored operation mode and wake anyone waiting on a mode change.
    pub fn update_operation_mode(&self, mode: OperationMode) -> Result<(), FeedbackError> {
        let mut current = self.mode.lock()?;
        if *current != mode {
            info!("Setting operation_mode: {}", mode);
        }
        *current = mode;
        self.mode_changed.notify_all();
        Ok(())
    }

    /// Update the mirrored operation mode from a name or index reported by the actuator.
    ///
    /// Unrecognised reports are mirrored as [`OperationMode::Undefined`].
    pub fn update_reported_mode(&self, report: &ModeReport) -> Result<(), FeedbackError> {
        let mode = match report.mode() {
            Some(m) => m,
            None => {
                warn!("Unknown operation_mode {}, treating as undefined", report);
                OperationMode::Undefined
            }
        };
        self.update_operation_mode(mode)
    }

    /// Snapshot of the current joint configuration.
    pub fn configuration(&self) -> Result<Vec<f64>, FeedbackError> {
        Ok(self.config.lock()?.clone())
    }

    pub fn operation_mode(&self) -> Result<OperationMode, FeedbackError> {
        Ok(*self.mode.lock()?)
    }

    /// Block until the mode is updated or `timeout` elapses, then return the current mode.
    pub fn wait_mode_update(&self, timeout: Duration) -> Result<OperationMode, FeedbackError> {
        let mode = self.mode.lock()?;
        let (mode, _) = self.mode_changed.wait_timeout(mode, timeout)?;
        Ok(*mode)
    }
}

impl<G> From<PoisonError<G>> for FeedbackError {
    fn from(_: PoisonError<G>) -> Self {
        Self::PoisonError
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn names() -> Vec<String> {
        vec!["arm_1_joint".into(), "arm_2_joint".into(), "arm_3_joint".into()]
    }

    #[test]
    fn test_update_by_name() {
        let fb = JointFeedback::new(names(), OperationMode::Undefined);

        let n = fb
            .update_joint_states(&JointStates {
                name: vec!["arm_3_joint".into(), "gripper".into(), "arm_1_joint".into()],
                position: vec![3.0, 9.0, 1.0],
            })
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(fb.configuration().unwrap(), vec![1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_malformed_joint_state() {
        let fb = JointFeedback::new(names(), OperationMode::Undefined);
        assert!(matches!(
            fb.update_joint_states(&JointStates {
                name: vec!["arm_1_joint".into()],
                position: vec![],
            }),
            Err(FeedbackError::MalformedJointState { .. })
        ));
    }

    #[test]
    fn test_controller_state_length() {
        let fb = JointFeedback::new(names(), OperationMode::Undefined);
        fb.update_controller_state(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(fb.configuration().unwrap(), vec![1.0, 2.0, 3.0]);

        fb.update_controller_state(&[5.0]).unwrap();
        assert_eq!(fb.configuration().unwrap(), vec![5.0, 2.0, 3.0]);
        assert_eq!(fb.configuration().unwrap().len(), fb.dof());
    }

    #[test]
    fn test_mode_reports() {
        let fb = JointFeedback::new(names(), OperationMode::Position);
        fb.update_reported_mode(&ModeReport::Name("velocity".into()))
            .unwrap();
        assert_eq!(fb.operation_mode().unwrap(), OperationMode::Velocity);
        fb.update_reported_mode(&ModeReport::Name("torque".into()))
            .unwrap();
        assert_eq!(fb.operation_mode().unwrap(), OperationMode::Undefined);

        fb.update_reported_mode(&ModeReport::Index(2)).unwrap();
        assert_eq!(fb.operation_mode().unwrap(), OperationMode::Position);
        fb.update_reported_mode(&ModeReport::Index(5)).unwrap();
        assert_eq!(fb.operation_mode().unwrap(), OperationMode::Undefined);
    }

    #[test]
    fn test_wait_mode_update_wakes() {
        let fb = Arc::new(JointFeedback::new(names(), OperationMode::Undefined));
        let fb_thread = fb.clone();

        let jh = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            fb_thread.update_operation_mode(OperationMode::Velocity).unwrap();
        });

        let start = Instant::now();
        let mut mode = OperationMode::Undefined;
        while mode != OperationMode::Velocity && start.elapsed() < Duration::from_secs(5) {
            mode = fb.wait_mode_update(Duration::from_millis(100)).unwrap();
        }
        jh.join().unwrap();

        assert_eq!(mode, OperationMode::Velocity);
    }
}
