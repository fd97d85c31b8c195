//! # Actuator interface
//!
//! Outputs of the trajectory controller towards the arm: operation mode requests and per-cycle
//! velocity demands. Success of a mode request is only ever observed through the mirrored mode in
//! [`crate::feedback::JointFeedback`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::{JointVelocities, OperationMode};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("Could not send velocity demands: {0}")]
    SendFailed(String),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A velocity-controlled arm.
pub trait Actuator: Send + Sync {
    /// Ask the actuator to switch into `mode`.
    ///
    /// Returning `Ok` only means the request was received.
    fn request_operation_mode(&self, mode: OperationMode) -> Result<(), ActuatorError>;

    /// Publish one cycle's velocity demands.
    fn send_velocities(&self, dems: &JointVelocities) -> Result<(), ActuatorError>;
}
