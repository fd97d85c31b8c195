//! # Trajectory controller library.
//!
//! This library allows other crates in the workspace to access items defined inside the
//! trajectory controller crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator interface - operation mode requests and velocity demands towards the arm
pub mod actuator;

/// Feedback mirror - latest joint configuration and operation mode reported by the arm
pub mod feedback;

/// Motion generator interface - produces per-cycle velocities for a motion
pub mod motion_gen;

/// Simulated arm - lets the controller run without hardware
pub mod sim;

/// Trajectory control module - executes joint trajectory goals
pub mod traj_ctrl;
