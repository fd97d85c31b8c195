//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the trajectory controller, independent of
//! the transport used to carry them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands and goal definitions
pub mod tc;

/// Messages exchanged with equipment (the arm actuator)
pub mod eqpt;
