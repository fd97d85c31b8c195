//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with the actuator.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod arm;
