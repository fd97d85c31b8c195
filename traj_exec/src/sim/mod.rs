//! Simulated arm
//!
//! A velocity-controlled arm and a simple motion generator which allow the
//! trajectory controller to run without hardware. The actuator confirms mode
//! requests after a fixed delay and integrates velocity demands into the
//! feedback mirror once per control cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod actuator;
mod linear_gen;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use actuator::SimActuator;
pub use linear_gen::LinearGenerator;
