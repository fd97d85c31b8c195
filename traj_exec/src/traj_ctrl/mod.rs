//! Trajectory control module
//!
//! Accepts joint trajectory goals, arbitrates the actuator into velocity
//! mode, and follows each motion at a fixed control rate by publishing
//! velocity demands from a [`crate::motion_gen::MotionGenerator`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod arbiter;
mod dispatch;
mod follow;
mod outcome;
mod params;
mod splice;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::{mpsc, PoisonError};

// Internal
pub use arbiter::*;
pub use dispatch::*;
pub use follow::*;
pub use outcome::*;
pub use params::*;
pub use splice::*;
pub use state::*;

use crate::feedback::FeedbackError;
use crate::motion_gen::MotionGenError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive cycles zero velocity is published for once the
/// controller stops executing.
pub const WATCHDOG_CYCLES: u32 = 10;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during TrajCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Invalid state transition from {0} on {1:?}")]
    InvalidTransition(CtrlState, CtrlEvent),

    #[error("Expected {expected} joint values but got {found}")]
    DofMismatch { expected: usize, found: usize },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("A motion is already executing")]
    Busy,

    #[error("Motion generator error: {0}")]
    MotionGen(#[from] MotionGenError),

    #[error("Feedback error: {0}")]
    Feedback(#[from] FeedbackError),

    #[error("A TrajCtrl lock is poisoned")]
    PoisonError,

    #[error("Could not spawn the follow loop thread: {0}")]
    ThreadSpawn(std::io::Error),

    #[error("The follow loop thread panicked")]
    FollowThreadPanicked,

    #[error("The follow loop dropped the goal without a result")]
    GoalDropped,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<G> From<PoisonError<G>> for TrajCtrlError {
    fn from(_: PoisonError<G>) -> Self {
        TrajCtrlError::PoisonError
    }
}

impl From<mpsc::RecvError> for TrajCtrlError {
    fn from(_: mpsc::RecvError) -> Self {
        TrajCtrlError::GoalDropped
    }
}
