//! Controller state machine
//!
//! The controller is always in exactly one [`CtrlState`]. Every change of
//! state goes through [`CtrlState::next`], which encodes the full transition
//! table:
//!
//! | From        | Event             | To          |
//! |-------------|-------------------|-------------|
//! | `Idle`      | `GoalStarted`     | `Executing` |
//! | `Preempted` | `GoalStarted`     | `Executing` |
//! | `Executing` | `Finished`        | `Idle`      |
//! | `Executing` | `Failed`          | `Idle`      |
//! | `Executing` | `PreemptObserved` | `Preempted` |
//! | any         | `Stopped`         | `Idle`      |
//!
//! How a goal ended is not part of the state. It is a [`Termination`],
//! delivered once to the goal that owned the motion.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::arm::OperationMode;
use serde::Serialize;
use std::fmt;

use super::TrajCtrlError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// State of the trajectory controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CtrlState {
    /// No motion. The follow loop runs the zero velocity watchdog.
    Idle,

    /// A motion is being followed.
    Executing,

    /// The motion was abandoned by a preemption. The generator's retained
    /// setpoints will be spliced onto the next goal.
    Preempted,
}

/// Events which move the controller between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlEvent {
    /// A goal passed mode arbitration and its motion was begun.
    GoalStarted,

    /// The generator reported the motion complete.
    Finished,

    /// A precondition broke or the generator errored.
    Failed,

    /// A preemption request was sampled while executing.
    PreemptObserved,

    /// The stop command was received.
    Stopped,
}

/// How a goal's motion ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Termination {
    /// The generator finished the motion.
    Finished,

    /// The motion was started but did not complete.
    Failed(FailureCause),

    /// No motion was attempted.
    Rejected(RejectCause),
}

/// Why a started motion did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FailureCause {
    /// The controller is shutting down.
    NotAlive,

    /// The actuator left velocity mode during the motion.
    ModeDrift(OperationMode),

    /// The motion generator reported an error.
    Generator(String),

    /// The motion was abandoned for a newer goal.
    Preempted,

    /// The stop command was received.
    Stopped,
}

/// Why a goal was not started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RejectCause {
    /// The actuator did not confirm velocity mode in time.
    ModeTimeout,

    /// Mode arbitration was abandoned because the controller is shutting down.
    Cancelled,

    /// Another goal's motion is executing and has not been preempted.
    Busy,

    /// The goal itself is unusable.
    InvalidGoal(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CtrlState {
    /// Apply `event` to this state.
    pub fn next(self, event: CtrlEvent) -> Result<CtrlState, TrajCtrlError> {
        use CtrlEvent::*;
        use CtrlState::*;

        match (self, event) {
            (Idle, GoalStarted) | (Preempted, GoalStarted) => Ok(Executing),
            (Executing, Finished) | (Executing, Failed) => Ok(Idle),
            (Executing, PreemptObserved) => Ok(Preempted),
            (_, Stopped) => Ok(Idle),
            (from, event) => Err(TrajCtrlError::InvalidTransition(from, event)),
        }
    }

    pub fn is_executing(&self) -> bool {
        matches!(self, CtrlState::Executing)
    }

    /// True if a new goal may start a motion from this state.
    pub fn accepts_goal(&self) -> bool {
        !self.is_executing()
    }
}

impl Default for CtrlState {
    fn default() -> Self {
        CtrlState::Idle
    }
}

impl fmt::Display for CtrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtrlState::Idle => write!(f, "Idle"),
            CtrlState::Executing => write!(f, "Executing"),
            CtrlState::Preempted => write!(f, "Preempted"),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Finished => write!(f, "finished"),
            Termination::Failed(c) => write!(f, "failed ({:?})", c),
            Termination::Rejected(c) => write!(f, "rejected ({:?})", c),
        }
    }
}
