//! Operation mode arbitration
//!
//! Requests a control mode from the actuator and waits, bounded by a
//! timeout, for the mirrored mode to confirm it. The wait runs on the goal
//! handling thread, never on the follow loop thread, so the control cycle
//! keeps running while a goal waits for the actuator.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use comms_if::eqpt::arm::OperationMode;
use log::{debug, info, warn};

use super::{Params, TrajCtrlError};
use crate::actuator::Actuator;
use crate::feedback::JointFeedback;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Requests a mode and waits for confirmation.
#[derive(Debug, Clone)]
pub struct ModeArbiter {
    timeout: Duration,
    poll_period: Duration,
}

/// Shared flag used to abandon blocking waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Outcome of a mode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStatus {
    /// The actuator confirmed the requested mode.
    Ready,

    /// The timeout elapsed without confirmation. No retry is made.
    TimedOut,

    /// The wait was cancelled before confirmation.
    Cancelled,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModeArbiter {
    pub fn new(timeout: Duration, poll_period: Duration) -> Self {
        Self {
            timeout,
            poll_period,
        }
    }

    pub fn from_params(params: &Params) -> Self {
        Self::new(params.mode_switch_timeout(), params.mode_poll_period())
    }

    /// Request `mode` and block until it is confirmed, the timeout elapses,
    /// or `cancel` is set.
    ///
    /// The mirrored mode is sampled at least once per poll period, and
    /// immediately whenever feedback updates it.
    pub fn request_mode(
        &self,
        mode: OperationMode,
        actuator: &dyn Actuator,
        feedback: &JointFeedback,
        cancel: &CancelToken,
    ) -> Result<ModeStatus, TrajCtrlError> {
        info!("Requesting {} mode", mode);

        // Success is only observed through feedback, so a failed request is
        // not fatal, the actuator may already be in the right mode.
        if let Err(e) = actuator.request_operation_mode(mode) {
            warn!("Operation mode request failed: {}", e);
        }

        let deadline = Instant::now() + self.timeout;
        let mut current = feedback.operation_mode()?;

        loop {
            if current == mode {
                debug!("Actuator confirmed {} mode", mode);
                return Ok(ModeStatus::Ready);
            }

            if cancel.is_cancelled() {
                info!("Mode request for {} cancelled", mode);
                return Ok(ModeStatus::Cancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Actuator did not enter {} mode within {:.2} s (still {})",
                    mode,
                    self.timeout.as_secs_f64(),
                    current
                );
                return Ok(ModeStatus::TimedOut);
            }

            debug!("Waiting for actuator to go to {} mode", mode);
            current = feedback.wait_mode_update(self.poll_period.min(deadline - now))?;
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::actuator::ActuatorError;
    use comms_if::eqpt::arm::JointVelocities;
    use std::thread;

    /// Actuator which confirms mode requests through feedback after a delay,
    /// or never if `delay` is `None`.
    struct DelayedActuator {
        feedback: Arc<JointFeedback>,
        delay: Option<Duration>,
    }

    impl Actuator for DelayedActuator {
        fn request_operation_mode(&self, mode: OperationMode) -> Result<(), ActuatorError> {
            if let Some(delay) = self.delay {
                let fb = self.feedback.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    fb.update_operation_mode(mode).unwrap();
                });
            }
            Ok(())
        }

        fn send_velocities(&self, _: &JointVelocities) -> Result<(), ActuatorError> {
            Ok(())
        }
    }

    fn feedback() -> Arc<JointFeedback> {
        Arc::new(JointFeedback::new(
            vec!["j1".into(), "j2".into()],
            OperationMode::Position,
        ))
    }

    #[test]
    fn test_mode_confirmed() {
        let fb = feedback();
        let act = DelayedActuator {
            feedback: fb.clone(),
            delay: Some(Duration::from_millis(30)),
        };
        let arbiter = ModeArbiter::new(Duration::from_secs(2), Duration::from_millis(100));

        let start = Instant::now();
        let status = arbiter
            .request_mode(OperationMode::Velocity, &act, &fb, &CancelToken::new())
            .unwrap();

        assert_eq!(status, ModeStatus::Ready);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_already_in_mode() {
        let fb = feedback();
        fb.update_operation_mode(OperationMode::Velocity).unwrap();
        let act = DelayedActuator {
            feedback: fb.clone(),
            delay: None,
        };
        let arbiter = ModeArbiter::new(Duration::from_millis(200), Duration::from_millis(100));

        assert_eq!(
            arbiter
                .request_mode(OperationMode::Velocity, &act, &fb, &CancelToken::new())
                .unwrap(),
            ModeStatus::Ready
        );
    }

    #[test]
    fn test_mode_timeout() {
        let fb = feedback();
        let act = DelayedActuator {
            feedback: fb.clone(),
            delay: None,
        };
        let timeout = Duration::from_millis(250);
        let arbiter = ModeArbiter::new(timeout, Duration::from_millis(100));

        let start = Instant::now();
        let status = arbiter
            .request_mode(OperationMode::Velocity, &act, &fb, &CancelToken::new())
            .unwrap();

        assert_eq!(status, ModeStatus::TimedOut);
        assert!(start.elapsed() >= timeout);
        assert_eq!(fb.operation_mode().unwrap(), OperationMode::Position);
    }

    #[test]
    fn test_mode_cancelled() {
        let fb = feedback();
        let act = DelayedActuator {
            feedback: fb.clone(),
            delay: None,
        };
        let arbiter = ModeArbiter::new(Duration::from_secs(10), Duration::from_millis(20));
        let cancel = CancelToken::new();
        let cancel_thread = cancel.clone();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel_thread.cancel();
        });

        let start = Instant::now();
        let status = arbiter
            .request_mode(OperationMode::Velocity, &act, &fb, &cancel)
            .unwrap();

        assert_eq!(status, ModeStatus::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
