//! Simulated actuator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use comms_if::eqpt::arm::{JointVelocities, OperationMode};
use log::{debug, trace, warn};

use crate::actuator::{Actuator, ActuatorError};
use crate::feedback::JointFeedback;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An ideal velocity-controlled arm.
pub struct SimActuator {
    feedback: Arc<JointFeedback>,

    /// Time each velocity demand is applied for.
    cycle_period: Duration,

    /// Delay before a requested mode is reported back, or `None` for an arm
    /// that ignores mode requests.
    mode_delay: Option<Duration>,

    sent: Mutex<SentDems>,
}

#[derive(Default)]
struct SentDems {
    num_sent: usize,
    last: Option<JointVelocities>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimActuator {
    pub fn new(
        feedback: Arc<JointFeedback>,
        cycle_period: Duration,
        mode_delay: Option<Duration>,
    ) -> Self {
        Self {
            feedback,
            cycle_period,
            mode_delay,
            sent: Mutex::new(SentDems::default()),
        }
    }

    /// Number of velocity demands received so far.
    pub fn num_sent(&self) -> Result<usize, ActuatorError> {
        Ok(self.lock_sent()?.num_sent)
    }

    /// The most recent velocity demand.
    pub fn last_sent(&self) -> Result<Option<JointVelocities>, ActuatorError> {
        Ok(self.lock_sent()?.last.clone())
    }

    fn lock_sent(&self) -> Result<std::sync::MutexGuard<'_, SentDems>, ActuatorError> {
        self.sent
            .lock()
            .map_err(|_| ActuatorError::SendFailed("sim state lock poisoned".into()))
    }
}

impl Actuator for SimActuator {
    fn request_operation_mode(&self, mode: OperationMode) -> Result<(), ActuatorError> {
        let delay = match self.mode_delay {
            Some(d) => d,
            None => {
                debug!("Sim arm ignoring request for {} mode", mode);
                return Ok(());
            }
        };

        let feedback = self.feedback.clone();
        thread::Builder::new()
            .name("sim::mode".into())
            .spawn(move || {
                thread::sleep(delay);
                if let Err(e) = feedback.update_operation_mode(mode) {
                    warn!("Sim arm could not report {} mode: {}", mode, e);
                }
            })
            .map_err(|e| ActuatorError::SendFailed(e.to_string()))?;

        Ok(())
    }

    fn send_velocities(&self, dems: &JointVelocities) -> Result<(), ActuatorError> {
        let dt = self.cycle_period.as_secs_f64();

        let mut config = self
            .feedback
            .configuration()
            .map_err(|e| ActuatorError::SendFailed(e.to_string()))?;

        if dems.velocities.len() != config.len() {
            return Err(ActuatorError::SendFailed(format!(
                "expected {} velocities, got {}",
                config.len(),
                dems.velocities.len()
            )));
        }

        for (c, v) in config.iter_mut().zip(dems.values().iter()) {
            *c += v * dt;
        }

        trace!("Sim arm configuration: {:?}", config);

        self.feedback
            .update_controller_state(&config)
            .map_err(|e| ActuatorError::SendFailed(e.to_string()))?;

        let mut sent = self.lock_sent()?;
        sent.num_sent += 1;
        sent.last = Some(dems.clone());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Instant;

    fn names() -> Vec<String> {
        vec!["j1".into(), "j2".into()]
    }

    #[test]
    fn test_integrates_velocities() {
        let fb = Arc::new(JointFeedback::new(names(), OperationMode::Velocity));
        let act = SimActuator::new(fb.clone(), Duration::from_millis(100), None);

        let dems = JointVelocities::from_values(&names(), "rad", &[1.0, -2.0]);
        act.send_velocities(&dems).unwrap();
        act.send_velocities(&dems).unwrap();

        let config = fb.configuration().unwrap();
        assert!((config[0] - 0.2).abs() < 1e-9);
        assert!((config[1] + 0.4).abs() < 1e-9);
        assert_eq!(act.num_sent().unwrap(), 2);
        assert_eq!(act.last_sent().unwrap(), Some(dems));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let fb = Arc::new(JointFeedback::new(names(), OperationMode::Velocity));
        let act = SimActuator::new(fb, Duration::from_millis(10), None);

        let dems = JointVelocities::from_values(&["j1".to_string()], "rad", &[1.0]);
        assert!(act.send_velocities(&dems).is_err());
        assert_eq!(act.num_sent().unwrap(), 0);
    }

    #[test]
    fn test_mode_confirmed_after_delay() {
        let fb = Arc::new(JointFeedback::new(names(), OperationMode::Position));
        let act = SimActuator::new(fb.clone(), Duration::from_millis(10), Some(Duration::from_millis(20)));

        act.request_operation_mode(OperationMode::Velocity).unwrap();
        assert_eq!(fb.operation_mode().unwrap(), OperationMode::Position);

        let start = Instant::now();
        while fb.operation_mode().unwrap() != OperationMode::Velocity {
            assert!(start.elapsed() < Duration::from_secs(2));
            fb.wait_mode_update(Duration::from_millis(50)).unwrap();
        }
    }
}
