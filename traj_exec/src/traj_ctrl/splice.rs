//! Trajectory splicing
//!
//! When a goal arrives after the previous motion was preempted, the new
//! trajectory is prefixed with the current configuration and the four most
//! recent setpoints of the abandoned motion, so the generator can rebuild
//! path continuity across the preemption boundary.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::tc::traj_ctrl::Waypoint;

use super::TrajCtrlError;
use crate::motion_gen::RetainedSetpoints;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of waypoints placed ahead of the new trajectory.
pub const SPLICE_PREFIX_LEN: usize = 5;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the continuation trajectory for a preempted motion.
///
/// The result is `[current, last3, last2, last1, last]` at rest, followed by
/// `new_points` unchanged.
///
/// NOTE: the retained setpoints sit newest-last after the current
/// configuration. This ordering is kept exactly, the generator's behaviour
/// across a preemption depends on it.
pub fn splice(
    new_points: &[Waypoint],
    retained: &RetainedSetpoints,
    current: &[f64],
) -> Result<Vec<Waypoint>, TrajCtrlError> {
    let dof = current.len();

    let prefix: [&[f64]; SPLICE_PREFIX_LEN] = [
        current,
        &retained.last3,
        &retained.last2,
        &retained.last1,
        &retained.last,
    ];

    let mut points = Vec::with_capacity(SPLICE_PREFIX_LEN + new_points.len());

    for positions in prefix.iter() {
        if positions.len() != dof {
            return Err(TrajCtrlError::DofMismatch {
                expected: dof,
                found: positions.len(),
            });
        }
        points.push(Waypoint::at_rest(positions));
    }

    points.extend(new_points.iter().cloned());

    Ok(points)
}

/// Prefix a trajectory with the current configuration at rest, giving the
/// generator an explicit start point for the spline.
pub fn prepend_current(new_points: &[Waypoint], current: &[f64]) -> Vec<Waypoint> {
    let mut points = Vec::with_capacity(1 + new_points.len());
    points.push(Waypoint::at_rest(current));
    points.extend(new_points.iter().cloned());
    points
}

#[cfg(test)]
mod test {
    use super::*;

    fn retained() -> RetainedSetpoints {
        RetainedSetpoints {
            last: vec![4.0, 40.0],
            last1: vec![3.0, 30.0],
            last2: vec![2.0, 20.0],
            last3: vec![1.0, 10.0],
        }
    }

    fn new_points() -> Vec<Waypoint> {
        vec![
            Waypoint {
                positions: vec![5.0, 50.0],
                velocities: vec![0.5, 0.6],
                accelerations: vec![0.1, 0.2],
            },
            Waypoint {
                positions: vec![6.0, 60.0],
                velocities: vec![0.0, 0.0],
                accelerations: vec![0.0, 0.0],
            },
        ]
    }

    #[test]
    fn test_splice_order() {
        let current = [0.5, 5.0];
        let points = splice(&new_points(), &retained(), &current).unwrap();

        assert_eq!(points.len(), SPLICE_PREFIX_LEN + 2);

        let positions: Vec<Vec<f64>> = points.iter().map(|p| p.positions.clone()).collect();
        assert_eq!(
            positions,
            vec![
                vec![0.5, 5.0],
                vec![1.0, 10.0],
                vec![2.0, 20.0],
                vec![3.0, 30.0],
                vec![4.0, 40.0],
                vec![5.0, 50.0],
                vec![6.0, 60.0],
            ]
        );

        for p in points[..SPLICE_PREFIX_LEN].iter() {
            assert_eq!(p.velocities, vec![0.0, 0.0]);
            assert_eq!(p.accelerations, vec![0.0, 0.0]);
        }

        assert_eq!(&points[SPLICE_PREFIX_LEN..], &new_points()[..]);
    }

    #[test]
    fn test_splice_dof_mismatch() {
        let mut r = retained();
        r.last2 = vec![2.0];

        assert!(matches!(
            splice(&new_points(), &r, &[0.0, 0.0]),
            Err(TrajCtrlError::DofMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_prepend_current() {
        let points = prepend_current(&new_points(), &[0.5, 5.0]);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], Waypoint::at_rest(&[0.5, 5.0]));
        assert_eq!(&points[1..], &new_points()[..]);
    }
}
