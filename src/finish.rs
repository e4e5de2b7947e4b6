use bevy::math::Affine3A;
use bevy::prelude::*;

use crate::error::PhysicsError;
use crate::marble::Marble;
use crate::physics::{PhysicsBackend, SensorHandle};
use crate::track::Segment;

// ============================================================================
// FINISH TRIGGER
// ============================================================================

/// Sensor volume over a segment's collider, polled once per tick for the
/// first marble to reach it.
///
/// The trigger never latches a winner itself; the caller decides when to
/// stop polling.
#[derive(Debug)]
pub struct FinishTrigger {
    sensor: Option<SensorHandle>,
    half_extents: Vec3,
}

impl FinishTrigger {
    /// Register a sensor sized to `segment`'s collider at its world pose.
    ///
    /// A segment without a collider is logged and yields an inert trigger.
    pub fn new(
        physics: &mut impl PhysicsBackend,
        segment: &Segment,
    ) -> Result<Self, PhysicsError> {
        let Some(proxy) = segment.collider() else {
            error!(
                "finish trigger requested on {} segment without a collider; trigger stays inert",
                segment.kind().name()
            );
            return Ok(Self::inert());
        };

        let (center, half_extents) = proxy.collider.kind.local_extents();
        let pose = physics.world_pose(proxy.collider.body)? * Affine3A::from_translation(center);

        let sensor = physics.add_sensor(pose, half_extents)?;
        info!("finish trigger armed with half-extents {:?}", half_extents);

        Ok(Self {
            sensor: Some(sensor),
            half_extents,
        })
    }

    fn inert() -> Self {
        Self {
            sensor: None,
            half_extents: Vec3::ZERO,
        }
    }

    pub fn is_inert(&self) -> bool {
        self.sensor.is_none()
    }

    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    /// First marble found in the sensor's overlap set
    pub fn check_for_winner<'m>(
        &self,
        physics: &impl PhysicsBackend,
        marbles: &'m [Marble],
    ) -> Option<&'m Marble> {
        let sensor = self.sensor?;
        let overlapping = match physics.query_overlaps(sensor) {
            Ok(bodies) => bodies,
            Err(e) => {
                warn!("finish sensor query failed: {}", e);
                return None;
            }
        };

        overlapping
            .iter()
            .find_map(|body| marbles.iter().find(|m| m.body == *body))
    }

    /// Remove the sensor from physics. Safe to call more than once.
    pub fn release(&mut self, physics: &mut impl PhysicsBackend) {
        if let Some(sensor) = self.sensor.take() {
            physics.remove_sensor(sensor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marble::MarbleId;
    use crate::physics::PhysicsWorld;
    use crate::track::{GoalPadParams, StraightParams};
    use approx::assert_relative_eq;

    /// Goal pad whose slab is a unit box (half-extents 1, 1, 1)
    fn unit_goal(physics: &mut PhysicsWorld) -> Segment {
        let params = GoalPadParams {
            length: 2.0,
            half_width: 1.0,
            thickness: 1.0,
            ..default()
        };
        let mut segment = params.build().unwrap();
        segment.attach_collider(physics).unwrap();
        segment
    }

    fn spawn(physics: &mut PhysicsWorld, id: u32, position: Vec3) -> Marble {
        Marble::spawn(physics, MarbleId(id), position, 0.5, 1.0, Color::WHITE).unwrap()
    }

    #[test]
    fn test_sensor_matches_unit_slab_and_overlapping_marble_wins() {
        let mut physics = PhysicsWorld::default();
        let goal = unit_goal(&mut physics);
        let trigger = FinishTrigger::new(&mut physics, &goal).unwrap();

        assert!(!trigger.is_inert());
        assert_relative_eq!(trigger.half_extents(), Vec3::ONE);

        let slab_center = GoalPadParams {
            length: 2.0,
            half_width: 1.0,
            thickness: 1.0,
            ..default()
        }
        .slab()
        .0;
        let marbles = vec![
            spawn(&mut physics, 0, Vec3::new(40.0, 0.0, 0.0)),
            spawn(&mut physics, 1, slab_center + Vec3::new(0.3, 1.2, 0.0)),
        ];

        let winner = trigger.check_for_winner(&physics, &marbles).unwrap();
        assert_eq!(winner.id, MarbleId(1));
    }

    #[test]
    fn test_nothing_overlapping_means_no_winner() {
        let mut physics = PhysicsWorld::default();
        let goal = unit_goal(&mut physics);
        let trigger = FinishTrigger::new(&mut physics, &goal).unwrap();
        let marbles = vec![spawn(&mut physics, 0, Vec3::new(0.0, 30.0, 0.0))];

        assert!(trigger.check_for_winner(&physics, &marbles).is_none());
    }

    #[test]
    fn test_segment_without_collider_is_inert() {
        let mut physics = PhysicsWorld::default();
        let segment = StraightParams::default().build().unwrap();
        let trigger = FinishTrigger::new(&mut physics, &segment).unwrap();

        assert!(trigger.is_inert());
        assert_eq!(physics.sensor_count(), 0);

        let marbles = vec![spawn(&mut physics, 0, Vec3::ZERO)];
        assert!(trigger.check_for_winner(&physics, &marbles).is_none());
    }

    #[test]
    fn test_mesh_collider_sensor_covers_mesh_bounds() {
        let mut physics = PhysicsWorld::default();
        let mut segment = StraightParams::default().build().unwrap();
        segment.attach_collider(&mut physics).unwrap();
        let trigger = FinishTrigger::new(&mut physics, &segment).unwrap();

        assert_relative_eq!(trigger.half_extents().z, 5.0);
        let marbles = vec![spawn(&mut physics, 0, Vec3::new(0.0, -1.6, 9.0))];
        assert!(trigger.check_for_winner(&physics, &marbles).is_some());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut physics = PhysicsWorld::default();
        let goal = unit_goal(&mut physics);
        let mut trigger = FinishTrigger::new(&mut physics, &goal).unwrap();
        assert_eq!(physics.sensor_count(), 1);

        trigger.release(&mut physics);
        trigger.release(&mut physics);

        assert!(trigger.is_inert());
        assert_eq!(physics.sensor_count(), 0);
    }
}
