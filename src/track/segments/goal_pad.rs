use bevy::prelude::*;

use super::strip::{flat_profile, sweep};
use super::StraightParams;
use crate::error::TrackError;
use crate::track::{Proxy, Segment, SegmentKind};

/// Level landing deck at the end of a course.
///
/// Collides as a solid slab under the deck, so a finish sensor can be sized
/// from the slab.
#[derive(Clone, Debug, PartialEq)]
pub struct GoalPadParams {
    pub length: f32,
    pub half_width: f32,
    pub depth: f32,
    /// Half-height of the slab
    pub thickness: f32,
    pub seg_u: u32,
    pub seg_v: u32,
}

impl Default for GoalPadParams {
    fn default() -> Self {
        Self {
            length: 8.0,
            half_width: 5.0,
            depth: 2.0,
            thickness: 0.5,
            seg_u: 1,
            seg_v: 1,
        }
    }
}

impl GoalPadParams {
    pub fn validate(&self) -> Result<(), TrackError> {
        TrackError::require_positive("thickness", self.thickness)?;
        self.deck().validate()
    }

    fn deck(&self) -> StraightParams {
        StraightParams {
            length: self.length,
            half_width: self.half_width,
            depth: self.depth,
            pitch_deg: 0.0,
            height_offset: 0.0,
            seg_u: self.seg_u,
            seg_v: self.seg_v,
        }
    }

    /// Slab center and half-extents in the segment's local frame
    pub fn slab(&self) -> (Vec3, Vec3) {
        let center = Vec3::new(0.0, -self.depth - self.thickness, self.length * 0.5);
        let half_extents = Vec3::new(self.half_width, self.thickness, self.length * 0.5);
        (center, half_extents)
    }

    pub fn build(&self) -> Result<Segment, TrackError> {
        self.validate()?;

        let deck = self.deck();
        let slices = deck.slices();
        let mesh = sweep(&slices, self.seg_v, flat_profile(self.depth));
        let (center, half_extents) = self.slab();

        Ok(Segment::new(
            SegmentKind::GoalPad(self.clone()),
            mesh,
            slices,
            self.depth,
            Proxy::Slab {
                center,
                half_extents,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{PhysicsBackend, PhysicsWorld, ShapeKind};
    use approx::assert_relative_eq;

    #[test]
    fn test_slab_top_is_flush_with_deck() {
        let params = GoalPadParams::default();
        let (center, half_extents) = params.slab();

        assert_relative_eq!(center.y + half_extents.y, -params.depth);
        assert_relative_eq!(center.z - half_extents.z, 0.0);
        assert_relative_eq!(center.z + half_extents.z, params.length);
    }

    #[test]
    fn test_collides_as_box() {
        let mut physics = PhysicsWorld::default();
        let mut segment = GoalPadParams::default().build().unwrap();
        let proxy = segment.attach_collider(&mut physics).unwrap();

        assert_eq!(
            physics.shape_kind(proxy.collider.body).unwrap(),
            ShapeKind::Box {
                half_extents: Vec3::new(5.0, 0.5, 4.0)
            }
        );
        let pose = physics.world_pose(proxy.collider.body).unwrap();
        assert_relative_eq!(pose.translation.y, -2.5);
        assert_relative_eq!(pose.translation.z, 4.0);
    }
}
