use bevy::math::Affine3A;
use bevy::prelude::*;

use crate::bounds::AABB;
use crate::error::{PhysicsError, TrackError};
use crate::physics::{BodyDesc, Collider, ColliderShape, PhysicsBackend};

mod chain;
pub mod generator;
pub mod obstacles;
pub mod segments;

pub use chain::TrackChain;
pub use segments::{CurvedParams, FunnelParams, GoalPadParams, StraightParams};

// ============================================================================
// POSE FRAME - Connection point between segments
// ============================================================================

/// Position plus an orthonormal forward/up pair
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseFrame {
    pub position: Vec3,
    /// Direction of travel (normalized)
    pub forward: Vec3,
    /// Surface up (normalized, orthogonal to forward)
    pub up: Vec3,
}

impl PoseFrame {
    /// Local entry frame shared by every segment: origin, +Z forward, +Y up
    pub const ENTRY: PoseFrame = PoseFrame {
        position: Vec3::ZERO,
        forward: Vec3::Z,
        up: Vec3::Y,
    };

    pub fn new(position: Vec3, forward: Vec3, up: Vec3) -> Self {
        Self {
            position,
            forward: forward.normalize(),
            up: up.normalize(),
        }
    }

    /// Get the right vector (perpendicular to forward and up)
    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize()
    }

    /// Columns `[right, up, forward]`
    pub fn basis(&self) -> Mat3 {
        Mat3::from_cols(self.right(), self.up, self.forward)
    }

    /// Affine map taking the local axes onto this frame
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_mat3_translation(self.basis(), self.position)
    }

    /// Map the frame through a world transform
    pub fn transformed(&self, transform: &Affine3A) -> Self {
        Self {
            position: transform.transform_point3(self.position),
            forward: transform.transform_vector3(self.forward).normalize(),
            up: transform.transform_vector3(self.up).normalize(),
        }
    }

    /// Check if another frame continues this one.
    /// Positions must match within `tolerance` and both axes must be parallel.
    pub fn coincides(&self, other: &PoseFrame, tolerance: f32) -> bool {
        let position_match = self.position.distance(other.position) <= tolerance;
        let forward_match = self.forward.dot(other.forward) >= 1.0 - tolerance;
        let up_match = self.up.dot(other.up) >= 1.0 - tolerance;

        position_match && forward_match && up_match
    }
}

impl Default for PoseFrame {
    fn default() -> Self {
        Self::ENTRY
    }
}

// ============================================================================
// TRACK MESH
// ============================================================================

/// Indexed triangle strip produced by the segment builders
#[derive(Clone, Debug, Default)]
pub struct TrackMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Cells along the path
    pub seg_u: u32,
    /// Cells across the cross-section
    pub seg_v: u32,
}

impl TrackMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn bounds(&self) -> AABB {
        AABB::from_points(&self.positions, 0.0)
    }
}

// ============================================================================
// SEGMENT
// ============================================================================

/// Which builder produced a segment, with the parameters it used
#[derive(Clone, Debug, PartialEq)]
pub enum SegmentKind {
    Straight(StraightParams),
    Curved(CurvedParams),
    Funnel(FunnelParams),
    GoalPad(GoalPadParams),
}

impl SegmentKind {
    pub fn name(&self) -> &'static str {
        match self {
            SegmentKind::Straight(_) => "Straight",
            SegmentKind::Curved(_) => "Curved",
            SegmentKind::Funnel(_) => "Funnel",
            SegmentKind::GoalPad(_) => "GoalPad",
        }
    }
}

/// One centerline sample: its frame and the cross-section half-width there
#[derive(Clone, Copy, Debug)]
pub struct Slice {
    pub frame: PoseFrame,
    pub half_width: f32,
}

/// Collision proxy shape, in the segment's local space
#[derive(Clone, Debug)]
pub(crate) enum Proxy {
    /// The render mesh doubles as a static triangle soup
    Mesh,
    /// Solid box under the deck
    Slab { center: Vec3, half_extents: Vec3 },
}

/// Physics body backing a segment
#[derive(Clone, Copy, Debug)]
pub struct SegmentCollider {
    pub collider: Collider,
    /// Pose of the body relative to the segment's local frame
    pub offset: Affine3A,
}

/// A piece of track: mesh, slice frames, exit frame and collision proxy.
///
/// Entry is always [`PoseFrame::ENTRY`]; the exit is wherever the builder's
/// path ended. The world transform is set by the chain when the segment is
/// attached.
pub struct Segment {
    kind: SegmentKind,
    mesh: TrackMesh,
    slices: Vec<Slice>,
    surface_depth: f32,
    exit: PoseFrame,
    proxy: Proxy,
    collider: Option<SegmentCollider>,
    world_transform: Affine3A,
}

impl Segment {
    pub(crate) fn new(
        kind: SegmentKind,
        mesh: TrackMesh,
        slices: Vec<Slice>,
        surface_depth: f32,
        proxy: Proxy,
    ) -> Self {
        let exit = slices.last().map(|s| s.frame).unwrap_or_default();
        Self {
            kind,
            mesh,
            slices,
            surface_depth,
            exit,
            proxy,
            collider: None,
            world_transform: Affine3A::IDENTITY,
        }
    }

    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    pub fn mesh(&self) -> &TrackMesh {
        &self.mesh
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Distance from the centerline down to the lowest point of the surface
    pub fn surface_depth(&self) -> f32 {
        self.surface_depth
    }

    pub fn entry(&self) -> PoseFrame {
        PoseFrame::ENTRY
    }

    pub fn exit(&self) -> PoseFrame {
        self.exit
    }

    pub fn entry_half_width(&self) -> f32 {
        self.slices.first().map_or(0.0, |s| s.half_width)
    }

    pub fn exit_half_width(&self) -> f32 {
        self.slices.last().map_or(0.0, |s| s.half_width)
    }

    pub fn world_transform(&self) -> Affine3A {
        self.world_transform
    }

    pub fn world_entry(&self) -> PoseFrame {
        self.entry().transformed(&self.world_transform)
    }

    pub fn world_exit(&self) -> PoseFrame {
        self.exit.transformed(&self.world_transform)
    }

    pub fn world_bounds(&self) -> AABB {
        self.mesh.bounds().transformed(&self.world_transform)
    }

    pub fn collider(&self) -> Option<&SegmentCollider> {
        self.collider.as_ref()
    }

    /// Register the collision proxy at the current world transform.
    /// Returns the existing proxy if the segment already has one.
    pub fn attach_collider(
        &mut self,
        physics: &mut impl PhysicsBackend,
    ) -> Result<SegmentCollider, PhysicsError> {
        if let Some(existing) = self.collider {
            return Ok(existing);
        }

        let (shape, offset) = match &self.proxy {
            Proxy::Mesh => (
                ColliderShape::TriMesh {
                    vertices: self.mesh.positions.clone(),
                    indices: self.mesh.indices.clone(),
                },
                Affine3A::IDENTITY,
            ),
            Proxy::Slab {
                center,
                half_extents,
            } => (
                ColliderShape::Box {
                    half_extents: *half_extents,
                },
                Affine3A::from_translation(*center),
            ),
        };

        let collider = physics.add_collider(BodyDesc::fixed(shape, self.world_transform * offset))?;
        debug!(
            "{} segment collider {} registered",
            self.kind.name(),
            collider.body
        );

        let proxy = SegmentCollider { collider, offset };
        self.collider = Some(proxy);
        Ok(proxy)
    }

    /// Move the segment, keeping the collision proxy coincident with it
    pub fn set_world_transform(
        &mut self,
        transform: Affine3A,
        physics: &mut impl PhysicsBackend,
    ) -> Result<(), TrackError> {
        self.world_transform = transform;
        if let Some(proxy) = &self.collider {
            physics.set_world_pose(proxy.collider.body, transform * proxy.offset)?;
        }
        Ok(())
    }

    /// Drop the collision proxy from physics
    pub fn release(&mut self, physics: &mut impl PhysicsBackend) {
        if let Some(proxy) = self.collider.take() {
            physics.remove_body(proxy.collider.body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{PhysicsWorld, ShapeKind};
    use approx::assert_relative_eq;

    #[test]
    fn test_entry_frame_right_is_negative_x() {
        let right = PoseFrame::ENTRY.right();
        assert_relative_eq!(right.x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(right.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_coincides_rejects_flipped_up() {
        let a = PoseFrame::new(Vec3::ONE, Vec3::Z, Vec3::Y);
        let b = PoseFrame::new(Vec3::ONE, Vec3::Z, Vec3::NEG_Y);
        assert!(a.coincides(&a, 1e-4));
        assert!(!a.coincides(&b, 1e-4));
    }

    #[test]
    fn test_world_transform_moves_collider() {
        let mut physics = PhysicsWorld::default();
        let mut segment = StraightParams::default().build().unwrap();
        let body = segment.attach_collider(&mut physics).unwrap().collider.body;

        let moved = Affine3A::from_translation(Vec3::new(0.0, -4.0, 3.0));
        segment.set_world_transform(moved, &mut physics).unwrap();

        assert_eq!(physics.world_pose(body).unwrap(), moved);
        assert!(matches!(
            physics.shape_kind(body).unwrap(),
            ShapeKind::TriMesh { .. }
        ));

        segment.release(&mut physics);
        assert!(segment.collider().is_none());
        assert_eq!(physics.body_count(), 0);
    }
}
