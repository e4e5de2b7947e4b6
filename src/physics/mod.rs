//! Rigid-body collaborator for the marble run.
//!
//! Everything outside this module talks to physics through [`PhysicsBackend`]:
//! create a body from a shape, read or write its world pose, step, and query
//! sensor overlaps. The engine owns all body state; callers only ever hold
//! copyable generational handles.

use std::fmt;

use bevy::math::Affine3A;
use bevy::prelude::*;
use rapier3d::dynamics::RigidBodyHandle;
use rapier3d::geometry::ColliderHandle;

use crate::bounds::AABB;
use crate::error::PhysicsError;

mod world;

pub use world::{PhysicsSettings, PhysicsWorld};

// ============================================================================
// HANDLES
// ============================================================================

/// A rigid body registered with the engine
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BodyHandle(pub(crate) RigidBodyHandle);

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (index, generation) = self.0.into_raw_parts();
        write!(f, "BodyHandle({}v{})", index, generation)
    }
}

/// A parentless sensor collider
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SensorHandle(pub(crate) ColliderHandle);

impl fmt::Display for SensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (index, generation) = self.0.into_raw_parts();
        write!(f, "SensorHandle({}v{})", index, generation)
    }
}

// ============================================================================
// SHAPES
// ============================================================================

/// Tagged description of a collision shape, kept next to a body handle so
/// callers can read the shape's parameters without asking the engine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ShapeKind {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    /// Triangle soup; only its local bounds are carried.
    TriMesh { local_bounds: AABB },
}

impl ShapeKind {
    /// Center and half-extents of the volume the shape occupies in its own frame
    pub fn local_extents(&self) -> (Vec3, Vec3) {
        match *self {
            ShapeKind::Sphere { radius } => (Vec3::ZERO, Vec3::splat(radius)),
            ShapeKind::Box { half_extents } => (Vec3::ZERO, half_extents),
            ShapeKind::TriMesh { local_bounds } => {
                (local_bounds.center(), local_bounds.half_extents())
            }
        }
    }
}

/// Shape data handed to the backend when a body is created
#[derive(Clone, Debug)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    TriMesh { vertices: Vec<Vec3>, indices: Vec<u32> },
}

impl ColliderShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ColliderShape::Sphere { radius } => ShapeKind::Sphere { radius: *radius },
            ColliderShape::Box { half_extents } => ShapeKind::Box {
                half_extents: *half_extents,
            },
            ColliderShape::TriMesh { vertices, .. } => ShapeKind::TriMesh {
                local_bounds: AABB::from_points(vertices, 0.0),
            },
        }
    }
}

/// Everything needed to register one body.
///
/// A mass of zero makes the body static, otherwise it is simulated.
#[derive(Clone, Debug)]
pub struct BodyDesc {
    pub shape: ColliderShape,
    pub pose: Affine3A,
    pub mass: f32,
}

impl BodyDesc {
    pub fn fixed(shape: ColliderShape, pose: Affine3A) -> Self {
        Self {
            shape,
            pose,
            mass: 0.0,
        }
    }

    pub fn dynamic(shape: ColliderShape, pose: Affine3A, mass: f32) -> Self {
        Self { shape, pose, mass }
    }

    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }
}

/// A body handle together with the shape it was created from
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Collider {
    pub body: BodyHandle,
    pub kind: ShapeKind,
}

// ============================================================================
// BACKEND TRAIT
// ============================================================================

/// The narrow set of operations the track, marbles and finish trigger need
/// from a physics engine.
pub trait PhysicsBackend {
    fn add_body(&mut self, desc: BodyDesc) -> Result<BodyHandle, PhysicsError>;

    /// Returns false when the handle was already stale
    fn remove_body(&mut self, body: BodyHandle) -> bool;

    fn world_pose(&self, body: BodyHandle) -> Result<Affine3A, PhysicsError>;

    fn set_world_pose(&mut self, body: BodyHandle, pose: Affine3A) -> Result<(), PhysicsError>;

    /// Linear velocity; zero for static bodies
    fn linear_velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError>;

    fn shape_kind(&self, body: BodyHandle) -> Result<ShapeKind, PhysicsError>;

    /// Advance the simulation by `dt` seconds of wall time
    fn step(&mut self, dt: f32);

    /// Register a box-shaped volume that reports overlaps but never collides
    fn add_sensor(
        &mut self,
        pose: Affine3A,
        half_extents: Vec3,
    ) -> Result<SensorHandle, PhysicsError>;

    fn remove_sensor(&mut self, sensor: SensorHandle) -> bool;

    /// Bodies currently overlapping the sensor, in body creation order
    fn query_overlaps(&self, sensor: SensorHandle) -> Result<Vec<BodyHandle>, PhysicsError>;

    /// Create a body and return it paired with its shape descriptor
    fn add_collider(&mut self, desc: BodyDesc) -> Result<Collider, PhysicsError> {
        let kind = desc.shape.kind();
        let body = self.add_body(desc)?;
        Ok(Collider { body, kind })
    }
}
