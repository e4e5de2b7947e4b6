use std::collections::{HashMap, HashSet};

use bevy::math::Affine3A;
use bevy::prelude::*;
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use rapier3d::geometry::{
    BroadPhase, ColliderBuilder, ColliderHandle, ColliderSet, NarrowPhase, SharedShape,
};
use rapier3d::math::{Isometry, Point, Real, Vector};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::parry::query;
use rapier3d::pipeline::PhysicsPipeline;

use super::{BodyDesc, BodyHandle, ColliderShape, PhysicsBackend, SensorHandle, ShapeKind};
use crate::error::PhysicsError;

// ============================================================================
// SETTINGS
// ============================================================================

/// Steel marble on a painted track
const FRICTION: f32 = 0.5;
const RESTITUTION: f32 = 0.2;

#[derive(Clone, Debug)]
pub struct PhysicsSettings {
    pub gravity: Vec3,
    /// Length of one internal sub-step in seconds
    pub fixed_dt: f32,
    /// Cap on sub-steps per `step` call; excess wall time is dropped
    pub max_substeps: u32,
    /// Drag on dynamic bodies, standing in for rolling resistance
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_dt: 1.0 / 60.0,
            max_substeps: 10,
            linear_damping: 0.1,
            angular_damping: 0.1,
        }
    }
}

// ============================================================================
// POSE CONVERSION
// ============================================================================

/// Split `pose` into a proper isometry and whether it reflects local X.
///
/// `pose == isometry * diag(-1, 1, 1)` when mirrored. Boxes and balls are
/// symmetric under that reflection; meshes get it baked into their vertices.
fn split_pose(pose: &Affine3A) -> (Isometry<Real>, bool) {
    let basis = Mat3::from(pose.matrix3);
    let mirrored = basis.determinant() < 0.0;
    let proper = if mirrored {
        Mat3::from_cols(-basis.x_axis, basis.y_axis, basis.z_axis)
    } else {
        basis
    };

    let q = Quat::from_mat3(&proper).normalize();
    let t = pose.translation;
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z));
    (
        Isometry::from_parts(Translation3::new(t.x, t.y, t.z), rotation),
        mirrored,
    )
}

fn affine_of(iso: &Isometry<Real>) -> Affine3A {
    let q = iso.rotation.coords;
    let t = iso.translation.vector;
    Affine3A::from_rotation_translation(
        Quat::from_xyzw(q.x, q.y, q.z, q.w),
        Vec3::new(t.x, t.y, t.z),
    )
}

fn vec3_of(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

// ============================================================================
// BODIES
// ============================================================================

/// Triangle mesh kept in the caller's local frame so it can be re-mirrored
struct LocalMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl LocalMesh {
    fn shape(&self, mirrored: bool) -> Result<SharedShape, PhysicsError> {
        let mut points = Vec::new();
        points
            .try_reserve(self.vertices.len())
            .map_err(|_| PhysicsError::OutOfMemory)?;
        points.extend(self.vertices.iter().map(|v| {
            let x = if mirrored { -v.x } else { v.x };
            Point::new(x, v.y, v.z)
        }));

        // Reflection flips winding; swap back so faces keep their side
        let triangles = if mirrored {
            self.triangles.iter().map(|&[a, b, c]| [a, c, b]).collect()
        } else {
            self.triangles.clone()
        };

        Ok(SharedShape::trimesh(points, triangles))
    }
}

struct BodyEntry {
    collider: ColliderHandle,
    kind: ShapeKind,
    /// Pose as last given, reflection included
    pose: Affine3A,
    mirrored: bool,
    mesh: Option<LocalMesh>,
    /// Insertion sequence, for stable overlap ordering
    order: u64,
}

fn build_shape(
    shape: ColliderShape,
    mirrored: bool,
) -> Result<(SharedShape, Option<LocalMesh>), PhysicsError> {
    match shape {
        ColliderShape::Sphere { radius } => {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(PhysicsError::InvalidShape("sphere radius must be positive"));
            }
            Ok((SharedShape::ball(radius), None))
        }
        ColliderShape::Box { half_extents } => {
            if !half_extents.is_finite() || half_extents.min_element() <= 0.0 {
                return Err(PhysicsError::InvalidShape("box half-extents must be positive"));
            }
            Ok((
                SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
                None,
            ))
        }
        ColliderShape::TriMesh { vertices, indices } => {
            if indices.len() < 3 {
                return Err(PhysicsError::EmptyMesh);
            }
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                return Err(PhysicsError::IndexOutOfRange {
                    index,
                    vertex_count: vertices.len(),
                });
            }

            let mut triangles = Vec::new();
            triangles
                .try_reserve(indices.len() / 3)
                .map_err(|_| PhysicsError::OutOfMemory)?;
            triangles.extend(indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]));

            let mesh = LocalMesh {
                vertices,
                triangles,
            };
            Ok((mesh.shape(mirrored)?, Some(mesh)))
        }
    }
}

// ============================================================================
// WORLD
// ============================================================================

/// Rapier-backed rigid-body world: dynamic spheres against static meshes,
/// boxes and each other, plus box sensors.
pub struct PhysicsWorld {
    settings: PhysicsSettings,
    accumulator: f32,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    entries: HashMap<RigidBodyHandle, BodyEntry>,
    sensors: HashSet<ColliderHandle>,
    next_order: u64,
}

impl PhysicsWorld {
    pub fn new(settings: PhysicsSettings) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = settings.fixed_dt;

        Self {
            gravity: Vector::new(settings.gravity.x, settings.gravity.y, settings.gravity.z),
            settings,
            accumulator: 0.0,
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            entries: HashMap::new(),
            sensors: HashSet::new(),
            next_order: 0,
        }
    }

    pub fn body_count(&self) -> usize {
        self.entries.len()
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Advance by `dt` seconds and report how many fixed sub-steps ran
    pub fn advance(&mut self, dt: f32) -> u32 {
        if !dt.is_finite() || dt <= 0.0 {
            return 0;
        }

        self.accumulator += dt;
        let fixed = self.settings.fixed_dt;
        let mut substeps = 0;
        while self.accumulator >= fixed && substeps < self.settings.max_substeps {
            self.substep();
            self.accumulator -= fixed;
            substeps += 1;
        }

        if self.accumulator >= fixed {
            debug!(
                "physics fell behind, dropping {:.3}s of simulation time",
                self.accumulator
            );
            self.accumulator %= fixed;
        }

        substeps
    }

    /// Remove every body and sensor; outstanding handles go stale
    pub fn clear(&mut self) {
        let sensors: Vec<ColliderHandle> = self.sensors.drain().collect();
        for sensor in sensors {
            self.colliders.remove(
                sensor,
                &mut self.island_manager,
                &mut self.bodies,
                false,
            );
        }

        let bodies: Vec<RigidBodyHandle> = self.entries.drain().map(|(h, _)| h).collect();
        for body in bodies {
            self.bodies.remove(
                body,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
        self.accumulator = 0.0;
    }

    fn substep(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsSettings::default())
    }
}

impl PhysicsBackend for PhysicsWorld {
    fn add_body(&mut self, desc: BodyDesc) -> Result<BodyHandle, PhysicsError> {
        let kind = desc.shape.kind();
        let is_static = desc.is_static();
        if !is_static && !matches!(kind, ShapeKind::Sphere { .. }) {
            return Err(PhysicsError::InvalidShape("only spheres can be dynamic"));
        }

        let (isometry, mirrored) = split_pose(&desc.pose);
        let (shape, mesh) = build_shape(desc.shape, mirrored)?;

        let body = if is_static {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
                .linear_damping(self.settings.linear_damping)
                .angular_damping(self.settings.angular_damping)
                .ccd_enabled(true)
        }
        .position(isometry)
        .build();
        let handle = self.bodies.insert(body);

        let mut collider = ColliderBuilder::new(shape)
            .friction(FRICTION)
            .restitution(RESTITUTION);
        if !is_static {
            collider = collider.mass(desc.mass);
        }
        let collider =
            self.colliders
                .insert_with_parent(collider.build(), handle, &mut self.bodies);

        self.entries.insert(
            handle,
            BodyEntry {
                collider,
                kind,
                pose: desc.pose,
                mirrored,
                mesh,
                order: self.next_order,
            },
        );
        self.next_order += 1;

        Ok(BodyHandle(handle))
    }

    fn remove_body(&mut self, body: BodyHandle) -> bool {
        if self.entries.remove(&body.0).is_none() {
            return false;
        }
        self.bodies
            .remove(
                body.0,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn world_pose(&self, body: BodyHandle) -> Result<Affine3A, PhysicsError> {
        let entry = self.entries.get(&body.0).ok_or(PhysicsError::StaleBody(body))?;
        let rigid = self.bodies.get(body.0).ok_or(PhysicsError::StaleBody(body))?;

        if rigid.is_dynamic() {
            Ok(affine_of(rigid.position()))
        } else {
            Ok(entry.pose)
        }
    }

    fn set_world_pose(&mut self, body: BodyHandle, pose: Affine3A) -> Result<(), PhysicsError> {
        let entry = self
            .entries
            .get_mut(&body.0)
            .ok_or(PhysicsError::StaleBody(body))?;
        let (isometry, mirrored) = split_pose(&pose);

        if mirrored != entry.mirrored {
            if let Some(mesh) = &entry.mesh {
                let shape = mesh.shape(mirrored)?;
                if let Some(collider) = self.colliders.get_mut(entry.collider) {
                    collider.set_shape(shape);
                }
            }
            entry.mirrored = mirrored;
        }
        entry.pose = pose;

        let rigid = self
            .bodies
            .get_mut(body.0)
            .ok_or(PhysicsError::StaleBody(body))?;
        rigid.set_position(isometry, true);
        Ok(())
    }

    fn linear_velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError> {
        self.bodies
            .get(body.0)
            .map(|rigid| vec3_of(rigid.linvel()))
            .ok_or(PhysicsError::StaleBody(body))
    }

    fn shape_kind(&self, body: BodyHandle) -> Result<ShapeKind, PhysicsError> {
        self.entries
            .get(&body.0)
            .map(|entry| entry.kind)
            .ok_or(PhysicsError::StaleBody(body))
    }

    fn step(&mut self, dt: f32) {
        self.advance(dt);
    }

    fn add_sensor(
        &mut self,
        pose: Affine3A,
        half_extents: Vec3,
    ) -> Result<SensorHandle, PhysicsError> {
        // Flat meshes give a zero-thickness volume, which still intersects
        if !half_extents.is_finite() || half_extents.min_element() < 0.0 {
            return Err(PhysicsError::InvalidShape("sensor half-extents must not be negative"));
        }

        let (isometry, _) = split_pose(&pose);
        let sensor = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .sensor(true)
            .position(isometry)
            .build();
        let handle = self.colliders.insert(sensor);
        self.sensors.insert(handle);
        Ok(SensorHandle(handle))
    }

    fn remove_sensor(&mut self, sensor: SensorHandle) -> bool {
        if !self.sensors.remove(&sensor.0) {
            return false;
        }
        self.colliders
            .remove(sensor.0, &mut self.island_manager, &mut self.bodies, false)
            .is_some()
    }

    fn query_overlaps(&self, sensor: SensorHandle) -> Result<Vec<BodyHandle>, PhysicsError> {
        let volume = self
            .sensors
            .get(&sensor.0)
            .and_then(|handle| self.colliders.get(*handle))
            .ok_or(PhysicsError::StaleSensor(sensor))?;

        // Colliders sit at their body's origin, so the body pose is the shape pose
        let mut hits: Vec<(u64, BodyHandle)> = self
            .entries
            .iter()
            .filter_map(|(handle, entry)| {
                let rigid = self.bodies.get(*handle)?;
                let collider = self.colliders.get(entry.collider)?;
                let touching = query::intersection_test(
                    volume.position(),
                    volume.shape(),
                    rigid.position(),
                    collider.shape(),
                )
                .unwrap_or(false);
                touching.then_some((entry.order, BodyHandle(*handle)))
            })
            .collect();
        hits.sort_unstable_by_key(|(order, _)| *order);

        Ok(hits.into_iter().map(|(_, body)| body).collect())
    }
}
