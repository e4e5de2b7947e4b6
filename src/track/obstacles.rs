use bevy::math::Affine3A;
use bevy::prelude::*;
use rand::Rng;

use super::Segment;
use crate::error::TrackError;
use crate::physics::{BodyDesc, BodyHandle, ColliderShape, PhysicsBackend};

/// How many boxes to scatter on a segment and how big they may be
#[derive(Clone, Debug, PartialEq)]
pub struct ObstacleConfig {
    pub count: usize,
    /// Smallest full edge length per axis
    pub min_size: f32,
    /// Largest full edge length per axis
    pub max_size: f32,
    /// Keep-out distance from both segment ends
    pub margin: f32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            count: 6,
            min_size: 0.4,
            max_size: 1.2,
            margin: 1.5,
        }
    }
}

impl ObstacleConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        TrackError::require_positive("min_size", self.min_size)?;
        TrackError::require_positive("max_size", self.max_size)?;
        if self.max_size < self.min_size {
            return Err(TrackError::InvalidParameter {
                name: "max_size",
                value: self.max_size,
            });
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(TrackError::InvalidParameter {
                name: "margin",
                value: self.margin,
            });
        }
        Ok(())
    }
}

/// Static box sitting on a segment
#[derive(Clone, Copy, Debug)]
pub struct Obstacle {
    pub position: Vec3,
    pub rotation: Quat,
    pub half_extents: Vec3,
    pub body: BodyHandle,
}

/// World-space frame laid along a segment's entry-to-exit chord
#[derive(Clone, Copy, Debug)]
pub struct SurfaceFrame {
    pub origin: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    pub length: f32,
}

impl SurfaceFrame {
    pub fn of(segment: &Segment) -> Self {
        let entry = segment.world_entry();
        let exit = segment.world_exit();

        let chord = exit.position - entry.position;
        let length = chord.length();
        let forward = chord.normalize_or(entry.forward);
        let up = (exit.up - forward * exit.up.dot(forward)).normalize_or(Vec3::Y);
        let right = forward.cross(up).normalize();

        Self {
            origin: entry.position,
            forward,
            up,
            right,
            length,
        }
    }

    /// Proper rotation whose local +Y is `up` and +Z is `forward`
    pub fn rotation(&self) -> Quat {
        Quat::from_mat3(&Mat3::from_cols(-self.right, self.up, self.forward))
    }
}

/// Scatter `config.count` static boxes across the segment's surface.
///
/// Each box rests on the surface `segment.surface_depth()` below the chord,
/// stays inside the narrower end's width and keeps `margin` clear of both
/// ends. Segments shorter than two margins get their boxes at the midpoint.
/// If any box is refused, the ones already placed are removed again.
pub fn place_obstacles(
    segment: &Segment,
    config: &ObstacleConfig,
    rng: &mut impl Rng,
    physics: &mut impl PhysicsBackend,
) -> Result<Vec<Obstacle>, TrackError> {
    config.validate()?;

    let frame = SurfaceFrame::of(segment);
    let half_width = segment.entry_half_width().min(segment.exit_half_width());
    let surface_offset = segment.surface_depth();
    let rotation = frame.rotation();

    let mut obstacles: Vec<Obstacle> = Vec::with_capacity(config.count);
    for _ in 0..config.count {
        let size = Vec3::new(
            rng.gen_range(config.min_size..=config.max_size),
            rng.gen_range(config.min_size..=config.max_size),
            rng.gen_range(config.min_size..=config.max_size),
        );

        let usable = (half_width - size.x * 0.5).max(0.0);
        let lateral = rng.gen_range(-usable..=usable);
        let along = if frame.length > 2.0 * config.margin {
            rng.gen_range(config.margin..=frame.length - config.margin)
        } else {
            frame.length * 0.5
        };

        let position = frame.origin
            + frame.forward * along
            + frame.right * lateral
            + frame.up * (size.y * 0.5 - surface_offset);
        let half_extents = size * 0.5;

        let body = match physics.add_body(BodyDesc::fixed(
            ColliderShape::Box { half_extents },
            Affine3A::from_rotation_translation(rotation, position),
        )) {
            Ok(body) => body,
            Err(e) => {
                for placed in &obstacles {
                    physics.remove_body(placed.body);
                }
                return Err(e.into());
            }
        };

        obstacles.push(Obstacle {
            position,
            rotation,
            half_extents,
            body,
        });
    }

    debug!(
        "placed {} obstacles on {} segment",
        obstacles.len(),
        segment.kind().name()
    );

    Ok(obstacles)
}
