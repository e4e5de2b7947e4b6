use std::fmt;

use bevy::math::Affine3A;
use bevy::prelude::*;

use crate::error::PhysicsError;
use crate::physics::{BodyDesc, BodyHandle, ColliderShape, PhysicsBackend};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MarbleId(pub u32);

impl fmt::Display for MarbleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marble #{}", self.0)
    }
}

/// Dynamic sphere plus the state needed to draw it.
///
/// Physics owns the motion; `position` and `rotation` are a copy read back
/// once per tick.
#[derive(Clone, Debug)]
pub struct Marble {
    pub id: MarbleId,
    pub body: BodyHandle,
    pub position: Vec3,
    pub rotation: Quat,
    pub color: Color,
    pub radius: f32,
}

impl Marble {
    pub fn spawn(
        physics: &mut impl PhysicsBackend,
        id: MarbleId,
        position: Vec3,
        radius: f32,
        mass: f32,
        color: Color,
    ) -> Result<Self, PhysicsError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(PhysicsError::InvalidShape("marble mass must be positive"));
        }

        let body = physics.add_body(BodyDesc::dynamic(
            ColliderShape::Sphere { radius },
            Affine3A::from_translation(position),
            mass,
        ))?;

        Ok(Self {
            id,
            body,
            position,
            rotation: Quat::IDENTITY,
            color,
            radius,
        })
    }

    /// Copy the body's pose into the render state
    pub fn update_from_physics(&mut self, physics: &impl PhysicsBackend) -> Result<(), PhysicsError> {
        let (_, rotation, translation) = physics.world_pose(self.body)?.to_scale_rotation_translation();
        self.position = translation;
        self.rotation = rotation;
        Ok(())
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).with_rotation(self.rotation)
    }

    pub fn release(&self, physics: &mut impl PhysicsBackend) {
        physics.remove_body(self.body);
    }
}

/// Distinct, evenly spaced hues for a field of marbles
pub fn palette(count: usize) -> Vec<Color> {
    (0..count)
        .map(|i| {
            let hue = 360.0 * i as f32 / count.max(1) as f32;
            Color::hsl(hue, 0.75, 0.55)
        })
        .collect()
}
