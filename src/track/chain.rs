use bevy::math::Affine3A;
use bevy::prelude::*;

use super::{PoseFrame, Segment};
use crate::bounds::AABB;
use crate::error::TrackError;
use crate::physics::PhysicsBackend;

/// World transform that lands `next_entry` on `end`.
///
/// The basis columns are `[right, up, forward]` with `right = forward x up`,
/// exactly as the frame reports them. Relative to a segment's own local axes
/// (where +X is to the left of travel) this basis is a reflection, so chained
/// segments alternate handedness. Positions, forward and up still line up.
pub fn attachment_transform(end: &PoseFrame, next_entry: &PoseFrame) -> Affine3A {
    end.to_affine() * Affine3A::from_translation(-next_entry.position)
}

/// Ordered, append-only sequence of segments placed end to end in world space
#[derive(Default)]
pub struct TrackChain {
    segments: Vec<Segment>,
    bounds: AABB,
}

impl TrackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `segment` at the exit of the last one and register its collider.
    ///
    /// The first segment sits at the identity.
    pub fn add_segment(
        &mut self,
        mut segment: Segment,
        physics: &mut impl PhysicsBackend,
    ) -> Result<&Segment, TrackError> {
        let transform = match self.last_exit() {
            Some(end) => attachment_transform(&end, &segment.entry()),
            None => Affine3A::IDENTITY,
        };

        segment.set_world_transform(transform, physics)?;
        segment.attach_collider(physics)?;

        let seg_bounds = segment.world_bounds();
        self.bounds = if self.segments.is_empty() {
            seg_bounds
        } else {
            self.bounds.union(&seg_bounds)
        };

        debug!(
            "attached {} segment #{} at {:?}",
            segment.kind().name(),
            self.segments.len(),
            segment.world_entry().position
        );

        self.segments.push(segment);
        Ok(&self.segments[self.segments.len() - 1])
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// World exit frame of the last segment
    pub fn last_exit(&self) -> Option<PoseFrame> {
        self.segments.last().map(Segment::world_exit)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Union of every segment's world-space mesh bounds
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    /// Check every adjacent pair still meets within `tolerance`
    pub fn validate_continuity(&self, tolerance: f32) -> Result<(), TrackError> {
        for (index, pair) in self.segments.windows(2).enumerate() {
            if !pair[0]
                .world_exit()
                .coincides(&pair[1].world_entry(), tolerance)
            {
                return Err(TrackError::Discontinuity { index: index + 1 });
            }
        }
        Ok(())
    }

    /// Drop every segment collider from physics and empty the chain
    pub fn release(&mut self, physics: &mut impl PhysicsBackend) {
        for segment in &mut self.segments {
            segment.release(physics);
        }
        self.segments.clear();
        self.bounds = AABB::default();
    }
}
