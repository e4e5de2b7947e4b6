use bevy::prelude::*;

use super::strip::{flat_profile, sweep};
use crate::error::TrackError;
use crate::track::{PoseFrame, Proxy, Segment, SegmentKind, Slice};

/// A flat ramp, optionally pitched downhill
#[derive(Clone, Debug, PartialEq)]
pub struct StraightParams {
    pub length: f32,
    pub half_width: f32,
    /// Distance from the centerline down to the deck
    pub depth: f32,
    /// Degrees; positive tilts the ramp downward
    pub pitch_deg: f32,
    /// Raises the deck relative to `-depth`
    pub height_offset: f32,
    pub seg_u: u32,
    pub seg_v: u32,
}

impl Default for StraightParams {
    fn default() -> Self {
        Self {
            length: 10.0,
            half_width: 5.0,
            depth: 2.0,
            pitch_deg: 0.0,
            height_offset: 0.0,
            seg_u: 1,
            seg_v: 1,
        }
    }
}

impl StraightParams {
    pub fn validate(&self) -> Result<(), TrackError> {
        TrackError::require_positive("length", self.length)?;
        TrackError::require_positive("half_width", self.half_width)?;
        TrackError::require_positive("depth", self.depth)?;
        TrackError::require_finite("height_offset", self.height_offset)?;
        if !self.pitch_deg.is_finite() || self.pitch_deg.abs() >= 90.0 {
            return Err(TrackError::InvalidParameter {
                name: "pitch_deg",
                value: self.pitch_deg,
            });
        }
        TrackError::require_samples("seg_u", self.seg_u)?;
        TrackError::require_samples("seg_v", self.seg_v)
    }

    /// Frame shared by every slice of the ramp
    pub(crate) fn path_frame(&self) -> (Vec3, Vec3) {
        let pitch = self.pitch_deg.to_radians();
        let forward = Vec3::new(0.0, -pitch.sin(), pitch.cos());
        let up = Vec3::new(0.0, pitch.cos(), pitch.sin());
        (forward, up)
    }

    pub(crate) fn slices(&self) -> Vec<Slice> {
        let (forward, up) = self.path_frame();
        (0..=self.seg_u)
            .map(|u| {
                let t = u as f32 / self.seg_u as f32;
                Slice {
                    frame: PoseFrame::new(forward * self.length * t, forward, up),
                    half_width: self.half_width,
                }
            })
            .collect()
    }

    /// Deck distance below the centerline
    pub(crate) fn surface_depth(&self) -> f32 {
        self.depth - self.height_offset
    }

    pub fn build(&self) -> Result<Segment, TrackError> {
        self.validate()?;

        let slices = self.slices();
        let mesh = sweep(&slices, self.seg_v, flat_profile(self.surface_depth()));

        Ok(Segment::new(
            SegmentKind::Straight(self.clone()),
            mesh,
            slices,
            self.surface_depth(),
            Proxy::Mesh,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_ramp_exit() {
        let segment = StraightParams::default().build().unwrap();
        let exit = segment.exit();

        assert_relative_eq!(exit.position.z, 10.0, epsilon = 1e-5);
        assert_relative_eq!(exit.forward.z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(exit.up.y, 1.0, epsilon = 1e-6);
        assert_eq!(segment.mesh().vertex_count(), 4);
        assert_eq!(segment.mesh().indices, vec![0, 2, 1, 1, 2, 3]);
    }

    #[test]
    fn test_deck_sits_below_centerline() {
        let params = StraightParams {
            height_offset: 0.5,
            ..default()
        };
        let segment = params.build().unwrap();

        for p in &segment.mesh().positions {
            assert_relative_eq!(p.y, -1.5, epsilon = 1e-5);
        }
        for n in &segment.mesh().normals {
            assert_relative_eq!(n.y, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pitch_rotates_exit_down() {
        let params = StraightParams {
            length: 10.0,
            pitch_deg: 30.0,
            ..default()
        };
        let exit = params.build().unwrap().exit();

        assert_relative_eq!(exit.position.y, -5.0, epsilon = 1e-4);
        assert_relative_eq!(exit.position.z, 10.0 * 30f32.to_radians().cos(), epsilon = 1e-4);
        assert_relative_eq!(exit.forward.dot(exit.up), 0.0, epsilon = 1e-6);
        assert!(exit.up.z > 0.0);
    }

    #[test]
    fn test_winding_faces_away_from_slice_up() {
        let params = StraightParams {
            pitch_deg: 12.0,
            seg_u: 4,
            seg_v: 3,
            ..default()
        };
        let segment = params.build().unwrap();
        let mesh = segment.mesh();
        let row = (mesh.seg_v + 1) as usize;

        for tri in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0], tri[1], tri[2]);
            let slice = &segment.slices()[a.min(b).min(c) as usize / row];
            let pa = mesh.positions[a as usize];
            let pb = mesh.positions[b as usize];
            let pc = mesh.positions[c as usize];

            let normal = (pb - pa).cross(pc - pa);
            assert!(normal.dot(slice.frame.up) < 0.0);
        }
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        let zero_length = StraightParams {
            length: 0.0,
            ..default()
        }
        .build();
        assert!(matches!(
            zero_length,
            Err(TrackError::InvalidParameter { name: "length", .. })
        ));

        let vertical = StraightParams {
            pitch_deg: 90.0,
            ..default()
        };
        assert!(vertical.build().is_err());

        let no_cells = StraightParams {
            seg_v: 0,
            ..default()
        };
        assert!(matches!(
            no_cells.build(),
            Err(TrackError::InvalidSampleCount { name: "seg_v", .. })
        ));
    }
}
