use super::curved::{arc_slices, validate_arc, validate_grade};
use super::strip::{bowl_profile, sweep};
use crate::error::TrackError;
use crate::track::{Proxy, Segment, SegmentKind};

/// A curved channel whose cross-section narrows (or widens) along its length
#[derive(Clone, Debug, PartialEq)]
pub struct FunnelParams {
    pub arc_deg: f32,
    pub radius: f32,
    /// Half-width at the entry
    pub start_width: f32,
    /// Half-width at the exit
    pub exit_width: f32,
    pub depth: f32,
    pub drop: f32,
    /// Downhill grade of the entry, in degrees, held through the turn
    pub grade_deg: f32,
    pub seg_u: u32,
    pub seg_v: u32,
}

impl Default for FunnelParams {
    fn default() -> Self {
        Self {
            arc_deg: 60.0,
            radius: 30.0,
            start_width: 5.0,
            exit_width: 2.5,
            depth: 3.0,
            drop: 8.0,
            grade_deg: 0.0,
            seg_u: 120,
            seg_v: 40,
        }
    }
}

impl FunnelParams {
    /// Cross-section half-width at path parameter `t` in [0, 1]
    pub fn half_width_at(&self, t: f32) -> f32 {
        self.start_width + (self.exit_width - self.start_width) * t.clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        validate_arc(self.arc_deg)?;
        TrackError::require_positive("radius", self.radius)?;
        TrackError::require_positive("start_width", self.start_width)?;
        TrackError::require_positive("exit_width", self.exit_width)?;
        TrackError::require_positive("depth", self.depth)?;
        TrackError::require_finite("drop", self.drop)?;
        validate_grade(self.grade_deg)?;
        TrackError::require_samples("seg_u", self.seg_u)?;
        TrackError::require_samples("seg_v", self.seg_v)
    }

    pub fn build(&self) -> Result<Segment, TrackError> {
        self.validate()?;

        let slices = arc_slices(
            self.arc_deg,
            self.radius,
            self.drop,
            self.grade_deg,
            self.seg_u,
            |t| self.half_width_at(t),
        );
        let mesh = sweep(&slices, self.seg_v, bowl_profile(self.depth));

        Ok(Segment::new(
            SegmentKind::Funnel(self.clone()),
            mesh,
            slices,
            self.depth,
            Proxy::Mesh,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bevy::prelude::*;

    #[test]
    fn test_half_width_never_grows_when_narrowing() {
        let segment = FunnelParams::default().build().unwrap();
        let widths: Vec<f32> = segment.slices().iter().map(|s| s.half_width).collect();

        assert!(widths.windows(2).all(|w| w[1] <= w[0]));
        assert_relative_eq!(segment.entry_half_width(), 5.0);
        assert_relative_eq!(segment.exit_half_width(), 2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_rims_follow_slice_width() {
        let params = FunnelParams {
            seg_u: 10,
            seg_v: 4,
            ..default()
        };
        let segment = params.build().unwrap();
        let mesh = segment.mesh();
        let row = (mesh.seg_v + 1) as usize;

        for (u, slice) in segment.slices().iter().enumerate() {
            let left = mesh.positions[u * row];
            let right = mesh.positions[u * row + row - 1];
            assert_relative_eq!(left.distance(right), 2.0 * slice.half_width, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_slice_frames_are_orthonormal() {
        let segment = FunnelParams::default().build().unwrap();
        for slice in segment.slices() {
            let r = slice.frame.right();
            assert_relative_eq!(slice.frame.forward.dot(slice.frame.up), 0.0, epsilon = 1e-4);
            assert_relative_eq!(r.dot(slice.frame.forward), 0.0, epsilon = 1e-4);
            assert_relative_eq!(r.dot(slice.frame.up), 0.0, epsilon = 1e-4);
            assert_relative_eq!(r.length(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_winding_faces_away_from_slice_up() {
        let params = FunnelParams {
            arc_deg: 150.0,
            radius: 14.0,
            grade_deg: 8.0,
            seg_u: 24,
            seg_v: 8,
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
    fn test_rejects_non_positive_exit_width() {
        let params = FunnelParams {
            exit_width: 0.0,
            ..default()
        };
        assert!(matches!(
            params.build(),
            Err(TrackError::InvalidParameter { name: "exit_width", .. })
        ));
    }
}
