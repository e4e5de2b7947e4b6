use bevy::prelude::*;

use super::strip::{bowl_profile, sweep};
use crate::error::TrackError;
use crate::track::{PoseFrame, Proxy, Segment, SegmentKind, Slice};

/// A bowl-profiled channel following an arc while dropping
#[derive(Clone, Debug, PartialEq)]
pub struct CurvedParams {
    /// Sweep in degrees, in (0, 360]
    pub arc_deg: f32,
    pub radius: f32,
    pub half_width: f32,
    pub depth: f32,
    /// Total vertical descent over the arc
    pub drop: f32,
    /// Downhill grade of the entry, in degrees, held through the whole turn
    pub grade_deg: f32,
    pub seg_u: u32,
    pub seg_v: u32,
}

impl Default for CurvedParams {
    fn default() -> Self {
        Self {
            arc_deg: 90.0,
            radius: 30.0,
            half_width: 5.0,
            depth: 3.0,
            drop: 10.0,
            grade_deg: 0.0,
            seg_u: 240,
            seg_v: 60,
        }
    }
}

/// Reject arcs outside (0, 360] degrees
pub(crate) fn validate_arc(arc_deg: f32) -> Result<(), TrackError> {
    if arc_deg.is_finite() && arc_deg > 0.0 && arc_deg <= 360.0 {
        Ok(())
    } else {
        Err(TrackError::InvalidParameter {
            name: "arc_deg",
            value: arc_deg,
        })
    }
}

/// Reject grades that are not finite or reach vertical
pub(crate) fn validate_grade(grade_deg: f32) -> Result<(), TrackError> {
    if grade_deg.is_finite() && grade_deg.abs() < 90.0 {
        Ok(())
    } else {
        Err(TrackError::InvalidParameter {
            name: "grade_deg",
            value: grade_deg,
        })
    }
}

/// Centerline frames along a circular arc that starts at the origin heading
/// +Z and bends toward -X. `half_width(t)` sizes each slice.
///
/// With a non-zero `grade_deg` the entry heading is already tilted that far
/// downhill; the arc then turns about the axis that is vertical for such an
/// entry, so the path descends at a constant grade instead of turning its
/// slope sideways or uphill.
pub(crate) fn arc_slices(
    arc_deg: f32,
    radius: f32,
    drop: f32,
    grade_deg: f32,
    seg_u: u32,
    half_width: impl Fn(f32) -> f32,
) -> Vec<Slice> {
    let arc = arc_deg.to_radians();
    let grade = grade_deg.to_radians();
    let tilt = Quat::from_rotation_x(-grade);
    let heading_forward = Vec3::new(0.0, -grade.sin(), grade.cos());
    let heading_up = Vec3::new(0.0, grade.cos(), grade.sin());

    (0..=seg_u)
        .map(|u| {
            let t = u as f32 / seg_u as f32;
            let angle = arc * t;
            let turn = Quat::from_rotation_y(-angle);
            let center = Vec3::new(
                radius * angle.cos() - radius,
                -drop * t - radius * angle * grade.tan(),
                radius * angle.sin(),
            );

            Slice {
                frame: PoseFrame::new(
                    tilt * center,
                    tilt * (turn * heading_forward),
                    tilt * (turn * heading_up),
                ),
                half_width: half_width(t),
            }
        })
        .collect()
}

impl CurvedParams {
    pub fn validate(&self) -> Result<(), TrackError> {
        validate_arc(self.arc_deg)?;
        TrackError::require_positive("radius", self.radius)?;
        TrackError::require_positive("half_width", self.half_width)?;
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
            |_| self.half_width,
        );
        let mesh = sweep(&slices, self.seg_v, bowl_profile(self.depth));

        Ok(Segment::new(
            SegmentKind::Curved(self.clone()),
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

    fn assert_vec_eq(a: Vec3, b: Vec3, epsilon: f32) {
        assert_relative_eq!(a.x, b.x, epsilon = epsilon);
        assert_relative_eq!(a.y, b.y, epsilon = epsilon);
        assert_relative_eq!(a.z, b.z, epsilon = epsilon);
    }

    #[test]
    fn test_half_turn_exit() {
        let params = CurvedParams {
            arc_deg: 180.0,
            radius: 30.0,
            drop: 20.0,
            grade_deg: 0.0,
            half_width: 5.0,
            depth: 3.0,
            seg_u: 240,
            seg_v: 60,
        };
        let exit = params.build().unwrap().exit();

        assert_vec_eq(exit.position, Vec3::new(-60.0, -20.0, 0.0), 1e-3);
        assert_vec_eq(exit.forward, Vec3::NEG_Z, 1e-5);
        assert_vec_eq(exit.up, Vec3::Y, 1e-6);
    }

    #[test]
    fn test_slice_frames_are_orthonormal() {
        let segment = CurvedParams {
            arc_deg: 270.0,
            seg_u: 48,
            ..default()
        }
        .build()
        .unwrap();

        for slice in segment.slices() {
            let f = slice.frame.forward;
            let u = slice.frame.up;
            let r = slice.frame.right();

            assert_relative_eq!(f.length(), 1.0, epsilon = 1e-4);
            assert_relative_eq!(u.length(), 1.0, epsilon = 1e-4);
            assert_relative_eq!(r.length(), 1.0, epsilon = 1e-4);
            assert_relative_eq!(f.dot(u), 0.0, epsilon = 1e-4);
            assert_relative_eq!(f.dot(r), 0.0, epsilon = 1e-4);
            assert_relative_eq!(u.dot(r), 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_graded_arc_starts_at_entry_and_keeps_its_grade() {
        let segment = CurvedParams {
            arc_deg: 180.0,
            radius: 12.0,
            drop: 0.0,
            grade_deg: 15.0,
            seg_u: 36,
            seg_v: 4,
            ..default()
        }
        .build()
        .unwrap();

        let first = segment.slices()[0].frame;
        assert!(first.coincides(&PoseFrame::ENTRY, 1e-5));

        // Vertical for a 15 degree downhill entry
        let (sin, cos) = 15f32.to_radians().sin_cos();
        let plumb = Vec3::new(0.0, cos, -sin);
        for slice in segment.slices() {
            assert_relative_eq!(slice.frame.forward.dot(plumb), -sin, epsilon = 1e-5);
            assert_relative_eq!(slice.frame.right().dot(plumb), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_mesh_counts_and_index_range() {
        let params = CurvedParams {
            seg_u: 12,
            seg_v: 5,
            ..default()
        };
        let mesh = params.build().unwrap().mesh().clone();

        assert_eq!(mesh.vertex_count(), 13 * 6);
        assert_eq!(mesh.indices.len(), 6 * 12 * 5);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_winding_faces_away_from_slice_up() {
        let params = CurvedParams {
            arc_deg: 120.0,
            radius: 12.0,
            seg_u: 30,
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
    fn test_profile_rims_and_floor() {
        let params = CurvedParams {
            seg_u: 4,
            seg_v: 2,
            drop: 0.0,
            ..default()
        };
        let segment = params.build().unwrap();
        let mesh = segment.mesh();

        // First slice: rim, floor, rim
        assert_vec_eq(mesh.positions[0], Vec3::new(5.0, 0.0, 0.0), 1e-5);
        assert_vec_eq(mesh.positions[1], Vec3::new(0.0, -3.0, 0.0), 1e-5);
        assert_vec_eq(mesh.positions[2], Vec3::new(-5.0, 0.0, 0.0), 1e-5);

        // Floor normal is straight up; rims lean along and against the path
        assert_vec_eq(mesh.normals[1], Vec3::Y, 1e-6);
        assert!(mesh.normals[0].z < 0.0);
        assert!(mesh.normals[2].z > 0.0);
    }

    #[test]
    fn test_rejects_out_of_range_arc() {
        for arc_deg in [0.0, -10.0, 361.0, f32::NAN] {
            let params = CurvedParams {
                arc_deg,
                ..default()
            };
            assert!(matches!(
                params.build(),
                Err(TrackError::InvalidParameter { name: "arc_deg", .. })
            ));
        }

        let full_loop = CurvedParams {
            arc_deg: 360.0,
            seg_u: 8,
            seg_v: 2,
            ..default()
        };
        assert!(full_loop.build().is_ok());
    }
}
