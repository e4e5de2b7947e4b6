use bevy::prelude::*;

use crate::track::{Slice, TrackMesh};

/// One cross-section sample: lateral offset, height along the slice up, and
/// the normal in the slice's `[right, up, forward]` basis
pub(crate) struct ProfilePoint {
    pub x: f32,
    pub y: f32,
    pub normal: Vec3,
}

/// Two triangles per cell, `(i0, i2, i1)` and `(i1, i2, i3)`
pub(crate) fn strip_indices(seg_u: u32, seg_v: u32) -> Vec<u32> {
    let row = seg_v + 1;
    let mut indices = Vec::with_capacity((seg_u * seg_v * 6) as usize);

    for u in 0..seg_u {
        for v in 0..seg_v {
            let i0 = u * row + v;
            let i1 = i0 + 1;
            let i2 = i0 + row;
            let i3 = i2 + 1;

            indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
        }
    }

    indices
}

/// Sweep a cross-section profile along the slices.
///
/// `profile(s, half_width)` is sampled at `s = v / seg_v` for every slice.
pub(crate) fn sweep(
    slices: &[Slice],
    seg_v: u32,
    profile: impl Fn(f32, f32) -> ProfilePoint,
) -> TrackMesh {
    let seg_u = slices.len().saturating_sub(1) as u32;
    let count = slices.len() * (seg_v as usize + 1);
    let mut positions = Vec::with_capacity(count);
    let mut normals = Vec::with_capacity(count);

    for slice in slices {
        let basis = slice.frame.basis();
        let right = slice.frame.right();

        for v in 0..=seg_v {
            let s = v as f32 / seg_v as f32;
            let point = profile(s, slice.half_width);

            positions.push(slice.frame.position + right * point.x + slice.frame.up * point.y);
            normals.push((basis * point.normal).normalize());
        }
    }

    TrackMesh {
        positions,
        normals,
        indices: strip_indices(seg_u, seg_v),
        seg_u,
        seg_v,
    }
}

/// Flat deck `offset` below the centerline
pub(crate) fn flat_profile(offset: f32) -> impl Fn(f32, f32) -> ProfilePoint {
    move |s, half_width| ProfilePoint {
        x: (s - 0.5) * 2.0 * half_width,
        y: -offset,
        normal: Vec3::Y,
    }
}

/// Cosine bowl, `depth` deep at the middle and level with the centerline at
/// the rims. The normal leans forward with the lateral offset, which gives the
/// surface its shading.
pub(crate) fn bowl_profile(depth: f32) -> impl Fn(f32, f32) -> ProfilePoint {
    move |s, half_width| {
        let x = (s - 0.5) * 2.0 * half_width;
        ProfilePoint {
            x,
            y: -depth * ((s - 0.5) * std::f32::consts::PI).cos(),
            normal: Vec3::new(0.0, 1.0, (x / half_width) * 0.3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cell_indices() {
        assert_eq!(strip_indices(1, 1), vec![0, 2, 1, 1, 2, 3]);
    }

    #[test]
    fn test_indices_stay_in_range() {
        for (seg_u, seg_v) in [(1, 1), (3, 7), (24, 2)] {
            let indices = strip_indices(seg_u, seg_v);
            let vertex_count = (seg_u + 1) * (seg_v + 1);

            assert_eq!(indices.len() as u32, 6 * seg_u * seg_v);
            assert!(indices.iter().all(|&i| i < vertex_count));
        }
    }
}
