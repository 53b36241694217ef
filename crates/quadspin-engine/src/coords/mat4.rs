use bytemuck::{Pod, Zeroable};
use std::ops::Mul;

/// Column-major 4x4 matrix.
///
/// Memory layout matches WGSL `mat4x4<f32>`, so the value can be uploaded to a
/// uniform buffer as-is.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Mat4 {
    pub cols: [[f32; 4]; 4],
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Counter-clockwise rotation about +Z by `angle` radians.
    ///
    /// The angle is taken as `f64` and reduced before conversion so large
    /// accumulated angles keep their precision.
    pub fn rotation_z(angle: f64) -> Self {
        let a = angle.rem_euclid(std::f64::consts::TAU);
        let (s, c) = (a.sin() as f32, a.cos() as f32);
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Transforms a point (w = 1) and returns xyz.
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.cols;
        let mut out = [0.0f32; 3];
        for (row, o) in out.iter_mut().enumerate() {
            *o = m[0][row] * p[0] + m[1][row] * p[1] + m[2][row] * p[2] + m[3][row];
        }
        out
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut cols = [[0.0f32; 4]; 4];
        for (c, col) in cols.iter_mut().enumerate() {
            for (r, v) in col.iter_mut().enumerate() {
                *v = (0..4).map(|k| self.cols[k][r] * rhs.cols[c][k]).sum();
            }
        }
        Mat4 { cols }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn zero_rotation_is_identity() {
        assert_eq!(Mat4::rotation_z(0.0), Mat4::IDENTITY);
    }

    #[test]
    fn quarter_turn_maps_x_to_y() {
        let m = Mat4::rotation_z(std::f64::consts::FRAC_PI_2);
        assert!(approx(m.transform_point([1.0, 0.0, 0.0]), [0.0, 1.0, 0.0]));
        assert!(approx(m.transform_point([0.0, 1.0, 0.0]), [-1.0, 0.0, 0.0]));
    }

    #[test]
    fn rotation_leaves_z_untouched() {
        let m = Mat4::rotation_z(1.234);
        assert!((m.transform_point([0.0, 0.0, 0.7])[2] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn full_turns_wrap() {
        let a = Mat4::rotation_z(0.3);
        let b = Mat4::rotation_z(0.3 + 4.0 * std::f64::consts::TAU);
        for c in 0..4 {
            for r in 0..4 {
                assert!((a.cols[c][r] - b.cols[c][r]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn composed_rotations_add_angles() {
        let m = Mat4::rotation_z(0.25) * Mat4::rotation_z(0.5);
        let n = Mat4::rotation_z(0.75);
        assert!(approx(m.transform_point([1.0, 2.0, 0.0]), n.transform_point([1.0, 2.0, 0.0])));
    }

    #[test]
    fn byte_size_matches_wgsl_mat4() {
        assert_eq!(Mat4::IDENTITY.as_bytes().len(), 64);
    }
}
