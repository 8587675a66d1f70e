// SPDX-License-Identifier: MPL-2.0

//! Column-major 4x4 matrix math for layer MVPs and sampling transforms
//!
//! Only the handful of operations the compositor needs; column-major layout
//! so a matrix uploads to the GPU uniform buffer as-is.

use bytemuck::{Pod, Zeroable};

/// Column-major 4x4 matrix; element (row, col) lives at `col * 4 + row`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Mat4(pub [f32; 16]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Orthographic projection over `[left, right] x [bottom, top] x [near, far]`
    pub fn orthographic(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Mat4 {
        let mut m = [0.0f32; 16];
        m[0] = 2.0 / (right - left);
        m[5] = 2.0 / (top - bottom);
        m[10] = -2.0 / (far - near);
        m[12] = -(right + left) / (right - left);
        m[13] = -(top + bottom) / (top - bottom);
        m[14] = -(far + near) / (far - near);
        m[15] = 1.0;
        Mat4(m)
    }

    /// Counter-clockwise rotation around the z axis
    pub fn rotation_z(degrees: f32) -> Mat4 {
        let radians = degrees.to_radians();
        let (sin, cos) = radians.sin_cos();
        let mut m = Mat4::IDENTITY.0;
        m[0] = cos;
        m[1] = sin;
        m[4] = -sin;
        m[5] = cos;
        Mat4(m)
    }

    /// Non-uniform scale in the xy plane
    pub fn scale(x: f32, y: f32) -> Mat4 {
        let mut m = Mat4::IDENTITY.0;
        m[0] = x;
        m[5] = y;
        Mat4(m)
    }

    /// Matrix product `self * rhs` (applies `rhs` first)
    pub fn multiply(&self, rhs: &Mat4) -> Mat4 {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += a[k * 4 + row] * b[col * 4 + k];
                }
                out[col * 4 + row] = sum;
            }
        }
        Mat4(out)
    }

    /// Transform a point (x, y, 0, 1), returning (x', y')
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.0;
        let tx = m[0] * x + m[4] * y + m[12];
        let ty = m[1] * x + m[5] * y + m[13];
        (tx, ty)
    }
}

/// Aspect ratio of a surface normalized to (0, 1] (short edge over long edge)
pub fn normalized_aspect(width: u32, height: u32) -> f32 {
    let w = width as f32;
    let h = height as f32;
    if w <= 0.0 || h <= 0.0 {
        return 1.0;
    }
    w.min(h) / w.max(h)
}

/// Letterboxing ratio between the screen aspect and the camera preview aspect.
///
/// Always `min(a, b) / max(a, b)`, so the result is in (0, 1] regardless of
/// which surface is narrower.
pub fn letterbox_aspect(screen_aspect: f32, preview_aspect: f32) -> f32 {
    screen_aspect.min(preview_aspect) / screen_aspect.max(preview_aspect)
}
