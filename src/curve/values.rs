use glam::{Quat, Vec3, Vec4};

use crate::source::Record;

fn hermite_basis(x: f32) -> (f32, f32, f32, f32) {
    let x2 = x * x;
    let x3 = x2 * x;
    (
        2.0 * x3 - 3.0 * x2 + 1.0,
        -2.0 * x3 + 3.0 * x2,
        x3 - 2.0 * x2 + x,
        x3 - x2,
    )
}

/// A value type that can live in a keyed curve.
///
/// `hermite` blends between two keys using the first key's forward tangent
/// and the second key's backward tangent, both stored on the keys
/// themselves. `step` holds the left key until the segment midpoint.
pub trait Keyable: Copy + Default {
    fn lerp(a: Self, b: Self, x: f32) -> Self;

    fn hermite(a: Self, fwd_a: Self, bwd_b: Self, b: Self, x: f32) -> Self;

    fn step(a: Self, b: Self, x: f32) -> Self {
        if x < 0.5 { a } else { b }
    }

    /// Pulls a typed value array out of a key-block record field.
    fn read_array(rec: &Record, field: &str) -> Option<Vec<Self>>;
}

impl Keyable for f32 {
    fn lerp(a: Self, b: Self, x: f32) -> Self {
        a + (b - a) * x
    }

    fn hermite(a: Self, fwd_a: Self, bwd_b: Self, b: Self, x: f32) -> Self {
        let (h1, h2, h3, h4) = hermite_basis(x);
        a * h1 + b * h2 + fwd_a * h3 + bwd_b * h4
    }

    fn read_array(rec: &Record, field: &str) -> Option<Vec<Self>> {
        rec.floats(field).map(<[f32]>::to_vec)
    }
}

impl Keyable for Vec3 {
    fn lerp(a: Self, b: Self, x: f32) -> Self {
        a.lerp(b, x)
    }

    fn hermite(a: Self, fwd_a: Self, bwd_b: Self, b: Self, x: f32) -> Self {
        let (h1, h2, h3, h4) = hermite_basis(x);
        a * h1 + b * h2 + fwd_a * h3 + bwd_b * h4
    }

    fn read_array(rec: &Record, field: &str) -> Option<Vec<Self>> {
        rec.vec3s(field).map(<[Vec3]>::to_vec)
    }
}

impl Keyable for Vec4 {
    fn lerp(a: Self, b: Self, x: f32) -> Self {
        a.lerp(b, x)
    }

    fn hermite(a: Self, fwd_a: Self, bwd_b: Self, b: Self, x: f32) -> Self {
        let (h1, h2, h3, h4) = hermite_basis(x);
        a * h1 + b * h2 + fwd_a * h3 + bwd_b * h4
    }

    fn read_array(rec: &Record, field: &str) -> Option<Vec<Self>> {
        rec.color4s(field).map(<[Vec4]>::to_vec)
    }
}

impl Keyable for Quat {
    /// Shortest-arc slerp: the right operand is negated when the pair sits
    /// in opposite hemispheres, so blending never takes the long way round.
    fn lerp(a: Self, b: Self, x: f32) -> Self {
        let b = if a.dot(b) < 0.0 { -b } else { b };
        a.slerp(b, x)
    }

    /// Rotation keys carry no angular tangents; blend on the arc instead.
    fn hermite(a: Self, _fwd_a: Self, _bwd_b: Self, b: Self, x: f32) -> Self {
        Self::lerp(a, b, x)
    }

    fn read_array(rec: &Record, field: &str) -> Option<Vec<Self>> {
        rec.quats(field).map(<[Quat]>::to_vec)
    }
}

impl Keyable for bool {
    /// Booleans never interpolate: the left key holds for the whole segment.
    fn lerp(a: Self, _b: Self, _x: f32) -> Self {
        a
    }

    fn hermite(a: Self, _fwd_a: Self, _bwd_b: Self, _b: Self, _x: f32) -> Self {
        a
    }

    fn step(a: Self, _b: Self, _x: f32) -> Self {
        a
    }

    fn read_array(rec: &Record, field: &str) -> Option<Vec<Self>> {
        rec.bytes(field)
            .map(|bytes| bytes.iter().map(|&b| b != 0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn hermite_hits_endpoints() {
        let v = f32::hermite(1.0, 5.0, -3.0, 9.0, 0.0);
        assert!((v - 1.0).abs() < 1e-6);
        let v = f32::hermite(1.0, 5.0, -3.0, 9.0, 1.0);
        assert!((v - 9.0).abs() < 1e-6);
    }

    #[test]
    fn quat_lerp_takes_short_arc() {
        let a = Quat::IDENTITY;
        // Same rotation as identity, opposite sign, slightly perturbed
        let b = -Quat::from_rotation_y(1e-4);
        let mid = Quat::lerp(a, b, 0.5);
        // Without hemisphere correction this would be a half-turn
        assert!(mid.angle_between(a) < 0.01, "angle {}", mid.angle_between(a));
    }

    #[test]
    fn bool_never_interpolates() {
        assert!(bool::lerp(true, false, 0.9));
        assert!(bool::step(true, false, 0.9));
        assert!(!bool::step(false, true, 0.9));
    }
}
