use glam::{Affine3A, Quat, Vec3};

use crate::source::Record;

/// A translation / rotation / uniform-scale transform.
///
/// This is the transform the asset format animates: rotation is always a
/// proper rotation and scale is a single factor, which keeps composition
/// closed and lets the skinning pass rotate normals exactly instead of
/// fishing a rotation back out of a matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trs {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Trs {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    #[must_use]
    pub fn new(translation: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Reads the baseline transform fields of a node record, falling back
    /// to identity for whatever is absent.
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        Self {
            translation: rec.vec3("Translation").unwrap_or(Vec3::ZERO),
            rotation: rec.quat("Rotation").unwrap_or(Quat::IDENTITY),
            scale: rec.float("Scale").unwrap_or(1.0),
        }
    }

    /// `self * child`: apply `child` first, then `self`.
    #[must_use]
    pub fn compose(&self, child: &Self) -> Self {
        Self {
            translation: self.transform_point(child.translation),
            rotation: self.rotation * child.rotation,
            scale: self.scale * child.scale,
        }
    }

    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        let scale = if self.scale.abs() > 1e-12 {
            1.0 / self.scale
        } else {
            0.0
        };
        Self {
            translation: rotation * (-self.translation * scale),
            rotation,
            scale,
        }
    }

    #[inline]
    #[must_use]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * (p * self.scale) + self.translation
    }

    /// Direction transform: rotation only, no translation or scale.
    #[inline]
    #[must_use]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.rotation * v
    }

    /// Matrix form for the rendering boundary.
    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }
}

impl Default for Trs {
    fn default() -> Self {
        Self::IDENTITY
    }
}
