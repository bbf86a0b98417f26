use glam::{Vec3, Vec4};

use crate::skinning::{self, Skin};
use crate::scene::transform::Trs;

/// Sphere bound recomputed from deformed geometry each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 0.0,
        }
    }
}

impl BoundingSphere {
    /// Sphere around the box center of `points`; empty input gives a
    /// degenerate sphere at the origin.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for &p in points {
            min = min.min(p);
            max = max.max(p);
        }
        let center = (min + max) * 0.5;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0_f32, f32::max);
        Self { center, radius }
    }
}

/// Mesh geometry: immutable rest buffers plus the per-frame deformed
/// buffers the renderer consumes. Particle targets reuse the position
/// buffer as their slot array, with per-slot sizes and colors.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,

    // Rest (bind pose) buffers; normals/tangents/bitangents may be empty.
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub bitangents: Vec<Vec3>,

    // Deformed outputs, refreshed by the skin pass.
    pub out_positions: Vec<Vec3>,
    pub out_normals: Vec<Vec3>,
    pub out_tangents: Vec<Vec3>,
    pub out_bitangents: Vec<Vec3>,

    // Particle outputs (per vertex slot).
    pub sizes: Vec<f32>,
    pub colors: Vec<Vec4>,
    /// Live slot count for particle targets.
    pub active_count: usize,

    pub bounds: BoundingSphere,
    pub skin: Option<Skin>,
}

impl Mesh {
    #[must_use]
    pub fn new(name: &str, positions: Vec<Vec3>, normals: Vec<Vec3>) -> Self {
        let bounds = BoundingSphere::from_points(&positions);
        Self {
            name: name.to_string(),
            out_positions: positions.clone(),
            out_normals: normals.clone(),
            positions,
            normals,
            bounds,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tangent_basis(mut self, tangents: Vec<Vec3>, bitangents: Vec<Vec3>) -> Self {
        self.out_tangents = tangents.clone();
        self.out_bitangents = bitangents.clone();
        self.tangents = tangents;
        self.bitangents = bitangents;
        self
    }

    #[must_use]
    pub fn with_skin(mut self, skin: Skin) -> Self {
        self.skin = Some(skin);
        self
    }

    /// An empty particle target with `capacity` vertex slots.
    #[must_use]
    pub fn particle_target(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            positions: vec![Vec3::ZERO; capacity],
            sizes: vec![0.0; capacity],
            colors: vec![Vec4::ONE; capacity],
            active_count: 0,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Runs the skin pipeline with per-bone vertex transforms already in
    /// mesh space, then refreshes the bounding sphere from the result.
    pub fn apply_skin(&mut self, bone_transforms: &[Trs]) {
        let Some(skin) = &self.skin else { return };

        self.out_positions.resize(self.positions.len(), Vec3::ZERO);
        self.out_normals.resize(self.normals.len(), Vec3::ZERO);
        self.out_tangents.resize(self.tangents.len(), Vec3::ZERO);
        self.out_bitangents.resize(self.bitangents.len(), Vec3::ZERO);

        skinning::deform(
            &skinning::RestBuffers {
                positions: &self.positions,
                normals: &self.normals,
                tangents: &self.tangents,
                bitangents: &self.bitangents,
            },
            bone_transforms,
            &skin.weights,
            &mut skinning::DeformedBuffers {
                positions: &mut self.out_positions,
                normals: &mut self.out_normals,
                tangents: &mut self.out_tangents,
                bitangents: &mut self.out_bitangents,
            },
        );
        self.bounds = BoundingSphere::from_points(&self.out_positions);
    }
}
