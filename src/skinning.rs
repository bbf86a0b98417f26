//! Skin transform pipeline.
//!
//! Blends per-bone transforms into deformed vertex buffers according to
//! per-vertex weight sets. Two weight layouts exist in the source assets:
//! a flat per-bone list of `(vertex, weight)` pairs, and precomputed
//! partitions that bound how many bones any one draw touches. Exactly one
//! layout is active per mesh.
//!
//! Malformed weights never abort a mesh: an out-of-range bone index drops
//! that weight, an out-of-range vertex index halts the list it appears in,
//! and both are reported through `log`.

use glam::Vec3;
use log::warn;
use smallvec::SmallVec;

use crate::errors::{Result, SinewError};
use crate::scene::transform::Trs;
use crate::scene::NodeHandle;
use crate::source::Record;

/// Max bone influences per vertex in the partitioned layout.
pub const MAX_WEIGHTS_PER_VERTEX: usize = 4;

/// One vertex influence in the flat layout.
#[derive(Debug, Clone, Copy)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// All influences of a single bone (flat layout); the bone's index in the
/// skin's bone list is implied by position.
#[derive(Debug, Clone, Default)]
pub struct BoneInfluences {
    pub weights: Vec<VertexWeight>,
}

/// A precomputed vertex/bone grouping with partition-local bone indices.
#[derive(Debug, Clone, Default)]
pub struct SkinPartition {
    /// Partition-local vertex index -> mesh vertex index.
    pub vertex_map: Vec<u32>,
    /// Partition-local bone index -> skin bone index.
    pub bone_map: Vec<u16>,
    /// Influences stored per vertex (at most [`MAX_WEIGHTS_PER_VERTEX`]).
    pub weights_per_vertex: usize,
    /// Vertex-major `weights_per_vertex`-strided local bone indices.
    pub bone_indices: Vec<u16>,
    /// Vertex-major `weights_per_vertex`-strided weights.
    pub weights: Vec<f32>,
}

/// Which weight layout drives a mesh.
#[derive(Debug, Clone)]
pub enum SkinWeights {
    Flat(Vec<BoneInfluences>),
    Partitioned(Vec<SkinPartition>),
}

/// A mesh's binding to its skeleton.
#[derive(Debug, Clone)]
pub struct Skin {
    /// Bone nodes, in the order the weight data indexes them.
    pub bones: Vec<NodeHandle>,
    /// Per-bone mesh-space -> bone-space bind transforms.
    pub skin_to_bone: Vec<Trs>,
    pub weights: SkinWeights,
}

impl SkinWeights {
    /// Decodes weight data from a skin record: a `Bone List` of per-bone
    /// influence records, or a `Skin Partition` compound. The partitioned
    /// layout wins when both are present, mirroring how the source format
    /// prefers its precomputed partitions.
    pub fn from_record(rec: &Record) -> Result<Self> {
        let partitions = rec
            .child("Skin Partition")
            .map(|p| p.children("Partitions"))
            .unwrap_or_default();
        if !partitions.is_empty() {
            return Ok(Self::Partitioned(
                partitions.iter().map(SkinPartition::from_record).collect(),
            ));
        }

        let bone_records = rec.children("Bone List");
        if bone_records.is_empty() {
            return Err(SinewError::MissingField {
                record: rec.kind().to_string(),
                field: "Bone List".to_string(),
            });
        }
        Ok(Self::Flat(
            bone_records.iter().map(BoneInfluences::from_record).collect(),
        ))
    }
}

impl BoneInfluences {
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        let vertices = rec.uints("Vertex Indices").unwrap_or(&[]);
        let weights = rec.floats("Vertex Weights").unwrap_or(&[]);
        let count = vertices.len().min(weights.len());
        if vertices.len() != weights.len() {
            warn!(
                "bone influence list: {} vertex indices vs {} weights, truncating to {count}",
                vertices.len(),
                weights.len(),
            );
        }
        Self {
            weights: (0..count)
                .map(|i| VertexWeight {
                    vertex: vertices[i],
                    weight: weights[i],
                })
                .collect(),
        }
    }
}

impl SkinPartition {
    #[must_use]
    pub fn from_record(rec: &Record) -> Self {
        Self {
            vertex_map: rec.uints("Vertex Map").unwrap_or(&[]).to_vec(),
            bone_map: rec.ushorts("Bone Map").unwrap_or(&[]).to_vec(),
            weights_per_vertex: rec.uint("Weights Per Vertex").unwrap_or(0) as usize,
            bone_indices: rec.ushorts("Bone Indices").unwrap_or(&[]).to_vec(),
            weights: rec.floats("Bone Weights").unwrap_or(&[]).to_vec(),
        }
    }
}

/// Rest-pose input buffers. Normals, tangents and bitangents may be empty
/// and are then skipped throughout.
pub struct RestBuffers<'a> {
    pub positions: &'a [Vec3],
    pub normals: &'a [Vec3],
    pub tangents: &'a [Vec3],
    pub bitangents: &'a [Vec3],
}

/// Deformed output buffers, sized like their rest counterparts.
pub struct DeformedBuffers<'a> {
    pub positions: &'a mut [Vec3],
    pub normals: &'a mut [Vec3],
    pub tangents: &'a mut [Vec3],
    pub bitangents: &'a mut [Vec3],
}

/// Blends `bone_transforms` into deformed buffers according to `weights`.
///
/// Transforms must already be in mesh space (the caller composes
/// `geometry_world⁻¹ * bone_world * skin_to_bone`). Positions accumulate
/// the full transform; direction vectors accumulate rotation only and are
/// renormalized afterwards.
pub fn deform(
    rest: &RestBuffers<'_>,
    bone_transforms: &[Trs],
    weights: &SkinWeights,
    out: &mut DeformedBuffers<'_>,
) {
    out.positions.fill(Vec3::ZERO);
    out.normals.fill(Vec3::ZERO);
    out.tangents.fill(Vec3::ZERO);
    out.bitangents.fill(Vec3::ZERO);

    match weights {
        SkinWeights::Flat(bones) => deform_flat(rest, bone_transforms, bones, out),
        SkinWeights::Partitioned(parts) => deform_partitioned(rest, bone_transforms, parts, out),
    }

    renormalize(out.normals);
    renormalize(out.tangents);
    renormalize(out.bitangents);
}

#[inline]
fn accumulate(
    rest: &RestBuffers<'_>,
    out: &mut DeformedBuffers<'_>,
    bone: &Trs,
    vertex: usize,
    weight: f32,
) {
    out.positions[vertex] += bone.transform_point(rest.positions[vertex]) * weight;
    if let Some(n) = rest.normals.get(vertex) {
        out.normals[vertex] += bone.transform_vector(*n) * weight;
    }
    if let Some(t) = rest.tangents.get(vertex) {
        out.tangents[vertex] += bone.transform_vector(*t) * weight;
    }
    if let Some(b) = rest.bitangents.get(vertex) {
        out.bitangents[vertex] += bone.transform_vector(*b) * weight;
    }
}

fn deform_flat(
    rest: &RestBuffers<'_>,
    bone_transforms: &[Trs],
    bones: &[BoneInfluences],
    out: &mut DeformedBuffers<'_>,
) {
    for (bone_index, influences) in bones.iter().enumerate() {
        let Some(bone) = bone_transforms.get(bone_index) else {
            warn!(
                "bone {bone_index} has no transform ({} supplied); dropping its {} weights",
                bone_transforms.len(),
                influences.weights.len(),
            );
            continue;
        };
        for vw in &influences.weights {
            let vertex = vw.vertex as usize;
            if vertex >= rest.positions.len() {
                warn!(
                    "bone {bone_index}: vertex index {vertex} out of range ({} vertices); \
                     abandoning the rest of this weight list",
                    rest.positions.len(),
                );
                break;
            }
            accumulate(rest, out, bone, vertex, vw.weight);
        }
    }
}

fn deform_partitioned(
    rest: &RestBuffers<'_>,
    bone_transforms: &[Trs],
    partitions: &[SkinPartition],
    out: &mut DeformedBuffers<'_>,
) {
    // Malformed data can list a vertex in more than one partition; each
    // vertex is deformed by the first partition that claims it.
    let mut written = vec![false; rest.positions.len()];

    for (part_index, part) in partitions.iter().enumerate() {
        let stride = part.weights_per_vertex.min(MAX_WEIGHTS_PER_VERTEX);
        if part.weights_per_vertex > MAX_WEIGHTS_PER_VERTEX {
            warn!(
                "partition {part_index}: {} weights per vertex, clamping to {MAX_WEIGHTS_PER_VERTEX}",
                part.weights_per_vertex,
            );
        }

        // Resolve the partition's local bone table up front.
        let locals: SmallVec<[Option<&Trs>; 16]> = part
            .bone_map
            .iter()
            .map(|&global| {
                let bone = bone_transforms.get(global as usize);
                if bone.is_none() {
                    warn!(
                        "partition {part_index}: bone index {global} out of range ({} supplied); \
                         its weights will be dropped",
                        bone_transforms.len(),
                    );
                }
                bone
            })
            .collect();

        for (local_vertex, &mapped) in part.vertex_map.iter().enumerate() {
            let vertex = mapped as usize;
            if vertex >= rest.positions.len() {
                warn!(
                    "partition {part_index}: vertex index {vertex} out of range ({} vertices); \
                     abandoning the rest of this partition",
                    rest.positions.len(),
                );
                break;
            }
            if written[vertex] {
                continue;
            }

            let base = local_vertex * part.weights_per_vertex;
            for k in 0..stride {
                let Some(&local_bone) = part.bone_indices.get(base + k) else {
                    break;
                };
                let Some(&weight) = part.weights.get(base + k) else {
                    break;
                };
                if weight == 0.0 {
                    continue;
                }
                let bone = match locals.get(local_bone as usize) {
                    Some(Some(bone)) => *bone,
                    Some(None) => continue, // out-of-range bone, reported above
                    None => {
                        warn!(
                            "partition {part_index}: local bone index {local_bone} outside the \
                             partition's bone map ({} entries); dropping weight",
                            part.bone_map.len(),
                        );
                        continue;
                    }
                };
                accumulate(rest, out, bone, vertex, weight);
            }
            written[vertex] = true;
        }
    }
}

fn renormalize(vectors: &mut [Vec3]) {
    for v in vectors {
        // Untouched vertices stay zero rather than becoming NaN
        if v.length_squared() > 1e-12 {
            *v = v.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn rest_square() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ]
    }

    fn run_flat(positions: &[Vec3], bones: &[Trs], influences: Vec<BoneInfluences>) -> Vec<Vec3> {
        let mut out = vec![Vec3::ZERO; positions.len()];
        deform(
            &RestBuffers {
                positions,
                normals: &[],
                tangents: &[],
                bitangents: &[],
            },
            bones,
            &SkinWeights::Flat(influences),
            &mut DeformedBuffers {
                positions: &mut out,
                normals: &mut [],
                tangents: &mut [],
                bitangents: &mut [],
            },
        );
        out
    }

    #[test]
    fn identity_bones_reproduce_rest_pose() {
        let rest = rest_square();
        let influences = vec![BoneInfluences {
            weights: (0..4)
                .map(|i| VertexWeight {
                    vertex: i,
                    weight: 1.0,
                })
                .collect(),
        }];
        let out = run_flat(&rest, &[Trs::IDENTITY], influences);
        for (o, r) in out.iter().zip(&rest) {
            assert!((*o - *r).length() < 1e-6);
        }
    }

    #[test]
    fn two_bone_blend_is_affine() {
        let rest = vec![Vec3::ZERO];
        let influences = vec![
            BoneInfluences {
                weights: vec![VertexWeight {
                    vertex: 0,
                    weight: 0.25,
                }],
            },
            BoneInfluences {
                weights: vec![VertexWeight {
                    vertex: 0,
                    weight: 0.75,
                }],
            },
        ];
        let bones = [
            Trs::IDENTITY,
            Trs::from_translation(Vec3::new(10.0, 0.0, 0.0)),
        ];
        let out = run_flat(&rest, &bones, influences);
        assert!((out[0] - Vec3::new(7.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn out_of_range_bone_dropped_not_fatal() {
        let rest = rest_square();
        let influences = vec![
            BoneInfluences {
                weights: vec![VertexWeight {
                    vertex: 0,
                    weight: 1.0,
                }],
            },
            // No transform exists for this bone; its weight must vanish
            BoneInfluences {
                weights: vec![VertexWeight {
                    vertex: 1,
                    weight: 1.0,
                }],
            },
        ];
        let out = run_flat(&rest, &[Trs::IDENTITY], influences);
        assert!((out[0] - rest[0]).length() < 1e-6);
        assert_eq!(out[1], Vec3::ZERO);
    }

    #[test]
    fn out_of_range_vertex_halts_list_only() {
        let rest = rest_square();
        let influences = vec![BoneInfluences {
            weights: vec![
                VertexWeight {
                    vertex: 0,
                    weight: 1.0,
                },
                VertexWeight {
                    vertex: 99,
                    weight: 1.0,
                },
                // Never reached: the bad index above halts this list
                VertexWeight {
                    vertex: 1,
                    weight: 1.0,
                },
            ],
        }];
        let out = run_flat(&rest, &[Trs::IDENTITY], influences);
        assert!((out[0] - rest[0]).length() < 1e-6);
        assert_eq!(out[1], Vec3::ZERO);
    }

    #[test]
    fn partition_duplicate_vertex_written_once() {
        let rest = vec![Vec3::new(1.0, 0.0, 0.0)];
        let part = |bone: u16| SkinPartition {
            vertex_map: vec![0],
            bone_map: vec![bone],
            weights_per_vertex: 1,
            bone_indices: vec![0],
            weights: vec![1.0],
        };
        let bones = [
            Trs::from_translation(Vec3::new(0.0, 5.0, 0.0)),
            Trs::from_translation(Vec3::new(0.0, 0.0, 9.0)),
        ];
        let mut out = vec![Vec3::ZERO];
        deform(
            &RestBuffers {
                positions: &rest,
                normals: &[],
                tangents: &[],
                bitangents: &[],
            },
            &bones,
            // Both partitions claim vertex 0; only the first may write it
            &SkinWeights::Partitioned(vec![part(0), part(1)]),
            &mut DeformedBuffers {
                positions: &mut out,
                normals: &mut [],
                tangents: &mut [],
                bitangents: &mut [],
            },
        );
        assert!((out[0] - Vec3::new(1.0, 5.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn normals_are_renormalized() {
        let rest = vec![Vec3::ZERO];
        let normals = vec![Vec3::Z];
        let influences = vec![BoneInfluences {
            weights: vec![VertexWeight {
                vertex: 0,
                weight: 0.5,
            }],
        }];
        let bones = [Trs::new(Vec3::ZERO, Quat::from_rotation_x(0.7), 2.0)];
        let mut out_p = vec![Vec3::ZERO];
        let mut out_n = vec![Vec3::ZERO];
        deform(
            &RestBuffers {
                positions: &rest,
                normals: &normals,
                tangents: &[],
                bitangents: &[],
            },
            &bones,
            &SkinWeights::Flat(influences),
            &mut DeformedBuffers {
                positions: &mut out_p,
                normals: &mut out_n,
                tangents: &mut [],
                bitangents: &mut [],
            },
        );
        assert!((out_n[0].length() - 1.0).abs() < 1e-5);
    }
}
