// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static Mesh Extractor
//!
//! Builds a standalone mesh from the triangles a decal fully covers, for
//! static decals and for baking decals into permanent geometry. Unlike the
//! skinned path, vertices are renumbered here, so every per-vertex channel
//! (bone weights, blend-shape deltas) is replayed through the same remap.

use crate::clipper::ProjectedUv;
use crate::error::{Error, Result};
use crate::mask::SubmeshMask;
use crate::mesh::{BlendShape, BlendShapeFrame, Mesh, SubMeshRange};

/// Remap slot for vertices not referenced by any kept triangle
const UNUSED: u32 = u32::MAX;

/// Extract the triangles whose three vertices have valid decal UVs.
///
/// The result carries the decal UVs in `uvs`, one submesh per source
/// submesh that kept triangles, and freshly computed normals.
/// Returns `Ok(None)` when no triangle qualifies.
pub fn extract_static_mesh(
    mesh: &Mesh,
    uvs: &[ProjectedUv],
    mask: &SubmeshMask,
) -> Result<Option<Mesh>> {
    mesh.validate()?;
    if uvs.len() != mesh.vertex_count() {
        return Err(Error::LengthMismatch {
            what: "projected uv entries",
            expected: mesh.vertex_count(),
            actual: uvs.len(),
        });
    }
    mask.validate(mesh.submesh_count())?;

    let mut remap = vec![UNUSED; mesh.vertex_count()];
    // new index -> source index
    let mut source_vertices: Vec<usize> = Vec::new();
    let mut out = Mesh::new();

    for submesh in 0..mesh.submesh_count() {
        if mask.is_excluded(submesh) {
            continue;
        }
        let Some(indices) = mesh.submesh_indices(submesh) else {
            continue;
        };

        let start = out.indices.len();
        for tri in indices.chunks_exact(3) {
            if !tri.iter().all(|&i| uvs[i as usize].is_valid()) {
                continue;
            }
            for &old in tri {
                let slot = &mut remap[old as usize];
                if *slot == UNUSED {
                    *slot = source_vertices.len() as u32;
                    source_vertices.push(old as usize);
                }
                out.indices.push(*slot);
            }
        }

        let count = out.indices.len() - start;
        if count > 0 {
            out.submeshes.push(SubMeshRange::new(start, count));
        }
    }

    if out.indices.is_empty() {
        return Ok(None);
    }

    out.positions = gather_triplets(&mesh.positions, &source_vertices);
    out.uvs = source_vertices
        .iter()
        .flat_map(|&old| [uvs[old].u, uvs[old].v])
        .collect();

    if mesh.is_skinned() {
        out.bone_weights = source_vertices
            .iter()
            .map(|&old| mesh.bone_weights[old])
            .collect();
        out.bind_poses = mesh.bind_poses.clone();
    }

    out.blend_shapes = mesh
        .blend_shapes
        .iter()
        .map(|shape| BlendShape {
            name: shape.name.clone(),
            frames: shape
                .frames
                .iter()
                .map(|frame| BlendShapeFrame {
                    weight: frame.weight,
                    delta_positions: gather_triplets(&frame.delta_positions, &source_vertices),
                    delta_normals: gather_triplets(&frame.delta_normals, &source_vertices),
                })
                .collect(),
        })
        .collect();

    out.recalculate_normals();
    Ok(Some(out))
}

/// Gather xyz triplets by source vertex; empty channels stay empty
fn gather_triplets(channel: &[f32], source_vertices: &[usize]) -> Vec<f32> {
    if channel.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(source_vertices.len() * 3);
    for &old in source_vertices {
        out.extend_from_slice(&channel[old * 3..old * 3 + 3]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::BoneWeight;
    use rustc_hash::FxHashSet;

    /// Strip of four triangles along x: vertices 0..6 (two rows of 3) plus
    /// a detached triangle 6,7,8
    fn strip() -> Mesh {
        let mut mesh = Mesh::from_positions(
            vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 2.0, 1.0, 0.0, //
                5.0, 0.0, 0.0, 6.0, 0.0, 0.0, 5.0, 1.0, 0.0,
            ],
            vec![0, 1, 4, 0, 4, 3, 1, 2, 5, 1, 5, 4, 6, 7, 8],
        );
        mesh.bone_weights = (0..9).map(BoneWeight::single).collect();
        mesh.blend_shapes = vec![BlendShape {
            name: "dent".to_string(),
            frames: vec![BlendShapeFrame {
                weight: 100.0,
                delta_positions: (0..27).map(|i| i as f32).collect(),
                delta_normals: Vec::new(),
            }],
        }];
        mesh
    }

    fn valid_at(count: usize, valid: &[usize]) -> Vec<ProjectedUv> {
        (0..count)
            .map(|i| {
                if valid.contains(&i) {
                    ProjectedUv::valid(i as f32, 0.5)
                } else {
                    ProjectedUv::INVALID
                }
            })
            .collect()
    }

    #[test]
    fn test_keeps_only_fully_valid_triangles() {
        let mesh = strip();
        // Triangles (0,1,4) and (0,4,3) are fully valid; (1,2,5) misses 2
        let uvs = valid_at(9, &[0, 1, 3, 4, 5]);

        let extracted = extract_static_mesh(&mesh, &uvs, &SubmeshMask::all())
            .unwrap()
            .unwrap();

        assert_eq!(extracted.triangle_count(), 3);
        assert_eq!(extracted.vertex_count(), 5);
        assert!(extracted.validate().is_ok());
    }

    #[test]
    fn test_vertex_count_matches_distinct_referenced_vertices() {
        let mesh = strip();
        let uvs = valid_at(9, &[0, 1, 3, 4, 6, 7, 8]);
        let extracted = extract_static_mesh(&mesh, &uvs, &SubmeshMask::all())
            .unwrap()
            .unwrap();

        let distinct: FxHashSet<u32> = extracted.indices.iter().copied().collect();
        assert_eq!(extracted.vertex_count(), distinct.len());
        assert_eq!(extracted.vertex_count(), 7);
    }

    #[test]
    fn test_every_triangle_maps_to_a_valid_source_triangle() {
        let mesh = strip();
        let uvs = valid_at(9, &[0, 1, 2, 4, 5, 6, 7, 8]);
        let extracted = extract_static_mesh(&mesh, &uvs, &SubmeshMask::all())
            .unwrap()
            .unwrap();

        let corners = |m: &Mesh, tri: &[u32]| -> Vec<[f32; 3]> {
            tri.iter().map(|&i| m.position(i as usize).into()).collect()
        };

        for tri in extracted.indices.chunks_exact(3) {
            let target = corners(&extracted, tri);
            let source = mesh
                .indices
                .chunks_exact(3)
                .find(|s| corners(&mesh, *s) == target)
                .expect("extracted triangle has no source");
            assert!(source.iter().all(|&i| uvs[i as usize].is_valid()));
        }
        assert_eq!(extracted.triangle_count(), 4);
    }

    #[test]
    fn test_bone_weights_and_blend_shapes_follow_remap() {
        let mesh = strip();
        let uvs = valid_at(9, &[6, 7, 8]);
        let extracted = extract_static_mesh(&mesh, &uvs, &SubmeshMask::all())
            .unwrap()
            .unwrap();

        assert_eq!(extracted.indices, vec![0, 1, 2]);
        assert_eq!(
            extracted.bone_weights.iter().map(|w| w.bones[0]).collect::<Vec<_>>(),
            vec![6, 7, 8]
        );
        let deltas = &extracted.blend_shapes[0].frames[0].delta_positions;
        assert_eq!(deltas[..3], [18.0, 19.0, 20.0]);
        assert_eq!(deltas.len(), 9);
        assert!(extracted.blend_shapes[0].frames[0].delta_normals.is_empty());
        assert_eq!(extracted.uvs, vec![6.0, 0.5, 7.0, 0.5, 8.0, 0.5]);
    }

    #[test]
    fn test_no_valid_triangle() {
        let mesh = strip();
        let uvs = valid_at(9, &[0, 1, 2]);
        assert!(extract_static_mesh(&mesh, &uvs, &SubmeshMask::all())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_submesh_mask_and_ranges() {
        let mut mesh = strip();
        mesh.submeshes = vec![SubMeshRange::new(0, 12), SubMeshRange::new(12, 3)];
        let uvs = valid_at(9, &[0, 1, 3, 4, 6, 7, 8]);

        let both = extract_static_mesh(&mesh, &uvs, &SubmeshMask::all())
            .unwrap()
            .unwrap();
        assert_eq!(
            both.submeshes,
            vec![SubMeshRange::new(0, 6), SubMeshRange::new(6, 3)]
        );

        let first_only = extract_static_mesh(&mesh, &uvs, &SubmeshMask::excluding([1]))
            .unwrap()
            .unwrap();
        assert_eq!(first_only.submeshes, vec![SubMeshRange::new(0, 6)]);
        assert_eq!(first_only.vertex_count(), 4);
    }

    #[test]
    fn test_uv_length_mismatch() {
        let mesh = strip();
        let err = extract_static_mesh(&mesh, &valid_at(4, &[]), &SubmeshMask::all()).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 9, actual: 4, .. }));
    }
}
