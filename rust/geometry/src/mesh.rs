// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures
//!
//! Vertex attributes are stored as flat `f32` buffers so they can be
//! uploaded without re-packing. Skinning data (bone weights, bind poses,
//! blend shapes) is addressed by the original vertex index, which is why the
//! skinned decal path never renumbers vertices.

use crate::bounds::Aabb;
use crate::error::{Error, Result};
use nalgebra::{Matrix4, Point3, Vector3};

/// Skin influence of up to four bones on one vertex
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoneWeight {
    pub bones: [u32; 4],
    pub weights: [f32; 4],
}

impl BoneWeight {
    /// Single-bone influence
    pub fn single(bone: u32) -> Self {
        Self {
            bones: [bone, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// One keyframe of a blend shape: per-vertex deltas at a given weight
#[derive(Debug, Clone, PartialEq)]
pub struct BlendShapeFrame {
    pub weight: f32,
    /// Position deltas (dx, dy, dz) per vertex
    pub delta_positions: Vec<f32>,
    /// Normal deltas (dx, dy, dz) per vertex, empty if the shape carries none
    pub delta_normals: Vec<f32>,
}

/// Named blend shape (morph target)
#[derive(Debug, Clone, PartialEq)]
pub struct BlendShape {
    pub name: String,
    pub frames: Vec<BlendShapeFrame>,
}

/// Contiguous range of the index buffer drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMeshRange {
    /// First index (not triangle) of the range
    pub index_start: usize,
    /// Number of indices, a multiple of 3
    pub index_count: usize,
}

impl SubMeshRange {
    pub fn new(index_start: usize, index_count: usize) -> Self {
        Self {
            index_start,
            index_count,
        }
    }
}

/// Triangle mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Texture coordinates (u, v), empty if absent
    pub uvs: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
    /// Submesh ranges; empty means a single submesh spanning all indices
    pub submeshes: Vec<SubMeshRange>,
    /// Per-vertex skin influences, empty for static meshes
    pub bone_weights: Vec<BoneWeight>,
    /// Inverse bind pose per bone
    pub bind_poses: Vec<Matrix4<f32>>,
    pub blend_shapes: Vec<BlendShape>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            submeshes: Vec::new(),
            bone_weights: Vec::new(),
            bind_poses: Vec::new(),
            blend_shapes: Vec::new(),
        }
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
            ..Self::new()
        }
    }

    /// Build a mesh from raw positions and indices, computing smooth normals
    pub fn from_positions(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        let mut mesh = Self {
            positions,
            indices,
            ..Self::new()
        };
        mesh.recalculate_normals();
        mesh
    }

    /// Add a vertex with normal
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f32>, normal: Vector3<f32>) {
        self.positions.extend_from_slice(&[position.x, position.y, position.z]);
        self.normals.extend_from_slice(&[normal.x, normal.y, normal.z]);
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Position of vertex `index`
    #[inline]
    pub fn position(&self, index: usize) -> Point3<f32> {
        let base = index * 3;
        Point3::new(
            self.positions[base],
            self.positions[base + 1],
            self.positions[base + 2],
        )
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether the mesh carries skinning data
    #[inline]
    pub fn is_skinned(&self) -> bool {
        !self.bone_weights.is_empty()
    }

    /// Number of submeshes (at least 1)
    #[inline]
    pub fn submesh_count(&self) -> usize {
        self.submeshes.len().max(1)
    }

    /// Index slice of submesh `submesh`
    pub fn submesh_indices(&self, submesh: usize) -> Option<&[u32]> {
        if self.submeshes.is_empty() {
            return (submesh == 0).then_some(self.indices.as_slice());
        }
        let range = self.submeshes.get(submesh)?;
        self.indices
            .get(range.index_start..range.index_start + range.index_count)
    }

    /// Check the structural invariants of the mesh
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "position buffer length {} is not a multiple of 3",
                self.positions.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }

        let vertex_count = self.vertex_count();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::IndexOutOfRange {
                index: bad,
                vertex_count,
            });
        }

        check_optional_len("normals", self.normals.len(), vertex_count * 3)?;
        check_optional_len("uvs", self.uvs.len(), vertex_count * 2)?;
        check_optional_len("bone weights", self.bone_weights.len(), vertex_count)?;

        for shape in &self.blend_shapes {
            for frame in &shape.frames {
                check_optional_len(
                    "blend shape position deltas",
                    frame.delta_positions.len(),
                    vertex_count * 3,
                )?;
                check_optional_len(
                    "blend shape normal deltas",
                    frame.delta_normals.len(),
                    vertex_count * 3,
                )?;
            }
        }

        for range in &self.submeshes {
            if range.index_count % 3 != 0
                || range.index_start + range.index_count > self.indices.len()
            {
                return Err(Error::InvalidMesh(format!(
                    "submesh range {}..{} does not fit {} indices",
                    range.index_start,
                    range.index_start + range.index_count,
                    self.indices.len()
                )));
            }
        }

        Ok(())
    }

    /// Calculate bounds
    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_positions(&self.positions)
    }

    /// Recompute smooth vertex normals from triangle faces
    pub fn recalculate_normals(&mut self) {
        let vertex_count = self.vertex_count();
        let mut normals = vec![Vector3::<f32>::zeros(); vertex_count];

        // Accumulate area-weighted face normals
        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }
            let v0 = self.position(i0);
            let normal = (self.position(i1) - v0).cross(&(self.position(i2) - v0));
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }

        self.normals.clear();
        self.normals.reserve(vertex_count * 3);
        for normal in normals {
            let normalized = normal
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vector3::zeros);
            self.normals
                .extend_from_slice(&[normalized.x, normalized.y, normalized.z]);
        }
    }

    /// Clear the mesh
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

fn check_optional_len(what: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual != 0 && actual != expected {
        return Err(Error::LengthMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
