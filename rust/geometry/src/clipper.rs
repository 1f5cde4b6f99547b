// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Clipper
//!
//! Tests mesh triangles against the six planes of a [`ProjectorVolume`] and
//! writes a projected UV entry for every vertex of an accepted triangle.
//!
//! The test is conservative: a triangle is rejected only when all three
//! vertices lie outside the same plane. Triangles straddling a plane are
//! accepted whole, so vertices slightly outside the volume can receive UVs
//! outside `[0, 1]`; the decal shader discards those texels.

use crate::error::{Error, Result};
use crate::mask::SubmeshMask;
use crate::mesh::Mesh;
use crate::projector::ProjectorVolume;
use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Projected decal coordinate of one source vertex.
///
/// A non-positive `validity` marks the vertex as not covered by the decal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedUv {
    pub u: f32,
    pub v: f32,
    pub validity: f32,
}

impl ProjectedUv {
    /// Sentinel for vertices outside the decal
    pub const INVALID: Self = Self {
        u: 0.0,
        v: 0.0,
        validity: -1.0,
    };

    #[inline]
    pub fn valid(u: f32, v: f32) -> Self {
        Self { u, v, validity: 1.0 }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validity > 0.0
    }
}

impl Default for ProjectedUv {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Clip triangles against the projector volume.
///
/// `positions` are flat xyz triplets in the space the volume's planes live
/// in. `out` must hold one entry per vertex. With `reset` the output is
/// first filled with [`ProjectedUv::INVALID`]; without it, entries written
/// by an earlier call are kept (used to merge several submeshes).
///
/// Returns the number of accepted triangles.
pub fn clip_triangles(
    indices: &[u32],
    positions: &[f32],
    volume: &ProjectorVolume,
    out: &mut [ProjectedUv],
    reset: bool,
) -> Result<usize> {
    let vertex_count = positions.len() / 3;
    if out.len() != vertex_count {
        return Err(Error::LengthMismatch {
            what: "projected uv entries",
            expected: vertex_count,
            actual: out.len(),
        });
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(Error::IndexOutOfRange {
            index: bad,
            vertex_count,
        });
    }

    if reset {
        out.fill(ProjectedUv::INVALID);
    }

    let point = |i: u32| {
        let base = i as usize * 3;
        Point3::new(positions[base], positions[base + 1], positions[base + 2])
    };

    let planes = volume.planes();
    let mut accepted = 0;

    for tri in indices.chunks_exact(3) {
        let corners = [point(tri[0]), point(tri[1]), point(tri[2])];

        // Separating plane: every corner on the outside of the same plane
        let separated = planes
            .iter()
            .any(|plane| corners.iter().all(|corner| !plane.is_inside(corner)));
        if separated {
            continue;
        }

        accepted += 1;
        for (&index, corner) in tri.iter().zip(corners.iter()) {
            let (u, v) = volume.project_uv(corner);
            out[index as usize] = ProjectedUv::valid(u, v);
        }
    }

    Ok(accepted)
}

/// Transform flat xyz positions by an affine matrix
pub fn transform_positions(positions: &[f32], transform: &Matrix4<f32>) -> Vec<f32> {
    let mut out = Vec::with_capacity(positions.len());
    for chunk in positions.chunks_exact(3) {
        let p = transform.transform_point(&Point3::new(chunk[0], chunk[1], chunk[2]));
        out.extend_from_slice(&[p.x, p.y, p.z]);
    }
    out
}

/// Project a decal onto every non-excluded submesh of a mesh.
///
/// `world_transform` maps mesh-local positions into the projector's space.
/// Returns `Ok(None)` when no triangle touches the volume.
pub fn project_mesh(
    mesh: &Mesh,
    world_transform: &Matrix4<f32>,
    volume: &ProjectorVolume,
    mask: &SubmeshMask,
) -> Result<Option<Vec<ProjectedUv>>> {
    mask.validate(mesh.submesh_count())?;

    let world_positions = transform_positions(&mesh.positions, world_transform);
    let mut uvs = vec![ProjectedUv::INVALID; mesh.vertex_count()];
    let mut accepted = 0;
    let mut reset = true;

    for submesh in 0..mesh.submesh_count() {
        if mask.is_excluded(submesh) {
            continue;
        }
        let indices = mesh
            .submesh_indices(submesh)
            .ok_or(Error::SubmeshOutOfRange {
                index: submesh,
                count: mesh.submesh_count(),
            })?;
        accepted += clip_triangles(indices, &world_positions, volume, &mut uvs, reset)?;
        reset = false;
    }

    Ok((accepted > 0).then_some(uvs))
}

/// One renderer's worth of input for [`project_batch`]
#[derive(Debug, Clone)]
pub struct ProjectionJob<'a> {
    pub mesh: &'a Mesh,
    pub world_transform: Matrix4<f32>,
    pub mask: &'a SubmeshMask,
}

/// Project one decal onto many meshes in parallel.
///
/// Jobs are independent and results are returned in job order; callers
/// store them on their own thread.
pub fn project_batch(
    jobs: &[ProjectionJob<'_>],
    volume: &ProjectorVolume,
) -> Vec<Result<Option<Vec<ProjectedUv>>>> {
    jobs.par_iter()
        .map(|job| project_mesh(job.mesh, &job.world_transform, volume, job.mask))
        .collect()
}
