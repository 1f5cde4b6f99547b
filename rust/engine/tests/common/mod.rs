// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use decal_lite_engine::{
    DecalMaterial, ObjectDesc, ObjectKey, ProjectionRequest, RendererDesc, RendererId,
    RendererKind, TextureHandle,
};
use decal_lite_geometry::{BoneWeight, Matrix4, Mesh, Placement, Point3, Vector3};
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `n` x `n` vertex grid in the z = 0 plane, centred on the origin
pub fn grid(n: u32, step: f32) -> Mesh {
    let half = (n - 1) as f32 * step * 0.5;
    let mut positions = Vec::with_capacity((n * n * 3) as usize);
    for row in 0..n {
        for col in 0..n {
            positions.extend_from_slice(&[col as f32 * step - half, row as f32 * step - half, 0.0]);
        }
    }
    let mut indices = Vec::new();
    for row in 0..n - 1 {
        for col in 0..n - 1 {
            let i = row * n + col;
            indices.extend_from_slice(&[i, i + 1, i + n + 1, i, i + n + 1, i + n]);
        }
    }
    Mesh::from_positions(positions, indices)
}

/// Grid with one bone per row
pub fn skinned_grid(n: u32, step: f32) -> Mesh {
    let mut mesh = grid(n, step);
    mesh.bone_weights = (0..mesh.vertex_count() as u32)
        .map(|i| BoneWeight::single(i / n))
        .collect();
    mesh.bind_poses = vec![Matrix4::identity(); n as usize];
    mesh
}

pub fn static_renderer(id: u64, offset_x: f32) -> RendererDesc {
    RendererDesc::new(
        RendererId(id),
        RendererKind::Static,
        Arc::new(grid(9, 0.25)),
        Matrix4::new_translation(&Vector3::new(offset_x, 0.0, 0.0)),
    )
}

pub fn skinned_renderer(id: u64) -> RendererDesc {
    RendererDesc::new(
        RendererId(id),
        RendererKind::Skinned,
        Arc::new(skinned_grid(9, 0.25)),
        Matrix4::identity(),
    )
}

/// Single static renderer
pub fn static_object(host_id: u64) -> ObjectDesc {
    ObjectDesc::new(host_id, vec![static_renderer(host_id * 10, 0.0)])
}

pub fn skinned_object(host_id: u64) -> ObjectDesc {
    ObjectDesc::new(host_id, vec![skinned_renderer(host_id * 10)])
}

pub fn placement_at(x: f32, y: f32, size: f32) -> Placement {
    Placement::axis_aligned(Point3::new(x, y, 0.0), Vector3::new(size, size, 1.0))
}

pub fn decal(target: ObjectKey, x: f32, y: f32) -> ProjectionRequest {
    ProjectionRequest::new(
        target,
        placement_at(x, y, 0.6),
        DecalMaterial::new(TextureHandle(7)),
    )
}
