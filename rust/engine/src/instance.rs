// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decal instances and their projection data.

use crate::camera_instance::DecalCameraInstance;
use crate::host::{DecalHost, TextureHandle};
use crate::keys::{CameraId, ObjectKey};
use decal_lite_geometry::{CompactedUvBuffers, Mesh, Placement, ProjectorVolume, SubmeshMask};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Surface appearance of a decal
#[derive(Debug, Clone, PartialEq)]
pub struct DecalMaterial {
    pub texture: Option<TextureHandle>,
    pub normal_map: Option<TextureHandle>,
    pub opacity: f32,
}

impl DecalMaterial {
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture: Some(texture),
            normal_map: None,
            opacity: 1.0,
        }
    }

    pub fn with_normal_map(mut self, normal_map: TextureHandle) -> Self {
        self.normal_map = Some(normal_map);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

/// Request to place a decal on an object
#[derive(Debug, Clone)]
pub struct ProjectionRequest {
    pub target: ObjectKey,
    pub placement: Placement,
    pub material: DecalMaterial,
    pub priority: i32,
    pub tint: [f32; 4],
    pub submesh_mask: SubmeshMask,
}

impl ProjectionRequest {
    pub fn new(target: ObjectKey, placement: Placement, material: DecalMaterial) -> Self {
        Self {
            target,
            placement,
            material,
            priority: 0,
            tint: [1.0; 4],
            submesh_mask: SubmeshMask::all(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tint(mut self, tint: [f32; 4]) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_submesh_mask(mut self, mask: SubmeshMask) -> Self {
        self.submesh_mask = mask;
        self
    }
}

/// Projection result for one renderer of the target
#[derive(Debug, Clone)]
pub enum RendererProjection {
    /// Skinned renderer: index-aligned compacted UVs
    Compacted(CompactedUvBuffers),
    /// Static renderer: extracted decal mesh shared with the extraction cache
    Extracted(Arc<Mesh>),
    /// Mesh data is not readable; the projector overlaps the renderer bounds
    Overlapping,
}

/// A decal placed on an object
#[derive(Debug)]
pub struct DecalInstance {
    pub(crate) object: ObjectKey,
    pub(crate) priority: i32,
    pub(crate) enabled: bool,
    pub(crate) tint: [f32; 4],
    pub(crate) material: DecalMaterial,
    pub(crate) volume: ProjectorVolume,
    pub(crate) submesh_mask: SubmeshMask,
    /// One slot per renderer of the target object
    pub(crate) projections: Vec<Option<RendererProjection>>,
    pub(crate) camera_instances: FxHashMap<(CameraId, usize), DecalCameraInstance>,
}

impl DecalInstance {
    pub(crate) fn new(
        object: ObjectKey,
        volume: ProjectorVolume,
        material: DecalMaterial,
        submesh_mask: SubmeshMask,
    ) -> Self {
        Self {
            object,
            priority: 0,
            enabled: true,
            tint: [1.0; 4],
            material,
            volume,
            submesh_mask,
            projections: Vec::new(),
            camera_instances: FxHashMap::default(),
        }
    }

    pub fn object(&self) -> ObjectKey {
        self.object
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tint(&self) -> [f32; 4] {
        self.tint
    }

    pub fn material(&self) -> &DecalMaterial {
        &self.material
    }

    pub fn volume(&self) -> &ProjectorVolume {
        &self.volume
    }

    pub fn placement(&self) -> &Placement {
        self.volume.placement()
    }

    pub fn submesh_mask(&self) -> &SubmeshMask {
        &self.submesh_mask
    }

    pub fn projection(&self, renderer: usize) -> Option<&RendererProjection> {
        self.projections.get(renderer).and_then(Option::as_ref)
    }

    pub fn has_projection(&self) -> bool {
        self.projections.iter().any(Option::is_some)
    }

    pub fn camera_instance(&self, camera: CameraId, renderer: usize) -> Option<&DecalCameraInstance> {
        self.camera_instances.get(&(camera, renderer))
    }

    pub fn camera_instance_count(&self) -> usize {
        self.camera_instances.len()
    }

    /// Dispose every realization on one camera
    pub(crate) fn dispose_camera(&mut self, camera: CameraId, host: &mut dyn DecalHost) -> usize {
        let keys: Vec<_> = self
            .camera_instances
            .keys()
            .filter(|(c, _)| *c == camera)
            .copied()
            .collect();
        for key in &keys {
            if let Some(realization) = self.camera_instances.remove(key) {
                realization.dispose(host);
            }
        }
        keys.len()
    }

    /// Dispose every realization, returning the cameras they were on
    pub(crate) fn dispose_all(&mut self, host: &mut dyn DecalHost) -> Vec<CameraId> {
        let mut cameras = Vec::with_capacity(self.camera_instances.len());
        for ((camera, _), realization) in self.camera_instances.drain() {
            realization.dispose(host);
            if !cameras.contains(&camera) {
                cameras.push(camera);
            }
        }
        cameras
    }
}
