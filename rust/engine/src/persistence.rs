// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON persistence for placed decals.
//!
//! Objects are not serialized; decals refer to their target by host id and
//! are re-attached to whatever object carries that id when restored.
//! Static projections are recomputed on restore. Compacted buffers of
//! skinned renderers are stored as-is (offsets included) so skinned decals
//! restore without clipping the posed mesh again.

use serde::{Deserialize, Serialize};

use crate::context::DecalContext;
use crate::error::{Error, Result};
use crate::host::{DecalHost, TextureHandle};
use crate::instance::{DecalInstance, DecalMaterial, RendererProjection};
use crate::keys::ObjectKey;
use decal_lite_geometry::{CompactedUvBuffers, Placement, ProjectorVolume, SubmeshMask};
use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub version: u32,
    pub decals: Vec<DecalSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecalSnapshot {
    /// Host id of the target object
    pub target: u64,
    pub position: [f32; 3],
    /// Quaternion as x, y, z, w
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub priority: i32,
    pub enabled: bool,
    pub tint: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_map: Option<TextureHandle>,
    pub opacity: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_submeshes: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skinned: Vec<SkinnedUvSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinnedUvSnapshot {
    /// Renderer index within the target object
    pub renderer: usize,
    pub buffers: CompactedUvBuffers,
}

/// Outcome of a restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Decals whose target host id is not registered
    pub unknown_targets: usize,
    /// Decals that no longer reach their target or were culled
    pub dropped: usize,
}

impl DecalSnapshot {
    fn placement(&self) -> Placement {
        let [x, y, z, w] = self.rotation;
        Placement::new(
            Point3::from(self.position),
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
            Vector3::from(self.scale),
        )
    }
}

impl DecalContext {
    /// Snapshot of every decal, grouped by object in priority order
    pub fn snapshot(&self) -> ContextSnapshot {
        let mut decals = Vec::with_capacity(self.instances.len());
        for (_, object) in self.objects.iter() {
            for key in object.decals() {
                let Some(instance) = self.instances.get(key) else {
                    continue;
                };
                decals.push(snapshot_instance(object.host_id, instance));
            }
        }
        ContextSnapshot {
            version: SNAPSHOT_VERSION,
            decals,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot()).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Re-create decals from a snapshot.
    ///
    /// Every entry is validated before any decal is placed, so a malformed
    /// snapshot changes nothing. Entries whose target is not registered are
    /// skipped and counted.
    pub fn restore(
        &mut self,
        snapshot: &ContextSnapshot,
        host: &mut dyn DecalHost,
    ) -> Result<RestoreReport> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut report = RestoreReport::default();
        let mut pending: Vec<(DecalInstance, Vec<(usize, CompactedUvBuffers)>)> = Vec::new();

        for decal in &snapshot.decals {
            let Some(target) = self.find_object(decal.target) else {
                tracing::warn!(host_id = decal.target, "Decal target not registered, skipping");
                report.unknown_targets += 1;
                continue;
            };
            pending.push(self.rebuild_instance(target, decal)?);
        }

        for (instance, stored) in pending {
            match self.place(instance, stored, host)? {
                Some(_) => report.restored += 1,
                None => report.dropped += 1,
            }
        }

        tracing::info!(
            restored = report.restored,
            unknown_targets = report.unknown_targets,
            dropped = report.dropped,
            "Restored decals"
        );
        Ok(report)
    }

    pub fn restore_json(&mut self, json: &str, host: &mut dyn DecalHost) -> Result<RestoreReport> {
        let snapshot: ContextSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        self.restore(&snapshot, host)
    }

    fn rebuild_instance(
        &self,
        target: ObjectKey,
        decal: &DecalSnapshot,
    ) -> Result<(DecalInstance, Vec<(usize, CompactedUvBuffers)>)> {
        if decal.texture.is_none() {
            return Err(Error::MissingTexture);
        }
        let object = self.objects.get(target).ok_or(Error::ObjectNotFound(target))?;
        let volume = ProjectorVolume::new(decal.placement())?;
        let mask = SubmeshMask::excluding(decal.excluded_submeshes.iter().copied());
        mask.validate(object.max_submesh_count())?;

        let material = DecalMaterial {
            texture: decal.texture,
            normal_map: decal.normal_map,
            opacity: decal.opacity,
        };
        let mut instance = DecalInstance::new(target, volume, material, mask);
        instance.priority = decal.priority;
        instance.enabled = decal.enabled;
        instance.tint = decal.tint;

        let stored = decal
            .skinned
            .iter()
            .map(|entry| (entry.renderer, entry.buffers.clone()))
            .collect();
        Ok((instance, stored))
    }
}

fn snapshot_instance(host_id: u64, instance: &DecalInstance) -> DecalSnapshot {
    let placement = instance.placement();
    let rotation = placement.rotation.quaternion().coords;
    let skinned = instance
        .projections
        .iter()
        .enumerate()
        .filter_map(|(renderer, projection)| match projection {
            Some(RendererProjection::Compacted(buffers)) => Some(SkinnedUvSnapshot {
                renderer,
                buffers: buffers.clone(),
            }),
            _ => None,
        })
        .collect();

    DecalSnapshot {
        target: host_id,
        position: placement.position.coords.into(),
        rotation: [rotation.x, rotation.y, rotation.z, rotation.w],
        scale: placement.scale.into(),
        priority: instance.priority,
        enabled: instance.enabled,
        tint: instance.tint,
        texture: instance.material.texture,
        normal_map: instance.material.normal_map,
        opacity: instance.material.opacity,
        excluded_submeshes: instance.submesh_mask.excluded().to_vec(),
        skinned,
    }
}
