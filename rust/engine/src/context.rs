// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decal context - owner of every object, instance and camera.
//!
//! The host creates one [`DecalContext`], registers decal targets with it
//! and drives it once per frame (see the `frame` module). Objects and
//! instances live in slot maps; each object keeps its decals in a
//! [`PriorityList`](crate::PriorityList) bounded by its maximum count.

use crate::camera::CameraEntry;
use crate::config::DecalConfig;
use crate::error::{Error, Result};
use crate::host::DecalHost;
use crate::instance::{DecalInstance, DecalMaterial, ProjectionRequest, RendererProjection};
use crate::keys::{CameraId, InstanceKey, ObjectKey, RendererId};
use crate::modes::{Mode, ModeDispatcher};
use crate::object::{DecalObject, ObjectDesc, RendererKind};
use decal_lite_geometry::{
    compact, extract_static_mesh, project_batch, CompactedUvBuffers, ExtractionCache, Mesh,
    Placement, ProjectionJob, ProjectorVolume, SubmeshMask,
};
use nalgebra::Matrix4;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use std::sync::Arc;

/// Permanent geometry produced by [`DecalContext::bake`]
#[derive(Debug, Clone)]
pub struct BakedDecal {
    pub renderer: RendererId,
    /// Mesh-local to world, same as the source renderer
    pub transform: Matrix4<f32>,
    /// Decal UVs are in `mesh.uvs`
    pub mesh: Arc<Mesh>,
    pub material: DecalMaterial,
    pub tint: [f32; 4],
}

pub struct DecalContext {
    pub(crate) config: DecalConfig,
    pub(crate) objects: SlotMap<ObjectKey, DecalObject>,
    pub(crate) instances: SlotMap<InstanceKey, DecalInstance>,
    pub(crate) cameras: FxHashMap<CameraId, CameraEntry>,
    pub(crate) visible: FxHashSet<ObjectKey>,
    pub(crate) dispatcher: ModeDispatcher,
    pub(crate) extraction_cache: ExtractionCache<(InstanceKey, usize)>,
}

impl Default for DecalContext {
    fn default() -> Self {
        Self::new(DecalConfig::default())
    }
}

impl DecalContext {
    pub fn new(config: DecalConfig) -> Self {
        Self::with_dispatcher(config, ModeDispatcher::new())
    }

    pub fn with_dispatcher(config: DecalConfig, dispatcher: ModeDispatcher) -> Self {
        Self {
            config,
            objects: SlotMap::with_key(),
            instances: SlotMap::with_key(),
            cameras: FxHashMap::default(),
            visible: FxHashSet::default(),
            dispatcher,
            extraction_cache: ExtractionCache::new(),
        }
    }

    pub fn config(&self) -> &DecalConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &ModeDispatcher {
        &self.dispatcher
    }

    /// Add a host mode; meant to be called before the first frame
    pub fn register_mode(&mut self, mode: Mode) {
        tracing::debug!(mode = ?mode.kind, priority = mode.priority, "Registered decal mode");
        self.dispatcher.register(mode);
    }

    // ---- Objects ----

    /// Register a surface that can receive decals
    pub fn register_object(&mut self, desc: ObjectDesc) -> Result<ObjectKey> {
        for renderer in &desc.renderers {
            renderer.mesh.validate()?;
        }
        let host_id = desc.host_id;
        let renderers = desc.renderers.len();
        let key = self
            .objects
            .insert(DecalObject::from_desc(desc, self.config.max_decals_per_object));
        tracing::debug!(object = ?key, host_id, renderers, "Registered decal object");
        Ok(key)
    }

    pub fn object(&self, key: ObjectKey) -> Option<&DecalObject> {
        self.objects.get(key)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectKey, &DecalObject)> + '_ {
        self.objects.iter()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Look an object up by its host id
    pub fn find_object(&self, host_id: u64) -> Option<ObjectKey> {
        self.objects
            .iter()
            .find(|(_, object)| object.host_id == host_id)
            .map(|(key, _)| key)
    }

    /// Host notification: object enabled or disabled. Disabling releases
    /// every realization of the object's decals; they are rebuilt once the
    /// object is enabled and visible again.
    pub fn set_object_enabled(
        &mut self,
        key: ObjectKey,
        enabled: bool,
        host: &mut dyn DecalHost,
    ) -> Result<()> {
        let object = self.objects.get_mut(key).ok_or(Error::ObjectNotFound(key))?;
        if object.enabled == enabled {
            return Ok(());
        }
        object.enabled = enabled;
        let decals: Vec<InstanceKey> = object.decals().collect();

        if !enabled {
            self.visible.remove(&key);
            for instance in decals {
                self.dispose_realizations(instance, host);
            }
        }
        tracing::debug!(object = ?key, enabled, "Decal object toggled");
        Ok(())
    }

    /// Host notification: object destroyed. Destroys all of its decals and
    /// returns how many there were.
    pub fn destroy_object(&mut self, key: ObjectKey, host: &mut dyn DecalHost) -> Result<usize> {
        let mut object = self.objects.remove(key).ok_or(Error::ObjectNotFound(key))?;
        self.visible.remove(&key);
        let decals: Vec<InstanceKey> = object.decals.drain().collect();
        for instance in &decals {
            self.destroy_instance(*instance, host);
        }
        tracing::debug!(object = ?key, host_id = object.host_id, decals = decals.len(), "Destroyed decal object");
        Ok(decals.len())
    }

    // ---- Decals ----

    /// Project a decal onto an object.
    ///
    /// Returns `Ok(None)` when the decal touches none of the object's
    /// renderers, or when it was culled by the object's limit as soon as it
    /// was inserted (its priority was the first to go under the policy).
    /// Invalid requests are rejected without changing any state.
    pub fn project(
        &mut self,
        request: ProjectionRequest,
        host: &mut dyn DecalHost,
    ) -> Result<Option<InstanceKey>> {
        let ProjectionRequest {
            target,
            placement,
            material,
            priority,
            tint,
            submesh_mask,
        } = request;

        let object = self.objects.get(target).ok_or(Error::ObjectNotFound(target))?;
        if material.texture.is_none() {
            return Err(Error::MissingTexture);
        }
        let volume = ProjectorVolume::new(placement)?;
        submesh_mask.validate(object.max_submesh_count())?;

        let mut instance = DecalInstance::new(target, volume, material, submesh_mask);
        instance.priority = priority;
        instance.tint = tint;
        self.place(instance, Vec::new(), host)
    }

    /// Store a validated instance, compute its projections and add it to its
    /// object. Skinned renderers listed in `stored` reuse those buffers
    /// instead of being clipped again.
    pub(crate) fn place(
        &mut self,
        instance: DecalInstance,
        stored: Vec<(usize, CompactedUvBuffers)>,
        host: &mut dyn DecalHost,
    ) -> Result<Option<InstanceKey>> {
        let target = instance.object;
        let key = self.instances.insert(instance);

        let projections = match self.compute_projections(key, stored) {
            Ok(projections) => projections,
            Err(err) => {
                self.discard(key);
                return Err(err);
            }
        };

        if !self.reaches_object(key, &projections) {
            tracing::debug!(object = ?target, "Decal misses every renderer");
            self.discard(key);
            return Ok(None);
        }

        if let Some(instance) = self.instances.get_mut(key) {
            instance.projections = projections;
        }
        self.add_decal(key, host)?;

        if self.instances.contains_key(key) {
            tracing::debug!(object = ?target, instance = ?key, "Placed decal");
            Ok(Some(key))
        } else {
            tracing::debug!(object = ?target, "Decal culled on insertion");
            Ok(None)
        }
    }

    /// Insert an instance into its object's priority list (moving it if it
    /// is already there) and cull the object. Returns the evicted decals.
    pub fn add_decal(
        &mut self,
        key: InstanceKey,
        host: &mut dyn DecalHost,
    ) -> Result<Vec<InstanceKey>> {
        let instance = self.instances.get(key).ok_or(Error::InstanceNotFound(key))?;
        let (target, priority) = (instance.object, instance.priority);
        let object = self.objects.get_mut(target).ok_or(Error::ObjectNotFound(target))?;
        object.insert_decal(key, priority);
        self.cull_decals(target, host)
    }

    /// Evict decals while the object holds more than its maximum
    pub fn cull_decals(
        &mut self,
        object: ObjectKey,
        host: &mut dyn DecalHost,
    ) -> Result<Vec<InstanceKey>> {
        let entry = self.objects.get_mut(object).ok_or(Error::ObjectNotFound(object))?;
        let evicted = entry.take_excess(self.config.eviction);
        for &key in &evicted {
            tracing::debug!(object = ?object, instance = ?key, "Evicting decal over object limit");
            self.destroy_instance(key, host);
        }
        Ok(evicted.into_vec())
    }

    /// Remove a decal and release everything it allocated
    pub fn remove_decal(&mut self, key: InstanceKey, host: &mut dyn DecalHost) -> bool {
        let Some(instance) = self.instances.get(key) else {
            return false;
        };
        if let Some(object) = self.objects.get_mut(instance.object) {
            object.remove_decal(key);
        }
        self.destroy_instance(key, host)
    }

    pub fn instance(&self, key: InstanceKey) -> Option<&DecalInstance> {
        self.instances.get(key)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// (hits, misses) of the static extraction cache
    pub fn extraction_cache_stats(&self) -> (u64, u64) {
        self.extraction_cache.stats()
    }

    // ---- Instance mutation ----

    /// Change a decal's priority; may evict decals of its object
    pub fn set_priority(
        &mut self,
        key: InstanceKey,
        priority: i32,
        host: &mut dyn DecalHost,
    ) -> Result<Vec<InstanceKey>> {
        let instance = self.instances.get_mut(key).ok_or(Error::InstanceNotFound(key))?;
        instance.priority = priority;
        self.add_decal(key, host)
    }

    pub fn set_instance_enabled(
        &mut self,
        key: InstanceKey,
        enabled: bool,
        host: &mut dyn DecalHost,
    ) -> Result<()> {
        let instance = self.instances.get_mut(key).ok_or(Error::InstanceNotFound(key))?;
        if instance.enabled != enabled {
            instance.enabled = enabled;
            if !enabled {
                self.dispose_realizations(key, host);
            }
        }
        Ok(())
    }

    /// Change the tint; realizations are rebuilt on their next frame
    pub fn set_tint(
        &mut self,
        key: InstanceKey,
        tint: [f32; 4],
        host: &mut dyn DecalHost,
    ) -> Result<()> {
        let instance = self.instances.get_mut(key).ok_or(Error::InstanceNotFound(key))?;
        instance.tint = tint;
        self.dispose_realizations(key, host);
        Ok(())
    }

    /// Move a decal's projector and re-project it.
    ///
    /// Returns whether the decal still reaches its object. A decal that
    /// misses stays registered and draws nothing until it is moved back.
    pub fn update_projector(
        &mut self,
        key: InstanceKey,
        placement: Placement,
        host: &mut dyn DecalHost,
    ) -> Result<bool> {
        let volume = ProjectorVolume::new(placement)?;
        let instance = self.instances.get_mut(key).ok_or(Error::InstanceNotFound(key))?;
        let previous = std::mem::replace(&mut instance.volume, volume);

        self.dispose_realizations(key, host);
        self.extraction_cache.evict_where(|(instance, _)| *instance == key);

        let projections = match self.compute_projections(key, Vec::new()) {
            Ok(projections) => projections,
            Err(err) => {
                if let Some(instance) = self.instances.get_mut(key) {
                    instance.volume = previous;
                }
                let restored = self.compute_projections(key, Vec::new()).unwrap_or_default();
                if let Some(instance) = self.instances.get_mut(key) {
                    instance.projections = restored;
                }
                return Err(err);
            }
        };

        let reaches = self.reaches_object(key, &projections);
        if let Some(instance) = self.instances.get_mut(key) {
            instance.projections = projections;
        }
        Ok(reaches)
    }

    /// Bake a decal into standalone meshes, one per readable renderer it
    /// covers. Skinned renderers keep bone weights and blend shapes.
    pub fn bake(&mut self, key: InstanceKey) -> Result<Vec<BakedDecal>> {
        let instance = self.instances.get(key).ok_or(Error::InstanceNotFound(key))?;
        let object = self
            .objects
            .get(instance.object)
            .ok_or(Error::ObjectNotFound(instance.object))?;

        let mut baked = Vec::new();
        for (index, renderer) in object.renderers.iter().enumerate() {
            let mesh = match instance.projection(index) {
                Some(RendererProjection::Extracted(mesh)) => Some(mesh.clone()),
                Some(RendererProjection::Compacted(buffers)) => {
                    let mask = mask_for(&instance.submesh_mask, renderer.mesh.submesh_count());
                    let uvs = buffers.expand(renderer.mesh.vertex_count());
                    self.extraction_cache
                        .get_or_extract((key, index), || {
                            extract_static_mesh(&renderer.mesh, &uvs, &mask)
                        })?
                }
                Some(RendererProjection::Overlapping) | None => None,
            };

            if let Some(mesh) = mesh {
                baked.push(BakedDecal {
                    renderer: renderer.id,
                    transform: renderer.transform,
                    mesh,
                    material: instance.material.clone(),
                    tint: instance.tint,
                });
            }
        }

        tracing::debug!(instance = ?key, meshes = baked.len(), "Baked decal");
        Ok(baked)
    }

    // ---- Internals ----

    /// Clip the instance against every renderer of its object
    fn compute_projections(
        &mut self,
        key: InstanceKey,
        stored: Vec<(usize, CompactedUvBuffers)>,
    ) -> Result<Vec<Option<RendererProjection>>> {
        let instance = self.instances.get(key).ok_or(Error::InstanceNotFound(key))?;
        let object = self
            .objects
            .get(instance.object)
            .ok_or(Error::ObjectNotFound(instance.object))?;
        let renderers = &object.renderers;
        let volume_bounds = instance.volume.world_bounds();

        let masks: Vec<SubmeshMask> = renderers
            .iter()
            .map(|r| mask_for(&instance.submesh_mask, r.mesh.submesh_count()))
            .collect();
        let mut projections: Vec<Option<RendererProjection>> = vec![None; renderers.len()];

        for (index, buffers) in stored {
            match renderers.get(index) {
                Some(r)
                    if r.readable
                        && r.kind == RendererKind::Skinned
                        && buffers.valid_range().end <= r.mesh.vertex_count() =>
                {
                    projections[index] = Some(RendererProjection::Compacted(buffers));
                }
                _ => tracing::warn!(instance = ?key, renderer = index, "Ignoring stored uv buffers"),
            }
        }

        // Unreadable renderers only report overlap; readable ones outside
        // the projector bounds cannot be hit
        let mut to_clip = Vec::new();
        for (index, renderer) in renderers.iter().enumerate() {
            if projections[index].is_some() || !renderer.world_bounds().intersects(&volume_bounds) {
                continue;
            }
            if renderer.readable {
                to_clip.push(index);
            } else {
                projections[index] = Some(RendererProjection::Overlapping);
            }
        }

        let jobs: Vec<ProjectionJob<'_>> = to_clip
            .iter()
            .map(|&index| ProjectionJob {
                mesh: &renderers[index].mesh,
                world_transform: renderers[index].transform,
                mask: &masks[index],
            })
            .collect();
        let results = project_batch(&jobs, &instance.volume);

        for (&index, result) in to_clip.iter().zip(results) {
            let Some(uvs) = result? else {
                continue;
            };
            let renderer = &renderers[index];
            projections[index] = match renderer.kind {
                RendererKind::Skinned => compact(&uvs).map(RendererProjection::Compacted),
                RendererKind::Static => self
                    .extraction_cache
                    .get_or_extract((key, index), || {
                        extract_static_mesh(&renderer.mesh, &uvs, &masks[index])
                    })?
                    .map(RendererProjection::Extracted),
            };
        }

        Ok(projections)
    }

    /// Whether a decal with these projections draws anything on its object
    fn reaches_object(&self, key: InstanceKey, projections: &[Option<RendererProjection>]) -> bool {
        if projections.iter().any(Option::is_some) {
            return true;
        }
        let Some(instance) = self.instances.get(key) else {
            return false;
        };
        // Screen-space decals only need the volume to touch the object
        self.objects.get(instance.object).is_some_and(|object| {
            self.config.screen_space
                && object.allows_screen_space
                && object.bounds.intersects(&instance.volume.world_bounds())
        })
    }

    /// Drop an instance that never made it into its object's list
    fn discard(&mut self, key: InstanceKey) {
        self.instances.remove(key);
        self.extraction_cache.evict_where(|(instance, _)| *instance == key);
    }

    /// Release an instance's realizations and free its slot. The caller
    /// has already taken it out of its object's list.
    pub(crate) fn destroy_instance(&mut self, key: InstanceKey, host: &mut dyn DecalHost) -> bool {
        let Some(mut instance) = self.instances.remove(key) else {
            return false;
        };
        for camera in instance.dispose_all(host) {
            if let Some(entry) = self.cameras.get_mut(&camera) {
                entry.attached.remove(&key);
            }
        }
        self.extraction_cache.evict_where(|(instance, _)| *instance == key);
        true
    }

    /// Release every realization of an instance, keeping the instance
    pub(crate) fn dispose_realizations(&mut self, key: InstanceKey, host: &mut dyn DecalHost) {
        let Some(instance) = self.instances.get_mut(key) else {
            return;
        };
        for camera in instance.dispose_all(host) {
            if let Some(entry) = self.cameras.get_mut(&camera) {
                entry.attached.remove(&key);
            }
        }
    }
}

/// Restrict a mask to the submeshes a renderer actually has
pub(crate) fn mask_for(mask: &SubmeshMask, submesh_count: usize) -> SubmeshMask {
    SubmeshMask::excluding(
        mask.excluded()
            .iter()
            .copied()
            .filter(|&submesh| (submesh as usize) < submesh_count),
    )
}
