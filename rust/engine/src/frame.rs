// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-frame driver.
//!
//! The host calls, in order:
//!
//! 1. [`DecalContext::begin_frame`] with the active cameras,
//! 2. [`DecalContext::mark_visible`] for every decal object a camera sees,
//! 3. [`DecalContext::render_camera`] to realize the visible decals.
//!
//! Realizations persist across frames; only decals that have none for the
//! camera are dispatched again.

use crate::camera::{CameraDiff, CameraEntry, CameraState};
use crate::camera_instance::DecalCameraInstance;
use crate::context::DecalContext;
use crate::error::{Error, Result};
use crate::host::DecalHost;
use crate::keys::{CameraId, InstanceKey, ObjectKey};
use crate::modes::ModeContext;
use rustc_hash::FxHashSet;

/// Counters for one [`DecalContext::render_camera`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Visible objects processed
    pub objects: usize,
    /// Camera instances created this frame
    pub dispatched: usize,
    /// Camera instances carried over from earlier frames
    pub reused: usize,
    /// Disabled decals plus renderers no mode applies to
    pub skipped: usize,
    /// Objects whose assembly failed
    pub faults: usize,
}

/// A failed object assembly, reported and then skipped
struct AssemblyFault {
    instance: Option<InstanceKey>,
    error: Error,
}

impl DecalContext {
    /// Diff the active cameras against the previous frame.
    ///
    /// Cameras that disappeared release all of their realizations, as do
    /// cameras whose rendering technique changed.
    pub fn begin_frame(&mut self, cameras: &[CameraState], host: &mut dyn DecalHost) -> CameraDiff {
        let mut diff = CameraDiff::default();
        let active: FxHashSet<CameraId> = cameras.iter().map(|camera| camera.id).collect();

        let removed: Vec<CameraId> = self
            .cameras
            .keys()
            .filter(|id| !active.contains(*id))
            .copied()
            .collect();
        for id in removed {
            diff.disposed += self.detach_camera(id, host);
            self.cameras.remove(&id);
            diff.removed += 1;
            tracing::debug!(camera = %id, "Camera deactivated");
        }

        for state in cameras {
            let previous = self.cameras.get(&state.id).map(|entry| entry.state);
            match previous {
                Some(previous) if previous.technique_differs(state) => {
                    diff.disposed += self.detach_camera(state.id, host);
                    diff.technique_changed += 1;
                    tracing::debug!(camera = %state.id, path = ?state.path, "Camera technique changed");
                }
                Some(_) => {}
                None => {
                    self.cameras.insert(state.id, CameraEntry::new(*state));
                    diff.added += 1;
                    continue;
                }
            }
            if let Some(entry) = self.cameras.get_mut(&state.id) {
                entry.state = *state;
            }
        }

        diff
    }

    /// Release every realization on a camera. The camera stays active and
    /// its decals are dispatched again on its next render.
    pub fn detach_camera(&mut self, camera: CameraId, host: &mut dyn DecalHost) -> usize {
        let Some(entry) = self.cameras.get_mut(&camera) else {
            return 0;
        };
        let attached: Vec<InstanceKey> = entry.attached.drain().collect();

        let mut disposed = 0;
        for key in attached {
            if let Some(instance) = self.instances.get_mut(key) {
                disposed += instance.dispose_camera(camera, host);
            }
        }
        disposed
    }

    pub fn is_camera_active(&self, camera: CameraId) -> bool {
        self.cameras.contains_key(&camera)
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// Mark an object visible for the next [`render_camera`](Self::render_camera).
    /// Returns false for unknown or disabled objects.
    pub fn mark_visible(&mut self, object: ObjectKey) -> bool {
        match self.objects.get(object) {
            Some(entry) if entry.enabled => {
                self.visible.insert(object);
                true
            }
            _ => false,
        }
    }

    /// Realize the decals of every visible object for one camera, then
    /// clear the visible set.
    ///
    /// A failing object is logged and counted in [`FrameStats::faults`];
    /// the remaining objects are still processed.
    pub fn render_camera(&mut self, camera: CameraId, host: &mut dyn DecalHost) -> Result<FrameStats> {
        // Drained up front so a failed pass never leaks into the next camera
        let mut visible: Vec<ObjectKey> = self.visible.drain().collect();
        let state = self
            .cameras
            .get(&camera)
            .map(|entry| entry.state)
            .ok_or(Error::CameraNotFound(camera))?;
        visible.sort_unstable();

        let mut stats = FrameStats::default();
        for object in visible {
            stats.objects += 1;
            if let Err(fault) = self.assemble_object(object, &state, host, &mut stats) {
                stats.faults += 1;
                let host_id = self.objects.get(object).map(|entry| entry.host_id);
                tracing::warn!(
                    object = ?object,
                    host_id = ?host_id,
                    instance = ?fault.instance,
                    camera = %camera,
                    error = %fault.error,
                    "Decal assembly failed, skipping object"
                );
            }
        }

        tracing::trace!(
            camera = %camera,
            objects = stats.objects,
            dispatched = stats.dispatched,
            reused = stats.reused,
            faults = stats.faults,
            "Rendered decals"
        );
        Ok(stats)
    }

    fn assemble_object(
        &mut self,
        object_key: ObjectKey,
        camera: &CameraState,
        host: &mut dyn DecalHost,
        stats: &mut FrameStats,
    ) -> std::result::Result<(), AssemblyFault> {
        let Some(object) = self.objects.get(object_key) else {
            return Err(AssemblyFault {
                instance: None,
                error: Error::ObjectNotFound(object_key),
            });
        };
        if !object.enabled {
            return Ok(());
        }

        for instance_key in object.decals() {
            let Some(instance) = self.instances.get(instance_key) else {
                return Err(AssemblyFault {
                    instance: Some(instance_key),
                    error: Error::InstanceNotFound(instance_key),
                });
            };
            if !instance.enabled {
                stats.skipped += 1;
                continue;
            }

            let mut created: Vec<DecalCameraInstance> = Vec::new();
            for (renderer_index, renderer) in object.renderers.iter().enumerate() {
                if instance
                    .camera_instances
                    .contains_key(&(camera.id, renderer_index))
                {
                    stats.reused += 1;
                    continue;
                }

                let ctx = ModeContext {
                    instance_key,
                    instance,
                    object,
                    camera,
                    renderer_index,
                    renderer,
                    config: &self.config,
                };
                match self.dispatcher.dispatch(&ctx, host) {
                    Ok(Some(realization)) => created.push(realization),
                    Ok(None) => stats.skipped += 1,
                    Err(error) => {
                        for realization in created {
                            realization.dispose(host);
                        }
                        return Err(AssemblyFault {
                            instance: Some(instance_key),
                            error,
                        });
                    }
                }
            }

            if created.is_empty() {
                continue;
            }
            stats.dispatched += created.len();
            if let Some(entry) = self.cameras.get_mut(&camera.id) {
                entry.attached.insert(instance_key);
            }
            if let Some(instance) = self.instances.get_mut(instance_key) {
                for realization in created {
                    instance
                        .camera_instances
                        .insert((realization.camera(), realization.renderer()), realization);
                }
            }
        }

        Ok(())
    }
}
