// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-camera realization of a decal.
//!
//! A [`DecalCameraInstance`] owns every host resource allocated to draw
//! one decal on one renderer for one camera. Resources are tracked as they
//! are allocated, so a partially built realization can be torn down with
//! the same [`dispose`](DecalCameraInstance::dispose) call as a complete one.

use crate::error::Result;
use crate::host::{
    BufferHandle, CommandHandle, CommandStage, DecalHost, DrawCommand, MaterialHandle,
    ShaderHandle,
};
use crate::keys::CameraId;
use crate::modes::ModeKind;
use smallvec::SmallVec;

#[derive(Debug)]
pub struct DecalCameraInstance {
    camera: CameraId,
    renderer: usize,
    mode: ModeKind,
    buffers: SmallVec<[BufferHandle; 2]>,
    materials: SmallVec<[MaterialHandle; 1]>,
    commands: SmallVec<[(CommandStage, CommandHandle); 2]>,
}

impl DecalCameraInstance {
    pub fn new(camera: CameraId, renderer: usize, mode: ModeKind) -> Self {
        Self {
            camera,
            renderer,
            mode,
            buffers: SmallVec::new(),
            materials: SmallVec::new(),
            commands: SmallVec::new(),
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    /// Index of the renderer within the target object
    pub fn renderer(&self) -> usize {
        self.renderer
    }

    pub fn mode(&self) -> ModeKind {
        self.mode
    }

    pub fn buffers(&self) -> &[BufferHandle] {
        &self.buffers
    }

    pub fn materials(&self) -> &[MaterialHandle] {
        &self.materials
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Upload a compute buffer owned by this realization
    pub fn create_buffer(
        &mut self,
        host: &mut dyn DecalHost,
        data: &[f32],
        stride: usize,
    ) -> Result<BufferHandle> {
        let handle = host.create_compute_buffer(data, stride)?;
        self.buffers.push(handle);
        Ok(handle)
    }

    /// Create a material instance owned by this realization
    pub fn create_material(
        &mut self,
        host: &mut dyn DecalHost,
        shader: ShaderHandle,
    ) -> Result<MaterialHandle> {
        let handle = host.create_material(shader)?;
        self.materials.push(handle);
        Ok(handle)
    }

    /// Register a command on this realization's camera
    pub fn register_command(
        &mut self,
        host: &mut dyn DecalHost,
        stage: CommandStage,
        command: DrawCommand,
    ) -> CommandHandle {
        let handle = host.register_command(self.camera, stage, command);
        self.commands.push((stage, handle));
        handle
    }

    /// Release everything this realization allocated
    pub fn dispose(self, host: &mut dyn DecalHost) {
        for (stage, command) in self.commands {
            host.unregister_command(self.camera, stage, command);
        }
        for buffer in self.buffers {
            host.release_compute_buffer(buffer);
        }
        for material in self.materials {
            host.destroy_material(material);
        }
    }
}
