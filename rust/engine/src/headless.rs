// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory [`DecalHost`](crate::DecalHost) implementation.
//!
//! Keeps every buffer, material and command in hash maps instead of on a
//! GPU. Useful for servers that only bake decals, and for tests: live
//! resource counts expose leaks, and a buffer budget simulates exhaustion.

use crate::error::{Error, Result};
use crate::host::{
    BufferHandle, CommandHandle, CommandStage, DrawCommand, MaterialHandle, MaterialProvider,
    ParamValue, ParameterBlock, RenderHost, ShaderHandle, Technique,
};
use crate::keys::CameraId;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub camera: CameraId,
    pub stage: CommandStage,
    pub command: DrawCommand,
}

#[derive(Debug, Default)]
pub struct HeadlessHost {
    next_handle: u64,
    shaders: FxHashMap<Technique, ShaderHandle>,
    buffers: FxHashMap<BufferHandle, Vec<f32>>,
    materials: FxHashMap<MaterialHandle, ParameterBlock>,
    commands: FxHashMap<CommandHandle, RecordedCommand>,
    /// Maximum number of floats alive across all buffers
    buffer_budget: Option<usize>,
}

impl HeadlessHost {
    /// Host with a shader for every technique and no buffer budget
    pub fn new() -> Self {
        let mut host = Self::default();
        for technique in Technique::ALL {
            let shader = ShaderHandle(host.next_id());
            host.shaders.insert(technique, shader);
        }
        host
    }

    /// Drop support for a technique
    pub fn without_shader(mut self, technique: Technique) -> Self {
        self.shaders.remove(&technique);
        self
    }

    /// Fail buffer creation once `floats` floats are alive
    pub fn with_buffer_budget(mut self, floats: usize) -> Self {
        self.buffer_budget = Some(floats);
        self
    }

    pub fn set_buffer_budget(&mut self, floats: Option<usize>) {
        self.buffer_budget = floats;
    }

    fn next_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn live_commands(&self) -> usize {
        self.commands.len()
    }

    /// True when nothing allocated through this host is still alive
    pub fn is_idle(&self) -> bool {
        self.buffers.is_empty() && self.materials.is_empty() && self.commands.is_empty()
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&[f32]> {
        self.buffers.get(&handle).map(Vec::as_slice)
    }

    pub fn material_params(&self, handle: MaterialHandle) -> Option<&ParameterBlock> {
        self.materials.get(&handle)
    }

    /// Commands currently registered for a camera
    pub fn commands_for(&self, camera: CameraId) -> Vec<&RecordedCommand> {
        self.commands
            .values()
            .filter(|recorded| recorded.camera == camera)
            .collect()
    }

    fn live_floats(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }
}

impl RenderHost for HeadlessHost {
    fn create_compute_buffer(&mut self, data: &[f32], stride: usize) -> Result<BufferHandle> {
        if stride == 0 || data.len() % stride != 0 {
            return Err(Error::ResourceExhausted(format!(
                "buffer of {} floats is not a multiple of stride {stride}",
                data.len()
            )));
        }
        if let Some(budget) = self.buffer_budget {
            if self.live_floats() + data.len() > budget {
                return Err(Error::ResourceExhausted(format!(
                    "buffer budget of {budget} floats exceeded"
                )));
            }
        }
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(handle, data.to_vec());
        Ok(handle)
    }

    fn release_compute_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            tracing::warn!(buffer = buffer.0, "Released unknown compute buffer");
        }
    }

    fn register_command(
        &mut self,
        camera: CameraId,
        stage: CommandStage,
        command: DrawCommand,
    ) -> CommandHandle {
        let handle = CommandHandle(self.next_id());
        self.commands.insert(
            handle,
            RecordedCommand {
                camera,
                stage,
                command,
            },
        );
        handle
    }

    fn unregister_command(&mut self, camera: CameraId, stage: CommandStage, command: CommandHandle) {
        match self.commands.remove(&command) {
            Some(recorded) if recorded.camera == camera && recorded.stage == stage => {}
            Some(_) => {
                tracing::warn!(command = command.0, camera = %camera, "Command unregistered from wrong camera or stage")
            }
            None => tracing::warn!(command = command.0, "Unregistered unknown command"),
        }
    }
}

impl MaterialProvider for HeadlessHost {
    fn shader(&self, technique: Technique) -> Option<ShaderHandle> {
        self.shaders.get(&technique).copied()
    }

    fn create_material(&mut self, _shader: ShaderHandle) -> Result<MaterialHandle> {
        let handle = MaterialHandle(self.next_id());
        self.materials.insert(handle, ParameterBlock::new());
        Ok(handle)
    }

    fn destroy_material(&mut self, material: MaterialHandle) {
        if self.materials.remove(&material).is_none() {
            tracing::warn!(material = material.0, "Destroyed unknown material");
        }
    }

    fn set_material_param(&mut self, material: MaterialHandle, name: &'static str, value: ParamValue) {
        if let Some(block) = self.materials.get_mut(&material) {
            block.set(name, value);
        }
    }
}
