// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host rendering interface.
//!
//! The engine never talks to a graphics API. Everything it needs from the
//! host (compute buffers, material instances, per-camera draw commands)
//! goes through [`RenderHost`] and [`MaterialProvider`]. Handles are opaque
//! ids chosen by the host.

use crate::error::Result;
use crate::keys::{CameraId, RendererId};
use decal_lite_geometry::Mesh;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHandle(pub u64);

/// Shading technique a decal is drawn with; each maps to one host shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Technique {
    ScreenSpace,
    DeferredStatic,
    DeferredSkinned,
    WholeObject,
    ForwardStatic,
    ForwardSkinned,
}

impl Technique {
    pub const ALL: [Technique; 6] = [
        Technique::ScreenSpace,
        Technique::DeferredStatic,
        Technique::DeferredSkinned,
        Technique::WholeObject,
        Technique::ForwardStatic,
        Technique::ForwardSkinned,
    ];
}

/// Point in a camera's frame where a command executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandStage {
    /// After the G-buffer is filled, before lighting reads it
    AfterGBuffer,
    /// Screen-space decals blend into the G-buffer here
    BeforeLighting,
    /// After opaque forward geometry
    AfterForwardOpaque,
}

/// Shader parameter names written by the engine
pub mod params {
    pub const DECAL_TEXTURE: &str = "_DecalTex";
    pub const NORMAL_TEXTURE: &str = "_DecalNormalTex";
    pub const TINT: &str = "_DecalTint";
    pub const OPACITY: &str = "_DecalOpacity";
    pub const WORLD_TO_DECAL: &str = "_WorldToDecal";
    pub const NEAR_UVS: &str = "_DecalNearUvs";
    pub const FAR_UVS: &str = "_DecalFarUvs";
    pub const NEAR_OFFSET: &str = "_DecalNearOffset";
    pub const FAR_OFFSET: &str = "_DecalFarOffset";
    pub const NEAR_COUNT: &str = "_DecalNearCount";
    pub const FAR_COUNT: &str = "_DecalFarCount";
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Texture(TextureHandle),
    Buffer(BufferHandle),
    Matrix(Matrix4<f32>),
    Color([f32; 4]),
    Float(f32),
    Uint(u32),
}

/// Named parameters attached to a single draw
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBlock {
    values: SmallVec<[(&'static str, ParamValue); 8]>,
}

impl ParameterBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value under the same name
    pub fn set(&mut self, name: &'static str, value: ParamValue) {
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> + '_ {
        self.values.iter().map(|(n, v)| (*n, v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Geometry a draw command rasterizes
#[derive(Debug, Clone)]
pub enum DrawGeometry {
    /// The projector's unit cube (screen-space decals)
    UnitCube,
    /// A scene renderer redrawn with the decal shader, skinning included
    Renderer { id: RendererId, submesh: usize },
    /// An engine-built mesh
    Mesh(Arc<Mesh>),
}

#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub geometry: DrawGeometry,
    /// Object-to-world transform for the draw
    pub transform: Matrix4<f32>,
    pub shader: ShaderHandle,
    /// Persistent material instance, when the draw uses one
    pub material: Option<MaterialHandle>,
    pub params: ParameterBlock,
}

/// GPU resources and per-camera command lists
pub trait RenderHost {
    /// Upload `data` as a structured buffer of `stride`-float elements.
    /// Fails with [`Error::ResourceExhausted`](crate::Error::ResourceExhausted)
    /// when the host is out of buffer memory.
    fn create_compute_buffer(&mut self, data: &[f32], stride: usize) -> Result<BufferHandle>;

    fn release_compute_buffer(&mut self, buffer: BufferHandle);

    /// Append a command to a camera's command list at `stage`
    fn register_command(
        &mut self,
        camera: CameraId,
        stage: CommandStage,
        command: DrawCommand,
    ) -> CommandHandle;

    fn unregister_command(&mut self, camera: CameraId, stage: CommandStage, command: CommandHandle);
}

/// Shaders and persistent material instances
pub trait MaterialProvider {
    /// Shader for a technique, if the host supports it
    fn shader(&self, technique: Technique) -> Option<ShaderHandle>;

    fn create_material(&mut self, shader: ShaderHandle) -> Result<MaterialHandle>;

    fn destroy_material(&mut self, material: MaterialHandle);

    fn set_material_param(&mut self, material: MaterialHandle, name: &'static str, value: ParamValue);
}

/// Everything the engine needs from a host
pub trait DecalHost: RenderHost + MaterialProvider {}

impl<T: RenderHost + MaterialProvider + ?Sized> DecalHost for T {}
