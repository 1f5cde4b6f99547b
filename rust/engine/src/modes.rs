// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mode Dispatcher - per-camera choice of how a decal is drawn
//!
//! A [`Mode`] pairs a predicate with a constructor. The dispatcher keeps
//! modes sorted by ascending priority and realizes a decal with the first
//! mode whose predicate holds for the (instance, camera, renderer) triple.
//! The built-in predicates are mutually exclusive, so the priority order
//! only matters for modes registered by the host.

use crate::camera::{CameraState, RenderingPath};
use crate::camera_instance::DecalCameraInstance;
use crate::config::DecalConfig;
use crate::error::{Error, Result};
use crate::host::{
    params, CommandStage, DecalHost, DrawCommand, DrawGeometry, ParamValue, ParameterBlock,
    ShaderHandle, Technique,
};
use crate::instance::{DecalInstance, RendererProjection};
use crate::keys::InstanceKey;
use crate::object::{DecalObject, RendererDesc, RendererKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    ScreenSpace,
    StaticDeferred,
    SkinnedDeferred,
    /// Fallback that re-expresses an unreadable renderer with a decal material
    WholeObject,
    StaticForward,
    SkinnedForward,
    /// Host-registered mode
    Custom(u32),
}

/// Everything a mode may look at when deciding and constructing
pub struct ModeContext<'a> {
    pub instance_key: InstanceKey,
    pub instance: &'a DecalInstance,
    pub object: &'a DecalObject,
    pub camera: &'a CameraState,
    pub renderer_index: usize,
    pub renderer: &'a RendererDesc,
    pub config: &'a DecalConfig,
}

impl ModeContext<'_> {
    pub fn projection(&self) -> Option<&RendererProjection> {
        self.instance.projection(self.renderer_index)
    }

    /// Screen-space decals win on deferred cameras when everyone allows them
    pub fn screen_space(&self) -> bool {
        self.config.screen_space
            && self.camera.path == RenderingPath::Deferred
            && self.camera.screen_space_capable
            && self.object.allows_screen_space()
    }

    fn is_deferred(&self) -> bool {
        self.camera.path == RenderingPath::Deferred
    }

    fn is_forward(&self) -> bool {
        self.camera.path == RenderingPath::Forward
    }

    fn has_extracted(&self) -> bool {
        matches!(self.projection(), Some(RendererProjection::Extracted(_)))
    }

    fn has_compacted(&self) -> bool {
        matches!(self.projection(), Some(RendererProjection::Compacted(_)))
    }
}

pub type Predicate = fn(&ModeContext<'_>) -> bool;
pub type Constructor = fn(&ModeContext<'_>, &mut dyn DecalHost) -> Result<DecalCameraInstance>;

/// Tagged drawing strategy
#[derive(Clone, Copy)]
pub struct Mode {
    pub kind: ModeKind,
    /// Lower runs first
    pub priority: u32,
    pub applies: Predicate,
    pub construct: Constructor,
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mode")
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Mode {
    pub const fn new(kind: ModeKind, priority: u32, applies: Predicate, construct: Constructor) -> Self {
        Self {
            kind,
            priority,
            applies,
            construct,
        }
    }

    /// The six built-in modes in priority order
    pub fn builtin() -> [Mode; 6] {
        [
            Mode::new(ModeKind::ScreenSpace, 0, screen_space_applies, construct_screen_space),
            Mode::new(ModeKind::StaticDeferred, 10, static_deferred_applies, construct_static),
            Mode::new(ModeKind::SkinnedDeferred, 20, skinned_deferred_applies, construct_skinned),
            Mode::new(ModeKind::WholeObject, 30, whole_object_applies, construct_whole_object),
            Mode::new(ModeKind::StaticForward, 40, static_forward_applies, construct_static),
            Mode::new(ModeKind::SkinnedForward, 50, skinned_forward_applies, construct_skinned),
        ]
    }
}

/// Ordered list of modes
#[derive(Debug, Clone)]
pub struct ModeDispatcher {
    modes: Vec<Mode>,
}

impl Default for ModeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeDispatcher {
    /// Dispatcher with the built-in modes
    pub fn new() -> Self {
        let mut dispatcher = Self::empty();
        for mode in Mode::builtin() {
            dispatcher.register(mode);
        }
        dispatcher
    }

    pub fn empty() -> Self {
        Self { modes: Vec::new() }
    }

    /// Register a mode. A mode of the same kind is replaced; otherwise the
    /// mode goes after every mode of equal or lower priority.
    pub fn register(&mut self, mode: Mode) {
        self.modes.retain(|m| m.kind != mode.kind);
        let pos = self.modes.partition_point(|m| m.priority <= mode.priority);
        self.modes.insert(pos, mode);
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    /// First applicable mode
    pub fn select(&self, ctx: &ModeContext<'_>) -> Option<&Mode> {
        self.modes.iter().find(|mode| (mode.applies)(ctx))
    }

    /// Every applicable mode, in priority order
    pub fn matching(&self, ctx: &ModeContext<'_>) -> Vec<&Mode> {
        self.modes.iter().filter(|mode| (mode.applies)(ctx)).collect()
    }

    /// Realize a decal with the first applicable mode.
    ///
    /// `Ok(None)` means no mode applies and nothing was allocated.
    pub fn dispatch(
        &self,
        ctx: &ModeContext<'_>,
        host: &mut dyn DecalHost,
    ) -> Result<Option<DecalCameraInstance>> {
        let Some(mode) = self.select(ctx) else {
            return Ok(None);
        };
        tracing::trace!(
            mode = ?mode.kind,
            camera = %ctx.camera.id,
            instance = ?ctx.instance_key,
            renderer = ctx.renderer_index,
            "Dispatching decal"
        );
        (mode.construct)(ctx, host).map(Some)
    }
}

// Predicates

fn screen_space_applies(ctx: &ModeContext<'_>) -> bool {
    // The projector cube is drawn once per camera, not once per renderer
    ctx.screen_space() && ctx.renderer_index == 0
}

fn static_deferred_applies(ctx: &ModeContext<'_>) -> bool {
    ctx.is_deferred()
        && !ctx.screen_space()
        && ctx.renderer.kind == RendererKind::Static
        && ctx.has_extracted()
}

fn skinned_deferred_applies(ctx: &ModeContext<'_>) -> bool {
    ctx.is_deferred()
        && !ctx.screen_space()
        && ctx.renderer.kind == RendererKind::Skinned
        && ctx.has_compacted()
}

fn whole_object_applies(ctx: &ModeContext<'_>) -> bool {
    !ctx.screen_space()
        && ctx.config.whole_object_fallback
        && !ctx.renderer.readable
        && matches!(ctx.projection(), Some(RendererProjection::Overlapping))
}

fn static_forward_applies(ctx: &ModeContext<'_>) -> bool {
    ctx.is_forward() && ctx.renderer.kind == RendererKind::Static && ctx.has_extracted()
}

fn skinned_forward_applies(ctx: &ModeContext<'_>) -> bool {
    ctx.is_forward() && ctx.renderer.kind == RendererKind::Skinned && ctx.has_compacted()
}

// Constructors

/// Build a realization, disposing whatever was allocated if `build` fails
fn assemble(
    ctx: &ModeContext<'_>,
    host: &mut dyn DecalHost,
    kind: ModeKind,
    build: impl FnOnce(&mut DecalCameraInstance, &mut dyn DecalHost) -> Result<()>,
) -> Result<DecalCameraInstance> {
    let mut realization = DecalCameraInstance::new(ctx.camera.id, ctx.renderer_index, kind);
    match build(&mut realization, &mut *host) {
        Ok(()) => Ok(realization),
        Err(err) => {
            realization.dispose(host);
            Err(err)
        }
    }
}

fn shader_for(host: &dyn DecalHost, technique: Technique) -> Result<ShaderHandle> {
    host.shader(technique).ok_or(Error::MissingShader(technique))
}

/// Texture, tint and opacity shared by every technique
fn material_params(ctx: &ModeContext<'_>) -> Result<ParameterBlock> {
    let material = &ctx.instance.material;
    let texture = material.texture.ok_or(Error::MissingTexture)?;
    let mut block = ParameterBlock::new();
    block.set(params::DECAL_TEXTURE, ParamValue::Texture(texture));
    if let Some(normal) = material.normal_map {
        block.set(params::NORMAL_TEXTURE, ParamValue::Texture(normal));
    }
    block.set(params::TINT, ParamValue::Color(ctx.instance.tint));
    block.set(params::OPACITY, ParamValue::Float(material.opacity));
    Ok(block)
}

fn mesh_stage(ctx: &ModeContext<'_>) -> CommandStage {
    match ctx.camera.path {
        RenderingPath::Deferred => CommandStage::AfterGBuffer,
        RenderingPath::Forward => CommandStage::AfterForwardOpaque,
    }
}

/// Submeshes of the renderer the decal may draw on
fn drawable_submeshes(ctx: &ModeContext<'_>) -> Vec<usize> {
    (0..ctx.renderer.mesh.submesh_count())
        .filter(|&s| !ctx.instance.submesh_mask.is_excluded(s))
        .collect()
}

fn construct_screen_space(
    ctx: &ModeContext<'_>,
    host: &mut dyn DecalHost,
) -> Result<DecalCameraInstance> {
    let shader = shader_for(host, Technique::ScreenSpace)?;
    let mut block = material_params(ctx)?;
    block.set(
        params::WORLD_TO_DECAL,
        ParamValue::Matrix(*ctx.instance.volume.world_to_local()),
    );

    assemble(ctx, host, ModeKind::ScreenSpace, |realization, host| {
        realization.register_command(
            host,
            CommandStage::BeforeLighting,
            DrawCommand {
                geometry: DrawGeometry::UnitCube,
                transform: *ctx.instance.volume.local_to_world(),
                shader,
                material: None,
                params: block,
            },
        );
        Ok(())
    })
}

fn construct_static(ctx: &ModeContext<'_>, host: &mut dyn DecalHost) -> Result<DecalCameraInstance> {
    let (kind, technique) = match ctx.camera.path {
        RenderingPath::Deferred => (ModeKind::StaticDeferred, Technique::DeferredStatic),
        RenderingPath::Forward => (ModeKind::StaticForward, Technique::ForwardStatic),
    };
    let Some(RendererProjection::Extracted(mesh)) = ctx.projection() else {
        return Err(Error::InstanceNotFound(ctx.instance_key));
    };
    let shader = shader_for(host, technique)?;
    let block = material_params(ctx)?;

    assemble(ctx, host, kind, |realization, host| {
        realization.register_command(
            host,
            mesh_stage(ctx),
            DrawCommand {
                geometry: DrawGeometry::Mesh(mesh.clone()),
                transform: ctx.renderer.transform,
                shader,
                material: None,
                params: block,
            },
        );
        Ok(())
    })
}

fn construct_skinned(ctx: &ModeContext<'_>, host: &mut dyn DecalHost) -> Result<DecalCameraInstance> {
    let (kind, technique) = match ctx.camera.path {
        RenderingPath::Deferred => (ModeKind::SkinnedDeferred, Technique::DeferredSkinned),
        RenderingPath::Forward => (ModeKind::SkinnedForward, Technique::ForwardSkinned),
    };
    let Some(RendererProjection::Compacted(buffers)) = ctx.projection() else {
        return Err(Error::InstanceNotFound(ctx.instance_key));
    };
    let shader = shader_for(host, technique)?;
    let mut block = material_params(ctx)?;
    block.set(params::NEAR_OFFSET, ParamValue::Uint(to_u32(buffers.near_offset)?));
    block.set(params::FAR_OFFSET, ParamValue::Uint(to_u32(buffers.far_offset)?));
    block.set(params::NEAR_COUNT, ParamValue::Uint(to_u32(buffers.near.len())?));
    block.set(params::FAR_COUNT, ParamValue::Uint(to_u32(buffers.far.len())?));

    assemble(ctx, host, kind, |realization, host| {
        let near = realization.create_buffer(host, &buffers.near_floats(), 3)?;
        block.set(params::NEAR_UVS, ParamValue::Buffer(near));
        if !buffers.far.is_empty() {
            let far = realization.create_buffer(host, &buffers.far_floats(), 3)?;
            block.set(params::FAR_UVS, ParamValue::Buffer(far));
        }

        for submesh in drawable_submeshes(ctx) {
            realization.register_command(
                host,
                mesh_stage(ctx),
                DrawCommand {
                    geometry: DrawGeometry::Renderer {
                        id: ctx.renderer.id,
                        submesh,
                    },
                    transform: ctx.renderer.transform,
                    shader,
                    material: None,
                    params: block.clone(),
                },
            );
        }
        Ok(())
    })
}

fn construct_whole_object(
    ctx: &ModeContext<'_>,
    host: &mut dyn DecalHost,
) -> Result<DecalCameraInstance> {
    let shader = shader_for(host, Technique::WholeObject)?;
    let mut block = material_params(ctx)?;
    block.set(
        params::WORLD_TO_DECAL,
        ParamValue::Matrix(*ctx.instance.volume.world_to_local()),
    );

    assemble(ctx, host, ModeKind::WholeObject, |realization, host| {
        let material = realization.create_material(host, shader)?;
        for (name, value) in block.iter() {
            host.set_material_param(material, name, value.clone());
        }
        for submesh in drawable_submeshes(ctx) {
            realization.register_command(
                host,
                mesh_stage(ctx),
                DrawCommand {
                    geometry: DrawGeometry::Renderer {
                        id: ctx.renderer.id,
                        submesh,
                    },
                    transform: ctx.renderer.transform,
                    shader,
                    material: Some(material),
                    params: ParameterBlock::new(),
                },
            );
        }
        Ok(())
    })
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::ResourceExhausted(format!("uv range {value} exceeds shader index range")))
}
