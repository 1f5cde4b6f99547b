// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Decal-Lite Engine
//!
//! Registry and per-camera realization of decals built on
//! `decal-lite-geometry`.
//!
//! A [`DecalContext`] owns decal targets ([`DecalObject`]), the decals
//! placed on them ([`DecalInstance`]) and the active cameras. For every
//! (decal, camera, renderer) triple the [`ModeDispatcher`] picks one
//! drawing strategy and builds a [`DecalCameraInstance`] that owns the GPU
//! resources it allocated through the host's [`DecalHost`] implementation.
//!
//! ```no_run
//! use decal_lite_engine::{
//!     CameraId, CameraState, DecalConfig, DecalContext, DecalMaterial, HeadlessHost,
//!     ObjectDesc, ProjectionRequest, TextureHandle,
//! };
//! use decal_lite_geometry::Placement;
//!
//! # fn run(desc: ObjectDesc, placement: Placement) -> decal_lite_engine::Result<()> {
//! let mut host = HeadlessHost::new();
//! let mut context = DecalContext::new(DecalConfig::from_env());
//! let wall = context.register_object(desc)?;
//! context.project(
//!     ProjectionRequest::new(wall, placement, DecalMaterial::new(TextureHandle(1))),
//!     &mut host,
//! )?;
//!
//! let camera = CameraState::deferred(CameraId(0));
//! context.begin_frame(&[camera], &mut host);
//! context.mark_visible(wall);
//! let stats = context.render_camera(camera.id, &mut host)?;
//! # let _ = stats;
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod camera_instance;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod headless;
pub mod host;
pub mod instance;
pub mod keys;
pub mod modes;
pub mod object;
pub mod ordered;
pub mod persistence;

pub use camera::{CameraDiff, CameraState, RenderingPath};
pub use camera_instance::DecalCameraInstance;
pub use config::{DecalConfig, EvictionPolicy};
pub use context::{BakedDecal, DecalContext};
pub use error::{Error, Result};
pub use frame::FrameStats;
pub use headless::HeadlessHost;
pub use host::params;
pub use host::{
    BufferHandle, CommandHandle, CommandStage, DecalHost, DrawCommand, DrawGeometry,
    MaterialHandle, MaterialProvider, ParamValue, ParameterBlock, RenderHost, ShaderHandle,
    Technique, TextureHandle,
};
pub use instance::{DecalInstance, DecalMaterial, ProjectionRequest, RendererProjection};
pub use keys::{CameraId, InstanceKey, ObjectKey, RendererId};
pub use modes::{Mode, ModeContext, ModeDispatcher, ModeKind};
pub use object::{DecalObject, ObjectDesc, RendererDesc, RendererKind};
pub use ordered::PriorityList;
pub use persistence::{ContextSnapshot, DecalSnapshot, RestoreReport, SkinnedUvSnapshot};
