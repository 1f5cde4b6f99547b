// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for decal engine operations.

use crate::host::Technique;
use crate::keys::{CameraId, InstanceKey, ObjectKey};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while placing, dispatching or persisting decals.
///
/// "The decal misses the target" is not an error; operations report it as
/// `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Projection, mesh or mask validation failed.
    #[error("geometry error: {0}")]
    Geometry(#[from] decal_lite_geometry::Error),

    /// The target object is not registered.
    #[error("decal object not found: {0:?}")]
    ObjectNotFound(ObjectKey),

    /// The decal instance does not exist (removed, culled or never created).
    #[error("decal instance not found: {0:?}")]
    InstanceNotFound(InstanceKey),

    /// The camera is not part of the active camera set.
    #[error("camera not active: {0}")]
    CameraNotFound(CameraId),

    /// A decal needs a texture to be drawn.
    #[error("decal material has no texture")]
    MissingTexture,

    /// The material provider has no shader for a technique.
    #[error("no shader available for technique {0:?}")]
    MissingShader(Technique),

    /// The host could not allocate a GPU resource.
    #[error("GPU resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the error rejects a request because of bad input, as opposed
    /// to a failure while rendering.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Geometry(_) | Error::ObjectNotFound(_) | Error::MissingTexture
        )
    }
}
