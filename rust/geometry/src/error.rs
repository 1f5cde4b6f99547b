// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during decal projection and packing.
///
/// A projector that simply misses the target is not an error; those paths
/// return `None`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid projector placement: {0}")]
    InvalidProjector(String),

    #[error("Submesh {index} out of range (mesh has {count} submeshes)")]
    SubmeshOutOfRange { index: usize, count: usize },

    #[error("Vertex index {index} out of range (mesh has {vertex_count} vertices)")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}
