// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decal-Lite Geometry
//!
//! Projection and packing of decals onto triangle meshes: oriented-box
//! clipping with per-vertex UVs, index-aligned UV buffer compaction for
//! skinned meshes, and static mesh extraction for baked decals.

pub mod bounds;
pub mod cache;
pub mod clipper;
pub mod compactor;
pub mod error;
pub mod extractor;
pub mod mask;
pub mod mesh;
pub mod projector;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

pub use bounds::Aabb;
pub use cache::ExtractionCache;
pub use clipper::{clip_triangles, project_batch, project_mesh, ProjectedUv, ProjectionJob};
pub use compactor::{compact, CompactedUvBuffers};
pub use error::{Error, Result};
pub use extractor::extract_static_mesh;
pub use mask::SubmeshMask;
pub use mesh::{BlendShape, BlendShapeFrame, BoneWeight, Mesh, SubMeshRange};
pub use projector::{Placement, Plane, ProjectorVolume};
