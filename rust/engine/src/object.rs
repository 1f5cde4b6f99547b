// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surfaces that accept decals.

use crate::config::EvictionPolicy;
use crate::host::MaterialHandle;
use crate::keys::{InstanceKey, RendererId};
use crate::ordered::PriorityList;
use decal_lite_geometry::{Aabb, Mesh};
use nalgebra::Matrix4;
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    /// Rigid mesh; decals are extracted into standalone geometry
    Static,
    /// Skinned or blend-shaped mesh; decals keep the source vertex order
    Skinned,
}

/// One renderer of a decal target
#[derive(Debug, Clone)]
pub struct RendererDesc {
    pub id: RendererId,
    pub kind: RendererKind,
    pub mesh: Arc<Mesh>,
    /// Mesh-local to world
    pub transform: Matrix4<f32>,
    /// Whether mesh data can be read on the CPU. Unreadable renderers can
    /// only receive whole-object decals.
    pub readable: bool,
    pub materials: Vec<MaterialHandle>,
}

impl RendererDesc {
    pub fn new(id: RendererId, kind: RendererKind, mesh: Arc<Mesh>, transform: Matrix4<f32>) -> Self {
        Self {
            id,
            kind,
            mesh,
            transform,
            readable: true,
            materials: Vec::new(),
        }
    }

    pub fn unreadable(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn world_bounds(&self) -> Aabb {
        self.mesh.bounds().transformed(&self.transform)
    }
}

/// Registration request for a decal target
#[derive(Debug, Clone)]
pub struct ObjectDesc {
    /// Host-side identity; used to re-attach persisted decals
    pub host_id: u64,
    pub renderers: Vec<RendererDesc>,
    /// Screen-space decals are opt-in per object
    pub allows_screen_space: bool,
    /// Overrides the configured per-object maximum
    pub max_decals: Option<i32>,
}

impl ObjectDesc {
    pub fn new(host_id: u64, renderers: Vec<RendererDesc>) -> Self {
        Self {
            host_id,
            renderers,
            allows_screen_space: false,
            max_decals: None,
        }
    }

    pub fn with_screen_space(mut self, allowed: bool) -> Self {
        self.allows_screen_space = allowed;
        self
    }

    pub fn with_max_decals(mut self, max: i32) -> Self {
        self.max_decals = Some(max);
        self
    }
}

/// Registry entry for a decal target
#[derive(Debug, Clone)]
pub struct DecalObject {
    pub(crate) host_id: u64,
    pub(crate) renderers: Vec<RendererDesc>,
    pub(crate) bounds: Aabb,
    pub(crate) allows_screen_space: bool,
    pub(crate) enabled: bool,
    pub(crate) max_decals: i32,
    pub(crate) decals: PriorityList<InstanceKey>,
}

impl DecalObject {
    pub(crate) fn from_desc(desc: ObjectDesc, default_max: i32) -> Self {
        let mut bounds = Aabb::empty();
        for renderer in &desc.renderers {
            let rb = renderer.world_bounds();
            if !rb.is_empty() {
                bounds.grow(&rb.min);
                bounds.grow(&rb.max);
            }
        }
        Self {
            host_id: desc.host_id,
            renderers: desc.renderers,
            bounds,
            allows_screen_space: desc.allows_screen_space,
            enabled: true,
            max_decals: desc.max_decals.unwrap_or(default_max),
            decals: PriorityList::new(),
        }
    }

    pub fn host_id(&self) -> u64 {
        self.host_id
    }

    pub fn renderers(&self) -> &[RendererDesc] {
        &self.renderers
    }

    /// World bounds of all renderers
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn allows_screen_space(&self) -> bool {
        self.allows_screen_space
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Negative means unbounded
    pub fn max_decals(&self) -> i32 {
        self.max_decals
    }

    /// Decals in ascending priority
    pub fn decals(&self) -> impl DoubleEndedIterator<Item = InstanceKey> + '_ {
        self.decals.items().copied()
    }

    pub fn decal_count(&self) -> usize {
        self.decals.len()
    }

    pub fn has_decal(&self, key: InstanceKey) -> bool {
        self.decals.contains(&key)
    }

    /// Largest submesh count across renderers
    pub(crate) fn max_submesh_count(&self) -> usize {
        self.renderers
            .iter()
            .map(|r| r.mesh.submesh_count())
            .max()
            .unwrap_or(0)
    }

    /// Insert (or move) a decal to its priority slot
    pub(crate) fn insert_decal(&mut self, key: InstanceKey, priority: i32) {
        self.decals.remove(&key);
        self.decals.insert(key, priority);
    }

    pub(crate) fn remove_decal(&mut self, key: InstanceKey) -> bool {
        self.decals.remove(&key)
    }

    /// Pop decals until the list fits the maximum
    pub(crate) fn take_excess(&mut self, policy: EvictionPolicy) -> SmallVec<[InstanceKey; 2]> {
        let mut evicted = SmallVec::new();
        let Ok(max) = usize::try_from(self.max_decals) else {
            return evicted;
        };
        while self.decals.len() > max {
            let popped = match policy {
                EvictionPolicy::EvictLowest => self.decals.pop_front(),
                EvictionPolicy::EvictHighest => self.decals.pop_back(),
            };
            match popped {
                Some((_, key)) => evicted.push(key),
                None => break,
            }
        }
        evicted
    }
}
