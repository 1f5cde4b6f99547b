// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-frame camera state as reported by the host.

use crate::keys::{CameraId, InstanceKey};
use rustc_hash::FxHashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderingPath {
    Forward,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraState {
    pub id: CameraId,
    pub path: RenderingPath,
    /// Whether the camera can draw screen-space decals
    pub screen_space_capable: bool,
}

impl CameraState {
    pub fn forward(id: CameraId) -> Self {
        Self {
            id,
            path: RenderingPath::Forward,
            screen_space_capable: false,
        }
    }

    pub fn deferred(id: CameraId) -> Self {
        Self {
            id,
            path: RenderingPath::Deferred,
            screen_space_capable: true,
        }
    }

    pub fn with_screen_space(mut self, capable: bool) -> Self {
        self.screen_space_capable = capable;
        self
    }

    /// A technique change invalidates every realization on this camera
    pub(crate) fn technique_differs(&self, other: &CameraState) -> bool {
        self.path != other.path || self.screen_space_capable != other.screen_space_capable
    }
}

/// Active camera plus back-references to instances realized on it
#[derive(Debug)]
pub(crate) struct CameraEntry {
    pub state: CameraState,
    pub attached: FxHashSet<InstanceKey>,
}

impl CameraEntry {
    pub fn new(state: CameraState) -> Self {
        Self {
            state,
            attached: FxHashSet::default(),
        }
    }
}

/// What changed in the active camera set at the start of a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraDiff {
    pub added: usize,
    pub removed: usize,
    pub technique_changed: usize,
    /// Camera instances released because of removals or technique changes
    pub disposed: usize,
}
