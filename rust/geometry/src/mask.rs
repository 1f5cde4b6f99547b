// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Submesh exclusion masks

use crate::error::{Error, Result};
use smallvec::SmallVec;

/// Set of submesh indices a decal must not be projected onto.
/// The default mask excludes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmeshMask {
    excluded: SmallVec<[u32; 4]>,
}

impl SubmeshMask {
    /// Mask that keeps every submesh
    pub fn all() -> Self {
        Self::default()
    }

    /// Mask excluding the given submeshes
    pub fn excluding(submeshes: impl IntoIterator<Item = u32>) -> Self {
        let mut mask = Self::default();
        for submesh in submeshes {
            mask.exclude(submesh);
        }
        mask
    }

    /// Exclude a submesh (idempotent)
    pub fn exclude(&mut self, submesh: u32) {
        if let Err(pos) = self.excluded.binary_search(&submesh) {
            self.excluded.insert(pos, submesh);
        }
    }

    #[inline]
    pub fn is_excluded(&self, submesh: usize) -> bool {
        u32::try_from(submesh)
            .map(|s| self.excluded.binary_search(&s).is_ok())
            .unwrap_or(false)
    }

    /// Excluded submesh indices, ascending
    pub fn excluded(&self) -> &[u32] {
        &self.excluded
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }

    /// Reject masks that name submeshes the mesh does not have
    pub fn validate(&self, submesh_count: usize) -> Result<()> {
        match self.excluded.last() {
            Some(&last) if last as usize >= submesh_count => Err(Error::SubmeshOutOfRange {
                index: last as usize,
                count: submesh_count,
            }),
            _ => Ok(()),
        }
    }
}
