// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Buffer Compactor
//!
//! Skinned meshes cannot be renumbered: bone weights and blend shapes are
//! addressed by the original vertex index. Instead of uploading a full
//! vertex-count UV buffer per decal, the sparse entries are reduced to two
//! dense, index-aligned ranges: leading and trailing dead space is trimmed
//! and the single longest internal run of invalid entries is cut out.
//!
//! Reconstruction stays O(1) per vertex:
//!
//! ```text
//! near_offset <= i < near_offset + near.len()  ->  near[i - near_offset]
//! far_offset  <= i < far_offset  + far.len()   ->  far[i - far_offset]
//! otherwise                                    ->  invalid
//! ```

use crate::clipper::ProjectedUv;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Two dense UV ranges plus the vertex offsets they start at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactedUvBuffers {
    pub near: Vec<ProjectedUv>,
    pub far: Vec<ProjectedUv>,
    pub near_offset: usize,
    pub far_offset: usize,
}

/// Compact a sparse UV entry array.
///
/// Returns `None` when no entry is valid, i.e. the decal does not touch
/// this mesh.
pub fn compact(entries: &[ProjectedUv]) -> Option<CompactedUvBuffers> {
    let min_valid = entries.iter().position(ProjectedUv::is_valid)?;
    let max_valid = entries.iter().rposition(ProjectedUv::is_valid)? + 1;

    let gap = longest_invalid_run(&entries[min_valid..max_valid])
        .map(|run| run.start + min_valid..run.end + min_valid)
        .unwrap_or(max_valid..max_valid);

    Some(CompactedUvBuffers {
        near: entries[min_valid..gap.start].to_vec(),
        far: entries[gap.end..max_valid].to_vec(),
        near_offset: min_valid,
        far_offset: gap.end,
    })
}

/// Longest run of invalid entries; ties keep the first run found
fn longest_invalid_run(entries: &[ProjectedUv]) -> Option<Range<usize>> {
    let mut best: Option<Range<usize>> = None;
    let mut run_start: Option<usize> = None;

    // One past the end closes a trailing run
    for i in 0..=entries.len() {
        let invalid = entries.get(i).is_some_and(|e| !e.is_valid());
        match (invalid, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                if best.as_ref().map_or(true, |b| i - start > b.len()) {
                    best = Some(start..i);
                }
                run_start = None;
            }
            _ => {}
        }
    }

    best
}

impl CompactedUvBuffers {
    /// Reconstructed entry for source vertex `index`
    #[inline]
    pub fn get(&self, index: usize) -> ProjectedUv {
        if let Some(entry) = index
            .checked_sub(self.near_offset)
            .and_then(|i| self.near.get(i))
        {
            return *entry;
        }
        index
            .checked_sub(self.far_offset)
            .and_then(|i| self.far.get(i))
            .copied()
            .unwrap_or(ProjectedUv::INVALID)
    }

    /// `[minValid, maxValid)` of the source array
    pub fn valid_range(&self) -> Range<usize> {
        let end = if self.far.is_empty() {
            self.near_offset + self.near.len()
        } else {
            self.far_offset + self.far.len()
        };
        self.near_offset..end
    }

    /// The internal run that was cut out (empty when there was none)
    pub fn gap_range(&self) -> Range<usize> {
        self.near_offset + self.near.len()..self.far_offset
    }

    /// Number of entries actually stored
    #[inline]
    pub fn stored_len(&self) -> usize {
        self.near.len() + self.far.len()
    }

    /// Rebuild the full sparse array for a mesh of `vertex_count` vertices
    pub fn expand(&self, vertex_count: usize) -> Vec<ProjectedUv> {
        (0..vertex_count).map(|i| self.get(i)).collect()
    }

    /// Near range as flat (u, v, validity) floats for upload
    pub fn near_floats(&self) -> Vec<f32> {
        flatten(&self.near)
    }

    /// Far range as flat (u, v, validity) floats for upload
    pub fn far_floats(&self) -> Vec<f32> {
        flatten(&self.far)
    }
}

fn flatten(entries: &[ProjectedUv]) -> Vec<f32> {
    entries
        .iter()
        .flat_map(|e| [e.u, e.v, e.validity])
        .collect()
}
