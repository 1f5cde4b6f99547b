// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration loaded from environment variables.

use std::str::FromStr;

/// Which end of an object's priority-ordered decal list is evicted when the
/// object holds more decals than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Evict the lowest-priority decal; among equal priorities the oldest.
    #[default]
    EvictLowest,
    /// Evict the highest-priority decal; among equal priorities the newest.
    EvictHighest,
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowest" | "evict-lowest" | "evict_lowest" => Ok(Self::EvictLowest),
            "highest" | "evict-highest" | "evict_highest" => Ok(Self::EvictHighest),
            other => Err(format!("unknown eviction policy '{other}'")),
        }
    }
}

/// Decal engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DecalConfig {
    /// Maximum decals per object; negative means unbounded. Objects may
    /// override it at registration.
    pub max_decals_per_object: i32,
    /// Eviction order when an object exceeds its maximum.
    pub eviction: EvictionPolicy,
    /// Re-express unreadable renderers with a whole-object decal material.
    pub whole_object_fallback: bool,
    /// Global switch for screen-space decals on deferred cameras.
    pub screen_space: bool,
}

const DEFAULT_MAX_DECALS: i32 = 64;

impl Default for DecalConfig {
    fn default() -> Self {
        Self {
            max_decals_per_object: DEFAULT_MAX_DECALS,
            eviction: EvictionPolicy::default(),
            whole_object_fallback: true,
            screen_space: true,
        }
    }
}

impl DecalConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing or malformed values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_decals_per_object: lookup("DECAL_MAX_PER_OBJECT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_decals_per_object),
            eviction: lookup("DECAL_EVICTION")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.eviction),
            whole_object_fallback: lookup("DECAL_WHOLE_OBJECT_FALLBACK")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.whole_object_fallback),
            screen_space: lookup("DECAL_SCREEN_SPACE")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.screen_space),
        }
    }

    /// Configuration without a per-object cap
    pub fn unbounded() -> Self {
        Self {
            max_decals_per_object: -1,
            ..Self::default()
        }
    }

    pub fn with_max_decals(mut self, max: i32) -> Self {
        self.max_decals_per_object = max;
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
