// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! World and schedule configuration
//!
//! Both configs deserialize from JSON so hosts can ship them next to scene
//! data; every field has a default.

use serde::{Deserialize, Serialize};

use crate::archetype::DEFAULT_CHUNK_SIZE;
use crate::error::{EcsError, Result};

/// Storage tuning for a [`World`](crate::World)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Archetype slots allocated up front
    pub initial_archetype_capacity: usize,
    /// Rows reserved when an archetype is created
    pub row_reserve: usize,
    /// Hard cap on distinct archetypes
    pub archetype_limit: usize,
    /// Rows per chunk for chunked and parallel iteration
    pub chunk_size: usize,
    /// Entity slots allocated up front
    pub initial_entity_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_archetype_capacity: 64,
            row_reserve: 128,
            archetype_limit: 10_000,
            chunk_size: DEFAULT_CHUNK_SIZE,
            initial_entity_capacity: 1024,
        }
    }
}

impl WorldConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_row_reserve(mut self, rows: usize) -> Self {
        self.row_reserve = rows;
        self
    }

    pub fn with_archetype_limit(mut self, limit: usize) -> Self {
        self.archetype_limit = limit;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(EcsError::Config("chunk_size must be non-zero".into()));
        }
        // the empty archetype always exists
        if self.archetype_limit == 0 {
            return Err(EcsError::Config("archetype_limit must be at least 1".into()));
        }
        Ok(())
    }
}

/// Scheduler behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Record per-system timings every tick
    pub profile_systems: bool,
    /// Run [`World::validate`](crate::World::validate) after every update
    pub validate_after_tick: bool,
}

impl ScheduleConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = WorldConfig::from_json_str(r#"{ "chunk_size": 64 }"#).unwrap();
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.archetype_limit, WorldConfig::default().archetype_limit);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = WorldConfig::from_json_str(r#"{ "chunk_size": 0 }"#).unwrap_err();
        assert!(matches!(err, EcsError::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = ScheduleConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, EcsError::Config(_)));

        let config = ScheduleConfig::from_json_str(r#"{ "validate_after_tick": true }"#).unwrap();
        assert!(config.validate_after_tick);
        assert!(!config.profile_systems);
    }
}
