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

use crate::entity::{EntityId, EntityLocation};
use crate::error::Result;
use crate::world::World;

/// World inspector for debugging
pub struct WorldInspector;

impl WorldInspector {
    /// Get archetype summary
    pub fn archetype_summary(world: &World) -> Vec<ArchetypeInfo> {
        world
            .archetypes()
            .iter()
            .enumerate()
            .map(|(id, archetype)| ArchetypeInfo {
                id,
                components: archetype.component_infos().map(|i| i.short_name()).collect(),
                entity_count: archetype.len(),
            })
            .collect()
    }

    pub fn describe_entity(world: &World, entity: EntityId) -> Result<EntityInfo> {
        let location = world.location(entity)?;
        let components = world
            .component_infos(entity)?
            .into_iter()
            .map(|i| i.short_name())
            .collect();
        Ok(EntityInfo {
            entity,
            location,
            components,
        })
    }

    /// Log world summary at debug level
    pub fn log_summary(world: &World) {
        tracing::debug!(
            entities = world.entity_count(),
            archetypes = world.archetype_count(),
            "world summary"
        );
        for info in Self::archetype_summary(world) {
            tracing::debug!(
                archetype = info.id,
                entities = info.entity_count,
                components = ?info.components,
            );
        }
    }
}

/// Archetype information for debugging
#[derive(Clone, Debug, PartialEq)]
pub struct ArchetypeInfo {
    pub id: usize,
    pub components: Vec<&'static str>,
    pub entity_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityInfo {
    pub entity: EntityId,
    pub location: EntityLocation,
    pub components: Vec<&'static str>,
}
