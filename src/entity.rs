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

//! Entity identifiers, location metadata and the entity directory.

use slotmap::{new_key_type, SlotMap};

use crate::error::{EcsError, Result};

new_key_type! {
    /// Unique entity identifier backed by slotmap's generational keys.
    ///
    /// A destroyed entity's slot is reused only with a bumped generation,
    /// so stale handles never resolve to the new occupant.
    pub struct EntityId;
}

/// Entity location in archetype (archetype_id, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: usize,
    pub archetype_row: usize,
}

impl EntityLocation {
    pub(crate) const PENDING: EntityLocation = EntityLocation {
        archetype_id: usize::MAX,
        archetype_row: usize::MAX,
    };

    pub fn new(archetype_id: usize, archetype_row: usize) -> Self {
        Self {
            archetype_id,
            archetype_row,
        }
    }
}

/// Maps live entity handles to their current archetype row.
#[derive(Default)]
pub struct EntityDirectory {
    locations: SlotMap<EntityId, EntityLocation>,
    recycled: usize,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            locations: SlotMap::with_capacity_and_key(capacity),
            recycled: 0,
        }
    }

    /// Allocate a handle whose location is filled in by the caller
    pub(crate) fn allocate(&mut self) -> EntityId {
        if self.recycled > 0 {
            self.recycled -= 1;
        }
        self.locations.insert(EntityLocation::PENDING)
    }

    pub fn get(&self, entity: EntityId) -> Option<EntityLocation> {
        self.locations.get(entity).copied()
    }

    /// Location of a live entity, or `EntityNotFound`
    pub fn locate(&self, entity: EntityId) -> Result<EntityLocation> {
        self.get(entity).ok_or(EcsError::EntityNotFound)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.locations.contains_key(entity)
    }

    pub(crate) fn set(&mut self, entity: EntityId, location: EntityLocation) -> Result<()> {
        let slot = self.locations.get_mut(entity).ok_or_else(|| {
            EcsError::ArchetypeCorruption(format!("directory lost entity {entity:?}"))
        })?;
        *slot = location;
        Ok(())
    }

    /// Point a swapped-in entity at the row it now occupies
    pub(crate) fn set_row(&mut self, entity: EntityId, row: usize) -> Result<()> {
        let slot = self.locations.get_mut(entity).ok_or_else(|| {
            EcsError::ArchetypeCorruption(format!(
                "swapped entity {entity:?} has no directory entry"
            ))
        })?;
        slot.archetype_row = row;
        Ok(())
    }

    pub(crate) fn remove(&mut self, entity: EntityId) -> Option<EntityLocation> {
        let location = self.locations.remove(entity)?;
        self.recycled += 1;
        Some(location)
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.locations.reserve(additional);
    }

    pub(crate) fn clear(&mut self) {
        self.locations.clear();
        self.recycled = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityLocation)> + '_ {
        self.locations.iter().map(|(id, loc)| (id, *loc))
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Number of freed slots waiting for reuse
    pub fn recycled_count(&self) -> usize {
        self.recycled
    }

    pub fn capacity(&self) -> usize {
        self.locations.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_handle_is_never_resolved() {
        let mut directory = EntityDirectory::new();
        let first = directory.allocate();
        directory.set(first, EntityLocation::new(0, 0)).unwrap();
        directory.remove(first);

        let second = directory.allocate();
        assert_ne!(first, second);
        assert!(directory.get(first).is_none());
        assert_eq!(directory.locate(first), Err(EcsError::EntityNotFound));
        assert!(directory.contains(second));
    }

    #[test]
    fn test_set_row_on_missing_entity_is_corruption() {
        let mut directory = EntityDirectory::new();
        let entity = directory.allocate();
        directory.remove(entity);
        let err = directory.set_row(entity, 3).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_recycled_count_tracks_reuse() {
        let mut directory = EntityDirectory::new();
        let a = directory.allocate();
        let _b = directory.allocate();
        directory.remove(a);
        assert_eq!(directory.recycled_count(), 1);
        directory.allocate();
        assert_eq!(directory.recycled_count(), 0);
        assert_eq!(directory.len(), 2);
    }
}
