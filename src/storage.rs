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

//! Archetype table: type-set to archetype lookup and transition cache

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::archetype::{Archetype, ArchetypeSignature};
use crate::component::ComponentInfo;
use crate::config::WorldConfig;
use crate::error::{EcsError, Result};

/// Index of the archetype holding entities with no components
pub const EMPTY_ARCHETYPE: usize = 0;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// Owns every archetype of a world
///
/// Archetypes are never removed while the table lives, so archetype ids stay
/// valid and an emptied archetype is reused by the next entity with the same
/// type set.
pub struct ArchetypeTable {
    archetypes: Vec<Archetype>,

    /// Maps sorted component signatures to archetype indices
    archetype_index: AHashMap<ArchetypeSignature, usize>,

    /// Cache for archetype transitions when adding/removing components
    transitions: AHashMap<(usize, TypeId, bool), usize>,

    row_reserve: usize,
    archetype_limit: usize,

    /// Process-wide unique; replaced whenever ids are invalidated by `clear`
    epoch: u64,
}

impl ArchetypeTable {
    pub fn new(config: &WorldConfig) -> Self {
        let mut table = Self {
            archetypes: Vec::with_capacity(config.initial_archetype_capacity),
            archetype_index: AHashMap::with_capacity(config.initial_archetype_capacity),
            transitions: AHashMap::with_capacity(config.initial_archetype_capacity * 2),
            row_reserve: config.row_reserve,
            archetype_limit: config.archetype_limit.max(1),
            epoch: next_epoch(),
        };
        table.push_empty();
        table
    }

    fn push_empty(&mut self) {
        self.archetypes.push(Archetype::new(&[], self.row_reserve));
        self.archetype_index
            .insert(ArchetypeSignature::new(), EMPTY_ARCHETYPE);
    }

    /// Find or create the archetype for a set of component types
    ///
    /// `infos` may be in any order but must not contain duplicates.
    pub fn get_or_create(&mut self, infos: &[ComponentInfo]) -> Result<usize> {
        let mut sorted: SmallVec<[ComponentInfo; 8]> = SmallVec::from_slice(infos);
        sorted.sort();
        let signature: ArchetypeSignature = sorted.iter().map(|info| info.type_id()).collect();

        if let Some(&id) = self.archetype_index.get(&signature) {
            return Ok(id);
        }

        if self.archetypes.len() >= self.archetype_limit {
            return Err(EcsError::ArchetypeLimitExceeded {
                limit: self.archetype_limit,
            });
        }

        let id = self.archetypes.len();
        self.archetypes.push(Archetype::new(&sorted, self.row_reserve));
        self.archetype_index.insert(signature, id);

        tracing::debug!(
            archetype = id,
            components = ?sorted.as_slice(),
            "created archetype"
        );
        Ok(id)
    }

    /// Destination archetype after adding `info` to `source`
    pub fn add_transition(&mut self, source: usize, info: ComponentInfo) -> Result<usize> {
        let key = (source, info.type_id(), true);
        if let Some(&id) = self.transitions.get(&key) {
            return Ok(id);
        }

        let mut infos: SmallVec<[ComponentInfo; 8]> =
            self.archetype(source)?.component_infos().collect();
        infos.push(info);
        let id = self.get_or_create(&infos)?;
        self.transitions.insert(key, id);
        Ok(id)
    }

    /// Destination archetype after removing `type_id` from `source`
    pub fn remove_transition(&mut self, source: usize, type_id: TypeId) -> Result<usize> {
        let key = (source, type_id, false);
        if let Some(&id) = self.transitions.get(&key) {
            return Ok(id);
        }

        let infos: SmallVec<[ComponentInfo; 8]> = self
            .archetype(source)?
            .component_infos()
            .filter(|info| info.type_id() != type_id)
            .collect();
        let id = self.get_or_create(&infos)?;
        self.transitions.insert(key, id);
        Ok(id)
    }

    pub fn archetype(&self, id: usize) -> Result<&Archetype> {
        self.archetypes.get(id).ok_or_else(|| missing_archetype(id))
    }

    pub fn archetype_mut(&mut self, id: usize) -> Result<&mut Archetype> {
        self.archetypes.get_mut(id).ok_or_else(|| missing_archetype(id))
    }

    /// Borrow two distinct archetypes mutably
    pub fn pair_mut(&mut self, a: usize, b: usize) -> Result<(&mut Archetype, &mut Archetype)> {
        if a == b {
            return Err(EcsError::ArchetypeCorruption(format!(
                "archetype {a} cannot migrate into itself"
            )));
        }
        if a.max(b) >= self.archetypes.len() {
            return Err(missing_archetype(a.max(b)));
        }

        if a < b {
            let (left, right) = self.archetypes.split_at_mut(b);
            Ok((&mut left[a], &mut right[0]))
        } else {
            let (left, right) = self.archetypes.split_at_mut(a);
            Ok((&mut right[0], &mut left[b]))
        }
    }

    pub fn as_slice(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Archetype> {
        self.archetypes.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Archetype> {
        self.archetypes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Identifies this table and its current set of archetype ids
    ///
    /// No two tables share an epoch, so cached archetype ids from another
    /// world are never mistaken for this one's.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop every archetype; ids handed out before are invalid afterwards
    pub fn clear(&mut self) {
        self.archetypes.clear();
        self.archetype_index.clear();
        self.transitions.clear();
        self.epoch = next_epoch();
        self.push_empty();
    }
}

fn missing_archetype(id: usize) -> EcsError {
    EcsError::ArchetypeCorruption(format!("archetype {id} does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct A;
    #[derive(Clone)]
    struct B;

    #[test]
    fn test_type_set_is_order_independent() {
        let mut table = ArchetypeTable::new(&WorldConfig::default());
        let ab = table
            .get_or_create(&[ComponentInfo::of::<A>(), ComponentInfo::of::<B>()])
            .unwrap();
        let ba = table
            .get_or_create(&[ComponentInfo::of::<B>(), ComponentInfo::of::<A>()])
            .unwrap();
        assert_eq!(ab, ba);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_transitions_are_memoized_and_symmetric() {
        let mut table = ArchetypeTable::new(&WorldConfig::default());
        let a = table.get_or_create(&[ComponentInfo::of::<A>()]).unwrap();
        let ab = table.add_transition(a, ComponentInfo::of::<B>()).unwrap();
        assert_eq!(table.add_transition(a, ComponentInfo::of::<B>()).unwrap(), ab);
        assert_eq!(table.remove_transition(ab, TypeId::of::<B>()).unwrap(), a);
        assert_eq!(
            table.remove_transition(a, TypeId::of::<A>()).unwrap(),
            EMPTY_ARCHETYPE
        );
    }

    #[test]
    fn test_archetype_limit() {
        let config = WorldConfig::default().with_archetype_limit(2);
        let mut table = ArchetypeTable::new(&config);
        table.get_or_create(&[ComponentInfo::of::<A>()]).unwrap();
        let err = table.get_or_create(&[ComponentInfo::of::<B>()]).unwrap_err();
        assert_eq!(err, EcsError::ArchetypeLimitExceeded { limit: 2 });
    }

    #[test]
    fn test_pair_mut_rejects_same_index() {
        let mut table = ArchetypeTable::new(&WorldConfig::default());
        assert!(table.pair_mut(0, 0).is_err());
        let a = table.get_or_create(&[ComponentInfo::of::<A>()]).unwrap();
        let (first, second) = table.pair_mut(a, EMPTY_ARCHETYPE).unwrap();
        assert_eq!(first.column_count(), 1);
        assert_eq!(second.column_count(), 0);
    }

    #[test]
    fn test_clear_bumps_epoch() {
        let mut table = ArchetypeTable::new(&WorldConfig::default());
        let before = table.epoch();
        table.get_or_create(&[ComponentInfo::of::<A>()]).unwrap();
        table.clear();
        assert_ne!(table.epoch(), before);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_epoch_is_unique_per_table() {
        let config = WorldConfig::default();
        let first = ArchetypeTable::new(&config);
        let second = ArchetypeTable::new(&config);
        assert_ne!(first.epoch(), second.epoch());
    }
}
