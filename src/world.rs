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

//! World container
//!
//! The world owns the archetype table, the entity directory and typed
//! resources. Every structural change goes through it, and the directory is
//! rewritten before any call returns, so callers never observe a half-moved
//! entity.

use std::any::{Any, TypeId};

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::archetype::{Archetype, RowMigration};
use crate::component::{BoxedComponent, Bundle, Component, ComponentInfo, ComponentSnapshot};
use crate::config::WorldConfig;
use crate::entity::{EntityDirectory, EntityId, EntityLocation};
use crate::error::{EcsError, Result};
use crate::query::{
    QueryData, QueryDescriptor, QueryFilter, QueryIter, QueryIterMut, QueryState,
    ReadOnlyQueryData, RowRef, RowView,
};
use crate::storage::ArchetypeTable;

/// World container
pub struct World {
    /// Entity ID -> current archetype row
    entities: EntityDirectory,

    /// All archetypes, indexed by component signature
    archetypes: ArchetypeTable,

    /// Typed resources (singletons) for global state
    resources: AHashMap<TypeId, Box<dyn Any + Send + Sync>>,

    config: WorldConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create new world with default configuration
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            entities: EntityDirectory::with_capacity(config.initial_entity_capacity),
            archetypes: ArchetypeTable::new(&config),
            resources: AHashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Create an entity holding every component of `bundle`
    ///
    /// ```
    /// use composition_ecs::World;
    ///
    /// let mut world = World::new();
    /// let entity = world.create((1u32, 2.0f32)).unwrap();
    /// assert_eq!(world.get::<u32>(entity), Ok(&1));
    /// ```
    pub fn create<B: Bundle>(&mut self, bundle: B) -> Result<EntityId> {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("world.create").entered();

        let mut infos = B::component_infos();
        infos.sort();
        reject_duplicates(&infos)?;

        let archetype_id = self.archetypes.get_or_create(&infos)?;
        let archetype = self.archetypes.archetype_mut(archetype_id)?;
        bundle.push_into(archetype)?;

        let entity = self.entities.allocate();
        let row = archetype.push_entity(entity)?;
        self.entities
            .set(entity, EntityLocation::new(archetype_id, row))?;

        tracing::trace!(?entity, archetype = archetype_id, row, "created entity");
        Ok(entity)
    }

    /// Create one entity per bundle
    pub fn create_batch<B, I>(&mut self, bundles: I) -> Result<Vec<EntityId>>
    where
        B: Bundle,
        I: IntoIterator<Item = B>,
    {
        let bundles = bundles.into_iter();
        let (lower, _) = bundles.size_hint();
        self.entities.reserve(lower);

        let mut created = Vec::with_capacity(lower);
        for bundle in bundles {
            created.push(self.create(bundle)?);
        }
        Ok(created)
    }

    /// Destroy an entity and drop its components
    pub fn destroy(&mut self, entity: EntityId) -> Result<()> {
        let location = self.entities.locate(entity)?;
        let archetype = self.archetypes.archetype_mut(location.archetype_id)?;
        let swapped = archetype.remove_row(location.archetype_row)?;

        if let Some(swapped) = swapped {
            self.entities.set_row(swapped, location.archetype_row)?;
        }
        self.entities.remove(entity);

        tracing::trace!(?entity, archetype = location.archetype_id, "destroyed entity");
        Ok(())
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains(entity)
    }

    /// Attach a component the entity does not have yet
    ///
    /// A [`BoxedComponent`] is attached as the value it carries.
    pub fn add<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        if TypeId::of::<T>() == TypeId::of::<BoxedComponent>() {
            return self.add_boxed(entity, BoxedComponent::new(component));
        }

        let location = self.entities.locate(entity)?;
        if self
            .archetypes
            .archetype(location.archetype_id)?
            .has_column(TypeId::of::<T>())
        {
            return Err(EcsError::duplicate_component::<T>());
        }

        let target = self
            .archetypes
            .add_transition(location.archetype_id, ComponentInfo::of::<T>())?;
        self.migrate(entity, location, target, move |archetype| {
            archetype.push_component(component)
        })?;
        Ok(())
    }

    /// Attach a type-erased component value
    pub fn add_boxed(&mut self, entity: EntityId, component: BoxedComponent) -> Result<()> {
        let location = self.entities.locate(entity)?;
        let info = component.info();
        if self
            .archetypes
            .archetype(location.archetype_id)?
            .has_column(info.type_id())
        {
            return Err(EcsError::DuplicateComponent {
                component: info.name(),
            });
        }

        let target = self.archetypes.add_transition(location.archetype_id, info)?;
        self.migrate(entity, location, target, move |archetype| {
            archetype.push_boxed(component)
        })?;
        Ok(())
    }

    /// Add the component, or overwrite it when already present
    pub fn insert<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        if TypeId::of::<T>() == TypeId::of::<BoxedComponent>() {
            return self.insert_boxed(entity, BoxedComponent::new(component));
        }
        if self.has::<T>(entity)? {
            self.set(entity, component)
        } else {
            self.add(entity, component)
        }
    }

    /// Type-erased form of [`World::insert`]
    pub fn insert_boxed(&mut self, entity: EntityId, component: BoxedComponent) -> Result<()> {
        let location = self.entities.locate(entity)?;
        let archetype = self.archetypes.archetype_mut(location.archetype_id)?;
        if archetype.has_column(component.type_id()) {
            archetype.replace_boxed(location.archetype_row, component)
        } else {
            self.add_boxed(entity, component)
        }
    }

    /// Detach a component and return its value
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> Result<T> {
        let location = self.entities.locate(entity)?;
        if !self
            .archetypes
            .archetype(location.archetype_id)?
            .has_column(TypeId::of::<T>())
        {
            return Err(EcsError::component_not_found::<T>());
        }

        let target = self
            .archetypes
            .remove_transition(location.archetype_id, TypeId::of::<T>())?;
        let moved = self.migrate(entity, location, target, |_| Ok(()))?;

        moved
            .dropped
            .into_iter()
            .next()
            .and_then(|value| value.downcast::<T>().ok())
            .ok_or_else(|| {
                EcsError::ArchetypeCorruption(format!(
                    "removed {} but no value came back",
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Move an entity's row into `target` and rewrite the directory
    fn migrate<F>(
        &mut self,
        entity: EntityId,
        location: EntityLocation,
        target: usize,
        on_new_row: F,
    ) -> Result<RowMigration>
    where
        F: FnOnce(&mut Archetype) -> Result<()>,
    {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("world.migrate", from = location.archetype_id, to = target)
            .entered();

        let (source, destination) = self.archetypes.pair_mut(location.archetype_id, target)?;
        let moved = source.migrate_row(location.archetype_row, destination, on_new_row)?;

        if let Some(swapped) = moved.swapped {
            self.entities.set_row(swapped, location.archetype_row)?;
        }
        self.entities
            .set(entity, EntityLocation::new(target, moved.new_row))?;

        tracing::trace!(
            ?entity,
            from = location.archetype_id,
            to = target,
            row = moved.new_row,
            "migrated entity"
        );
        Ok(moved)
    }

    /// Get component immutably
    pub fn get<T: Component>(&self, entity: EntityId) -> Result<&T> {
        let location = self.entities.locate(entity)?;
        self.archetypes
            .archetype(location.archetype_id)?
            .get_component::<T>(location.archetype_row)
            .ok_or_else(EcsError::component_not_found::<T>)
    }

    /// Get component mutably
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Result<&mut T> {
        let location = self.entities.locate(entity)?;
        self.archetypes
            .archetype_mut(location.archetype_id)?
            .get_component_mut::<T>(location.archetype_row)
            .ok_or_else(EcsError::component_not_found::<T>)
    }

    /// Overwrite a present component in place
    pub fn set<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        *self.get_mut::<T>(entity)? = component;
        Ok(())
    }

    pub fn has<T: Component>(&self, entity: EntityId) -> Result<bool> {
        let location = self.entities.locate(entity)?;
        Ok(self
            .archetypes
            .archetype(location.archetype_id)?
            .has_column(TypeId::of::<T>()))
    }

    /// Type tags of every component on the entity
    pub fn component_infos(&self, entity: EntityId) -> Result<Vec<ComponentInfo>> {
        let location = self.entities.locate(entity)?;
        Ok(self
            .archetypes
            .archetype(location.archetype_id)?
            .component_infos()
            .collect())
    }

    /// Clone every component value of an entity
    pub fn get_all_components(&self, entity: EntityId) -> Result<ComponentSnapshot> {
        let location = self.entities.locate(entity)?;
        let values = self
            .archetypes
            .archetype(location.archetype_id)?
            .clone_row(location.archetype_row)?;
        Ok(values.into_iter().collect())
    }

    /// Move every component value out and destroy the entity
    pub fn take_all_components(&mut self, entity: EntityId) -> Result<ComponentSnapshot> {
        let location = self.entities.locate(entity)?;
        let archetype = self.archetypes.archetype_mut(location.archetype_id)?;
        let (swapped, values) = archetype.take_row(location.archetype_row)?;

        if let Some(swapped) = swapped {
            self.entities.set_row(swapped, location.archetype_row)?;
        }
        self.entities.remove(entity);
        Ok(values.into_iter().collect())
    }

    /// Create an entity from a snapshot of type-erased values
    pub fn spawn_snapshot(&mut self, snapshot: ComponentSnapshot) -> Result<EntityId> {
        let mut infos: SmallVec<[ComponentInfo; 8]> = snapshot.infos().collect();
        infos.sort();
        reject_duplicates(&infos)?;

        let archetype_id = self.archetypes.get_or_create(&infos)?;
        let archetype = self.archetypes.archetype_mut(archetype_id)?;
        for value in snapshot {
            archetype.push_boxed(value)?;
        }

        let entity = self.entities.allocate();
        let row = archetype.push_entity(entity)?;
        self.entities
            .set(entity, EntityLocation::new(archetype_id, row))?;
        Ok(entity)
    }

    /// Recreate an entity inside `target` and destroy it here
    ///
    /// The entity stays in this world if `target` rejects the snapshot.
    pub fn rehome(&mut self, entity: EntityId, target: &mut World) -> Result<EntityId> {
        let snapshot = self.get_all_components(entity)?;
        let rehomed = target.spawn_snapshot(snapshot)?;
        self.destroy(entity)?;

        tracing::debug!(?entity, ?rehomed, "rehomed entity into another world");
        Ok(rehomed)
    }

    /// Iterate `Q` over every matching entity
    pub fn query<Q: ReadOnlyQueryData>(&self) -> Result<QueryIter<'_, Q>> {
        QueryState::<Q>::new().iter(self)
    }

    /// Iterate `Q` mutably over every matching entity
    pub fn query_mut<Q: QueryData>(&mut self) -> Result<QueryIterMut<'_, Q>> {
        QueryState::<Q>::new().iter_mut(self)
    }

    /// Like [`World::query`] with an extra `With`/`Without` filter
    pub fn query_filtered<Q: ReadOnlyQueryData, F: QueryFilter>(
        &self,
    ) -> Result<QueryIter<'_, Q>> {
        QueryState::<Q, F>::new().iter(self)
    }

    pub fn query_filtered_mut<Q: QueryData, F: QueryFilter>(
        &mut self,
    ) -> Result<QueryIterMut<'_, Q>> {
        QueryState::<Q, F>::new().iter_mut(self)
    }

    /// Lazily walk every row matching a runtime descriptor
    pub fn query_rows<'w>(
        &'w self,
        descriptor: &'w QueryDescriptor,
    ) -> Result<impl Iterator<Item = RowRef<'w>> + 'w> {
        descriptor.validate()?;
        Ok(self
            .archetypes
            .iter()
            .filter(move |archetype| descriptor.matches(archetype))
            .flat_map(move |archetype| {
                archetype
                    .entities()
                    .iter()
                    .enumerate()
                    .map(move |(row, &entity)| RowRef::new(entity, archetype, row, descriptor))
            }))
    }

    /// Visit every row matching `descriptor` with declared read-write access
    ///
    /// Returns the number of rows visited. The callback has no access to the
    /// world, so the archetype set cannot change underneath it.
    pub fn for_each_row<F>(&mut self, descriptor: &QueryDescriptor, mut f: F) -> Result<usize>
    where
        F: FnMut(RowView<'_>) -> Result<()>,
    {
        descriptor.validate()?;
        let mut visited = 0;
        for archetype in self.archetypes.iter_mut() {
            if !descriptor.matches(archetype) {
                continue;
            }
            for row in 0..archetype.len() {
                let entity = archetype.entities()[row];
                f(RowView::new(entity, archetype, row, descriptor))?;
                visited += 1;
            }
        }
        Ok(visited)
    }

    /// Insert a resource (singleton) into the world
    ///
    /// If a resource of this type already exists, it is replaced and returned.
    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, resource: R) -> Option<R> {
        self.resources
            .insert(TypeId::of::<R>(), Box::new(resource))
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }

    pub fn resource<R: 'static>(&self) -> Option<&R> {
        self.resources
            .get(&TypeId::of::<R>())
            .and_then(|r| r.downcast_ref::<R>())
    }

    pub fn resource_mut<R: 'static>(&mut self) -> Option<&mut R> {
        self.resources
            .get_mut(&TypeId::of::<R>())
            .and_then(|r| r.downcast_mut::<R>())
    }

    /// Get a resource, inserting `R::default()` first if missing
    pub fn resource_or_default<R: Default + Send + Sync + 'static>(&mut self) -> &mut R {
        let slot = self
            .resources
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(R::default()));
        if !slot.is::<R>() {
            *slot = Box::new(R::default());
        }
        // the slot was just checked or replaced
        match slot.downcast_mut::<R>() {
            Some(resource) => resource,
            None => unreachable!("resource slot holds a different type"),
        }
    }

    pub fn has_resource<R: 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<R>())
    }

    pub fn remove_resource<R: 'static>(&mut self) -> Option<R> {
        self.resources
            .remove(&TypeId::of::<R>())
            .and_then(|r| r.downcast::<R>().ok())
            .map(|r| *r)
    }

    /// Check every archetype and directory entry against each other
    pub fn validate(&self) -> Result<()> {
        let result = self.check_consistency();
        if let Err(err) = &result {
            tracing::error!(error = %err, "world failed validation");
        }
        result
    }

    fn check_consistency(&self) -> Result<()> {
        let mut rows = 0;
        for (archetype_id, archetype) in self.archetypes.iter().enumerate() {
            archetype.verify_row_counts()?;
            for (row, &entity) in archetype.entities().iter().enumerate() {
                let expected = EntityLocation::new(archetype_id, row);
                match self.entities.get(entity) {
                    Some(location) if location == expected => {}
                    Some(location) => {
                        return Err(EcsError::ArchetypeCorruption(format!(
                            "entity {entity:?} stored at {expected:?} but directory says {location:?}"
                        )))
                    }
                    None => {
                        return Err(EcsError::ArchetypeCorruption(format!(
                            "orphaned row {row} in archetype {archetype_id}"
                        )))
                    }
                }
            }
            rows += archetype.len();
        }

        if rows != self.entities.len() {
            return Err(EcsError::ArchetypeCorruption(format!(
                "directory holds {} entities but archetypes hold {rows} rows",
                self.entities.len()
            )));
        }
        Ok(())
    }

    pub fn location(&self, entity: EntityId) -> Result<EntityLocation> {
        self.entities.locate(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().map(|(entity, _)| entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Freed entity slots waiting for a new generation
    pub fn recycled_entity_count(&self) -> usize {
        self.entities.recycled_count()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Get all archetypes
    pub fn archetypes(&self) -> &[Archetype] {
        self.archetypes.as_slice()
    }

    pub fn archetype_table(&self) -> &ArchetypeTable {
        &self.archetypes
    }

    pub(crate) fn archetype_table_mut(&mut self) -> &mut ArchetypeTable {
        &mut self.archetypes
    }

    /// Destroy every entity and archetype; resources are kept
    pub fn clear(&mut self) {
        self.entities.clear();
        self.archetypes.clear();
        tracing::debug!("cleared world");
    }
}

fn reject_duplicates(sorted: &[ComponentInfo]) -> Result<()> {
    match sorted.windows(2).find(|pair| pair[0] == pair[1]) {
        Some(pair) => Err(EcsError::DuplicateComponent {
            component: pair[0].name(),
        }),
        None => Ok(()),
    }
}
