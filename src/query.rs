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

//! Query system for iterating entities
//!
//! Two front ends share one matching rule (required types present, excluded
//! types absent):
//!
//! - typed fetches (`&T`, `&mut T`, `Option<&T>`, [`Entity`]) combined in
//!   tuples and narrowed by [`With`]/[`Without`], driven by [`QueryState`]
//! - a runtime [`QueryDescriptor`] whose rows are visited through
//!   [`RowView`]/[`RowRef`]

use std::any::TypeId;
use std::marker::PhantomData;
use std::ptr::NonNull;

use smallvec::SmallVec;

use crate::archetype::Archetype;
use crate::component::{Component, ComponentInfo};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::system::SystemAccess;
use crate::world::World;

/// Required/excluded component types plus the declared access per type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    reads: SmallVec<[ComponentInfo; 8]>,
    writes: SmallVec<[ComponentInfo; 8]>,
    optional: SmallVec<[ComponentInfo; 4]>,
    required: SmallVec<[TypeId; 8]>,
    excluded: SmallVec<[TypeId; 4]>,
    conflict: Option<&'static str>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor from plain type sets; required types are readable
    pub fn from_sets(requires: &[ComponentInfo], excludes: &[ComponentInfo]) -> Self {
        let mut descriptor = Self::new();
        for info in requires {
            descriptor.add_read(*info);
        }
        for info in excludes {
            descriptor.add_without(*info);
        }
        descriptor
    }

    pub fn read<T: Component>(mut self) -> Self {
        self.add_read(ComponentInfo::of::<T>());
        self
    }

    pub fn write<T: Component>(mut self) -> Self {
        self.add_write(ComponentInfo::of::<T>());
        self
    }

    pub fn optional<T: Component>(mut self) -> Self {
        self.add_optional(ComponentInfo::of::<T>());
        self
    }

    pub fn with<T: Component>(mut self) -> Self {
        self.add_with(ComponentInfo::of::<T>());
        self
    }

    pub fn without<T: Component>(mut self) -> Self {
        self.add_without(ComponentInfo::of::<T>());
        self
    }

    pub fn add_read(&mut self, info: ComponentInfo) {
        if self.writes.contains(&info) {
            self.flag_conflict(info);
        }
        if !self.reads.contains(&info) {
            self.reads.push(info);
        }
        self.require(info.type_id());
    }

    pub fn add_write(&mut self, info: ComponentInfo) {
        if self.writes.contains(&info)
            || self.reads.contains(&info)
            || self.optional.contains(&info)
        {
            self.flag_conflict(info);
        }
        self.writes.push(info);
        self.require(info.type_id());
    }

    /// Readable when present, never required
    pub fn add_optional(&mut self, info: ComponentInfo) {
        if self.writes.contains(&info) {
            self.flag_conflict(info);
        }
        if !self.optional.contains(&info) {
            self.optional.push(info);
        }
    }

    pub fn add_with(&mut self, info: ComponentInfo) {
        self.require(info.type_id());
    }

    pub fn add_without(&mut self, info: ComponentInfo) {
        if !self.excluded.contains(&info.type_id()) {
            self.excluded.push(info.type_id());
        }
    }

    fn require(&mut self, type_id: TypeId) {
        if !self.required.contains(&type_id) {
            self.required.push(type_id);
        }
    }

    fn flag_conflict(&mut self, info: ComponentInfo) {
        if self.conflict.is_none() {
            self.conflict = Some(info.name());
        }
    }

    /// Reject descriptors that alias a mutable access
    pub fn validate(&self) -> Result<()> {
        match self.conflict {
            Some(component) => Err(EcsError::QueryAccessConflict { component }),
            None => Ok(()),
        }
    }

    /// Superset of the required types and disjoint from the excluded ones
    pub fn matches(&self, archetype: &Archetype) -> bool {
        self.required.iter().all(|t| archetype.has_column(*t))
            && !self.excluded.iter().any(|t| archetype.has_column(*t))
    }

    pub fn can_read(&self, type_id: TypeId) -> bool {
        self.can_write(type_id)
            || self.reads.iter().any(|i| i.type_id() == type_id)
            || self.optional.iter().any(|i| i.type_id() == type_id)
    }

    pub fn can_write(&self, type_id: TypeId) -> bool {
        self.writes.iter().any(|i| i.type_id() == type_id)
    }

    pub fn reads(&self) -> impl Iterator<Item = ComponentInfo> + '_ {
        self.reads.iter().chain(self.optional.iter()).copied()
    }

    pub fn writes(&self) -> impl Iterator<Item = ComponentInfo> + '_ {
        self.writes.iter().copied()
    }

    /// Access set for scheduling diagnostics
    pub fn access(&self) -> SystemAccess {
        let mut access = SystemAccess::empty();
        for info in self.reads() {
            access.add_read(info);
        }
        for info in self.writes() {
            access.add_write(info);
        }
        access
    }
}

/// Contributes requirements to a [`QueryDescriptor`]
pub trait QueryFilter {
    fn describe(descriptor: &mut QueryDescriptor);
}

/// Require `T` without fetching it
pub struct With<T>(PhantomData<fn() -> T>);

/// Exclude archetypes that carry `T`
pub struct Without<T>(PhantomData<fn() -> T>);

impl<T: Component> QueryFilter for With<T> {
    fn describe(descriptor: &mut QueryDescriptor) {
        descriptor.add_with(ComponentInfo::of::<T>());
    }
}

impl<T: Component> QueryFilter for Without<T> {
    fn describe(descriptor: &mut QueryDescriptor) {
        descriptor.add_without(ComponentInfo::of::<T>());
    }
}

impl QueryFilter for () {
    fn describe(_descriptor: &mut QueryDescriptor) {}
}

/// Typed component fetch
///
/// # Safety
///
/// `prepare` must return state that stays valid for every row of the
/// archetype until that archetype is next mutated structurally, and `fetch`
/// must only hand out references matching the access `describe` declared.
pub unsafe trait QueryData: QueryFilter {
    type Item<'w>;
    type State: Copy + Send + Sync;

    fn prepare(archetype: &mut Archetype) -> Option<Self::State>;

    /// # Safety
    ///
    /// `row` must be in bounds and, for mutable fetches, not be fetched again
    /// while the returned item is alive.
    unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w>;
}

/// Fetches that never write
///
/// # Safety
///
/// Implementors must only declare and perform shared reads.
pub unsafe trait ReadOnlyQueryData: QueryData {
    fn prepare_read(archetype: &Archetype) -> Option<Self::State>;
}

/// Fetches the entity id of each row
pub struct Entity;

/// Column base pointer shared with worker threads
pub struct ColumnPtr<T>(NonNull<T>);

impl<T> Clone for ColumnPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ColumnPtr<T> {}

// SAFETY: the pointee is a component (Send + Sync) and rows handed to
// different threads never overlap.
unsafe impl<T: Send + Sync> Send for ColumnPtr<T> {}
unsafe impl<T: Send + Sync> Sync for ColumnPtr<T> {}

impl<T> ColumnPtr<T> {
    fn from_slice(slice: &[T]) -> Self {
        Self(NonNull::from(slice).cast())
    }

    fn from_mut_slice(slice: &mut [T]) -> Self {
        Self(NonNull::from(slice).cast())
    }
}

fn column_ptr<T: Component>(archetype: &mut Archetype) -> Option<ColumnPtr<T>> {
    archetype
        .get_column_mut(TypeId::of::<T>())?
        .as_mut_slice::<T>()
        .map(ColumnPtr::from_mut_slice)
}

fn column_ptr_read<T: Component>(archetype: &Archetype) -> Option<ColumnPtr<T>> {
    archetype.column_slice::<T>().map(ColumnPtr::from_slice)
}

impl QueryFilter for Entity {
    fn describe(_descriptor: &mut QueryDescriptor) {}
}

unsafe impl QueryData for Entity {
    type Item<'w> = EntityId;
    type State = ColumnPtr<EntityId>;

    fn prepare(archetype: &mut Archetype) -> Option<Self::State> {
        Self::prepare_read(archetype)
    }

    unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w> {
        *state.0.as_ptr().add(row)
    }
}

unsafe impl ReadOnlyQueryData for Entity {
    fn prepare_read(archetype: &Archetype) -> Option<Self::State> {
        Some(ColumnPtr::from_slice(archetype.entities()))
    }
}

impl<'a, T: Component> QueryFilter for &'a T {
    fn describe(descriptor: &mut QueryDescriptor) {
        descriptor.add_read(ComponentInfo::of::<T>());
    }
}

unsafe impl<'a, T: Component> QueryData for &'a T {
    type Item<'w> = &'w T;
    type State = ColumnPtr<T>;

    fn prepare(archetype: &mut Archetype) -> Option<Self::State> {
        column_ptr::<T>(archetype)
    }

    unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w> {
        &*state.0.as_ptr().add(row)
    }
}

unsafe impl<'a, T: Component> ReadOnlyQueryData for &'a T {
    fn prepare_read(archetype: &Archetype) -> Option<Self::State> {
        column_ptr_read::<T>(archetype)
    }
}

impl<'a, T: Component> QueryFilter for &'a mut T {
    fn describe(descriptor: &mut QueryDescriptor) {
        descriptor.add_write(ComponentInfo::of::<T>());
    }
}

unsafe impl<'a, T: Component> QueryData for &'a mut T {
    type Item<'w> = &'w mut T;
    type State = ColumnPtr<T>;

    fn prepare(archetype: &mut Archetype) -> Option<Self::State> {
        column_ptr::<T>(archetype)
    }

    unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w> {
        &mut *state.0.as_ptr().add(row)
    }
}

impl<'a, T: Component> QueryFilter for Option<&'a T> {
    fn describe(descriptor: &mut QueryDescriptor) {
        descriptor.add_optional(ComponentInfo::of::<T>());
    }
}

unsafe impl<'a, T: Component> QueryData for Option<&'a T> {
    type Item<'w> = Option<&'w T>;
    type State = Option<ColumnPtr<T>>;

    fn prepare(archetype: &mut Archetype) -> Option<Self::State> {
        Some(column_ptr::<T>(archetype))
    }

    unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w> {
        state.map(|ptr| &*ptr.0.as_ptr().add(row))
    }
}

unsafe impl<'a, T: Component> ReadOnlyQueryData for Option<&'a T> {
    fn prepare_read(archetype: &Archetype) -> Option<Self::State> {
        Some(column_ptr_read::<T>(archetype))
    }
}

macro_rules! impl_query_tuple {
    ($($T:ident),+) => {
        impl<$($T: QueryFilter),+> QueryFilter for ($($T,)+) {
            fn describe(descriptor: &mut QueryDescriptor) {
                $($T::describe(descriptor);)+
            }
        }

        unsafe impl<$($T: QueryData),+> QueryData for ($($T,)+) {
            type Item<'w> = ($($T::Item<'w>,)+);
            type State = ($($T::State,)+);

            fn prepare(archetype: &mut Archetype) -> Option<Self::State> {
                Some(($($T::prepare(archetype)?,)+))
            }

            #[allow(non_snake_case)]
            unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w> {
                let ($($T,)+) = state;
                ($($T::fetch($T, row),)+)
            }
        }

        unsafe impl<$($T: ReadOnlyQueryData),+> ReadOnlyQueryData for ($($T,)+) {
            fn prepare_read(archetype: &Archetype) -> Option<Self::State> {
                Some(($($T::prepare_read(archetype)?,)+))
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
impl_query_tuple!(A, B, C, D, E, F);

/// Cached query state for systems
///
/// Store this in a system and reuse it every tick; only archetypes created
/// since the last call are tested against the descriptor.
///
/// ```
/// use composition_ecs::prelude::*;
///
/// #[derive(Clone)]
/// struct Position(f32);
/// #[derive(Clone)]
/// struct Velocity(f32);
///
/// let mut world = World::new();
/// world.create((Position(0.0), Velocity(2.0))).unwrap();
///
/// let mut state = QueryState::<(&mut Position, &Velocity)>::new();
/// for (position, velocity) in state.iter_mut(&mut world).unwrap() {
///     position.0 += velocity.0;
/// }
/// assert_eq!(state.matched_archetype_count(), 1);
/// ```
pub struct QueryState<Q: QueryData, F: QueryFilter = ()> {
    descriptor: QueryDescriptor,
    matched: Vec<usize>,
    seen_archetypes: usize,
    epoch: u64,
    _marker: PhantomData<fn() -> (Q, F)>,
}

impl<Q: QueryData, F: QueryFilter> Default for QueryState<Q, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: QueryData, F: QueryFilter> QueryState<Q, F> {
    pub fn new() -> Self {
        let mut descriptor = QueryDescriptor::new();
        Q::describe(&mut descriptor);
        F::describe(&mut descriptor);
        Self {
            descriptor,
            matched: Vec::new(),
            seen_archetypes: 0,
            epoch: 0,
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn access(&self) -> SystemAccess {
        self.descriptor.access()
    }

    /// Match archetypes created since the last update
    ///
    /// Running against a different world, or one cleared since, discards the
    /// cache and matches from scratch.
    pub fn update(&mut self, world: &World) {
        let table = world.archetype_table();
        if table.epoch() != self.epoch {
            self.matched.clear();
            self.seen_archetypes = 0;
            self.epoch = table.epoch();
        }

        let archetypes = table.as_slice();
        for (id, archetype) in archetypes.iter().enumerate().skip(self.seen_archetypes) {
            if self.descriptor.matches(archetype) {
                self.matched.push(id);
            }
        }
        self.seen_archetypes = archetypes.len();
    }

    pub fn matched_archetype_count(&self) -> usize {
        self.matched.len()
    }

    /// Iterate matching rows mutably
    pub fn iter_mut<'w>(&mut self, world: &'w mut World) -> Result<QueryIterMut<'w, Q>> {
        self.descriptor.validate()?;
        self.update(world);

        #[cfg(feature = "profiling")]
        let _span =
            tracing::trace_span!("query.iter_mut", archetypes = self.matched.len()).entered();

        let table = world.archetype_table_mut();
        let mut batches = Vec::with_capacity(self.matched.len());
        for &id in &self.matched {
            let archetype = table.archetype_mut(id)?;
            let len = archetype.len();
            if len == 0 {
                continue;
            }
            let state = Q::prepare(archetype).ok_or_else(|| missing_columns(id))?;
            batches.push((state, len));
        }
        Ok(QueryIterMut {
            cursor: BatchCursor::new(batches),
            _world: PhantomData,
        })
    }

    /// Run `f` on every matching row, in iteration order
    pub fn for_each_mut<'w, Func>(&mut self, world: &'w mut World, mut f: Func) -> Result<()>
    where
        Func: FnMut(Q::Item<'w>),
    {
        for item in self.iter_mut(world)? {
            f(item);
        }
        Ok(())
    }

    /// Run `f` on every matching row across the rayon pool
    ///
    /// Each archetype is split into `chunk_size` row ranges from the world
    /// config; no two workers ever touch the same row.
    #[cfg(feature = "parallel")]
    pub fn par_for_each_mut<'w, Func>(&mut self, world: &'w mut World, f: Func) -> Result<()>
    where
        Func: Fn(Q::Item<'w>) + Send + Sync,
    {
        use rayon::prelude::*;

        self.descriptor.validate()?;
        self.update(world);
        let chunk_size = world.config().chunk_size;

        let table = world.archetype_table_mut();
        let mut jobs = Vec::new();
        for &id in &self.matched {
            let archetype = table.archetype_mut(id)?;
            if archetype.is_empty() {
                continue;
            }
            let ranges: Vec<_> = archetype.chunk_ranges(chunk_size).collect();
            let state = Q::prepare(archetype).ok_or_else(|| missing_columns(id))?;
            jobs.extend(ranges.into_iter().map(|range| (state, range)));
        }

        jobs.into_par_iter().for_each(|(state, range)| {
            for row in range {
                // SAFETY: ranges are disjoint and the world stays borrowed
                // mutably until every job has finished
                f(unsafe { Q::fetch(state, row) });
            }
        });
        Ok(())
    }
}

impl<Q: ReadOnlyQueryData, F: QueryFilter> QueryState<Q, F> {
    /// Iterate matching rows immutably
    pub fn iter<'w>(&mut self, world: &'w World) -> Result<QueryIter<'w, Q>> {
        self.descriptor.validate()?;
        self.update(world);

        let table = world.archetype_table();
        let mut batches = Vec::with_capacity(self.matched.len());
        for &id in &self.matched {
            let archetype = table.archetype(id)?;
            if archetype.is_empty() {
                continue;
            }
            let state = Q::prepare_read(archetype).ok_or_else(|| missing_columns(id))?;
            batches.push((state, archetype.len()));
        }
        Ok(QueryIter {
            cursor: BatchCursor::new(batches),
            _world: PhantomData,
        })
    }
}

fn missing_columns(archetype: usize) -> EcsError {
    EcsError::ArchetypeCorruption(format!(
        "archetype {archetype} matched a query but lacks a fetched column"
    ))
}

/// Walks (state, row count) batches row by row
struct BatchCursor<S> {
    batches: Vec<(S, usize)>,
    batch: usize,
    row: usize,
    remaining: usize,
}

impl<S: Copy> BatchCursor<S> {
    fn new(batches: Vec<(S, usize)>) -> Self {
        let remaining = batches.iter().map(|(_, len)| len).sum();
        Self {
            batches,
            batch: 0,
            row: 0,
            remaining,
        }
    }

    fn next(&mut self) -> Option<(S, usize)> {
        loop {
            let (state, len) = *self.batches.get(self.batch)?;
            if self.row < len {
                let row = self.row;
                self.row += 1;
                self.remaining -= 1;
                return Some((state, row));
            }
            self.batch += 1;
            self.row = 0;
        }
    }
}

/// Immutable query iterator
pub struct QueryIter<'w, Q: QueryData> {
    cursor: BatchCursor<Q::State>,
    _world: PhantomData<&'w World>,
}

impl<'w, Q: QueryData> Iterator for QueryIter<'w, Q> {
    type Item = Q::Item<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        let (state, row) = self.cursor.next()?;
        // SAFETY: row < len of a live archetype borrowed for 'w
        Some(unsafe { Q::fetch(state, row) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.cursor.remaining, Some(self.cursor.remaining))
    }
}

impl<'w, Q: QueryData> ExactSizeIterator for QueryIter<'w, Q> {}

/// Mutable query iterator
pub struct QueryIterMut<'w, Q: QueryData> {
    cursor: BatchCursor<Q::State>,
    _world: PhantomData<&'w mut World>,
}

impl<'w, Q: QueryData> Iterator for QueryIterMut<'w, Q> {
    type Item = Q::Item<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        let (state, row) = self.cursor.next()?;
        // SAFETY: each row is yielded once and the world is exclusively
        // borrowed for 'w
        Some(unsafe { Q::fetch(state, row) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.cursor.remaining, Some(self.cursor.remaining))
    }
}

impl<'w, Q: QueryData> ExactSizeIterator for QueryIterMut<'w, Q> {}

/// Read-write view of one row, scoped to a [`World::for_each_row`] callback
pub struct RowView<'a> {
    entity: EntityId,
    archetype: &'a mut Archetype,
    row: usize,
    descriptor: &'a QueryDescriptor,
}

impl<'a> RowView<'a> {
    pub(crate) fn new(
        entity: EntityId,
        archetype: &'a mut Archetype,
        row: usize,
        descriptor: &'a QueryDescriptor,
    ) -> Self {
        Self {
            entity,
            archetype,
            row,
            descriptor,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Read a component the query declared
    pub fn get<T: Component>(&self) -> Result<&T> {
        if !self.descriptor.can_read(TypeId::of::<T>()) {
            return Err(access_denied::<T>());
        }
        self.archetype
            .get_component::<T>(self.row)
            .ok_or_else(EcsError::component_not_found::<T>)
    }

    /// Write a component the query declared as writable
    pub fn get_mut<T: Component>(&mut self) -> Result<&mut T> {
        if !self.descriptor.can_write(TypeId::of::<T>()) {
            return Err(access_denied::<T>());
        }
        self.archetype
            .get_component_mut::<T>(self.row)
            .ok_or_else(EcsError::component_not_found::<T>)
    }
}

/// Read-only view of one row produced by [`World::query_rows`]
#[derive(Clone, Copy)]
pub struct RowRef<'w> {
    entity: EntityId,
    archetype: &'w Archetype,
    row: usize,
    descriptor: &'w QueryDescriptor,
}

impl<'w> RowRef<'w> {
    pub(crate) fn new(
        entity: EntityId,
        archetype: &'w Archetype,
        row: usize,
        descriptor: &'w QueryDescriptor,
    ) -> Self {
        Self {
            entity,
            archetype,
            row,
            descriptor,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn get<T: Component>(&self) -> Result<&'w T> {
        if !self.descriptor.can_read(TypeId::of::<T>()) {
            return Err(access_denied::<T>());
        }
        self.archetype
            .get_component::<T>(self.row)
            .ok_or_else(EcsError::component_not_found::<T>)
    }
}

fn access_denied<T: 'static>() -> EcsError {
    EcsError::AccessDenied {
        component: std::any::type_name::<T>(),
    }
}
