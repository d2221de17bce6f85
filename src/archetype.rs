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

//! Archetype storage with row allocation, removal and migration

use std::any::{Any, TypeId};
use std::ops::Range;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::component::{BoxedComponent, Component, ComponentInfo};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};

/// Component signature: sorted, duplicate-free type ids
pub type ArchetypeSignature = SmallVec<[TypeId; 8]>;

/// Default number of rows per iteration chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Type-erased contiguous storage for one component type
pub(crate) trait ColumnStorage: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn len(&self) -> usize;
    fn reserve(&mut self, additional: usize);
    /// Drop the value at `row`, moving the last value into its place
    fn swap_remove_drop(&mut self, row: usize) -> bool;
    fn swap_remove_boxed(&mut self, row: usize) -> Option<BoxedComponent>;
    /// Swap-remove `row` and append the value to `dst`
    fn move_row_into(&mut self, row: usize, dst: &mut dyn ColumnStorage) -> bool;
    fn clone_row(&self, row: usize) -> Option<BoxedComponent>;
    fn push_boxed(&mut self, value: BoxedComponent) -> std::result::Result<(), BoxedComponent>;
    fn replace_boxed(
        &mut self,
        row: usize,
        value: BoxedComponent,
    ) -> std::result::Result<(), BoxedComponent>;
}

impl<T: Component> ColumnStorage for Vec<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn reserve(&mut self, additional: usize) {
        Vec::reserve(self, additional);
    }

    fn swap_remove_drop(&mut self, row: usize) -> bool {
        if row >= Vec::len(self) {
            return false;
        }
        self.swap_remove(row);
        true
    }

    fn swap_remove_boxed(&mut self, row: usize) -> Option<BoxedComponent> {
        if row >= Vec::len(self) {
            return None;
        }
        Some(BoxedComponent::new(self.swap_remove(row)))
    }

    fn move_row_into(&mut self, row: usize, dst: &mut dyn ColumnStorage) -> bool {
        if row >= Vec::len(self) {
            return false;
        }
        let Some(dst) = dst.as_any_mut().downcast_mut::<Vec<T>>() else {
            return false;
        };
        dst.push(self.swap_remove(row));
        true
    }

    fn clone_row(&self, row: usize) -> Option<BoxedComponent> {
        self.get(row).map(|value| BoxedComponent::new(value.clone()))
    }

    fn push_boxed(&mut self, value: BoxedComponent) -> std::result::Result<(), BoxedComponent> {
        let value = value.downcast::<T>()?;
        self.push(value);
        Ok(())
    }

    fn replace_boxed(
        &mut self,
        row: usize,
        value: BoxedComponent,
    ) -> std::result::Result<(), BoxedComponent> {
        if row >= Vec::len(self) {
            return Err(value);
        }
        self[row] = value.downcast::<T>()?;
        Ok(())
    }
}

/// Typed column of one component type inside an archetype
pub struct ComponentColumn {
    info: ComponentInfo,
    storage: Box<dyn ColumnStorage>,
}

impl ComponentColumn {
    /// Create new column for type T
    pub fn new<T: Component>() -> Self {
        Self::from_info(ComponentInfo::of::<T>())
    }

    pub(crate) fn from_info(info: ComponentInfo) -> Self {
        Self {
            info,
            storage: info.new_column(),
        }
    }

    pub fn info(&self) -> ComponentInfo {
        self.info
    }

    pub fn type_id(&self) -> TypeId {
        self.info.type_id()
    }

    /// Typed slice of all values
    pub fn as_slice<T: Component>(&self) -> Option<&[T]> {
        self.storage
            .as_any()
            .downcast_ref::<Vec<T>>()
            .map(|v| v.as_slice())
    }

    pub fn as_mut_slice<T: Component>(&mut self) -> Option<&mut [T]> {
        self.storage
            .as_any_mut()
            .downcast_mut::<Vec<T>>()
            .map(|v| v.as_mut_slice())
    }

    /// Get component at index
    pub fn get<T: Component>(&self, index: usize) -> Option<&T> {
        self.as_slice::<T>()?.get(index)
    }

    /// Get mutable component at index
    pub fn get_mut<T: Component>(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice::<T>()?.get_mut(index)
    }

    pub(crate) fn push<T: Component>(&mut self, value: T) -> Result<()> {
        let vec = self
            .storage
            .as_any_mut()
            .downcast_mut::<Vec<T>>()
            .ok_or_else(|| column_type_mismatch(self.info, std::any::type_name::<T>()))?;
        vec.push(value);
        Ok(())
    }

    pub(crate) fn push_boxed(&mut self, value: BoxedComponent) -> Result<()> {
        let info = self.info;
        self.storage
            .push_boxed(value)
            .map_err(|rejected| column_type_mismatch(info, rejected.info().name()))
    }

    pub(crate) fn clone_row(&self, row: usize) -> Option<BoxedComponent> {
        self.storage.clone_row(row)
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn column_type_mismatch(info: ComponentInfo, got: &str) -> EcsError {
    EcsError::ArchetypeCorruption(format!(
        "column for {} received a value of type {got}",
        info.name()
    ))
}

/// Outcome of moving one row to another archetype
#[derive(Debug)]
pub struct RowMigration {
    /// Row of the moved entity in the destination archetype
    pub new_row: usize,
    /// Entity that was swapped into the vacated source row
    pub swapped: Option<EntityId>,
    /// Values whose type has no column in the destination
    pub dropped: SmallVec<[BoxedComponent; 1]>,
}

/// Archetype: Structure of Arrays storage
pub struct Archetype {
    signature: ArchetypeSignature,
    entities: Vec<EntityId>,
    components: Vec<ComponentColumn>,
    component_indices: FxHashMap<TypeId, usize>,
}

impl Archetype {
    /// Create new archetype with one column per component type
    ///
    /// `infos` must be sorted and free of duplicates.
    pub fn new(infos: &[ComponentInfo], reserve: usize) -> Self {
        let mut archetype = Self {
            signature: infos.iter().map(|info| info.type_id()).collect(),
            entities: Vec::new(),
            components: Vec::with_capacity(infos.len()),
            component_indices: FxHashMap::default(),
        };
        for info in infos {
            archetype
                .component_indices
                .insert(info.type_id(), archetype.components.len());
            archetype.components.push(ComponentColumn::from_info(*info));
        }
        archetype.reserve_rows(reserve);
        archetype
    }

    /// Get signature
    pub fn signature(&self) -> &ArchetypeSignature {
        &self.signature
    }

    /// Type tags of every column, in signature order
    pub fn component_infos(&self) -> impl Iterator<Item = ComponentInfo> + '_ {
        self.components.iter().map(|c| c.info())
    }

    pub fn has_column(&self, type_id: TypeId) -> bool {
        self.component_indices.contains_key(&type_id)
    }

    /// Get column immutably
    pub fn get_column(&self, type_id: TypeId) -> Option<&ComponentColumn> {
        let idx = *self.component_indices.get(&type_id)?;
        self.components.get(idx)
    }

    /// Get column mutably
    pub fn get_column_mut(&mut self, type_id: TypeId) -> Option<&mut ComponentColumn> {
        let idx = *self.component_indices.get(&type_id)?;
        self.components.get_mut(idx)
    }

    pub fn get_component<T: Component>(&self, row: usize) -> Option<&T> {
        self.get_column(TypeId::of::<T>())?.get::<T>(row)
    }

    pub fn get_component_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        self.get_column_mut(TypeId::of::<T>())?.get_mut::<T>(row)
    }

    /// Typed slice of one column
    pub fn column_slice<T: Component>(&self) -> Option<&[T]> {
        self.get_column(TypeId::of::<T>())?.as_slice::<T>()
    }

    /// Append a value to its column; the entity is appended separately
    pub(crate) fn push_component<T: Component>(&mut self, value: T) -> Result<()> {
        let column = self.get_column_mut(TypeId::of::<T>()).ok_or_else(|| {
            EcsError::ArchetypeCorruption(format!(
                "archetype has no column for {}",
                std::any::type_name::<T>()
            ))
        })?;
        column.push(value)
    }

    pub(crate) fn push_boxed(&mut self, value: BoxedComponent) -> Result<()> {
        let type_id = value.type_id();
        let name = value.info().name();
        let column = self.get_column_mut(type_id).ok_or_else(|| {
            EcsError::ArchetypeCorruption(format!("archetype has no column for {name}"))
        })?;
        column.push_boxed(value)
    }

    /// Overwrite one value of an existing row
    pub(crate) fn replace_boxed(&mut self, row: usize, value: BoxedComponent) -> Result<()> {
        self.check_row(row)?;
        let name = value.info().name();
        let column = self.get_column_mut(value.type_id()).ok_or_else(|| {
            EcsError::ArchetypeCorruption(format!("archetype has no column for {name}"))
        })?;
        column
            .storage
            .replace_boxed(row, value)
            .map_err(|_| short_column(column, row))
    }

    /// Append the entity of a fully written row and return its index
    pub(crate) fn push_entity(&mut self, entity: EntityId) -> Result<usize> {
        let row = self.entities.len();
        self.entities.push(entity);
        self.verify_row_counts()?;
        Ok(row)
    }

    /// Remove row, dropping its values
    ///
    /// Returns the entity that was swapped into `row`, if any.
    pub(crate) fn remove_row(&mut self, row: usize) -> Result<Option<EntityId>> {
        self.check_row(row)?;
        for column in &mut self.components {
            if !column.storage.swap_remove_drop(row) {
                return Err(short_column(column, row));
            }
        }
        self.entities.swap_remove(row);
        self.verify_row_counts()?;
        Ok(self.entities.get(row).copied())
    }

    /// Remove row, returning its values
    pub(crate) fn take_row(
        &mut self,
        row: usize,
    ) -> Result<(Option<EntityId>, Vec<BoxedComponent>)> {
        self.check_row(row)?;
        let mut values = Vec::with_capacity(self.components.len());
        for column in &mut self.components {
            let value = column
                .storage
                .swap_remove_boxed(row)
                .ok_or_else(|| short_column(column, row))?;
            values.push(value);
        }
        self.entities.swap_remove(row);
        self.verify_row_counts()?;
        Ok((self.entities.get(row).copied(), values))
    }

    /// Clone every value of a row
    pub(crate) fn clone_row(&self, row: usize) -> Result<Vec<BoxedComponent>> {
        self.check_row(row)?;
        self.components
            .iter()
            .map(|column| column.clone_row(row).ok_or_else(|| short_column(column, row)))
            .collect()
    }

    /// Move a row into `dst`
    ///
    /// Values with a matching destination column are moved, the rest are
    /// returned in `dropped`. `on_new_row` writes any columns only the
    /// destination has. Both archetypes keep their columns in lock-step.
    pub(crate) fn migrate_row<F>(
        &mut self,
        row: usize,
        dst: &mut Archetype,
        on_new_row: F,
    ) -> Result<RowMigration>
    where
        F: FnOnce(&mut Archetype) -> Result<()>,
    {
        self.check_row(row)?;
        let entity = self.entities[row];
        let mut dropped = SmallVec::new();

        for column in &mut self.components {
            match dst.get_column_mut(column.info().type_id()) {
                Some(dst_column) => {
                    if !column
                        .storage
                        .move_row_into(row, &mut *dst_column.storage)
                    {
                        return Err(short_column(column, row));
                    }
                }
                None => {
                    let value = column
                        .storage
                        .swap_remove_boxed(row)
                        .ok_or_else(|| short_column(column, row))?;
                    dropped.push(value);
                }
            }
        }
        self.entities.swap_remove(row);

        on_new_row(dst)?;
        let new_row = dst.push_entity(entity)?;
        self.verify_row_counts()?;

        Ok(RowMigration {
            new_row,
            swapped: self.entities.get(row).copied(),
            dropped,
        })
    }

    /// Reserve space for additional rows
    pub fn reserve_rows(&mut self, additional: usize) {
        if self.entities.capacity() - self.entities.len() < additional {
            self.entities.reserve(additional);
            for column in &mut self.components {
                column.storage.reserve(additional);
            }
        }
    }

    /// Fixed-size row windows covering the archetype
    pub fn chunk_ranges(&self, chunk_size: usize) -> impl Iterator<Item = Range<usize>> {
        let len = self.entities.len();
        let chunk_size = chunk_size.max(1);
        (0..len)
            .step_by(chunk_size)
            .map(move |start| start..(start + chunk_size).min(len))
    }

    /// Read-only view of one chunk
    pub fn chunk(&self, range: Range<usize>) -> Option<ArchetypeChunk<'_>> {
        if range.start > range.end || range.end > self.entities.len() {
            return None;
        }
        Some(ArchetypeChunk {
            archetype: self,
            range,
        })
    }

    /// Check every column against the entity array
    pub fn verify_row_counts(&self) -> Result<()> {
        let rows = self.entities.len();
        for column in &self.components {
            if column.len() != rows {
                return Err(EcsError::ArchetypeCorruption(format!(
                    "column {} holds {} values for {rows} entities",
                    column.info().name(),
                    column.len()
                )));
            }
        }
        Ok(())
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.entities.len() {
            return Err(EcsError::ArchetypeCorruption(format!(
                "row {row} out of bounds for archetype with {} entities",
                self.entities.len()
            )));
        }
        Ok(())
    }

    /// Get all entities
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if archetype is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.components.len()
    }
}

fn short_column(column: &ComponentColumn, row: usize) -> EcsError {
    EcsError::ArchetypeCorruption(format!(
        "column {} has no value at row {row}",
        column.info().name()
    ))
}

/// A contiguous window of rows inside one archetype
pub struct ArchetypeChunk<'a> {
    archetype: &'a Archetype,
    range: Range<usize>,
}

impl<'a> ArchetypeChunk<'a> {
    pub fn entities(&self) -> &'a [EntityId] {
        &self.archetype.entities[self.range.clone()]
    }

    pub fn column<T: Component>(&self) -> Option<&'a [T]> {
        self.archetype
            .column_slice::<T>()
            .map(|slice| &slice[self.range.clone()])
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
