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

//! Component and Bundle traits
//!
//! Components are plain value records attached to entities.
//! Bundles group multiple components for creation.
//! Boxed components carry a single value whose type is only known at runtime,
//! which is how entity snapshots move between worlds.

use std::any::{Any, TypeId};
use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::archetype::{Archetype, ColumnStorage};
use crate::error::Result;

/// Maximum number of components supported by Bundle implementations
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for components
///
/// Components must be 'static (no borrowed data) and cloneable so an
/// entity's values can be snapshotted.
pub trait Component: 'static + Send + Sync + Clone {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync + Clone> Component for T {}

/// Runtime type tag of a component
#[derive(Clone, Copy)]
pub struct ComponentInfo {
    type_id: TypeId,
    name: &'static str,
    new_column: fn() -> Box<dyn ColumnStorage>,
}

impl ComponentInfo {
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            new_column: new_column_of::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    pub(crate) fn new_column(&self) -> Box<dyn ColumnStorage> {
        (self.new_column)()
    }
}

fn new_column_of<T: Component>() -> Box<dyn ColumnStorage> {
    Box::new(Vec::<T>::new())
}

impl PartialEq for ComponentInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentInfo {}

impl PartialOrd for ComponentInfo {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.type_id.cmp(&other.type_id)
    }
}

impl std::hash::Hash for ComponentInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Object-safe view of a component value
pub trait ComponentValue: Any + Send + Sync {
    fn component_info(&self) -> ComponentInfo;
    fn clone_boxed(&self) -> Box<dyn ComponentValue>;
    fn as_any(&self) -> &dyn Any;
    fn into_any_box(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Component> ComponentValue for T {
    fn component_info(&self) -> ComponentInfo {
        ComponentInfo::of::<T>()
    }

    fn clone_boxed(&self) -> Box<dyn ComponentValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_box(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// An owned component value tagged with its type
///
/// Wrapping is idempotent: `BoxedComponent::new` on a `BoxedComponent`
/// returns it unchanged, and `World::add`/`World::insert` route a boxed value
/// to the column of the type it carries. Inside a `Bundle` tuple the wrapper
/// is stored as a component type of its own; use `ComponentSnapshot` with
/// `World::spawn_snapshot` to create entities from boxed values.
pub struct BoxedComponent(Box<dyn ComponentValue>);

impl BoxedComponent {
    pub fn new<T: Component>(value: T) -> Self {
        let mut slot = Some(value);
        if let Some(inner) = (&mut slot as &mut dyn Any).downcast_mut::<Option<BoxedComponent>>() {
            if let Some(inner) = inner.take() {
                return inner;
            }
        }
        match slot {
            Some(value) => Self(Box::new(value)),
            // emptied only when it held a BoxedComponent
            None => unreachable!("boxed component slot was taken"),
        }
    }

    pub fn info(&self) -> ComponentInfo {
        self.0.component_info()
    }

    pub fn type_id(&self) -> TypeId {
        self.info().type_id()
    }

    pub fn is<T: Component>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Take the concrete value out, or hand the box back on type mismatch
    pub fn downcast<T: Component>(self) -> std::result::Result<T, Self> {
        if !self.is::<T>() {
            return Err(self);
        }
        match self.0.into_any_box().downcast::<T>() {
            Ok(value) => Ok(*value),
            // type id was checked above
            Err(_) => unreachable!("type id matched but downcast failed"),
        }
    }
}

impl Clone for BoxedComponent {
    fn clone(&self) -> Self {
        Self(self.0.clone_boxed())
    }
}

impl fmt::Debug for BoxedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxedComponent")
            .field(&self.info().short_name())
            .finish()
    }
}

/// Every component value of one entity
#[derive(Clone, Debug, Default)]
pub struct ComponentSnapshot {
    components: Vec<BoxedComponent>,
}

impl ComponentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Component>(&mut self, value: T) {
        self.components.push(BoxedComponent::new(value));
    }

    pub fn push_boxed(&mut self, value: BoxedComponent) {
        self.components.push(value);
    }

    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Typed lookup
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.components.iter().find_map(|c| c.downcast_ref::<T>())
    }

    pub fn contains<T: Component>(&self) -> bool {
        self.components.iter().any(|c| c.is::<T>())
    }

    pub fn infos(&self) -> impl Iterator<Item = ComponentInfo> + '_ {
        self.components.iter().map(|c| c.info())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoxedComponent> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl IntoIterator for ComponentSnapshot {
    type Item = BoxedComponent;
    type IntoIter = std::vec::IntoIter<BoxedComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.into_iter()
    }
}

impl FromIterator<BoxedComponent> for ComponentSnapshot {
    fn from_iter<I: IntoIterator<Item = BoxedComponent>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

/// Bundle of components
///
/// Allows creating entities with multiple components at once.
pub trait Bundle: Send + Sync + 'static {
    /// Type tags of all components in bundle, in declaration order
    fn component_infos() -> SmallVec<[ComponentInfo; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Append every component to its column of `archetype`
    fn push_into(self, archetype: &mut Archetype) -> Result<()>;
}

// Macro for tuple Bundle implementations
macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn component_infos() -> SmallVec<[ComponentInfo; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(ComponentInfo::of::<$T>()),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn push_into(self, archetype: &mut Archetype) -> Result<()> {
                let ($($T,)*) = self;
                $(archetype.push_component($T)?;)*
                Ok(())
            }
        }
    };
}

// Empty bundle creates an entity with no components
impl_bundle!();
impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
