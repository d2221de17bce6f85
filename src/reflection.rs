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

//! Statically declared component property tables
//!
//! Editors address component fields by name. Each component lists the fields
//! it exports with [`component_properties!`](crate::component_properties),
//! and a [`ComponentRegistry`] maps component names to typed accessors so
//! properties can be read, written and used to build components at runtime.

use std::collections::BTreeMap;

use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::component::{BoxedComponent, Component, ComponentInfo};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::world::World;

/// Kind of value a property holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    Vector2,
    String,
    Handle,
}

impl PropertyKind {
    pub const fn name(self) -> &'static str {
        match self {
            PropertyKind::Bool => "bool",
            PropertyKind::Int => "int",
            PropertyKind::Float => "float",
            PropertyKind::Vector2 => "Vector2",
            PropertyKind::String => "String",
            PropertyKind::Handle => "handle",
        }
    }
}

/// Dynamic property value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum PropertyValue {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Vector2(Vec2),
    String(String),
    Handle(u64),
}

/// Exported property: name and kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub kind: PropertyKind,
}

impl PropertyInfo {
    pub const fn new(name: &'static str, kind: PropertyKind) -> Self {
        Self { name, kind }
    }
}

/// Field types that convert to and from [`PropertyValue`]
pub trait PropertyField: Sized {
    const KIND: PropertyKind;

    fn to_property(&self) -> PropertyValue;

    /// `None` when the value has an incompatible kind
    fn from_property(value: &PropertyValue) -> Option<Self>;
}

impl PropertyField for bool {
    const KIND: PropertyKind = PropertyKind::Bool;

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Bool(*self)
    }

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

macro_rules! impl_int_field {
    ($($t:ty),*) => {
        $(
            impl PropertyField for $t {
                const KIND: PropertyKind = PropertyKind::Int;

                fn to_property(&self) -> PropertyValue {
                    PropertyValue::Int(i64::from(*self))
                }

                fn from_property(value: &PropertyValue) -> Option<Self> {
                    match value {
                        PropertyValue::Int(i) => <$t>::try_from(*i).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_int_field!(i32, i64, u32);

impl PropertyField for f32 {
    const KIND: PropertyKind = PropertyKind::Float;

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Float(f64::from(*self))
    }

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Float(f) => Some(*f as f32),
            PropertyValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }
}

impl PropertyField for f64 {
    const KIND: PropertyKind = PropertyKind::Float;

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Float(*self)
    }

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl PropertyField for Vec2 {
    const KIND: PropertyKind = PropertyKind::Vector2;

    fn to_property(&self) -> PropertyValue {
        PropertyValue::Vector2(*self)
    }

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Vector2(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyField for String {
    const KIND: PropertyKind = PropertyKind::String;

    fn to_property(&self) -> PropertyValue {
        PropertyValue::String(self.clone())
    }

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Absent values map to `Nil`
impl<T: PropertyField> PropertyField for Option<T> {
    const KIND: PropertyKind = T::KIND;

    fn to_property(&self) -> PropertyValue {
        match self {
            Some(value) => value.to_property(),
            None => PropertyValue::Nil,
        }
    }

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Nil => Some(None),
            other => T::from_property(other).map(Some),
        }
    }
}

/// A component with a statically declared property table
pub trait ComponentProperties: Component + Default {
    /// Name editors use to address the component
    const COMPONENT_NAME: &'static str;

    fn property_list() -> &'static [PropertyInfo];

    fn get_property(&self, name: &str) -> Option<PropertyValue>;

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<()>;
}

/// Implement [`ComponentProperties`] from a list of exported fields
///
/// Only the listed fields are exported; leave a field out to keep it hidden
/// from editors.
///
/// ```
/// use composition_ecs::component_properties;
/// use composition_ecs::reflection::{ComponentProperties, PropertyValue};
///
/// #[derive(Clone, Default)]
/// struct Health {
///     current: i32,
///     regen: f32,
///     cache: u64,
/// }
///
/// component_properties!(Health as "Health" { current: i32, regen: f32 });
///
/// let mut health = Health::default();
/// health.set_property("current", &PropertyValue::Int(10)).unwrap();
/// assert_eq!(health.get_property("current"), Some(PropertyValue::Int(10)));
/// assert!(health.get_property("cache").is_none());
/// assert_eq!(Health::property_list().len(), 2);
/// ```
#[macro_export]
macro_rules! component_properties {
    ($ty:ty as $name:literal { $($field:ident : $field_ty:ty),* $(,)? }) => {
        impl $crate::reflection::ComponentProperties for $ty {
            const COMPONENT_NAME: &'static str = $name;

            fn property_list() -> &'static [$crate::reflection::PropertyInfo] {
                const PROPERTIES: &[$crate::reflection::PropertyInfo] = &[
                    $($crate::reflection::PropertyInfo::new(
                        stringify!($field),
                        <$field_ty as $crate::reflection::PropertyField>::KIND,
                    )),*
                ];
                PROPERTIES
            }

            fn get_property(&self, name: &str) -> Option<$crate::reflection::PropertyValue> {
                $(
                    if name == stringify!($field) {
                        return Some($crate::reflection::PropertyField::to_property(&self.$field));
                    }
                )*
                None
            }

            fn set_property(
                &mut self,
                name: &str,
                value: &$crate::reflection::PropertyValue,
            ) -> $crate::error::Result<()> {
                $(
                    if name == stringify!($field) {
                        self.$field =
                            <$field_ty as $crate::reflection::PropertyField>::from_property(value)
                                .ok_or_else(|| $crate::error::EcsError::PropertyTypeMismatch {
                                    component: $name,
                                    property: name.to_string(),
                                    expected: <$field_ty as $crate::reflection::PropertyField>::KIND
                                        .name(),
                                })?;
                        return Ok(());
                    }
                )*
                let _ = value;
                Err($crate::error::EcsError::UnknownProperty {
                    component: $name,
                    property: name.to_string(),
                })
            }
        }
    };
}

/// Property values keyed by property name
pub type PropertyMap = BTreeMap<String, PropertyValue>;

struct Registration {
    info: ComponentInfo,
    property_list: fn() -> &'static [PropertyInfo],
    get: fn(&World, EntityId, &str) -> Result<PropertyValue>,
    set: fn(&mut World, EntityId, &str, &PropertyValue) -> Result<()>,
    add_default: fn(&mut World, EntityId) -> Result<()>,
    build: fn(&PropertyMap) -> Result<BoxedComponent>,
}

fn get_on_entity<T: ComponentProperties>(
    world: &World,
    entity: EntityId,
    property: &str,
) -> Result<PropertyValue> {
    world
        .get::<T>(entity)?
        .get_property(property)
        .ok_or_else(|| EcsError::UnknownProperty {
            component: T::COMPONENT_NAME,
            property: property.to_string(),
        })
}

fn set_on_entity<T: ComponentProperties>(
    world: &mut World,
    entity: EntityId,
    property: &str,
    value: &PropertyValue,
) -> Result<()> {
    world.get_mut::<T>(entity)?.set_property(property, value)
}

fn add_default_to<T: ComponentProperties>(world: &mut World, entity: EntityId) -> Result<()> {
    world.add(entity, T::default())
}

fn build_from<T: ComponentProperties>(properties: &PropertyMap) -> Result<BoxedComponent> {
    let mut component = T::default();
    for (name, value) in properties {
        component.set_property(name, value)?;
    }
    Ok(BoxedComponent::new(component))
}

/// Name-addressed access to registered component types
#[derive(Default)]
pub struct ComponentRegistry {
    registrations: AHashMap<&'static str, Registration>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the builtin scene components
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register::<crate::builtin::Node2D>()
            .register::<crate::builtin::Velocity2D>();
        registry
    }

    pub fn register<T: ComponentProperties>(&mut self) -> &mut Self {
        let previous = self.registrations.insert(
            T::COMPONENT_NAME,
            Registration {
                info: ComponentInfo::of::<T>(),
                property_list: T::property_list,
                get: get_on_entity::<T>,
                set: set_on_entity::<T>,
                add_default: add_default_to::<T>,
                build: build_from::<T>,
            },
        );
        if previous.is_some() {
            tracing::warn!(component = T::COMPONENT_NAME, "component registered twice");
        }
        self
    }

    fn registration(&self, component: &str) -> Result<&Registration> {
        self.registrations
            .get(component)
            .ok_or_else(|| EcsError::UnknownComponent(component.to_string()))
    }

    pub fn contains(&self, component: &str) -> bool {
        self.registrations.contains_key(component)
    }

    /// Registered component names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.registrations.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn info(&self, component: &str) -> Result<ComponentInfo> {
        Ok(self.registration(component)?.info)
    }

    pub fn property_list(&self, component: &str) -> Result<&'static [PropertyInfo]> {
        Ok((self.registration(component)?.property_list)())
    }

    pub fn get_property(
        &self,
        world: &World,
        entity: EntityId,
        component: &str,
        property: &str,
    ) -> Result<PropertyValue> {
        (self.registration(component)?.get)(world, entity, property)
    }

    pub fn set_property(
        &self,
        world: &mut World,
        entity: EntityId,
        component: &str,
        property: &str,
        value: &PropertyValue,
    ) -> Result<()> {
        (self.registration(component)?.set)(world, entity, property, value)
    }

    /// Attach a default-valued component by name
    pub fn add_default(&self, world: &mut World, entity: EntityId, component: &str) -> Result<()> {
        (self.registration(component)?.add_default)(world, entity)
    }

    /// Build a component value from property values
    ///
    /// Properties not in the map keep their default.
    pub fn build(&self, component: &str, properties: &PropertyMap) -> Result<BoxedComponent> {
        (self.registration(component)?.build)(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Sprite {
        visible: bool,
        frame: u32,
        offset: Vec2,
        label: Option<String>,
        cache: u64,
    }

    crate::component_properties!(Sprite as "Sprite" {
        visible: bool,
        frame: u32,
        offset: Vec2,
        label: Option<String>,
    });

    #[test]
    fn test_property_list_is_declaration_order() {
        let names: Vec<_> = Sprite::property_list().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["visible", "frame", "offset", "label"]);
        assert_eq!(Sprite::property_list()[2].kind, PropertyKind::Vector2);
    }

    #[test]
    fn test_set_property_checks_kind() {
        let mut sprite = Sprite::default();
        sprite
            .set_property("offset", &PropertyValue::Vector2(Vec2::new(1.0, 2.0)))
            .unwrap();
        assert_eq!(sprite.offset, Vec2::new(1.0, 2.0));

        let err = sprite
            .set_property("frame", &PropertyValue::String("x".into()))
            .unwrap_err();
        assert_eq!(
            err,
            EcsError::PropertyTypeMismatch {
                component: "Sprite",
                property: "frame".into(),
                expected: "int",
            }
        );
        assert!(sprite.set_property("frame", &PropertyValue::Int(-1)).is_err());
        assert!(matches!(
            sprite.set_property("cache", &PropertyValue::Int(1)),
            Err(EcsError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_optional_field_uses_nil() {
        let mut sprite = Sprite::default();
        assert_eq!(sprite.get_property("label"), Some(PropertyValue::Nil));
        sprite
            .set_property("label", &PropertyValue::String("hero".into()))
            .unwrap();
        assert_eq!(sprite.label.as_deref(), Some("hero"));
        sprite.set_property("label", &PropertyValue::Nil).unwrap();
        assert_eq!(sprite.label, None);
    }

    #[test]
    fn test_registry_round_trip_on_entity() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Sprite>();

        let mut world = World::new();
        let entity = world.create(()).unwrap();
        registry.add_default(&mut world, entity, "Sprite").unwrap();
        registry
            .set_property(&mut world, entity, "Sprite", "visible", &PropertyValue::Bool(true))
            .unwrap();

        assert_eq!(
            registry.get_property(&world, entity, "Sprite", "visible"),
            Ok(PropertyValue::Bool(true))
        );
        assert!(world.get::<Sprite>(entity).unwrap().visible);
        assert_eq!(
            registry.add_default(&mut world, entity, "Sprite"),
            Err(EcsError::duplicate_component::<Sprite>())
        );
        assert_eq!(
            registry.property_list("Missing"),
            Err(EcsError::UnknownComponent("Missing".into()))
        );
    }

    #[test]
    fn test_build_from_property_map() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Sprite>();

        let mut properties = PropertyMap::new();
        properties.insert("frame".into(), PropertyValue::Int(3));
        let built = registry.build("Sprite", &properties).unwrap();
        let sprite = built.downcast::<Sprite>().unwrap();
        assert_eq!(sprite.frame, 3);
        assert!(!sprite.visible);
    }
}
