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

//! 2D scene components.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::reflection::{PropertyField, PropertyKind, PropertyValue};

/// Host handle of a scene template that can be instantiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneHandle(pub u64);

/// Host handle of a live scene instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceHandle(pub u64);

macro_rules! impl_handle_field {
    ($($handle:ident),*) => {
        $(
            impl PropertyField for $handle {
                const KIND: PropertyKind = PropertyKind::Handle;

                fn to_property(&self) -> PropertyValue {
                    PropertyValue::Handle(self.0)
                }

                fn from_property(value: &PropertyValue) -> Option<Self> {
                    match value {
                        PropertyValue::Handle(raw) => Some($handle(*raw)),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_handle_field!(SceneHandle, InstanceHandle);

/// Position of a node in 2D space
///
/// `template` and `position` are editor properties. `instance` is set by the
/// host once the template has been instantiated and is never exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node2D {
    pub template: Option<SceneHandle>,
    pub position: Vec2,
    pub instance: Option<InstanceHandle>,
}

impl Node2D {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_template(mut self, template: SceneHandle) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_instance(mut self, instance: InstanceHandle) -> Self {
        self.instance = Some(instance);
        self
    }

    /// A template is set but the host has not instantiated it yet
    pub fn needs_instance(&self) -> bool {
        self.template.is_some() && self.instance.is_none()
    }
}

crate::component_properties!(Node2D as "Node2D" {
    template: Option<SceneHandle>,
    position: Vec2,
});

/// Linear velocity in units per second
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity2D {
    pub velocity: Vec2,
}

impl Velocity2D {
    pub fn new(velocity: Vec2) -> Self {
        Self { velocity }
    }
}

crate::component_properties!(Velocity2D as "Velocity2D" { velocity: Vec2 });
