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

//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use composition_ecs::prelude::*;
//! ```

pub use crate::builtin::{
    InstanceHandle, MovementSystem, Node2D, NodeSyncBuffer, NodeTransformUpdate, SceneHandle,
    SyncNode2DSystem, Velocity2D,
};
pub use crate::command::CommandBuffer;
pub use crate::component::{BoxedComponent, Bundle, Component, ComponentInfo, ComponentSnapshot};
pub use crate::config::{ScheduleConfig, WorldConfig};
pub use crate::debug::WorldInspector;
pub use crate::entity::EntityId;
pub use crate::error::{EcsError, Result};
pub use crate::query::{Entity, QueryDescriptor, QueryState, With, Without};
pub use crate::reflection::{
    ComponentProperties, ComponentRegistry, PropertyMap, PropertyValue,
};
pub use crate::schedule::{Schedule, SchedulerState};
pub use crate::system::{System, SystemAccess, SystemContext};
pub use crate::time::FrameTime;
pub use crate::world::World;
