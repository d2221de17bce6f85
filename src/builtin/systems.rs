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

//! Movement integration and host synchronization.

use glam::Vec2;

use super::components::{InstanceHandle, Node2D, Velocity2D};
use crate::error::Result;
use crate::query::QueryState;
use crate::system::{System, SystemAccess, SystemContext};
use crate::World;

/// Integrates `Node2D::position` by `Velocity2D::velocity` every tick
pub struct MovementSystem {
    query: QueryState<(&'static mut Node2D, &'static Velocity2D)>,
}

impl Default for MovementSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementSystem {
    pub fn new() -> Self {
        Self {
            query: QueryState::new(),
        }
    }
}

impl System for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn access(&self) -> SystemAccess {
        self.query.access()
    }

    fn update(&mut self, world: &mut World, ctx: &mut SystemContext<'_>) -> Result<()> {
        let dt = ctx.delta();
        for (node, velocity) in self.query.iter_mut(world)? {
            node.position += velocity.velocity * dt;
        }
        Ok(())
    }
}

/// New position for one host instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransformUpdate {
    pub instance: InstanceHandle,
    pub position: Vec2,
}

/// World resource the host drains once per frame
///
/// Holds the updates of the latest sync only; undrained updates are
/// discarded by the next sync.
#[derive(Debug, Default)]
pub struct NodeSyncBuffer {
    updates: Vec<NodeTransformUpdate>,
}

impl NodeSyncBuffer {
    pub fn push(&mut self, update: NodeTransformUpdate) {
        self.updates.push(update);
    }

    pub fn clear(&mut self) {
        self.updates.clear();
    }

    pub fn updates(&self) -> &[NodeTransformUpdate] {
        &self.updates
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, NodeTransformUpdate> {
        self.updates.drain(..)
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Publishes the position of every instantiated `Node2D`
///
/// Nodes without an instance handle are skipped.
pub struct SyncNode2DSystem {
    query: QueryState<&'static Node2D>,
}

impl Default for SyncNode2DSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncNode2DSystem {
    pub fn new() -> Self {
        Self {
            query: QueryState::new(),
        }
    }
}

impl System for SyncNode2DSystem {
    fn name(&self) -> &'static str {
        "sync_node2d"
    }

    fn access(&self) -> SystemAccess {
        self.query.access()
    }

    fn update(&mut self, world: &mut World, _ctx: &mut SystemContext<'_>) -> Result<()> {
        let updates: Vec<_> = self
            .query
            .iter(world)?
            .filter_map(|node| {
                node.instance.map(|instance| NodeTransformUpdate {
                    instance,
                    position: node.position,
                })
            })
            .collect();

        let buffer = world.resource_or_default::<NodeSyncBuffer>();
        buffer.clear();
        for update in updates {
            buffer.push(update);
        }
        Ok(())
    }
}
