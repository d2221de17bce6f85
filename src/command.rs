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

//! Deferred structural changes
//!
//! Systems queue creates, destroys and component moves here while they
//! iterate; the scheduler applies the buffer once the system returns.

use crate::component::{Bundle, Component};
use crate::entity::EntityId;
use crate::error::Result;
use crate::world::World;

/// Type alias for world mutation closures
pub type CommandClosure = Box<dyn FnOnce(&mut World) -> Result<()> + Send>;

/// Deferred command for world mutations
pub enum Command {
    /// Create entity with closure
    Create(CommandClosure),

    /// Destroy entity
    Destroy(EntityId),

    /// Custom world mutation
    Custom(CommandClosure),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Create(_) => write!(f, "Create(...)"),
            Command::Destroy(e) => f.debug_tuple("Destroy").field(e).finish(),
            Command::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

/// Command buffer for deferred operations
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create new command buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Queue an entity creation
    pub fn create<B: Bundle>(&mut self, bundle: B) {
        self.commands
            .push(Command::Create(Box::new(move |world| world.create(bundle).map(|_| ()))));
    }

    /// Queue destroy command
    pub fn destroy(&mut self, entity: EntityId) {
        self.commands.push(Command::Destroy(entity));
    }

    /// Queue a custom world mutation
    pub fn custom<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + Send + 'static,
    {
        self.commands.push(Command::Custom(Box::new(f)));
    }

    /// Queue add component command
    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) {
        self.custom(move |world| world.add(entity, component));
    }

    /// Queue add-or-overwrite command
    pub fn insert_component<T: Component>(&mut self, entity: EntityId, component: T) {
        self.custom(move |world| world.insert(entity, component));
    }

    /// Queue remove component command
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) {
        self.custom(move |world| world.remove::<T>(entity).map(|_| ()));
    }

    /// Apply all commands in queue order and clear the buffer
    ///
    /// Commands whose target went away (stale entity, duplicate or missing
    /// component) are skipped with a warning and counted in the return value.
    /// A fatal error stops application and drops the remaining commands.
    pub fn apply(&mut self, world: &mut World) -> Result<usize> {
        let mut skipped = 0;
        for command in std::mem::take(&mut self.commands) {
            let result = match command {
                Command::Create(f) | Command::Custom(f) => f(world),
                Command::Destroy(entity) => world.destroy(entity),
            };

            match result {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping deferred command");
                    skipped += 1;
                }
            }
        }
        Ok(skipped)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Get length
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::Key;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);

    #[test]
    fn test_command_buffer() {
        let mut buffer = CommandBuffer::new();
        assert!(buffer.is_empty());

        buffer.destroy(EntityId::null());
        assert_eq!(buffer.len(), 1);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_apply_in_order() {
        let mut world = World::new();
        let entity = world.create((Health(1),)).unwrap();

        let mut buffer = CommandBuffer::with_capacity(4);
        buffer.create((Health(5),));
        buffer.add_component(entity, 3u8);
        buffer.insert_component(entity, Health(2));
        buffer.remove_component::<u8>(entity);

        assert_eq!(buffer.apply(&mut world).unwrap(), 0);
        assert!(buffer.is_empty());
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.get::<Health>(entity).unwrap(), &Health(2));
        assert!(!world.has::<u8>(entity).unwrap());
    }

    #[test]
    fn test_stale_targets_are_skipped() {
        let mut world = World::new();
        let entity = world.create((Health(1),)).unwrap();

        let mut buffer = CommandBuffer::new();
        buffer.destroy(entity);
        buffer.destroy(entity);
        buffer.add_component(entity, 1u8);
        buffer.create((Health(9),));

        assert_eq!(buffer.apply(&mut world).unwrap(), 2);
        assert_eq!(world.entity_count(), 1);
    }
}
