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

//! Cross-module tests for the world, scheduler and builtin systems

#[cfg(test)]
mod tests {
    #![allow(dead_code)]
    #![allow(clippy::module_inception)]
    use crate::builtin::{MovementSystem, Node2D, Velocity2D};
    use crate::{
        CommandBuffer, EcsError, QueryState, Result, Schedule, ScheduleConfig, System,
        SystemContext, World,
    };
    use glam::Vec2;

    #[test]
    fn test_basic_create_destroy() -> Result<()> {
        let mut world = World::new();

        #[derive(Debug, Clone)]
        struct Position {
            x: f32,
            y: f32,
        }

        let entity = world.create((Position { x: 1.0, y: 2.0 },))?;
        assert!(world.location(entity).is_ok());

        world.destroy(entity)?;
        assert!(world.location(entity).is_err());
        assert_eq!(world.destroy(entity), Err(EcsError::EntityNotFound));
        Ok(())
    }

    #[test]
    fn test_archetype_segregation() {
        let mut world = World::new();

        #[derive(Clone)]
        struct A;
        #[derive(Clone)]
        struct B;
        #[derive(Clone)]
        struct C;

        world.create((A, B)).unwrap();
        world.create((A, C)).unwrap();
        world.create((B, C)).unwrap();
        world.create((A, B, C)).unwrap();
        world.create((C, B, A)).unwrap();

        // empty archetype + four distinct type sets
        assert_eq!(world.archetype_count(), 5);
    }

    #[test]
    fn test_entity_location_tracking() {
        let mut world = World::new();

        #[derive(Clone)]
        struct Comp;

        let entity = world.create((Comp,)).unwrap();
        let location = world.location(entity).unwrap();

        assert_eq!(location.archetype_id, 1); // First non-empty archetype
        assert_eq!(location.archetype_row, 0); // First row
    }

    #[test]
    fn test_recycled_entity_count() -> Result<()> {
        let mut world = World::new();

        #[derive(Clone)]
        struct Comp;

        let e1 = world.create((Comp,))?;
        assert_eq!(world.recycled_entity_count(), 0);

        world.destroy(e1)?;
        assert_eq!(world.recycled_entity_count(), 1);

        let e2 = world.create((Comp,))?;
        assert_eq!(world.recycled_entity_count(), 0);
        assert!(world.contains(e2));
        assert!(!world.contains(e1));
        Ok(())
    }

    #[test]
    fn test_empty_archetype_is_reused() -> Result<()> {
        let mut world = World::new();
        let only = world.create((Node2D::default(), 1u8))?;
        let archetype = world.location(only)?.archetype_id;
        world.destroy(only)?;

        assert!(world.archetypes()[archetype].is_empty());
        world.archetypes()[archetype].verify_row_counts()?;

        let again = world.create((2u8, Node2D::default()))?;
        assert_eq!(world.location(again)?.archetype_id, archetype);
        assert_eq!(world.archetype_count(), 2);
        world.validate()
    }

    /// Adds Velocity2D to every Node2D that lacks one, through the command buffer
    struct Launcher {
        query: QueryState<(crate::Entity, &'static Node2D), crate::Without<Velocity2D>>,
    }

    impl System for Launcher {
        fn name(&self) -> &'static str {
            "launcher"
        }

        fn update(&mut self, world: &mut World, ctx: &mut SystemContext<'_>) -> Result<()> {
            let targets: Vec<_> = self.query.iter(world)?.map(|(e, _)| e).collect();
            for entity in targets {
                ctx.commands()
                    .add_component(entity, Velocity2D::new(Vec2::new(1.0, 0.0)));
            }
            Ok(())
        }
    }

    #[test]
    fn test_structural_change_visible_to_next_system() -> Result<()> {
        let mut world = World::new();
        let entity = world.create((Node2D::default(),))?;

        let mut schedule = Schedule::with_config(ScheduleConfig {
            profile_systems: false,
            validate_after_tick: true,
        })
        .with_system(Launcher {
            query: QueryState::new(),
        })
        .with_system(MovementSystem::new());

        schedule.tick(&mut world, 1.0)?;
        assert_eq!(world.get::<Node2D>(entity)?.position, Vec2::new(1.0, 0.0));

        schedule.tick(&mut world, 1.0)?;
        assert_eq!(world.get::<Node2D>(entity)?.position, Vec2::new(2.0, 0.0));
        Ok(())
    }

    struct Corruptor;

    impl System for Corruptor {
        fn name(&self) -> &'static str {
            "corruptor"
        }

        fn update(&mut self, _world: &mut World, _ctx: &mut SystemContext<'_>) -> Result<()> {
            Err(EcsError::ArchetypeCorruption("simulated".into()))
        }
    }

    #[test]
    fn test_corruption_is_fatal_to_the_tick() {
        let mut world = World::new();
        let mut schedule = Schedule::new()
            .with_system(Corruptor)
            .with_system(MovementSystem::new());

        let err = schedule.tick(&mut world, 1.0).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, EcsError::SystemFailed { system: "corruptor", .. }));
    }

    #[test]
    fn test_command_buffer_outside_scheduler() -> Result<()> {
        let mut world = World::new();
        let mut commands = CommandBuffer::new();
        commands.create((Node2D::default(), Velocity2D::default()));
        commands.create((Node2D::default(),));
        assert_eq!(commands.apply(&mut world)?, 0);

        assert_eq!(world.query::<&Node2D>()?.count(), 2);
        assert_eq!(world.query::<(&Node2D, &Velocity2D)>()?.count(), 1);
        Ok(())
    }
}
