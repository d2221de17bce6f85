#[cfg(test)]
mod query_engine_tests {
    use composition_ecs::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(f32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(f32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Frozen;

    fn populate(world: &mut World) {
        world.create((Position(0.0), Velocity(1.0))).unwrap();
        world.create((Position(1.0), Velocity(2.0), Frozen)).unwrap();
        world.create((Position(2.0),)).unwrap();
        world.create((Velocity(3.0),)).unwrap();
    }

    /// Test: requires/excludes select exactly the matching archetypes
    #[test]
    fn test_requires_and_excludes() {
        let mut world = World::new();
        populate(&mut world);

        assert_eq!(world.query::<&Position>().unwrap().len(), 3);
        assert_eq!(world.query::<(&Position, &Velocity)>().unwrap().len(), 2);
        assert_eq!(
            world
                .query_filtered::<(&Position, &Velocity), Without<Frozen>>()
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            world
                .query_filtered::<&Velocity, With<Frozen>>()
                .unwrap()
                .map(|v| v.0)
                .collect::<Vec<_>>(),
            vec![2.0]
        );
    }

    #[test]
    fn test_query_mut_writes_in_place() {
        let mut world = World::new();
        populate(&mut world);

        for (position, velocity) in world
            .query_filtered_mut::<(&mut Position, &Velocity), Without<Frozen>>()
            .unwrap()
        {
            position.0 += velocity.0;
        }

        let mut positions: Vec<f32> = world.query::<&Position>().unwrap().map(|p| p.0).collect();
        positions.sort_by(f32::total_cmp);
        assert_eq!(positions, vec![1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_optional_fetch() {
        let mut world = World::new();
        populate(&mut world);

        let with_velocity = world
            .query::<(&Position, Option<&Velocity>)>()
            .unwrap()
            .filter(|(_, velocity)| velocity.is_some())
            .count();
        assert_eq!(with_velocity, 2);
    }

    #[test]
    fn test_aliased_mutable_access_is_rejected() {
        let mut world = World::new();
        populate(&mut world);

        assert!(matches!(
            world.query_mut::<(&mut Position, &Position)>().map(|it| it.count()),
            Err(EcsError::QueryAccessConflict { .. })
        ));
        assert!(matches!(
            QueryDescriptor::new()
                .write::<Position>()
                .write::<Position>()
                .validate(),
            Err(EcsError::QueryAccessConflict { .. })
        ));
    }

    /// Test: cached state picks up archetypes created after the first run
    #[test]
    fn test_query_state_tracks_new_archetypes() {
        let mut world = World::new();
        let mut state = QueryState::<&Position>::new();

        world.create((Position(1.0),)).unwrap();
        assert_eq!(state.iter(&world).unwrap().count(), 1);
        assert_eq!(state.matched_archetype_count(), 1);

        world.create((Position(2.0), Frozen)).unwrap();
        assert_eq!(state.iter(&world).unwrap().count(), 2);
        assert_eq!(state.matched_archetype_count(), 2);

        world.clear();
        assert_eq!(state.iter(&world).unwrap().count(), 0);
        assert_eq!(state.matched_archetype_count(), 0);
    }

    /// Test: cached archetype ids never leak from one world into another
    #[test]
    fn test_query_state_switches_worlds() {
        let mut first = World::new();
        first.create((Position(1.0),)).unwrap();
        first.create((Position(2.0), Frozen)).unwrap();

        let mut second = World::new();
        second.create((Velocity(0.0),)).unwrap();
        second.create((Frozen,)).unwrap();
        second.create((Position(5.0), Velocity(1.0))).unwrap();

        let mut state = QueryState::<&mut Position>::new();
        assert_eq!(state.iter_mut(&mut first).unwrap().count(), 2);

        let seen: Vec<f32> = state.iter_mut(&mut second).unwrap().map(|p| p.0).collect();
        assert_eq!(seen, vec![5.0]);
        assert_eq!(state.matched_archetype_count(), 1);

        assert_eq!(state.iter_mut(&mut first).unwrap().count(), 2);
    }

    #[test]
    fn test_runtime_descriptor_rows() {
        let mut world = World::new();
        populate(&mut world);

        let descriptor = QueryDescriptor::from_sets(
            &[ComponentInfo::of::<Position>()],
            &[ComponentInfo::of::<Frozen>()],
        );
        let rows: Vec<f32> = world
            .query_rows(&descriptor)
            .unwrap()
            .map(|row| row.get::<Position>().unwrap().0)
            .collect();
        assert_eq!(rows.len(), 2);

        let row = world.query_rows(&descriptor).unwrap().next().unwrap();
        assert!(matches!(
            row.get::<Velocity>(),
            Err(EcsError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_row_view_access_modes() {
        let mut world = World::new();
        populate(&mut world);

        let descriptor = QueryDescriptor::new()
            .write::<Position>()
            .read::<Velocity>()
            .without::<Frozen>();

        let visited = world
            .for_each_row(&descriptor, |mut row| {
                let velocity = row.get::<Velocity>()?.0;
                row.get_mut::<Position>()?.0 += velocity * 10.0;
                assert!(matches!(
                    row.get_mut::<Velocity>(),
                    Err(EcsError::AccessDenied { .. })
                ));
                Ok(())
            })
            .unwrap();
        assert_eq!(visited, 1);

        let moved = world
            .query_filtered::<&Position, With<Velocity>>()
            .unwrap()
            .any(|p| p.0 == 10.0);
        assert!(moved);
    }

    #[test]
    fn test_callback_error_stops_iteration() {
        let mut world = World::new();
        populate(&mut world);

        let descriptor = QueryDescriptor::new().read::<Position>();
        let mut calls = 0;
        let result = world.for_each_row(&descriptor, |_| {
            calls += 1;
            Err(EcsError::EntityNotFound)
        });
        assert_eq!(result, Err(EcsError::EntityNotFound));
        assert_eq!(calls, 1);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_iteration_matches_sequential() {
        let mut world = World::with_config(WorldConfig::default().with_chunk_size(64));
        world
            .create_batch((0..1_000).map(|i| (Position(i as f32), Velocity(1.0))))
            .unwrap();

        let mut state = QueryState::<(&mut Position, &Velocity)>::new();
        state
            .par_for_each_mut(&mut world, |(position, velocity)| {
                position.0 += velocity.0;
            })
            .unwrap();

        let sum: f32 = world.query::<&Position>().unwrap().map(|p| p.0).sum();
        assert_eq!(sum, (1..=1_000).sum::<i32>() as f32);
    }
}
