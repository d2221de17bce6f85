#[cfg(test)]
mod world_crud_tests {
    use composition_ecs::prelude::*;
    use glam::Vec2;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(i32);

    #[derive(Debug, Clone, PartialEq)]
    struct Name(String);

    /// Test: get_all_components returns exactly what create was given
    #[test]
    fn test_snapshot_matches_created_set() {
        let mut world = World::new();
        let entity = world
            .create((Health(10), Name("crate".into()), Node2D::new(Vec2::X)))
            .unwrap();

        let snapshot = world.get_all_components(entity).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get::<Health>(), Some(&Health(10)));
        assert_eq!(snapshot.get::<Name>(), Some(&Name("crate".into())));
        assert_eq!(snapshot.get::<Node2D>(), Some(&Node2D::new(Vec2::X)));
        assert!(!snapshot.contains::<Velocity2D>());
    }

    /// Test: duplicate add and missing remove are typed failures
    #[test]
    fn test_duplicate_and_missing_component() {
        let mut world = World::new();
        let entity = world.create((Health(1),)).unwrap();

        assert!(matches!(
            world.add(entity, Health(2)),
            Err(EcsError::DuplicateComponent { .. })
        ));
        assert_eq!(world.get::<Health>(entity), Ok(&Health(1)));

        assert!(matches!(
            world.remove::<Name>(entity),
            Err(EcsError::ComponentNotFound { .. })
        ));
        assert!(matches!(
            world.get::<Name>(entity),
            Err(EcsError::ComponentNotFound { .. })
        ));
        assert!(matches!(
            world.set(entity, Name("x".into())),
            Err(EcsError::ComponentNotFound { .. })
        ));
        world.validate().unwrap();
    }

    /// Test: duplicate types inside one bundle are rejected before allocation
    #[test]
    fn test_create_rejects_duplicate_bundle_types() {
        let mut world = World::new();
        assert!(matches!(
            world.create((Health(1), Health(2))),
            Err(EcsError::DuplicateComponent { .. })
        ));
        assert_eq!(world.entity_count(), 0);
    }

    /// Test: every operation on a destroyed entity reports EntityNotFound
    #[test]
    fn test_destroyed_entity_is_gone_everywhere() {
        let mut world = World::new();
        let entity = world.create((Health(5), Name("a".into()))).unwrap();
        world.destroy(entity).unwrap();

        assert_eq!(world.destroy(entity), Err(EcsError::EntityNotFound));
        assert_eq!(world.get::<Health>(entity), Err(EcsError::EntityNotFound));
        assert_eq!(world.get_mut::<Health>(entity), Err(EcsError::EntityNotFound));
        assert_eq!(world.set(entity, Health(1)), Err(EcsError::EntityNotFound));
        assert_eq!(world.has::<Health>(entity), Err(EcsError::EntityNotFound));
        assert_eq!(world.add(entity, 3u8), Err(EcsError::EntityNotFound));
        assert_eq!(world.remove::<Health>(entity), Err(EcsError::EntityNotFound));
        assert!(world.get_all_components(entity).is_err());
    }

    /// Test: a recycled slot never resolves the stale handle
    #[test]
    fn test_stale_handle_after_recycle() {
        let mut world = World::new();
        let old = world.create((Health(1),)).unwrap();
        world.destroy(old).unwrap();
        let new = world.create((Health(2),)).unwrap();

        assert_ne!(old, new);
        assert_eq!(world.get::<Health>(old), Err(EcsError::EntityNotFound));
        assert_eq!(world.get::<Health>(new), Ok(&Health(2)));
    }

    /// Test: destroy via swap-with-last keeps the moved entity addressable
    #[test]
    fn test_destroy_reindexes_swapped_entity() {
        let mut world = World::new();
        let entities = world
            .create_batch((0..4).map(|i| (Health(i),)))
            .unwrap();

        world.destroy(entities[0]).unwrap();
        assert_eq!(world.location(entities[3]).unwrap().archetype_row, 0);
        for (i, &entity) in entities.iter().enumerate().skip(1) {
            assert_eq!(world.get::<Health>(entity), Ok(&Health(i as i32)));
        }
        world.validate().unwrap();
    }

    /// Test: set and get_mut mutate in place without migration
    #[test]
    fn test_set_does_not_migrate() {
        let mut world = World::new();
        let entity = world.create((Health(1), Name("n".into()))).unwrap();
        let before = world.location(entity).unwrap();

        world.set(entity, Health(7)).unwrap();
        world.get_mut::<Name>(entity).unwrap().0.push('!');
        world.insert(entity, Health(8)).unwrap();

        assert_eq!(world.location(entity).unwrap(), before);
        assert_eq!(world.get::<Health>(entity), Ok(&Health(8)));
        assert_eq!(world.get::<Name>(entity), Ok(&Name("n!".into())));
        assert_eq!(world.archetype_count(), 2);
    }

    #[test]
    fn test_resources() {
        let mut world = World::new();
        assert!(world.insert_resource(Health(3)).is_none());
        assert_eq!(world.insert_resource(Health(4)), Some(Health(3)));
        world.resource_mut::<Health>().unwrap().0 += 1;
        assert_eq!(world.resource::<Health>(), Some(&Health(5)));
        assert_eq!(world.remove_resource::<Health>(), Some(Health(5)));
        assert!(!world.has_resource::<Health>());
    }

    #[test]
    fn test_archetype_limit() {
        let mut world = World::with_config(WorldConfig::default().with_archetype_limit(2));
        world.create((Health(1),)).unwrap();
        assert!(matches!(
            world.create((Name("x".into()),)),
            Err(EcsError::ArchetypeLimitExceeded { limit: 2 })
        ));
        world.validate().unwrap();
    }
}
