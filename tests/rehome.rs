#[cfg(test)]
mod rehome_tests {
    use composition_ecs::prelude::*;
    use glam::Vec2;

    #[derive(Debug, Clone, PartialEq)]
    struct Label(String);

    /// Test: re-parenting moves every value into the other world
    #[test]
    fn test_rehome_moves_all_components() {
        let mut old_parent = World::new();
        let mut new_parent = World::new();
        new_parent.create((Label("sibling".into()),)).unwrap();

        let node = Node2D::new(Vec2::new(3.0, 4.0)).with_template(SceneHandle(11));
        let entity = old_parent
            .create((node.clone(), Velocity2D::new(Vec2::Y), Label("child".into())))
            .unwrap();

        let moved = old_parent.rehome(entity, &mut new_parent).unwrap();

        assert!(!old_parent.contains(entity));
        assert_eq!(old_parent.entity_count(), 0);
        assert_eq!(new_parent.entity_count(), 2);
        assert_eq!(new_parent.get::<Node2D>(moved), Ok(&node));
        assert_eq!(
            new_parent.get::<Velocity2D>(moved),
            Ok(&Velocity2D::new(Vec2::Y))
        );
        assert_eq!(new_parent.get::<Label>(moved), Ok(&Label("child".into())));
        old_parent.validate().unwrap();
        new_parent.validate().unwrap();
    }

    /// Test: a stale handle is a local failure and touches neither world
    #[test]
    fn test_rehome_stale_entity() {
        let mut old_parent = World::new();
        let mut new_parent = World::new();
        let entity = old_parent.create((Label("gone".into()),)).unwrap();
        old_parent.destroy(entity).unwrap();

        assert_eq!(
            old_parent.rehome(entity, &mut new_parent),
            Err(EcsError::EntityNotFound)
        );
        assert_eq!(new_parent.entity_count(), 0);
    }

    /// Test: when the target refuses, the entity stays where it was
    #[test]
    fn test_rehome_target_full() {
        let mut old_parent = World::new();
        let mut new_parent = World::with_config(WorldConfig::default().with_archetype_limit(1));
        let entity = old_parent.create((Label("stay".into()),)).unwrap();

        assert!(matches!(
            old_parent.rehome(entity, &mut new_parent),
            Err(EcsError::ArchetypeLimitExceeded { .. })
        ));
        assert_eq!(old_parent.get::<Label>(entity), Ok(&Label("stay".into())));
    }

    /// Test: take + spawn is the manual form of rehome
    #[test]
    fn test_take_and_spawn_snapshot() {
        let mut world = World::new();
        let entity = world.create((Label("a".into()), 5u32)).unwrap();
        let other = world.create((Label("b".into()), 6u32)).unwrap();

        let snapshot = world.take_all_components(entity).unwrap();
        assert!(!world.contains(entity));
        assert_eq!(world.get::<u32>(other), Ok(&6));
        assert_eq!(snapshot.get::<u32>(), Some(&5));

        let restored = world.spawn_snapshot(snapshot).unwrap();
        assert_eq!(world.get::<Label>(restored), Ok(&Label("a".into())));
        assert_eq!(
            world.location(restored).unwrap().archetype_id,
            world.location(other).unwrap().archetype_id
        );
        world.validate().unwrap();
    }

    #[test]
    fn test_snapshot_with_duplicate_types_is_rejected() {
        let mut world = World::new();
        let snapshot = ComponentSnapshot::new().with(1u8).with(2u8);
        assert!(matches!(
            world.spawn_snapshot(snapshot),
            Err(EcsError::DuplicateComponent { .. })
        ));
        assert_eq!(world.entity_count(), 0);
    }
}
