#![allow(dead_code, unused_imports)]

use composition_ecs::builtin::{
    InstanceHandle, MovementSystem, Node2D, NodeSyncBuffer, SyncNode2DSystem, Velocity2D,
};
use composition_ecs::{Schedule, ScheduleConfig, World};
use glam::Vec2;
use std::time::Instant;

#[cfg(feature = "profiling")]
#[tracing::instrument(skip(world))]
fn populate(world: &mut World, count: usize) -> composition_ecs::Result<()> {
    for i in 0..count {
        if i % 1_000 == 0 {
            tracing::info!("Creating entity {}/{}", i, count);
        }
        let node = Node2D::new(Vec2::new(i as f32, 0.0)).with_instance(InstanceHandle(i as u64));
        world.create((node, Velocity2D::new(Vec2::new(1.0, 0.5))))?;
    }
    Ok(())
}

#[cfg(feature = "profiling")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = composition_ecs::profiling::init_tracing("trace.json")?;

    let mut world = World::new();
    populate(&mut world, 10_000)?;

    let mut schedule = Schedule::with_config(ScheduleConfig {
        profile_systems: true,
        validate_after_tick: false,
    })
    .with_system(MovementSystem::new())
    .with_system(SyncNode2DSystem::new());

    println!("Profiling 600 ticks over 10k nodes...");
    let start = Instant::now();
    for frame in 0..600 {
        let _span = tracing::info_span!("frame", frame).entered();
        schedule.tick(&mut world, 1.0 / 60.0)?;
        if let Some(buffer) = world.resource_mut::<NodeSyncBuffer>() {
            buffer.drain().for_each(drop);
        }
    }
    println!("600 ticks complete in: {:?}", start.elapsed());

    for name in schedule.system_names() {
        if let Some(stats) = schedule.profiler().get_stats(name) {
            println!("{name}: avg {:?} min {:?} max {:?}", stats.avg, stats.min, stats.max);
        }
    }
    Ok(())
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_tick binary requires --features profiling");
}
