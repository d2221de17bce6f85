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

//! Tick scheduler
//!
//! Systems run in registration order, one at a time. Each tick moves through
//! `Idle -> BeforeUpdate -> Update -> Idle`; deferred commands queued by a
//! system are applied before the next system starts, so later systems see
//! every structural change made earlier in the same tick.

use std::time::Instant;

use crate::command::CommandBuffer;
use crate::config::ScheduleConfig;
use crate::error::{EcsError, Result};
use crate::profiling::{ExecutionProfile, SystemProfiler, SystemTiming};
use crate::system::{BoxedSystem, System, SystemContext};
use crate::time::FrameTime;
use crate::World;

/// Where the scheduler is within the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    BeforeUpdate,
    Update,
    /// Terminal
    Disposed,
}

/// Ordered list of systems driven once per external frame
pub struct Schedule {
    systems: Vec<BoxedSystem>,
    state: SchedulerState,
    config: ScheduleConfig,
    commands: CommandBuffer,
    profiler: SystemProfiler,
    last_profile: Option<ExecutionProfile>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule {
    /// Create an empty schedule
    pub fn new() -> Self {
        Self::with_config(ScheduleConfig::default())
    }

    pub fn with_config(config: ScheduleConfig) -> Self {
        Self {
            systems: Vec::new(),
            state: SchedulerState::Idle,
            config,
            commands: CommandBuffer::new(),
            profiler: SystemProfiler::new(),
            last_profile: None,
        }
    }

    /// Convenience constructor for chaining
    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.add_system(system);
        self
    }

    /// Append a system; it runs after every system added before it
    pub fn add_system(&mut self, system: impl System + 'static) {
        self.add_boxed_system(Box::new(system));
    }

    pub fn add_boxed_system(&mut self, system: BoxedSystem) {
        tracing::debug!(system = system.name(), index = self.systems.len(), "registered system");
        self.systems.push(system);
    }

    /// Advance the frame clock and let every system prepare the tick
    ///
    /// Inserts a [`FrameTime`] resource on first use.
    pub fn before_update(&mut self, world: &mut World, dt: f32) -> Result<()> {
        if self.state == SchedulerState::Disposed {
            return Err(EcsError::SchedulerDisposed);
        }

        let time = {
            let time = world.resource_or_default::<FrameTime>();
            time.advance(dt);
            *time
        };
        for system in &mut self.systems {
            system.before_update(&time);
        }

        self.state = SchedulerState::BeforeUpdate;
        Ok(())
    }

    /// Run every system's update in registration order
    ///
    /// Runs [`Schedule::before_update`] with `dt` first unless it already ran
    /// for this tick. The first failing system aborts the tick and its error
    /// is returned wrapped in [`EcsError::SystemFailed`].
    pub fn update(&mut self, world: &mut World, dt: f32) -> Result<()> {
        match self.state {
            SchedulerState::Disposed => return Err(EcsError::SchedulerDisposed),
            SchedulerState::BeforeUpdate => {}
            SchedulerState::Idle | SchedulerState::Update => self.before_update(world, dt)?,
        }
        self.state = SchedulerState::Update;

        let result = self.run_systems(world);
        self.state = SchedulerState::Idle;
        result
    }

    /// `before_update` followed by `update`
    pub fn tick(&mut self, world: &mut World, dt: f32) -> Result<()> {
        self.before_update(world, dt)?;
        self.update(world, dt)
    }

    fn run_systems(&mut self, world: &mut World) -> Result<()> {
        let time = world.resource::<FrameTime>().copied().unwrap_or_default();
        let frame_start = Instant::now();
        let mut timings = Vec::with_capacity(self.systems.len());

        for system in &mut self.systems {
            let name = system.name();

            #[cfg(feature = "profiling")]
            let _span = tracing::info_span!("system.update", system = name).entered();

            let start = Instant::now();
            let result = {
                let mut ctx = SystemContext::new(time, &mut self.commands);
                system.update(world, &mut ctx)
            };
            let result = result.and_then(|()| self.commands.apply(world).map(|_| ()));

            if let Err(err) = result {
                self.commands.clear();
                tracing::error!(system = name, error = %err, "system failed, aborting tick");
                return Err(EcsError::SystemFailed {
                    system: name,
                    source: Box::new(err),
                });
            }

            let duration = start.elapsed();
            if self.config.profile_systems {
                self.profiler.record_execution(name, duration);
            }
            timings.push(SystemTiming { name, duration });
        }

        if self.config.validate_after_tick {
            world.validate()?;
        }

        self.last_profile = Some(ExecutionProfile {
            total_frame_time: frame_start.elapsed(),
            system_timings: timings,
        });
        Ok(())
    }

    /// Dispose every system; the schedule rejects further ticks
    pub fn dispose(&mut self) {
        if self.state == SchedulerState::Disposed {
            return;
        }
        for system in &mut self.systems {
            system.dispose();
        }
        self.commands.clear();
        self.state = SchedulerState::Disposed;
        tracing::debug!(systems = self.systems.len(), "disposed schedule");
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Pairs of systems whose declared access overlaps with a write
    pub fn conflicting_pairs(&self) -> Vec<(&'static str, &'static str)> {
        let accesses: Vec<_> = self.systems.iter().map(|s| (s.name(), s.access())).collect();
        let mut pairs = Vec::new();
        for (i, (name_a, access_a)) in accesses.iter().enumerate() {
            for (name_b, access_b) in &accesses[i + 1..] {
                if access_a.conflicts_with(access_b) {
                    pairs.push((*name_a, *name_b));
                }
            }
        }
        pairs
    }

    pub fn profiler(&self) -> &SystemProfiler {
        &self.profiler
    }

    /// Timings of the last completed update
    pub fn last_profile(&self) -> Option<&ExecutionProfile> {
        self.last_profile.as_ref()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
