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

//! System trait and access metadata

use smallvec::SmallVec;

use crate::command::CommandBuffer;
use crate::component::ComponentInfo;
use crate::error::Result;
use crate::time::FrameTime;
use crate::World;

/// System access metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemAccess {
    pub reads: SmallVec<[ComponentInfo; 8]>,
    pub writes: SmallVec<[ComponentInfo; 8]>,
}

impl SystemAccess {
    /// Create empty access
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_read(&mut self, info: ComponentInfo) {
        if !self.reads.contains(&info) {
            self.reads.push(info);
        }
    }

    pub fn add_write(&mut self, info: ComponentInfo) {
        if !self.writes.contains(&info) {
            self.writes.push(info);
        }
    }

    /// Merge two accesses (union of all reads/writes)
    pub fn merge(&self, other: &SystemAccess) -> SystemAccess {
        let mut merged = self.clone();
        for read in &other.reads {
            merged.add_read(*read);
        }
        for write in &other.writes {
            merged.add_write(*write);
        }
        merged
    }

    /// Components one side writes while the other reads or writes them
    pub fn conflicts_with(&self, other: &SystemAccess) -> bool {
        let touches = |access: &SystemAccess, info: &ComponentInfo| {
            access.writes.contains(info) || access.reads.contains(info)
        };
        self.writes.iter().any(|w| touches(other, w))
            || other.writes.iter().any(|w| self.reads.contains(w))
    }
}

/// Per-system view of the running tick
pub struct SystemContext<'a> {
    time: FrameTime,
    commands: &'a mut CommandBuffer,
}

impl<'a> SystemContext<'a> {
    pub fn new(time: FrameTime, commands: &'a mut CommandBuffer) -> Self {
        Self { time, commands }
    }

    /// Scaled time step of this tick, in seconds
    pub fn delta(&self) -> f32 {
        self.time.delta()
    }

    pub fn time(&self) -> &FrameTime {
        &self.time
    }

    /// Structural changes applied right after this system returns
    pub fn commands(&mut self) -> &mut CommandBuffer {
        self.commands
    }
}

/// System trait
///
/// A scheduler calls `before_update` on every system, then `update` on each
/// one in registration order. `before_update` sees the frame clock only.
pub trait System: Send + Sync {
    /// Get system name
    fn name(&self) -> &'static str;

    /// Get system access metadata
    fn access(&self) -> SystemAccess {
        SystemAccess::empty()
    }

    fn before_update(&mut self, _time: &FrameTime) {}

    /// Run system logic against the world
    fn update(&mut self, world: &mut World, ctx: &mut SystemContext<'_>) -> Result<()>;

    /// Called once when the scheduler is disposed
    fn dispose(&mut self) {}
}

/// Boxed system
pub type BoxedSystem = Box<dyn System>;
