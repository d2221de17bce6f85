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

//! Externally driven frame clock.
//!
//! The core owns no timer: the host passes the time step of each frame to
//! the scheduler, which advances the [`FrameTime`] resource.
//!
//! ```
//! use composition_ecs::time::FrameTime;
//!
//! let mut time = FrameTime::default();
//! time.set_time_scale(0.5);
//! time.advance(0.2);
//! assert_eq!(time.delta(), 0.1);
//! assert_eq!(time.frame_count(), 1);
//! ```

/// Time resource for tracking frame timing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTime {
    /// Scaled time since last frame, in seconds
    delta: f32,
    /// Unscaled time step passed by the host
    raw_delta: f32,
    /// Total scaled time since start
    elapsed: f64,
    frame_count: u64,
    /// Time scale multiplier (1.0 = normal speed)
    time_scale: f32,
}

impl Default for FrameTime {
    fn default() -> Self {
        Self {
            delta: 0.0,
            raw_delta: 0.0,
            elapsed: 0.0,
            frame_count: 0,
            time_scale: 1.0,
        }
    }
}

impl FrameTime {
    /// Start a new frame with the host's time step
    ///
    /// Negative steps are clamped to zero.
    pub fn advance(&mut self, dt: f32) {
        self.raw_delta = dt.max(0.0);
        self.delta = self.raw_delta * self.time_scale;
        self.elapsed += f64::from(self.delta);
        self.frame_count += 1;
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn raw_delta(&self) -> f32 {
        self.raw_delta
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Set time scale (1.0 = normal, 0.5 = half speed, 2.0 = double speed)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn pause(&mut self) {
        self.time_scale = 0.0;
    }

    pub fn resume(&mut self) {
        self.time_scale = 1.0;
    }

    pub fn is_paused(&self) -> bool {
        self.time_scale == 0.0
    }
}
