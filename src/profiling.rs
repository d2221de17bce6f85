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

//! # Profiling
//!
//! Per-system timings are collected by [`SystemProfiler`] whenever
//! `ScheduleConfig::profile_systems` is set.
//!
//! With the `profiling` feature the world and scheduler also emit `tracing`
//! spans (`world.create`, `world.migrate`, `query.iter_mut`, `system.update`)
//! and [`init_tracing`] installs a subscriber:
//!
//! ```ignore
//! let _guard = composition_ecs::profiling::init_tracing("trace.json")?;
//! ```

use std::time::Duration;

use rustc_hash::FxHashMap;

/// Aggregated timings of one system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemStats {
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
    pub call_count: u64,
}

#[derive(Debug, Clone, Copy)]
struct RunningStats {
    min: Duration,
    max: Duration,
    total: Duration,
    calls: u64,
}

/// System profiler for collecting timing data
#[derive(Debug, Default)]
pub struct SystemProfiler {
    stats: FxHashMap<&'static str, RunningStats>,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_execution(&mut self, system: &'static str, duration: Duration) {
        self.stats
            .entry(system)
            .and_modify(|s| {
                s.min = s.min.min(duration);
                s.max = s.max.max(duration);
                s.total += duration;
                s.calls += 1;
            })
            .or_insert(RunningStats {
                min: duration,
                max: duration,
                total: duration,
                calls: 1,
            });
    }

    pub fn get_stats(&self, system: &str) -> Option<SystemStats> {
        let s = self.stats.get(system)?;
        let divisor = u32::try_from(s.calls).unwrap_or(u32::MAX).max(1);
        Some(SystemStats {
            min: s.min,
            max: s.max,
            avg: s.total / divisor,
            call_count: s.calls,
        })
    }

    pub fn clear(&mut self) {
        self.stats.clear();
    }
}

/// Per-system timing data for a single frame
#[derive(Debug, Clone)]
pub struct SystemTiming {
    pub name: &'static str,
    pub duration: Duration,
}

/// Execution profile for a frame
#[derive(Debug, Clone, Default)]
pub struct ExecutionProfile {
    pub total_frame_time: Duration,
    pub system_timings: Vec<SystemTiming>,
}

/// Install a fmt subscriber writing to `path` through a non-blocking writer
///
/// Keep the returned guard alive for as long as events should be flushed.
#[cfg(feature = "profiling")]
pub fn init_tracing(
    path: impl AsRef<std::path::Path>,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    let file = std::fs::File::create(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let installed = tracing_subscriber::fmt()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .try_init();
    if let Err(err) = installed {
        tracing::warn!(error = %err, "tracing subscriber already installed");
    }
    Ok(guard)
}
