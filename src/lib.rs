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

//! Composition ECS - archetype Entity Component System core
//!
//! Scene nodes compose behaviour from plain-data components stored in an
//! archetype world. Systems run once per host frame through a [`Schedule`];
//! editor tooling reaches component fields by name through
//! [`reflection::ComponentRegistry`].

pub mod archetype;
pub mod builtin;
pub mod command;
pub mod component;
pub mod config;
pub mod debug;
pub mod entity;
pub mod error;
pub mod prelude;
pub mod profiling;
pub mod query;
pub mod reflection;
pub mod schedule;
pub mod storage;
pub mod system;
pub mod time;
pub mod world;

#[cfg(test)]
mod tests;

pub use archetype::*;
pub use command::*;
pub use component::*;
pub use config::*;
pub use entity::*;
pub use error::*;
pub use query::*;
pub use schedule::*;
pub use storage::*;
pub use system::*;
pub use time::*;
pub use world::*;
