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

//! Error types

use thiserror::Error;

/// ECS error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EcsError {
    /// Entity handle is stale or was destroyed
    #[error("Entity not found")]
    EntityNotFound,

    /// Component type is not present on the entity
    #[error("Component not found: {component}")]
    ComponentNotFound { component: &'static str },

    /// Component type is already present on the entity
    #[error("Duplicate component: {component}")]
    DuplicateComponent { component: &'static str },

    /// Internal storage invariant violated. Never recoverable.
    #[error("Archetype corruption: {0}")]
    ArchetypeCorruption(String),

    /// A query requested a component mutably alongside another access to it
    #[error("Conflicting query access to {component}")]
    QueryAccessConflict { component: &'static str },

    /// A row view was asked for write access to a read-only component
    #[error("Write access to {component} was not declared by the query")]
    AccessDenied { component: &'static str },

    /// Component name not present in the registry
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// Property name not exported by the component
    #[error("Unknown property {property} on {component}")]
    UnknownProperty {
        component: &'static str,
        property: String,
    },

    /// Property value has the wrong kind
    #[error("Property {property} on {component} expects {expected}")]
    PropertyTypeMismatch {
        component: &'static str,
        property: String,
        expected: &'static str,
    },

    /// Too many distinct archetypes
    #[error("Archetype limit exceeded ({limit})")]
    ArchetypeLimitExceeded { limit: usize },

    /// Scheduler was used after `dispose`
    #[error("Scheduler has been disposed")]
    SchedulerDisposed,

    /// A system returned an error and aborted the tick
    #[error("System {system} failed: {source}")]
    SystemFailed {
        system: &'static str,
        #[source]
        source: Box<EcsError>,
    },

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl EcsError {
    pub(crate) fn component_not_found<T: 'static>() -> Self {
        EcsError::ComponentNotFound {
            component: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn duplicate_component<T: 'static>() -> Self {
        EcsError::DuplicateComponent {
            component: std::any::type_name::<T>(),
        }
    }

    /// Whether the error means storage can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        match self {
            EcsError::ArchetypeCorruption(_) => true,
            EcsError::SystemFailed { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EcsError {
    fn from(err: serde_json::Error) -> Self {
        EcsError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
