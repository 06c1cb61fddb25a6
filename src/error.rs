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
//!
//! Every variant is non-fatal: the failed operation leaves the world
//! unchanged and dispatches no events. Fatal conditions (component-type
//! capacity exhaustion, entity index-space exhaustion, allocation failure)
//! panic instead of returning a value.

use std::fmt;

/// ECS error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity is dead, never existed, or the handle is stale
    NotAlive,

    /// Entity already has a component of this type
    AlreadyPresent {
        /// Type name of the offending component
        component: &'static str,
    },

    /// Entity has no component of this type
    NotPresent {
        /// Type name of the offending component
        component: &'static str,
    },
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::NotAlive => write!(f, "Entity is not alive or handle is stale"),
            EcsError::AlreadyPresent { component } => {
                write!(f, "Entity already contains component: {component}")
            }
            EcsError::NotPresent { component } => {
                write!(f, "Entity does not contain component: {component}")
            }
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
