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

//! Sparse ECS - sparse-set Entity Component System
//!
//! Entities are versioned 32-bit handles, components live in contiguous
//! per-type stores indexed by entity, membership is tracked by fixed-width
//! bitmasks, and systems maintain their matching sets incrementally through
//! world events.

pub mod component;
pub mod entity;
pub mod error;
pub mod mask;
pub mod prelude;
pub mod sparse;
pub mod store;
pub mod system;
pub mod world;

// Re-exports for convenience
pub use component::{component_filter, component_id, Component, ComponentInfo, ComponentSet};
pub use entity::Entity;
pub use error::{EcsError, Result};
pub use mask::{BitMask, MAX_COMPONENTS};
pub use sparse::SparseSet;
pub use system::System;
pub use world::{Listener, MemoryStats, World};
