//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use sparse_ecs::prelude::*;
//! ```

pub use crate::component::{Component, ComponentSet};
pub use crate::entity::Entity;
pub use crate::error::{EcsError, Result};
pub use crate::mask::BitMask;
pub use crate::sparse::SparseSet;
pub use crate::system::System;
pub use crate::world::World;
