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

//! Component trait, the process-global type registry, and component sets
//!
//! Each component type is assigned a stable numeric id and single-bit mask
//! on first observation, in observation order. The registry is shared by
//! every world in the process so ids agree across worlds; component storage
//! stays per-world.

use std::any::TypeId;

use ahash::AHashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::OnceLock;

use crate::entity::Entity;
use crate::error::Result;
use crate::mask::{BitMask, MAX_COMPONENTS};
use crate::world::World;

/// Maximum number of components supported by ComponentSet implementations
pub const MAX_SET_COMPONENTS: usize = 8;

/// Marker trait for components
///
/// Components must be 'static (no borrowed data)
pub trait Component: 'static + Send + Sync {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync> Component for T {}

/// Registry record for one component type.
#[derive(Clone, Copy, Debug)]
pub struct ComponentInfo {
    /// Stable id in `[0, MAX_COMPONENTS)`, assigned in observation order.
    pub id: u32,

    /// Size of the component record in bytes.
    pub size: usize,

    /// Type name, for diagnostics and error messages.
    pub name: &'static str,

    pub(crate) drop_fn: Option<unsafe fn(*mut u8)>,
}

impl ComponentInfo {
    /// Mask with exactly bit `id` set.
    pub fn filter(&self) -> BitMask {
        BitMask::single(self.id)
    }
}

/// Drops the record of type `T` at `ptr` in place.
///
/// # Safety
/// `ptr` must point to a validly-constructed `T` that has not already been
/// dropped. For zero-sized `T` the pointer is ignored.
unsafe fn drop_in_place_typed<T>(ptr: *mut u8) {
    if std::mem::size_of::<T>() == 0 {
        std::ptr::drop_in_place(std::ptr::NonNull::<T>::dangling().as_ptr());
    } else {
        std::ptr::drop_in_place(ptr as *mut T);
    }
}

struct Registry {
    infos: AHashMap<TypeId, ComponentInfo>,
    next_id: u32,
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        RwLock::new(Registry {
            infos: AHashMap::new(),
            next_id: 0,
        })
    })
}

/// Look up (or assign, on first observation) the registry record for `T`.
///
/// # Panics
/// Panics if more than [`MAX_COMPONENTS`] distinct component types are
/// observed over the process lifetime.
pub fn component_info<T: Component>() -> ComponentInfo {
    let type_id = TypeId::of::<T>();
    if let Some(info) = registry().read().infos.get(&type_id) {
        return *info;
    }

    let mut reg = registry().write();
    // Re-check under the write lock; another thread may have registered T
    if let Some(info) = reg.infos.get(&type_id) {
        return *info;
    }

    let id = reg.next_id;
    assert!(
        (id as usize) < MAX_COMPONENTS,
        "component type capacity exceeded: more than {MAX_COMPONENTS} types registered"
    );
    reg.next_id += 1;

    let info = ComponentInfo {
        id,
        size: std::mem::size_of::<T>(),
        name: std::any::type_name::<T>(),
        drop_fn: if std::mem::needs_drop::<T>() {
            Some(drop_in_place_typed::<T> as unsafe fn(*mut u8))
        } else {
            None
        },
    };
    reg.infos.insert(type_id, info);
    info
}

/// Stable id of component type `T`.
pub fn component_id<T: Component>() -> u32 {
    component_info::<T>().id
}

/// Single-bit mask of component type `T`.
pub fn component_filter<T: Component>() -> BitMask {
    component_info::<T>().filter()
}

/// Set of component types, used for spawning and for system filters
///
/// Implemented for tuples of 1 to [`MAX_SET_COMPONENTS`] components.
pub trait ComponentSet: 'static {
    /// Ids of all member types, in tuple order.
    fn ids() -> SmallVec<[u32; MAX_SET_COMPONENTS]>
    where
        Self: Sized;

    /// Union of the member filters.
    fn filter() -> BitMask
    where
        Self: Sized;

    /// Attach every member to `entity`, in tuple order.
    ///
    /// A failing add never aborts the rest of the set; the first error is
    /// returned after all members have been attempted.
    fn attach(self, world: &mut World, entity: Entity) -> Result<()>;
}

// Macro for tuple ComponentSet implementations
macro_rules! impl_component_set {
    ($($T:ident),*) => {
        impl<$($T: Component),*> ComponentSet for ($($T,)*) {
            fn ids() -> SmallVec<[u32; MAX_SET_COMPONENTS]> {
                smallvec::smallvec![$(component_id::<$T>()),*]
            }

            fn filter() -> BitMask {
                let mut mask = BitMask::new();
                $(mask |= component_filter::<$T>();)*
                mask
            }

            #[allow(non_snake_case)]
            fn attach(self, world: &mut World, entity: Entity) -> Result<()> {
                let ($($T,)*) = self;
                let mut first_err = None;
                $(
                    if let Err(err) = world.add_component(entity, $T) {
                        first_err.get_or_insert(err);
                    }
                )*
                match first_err {
                    None => Ok(()),
                    Some(err) => Err(err),
                }
            }
        }
    };
}

// Implement for tuples of 1-8 components
impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    #![allow(dead_code)]
    use super::*;

    #[test]
    fn test_ids_are_stable_and_distinct() {
        struct Alpha(u32);
        struct Beta(u32);

        let a1 = component_id::<Alpha>();
        let b = component_id::<Beta>();
        let a2 = component_id::<Alpha>();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn test_filter_is_single_bit() {
        struct Gamma;

        let info = component_info::<Gamma>();
        assert_eq!(info.filter().count_ones(), 1);
        assert!(info.filter().contains(info.id));
    }

    #[test]
    fn test_info_records_size() {
        struct Wide([u64; 4]);

        assert_eq!(component_info::<Wide>().size, 32);
    }

    #[test]
    fn test_set_filter_is_union() {
        #[derive(Debug)]
        struct Pos(f32, f32);
        #[derive(Debug)]
        struct Vel(f32, f32);

        let combined = <(Pos, Vel)>::filter();
        assert_eq!(combined, component_filter::<Pos>() | component_filter::<Vel>());
        assert_eq!(combined.count_ones(), 2);
    }

    #[test]
    fn test_set_ids_keep_tuple_order() {
        struct First;
        struct Second;

        let ids = <(First, Second)>::ids();
        assert_eq!(ids[0], component_id::<First>());
        assert_eq!(ids[1], component_id::<Second>());
    }
}
