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

//! Per-type component storage
//!
//! A store is a type-erased byte buffer addressable as an array of records,
//! one slot per entity index: the record for entity `e` lives at byte offset
//! `e * size`. Slots without the corresponding entity-mask bit are
//! uninitialized; the world's masks are the sole source of truth about which
//! slots are live, and the world drives all construction and destruction.

use std::mem::MaybeUninit;

use crate::component::{Component, ComponentInfo};

/// Type-erased, entity-indexed record buffer for one component type.
///
/// The store never moves records after placement. The buffer grows by
/// doubling, so a reference into it is invalidated by the next write that
/// grows the buffer; raw views therefore borrow the world.
pub struct ComponentStore {
    data: Vec<u8>,
    item_size: usize,
    drop_fn: Option<unsafe fn(*mut u8)>,
    bound: bool,
}

impl ComponentStore {
    /// Create an empty, unbound store. Type metadata is bound lazily on the
    /// first write.
    pub(crate) const fn new() -> Self {
        Self {
            data: Vec::new(),
            item_size: 0,
            drop_fn: None,
            bound: false,
        }
    }

    /// Bind the store to a component type. Idempotent.
    pub(crate) fn bind(&mut self, info: &ComponentInfo) {
        if self.bound {
            debug_assert_eq!(self.item_size, info.size, "store rebound to a different type");
            return;
        }
        self.item_size = info.size;
        self.drop_fn = info.drop_fn;
        self.bound = true;
    }

    /// Number of slots the buffer currently spans, live or not.
    pub(crate) fn slots(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.data.len() / self.item_size
        }
    }

    /// Bytes currently allocated for record data.
    pub(crate) fn allocated_bytes(&self) -> usize {
        self.data.capacity()
    }

    /// Place-construct `value` into the slot for entity `index`.
    ///
    /// The caller must ensure the slot is dead (mask bit clear), otherwise
    /// the previous record leaks undropped.
    pub(crate) fn write<T: Component>(&mut self, index: usize, value: T) {
        debug_assert!(self.bound);
        debug_assert_eq!(self.item_size, std::mem::size_of::<T>());

        if self.item_size == 0 {
            // SAFETY: zero-sized writes touch no memory; a dangling pointer
            // aligned for T is valid for them. The value is consumed without
            // running its destructor here; drop_slot runs it later.
            unsafe { std::ptr::write(std::ptr::NonNull::<T>::dangling().as_ptr(), value) };
            return;
        }

        let offset = index * self.item_size;
        let required = offset + self.item_size;
        if required > self.data.len() {
            self.grow_to(required);
        }

        // SAFETY: grow_to established data.len() >= required, so the slot is
        // in bounds; offsets are multiples of size_of::<T>() (and size is a
        // multiple of align), so the pointer is as aligned as the buffer
        // base. The slot holds no live record per the caller contract.
        unsafe { std::ptr::write(self.data.as_mut_ptr().add(offset) as *mut T, value) };
    }

    /// Grow the buffer to cover at least `required` bytes by doubling.
    fn grow_to(&mut self, required: usize) {
        let mut new_len = self.data.len().max(self.item_size);
        while new_len < required {
            new_len *= 2;
        }
        self.data.reserve(new_len - self.data.len());
        // SAFETY: capacity was just reserved, and u8 has no validity
        // requirement for the uninitialized tail. Dead slots are never read
        // without the mask bit (see get/raw_slice contracts).
        unsafe { self.data.set_len(new_len) };
    }

    /// Destruct the record in the slot for entity `index`, in place.
    ///
    /// The caller must ensure the slot is live; the mask bit must be cleared
    /// by the caller afterwards.
    pub(crate) fn drop_slot(&mut self, index: usize) {
        let Some(drop_fn) = self.drop_fn else {
            return;
        };
        let offset = index * self.item_size;
        debug_assert!(self.item_size == 0 || offset + self.item_size <= self.data.len());
        // SAFETY: the caller guarantees slot `index` holds a live record of
        // the bound type; drop_fn was created for exactly that type and
        // ignores the pointer for zero-sized records.
        unsafe { drop_fn(self.data.as_mut_ptr().add(offset)) };
    }

    /// Reference to the record in slot `index`.
    ///
    /// Returns None when the slot is outside the buffer. A Some result is
    /// only meaningful when the caller has checked the entity-mask bit; the
    /// bytes of a dead in-bounds slot are unspecified.
    pub(crate) fn get<T: Component>(&self, index: usize) -> Option<&T> {
        debug_assert!(!self.bound || self.item_size == std::mem::size_of::<T>());

        if std::mem::size_of::<T>() == 0 {
            if !self.bound {
                return None;
            }
            // SAFETY: any aligned dangling pointer is valid for a zero-sized
            // read; liveness was checked by the caller against the mask.
            return Some(unsafe { std::ptr::NonNull::<T>::dangling().as_ref() });
        }

        let offset = index * self.item_size;
        if self.item_size == 0 || offset + self.item_size > self.data.len() {
            return None;
        }
        // SAFETY: the bounds check above holds, the slot was written via
        // write::<T> (caller checked the mask), and the lifetime is tied to
        // &self so the buffer cannot grow under the reference.
        Some(unsafe { &*(self.data.as_ptr().add(offset) as *const T) })
    }

    /// Mutable reference to the record in slot `index`.
    pub(crate) fn get_mut<T: Component>(&mut self, index: usize) -> Option<&mut T> {
        debug_assert!(!self.bound || self.item_size == std::mem::size_of::<T>());

        if std::mem::size_of::<T>() == 0 {
            if !self.bound {
                return None;
            }
            // SAFETY: as in get; exclusive access comes from &mut self.
            return Some(unsafe { std::ptr::NonNull::<T>::dangling().as_mut() });
        }

        let offset = index * self.item_size;
        if self.item_size == 0 || offset + self.item_size > self.data.len() {
            return None;
        }
        // SAFETY: as in get; &mut self guarantees exclusive access.
        Some(unsafe { &mut *(self.data.as_mut_ptr().add(offset) as *mut T) })
    }

    /// Raw view over every slot the buffer spans, live and dead alike.
    ///
    /// Dead slots are uninitialized, hence the `MaybeUninit` element type;
    /// callers must filter by the entity masks (or a system's matching set)
    /// before assuming a slot initialized. Zero-sized types yield an empty
    /// view.
    pub(crate) fn raw_slice<T: Component>(&self) -> &[MaybeUninit<T>] {
        if !self.bound || self.item_size != std::mem::size_of::<T>() || self.item_size == 0 {
            return &[];
        }
        // SAFETY: item_size matches size_of::<T>(), slots() counts whole
        // records, and MaybeUninit<T> carries no validity requirement for
        // the dead slots.
        unsafe {
            std::slice::from_raw_parts(self.data.as_ptr() as *const MaybeUninit<T>, self.slots())
        }
    }
}

// No Drop impl: the store cannot tell live slots from dead ones. The world
// owns that knowledge and destructs live records in its own Drop.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::component_info;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Vec3(f32, f32, f32);

    struct Tracked {
        drops: Arc<AtomicU32>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_write_then_get() {
        let mut store = ComponentStore::new();
        store.bind(&component_info::<Vec3>());

        store.write(3, Vec3(1.0, 2.0, 3.0));
        assert_eq!(store.get::<Vec3>(3), Some(&Vec3(1.0, 2.0, 3.0)));
        assert!(store.get::<Vec3>(100).is_none());
    }

    #[test]
    fn test_growth_covers_largest_index() {
        let mut store = ComponentStore::new();
        store.bind(&component_info::<Vec3>());

        store.write(0, Vec3(0.0, 0.0, 0.0));
        let after_first = store.slots();
        assert_eq!(after_first, 1);

        store.write(17, Vec3(1.0, 1.0, 1.0));
        assert!(store.slots() > 17);
        assert_eq!(store.get::<Vec3>(0), Some(&Vec3(0.0, 0.0, 0.0)));
        assert_eq!(store.get::<Vec3>(17), Some(&Vec3(1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_drop_slot_runs_destructor_once() {
        let drops = Arc::new(AtomicU32::new(0));
        let mut store = ComponentStore::new();
        store.bind(&component_info::<Tracked>());

        store.write(
            5,
            Tracked {
                drops: Arc::clone(&drops),
            },
        );
        assert_eq!(drops.load(Ordering::Relaxed), 0);

        store.drop_slot(5);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unbound_store_is_empty() {
        let store = ComponentStore::new();
        assert_eq!(store.slots(), 0);
        assert!(store.get::<Vec3>(0).is_none());
        assert!(store.raw_slice::<Vec3>().is_empty());
    }

    #[test]
    fn test_raw_slice_spans_buffer() {
        let mut store = ComponentStore::new();
        store.bind(&component_info::<Vec3>());
        store.write(4, Vec3(9.0, 9.0, 9.0));

        let view = store.raw_slice::<Vec3>();
        assert_eq!(view.len(), store.slots());
        // SAFETY: slot 4 was just written
        let live = unsafe { view[4].assume_init_ref() };
        assert_eq!(live, &Vec3(9.0, 9.0, 9.0));
    }
}
