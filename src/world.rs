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

//! World: central entity and component storage
//!
//! The world owns four coordinated views of "entity `e` has component `c`":
//! the per-entity bitmask, the per-entity attached-id list, the live slot in
//! the per-type store, and (through events) every system's matching set.
//! Each mutation updates all of them and then synchronously notifies the
//! registered listeners. Listeners must not mutate the world during
//! dispatch; all operations assume exclusive, single-threaded access.

use std::collections::VecDeque;
use std::mem::MaybeUninit;

use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::component::{component_info, Component, ComponentSet};
use crate::entity::{Entity, GENERATION_MASK, MAX_ENTITIES};
use crate::error::{EcsError, Result};
use crate::mask::{BitMask, MAX_COMPONENTS};
use crate::sparse::SparseSet;
use crate::store::ComponentStore;

/// Listener invoked after a component add or before a component removal,
/// with `(entity, entity_mask, changed_mask)`.
pub type Listener = Box<dyn FnMut(Entity, &BitMask, &BitMask)>;

/// Central ECS world: one independent universe of entities.
pub struct World {
    /// Live entity indices.
    live: SparseSet<u32>,

    /// Recycled indices, reused in FIFO order.
    free: VecDeque<u32>,

    /// Generation per index; bumped on destroy so stale handles die.
    generations: Vec<u32>,

    /// Component bitmask per index. The sole truth about slot liveness.
    masks: Vec<BitMask>,

    /// Attached component-type ids per index, newest first.
    attached: Vec<SmallVec<[u32; 8]>>,

    /// Next never-used index.
    next_index: u32,

    /// One store per component id, bound lazily on first write.
    stores: Vec<ComponentStore>,

    /// Live record count per component id.
    valid_counts: Vec<u32>,

    on_add: Vec<Listener>,
    on_remove: Vec<Listener>,
}

impl World {
    /// Create a world with per-entity tables pre-sized for
    /// `initial_entities` and one (empty) store slot per component id.
    pub fn new(initial_entities: usize) -> Self {
        Self {
            live: SparseSet::with_capacity(initial_entities),
            free: VecDeque::new(),
            generations: Vec::with_capacity(initial_entities),
            masks: Vec::with_capacity(initial_entities),
            attached: Vec::with_capacity(initial_entities),
            next_index: 0,
            stores: (0..MAX_COMPONENTS).map(|_| ComponentStore::new()).collect(),
            valid_counts: vec![0; MAX_COMPONENTS],
            on_add: Vec::new(),
            on_remove: Vec::new(),
        }
    }

    /// Resolve a handle to its table index, or `NotAlive`.
    fn index_of(&self, entity: Entity) -> Result<usize> {
        let index = entity.index();
        if self.live.contains(index) && self.generations[index as usize] == entity.generation() {
            Ok(index as usize)
        } else {
            Err(EcsError::NotAlive)
        }
    }

    /// Create an empty entity.
    ///
    /// Recycled indices are reused in FIFO order with a bumped generation;
    /// otherwise a fresh index is taken and the per-entity tables grow.
    ///
    /// # Panics
    /// Panics if the index space ([`MAX_ENTITIES`] live slots) is exhausted.
    pub fn create_entity(&mut self) -> Entity {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.create_entity", live = self.live.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let index = if let Some(recycled) = self.free.pop_front() {
            recycled
        } else {
            let fresh = self.next_index;
            assert!(
                (fresh as usize) < MAX_ENTITIES,
                "entity index space exhausted ({MAX_ENTITIES} slots)"
            );
            self.next_index += 1;
            self.generations.push(0);
            self.masks.push(BitMask::new());
            self.attached.push(SmallVec::new());
            fresh
        };

        debug_assert!(self.masks[index as usize].none());
        debug_assert!(self.attached[index as usize].is_empty());
        self.live.insert(index);

        Entity::new(index, self.generations[index as usize])
    }

    /// Create an entity and attach every component of `set`, in tuple order.
    ///
    /// Equivalent to [`World::create_entity`] followed by one
    /// [`World::add_component`] per member. A duplicate type within the set
    /// is an ignored no-op, the same as any other `AlreadyPresent` add.
    pub fn create_entity_with<S: ComponentSet>(&mut self, set: S) -> Entity {
        let entity = self.create_entity();
        let _ = set.attach(self, entity);
        entity
    }

    /// Attach a component to a live entity and notify on-add listeners.
    ///
    /// Fails with `AlreadyPresent` (no state change, no event) if the
    /// entity already has the type, and `NotAlive` for dead or stale
    /// handles.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let index = self.index_of(entity)?;
        let info = component_info::<T>();

        #[cfg(feature = "profiling")]
        let span = info_span!("world.add_component", component = info.name);
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        if self.masks[index].contains(info.id) {
            return Err(EcsError::AlreadyPresent {
                component: info.name,
            });
        }

        let store = &mut self.stores[info.id as usize];
        store.bind(&info);
        store.write(index, value);

        self.attached[index].insert(0, info.id);
        self.valid_counts[info.id as usize] += 1;
        self.masks[index].set(info.id);

        // On-add fires with the post-set mask; systems depend on seeing the
        // new bit (see system.rs).
        let mask = self.masks[index];
        self.dispatch_add(entity, mask, info.filter());
        Ok(())
    }

    /// Attach every component of `set` to a live entity, in tuple order.
    ///
    /// A failing add never aborts the rest of the set; prior and later adds
    /// stay applied and the first error is returned. Partial success is the
    /// documented behavior.
    pub fn add_components<S: ComponentSet>(&mut self, entity: Entity, set: S) -> Result<()> {
        self.index_of(entity)?;
        set.attach(self, entity)
    }

    /// Detach a component from a live entity, destructing the record.
    ///
    /// Fails with `NotPresent` (no state change, no event) if the entity
    /// does not have the type. On-remove listeners observe the mask with
    /// the bit still set; it is cleared after dispatch.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<()> {
        let index = self.index_of(entity)?;
        let info = component_info::<T>();

        #[cfg(feature = "profiling")]
        let span = info_span!("world.remove_component", component = info.name);
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        if !self.masks[index].contains(info.id) {
            return Err(EcsError::NotPresent {
                component: info.name,
            });
        }

        self.stores[info.id as usize].drop_slot(index);

        // The attached list is short; a linear scan beats any indexing
        let list = &mut self.attached[index];
        if let Some(pos) = list.iter().position(|&id| id == info.id) {
            list.remove(pos);
        }
        self.valid_counts[info.id as usize] -= 1;

        let before = self.masks[index];
        self.dispatch_remove(entity, before, info.filter());
        self.masks[index].clear(info.id);
        Ok(())
    }

    /// Destroy a live entity, destructing every attached component.
    ///
    /// The index is recycled (FIFO) with a bumped generation. On-remove
    /// listeners are notified once with `(entity, mask, mask)` signalling
    /// bulk departure, not once per component.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        let index = self.index_of(entity)?;

        #[cfg(feature = "profiling")]
        let span = info_span!("world.destroy_entity", components = self.attached[index].len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        // Mark dead first: recycle the index and invalidate outstanding
        // handles before any destructor runs.
        self.free.push_back(index as u32);
        self.live.erase(index as u32);
        self.generations[index] = (self.generations[index] + 1) & GENERATION_MASK;

        let ids = std::mem::take(&mut self.attached[index]);
        for &id in &ids {
            self.valid_counts[id as usize] -= 1;
            self.stores[id as usize].drop_slot(index);
        }

        let mask = self.masks[index];
        self.dispatch_remove(entity, mask, mask);
        self.masks[index].clear_all();
        Ok(())
    }

    /// Destroy every live entity, keeping registered listeners.
    pub fn clear(&mut self) {
        let indices: Vec<u32> = self.live.as_slice().to_vec();
        for index in indices {
            let entity = Entity::new(index, self.generations[index as usize]);
            let _ = self.destroy_entity(entity);
        }
    }

    /// Reference to a component on an entity, checked against the mask.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let index = self.index_of(entity).ok()?;
        let info = component_info::<T>();
        if !self.masks[index].contains(info.id) {
            return None;
        }
        self.stores[info.id as usize].get::<T>(index)
    }

    /// Mutable reference to a component on an entity.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let index = self.index_of(entity).ok()?;
        let info = component_info::<T>();
        if !self.masks[index].contains(info.id) {
            return None;
        }
        self.stores[info.id as usize].get_mut::<T>(index)
    }

    /// Raw view of the store for `T` plus the live record count.
    ///
    /// The view spans the whole buffer, entity-indexed, including dead
    /// slots, hence the `MaybeUninit` element type. The count is the
    /// number of live records, not the view length. Callers must filter by
    /// [`World::entity_masks`] or a system's matching set; the borrow ends
    /// at the next mutating call, which may grow the store.
    pub fn get_components_of_type<T: Component>(&self) -> (&[MaybeUninit<T>], u32) {
        let info = component_info::<T>();
        (
            self.stores[info.id as usize].raw_slice::<T>(),
            self.valid_counts[info.id as usize],
        )
    }

    /// Iterate `(entity, &component)` over every live record of `T`,
    /// mask-filtered. Visits entities in live-set order.
    pub fn iter_components_of_type<T: Component>(
        &self,
    ) -> impl Iterator<Item = (Entity, &T)> + '_ {
        let info = component_info::<T>();
        let store = &self.stores[info.id as usize];
        self.live.iter().filter_map(move |&index| {
            let i = index as usize;
            if !self.masks[i].contains(info.id) {
                return None;
            }
            let entity = Entity::new(index, self.generations[i]);
            store.get::<T>(i).map(|record| (entity, record))
        })
    }

    /// Iterate `(entity, &mut component)` over every live record of `T`.
    pub fn iter_components_of_type_mut<T: Component>(
        &mut self,
    ) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        let info = component_info::<T>();
        let live = &self.live;
        let masks = &self.masks;
        let generations = &self.generations;
        let store: *mut ComponentStore = &mut self.stores[info.id as usize];
        live.iter().filter_map(move |&index| {
            let i = index as usize;
            if !masks[i].contains(info.id) {
                return None;
            }
            let entity = Entity::new(index, generations[i]);
            // SAFETY: every live index appears exactly once in the dense
            // array, so the yielded references address disjoint slots, and
            // the store cannot grow while the iterator borrows &mut self.
            let record = unsafe { (*store).get_mut::<T>(i)? };
            Some((entity, record))
        })
    }

    /// O(1) liveness test; stale handles are dead.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.index_of(entity).is_ok()
    }

    /// The live-entity set, as raw table indices.
    pub fn entities(&self) -> &SparseSet<u32> {
        &self.live
    }

    /// Iterate the live entities as handles.
    pub fn iter_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.live
            .iter()
            .map(move |&index| Entity::new(index, self.generations[index as usize]))
    }

    /// Current handle for a live table index, if any.
    pub fn entity_from_index(&self, index: u32) -> Option<Entity> {
        if self.live.contains(index) {
            Some(Entity::new(index, self.generations[index as usize]))
        } else {
            None
        }
    }

    /// Component masks, indexed by entity table index.
    pub fn entity_masks(&self) -> &[BitMask] {
        &self.masks
    }

    /// Mask of a live entity.
    pub fn entity_mask(&self, entity: Entity) -> Option<BitMask> {
        let index = self.index_of(entity).ok()?;
        Some(self.masks[index])
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> u32 {
        self.live.len() as u32
    }

    /// Number of indices waiting in the recycle queue.
    pub fn recycled_entity_count(&self) -> usize {
        self.free.len()
    }

    /// Number of live records of `T` across the world.
    pub fn valid_count<T: Component>(&self) -> u32 {
        self.valid_counts[component_info::<T>().id as usize]
    }

    /// Register a listener invoked after every component add, in
    /// registration order, with the post-set mask.
    pub fn subscribe_on_add<F>(&mut self, listener: F)
    where
        F: FnMut(Entity, &BitMask, &BitMask) + 'static,
    {
        self.on_add.push(Box::new(listener));
    }

    /// Register a listener invoked on every component removal (before the
    /// bit clears) and once per entity destruction, in registration order.
    pub fn subscribe_on_remove<F>(&mut self, listener: F)
    where
        F: FnMut(Entity, &BitMask, &BitMask) + 'static,
    {
        self.on_remove.push(Box::new(listener));
    }

    fn dispatch_add(&mut self, entity: Entity, mask: BitMask, changed: BitMask) {
        for listener in &mut self.on_add {
            listener(entity, &mask, &changed);
        }
    }

    fn dispatch_remove(&mut self, entity: Entity, mask: BitMask, changed: BitMask) {
        for listener in &mut self.on_remove {
            listener(entity, &mask, &changed);
        }
    }

    /// Get memory usage statistics
    pub fn memory_stats(&self) -> MemoryStats {
        let entity_table_memory = self.masks.capacity() * std::mem::size_of::<BitMask>()
            + self.generations.capacity() * std::mem::size_of::<u32>()
            + self.attached.capacity() * std::mem::size_of::<SmallVec<[u32; 8]>>()
            + self.live.capacity() * 2 * std::mem::size_of::<u32>();
        let store_memory: usize = self.stores.iter().map(|s| s.allocated_bytes()).sum();

        MemoryStats {
            entity_table_memory,
            store_memory,
            total_memory: entity_table_memory + store_memory,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Drop for World {
    /// Destruct every live record. Stores cannot do this themselves: only
    /// the masks know which slots are live.
    fn drop(&mut self) {
        for &index in self.live.as_slice() {
            for &id in &self.attached[index as usize] {
                self.stores[id as usize].drop_slot(index as usize);
            }
        }
    }
}

/// Memory statistics for the world
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub entity_table_memory: usize,
    pub store_memory: usize,
    pub total_memory: usize,
}
