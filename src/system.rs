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

//! Systems: incrementally maintained matching sets
//!
//! A system declares an inclusion mask and two exclusion masks and owns a
//! sparse set of entity indices matching that filter. Two listeners
//! registered with the world at construction keep the set current on every
//! component add, removal, and entity destruction; `rescan` rebuilds it
//! from the world's masks for bootstrap or recovery.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::ComponentSet;
use crate::entity::Entity;
use crate::mask::BitMask;
use crate::sparse::SparseSet;
use crate::world::World;

#[derive(Default)]
struct SystemState {
    include: BitMask,
    exclude_any: BitMask,
    exclude_all: BitMask,
    matching: SparseSet<u32>,
}

impl SystemState {
    /// Whether a change to `changed` bits can alter this system's verdict.
    ///
    /// Inclusion and exclude-any verdicts depend only on their own bits.
    /// The exclude-all subset test depends on every bit of the entity mask,
    /// so any change is relevant while that mask is populated.
    fn is_relevant(&self, changed: &BitMask) -> bool {
        self.exclude_all.any() || changed.intersects(&(self.include | self.exclude_any))
    }

    /// The filter formula: no excluded-any bit set, the mask is not a
    /// subset of exclude-all, and every inclusion bit is present.
    fn matches(&self, mask: &BitMask) -> bool {
        if mask.intersects(&self.exclude_any) {
            return false;
        }
        if self.exclude_all.any() && self.exclude_all.contains_all(mask) {
            return false;
        }
        mask.contains_all(&self.include)
    }

    fn reevaluate(&mut self, index: u32, mask: &BitMask) {
        if self.matches(mask) {
            self.matching.insert(index);
        } else {
            self.matching.erase(index);
        }
    }
}

/// Subscriber that maintains the set of entities matching a component
/// filter.
///
/// Filters are populated after construction via [`System::match_components`]
/// and the exclusion helpers; call [`System::rescan`] if matching entities
/// already existed at that point. A system with an empty inclusion mask is
/// degenerate: it cannot distinguish an entity that lost its last component
/// from a destroyed one, so populate at least one inclusion type.
pub struct System {
    state: Arc<Mutex<SystemState>>,
}

impl System {
    /// Create a system and subscribe its maintenance listeners to `world`.
    ///
    /// The listeners re-evaluate the full filter on every relevant change.
    /// On add the post-set mask is judged directly; an added component may
    /// also *exclude* a previously matching entity, which erases it. On
    /// remove the world dispatches before clearing the bit, so the listener
    /// judges the prospective mask `mask_before & !changed`; removing an
    /// excluded component can re-admit an entity. Bulk destruction arrives
    /// as one notification with `changed == mask_before`, giving a
    /// prospective mask of zero and a single erase.
    pub fn new(world: &mut World) -> Self {
        let state = Arc::new(Mutex::new(SystemState::default()));

        let on_add = Arc::clone(&state);
        world.subscribe_on_add(move |entity, mask_after, changed| {
            let mut state = on_add.lock();
            if !state.is_relevant(changed) {
                return;
            }
            state.reevaluate(entity.index(), mask_after);
        });

        let on_remove = Arc::clone(&state);
        world.subscribe_on_remove(move |entity, mask_before, changed| {
            let mut state = on_remove.lock();
            if !state.is_relevant(changed) {
                return;
            }
            let after = mask_before.and_not(changed);
            state.reevaluate(entity.index(), &after);
        });

        Self { state }
    }

    /// Require every component of `C` (OR-ed into the inclusion mask).
    pub fn match_components<C: ComponentSet>(&mut self) {
        self.state.lock().include |= C::filter();
    }

    /// Reject entities holding any component of `C`.
    pub fn exclude_any<C: ComponentSet>(&mut self) {
        self.state.lock().exclude_any |= C::filter();
    }

    /// Reject entities whose components are all within `C`.
    pub fn exclude_all<C: ComponentSet>(&mut self) {
        self.state.lock().exclude_all |= C::filter();
    }

    /// Rebuild the matching set from the world's live entities and masks.
    pub fn rescan(&mut self, world: &World) {
        let mut state = self.state.lock();
        state.matching.clear();
        let masks = world.entity_masks();
        for &index in world.entities().as_slice() {
            if state.matches(&masks[index as usize]) {
                state.matching.insert(index);
            }
        }
    }

    /// Whether the entity's index is in the matching set.
    pub fn contains(&self, entity: Entity) -> bool {
        self.state.lock().matching.contains(entity.index())
    }

    /// Number of matching entities.
    pub fn len(&self) -> usize {
        self.state.lock().matching.len()
    }

    /// Returns true if no entity matches.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the matching entity indices.
    ///
    /// Order reflects sparse-set insertion with swap-on-erase and is not
    /// stable across erasures.
    pub fn matching_indices(&self) -> Vec<u32> {
        self.state.lock().matching.as_slice().to_vec()
    }

    /// Run `f` against the matching set without snapshotting.
    pub fn with_matching<R>(&self, f: impl FnOnce(&SparseSet<u32>) -> R) -> R {
        f(&self.state.lock().matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Position(f32, f32, f32);

    #[derive(Debug, Clone, Copy)]
    struct Velocity(f32, f32, f32);

    #[derive(Debug, Clone, Copy)]
    struct StaticMesh(u32);

    #[test]
    fn test_inclusion_tracks_adds_and_removes() {
        let mut world = World::new(8);
        let mut system = System::new(&mut world);
        system.match_components::<(Position,)>();

        let e = world.create_entity();
        assert!(!system.contains(e));

        world.add_component(e, Position(0.0, 0.0, 0.0)).unwrap();
        assert!(system.contains(e));

        world.remove_component::<Position>(e).unwrap();
        assert!(!system.contains(e));
    }

    #[test]
    fn test_multi_component_inclusion() {
        let mut world = World::new(8);
        let mut system = System::new(&mut world);
        system.match_components::<(Position, Velocity)>();

        let e = world.create_entity();
        world.add_component(e, Position(0.0, 0.0, 0.0)).unwrap();
        assert!(!system.contains(e), "one of two required components");

        world.add_component(e, Velocity(1.0, 0.0, 0.0)).unwrap();
        assert!(system.contains(e));

        world.remove_component::<Velocity>(e).unwrap();
        assert!(!system.contains(e));
    }

    #[test]
    fn test_exclusion_any_round_trip() {
        let mut world = World::new(8);
        let mut system = System::new(&mut world);
        system.match_components::<(Position,)>();
        system.exclude_any::<(StaticMesh,)>();

        let e = world.create_entity_with((Position(1.0, 2.0, 3.0),));
        assert!(system.contains(e));

        world.add_component(e, StaticMesh(7)).unwrap();
        assert!(!system.contains(e), "excluded component must evict");

        world.remove_component::<StaticMesh>(e).unwrap();
        assert!(system.contains(e), "removing the excluded component re-admits");

        world.destroy_entity(e).unwrap();
        assert!(!system.contains(e));
    }

    #[test]
    fn test_exclude_all_rejects_subset_masks() {
        let mut world = World::new(8);
        let mut system = System::new(&mut world);
        system.match_components::<(Position,)>();
        system.exclude_all::<(Position, StaticMesh)>();

        // Only Position + StaticMesh: mask is a subset of the exclude-all set
        let e1 = world.create_entity_with((Position(0.0, 0.0, 0.0), StaticMesh(1)));
        assert!(!system.contains(e1));

        // An extra component outside the set breaks the subset relation
        let e2 = world.create_entity_with((
            Position(0.0, 0.0, 0.0),
            StaticMesh(1),
            Velocity(0.0, 0.0, 0.0),
        ));
        assert!(system.contains(e2));
    }

    #[test]
    fn test_rescan_reconstitutes() {
        let mut world = World::new(8);

        // Entities exist before the filter is populated
        let e1 = world.create_entity_with((Position(0.0, 0.0, 0.0),));
        let e2 = world.create_entity_with((Velocity(0.0, 0.0, 0.0),));

        let mut system = System::new(&mut world);
        system.match_components::<(Position,)>();
        assert!(!system.contains(e1));

        system.rescan(&world);
        assert!(system.contains(e1));
        assert!(!system.contains(e2));
        assert_eq!(system.len(), 1);
    }

    #[test]
    fn test_unrelated_component_changes_are_ignored() {
        let mut world = World::new(8);
        let mut system = System::new(&mut world);
        system.match_components::<(Position,)>();

        let e = world.create_entity_with((Position(0.0, 0.0, 0.0),));
        assert!(system.contains(e));

        // Velocity is neither included nor excluded
        world.add_component(e, Velocity(1.0, 1.0, 1.0)).unwrap();
        assert!(system.contains(e));
        world.remove_component::<Velocity>(e).unwrap();
        assert!(system.contains(e));
    }
}
