//! A generational slot table shared by both heap flavours.
//!
//! The table stores type-erased values (`Rc<dyn Any>` or `Arc<dyn Any + Send + Sync>`) and hands
//! out [`Key`]s made of a slot index and a generation. A key only resolves while the generation
//! stored in the slot matches the one in the key, which means a slot that has been reclaimed and
//! reused can never be observed through an older key.
//!
//! A slot either owns its value or only observes it. A table owns exactly the values it
//! allocated; anything else is held through a weak reference, so one allocation is owned by at
//! most one table and never keeps itself alive through another.

use alloc::{collections::BTreeMap, rc, rc::Rc, sync, sync::Arc, vec::Vec};
use core::any::Any;

/// A type-erased strong owner that can be stored in a [`SlotTable`].
pub(crate) trait Owner: Clone {
    /// The matching weak reference.
    type Observer;

    /// Address of the owned allocation, used to detect repeated registration.
    fn address(&self) -> usize;

    /// `true` if the table holds the only strong reference to the allocation.
    fn is_unowned(&self) -> bool;

    fn downgrade(&self) -> Self::Observer;

    fn upgrade(observer: &Self::Observer) -> Option<Self>;
}

impl Owner for Rc<dyn Any> {
    type Observer = rc::Weak<dyn Any>;

    #[inline]
    fn address(&self) -> usize {
        Rc::as_ptr(self) as *const () as usize
    }

    #[inline]
    fn is_unowned(&self) -> bool {
        Rc::strong_count(self) == 1
    }

    #[inline]
    fn downgrade(&self) -> Self::Observer {
        Rc::downgrade(self)
    }

    #[inline]
    fn upgrade(observer: &Self::Observer) -> Option<Self> {
        observer.upgrade()
    }
}

impl Owner for Arc<dyn Any + Send + Sync> {
    type Observer = sync::Weak<dyn Any + Send + Sync>;

    #[inline]
    fn address(&self) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }

    #[inline]
    fn is_unowned(&self) -> bool {
        Arc::strong_count(self) == 1
    }

    #[inline]
    fn downgrade(&self) -> Self::Observer {
        Arc::downgrade(self)
    }

    #[inline]
    fn upgrade(observer: &Self::Observer) -> Option<Self> {
        observer.upgrade()
    }
}

/// Location of a registered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

/// Counters describing the activity of a heap.
///
/// # Example
/// ```
/// use waning::rc::{Heap, WeakOption};
///
/// let heap = Heap::new();
/// let value = heap.alloc(1u8);
/// let weak = WeakOption::from_rc(&heap, &value);
/// weak.fold(|| (), |_| ());
///
/// let stats = heap.stats();
/// assert_eq!(stats.live, 1);
/// assert_eq!(stats.allocated, 1);
/// assert_eq!(stats.lookups, 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of slots currently holding a value.
    pub live: usize,
    /// Number of values ever registered.
    pub allocated: u64,
    /// Number of values ever reclaimed.
    pub reclaimed: u64,
    /// Number of weak-handle queries made against the heap.
    pub lookups: u64,
}

enum Hold<V: Owner> {
    Owned(V),
    Observed(V::Observer),
}

impl<V: Owner> Hold<V> {
    fn resolve(&self) -> Option<V> {
        match self {
            Hold::Owned(value) => Some(value.clone()),
            Hold::Observed(observer) => V::upgrade(observer),
        }
    }

    /// `true` once nothing outside the table keeps the value alive.
    fn is_reclaimable(&self) -> bool {
        match self {
            Hold::Owned(value) => value.is_unowned(),
            Hold::Observed(observer) => V::upgrade(observer).is_none(),
        }
    }
}

struct Slot<V: Owner> {
    generation: u32,
    hold: Option<Hold<V>>,
    address: usize,
}

pub(crate) struct SlotTable<V: Owner> {
    slots: Vec<Slot<V>>,
    free: Vec<usize>,
    by_address: BTreeMap<usize, usize>,
    stats: HeapStats,
}

impl<V: Owner> SlotTable<V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            by_address: BTreeMap::new(),
            stats: HeapStats::default(),
        }
    }

    /// Registers a value the table allocated itself. The table keeps it alive until a sweep
    /// finds no other owner.
    pub(crate) fn insert_owned(&mut self, value: V) -> Key {
        let address = value.address();
        self.insert(address, || Hold::Owned(value))
    }

    /// Registers a value owned elsewhere. The table only observes it, so the value goes away
    /// with its last outside owner.
    pub(crate) fn insert_observed(&mut self, value: &V) -> Key {
        self.insert(value.address(), || Hold::Observed(value.downgrade()))
    }

    /// Reuses the slot of an already registered allocation. Its address cannot have been reused
    /// while the slot exists, since both owned and observed slots keep the allocation itself.
    fn insert<F>(&mut self, address: usize, hold: F) -> Key
    where
        F: FnOnce() -> Hold<V>,
    {
        if let Some(&index) = self.by_address.get(&address) {
            return Key {
                index,
                generation: self.slots[index].generation,
            };
        }

        let hold = Some(hold());
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.hold = hold;
                slot.address = address;
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    hold,
                    address,
                });
                self.slots.len() - 1
            }
        };
        self.by_address.insert(address, index);
        self.stats.live += 1;
        self.stats.allocated += 1;

        Key {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// Resolves `key` to a new strong owner. Every call counts as one lookup.
    pub(crate) fn get(&mut self, key: Key) -> Option<V> {
        self.stats.lookups += 1;
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.hold.as_ref()?.resolve()
    }

    /// Frees every slot whose value has no owner outside the table.
    ///
    /// Freed owned values are moved into `released` so the caller can drop them after giving up
    /// its borrow of the table. Returns the number of freed slots.
    pub(crate) fn sweep(&mut self, released: &mut Vec<V>) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let reclaimable = matches!(&slot.hold, Some(hold) if hold.is_reclaimable());
            if !reclaimable {
                continue;
            }
            if let Some(Hold::Owned(value)) = slot.hold.take() {
                released.push(value);
            }
            self.by_address.remove(&slot.address);
            freed += 1;
            // A slot at the last generation is retired so no stale key can match it again.
            if slot.generation != u32::MAX {
                slot.generation += 1;
                self.free.push(index);
            }
        }
        self.stats.live -= freed;
        self.stats.reclaimed += freed as u64;
        freed
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.stats.live
    }

    #[inline]
    pub(crate) fn stats(&self) -> HeapStats {
        self.stats
    }

    #[cfg(test)]
    fn force_generation(&mut self, index: usize, generation: u32) {
        self.slots[index].generation = generation;
    }
}
