use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::{any::Any, fmt};

use parking_lot::Mutex;

use super::WeakOption;
use crate::table::{Key, SlotTable};
use crate::HeapStats;

pub(crate) type Shared = Mutex<SlotTable<Arc<dyn Any + Send + Sync>>>;

/// A thread-safe reclaimer for [`WeakOption`]s.
///
/// This is the atomic counterpart of [`rc::Heap`](crate::rc::Heap). Values are owned through
/// [`Arc`]s, and a value is reclaimed by [`collect`] once no `Arc` outside the heap refers to it.
///
/// Only values the heap allocated itself are owned by it. An `Arc` registered through
/// [`WeakOption::from_arc`] that was allocated elsewhere is observed, and vanishes with its last
/// outside owner no matter how many heaps it was registered with.
///
/// The heap serializes its own bookkeeping behind a lock, which is held only while a slot is
/// read or written and never while user code runs.
///
/// # Example
/// ```
/// use waning::sync::Heap;
///
/// let heap = Heap::new();
/// let kept = heap.alloc(1);
///
/// let worker = {
///     let heap = heap.clone();
///     std::thread::spawn(move || heap.weak(2).is_present())
/// };
/// assert!(worker.join().unwrap());
///
/// assert_eq!(heap.collect(), 1);
/// assert_eq!(heap.len(), 1);
/// # drop(kept);
/// ```
///
/// [`collect`]: Heap::collect
#[derive(Clone)]
pub struct Heap {
    shared: Arc<Shared>,
}

impl Heap {
    /// Creates an empty heap.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty heap with room for `capacity` values before its slot table grows.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SlotTable::with_capacity(capacity))),
        }
    }

    /// Moves `value` into the heap and returns its first owner.
    pub fn alloc<T>(&self, value: T) -> Arc<T>
    where
        T: Send + Sync + 'static,
    {
        let owner = Arc::new(value);
        self.adopt(owner.clone());
        owner
    }

    /// Moves `value` into the heap without keeping an owner.
    #[inline]
    pub fn weak<T>(&self, value: T) -> WeakOption<T>
    where
        T: Send + Sync + 'static,
    {
        WeakOption::new(self, value)
    }

    /// Reclaims every value without an owner outside the heap.
    ///
    /// Repeats until a pass frees nothing, and returns the total number of reclaimed values.
    /// Observers on other threads see each value either pinned or gone, never half-reclaimed.
    pub fn collect(&self) -> usize {
        let mut total = 0;
        loop {
            let mut released = Vec::new();
            let freed = self.shared.lock().sweep(&mut released);
            drop(released);
            if freed == 0 {
                break;
            }
            total += freed;
        }
        event!(debug, reclaimed = total, live = self.len(), "heap collection finished");
        total
    }

    /// Number of values currently held by the heap, reclaimable or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    /// Returns `true` if the heap holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the heap's counters.
    #[inline]
    pub fn stats(&self) -> HeapStats {
        self.shared.lock().stats()
    }

    pub(crate) fn adopt<T>(&self, owner: Arc<T>) -> (Weak<Shared>, Key)
    where
        T: Send + Sync + 'static,
    {
        let erased: Arc<dyn Any + Send + Sync> = owner;
        let key = self.shared.lock().insert_owned(erased);
        event!(trace, slot = key.index, generation = key.generation, "allocated value");
        (Arc::downgrade(&self.shared), key)
    }

    pub(crate) fn observe<T>(&self, owner: &Arc<T>) -> (Weak<Shared>, Key)
    where
        T: Send + Sync + 'static,
    {
        let erased: Arc<dyn Any + Send + Sync> = owner.clone();
        let key = self.shared.lock().insert_observed(&erased);
        event!(trace, slot = key.index, generation = key.generation, "observed value");
        (Arc::downgrade(&self.shared), key)
    }

    pub(crate) fn lookup<T>(heap: &Weak<Shared>, key: Key) -> Option<(Heap, Arc<T>)>
    where
        T: Send + Sync + 'static,
    {
        let shared = heap.upgrade()?;
        let found = shared.lock().get(key)?;
        let value = found.downcast::<T>().ok()?;
        Some((Heap { shared }, value))
    }

    pub(crate) fn same_heap(a: &Weak<Shared>, b: &Weak<Shared>) -> bool {
        Weak::ptr_eq(a, b)
    }
}

impl Default for Heap {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap").field("stats", &self.stats()).finish()
    }
}
