use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::{any::Any, cell::RefCell, fmt};

use super::WeakOption;
use crate::table::{Key, SlotTable};
use crate::HeapStats;

pub(crate) type Shared = RefCell<SlotTable<Rc<dyn Any>>>;

/// A single-threaded reclaimer for [`WeakOption`]s.
///
/// The heap keeps every value it allocated alive until [`collect`] finds that no [`Rc`] outside
/// the heap refers to it. `Heap` is a cheap handle: clones refer to the same heap, and the heap
/// (together with everything it still holds) is dropped with its last handle.
///
/// A heap owns only what it allocated itself, through [`alloc`], [`weak`] and the combinators of
/// [`WeakOption`]. A value registered with [`WeakOption::from_rc`] that some other heap (or
/// plain [`Rc::new`]) allocated is only observed, and disappears as soon as its last outside
/// `Rc` is dropped; `collect` then merely frees the slot. One allocation therefore has at most
/// one owning heap, and registering it with several heaps never keeps it alive.
///
/// Values registered here must not own a `Heap` handle to the same heap, or neither will ever
/// be freed.
///
/// # Example
/// ```
/// use waning::rc::Heap;
///
/// let heap = Heap::new();
/// let kept = heap.alloc(1);
/// let _unowned = heap.weak(2);
///
/// assert_eq!(heap.len(), 2);
/// assert_eq!(heap.collect(), 1);
/// assert_eq!(heap.len(), 1);
/// # drop(kept);
/// ```
///
/// [`collect`]: Heap::collect
/// [`alloc`]: Heap::alloc
/// [`weak`]: Heap::weak
#[derive(Clone)]
pub struct Heap {
    shared: Rc<Shared>,
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
            shared: Rc::new(RefCell::new(SlotTable::with_capacity(capacity))),
        }
    }

    /// Moves `value` into the heap and returns its first owner.
    ///
    /// The value stays reachable through [`WeakOption`]s for as long as the returned `Rc`
    /// (or a clone of it) is alive.
    pub fn alloc<T: 'static>(&self, value: T) -> Rc<T> {
        let owner = Rc::new(value);
        self.adopt(owner.clone());
        owner
    }

    /// Moves `value` into the heap without keeping an owner.
    ///
    /// The returned container observes the value until the next [`collect`](Heap::collect).
    ///
    /// # Example
    /// ```
    /// use waning::rc::Heap;
    ///
    /// let heap = Heap::new();
    /// let weak = heap.weak("short-lived");
    /// assert!(weak.is_present());
    ///
    /// heap.collect();
    /// assert!(!weak.is_present());
    /// ```
    #[inline]
    pub fn weak<T: 'static>(&self, value: T) -> WeakOption<T> {
        WeakOption::new(self, value)
    }

    /// Reclaims every value without an owner outside the heap.
    ///
    /// Dropping a reclaimed value may release the last owner of another value, so the pass is
    /// repeated until it frees nothing. Returns the total number of reclaimed values.
    pub fn collect(&self) -> usize {
        let mut total = 0;
        loop {
            let mut released = Vec::new();
            let freed = self.shared.borrow_mut().sweep(&mut released);
            // Drop outside the borrow, destructors may touch the heap.
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
        self.shared.borrow().len()
    }

    /// Returns `true` if the heap holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the heap's counters.
    #[inline]
    pub fn stats(&self) -> HeapStats {
        self.shared.borrow().stats()
    }

    /// Takes ownership of a value allocated on behalf of this heap.
    pub(crate) fn adopt<T: 'static>(&self, owner: Rc<T>) -> (Weak<Shared>, Key) {
        let erased: Rc<dyn Any> = owner;
        let key = self.shared.borrow_mut().insert_owned(erased);
        event!(trace, slot = key.index, generation = key.generation, "allocated value");
        (Rc::downgrade(&self.shared), key)
    }

    /// Registers a value owned elsewhere without taking a strong reference to it.
    pub(crate) fn observe<T: 'static>(&self, owner: &Rc<T>) -> (Weak<Shared>, Key) {
        let erased: Rc<dyn Any> = owner.clone();
        let key = self.shared.borrow_mut().insert_observed(&erased);
        event!(trace, slot = key.index, generation = key.generation, "observed value");
        (Rc::downgrade(&self.shared), key)
    }

    /// Queries the slot behind `key` once, pinning the value if it is still there.
    pub(crate) fn lookup<T: 'static>(heap: &Weak<Shared>, key: Key) -> Option<(Heap, Rc<T>)> {
        let shared = heap.upgrade()?;
        let found = shared.borrow_mut().get(key)?;
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
