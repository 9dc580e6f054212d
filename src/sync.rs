//! Weakly-held optional values over a thread-safe heap.
//!
//! Available types:
//! - [`Heap`]
//! - [`WeakOption`]
//!
//! # Example
//! ```
//! use waning::sync::{Heap, WeakOption};
//!
//! let heap = Heap::new();
//! let name = heap.alloc(String::from("alpha"));
//! let weak = WeakOption::from_arc(&heap, &name);
//!
//! let reader = {
//!     let weak = weak.clone();
//!     std::thread::spawn(move || weak.fold(|| 0, |name| name.len()))
//! };
//! assert_eq!(reader.join().unwrap(), 5);
//!
//! drop(name);
//! heap.collect();
//! assert!(!weak.is_present());
//! ```
//!
//! Only values that are `Send + Sync` can be observed from a thread-safe heap.
//!
//! ```compile_fail,E0277
//! use std::rc::Rc;
//! use waning::sync::Heap;
//! let heap = Heap::new();
//! // Error: Rc<u8> is !Send + !Sync
//! let weak = heap.weak(Rc::new(1u8));
//! ```
//!
//! Observers on different threads do not coordinate with each other. Around a concurrent
//! [`Heap::collect`], one thread may still see a value that another already sees as gone.

mod heap;

use alloc::sync::{Arc, Weak};
use core::{fmt, marker::PhantomData};

use crate::table::Key;

pub use heap::Heap;
use heap::Shared;

/// An optional value that is only weakly held by its container.
///
/// This is the atomic counterpart of [`rc::WeakOption`](crate::rc::WeakOption). Observations
/// yield an [`Arc<T>`] that keeps the value alive while the caller holds it. The container
/// itself carries no lock and can be shared freely between threads.
///
/// # Example
/// ```
/// use waning::sync::{Heap, WeakOption};
///
/// let heap = Heap::new();
/// let answer = heap.alloc(42);
/// let weak = WeakOption::from_arc(&heap, &answer);
///
/// let doubled = weak.clone().map(|x| x * 2);
/// assert_eq!(doubled.fold(|| 0, |x| *x), 84);
///
/// let odd = weak.filter(|x| x % 2 == 1);
/// assert!(!odd.is_present());
/// ```
pub struct WeakOption<T: 'static> {
    handle: Option<Handle>,
    _marker: PhantomData<fn() -> T>,
}

struct Handle {
    heap: Weak<Shared>,
    key: Key,
}

impl<T: 'static> WeakOption<T> {
    /// Returns the canonical empty container.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            handle: None,
            _marker: PhantomData,
        }
    }

    /// Returns `true` if both containers observe the same slot of the same heap, or are both
    /// empty.
    pub fn same_handle(this: &Self, other: &Self) -> bool {
        match (&this.handle, &other.handle) {
            (None, None) => true,
            (Some(a), Some(b)) => a.key == b.key && Heap::same_heap(&a.heap, &b.heap),
            _ => false,
        }
    }
}

impl<T> WeakOption<T>
where
    T: Send + Sync + 'static,
{
    /// Moves `value` into `heap` and observes it weakly.
    ///
    /// The value stays present only until the heap's next [`collect`](Heap::collect).
    #[inline]
    pub fn new(heap: &Heap, value: T) -> Self {
        Self::registered(heap.adopt(Arc::new(value)))
    }

    /// Observes the value owned by `arc` without extending its lifetime.
    ///
    /// `heap` never takes ownership here. An `Arc` from [`Heap::alloc`] on the same heap shares
    /// that heap's slot; any other `Arc` is only watched, and its value is gone the moment the
    /// last outside `Arc` drops.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use waning::sync::{Heap, WeakOption};
    ///
    /// let (a, b) = (Heap::new(), Heap::new());
    /// let owner = Arc::new(3);
    /// let in_a = WeakOption::from_arc(&a, &owner);
    /// let in_b = WeakOption::from_arc(&b, &owner);
    /// assert!(in_a.is_present() && in_b.is_present());
    ///
    /// drop(owner);
    /// assert!(!in_a.is_present() && !in_b.is_present());
    /// ```
    pub fn from_arc(heap: &Heap, arc: &Arc<T>) -> Self {
        Self::registered(heap.observe(arc))
    }

    #[inline]
    fn registered((heap, key): (Weak<Shared>, Key)) -> Self {
        Self {
            handle: Some(Handle { heap, key }),
            _marker: PhantomData,
        }
    }

    fn observe(&self) -> Option<(Heap, Arc<T>)> {
        let handle = self.handle.as_ref()?;
        Heap::lookup(&handle.heap, handle.key)
    }

    /// Resolves the container into one of two outcomes.
    ///
    /// Calls `on_present` with a strong owner of the value if it is still there, or
    /// `on_absent` otherwise. The heap is queried exactly once, and a concurrent
    /// [`collect`](Heap::collect) cannot reclaim the value while `on_present` holds it.
    ///
    /// # Example
    /// ```
    /// use waning::sync::{Heap, WeakOption};
    ///
    /// let heap = Heap::new();
    /// let owner = heap.alloc("alpha");
    /// let weak = WeakOption::from_arc(&heap, &owner);
    /// assert_eq!(weak.fold(|| 0, |name| name.len()), 5);
    ///
    /// drop(owner);
    /// heap.collect();
    /// assert_eq!(weak.fold(|| 0, |name| name.len()), 0);
    /// ```
    #[inline]
    pub fn fold<B, A, P>(&self, on_absent: A, on_present: P) -> B
    where
        A: FnOnce() -> B,
        P: FnOnce(Arc<T>) -> B,
    {
        match self.observe() {
            Some((_, value)) => on_present(value),
            None => on_absent(),
        }
    }

    /// Applies `f` to the value if it is present, and observes the result weakly.
    ///
    /// The result is moved into the source's heap with no owner, so the next
    /// [`collect`](Heap::collect) reclaims it independently of the source. `f` is not called
    /// when the value is absent.
    ///
    /// # Example
    /// ```
    /// use waning::sync::Heap;
    ///
    /// let heap = Heap::new();
    /// let len = heap.weak(String::from("alpha")).map(|s| s.len());
    /// assert_eq!(len.fold(|| 0, |len| *len), 5);
    ///
    /// heap.collect();
    /// assert!(!len.is_present());
    /// ```
    pub fn map<U, F>(self, f: F) -> WeakOption<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U,
    {
        match self.observe() {
            Some((heap, value)) => WeakOption::new(&heap, f(&value)),
            None => WeakOption::empty(),
        }
    }

    /// Continues with `f` if the value is present. `f` is not called otherwise.
    #[inline]
    pub fn flat_map<U, F>(self, f: F) -> WeakOption<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Arc<T>) -> WeakOption<U>,
    {
        match self.observe() {
            Some((_, value)) => f(value),
            None => WeakOption::empty(),
        }
    }

    /// Keeps the value only if it is present and satisfies `predicate`.
    ///
    /// `predicate` runs at most once, and only while the value is pinned. A passing value is
    /// observed through a new container on the same slot.
    ///
    /// # Example
    /// ```
    /// use waning::sync::{Heap, WeakOption};
    ///
    /// let heap = Heap::new();
    /// let owner = heap.alloc(8);
    /// let weak = WeakOption::from_arc(&heap, &owner);
    ///
    /// assert!(weak.clone().filter(|x| x % 2 == 0).is_present());
    /// assert!(!weak.filter(|x| x % 2 == 1).is_present());
    /// ```
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: FnOnce(&T) -> bool,
    {
        match self.observe() {
            Some((heap, value)) => {
                if predicate(&value) {
                    Self::from_arc(&heap, &value)
                } else {
                    Self::empty()
                }
            }
            None => Self::empty(),
        }
    }

    /// Applies `f` to the value if it is present, keeping the result only if `f` returns `Some`.
    ///
    /// # Example
    /// ```
    /// use waning::sync::Heap;
    ///
    /// let heap = Heap::new();
    /// let parsed = heap.weak("42").filter_map(|s| s.parse::<u32>().ok());
    /// assert_eq!(parsed.fold(|| 0, |n| *n), 42);
    /// ```
    pub fn filter_map<U, F>(self, f: F) -> WeakOption<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Option<U>,
    {
        match self.observe() {
            Some((heap, value)) => match f(&value) {
                Some(mapped) => WeakOption::new(&heap, mapped),
                None => WeakOption::empty(),
            },
            None => WeakOption::empty(),
        }
    }

    /// Applies a fallible `f` to the value if it is present.
    ///
    /// An absent value yields `Ok` with an empty container and never calls `f`.
    ///
    /// # Example
    /// ```
    /// use waning::sync::Heap;
    ///
    /// let heap = Heap::new();
    /// let parsed = heap.weak("7").try_map(|s| s.parse::<u8>()).unwrap();
    /// assert_eq!(parsed.fold(|| 0, |n| *n), 7);
    /// assert!(heap.weak("x").try_map(|s| s.parse::<u8>()).is_err());
    /// ```
    pub fn try_map<U, E, F>(self, f: F) -> Result<WeakOption<U>, E>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, E>,
    {
        match self.observe() {
            Some((heap, value)) => Ok(WeakOption::new(&heap, f(&value)?)),
            None => Ok(WeakOption::empty()),
        }
    }

    /// Returns a strong owner of the value, or the result of `fallback` if it is gone.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use waning::sync::WeakOption;
    ///
    /// let value = WeakOption::empty().get_or_else(|| Arc::new("fallback"));
    /// assert_eq!(*value, "fallback");
    /// ```
    #[inline]
    pub fn get_or_else<F>(self, fallback: F) -> Arc<T>
    where
        F: FnOnce() -> Arc<T>,
    {
        self.fold(fallback, |value| value)
    }

    /// Returns this container if the value is present, or the result of `fallback` otherwise.
    ///
    /// `fallback` is only evaluated when the value is absent.
    ///
    /// # Example
    /// ```
    /// use waning::sync::Heap;
    ///
    /// let heap = Heap::new();
    /// let primary = heap.weak(1);
    /// let kept = primary.clone().or_else(|| unreachable!());
    /// assert_eq!(kept.fold(|| 0, |x| *x), 1);
    ///
    /// heap.collect();
    /// let replaced = primary.or_else(|| heap.weak(2));
    /// assert_eq!(replaced.fold(|| 0, |x| *x), 2);
    /// ```
    #[inline]
    pub fn or_else<F>(self, fallback: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self.observe() {
            Some(_) => self,
            None => fallback(),
        }
    }

    /// Returns a strong owner of the value if it is still present.
    #[inline]
    pub fn upgrade(&self) -> Option<Arc<T>> {
        self.fold(|| None, Some)
    }

    /// Returns `true` if the value is present at the time of the call.
    ///
    /// Another thread may collect the value right after; use [`fold`](Self::fold) to act on it.
    #[inline]
    pub fn is_present(&self) -> bool {
        self.fold(|| false, |_| true)
    }

    /// Returns `true` if the value is present and satisfies `predicate`.
    #[inline]
    pub fn exists<P>(&self, predicate: P) -> bool
    where
        P: FnOnce(&T) -> bool,
    {
        self.fold(|| false, |value| predicate(&value))
    }

    /// Pairs this value with the value of `other`, querying each container once.
    ///
    /// The pair keeps both values alive while it is present, and lives in this container's heap
    /// with no owner of its own.
    pub fn zip<U>(self, other: WeakOption<U>) -> WeakOption<(Arc<T>, Arc<U>)>
    where
        U: Send + Sync + 'static,
    {
        let (heap, value) = match self.observe() {
            Some(observed) => observed,
            None => return WeakOption::empty(),
        };
        match other.upgrade() {
            Some(other) => WeakOption::new(&heap, (value, other)),
            None => WeakOption::empty(),
        }
    }
}

impl<T: 'static> Clone for WeakOption<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.as_ref().map(|handle| Handle {
                heap: handle.heap.clone(),
                key: handle.key,
            }),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Default for WeakOption<T> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: 'static> fmt::Debug for WeakOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(handle) => f
                .debug_struct("WeakOption")
                .field("slot", &handle.key.index)
                .field("generation", &handle.key.generation)
                .finish(),
            None => write!(f, "WeakOption(<empty>)"),
        }
    }
}
