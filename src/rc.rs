//! Weakly-held optional values over a single-threaded heap.
//!
//! Available types:
//! - [`Heap`]
//! - [`WeakOption`]
//!
//! # Example
//! ```
//! use waning::rc::{Heap, WeakOption};
//!
//! let heap = Heap::new();
//! let name = heap.alloc(String::from("alpha"));
//!
//! let weak = WeakOption::from_rc(&heap, &name);
//! let len = weak.clone().map(|name| name.len());
//! assert_eq!(len.fold(|| 0, |len| *len), 5);
//!
//! drop(name);
//! heap.collect();
//!
//! // Values nobody owns anymore fall through to the alternative
//! let fallback = weak.or_else(|| heap.weak(String::from("fallback")));
//! assert_eq!(*fallback.get_or_else(|| heap.alloc(String::new())), "fallback");
//! ```
//!
//! `WeakOption` is bound to the thread of its heap.
//!
//! ```compile_fail,E0277
//! use waning::rc::Heap;
//! let heap = Heap::new();
//! let weak = heap.weak(1);
//! std::thread::spawn(move || weak.is_present());
//! ```

mod heap;

use alloc::rc::{Rc, Weak};
use core::{fmt, marker::PhantomData};

use crate::table::Key;

pub use heap::Heap;
use heap::Shared;

/// An optional value that is only weakly held by its container.
///
/// The container stores a handle into a [`Heap`] and never the value itself. Every observation
/// queries the heap once, and yields either a strong [`Rc<T>`] that keeps the value alive for
/// as long as the caller holds it, or nothing. The value may disappear between two
/// observations when the heap reclaims it, but never while it is pinned by an `Rc`.
///
/// No operation panics when the value is gone. Absence propagates through every combinator,
/// and none of them can bring a reclaimed value back.
///
/// # Example
/// ```
/// use waning::rc::{Heap, WeakOption};
///
/// let heap = Heap::new();
/// let answer = heap.alloc(42);
/// let weak = WeakOption::from_rc(&heap, &answer);
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
    ///
    /// All empty containers are indistinguishable and none of them allocates.
    ///
    /// # Example
    /// ```
    /// use waning::rc::WeakOption;
    ///
    /// let empty = WeakOption::<u8>::empty();
    /// assert!(WeakOption::same_handle(&empty, &WeakOption::default()));
    /// ```
    #[inline]
    pub const fn empty() -> Self {
        Self {
            handle: None,
            _marker: PhantomData,
        }
    }

    /// Moves `value` into `heap` and observes it weakly.
    ///
    /// Nothing outside the heap owns the value, so it stays present only until the heap's next
    /// [`collect`](Heap::collect).
    #[inline]
    pub fn new(heap: &Heap, value: T) -> Self {
        Self::registered(heap.adopt(Rc::new(value)))
    }

    /// Observes the value owned by `rc` without extending its lifetime.
    ///
    /// The value stays present while `rc` or any of its clones is alive. Registering the same
    /// allocation twice with one heap observes it through the same slot.
    ///
    /// `heap` never takes ownership here. If `rc` came from [`Heap::alloc`] on the same heap, the
    /// container shares that heap's slot; otherwise the heap only watches the allocation, and the
    /// value is gone the moment its last outside `Rc` drops, without waiting for a
    /// [`collect`](Heap::collect).
    ///
    /// # Example
    /// ```
    /// use waning::rc::{Heap, WeakOption};
    ///
    /// let heap = Heap::new();
    /// let owner = heap.alloc(7);
    /// let weak = WeakOption::from_rc(&heap, &owner);
    ///
    /// heap.collect();
    /// assert!(weak.is_present());
    ///
    /// drop(owner);
    /// heap.collect();
    /// assert!(!weak.is_present());
    /// ```
    pub fn from_rc(heap: &Heap, rc: &Rc<T>) -> Self {
        Self::registered(heap.observe(rc))
    }

    #[inline]
    fn registered((heap, key): (Weak<Shared>, Key)) -> Self {
        Self {
            handle: Some(Handle { heap, key }),
            _marker: PhantomData,
        }
    }

    /// Queries the heap exactly once. Every other operation goes through here.
    fn observe(&self) -> Option<(Heap, Rc<T>)> {
        let handle = self.handle.as_ref()?;
        Heap::lookup(&handle.heap, handle.key)
    }

    /// Resolves the container into one of two outcomes.
    ///
    /// Calls `on_present` with a strong owner of the value if it is still there, or
    /// `on_absent` otherwise. The heap is queried exactly once per call, and the value cannot
    /// be reclaimed while `on_present` holds it.
    ///
    /// # Example
    /// ```
    /// use waning::rc::{Heap, WeakOption};
    ///
    /// let heap = Heap::new();
    /// let owner = heap.alloc("alpha");
    /// let weak = WeakOption::from_rc(&heap, &owner);
    ///
    /// let greeting = weak.fold(|| String::from("nobody"), |name| format!("hello {name}"));
    /// assert_eq!(greeting, "hello alpha");
    /// ```
    #[inline]
    pub fn fold<B, A, P>(&self, on_absent: A, on_present: P) -> B
    where
        A: FnOnce() -> B,
        P: FnOnce(Rc<T>) -> B,
    {
        match self.observe() {
            Some((_, value)) => on_present(value),
            None => on_absent(),
        }
    }

    /// Applies `f` to the value if it is present, and observes the result weakly.
    ///
    /// The result is moved into the same heap with no owner of its own, so it is reclaimed
    /// independently of the source on the next [`collect`](Heap::collect). `f` is not called
    /// when the value is absent.
    pub fn map<U, F>(self, f: F) -> WeakOption<U>
    where
        U: 'static,
        F: FnOnce(&T) -> U,
    {
        match self.observe() {
            Some((heap, value)) => WeakOption::new(&heap, f(&value)),
            None => WeakOption::empty(),
        }
    }

    /// Continues with `f` if the value is present.
    ///
    /// The result of `f` is returned as is, and may itself be empty. `f` is not called when the
    /// value is absent.
    ///
    /// # Example
    /// ```
    /// use waning::rc::{Heap, WeakOption};
    ///
    /// let heap = Heap::new();
    /// let owner = heap.alloc(3);
    /// let weak = WeakOption::from_rc(&heap, &owner);
    ///
    /// let checked = weak.flat_map(|x| if *x > 0 { heap.weak(*x) } else { WeakOption::empty() });
    /// assert!(checked.is_present());
    /// ```
    #[inline]
    pub fn flat_map<U, F>(self, f: F) -> WeakOption<U>
    where
        U: 'static,
        F: FnOnce(Rc<T>) -> WeakOption<U>,
    {
        match self.observe() {
            Some((_, value)) => f(value),
            None => WeakOption::empty(),
        }
    }

    /// Keeps the value only if it is present and satisfies `predicate`.
    ///
    /// `predicate` runs at most once, and only while the value is pinned. A passing value is
    /// observed through a new container; a failing one behaves exactly like a reclaimed one.
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: FnOnce(&T) -> bool,
    {
        match self.observe() {
            Some((heap, value)) => {
                if predicate(&value) {
                    Self::from_rc(&heap, &value)
                } else {
                    Self::empty()
                }
            }
            None => Self::empty(),
        }
    }

    /// Applies `f` to the value if it is present, keeping the result only if `f` returns `Some`.
    ///
    /// This is [`map`](Self::map) and [`filter`](Self::filter) in one query. `f` runs at most
    /// once, and a kept result lives in the source's heap with no owner of its own.
    ///
    /// # Example
    /// ```
    /// use waning::rc::Heap;
    ///
    /// let heap = Heap::new();
    /// let parsed = heap.weak("42").filter_map(|s| s.parse::<u32>().ok());
    /// assert_eq!(parsed.fold(|| 0, |n| *n), 42);
    ///
    /// let rejected = heap.weak("forty-two").filter_map(|s| s.parse::<u32>().ok());
    /// assert!(!rejected.is_present());
    /// ```
    pub fn filter_map<U, F>(self, f: F) -> WeakOption<U>
    where
        U: 'static,
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
    /// An absent value yields `Ok` with an empty container and never calls `f`. Otherwise the
    /// error of `f` is returned as is, and a success is observed like the result of
    /// [`map`](Self::map).
    ///
    /// # Example
    /// ```
    /// use waning::rc::{Heap, WeakOption};
    ///
    /// let heap = Heap::new();
    /// let parsed = heap.weak("7").try_map(|s| s.parse::<u8>()).unwrap();
    /// assert_eq!(parsed.fold(|| 0, |n| *n), 7);
    ///
    /// assert!(heap.weak("x").try_map(|s| s.parse::<u8>()).is_err());
    ///
    /// let absent = WeakOption::<&str>::empty().try_map(|s| s.parse::<u8>()).unwrap();
    /// assert!(!absent.is_present());
    /// ```
    pub fn try_map<U, E, F>(self, f: F) -> Result<WeakOption<U>, E>
    where
        U: 'static,
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
    /// use std::rc::Rc;
    /// use waning::rc::WeakOption;
    ///
    /// let value = WeakOption::empty().get_or_else(|| Rc::new("fallback"));
    /// assert_eq!(*value, "fallback");
    /// ```
    #[inline]
    pub fn get_or_else<F>(self, fallback: F) -> Rc<T>
    where
        F: FnOnce() -> Rc<T>,
    {
        self.fold(fallback, |value| value)
    }

    /// Returns this container if the value is present, or the result of `fallback` otherwise.
    ///
    /// `fallback` is only evaluated when the value is absent.
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
    pub fn upgrade(&self) -> Option<Rc<T>> {
        self.fold(|| None, Some)
    }

    /// Returns `true` if the value is present at the time of the call.
    ///
    /// The answer may be out of date as soon as it is returned; use [`fold`](Self::fold) to act
    /// on the value.
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

    /// Pairs this value with the value of `other`.
    ///
    /// Each container is queried once. The pair keeps both values alive while it is itself
    /// present, and lives in this container's heap with no owner of its own.
    ///
    /// # Example
    /// ```
    /// use waning::rc::{Heap, WeakOption};
    ///
    /// let heap = Heap::new();
    /// let pair = heap.weak(1).zip(heap.weak("one"));
    /// assert_eq!(pair.fold(|| (0, ""), |pair| (*pair.0, *pair.1)), (1, "one"));
    ///
    /// let missing = heap.weak(1).zip(WeakOption::<u8>::empty());
    /// assert!(!missing.is_present());
    /// ```
    pub fn zip<U: 'static>(self, other: WeakOption<U>) -> WeakOption<(Rc<T>, Rc<U>)> {
        let (heap, value) = match self.observe() {
            Some(observed) => observed,
            None => return WeakOption::empty(),
        };
        match other.upgrade() {
            Some(other) => WeakOption::new(&heap, (value, other)),
            None => WeakOption::empty(),
        }
    }

    /// Returns `true` if both containers observe the same slot of the same heap, or are both
    /// empty.
    ///
    /// This never queries the heap.
    pub fn same_handle(this: &Self, other: &Self) -> bool {
        match (&this.handle, &other.handle) {
            (None, None) => true,
            (Some(a), Some(b)) => a.key == b.key && Heap::same_heap(&a.heap, &b.heap),
            _ => false,
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
