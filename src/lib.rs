#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

//! # `waning`
//! Optional values that are only weakly held, and may be reclaimed between two observations.
//!
//! A [`WeakOption<T>`](rc::WeakOption) never owns its value. It stores a weak handle into a
//! [`Heap`](rc::Heap), and every access asks the heap whether the value is still there.
//! The answer is always one of two outcomes, present or absent, and no operation on a
//! `WeakOption` ever panics because a value has gone away.
//!
//! Rust reclaims reference-counted values the moment their last owner is dropped, which would
//! make freshly mapped values vanish before anyone could look at them. This crate therefore
//! brings its own reclaimer: a heap registers values and frees the ones nobody else owns when
//! [`Heap::collect`](rc::Heap::collect) runs, much like a tracing collector would between
//! two observations.
//!
//! Two flavours are available:
//! - [`rc`]: single-threaded, backed by [`Rc`](alloc::rc::Rc). Works without `std`.
//! - [`sync`]: thread-safe, backed by [`Arc`](alloc::sync::Arc). Requires the `std` feature.
//!
//! # Example
//! ```
//! use waning::rc::{Heap, WeakOption};
//!
//! let heap = Heap::new();
//! let alpha = heap.alloc(String::from("alpha"));
//! let weak = WeakOption::from_rc(&heap, &alpha);
//!
//! // The value is owned by `alpha`, so it survives collection
//! heap.collect();
//! assert_eq!(weak.clone().map(|s| s.len()).fold(|| 0, |len| *len), 5);
//!
//! // Once the last owner is gone, the next collection reclaims it
//! drop(alpha);
//! heap.collect();
//! assert!(weak.fold(|| true, |_| false));
//! ```

#![deny(missing_docs)]
#![deny(clippy::std_instead_of_core)]
#![deny(clippy::std_instead_of_alloc)]

extern crate alloc;
extern crate core;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

/// Emits a `tracing` event when the `tracing` feature is enabled.
macro_rules! event {
    ($level:ident, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        ::tracing::$level!($($arg)+);
    };
}

pub mod rc;
#[cfg(feature = "std")]
pub mod sync;

mod table;

pub use table::HeapStats;
