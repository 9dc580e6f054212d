#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use waning::sync::{Heap, WeakOption};

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn fold_observes_live_value() {
    let heap = Heap::new();
    let alpha = heap.alloc(String::from("alpha"));
    let weak = WeakOption::from_arc(&heap, &alpha);

    assert_eq!(weak.fold(String::new, |s| s.to_uppercase()), "ALPHA");
    assert_eq!(weak.map(|s| s.len()).fold(|| 0, |len| *len), 5);
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn empty_stays_empty() {
    let empty = WeakOption::<&str>::empty();

    assert_eq!(*empty.clone().get_or_else(|| Arc::new("fallback")), "fallback");
    assert!(!empty.clone().map(|s| s.len()).is_present());
    assert!(!empty.clone().filter(|_| true).is_present());
    assert!(WeakOption::same_handle(&empty, &WeakOption::default()));
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn reclaimed_value_falls_through() {
    let heap = Heap::new();
    let owner = heap.alloc(17u32);
    let weak = WeakOption::from_arc(&heap, &owner);

    drop(owner);
    assert_eq!(heap.collect(), 1);

    let calls = AtomicUsize::new(0);
    let mapped = weak.clone().map(|x| {
        calls.fetch_add(1, Ordering::SeqCst);
        *x
    });
    let bound = weak.clone().flat_map(|x| {
        calls.fetch_add(1, Ordering::SeqCst);
        heap.weak(*x)
    });
    let filtered = weak.clone().filter(|_| {
        calls.fetch_add(1, Ordering::SeqCst);
        true
    });
    let parsed = weak.clone().filter_map(|x| {
        calls.fetch_add(1, Ordering::SeqCst);
        Some(*x)
    });
    let tried = weak.clone().try_map(|x| {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<u32, _>(*x)
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!mapped.is_present());
    assert!(!bound.is_present());
    assert!(!filtered.is_present());
    assert!(!parsed.is_present());
    assert!(!tried.unwrap().is_present());

    let alternative = weak.or_else(|| heap.weak(99));
    assert_eq!(alternative.fold(|| 0, |x| *x), 99);
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn filter_and_flat_map() {
    let heap = Heap::new();
    let owner = heap.alloc(8);
    let weak = WeakOption::from_arc(&heap, &owner);

    let halved = weak
        .clone()
        .filter(|x| x % 2 == 0)
        .flat_map(|x| heap.weak(*x / 2));
    assert_eq!(halved.fold(|| 0, |x| *x), 4);

    let odd = weak.filter(|x| x % 2 == 1);
    assert!(!odd.is_present());
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn fold_queries_heap_once() {
    let heap = Heap::new();
    let owner = heap.alloc(1u8);
    let weak = WeakOption::from_arc(&heap, &owner);

    let operations: [(&str, &dyn Fn()); 10] = [
        ("fold", &|| weak.fold(|| (), |_| ())),
        ("map", &|| {
            let _ = weak.clone().map(|x| *x);
        }),
        ("flat_map", &|| {
            let _ = weak.clone().flat_map(|_| WeakOption::<u8>::empty());
        }),
        ("filter", &|| {
            let _ = weak.clone().filter(|_| true);
        }),
        ("filter_map", &|| {
            let _ = weak.clone().filter_map(|x| Some(*x));
        }),
        ("try_map", &|| {
            let _ = weak.clone().try_map(|x| Ok::<_, ()>(*x));
        }),
        ("get_or_else", &|| {
            let _ = weak.clone().get_or_else(|| Arc::new(0));
        }),
        ("or_else", &|| {
            let _ = weak.clone().or_else(WeakOption::empty);
        }),
        ("exists", &|| {
            let _ = weak.exists(|_| true);
        }),
        ("zip", &|| {
            let _ = weak.clone().zip(WeakOption::<u8>::empty());
        }),
    ];
    for (name, operation) in operations {
        let before = heap.stats().lookups;
        operation();
        assert_eq!(heap.stats().lookups, before + 1, "{}", name);
    }

    drop(owner);
    heap.collect();
    for (name, operation) in operations {
        let before = heap.stats().lookups;
        operation();
        assert_eq!(heap.stats().lookups, before + 1, "{} on a reclaimed value", name);
    }
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn filter_map_and_try_map() {
    let heap = Heap::new();
    let owner = heap.alloc(String::from("12"));
    let weak = WeakOption::from_arc(&heap, &owner);

    let number = weak.clone().filter_map(|s| s.parse::<u32>().ok());
    assert_eq!(number.fold(|| 0, |n| *n), 12);
    assert!(!weak.clone().filter_map(|s| s.parse::<i8>().ok().filter(|n| *n < 0)).is_present());

    let tried = weak.clone().try_map(|s| s.parse::<u8>()).unwrap();
    assert_eq!(tried.fold(|| 0, |n| *n), 12);
    assert!(weak.try_map(|s| s.parse::<bool>()).is_err());

    assert_eq!(heap.collect(), 2);
    assert!(!number.is_present());
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn allocation_watched_by_two_heaps_is_reclaimed() {
    let (a, b) = (Heap::new(), Heap::new());
    let owner = a.alloc("x");
    let in_a = WeakOption::from_arc(&a, &owner);
    let in_b = WeakOption::from_arc(&b, &owner);
    drop(owner);

    assert_eq!(b.collect(), 0);
    assert_eq!(a.collect(), 1);
    assert!(!in_a.is_present());
    assert!(!in_b.is_present());
    assert_eq!(b.collect(), 1);
    assert!(a.is_empty() && b.is_empty());
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn foreign_value_vanishes_with_its_owner() {
    let heap = Heap::new();
    let owner = Arc::new(5);
    let weak = WeakOption::from_arc(&heap, &owner);

    assert_eq!(heap.collect(), 0);
    assert_eq!(Arc::strong_count(&owner), 1);

    drop(owner);
    assert!(!weak.is_present());
    assert_eq!(heap.collect(), 1);
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn shared_between_threads() {
    let heap = Heap::new();
    let owner = heap.alloc(vec![1u64, 2, 3]);
    let weak = WeakOption::from_arc(&heap, &owner);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let weak = weak.clone();
            thread::spawn(move || weak.fold(|| 0, |v| v.iter().sum::<u64>()))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 6);
    }
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn pinned_value_outlives_concurrent_collection() {
    let heap = Heap::new();
    let owner = heap.alloc(String::from("pinned"));
    let weak = WeakOption::from_arc(&heap, &owner);
    let barrier = Arc::new(Barrier::new(2));

    let reader = {
        let weak = weak.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            weak.fold(String::new, |s| {
                // Owner is dropped and a collection runs while we hold the value
                barrier.wait();
                barrier.wait();
                (*s).clone()
            })
        })
    };

    barrier.wait();
    drop(owner);
    assert_eq!(heap.collect(), 0);
    barrier.wait();

    assert_eq!(reader.join().unwrap(), "pinned");
    assert_eq!(heap.collect(), 1);
    assert!(!weak.is_present());
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn concurrent_observers_see_either_outcome() {
    let heap = Heap::new();
    let owner = heap.alloc(42u32);
    let weak = WeakOption::from_arc(&heap, &owner);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let weak = weak.clone();
            thread::spawn(move || {
                (0..1000)
                    .map(|_| weak.fold(|| None, |x| Some(*x)))
                    .all(|x| x.is_none() || x == Some(42))
            })
        })
        .collect();

    drop(owner);
    heap.collect();

    for reader in readers {
        assert!(reader.join().unwrap());
    }
    // A reader may have pinned the value during the first collection
    heap.collect();
    assert!(!weak.is_present());
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn zip_and_stats() {
    let heap = Heap::with_capacity(4);
    let pair = heap.weak(1).zip(heap.weak("one"));
    assert_eq!(pair.fold(|| (0, ""), |p| (*p.0, *p.1)), (1, "one"));

    assert_eq!(heap.collect(), 3);
    let stats = heap.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.allocated, 3);
    assert_eq!(stats.reclaimed, 3);
}

#[test]
#[cfg_attr(coverage_nightly, coverage(off))]
fn fmt() {
    let heap = Heap::new();
    let weak = heap.weak(5);

    assert_eq!(format!("{:?}", WeakOption::<u8>::empty()), "WeakOption(<empty>)");
    assert_eq!(format!("{:?}", weak), "WeakOption { slot: 0, generation: 0 }");
    format!("{:?}", heap);
}
