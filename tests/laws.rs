#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Step {
    Keep,
    Drop,
    Add(i64),
}

fn any_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Keep),
        Just(Step::Drop),
        any::<i64>().prop_map(Step::Add),
    ]
}

/// Checks the combinator laws against one flavour of heap.
macro_rules! laws {
    ($name:ident, $flavour:ident, $owner:ty, $from:ident) => {
        mod $name {
            use super::{any_step, Step};
            use proptest::prelude::*;
            use waning::$flavour::{Heap, WeakOption};

            /// Observes a container as a plain option so outcomes can be compared.
            fn observed(weak: &WeakOption<i64>) -> Option<i64> {
                weak.fold(|| None, |x| Some(*x))
            }

            /// Builds a continuation for `flat_map` from a generated description.
            fn continuation(heap: &Heap, step: Step) -> impl Fn($owner) -> WeakOption<i64> + '_ {
                move |x| match step {
                    Step::Keep => heap.weak(*x),
                    Step::Drop => WeakOption::empty(),
                    Step::Add(n) => heap.weak(x.wrapping_add(n)),
                }
            }

            fn container(heap: &Heap, owner: &Option<$owner>) -> WeakOption<i64> {
                match owner {
                    Some(owner) => WeakOption::$from(heap, owner),
                    None => WeakOption::empty(),
                }
            }

            proptest! {
                #[test]
                #[cfg_attr(coverage_nightly, coverage(off))]
                fn left_identity(a in any::<i64>(), step in any_step()) {
                    let heap = Heap::new();
                    let owner = heap.alloc(a);
                    let f = continuation(&heap, step);

                    let bound = WeakOption::$from(&heap, &owner).flat_map(&f);
                    prop_assert_eq!(observed(&bound), observed(&f(owner.clone())));
                }

                #[test]
                #[cfg_attr(coverage_nightly, coverage(off))]
                fn right_identity(a in proptest::option::of(any::<i64>())) {
                    let heap = Heap::new();
                    let owner = a.map(|a| heap.alloc(a));
                    let m = container(&heap, &owner);

                    let rebound = m.clone().flat_map(|x| WeakOption::$from(&heap, &x));
                    prop_assert_eq!(observed(&rebound), observed(&m));
                }

                #[test]
                #[cfg_attr(coverage_nightly, coverage(off))]
                fn associativity(
                    a in proptest::option::of(any::<i64>()),
                    f in any_step(),
                    g in any_step(),
                ) {
                    let heap = Heap::new();
                    let owner = a.map(|a| heap.alloc(a));
                    let m = container(&heap, &owner);
                    let f = continuation(&heap, f);
                    let g = continuation(&heap, g);

                    let nested_left = m.clone().flat_map(&f).flat_map(&g);
                    let nested_right = m.flat_map(|x| f(x).flat_map(&g));
                    prop_assert_eq!(observed(&nested_left), observed(&nested_right));
                }

                #[test]
                #[cfg_attr(coverage_nightly, coverage(off))]
                fn filter_matches_predicate(a in any::<i64>(), divisor in 1i64..8) {
                    let heap = Heap::new();
                    let owner = heap.alloc(a);
                    let weak = WeakOption::$from(&heap, &owner);

                    let kept = weak.filter(|x| x % divisor == 0);
                    let expected = if a % divisor == 0 { Some(a) } else { None };
                    prop_assert_eq!(observed(&kept), expected);
                }

                #[test]
                #[cfg_attr(coverage_nightly, coverage(off))]
                fn filter_map_matches_option(a in proptest::option::of(any::<i64>()), bound in any::<i64>()) {
                    let heap = Heap::new();
                    let owner = a.map(|a| heap.alloc(a));
                    let m = container(&heap, &owner);

                    let kept = m.filter_map(|x| Some(*x).filter(|x| *x < bound));
                    prop_assert_eq!(observed(&kept), a.filter(|x| *x < bound));
                }

                #[test]
                #[cfg_attr(coverage_nightly, coverage(off))]
                fn map_never_resurrects(a in any::<i64>(), n in any::<i64>()) {
                    let heap = Heap::new();
                    let weak = heap.weak(a);
                    heap.collect();

                    let mapped = weak.clone().map(|x| x.wrapping_add(n));
                    prop_assert_eq!(observed(&mapped), None);
                    prop_assert!(weak.clone().try_map(|_| Err::<i64, _>(())).is_ok());
                    prop_assert_eq!(*weak.get_or_else(|| heap.alloc(n)), n);
                }
            }
        }
    };
}

laws!(rc_laws, rc, std::rc::Rc<i64>, from_rc);

#[cfg(feature = "std")]
laws!(sync_laws, sync, std::sync::Arc<i64>, from_arc);
