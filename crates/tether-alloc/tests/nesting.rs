//! Property: any nesting of scoped overrides restores the original slot.

use std::sync::Arc;

use proptest::prelude::*;
use tether_alloc::{registry, AllocatorRef, SystemAllocator, ThreadAllocatorScope};

fn pool() -> Vec<AllocatorRef> {
    (0..3)
        .map(|_| Arc::new(SystemAllocator::new()) as AllocatorRef)
        .collect()
}

/// Install `ops[0]`, recurse, then check the installed allocator survived
/// the inner scopes.
fn nest(ops: &[Option<usize>], pool: &[AllocatorRef]) {
    let Some((first, rest)) = ops.split_first() else {
        return;
    };
    let scope = ThreadAllocatorScope::new(first.map(|i| &pool[i]));
    let expected = match first {
        Some(i) => Arc::clone(&pool[*i]),
        None => Arc::clone(registry::default_allocator()),
    };
    assert!(Arc::ptr_eq(&registry::current(), &expected));
    assert!(Arc::ptr_eq(scope.allocator(), &expected));

    nest(rest, pool);

    assert!(Arc::ptr_eq(&registry::current(), &expected));
}

proptest! {
    #[test]
    fn nested_scopes_restore_original(
        initial in proptest::option::of(0usize..3),
        ops in proptest::collection::vec(proptest::option::of(0usize..3), 0..16),
    ) {
        let pool = pool();
        registry::set_current(initial.map(|i| &pool[i]));
        let before = registry::current();
        let had_override = registry::has_override();

        nest(&ops, &pool);

        prop_assert!(Arc::ptr_eq(&registry::current(), &before));
        prop_assert_eq!(registry::has_override(), had_override);
        registry::clear_current();
    }
}

#[test]
fn deep_nesting_restores_each_level() {
    let pool = pool();
    registry::clear_current();
    let ops: Vec<Option<usize>> = (0..64)
        .map(|i| if i % 5 == 0 { None } else { Some(i % 3) })
        .collect();
    nest(&ops, &pool);
    assert!(!registry::has_override());
}
