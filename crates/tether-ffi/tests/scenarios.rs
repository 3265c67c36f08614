//! End-to-end scenarios through the C entry points.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use tether_alloc::{registry, ThreadAllocatorScope};
use tether_core::StatusCode;
use tether_ffi::allocator::tether_allocator_unregister;
use tether_ffi::blob::{
    tether_blob_concat, tether_blob_create, tether_blob_destroy, tether_blob_len,
    tether_blob_utf16_from_utf8,
};
use tether_ffi::register_allocator;
use tether_test_utils::{share, CountingAllocator, FailingAllocator, PanickingAllocator};

fn create(allocator: u64, bytes: &[u8]) -> u64 {
    let mut h = 0;
    let status = tether_blob_create(allocator, bytes.as_ptr(), bytes.len(), &mut h);
    assert_eq!(status, 0, "create failed: {status:#x}");
    h
}

#[test]
fn guarded_call_leaves_one_outstanding_allocation() {
    registry::clear_current();
    let src = create(0, "größe".as_bytes());

    let (counting, a) = share(CountingAllocator::new("A"));
    let mut out = 0;
    {
        let _guard = ThreadAllocatorScope::new(Some(&a));
        // Ambient handle: the guard's allocator serves the staging block
        // and the result.
        assert_eq!(tether_blob_utf16_from_utf8(0, src, &mut out), 0);
    }

    assert!(Arc::ptr_eq(&registry::current(), registry::default_allocator()));
    assert_eq!(counting.allocations(), 2);
    assert_eq!(counting.frees(), 1);
    assert_eq!(counting.outstanding(), 1);

    let mut len = 0;
    assert_eq!(tether_blob_len(out, &mut len), 0);
    assert_eq!(len, "größe".encode_utf16().count() * 2);

    assert_eq!(tether_blob_destroy(out), 0);
    assert_eq!(counting.outstanding(), 0);
    tether_blob_destroy(src);
}

#[test]
fn null_allocation_maps_to_out_of_memory() {
    let (failing, erased) = share(FailingAllocator::always());
    let handle = register_allocator(erased).unwrap();
    let a = create(0, b"left");
    let b = create(0, b"right");

    let mut out = 0xFEED;
    assert_eq!(
        tether_blob_create(handle, b"x".as_ptr(), 1, &mut out),
        StatusCode::OutOfMemory.as_raw()
    );
    assert_eq!(
        tether_blob_concat(handle, a, b, &mut out),
        StatusCode::OutOfMemory.as_raw()
    );
    assert_eq!(
        tether_blob_utf16_from_utf8(handle, a, &mut out),
        StatusCode::OutOfMemory.as_raw()
    );
    assert_eq!(out, 0xFEED);
    assert_eq!(failing.attempts(), 3);
    assert!(!registry::has_override());

    tether_blob_destroy(a);
    tether_blob_destroy(b);
    tether_allocator_unregister(handle);
}

#[test]
fn raised_invalid_argument_is_returned_exactly() {
    let src = create(0, &[0xC3, 0x28]);
    let mut out = 0xFEED;
    assert_eq!(
        tether_blob_utf16_from_utf8(0, src, &mut out),
        StatusCode::InvalidArgument.as_raw()
    );
    assert_eq!(out, 0xFEED);
    tether_blob_destroy(src);
}

#[test]
fn unclassified_fault_is_internal_failure_without_output() {
    let (_, erased) = share(PanickingAllocator::new("allocator exploded"));
    let handle = register_allocator(erased).unwrap();
    registry::clear_current();

    let mut out = 0xFEED;
    assert_eq!(
        tether_blob_create(handle, b"boom".as_ptr(), 4, &mut out),
        StatusCode::InternalFailure.as_raw()
    );
    assert_eq!(out, 0xFEED);
    assert!(!registry::has_override());
    assert!(tether_core::boundary::last_message().contains("allocator exploded"));
    tether_allocator_unregister(handle);
}

#[test]
fn blobs_made_on_workers_are_freed_by_their_owners() {
    let (tx, rx) = unbounded();
    let workers: Vec<_> = ["B", "C"]
        .into_iter()
        .map(|name| {
            let tx = tx.clone();
            thread::spawn(move || {
                let (counting, erased) = share(CountingAllocator::new(name));
                let handle = register_allocator(erased).unwrap();
                for i in 0..100u32 {
                    tx.send(create(handle, &i.to_le_bytes())).unwrap();
                }
                tether_allocator_unregister(handle);
                counting
            })
        })
        .collect();
    drop(tx);

    // Destroy on this thread, where neither allocator is current.
    let mut destroyed = 0;
    for blob in rx {
        assert_eq!(tether_blob_destroy(blob), 0);
        destroyed += 1;
    }
    assert_eq!(destroyed, 200);

    for worker in workers {
        let counting = worker.join().unwrap();
        assert_eq!(counting.allocations(), 100);
        assert_eq!(counting.outstanding(), 0);
    }
}
