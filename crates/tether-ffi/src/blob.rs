//! Allocator-aware byte blobs: create, concat, transcode, read, destroy.
//!
//! Each creating entry point takes an allocator handle. A non-zero handle is
//! lent to the calling thread for the duration of the call through a
//! [`ThreadAllocatorScope`], so every allocation the call makes, including
//! temporaries, comes from that allocator and the thread's previous
//! override is back in place when the call returns, whatever the outcome.
//! Handle 0 uses whatever allocator is current on the calling thread.
//!
//! A blob remembers the allocator that produced it and is freed there on
//! destroy, regardless of which thread or override is current by then.
//!
//! The global `BLOBS` lock is held only for handle lookup and insertion,
//! never across an allocation.

use std::sync::{Arc, Mutex};

use tether_alloc::{AllocBuffer, AllocatorRef, ThreadAllocatorScope};
use tether_core::{ensure, ensure_ptr, raise_if_oom, Fault, StatusCode};

use crate::allocator::resolve_allocator;
use crate::handle::HandleTable;

type BlobArc = Arc<AllocBuffer>;

static BLOBS: Mutex<HandleTable<BlobArc>> = Mutex::new(HandleTable::new());

/// Clone the Arc for a blob handle, briefly locking the table.
fn get_blob(handle: u64) -> Result<BlobArc, Fault> {
    match ffi_lock!(BLOBS).get(handle) {
        Some(blob) => Ok(Arc::clone(blob)),
        None => Err(Fault::invalid_argument(format!(
            "unknown blob handle {handle:#x}"
        ))),
    }
}

fn publish(buf: AllocBuffer) -> Result<u64, Fault> {
    Ok(ffi_lock!(BLOBS).insert(Arc::new(buf)))
}

/// Run `body` with the allocator named by `handle` lent to this thread.
fn with_call_allocator<T>(
    handle: u64,
    body: impl FnOnce() -> Result<T, Fault>,
) -> Result<T, Fault> {
    let lent: Option<AllocatorRef> = resolve_allocator(handle)?;
    let _scope = lent.as_ref().map(|a| ThreadAllocatorScope::new(Some(a)));
    body()
}

/// Validate UTF-8, raising `InvalidArgument` on malformed input.
fn utf8_text(bytes: &[u8]) -> &str {
    match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => Fault::from(e).raise(),
    }
}

/// Transcode UTF-8 bytes into little-endian UTF-16 code units.
///
/// Encodes into a worst-case staging block first, then copies into an
/// exactly sized result, so a successful call allocates twice and frees
/// once. The staging block is released on every path.
fn transcode_utf16(src: &[u8]) -> Result<AllocBuffer, Fault> {
    let text = utf8_text(src);
    // One UTF-16 unit never takes more bytes than the UTF-8 it came from,
    // so two output bytes per input byte always suffice.
    let worst = raise_if_oom!(src.len().checked_mul(2));
    let mut staging = AllocBuffer::new(worst)?;
    let mut written = 0;
    for (unit, slot) in text
        .encode_utf16()
        .zip(staging.as_mut_slice().chunks_exact_mut(2))
    {
        slot.copy_from_slice(&unit.to_le_bytes());
        written += 2;
    }
    let mut out = AllocBuffer::new(written)?;
    out.as_mut_slice()
        .copy_from_slice(&staging.as_slice()[..written]);
    Ok(out)
}

/// Copy `len` bytes at `data` into a new blob.
///
/// `data` may be null only when `len` is 0. Writes the blob handle to
/// `blob_out` on success.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_blob_create(
    allocator: u64,
    data: *const u8,
    len: usize,
    blob_out: *mut u64,
) -> i32 {
    ffi_guard!("tether_blob_create", {
        let blob_out = ensure_ptr!(blob_out);
        let bytes: &[u8] = if len == 0 {
            &[]
        } else {
            let data = ensure_ptr!(data);
            // SAFETY: data points to len readable bytes per caller contract.
            unsafe { std::slice::from_raw_parts(data.as_ptr(), len) }
        };
        let buf = with_call_allocator(allocator, || AllocBuffer::from_slice(bytes))?;
        let handle = publish(buf)?;
        // SAFETY: blob_out is valid per caller contract.
        unsafe { blob_out.write(handle) };
        Ok(())
    })
}

/// Concatenate two blobs into a new one.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_blob_concat(allocator: u64, a: u64, b: u64, blob_out: *mut u64) -> i32 {
    ffi_guard!("tether_blob_concat", {
        let blob_out = ensure_ptr!(blob_out);
        let first = get_blob(a)?;
        let second = get_blob(b)?;
        let buf = with_call_allocator(allocator, || {
            let total = raise_if_oom!(first.len().checked_add(second.len()));
            let mut buf = AllocBuffer::new(total)?;
            let (head, tail) = buf.as_mut_slice().split_at_mut(first.len());
            head.copy_from_slice(first.as_slice());
            tail.copy_from_slice(second.as_slice());
            Ok(buf)
        })?;
        let handle = publish(buf)?;
        // SAFETY: blob_out is valid per caller contract.
        unsafe { blob_out.write(handle) };
        Ok(())
    })
}

/// Transcode a UTF-8 blob into a new blob of little-endian UTF-16 units.
///
/// Malformed UTF-8 fails with `InvalidArgument` and allocates nothing.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_blob_utf16_from_utf8(
    allocator: u64,
    blob: u64,
    blob_out: *mut u64,
) -> i32 {
    ffi_guard!("tether_blob_utf16_from_utf8", {
        let blob_out = ensure_ptr!(blob_out);
        let src = get_blob(blob)?;
        let buf = with_call_allocator(allocator, || transcode_utf16(src.as_slice()))?;
        let handle = publish(buf)?;
        // SAFETY: blob_out is valid per caller contract.
        unsafe { blob_out.write(handle) };
        Ok(())
    })
}

/// Write a blob's length in bytes to `len_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_blob_len(blob: u64, len_out: *mut usize) -> i32 {
    ffi_guard!("tether_blob_len", {
        let len_out = ensure_ptr!(len_out);
        let len = get_blob(blob)?.len();
        // SAFETY: len_out is valid per caller contract.
        unsafe { len_out.write(len) };
        Ok(())
    })
}

/// Copy a blob's bytes into a caller buffer of `cap` bytes.
///
/// Fails with `InvalidArgument` if `cap` is smaller than the blob; nothing
/// is written in that case. `buf` may be null only for an empty blob.
/// Writes the number of bytes copied to `written_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_blob_read(
    blob: u64,
    buf: *mut u8,
    cap: usize,
    written_out: *mut usize,
) -> i32 {
    ffi_guard!("tether_blob_read", {
        let written_out = ensure_ptr!(written_out);
        let blob = get_blob(blob)?;
        let len = blob.len();
        ensure!(
            cap >= len,
            StatusCode::InvalidArgument,
            "buffer too small: blob is {len} bytes, cap {cap}"
        );
        if len > 0 {
            let buf = ensure_ptr!(buf);
            // SAFETY: buf points to cap >= len writable bytes per caller
            // contract and cannot overlap a blob we own.
            unsafe { std::ptr::copy_nonoverlapping(blob.as_slice().as_ptr(), buf.as_ptr(), len) };
        }
        // SAFETY: written_out is valid per caller contract.
        unsafe { written_out.write(len) };
        Ok(())
    })
}

/// Destroy a blob, freeing it through the allocator that created it.
///
/// Unknown, stale, or already destroyed handles fail with
/// `InvalidArgument`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_blob_destroy(blob: u64) -> i32 {
    ffi_guard!("tether_blob_destroy", {
        let removed = ffi_lock!(BLOBS).remove(blob);
        match removed {
            Some(_) => Ok(()),
            None => Err(Fault::invalid_argument(format!(
                "unknown blob handle {blob:#x}"
            ))),
        }
    })
}
