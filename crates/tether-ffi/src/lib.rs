//! C FFI bindings for Tether.
//!
//! Exposes allocator registration, per-thread overrides, and a small
//! allocator-aware blob API to C callers. Every entry point runs inside the
//! call boundary from [`tether_core::boundary`], so no panic or raised fault
//! ever crosses into C; each returns an HRESULT-style `i32`
//! ([`StatusCode`](tether_core::StatusCode)) unless its signature says
//! otherwise.
//!
//! This is the only crate in the workspace that exports `extern "C"`
//! symbols. It must be built with `panic = "unwind"`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

use std::ffi::c_char;

/// Run an entry-point body returning `Result<(), Fault>` inside the call
/// boundary, evaluating to the raw status code.
macro_rules! ffi_guard {
    ($name:literal, $body:block) => {{
        let _span = ::tracing::trace_span!($name).entered();
        ::tether_core::boundary::guarded(
            || -> ::core::result::Result<(), ::tether_core::Fault> { $body },
        )
        .as_raw()
    }};
}

/// Like `ffi_guard!` for entry points that return a plain value;
/// evaluates to `$fallback` if the body unwinds.
macro_rules! ffi_guard_or {
    ($name:literal, $fallback:expr, $body:block) => {{
        let _span = ::tracing::trace_span!($name).entered();
        ::tether_core::boundary::guarded_or($fallback, || $body)
    }};
}

/// Lock a handle-table mutex, failing with `InternalFailure` if poisoned.
macro_rules! ffi_lock {
    ($mutex:expr) => {
        match $mutex.lock() {
            Ok(guard) => guard,
            Err(_) => {
                return Err(::tether_core::Fault::internal(concat!(
                    stringify!($mutex),
                    " mutex poisoned"
                )))
            }
        }
    };
}

pub mod allocator;
pub mod blob;
mod handle;

pub use allocator::{register_allocator, TetherAllocatorVTable};

/// Copy the calling thread's last failure message into `buf`.
///
/// Writes at most `cap - 1` bytes followed by a NUL terminator. Returns the
/// full message length in bytes (excluding the terminator), so a caller can
/// pass a null `buf` first to size its buffer. Returns 0 if no entry point
/// has failed on this thread.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_last_error_message(buf: *mut c_char, cap: usize) -> usize {
    ffi_guard_or!("tether_last_error_message", 0, {
        tether_core::boundary::with_last_message(|message| {
            let bytes = message.as_bytes();
            if !buf.is_null() && cap > 0 {
                let copy_len = bytes.len().min(cap - 1);
                // SAFETY: buf points to cap writable bytes per caller contract.
                unsafe {
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), copy_len);
                    *buf.add(copy_len) = 0;
                }
            }
            bytes.len()
        })
    })
}

/// Static NUL-terminated description of a raw status code.
///
/// Never null. Unknown codes describe themselves as such.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_status_description(status: i32) -> *const c_char {
    use tether_core::StatusCode;

    ffi_guard_or!("tether_status_description", c"unknown status".as_ptr(), {
        let text = match StatusCode::from_raw(status) {
            Some(StatusCode::Success) => c"success",
            Some(StatusCode::OutOfMemory) => c"out of memory",
            Some(StatusCode::InvalidArgument) => c"invalid argument",
            Some(StatusCode::NullPointer) => c"null pointer",
            Some(StatusCode::InternalFailure) => c"internal failure",
            None => c"unknown status",
        };
        text.as_ptr()
    })
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use tether_core::{Fault, StatusCode};

    fn read_message() -> String {
        let len = tether_last_error_message(std::ptr::null_mut(), 0);
        let mut buf = vec![0u8; len + 1];
        let len2 = tether_last_error_message(buf.as_mut_ptr().cast(), buf.len());
        assert_eq!(len, len2);
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn guard_reports_returned_fault() {
        let status = ffi_guard!("test", { Err(Fault::invalid_argument("bad widget count")) });
        assert_eq!(status, StatusCode::InvalidArgument.as_raw());
        assert_eq!(read_message(), "bad widget count");
    }

    #[test]
    fn guard_catches_panic_and_stores_message() {
        let status = ffi_guard!("test", {
            panic!("deliberate panic inside guard");
        });
        assert_eq!(status, StatusCode::InternalFailure.as_raw());
        assert!(read_message().contains("deliberate panic inside guard"));
    }

    #[test]
    fn guard_passes_success_through() {
        let status = ffi_guard!("test", { Ok(()) });
        assert_eq!(status, 0);
    }

    #[test]
    fn guard_or_substitutes_fallback() {
        let value = ffi_guard_or!("test", 7usize, {
            Fault::out_of_memory().raise();
        });
        assert_eq!(value, 7);
        assert_eq!(read_message(), "out of memory");
    }

    #[test]
    fn lock_reports_poisoned_mutex() {
        let poisoned = std::sync::Mutex::new(0u32);
        let _ = std::panic::catch_unwind(|| {
            let _g = poisoned.lock().unwrap();
            panic!("poison");
        });
        let status = ffi_guard!("test", {
            let _g = ffi_lock!(poisoned);
            Ok(())
        });
        assert_eq!(status, StatusCode::InternalFailure.as_raw());
        assert!(read_message().contains("poisoned"));
    }

    #[test]
    fn message_truncates_to_capacity() {
        let _ = ffi_guard!("test", { Err(Fault::internal("abcdefgh")) });
        let mut buf = [0xFFu8; 4];
        let len = tether_last_error_message(buf.as_mut_ptr().cast(), buf.len());
        assert_eq!(len, 8);
        assert_eq!(&buf, b"abc\0");
    }

    #[test]
    fn status_descriptions_are_static_c_strings() {
        // SAFETY: tether_status_description never returns null.
        let text =
            unsafe { CStr::from_ptr(tether_status_description(StatusCode::NullPointer.as_raw())) };
        assert_eq!(text.to_str().unwrap(), "null pointer");
        // SAFETY: as above.
        let unknown = unsafe { CStr::from_ptr(tether_status_description(42)) };
        assert_eq!(unknown.to_str().unwrap(), "unknown status");
    }
}
