//! Allocator registration and per-thread override entry points.
//!
//! C callers describe an allocator with a [`TetherAllocatorVTable`] and get
//! back a `u64` handle. The registry table owns one strong reference per
//! registered allocator; thread overrides installed through
//! [`tether_thread_allocator_set`] only borrow it, so unregistering an
//! allocator that is still installed somewhere makes those threads fall
//! back to the default.
//!
//! Handle value 0 is never issued and means "the ambient allocator" wherever
//! an allocator handle is accepted.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use tether_alloc::allocator::same_allocator;
use tether_alloc::{registry, Allocator, AllocatorRef};
use tether_core::{ensure_ptr, Fault};

use crate::handle::HandleTable;

/// Allocation callback: return `size` writable bytes or null.
pub type TetherAllocFn = unsafe extern "C" fn(ctx: *mut c_void, size: usize) -> *mut c_void;
/// Release callback for a block previously returned by the alloc callback.
pub type TetherFreeFn = unsafe extern "C" fn(ctx: *mut c_void, ptr: *mut c_void);
/// Reference-count callback on the allocator context.
pub type TetherRefFn = unsafe extern "C" fn(ctx: *mut c_void);

/// A C allocator: an opaque context plus callbacks.
///
/// `alloc` and `free` are required. `retain` is called once when the
/// allocator is registered and `release` once when the last reference to it
/// goes away; either may be null. All callbacks must be safe to call from
/// any thread.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct TetherAllocatorVTable {
    /// Opaque context passed to every callback.
    pub ctx: *mut c_void,
    /// Allocation callback.
    pub alloc: Option<TetherAllocFn>,
    /// Release callback.
    pub free: Option<TetherFreeFn>,
    /// Optional: take a reference on `ctx`.
    pub retain: Option<TetherRefFn>,
    /// Optional: drop a reference on `ctx`.
    pub release: Option<TetherRefFn>,
}

/// [`Allocator`] adapter over a C vtable.
struct ForeignAllocator {
    ctx: *mut c_void,
    alloc: TetherAllocFn,
    free: TetherFreeFn,
    release: Option<TetherRefFn>,
}

// SAFETY: the registration contract requires thread-safe callbacks.
#[allow(unsafe_code)]
unsafe impl Send for ForeignAllocator {}
// SAFETY: as above; the adapter holds no interior state of its own.
#[allow(unsafe_code)]
unsafe impl Sync for ForeignAllocator {}

impl ForeignAllocator {
    #[allow(unsafe_code)]
    fn from_vtable(vtable: &TetherAllocatorVTable) -> Result<Self, Fault> {
        let alloc = ensure_ptr!(vtable.alloc);
        let free = ensure_ptr!(vtable.free);
        if let Some(retain) = vtable.retain {
            // SAFETY: callback and context supplied together by the caller.
            unsafe { retain(vtable.ctx) };
        }
        Ok(Self {
            ctx: vtable.ctx,
            alloc,
            free,
            release: vtable.release,
        })
    }
}

#[allow(unsafe_code)]
impl Allocator for ForeignAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: callback and context supplied together by the caller.
        NonNull::new(unsafe { (self.alloc)(self.ctx, size) }.cast())
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        // SAFETY: ptr came from our alloc callback per the trait contract.
        unsafe { (self.free)(self.ctx, ptr.as_ptr().cast()) }
    }

    fn name(&self) -> &str {
        "foreign"
    }
}

impl Drop for ForeignAllocator {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        if let Some(release) = self.release {
            // SAFETY: pairs with the retain in from_vtable.
            unsafe { release(self.ctx) };
        }
    }
}

static ALLOCATORS: Mutex<HandleTable<AllocatorRef>> = Mutex::new(HandleTable::new());

/// Register a Rust allocator with the C surface, returning its handle.
pub fn register_allocator(allocator: AllocatorRef) -> Result<u64, Fault> {
    let handle = ffi_lock!(ALLOCATORS).insert(allocator);
    tracing::debug!(handle, "allocator registered");
    Ok(handle)
}

/// Clone the allocator behind `handle`, briefly locking the table.
pub(crate) fn lookup_allocator(handle: u64) -> Result<AllocatorRef, Fault> {
    match ffi_lock!(ALLOCATORS).get(handle) {
        Some(allocator) => Ok(Arc::clone(allocator)),
        None => Err(Fault::invalid_argument(format!(
            "unknown allocator handle {handle:#x}"
        ))),
    }
}

/// Like [`lookup_allocator`], but handle 0 resolves to `None` (ambient).
pub(crate) fn resolve_allocator(handle: u64) -> Result<Option<AllocatorRef>, Fault> {
    if handle == 0 {
        return Ok(None);
    }
    lookup_allocator(handle).map(Some)
}

/// Register a C allocator.
///
/// On success writes a non-zero handle to `handle_out`. `retain` (if any)
/// has been called exactly once by then. A vtable missing `alloc` or `free`
/// fails with `NullPointer` and nothing is retained.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_allocator_register(
    vtable: *const TetherAllocatorVTable,
    handle_out: *mut u64,
) -> i32 {
    ffi_guard!("tether_allocator_register", {
        let vtable = ensure_ptr!(vtable);
        let handle_out = ensure_ptr!(handle_out);
        // SAFETY: vtable points to a valid vtable per caller contract.
        let foreign = ForeignAllocator::from_vtable(unsafe { vtable.as_ref() })?;
        let handle = register_allocator(Arc::new(foreign))?;
        // SAFETY: handle_out is valid per caller contract.
        unsafe { handle_out.write(handle) };
        Ok(())
    })
}

/// Drop the registry's reference to an allocator.
///
/// Blobs created from it keep it alive; `release` runs once the
/// last of them is gone. Threads that had it installed fall back to the
/// default. Unknown or stale handles fail with `InvalidArgument`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_allocator_unregister(handle: u64) -> i32 {
    ffi_guard!("tether_allocator_unregister", {
        // The removed value drops after the table lock is released.
        let removed = ffi_lock!(ALLOCATORS).remove(handle);
        match removed {
            Some(_) => Ok(()),
            None => Err(Fault::invalid_argument(format!(
                "unknown allocator handle {handle:#x}"
            ))),
        }
    })
}

/// Install a registered allocator as the calling thread's override.
///
/// Handle 0 clears the override. The override persists across calls until
/// cleared or replaced, and does not keep the allocator registered.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_thread_allocator_set(handle: u64) -> i32 {
    ffi_guard!("tether_thread_allocator_set", {
        let allocator = resolve_allocator(handle)?;
        registry::set_current(allocator.as_ref());
        Ok(())
    })
}

/// Remove the calling thread's override.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_thread_allocator_clear() -> i32 {
    ffi_guard!("tether_thread_allocator_clear", {
        registry::clear_current();
        Ok(())
    })
}

/// Write the handle of the calling thread's override to `handle_out`.
///
/// Writes 0 when no override is installed, when it has been dropped, or
/// when the installed allocator was not registered through this API.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_thread_allocator_get(handle_out: *mut u64) -> i32 {
    ffi_guard!("tether_thread_allocator_get", {
        let handle_out = ensure_ptr!(handle_out);
        let handle = match registry::current_override() {
            Some(current) => ffi_lock!(ALLOCATORS)
                .find(|a| same_allocator(a, &current))
                .unwrap_or(0),
            None => 0,
        };
        // SAFETY: handle_out is valid per caller contract.
        unsafe { handle_out.write(handle) };
        Ok(())
    })
}

/// Create the process-wide default allocator now instead of on first use.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_thread_init() -> i32 {
    ffi_guard!("tether_thread_init", {
        registry::initialize();
        Ok(())
    })
}

/// Clear the calling thread's override before the thread exits.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_thread_cleanup() -> i32 {
    ffi_guard!("tether_thread_cleanup", {
        registry::cleanup_thread();
        Ok(())
    })
}

/// Allocate `size` bytes from the calling thread's current allocator.
///
/// Returns null on failure.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_thread_alloc(size: usize) -> *mut c_void {
    ffi_guard_or!("tether_thread_alloc", std::ptr::null_mut(), {
        registry::allocate(size).map_or(std::ptr::null_mut(), |p| p.as_ptr().cast())
    })
}

/// Free a block through the calling thread's current allocator.
///
/// `ptr` must come from [`tether_thread_alloc`] on a thread whose current
/// allocator is the same one current now. Null is a no-op.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn tether_thread_free(ptr: *mut c_void) {
    ffi_guard_or!("tether_thread_free", (), {
        if let Some(ptr) = NonNull::new(ptr.cast::<u8>()) {
            // SAFETY: forwarded caller contract.
            unsafe { registry::free(ptr) };
        }
    })
}
