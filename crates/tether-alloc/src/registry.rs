//! Per-thread allocator override slot and the process-wide default.
//!
//! Each thread owns one [`Override`] slot, read and written only by that
//! thread, so no locking is involved. The default allocator is created at
//! most once, by whichever thread asks first, through a `OnceLock`.
//!
//! The slot never owns the allocator it names: it stores a `Weak`, so
//! installing, swapping, and clearing leave the allocator's strong count
//! untouched. Keeping an installed allocator alive is the installer's job
//! ([`ThreadAllocatorScope`](crate::ThreadAllocatorScope) does this through
//! a borrow). If an installed allocator is dropped anyway, the slot reads as
//! empty and the default is used.

#![allow(unsafe_code)]

use std::cell::RefCell;
use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock, Weak};

use tether_core::Fault;

use crate::allocator::{Allocator, AllocatorRef};
use crate::system::SystemAllocator;

thread_local! {
    /// The calling thread's override. Empty means "use the default".
    static SLOT: RefCell<Override> = const { RefCell::new(Override::none()) };
}

static DEFAULT: OnceLock<AllocatorRef> = OnceLock::new();

/// Contents of a thread's override slot: an allocator, or nothing.
///
/// Returned by the swap operations so the previous value can be restored
/// exactly, including "nothing".
#[derive(Clone, Default)]
pub struct Override(Option<Weak<dyn Allocator>>);

impl Override {
    /// The empty slot value.
    pub const fn none() -> Self {
        Self(None)
    }

    /// A non-owning reference to `allocator`.
    pub fn lend(allocator: &AllocatorRef) -> Self {
        Self(Some(Arc::downgrade(allocator)))
    }

    /// Whether this names no allocator.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// The named allocator, if any and still alive.
    pub fn allocator(&self) -> Option<AllocatorRef> {
        self.0.as_ref()?.upgrade()
    }

    /// Whether this names exactly `allocator`.
    pub fn is(&self, allocator: &AllocatorRef) -> bool {
        match &self.0 {
            Some(weak) => std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(allocator)),
            None => false,
        }
    }
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.allocator() {
            Some(a) => write!(f, "Override({})", a.name()),
            None if self.is_none() => f.write_str("Override(none)"),
            None => f.write_str("Override(dropped)"),
        }
    }
}

// ── Default allocator ───────────────────────────────────────────

/// The process-wide default allocator, created on first use.
pub fn default_allocator() -> &'static AllocatorRef {
    DEFAULT.get_or_init(|| {
        tracing::debug!("creating default system allocator");
        Arc::new(SystemAllocator::new())
    })
}

/// Whether the default allocator has been created yet.
pub fn default_created() -> bool {
    DEFAULT.get().is_some()
}

/// Use `allocator` as the process-wide default.
///
/// Must run before anything requests the default. Fails with
/// `InvalidArgument` once a default exists.
pub fn configure_default(allocator: AllocatorRef) -> Result<(), Fault> {
    DEFAULT
        .set(allocator)
        .map_err(|_| Fault::invalid_argument("default allocator already initialized"))
}

/// Create the default allocator eagerly. Idempotent.
pub fn initialize() -> &'static AllocatorRef {
    default_allocator()
}

// ── Thread slot ─────────────────────────────────────────────────

/// The calling thread's allocator: its live override, else the default.
///
/// Never fails. Also safe to call while thread-local storage is being torn
/// down, in which case the default is returned.
pub fn current() -> AllocatorRef {
    match current_override() {
        Some(allocator) => allocator,
        None => Arc::clone(default_allocator()),
    }
}

/// The calling thread's live override, without falling back.
pub fn current_override() -> Option<AllocatorRef> {
    SLOT.try_with(|slot| {
        let slot = slot.borrow();
        let allocator = slot.allocator();
        if allocator.is_none() && !slot.is_none() {
            tracing::debug!("installed allocator was dropped; using default");
        }
        allocator
    })
    .ok()
    .flatten()
}

/// Whether the calling thread's slot names an allocator.
pub fn has_override() -> bool {
    SLOT.try_with(|slot| !slot.borrow().is_none()).unwrap_or(false)
}

/// Install `allocator` as the calling thread's override, or clear it.
///
/// Non-owning; the override persists across calls until cleared or
/// swapped.
pub fn set_current(allocator: Option<&AllocatorRef>) {
    swap_current(allocator.map_or_else(Override::none, Override::lend));
}

/// Like [`set_current`], but `None` installs the default allocator instead
/// of clearing the slot.
pub fn set_current_or_default(allocator: Option<&AllocatorRef>) {
    swap_current_or_default(allocator.map_or_else(Override::none, Override::lend));
}

/// Remove the calling thread's override.
pub fn clear_current() {
    swap_current(Override::none());
}

/// Replace the calling thread's slot, returning its previous contents.
///
/// Restoring an empty value never creates the default allocator.
pub fn swap_current(new: Override) -> Override {
    SLOT.try_with(|slot| slot.replace(new)).unwrap_or_default()
}

/// Like [`swap_current`], but an empty `new` installs the default
/// allocator, so the slot is guaranteed to name a concrete allocator until
/// it is swapped back.
pub fn swap_current_or_default(new: Override) -> Override {
    let new = if new.is_none() {
        Override::lend(default_allocator())
    } else {
        new
    };
    swap_current(new)
}

/// Clear the calling thread's slot before the thread exits.
pub fn cleanup_thread() {
    swap_current(Override::none());
}

// ── Convenience allocation ──────────────────────────────────────

/// Allocate `size` bytes from the calling thread's current allocator.
///
/// Failure is a `None` result, never a fault.
pub fn allocate(size: usize) -> Option<NonNull<u8>> {
    current().allocate(size)
}

/// Free a block through the calling thread's current allocator.
///
/// # Safety
///
/// `ptr` must have been returned by the allocator that is current on this
/// thread now, and not freed since.
pub unsafe fn free(ptr: NonNull<u8>) {
    // SAFETY: forwarded caller contract.
    unsafe { current().free(ptr) }
}
