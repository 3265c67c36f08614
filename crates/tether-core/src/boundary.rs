//! The call-boundary catch construct.
//!
//! [`guarded`] wraps the whole body of an externally reachable entry point.
//! A body that completes executes no arm; otherwise exactly one of three
//! arms runs:
//!
//! | Failure signal | Status |
//! |---|---|
//! | raised [`AllocFailure`] | [`StatusCode::OutOfMemory`] |
//! | [`Fault`], returned or raised | the fault's code |
//! | any other panic payload | [`StatusCode::InternalFailure`] |
//!
//! The diagnostic text of the most recent failure on each thread is kept in
//! a thread-local slot readable through [`last_message`]. Failures are also
//! reported at `debug` level through `tracing`, which release builds compile
//! out.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use crate::fault::{AllocFailure, Fault};
use crate::status::StatusCode;

thread_local! {
    /// Message recorded by the most recent failing boundary on this thread.
    static LAST_MESSAGE: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Run an entry-point body and reduce its outcome to a [`StatusCode`].
///
/// Never unwinds, provided the crate is built with `panic = "unwind"`.
pub fn guarded<F>(body: F) -> StatusCode
where
    F: FnOnce() -> Result<(), Fault>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => StatusCode::Success,
        Ok(Err(fault)) => settle_fault(&fault),
        Err(payload) => settle_payload(payload),
    }
}

/// Run a body that returns a plain value, substituting `fallback` if it
/// unwinds.
///
/// Used by entry points whose C signature returns a pointer or length
/// instead of a status code.
pub fn guarded_or<T, F>(fallback: T, body: F) -> T
where
    F: FnOnce() -> T,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(payload) => {
            settle_payload(payload);
            fallback
        }
    }
}

/// Translate a raised payload into its status code.
///
/// Records the diagnostic message exactly as [`guarded`] does.
pub fn settle_payload(payload: Box<dyn Any + Send>) -> StatusCode {
    if payload.is::<AllocFailure>() {
        record(StatusCode::OutOfMemory, Some("allocation failed"));
        return StatusCode::OutOfMemory;
    }
    match payload.downcast::<Fault>() {
        Ok(fault) => settle_fault(&fault),
        Err(other) => {
            let text = panic_text(&*other);
            record(StatusCode::InternalFailure, text);
            StatusCode::InternalFailure
        }
    }
}

fn settle_fault(fault: &Fault) -> StatusCode {
    let status = fault.status();
    debug_assert!(status.is_failure(), "fault carried {status:?}");
    let status = if status.is_failure() {
        status
    } else {
        StatusCode::InternalFailure
    };
    record(status, fault.message());
    status
}

fn panic_text(payload: &(dyn Any + Send)) -> Option<&str> {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        Some(s)
    } else {
        payload.downcast_ref::<String>().map(String::as_str)
    }
}

fn record(status: StatusCode, message: Option<&str>) {
    tracing::debug!(%status, detail = message.unwrap_or(""), "entry point failed");
    let text = message.unwrap_or_else(|| status.description());
    // try_with: the slot may already be gone during thread teardown.
    let _ = LAST_MESSAGE.try_with(|cell| {
        let mut buf = cell.borrow_mut();
        buf.clear();
        buf.push_str(text);
    });
}

/// Diagnostic message of the most recent failure on this thread.
///
/// Empty if no boundary on this thread has failed since the last
/// [`clear_last_message`].
pub fn last_message() -> String {
    LAST_MESSAGE.with(|cell| cell.borrow().clone())
}

/// Run `f` with a borrow of the last diagnostic message.
pub fn with_last_message<R>(f: impl FnOnce(&str) -> R) -> R {
    LAST_MESSAGE.with(|cell| f(&cell.borrow()))
}

/// Forget the diagnostic message recorded on this thread.
pub fn clear_last_message() {
    LAST_MESSAGE.with(|cell| cell.borrow_mut().clear());
}
