//! Internal failure values.
//!
//! A [`Fault`] carries a [`StatusCode`] and an optional message. It is the
//! error type of every fallible internal function and never crosses the
//! component boundary itself: [`crate::boundary::guarded`] reduces it to
//! its status code.
//!
//! Faults can also be *raised* with [`Fault::raise`], which unwinds to the
//! nearest boundary. Raising uses [`std::panic::resume_unwind`], so the
//! process panic hook does not run and nothing is printed.

use std::borrow::Cow;
use std::collections::TryReserveError;
use std::error::Error;
use std::fmt;
use std::str::Utf8Error;

use crate::status::StatusCode;

/// An internal failure carrying the status code the caller will observe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    status: StatusCode,
    message: Option<Cow<'static, str>>,
}

impl Fault {
    /// Create a fault without a message.
    ///
    /// `status` must be a failure code. Debug builds assert this; release
    /// builds let the boundary normalize it to
    /// [`StatusCode::InternalFailure`].
    pub fn new(status: StatusCode) -> Self {
        debug_assert!(
            status.is_failure(),
            "a fault must carry a failure code, got {status:?}"
        );
        Self {
            status,
            message: None,
        }
    }

    /// Create a fault with a diagnostic message.
    pub fn with_message(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(status)
        }
    }

    /// An allocation could not be satisfied.
    pub fn out_of_memory() -> Self {
        Self::new(StatusCode::OutOfMemory)
    }

    /// An argument was rejected.
    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(StatusCode::InvalidArgument, message)
    }

    /// A required pointer was null.
    pub fn null_pointer() -> Self {
        Self::new(StatusCode::NullPointer)
    }

    /// Unclassified internal failure.
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(StatusCode::InternalFailure, message)
    }

    /// The status code carried by this fault.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The diagnostic message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Unwind to the nearest boundary carrying this fault.
    pub fn raise(self) -> ! {
        std::panic::resume_unwind(Box::new(self))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.status.description()),
            None => f.write_str(self.status.description()),
        }
    }
}

impl Error for Fault {}

impl From<StatusCode> for Fault {
    fn from(status: StatusCode) -> Self {
        Fault::new(status)
    }
}

impl From<TryReserveError> for Fault {
    fn from(_: TryReserveError) -> Self {
        Fault::out_of_memory()
    }
}

impl From<std::alloc::LayoutError> for Fault {
    fn from(_: std::alloc::LayoutError) -> Self {
        Fault::out_of_memory()
    }
}

impl From<Utf8Error> for Fault {
    fn from(e: Utf8Error) -> Self {
        Fault::invalid_argument(format!("invalid UTF-8 at byte {}", e.valid_up_to()))
    }
}

/// Raised payload signalling that an allocation returned null.
///
/// Always normalized to [`StatusCode::OutOfMemory`] at the boundary,
/// independently of any [`Fault`] arm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocFailure;

impl AllocFailure {
    /// Unwind to the nearest boundary with an allocation failure.
    pub fn raise() -> ! {
        std::panic::resume_unwind(Box::new(AllocFailure))
    }
}

impl fmt::Display for AllocFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("allocation failed")
    }
}

impl Error for AllocFailure {}

/// Pass through a present allocation, or raise [`AllocFailure`].
pub fn verify_alloc<T>(allocation: Option<T>) -> T {
    match allocation {
        Some(value) => value,
        None => AllocFailure::raise(),
    }
}
