//! Caller-visible status codes.
//!
//! [`StatusCode`] is a `repr(i32)` enum whose values follow the HRESULT
//! convention: success is zero, every failure is negative. Values are
//! ABI-stable and shared with the C header.

use std::fmt;

use crate::fault::Fault;

const RAW_OUT_OF_MEMORY: i32 = 0x8007_000E_u32 as i32;
const RAW_INVALID_ARGUMENT: i32 = 0x8007_0057_u32 as i32;
const RAW_NULL_POINTER: i32 = 0x8000_4003_u32 as i32;
const RAW_INTERNAL_FAILURE: i32 = 0x8000_4005_u32 as i32;

/// Outcome of a call across the component boundary.
///
/// The set is closed: every internal failure, whatever its origin, is
/// mapped onto one of these values before it reaches the caller.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The call completed.
    Success = 0,
    /// An allocation could not be satisfied (`E_OUTOFMEMORY`).
    OutOfMemory = RAW_OUT_OF_MEMORY,
    /// An argument was out of range or malformed (`E_INVALIDARG`).
    InvalidArgument = RAW_INVALID_ARGUMENT,
    /// A required pointer was null (`E_POINTER`).
    NullPointer = RAW_NULL_POINTER,
    /// Any failure not otherwise classified (`E_FAIL`).
    InternalFailure = RAW_INTERNAL_FAILURE,
}

impl StatusCode {
    /// Every status code, success first.
    pub const ALL: [StatusCode; 5] = [
        StatusCode::Success,
        StatusCode::OutOfMemory,
        StatusCode::InvalidArgument,
        StatusCode::NullPointer,
        StatusCode::InternalFailure,
    ];

    /// The raw `i32` value handed to C callers.
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Look up the status code for a raw value.
    ///
    /// Returns `None` for values outside the closed taxonomy.
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(StatusCode::Success),
            RAW_OUT_OF_MEMORY => Some(StatusCode::OutOfMemory),
            RAW_INVALID_ARGUMENT => Some(StatusCode::InvalidArgument),
            RAW_NULL_POINTER => Some(StatusCode::NullPointer),
            RAW_INTERNAL_FAILURE => Some(StatusCode::InternalFailure),
            _ => None,
        }
    }

    /// Whether a raw value denotes failure (negative, as with HRESULTs).
    pub const fn raw_failed(raw: i32) -> bool {
        raw < 0
    }

    /// Whether this code is the success value.
    pub const fn is_success(self) -> bool {
        !Self::raw_failed(self as i32)
    }

    /// Whether this code denotes a failure.
    pub const fn is_failure(self) -> bool {
        Self::raw_failed(self as i32)
    }

    /// Convert into a `Result` so `?` can thread the code upward.
    ///
    /// Failure codes become a [`Fault`] without a message.
    pub fn into_result(self) -> Result<(), Fault> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Fault::new(self))
        }
    }

    /// Short human-readable description.
    pub const fn description(self) -> &'static str {
        match self {
            StatusCode::Success => "success",
            StatusCode::OutOfMemory => "out of memory",
            StatusCode::InvalidArgument => "invalid argument",
            StatusCode::NullPointer => "null pointer",
            StatusCode::InternalFailure => "internal failure",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.description(), self.as_raw() as u32)
    }
}

impl From<StatusCode> for i32 {
    fn from(code: StatusCode) -> Self {
        code.as_raw()
    }
}

impl From<&Fault> for StatusCode {
    fn from(fault: &Fault) -> Self {
        fault.status()
    }
}
