//! Check macros used inside entry points and their helpers.
//!
//! Two families with the same predicates:
//!
//! - **Returning** (`check!`, `ensure!`, `ensure_alloc!`, `ensure_ptr!`)
//!   return `Err(Fault)` from the enclosing function, which must return
//!   `Result<_, Fault>`. Anything acquired before the check is released by
//!   its `Drop` impl, so there is no separate cleanup label.
//! - **Raising** (`raise_if_failed!`, `raise_unless!`, `raise_unless_arg!`,
//!   `raise_if_null!`, `raise_if_oom!`) unwind to the nearest boundary via
//!   [`Fault::raise`](crate::Fault::raise).
//!
//! `ensure_alloc!`, `ensure_ptr!`, `raise_if_null!` and `raise_if_oom!`
//! accept anything implementing [`NullCheck`] and evaluate to the non-null
//! value.

use std::ptr::NonNull;

/// Values that may be "null": `Option`s and raw pointers.
pub trait NullCheck {
    /// The value produced when the input is present.
    type Present;

    /// `Some` when the value is present, `None` when it is null.
    fn present(self) -> Option<Self::Present>;
}

impl<T> NullCheck for Option<T> {
    type Present = T;

    fn present(self) -> Option<T> {
        self
    }
}

impl<T> NullCheck for *mut T {
    type Present = NonNull<T>;

    fn present(self) -> Option<NonNull<T>> {
        NonNull::new(self)
    }
}

impl<T> NullCheck for *const T {
    type Present = NonNull<T>;

    fn present(self) -> Option<NonNull<T>> {
        NonNull::new(self.cast_mut())
    }
}

/// Return early with the status code if it signals failure.
///
/// ```
/// use tether_core::{check, Fault, StatusCode};
///
/// fn run(step: StatusCode) -> Result<u32, Fault> {
///     check!(step);
///     Ok(1)
/// }
/// assert_eq!(run(StatusCode::Success), Ok(1));
/// assert_eq!(run(StatusCode::NullPointer).unwrap_err().status(), StatusCode::NullPointer);
/// ```
#[macro_export]
macro_rules! check {
    ($status:expr) => {
        if let ::core::result::Result::Err(fault) = $crate::StatusCode::into_result($status) {
            return ::core::result::Result::Err(fault);
        }
    };
}

/// Return early with `$status` (and an optional message) unless `$cond` holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $status:expr $(,)?) => {
        if !($cond) {
            return ::core::result::Result::Err($crate::Fault::new($status));
        }
    };
    ($cond:expr, $status:expr, $($fmt:tt)+) => {
        if !($cond) {
            return ::core::result::Result::Err($crate::Fault::with_message(
                $status,
                ::std::format!($($fmt)+),
            ));
        }
    };
}

/// Evaluate to the present value, or return early with `OutOfMemory`.
#[macro_export]
macro_rules! ensure_alloc {
    ($value:expr) => {
        match $crate::NullCheck::present($value) {
            ::core::option::Option::Some(v) => v,
            ::core::option::Option::None => {
                return ::core::result::Result::Err($crate::Fault::out_of_memory())
            }
        }
    };
}

/// Evaluate to the present value, or return early with `NullPointer`.
#[macro_export]
macro_rules! ensure_ptr {
    ($value:expr) => {
        match $crate::NullCheck::present($value) {
            ::core::option::Option::Some(v) => v,
            ::core::option::Option::None => {
                return ::core::result::Result::Err($crate::Fault::null_pointer())
            }
        }
    };
}

/// Raise a fault carrying the status code if it signals failure.
#[macro_export]
macro_rules! raise_if_failed {
    ($status:expr $(,)?) => {{
        let status: $crate::StatusCode = $status;
        if status.is_failure() {
            $crate::Fault::new(status).raise();
        }
    }};
    ($status:expr, $($fmt:tt)+) => {{
        let status: $crate::StatusCode = $status;
        if status.is_failure() {
            $crate::Fault::with_message(status, ::std::format!($($fmt)+)).raise();
        }
    }};
}

/// Raise a fault carrying `$status` (and an optional message) unless `$cond` holds.
#[macro_export]
macro_rules! raise_unless {
    ($cond:expr, $status:expr $(,)?) => {
        if !($cond) {
            $crate::Fault::new($status).raise();
        }
    };
    ($cond:expr, $status:expr, $($fmt:tt)+) => {
        if !($cond) {
            $crate::Fault::with_message($status, ::std::format!($($fmt)+)).raise();
        }
    };
}

/// Raise `InvalidArgument` unless `$cond` holds.
#[macro_export]
macro_rules! raise_unless_arg {
    ($cond:expr $(,)?) => {
        $crate::raise_unless!($cond, $crate::StatusCode::InvalidArgument)
    };
    ($cond:expr, $($fmt:tt)+) => {
        $crate::raise_unless!($cond, $crate::StatusCode::InvalidArgument, $($fmt)+)
    };
}

/// Evaluate to the present value, or raise `NullPointer`.
#[macro_export]
macro_rules! raise_if_null {
    ($value:expr) => {
        match $crate::NullCheck::present($value) {
            ::core::option::Option::Some(v) => v,
            ::core::option::Option::None => $crate::Fault::null_pointer().raise(),
        }
    };
}

/// Evaluate to the present value, or raise `OutOfMemory`.
#[macro_export]
macro_rules! raise_if_oom {
    ($value:expr) => {
        match $crate::NullCheck::present($value) {
            ::core::option::Option::Some(v) => v,
            ::core::option::Option::None => $crate::Fault::out_of_memory().raise(),
        }
    };
}
