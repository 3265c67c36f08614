//! Status codes, diagnostic faults, and call-boundary translation for Tether.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! closed set of caller-visible [`StatusCode`]s, the internal [`Fault`]
//! value that carries one of them, the check macros used inside entry
//! points, and the [`boundary::guarded`] construct that turns every
//! internal failure into a status code before control leaves the crate.
//!
//! # Propagation styles
//!
//! Internal code may fail in two ways, and both are normalized at the
//! boundary:
//!
//! - **Returned:** functions return `Result<T, Fault>` and use `?` or the
//!   early-return macros ([`check!`], [`ensure!`], [`ensure_alloc!`],
//!   [`ensure_ptr!`]).
//! - **Raised:** helpers call [`Fault::raise`] (or the `raise_*` macros),
//!   which unwinds to the nearest boundary without running the panic hook.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

#[macro_use]
pub mod check;
pub mod boundary;
pub mod fault;
pub mod status;

pub use boundary::guarded;
pub use check::NullCheck;
pub use fault::{verify_alloc, AllocFailure, Fault};
pub use status::StatusCode;
