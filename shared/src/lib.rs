//! Strong and weak reference counted handles, with custom destruction policies.
//!
//! A `Strong<T, P>` shares the ownership of a single heap-allocated `T`, while a `Weak<T, P>` observes it without
//! keeping it alive, and may be promoted back to a `Strong` as long as the object is still alive. `SyncStrong` and
//! `SyncWeak` are their thread-safe equivalents.
//!
//! Unlike `Rc` and `Arc`, the handles may be empty, and the object is destroyed by a destruction policy `P` of the
//! user's choice, which defaults to `DefaultDelete`, ie dropping a `Box<T>`.
//!
//! #   Layout
//!
//! All handles to a given object point to a single control block, allocated separately from the object:
//!
//! ```txt
//! +--------+--------+--------+--------+         +--------+
//! | strong |  weak  | object | policy |  ---->  |   T    |
//! +--------+--------+--------+--------+         +--------+
//! ```
//!
//! #   Lifecycle
//!
//! -   The object is destroyed, by its policy, when the last `Strong` handle is dropped or reset.
//! -   The control block, and the policy in it, is deallocated when the last handle of either kind is dropped or
//!     reset, and never before the object is destroyed.
//!
//! #   Features
//!
//! -   `log`: emits `log::trace!` records when a control block is allocated, when its object is destroyed, and when
//!     it is deallocated.

//  Use only core and alloc, guaranteeing no I/O nor threads.
#![cfg_attr(not(test), no_std)]
//  Ensure unsafe operations are duly checked.
#![deny(unsafe_op_in_unsafe_fn)]
//  Ensure proper documentation.
#![deny(missing_docs)]

//  Non-core must be explicitly depended on in no_std.
extern crate alloc;

//  Traces the lifecycle of control blocks, if the `log` feature is enabled.
macro_rules! trace {
    ($($arg:tt)+) => {
        #[cfg(feature = "log")]
        log::trace!(target: "endor_shared", $($arg)+);
    };
}

mod arc;
mod count;
mod error;
mod policy;
mod raw;
mod raw_rc;
mod rc;

pub use arc::{make_sync_strong, SyncStrong, SyncWeak};
pub use error::SharedError;
pub use policy::{DefaultDelete, DestructionPolicy};
pub use rc::{make_strong, Strong, Weak};
