//! Cross-platform thread primitives
//!
//! This crate provides the small set of thread operations the server engine
//! needs from the OS: creating worker threads (optionally with an explicit
//! stack size), joining or detaching them, reading and adjusting scheduling
//! priority, identity checks, and yielding. It normalizes the places where
//! OS families disagree so upper layers never special-case a platform:
//!
//! - Priority is a single signed level in `[-15, 15]` (0 = normal) that is
//!   mapped onto whatever the platform scheduler actually offers, saturating
//!   at the idle/time-critical extremes.
//! - Joining a thread from within itself would deadlock; [`Thread::join`]
//!   detects that case and degrades to a detach.
//! - Identity comparison uses the OS thread identity, not the handle object,
//!   so it is O(1) and consistent across handles.
//!
//! Two interchangeable backends are selected at build time: a pthread-based
//! one on unix (identity and scheduling through `libc`) and a portable one
//! everywhere else (`std::thread` identity, priority recorded on the handle).
//!
//! # Example
//!
//! ```
//! use nano_thread::{Builder, Priority};
//!
//! let worker = Builder::new()
//!     .name("worker")
//!     .spawn(|| {
//!         // thread body
//!     })
//!     .expect("os refused to start a thread");
//!
//! assert!(!worker.is_current());
//! worker.set_priority(Priority::ABOVE_NORMAL).ok();
//! worker.join().expect("worker panicked");
//! ```

mod backend;
mod error;
mod handle;
mod priority;

pub use error::ThreadError;
pub use handle::{Builder, Thread, ThreadId, current, current_priority, set_current_priority, yield_now};
pub use priority::Priority;
