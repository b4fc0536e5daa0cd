use std::cell::Cell;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::backend;
use crate::error::ThreadError;
use crate::priority::Priority;

/// Process-wide counter backing the stable numeric thread id; 0 is reserved
/// as the invalid sentinel.
static NEXT_NUMERIC_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static RECORDED_PRIORITY: Cell<i8> = const { Cell::new(0) };
}

/// OS-level thread identity.
///
/// Comparison goes through the platform identity (pthread identity on unix),
/// not the handle object, so two handles naming the same thread compare
/// equal and the check is O(1).
#[derive(Debug, Clone, Copy)]
pub struct ThreadId(backend::RawId);

impl PartialEq for ThreadId {
    fn eq(&self, other: &Self) -> bool {
        backend::is_same(self.0, other.0)
    }
}

impl Eq for ThreadId {}

/// Returns the calling thread's identity.
pub fn current() -> ThreadId {
    ThreadId(backend::current())
}

/// Voluntarily gives up the remainder of the scheduling quantum.
///
/// No ordering guarantee about which thread runs next.
pub fn yield_now() {
    std::thread::yield_now();
}

/// Adjusts the calling thread's priority.
pub fn set_current_priority(priority: Priority) -> Result<(), ThreadError> {
    backend::set_priority(backend::current(), priority.level())?;
    RECORDED_PRIORITY.with(|cell| cell.set(priority.level()));
    Ok(())
}

/// Reads the calling thread's priority, falling back to the last value
/// recorded through [`set_current_priority`] on platforms/policies without a
/// readable range.
pub fn current_priority() -> Result<Priority, ThreadError> {
    match backend::get_priority(backend::current())? {
        Some(level) => Ok(Priority::new(i32::from(level))),
        None => Ok(Priority::new(i32::from(RECORDED_PRIORITY.with(Cell::get)))),
    }
}

/// Configures and spawns a new thread.
///
/// A stack size of 0 (the default) means the OS default.
#[derive(Debug, Default)]
pub struct Builder {
    stack_size: usize,
    name: Option<String>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Starts a new OS thread running `entry`.
    ///
    /// Fails with [`ThreadError::ResourceExhausted`] when the OS cannot
    /// allocate the thread.
    pub fn spawn<F>(self, entry: F) -> Result<Thread, ThreadError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder = std::thread::Builder::new();
        if self.stack_size > 0 {
            builder = builder.stack_size(self.stack_size);
        }
        if let Some(name) = self.name {
            builder = builder.name(name);
        }

        // The new thread announces its OS identity before running the entry
        // function, so priority and identity operations on the returned
        // handle are valid immediately.
        let (tx, rx) = mpsc::sync_channel(1);
        let join = builder
            .spawn(move || {
                let _ = tx.send(backend::current());
                entry();
            })
            .map_err(ThreadError::resource_exhausted)?;
        let raw = rx.recv().map_err(|_| ThreadError::InvalidHandle)?;

        Ok(Thread {
            join: Some(join),
            identity: ThreadId(raw),
            numeric_id: NEXT_NUMERIC_ID.fetch_add(1, Ordering::Relaxed),
            requested_priority: AtomicI32::new(i32::from(Priority::NORMAL.level())),
        })
    }
}

/// Handle to a spawned thread.
///
/// The handle is either valid (still owns the joinable OS thread) or has
/// been consumed by [`join`](Thread::join) / [`detach`](Thread::detach);
/// consuming operations take the handle by value, so releasing it twice is
/// unrepresentable. Dropping a valid handle detaches the thread.
#[derive(Debug)]
pub struct Thread {
    join: Option<JoinHandle<()>>,
    identity: ThreadId,
    numeric_id: u64,
    requested_priority: AtomicI32,
}

impl Thread {
    /// Spawns a thread with default settings; see [`Builder`].
    pub fn spawn<F>(entry: F) -> Result<Self, ThreadError>
    where
        F: FnOnce() + Send + 'static,
    {
        Builder::new().spawn(entry)
    }

    /// Stable numeric id of this thread; never 0 for a spawned thread.
    pub fn id(&self) -> u64 {
        self.numeric_id
    }

    /// OS identity of this thread.
    pub fn identity(&self) -> ThreadId {
        self.identity
    }

    /// Whether the calling thread is the one this handle names.
    pub fn is_current(&self) -> bool {
        self.identity == current()
    }

    /// Whether the handle value still owns the joinable thread.
    ///
    /// This is a check on the handle, not a guarantee the OS thread is still
    /// running.
    pub fn is_valid(&self) -> bool {
        self.join.is_some() && self.numeric_id != 0
    }

    /// Waits for the thread to terminate and releases its OS resources.
    ///
    /// When the calling thread *is* this thread, joining would deadlock, so
    /// the call degrades to a detach and returns immediately.
    pub fn join(mut self) -> Result<(), ThreadError> {
        let join = self.join.take().ok_or(ThreadError::InvalidHandle)?;
        if self.is_current() {
            drop(join);
            return Ok(());
        }
        join.join().map_err(|_| ThreadError::Panicked)
    }

    /// Releases the join state without waiting for the thread.
    pub fn detach(mut self) {
        self.join.take();
    }

    /// Adjusts the thread's scheduling priority.
    ///
    /// Fails with [`ThreadError::PermissionDenied`] when the OS refuses the
    /// change and [`ThreadError::InvalidHandle`] when the thread is gone.
    pub fn set_priority(&self, priority: Priority) -> Result<(), ThreadError> {
        backend::set_priority(self.identity.0, priority.level())?;
        self.requested_priority.store(i32::from(priority.level()), Ordering::Relaxed);
        Ok(())
    }

    /// Reads the thread's priority.
    ///
    /// When the active scheduling policy exposes a real priority range, the
    /// OS value is reported; otherwise the nearest supported value is the
    /// one recorded by the last [`set_priority`](Thread::set_priority).
    pub fn priority(&self) -> Result<Priority, ThreadError> {
        match backend::get_priority(self.identity.0)? {
            Some(level) => Ok(Priority::new(i32::from(level))),
            None => Ok(Priority::new(self.requested_priority.load(Ordering::Relaxed))),
        }
    }
}
