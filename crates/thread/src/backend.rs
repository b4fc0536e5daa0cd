//! Build-time backend selection.
//!
//! Exactly one backend is compiled in: the pthread-based `native` backend on
//! unix, the `portable` std-only backend everywhere else. Both expose the
//! same surface: an opaque raw identity, identity comparison, and priority
//! get/set normalized to the `[-15, 15]` scale.

#[cfg(unix)]
mod native {
    use crate::error::ThreadError;

    pub(crate) type RawId = libc::pthread_t;

    pub(crate) fn current() -> RawId {
        // SAFETY: pthread_self has no preconditions.
        unsafe { libc::pthread_self() }
    }

    pub(crate) fn is_same(a: RawId, b: RawId) -> bool {
        // SAFETY: both values were obtained from pthread_self or pthread
        // creation and are compared, not dereferenced.
        unsafe { libc::pthread_equal(a, b) != 0 }
    }

    fn sched_range(policy: i32) -> (i32, i32) {
        // SAFETY: sched_get_priority_{min,max} accept any policy value and
        // report -1 for unknown ones.
        let min = unsafe { libc::sched_get_priority_min(policy) };
        let max = unsafe { libc::sched_get_priority_max(policy) };
        (min, max)
    }

    fn to_native(level: i8, min: i32, max: i32) -> i32 {
        min + ((i32::from(level) - i32::from(crate::Priority::MIN_LEVEL)) * (max - min)) / 30
    }

    fn from_native(native: i32, min: i32, max: i32) -> i8 {
        let level = ((native - min) * 30) / (max - min) + i32::from(crate::Priority::MIN_LEVEL);
        level.clamp(i32::from(crate::Priority::MIN_LEVEL), i32::from(crate::Priority::MAX_LEVEL)) as i8
    }

    /// Reads the thread's normalized priority.
    ///
    /// Returns `None` when the active policy is a time-sharing one whose
    /// `sched_priority` is pinned to a single value; the caller then reports
    /// the last value it recorded (nearest-supported behavior).
    pub(crate) fn get_priority(id: RawId) -> Result<Option<i8>, ThreadError> {
        let mut policy: libc::c_int = 0;
        // SAFETY: param is a plain-old-data struct the call fully overwrites.
        let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
        // SAFETY: id is a pthread identity; out pointers are valid locals.
        let rc = unsafe { libc::pthread_getschedparam(id, &mut policy, &mut param) };
        if rc != 0 {
            return Err(ThreadError::from_os_code(rc));
        }

        let (min, max) = sched_range(policy);
        if min >= max {
            return Ok(None);
        }
        Ok(Some(from_native(param.sched_priority, min, max)))
    }

    pub(crate) fn set_priority(id: RawId, level: i8) -> Result<(), ThreadError> {
        let mut policy: libc::c_int = 0;
        // SAFETY: as above.
        let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
        // SAFETY: as above.
        let rc = unsafe { libc::pthread_getschedparam(id, &mut policy, &mut param) };
        if rc != 0 {
            return Err(ThreadError::from_os_code(rc));
        }

        let (min, max) = sched_range(policy);
        // Time-sharing policies require sched_priority 0; realtime policies
        // take the level mapped onto their real range.
        param.sched_priority = if min < max { to_native(level, min, max) } else { 0 };

        // SAFETY: id is a pthread identity; param is initialized above.
        let rc = unsafe { libc::pthread_setschedparam(id, policy, &param) };
        if rc != 0 {
            return Err(ThreadError::from_os_code(rc));
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod portable {
    use crate::error::ThreadError;

    pub(crate) type RawId = std::thread::ThreadId;

    pub(crate) fn current() -> RawId {
        std::thread::current().id()
    }

    pub(crate) fn is_same(a: RawId, b: RawId) -> bool {
        a == b
    }

    /// The portable backend has no scheduler access; the handle-recorded
    /// value is authoritative.
    pub(crate) fn get_priority(_id: RawId) -> Result<Option<i8>, ThreadError> {
        Ok(None)
    }

    pub(crate) fn set_priority(_id: RawId, _level: i8) -> Result<(), ThreadError> {
        Ok(())
    }
}

#[cfg(unix)]
pub(crate) use native::{RawId, current, get_priority, is_same, set_priority};

#[cfg(not(unix))]
pub(crate) use portable::{RawId, current, get_priority, is_same, set_priority};
