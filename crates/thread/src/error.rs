use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("os cannot allocate a new thread: {source}")]
    ResourceExhausted { source: io::Error },

    #[error("thread handle no longer refers to a live thread")]
    InvalidHandle,

    #[error("os denied the requested scheduling change: {source}")]
    PermissionDenied { source: io::Error },

    #[error("thread panicked before completing")]
    Panicked,
}

impl ThreadError {
    pub fn resource_exhausted(source: io::Error) -> Self {
        Self::ResourceExhausted { source }
    }

    pub fn permission_denied(source: io::Error) -> Self {
        Self::PermissionDenied { source }
    }

    /// Maps a raw pthread-style error code to the taxonomy above.
    #[cfg(unix)]
    pub(crate) fn from_os_code(code: i32) -> Self {
        if code == libc::ESRCH {
            Self::InvalidHandle
        } else {
            Self::PermissionDenied { source: io::Error::from_raw_os_error(code) }
        }
    }
}
