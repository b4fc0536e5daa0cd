//! Small internal helpers shared across the engine.

use bytes::{BufMut, BytesMut};
use std::io;

/// Early return with an error when a condition does not hold.
///
/// Like `assert!`, but produces an `Err` instead of panicking, which keeps
/// validation checks on the non-panicking path.
///
/// # Example
///
/// ```ignore
/// ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// `io::Write` adapter over `BytesMut`.
///
/// Lets `write!` format status lines straight into a reserved buffer without
/// an intermediate allocation.
pub(crate) struct BytesWriter<'a>(pub(crate) &'a mut BytesMut);

impl io::Write for BytesWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
