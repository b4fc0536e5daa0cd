//! Outbound scatter-gather buffer vector.

use std::io::IoSlice;

use bytes::Bytes;

/// Segments stored inline before the queue falls back to a heap vector.
pub(crate) const INLINE_SEGMENTS: usize = 4;

/// The per-session outbound buffer vector.
///
/// The common response is a head segment plus a single body segment, so up
/// to [`INLINE_SEGMENTS`] segments live in a fixed inline store with no
/// allocation. A response needing more is promoted to a heap store exactly
/// once, sized to the exact segment count; the count is known before the
/// send is submitted, so geometric growth would be wasted.
///
/// A cursor tracks how far the transport has consumed the queued bytes;
/// after a short write, [`io_slices`](SegmentQueue::io_slices) yields
/// precisely the unsent tail, with the partially consumed segment trimmed.
#[derive(Debug, Default)]
pub(crate) struct SegmentQueue {
    store: Store,
    cursor_segment: usize,
    cursor_offset: usize,
}

#[derive(Debug)]
enum Store {
    Inline { segments: [Bytes; INLINE_SEGMENTS], len: usize },
    Heap(Vec<Bytes>),
}

impl Default for Store {
    fn default() -> Self {
        Self::Inline { segments: Default::default(), len: 0 }
    }
}

impl SegmentQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Prepares the queue for a response of exactly `segment_count`
    /// segments, choosing the backing store once.
    pub(crate) fn begin(&mut self, segment_count: usize) {
        self.cursor_segment = 0;
        self.cursor_offset = 0;
        self.store = if segment_count > INLINE_SEGMENTS {
            Store::Heap(Vec::with_capacity(segment_count))
        } else {
            Store::default()
        };
    }

    pub(crate) fn push(&mut self, segment: Bytes) {
        match &mut self.store {
            Store::Inline { segments, len } => {
                if *len < INLINE_SEGMENTS {
                    segments[*len] = segment;
                    *len += 1;
                } else {
                    // a caller that underestimated begin(); promote once,
                    // exactly sized
                    let mut heap = Vec::with_capacity(*len + 1);
                    heap.extend(segments.iter_mut().map(std::mem::take));
                    heap.push(segment);
                    self.store = Store::Heap(heap);
                }
            }
            Store::Heap(heap) => heap.push(segment),
        }
    }

    /// The queued segments, identical regardless of the backing store.
    pub(crate) fn segments(&self) -> &[Bytes] {
        match &self.store {
            Store::Inline { segments, len } => &segments[..*len],
            Store::Heap(heap) => heap,
        }
    }

    pub(crate) fn segment_count(&self) -> usize {
        self.segments().len()
    }

    /// Total bytes the transport has not consumed yet.
    pub(crate) fn remaining(&self) -> usize {
        let segments = self.segments();
        if self.cursor_segment >= segments.len() {
            return 0;
        }
        let mut total = segments[self.cursor_segment].len() - self.cursor_offset;
        total += segments[self.cursor_segment + 1..].iter().map(Bytes::len).sum::<usize>();
        total
    }

    pub(crate) fn is_flushed(&self) -> bool {
        self.remaining() == 0
    }

    /// The unsent tail as IoSlices, the partially consumed segment trimmed
    /// to its unsent suffix.
    pub(crate) fn io_slices(&self) -> Vec<IoSlice<'_>> {
        let segments = self.segments();
        let mut slices = Vec::with_capacity(segments.len().saturating_sub(self.cursor_segment));
        if self.cursor_segment < segments.len() {
            slices.push(IoSlice::new(&segments[self.cursor_segment][self.cursor_offset..]));
            for segment in &segments[self.cursor_segment + 1..] {
                slices.push(IoSlice::new(segment));
            }
        }
        slices
    }

    /// Moves the cursor past `consumed` transport-accepted bytes.
    pub(crate) fn advance(&mut self, mut consumed: usize) {
        while consumed > 0 {
            let Some(segment_len) = self.segments().get(self.cursor_segment).map(Bytes::len) else {
                break;
            };
            let unsent = segment_len - self.cursor_offset;
            if consumed < unsent {
                self.cursor_offset += consumed;
                return;
            }
            consumed -= unsent;
            self.cursor_segment += 1;
            self.cursor_offset = 0;
        }
        debug_assert_eq!(consumed, 0, "advanced past the queued bytes");
    }

    /// Empties the queue and returns to the inline store.
    pub(crate) fn clear(&mut self) {
        self.store = Store::default();
        self.cursor_segment = 0;
        self.cursor_offset = 0;
    }

    #[cfg(test)]
    pub(crate) fn is_heap(&self) -> bool {
        matches!(self.store, Store::Heap(_))
    }

    #[cfg(test)]
    pub(crate) fn heap_capacity(&self) -> Option<usize> {
        match &self.store {
            Store::Heap(heap) => Some(heap.capacity()),
            Store::Inline { .. } => None,
        }
    }
}
