//! Response-side protocol types.

use bytes::Bytes;
use http::Response;

/// Header portion of an HTTP response before body attachment.
pub type ResponseHead = Response<()>;

/// Response body as an ordered list of discrete segments.
///
/// Handlers append whole segments instead of copying everything into one
/// contiguous buffer; the session later submits the status line, header
/// block and these segments to the transport as a single scatter-gather
/// write. Segment order is send order.
#[derive(Debug, Clone, Default)]
pub struct SegmentedBody {
    segments: Vec<Bytes>,
}

impl SegmentedBody {
    /// An empty body (the response still carries its head as one segment).
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one body segment.
    pub fn push(&mut self, segment: impl Into<Bytes>) {
        self.segments.push(segment.into());
    }

    /// Number of discrete segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total body size in bytes across all segments.
    pub fn total_len(&self) -> u64 {
        self.segments.iter().map(|segment| segment.len() as u64).sum()
    }

    /// Returns true if the body carries no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(Bytes::is_empty)
    }

    pub fn segments(&self) -> &[Bytes] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Bytes> {
        self.segments
    }
}

impl From<Bytes> for SegmentedBody {
    fn from(segment: Bytes) -> Self {
        Self { segments: vec![segment] }
    }
}

impl From<&'static str> for SegmentedBody {
    fn from(segment: &'static str) -> Self {
        Self { segments: vec![Bytes::from_static(segment.as_bytes())] }
    }
}

impl From<String> for SegmentedBody {
    fn from(segment: String) -> Self {
        Self { segments: vec![Bytes::from(segment)] }
    }
}

impl From<Vec<u8>> for SegmentedBody {
    fn from(segment: Vec<u8>) -> Self {
        Self { segments: vec![Bytes::from(segment)] }
    }
}

impl FromIterator<Bytes> for SegmentedBody {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        Self { segments: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_span_segments() {
        let mut body = SegmentedBody::new();
        assert!(body.is_empty());
        assert_eq!(body.total_len(), 0);

        body.push("hello");
        body.push(Bytes::from_static(b", world"));

        assert_eq!(body.segment_count(), 2);
        assert_eq!(body.total_len(), 12);
        assert!(!body.is_empty());
    }

    #[test]
    fn preserves_segment_order() {
        let body: SegmentedBody = [Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")]
            .into_iter()
            .collect();
        let segments = body.into_segments();
        assert_eq!(segments, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")]);
    }
}
