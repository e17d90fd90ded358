//! Segmented message payload.
//!
//! A message is eight separately allocated segments of equal length. Segment
//! `i` is filled with the byte `b'A' + i`, so a hexdump of the wire shows
//! which segment a byte came from. The segments are deliberately not
//! contiguous: the copy strategies differ only in how they get these eight
//! regions onto the socket.
//!
//! A payload size that is not a multiple of eight loses its remainder
//! (`payload_size / 8` per segment). That matches the measurements the
//! benchmark has always produced and is not corrected here.

use std::io::IoSlice;

/// Number of segments in every message.
pub const SEGMENT_COUNT: usize = 8;

/// Largest accepted payload. Sessions allocate their message on their own
/// thread, where an allocation failure would abort the whole process.
pub const MAX_MESSAGE_SIZE: usize = 1 << 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("invalid message size {0}: must be at least {SEGMENT_COUNT} bytes")]
    InvalidSize(usize),
    #[error("message size {0} exceeds the {MAX_MESSAGE_SIZE} byte limit")]
    TooLarge(usize),
    #[error("segment {index} is {len} bytes, expected {expected}")]
    UnevenSegment {
        index: usize,
        len: usize,
        expected: usize,
    },
}

/// Eight read-only segments. Nothing hands out `&mut` access after
/// construction, so a segment lent to the kernel cannot be rewritten.
#[derive(Debug)]
pub struct SegmentedMessage {
    segments: [Box<[u8]>; SEGMENT_COUNT],
    segment_len: usize,
}

impl SegmentedMessage {
    /// Build the benchmark payload for `payload_size` bytes.
    pub fn generate(payload_size: usize) -> Result<Self, MessageError> {
        let segment_len = Self::segment_len_for(payload_size)?;
        let segments = std::array::from_fn(|i| vec![fill_byte(i); segment_len].into_boxed_slice());
        Ok(Self {
            segments,
            segment_len,
        })
    }

    /// Build a message from arbitrary segment contents.
    pub fn from_segments(segments: [Vec<u8>; SEGMENT_COUNT]) -> Result<Self, MessageError> {
        let expected = segments[0].len();
        for (index, seg) in segments.iter().enumerate() {
            if seg.len() != expected {
                return Err(MessageError::UnevenSegment {
                    index,
                    len: seg.len(),
                    expected,
                });
            }
        }
        Ok(Self {
            segments: segments.map(Vec::into_boxed_slice),
            segment_len: expected,
        })
    }

    /// Per-segment length for a payload size, or `InvalidSize`.
    pub fn segment_len_for(payload_size: usize) -> Result<usize, MessageError> {
        if payload_size < SEGMENT_COUNT {
            return Err(MessageError::InvalidSize(payload_size));
        }
        if payload_size > MAX_MESSAGE_SIZE {
            return Err(MessageError::TooLarge(payload_size));
        }
        Ok(payload_size / SEGMENT_COUNT)
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    /// Total bytes on the wire per message.
    pub fn len(&self) -> usize {
        self.segment_len * SEGMENT_COUNT
    }

    pub fn is_empty(&self) -> bool {
        self.segment_len == 0
    }

    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.segments.iter().map(|s| &s[..])
    }

    /// Gather list over the segments, in order.
    pub fn io_slices(&self) -> [IoSlice<'_>; SEGMENT_COUNT] {
        std::array::from_fn(|i| IoSlice::new(&self.segments[i]))
    }

    /// Copy every segment into `dst`, back to back.
    ///
    /// # Panics
    /// Panics if `dst` is shorter than [`len`](Self::len).
    pub fn linearize_into(&self, dst: &mut [u8]) {
        for (chunk, seg) in dst[..self.len()]
            .chunks_exact_mut(self.segment_len.max(1))
            .zip(self.segments.iter())
        {
            chunk.copy_from_slice(seg);
        }
    }
}

/// Fill byte for segment `index`.
pub fn fill_byte(index: usize) -> u8 {
    b'A' + index as u8
}
