//! serialize: Region list -> bounded CSV snapshot.
//!
//! Record format (frozen, consumed by the user-space procmap script):
//!   <start-hex>,<end-hex>,<mode>,<name>\n
//! Hex is lowercase, zero-padded to the word width (8 or 16 digits), no 0x.
//! Optional diagnostic trailer lines follow the regions:
//!   <KEY>,<value>\n
//! Consumers must ignore trailer keys they do not know.
//!
//! Truncation: a line that would not fit in the capacity is dropped together
//! with every line after it. The buffer only ever holds whole lines.

use std::fmt::Write as _;

use crate::catalog::Region;
use crate::consts::{DIAG_FEATURE_VERSION, DIAG_PAGE_SIZE, DIAG_TOTAL_RAM, DIAG_VARIANT};
use crate::error::{QueryError, QueryResult};
use crate::facts::{PlatformFacts, WordWidth};

/// One fully serialized rendering of a catalog. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    buf: Vec<u8>,
    capacity: usize,
    lines: usize,
    dropped: usize,
}

impl Snapshot {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lines written.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Lines dropped because the capacity was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    /// `[offset, offset + max_len)` clipped to the produced length.
    pub fn window(&self, offset: u64, max_len: usize) -> &[u8] {
        let len = self.buf.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
        let end = start.saturating_add(max_len).min(len);
        &self.buf[start..end]
    }
}

/// Incremental, line-atomic writer into a fixed-capacity buffer.
pub struct Serializer {
    width: WordWidth,
    capacity: usize,
    buf: Vec<u8>,
    line: String,
    lines: usize,
    dropped: usize,
    closed: bool,
}

impl Serializer {
    /// Allocates the whole capacity up front; failure -> OutOfMemory.
    pub fn new(width: WordWidth, capacity: usize) -> QueryResult<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| QueryError::OutOfMemory(capacity))?;
        Ok(Self {
            width,
            capacity,
            buf,
            line: String::with_capacity(64),
            lines: 0,
            dropped: 0,
            closed: false,
        })
    }

    /// Addresses beyond the word width are clamped to its maximum, the same
    /// way the catalog builder bounds its spans.
    pub fn push_region(&mut self, r: &Region) -> bool {
        let w = self.width.nibbles();
        let max = self.width.max_addr();
        let start = r.start.min(max);
        let end = r.end.min(max).max(start);
        self.line.clear();
        // write! в String не падает
        let _ = write!(
            self.line,
            "{:0w$x},{:0w$x},{},{}\n",
            start,
            end,
            r.mode,
            r.name,
            w = w
        );
        self.commit_line()
    }

    pub fn push_kv(&mut self, key: &str, value: &str) -> bool {
        self.line.clear();
        let _ = write!(self.line, "{},{}\n", key, value);
        self.commit_line()
    }

    fn commit_line(&mut self) -> bool {
        if self.closed || self.buf.len() + self.line.len() > self.capacity {
            self.closed = true;
            self.dropped += 1;
            return false;
        }
        self.buf.extend_from_slice(self.line.as_bytes());
        self.lines += 1;
        true
    }

    pub fn finish(self) -> Snapshot {
        Snapshot {
            buf: self.buf,
            capacity: self.capacity,
            lines: self.lines,
            dropped: self.dropped,
        }
    }
}

/// Regions only.
pub fn serialize(regions: &[Region], width: WordWidth, capacity: usize) -> QueryResult<Snapshot> {
    let mut s = Serializer::new(width, capacity)?;
    for r in regions {
        s.push_region(r);
    }
    Ok(s.finish())
}

/// Trailer key/value lines for a set of facts.
pub fn diagnostics(facts: &PlatformFacts) -> Vec<(&'static str, String)> {
    vec![
        (DIAG_PAGE_SIZE, format!("{:x}", facts.layout.page_size)),
        (DIAG_TOTAL_RAM, format!("{:x}", facts.total_memory_bytes)),
        (DIAG_FEATURE_VERSION, format!("{:x}", facts.feature_version)),
        (DIAG_VARIANT, facts.variant_code.to_string()),
    ]
}

/// Regions followed by the diagnostic trailer (if enabled).
pub fn serialize_with_trailer(
    regions: &[Region],
    facts: &PlatformFacts,
    capacity: usize,
    trailer: bool,
) -> QueryResult<Snapshot> {
    let mut s = Serializer::new(facts.word_width, capacity)?;
    for r in regions {
        s.push_region(r);
    }
    if trailer {
        for (k, v) in diagnostics(facts) {
            s.push_kv(k, &v);
        }
    }
    Ok(s.finish())
}
