//! Scan ranges: the memory spans patterns are matched against.

use std::marker::PhantomData;

use crate::error::{Error, Result};

#[cfg(target_os = "windows")]
mod module;

/// A half-open `[start, end)` span of readable memory.
///
/// Built from a borrowed slice, from raw bounds the caller vouches for, or
/// from a loaded module's image (Windows). Whatever the origin, the range is
/// normalized to one address pair at construction; scanning never reads
/// outside it. [`ScanRange::bytes`] is the only place in the crate where the
/// pair becomes a slice again.
#[derive(Debug, Clone, Copy)]
pub struct ScanRange<'a> {
    start: usize,
    end: usize,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> ScanRange<'a> {
    /// Range covering a borrowed buffer.
    pub fn from_slice(data: &'a [u8]) -> Self {
        let start = data.as_ptr() as usize;
        Self {
            start,
            end: start + data.len(),
            _data: PhantomData,
        }
    }

    /// Lowest address of the range.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the highest address of the range.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `[addr, addr + len)` lies entirely inside the range.
    pub fn contains_span(&self, addr: usize, len: usize) -> bool {
        addr >= self.start && addr <= self.end && self.end - addr >= len
    }

    /// The range as a byte slice.
    pub(crate) fn bytes(&self) -> &'a [u8] {
        if self.start == self.end {
            return &[];
        }
        // SAFETY: every constructor guarantees start <= end and that a
        // non-empty span stays readable for the range's lifetime.
        unsafe { std::slice::from_raw_parts(self.start as *const u8, self.end - self.start) }
    }
}

impl ScanRange<'static> {
    /// Range over explicit address bounds.
    ///
    /// # Safety
    ///
    /// The caller must guarantee `[start, end)` is mapped and readable for
    /// as long as the range is scanned.
    pub unsafe fn from_bounds(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            _data: PhantomData,
        })
    }
}
