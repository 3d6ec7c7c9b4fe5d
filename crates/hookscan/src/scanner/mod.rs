//! Pattern scanner: lazy, memoized wildcard search over a scan range.

use memchr::memchr_iter;
use tracing::debug;

use crate::error::{Error, Result};
use crate::hints::{self, HintCache};
use crate::pattern::Signature;
use crate::region::ScanRange;

/// One place a pattern matched: the absolute address of the window start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchPoint(pub(crate) usize);

impl MatchPoint {
    /// Absolute address of the match.
    pub fn addr(&self) -> usize {
        self.0
    }

    /// The match address plus `offset` bytes, viewed as a pointer to `T`.
    ///
    /// Only forms the pointer. Reading or writing through it is the
    /// caller's unsafe, sound only while the scanned memory stays mapped.
    pub fn ptr<T>(&self, offset: isize) -> *mut T {
        (self.0 as *mut u8).wrapping_offset(offset).cast()
    }
}

/// Lazy scanner for one compiled pattern over one range.
///
/// The range is scanned on first query and the match set memoized; `clear`
/// drops the memo. Queries that bound the match count may stop the scan
/// early, and a partial scan is never memoized, so a later query with a
/// larger bound rescans from the start.
///
/// Not internally synchronized. Sharing one scanner across threads needs
/// external locking; the usual shape is one scanner per call site.
pub struct Scanner<'a> {
    signature: Signature,
    range: ScanRange<'a>,
    hints: &'a HintCache,
    matches: Vec<MatchPoint>,
    matched: bool,
}

impl<'a> Scanner<'a> {
    /// Scanner using the process-wide hint cache.
    pub fn new(signature: Signature, range: ScanRange<'a>) -> Self {
        Self::with_hints(signature, range, hints::global())
    }

    /// Scanner with an injected hint cache.
    pub fn with_hints(signature: Signature, range: ScanRange<'a>, hints: &'a HintCache) -> Self {
        Self {
            signature,
            range,
            hints,
            matches: Vec::new(),
            matched: false,
        }
    }

    /// Parse `text` and scan it over `range`.
    pub fn parse(text: &str, range: ScanRange<'a>) -> Result<Self> {
        Ok(Self::new(Signature::parse(text)?, range))
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn range(&self) -> ScanRange<'a> {
        self.range
    }

    /// Number of matches in the range. Forces a full scan.
    pub fn count(&mut self) -> usize {
        self.ensure_matches(usize::MAX);
        self.matches.len()
    }

    /// Whether the pattern matches nowhere in the range.
    pub fn is_empty(&mut self) -> bool {
        self.count() == 0
    }

    /// Match at `index`, in ascending address order. Forces a full scan.
    pub fn get(&mut self, index: usize) -> Result<MatchPoint> {
        self.ensure_matches(usize::MAX);
        self.matches.get(index).copied().ok_or(Error::MatchIndex {
            index,
            count: self.matches.len(),
        })
    }

    /// Assert the pattern matches exactly `expected` times.
    ///
    /// Scans just far enough to detect overshoot (`expected + 1` matches),
    /// so declaring a signature unique against a large image stays cheap.
    /// A changed binary surfaces here as an error instead of a bad address.
    pub fn expect_count(&mut self, expected: usize) -> Result<&mut Self> {
        self.ensure_matches(expected.saturating_add(1));
        let found = self.matches.len();
        if found != expected {
            return Err(Error::MatchCount { expected, found });
        }
        Ok(self)
    }

    /// Bound the next scan at `limit` matches without asserting the count.
    pub fn count_hint(&mut self, limit: usize) -> &mut Self {
        self.ensure_matches(limit);
        self
    }

    /// Drop the memoized matches, forcing a rescan on the next query.
    pub fn clear(&mut self) -> &mut Self {
        self.matches.clear();
        self.matched = false;
        self
    }

    /// The unique match of the pattern.
    pub fn single(&mut self) -> Result<MatchPoint> {
        self.expect_count(1)?;
        self.get(0)
    }

    /// Pointer to a `T` at `offset` bytes from the unique match.
    pub fn get_first<T>(&mut self, offset: isize) -> Result<*mut T> {
        Ok(self.single()?.ptr(offset))
    }

    /// All matches in ascending address order. Forces a full scan.
    pub fn matches(&mut self) -> &[MatchPoint] {
        self.ensure_matches(usize::MAX);
        &self.matches
    }

    /// Matches found so far, without forcing a scan.
    pub fn found(&self) -> &[MatchPoint] {
        &self.matches
    }

    /// Whether a completed scan (or a verified hint) is memoized.
    pub fn is_matched(&self) -> bool {
        self.matched
    }

    /// Populate the match set unless a completed scan is already memoized.
    ///
    /// Stops early once `max_count` matches are found. Only a scan that
    /// evaluated every window start sets the memo flag.
    pub fn ensure_matches(&mut self, max_count: usize) {
        if self.matched {
            return;
        }
        self.matches.clear();

        if self.try_hint() {
            self.matched = true;
            return;
        }

        let completed = self.scan(max_count);
        debug!(
            "Scanned {:#x}..{:#x} for {}: {} match(es){}",
            self.range.start(),
            self.range.end(),
            self.signature,
            self.matches.len(),
            if completed { "" } else { " (partial)" }
        );

        if completed {
            self.matched = true;
            // A unique result from a completed scan is a stable landmark
            // worth remembering for the next run of the same build.
            if self.matches.len() == 1 {
                self.hints.record(self.signature.hash(), self.matches[0].addr());
            }
        }
    }

    /// Verify a cached hint in place of a scan.
    ///
    /// On success the match set holds exactly the hinted address. A hint
    /// outside the range or no longer matching is ignored.
    fn try_hint(&mut self) -> bool {
        let Some(addr) = self.hints.lookup(self.signature.hash()) else {
            return false;
        };

        if !self.range.contains_span(addr, self.signature.len()) {
            return false;
        }

        let data = self.range.bytes();
        let rel = addr - self.range.start();
        if self.signature.matches_at(&data[rel..]) {
            debug!("Hint for {} verified at {:#x}", self.signature, addr);
            self.matches.push(MatchPoint(addr));
            true
        } else {
            debug!("Stale hint for {} at {:#x}", self.signature, addr);
            false
        }
    }

    /// Walk every window start in the range, collecting matches.
    /// Returns whether the walk evaluated every candidate.
    fn scan(&mut self, max_count: usize) -> bool {
        let data = self.range.bytes();
        let sig_len = self.signature.len();
        if data.len() < sig_len {
            // Shorter than the pattern: a completed scan with zero matches.
            return true;
        }
        let last = data.len() - sig_len;

        match self.signature.first_literal() {
            Some((anchor, byte)) => self.scan_anchored(data, last, anchor, byte, max_count),
            None => self.scan_blind(last, max_count),
        }
    }

    /// Scan driven by the first literal byte: only window starts whose
    /// anchor position holds that byte are compared in full.
    fn scan_anchored(
        &mut self,
        data: &[u8],
        last: usize,
        anchor: usize,
        byte: u8,
        max_count: usize,
    ) -> bool {
        // Anchor-byte positions in this slice map 1:1 onto window starts.
        for rel in memchr_iter(byte, &data[anchor..=anchor + last]) {
            if self.matches.len() >= max_count {
                return false;
            }
            if self.signature.matches_at(&data[rel..]) {
                self.matches.push(MatchPoint(self.range.start() + rel));
            }
        }
        true
    }

    /// All-wildcard patterns match at every window start.
    fn scan_blind(&mut self, last: usize, max_count: usize) -> bool {
        for rel in 0..=last {
            if self.matches.len() >= max_count {
                return false;
            }
            self.matches.push(MatchPoint(self.range.start() + rel));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner<'a>(pattern: &str, data: &'a [u8], hints: &'a HintCache) -> Scanner<'a> {
        Scanner::with_hints(
            Signature::parse(pattern).unwrap(),
            ScanRange::from_slice(data),
            hints,
        )
    }

    fn offsets(scanner: &mut Scanner<'_>) -> Vec<usize> {
        let base = scanner.range().start();
        scanner.matches().iter().map(|m| m.addr() - base).collect()
    }

    #[test]
    fn test_overlapping_literal_matches() {
        let data = [0xAA, 0xAA, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA AA", &data, &hints);
        assert_eq!(s.count(), 2);
        assert_eq!(offsets(&mut s), vec![0, 1]);
    }

    #[test]
    fn test_wildcard_end_to_end() {
        let data = [0xAA, 0xBB, 0x00, 0xDD, 0xAA, 0xBB, 0xFF, 0xDD];
        let hints = HintCache::new();
        let mut s = scanner("AA BB ? DD", &data, &hints);
        assert_eq!(s.count(), 2);
        assert_eq!(offsets(&mut s), vec![0, 4]);
    }

    #[test]
    fn test_absent_pattern_is_empty() {
        let data = [0x11, 0x22, 0x33, 0x44];
        let hints = HintCache::new();
        let mut s = scanner("FF", &data, &hints);
        assert_eq!(s.count(), 0);
        assert!(s.is_empty());
    }

    #[test]
    fn test_matches_ascend() {
        let data = [0x01, 0x00, 0x01, 0x01, 0x00, 0x01];
        let hints = HintCache::new();
        let mut s = scanner("01", &data, &hints);
        let count = s.count();
        assert_eq!(count, 4);
        for i in 1..count {
            assert!(s.get(i - 1).unwrap().addr() < s.get(i).unwrap().addr());
        }
    }

    #[test]
    fn test_get_past_end() {
        let data = [0xAA, 0xBB];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        match s.get(5) {
            Err(Error::MatchIndex { index: 5, count: 1 }) => {}
            other => panic!("expected MatchIndex, got {:?}", other.map(|m| m.addr())),
        }
    }

    #[test]
    fn test_expect_count_exact() {
        let data = [0xAA, 0x00, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        let first = s.expect_count(2).unwrap().get(0).unwrap();
        assert_eq!(first.addr(), s.range().start());
    }

    #[test]
    fn test_expect_count_overshoot() {
        let data = [0xAA, 0x00, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        match s.expect_count(1) {
            Err(Error::MatchCount {
                expected: 1,
                found: 2,
            }) => {}
            other => panic!("expected MatchCount, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_expect_count_shortfall_and_zero() {
        let data = [0x11, 0x22];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        assert!(matches!(
            s.expect_count(2),
            Err(Error::MatchCount {
                expected: 2,
                found: 0
            })
        ));
        assert!(s.expect_count(0).is_ok());
    }

    #[test]
    fn test_clear_reproduces_matches() {
        let data = [0xAA, 0xBB, 0xAA, 0xBB, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA BB", &data, &hints);
        let before = s.matches().to_vec();
        s.clear();
        assert!(!s.is_matched());
        assert!(s.found().is_empty());
        assert_eq!(s.matches(), before);
    }

    #[test]
    fn test_partial_scan_is_not_memoized() {
        let data = [0xAA, 0xAA, 0xAA, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        s.count_hint(1);
        assert_eq!(s.found().len(), 1);
        assert!(!s.is_matched());
        // A later unbounded query rescans from the start.
        assert_eq!(s.count(), 4);
        assert!(s.is_matched());
    }

    #[test]
    fn test_count_hint_zero_finds_nothing() {
        let data = [0xAA, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        s.count_hint(0);
        assert!(s.found().is_empty());
        assert!(!s.is_matched());
    }

    #[test]
    fn test_short_range_completes_with_zero() {
        let data = [0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA BB CC", &data, &hints);
        assert_eq!(s.count(), 0);
        assert!(s.is_matched());
    }

    #[test]
    fn test_all_wildcards_match_every_window() {
        let data = [0x10, 0x20, 0x30, 0x40];
        let hints = HintCache::new();
        let mut s = scanner("?? ??", &data, &hints);
        assert_eq!(s.count(), 3);
        assert_eq!(offsets(&mut s), vec![0, 1, 2]);
    }

    #[test]
    fn test_wildcard_prefix_anchor() {
        // First literal sits at offset 2; hits too close to the range start
        // cannot anchor a window.
        let data = [0xE8, 0x00, 0xE8, 0x11, 0x22, 0xE8];
        let hints = HintCache::new();
        let mut s = scanner("?? ?? E8", &data, &hints);
        assert_eq!(s.count(), 2);
        assert_eq!(offsets(&mut s), vec![0, 3]);
    }

    #[test]
    fn test_single_and_get_first() {
        let data = [0x00, 0xAA, 0xBB, 0xCC, 0x00];
        let hints = HintCache::new();
        let mut s = scanner("AA BB CC", &data, &hints);
        let m = s.single().unwrap();
        assert_eq!(m.addr(), s.range().start() + 1);

        let p: *mut u32 = s.get_first(2).unwrap();
        assert_eq!(p as usize, m.addr() + 2);
        let back: *mut u8 = m.ptr(-1);
        assert_eq!(back as usize, m.addr() - 1);
    }

    #[test]
    fn test_get_first_requires_unique() {
        let data = [0xAA, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        assert!(matches!(
            s.get_first::<u8>(0),
            Err(Error::MatchCount {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_unique_match_records_hint() {
        let data = [0x00, 0xAA, 0xBB, 0x00];
        let hints = HintCache::new();
        let mut s = scanner("AA BB", &data, &hints);
        let addr = s.single().unwrap().addr();
        assert_eq!(hints.lookup(s.signature().hash()), Some(addr));
    }

    #[test]
    fn test_multi_match_records_no_hint() {
        let data = [0xAA, 0x00, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        assert_eq!(s.count(), 2);
        assert_eq!(hints.lookup(s.signature().hash()), None);
    }

    #[test]
    fn test_partial_scan_records_no_hint() {
        let data = [0xAA, 0x00, 0xAA];
        let hints = HintCache::new();
        let mut s = scanner("AA", &data, &hints);
        s.count_hint(1);
        assert_eq!(hints.lookup(s.signature().hash()), None);
    }

    #[test]
    fn test_verified_hint_short_circuits() {
        let data = [0xAA, 0x00, 0xAA];
        let hints = HintCache::new();
        let sig = Signature::parse("AA").unwrap();
        let range = ScanRange::from_slice(&data);
        // Seed the second occurrence; a full scan would find two.
        hints.record(sig.hash(), range.start() + 2);

        let mut s = Scanner::with_hints(sig, range, &hints);
        assert_eq!(s.count(), 1);
        assert_eq!(s.get(0).unwrap().addr(), range.start() + 2);
        assert!(s.is_matched());
    }

    #[test]
    fn test_stale_hint_falls_back_to_scan() {
        let mut data = vec![0x00, 0xAA, 0xBB, 0x00, 0x00, 0x00];
        let hints = HintCache::new();
        let hash;
        let hinted;
        {
            let mut s = scanner("AA BB", &data, &hints);
            hinted = s.single().unwrap().addr();
            hash = s.signature().hash();
        }
        assert_eq!(hints.lookup(hash), Some(hinted));

        // Same buffer, pattern moved: the hinted address no longer matches.
        data[1] = 0x00;
        data[4] = 0xAA;
        data[5] = 0xBB;
        let mut s = scanner("AA BB", &data, &hints);
        assert_eq!(s.count(), 1);
        let addr = s.get(0).unwrap().addr();
        assert_eq!(addr - s.range().start(), 4);
        assert_ne!(addr, hinted);
    }

    #[test]
    fn test_out_of_range_hint_is_ignored() {
        let data = [0xAA, 0xBB];
        let hints = HintCache::new();
        let sig = Signature::parse("AA BB").unwrap();
        hints.record(sig.hash(), usize::MAX - 16);

        let mut s = Scanner::with_hints(sig, ScanRange::from_slice(&data), &hints);
        assert_eq!(s.count(), 1);
        assert_eq!(s.get(0).unwrap().addr(), s.range().start());
    }

    #[test]
    fn test_hint_applies_before_count_bound() {
        let data = [0x00, 0xAA, 0xBB, 0x00];
        let hints = HintCache::new();
        let sig = Signature::parse("AA BB").unwrap();
        let range = ScanRange::from_slice(&data);
        hints.record(sig.hash(), range.start() + 1);

        let mut s = Scanner::with_hints(sig, range, &hints);
        s.count_hint(0);
        assert_eq!(s.found().len(), 1);
        assert!(s.is_matched());
    }
}
