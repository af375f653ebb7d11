// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Code point sets, used as the character predicate of NFA transitions.
//!
//! The Latin-1 range is a 256-bit bitmap so that the common case is a single
//! load and mask. Everything above `0xFF` is kept as sorted, non-overlapping,
//! non-adjacent inclusive ranges and looked up with a binary search.

use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;

const WORD_BITS: usize = usize::BITS as usize;
const WORDS: usize = 256 / WORD_BITS;
const WIDE_MIN: u32 = 0x100;

/// The capability a transition needs from its character class.
pub trait CharPredicate {
    fn matches(&self, c: u32) -> bool;
}

#[derive(Clone, PartialEq, Eq)]
pub struct CharSet {
    bits: [usize; WORDS],
    wide: Vec<(u32, u32)>,
}

impl CharSet {
    /// The empty set.
    pub const fn no() -> Self {
        CharSet { bits: [usize::MIN; WORDS], wide: Vec::new() }
    }

    /// Every code unit / code point, including values above `char::MAX`.
    pub fn yes() -> Self {
        CharSet { bits: [usize::MAX; WORDS], wide: vec![(WIDE_MIN, u32::MAX)] }
    }

    pub fn single(c: u32) -> Self {
        let mut cs = Self::no();
        cs.set(c);
        cs
    }

    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = RangeInclusive<u32>>,
    {
        let mut cs = Self::no();
        for r in ranges {
            cs.set_range(r);
        }
        cs
    }

    pub fn contains(&self, c: u32) -> bool {
        if c < WIDE_MIN {
            let hi = c as usize / WORD_BITS;
            let lo = c as usize % WORD_BITS;
            return (self.bits[hi] & (1 << lo)) != 0;
        }

        self.wide
            .binary_search_by(|&(lo, hi)| {
                if hi < c {
                    Ordering::Less
                } else if lo > c {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == usize::MIN) && self.wide.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bits.iter().all(|&b| b == usize::MAX) && self.wide == [(WIDE_MIN, u32::MAX)]
    }

    pub fn set(&mut self, c: u32) {
        self.set_range(c..=c);
    }

    pub fn set_range(&mut self, range: RangeInclusive<u32>) {
        let (start, end) = (*range.start(), *range.end());
        if start > end {
            return;
        }

        if start < WIDE_MIN {
            self.set_byte_range(start as u8, end.min(WIDE_MIN - 1) as u8);
        }
        if end >= WIDE_MIN {
            self.wide.push((start.max(WIDE_MIN), end));
            self.normalize();
        }
    }

    pub fn invert(&mut self) {
        for b in &mut self.bits {
            *b = !*b;
        }

        let mut inverted = Vec::with_capacity(self.wide.len() + 1);
        let mut next = WIDE_MIN;
        let mut saturated = false;

        for &(lo, hi) in &self.wide {
            if lo > next {
                inverted.push((next, lo - 1));
            }
            if hi == u32::MAX {
                saturated = true;
                break;
            }
            next = hi + 1;
        }
        if !saturated {
            inverted.push((next, u32::MAX));
        }

        self.wide = inverted;
    }

    /// Adds the other case of every ASCII letter in the set.
    pub fn add_ascii_case(&mut self) {
        for b in b'a'..=b'z' {
            let upper = b.to_ascii_uppercase() as u32;
            let lower = b as u32;
            if self.contains(lower) || self.contains(upper) {
                self.set(lower);
                self.set(upper);
            }
        }
    }

    fn set_byte_range(&mut self, start: u8, end: u8) {
        let start = start as usize;
        let end = end as usize;
        let start_word = start / WORD_BITS;
        let end_word = end / WORD_BITS;

        for word in start_word..=end_word {
            let first = if word == start_word { start % WORD_BITS } else { 0 };
            let last = if word == end_word { end % WORD_BITS } else { WORD_BITS - 1 };
            let width = last - first + 1;
            let mask = if width == WORD_BITS { usize::MAX } else { ((1usize << width) - 1) << first };
            self.bits[word] |= mask;
        }
    }

    fn normalize(&mut self) {
        self.wide.sort_unstable();

        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(self.wide.len());
        for &(lo, hi) in &self.wide {
            if let Some(last) = merged.last_mut() {
                if lo <= last.1.saturating_add(1) {
                    last.1 = last.1.max(hi);
                    continue;
                }
            }
            merged.push((lo, hi));
        }

        self.wide = merged;
    }
}

impl CharPredicate for CharSet {
    #[inline]
    fn matches(&self, c: u32) -> bool {
        self.contains(c)
    }
}

impl Default for CharSet {
    fn default() -> Self {
        Self::no()
    }
}

impl fmt::Debug for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show_char = |f: &mut fmt::Formatter<'_>, c: u32| {
            if c == '"' as u32 {
                write!(f, "&quot;")
            } else if c < 0x80 && (c as u8).is_ascii_graphic() {
                write!(f, "{}", c as u8 as char)
            } else {
                write!(f, "0x{c:02X}")
            }
        };
        let show_range = |f: &mut fmt::Formatter<'_>, lo: u32, hi: u32| {
            show_char(f, lo)?;
            if hi > lo {
                write!(f, "-")?;
                show_char(f, hi)?;
            }
            Ok(())
        };

        if self.is_full() {
            return write!(f, "[any]");
        }

        let mut first = true;
        let mut beg = 0u32;

        write!(f, "[")?;

        while beg < WIDE_MIN {
            while beg < WIDE_MIN && !self.contains(beg) {
                beg += 1;
            }
            if beg >= WIDE_MIN {
                break;
            }

            let mut end = beg;
            while end < WIDE_MIN && self.contains(end) {
                end += 1;
            }

            if !first {
                write!(f, ", ")?;
            }
            show_range(f, beg, end - 1)?;

            beg = end;
            first = false;
        }

        for &(lo, hi) in &self.wide {
            if !first {
                write!(f, ", ")?;
            }
            show_range(f, lo, hi)?;
            first = false;
        }

        write!(f, "]")
    }
}
