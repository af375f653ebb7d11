// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Random-access input sources.
//!
//! Offsets are always in units of the source: bytes for `[u8]`, UTF-16 code units
//! for `[u16]` and code points for `[char]`. The executor never decodes multi-unit
//! sequences; a pattern over `[u16]` sees surrogates as separate units.

/// An indexable sequence of code units.
pub trait Input {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the code unit at `index`. The caller guarantees `index < len()`.
    fn char_at(&self, index: usize) -> u32;

    /// Compares `needle` against the input starting at `index`.
    fn region_matches(&self, index: usize, needle: &[u32]) -> bool {
        if index > self.len() || self.len() - index < needle.len() {
            return false;
        }
        needle.iter().enumerate().all(|(i, &c)| self.char_at(index + i) == c)
    }
}

impl Input for [u8] {
    #[inline]
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    #[inline]
    fn char_at(&self, index: usize) -> u32 {
        self[index] as u32
    }
}

impl Input for [u16] {
    #[inline]
    fn len(&self) -> usize {
        <[u16]>::len(self)
    }

    #[inline]
    fn char_at(&self, index: usize) -> u32 {
        self[index] as u32
    }
}

impl Input for [char] {
    #[inline]
    fn len(&self) -> usize {
        <[char]>::len(self)
    }

    #[inline]
    fn char_at(&self, index: usize) -> u32 {
        self[index] as u32
    }
}

impl Input for str {
    #[inline]
    fn len(&self) -> usize {
        str::len(self)
    }

    #[inline]
    fn char_at(&self, index: usize) -> u32 {
        self.as_bytes()[index] as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units() {
        let bytes: &[u8] = "é".as_bytes();
        assert_eq!(Input::len(bytes), 2);
        assert_eq!(bytes.char_at(0), 0xC3);

        let wide: Vec<u16> = "a😀".encode_utf16().collect();
        assert_eq!(Input::len(wide.as_slice()), 3);
        assert_eq!(wide.char_at(1), 0xD83D);

        let chars: Vec<char> = "a😀".chars().collect();
        assert_eq!(Input::len(chars.as_slice()), 2);
        assert_eq!(chars.char_at(1), 0x1F600);

        assert_eq!(Input::len("abc"), 3);
        assert_eq!("abc".char_at(2), 'c' as u32);
    }

    #[test]
    fn region_matches() {
        let input = "abcabc";
        let bc = ['b' as u32, 'c' as u32];
        assert!(input.region_matches(1, &bc));
        assert!(input.region_matches(4, &bc));
        assert!(!input.region_matches(5, &bc));
        assert!(!input.region_matches(7, &bc));
        assert!(input.region_matches(6, &[]));
        assert!(!input.region_matches(0, &bc));
    }
}
