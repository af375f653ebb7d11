// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::Range;

use crate::backtrack::{Captures, Executor, Search};
use crate::config::{BuilderConfig, ExecConfig};
use crate::error::{BuildError, MatchError};
use crate::input::Input;
use crate::nfa::{Builder, Hir, Nfa};

/// A compiled pattern, ready for forward searches.
#[derive(Debug, Clone)]
pub struct Regex {
    executor: Executor,
}

impl Regex {
    pub fn new(hir: &Hir) -> Result<Self, BuildError> {
        Self::with_config(hir, BuilderConfig::default(), ExecConfig::default())
    }

    pub fn with_config(hir: &Hir, builder: BuilderConfig, exec: ExecConfig) -> Result<Self, BuildError> {
        let nfa = Builder::with_config(builder).build(hir)?;
        Ok(Self { executor: Executor::with_config(nfa, exec) })
    }

    pub fn nfa(&self) -> &Nfa {
        self.executor.nfa()
    }

    pub fn is_match<I: Input + ?Sized>(&self, input: &I) -> Result<bool, MatchError> {
        Ok(self.find(input)?.is_some())
    }

    pub fn find<I: Input + ?Sized>(&self, input: &I) -> Result<Option<Range<usize>>, MatchError> {
        self.find_at(input, 0)
    }

    /// Finds the leftmost match at or after `start`.
    pub fn find_at<I: Input + ?Sized>(&self, input: &I, start: usize) -> Result<Option<Range<usize>>, MatchError> {
        Ok(self.captures_at(input, start)?.and_then(|caps| caps.get(0)))
    }

    pub fn captures<I: Input + ?Sized>(&self, input: &I) -> Result<Option<Captures>, MatchError> {
        self.captures_at(input, 0)
    }

    pub fn captures_at<I: Input + ?Sized>(&self, input: &I, start: usize) -> Result<Option<Captures>, MatchError> {
        self.executor.execute(input, Search::at(start))
    }

    /// Like [`Regex::captures_at`], but the match must begin exactly at `start`.
    pub fn matches_at<I: Input + ?Sized>(&self, input: &I, start: usize) -> Result<Option<Captures>, MatchError> {
        self.executor.execute(input, Search::at(start).anchored(true))
    }

    /// Iterates over successive non-overlapping matches.
    ///
    /// After an empty match the search resumes one unit further, so the iterator
    /// always makes progress. A [`MatchError`] ends the iteration.
    pub fn find_iter<'r, 'i, I: Input + ?Sized>(&'r self, input: &'i I) -> FindIter<'r, 'i, I> {
        FindIter { regex: self, input, pos: 0, done: false }
    }
}

pub struct FindIter<'r, 'i, I: ?Sized> {
    regex: &'r Regex,
    input: &'i I,
    pos: usize,
    done: bool,
}

impl<I: Input + ?Sized> Iterator for FindIter<'_, '_, I> {
    type Item = Result<Range<usize>, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let range = match self.regex.find_at(self.input, self.pos) {
            Ok(Some(range)) => range,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        self.pos = if range.is_empty() { range.end + 1 } else { range.end };
        if self.pos > self.input.len() {
            self.done = true;
        }
        Some(Ok(range))
    }
}
