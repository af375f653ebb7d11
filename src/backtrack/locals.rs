// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-call match state: the backtracking stack and the result slot.
//!
//! The stack is one flat `Vec<isize>` of fixed-size frames:
//!
//! ```text
//! | index | state | boundaries[0] ... boundaries[2 * groups - 1] |
//! ```
//!
//! The live frame always sits at `stack[sp..sp + frame]`. Everything below `sp`
//! is a saved continuation. Pushing copies the live frame one slot up and turns
//! the old slot into the continuation, so a pop is nothing more than `sp -= frame`.

use super::{Captures, MatchStats};
use crate::error::MatchError;
use crate::nfa::{GroupBoundaries, StateId, UNSET};

const INDEX: usize = 0;
const STATE: usize = 1;
const BOUNDARIES: usize = 2;

pub(super) struct Locals {
    stack: Vec<isize>,
    sp: usize,
    frame: usize,
    step: isize,
    result: Vec<isize>,
    last_result_sp: Option<usize>,
    max_frames: Option<usize>,
    pub(super) stats: MatchStats,
}

impl Locals {
    pub fn new(group_count: usize, initial_frames: usize, max_frames: Option<usize>, step: isize) -> Self {
        let frame = BOUNDARIES + 2 * group_count;
        let initial_frames = initial_frames.max(2);
        Self {
            stack: vec![UNSET; frame * initial_frames],
            sp: 0,
            frame,
            step,
            result: vec![UNSET; 2 * group_count],
            last_result_sp: None,
            max_frames,
            stats: MatchStats::default(),
        }
    }

    /// Resets the live frame to `state` at `index` with all boundaries unset.
    pub fn start(&mut self, index: isize, state: StateId) {
        self.sp = 0;
        self.last_result_sp = None;
        self.stack[..self.frame].fill(UNSET);
        self.stack[STATE] = state.index() as isize;
        self.set_index(index);
    }

    #[inline(always)]
    pub fn index(&self) -> isize {
        self.stack[self.sp + INDEX]
    }

    #[inline(always)]
    pub fn set_index(&mut self, index: isize) {
        self.stack[self.sp + INDEX] = index;
    }

    #[inline(always)]
    pub fn step_index(&mut self) {
        self.stack[self.sp + INDEX] += self.step;
    }

    #[inline(always)]
    pub fn state(&self) -> usize {
        self.stack[self.sp + STATE] as usize
    }

    /// Moves the live frame along a transition: records its boundaries at the
    /// current index, then consumes one unit.
    #[inline]
    pub fn take(&mut self, target: StateId, groups: &GroupBoundaries) {
        let sp = self.sp;
        let index = self.stack[sp + INDEX];
        groups.apply(&mut self.stack[sp + BOUNDARIES..sp + self.frame], index);
        self.stack[sp + STATE] = target.index() as isize;
        self.step_index();
    }

    /// Number of saved continuations.
    #[inline(always)]
    pub fn depth(&self) -> usize {
        self.sp / self.frame
    }

    /// Saves "take `target` from `index`" as a continuation below the live frame.
    pub fn push(&mut self, target: StateId, groups: &GroupBoundaries, index: isize) -> Result<(), MatchError> {
        if let Some(max) = self.max_frames {
            if self.depth() >= max {
                log::debug!("backtracking stack limit of {max} frames hit");
                return Err(MatchError::StackLimitExceeded { frames: max });
            }
        }

        let frame = self.frame;
        if self.stack.len() < self.sp + 2 * frame {
            self.grow();
        }

        let sp = self.sp;
        self.stack.copy_within(sp..sp + frame, sp + frame);

        let saved = &mut self.stack[sp..sp + frame];
        groups.apply(&mut saved[BOUNDARIES..], index);
        saved[INDEX] = index + self.step;
        saved[STATE] = target.index() as isize;

        self.sp += frame;
        self.stats.pushes += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.depth());
        Ok(())
    }

    /// Makes the most recent continuation live again and returns its state.
    pub fn pop(&mut self) -> Option<usize> {
        if self.sp == 0 {
            return None;
        }
        self.sp -= self.frame;
        self.stats.pops += 1;
        Some(self.state())
    }

    /// Records a match that is only to be reported once every higher priority
    /// alternative explored from the current depth has failed.
    pub fn push_result(&mut self, groups: &GroupBoundaries) {
        let sp = self.sp;
        let index = self.stack[sp + INDEX];
        self.result.copy_from_slice(&self.stack[sp + BOUNDARIES..sp + self.frame]);
        groups.apply(&mut self.result, index);
        self.last_result_sp = Some(sp);
        self.stats.result_pushes += 1;
    }

    #[inline(always)]
    pub fn can_pop_result(&self) -> bool {
        self.last_result_sp == Some(self.sp)
    }

    pub fn pop_result(&mut self) -> Captures {
        self.last_result_sp = None;
        Captures::new(self.result.clone())
    }

    pub fn live_captures(&self) -> Captures {
        Captures::new(self.stack[self.sp + BOUNDARIES..self.sp + self.frame].to_vec())
    }

    pub fn finish(&mut self) -> MatchStats {
        self.stats.final_depth = self.depth();
        self.stats
    }

    fn grow(&mut self) {
        let len = self.stack.len() * 2;
        log::trace!("growing backtracking stack to {} frames", len / self.frame);
        self.stack.resize(len, UNSET);
        self.stats.grows += 1;
    }
}
