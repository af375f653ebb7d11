// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The backtracking executor.
//!
//! ## Algorithm
//!
//! At every step the transitions of the current state are scanned against the
//! next input unit. The scan goes from the last-declared transition to the first
//! and keeps a single "held" candidate: whenever another transition matches, the
//! held one is saved on the stack and the new one is held instead. After the scan
//! the held candidate is the first-declared match and is taken, while the others
//! sit on the stack in the order they'll be retried. This gives leftmost-first
//! (Perl/ECMAScript) semantics.
//!
//! A displaced candidate that leads straight into the unanchored final state isn't
//! a continuation, it's a finished match of lower priority. It goes into the
//! result slot instead, tagged with the current stack depth. When backtracking
//! later unwinds to exactly that depth, every higher priority path has failed and
//! the stored result is returned.
//!
//! ## Gotchas
//!
//! - Index `i` going backward reads the unit at `i - 1`.
//! - The index is stepped even when the transition leads into a final state. The
//!   capture boundaries have been recorded by then, so this is unobservable.
//! - Without limits in [`ExecConfig`], patterns like `(a|a)*b` take exponential time.

mod locals;

use std::fmt;
use std::ops::Range;

use self::locals::Locals;
use crate::charset::CharPredicate;
use crate::config::ExecConfig;
use crate::error::MatchError;
use crate::input::Input;
use crate::nfa::{Nfa, Transition, UNSET};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    /// Right-to-left, for look-behind. Use an NFA from [`crate::Builder::build_reverse`].
    Backward,
}

impl Direction {
    #[inline(always)]
    pub fn step(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// Where and how to look for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Search {
    /// Index to start at. Going backward, this is the exclusive end of the match.
    pub start: usize,
    /// Only accept matches beginning exactly at `start`.
    pub anchored: bool,
    pub direction: Direction,
}

impl Search {
    pub fn at(start: usize) -> Self {
        Self { start, anchored: false, direction: Direction::Forward }
    }

    pub fn anchored(mut self, yes: bool) -> Self {
        self.anchored = yes;
        self
    }

    pub fn backward(mut self) -> Self {
        self.direction = Direction::Backward;
        self
    }
}

/// Capture group offsets of a successful match. Slot `2 * g` is the start of group
/// `g`, slot `2 * g + 1` its end. Groups that didn't participate hold `-1`.
#[derive(Clone, PartialEq, Eq)]
pub struct Captures {
    slots: Vec<isize>,
}

impl Captures {
    pub(crate) fn new(slots: Vec<isize>) -> Self {
        Self { slots }
    }

    /// Number of groups, including group 0.
    pub fn group_count(&self) -> usize {
        self.slots.len() / 2
    }

    pub fn get(&self, group: usize) -> Option<Range<usize>> {
        let slot = group.checked_mul(2)?;
        let start = *self.slots.get(slot)?;
        let end = *self.slots.get(slot + 1)?;
        if start == UNSET || end == UNSET {
            return None;
        }
        Some(start as usize..end as usize)
    }

    pub fn as_slots(&self) -> &[isize] {
        &self.slots
    }
}

impl fmt::Debug for Captures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.slots)
    }
}

/// Counters collected during one match call.
///
/// `pushes == pops + final_depth` always holds: every continuation is either
/// popped again or still on the stack when the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchStats {
    pub steps: u64,
    pub pushes: u64,
    pub pops: u64,
    pub result_pushes: u64,
    pub max_depth: usize,
    pub final_depth: usize,
    pub grows: u32,
}

/// Runs searches against one NFA. Cheap to share: every call allocates its own stack.
#[derive(Debug, Clone)]
pub struct Executor {
    nfa: Nfa,
    config: ExecConfig,
}

impl Executor {
    pub fn new(nfa: Nfa) -> Self {
        Self::with_config(nfa, ExecConfig::default())
    }

    pub fn with_config(nfa: Nfa, config: ExecConfig) -> Self {
        Self { nfa, config }
    }

    pub fn nfa(&self) -> &Nfa {
        &self.nfa
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Returns `Ok(None)` if there is no match. Errors only occur if a limit was configured.
    pub fn execute<I: Input + ?Sized>(&self, input: &I, search: Search) -> Result<Option<Captures>, MatchError> {
        self.execute_with_stats(input, search).0
    }

    pub fn execute_with_stats<I: Input + ?Sized>(
        &self,
        input: &I,
        search: Search,
    ) -> (Result<Option<Captures>, MatchError>, MatchStats) {
        let mut locals = Locals::new(
            self.nfa.group_count(),
            self.config.initial_stack_frames,
            self.config.max_stack_frames,
            search.direction.step(),
        );

        log::debug!(
            "match start: {} units, start {}, {:?}{}",
            input.len(),
            search.start,
            search.direction,
            if search.anchored { ", anchored" } else { "" }
        );

        let result = self.run(input, search, &mut locals);
        let stats = locals.finish();

        match &result {
            Ok(Some(captures)) => log::debug!("match found: {captures:?} after {} steps", stats.steps),
            Ok(None) => log::debug!("no match after {} steps", stats.steps),
            Err(err) => log::debug!("match aborted: {err}"),
        }

        (result, stats)
    }

    fn run<I: Input + ?Sized>(
        &self,
        input: &I,
        search: Search,
        locals: &mut Locals,
    ) -> Result<Option<Captures>, MatchError> {
        let len = input.len();
        if search.start > len {
            return Ok(None);
        }

        let distance = match search.direction {
            Direction::Forward => search.start,
            Direction::Backward => len - search.start,
        };
        let Some(entry) = self.nfa.entry(distance) else {
            return Ok(None);
        };

        let allow_loop_back = !search.anchored && self.nfa.loop_back_enabled();
        let states = self.nfa.states();
        locals.start(search.start as isize, entry);

        loop {
            locals.stats.steps += 1;
            if let Some(limit) = self.config.step_limit {
                if locals.stats.steps > limit {
                    log::debug!("step limit of {limit} hit");
                    return Err(MatchError::StepLimitExceeded { steps: limit });
                }
            }

            let state = &states[locals.state()];
            if state.is_final() {
                return Ok(Some(locals.live_captures()));
            }

            let index = locals.index();
            let unit = match search.direction {
                Direction::Forward if (index as usize) < len => Some(input.char_at(index as usize)),
                Direction::Backward if index > 0 => Some(input.char_at(index as usize - 1)),
                _ => None,
            };

            let next = match unit {
                Some(c) => {
                    let mut held: Option<&Transition> = None;

                    for t in state.transitions().iter().rev() {
                        if t.is_loop_back() && !allow_loop_back {
                            continue;
                        }
                        let target = &states[t.target().index()];
                        if target.is_anchored_final() || !t.char_set().matches(c) {
                            continue;
                        }

                        if let Some(prev) = held.replace(t) {
                            if states[prev.target().index()].is_unanchored_final() {
                                locals.push_result(prev.groups());
                            } else {
                                locals.push(prev.target(), prev.groups(), index)?;
                            }
                        }
                    }

                    held
                }
                None => state.final_transition().map(|i| &state.transitions()[i]),
            };

            if let Some(t) = next {
                locals.take(t.target(), t.groups());
                continue;
            }

            if locals.can_pop_result() {
                return Ok(Some(locals.pop_result()));
            }
            match locals.pop() {
                Some(state) => log::trace!("backtrack to s{state} at {}", locals.index()),
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::CharSet;
    use crate::config::BuilderConfig;
    use crate::nfa::{Builder, GroupBoundaries, Hir, NfaState, StateId, StateKind};

    fn executor(hir: &Hir) -> Executor {
        Executor::new(Builder::new().build(hir).unwrap())
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn find(hir: &Hir, input: &str) -> Option<Vec<isize>> {
        executor(hir).execute(input, Search::at(0)).unwrap().map(|c| c.as_slots().to_vec())
    }

    #[test]
    fn leftmost_first() {
        let hir = Hir::alt(vec![Hir::literal("a"), Hir::literal("ab")]);
        assert_eq!(find(&hir, "ab"), Some(vec![0, 1]));

        let hir = Hir::concat(vec![Hir::alt(vec![Hir::literal("a"), Hir::literal("ab")]), Hir::End]);
        assert_eq!(find(&hir, "ab"), Some(vec![0, 2]));

        let hir = Hir::alt(vec![Hir::literal("ab"), Hir::literal("a")]);
        assert_eq!(find(&hir, "ab"), Some(vec![0, 2]));
    }

    #[test]
    fn unanchored_search() {
        let exec = executor(&Hir::literal("bc"));
        let (result, stats) = exec.execute_with_stats("abcabc", Search::at(0));
        assert_eq!(result.unwrap().unwrap().as_slots(), &[1, 3]);
        assert_eq!(stats.pushes, stats.pops + stats.final_depth as u64);

        let (result, _) = exec.execute_with_stats("abcabc", Search::at(2));
        assert_eq!(result.unwrap().unwrap().as_slots(), &[4, 6]);

        let result = exec.execute("abcabc", Search::at(0).anchored(true));
        assert_eq!(result, Ok(None));
        let result = exec.execute("abcabc", Search::at(1).anchored(true));
        assert_eq!(result.unwrap().unwrap().get(0), Some(1..3));
    }

    #[test]
    fn no_match_empties_the_stack() {
        let exec = executor(&Hir::literal("xyz"));
        let (result, stats) = exec.execute_with_stats("abc", Search::at(0));
        assert_eq!(result, Ok(None));
        assert_eq!(stats.final_depth, 0);
        assert_eq!(stats.pushes, stats.pops);
    }

    #[test]
    fn stored_result_after_failed_alternative() {
        // `a(?:bc)?` on "abx": the optional `bc` is preferred, fails at `x`, and the
        // match ending after `a` that was set aside before trying it is returned.
        let hir = Hir::concat(vec![Hir::literal("a"), Hir::optional(Hir::literal("bc"))]);
        let (result, stats) = executor(&hir).execute_with_stats("abx", Search::at(0));
        assert_eq!(result.unwrap().unwrap().as_slots(), &[0, 1]);
        assert_eq!(stats.result_pushes, 1);
        assert_eq!(stats.pushes, stats.pops + stats.final_depth as u64);

        // With captures, the stored result keeps the boundaries it had when set aside.
        let hir = Hir::concat(vec![
            Hir::capture(Hir::literal("a")),
            Hir::optional(Hir::capture(Hir::literal("bc"))),
        ]);
        let (result, stats) = executor(&hir).execute_with_stats("xabd", Search::at(0));
        assert_eq!(result.unwrap().unwrap().as_slots(), &[1, 2, 1, 2, -1, -1]);
        assert_eq!(stats.result_pushes, 1);
    }

    #[test]
    fn unset_groups() {
        let hir = Hir::alt(vec![Hir::capture(Hir::literal("a")), Hir::capture(Hir::literal("b"))]);
        let caps = executor(&hir).execute("b", Search::at(0)).unwrap().unwrap();
        assert_eq!(caps.as_slots(), &[0, 1, -1, -1, 0, 1]);
        assert_eq!(caps.group_count(), 3);
        assert_eq!(caps.get(1), None);
        assert_eq!(caps.get(2), Some(0..1));
        assert_eq!(caps.get(3), None);
        assert_eq!(caps.get(usize::MAX), None);
        assert_eq!(caps.get(usize::MAX / 2), None);
    }

    #[test]
    fn deterministic() {
        let hir = Hir::concat(vec![
            Hir::star(Hir::capture(Hir::alt(vec![Hir::literal("a"), Hir::literal("ab")]))),
            Hir::literal("c"),
        ]);
        let exec = executor(&hir);
        let first = exec.execute_with_stats("xxababac abc", Search::at(0));
        for _ in 0..10 {
            assert_eq!(exec.execute_with_stats("xxababac abc", Search::at(0)), first);
        }
        assert_eq!(first.0.unwrap().unwrap().as_slots(), &[2, 8, 6, 7]);
    }

    #[test]
    fn quantifiers() {
        let greedy = Hir::star(Hir::literal("a"));
        assert_eq!(find(&greedy, "aaa"), Some(vec![0, 3]));
        assert_eq!(find(&greedy, "baa"), Some(vec![0, 0]));

        let lazy = Hir::concat(vec![Hir::plus(Hir::Any).lazy(), Hir::literal("b")]);
        assert_eq!(find(&lazy, "aabab"), Some(vec![0, 3]));
        let greedy = Hir::concat(vec![Hir::plus(Hir::Any), Hir::literal("b")]);
        assert_eq!(find(&greedy, "aabab"), Some(vec![0, 5]));

        let bounded = Hir::repeat(Hir::literal("a"), 2, Some(3));
        assert_eq!(find(&bounded, "aaaa"), Some(vec![0, 3]));
        assert_eq!(find(&bounded, "a"), None);
    }

    #[test]
    fn captures_reset_per_iteration() {
        let hir = Hir::star(Hir::alt(vec![Hir::capture(Hir::literal("a")), Hir::literal("b")]));
        assert_eq!(find(&hir, "ab"), Some(vec![0, 2, -1, -1]));
        assert_eq!(find(&hir, "ba"), Some(vec![0, 2, 1, 2]));
    }

    #[test]
    fn anchors() {
        let hir = Hir::concat(vec![Hir::Start, Hir::literal("a")]);
        assert_eq!(find(&hir, "ba"), None);
        assert_eq!(find(&hir, "ab"), Some(vec![0, 1]));

        let hir = Hir::concat(vec![Hir::literal("a"), Hir::End]);
        assert_eq!(find(&hir, "aba"), Some(vec![2, 3]));

        let empty = Hir::concat(vec![Hir::Start, Hir::End]);
        assert_eq!(find(&empty, ""), Some(vec![0, 0]));
        assert_eq!(find(&empty, "a"), None);
    }

    #[test]
    fn sticky() {
        let nfa = Builder::with_config(BuilderConfig::new().sticky(true)).build(&Hir::literal("b")).unwrap();
        let exec = Executor::new(nfa);
        assert_eq!(exec.execute("ab", Search::at(0)), Ok(None));
        assert_eq!(exec.execute("ab", Search::at(1)).unwrap().unwrap().get(0), Some(1..2));
    }

    #[test]
    fn backward() {
        let hir = Hir::concat(vec![Hir::capture(Hir::literal("a")), Hir::literal("b")]);
        let exec = Executor::new(Builder::new().build_reverse(&hir).unwrap());
        let input = chars("xabab");

        let caps = exec.execute(&input[..], Search::at(5).backward()).unwrap().unwrap();
        assert_eq!(caps.as_slots(), &[3, 5, 3, 4]);

        let caps = exec.execute(&input[..], Search::at(4).backward()).unwrap().unwrap();
        assert_eq!(caps.as_slots(), &[1, 3, 1, 2]);

        assert_eq!(exec.execute(&input[..], Search::at(4).backward().anchored(true)), Ok(None));
        assert_eq!(exec.execute(&input[..], Search::at(1).backward()), Ok(None));
    }

    #[test]
    fn backward_anchors() {
        // `^a` read right-to-left: the `a` must be the first unit.
        let hir = Hir::concat(vec![Hir::Start, Hir::literal("a")]);
        let exec = Executor::new(Builder::new().build_reverse(&hir).unwrap());
        assert_eq!(exec.execute("aa", Search::at(2).backward()).unwrap().unwrap().get(0), Some(0..1));

        let hir = Hir::concat(vec![Hir::literal("a"), Hir::End]);
        let exec = Executor::new(Builder::new().build_reverse(&hir).unwrap());
        assert_eq!(exec.execute("aab", Search::at(3).backward()), Ok(None));
        assert_eq!(exec.execute("aba", Search::at(3).backward()).unwrap().unwrap().get(0), Some(2..3));
    }

    #[test]
    fn growth_preserves_continuations() {
        let hir = Hir::concat(vec![
            Hir::star(Hir::alt(vec![Hir::literal("a"), Hir::literal("a")])),
            Hir::literal("b"),
        ]);
        let nfa = Builder::new().build(&hir).unwrap();
        let exec = Executor::with_config(nfa, ExecConfig::new().initial_stack_frames(2));

        let input = format!("{}b", "a".repeat(200));
        let (result, stats) = exec.execute_with_stats(input.as_str(), Search::at(0));
        assert_eq!(result.unwrap().unwrap().get(0), Some(0..201));
        assert!(stats.grows > 0);
        assert_eq!(stats.pushes, stats.pops + stats.final_depth as u64);
    }

    #[test]
    fn limits() {
        let hir = Hir::concat(vec![
            Hir::star(Hir::alt(vec![Hir::literal("a"), Hir::literal("a")])),
            Hir::literal("b"),
        ]);
        let input = "a".repeat(30);

        let nfa = Builder::new().build(&hir).unwrap();
        let exec = Executor::with_config(nfa.clone(), ExecConfig::new().step_limit(Some(10_000)));
        assert_eq!(exec.execute(input.as_str(), Search::at(0)), Err(MatchError::StepLimitExceeded { steps: 10_000 }));

        let exec = Executor::with_config(nfa, ExecConfig::new().max_stack_frames(Some(8)));
        assert_eq!(exec.execute(input.as_str(), Search::at(0)), Err(MatchError::StackLimitExceeded { frames: 8 }));
    }

    #[test]
    fn start_out_of_range() {
        assert_eq!(executor(&Hir::Empty).execute("ab", Search::at(3)), Ok(None));
        assert_eq!(executor(&Hir::Empty).execute("ab", Search::at(2)).unwrap().unwrap().get(0), Some(2..2));
    }

    #[test]
    fn hand_built_graph() {
        // s0 -a-> s1 -any-> s2 (final), with group 0 around `a`.
        let id = |i| StateId::new(i).unwrap();
        let states = vec![
            NfaState::new(
                id(0),
                StateKind::Inner,
                vec![Transition::new(id(1), CharSet::single('a' as u32), GroupBoundaries::new(vec![0], vec![]))],
            ),
            NfaState::new(
                id(1),
                StateKind::Inner,
                vec![Transition::new(id(2), CharSet::yes(), GroupBoundaries::new(vec![1], vec![]))],
            ),
            NfaState::new(id(2), StateKind::UnanchoredFinal, vec![]),
        ];
        let nfa = Nfa::new(states, vec![Some(id(0))], vec![None], 1, false, false).unwrap();
        let exec = Executor::new(nfa);

        let input: Vec<u16> = "ab".encode_utf16().collect();
        assert_eq!(exec.execute(&input[..], Search::at(0)).unwrap().unwrap().as_slots(), &[0, 1]);
        // The end of input takes the final transition.
        assert_eq!(exec.execute(&input[..1], Search::at(0)).unwrap().unwrap().as_slots(), &[0, 1]);
        assert_eq!(exec.execute(&input[..], Search::at(1)), Ok(None));
    }
}
