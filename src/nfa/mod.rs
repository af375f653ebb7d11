// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The NFA graph consumed by the backtracking executor.
//!
//! States live in one `Vec` and refer to each other by [`StateId`]. This keeps the
//! graph free of reference cycles and lets stack frames store a plain integer.
//!
//! ## Shape
//!
//! Every transition carries the character class of the state it leads to: taking
//! a transition consumes one input unit. The two final states are sinks:
//!
//! - the *anchored* final state is only reachable at the end of input,
//! - the *unanchored* final state ends the match wherever it's reached.
//!
//! Transitions into the unanchored final state match any unit, so that the executor
//! can treat them uniformly while scanning. At the end of input, the first-declared
//! transition into either final state is taken instead.
//!
//! ## Gotchas
//!
//! - Transition order is priority order. The first-declared transition wins.
//! - Loop-back transitions (`.*?` prefix of a search) must be declared last,
//!   otherwise the search isn't leftmost.

mod builder;
mod groups;

use std::fmt;
use std::fmt::Write as _;

pub use self::builder::{Builder, Hir};
pub use self::groups::{GroupBoundaries, GroupOp, UNSET};
use crate::charset::CharSet;
use crate::error::NfaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(u32);

impl StateId {
    pub fn new(index: usize) -> Result<Self, NfaError> {
        u32::try_from(index).map(StateId).map_err(|_| NfaError::TooManyStates)
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Inner,
    AnchoredFinal,
    UnanchoredFinal,
}

#[derive(Debug, Clone)]
pub struct Transition {
    target: StateId,
    char_set: CharSet,
    groups: GroupBoundaries,
    loop_back: bool,
}

impl Transition {
    pub fn new(target: StateId, char_set: CharSet, groups: GroupBoundaries) -> Self {
        Self { target, char_set, groups, loop_back: false }
    }

    /// Marks this as the search loop of an initial state. Loop-backs are skipped
    /// by anchored matches.
    pub fn with_loop_back(mut self) -> Self {
        self.loop_back = true;
        self
    }

    #[inline(always)]
    pub fn target(&self) -> StateId {
        self.target
    }

    #[inline(always)]
    pub fn char_set(&self) -> &CharSet {
        &self.char_set
    }

    #[inline(always)]
    pub fn groups(&self) -> &GroupBoundaries {
        &self.groups
    }

    #[inline(always)]
    pub fn is_loop_back(&self) -> bool {
        self.loop_back
    }
}

#[derive(Debug, Clone)]
pub struct NfaState {
    id: StateId,
    kind: StateKind,
    transitions: Vec<Transition>,
    // Index of the first transition into a final state. Filled in by `Nfa::new`.
    final_transition: Option<usize>,
}

impl NfaState {
    pub fn new(id: StateId, kind: StateKind, transitions: Vec<Transition>) -> Self {
        Self { id, kind, transitions, final_transition: None }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    #[inline(always)]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[inline(always)]
    pub fn is_final(&self) -> bool {
        self.kind != StateKind::Inner
    }

    #[inline(always)]
    pub fn is_anchored_final(&self) -> bool {
        self.kind == StateKind::AnchoredFinal
    }

    #[inline(always)]
    pub fn is_unanchored_final(&self) -> bool {
        self.kind == StateKind::UnanchoredFinal
    }

    /// The transition to take when the input is exhausted, if any.
    #[inline(always)]
    pub fn final_transition(&self) -> Option<usize> {
        self.final_transition
    }
}

/// An immutable, validated NFA. Safe to share between threads.
#[derive(Debug, Clone)]
pub struct Nfa {
    states: Vec<NfaState>,
    anchored_entry: Vec<Option<StateId>>,
    unanchored_entry: Vec<Option<StateId>>,
    group_count: usize,
    sticky: bool,
    initial_loop_back: bool,
}

impl Nfa {
    /// Validates and freezes a graph.
    ///
    /// The entry tables are indexed by the distance of the start offset from the
    /// lowest possible start (0 when going forward, the input length when going
    /// backward). The anchored table is used at distance 0, so only its first
    /// element is ever read. The unanchored table starts at distance 1: element
    /// `i` is the entry for distance `i + 1`. Distances past the end of a table
    /// use its last element.
    /// `group_count` includes the implicit group 0.
    pub fn new(
        mut states: Vec<NfaState>,
        anchored_entry: Vec<Option<StateId>>,
        unanchored_entry: Vec<Option<StateId>>,
        group_count: usize,
        sticky: bool,
        initial_loop_back: bool,
    ) -> Result<Self, NfaError> {
        if group_count == 0 {
            return Err(NfaError::NoGroups);
        }
        if anchored_entry.iter().chain(unanchored_entry.iter()).all(Option::is_none) {
            return Err(NfaError::MissingEntry);
        }

        for &entry in anchored_entry.iter().chain(unanchored_entry.iter()).flatten() {
            if entry.index() >= states.len() {
                return Err(NfaError::EntryOutOfRange { state: entry.index() });
            }
        }

        let slots = 2 * group_count;
        let kinds: Vec<StateKind> = states.iter().map(|s| s.kind).collect();

        for (position, state) in states.iter_mut().enumerate() {
            if state.id.index() != position {
                return Err(NfaError::StateIdMismatch { position, id: state.id.index() });
            }
            if state.is_final() && !state.transitions.is_empty() {
                return Err(NfaError::FinalStateHasTransitions { state: position });
            }

            for t in &state.transitions {
                let target = t.target.index();
                if target >= kinds.len() {
                    return Err(NfaError::TargetOutOfRange { state: position, target });
                }
                if let Some(slot) = t.groups.max_slot() {
                    if slot as usize >= slots {
                        return Err(NfaError::GroupSlotOutOfRange { state: position, slot });
                    }
                }
            }

            state.final_transition =
                state.transitions.iter().position(|t| kinds[t.target.index()] != StateKind::Inner);
        }

        Ok(Self { states, anchored_entry, unanchored_entry, group_count, sticky, initial_loop_back })
    }

    #[inline(always)]
    pub fn state(&self, id: StateId) -> &NfaState {
        &self.states[id.index()]
    }

    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    /// Number of capture groups, including group 0.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky
    }

    /// Whether unanchored searches may follow loop-back transitions.
    pub fn loop_back_enabled(&self) -> bool {
        self.initial_loop_back && !self.sticky
    }

    /// Picks the entry state for a match starting `distance` units away from the
    /// lowest possible start offset.
    pub fn entry(&self, distance: usize) -> Option<StateId> {
        let (table, slot) = match distance.checked_sub(1) {
            None => (&self.anchored_entry, 0),
            Some(slot) => (&self.unanchored_entry, slot),
        };
        let last = table.len().checked_sub(1)?;
        table[slot.min(last)]
    }

    /// A mermaid flowchart of the graph, for debugging.
    pub fn as_mermaid(&self) -> String {
        let mut output = String::new();
        output.push_str("flowchart LR\n");

        for (i, entry) in self.anchored_entry.iter().enumerate() {
            if let Some(entry) = entry {
                _ = writeln!(output, "  a{i}@{{shape: start}} -->|anchored {i}| {entry}");
            }
        }
        for (i, entry) in self.unanchored_entry.iter().enumerate() {
            if let Some(entry) = entry {
                _ = writeln!(output, "  u{i}@{{shape: start}} -->|unanchored {i}| {entry}");
            }
        }

        for state in &self.states {
            let shape = match state.kind {
                StateKind::Inner => format!("[{}]", state.id),
                StateKind::AnchoredFinal => format!("((\"{} $\"))", state.id),
                StateKind::UnanchoredFinal => format!("(({}))", state.id),
            };
            _ = writeln!(output, "  {}{shape}", state.id);

            for t in &state.transitions {
                let mut label = format!("{:?}", t.char_set).replace('"', "&quot;");
                if !t.groups.is_empty() {
                    _ = write!(label, " {}", t.groups);
                }
                let arrow = if t.loop_back { "-.->" } else { "-->" };
                _ = writeln!(output, "  {} {arrow}|\"{label}\"| {}", state.id, t.target);
            }
        }

        output
    }
}

impl fmt::Display for Nfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "groups: {}", self.group_count)?;
        writeln!(f, "anchored entry: {:?}", self.anchored_entry)?;
        writeln!(f, "unanchored entry: {:?}", self.unanchored_entry)?;

        for state in &self.states {
            let suffix = match state.kind {
                StateKind::Inner => "",
                StateKind::AnchoredFinal => " (final, anchored)",
                StateKind::UnanchoredFinal => " (final)",
            };
            writeln!(f, "{}{suffix}:", state.id)?;

            for t in &state.transitions {
                write!(f, "  -> {} {:?}", t.target, t.char_set)?;
                if !t.groups.is_empty() {
                    write!(f, " {}", t.groups)?;
                }
                if t.loop_back {
                    write!(f, " loop")?;
                }
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> StateId {
        StateId::new(i).unwrap()
    }

    fn literal_a() -> Vec<NfaState> {
        vec![
            NfaState::new(
                id(0),
                StateKind::Inner,
                vec![Transition::new(
                    id(1),
                    CharSet::single('a' as u32),
                    GroupBoundaries::new(vec![0], vec![]),
                )],
            ),
            NfaState::new(
                id(1),
                StateKind::Inner,
                vec![Transition::new(id(2), CharSet::yes(), GroupBoundaries::new(vec![1], vec![]))],
            ),
            NfaState::new(id(2), StateKind::UnanchoredFinal, vec![]),
        ]
    }

    #[test]
    fn valid_graph() {
        let nfa = Nfa::new(literal_a(), vec![Some(id(0))], vec![None], 1, false, true).unwrap();
        assert_eq!(nfa.entry(0), Some(id(0)));
        assert_eq!(nfa.entry(5), None);
        assert_eq!(nfa.state(id(1)).final_transition(), Some(0));
        assert_eq!(nfa.state(id(0)).final_transition(), None);
        assert!(nfa.state(id(2)).is_unanchored_final());
    }

    #[test]
    fn entry_table_clamps() {
        let nfa = Nfa::new(literal_a(), vec![Some(id(0))], vec![Some(id(1)), Some(id(0))], 1, false, true)
            .unwrap();
        assert_eq!(nfa.entry(0), Some(id(0)));
        // The first unanchored slot belongs to distance 1.
        assert_eq!(nfa.entry(1), Some(id(1)));
        assert_eq!(nfa.entry(2), Some(id(0)));
        assert_eq!(nfa.entry(100), Some(id(0)));

        let nfa = Nfa::new(literal_a(), vec![Some(id(0))], vec![Some(id(1))], 1, false, true).unwrap();
        assert_eq!(nfa.entry(1), Some(id(1)));
        assert_eq!(nfa.entry(7), Some(id(1)));
    }

    #[test]
    fn rejects_malformed_graphs() {
        assert_eq!(
            Nfa::new(literal_a(), vec![None], vec![None], 1, false, true).unwrap_err(),
            NfaError::MissingEntry
        );
        assert_eq!(
            Nfa::new(literal_a(), vec![Some(id(7))], vec![], 1, false, true).unwrap_err(),
            NfaError::EntryOutOfRange { state: 7 }
        );
        assert_eq!(
            Nfa::new(literal_a(), vec![Some(id(0))], vec![], 0, false, true).unwrap_err(),
            NfaError::NoGroups
        );

        let mut states = literal_a();
        states[1] = NfaState::new(
            id(1),
            StateKind::Inner,
            vec![Transition::new(id(9), CharSet::yes(), GroupBoundaries::default())],
        );
        assert_eq!(
            Nfa::new(states, vec![Some(id(0))], vec![], 1, false, true).unwrap_err(),
            NfaError::TargetOutOfRange { state: 1, target: 9 }
        );

        let mut states = literal_a();
        states[1] = NfaState::new(
            id(1),
            StateKind::Inner,
            vec![Transition::new(id(2), CharSet::yes(), GroupBoundaries::new(vec![2], vec![]))],
        );
        assert_eq!(
            Nfa::new(states, vec![Some(id(0))], vec![], 1, false, true).unwrap_err(),
            NfaError::GroupSlotOutOfRange { state: 1, slot: 2 }
        );

        let mut states = literal_a();
        states[2] = NfaState::new(
            id(2),
            StateKind::UnanchoredFinal,
            vec![Transition::new(id(0), CharSet::yes(), GroupBoundaries::default())],
        );
        assert_eq!(
            Nfa::new(states, vec![Some(id(0))], vec![], 1, false, true).unwrap_err(),
            NfaError::FinalStateHasTransitions { state: 2 }
        );

        let mut states = literal_a();
        states.swap(0, 1);
        assert_eq!(
            Nfa::new(states, vec![Some(id(0))], vec![], 1, false, true).unwrap_err(),
            NfaError::StateIdMismatch { position: 0, id: 1 }
        );
    }

    #[test]
    fn sticky_disables_loop_back() {
        let nfa = Nfa::new(literal_a(), vec![Some(id(0))], vec![], 1, true, true).unwrap();
        assert!(!nfa.loop_back_enabled());
        assert!(nfa.is_sticky());
    }

    #[test]
    fn dumps() {
        let nfa = Nfa::new(literal_a(), vec![Some(id(0))], vec![], 1, false, true).unwrap();
        let text = nfa.to_string();
        assert!(text.contains("s0:\n  -> s1 [a] {(0}\n"), "{text}");
        assert!(text.contains("s2 (final):"), "{text}");

        let mermaid = nfa.as_mermaid();
        assert!(mermaid.starts_with("flowchart LR\n"));
        assert!(mermaid.contains("s1 -->|\"[any] {)0}\"| s2"), "{mermaid}");
    }
}
