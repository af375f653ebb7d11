// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pattern tree -> NFA compiler
//!
//! There is no syntax parser here. Patterns arrive as a [`Hir`] tree, built in code or
//! deserialized from JSON, and are compiled with a position (Glushkov) construction:
//! every character class occurrence becomes exactly one NFA state, and a transition
//! into that state consumes one unit of its class. This is the shape the executor
//! expects (see the `nfa` module docs).
//!
//! The compilation runs in two passes:
//!
//! - `lower` resolves literals, classes and case-insensitivity into [`CharSet`]s and
//!   numbers capture groups in order of their opening parenthesis.
//! - `emit` computes, for every sub-pattern, its ordered entry edges and, for each of
//!   its positions, the ordered edges that follow it. An edge may also lead out of the
//!   sub-pattern (`Target::Exit`), in which case concatenation splices in whatever comes next.
//!
//! Edges are kept in priority order all the way through, which is what gives the NFA
//! its leftmost-first semantics. Capture boundaries ride along as [`GroupOp`]s on the edges.
//!
//! # Gotchas
//!
//! - Bounded repetitions are unrolled: `x{2,4}` is emitted as `x x (x (x)?)?`.
//!   Large bounds on large sub-patterns produce large automata.
//! - An iteration of `*`/`+` that consumes nothing is never repeated, so `(a?)*` terminates.
//! - Captures inside a quantifier are reset on every iteration, like in ECMAScript.
//! - `^` and `$` only match at the start and end of the whole input (no multiline mode).
//! - Literals are compiled per code point. Matching a non-ASCII literal against `[u8]`
//!   or `[u16]` input won't work; use `[char]` input for that.

use std::ops::RangeInclusive;

use serde::Deserialize;

use super::{GroupBoundaries, GroupOp, Nfa, NfaState, StateId, StateKind, Transition};
use crate::charset::CharSet;
use crate::config::BuilderConfig;
use crate::error::{BuildError, NfaError};

const ANCHORED_INITIAL: usize = 0;
const UNANCHORED_INITIAL: usize = 1;
const ANCHORED_FINAL: usize = 2;
const UNANCHORED_FINAL: usize = 3;
const FIRST_POSITION: usize = 4;

/// A structured regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hir {
    /// Matches the empty string.
    Empty,
    /// `foo`
    Literal(String),
    /// `[a-z]`, `[^a-z]`. Ranges are inclusive code point pairs.
    Class {
        ranges: Vec<(u32, u32)>,
        #[serde(default)]
        negated: bool,
    },
    /// Any single unit, including line terminators.
    Any,
    /// `ab`
    Concat(Vec<Hir>),
    /// `a|b`
    Alt(Vec<Hir>),
    /// `?`, `*`, `+`, `{n,m}` and their lazy variants. `max: None` means unbounded.
    Repeat {
        inner: Box<Hir>,
        min: u32,
        #[serde(default)]
        max: Option<u32>,
        #[serde(default = "default_greedy")]
        greedy: bool,
    },
    /// `(foo)`
    Capture(Box<Hir>),
    /// `^`
    Start,
    /// `$`
    End,
}

fn default_greedy() -> bool {
    true
}

fn code_point_ranges<I>(ranges: I) -> Vec<(u32, u32)>
where
    I: IntoIterator<Item = RangeInclusive<char>>,
{
    ranges.into_iter().map(|r| (*r.start() as u32, *r.end() as u32)).collect()
}

impl Hir {
    pub fn literal(s: &str) -> Self {
        Hir::Literal(s.to_string())
    }

    pub fn class<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = RangeInclusive<char>>,
    {
        Hir::Class { ranges: code_point_ranges(ranges), negated: false }
    }

    pub fn negated_class<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = RangeInclusive<char>>,
    {
        Hir::Class { ranges: code_point_ranges(ranges), negated: true }
    }

    pub fn concat(parts: Vec<Hir>) -> Self {
        Hir::Concat(parts)
    }

    pub fn alt(alts: Vec<Hir>) -> Self {
        Hir::Alt(alts)
    }

    pub fn capture(inner: Hir) -> Self {
        Hir::Capture(Box::new(inner))
    }

    pub fn repeat(inner: Hir, min: u32, max: Option<u32>) -> Self {
        Hir::Repeat { inner: Box::new(inner), min, max, greedy: true }
    }

    pub fn optional(inner: Hir) -> Self {
        Self::repeat(inner, 0, Some(1))
    }

    pub fn star(inner: Hir) -> Self {
        Self::repeat(inner, 0, None)
    }

    pub fn plus(inner: Hir) -> Self {
        Self::repeat(inner, 1, None)
    }

    /// Turns a greedy repetition into a lazy one. Other nodes are returned unchanged.
    pub fn lazy(self) -> Self {
        match self {
            Hir::Repeat { inner, min, max, .. } => Hir::Repeat { inner, min, max, greedy: false },
            hir => hir,
        }
    }
}

/// Compiles [`Hir`] trees into [`Nfa`]s.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: BuilderConfig,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Builds an NFA for forward matching.
    pub fn build(&self, hir: &Hir) -> Result<Nfa, BuildError> {
        self.build_directed(hir, false)
    }

    /// Builds an NFA that matches `hir` right-to-left, for use with
    /// [`crate::Direction::Backward`] (look-behind). Capture offsets are still
    /// reported as regular `start..end` pairs.
    pub fn build_reverse(&self, hir: &Hir) -> Result<Nfa, BuildError> {
        self.build_directed(hir, true)
    }

    fn build_directed(&self, hir: &Hir, reverse: bool) -> Result<Nfa, BuildError> {
        let mut lowering = Lowering { ignore_case: self.config.ignore_case, next_group: 1 };
        let inner = lowering.lower(hir)?;
        let root = Node::Capture { index: 0, inner: Box::new(inner) };
        let group_count = lowering.next_group as usize;

        let mut emitter = Emitter { positions: Vec::new(), reverse };
        let root = emitter.emit(&root);
        let positions = emitter.positions;

        let transition = |edge: &Edge| -> Result<Transition, NfaError> {
            let groups = GroupBoundaries::from_ops(&edge.ops);
            Ok(match edge.target {
                Target::Position(p) => Transition::new(
                    StateId::new(FIRST_POSITION + p)?,
                    positions[p].clone(),
                    groups,
                ),
                Target::Exit if edge.at_end => {
                    Transition::new(StateId::new(ANCHORED_FINAL)?, CharSet::no(), groups)
                }
                Target::Exit => {
                    Transition::new(StateId::new(UNANCHORED_FINAL)?, CharSet::yes(), groups)
                }
            })
        };

        let mut anchored: Vec<Transition> =
            root.entries.iter().map(transition).collect::<Result<_, _>>()?;
        let mut unanchored: Vec<Transition> =
            root.entries.iter().filter(|e| !e.at_start).map(transition).collect::<Result<_, _>>()?;
        let has_unanchored = !unanchored.is_empty();

        // The loop-backs go last: they're the lowest priority alternative at every offset.
        if has_unanchored && self.config.initial_loop_back && !self.config.sticky {
            let target = StateId::new(UNANCHORED_INITIAL)?;
            for transitions in [&mut anchored, &mut unanchored] {
                transitions.push(
                    Transition::new(target, CharSet::yes(), GroupBoundaries::default())
                        .with_loop_back(),
                );
            }
        }

        let mut follows: Vec<Vec<Edge>> = vec![Vec::new(); positions.len()];
        for (p, edges) in root.follows {
            follows[p] = edges;
        }

        let mut states = Vec::with_capacity(FIRST_POSITION + positions.len());
        states.push(NfaState::new(StateId::new(ANCHORED_INITIAL)?, StateKind::Inner, anchored));
        states.push(NfaState::new(StateId::new(UNANCHORED_INITIAL)?, StateKind::Inner, unanchored));
        states.push(NfaState::new(StateId::new(ANCHORED_FINAL)?, StateKind::AnchoredFinal, vec![]));
        states.push(NfaState::new(
            StateId::new(UNANCHORED_FINAL)?,
            StateKind::UnanchoredFinal,
            vec![],
        ));
        for (p, edges) in follows.iter().enumerate() {
            let transitions = edges.iter().map(transition).collect::<Result<_, _>>()?;
            states.push(NfaState::new(
                StateId::new(FIRST_POSITION + p)?,
                StateKind::Inner,
                transitions,
            ));
        }

        let unanchored_entry =
            if has_unanchored { Some(StateId::new(UNANCHORED_INITIAL)?) } else { None };

        let nfa = Nfa::new(
            states,
            vec![Some(StateId::new(ANCHORED_INITIAL)?)],
            vec![unanchored_entry],
            group_count,
            self.config.sticky,
            self.config.initial_loop_back,
        )?;
        Ok(nfa)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Empty,
    Set(CharSet),
    Concat(Vec<Node>),
    Alt(Vec<Node>),
    Repeat { inner: Box<Node>, min: u32, max: Option<u32>, greedy: bool },
    Capture { index: u32, inner: Box<Node> },
    Start,
    End,
}

impl Node {
    fn collect_captures(&self, out: &mut Vec<u32>) {
        match self {
            Node::Capture { index, inner } => {
                out.push(*index);
                inner.collect_captures(out);
            }
            Node::Concat(nodes) | Node::Alt(nodes) => {
                for n in nodes {
                    n.collect_captures(out);
                }
            }
            Node::Repeat { inner, .. } => inner.collect_captures(out),
            Node::Empty | Node::Set(_) | Node::Start | Node::End => {}
        }
    }
}

struct Lowering {
    ignore_case: bool,
    next_group: u32,
}

impl Lowering {
    fn lower(&mut self, hir: &Hir) -> Result<Node, BuildError> {
        Ok(match hir {
            Hir::Empty => Node::Empty,
            Hir::Literal(s) => {
                Node::Concat(s.chars().map(|c| Node::Set(self.fold(CharSet::single(c as u32)))).collect())
            }
            Hir::Class { ranges, negated } => {
                let mut cs = CharSet::no();
                for &(start, end) in ranges {
                    if start > end {
                        return Err(BuildError::InvertedClassRange { start, end });
                    }
                    cs.set_range(start..=end);
                }
                let mut cs = self.fold(cs);
                if *negated {
                    cs.invert();
                }
                Node::Set(cs)
            }
            Hir::Any => Node::Set(CharSet::yes()),
            Hir::Concat(parts) => {
                Node::Concat(parts.iter().map(|p| self.lower(p)).collect::<Result<_, _>>()?)
            }
            Hir::Alt(alts) => Node::Alt(alts.iter().map(|a| self.lower(a)).collect::<Result<_, _>>()?),
            Hir::Repeat { inner, min, max, greedy } => {
                if let Some(max) = *max {
                    if *min > max {
                        return Err(BuildError::InvalidRepetition { min: *min, max });
                    }
                }
                Node::Repeat { inner: Box::new(self.lower(inner)?), min: *min, max: *max, greedy: *greedy }
            }
            Hir::Capture(inner) => {
                // Numbered before the inner groups: `((a)b)` is group 1 around group 2.
                let index = self.next_group;
                self.next_group += 1;
                Node::Capture { index, inner: Box::new(self.lower(inner)?) }
            }
            Hir::Start => Node::Start,
            Hir::End => Node::End,
        })
    }

    fn fold(&self, mut cs: CharSet) -> CharSet {
        if self.ignore_case {
            cs.add_ascii_case();
        }
        cs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Position(usize),
    Exit,
}

#[derive(Debug, Clone)]
struct Edge {
    target: Target,
    ops: Vec<GroupOp>,
    // Only valid at the lowest possible start offset.
    at_start: bool,
    // Only valid at the end of the input.
    at_end: bool,
}

impl Edge {
    fn exit() -> Self {
        Edge { target: Target::Exit, ops: Vec::new(), at_start: false, at_end: false }
    }

    fn to(p: usize) -> Self {
        Edge { target: Target::Position(p), ..Edge::exit() }
    }
}

#[derive(Debug, Default)]
struct Fragment {
    entries: Vec<Edge>,
    follows: Vec<(usize, Vec<Edge>)>,
}

impl Fragment {
    fn empty() -> Self {
        Fragment { entries: vec![Edge::exit()], follows: Vec::new() }
    }

    fn then(self, next: Fragment) -> Fragment {
        let entries = splice(&self.entries, &next.entries, true);
        let mut follows: Vec<_> = self
            .follows
            .into_iter()
            .map(|(p, edges)| (p, splice(&edges, &next.entries, false)))
            .collect();
        follows.extend(next.follows);
        Fragment { entries, follows }
    }

    fn optional(mut self, greedy: bool) -> Fragment {
        if greedy {
            self.entries.push(Edge::exit());
        } else {
            self.entries.insert(0, Edge::exit());
        }
        self
    }
}

/// Replaces every edge leaving the fragment with the edges in `next`.
///
/// `from_entry` is false for edges that follow a position: a unit has been consumed,
/// so a start assertion in `next` can no longer hold.
fn splice(edges: &[Edge], next: &[Edge], from_entry: bool) -> Vec<Edge> {
    let mut out = Vec::with_capacity(edges.len());

    for e in edges {
        if e.target != Target::Exit {
            out.push(e.clone());
            continue;
        }

        for n in next {
            if n.at_start && !from_entry {
                continue;
            }
            // Nothing can be consumed past an end assertion.
            if e.at_end && n.target != Target::Exit {
                continue;
            }

            let mut ops = e.ops.clone();
            ops.extend_from_slice(&n.ops);
            out.push(Edge {
                target: n.target,
                ops,
                at_start: e.at_start || n.at_start,
                at_end: e.at_end || n.at_end,
            });
        }
    }

    out
}

struct Emitter {
    positions: Vec<CharSet>,
    reverse: bool,
}

impl Emitter {
    fn emit(&mut self, node: &Node) -> Fragment {
        match node {
            Node::Empty => Fragment::empty(),

            Node::Set(cs) => {
                let p = self.positions.len();
                self.positions.push(cs.clone());
                Fragment { entries: vec![Edge::to(p)], follows: vec![(p, vec![Edge::exit()])] }
            }

            Node::Start | Node::End => {
                // A reversed automaton starts scanning at the end of the input.
                let at_start = matches!(node, Node::Start) != self.reverse;
                let edge = Edge { at_start, at_end: !at_start, ..Edge::exit() };
                Fragment { entries: vec![edge], follows: Vec::new() }
            }

            Node::Concat(parts) => {
                let mut frag = Fragment::empty();
                if self.reverse {
                    for part in parts.iter().rev() {
                        let next = self.emit(part);
                        frag = frag.then(next);
                    }
                } else {
                    for part in parts {
                        let next = self.emit(part);
                        frag = frag.then(next);
                    }
                }
                frag
            }

            Node::Alt(alts) => {
                let mut frag = Fragment::default();
                for alt in alts {
                    let f = self.emit(alt);
                    frag.entries.extend(f.entries);
                    frag.follows.extend(f.follows);
                }
                frag
            }

            Node::Capture { index, inner } => {
                let (mut open, mut close) = (2 * index, 2 * index + 1);
                if self.reverse {
                    (open, close) = (close, open);
                }

                let mut frag = self.emit(inner);
                for e in &mut frag.entries {
                    e.ops.insert(0, GroupOp::Update(open));
                    if e.target == Target::Exit {
                        e.ops.push(GroupOp::Update(close));
                    }
                }
                for (_, edges) in &mut frag.follows {
                    for e in edges.iter_mut().filter(|e| e.target == Target::Exit) {
                        e.ops.push(GroupOp::Update(close));
                    }
                }
                frag
            }

            Node::Repeat { inner, min, max, greedy } => {
                self.emit_repeat(inner, *min, *max, *greedy)
            }
        }
    }

    fn emit_repeat(&mut self, inner: &Node, min: u32, max: Option<u32>, greedy: bool) -> Fragment {
        let mut groups = Vec::new();
        inner.collect_captures(&mut groups);
        let clears: Vec<GroupOp> =
            groups.iter().flat_map(|&g| [GroupOp::Clear(2 * g), GroupOp::Clear(2 * g + 1)]).collect();

        let mut frag = Fragment::empty();
        for _ in 0..min {
            let next = self.emit_iteration(inner, &clears);
            frag = frag.then(next);
        }

        let tail = match max {
            None => self.emit_star(inner, greedy, &clears),
            Some(max) => {
                // x{0,3} = (x (x (x)?)?)?
                let mut tail = Fragment::empty();
                for _ in min..max {
                    let next = self.emit_iteration(inner, &clears);
                    tail = next.then(tail).optional(greedy);
                }
                tail
            }
        };

        frag.then(tail)
    }

    fn emit_iteration(&mut self, inner: &Node, clears: &[GroupOp]) -> Fragment {
        let mut frag = self.emit(inner);
        if !clears.is_empty() {
            for e in &mut frag.entries {
                e.ops.splice(0..0, clears.iter().copied());
            }
        }
        frag
    }

    fn emit_star(&mut self, inner: &Node, greedy: bool, clears: &[GroupOp]) -> Fragment {
        let body = self.emit_iteration(inner, clears);

        let mut again: Vec<Edge> =
            body.entries.into_iter().filter(|e| e.target != Target::Exit).collect();
        if greedy {
            again.push(Edge::exit());
        } else {
            again.insert(0, Edge::exit());
        }

        let follows =
            body.follows.into_iter().map(|(p, edges)| (p, splice(&edges, &again, false))).collect();
        Fragment { entries: again, follows }
    }
}
