// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A backtracking NFA regex executor.
//!
//! ## Architecture
//!
//!   [`Hir`] pattern tree
//! → [`Builder`] (position automaton) → [`Nfa`]
//! → [`Executor`] (backtracking) → [`Captures`]
//!
//! The NFA is immutable and may be shared by any number of threads. Every match
//! call owns a fresh backtracking stack, a flat `Vec<isize>` of frames holding the
//! input index, the NFA state and all capture boundaries. See `backtrack::locals`.
//!
//! [`Regex`] bundles a builder and an executor for the common case of forward searches.
//!
//! ## Capture semantics
//!
//! - Leftmost-first, like Perl and ECMAScript: among the matches starting at the
//!   leftmost offset, the one preferred by alternation order and greediness wins.
//! - Groups that didn't participate in the match are reported as `-1`.
//! - Captures inside a quantifier are reset at the start of each iteration.
//!
//! ## Gotchas
//!
//! - Offsets are in input units, see [`Input`].
//! - Backward searches need an NFA from [`Builder::build_reverse`]. Feeding a forward
//!   NFA to a backward search "works", but matches the pattern spelled backwards.
//! - Matching is exponential in the worst case. Use [`ExecConfig::step_limit`] for
//!   untrusted patterns.

pub mod backtrack;
pub mod charset;
pub mod config;
pub mod error;
pub mod input;
pub mod nfa;
pub mod regex;

pub use self::backtrack::{Captures, Direction, Executor, MatchStats, Search};
pub use self::charset::{CharPredicate, CharSet};
pub use self::config::{BuilderConfig, ExecConfig};
pub use self::error::{BuildError, MatchError, NfaError};
pub use self::input::Input;
pub use self::nfa::{Builder, GroupBoundaries, GroupOp, Hir, Nfa, NfaState, StateId, StateKind, Transition, UNSET};
pub use self::regex::{FindIter, Regex};
