// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capture group boundary actions.
//!
//! Every transition carries a [`GroupBoundaries`]: the capture slots it sets to
//! the current index and the slots it resets to [`UNSET`]. Slot `2 * g` is the
//! start of group `g`, slot `2 * g + 1` its end.

use std::fmt;

/// Sentinel stored in a capture slot that hasn't been reached.
pub const UNSET: isize = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOp {
    Update(u32),
    Clear(u32),
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct GroupBoundaries {
    updates: Vec<u32>,
    clears: Vec<u32>,
}

impl GroupBoundaries {
    pub fn new(updates: Vec<u32>, clears: Vec<u32>) -> Self {
        let mut ops: Vec<GroupOp> = clears.into_iter().map(GroupOp::Clear).collect();
        ops.extend(updates.into_iter().map(GroupOp::Update));
        Self::from_ops(&ops)
    }

    /// Folds a sequence of operations into their net effect.
    ///
    /// Later operations on the same slot win, which leaves `updates` and `clears`
    /// disjoint, so the order in which [`GroupBoundaries::apply`] writes them is irrelevant.
    pub fn from_ops(ops: &[GroupOp]) -> Self {
        let mut updates = Vec::new();
        let mut clears = Vec::new();

        for op in ops.iter().rev() {
            let slot = match *op {
                GroupOp::Update(s) | GroupOp::Clear(s) => s,
            };
            if updates.contains(&slot) || clears.contains(&slot) {
                continue;
            }
            match op {
                GroupOp::Update(_) => updates.push(slot),
                GroupOp::Clear(_) => clears.push(slot),
            }
        }

        updates.sort_unstable();
        clears.sort_unstable();
        Self { updates, clears }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.clears.is_empty()
    }

    pub fn updates(&self) -> &[u32] {
        &self.updates
    }

    pub fn clears(&self) -> &[u32] {
        &self.clears
    }

    /// The highest slot touched, if any. Used for validation.
    pub fn max_slot(&self) -> Option<u32> {
        self.updates.iter().chain(self.clears.iter()).copied().max()
    }

    /// Writes this action into `boundaries`, a region of `2 * groups` slots.
    /// Slots not referenced by the action are left untouched.
    #[inline]
    pub fn apply(&self, boundaries: &mut [isize], index: isize) {
        for &slot in &self.clears {
            boundaries[slot as usize] = UNSET;
        }
        for &slot in &self.updates {
            boundaries[slot as usize] = index;
        }
    }
}

impl fmt::Debug for GroupBoundaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for GroupBoundaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for &slot in &self.updates {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}{}", if slot % 2 == 0 { "(" } else { ")" }, slot / 2)?;
            first = false;
        }
        for &slot in &self.clears {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "!{}{}", if slot % 2 == 0 { "(" } else { ")" }, slot / 2)?;
            first = false;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_leaves_other_slots_alone() {
        let gb = GroupBoundaries::new(vec![0, 3], vec![]);
        let mut buf = [UNSET, UNSET, 7, UNSET];
        gb.apply(&mut buf, 4);
        assert_eq!(buf, [4, UNSET, 7, 4]);
    }

    #[test]
    fn apply_is_idempotent() {
        let gb = GroupBoundaries::new(vec![1, 2], vec![4, 5]);
        let mut once = [0, 0, 0, 0, 9, 9];
        gb.apply(&mut once, 3);

        let mut twice = [0, 0, 0, 0, 9, 9];
        gb.apply(&mut twice, 3);
        gb.apply(&mut twice, 3);

        assert_eq!(once, twice);
        assert_eq!(once, [0, 3, 3, 0, UNSET, UNSET]);
    }

    #[test]
    fn later_ops_win() {
        // Closing a group and re-entering it on the same transition.
        let gb = GroupBoundaries::from_ops(&[
            GroupOp::Update(3),
            GroupOp::Clear(2),
            GroupOp::Clear(3),
            GroupOp::Update(2),
        ]);
        assert_eq!(gb.updates(), &[2]);
        assert_eq!(gb.clears(), &[3]);

        let mut buf = [0, 0, 1, 2];
        gb.apply(&mut buf, 5);
        assert_eq!(buf, [0, 0, 5, UNSET]);
    }

    #[test]
    fn display() {
        let gb = GroupBoundaries::new(vec![0, 3], vec![4]);
        assert_eq!(gb.to_string(), "{(0 )1 !(2}");
        assert!(GroupBoundaries::default().is_empty());
        assert_eq!(gb.max_slot(), Some(4));
    }
}
