//! Generalized index arithmetic.
//!
//! A gindex is an integer whose bits after the leading 1 spell the path from
//! the root: 0 goes left, 1 goes right, most significant step first. Gindex 1
//! is the root, 2 and 3 its children, `2^d + i` the `i`-th node at depth `d`.
//!
//! Internally positions are kept as `(depth, index)` so that depth 64, which
//! has no `u64` gindex, is still addressable.

use std::fmt;

use crate::{Error, Result};

/// Deepest tree the pool supports.
pub const MAX_DEPTH: u8 = 64;

/// A node position below some root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    depth: u8,
    index: u64,
}

impl Position {
    /// The root itself.
    pub const ROOT: Position = Position { depth: 0, index: 0 };

    /// Position named by `gindex`. Gindex 0 names nothing.
    pub fn from_gindex(gindex: u64) -> Result<Self> {
        if gindex == 0 {
            return Err(Error::GindexOutOfRange("gindex 0 names no node".into()));
        }
        let depth = (u64::BITS - 1 - gindex.leading_zeros()) as u8;
        Ok(Position {
            depth,
            index: gindex ^ (1 << depth),
        })
    }

    /// Position of the `index`-th node at `depth`.
    pub fn at_depth(depth: u8, index: u64) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(Error::InvalidDepth {
                depth,
                max: MAX_DEPTH,
            });
        }
        if (index as u128) >= width(depth) {
            return Err(Error::IndexOutOfRange {
                depth,
                index: index as u128,
            });
        }
        Ok(Position { depth, index })
    }

    /// Distance from the root.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Index among the nodes at the same depth.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The gindex, or `None` at depth 64 where it does not fit a `u64`.
    pub fn gindex(&self) -> Option<u64> {
        (self.depth < MAX_DEPTH).then(|| (1u64 << self.depth) | self.index)
    }

    /// Whether the step taken below `level` (`level < depth`) goes right.
    pub(crate) fn goes_right(&self, level: u8) -> bool {
        debug_assert!(level < self.depth);
        (self.index >> (self.depth - 1 - level)) & 1 == 1
    }

    /// Root-to-node steps, `true` meaning right.
    pub fn path(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.depth).map(|level| self.goes_right(level))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gindex() {
            Some(gindex) => write!(f, "gindex {}", gindex),
            None => write!(f, "depth {} index {}", self.depth, self.index),
        }
    }
}

/// Number of nodes at `depth`.
pub(crate) fn width(depth: u8) -> u128 {
    1u128 << depth
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_from_gindex() {
        assert_eq!(Position::from_gindex(1).expect("root"), Position::ROOT);
        let pos = Position::from_gindex(6).expect("gindex 6");
        assert_eq!((pos.depth(), pos.index()), (2, 2));
        assert_eq!(pos.path().collect::<Vec<_>>(), vec![true, false]);

        let deepest = Position::from_gindex(u64::MAX).expect("max gindex");
        assert_eq!(deepest.depth(), 63);
        assert_eq!(deepest.index(), u64::MAX >> 1);
    }

    #[test]
    fn test_gindex_zero_rejected() {
        assert_matches!(Position::from_gindex(0), Err(Error::GindexOutOfRange(_)));
    }

    #[test]
    fn test_at_depth_bounds() {
        assert_eq!(
            Position::at_depth(3, 5).expect("in range").gindex(),
            Some(13)
        );
        assert_matches!(
            Position::at_depth(3, 8),
            Err(Error::IndexOutOfRange { depth: 3, index: 8 })
        );
        assert_matches!(
            Position::at_depth(65, 0),
            Err(Error::InvalidDepth { depth: 65, .. })
        );
        let bottom = Position::at_depth(64, u64::MAX).expect("depth 64");
        assert_eq!(bottom.gindex(), None);
        assert!(bottom.path().all(|right| right));
        assert_eq!(bottom.to_string(), "depth 64 index 18446744073709551615");
    }

    #[test]
    fn test_depth_index_agrees_with_gindex() {
        for gindex in 1u64..64 {
            let pos = Position::from_gindex(gindex).expect("gindex");
            let again = Position::at_depth(pos.depth(), pos.index()).expect("depth index");
            assert_eq!(again.gindex(), Some(gindex));
        }
    }
}
