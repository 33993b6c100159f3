//! Defines a [`Span`] which is a byte range into an owned template source.
//!
//! Tokens and instructions never borrow the source directly, they only store
//! spans so that a compiled template can own its source and still be moved
//! around freely.

use std::cmp::{max, min};
use std::ops::{Index, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub m: usize,
    pub n: usize,
}

impl Span {
    /// An empty span located at the given offset.
    pub const fn at(i: usize) -> Self {
        Self { m: i, n: i }
    }

    pub fn combine(self, other: Self) -> Self {
        Self {
            m: min(self.m, other.m),
            n: max(self.n, other.n),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.m == self.n
    }
}

impl Index<Span> for str {
    type Output = str;

    fn index(&self, span: Span) -> &Self::Output {
        &self[span.m..span.n]
    }
}

impl From<Range<usize>> for Span {
    fn from(r: Range<usize>) -> Self {
        Self {
            m: r.start,
            n: r.end,
        }
    }
}
