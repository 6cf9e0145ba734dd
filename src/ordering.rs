//! Total orders over rules. The grammar keeps one index sorted by
//! [`rule_order`] and another by [`right_index_order`], and binary-searches
//! them with the coarser [`left_side_order`] and [`right_side_order`].

use std::cmp::Ordering;

use crate::rules::Rule;

/// By left symbol only
pub fn left_side_order<W>(a: &Rule<W>, b: &Rule<W>) -> Ordering {
  a.left.cmp(&b.left)
}

/// By right side, symbol by symbol. On an equal prefix the shorter side is less.
pub fn right_side_order<W>(a: &Rule<W>, b: &Rule<W>) -> Ordering {
  a.right.cmp(&b.right)
}

/// By left symbol, then by right side
pub fn rule_order<W>(a: &Rule<W>, b: &Rule<W>) -> Ordering {
  left_side_order(a, b).then_with(|| right_side_order(a, b))
}

/// By right side, then by left symbol
pub fn right_index_order<W>(a: &Rule<W>, b: &Rule<W>) -> Ordering {
  right_side_order(a, b).then_with(|| left_side_order(a, b))
}
