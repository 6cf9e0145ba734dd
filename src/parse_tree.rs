use std::collections::HashSet;
use std::fmt;

use crate::rules::{Rule, Symbol, Weight};

/// Index of a node inside a [`ParseTree`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdx(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
  pub symbol: Symbol,
  pub children: Vec<NodeIdx>,
  /// Only trustworthy after [`ParseTree::correct_parents`]
  pub parent: Option<NodeIdx>,
}

impl TreeNode {
  fn new(symbol: Symbol) -> Self {
    Self {
      symbol,
      children: Vec::new(),
      parent: None,
    }
  }

  pub fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }
}

/// A constituency tree. Nodes live in an arena and own their children through
/// indices; the parent links are a separate layer that is rebuilt in one pass
/// with `correct_parents` once the shape of the tree is final.
///
/// Two trees are equal when they have the same bracketing, whatever their
/// arenas hold.
#[derive(Debug, Clone)]
pub struct ParseTree {
  nodes: Vec<TreeNode>,
  root: NodeIdx,
}

impl ParseTree {
  /// A tree that is just a root node
  pub fn new(root: Symbol) -> Self {
    Self {
      nodes: vec![TreeNode::new(root)],
      root: NodeIdx(0),
    }
  }

  pub fn root(&self) -> NodeIdx {
    self.root
  }

  /// Get an idx. Assumes valid, panics on OOB
  pub fn node(&self, idx: NodeIdx) -> &TreeNode {
    self.nodes.get(idx.0 as usize).expect("Invalid NodeIdx")
  }

  fn node_mut(&mut self, idx: NodeIdx) -> &mut TreeNode {
    self.nodes.get_mut(idx.0 as usize).expect("Invalid NodeIdx")
  }

  pub fn symbol(&self, idx: NodeIdx) -> &Symbol {
    &self.node(idx).symbol
  }

  pub fn set_symbol(&mut self, idx: NodeIdx, symbol: Symbol) {
    self.node_mut(idx).symbol = symbol;
  }

  pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
    &self.node(idx).children
  }

  pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
    self.node(idx).parent
  }

  /// Appends a new last child to `parent`
  pub fn add_child(&mut self, parent: NodeIdx, symbol: Symbol) -> NodeIdx {
    let idx = NodeIdx(self.nodes.len() as u32);
    self.nodes.push(TreeNode::new(symbol));
    self.node_mut(parent).children.push(idx);
    idx
  }

  /// All nodes reachable from the root, parents before children, children
  /// left to right
  pub fn preorder(&self) -> Vec<NodeIdx> {
    let mut order = Vec::new();
    let mut stack = vec![self.root];
    while let Some(idx) = stack.pop() {
      order.push(idx);
      stack.extend(self.children(idx).iter().rev());
    }
    order
  }

  /// Leaf nodes, left to right
  pub fn leaves(&self) -> Vec<NodeIdx> {
    self
      .preorder()
      .into_iter()
      .filter(|&idx| self.node(idx).is_leaf())
      .collect()
  }

  /// The words of the tree, left to right
  pub fn words(&self) -> Vec<&str> {
    self
      .leaves()
      .into_iter()
      .map(|idx| self.symbol(idx).as_str())
      .collect()
  }

  /// Rebuilds every reachable node's parent link from the child lists
  pub fn correct_parents(&mut self) {
    self.node_mut(self.root).parent = None;
    for idx in self.preorder() {
      let children = self.node(idx).children.clone();
      for child in children {
        self.node_mut(child).parent = Some(idx);
      }
    }
  }

  /// Splices the children of every node labelled with one of `helpers` into
  /// that node's parent, in place of the node. Parent links are stale
  /// afterwards.
  pub fn remove_helper_nodes(&mut self, helpers: &HashSet<Symbol>) {
    self.splice_helpers(self.root, helpers);
  }

  fn splice_helpers(&mut self, idx: NodeIdx, helpers: &HashSet<Symbol>) {
    let children = std::mem::take(&mut self.node_mut(idx).children);
    let mut spliced = Vec::with_capacity(children.len());
    for child in children {
      // bottom up, so a helper's own children are already helper-free
      self.splice_helpers(child, helpers);
      let node = self.node(child);
      if helpers.contains(&node.symbol) && !node.is_leaf() {
        spliced.extend_from_slice(&node.children);
      } else {
        spliced.push(child);
      }
    }
    self.node_mut(idx).children = spliced;
  }

  /// The local rule at `idx`: the node's label on the left, its children's
  /// labels on the right. With `trim`, function tags are cut off every label
  /// except words. Leaves and nodes with an unlabeled child give no rule.
  pub fn to_rule<W: Weight>(&self, idx: NodeIdx, trim: bool, weight: W) -> Option<Rule<W>> {
    let node = self.node(idx);
    if node.is_leaf() || node.symbol.as_str().is_empty() {
      return None;
    }

    let left = if trim {
      node.symbol.trimmed()
    } else {
      node.symbol.clone()
    };

    let mut right = Vec::with_capacity(node.children.len());
    for &child in node.children.iter() {
      let sym = self.symbol(child);
      if sym.as_str().is_empty() {
        return None;
      }
      if !trim || sym.is_terminal() {
        right.push(sym.clone());
      } else {
        right.push(sym.trimmed());
      }
    }

    Rule::new(left, right, weight).ok()
  }

  fn fmt_node(&self, idx: NodeIdx, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let node = self.node(idx);
    if node.is_leaf() {
      return write!(f, "{}", node.symbol);
    }

    write!(f, "({}", node.symbol)?;
    for &child in node.children.iter() {
      write!(f, " ")?;
      self.fmt_node(child, f)?;
    }
    write!(f, ")")
  }
}

impl ParseTree {
  fn same_subtree(&self, idx: NodeIdx, other: &ParseTree, other_idx: NodeIdx) -> bool {
    let (a, b) = (self.node(idx), other.node(other_idx));
    a.symbol == b.symbol
      && a.children.len() == b.children.len()
      && a
        .children
        .iter()
        .zip(b.children.iter())
        .all(|(&x, &y)| self.same_subtree(x, other, y))
  }
}

impl PartialEq for ParseTree {
  fn eq(&self, other: &Self) -> bool {
    self.same_subtree(self.root, other, other.root)
  }
}

impl Eq for ParseTree {}

impl fmt::Display for ParseTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.fmt_node(self.root, f)
  }
}
