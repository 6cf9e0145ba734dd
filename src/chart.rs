use std::fmt;
use std::rc::Rc;

use crate::parse_tree::{NodeIdx, ParseTree};
use crate::rules::Symbol;

/// A candidate constituent in a chart cell. Subtrees are shared between all
/// the candidates built on top of them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseNode {
  pub symbol: Symbol,
  pub children: Vec<Rc<ParseNode>>,
  /// Cumulative log-probability of the subtree, 0.0 for plain grammars
  pub log_probability: f64,
}

impl ParseNode {
  /// An input token
  pub fn leaf(symbol: Symbol) -> Self {
    Self {
      symbol,
      children: Vec::new(),
      log_probability: 0.0,
    }
  }

  pub fn new(symbol: Symbol, children: Vec<Rc<ParseNode>>, log_probability: f64) -> Self {
    Self {
      symbol,
      children,
      log_probability,
    }
  }

  /// Copies the (possibly shared) subtree into an owned tree
  pub fn to_tree(&self) -> ParseTree {
    let mut tree = ParseTree::new(self.symbol.clone());
    let root = tree.root();
    self.copy_children(&mut tree, root);
    tree
  }

  fn copy_children(&self, tree: &mut ParseTree, parent: NodeIdx) {
    for child in self.children.iter() {
      let idx = tree.add_child(parent, child.symbol.clone());
      child.copy_children(tree, idx);
    }
  }
}

/// The candidates of one chart cell
#[derive(Debug, Clone, Default)]
pub struct PartialParseList(Vec<Rc<ParseNode>>);

impl PartialParseList {
  pub fn new() -> Self {
    Self(Vec::new())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Rc<ParseNode>> {
    self.0.iter()
  }

  /// Keeps every candidate, so all readings of an ambiguous span survive
  pub fn add_partial_parse(&mut self, node: Rc<ParseNode>) {
    self.0.push(node);
  }

  /// Keeps at most one candidate per symbol: the most probable one. A later
  /// candidate only replaces an earlier one if it is strictly more probable.
  pub fn update_partial_parse(&mut self, node: Rc<ParseNode>) {
    match self.0.iter_mut().find(|n| n.symbol == node.symbol) {
      Some(existing) => {
        if node.log_probability > existing.log_probability {
          *existing = node;
        }
      }
      None => self.0.push(node),
    }
  }

  /// Candidates rooted in `symbol`
  pub fn with_symbol<'a>(&'a self, symbol: &Symbol) -> impl Iterator<Item = &'a Rc<ParseNode>> + use<'a> {
    let symbol = symbol.clone();
    self.0.iter().filter(move |n| n.symbol == symbol)
  }
}

impl<'a> IntoIterator for &'a PartialParseList {
  type Item = &'a Rc<ParseNode>;
  type IntoIter = std::slice::Iter<'a, Rc<ParseNode>>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}

/// Triangular table of cells, one per span `(i, j)` with `i <= j`, both ends
/// inclusive
#[derive(Debug)]
pub struct Chart {
  len: usize,
  cells: Vec<PartialParseList>,
}

impl Chart {
  /// A chart over `len` tokens
  pub fn new(len: usize) -> Self {
    Self {
      len,
      cells: vec![PartialParseList::new(); len * (len + 1) / 2],
    }
  }

  /// Number of tokens
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  fn offset(&self, i: usize, j: usize) -> usize {
    assert!(i <= j && j < self.len, "span {}..{} outside chart of {}", i, j, self.len);
    j * (j + 1) / 2 + i
  }

  pub fn cell(&self, i: usize, j: usize) -> &PartialParseList {
    &self.cells[self.offset(i, j)]
  }

  pub fn cell_mut(&mut self, i: usize, j: usize) -> &mut PartialParseList {
    let offset = self.offset(i, j);
    &mut self.cells[offset]
  }

  /// The cell spanning the whole input
  pub fn top(&self) -> Option<&PartialParseList> {
    if self.is_empty() {
      None
    } else {
      Some(self.cell(0, self.len - 1))
    }
  }
}

impl fmt::Display for Chart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for width in 0..self.len {
      for i in 0..self.len - width {
        let cell = self.cell(i, i + width);
        if cell.is_empty() {
          continue;
        }
        write!(f, "{}..{}:", i, i + width)?;
        for node in cell {
          write!(f, " {}", node.symbol)?;
        }
        writeln!(f)?;
      }
    }
    Ok(())
  }
}
