use tracing::debug;

use crate::Err;
use crate::grammar::Grammar;
use crate::parse_tree::{NodeIdx, ParseTree};
use crate::rules::{Probability, Rule, RuleKind, Symbol, Weight};

impl Grammar<Probability> {
  /// Estimates a grammar from trees: every local subtree is counted as one
  /// use of its rule, and a rule's probability is its share of the uses of
  /// all rules with the same left side.
  pub fn from_trees(trees: &[ParseTree], min_count: usize) -> Self {
    let mut grammar = Self::new();
    grammar.construct_dictionary(trees);
    for tree in trees {
      let mut tree = tree.clone();
      grammar.update_tree(&mut tree, min_count);
      for idx in tree.preorder() {
        if let Some(rule) = tree.to_rule(idx, true, Probability::default()) {
          grammar.count_rule(rule);
        }
      }
    }

    grammar.normalize_probabilities();
    grammar.update_types();
    grammar.set_min_count(min_count);
    debug!(rules = grammar.len(), trees = trees.len(), "estimated grammar from trees");
    grammar
  }

  fn count_rule(&mut self, mut rule: Rule<Probability>) {
    match self.search_rule(&rule) {
      Some(id) => self.rule_mut(id).weight.increment(),
      None => {
        rule.weight.increment();
        self.add_rule(rule);
      }
    }
  }

  fn normalize_probabilities(&mut self) {
    for left in self.all_left_sides() {
      let ids = self.left_side_ids(&left);
      let total: u32 = ids.iter().map(|&id| self.rule(id).weight.count).sum();
      for id in ids {
        self.rule_mut(id).weight.normalize(total);
      }
    }
  }

  /// Log-probability of a tree: the sum of the log-probabilities of the rules
  /// at its internal nodes. Nodes below a word-level rule don't count. The
  /// tree's rare words must already be normalized the way the grammar's were.
  pub fn tree_log_probability(&self, tree: &ParseTree) -> Result<f64, Err> {
    self.node_log_probability(tree, tree.root())
  }

  fn node_log_probability(&self, tree: &ParseTree, idx: NodeIdx) -> Result<f64, Err> {
    if tree.node(idx).is_leaf() {
      return Ok(0.0);
    }

    let (mut sum, descend) = match tree.to_rule(idx, true, Probability::default()) {
      Some(rule) => {
        let id = self
          .search_rule(&rule)
          .ok_or_else(|| format!("no rule {} in grammar", rule))?;
        let found = self.rule(id);
        (found.weight.log_score(), found.kind != RuleKind::Terminal)
      }
      // unlabeled wrapper node, like the outer bracket of treebank files
      None => (0.0, true),
    };

    if descend {
      for &child in tree.children(idx) {
        sum += self.node_log_probability(tree, child)?;
      }
    }
    Ok(sum)
  }

  /// Sum of the probabilities of all rules with the given left side
  pub fn left_side_mass(&self, left: &Symbol) -> f64 {
    self
      .rules_with_left_side(left)
      .iter()
      .map(|r| r.weight.probability)
      .sum()
  }
}
