use std::rc::Rc;

use tracing::{debug, trace};

use crate::chart::{Chart, ParseNode, PartialParseList};
use crate::grammar::Grammar;
use crate::parse_tree::ParseTree;
use crate::rules::{Probability, Symbol, Weight};

/// Something that turns a tokenized sentence into parse trees
pub trait SyntacticParser {
  /// Parses whitespace-free tokens. A sentence with no derivation, and the
  /// empty sentence, give no trees.
  fn parse(&self, tokens: &[&str]) -> Vec<ParseTree>;
}

/// How a chart cell takes in a new candidate
type CellUpdate = fn(&mut PartialParseList, Rc<ParseNode>);

/// Fills a CYK chart bottom-up. The grammar must be in Chomsky normal form:
/// unit rules and long rules are ignored.
fn fill_chart<W: Weight>(grammar: &Grammar<W>, tokens: &[Symbol], update: CellUpdate) -> Chart {
  let n = tokens.len();
  let mut chart = Chart::new(n);

  for (i, token) in tokens.iter().enumerate() {
    let leaf = Rc::new(ParseNode::leaf(token.clone()));
    for rule in grammar.terminal_rules_with_right_side(token) {
      let node = ParseNode::new(rule.left.clone(), vec![leaf.clone()], rule.weight.log_score());
      update(chart.cell_mut(i, i), Rc::new(node));
    }
  }

  for j in 1..n {
    for i in (0..j).rev() {
      for k in i..j {
        let mut found = Vec::new();
        for left in chart.cell(i, k) {
          for right in chart.cell(k + 1, j) {
            for rule in grammar.rules_with_two_non_terminals_on_right_side(&left.symbol, &right.symbol) {
              let log_probability = rule.weight.log_score() + left.log_probability + right.log_probability;
              found.push(ParseNode::new(
                rule.left.clone(),
                vec![left.clone(), right.clone()],
                log_probability,
              ));
            }
          }
        }

        let cell = chart.cell_mut(i, j);
        for node in found {
          update(cell, Rc::new(node));
        }
      }
      trace!(i, j, candidates = chart.cell(i, j).len(), "filled cell");
    }
  }

  chart
}

/// Turns a chart candidate into an output tree over the original tokens
fn finish_tree<W: Weight>(grammar: &Grammar<W>, node: &ParseNode, tokens: &[&str]) -> ParseTree {
  let mut tree = node.to_tree();
  tree.remove_helper_nodes(grammar.helper_symbols());
  tree.correct_parents();
  grammar.reinsert_exceptional_words(&mut tree, tokens);
  tree
}

/// CYK parser returning every derivation of the start symbol
#[derive(Debug, Clone)]
pub struct CykParser<'g, W = ()> {
  grammar: &'g Grammar<W>,
  start: Symbol,
}

impl<'g, W: Weight> CykParser<'g, W> {
  /// A parser for sentences of category `S`
  pub fn new(grammar: &'g Grammar<W>) -> Self {
    Self {
      grammar,
      start: Symbol::new("S"),
    }
  }

  pub fn with_start(mut self, start: Symbol) -> Self {
    self.start = start;
    self
  }

  pub fn chart(&self, tokens: &[&str]) -> Chart {
    let substituted = self.grammar.remove_exceptional_words(tokens);
    fill_chart(self.grammar, &substituted, PartialParseList::add_partial_parse)
  }
}

impl<W: Weight> SyntacticParser for CykParser<'_, W> {
  fn parse(&self, tokens: &[&str]) -> Vec<ParseTree> {
    let chart = self.chart(tokens);
    let trees: Vec<ParseTree> = match chart.top() {
      Some(top) => top
        .with_symbol(&self.start)
        .map(|node| finish_tree(self.grammar, node, tokens))
        .collect(),
      None => Vec::new(),
    };
    debug!(tokens = tokens.len(), trees = trees.len(), "cyk parse");
    trees
  }
}

/// Viterbi CYK parser: each cell keeps only the most probable candidate per
/// symbol, and only the most probable derivations of the start symbol are
/// returned
#[derive(Debug, Clone)]
pub struct ProbabilisticCykParser<'g> {
  grammar: &'g Grammar<Probability>,
  start: Symbol,
}

impl<'g> ProbabilisticCykParser<'g> {
  pub fn new(grammar: &'g Grammar<Probability>) -> Self {
    Self {
      grammar,
      start: Symbol::new("S"),
    }
  }

  pub fn with_start(mut self, start: Symbol) -> Self {
    self.start = start;
    self
  }

  pub fn chart(&self, tokens: &[&str]) -> Chart {
    let substituted = self.grammar.remove_exceptional_words(tokens);
    fill_chart(self.grammar, &substituted, PartialParseList::update_partial_parse)
  }

  /// The best trees along with their log-probability
  pub fn parse_scored(&self, tokens: &[&str]) -> Vec<(ParseTree, f64)> {
    let chart = self.chart(tokens);
    let Some(top) = chart.top() else {
      return Vec::new();
    };

    let best = top
      .with_symbol(&self.start)
      .map(|node| node.log_probability)
      .fold(f64::NEG_INFINITY, f64::max);

    let trees: Vec<(ParseTree, f64)> = top
      .with_symbol(&self.start)
      .filter(|node| node.log_probability == best)
      .map(|node| (finish_tree(self.grammar, node, tokens), node.log_probability))
      .collect();
    debug!(tokens = tokens.len(), trees = trees.len(), best, "viterbi parse");
    trees
  }
}

impl SyntacticParser for ProbabilisticCykParser<'_> {
  fn parse(&self, tokens: &[&str]) -> Vec<ParseTree> {
    self.parse_scored(tokens).into_iter().map(|(tree, _)| tree).collect()
  }
}
