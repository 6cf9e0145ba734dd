use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::Err;

/// Leaf label standing in for numeric tokens
pub const NUM_SYMBOL: &str = "_num_";
/// Leaf label standing in for tokens seen less than `min_count` times
pub const RARE_SYMBOL: &str = "_rare_";
/// Prefix of the non-terminals minted while binarizing long rules
pub const HELPER_PREFIX: char = 'X';

const PUNCTUATION: &[&str] = &[
  ".", ",", "!", "?", ":", ";", "\"", "''", "'", "`", "``", "...", "-", "--", "(", ")", "[", "]",
  "{", "}", "…",
];

/// Phrase and tag labels of the Penn treebank. Some of them contain lowercase
/// letters or punctuation, so they have to be recognized by name.
const TREEBANK_LABELS: &[&str] = &[
  "ADJP", "ADVP", "CC", "CD", "CONJP", "DT", "EX", "FRAG", "FW", "IN", "INTJ", "JJ", "JJR", "JJS",
  "LS", "LST", "MD", "NAC", "NN", "NNP", "NNPS", "NNS", "NP", "NX", "PDT", "POS", "PP", "PRN",
  "PRP", "PRP$", "PRT", "PRT|ADVP", "QP", "RB", "RBR", "RP", "RRC", "S", "SBAR", "SBARQ", "SINV",
  "SQ", "SYM", "TO", "UCP", "UH", "VB", "VBD", "VBG", "VBN", "VBP", "VBZ", "VP", "WDT", "WHADJP",
  "WHADVP", "WHNP", "WP", "WP$", "WRB", "X", "-LRB-", "-RRB-", "-NONE-",
];

/// Is `s` one of the punctuation tokens that always act as terminals?
pub fn is_punctuation(s: &str) -> bool {
  PUNCTUATION.contains(&s)
}

/// An interned grammar symbol. Clones share the underlying string, and
/// comparisons go by string content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
  name: Arc<str>,
}

impl Symbol {
  pub fn new(name: &str) -> Self {
    Self { name: name.into() }
  }

  pub fn as_str(&self) -> &str {
    &self.name
  }

  /// Whether the naming convention of treebank labels marks this symbol as a
  /// word rather than a category: punctuation, the one-letter words `I` and
  /// `A`, and anything with a lowercase letter that isn't a known label.
  pub fn is_terminal(&self) -> bool {
    let name = self.as_str();
    if is_punctuation(name) {
      return true;
    }
    if TREEBANK_LABELS.contains(&name) {
      return false;
    }
    name == "I" || name == "A" || name.chars().any(|c| c.is_ascii_lowercase())
  }

  pub fn is_punctuation(&self) -> bool {
    is_punctuation(self.as_str())
  }

  /// Strips the function tag or coindex suffix of a treebank label:
  /// `NP-SBJ` -> `NP`, `NP=2` -> `NP`. Labels starting with `-` (`-NONE-`)
  /// are kept as they are.
  pub fn trimmed(&self) -> Self {
    let name = self.as_str();
    if name.starts_with('-') {
      return self.clone();
    }
    match name.find(['-', '=']) {
      Some(idx) => Self::new(&name[..idx]),
      None => self.clone(),
    }
  }
}

impl From<&str> for Symbol {
  fn from(s: &str) -> Self {
    Self::new(s)
  }
}

impl Borrow<str> for Symbol {
  fn borrow(&self) -> &str {
    self.as_str()
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

/// Shape of a rule's right side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
  /// X -> a
  Terminal,
  /// X -> Y
  SingleNonTerminal,
  /// X -> Y Z
  TwoNonTerminal,
  /// X -> Y Z W ...
  MultipleNonTerminal,
}

/// Payload attached to every rule of a grammar. Plain grammars use `()`,
/// probabilistic ones use [`Probability`].
pub trait Weight: Clone + fmt::Debug + PartialEq {
  /// Weight of `X -> beta` derived from `X -> Y` (self) and `Y -> beta` (inner)
  fn chain(&self, inner: &Self) -> Self;

  /// Weight of a `Xk -> B C` rule minted by binarization
  fn helper() -> Self;

  /// Log-score a parser adds when it applies the rule
  fn log_score(&self) -> f64;

  /// Anything written after the right side in the rule text format
  fn fmt_suffix(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
    Ok(())
  }
}

impl Weight for () {
  fn chain(&self, _inner: &Self) -> Self {}

  fn helper() -> Self {}

  fn log_score(&self) -> f64 {
    0.0
  }
}

/// Probability of a rule, and the number of times it was seen while
/// estimating that probability from trees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probability {
  pub probability: f64,
  pub count: u32,
}

impl Probability {
  pub fn new(probability: f64) -> Self {
    Self {
      probability,
      count: 0,
    }
  }

  pub fn increment(&mut self) {
    self.count += 1;
  }

  /// Turns the count into a relative frequency out of `total`
  pub fn normalize(&mut self, total: u32) {
    self.probability = self.count as f64 / total as f64;
  }
}

impl Default for Probability {
  fn default() -> Self {
    Self::new(0.0)
  }
}

impl Weight for Probability {
  // rule applications are independent, so probabilities multiply
  fn chain(&self, inner: &Self) -> Self {
    Self::new(self.probability * inner.probability)
  }

  fn helper() -> Self {
    Self::new(1.0)
  }

  fn log_score(&self) -> f64 {
    self.probability.ln()
  }

  fn fmt_suffix(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, " [{}]", self.probability)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule<W = ()> {
  pub left: Symbol,
  pub right: Vec<Symbol>,
  pub kind: RuleKind,
  pub weight: W,
}

impl<W: Weight> Rule<W> {
  /// Creates a rule with a provisional kind based only on the right side's
  /// length. Single-symbol rules start out as `Terminal` until the grammar
  /// reclassifies them against its non-terminals.
  pub fn new(left: Symbol, right: Vec<Symbol>, weight: W) -> Result<Self, Err> {
    if right.is_empty() {
      return Err(format!("rule {} has an empty right side", left).into());
    }
    let kind = match right.len() {
      1 => RuleKind::Terminal,
      2 => RuleKind::TwoNonTerminal,
      _ => RuleKind::MultipleNonTerminal,
    };
    Ok(Self {
      left,
      right,
      kind,
      weight,
    })
  }

  pub(crate) fn with_kind(left: Symbol, right: Vec<Symbol>, kind: RuleKind, weight: W) -> Self {
    assert!(!right.is_empty(), "rule {} has an empty right side", left);
    Self {
      left,
      right,
      kind,
      weight,
    }
  }

  pub fn len(&self) -> usize {
    self.right.len()
  }

  pub fn is_empty(&self) -> bool {
    self.right.is_empty()
  }

  /// X -> X
  pub fn is_left_recursive(&self) -> bool {
    self.kind == RuleKind::SingleNonTerminal && self.right[0] == self.left
  }

  /// Recomputes the kind against the set of symbols that head some rule
  pub fn classify(&mut self, non_terminals: &HashSet<Symbol>) {
    self.kind = match self.right.len() {
      0 => unreachable!("rule {} has an empty right side", self.left),
      1 => {
        let sym = &self.right[0];
        if sym.is_terminal() || sym.is_punctuation() || !non_terminals.contains(sym) {
          RuleKind::Terminal
        } else {
          RuleKind::SingleNonTerminal
        }
      }
      2 => RuleKind::TwoNonTerminal,
      _ => RuleKind::MultipleNonTerminal,
    };
  }

  /// Replaces the first adjacent `first second` pair on the right side with
  /// `with`. Returns whether a replacement was made.
  pub(crate) fn replace_pair(&mut self, first: &Symbol, second: &Symbol, with: &Symbol) -> bool {
    let found = self
      .right
      .windows(2)
      .position(|pair| &pair[0] == first && &pair[1] == second);

    match found {
      Some(idx) => {
        self.right[idx] = with.clone();
        self.right.remove(idx + 1);
        if self.right.len() == 2 {
          self.kind = RuleKind::TwoNonTerminal;
        }
        true
      }
      None => false,
    }
  }
}

impl<W: Weight> fmt::Display for Rule<W> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.left)?;
    for sym in self.right.iter() {
      write!(f, " {}", sym)?;
    }
    self.weight.fmt_suffix(f)
  }
}
