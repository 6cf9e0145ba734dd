use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::slice;

use tracing::{debug, trace};

use crate::ordering::{right_index_order, right_side_order, rule_order};
use crate::parse_tree::ParseTree;
use crate::rules::{NUM_SYMBOL, Probability, RARE_SYMBOL, Rule, RuleKind, Symbol, Weight};
use crate::utils::distinct_in_order;

/// Handle of a rule inside its grammar
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

/// A rule store with two sorted indices over the same rules: `by_left` in
/// [`rule_order`] and `by_right` in [`right_index_order`]. Every lookup is a
/// binary search into one of them followed by a scan over the neighbours that
/// share the key.
///
/// Besides rules, the grammar knows how often each word was seen, and treats
/// words seen fewer than `min_count` times as rare.
#[derive(Debug, Clone)]
pub struct Grammar<W = ()> {
  slots: Vec<Option<Rule<W>>>,
  by_left: Vec<RuleId>,
  by_right: Vec<RuleId>,
  dictionary: HashMap<Symbol, usize>,
  min_count: usize,
  /// Suffix of the next binarization helper symbol
  pub(crate) next_helper: usize,
  /// The symbols minted by binarization
  pub(crate) helpers: HashSet<Symbol>,
}

pub type ProbabilisticGrammar = Grammar<Probability>;

impl<W: Weight> Default for Grammar<W> {
  fn default() -> Self {
    Self {
      slots: Vec::new(),
      by_left: Vec::new(),
      by_right: Vec::new(),
      dictionary: HashMap::new(),
      min_count: 1,
      next_helper: 0,
      helpers: HashSet::new(),
    }
  }
}

fn slot<W>(slots: &[Option<Rule<W>>], id: RuleId) -> &Rule<W> {
  slots
    .get(id.0 as usize)
    .and_then(Option::as_ref)
    .expect("Invalid RuleId")
}

/// Widens `mid` to the run of entries around it that satisfy `matches`.
/// `index[mid]` itself must match.
fn scan_outward<F>(index: &[RuleId], mid: usize, matches: F) -> Range<usize>
where
  F: Fn(RuleId) -> bool,
{
  let mut start = mid;
  while start > 0 && matches(index[start - 1]) {
    start -= 1;
  }
  let mut end = mid + 1;
  while end < index.len() && matches(index[end]) {
    end += 1;
  }
  start..end
}

/// Integers and decimals, with an optional leading `+`
pub fn is_number(token: &str) -> bool {
  regex_static!(NUMBER, r"^\+?(\d+|\d*\.\d*)$");
  token != "." && NUMBER.is_match(token)
}

impl<W: Weight> Grammar<W> {
  pub fn new() -> Self {
    Default::default()
  }

  /// Builds a grammar out of a batch of rules. Duplicates are dropped, and the
  /// rules are classified once everything is in.
  pub fn from_rules<I>(rules: I) -> Self
  where
    I: IntoIterator<Item = Rule<W>>,
  {
    let mut grammar = Self::new();
    for rule in rules {
      grammar.add_rule(rule);
    }
    grammar.update_types();
    grammar
  }

  /// Get a rule. Assumes valid, panics on removed rules
  pub fn rule(&self, id: RuleId) -> &Rule<W> {
    slot(&self.slots, id)
  }

  pub(crate) fn rule_mut(&mut self, id: RuleId) -> &mut Rule<W> {
    self
      .slots
      .get_mut(id.0 as usize)
      .and_then(Option::as_mut)
      .expect("Invalid RuleId")
  }

  pub fn len(&self) -> usize {
    self.by_left.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// All rules, sorted by left side and then right side
  pub fn rules(&self) -> impl Iterator<Item = &Rule<W>> {
    self.by_left.iter().map(move |&id| self.rule(id))
  }

  pub(crate) fn rule_ids(&self) -> &[RuleId] {
    &self.by_left
  }

  /// Whether `sym` was introduced by binarization. User symbols that merely
  /// look like `X0` are not helpers.
  pub fn is_helper(&self, sym: &Symbol) -> bool {
    self.helpers.contains(sym)
  }

  pub fn helper_symbols(&self) -> &HashSet<Symbol> {
    &self.helpers
  }

  pub fn min_count(&self) -> usize {
    self.min_count
  }

  pub fn set_min_count(&mut self, min_count: usize) {
    self.min_count = min_count;
  }

  pub fn dictionary(&self) -> &HashMap<Symbol, usize> {
    &self.dictionary
  }

  /// How many times `word` was seen. Unknown words have count 0.
  pub fn word_count(&self, word: &str) -> usize {
    self.dictionary.get(word).copied().unwrap_or(0)
  }

  pub fn add_word(&mut self, word: Symbol, count: usize) {
    *self.dictionary.entry(word).or_insert(0) += count;
  }

  /// Counts every leaf of every tree
  pub(crate) fn construct_dictionary(&mut self, trees: &[ParseTree]) {
    for tree in trees {
      for leaf in tree.leaves() {
        self.add_word(tree.symbol(leaf).clone(), 1);
      }
    }
  }

  fn alloc(&mut self, rule: Rule<W>) -> RuleId {
    let id = RuleId(self.slots.len() as u32);
    self.slots.push(Some(rule));
    id
  }

  /// Position of `rule` in the left index, or where it would be inserted
  fn find_rule(&self, rule: &Rule<W>) -> Result<usize, usize> {
    self
      .by_left
      .binary_search_by(|&id| rule_order(self.rule(id), rule))
  }

  /// The stored rule with the same sides as `rule`
  pub fn search_rule(&self, rule: &Rule<W>) -> Option<RuleId> {
    self.find_rule(rule).ok().map(|pos| self.by_left[pos])
  }

  /// Inserts `rule` into both indices at its sorted position. Does nothing and
  /// returns false if a rule with the same sides is already there.
  pub fn add_rule(&mut self, rule: Rule<W>) -> bool {
    let left_pos = match self.find_rule(&rule) {
      Ok(_) => return false,
      Err(pos) => pos,
    };
    let right_pos = self
      .by_right
      .binary_search_by(|&id| right_index_order(self.rule(id), &rule))
      .unwrap_or_else(|pos| pos);

    trace!(%rule, "adding rule");
    let id = self.alloc(rule);
    self.by_left.insert(left_pos, id);
    self.by_right.insert(right_pos, id);
    true
  }

  /// Adds a rule at the end of both indices, leaving them unsorted until the
  /// next [`Self::resort`]
  pub(crate) fn push_unsorted(&mut self, rule: Rule<W>) -> RuleId {
    let id = self.alloc(rule);
    self.by_left.push(id);
    self.by_right.push(id);
    id
  }

  /// Removes the rule with the same sides as `rule` from both indices and
  /// hands it back, or returns None if there is no such rule.
  pub fn remove_rule(&mut self, rule: &Rule<W>) -> Option<Rule<W>> {
    let left_pos = self.find_rule(rule).ok()?;
    let id = self.by_left.remove(left_pos);

    // right sides alone don't tell rules apart, so look through every rule
    // sharing this right side for the one we just removed
    let mid = self
      .by_right
      .binary_search_by(|&other| right_side_order(self.rule(other), rule))
      .unwrap_or_else(|_| panic!("rule {} is missing from the right index", rule));
    let same_right = |pos: &usize| right_side_order(self.rule(self.by_right[*pos]), rule).is_eq();
    let right_pos = (0..=mid)
      .rev()
      .take_while(same_right)
      .chain((mid + 1..self.by_right.len()).take_while(same_right))
      .find(|&pos| self.by_right[pos] == id)
      .unwrap_or_else(|| panic!("rule {} is missing from the right index", rule));
    self.by_right.remove(right_pos);

    trace!(%rule, "removed rule");
    self.slots[id.0 as usize].take()
  }

  /// Drops the slots of removed rules and restores the sort order of both
  /// indices after in-place rewrites. Rule ids change.
  pub(crate) fn resort(&mut self) {
    self.slots.retain(Option::is_some);
    self.by_left = (0..self.slots.len() as u32).map(RuleId).collect();
    self.by_right = self.by_left.clone();

    let slots = &self.slots;
    self
      .by_left
      .sort_by(|&a, &b| rule_order(slot(slots, a), slot(slots, b)));
    self
      .by_right
      .sort_by(|&a, &b| right_index_order(slot(slots, a), slot(slots, b)));
  }

  /// Both indices hold the same rules, and each is sorted
  pub fn is_consistent(&self) -> bool {
    let mut left = self.by_left.clone();
    let mut right = self.by_right.clone();
    left.sort();
    right.sort();

    left == right
      && self
        .by_left
        .windows(2)
        .all(|w| rule_order(self.rule(w[0]), self.rule(w[1])).is_lt())
      && self
        .by_right
        .windows(2)
        .all(|w| right_index_order(self.rule(w[0]), self.rule(w[1])).is_le())
  }

  /// Reclassifies every rule against the current set of left sides
  pub fn update_types(&mut self) {
    let non_terminals: HashSet<Symbol> = self.rules().map(|r| r.left.clone()).collect();
    for rule in self.slots.iter_mut().flatten() {
      rule.classify(&non_terminals);
    }
    debug!(
      rules = self.len(),
      non_terminals = non_terminals.len(),
      "classified rules"
    );
  }

  fn left_side_range(&self, x: &Symbol) -> Range<usize> {
    match self
      .by_left
      .binary_search_by(|&id| self.rule(id).left.cmp(x))
    {
      Ok(mid) => scan_outward(&self.by_left, mid, |id| &self.rule(id).left == x),
      Err(_) => 0..0,
    }
  }

  /// Finds a rule whose right side is exactly `key`, then widens to the
  /// neighbours accepted by `matches`
  fn right_side_range<F>(&self, key: &[Symbol], matches: F) -> Range<usize>
  where
    F: Fn(&Rule<W>) -> bool,
  {
    match self
      .by_right
      .binary_search_by(|&id| self.rule(id).right.as_slice().cmp(key))
    {
      Ok(mid) => scan_outward(&self.by_right, mid, |id| matches(self.rule(id))),
      Err(_) => 0..0,
    }
  }

  fn resolve(&self, ids: &[RuleId]) -> Vec<&Rule<W>> {
    ids.iter().map(|&id| self.rule(id)).collect()
  }

  pub(crate) fn left_side_ids(&self, x: &Symbol) -> Vec<RuleId> {
    self.by_left[self.left_side_range(x)].to_vec()
  }

  pub(crate) fn right_side_ids(&self, s: &Symbol) -> Vec<RuleId> {
    let range = self.right_side_range(slice::from_ref(s), |r| r.right.len() == 1 && &r.right[0] == s);
    self.by_right[range].to_vec()
  }

  /// X -> ...
  pub fn rules_with_left_side(&self, x: &Symbol) -> Vec<&Rule<W>> {
    self.resolve(&self.by_left[self.left_side_range(x)])
  }

  /// X -> s, for `Terminal` rules only
  pub fn terminal_rules_with_right_side(&self, s: &Symbol) -> Vec<&Rule<W>> {
    let range = self.right_side_range(slice::from_ref(s), |r| &r.right[0] == s);
    self.by_right[range]
      .iter()
      .map(|&id| self.rule(id))
      .filter(|r| r.kind == RuleKind::Terminal)
      .collect()
  }

  /// X -> s, whatever the kind
  pub fn rules_with_right_side(&self, s: &Symbol) -> Vec<&Rule<W>> {
    self.resolve(&self.right_side_ids(s))
  }

  /// X -> a b
  pub fn rules_with_two_non_terminals_on_right_side(&self, a: &Symbol, b: &Symbol) -> Vec<&Rule<W>> {
    let key = [a.clone(), b.clone()];
    let range = self.right_side_range(&key, |r| r.right == key);
    self.resolve(&self.by_right[range])
  }

  /// Left sides of the `Terminal` rules, in order of first appearance
  pub fn part_of_speech_tags(&self) -> Vec<Symbol> {
    distinct_in_order(
      self
        .rules()
        .filter(|r| r.kind == RuleKind::Terminal)
        .map(|r| &r.left),
    )
  }

  /// Left sides of all rules, in order of first appearance
  pub fn all_left_sides(&self) -> Vec<Symbol> {
    distinct_in_order(self.rules().map(|r| &r.left))
  }

  fn exceptional_symbol(&self, word: &str, min_count: usize) -> Option<Symbol> {
    if is_number(word) {
      Some(Symbol::new(NUM_SYMBOL))
    } else if self.word_count(word) < min_count {
      Some(Symbol::new(RARE_SYMBOL))
    } else {
      None
    }
  }

  /// Maps numbers to `_num_` and words rarer than `min_count` to `_rare_`, the
  /// way the training trees were normalized. Tokens the grammar has a word
  /// rule for are kept, so grammars without a lexicon still see their words.
  pub fn remove_exceptional_words(&self, tokens: &[&str]) -> Vec<Symbol> {
    tokens
      .iter()
      .map(|&token| {
        let sym = Symbol::new(token);
        if !self.terminal_rules_with_right_side(&sym).is_empty() {
          return sym;
        }
        self.exceptional_symbol(token, self.min_count).unwrap_or(sym)
      })
      .collect()
  }

  /// Puts the original tokens back on the `_num_` and `_rare_` leaves of a
  /// parsed tree. Leaves correspond to tokens by position.
  pub fn reinsert_exceptional_words(&self, tree: &mut ParseTree, original: &[&str]) {
    for (leaf, &word) in tree.leaves().into_iter().zip(original) {
      let sym = tree.symbol(leaf).as_str();
      if sym == NUM_SYMBOL || sym == RARE_SYMBOL {
        tree.set_symbol(leaf, Symbol::new(word));
      }
    }
  }

  /// Normalizes the numeric and rare leaves of a training tree
  pub fn update_tree(&self, tree: &mut ParseTree, min_count: usize) {
    for leaf in tree.leaves() {
      if let Some(sym) = self.exceptional_symbol(tree.symbol(leaf).as_str(), min_count) {
        tree.set_symbol(leaf, sym);
      }
    }
  }
}

impl Grammar<()> {
  /// Collects one rule per local subtree of the given trees. The lexicon is
  /// counted from the leaves first so rare words can be folded into `_rare_`.
  pub fn from_trees(trees: &[ParseTree], min_count: usize) -> Self {
    let mut grammar = Self::new();
    grammar.construct_dictionary(trees);
    for tree in trees {
      let mut tree = tree.clone();
      grammar.update_tree(&mut tree, min_count);
      for idx in tree.preorder() {
        if let Some(rule) = tree.to_rule(idx, true, ()) {
          grammar.add_rule(rule);
        }
      }
    }
    grammar.update_types();
    grammar.min_count = min_count;
    debug!(rules = grammar.len(), trees = trees.len(), "built grammar from trees");
    grammar
  }
}

impl<W: Weight> fmt::Display for Grammar<W> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for rule in self.rules() {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rule(line: &str) -> Rule {
    line.parse().unwrap()
  }

  fn grammar(lines: &[&str]) -> Grammar {
    Grammar::from_rules(lines.iter().map(|l| rule(l)))
  }

  fn strings(rules: Vec<&Rule>) -> Vec<String> {
    let mut v = rules.iter().map(|r| r.to_string()).collect::<Vec<_>>();
    v.sort();
    v
  }

  #[test]
  fn test_add_is_idempotent() {
    let mut g = grammar(&["S -> NP VP", "NP -> dog"]);
    assert!(!g.add_rule(rule("S -> NP VP")));
    assert!(g.add_rule(rule("S -> VP NP")));
    assert_eq!(g.len(), 3);
    assert!(g.is_consistent());
  }

  #[test]
  fn test_indices_stay_consistent() {
    let mut g = grammar(&[
      "S -> NP VP",
      "VP -> V NP",
      "NP -> DT NN",
      "X -> DT NN",
      "Y -> DT NN",
      "NN -> dog",
      "V -> dog",
      "DT -> the",
    ]);
    assert!(g.is_consistent());

    assert!(g.remove_rule(&rule("X -> DT NN")).is_some());
    assert!(g.is_consistent());
    assert!(g.remove_rule(&rule("X -> DT NN")).is_none());

    g.add_rule(rule("Z -> DT NN"));
    g.add_rule(rule("A -> DT NN"));
    assert!(g.remove_rule(&rule("Y -> DT NN")).is_some());
    assert!(g.remove_rule(&rule("V -> dog")).is_some());
    assert!(g.is_consistent());

    let two = g.rules_with_two_non_terminals_on_right_side(&"DT".into(), &"NN".into());
    assert_eq!(strings(two), vec!["A -> DT NN", "NP -> DT NN", "Z -> DT NN"]);
    assert_eq!(g.len(), 7);
  }

  #[test]
  fn test_resort_reclaims_removed_slots() {
    let mut g = grammar(&["S -> NP VP", "NP -> NN", "NN -> dog", "VP -> barks", "S -> NP VP PP"]);
    g.remove_rule(&rule("S -> NP VP PP"));
    assert_eq!(g.slots.len(), 5);

    g.resort();
    assert_eq!(g.slots.len(), g.len());
    assert!(g.is_consistent());
    assert!(g.search_rule(&rule("NP -> NN")).is_some());

    g.convert_to_chomsky_normal_form();
    assert_eq!(g.slots.len(), g.len());
  }

  #[test]
  fn test_left_side_lookup() {
    let g = grammar(&["NP -> DT NN", "NP -> NN", "NP -> PRP", "S -> NP VP", "NN -> dog"]);
    assert_eq!(
      strings(g.rules_with_left_side(&"NP".into())),
      vec!["NP -> DT NN", "NP -> NN", "NP -> PRP"]
    );
    assert!(g.rules_with_left_side(&"VP".into()).is_empty());
  }

  #[test]
  fn test_right_side_lookups() {
    let g = grammar(&[
      "NN -> dog",
      "VB -> dog",
      "NP -> NN",
      "NP -> NN NN",
      "S -> NP VP",
      "VP -> VB",
    ]);

    assert_eq!(
      strings(g.terminal_rules_with_right_side(&"dog".into())),
      vec!["NN -> dog", "VB -> dog"]
    );
    // NP -> NN is a unit rule, not a terminal rule
    assert!(g.terminal_rules_with_right_side(&"NN".into()).is_empty());
    assert_eq!(
      strings(g.rules_with_right_side(&"NN".into())),
      vec!["NP -> NN"]
    );
    assert_eq!(
      strings(g.rules_with_two_non_terminals_on_right_side(&"NP".into(), &"VP".into())),
      vec!["S -> NP VP"]
    );
    assert!(
      g.rules_with_two_non_terminals_on_right_side(&"VP".into(), &"NP".into())
        .is_empty()
    );
  }

  #[test]
  fn test_classification_is_stable() {
    let mut g = grammar(&["S -> NP VP", "NP -> NN", "NN -> dog", "VP -> barks", "S -> NP VP PP"]);
    let kinds = g.rules().map(|r| r.kind).collect::<Vec<_>>();
    g.update_types();
    assert_eq!(kinds, g.rules().map(|r| r.kind).collect::<Vec<_>>());

    let kind_of = |line: &str| g.rule(g.search_rule(&rule(line)).unwrap()).kind;
    assert_eq!(kind_of("NP -> NN"), RuleKind::SingleNonTerminal);
    assert_eq!(kind_of("NN -> dog"), RuleKind::Terminal);
    assert_eq!(kind_of("S -> NP VP"), RuleKind::TwoNonTerminal);
    assert_eq!(kind_of("S -> NP VP PP"), RuleKind::MultipleNonTerminal);
  }

  #[test]
  fn test_tags_and_left_sides() {
    let g = grammar(&["VB -> run", "NN -> dog", "S -> NP VP", "NN -> cat", "NP -> DT NN"]);
    assert_eq!(g.part_of_speech_tags(), vec![Symbol::new("NN"), Symbol::new("VB")]);
    assert_eq!(
      g.all_left_sides(),
      ["NN", "NP", "S", "VB"].map(Symbol::new).to_vec()
    );
  }

  #[test]
  fn test_is_number() {
    assert!(is_number("42"));
    assert!(is_number("+3.14"));
    assert!(is_number(".5"));
    assert!(!is_number("."));
    assert!(!is_number("U.S."));
    assert!(!is_number("dog"));
  }

  #[test]
  fn test_exceptional_word_round_trip() {
    let mut g = grammar(&["S -> NN VB"]);
    g.add_word("dog".into(), 5);
    g.add_word("barks".into(), 1);
    g.set_min_count(2);

    let tokens = ["dog", "barks", "12"];
    let replaced = g.remove_exceptional_words(&tokens);
    assert_eq!(replaced, ["dog", "_rare_", "_num_"].map(Symbol::new).to_vec());

    // a word rule beats both the lexicon and the number pattern
    g.add_rule(rule("VB -> barks"));
    g.add_rule(rule("CD -> 12"));
    g.update_types();
    let replaced = g.remove_exceptional_words(&tokens);
    assert_eq!(replaced, ["dog", "barks", "12"].map(Symbol::new).to_vec());

    let mut tree: ParseTree = "(S (NN dog) (VP (VB _rare_) (CD _num_)))".parse().unwrap();
    g.reinsert_exceptional_words(&mut tree, &tokens);
    assert_eq!(tree.to_string(), "(S (NN dog) (VP (VB barks) (CD 12)))");
  }

  #[test]
  fn test_from_trees() {
    let trees = ["(S (NP-SBJ (DT the) (NN dog)) (VP (VBZ barks)))", "(S (NP (NN dog)) (VP (VBZ barks)))"]
      .iter()
      .map(|t| t.parse::<ParseTree>().unwrap())
      .collect::<Vec<_>>();

    let g = Grammar::<()>::from_trees(&trees, 2);
    assert!(g.is_consistent());
    assert_eq!(g.word_count("dog"), 2);
    assert_eq!(g.word_count("the"), 1);

    let rules = g.rules().map(|r| r.to_string()).collect::<Vec<_>>();
    assert_eq!(
      rules,
      vec![
        "DT -> _rare_",
        "NN -> dog",
        "NP -> DT NN",
        "NP -> NN",
        "S -> NP VP",
        "VBZ -> barks",
        "VP -> VBZ",
      ]
    );
  }
}
