//! Reading rule files, lexicons and bracketed trees

use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::Err;
use crate::grammar::Grammar;
use crate::parse_tree::{NodeIdx, ParseTree};
use crate::rules::{Probability, Rule, Symbol, Weight};

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// Try to consume a regex at the start of `s`, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => {
      let (matched, rest) = s.split_at(m.end());
      (Some(matched), rest)
    }
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", re, s).into())
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// Tries to skip 1 or more \s characters
fn skip_whitespace(s: &str) -> &str {
  s.trim_start()
}

/// Splits `LEFT -> R1 R2 ... [p]` into its sides and the optional bracketed
/// probability
fn split_rule(line: &str) -> Result<(Symbol, Vec<Symbol>, Option<f64>), Err> {
  regex_static!(PROBABILITY, r"\[\s*([^\]\s]+)\s*\]\s*$");

  let (left, right) = line
    .split_once("->")
    .ok_or_else(|| format!("missing -> in rule {:?}", line))?;

  let left = left.trim();
  if left.is_empty() || left.contains(char::is_whitespace) {
    return Err(format!("bad left side in rule {:?}", line).into());
  }

  let (right, probability) = match PROBABILITY.captures(right) {
    Some(caps) => {
      let start = caps.get(0).map_or(right.len(), |m| m.start());
      let p = &caps[1];
      let p: f64 = p
        .parse()
        .map_err(|e| format!("bad probability {:?} in rule {:?}: {}", p, line, e))?;
      if !(0.0..=1.0).contains(&p) {
        return Err(format!("probability {} out of range in rule {:?}", p, line).into());
      }
      (&right[..start], Some(p))
    }
    None => (right, None),
  };

  let right = right.split_whitespace().map(Symbol::new).collect::<Vec<_>>();
  Ok((Symbol::new(left), right, probability))
}

/// Plain rules. A trailing probability, if any, is ignored.
impl FromStr for Rule<()> {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (left, right, _) = split_rule(s)?;
    Rule::new(left, right, ())
  }
}

/// Probabilistic rules must end with `[p]`
impl FromStr for Rule<Probability> {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (left, right, probability) = split_rule(s)?;
    let probability = probability.ok_or_else(|| format!("missing [probability] in rule {:?}", s))?;
    Rule::new(left, right, Probability::new(probability))
  }
}

fn non_blank_lines(src: &str) -> impl Iterator<Item = (usize, &str)> {
  src
    .lines()
    .enumerate()
    .map(|(idx, line)| (idx + 1, line.trim()))
    .filter(|(_, line)| !line.is_empty())
}

/// Parses a rule file, one rule per line
pub fn parse_rules<W>(src: &str) -> Result<Vec<Rule<W>>, Err>
where
  W: Weight,
  Rule<W>: FromStr<Err = Err>,
{
  non_blank_lines(src)
    .map(|(number, line)| line.parse().map_err(|e| format!("rule line {}: {}", number, e).into()))
    .collect()
}

/// Parses a lexicon, one `word count` pair per line
pub fn parse_lexicon(src: &str) -> Result<Vec<(Symbol, usize)>, Err> {
  non_blank_lines(src)
    .map(|(number, line)| -> Result<(Symbol, usize), Err> {
      let mut items = line.split_whitespace();
      match (items.next(), items.next(), items.next()) {
        (Some(word), Some(count), None) => {
          let count = count
            .parse()
            .map_err(|e| format!("lexicon line {}: bad count {:?}: {}", number, count, e))?;
          Ok((Symbol::new(word), count))
        }
        _ => Err(format!("lexicon line {}: expected `word count`, got {:?}", number, line).into()),
      }
    })
    .collect()
}

impl<W> Grammar<W>
where
  W: Weight,
  Rule<W>: FromStr<Err = Err>,
{
  /// Builds a grammar from the text of a rule file and of a lexicon
  pub fn from_text(rules: &str, lexicon: &str, min_count: usize) -> Result<Self, Err> {
    let mut grammar = Self::from_rules(parse_rules(rules)?);
    for (word, count) in parse_lexicon(lexicon)? {
      grammar.add_word(word, count);
    }
    grammar.set_min_count(min_count);
    Ok(grammar)
  }

  pub fn read_from_files<P, Q>(rule_path: P, lexicon_path: Q, min_count: usize) -> Result<Self, Err>
  where
    P: AsRef<Path>,
    Q: AsRef<Path>,
  {
    let rules = fs::read_to_string(rule_path.as_ref())
      .map_err(|e| format!("{}: {}", rule_path.as_ref().display(), e))?;
    let lexicon = fs::read_to_string(lexicon_path.as_ref())
      .map_err(|e| format!("{}: {}", lexicon_path.as_ref().display(), e))?;
    Self::from_text(&rules, &lexicon, min_count)
  }
}

/// Parses a grammar from rule lines alone, with an empty lexicon
impl<W> FromStr for Grammar<W>
where
  W: Weight,
  Rule<W>: FromStr<Err = Err>,
{
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let rules = parse_rules(s)?;
    if rules.is_empty() {
      Err("empty ruleset".into())
    } else {
      Ok(Self::from_rules(rules))
    }
  }
}

/// A bracketed tree before it's moved into an arena
enum Bracketed<'a> {
  Word(&'a str),
  Phrase(&'a str, Vec<Bracketed<'a>>),
}

regex_static!(WORD, r"^[^\s()]+");

/// `word`, `(LABEL child ...)`, or `(child ...)` for an unlabeled node
fn parse_bracketed(s: &str) -> ParseResult<'_, Bracketed<'_>> {
  let (open, s) = optional_char('(', s);
  if open.is_none() {
    let (word, s) = needed_re(&WORD, s).map_err(|e| -> Err { format!("word: {}", e).into() })?;
    return Ok((Bracketed::Word(word), s));
  }

  let (label, mut rem) = optional_re(&WORD, skip_whitespace(s));
  let mut children = Vec::new();
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), rest) = optional_char(')', rem) {
      return Ok((Bracketed::Phrase(label.unwrap_or(""), children), rest));
    }
    if rem.is_empty() {
      return Err(format!("unclosed bracket after {}", label.unwrap_or("(")).into());
    }
    let (child, rest) = parse_bracketed(rem)?;
    children.push(child);
    rem = rest;
  }
}

fn add_children(tree: &mut ParseTree, parent: NodeIdx, children: Vec<Bracketed>) {
  for child in children {
    match child {
      Bracketed::Word(word) => {
        tree.add_child(parent, Symbol::new(word));
      }
      Bracketed::Phrase(label, grandchildren) => {
        let idx = tree.add_child(parent, Symbol::new(label));
        add_children(tree, idx, grandchildren);
      }
    }
  }
}

fn into_tree(bracketed: Bracketed) -> ParseTree {
  match bracketed {
    Bracketed::Word(word) => ParseTree::new(Symbol::new(word)),
    Bracketed::Phrase(label, children) => {
      let mut tree = ParseTree::new(Symbol::new(label));
      let root = tree.root();
      add_children(&mut tree, root, children);
      tree
    }
  }
}

/// Parses one tree in the `(S (NP (DT the) (NN dog)) (VP (VBZ barks)))` format
impl FromStr for ParseTree {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (bracketed, rest) = parse_bracketed(skip_whitespace(s))?;
    if !skip_whitespace(rest).is_empty() {
      return Err(format!("trailing input after tree: {}", rest.trim()).into());
    }
    Ok(into_tree(bracketed))
  }
}

/// Parses every tree in a treebank file. Trees may span several lines.
pub fn parse_trees(src: &str) -> Result<Vec<ParseTree>, Err> {
  let mut trees = Vec::new();
  let mut rem = skip_whitespace(src);
  while !rem.is_empty() {
    let (bracketed, rest) = parse_bracketed(rem).map_err(|e| format!("tree {}: {}", trees.len() + 1, e))?;
    trees.push(into_tree(bracketed));
    rem = skip_whitespace(rest);
  }
  Ok(trees)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::ProbabilisticGrammar;
  use crate::rules::RuleKind;

  #[test]
  fn test_parse_plain_rule() {
    let rule: Rule = "NP -> DT JJ NN".parse().unwrap();
    assert_eq!(rule.left, Symbol::new("NP"));
    assert_eq!(rule.right.len(), 3);
    assert_eq!(rule.kind, RuleKind::MultipleNonTerminal);
    assert_eq!(rule.to_string(), "NP -> DT JJ NN");
  }

  #[test]
  fn test_parse_probabilistic_rule() {
    let rule: Rule<Probability> = "S -> NP VP [0.75]".parse().unwrap();
    assert_eq!(rule.right, vec![Symbol::new("NP"), Symbol::new("VP")]);
    assert_eq!(rule.weight.probability, 0.75);

    assert!("S -> NP VP".parse::<Rule<Probability>>().is_err());
    assert!("S -> NP VP [lots]".parse::<Rule<Probability>>().is_err());
    assert!("S -> NP VP [1.5]".parse::<Rule<Probability>>().is_err());
  }

  #[test]
  fn test_malformed_rules() {
    assert!("S NP VP".parse::<Rule>().is_err());
    assert!("S ->".parse::<Rule>().is_err());
    assert!("S -> [0.5]".parse::<Rule<Probability>>().is_err());
    assert!(" -> NP".parse::<Rule>().is_err());
  }

  #[test]
  fn test_punctuation_symbols() {
    let rule: Rule = "-LRB- -> -LRB-".parse().unwrap();
    assert_eq!(rule.left, Symbol::new("-LRB-"));
    assert_eq!(rule.right, vec![Symbol::new("-LRB-")]);
  }

  #[test]
  fn test_from_text() {
    let g: ProbabilisticGrammar = Grammar::from_text(
      "S -> NP VP [1.0]\n\nNP -> dog [1.0]\nVP -> barks [1.0]\n",
      "dog 3\nbarks 1\n",
      2,
    )
    .unwrap();
    assert_eq!(g.len(), 3);
    assert_eq!(g.word_count("dog"), 3);
    assert_eq!(g.min_count(), 2);

    let err = Grammar::<()>::from_text("S -> NP VP\nS NP\n", "", 1).unwrap_err();
    assert!(err.to_string().starts_with("rule line 2"), "{}", err);
    let err = Grammar::<()>::from_text("S -> NP VP\n", "dog three\n", 1).unwrap_err();
    assert!(err.to_string().starts_with("lexicon line 1"), "{}", err);
  }

  #[test]
  fn test_grammar_from_str() {
    let g: Grammar = "S -> NP VP\nNP -> dog\nVP -> barks".parse().unwrap();
    assert_eq!(g.len(), 3);
    assert!("".parse::<Grammar>().is_err());
  }

  #[test]
  fn test_parse_tree() {
    let src = "(S (NP (DT the) (NN dog)) (VP (VBZ barks)))";
    let tree: ParseTree = src.parse().unwrap();
    assert_eq!(tree.to_string(), src);
    assert_eq!(tree.words(), vec!["the", "dog", "barks"]);

    let spaced: ParseTree = "(S\n  (NP (NN dog))\n  (VP (VBZ barks)) )".parse().unwrap();
    assert_eq!(spaced.to_string(), "(S (NP (NN dog)) (VP (VBZ barks)))");

    assert!("(S (NP dog)".parse::<ParseTree>().is_err());
    assert!("(S dog) extra".parse::<ParseTree>().is_err());
  }

  #[test]
  fn test_parse_treebank() {
    let src = "( (S (NP (NN dog)) (VP (VBZ barks))) )\n( (S (NP (NN cat))\n  (VP (VBZ sleeps))) )\n";
    let trees = parse_trees(src).unwrap();
    assert_eq!(trees.len(), 2);

    let root = trees[1].root();
    assert_eq!(trees[1].symbol(root).as_str(), "");
    assert_eq!(trees[1].words(), vec!["cat", "sleeps"]);
  }
}
