#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod utils;

pub mod chart;
pub mod chomsky;
pub mod cyk;
pub mod grammar;
pub mod ordering;
pub mod parse_grammar;
pub mod parse_tree;
pub mod probabilistic;
pub mod rules;

pub use crate::cyk::{CykParser, ProbabilisticCykParser, SyntacticParser};
pub use crate::grammar::{Grammar, ProbabilisticGrammar, RuleId};
pub use crate::parse_tree::ParseTree;
pub use crate::rules::{Probability, Rule, RuleKind, Symbol, Weight};
pub use crate::utils::Err;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parse_grammar::parse_trees;

  const TREEBANK: &str = r#"
    ( (S (NP (DT the) (JJ big) (NN dog)) (VP (VBZ barks))) )
    ( (S (NP-SBJ (DT the) (NN cat)) (VP (VBZ sees) (NP (DT the) (NN dog)))) )
    ( (S (NP (NNP Rex)) (VP (VBZ sees) (NP (CD 3) (NNS cats)))) )
  "#;

  #[test]
  fn test_training_trees_are_recovered() {
    let trees = parse_trees(TREEBANK).unwrap();
    let mut g = Grammar::<()>::from_trees(&trees, 1);
    g.convert_to_chomsky_normal_form();

    let parser = CykParser::new(&g);
    let parsed = parser.parse(&["the", "big", "dog", "barks"]);
    assert_eq!(parsed.len(), 1);
    // VP -> VBZ was folded into VP -> barks
    assert_eq!(
      parsed[0].to_string(),
      "(S (NP (DT the) (JJ big) (NN dog)) (VP barks))"
    );

    let parsed = parser.parse(&["the", "cat", "sees", "the", "dog"]);
    assert_eq!(parsed.len(), 1);
    assert_eq!(
      parsed[0].to_string(),
      "(S (NP (DT the) (NN cat)) (VP (VBZ sees) (NP (DT the) (NN dog))))"
    );

    // numbers are parsed through `_num_` and put back afterwards
    let parsed = parser.parse(&["the", "big", "dog", "sees", "12", "cats"]);
    assert_eq!(parsed.len(), 1);
    assert_eq!(
      parsed[0].to_string(),
      "(S (NP (DT the) (JJ big) (NN dog)) (VP (VBZ sees) (NP (CD 12) (NNS cats))))"
    );
  }

  #[test]
  fn test_conversion_keeps_the_language() {
    let src = "S -> NP VP\nNP -> DT ADJ NN\nNP -> NN\nADJ -> JJ\nADJ -> RB JJ\nDT -> the\nNN -> dog\nJJ -> big\nRB -> very\nVP -> barks";
    let mut g: Grammar = src.parse().unwrap();

    // before conversion, the unit and long rules are invisible to the parser
    let before = CykParser::new(&g);
    assert!(before.parse(&["dog", "barks"]).is_empty());

    g.convert_to_chomsky_normal_form();
    let after = CykParser::new(&g);
    for sentence in [
      "dog barks",
      "the big dog barks",
      "the very big dog barks",
    ] {
      let tokens: Vec<&str> = sentence.split_whitespace().collect();
      let trees = after.parse(&tokens);
      assert_eq!(trees.len(), 1, "{}", sentence);
      assert_eq!(trees[0].words(), tokens);
    }
    assert!(after.parse(&["the", "dog", "barks"]).is_empty());
    assert!(after.parse(&["big", "dog", "barks"]).is_empty());
  }

  #[test]
  fn test_conversion_keeps_the_bracketing() {
    let src = "S -> NP VP\nNP -> DT JJ JJ NN\nNP -> DT NN\nVP -> VBZ NP PP\nPP -> IN NP\n\
               DT -> the\nJJ -> big\nJJ -> old\nNN -> dog\nNN -> cat\nNN -> park\nVBZ -> sees\nIN -> in";
    let mut g: Grammar = src.parse().unwrap();
    g.convert_to_chomsky_normal_form();
    assert_eq!(g.helper_symbols().len(), 3);

    let expected: ParseTree = "(S (NP (DT the) (JJ big) (JJ old) (NN dog)) \
                               (VP (VBZ sees) (NP (DT the) (NN cat)) (PP (IN in) (NP (DT the) (NN park)))))"
      .parse()
      .unwrap();
    let tokens = expected.words();
    assert_eq!(CykParser::new(&g).parse(&tokens), vec![expected.clone()]);

    // the derivation read off the tree is exactly the original long rules
    let rules: Vec<String> = expected
      .preorder()
      .into_iter()
      .filter_map(|idx| expected.to_rule(idx, false, ()))
      .filter(|r| r.len() > 2)
      .map(|r| r.to_string())
      .collect();
    assert_eq!(rules, vec!["NP -> DT JJ JJ NN", "VP -> VBZ NP PP"]);
  }

  #[test]
  fn test_probabilistic_end_to_end() {
    let trees = parse_trees(TREEBANK).unwrap();
    let mut g = ProbabilisticGrammar::from_trees(&trees, 1);
    let tree: ParseTree = "(S (NP (DT the) (NN cat)) (VP (VBZ sees) (NP (DT the) (NN dog))))"
      .parse()
      .unwrap();
    let expected = g.tree_log_probability(&tree).unwrap();

    g.convert_to_chomsky_normal_form();
    let scored = ProbabilisticCykParser::new(&g).parse_scored(&["the", "cat", "sees", "the", "dog"]);
    assert_eq!(scored.len(), 1);
    assert_eq!(scored[0].0, tree);
    assert!((scored[0].1 - expected).abs() < 1e-9);
  }

  #[test]
  fn test_parallel_parsing() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Grammar>();
    assert_send_sync::<ProbabilisticGrammar>();

    let mut g = Grammar::<()>::from_trees(&parse_trees(TREEBANK).unwrap(), 1);
    g.convert_to_chomsky_normal_form();

    let sentences = ["the big dog barks", "the cat sees the dog", "Rex sees 3 cats"];
    let counts: Vec<usize> = std::thread::scope(|s| {
      let handles: Vec<_> = sentences
        .iter()
        .map(|sentence| {
          let g = &g;
          s.spawn(move || {
            let tokens: Vec<&str> = sentence.split_whitespace().collect();
            CykParser::new(g).parse(&tokens).len()
          })
        })
        .collect();
      handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![1, 1, 1]);
  }
}
