use std::collections::HashSet;

use tracing::{debug, trace};

use crate::grammar::{Grammar, RuleId};
use crate::rules::{HELPER_PREFIX, Rule, RuleKind, Symbol, Weight};

impl<W: Weight> Grammar<W> {
  /// Rewrites the grammar so every rule is either `X -> a` or `X -> Y Z`.
  ///
  /// First every unit rule `X -> Y` is replaced by `X -> beta` for each
  /// `Y -> beta`. Then every long rule `A -> B C ...` gets its leading pair
  /// factored out into a new `Xk -> B C`, in all long rules at once, until no
  /// long rules are left. Both indices are re-sorted once at the end.
  pub fn convert_to_chomsky_normal_form(&mut self) {
    let before = self.len();
    self.remove_single_non_terminals();
    let helpers = self.binarize_multiple_non_terminals();
    self.resort();
    debug_assert!(self.is_consistent(), "indices out of sync after conversion");
    debug!(before, after = self.len(), helpers, "converted to chomsky normal form");
  }

  /// The right side of the first unit rule that is not `X -> X` and whose
  /// right side hasn't been eliminated yet
  fn single_non_terminal_candidate(&self, removed: &HashSet<Symbol>) -> Option<Symbol> {
    self
      .rules()
      .find(|r| {
        r.kind == RuleKind::SingleNonTerminal
          && !r.is_left_recursive()
          && !removed.contains(&r.right[0])
      })
      .map(|r| r.right[0].clone())
  }

  fn remove_single_non_terminals(&mut self) {
    // each symbol is eliminated at most once, which is what makes cycles of
    // unit rules terminate
    let mut removed = HashSet::new();

    while let Some(candidate) = self.single_non_terminal_candidate(&removed) {
      trace!(%candidate, "eliminating unit rules");
      for unit_id in self.right_side_ids(&candidate) {
        let unit = self.rule(unit_id).clone();
        for inner_id in self.left_side_ids(&candidate) {
          let inner = self.rule(inner_id);
          let derived = Rule::with_kind(
            unit.left.clone(),
            inner.right.clone(),
            inner.kind,
            unit.weight.chain(&inner.weight),
          );
          self.add_rule(derived);
        }
        self.remove_rule(&unit);
      }
      removed.insert(candidate);
    }
  }

  fn multiple_non_terminal_candidate(&self) -> Option<RuleId> {
    self
      .rule_ids()
      .iter()
      .copied()
      .find(|&id| self.rule(id).kind == RuleKind::MultipleNonTerminal)
  }

  /// Mints `X<n>` for the next unused `n`, skipping names in `taken`, and
  /// remembers it as a helper
  fn fresh_helper_symbol(&mut self, taken: &HashSet<Symbol>) -> Symbol {
    loop {
      let sym = Symbol::new(&format!("{}{}", HELPER_PREFIX, self.next_helper));
      self.next_helper += 1;
      if !taken.contains(&sym) {
        self.helpers.insert(sym.clone());
        return sym;
      }
    }
  }

  /// Returns how many helper symbols were minted
  fn binarize_multiple_non_terminals(&mut self) -> usize {
    let mut minted = 0;
    // every symbol of the grammar, on either side
    let taken: HashSet<Symbol> = self
      .rules()
      .flat_map(|r| std::iter::once(&r.left).chain(r.right.iter()))
      .cloned()
      .collect();

    while let Some(candidate) = self.multiple_non_terminal_candidate() {
      let (first, second) = {
        let rule = self.rule(candidate);
        (rule.right[0].clone(), rule.right[1].clone())
      };
      let helper = self.fresh_helper_symbol(&taken);
      trace!(%helper, %first, %second, "factoring out pair");

      for pos in 0..self.len() {
        let id = self.rule_ids()[pos];
        let rule = self.rule_mut(id);
        if rule.kind == RuleKind::MultipleNonTerminal {
          rule.replace_pair(&first, &second, &helper);
        }
      }

      // the rewrites above already broke the sort order, so the new rule just
      // goes at the end until the final re-sort
      self.push_unsorted(Rule::with_kind(
        helper,
        vec![first, second],
        RuleKind::TwoNonTerminal,
        W::helper(),
      ));
      minted += 1;
    }

    minted
  }
}
