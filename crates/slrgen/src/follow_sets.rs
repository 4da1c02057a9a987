//! Calculation of follow set function.

use crate::{
    first_sets::{FirstSets, TerminalSet},
    grammar::{Grammar, NonterminalID, SymbolID, TerminalID},
    types::Map,
    util::display_fn,
};
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub struct FollowSets {
    sets: Map<NonterminalID, TerminalSet>,
}

impl FollowSets {
    pub fn new(g: &Grammar, first_sets: &FirstSets) -> Self {
        let span = tracing::trace_span!("follow_sets");
        let _entered = span.enter();

        let mut sets: Map<NonterminalID, TerminalSet> = g
            .nonterminals()
            .map(|n| (n.id(), TerminalSet::default()))
            .collect();

        // the end of input always follows the start symbols.
        for n in [NonterminalID::START, g.start_symbol()] {
            if let Some(set) = sets.get_mut(&n) {
                set.insert(TerminalID::EOI);
            }
        }

        // For each occurrence `M -> α N β`:
        //  1. `Follow(N) ⊇ First(β) \ {ε}`
        //  2. `Follow(N) ⊇ Follow(M)` if β is nullable.
        #[derive(Debug)]
        struct Constraint {
            sup: NonterminalID,
            sub: NonterminalID,
        }
        let mut constraints = vec![];
        for p in g.productions() {
            for (i, symbol) in p.right().iter().enumerate() {
                let SymbolID::N(n) = *symbol else {
                    continue;
                };
                let rest = first_sets.of_sequence(&p.right()[i + 1..]);
                if let Some(set) = sets.get_mut(&n) {
                    set.union_with(rest.terminals());
                }
                if rest.is_nullable() && p.left() != n {
                    constraints.push(Constraint {
                        sup: n,
                        sub: p.left(),
                    });
                }
            }
        }

        let mut rounds = 0;
        let mut changed = true;
        while changed {
            changed = false;
            rounds += 1;
            for Constraint { sup, sub } in &constraints {
                let added = sets.get(sub).cloned().unwrap_or_default();
                if let Some(superset) = sets.get_mut(sup) {
                    changed |= superset.union_with(&added);
                }
            }
        }
        tracing::debug!(
            "resolved {} constraints in {} rounds",
            constraints.len(),
            rounds
        );

        Self { sets }
    }

    pub fn get(&self, n: NonterminalID) -> Option<&TerminalSet> {
        self.sets.get(&n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NonterminalID, &TerminalSet)> + '_ {
        self.sets.iter().map(|(n, set)| (*n, set))
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (n, set) in &self.sets {
                writeln!(f, "FOLLOW({}) = {}", g.nonterminal_name(*n), set.display(g))?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    fn follow_names(g: &Grammar, follow: &FollowSets, name: &str) -> Vec<String> {
        let n = g.nonterminal_by_name(name).unwrap();
        follow
            .get(n)
            .unwrap()
            .iter()
            .map(|t| g.terminal_name(t).to_owned())
            .collect()
    }

    #[test]
    fn textbook() {
        let g = Grammar::textbook();
        let follow = FollowSets::new(&g, &FirstSets::new(&g));

        assert_eq!(follow_names(&g, &follow, "E"), ["$", "+", ")"]);
        assert_eq!(follow_names(&g, &follow, "T"), ["$", "+", "*", ")"]);
        assert_eq!(follow_names(&g, &follow, "F"), ["$", "+", "*", ")"]);
        assert_eq!(follow_names(&g, &follow, "E'"), ["$"]);
        assert_eq!(
            follow.get(g.start_symbol()).unwrap().display(&g).to_string(),
            "{ $ + ) }"
        );
    }

    #[test]
    fn nullable_suffix() {
        // S -> A B c ; A -> a ; B -> b | %empty
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let b = g.terminal("b")?;
            let c = g.terminal("c")?;
            let s = g.nonterminal("S")?;
            let na = g.nonterminal("A")?;
            let nb = g.nonterminal("B")?;
            g.production(s, [N(na), N(nb), T(c)])?;
            g.production(na, [T(a)])?;
            g.production(nb, [T(b)])?;
            g.production(nb, [])?;
            Ok(())
        })
        .unwrap();
        let follow = FollowSets::new(&g, &FirstSets::new(&g));

        assert_eq!(follow_names(&g, &follow, "A"), ["b", "c"]);
        assert_eq!(follow_names(&g, &follow, "B"), ["c"]);
        assert_eq!(follow_names(&g, &follow, "S"), ["$"]);
    }

    #[test]
    fn trailing_nullables_inherit_lhs_follow() {
        // S -> x A y ; A -> B C ; B -> b ; C -> c | %empty
        let g = Grammar::define(|g| {
            let x = g.terminal("x")?;
            let y = g.terminal("y")?;
            let b = g.terminal("b")?;
            let c = g.terminal("c")?;
            let s = g.nonterminal("S")?;
            let na = g.nonterminal("A")?;
            let nb = g.nonterminal("B")?;
            let nc = g.nonterminal("C")?;
            g.production(s, [T(x), N(na), T(y)])?;
            g.production(na, [N(nb), N(nc)])?;
            g.production(nb, [T(b)])?;
            g.production(nc, [T(c)])?;
            g.production(nc, [])?;
            Ok(())
        })
        .unwrap();
        let follow = FollowSets::new(&g, &FirstSets::new(&g));

        assert_eq!(follow_names(&g, &follow, "A"), ["y"]);
        assert_eq!(follow_names(&g, &follow, "B"), ["y", "c"]);
        assert_eq!(follow_names(&g, &follow, "C"), ["y"]);
    }

    #[test]
    fn idempotent() {
        let g = Grammar::textbook();
        let first = FirstSets::new(&g);
        assert_eq!(FollowSets::new(&g, &first), FollowSets::new(&g, &first));
    }
}
