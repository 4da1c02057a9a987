//! Calculation of first set function.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID, TerminalID},
    types::{Map, Set},
    util::{display_fn, display_list},
};
use std::fmt;

#[derive(Debug, Default, Clone)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.into_raw().into())
    }
    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.into_raw().into())
    }
    /// Add all elements of `other`, returning whether this set has grown.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let len = self.inner.len();
        self.inner.union_with(&other.inner);
        self.inner.len() != len
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner
            .iter()
            .filter_map(|raw| u16::try_from(raw).ok())
            .map(TerminalID::from_raw)
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let names: Vec<&str> = self.iter().map(|t| g.terminal_name(t)).collect();
            let res = write!(f, "{{ {} }}", display_list(&names, " "));
            res
        })
    }
}

impl PartialEq for TerminalSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}
impl Eq for TerminalSet {}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| t.into_raw().into()).collect(),
        }
    }
}

/// The FIRST set of a symbol or a string of symbols.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FirstSet {
    terminals: TerminalSet,
    nullable: bool,
}

impl FirstSet {
    /// The terminals that can begin a derivation.
    pub fn terminals(&self) -> &TerminalSet {
        &self.terminals
    }

    /// Whether the empty string can be derived.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            f.write_str("{")?;
            if self.nullable {
                f.write_str(" ε")?;
            }
            for t in self.terminals.iter() {
                write!(f, " {}", g.terminal_name(t))?;
            }
            f.write_str(" }")
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FirstSets {
    sets: Map<NonterminalID, FirstSet>,
}

impl FirstSets {
    pub fn new(g: &Grammar) -> Self {
        let span = tracing::trace_span!("first_sets");
        let _entered = span.enter();

        let nulls = nulls_set(g);
        let sets = first_sets(g, &nulls);
        Self { sets }
    }

    pub fn get(&self, n: NonterminalID) -> Option<&FirstSet> {
        self.sets.get(&n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NonterminalID, &FirstSet)> + '_ {
        self.sets.iter().map(|(n, set)| (*n, set))
    }

    pub fn is_nullable(&self, symbol: SymbolID) -> bool {
        match symbol {
            SymbolID::T(..) => false,
            SymbolID::N(n) => self.sets.get(&n).map_or(false, |set| set.nullable),
        }
    }

    /// `First(X)`
    pub fn of_symbol(&self, symbol: SymbolID) -> FirstSet {
        match symbol {
            SymbolID::T(t) => FirstSet {
                terminals: Some(t).into_iter().collect(),
                nullable: false,
            },
            SymbolID::N(n) => self.sets.get(&n).cloned().unwrap_or_default(),
        }
    }

    /// `First(X1 X2 ... Xn)`
    pub fn of_sequence(&self, symbols: &[SymbolID]) -> FirstSet {
        let mut res = FirstSet::default();
        for symbol in symbols {
            match symbol {
                SymbolID::T(t) => {
                    res.terminals.insert(*t);
                    return res;
                }
                SymbolID::N(n) => {
                    let Some(added) = self.sets.get(n) else {
                        return res;
                    };
                    res.terminals.union_with(&added.terminals);
                    if !added.nullable {
                        return res;
                    }
                }
            }
        }
        res.nullable = true;
        res
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (n, set) in &self.sets {
                writeln!(f, "FIRST({}) = {}", g.nonterminal_name(*n), set.display(g))?;
            }
            Ok(())
        })
    }
}

/// Calculate the set of nullable nonterminals in this grammar.
fn nulls_set(g: &Grammar) -> Set<NonterminalID> {
    let mut nulls = Set::default();
    let mut changed = true;
    while changed {
        changed = false;
        for p in g.productions() {
            if nulls.contains(&p.left()) {
                continue;
            }
            let is_rhs_nullable = p
                .right()
                .iter()
                .all(|s| matches!(s, SymbolID::N(n) if nulls.contains(n)));
            if is_rhs_nullable {
                changed |= nulls.insert(p.left());
            }
        }
    }
    nulls
}

fn first_sets(g: &Grammar, nulls: &Set<NonterminalID>) -> Map<NonterminalID, FirstSet> {
    let mut map: Map<NonterminalID, FirstSet> = g
        .nonterminals()
        .map(|n| {
            let set = FirstSet {
                terminals: TerminalSet::default(),
                nullable: nulls.contains(&n.id()),
            };
            (n.id(), set)
        })
        .collect();

    // For a production `X -> Y1 Y2 ... Yn`, let `Yk` be the first non-nullable
    // symbol. Then `First(X) ⊇ First(Yi)` for each i = 1, ..., k.
    #[derive(Debug)]
    struct Constraint {
        sup: NonterminalID,
        sub: SymbolID,
    }
    let mut constraints = vec![];
    for p in g.productions() {
        for symbol in p.right() {
            if *symbol != SymbolID::N(p.left()) {
                constraints.push(Constraint {
                    sup: p.left(),
                    sub: *symbol,
                });
            }
            if !matches!(symbol, SymbolID::N(n) if nulls.contains(n)) {
                break;
            }
        }
    }

    let mut rounds = 0;
    let mut changed = true;
    while changed {
        changed = false;
        rounds += 1;
        for Constraint { sup, sub } in &constraints {
            let added: TerminalSet = match sub {
                SymbolID::T(t) => Some(*t).into_iter().collect(),
                SymbolID::N(n) => map
                    .get(n)
                    .map(|set| set.terminals.clone())
                    .unwrap_or_default(),
            };
            if let Some(superset) = map.get_mut(sup) {
                changed |= superset.terminals.union_with(&added);
            }
        }
    }
    tracing::debug!(
        "resolved {} constraints in {} rounds",
        constraints.len(),
        rounds
    );

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    fn names(g: &Grammar, set: &FirstSet) -> Vec<String> {
        set.terminals()
            .iter()
            .map(|t| g.terminal_name(t).to_owned())
            .collect()
    }

    #[test]
    fn textbook() {
        let g = Grammar::textbook();
        let first = FirstSets::new(&g);
        for name in ["E", "T", "F"] {
            let set = first.get(g.nonterminal_by_name(name).unwrap()).unwrap();
            assert_eq!(names(&g, set), ["(", "i"], "FIRST({})", name);
            assert!(!set.is_nullable());
        }
        let start = first.get(NonterminalID::START).unwrap();
        assert_eq!(names(&g, start), ["(", "i"]);
    }

    #[test]
    fn nullable_prefix() {
        // S -> A B ; A -> a | %empty ; B -> b | %empty
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let b = g.terminal("b")?;
            let s = g.nonterminal("S")?;
            let na = g.nonterminal("A")?;
            let nb = g.nonterminal("B")?;
            g.production(s, [N(na), N(nb)])?;
            g.production(na, [T(a)])?;
            g.production(na, [])?;
            g.production(nb, [T(b)])?;
            g.production(nb, [])?;
            Ok(())
        })
        .unwrap();
        let first = FirstSets::new(&g);

        let s = first.get(g.start_symbol()).unwrap();
        assert_eq!(names(&g, s), ["a", "b"]);
        assert!(s.is_nullable());

        let na = g.nonterminal_by_name("A").unwrap();
        let a = first.get(na).unwrap();
        assert_eq!(names(&g, a), ["a"]);
        assert!(a.is_nullable());
        assert_eq!(a.display(&g).to_string(), "{ ε a }");
    }

    #[test]
    fn mutually_recursive_nullables() {
        // A -> B x | %empty ; B -> A y | %empty
        let g = Grammar::define(|g| {
            let x = g.terminal("x")?;
            let y = g.terminal("y")?;
            let a = g.nonterminal("A")?;
            let b = g.nonterminal("B")?;
            g.production(a, [N(b), T(x)])?;
            g.production(a, [])?;
            g.production(b, [N(a), T(y)])?;
            g.production(b, [])?;
            Ok(())
        })
        .unwrap();
        let first = FirstSets::new(&g);
        for name in ["A", "B"] {
            let set = first.get(g.nonterminal_by_name(name).unwrap()).unwrap();
            assert_eq!(names(&g, set), ["x", "y"], "FIRST({})", name);
            assert!(set.is_nullable());
        }
    }

    #[test]
    fn sequences() {
        let g = Grammar::textbook();
        let first = FirstSets::new(&g);
        let plus = g.terminal_by_name("+").unwrap();
        let e = g.nonterminal_by_name("E").unwrap();

        let empty = first.of_sequence(&[]);
        assert!(empty.is_nullable());
        assert!(empty.terminals().is_empty());

        let seq = first.of_sequence(&[T(plus), N(e)]);
        assert_eq!(names(&g, &seq), ["+"]);
        assert!(!seq.is_nullable());

        assert_eq!(first.of_symbol(N(e)), *first.get(e).unwrap());
        assert!(!first.is_nullable(T(plus)));
    }

    #[test]
    fn display_terminal_set() {
        let g = Grammar::textbook();
        let set: TerminalSet = ["i", "+"]
            .into_iter()
            .filter_map(|name| g.terminal_by_name(name))
            .chain(Some(TerminalID::EOI))
            .collect();
        assert_eq!(set.display(&g).to_string(), "{ $ + i }");
        assert_eq!(TerminalSet::default().display(&g).to_string(), "{  }");
    }

    #[test]
    fn idempotent() {
        let g = Grammar::textbook();
        assert_eq!(FirstSets::new(&g), FirstSets::new(&g));
    }
}
