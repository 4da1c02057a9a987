//! LR(0) items and the canonical collection of item sets.

use crate::{
    grammar::{Grammar, ProductionID, SymbolID},
    types::Map,
    util::display_fn,
};
use std::{
    collections::{btree_set, BTreeSet},
    fmt,
};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(usize);
impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}
impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
impl StateID {
    /// The state containing the closure of `START -> . start`.
    pub const INITIAL: Self = Self(0);

    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> usize {
        self.0
    }
}

/// The LR(0) item, a production with a marker position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LR0Item {
    pub production: ProductionID,
    pub index: u16,
}

impl LR0Item {
    /// Return the symbol just after the marker, if any.
    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.production(self.production)?
            .right()
            .get(usize::from(self.index))
            .copied()
    }

    /// Return the item whose marker is moved past the next symbol.
    pub fn advance(&self) -> Self {
        Self {
            index: self.index + 1,
            ..*self
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let Some(production) = g.production(self.production) else {
                return write!(f, "<unknown production {}>", self.production);
            };
            write!(f, "{} ->", g.nonterminal_name(production.left()))?;
            for (i, symbol) in production.right().iter().enumerate() {
                if i == usize::from(self.index) {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if production.right().len() == usize::from(self.index) {
                f.write_str(" .")?;
            }
            Ok(())
        })
    }
}

/// A set of LR(0) items, compared as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemSet {
    items: BTreeSet<LR0Item>,
}

impl ItemSet {
    pub fn contains(&self, item: &LR0Item) -> bool {
        self.items.contains(item)
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn iter(&self) -> btree_set::Iter<'_, LR0Item> {
        self.items.iter()
    }
}

impl FromIterator<LR0Item> for ItemSet {
    fn from_iter<I: IntoIterator<Item = LR0Item>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ItemSet {
    type Item = &'a LR0Item;
    type IntoIter = btree_set::Iter<'a, LR0Item>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Expand the items until every nonterminal after a marker has its
/// productions in the set.
pub fn closure<I>(g: &Grammar, items: I) -> ItemSet
where
    I: IntoIterator<Item = LR0Item>,
{
    let mut set = ItemSet::default();
    let mut pending = vec![];
    for item in items {
        if set.items.insert(item) {
            pending.push(item);
        }
    }

    while let Some(item) = pending.pop() {
        if let Some(SymbolID::N(n)) = item.next_symbol(g) {
            for p in g.productions_of(n) {
                let added = LR0Item {
                    production: p.id(),
                    index: 0,
                };
                if set.items.insert(added) {
                    pending.push(added);
                }
            }
        }
    }

    set
}

/// Compute the item set reached from `items` by reading `symbol`.
///
/// The result is empty if no item in `items` has `symbol` after its marker.
pub fn goto(g: &Grammar, items: &ItemSet, symbol: SymbolID) -> ItemSet {
    closure(
        g,
        items
            .iter()
            .filter(|item| item.next_symbol(g) == Some(symbol))
            .map(LR0Item::advance),
    )
}

#[derive(Debug, Clone)]
pub struct LR0State {
    items: ItemSet,
    transitions: Map<SymbolID, StateID>,
}

impl LR0State {
    pub fn items(&self) -> &ItemSet {
        &self.items
    }

    pub fn transition(&self, symbol: SymbolID) -> Option<StateID> {
        self.transitions.get(&symbol).copied()
    }

    /// Iterate over the outgoing edges in ascending symbol order.
    pub fn transitions(&self) -> impl Iterator<Item = (SymbolID, StateID)> + '_ {
        self.transitions.iter().map(|(s, to)| (*s, *to))
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for item in &self.items {
                writeln!(f, "  {}", item.display(g))?;
            }
            if !self.transitions.is_empty() {
                writeln!(f, "  ## edges:")?;
                for (symbol, to) in &self.transitions {
                    writeln!(f, "  - {} => I{}", g.symbol_name(*symbol), to)?;
                }
            }
            Ok(())
        })
    }
}

/// The LR(0) automaton: states are item sets, indexed in discovery order.
#[derive(Debug)]
pub struct CanonicalCollection {
    states: Vec<LR0State>,
}

impl CanonicalCollection {
    /// Calculate the LR(0) automaton based on the specified grammar.
    pub fn new(g: &Grammar) -> Self {
        let span = tracing::trace_span!("canonical_collection");
        let _entered = span.enter();

        let initial = closure(
            g,
            Some(LR0Item {
                production: ProductionID::ACCEPT,
                index: 0,
            }),
        );

        let mut known = Map::<ItemSet, StateID>::default();
        known.insert(initial.clone(), StateID::INITIAL);
        let mut states = vec![LR0State {
            items: initial,
            transitions: Map::default(),
        }];

        // `states` grows while it is scanned and so doubles as the work queue.
        let mut current = 0;
        while current < states.len() {
            let symbols: BTreeSet<SymbolID> = states[current]
                .items
                .iter()
                .filter_map(|item| item.next_symbol(g))
                .collect();

            let mut transitions = Map::default();
            for symbol in symbols {
                let items = goto(g, &states[current].items, symbol);
                let next = match known.get(&items) {
                    Some(id) => *id,
                    None => {
                        let id = StateID(states.len());
                        tracing::trace!(
                            "new state {:?} on {:?} from S#{:03}",
                            id,
                            symbol,
                            current
                        );
                        known.insert(items.clone(), id);
                        states.push(LR0State {
                            items,
                            transitions: Map::default(),
                        });
                        id
                    }
                };
                transitions.insert(symbol, next);
            }
            states[current].transitions = transitions;
            current += 1;
        }

        tracing::debug!("constructed {} LR(0) states", states.len());
        Self { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, id: StateID) -> Option<&LR0State> {
        self.states.get(id.0)
    }

    pub fn states(&self) -> impl Iterator<Item = (StateID, &LR0State)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(i, state)| (StateID(i), state))
    }

    pub fn transition(&self, from: StateID, symbol: SymbolID) -> Option<StateID> {
        self.state(from)?.transition(symbol)
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, state) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "I{}:", i)?;
                write!(f, "{}", state.display(g))?;
            }
            Ok(())
        })
    }
}
