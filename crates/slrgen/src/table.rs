//! Calculation of SLR(1) parse table.

use crate::{
    follow_sets::FollowSets,
    grammar::{Grammar, NonterminalID, ProductionID, SymbolID, TerminalID},
    lr0::{CanonicalCollection, StateID},
    types::Map,
    util::display_fn,
};
use std::fmt;

/// The action that the LR automaton in a state performs on a particular
/// lookahead symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read a lookahead symbol and transition to the specified state.
    Shift(StateID),

    /// Reduce to the specified production rule.
    Reduce(ProductionID),

    Accept,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift(next) => write!(f, "Shift {}", next),
            Self::Reduce(production) => write!(f, "Reduce {}", production),
            Self::Accept => f.write_str("Accept"),
        }
    }
}

/// Two different actions demanded for the same table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateID,
    pub terminal: TerminalID,
    pub existing: Action,
    pub incoming: Action,
}

impl Conflict {
    /// `"shift/reduce"`, `"reduce/reduce"` and so on.
    pub fn kind(&self) -> &'static str {
        use Action::*;
        match (self.existing, self.incoming) {
            (Shift(..), Reduce(..)) | (Reduce(..), Shift(..)) => "shift/reduce",
            (Reduce(..), Reduce(..)) => "reduce/reduce",
            (Accept, Reduce(..)) | (Reduce(..), Accept) => "reduce/accept",
            (Accept, Shift(..)) | (Shift(..), Accept) => "shift/accept",
            (Shift(..), Shift(..)) | (Accept, Accept) => "internal",
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        let describe = move |f: &mut fmt::Formatter<'_>, action: Action| match action {
            Action::Reduce(p) => match g.production(p) {
                Some(production) => write!(f, "{} ({})", action, production.display(g)),
                None => write!(f, "{}", action),
            },
            action => write!(f, "{}", action),
        };
        display_fn(move |f| {
            write!(
                f,
                "{} conflict in state {} on `{}': ",
                self.kind(),
                self.state,
                g.terminal_name(self.terminal)
            )?;
            describe(f, self.existing)?;
            f.write_str(" vs ")?;
            describe(f, self.incoming)
        })
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} conflict in state {} on terminal #{}: {} vs {}",
            self.kind(),
            self.state,
            self.terminal.into_raw(),
            self.existing,
            self.incoming
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("{}", _0)]
    Conflict(Conflict),

    #[error("production {} is not found in the grammar", _0)]
    ProductionNotFound(ProductionID),

    #[error("state {} has no transition on a symbol after its marker", state)]
    MissingTransition { state: StateID, symbol: SymbolID },
}

/// The action part of the parse table.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ActionTable {
    rows: Vec<Map<TerminalID, Action>>,
}

impl ActionTable {
    pub fn get(&self, state: StateID, terminal: TerminalID) -> Option<Action> {
        self.rows.get(state.into_raw())?.get(&terminal).copied()
    }

    /// Iterate over the non-empty cells of the specified state.
    pub fn row(&self, state: StateID) -> impl Iterator<Item = (TerminalID, Action)> + '_ {
        self.rows
            .get(state.into_raw())
            .into_iter()
            .flat_map(|row| row.iter().map(|(t, action)| (*t, *action)))
    }

    /// The number of states.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn set(
        &mut self,
        state: StateID,
        terminal: TerminalID,
        action: Action,
    ) -> Result<(), Conflict> {
        let row = &mut self.rows[state.into_raw()];
        match row.get(&terminal) {
            Some(existing) if *existing != action => Err(Conflict {
                state,
                terminal,
                existing: *existing,
                incoming: action,
            }),
            Some(..) => Ok(()),
            None => {
                row.insert(terminal, action);
                Ok(())
            }
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            // the end of input is the rightmost column.
            let columns: Vec<TerminalID> = g
                .terminals()
                .map(|t| t.id())
                .filter(|t| *t != TerminalID::EOI)
                .chain(Some(TerminalID::EOI))
                .collect();
            let header = columns.iter().map(|t| g.terminal_name(*t).to_owned());
            let rows = self.rows.iter().map(|row| {
                columns
                    .iter()
                    .map(|t| row.get(t).map(ToString::to_string).unwrap_or_default())
                    .collect()
            });
            write_grid(f, header.collect(), rows.collect())
        })
    }
}

/// The goto part of the parse table.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GotoTable {
    rows: Vec<Map<NonterminalID, StateID>>,
}

impl GotoTable {
    pub fn get(&self, state: StateID, symbol: NonterminalID) -> Option<StateID> {
        self.rows.get(state.into_raw())?.get(&symbol).copied()
    }

    pub fn row(&self, state: StateID) -> impl Iterator<Item = (NonterminalID, StateID)> + '_ {
        self.rows
            .get(state.into_raw())
            .into_iter()
            .flat_map(|row| row.iter().map(|(n, next)| (*n, *next)))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let columns: Vec<NonterminalID> = g
                .nonterminals()
                .map(|n| n.id())
                .filter(|n| *n != NonterminalID::START)
                .collect();
            let header = columns.iter().map(|n| g.nonterminal_name(*n).to_owned());
            let rows = self.rows.iter().map(|row| {
                columns
                    .iter()
                    .map(|n| row.get(n).map(ToString::to_string).unwrap_or_default())
                    .collect()
            });
            write_grid(f, header.collect(), rows.collect())
        })
    }
}

fn write_grid(
    f: &mut fmt::Formatter<'_>,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
) -> fmt::Result {
    let width = header
        .iter()
        .chain(rows.iter().flatten())
        .map(|cell| cell.chars().count())
        .chain(Some("State".len()))
        .max()
        .unwrap_or_default();
    let rule = format!("+{}+", vec!["-".repeat(width + 2); header.len() + 1].join("+"));

    writeln!(f, "{}", rule)?;
    write!(f, "| {:>width$} |", "State", width = width)?;
    for cell in &header {
        write!(f, " {:>width$} |", cell, width = width)?;
    }
    writeln!(f)?;
    writeln!(f, "{}", rule)?;
    for (state, row) in rows.iter().enumerate() {
        write!(f, "| {:>width$} |", state, width = width)?;
        for cell in row {
            write!(f, " {:>width$} |", cell, width = width)?;
        }
        writeln!(f)?;
    }
    writeln!(f, "{}", rule)
}

/// Derive the SLR(1) action and goto tables from the LR(0) automaton.
pub fn generate(
    g: &Grammar,
    collection: &CanonicalCollection,
    follow_sets: &FollowSets,
) -> Result<(ActionTable, GotoTable), TableError> {
    let span = tracing::trace_span!("generate_table");
    let _entered = span.enter();

    let mut actions = ActionTable {
        rows: vec![Map::default(); collection.len()],
    };
    let mut gotos = GotoTable {
        rows: vec![Map::default(); collection.len()],
    };

    for (id, state) in collection.states() {
        for item in state.items() {
            let production = g
                .production(item.production)
                .ok_or(TableError::ProductionNotFound(item.production))?;

            match production.right().get(usize::from(item.index)) {
                // [START -> start .]
                None if production.left() == NonterminalID::START => {
                    actions
                        .set(id, TerminalID::EOI, Action::Accept)
                        .map_err(TableError::Conflict)?;
                }

                // [A -> α .]
                None => {
                    let reduce = g
                        .find_production(production.left(), production.right())
                        .ok_or(TableError::ProductionNotFound(item.production))?;
                    let Some(follow) = follow_sets.get(production.left()) else {
                        continue;
                    };
                    for t in follow.iter() {
                        actions
                            .set(id, t, Action::Reduce(reduce))
                            .map_err(TableError::Conflict)?;
                    }
                }

                // [A -> α . X β]
                Some(&symbol) => {
                    let next = state
                        .transition(symbol)
                        .ok_or(TableError::MissingTransition { state: id, symbol })?;
                    match symbol {
                        SymbolID::T(t) => {
                            actions
                                .set(id, t, Action::Shift(next))
                                .map_err(TableError::Conflict)?;
                        }
                        SymbolID::N(n) => {
                            gotos.rows[id.into_raw()].insert(n, next);
                        }
                    }
                }
            }
        }
    }

    tracing::debug!("generated parse table with {} states", actions.len());
    Ok((actions, gotos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{first_sets::FirstSets, grammar::SymbolID::*};

    fn tables(g: &Grammar) -> Result<(ActionTable, GotoTable), TableError> {
        let follow_sets = FollowSets::new(g, &FirstSets::new(g));
        generate(g, &CanonicalCollection::new(g), &follow_sets)
    }

    fn state(raw: usize) -> StateID {
        StateID::from_raw(raw)
    }

    #[test]
    fn textbook_snapshot() {
        let g = Grammar::textbook();
        let (actions, gotos) = tables(&g).unwrap();
        let t = |name: &str| g.terminal_by_name(name).unwrap();
        let n = |name: &str| g.nonterminal_by_name(name).unwrap();
        let p = |raw: u16| {
            g.productions()
                .find(|p| p.id().into_raw() == raw)
                .map(|p| p.id())
                .unwrap()
        };

        assert_eq!(actions.len(), 12);
        assert_eq!(gotos.len(), 12);

        assert_eq!(actions.get(state(0), t("(")), Some(Action::Shift(state(1))));
        assert_eq!(actions.get(state(0), t("i")), Some(Action::Shift(state(2))));
        assert_eq!(actions.get(state(0), t("+")), None);
        assert_eq!(actions.get(state(2), t("*")), Some(Action::Reduce(p(6))));
        assert_eq!(actions.get(state(3), TerminalID::EOI), Some(Action::Accept));
        assert_eq!(actions.get(state(3), t("+")), Some(Action::Shift(state(7))));
        assert_eq!(actions.get(state(4), t("+")), Some(Action::Reduce(p(2))));
        assert_eq!(actions.get(state(4), t("*")), Some(Action::Shift(state(8))));
        assert_eq!(actions.get(state(9), TerminalID::EOI), Some(Action::Reduce(p(5))));
        assert_eq!(actions.get(state(10), t(")")), Some(Action::Reduce(p(1))));
        assert_eq!(actions.get(state(11), t(")")), Some(Action::Reduce(p(3))));

        assert_eq!(gotos.get(state(0), n("E")), Some(state(3)));
        assert_eq!(gotos.get(state(1), n("E")), Some(state(6)));
        assert_eq!(gotos.get(state(7), n("T")), Some(state(10)));
        assert_eq!(gotos.get(state(8), n("F")), Some(state(11)));
        assert_eq!(gotos.get(state(8), n("E")), None);

        let mut expected: Vec<TerminalID> = actions.row(state(4)).map(|(t, _)| t).collect();
        expected.sort();
        assert_eq!(expected, [TerminalID::EOI, t("+"), t("*"), t(")")]);
    }

    #[test]
    fn dangling_else_is_not_slr() {
        // S -> if E then S | if E then S else S | a ; E -> b
        let g = Grammar::define(|g| {
            let kw_if = g.terminal("if")?;
            let kw_then = g.terminal("then")?;
            let kw_else = g.terminal("else")?;
            let a = g.terminal("a")?;
            let b = g.terminal("b")?;
            let s = g.nonterminal("S")?;
            let e = g.nonterminal("E")?;
            g.production(s, [T(kw_if), N(e), T(kw_then), N(s)])?;
            g.production(s, [T(kw_if), N(e), T(kw_then), N(s), T(kw_else), N(s)])?;
            g.production(s, [T(a)])?;
            g.production(e, [T(b)])?;
            Ok(())
        })
        .unwrap();

        match tables(&g) {
            Err(TableError::Conflict(conflict)) => {
                assert_eq!(conflict.kind(), "shift/reduce");
                assert_eq!(conflict.terminal, g.terminal_by_name("else").unwrap());
                let message = conflict.display(&g).to_string();
                assert!(message.contains("`else'"), "{}", message);
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn reduce_reduce_conflict() {
        // S -> A | B ; A -> x ; B -> x
        let g = Grammar::define(|g| {
            let x = g.terminal("x")?;
            let s = g.nonterminal("S")?;
            let na = g.nonterminal("A")?;
            let nb = g.nonterminal("B")?;
            g.production(s, [N(na)])?;
            g.production(s, [N(nb)])?;
            g.production(na, [T(x)])?;
            g.production(nb, [T(x)])?;
            Ok(())
        })
        .unwrap();

        match tables(&g) {
            Err(TableError::Conflict(conflict)) => {
                assert_eq!(conflict.kind(), "reduce/reduce");
                assert_eq!(conflict.terminal, TerminalID::EOI);
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn epsilon_productions() {
        // S -> A b ; A -> a | %empty
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let b = g.terminal("b")?;
            let s = g.nonterminal("S")?;
            let na = g.nonterminal("A")?;
            g.production(s, [N(na), T(b)])?;
            g.production(na, [T(a)])?;
            g.production(na, [])?;
            Ok(())
        })
        .unwrap();
        let (actions, _gotos) = tables(&g).unwrap();

        let b = g.terminal_by_name("b").unwrap();
        let na = g.nonterminal_by_name("A").unwrap();
        let empty = g.find_production(na, &[]).unwrap();
        assert_eq!(actions.get(state(0), b), Some(Action::Reduce(empty)));
    }

    #[test]
    fn render_grid() {
        let g = Grammar::textbook();
        let (actions, gotos) = tables(&g).unwrap();
        let rendered = actions.display(&g).to_string();
        let header = rendered.lines().nth(1).unwrap();
        assert!(header.trim_end().ends_with("$ |"), "{}", header);
        assert_eq!(rendered.lines().count(), 12 + 4);
        assert!(rendered.contains("Accept"));

        let rendered = gotos.display(&g).to_string();
        assert!(rendered.lines().nth(1).unwrap().contains(" E |"));
    }
}
