//! An SLR(1) parser generator.
//!
//! The pipeline runs from a [`Grammar`](grammar::Grammar) through the
//! FIRST/FOLLOW set solvers and the LR(0) canonical collection down to
//! the action/goto tables, which then drive the shift-reduce parser from
//! `slrgen-runtime`.

pub mod first_sets;
pub mod follow_sets;
pub mod grammar;
pub mod lr0;
pub mod syntax;
pub mod table;
pub mod types;
pub mod util;

use crate::{
    first_sets::FirstSets,
    follow_sets::FollowSets,
    grammar::{Grammar, GrammarError, NonterminalID, ProductionID, TerminalID},
    lr0::{CanonicalCollection, StateID},
    table::{Action, ActionTable, Conflict, GotoTable, TableError},
    util::{display_fn, display_list},
};
use slrgen_runtime::{ParseAction, ParseTable, Parser, Token};
use std::fmt;

/// Everything derived from a grammar on the way to its parse table.
#[derive(Debug)]
#[non_exhaustive]
pub struct Analysis {
    pub first_sets: FirstSets,
    pub follow_sets: FollowSets,
    pub collection: CanonicalCollection,
    pub actions: ActionTable,
    pub gotos: GotoTable,
}

impl Analysis {
    /// Run the generated parser over `tokens`.
    pub fn parse(&self, g: &Grammar, tokens: &[TerminalID]) -> Result<Accepted, ParseError> {
        parse(&self.actions, &self.gotos, g, tokens)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Malformed(#[from] GrammarError),

    #[error("the grammar is not SLR(1): {}", _0)]
    GrammarNotSlr(Conflict),

    #[error("production {} is not found in the grammar", _0)]
    ProductionNotFound(ProductionID),

    #[error("state {} has no transition on a symbol after its marker", state)]
    MissingTransition { state: StateID },
}

impl From<TableError> for AnalysisError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Conflict(conflict) => Self::GrammarNotSlr(conflict),
            TableError::ProductionNotFound(id) => Self::ProductionNotFound(id),
            TableError::MissingTransition { state, .. } => Self::MissingTransition { state },
        }
    }
}

/// Build the SLR(1) parse table of the specified grammar.
pub fn analyze(g: &Grammar) -> Result<Analysis, AnalysisError> {
    let span = tracing::debug_span!("analyze");
    let _entered = span.enter();

    let first_sets = FirstSets::new(g);
    let follow_sets = FollowSets::new(g, &first_sets);
    let collection = CanonicalCollection::new(g);
    tracing::debug!("{} LR(0) states", collection.len());

    let (actions, gotos) = table::generate(g, &collection, &follow_sets)?;

    Ok(Analysis {
        first_sets,
        follow_sets,
        collection,
        actions,
        gotos,
    })
}

/// The result of a successful parse.
pub type Accepted = slrgen_runtime::Accepted<ProductionID>;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The table has no entry for the lookahead symbol at `position`.
    ///
    /// The end of input is reported as [`TerminalID::EOI`].
    #[error("unexpected token at position {position} (state {state})")]
    UnexpectedToken {
        position: usize,
        state: StateID,
        found: TerminalID,
        expected: Vec<TerminalID>,
    },

    #[error("the parser stopped abnormally")]
    Runtime(#[source] slrgen_runtime::ParseError<StateID, TerminalID>),
}

impl ParseError {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| match self {
            Self::UnexpectedToken {
                position,
                found,
                expected,
                ..
            } => {
                let expected: Vec<&str> = expected.iter().map(|t| g.terminal_name(*t)).collect();
                let res = write!(
                    f,
                    "unexpected `{}' at position {} (expected one of: {})",
                    g.terminal_name(*found),
                    position,
                    display_list(&expected, ", ")
                );
                res
            }
            Self::Runtime(err) => write!(f, "{}", err),
        })
    }
}

impl From<slrgen_runtime::ParseError<StateID, TerminalID>> for ParseError {
    fn from(err: slrgen_runtime::ParseError<StateID, TerminalID>) -> Self {
        let eoi = |t: Option<TerminalID>| t.unwrap_or(TerminalID::EOI);
        match err {
            slrgen_runtime::ParseError::UnexpectedToken {
                position,
                state,
                found,
                expected,
            } => Self::UnexpectedToken {
                position,
                state,
                found: eoi(found),
                expected: expected.into_iter().map(eoi).collect(),
            },
            err => Self::Runtime(err),
        }
    }
}

impl Token<TerminalID> for TerminalID {
    fn as_symbol(&self) -> TerminalID {
        *self
    }
}

/// Recognize a sequence of terminals with the generated tables.
///
/// A single trailing [`TerminalID::EOI`] is accepted and ignored. The end
/// of input appearing anywhere else is an unexpected token.
pub fn parse(
    actions: &ActionTable,
    gotos: &GotoTable,
    g: &Grammar,
    tokens: &[TerminalID],
) -> Result<Accepted, ParseError> {
    let tokens = match tokens.split_last() {
        Some((&TerminalID::EOI, rest)) => rest,
        _ => tokens,
    };
    let view = TableView { actions, gotos, g };
    let accepted = Parser::new(view).parse(tokens.iter().copied())?;
    tracing::trace!("accepted after {} reductions", accepted.reductions.len());
    Ok(accepted)
}

/// Adapts the generated tables to the runtime's view of a parse table.
struct TableView<'t> {
    actions: &'t ActionTable,
    gotos: &'t GotoTable,
    g: &'t Grammar,
}

impl ParseTable for TableView<'_> {
    type State = StateID;
    type Terminal = TerminalID;
    type Nonterminal = NonterminalID;
    type Reduce = ProductionID;

    fn initial_state(&self) -> StateID {
        StateID::INITIAL
    }

    fn action(
        &self,
        current: StateID,
        lookahead: Option<TerminalID>,
    ) -> Option<ParseAction<StateID, NonterminalID, ProductionID>> {
        let column = match lookahead {
            // an explicit end marker in the middle of the input.
            Some(TerminalID::EOI) => return None,
            Some(t) => t,
            None => TerminalID::EOI,
        };
        match self.actions.get(current, column)? {
            Action::Shift(next) => Some(ParseAction::Shift(next)),
            Action::Reduce(id) => {
                let production = self.g.production(id)?;
                Some(ParseAction::Reduce(
                    id,
                    production.left(),
                    production.right().len(),
                ))
            }
            Action::Accept => Some(ParseAction::Accept),
        }
    }

    fn goto(&self, current: StateID, symbol: NonterminalID) -> Option<StateID> {
        self.gotos.get(current, symbol)
    }

    fn expected_terminals(&self, current: StateID) -> Vec<Option<TerminalID>> {
        let mut expected: Vec<TerminalID> = self.actions.row(current).map(|(t, _)| t).collect();
        expected.sort();
        // the end of input goes last.
        let eoi = expected
            .iter()
            .take_while(|t| **t == TerminalID::EOI)
            .count();
        expected.rotate_left(eoi);
        expected
            .into_iter()
            .map(|t| (t != TerminalID::EOI).then_some(t))
            .collect()
    }
}

/// Render the derivation implied by the reductions as a list of productions.
pub fn display_reductions<'g>(
    g: &'g Grammar,
    reductions: &'g [ProductionID],
) -> impl fmt::Display + 'g {
    display_fn(move |f| {
        for id in reductions {
            match g.production(*id) {
                Some(p) => writeln!(f, "{}", p.display(g))?,
                None => writeln!(f, "#{}", id)?,
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(g: &Grammar, input: &str) -> Vec<TerminalID> {
        input
            .chars()
            .map(|c| {
                if c == '$' {
                    TerminalID::EOI
                } else {
                    g.terminal_by_name(&c.to_string()).unwrap()
                }
            })
            .collect()
    }

    fn run(input: &str) -> Result<Accepted, ParseError> {
        let g = Grammar::textbook();
        let analysis = analyze(&g).unwrap();
        analysis.parse(&g, &tokens(&g, input))
    }

    #[test]
    fn accepts_textbook_sentences() {
        for input in ["i$", "i+i*i$", "(i+i)*i$", "((i))$", "i*i+i"] {
            assert!(run(input).is_ok(), "{} should be accepted", input);
        }
    }

    #[test]
    fn reductions_describe_rightmost_derivation() {
        let g = Grammar::textbook();
        let analysis = analyze(&g).unwrap();
        let accepted = analysis.parse(&g, &tokens(&g, "i$")).unwrap();
        let rendered: Vec<String> = accepted
            .reductions
            .iter()
            .map(|id| g.production(*id).unwrap().display(&g).to_string())
            .collect();
        assert_eq!(rendered, ["F -> i", "T -> F", "E -> T"]);
    }

    #[test]
    fn dangling_operator() {
        let g = Grammar::textbook();
        match run("i+$") {
            Err(ParseError::UnexpectedToken {
                position,
                state,
                found,
                expected,
            }) => {
                assert_eq!(position, 2);
                assert_eq!(state, StateID::from_raw(7));
                assert_eq!(found, TerminalID::EOI);
                let names: Vec<&str> = expected.iter().map(|t| g.terminal_name(*t)).collect();
                assert_eq!(names, ["(", "i"]);
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn trailing_operator_after_product() {
        match run("i+i*$") {
            Err(ParseError::UnexpectedToken {
                position, state, ..
            }) => {
                assert_eq!(position, 4);
                assert_eq!(state, StateID::from_raw(8));
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn rejects_empty_and_misplaced_end() {
        assert!(matches!(
            run("$"),
            Err(ParseError::UnexpectedToken { position: 0, .. })
        ));
        assert!(matches!(
            run("i$+i"),
            Err(ParseError::UnexpectedToken {
                position: 1,
                found: TerminalID::EOI,
                ..
            })
        ));
    }

    #[test]
    fn expected_terminals_put_end_last() {
        let g = Grammar::textbook();
        let err = run("ii").unwrap_err();
        let ParseError::UnexpectedToken { expected, .. } = &err else {
            panic!("unexpected error: {:?}", err);
        };
        assert_eq!(expected.last(), Some(&TerminalID::EOI));
        assert_eq!(
            err.display(&g).to_string(),
            "unexpected `i' at position 1 (expected one of: +, *, ), $)"
        );
    }

    #[test]
    fn not_slr() {
        use crate::grammar::SymbolID::*;
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
        assert!(matches!(analyze(&g), Err(AnalysisError::GrammarNotSlr(..))));
    }
}
