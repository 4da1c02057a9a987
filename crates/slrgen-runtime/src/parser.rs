//! Parser.

use crate::definition::{ParseAction, ParseTable};
use std::fmt;

/// A trait for abstracting token symbols.
pub trait Token<TSym> {
    fn as_symbol(&self) -> TSym;
}

/// The shift-reduce parser driven by a parse table.
#[derive(Debug)]
pub struct Parser<TDef, TTok>
where
    TDef: ParseTable,
    TTok: Token<TDef::Terminal>,
{
    definition: TDef,
    state_stack: Vec<TDef::State>,
    item_stack: Vec<ParseItem<TTok, TDef::Nonterminal>>,
}

impl<TDef, TTok> Parser<TDef, TTok>
where
    TDef: ParseTable,
    TDef::State: fmt::Debug,
    TDef::Terminal: fmt::Debug,
    TTok: Token<TDef::Terminal>,
{
    /// Create an instance of `Parser` using the specified parse table.
    pub fn new(definition: TDef) -> Self {
        let initial_state = definition.initial_state();
        Self {
            definition,
            state_stack: vec![initial_state],
            item_stack: vec![],
        }
    }

    /// Return the symbols recognized so far, bottom first.
    pub fn items(&self) -> &[ParseItem<TTok, TDef::Nonterminal>] {
        &self.item_stack[..]
    }

    /// Drive the automaton over `tokens` until it accepts or rejects the input.
    ///
    /// The end of the iterator is treated as the end of input.
    pub fn parse<I>(
        &mut self,
        tokens: I,
    ) -> Result<Accepted<TDef::Reduce>, ParseError<TDef::State, TDef::Terminal>>
    where
        I: IntoIterator<Item = TTok>,
    {
        let mut tokens = tokens.into_iter();
        let mut lookahead = tokens.next();
        let mut position = 0;
        let mut reductions = vec![];

        loop {
            let current = self
                .state_stack
                .last()
                .copied()
                .ok_or(ParseError::EmptyStateStack)?;
            let symbol = lookahead.as_ref().map(|t| t.as_symbol());

            match self.definition.action(current, symbol) {
                Some(ParseAction::Shift(next)) => {
                    let token = lookahead
                        .take()
                        .ok_or(ParseError::UnexpectedEoi { position })?;
                    self.item_stack.push(ParseItem::T(token));
                    self.state_stack.push(next);
                    lookahead = tokens.next();
                    position += 1;
                }

                Some(ParseAction::Reduce(reduce, lhs, n)) => {
                    // the initial state must survive any reduction.
                    if n >= self.state_stack.len() || n > self.item_stack.len() {
                        return Err(ParseError::EmptyStateStack);
                    }
                    self.state_stack.truncate(self.state_stack.len() - n);
                    self.item_stack.truncate(self.item_stack.len() - n);

                    let exposed = self
                        .state_stack
                        .last()
                        .copied()
                        .ok_or(ParseError::EmptyStateStack)?;
                    let next = match self.definition.goto(exposed, lhs) {
                        Some(next) => next,
                        None => return Err(self.unexpected(position, current, symbol)),
                    };
                    self.item_stack.push(ParseItem::N(lhs));
                    self.state_stack.push(next);
                    reductions.push(reduce);
                }

                Some(ParseAction::Accept) => return Ok(Accepted { reductions }),

                None => return Err(self.unexpected(position, current, symbol)),
            }
        }
    }

    fn unexpected(
        &self,
        position: usize,
        state: TDef::State,
        found: Option<TDef::Terminal>,
    ) -> ParseError<TDef::State, TDef::Terminal> {
        ParseError::UnexpectedToken {
            position,
            state,
            found,
            expected: self.definition.expected_terminals(state),
        }
    }
}

/// An element of the symbol stack.
#[derive(Debug)]
pub enum ParseItem<TTok, TSym> {
    T(TTok),
    N(TSym),
}

/// The result of a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Accepted<TReduce> {
    /// The productions reduced during the parse, in order.
    pub reductions: Vec<TReduce>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError<S: fmt::Debug, T: fmt::Debug> {
    /// The table has no valid action for the current state and lookahead.
    ///
    /// A `found` of `None` stands for the end of input.
    #[error("unexpected {found:?} at position {position} (state {state:?}, expected one of {expected:?})")]
    UnexpectedToken {
        position: usize,
        state: S,
        found: Option<T>,
        expected: Vec<Option<T>>,
    },

    #[error("unexpected end of input at position {position}")]
    UnexpectedEoi { position: usize },

    #[error("empty state stack")]
    EmptyStateStack,
}
