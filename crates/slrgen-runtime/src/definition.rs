//! Parse table definition.

/// The trait for abstracting the generated SLR(1) parse table.
pub trait ParseTable {
    /// The number to identify the state of the LR automaton.
    type State: Copy;

    /// The number to identify the terminal symbols.
    type Terminal: Copy;

    /// The number to identify the nonterminal symbols.
    type Nonterminal: Copy;

    /// The context value corresponding to the matched production rule.
    type Reduce: Copy;

    /// Return the initial state number.
    fn initial_state(&self) -> Self::State;

    /// Return the action corresponding to the specified state number and
    /// lookahead symbol, or `None` if the table has no entry for them.
    ///
    /// If there is no lookahead symbol, a `None` is passed as the end of input.
    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Terminal>,
    ) -> Option<ParseAction<Self::State, Self::Nonterminal, Self::Reduce>>;

    /// Return the state to transition after reducing to `symbol` in `current`.
    fn goto(&self, current: Self::State, symbol: Self::Nonterminal) -> Option<Self::State>;

    /// Return the lookahead symbols that have an action in the specified state.
    fn expected_terminals(&self, current: Self::State) -> Vec<Option<Self::Terminal>>;
}

impl<T: ?Sized> ParseTable for &T
where
    T: ParseTable,
{
    type State = T::State;
    type Terminal = T::Terminal;
    type Nonterminal = T::Nonterminal;
    type Reduce = T::Reduce;

    fn initial_state(&self) -> Self::State {
        (**self).initial_state()
    }

    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Terminal>,
    ) -> Option<ParseAction<Self::State, Self::Nonterminal, Self::Reduce>> {
        (**self).action(current, lookahead)
    }

    fn goto(&self, current: Self::State, symbol: Self::Nonterminal) -> Option<Self::State> {
        (**self).goto(current, symbol)
    }

    fn expected_terminals(&self, current: Self::State) -> Vec<Option<Self::Terminal>> {
        (**self).expected_terminals(current)
    }
}

impl<T: ?Sized> ParseTable for std::rc::Rc<T>
where
    T: ParseTable,
{
    type State = T::State;
    type Terminal = T::Terminal;
    type Nonterminal = T::Nonterminal;
    type Reduce = T::Reduce;

    fn initial_state(&self) -> Self::State {
        (**self).initial_state()
    }

    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Terminal>,
    ) -> Option<ParseAction<Self::State, Self::Nonterminal, Self::Reduce>> {
        (**self).action(current, lookahead)
    }

    fn goto(&self, current: Self::State, symbol: Self::Nonterminal) -> Option<Self::State> {
        (**self).goto(current, symbol)
    }

    fn expected_terminals(&self, current: Self::State) -> Vec<Option<Self::Terminal>> {
        (**self).expected_terminals(current)
    }
}

impl<T: ?Sized> ParseTable for std::sync::Arc<T>
where
    T: ParseTable,
{
    type State = T::State;
    type Terminal = T::Terminal;
    type Nonterminal = T::Nonterminal;
    type Reduce = T::Reduce;

    fn initial_state(&self) -> Self::State {
        (**self).initial_state()
    }

    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Terminal>,
    ) -> Option<ParseAction<Self::State, Self::Nonterminal, Self::Reduce>> {
        (**self).action(current, lookahead)
    }

    fn goto(&self, current: Self::State, symbol: Self::Nonterminal) -> Option<Self::State> {
        (**self).goto(current, symbol)
    }

    fn expected_terminals(&self, current: Self::State) -> Vec<Option<Self::Terminal>> {
        (**self).expected_terminals(current)
    }
}

/// The action that the automaton performs on a particular lookahead symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseAction<TState, TSymbol, TReduce> {
    /// Consume the lookahead symbol and push the specified state.
    Shift(TState),

    /// Pop `n` states and symbols, then push the left-hand side `TSymbol`.
    Reduce(TReduce, TSymbol, usize),

    Accept,
}
