//! Grammar types.

use crate::{types::Map, util::display_fn};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}

impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::from_raw(0);

    const OFFSET: u16 = 1;

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: String,
}
impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}

impl NonterminalID {
    /// Reserved symbol used as the left-hand side of the augmented production.
    pub const START: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: String,
}
impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A grammar symbol.
///
/// The derived order puts every terminal before every nonterminal, each
/// kind ordered by declaration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID {
    raw: u16,
}

impl ProductionID {
    /// The augmented production `START := start`.
    pub const ACCEPT: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

impl fmt::Display for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Production {
    id: ProductionID,
    left: NonterminalID,
    right: Vec<SymbolID>,
}
impl Production {
    pub fn id(&self) -> ProductionID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    // `"LHS -> R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} ->", g.nonterminal_name(self.left))?;
            if self.right.is_empty() {
                f.write_str(" %empty")?;
            }
            for symbol in &self.right {
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

/// The grammar definition used to derive the parser tables.
#[derive(Debug)]
pub struct Grammar {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    productions: Map<ProductionID, Production>,
    start_symbol: NonterminalID,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            writeln!(f, "{}", terminal)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if nonterminal.id() == self.start_symbol {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## productions:")?;
        for production in self.productions.values() {
            writeln!(f, "{}: {}", production.id(), production.display(self))?;
        }

        Ok(())
    }
}

impl Grammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    /// The classic expression grammar used for demonstration.
    ///
    /// ```text
    /// E -> E + T | T
    /// T -> T * F | F
    /// F -> ( E ) | i
    /// ```
    pub fn textbook() -> Self {
        use SymbolID::*;
        Self::define(|g| {
            let plus = g.terminal("+")?;
            let star = g.terminal("*")?;
            let lparen = g.terminal("(")?;
            let rparen = g.terminal(")")?;
            let ident = g.terminal("i")?;

            let e = g.nonterminal("E")?;
            let t = g.nonterminal("T")?;
            let f = g.nonterminal("F")?;

            g.production(e, [N(e), T(plus), N(t)])?;
            g.production(e, [N(t)])?;
            g.production(t, [N(t), T(star), N(f)])?;
            g.production(t, [N(f)])?;
            g.production(f, [T(lparen), N(e), T(rparen)])?;
            g.production(f, [T(ident)])?;

            g.start_symbol(e)
        })
        .expect("the textbook grammar is well-formed")
    }

    pub fn terminals(&self) -> impl Iterator<Item = &Terminal> + '_ {
        self.terminals.values()
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = &Nonterminal> + '_ {
        self.nonterminals.values()
    }

    /// Iterate over the productions, the augmented production first.
    pub fn productions(&self) -> impl Iterator<Item = &Production> + '_ {
        self.productions.values()
    }

    pub fn production(&self, id: ProductionID) -> Option<&Production> {
        self.productions.get(&id)
    }

    /// Iterate over the productions whose left-hand side is `left`.
    pub fn productions_of(&self, left: NonterminalID) -> impl Iterator<Item = &Production> + '_ {
        self.productions.values().filter(move |p| p.left == left)
    }

    /// Find the production by exact match of both sides.
    pub fn find_production(&self, left: NonterminalID, right: &[SymbolID]) -> Option<ProductionID> {
        self.productions
            .values()
            .find(|p| p.left == left && p.right == right)
            .map(|p| p.id)
    }

    /// The original start symbol, not the augmented one.
    pub fn start_symbol(&self) -> NonterminalID {
        self.start_symbol
    }

    pub fn terminal(&self, id: TerminalID) -> Option<&Terminal> {
        self.terminals.get(&id)
    }

    pub fn nonterminal(&self, id: NonterminalID) -> Option<&Nonterminal> {
        self.nonterminals.get(&id)
    }

    pub fn terminal_by_name(&self, name: &str) -> Option<TerminalID> {
        self.terminals
            .values()
            .find(|t| t.name == name)
            .map(|t| t.id)
    }

    pub fn nonterminal_by_name(&self, name: &str) -> Option<NonterminalID> {
        self.nonterminals
            .values()
            .find(|n| n.name == name)
            .map(|n| n.id)
    }

    pub fn terminal_name(&self, id: TerminalID) -> &str {
        self.terminals.get(&id).map_or("<unknown>", |t| t.name())
    }

    pub fn nonterminal_name(&self, id: NonterminalID) -> &str {
        self.nonterminals.get(&id).map_or("<unknown>", |n| n.name())
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => self.terminal_name(t),
            SymbolID::N(n) => self.nonterminal_name(n),
        }
    }

    fn contains(&self, symbol: SymbolID) -> bool {
        match symbol {
            SymbolID::T(t) => self.terminals.contains_key(&t),
            SymbolID::N(n) => self.nonterminals.contains_key(&n),
        }
    }

    /// Check the structural invariants of this grammar.
    fn validate(&self) -> Result<(), GrammarError> {
        match self.productions.first() {
            Some((&id, p))
                if id == ProductionID::ACCEPT
                    && p.left == NonterminalID::START
                    && p.right == [SymbolID::N(self.start_symbol)] => {}
            _ => return Err("production 0 must be the augmented production".into()),
        }

        for p in self.productions.values().skip(1) {
            if p.left == NonterminalID::START {
                return Err("only production 0 may derive the augmented start symbol".into());
            }
            if !self.nonterminals.contains_key(&p.left) {
                return Err(format!("undeclared left-hand side in production {}", p.id).into());
            }
            for &symbol in &p.right {
                if symbol == SymbolID::N(NonterminalID::START)
                    || symbol == SymbolID::T(TerminalID::EOI)
                {
                    return Err(format!(
                        "reserved symbol `{}' used in production {}",
                        self.symbol_name(symbol),
                        p.id
                    )
                    .into());
                }
                if !self.contains(symbol) {
                    return Err(format!("undeclared symbol used in production {}", p.id).into());
                }
                if let SymbolID::N(n) = symbol {
                    if self.productions_of(n).next().is_none() {
                        return Err(format!(
                            "the nonterminal `{}' is used but has no production",
                            self.nonterminal_name(n)
                        )
                        .into());
                    }
                }
            }
        }

        if self.productions_of(self.start_symbol).next().is_none() {
            return Err(format!(
                "the start symbol `{}' has no production",
                self.nonterminal_name(self.start_symbol)
            )
            .into());
        }

        Ok(())
    }
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    productions: Map<ProductionID, Production>,
    start: Option<NonterminalID>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_production_id: u16,
}

impl Default for GrammarDef {
    fn default() -> Self {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            productions: Map::default(),
            start: None,
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: NonterminalID::OFFSET,
            next_production_id: ProductionID::OFFSET,
        };

        def.terminals.insert(
            TerminalID::EOI,
            Terminal {
                id: TerminalID::EOI,
                name: "$".into(),
            },
        );

        // renamed after the start symbol in `end`.
        def.nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name: "$start".into(),
            },
        );

        def
    }
}

impl GrammarDef {
    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(&mut self, name: &str) -> Result<TerminalID, GrammarError> {
        self.verify_name(name)?;

        let id = TerminalID::from_raw(self.next_terminal_id);
        self.next_terminal_id = self
            .next_terminal_id
            .checked_add(1)
            .ok_or("too many terminal symbols")?;
        self.terminals.insert(
            id,
            Terminal {
                id,
                name: name.to_owned(),
            },
        );

        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarError> {
        self.verify_name(name)?;

        let id = NonterminalID::new(self.next_nonterminal_id);
        self.next_nonterminal_id = self
            .next_nonterminal_id
            .checked_add(1)
            .ok_or("too many nonterminal symbols")?;
        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.to_owned(),
            },
        );

        Ok(id)
    }

    /// Specify a production rule into this grammar.
    pub fn production<I>(
        &mut self,
        left: NonterminalID,
        right: I,
    ) -> Result<ProductionID, GrammarError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        if left == NonterminalID::START || !self.nonterminals.contains_key(&left) {
            return Err("the left-hand side must be a declared nonterminal".into());
        }

        let right: Vec<SymbolID> = right.into_iter().collect();
        if right.len() > usize::from(u16::MAX) {
            return Err("too many symbols on the right-hand side".into());
        }
        for symbol in &right {
            let declared = match symbol {
                SymbolID::T(t) => *t != TerminalID::EOI && self.terminals.contains_key(t),
                SymbolID::N(n) => *n != NonterminalID::START && self.nonterminals.contains_key(n),
            };
            if !declared {
                return Err("the right-hand side refers to an undeclared symbol".into());
            }
        }

        if self
            .productions
            .values()
            .any(|p| p.left == left && p.right == right)
        {
            return Err("duplicate production detected".into());
        }

        let id = ProductionID::new(self.next_production_id);
        self.next_production_id = self
            .next_production_id
            .checked_add(1)
            .ok_or("too many productions")?;
        self.productions.insert(id, Production { id, left, right });

        Ok(id)
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarError> {
        if symbol == NonterminalID::START || !self.nonterminals.contains_key(&symbol) {
            return Err("the start symbol must be a declared nonterminal".into());
        }
        self.start.replace(symbol);
        Ok(())
    }

    fn verify_name(&self, name: &str) -> Result<(), GrammarError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(format!("invalid symbol name: {:?}", name).into());
        }
        if matches!(name, "$" | "|" | "->") || name.starts_with('%') {
            return Err(format!("the symbol name `{}' is reserved", name).into());
        }
        let declared = self.terminals.values().any(|t| t.name == name)
            || self.nonterminals.values().any(|n| n.name == name);
        if declared {
            return Err(format!("the symbol `{}' has already been declared", name).into());
        }
        Ok(())
    }

    fn end(mut self) -> Result<Grammar, GrammarError> {
        // use the first declared nonterminal if the start symbol is not specified.
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .nonterminals
                .keys()
                .find(|id| **id != NonterminalID::START)
                .copied()
                .ok_or("empty nonterminal symbols")?,
        };

        let start_name = format!("{}'", self.nonterminals[&start].name);
        if let Some(augmented) = self.nonterminals.get_mut(&NonterminalID::START) {
            augmented.name = start_name;
        }

        let mut productions = Map::default();
        productions.insert(
            ProductionID::ACCEPT,
            Production {
                id: ProductionID::ACCEPT,
                left: NonterminalID::START,
                right: vec![SymbolID::N(start)],
            },
        );
        productions.extend(self.productions);

        let grammar = Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            productions,
            start_symbol: start,
        };
        grammar.validate()?;

        let undefined: Vec<&str> = grammar
            .nonterminals()
            .filter(|n| grammar.productions_of(n.id()).next().is_none())
            .map(|n| n.name())
            .collect();
        if !undefined.is_empty() {
            tracing::warn!(
                "the following nonterminals have no associated production: {:?}",
                undefined
            );
        }

        Ok(grammar)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("malformed grammar: {reason}")]
    Malformed { reason: String },
}
impl From<&str> for GrammarError {
    fn from(reason: &str) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
impl From<String> for GrammarError {
    fn from(reason: String) -> Self {
        Self::Malformed { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SymbolID::*;

    #[test]
    fn textbook_layout() {
        let g = Grammar::textbook();
        let e = g.nonterminal_by_name("E").unwrap();
        let accept = g.production(ProductionID::ACCEPT).unwrap();
        assert_eq!(accept.left(), NonterminalID::START);
        assert_eq!(accept.right(), &[N(e)]);
        assert_eq!(g.start_symbol(), e);
        assert_eq!(g.productions().count(), 7);
        assert_eq!(g.nonterminal_name(NonterminalID::START), "E'");
        assert_eq!(g.terminal_name(TerminalID::EOI), "$");

        let t = g.nonterminal_by_name("T").unwrap();
        let plus = g.terminal_by_name("+").unwrap();
        let p = g.find_production(e, &[N(e), T(plus), N(t)]).unwrap();
        assert_eq!(p.into_raw(), 1);
        assert_eq!(g.production(p).unwrap().display(&g).to_string(), "E -> E + T");
        assert!(g.find_production(e, &[N(t), T(plus)]).is_none());
    }

    #[test]
    fn default_start_symbol_is_first_nonterminal() {
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            let x = g.nonterminal("X")?;
            g.production(x, [T(a)])?;
            g.production(s, [N(x)])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(g.nonterminal_name(g.start_symbol()), "S");
    }

    #[test]
    fn reject_duplicated_names() {
        let err = Grammar::define(|g| {
            g.terminal("x")?;
            g.nonterminal("x")?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::Malformed { .. }));
    }

    #[test]
    fn reject_reserved_names() {
        for name in ["", "a b", "$", "|", "->", "%empty"] {
            let res = Grammar::define(|g| {
                g.terminal(name)?;
                Ok(())
            });
            assert!(res.is_err(), "{:?} should be rejected", name);
        }
    }

    #[test]
    fn reject_undefined_nonterminal_on_right() {
        let err = Grammar::define(|g| {
            let s = g.nonterminal("S")?;
            let a = g.nonterminal("A")?;
            g.production(s, [N(a)])?;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("`A'"), "{}", err);
    }

    #[test]
    fn reject_foreign_symbols() {
        let err = Grammar::define(|g| {
            let s = g.nonterminal("S")?;
            g.production(s, [T(TerminalID::from_raw(42))])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::Malformed { .. }));

        let err = Grammar::define(|g| {
            let s = g.nonterminal("S")?;
            g.production(s, [N(NonterminalID::START)])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarError::Malformed { .. }));
    }

    #[test]
    fn reject_empty_grammar() {
        assert!(Grammar::define(|_| Ok(())).is_err());
    }

    #[test]
    fn reject_duplicated_production() {
        let err = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.production(s, [T(a)])?;
            g.production(s, [T(a)])?;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn reject_overlong_right_hand_side() {
        let err = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.production(s, vec![T(a); 70_000])?;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("too many symbols"), "{}", err);

        // the longest accepted right-hand side still yields a table.
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.production(s, vec![T(a); usize::from(u16::MAX)])?;
            Ok(())
        })
        .unwrap();
        assert!(crate::analyze(&g).is_ok());
    }

    #[test]
    fn tolerate_unused_nonterminal() {
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            let _unused = g.nonterminal("U")?;
            g.production(s, [T(a)])?;
            Ok(())
        })
        .unwrap();
        assert!(g.nonterminal_by_name("U").is_some());
    }
}
