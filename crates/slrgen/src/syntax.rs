//! Reading grammars and input strings from text.
//!
//! A grammar file holds one rule per line:
//!
//! ```text
//! # comment
//! %start E
//! E -> E + T | T
//! T -> T * F | F
//! F -> ( E ) | i
//! ```
//!
//! Every left-hand side is a nonterminal and every other symbol is a
//! terminal. `%empty`, or an alternative with no symbols, stands for the
//! empty production. A line starting with `|` continues the previous rule.

pub mod lexer;

use self::lexer::{Keyword, Lexer, Spanned, Token};
use crate::{
    grammar::{Grammar, NonterminalID, SymbolID, TerminalID},
    types::Map,
};
use anyhow::Context as _;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    /// 1-based line number, or 0 if the error concerns the whole text.
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
struct Rule<'input> {
    line: usize,
    left: &'input str,
    alternatives: Vec<Vec<&'input str>>,
}

#[derive(Debug, Default)]
struct Document<'input> {
    start: Option<(usize, &'input str)>,
    rules: Vec<Rule<'input>>,
}

/// Read a grammar from its textual description.
pub fn parse_grammar(source: &str) -> Result<Grammar, SyntaxError> {
    let span = tracing::trace_span!("parse_grammar");
    let _entered = span.enter();

    let doc = parse_document(source)?;
    tracing::trace!("{} rules", doc.rules.len());
    if doc.rules.is_empty() {
        return Err(SyntaxError::new(0, "no rules"));
    }

    if let Some((line, name)) = doc.start {
        if !doc.rules.iter().any(|rule| rule.left == name) {
            return Err(SyntaxError::new(
                line,
                format!("the start symbol `{}' has no rule", name),
            ));
        }
    }

    let mut line = 0;
    let res = Grammar::define(|def| {
        let mut nonterminals: Map<&str, NonterminalID> = Map::default();
        for rule in &doc.rules {
            line = rule.line;
            if !nonterminals.contains_key(rule.left) {
                let id = def.nonterminal(rule.left)?;
                nonterminals.insert(rule.left, id);
            }
        }

        let mut terminals: Map<&str, TerminalID> = Map::default();
        for rule in &doc.rules {
            line = rule.line;
            for name in rule.alternatives.iter().flatten() {
                if !nonterminals.contains_key(name) && !terminals.contains_key(name) {
                    let id = def.terminal(name)?;
                    terminals.insert(*name, id);
                }
            }
        }

        for rule in &doc.rules {
            line = rule.line;
            let left = nonterminals[rule.left];
            for alternative in &rule.alternatives {
                let right = alternative.iter().map(|name| match nonterminals.get(name) {
                    Some(n) => SymbolID::N(*n),
                    None => SymbolID::T(terminals[name]),
                });
                def.production(left, right)?;
            }
        }

        if let Some((start_line, name)) = doc.start {
            line = start_line;
            def.start_symbol(nonterminals[name])?;
        }

        line = 0;
        Ok(())
    });

    res.map_err(|err| SyntaxError::new(line, err.to_string()))
}

/// Read a grammar from the specified file.
pub fn parse_file(path: impl AsRef<Path>) -> anyhow::Result<Grammar> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let grammar =
        parse_grammar(&source).with_context(|| format!("invalid grammar in {}", path.display()))?;
    Ok(grammar)
}

fn parse_document(source: &str) -> Result<Document<'_>, SyntaxError> {
    let mut doc = Document::default();
    for (line, tokens) in lines(source)? {
        match &tokens[..] {
            [] => {}

            [Token::Kw(Keyword::Start), Token::Symbol(name)] => {
                if doc.start.is_some() {
                    return Err(SyntaxError::new(line, "duplicate %start"));
                }
                doc.start = Some((line, *name));
            }
            [Token::Kw(Keyword::Start), ..] => {
                return Err(SyntaxError::new(line, "%start takes exactly one symbol"));
            }

            [Token::Symbol(left), Token::Arrow, rest @ ..] => {
                check_symbol(line, left)?;
                doc.rules.push(Rule {
                    line,
                    left: *left,
                    alternatives: alternatives(line, rest)?,
                });
            }

            [Token::VertBar, rest @ ..] => {
                let rule = doc.rules.last_mut().ok_or_else(|| {
                    SyntaxError::new(line, "a continuation line without a preceding rule")
                })?;
                rule.alternatives.extend(alternatives(line, rest)?);
            }

            _ => {
                return Err(SyntaxError::new(line, "expected a rule of the form `A -> ...'"));
            }
        }
    }
    Ok(doc)
}

/// Split the tokens into lines, paired with their 1-based line numbers.
fn lines(source: &str) -> Result<Vec<(usize, Vec<Token<'_>>)>, SyntaxError> {
    let mut lines = vec![];
    let mut current: Option<(usize, Vec<Token<'_>>)> = None;
    for res in Lexer::new(source) {
        let (start, token, _end): Spanned<'_> = res.map_err(|err| {
            SyntaxError::new(err.location.line as usize + 1, format!("{:?}", err.kind))
        })?;
        let line = start.line as usize + 1;
        match token {
            Token::Newline => lines.extend(current.take()),
            token => current.get_or_insert_with(|| (line, vec![])).1.push(token),
        }
    }
    lines.extend(current);
    Ok(lines)
}

fn alternatives<'input>(
    line: usize,
    tokens: &[Token<'input>],
) -> Result<Vec<Vec<&'input str>>, SyntaxError> {
    tokens
        .split(|t| *t == Token::VertBar)
        .map(|alternative| match alternative {
            [] | [Token::Kw(Keyword::Empty)] => Ok(vec![]),
            symbols => symbols
                .iter()
                .map(|token| match token {
                    Token::Symbol(name) => check_symbol(line, name).map(|()| *name),
                    Token::Kw(Keyword::Empty) => {
                        Err(SyntaxError::new(line, "%empty must stand alone"))
                    }
                    Token::Arrow => Err(SyntaxError::new(line, "unexpected `->'")),
                    token => Err(SyntaxError::new(line, format!("unexpected {:?}", token))),
                })
                .collect(),
        })
        .collect()
}

fn check_symbol(line: usize, name: &str) -> Result<(), SyntaxError> {
    if name.starts_with('%') {
        return Err(SyntaxError::new(line, format!("unknown directive `{}'", name)));
    }
    Ok(())
}

/// Split an input string into terminals of `g`.
///
/// Terminal names are matched longest first and whitespace between them is
/// skipped. A `$` may close the input as an explicit end marker.
pub fn scan_input(g: &Grammar, input: &str) -> Result<Vec<TerminalID>, SyntaxError> {
    let mut names: Vec<(&str, TerminalID)> = g
        .terminals()
        .filter(|t| t.id() != TerminalID::EOI)
        .map(|t| (t.name(), t.id()))
        .collect();
    names.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

    let line_of = |offset: usize| input[..offset].matches('\n').count() + 1;

    let mut tokens = vec![];
    let mut rest = input.trim_start();
    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        if let Some(after) = rest.strip_prefix('$') {
            if !after.trim().is_empty() {
                return Err(SyntaxError::new(
                    line_of(offset),
                    "the end marker `$' must close the input",
                ));
            }
            tokens.push(TerminalID::EOI);
            break;
        }
        let (name, id) = names
            .iter()
            .find(|(name, _)| rest.starts_with(name))
            .copied()
            .ok_or_else(|| {
                let found: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
                SyntaxError::new(line_of(offset), format!("unknown terminal in `{}'", found))
            })?;
        tokens.push(id);
        rest = rest[name.len()..].trim_start();
    }
    Ok(tokens)
}
