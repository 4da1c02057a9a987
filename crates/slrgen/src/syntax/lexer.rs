//! Lexer implementation.

use lexgen_util::Loc;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Token<'input> {
    Arrow,
    VertBar,
    Newline,
    Kw(Keyword),
    Symbol(&'input str),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Keyword {
    Start,
    Empty,
}

pub type Spanned<'input> = (Loc, Token<'input>, Loc);

lexgen::lexer! {
    pub Lexer -> Token<'input>;

    let whitespace = [' ' '\t'];
    let newline = '\r'? '\n';
    let comment_char = _ # ['\r' '\n'];
    let symbol_char = _ # [' ' '\t' '\r' '\n' '|' '#'];

    rule Init {
        $whitespace+,
        '#' $comment_char*,
        $newline = Token::Newline,
        "|" = Token::VertBar,
        $symbol_char+ => |lexer| {
            let token = match lexer.match_() {
                "->" => Token::Arrow,
                "%start" => Token::Kw(Keyword::Start),
                "%empty" => Token::Kw(Keyword::Empty),
                name => Token::Symbol(name),
            };
            lexer.return_(token)
        },
    }
}
