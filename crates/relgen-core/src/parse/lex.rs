//! Tokenizer for the schema language.
//!
//! Produces a flat token stream with 1-based line/column positions.
//! Identifiers are case-insensitive and normalized to lower case here;
//! string literals keep their exact text. `#` starts a comment running
//! to end of line.

use crate::msg::Pos;
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize},
    sequence::{delimited, pair, tuple},
    IResult,
};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokKind {
    Ident(String),
    Integer(i64),
    Decimal(f64),
    Str(String),
    LBrace,
    RBrace,
    Semi,
    Colon,
    Comma,
    Dot,
}

impl TokKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokKind::Ident(s) => format!("`{}`", s),
            TokKind::Integer(v) => format!("`{}`", v),
            TokKind::Decimal(v) => format!("`{}`", v),
            TokKind::Str(_) => "string literal".into(),
            TokKind::LBrace => "`{`".into(),
            TokKind::RBrace => "`}`".into(),
            TokKind::Semi => "`;`".into(),
            TokKind::Colon => "`:`".into(),
            TokKind::Comma => "`,`".into(),
            TokKind::Dot => "`.`".into(),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Token {
    pub kind: TokKind,
    pub pos: Pos,
}

/// Byte offsets of line starts, for offset-to-position conversion.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(src: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    fn pos(&self, file: &str, offset: usize) -> Pos {
        let line = self.starts.partition_point(|&s| s <= offset);
        Pos::new(file, line, offset - self.starts[line - 1] + 1)
    }
}

fn ident(input: &str) -> IResult<&str, TokKind> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        |s: &str| TokKind::Ident(s.to_ascii_lowercase()),
    )(input)
}

fn number(input: &str) -> IResult<&str, TokKind> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)?;

    let kind = if text.contains('.') {
        text.parse().ok().map(TokKind::Decimal)
    } else {
        text.parse().ok().map(TokKind::Integer)
    };
    match kind {
        Some(kind) => Ok((rest, kind)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn string_lit(input: &str) -> IResult<&str, TokKind> {
    map(
        delimited(
            char('"'),
            take_while(|c: char| c != '"' && c != '\n'),
            char('"'),
        ),
        |s: &str| TokKind::Str(s.to_string()),
    )(input)
}

fn punct(input: &str) -> IResult<&str, TokKind> {
    map(one_of("{};:,."), |c| match c {
        '{' => TokKind::LBrace,
        '}' => TokKind::RBrace,
        ';' => TokKind::Semi,
        ':' => TokKind::Colon,
        ',' => TokKind::Comma,
        _ => TokKind::Dot,
    })(input)
}

fn token(input: &str) -> IResult<&str, TokKind> {
    alt((number, ident, string_lit, punct))(input)
}

/// Skip whitespace and `#` comments.
fn skip_trivia(mut input: &str) -> &str {
    loop {
        let trimmed = input.trim_start();
        if let Some(rest) = trimmed.strip_prefix('#') {
            input = match rest.find('\n') {
                Some(i) => &rest[i + 1..],
                None => "",
            };
        } else if trimmed.len() != input.len() {
            input = trimmed;
        } else {
            return input;
        }
    }
}

/// Tokenize a whole source file.
pub(crate) fn lex(src: &str, file: &str) -> Result<Vec<Token>, (Pos, String)> {
    let lines = LineIndex::new(src);
    let mut toks = Vec::new();
    let mut rest = skip_trivia(src);

    while !rest.is_empty() {
        let pos = lines.pos(file, src.len() - rest.len());
        match token(rest) {
            Ok((r, kind)) => {
                toks.push(Token { kind, pos });
                rest = skip_trivia(r);
            }
            Err(_) => {
                let c = rest.chars().next().unwrap();
                return Err((pos, format!("unexpected character `{}`", c)));
            }
        }
    }

    Ok(toks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokKind> {
        lex(src, "t.rgn").unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_basic() {
        assert_eq!(
            kinds("struct User { field id int rowid; };"),
            vec![
                TokKind::Ident("struct".into()),
                TokKind::Ident("user".into()),
                TokKind::LBrace,
                TokKind::Ident("field".into()),
                TokKind::Ident("id".into()),
                TokKind::Ident("int".into()),
                TokKind::Ident("rowid".into()),
                TokKind::Semi,
                TokKind::RBrace,
                TokKind::Semi,
            ]
        );
    }

    #[test]
    fn test_lex_numbers_and_strings() {
        assert_eq!(
            kinds("default -3 limit 1.5 comment \"A User.\""),
            vec![
                TokKind::Ident("default".into()),
                TokKind::Integer(-3),
                TokKind::Ident("limit".into()),
                TokKind::Decimal(1.5),
                TokKind::Ident("comment".into()),
                TokKind::Str("A User.".into()),
            ]
        );
    }

    #[test]
    fn test_lex_dotted_path() {
        assert_eq!(
            kinds("user.company.name"),
            vec![
                TokKind::Ident("user".into()),
                TokKind::Dot,
                TokKind::Ident("company".into()),
                TokKind::Dot,
                TokKind::Ident("name".into()),
            ]
        );
    }

    #[test]
    fn test_lex_positions() {
        let toks = lex("struct a {\n  field b;\n};", "t.rgn").unwrap();
        assert_eq!(toks[0].pos, Pos::new("t.rgn", 1, 1));
        assert_eq!(toks[3].pos, Pos::new("t.rgn", 2, 3));
        assert_eq!(toks[4].pos, Pos::new("t.rgn", 2, 9));
    }

    #[test]
    fn test_lex_comments() {
        assert_eq!(
            kinds("# heading\nstruct # trailing\nuser"),
            vec![TokKind::Ident("struct".into()), TokKind::Ident("user".into())]
        );
    }

    #[test]
    fn test_lex_bad_char() {
        let (pos, msg) = lex("struct ?", "t.rgn").unwrap_err();
        assert_eq!(pos, Pos::new("t.rgn", 1, 8));
        assert!(msg.contains('?'));
    }
}
