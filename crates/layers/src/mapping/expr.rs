//! Parser for the declarative mapping language carried by `infoBoxMapping`.
//!
//! Two shapes are accepted:
//!
//! ```text
//! header: "Baum"
//! title: p.ART + " (" + p["BAUM-NR"] + ")"
//! ```
//!
//! and a function over the payload binding:
//!
//! ```text
//! function(p) { if (p.STATUS == "gefällt") return null; return { title: p.ART }; }
//! (p) => ({ title: p.ART })
//! ```
//!
//! Only pure expressions are supported: literals, field access on the
//! binding, `+`, `==`, `!=`, `!`, `&&`, `||`, `?:`, object literals and
//! `if`/`return` inside function bodies.

use serde_json::{Number, Value};

/// Binding name of the payload in the object shape.
pub const OBJECT_BINDING: &str = "p";

/// Deepest nesting of sub-expressions, operator chains and statements.
pub const MAX_DEPTH: usize = 64;

/// Upper bound on expression nodes produced while folding a function body.
const MAX_LOWERED: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Path below the payload binding; empty means the payload itself.
    Field(Vec<String>),
    Concat(Vec<Expr>),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Equals {
        left: Box<Expr>,
        right: Box<Expr>,
        negate: bool,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Object(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprError {
    UnexpectedChar { ch: char, at: usize },
    UnterminatedString { at: usize },
    UnexpectedToken { found: String, at: usize },
    UnexpectedEnd,
    UnknownIdentifier(String),
    NotAnObject,
    TooDeep,
}

impl std::fmt::Display for ExprError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExprError::UnexpectedChar { ch, at } => write!(f, "unexpected {ch:?} at {at}"),
            ExprError::UnterminatedString { at } => write!(f, "unterminated string at {at}"),
            ExprError::UnexpectedToken { found, at } => write!(f, "unexpected {found} at {at}"),
            ExprError::UnexpectedEnd => write!(f, "unexpected end of mapping"),
            ExprError::UnknownIdentifier(name) => write!(f, "unknown identifier `{name}`"),
            ExprError::NotAnObject => write!(f, "mapping did not produce an object"),
            ExprError::TooDeep => write!(f, "mapping nests deeper than {MAX_DEPTH} levels"),
        }
    }
}

impl std::error::Error for ExprError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Dot,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Colon,
    Comma,
    Semi,
    Plus,
    EqEq,
    NotEq,
    Bang,
    AndAnd,
    OrOr,
    Question,
    Arrow,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier `{s}`"),
            Token::Str(s) => format!("string {s:?}"),
            Token::Num(n) => format!("number {n}"),
            other => format!("{other:?}"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|&(_, c)| c);

    while i < chars.len() {
        let (at, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && peek(i + 1) == Some('/') {
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
            continue;
        }
        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while let Some(n) = peek(i)
                && (n.is_alphanumeric() || n == '_' || n == '$')
            {
                i += 1;
            }
            let ident: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            out.push((Token::Ident(ident), at));
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while let Some(n) = peek(i)
                && (n.is_ascii_digit() || n == '.')
            {
                i += 1;
            }
            let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| ExprError::UnexpectedToken { found: text, at })?;
            out.push((Token::Num(n), at));
            continue;
        }
        if c == '"' || c == '\'' || c == '`' {
            let quote = c;
            i += 1;
            let mut s = String::new();
            loop {
                let Some(n) = peek(i) else {
                    return Err(ExprError::UnterminatedString { at });
                };
                i += 1;
                if n == quote {
                    break;
                }
                if n == '\\' {
                    let Some(e) = peek(i) else {
                        return Err(ExprError::UnterminatedString { at });
                    };
                    i += 1;
                    s.push(match e {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    s.push(n);
                }
            }
            out.push((Token::Str(s), at));
            continue;
        }

        let next = peek(i + 1);
        let (tok, len) = match (c, next) {
            ('=', Some('=')) => {
                let len = if peek(i + 2) == Some('=') { 3 } else { 2 };
                (Token::EqEq, len)
            }
            ('!', Some('=')) => {
                let len = if peek(i + 2) == Some('=') { 3 } else { 2 };
                (Token::NotEq, len)
            }
            ('=', Some('>')) => (Token::Arrow, 2),
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('!', _) => (Token::Bang, 1),
            ('.', _) => (Token::Dot, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (':', _) => (Token::Colon, 1),
            (',', _) => (Token::Comma, 1),
            (';', _) => (Token::Semi, 1),
            ('+', _) => (Token::Plus, 1),
            ('?', _) => (Token::Question, 1),
            _ => return Err(ExprError::UnexpectedChar { ch: c, at }),
        };
        out.push((tok, at));
        i += len;
    }
    Ok(out)
}

#[derive(Clone)]
enum Stmt {
    Return(Expr),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
}

/// Folds statements into one expression; code after a `return` is unreachable.
///
/// Statements following an `if` are copied into both branches, so `budget`
/// caps the total number of folds.
fn lower(mut stmts: Vec<Stmt>, depth: usize, budget: &mut usize) -> Result<Expr, ExprError> {
    if depth > MAX_DEPTH || *budget == 0 {
        return Err(ExprError::TooDeep);
    }
    *budget -= 1;
    if stmts.is_empty() {
        return Ok(Expr::Literal(Value::Null));
    }
    let first = stmts.remove(0);
    match first {
        Stmt::Return(e) => Ok(e),
        Stmt::If {
            cond,
            mut then,
            mut otherwise,
        } => {
            then.extend(stmts.iter().cloned());
            otherwise.extend(stmts);
            Ok(Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(lower(then, depth + 1, budget)?),
                otherwise: Box::new(lower(otherwise, depth + 1, budget)?),
            })
        }
    }
}

fn lower_body(stmts: Vec<Stmt>) -> Result<Expr, ExprError> {
    let mut budget = MAX_LOWERED;
    lower(stmts, 0, &mut budget)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    binding: String,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, usize), ExprError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token) -> Result<(), ExprError> {
        let (found, at) = self.next()?;
        if found == tok {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken {
                found: found.describe(),
                at,
            })
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == word)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn finish(&self) -> Result<(), ExprError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some((t, at)) => Err(ExprError::UnexpectedToken {
                found: t.describe(),
                at: *at,
            }),
        }
    }

    fn ident(&mut self) -> Result<String, ExprError> {
        match self.next()? {
            (Token::Ident(s), _) => Ok(s),
            (t, at) => Err(ExprError::UnexpectedToken {
                found: t.describe(),
                at,
            }),
        }
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        self.descend()?;
        let cond = self.or()?;
        let expr = if self.eat(&Token::Question) {
            let then = self.expr()?;
            self.expect(Token::Colon)?;
            let otherwise = self.expr()?;
            Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }
        } else {
            cond
        };
        self.depth -= 1;
        Ok(expr)
    }

    // Operator chains build left-deep trees; every link counts as one level.

    fn or(&mut self) -> Result<Expr, ExprError> {
        let start = self.depth;
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) {
            self.descend()?;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = start;
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let start = self.depth;
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            self.descend()?;
            let right = self.equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = start;
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        let start = self.depth;
        let mut left = self.additive()?;
        loop {
            let negate = match self.peek() {
                Some(Token::EqEq) => false,
                Some(Token::NotEq) => true,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            let right = self.additive()?;
            left = Expr::Equals {
                left: Box::new(left),
                right: Box::new(right),
                negate,
            };
        }
        self.depth = start;
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let first = self.unary()?;
        if self.peek() != Some(&Token::Plus) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.eat(&Token::Plus) {
            parts.push(self.unary()?);
        }
        Ok(Expr::Concat(parts))
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Bang) {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let (tok, at) = self.next()?;
        let mut expr = match tok {
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::Num(n) => Expr::Literal(
                Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            ),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                inner
            }
            Token::LBrace => self.object_body(Token::RBrace)?,
            Token::Ident(name) => {
                if name == "true" {
                    Expr::Literal(Value::Bool(true))
                } else if name == "false" {
                    Expr::Literal(Value::Bool(false))
                } else if name == "null" || name == "undefined" {
                    Expr::Literal(Value::Null)
                } else if name == self.binding {
                    Expr::Field(Vec::new())
                } else {
                    return Err(ExprError::UnknownIdentifier(name));
                }
            }
            other => {
                return Err(ExprError::UnexpectedToken {
                    found: other.describe(),
                    at,
                });
            }
        };

        loop {
            let key = if self.eat(&Token::Dot) {
                self.ident()?
            } else if self.eat(&Token::LBracket) {
                let key = match self.next()? {
                    (Token::Str(s), _) => s,
                    (Token::Num(n), _) => format!("{n}"),
                    (t, at) => {
                        return Err(ExprError::UnexpectedToken {
                            found: t.describe(),
                            at,
                        });
                    }
                };
                self.expect(Token::RBracket)?;
                key
            } else {
                return Ok(expr);
            };
            match &mut expr {
                Expr::Field(path) => path.push(key),
                _ => {
                    return Err(ExprError::UnexpectedToken {
                        found: format!("member access `{key}`"),
                        at,
                    });
                }
            }
        }
    }

    fn key(&mut self) -> Result<String, ExprError> {
        match self.next()? {
            (Token::Ident(s), _) | (Token::Str(s), _) => Ok(s),
            (t, at) => Err(ExprError::UnexpectedToken {
                found: t.describe(),
                at,
            }),
        }
    }

    /// Entries `key: expr` up to `close`; commas and semicolons are optional.
    fn object_body(&mut self, close: Token) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&close) {
                break;
            }
            let key = self.key()?;
            self.expect(Token::Colon)?;
            let value = self.expr()?;
            entries.push((key, value));
            while self.eat(&Token::Comma) || self.eat(&Token::Semi) {}
        }
        Ok(Expr::Object(entries))
    }

    fn top_level_object(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        while !self.at_end() {
            let key = self.key()?;
            self.expect(Token::Colon)?;
            let value = self.expr()?;
            entries.push((key, value));
            while self.eat(&Token::Comma) || self.eat(&Token::Semi) {}
        }
        Ok(Expr::Object(entries))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ExprError> {
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&Token::RBrace) {
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    fn stmt_or_block(&mut self) -> Result<Vec<Stmt>, ExprError> {
        if self.peek() == Some(&Token::LBrace) {
            self.block()
        } else {
            Ok(vec![self.stmt()?])
        }
    }

    fn stmt(&mut self) -> Result<Stmt, ExprError> {
        self.descend()?;
        let stmt = self.stmt_inner()?;
        self.depth -= 1;
        Ok(stmt)
    }

    fn stmt_inner(&mut self) -> Result<Stmt, ExprError> {
        if self.is_keyword("return") {
            self.pos += 1;
            let value = if matches!(self.peek(), Some(Token::Semi) | Some(Token::RBrace)) {
                Expr::Literal(Value::Null)
            } else {
                self.expr()?
            };
            self.eat(&Token::Semi);
            return Ok(Stmt::Return(value));
        }
        if self.is_keyword("if") {
            self.pos += 1;
            self.expect(Token::LParen)?;
            let cond = self.expr()?;
            self.expect(Token::RParen)?;
            let then = self.stmt_or_block()?;
            let otherwise = if self.is_keyword("else") {
                self.pos += 1;
                self.stmt_or_block()?
            } else {
                Vec::new()
            };
            return Ok(Stmt::If {
                cond,
                then,
                otherwise,
            });
        }
        let (tok, at) = self.next()?;
        Err(ExprError::UnexpectedToken {
            found: tok.describe(),
            at,
        })
    }

    fn function(&mut self) -> Result<Expr, ExprError> {
        // function [name](param) { body }
        self.pos += 1;
        if let Some(Token::Ident(_)) = self.peek() {
            self.pos += 1;
        }
        self.expect(Token::LParen)?;
        self.binding = self.ident()?;
        self.expect(Token::RParen)?;
        let body = self.block()?;
        lower_body(body)
    }

    fn arrow(&mut self) -> Result<Expr, ExprError> {
        let parens = self.eat(&Token::LParen);
        self.binding = self.ident()?;
        if parens {
            self.expect(Token::RParen)?;
        }
        self.expect(Token::Arrow)?;
        if self.peek() == Some(&Token::LBrace) {
            // A braced arrow body is a statement block, not an object literal.
            lower_body(self.block()?)
        } else {
            self.expr()
        }
    }

    fn looks_like_arrow(&self) -> bool {
        match (self.peek(), self.peek_at(1), self.peek_at(2), self.peek_at(3)) {
            (Some(Token::Ident(_)), Some(Token::Arrow), _, _) => true,
            (
                Some(Token::LParen),
                Some(Token::Ident(_)),
                Some(Token::RParen),
                Some(Token::Arrow),
            ) => true,
            _ => false,
        }
    }
}

/// Parses either mapping shape into a single expression over the payload.
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        binding: OBJECT_BINDING.to_string(),
        depth: 0,
    };

    let expr = if parser.is_keyword("function") {
        parser.function()?
    } else if parser.looks_like_arrow() {
        parser.arrow()?
    } else if parser.peek() == Some(&Token::LBrace) {
        parser.pos += 1;
        parser.object_body(Token::RBrace)?
    } else {
        parser.top_level_object()?
    };
    parser.finish()?;
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::{Expr, ExprError, parse};
    use serde_json::Value;

    fn field(path: &[&str]) -> Expr {
        Expr::Field(path.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn parses_object_shape_with_newlines() {
        let expr = parse("header: \"Baum\"\ntitle: p.ART").expect("parse");
        assert_eq!(
            expr,
            Expr::Object(vec![
                ("header".into(), Expr::Literal(Value::String("Baum".into()))),
                ("title".into(), field(&["ART"])),
            ])
        );
    }

    #[test]
    fn braced_object_with_commas_and_index_access() {
        let expr = parse("{ title: p[\"BAUM-NR\"], subtitle: p.a ? p.b : 'x' }").expect("parse");
        let Expr::Object(entries) = expr else {
            panic!("object expected");
        };
        assert_eq!(entries[0].1, field(&["BAUM-NR"]));
        assert!(matches!(entries[1].1, Expr::Conditional { .. }));
    }

    #[test]
    fn function_body_lowers_to_conditional() {
        let expr = parse(
            "function(props) { if (props.STATUS == 'x') return null; \
             return { title: props.ART }; }",
        )
        .expect("parse");
        let Expr::Conditional {
            then, otherwise, ..
        } = expr
        else {
            panic!("conditional expected");
        };
        assert_eq!(*then, Expr::Literal(Value::Null));
        assert_eq!(*otherwise, Expr::Object(vec![("title".into(), field(&["ART"]))]));
    }

    #[test]
    fn arrow_shape() {
        let expr = parse("(f) => ({ title: f.NAME + ' ' + f.NR })").expect("parse");
        let Expr::Object(entries) = expr else {
            panic!("object expected");
        };
        assert!(matches!(&entries[0].1, Expr::Concat(parts) if parts.len() == 3));
    }

    #[test]
    fn rejects_unknown_identifiers_and_calls() {
        assert_eq!(
            parse("title: window.location"),
            Err(ExprError::UnknownIdentifier("window".into()))
        );
        assert!(parse("title: p.a(1)").is_err());
        assert!(parse("title: 'open").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let parens = format!("title: {}p.A{}", "(".repeat(5_000), ")".repeat(5_000));
        assert_eq!(parse(&parens), Err(ExprError::TooDeep));

        let bangs = format!("title: {}p.A", "!".repeat(200_000));
        assert_eq!(parse(&bangs), Err(ExprError::TooDeep));

        let chain = format!("title: p.A{}", " || p.A".repeat(100_000));
        assert_eq!(parse(&chain), Err(ExprError::TooDeep));

        let ternary = format!("title: {}p.A", "p.A ? 1 : ".repeat(1_000));
        assert_eq!(parse(&ternary), Err(ExprError::TooDeep));

        let within = format!("title: {}p.A{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(parse(&within), Ok(Expr::Object(vec![("title".into(), field(&["A"]))])));
    }

    #[test]
    fn function_bodies_are_bounded() {
        let nested = format!(
            "function(p) {{ {} return 1; {} }}",
            "if (p.A) {".repeat(500),
            "}".repeat(500)
        );
        assert_eq!(parse(&nested), Err(ExprError::TooDeep));

        // Fall-through branches duplicate the tail; the fold budget stops it.
        let sequential = format!("function(p) {{ {} return 1; }}", "if (p.A) {} ".repeat(40));
        assert_eq!(parse(&sequential), Err(ExprError::TooDeep));

        let guarded = format!("function(p) {{ {} return 1; }}", "if (p.A) return 0; ".repeat(20));
        assert!(parse(&guarded).is_ok());
    }
}
