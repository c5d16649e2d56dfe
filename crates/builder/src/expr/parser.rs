use super::error::Result;
use super::lexer::{Spanned, Token, syntax, tokenize};
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

// binding powers, lowest first
const OR: u8 = 1;
const AND: u8 = 2;
const EQUALITY: u8 = 3;
const COMPARISON: u8 = 4;
const MEMBERSHIP: u8 = 5;
const ADDITIVE: u8 = 6;
const MULTIPLICATIVE: u8 = 7;

pub(crate) fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0, end: source.len() };
    let expr = parser.ternary()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(syntax(format!("unexpected {}", describe(&extra.token)), extra.position));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            return Ok(());
        }
        let found = self.peek().map_or_else(|| "end of input".to_owned(), describe);
        Err(syntax(format!("expected {}, found {found}", describe(expected)), self.position()))
    }

    fn ternary(&mut self) -> Result<Expr> {
        let cond = self.binary(OR)?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.ternary()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn binary(&mut self, min_power: u8) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some((op, power)) = self.peek().and_then(binary_op) {
            if power < min_power {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(power + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Ident(word)) if word == "not" => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.unary()?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let position = self.position();
                match self.bump() {
                    Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                    // `a.0` is allowed as an alias for `a[0]`
                    Some(Token::Int(i)) => {
                        expr = Expr::Index(Box::new(expr), Box::new(Expr::Literal(Value::Int(i))));
                    },
                    _ => return Err(syntax("expected a field name after `.`", position)),
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.ternary()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let position = self.position();
        let Some(token) = self.bump() else {
            return Err(syntax("unexpected end of expression", position));
        };

        match token {
            Token::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::LParen => {
                let inner = self.ternary()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            },
            Token::LBracket => {
                let items = self.list(&Token::RBracket)?;
                Ok(Expr::Array(items))
            },
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "nil" => Ok(Expr::Literal(Value::Nil)),
                _ if is_keyword(&name) => Err(syntax(format!("unexpected keyword `{name}`"), position)),
                _ if self.eat(&Token::LParen) => {
                    let args = self.list(&Token::RParen)?;
                    Ok(Expr::Call(name, args))
                },
                _ => Ok(Expr::Ident(name)),
            },
            other => Err(syntax(format!("unexpected {}", describe(&other)), position)),
        }
    }

    /// Comma separated expressions up to `close`, trailing comma allowed.
    fn list(&mut self, close: &Token) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.ternary()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }
}

fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
    let op = match token {
        Token::OrOr => (BinaryOp::Or, OR),
        Token::AndAnd => (BinaryOp::And, AND),
        Token::Eq => (BinaryOp::Eq, EQUALITY),
        Token::Ne => (BinaryOp::Ne, EQUALITY),
        Token::Lt => (BinaryOp::Lt, COMPARISON),
        Token::Le => (BinaryOp::Le, COMPARISON),
        Token::Gt => (BinaryOp::Gt, COMPARISON),
        Token::Ge => (BinaryOp::Ge, COMPARISON),
        Token::Plus => (BinaryOp::Add, ADDITIVE),
        Token::Minus => (BinaryOp::Sub, ADDITIVE),
        Token::Star => (BinaryOp::Mul, MULTIPLICATIVE),
        Token::Slash => (BinaryOp::Div, MULTIPLICATIVE),
        Token::Percent => (BinaryOp::Rem, MULTIPLICATIVE),
        Token::Ident(word) => match word.as_str() {
            "or" => (BinaryOp::Or, OR),
            "and" => (BinaryOp::And, AND),
            "in" => (BinaryOp::In, MEMBERSHIP),
            "contains" => (BinaryOp::Contains, MEMBERSHIP),
            "startsWith" => (BinaryOp::StartsWith, MEMBERSHIP),
            "endsWith" => (BinaryOp::EndsWith, MEMBERSHIP),
            _ => return None,
        },
        _ => return None,
    };
    Some(op)
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "or" | "and" | "not" | "in" | "contains" | "startsWith" | "endsWith")
}

fn describe(token: &Token) -> String {
    match token {
        Token::Int(i) => format!("number `{i}`"),
        Token::Float(x) => format!("number `{x}`"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Ident(name) => format!("`{name}`"),
        Token::LParen => "`(`".into(),
        Token::RParen => "`)`".into(),
        Token::LBracket => "`[`".into(),
        Token::RBracket => "`]`".into(),
        Token::Comma => "`,`".into(),
        Token::Dot => "`.`".into(),
        Token::Question => "`?`".into(),
        Token::Colon => "`:`".into(),
        Token::Bang => "`!`".into(),
        Token::Plus => "`+`".into(),
        Token::Minus => "`-`".into(),
        Token::Star => "`*`".into(),
        Token::Slash => "`/`".into(),
        Token::Percent => "`%`".into(),
        Token::Eq => "`==`".into(),
        Token::Ne => "`!=`".into(),
        Token::Lt => "`<`".into(),
        Token::Le => "`<=`".into(),
        Token::Gt => "`>`".into(),
        Token::Ge => "`>=`".into(),
        Token::AndAnd => "`&&`".into(),
        Token::OrOr => "`||`".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprError;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.into()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a || b && c == d").unwrap();
        let expected = Expr::Binary(
            BinaryOp::Or,
            ident("a"),
            Box::new(Expr::Binary(
                BinaryOp::And,
                ident("b"),
                Box::new(Expr::Binary(BinaryOp::Eq, ident("c"), ident("d"))),
            )),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_left_associative_arithmetic() {
        let expr = parse("a - b - c").unwrap();
        let expected = Expr::Binary(
            BinaryOp::Sub,
            Box::new(Expr::Binary(BinaryOp::Sub, ident("a"), ident("b"))),
            ident("c"),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_postfix_and_calls() {
        let expr = parse(r#"len(environ["PATH"]) > 0"#).unwrap();
        let Expr::Binary(BinaryOp::Gt, lhs, _) = expr else { panic!("not a comparison") };
        let Expr::Call(name, args) = *lhs else { panic!("not a call") };
        assert_eq!(name, "len");
        assert!(matches!(&args[0], Expr::Index(base, _) if **base == Expr::Ident("environ".into())));
    }

    #[test]
    fn test_word_operators() {
        let expr = parse(r#"not features.cats and "x" in ["x", "y"]"#).unwrap();
        assert!(matches!(expr, Expr::Binary(BinaryOp::And, _, _)));
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let expr = parse("a ? b : c ? d : e").unwrap();
        let Expr::Ternary(_, _, otherwise) = expr else { panic!("not a ternary") };
        assert!(matches!(*otherwise, Expr::Ternary(..)));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse("a b"), Err(ExprError::Syntax { position: 2, .. })));
        assert!(matches!(parse("(a"), Err(ExprError::Syntax { position: 2, .. })));
        assert!(matches!(parse(""), Err(ExprError::Syntax { position: 0, .. })));
    }
}
