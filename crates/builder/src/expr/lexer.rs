use super::error::{ExprError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

/// A token together with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) position: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = match c {
            b'0'..=b'9' => {
                let (token, end) = number(source, pos)?;
                pos = end;
                token
            },
            b'"' | b'\'' => {
                let (text, end) = string(source, pos)?;
                pos = end;
                Token::Str(text)
            },
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    pos += 1;
                }
                Token::Ident(source[start..pos].to_owned())
            },
            _ => {
                let next = bytes.get(pos + 1).copied();
                let (token, width) = match (c, next) {
                    (b'=', Some(b'=')) => (Token::Eq, 2),
                    (b'!', Some(b'=')) => (Token::Ne, 2),
                    (b'<', Some(b'=')) => (Token::Le, 2),
                    (b'>', Some(b'=')) => (Token::Ge, 2),
                    (b'&', Some(b'&')) => (Token::AndAnd, 2),
                    (b'|', Some(b'|')) => (Token::OrOr, 2),
                    (b'(', _) => (Token::LParen, 1),
                    (b')', _) => (Token::RParen, 1),
                    (b'[', _) => (Token::LBracket, 1),
                    (b']', _) => (Token::RBracket, 1),
                    (b',', _) => (Token::Comma, 1),
                    (b'.', _) => (Token::Dot, 1),
                    (b'?', _) => (Token::Question, 1),
                    (b':', _) => (Token::Colon, 1),
                    (b'!', _) => (Token::Bang, 1),
                    (b'+', _) => (Token::Plus, 1),
                    (b'-', _) => (Token::Minus, 1),
                    (b'*', _) => (Token::Star, 1),
                    (b'/', _) => (Token::Slash, 1),
                    (b'%', _) => (Token::Percent, 1),
                    (b'<', _) => (Token::Lt, 1),
                    (b'>', _) => (Token::Gt, 1),
                    _ => {
                        let ch = source[pos..].chars().next().unwrap_or('?');
                        return Err(syntax(format!("unexpected character `{ch}`"), pos));
                    },
                };
                pos += width;
                token
            },
        };
        tokens.push(Spanned { token, position: start });
    }

    Ok(tokens)
}

pub(crate) fn syntax(message: impl Into<std::borrow::Cow<'static, str>>, position: usize) -> ExprError {
    ExprError::Syntax { message: message.into(), position, context: None }
}

fn number(source: &str, start: usize) -> Result<(Token, usize)> {
    let bytes = source.as_bytes();
    let mut pos = start;
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'_') {
        pos += 1;
    }

    // `1.x` is member access on an integer, `1.5` is a float
    let is_float = bytes.get(pos) == Some(&b'.') && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit);
    if is_float {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            let text = source[start..pos].replace('_', "");
            let value = text.parse::<f64>().map_err(|e| syntax(e.to_string(), start))?;
            return Ok((Token::Float(value), pos));
        }
    }

    let text = source[start..pos].replace('_', "");
    let token = if is_float {
        Token::Float(text.parse::<f64>().map_err(|e| syntax(e.to_string(), start))?)
    } else {
        Token::Int(text.parse::<i64>().map_err(|e| syntax(e.to_string(), start))?)
    };
    Ok((token, pos))
}

fn string(source: &str, start: usize) -> Result<(String, usize)> {
    let mut chars = source[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(syntax("expected a string", start));
    };

    let mut out = String::new();
    while let Some((offset, c)) = chars.next() {
        if c == quote {
            return Ok((out, start + offset + c.len_utf8()));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some((esc_offset, esc)) = chars.next() else { break };
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'u' => {
                let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
                let decoded = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                match decoded {
                    Some(ch) if hex.len() == 4 => out.push(ch),
                    _ => {
                        return Err(syntax(format!("invalid unicode escape `\\u{hex}`"), start + esc_offset));
                    },
                }
            },
            other => {
                return Err(syntax(format!("unknown escape sequence `\\{other}`"), start + esc_offset));
            },
        }
    }

    Err(syntax("unterminated string literal", start))
}
