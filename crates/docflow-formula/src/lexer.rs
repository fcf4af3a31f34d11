//! Tokenizer for calculation scripts.
//!
//! Whitespace and `//` line comments are skipped. Numbers may carry an
//! exponent (`1e3`, `2.5E-1`) but never run straight into a name. Strings use `"` or `'`
//! and have no escape sequences. Any character outside the grammar is an
//! error rather than being silently dropped.

use crate::types::{Token, TokenKind};

/// A tokenizer failure at byte offset `pos`.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub pos: usize,
    pub message: String,
}

/// Pull-based tokenizer: the parser asks for one token at a time, so a
/// bad character is reported against the statement being parsed.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        let source = self.source;
        let bytes = source.as_bytes();
        let mut i = self.pos;

        // Whitespace and comments.
        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i + 1 < bytes.len() && bytes[i] == b'/' && bytes[i + 1] == b'/' {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            break;
        }
        if i >= bytes.len() {
            self.pos = i;
            return Ok(None);
        }

        let start = i;
        let c = bytes[i];

        let kind = if c.is_ascii_digit()
            || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            let mut seen_dot = false;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                if bytes[i] == b'.' {
                    if seen_dot {
                        return Err(LexError {
                            pos: i,
                            message: format!("malformed number '{}'", number_run(source, start)),
                        });
                    }
                    seen_dot = true;
                }
                i += 1;
            }
            if matches!(bytes.get(i), Some(b'e' | b'E')) {
                let digits_at = match bytes.get(i + 1) {
                    Some(b'+' | b'-') => i + 2,
                    _ => i + 1,
                };
                if bytes.get(digits_at).is_some_and(u8::is_ascii_digit) {
                    i = digits_at;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            if bytes
                .get(i)
                .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'.')
            {
                return Err(LexError {
                    pos: start,
                    message: format!("malformed number '{}'", number_run(source, start)),
                });
            }
            let text = &source[start..i];
            let value = text.parse::<f64>().map_err(|_| LexError {
                pos: start,
                message: format!("malformed number '{text}'"),
            })?;
            TokenKind::Number(value)
        } else if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            match &source[start..i] {
                "const" | "let" | "var" => TokenKind::Declare,
                word => TokenKind::Ident(word.to_owned()),
            }
        } else if c == b'"' || c == b'\'' {
            i += 1;
            let body_start = i;
            while i < bytes.len() && bytes[i] != c {
                i += 1;
            }
            if i >= bytes.len() {
                return Err(LexError {
                    pos: start,
                    message: "unterminated string literal".into(),
                });
            }
            let body = source[body_start..i].to_owned();
            i += 1;
            TokenKind::Str(body)
        } else {
            let (kind, width) = match (c, bytes.get(i + 1).copied()) {
                (b'|', Some(b'|')) => (TokenKind::OrOr, 2),
                (b'*', Some(b'*')) => (TokenKind::StarStar, 2),
                (b'+', _) => (TokenKind::Plus, 1),
                (b'-', _) => (TokenKind::Minus, 1),
                (b'*', _) => (TokenKind::Star, 1),
                (b'/', _) => (TokenKind::Slash, 1),
                (b'(', _) => (TokenKind::LParen, 1),
                (b')', _) => (TokenKind::RParen, 1),
                (b',', _) => (TokenKind::Comma, 1),
                (b';', _) => (TokenKind::Semicolon, 1),
                (b'=', _) => (TokenKind::Assign, 1),
                _ => {
                    let ch = source[i..].chars().next().unwrap_or('?');
                    return Err(LexError {
                        pos: i,
                        message: format!("unexpected character '{ch}'"),
                    });
                }
            };
            i += width;
            kind
        };

        self.pos = i;
        Ok(Some(Token {
            kind,
            start,
            end: i,
        }))
    }
}

/// Splits all of `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

fn number_run(source: &str, start: usize) -> &str {
    let end = source[start..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .map_or(source.len(), |n| start + n);
    &source[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_assignment() {
        assert_eq!(
            kinds("let x = 1.5 * y;"),
            vec![
                TokenKind::Declare,
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Number(1.5),
                TokenKind::Star,
                TokenKind::Ident("y".into()),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("a ** b || c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::StarStar,
                TokenKind::Ident("b".into()),
                TokenKind::OrOr,
                TokenKind::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn strings_with_either_quote() {
        assert_eq!(
            kinds(r#"getValue("Main:A1") 'x'"#),
            vec![
                TokenKind::Ident("getValue".into()),
                TokenKind::LParen,
                TokenKind::Str("Main:A1".into()),
                TokenKind::RParen,
                TokenKind::Str("x".into()),
            ]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("// header\nx = 1 // trailing\n"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Number(1.0),
            ]
        );
    }

    #[test]
    fn token_spans() {
        let tokens = tokenize("ab + 'c'").unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (0, 2));
        assert_eq!((tokens[2].start, tokens[2].end), (5, 8));
    }

    #[test]
    fn rejects_bad_input() {
        let err = tokenize("x = 1 @ 2").unwrap_err();
        assert_eq!(err.pos, 6);
        assert!(err.message.contains('@'));

        let err = tokenize("x = 'open").unwrap_err();
        assert!(err.message.contains("unterminated"));

        let err = tokenize("x = 1.2.3").unwrap_err();
        assert!(err.message.contains("1.2.3"));

        assert!(tokenize("a | b").is_err());
    }

    #[test]
    fn exponents() {
        assert_eq!(kinds("1e3"), vec![TokenKind::Number(1000.0)]);
        assert_eq!(kinds("2.5E-1"), vec![TokenKind::Number(0.25)]);
        assert_eq!(kinds("4e+2"), vec![TokenKind::Number(400.0)]);
        assert_eq!(
            kinds("x = 1e3;"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Number(1000.0),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn number_glued_to_a_name() {
        let err = tokenize("x = 1abc").unwrap_err();
        assert_eq!(err.pos, 4);
        assert!(err.message.contains("malformed number '1abc'"), "{}", err.message);

        // An exponent marker without digits is not an exponent.
        let err = tokenize("x = 2e").unwrap_err();
        assert!(err.message.contains("'2e'"), "{}", err.message);
        assert!(tokenize("x = 3e-").is_err());
    }
}
