//! Tokenizer for the demo grammar.

use crate::error::{Error, Result};

/// Kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword.
    Ident,
    /// Numeric literal.
    Number,
    /// String literal, including quotes.
    Str,
    /// Punctuation or operator.
    Punct,
}

/// A lexed token with its source line.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }
}

/// Two-character operators, checked before single-character punctuation.
const DOUBLE_PUNCT: &[&str] = &["==", "!=", "<=", ">=", "&&", "||"];

const SINGLE_PUNCT: &[char] = &[
    '{', '}', '(', ')', '[', ']', ';', ',', '.', '=', '+', '-', '*', '/', '%', '<', '>', '?', ':',
    '!',
];

/// Tokenizes source text, skipping whitespace and comments.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < chars.len() {
        let c = chars[pos];

        if c == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // Line comment
        if c == '/' && chars.get(pos + 1) == Some(&'/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && chars.get(pos + 1) == Some(&'*') {
            pos += 2;
            loop {
                if pos >= chars.len() {
                    return Err(Error::Parse {
                        line,
                        message: "unterminated block comment".into(),
                    });
                }
                if chars[pos] == '\n' {
                    line += 1;
                }
                if chars[pos] == '*' && chars.get(pos + 1) == Some(&'/') {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            tokens.push(Token::new(TokenKind::Ident, text, line));
            continue;
        }

        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '.' || chars[pos] == '_')
            {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            tokens.push(Token::new(TokenKind::Number, text, line));
            continue;
        }

        if c == '"' {
            let start = pos;
            pos += 1;
            loop {
                if pos >= chars.len() || chars[pos] == '\n' {
                    return Err(Error::Parse {
                        line,
                        message: "unterminated string literal".into(),
                    });
                }
                if chars[pos] == '\\' {
                    pos += 2;
                    continue;
                }
                if chars[pos] == '"' {
                    pos += 1;
                    break;
                }
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            tokens.push(Token::new(TokenKind::Str, text, line));
            continue;
        }

        let two: String = chars[pos..(pos + 2).min(chars.len())].iter().collect();
        if DOUBLE_PUNCT.contains(&two.as_str()) {
            tokens.push(Token::new(TokenKind::Punct, two, line));
            pos += 2;
            continue;
        }

        if SINGLE_PUNCT.contains(&c) {
            tokens.push(Token::new(TokenKind::Punct, c.to_string(), line));
            pos += 1;
            continue;
        }

        return Err(Error::Parse {
            line,
            message: format!("unexpected character '{}'", c),
        });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_declaration() {
        let tokens = tokenize("private int n = 0;").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["private", "int", "n", "=", "0", ";"]);
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("a == b && c <= d").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "==", "b", "&&", "c", "<=", "d"]);
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("a; // trailing\n/* block\n comment */ b;").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", ";", "b", ";"]);
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn test_string_literal() {
        let tokens = tokenize(r#"print("hi \" there");"#).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].text, r#""hi \" there""#);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("  \n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("\"oops").is_err());
    }
}
