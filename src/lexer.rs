use crate::Real;
use crate::types::TokenKind;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<Real>,
    pub text: Option<String>,
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, text: &str, position: usize) -> Self {
        Self {
            kind,
            value: None,
            text: Some(String::from(text)),
            position,
        }
    }

    fn number(value: Real, text: &str, position: usize) -> Self {
        Self {
            kind: TokenKind::Number,
            value: Some(value),
            text: Some(String::from(text)),
            position,
        }
    }
}

/// The lexer struct, which produces tokens from an input string.
#[derive(Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pub pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Peek at the current character.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Peek one character past the current one.
    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advance the position by one character.
    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn consume_digits(&mut self) -> bool {
        let mut any = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                any = true;
                self.advance();
            } else {
                break;
            }
        }
        any
    }

    /// Reads `[digits][.digits][e[+-]digits]` starting at the current position.
    fn lex_number(&mut self, start_pos: usize) -> Token {
        let int_digits = self.consume_digits();
        let mut frac_digits = false;
        if self.peek() == Some('.') {
            self.advance();
            frac_digits = self.consume_digits();
        }
        if !int_digits && !frac_digits {
            return Token::new(TokenKind::Error, &self.input[start_pos..self.pos], start_pos);
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            // `2e` or `2e+` is not a number
            if !self.consume_digits() {
                return Token::new(TokenKind::Error, &self.input[start_pos..self.pos], start_pos);
            }
        }

        // A second dot directly after a number (`1..2`, `1.2.3`) is malformed
        if self.peek() == Some('.') {
            self.advance();
            self.consume_digits();
            return Token::new(TokenKind::Error, &self.input[start_pos..self.pos], start_pos);
        }

        let text = &self.input[start_pos..self.pos];
        let parsed = if text.starts_with('.') {
            format!("0{text}").parse::<Real>()
        } else {
            text.parse::<Real>()
        };
        match parsed {
            Ok(val) => Token::number(val, text, start_pos),
            Err(_) => Token::new(TokenKind::Error, text, start_pos),
        }
    }

    /// Get the next token from the input.
    pub fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace();
        let start_pos = self.pos;
        let c = self.peek()?;

        if c.is_ascii_digit() || (c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit())) {
            return Some(self.lex_number(start_pos));
        }

        let op_start = "+-*/^%.<>=!&|";
        if op_start.contains(c) {
            self.advance();
            let mut text = String::from(c);
            if let Some(nc) = self.peek() {
                match (c, nc) {
                    ('*', '*') | ('&', '&') | ('|', '|') | ('<', '=') | ('>', '=') | ('=', '=')
                    | ('!', '=') => {
                        text.push(nc);
                        self.advance();
                    }
                    _ => {}
                }
            }
            // A lone `&`, `|` or `=` has no meaning in the grammar
            let kind = match text.as_str() {
                "&" | "|" | "=" => TokenKind::Error,
                _ => TokenKind::Operator,
            };
            return Some(Token::new(kind, &text, start_pos));
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = self.pos;
            while let Some(nc) = self.input[end..].chars().next() {
                if nc.is_ascii_alphanumeric() || nc == '_' {
                    end += nc.len_utf8();
                } else {
                    break;
                }
            }
            let ident = &self.input[self.pos..end];
            self.pos = end;
            return Some(Token::new(TokenKind::Variable, ident, start_pos));
        }

        let kind = match c {
            '(' => TokenKind::Open,
            ')' => TokenKind::Close,
            ',' => TokenKind::Separator,
            _ => TokenKind::Error,
        };
        self.advance();
        Some(Token::new(kind, &self.input[start_pos..self.pos], start_pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        while let Some(tok) = lexer.next_token() {
            tokens.push(tok);
            if tokens.len() > 64 {
                break;
            }
        }
        tokens
    }

    #[test]
    fn test_lexer_tokenization_all_types() {
        let kinds: Vec<TokenKind> = collect("1 + foo_bar * (2.5e-1) , -baz_123 / 4.2 ^ _x")
            .iter()
            .map(|t| t.kind)
            .collect();
        assert!(kinds.contains(&TokenKind::Number));
        assert!(kinds.contains(&TokenKind::Operator));
        assert!(kinds.contains(&TokenKind::Variable));
        assert!(kinds.contains(&TokenKind::Open));
        assert!(kinds.contains(&TokenKind::Close));
        assert!(kinds.contains(&TokenKind::Separator));
        assert!(!kinds.contains(&TokenKind::Error));
    }

    #[test]
    fn test_lexer_tokenization_error_tokens() {
        assert!(collect("1 $ 2").iter().any(|t| t.kind == TokenKind::Error));
        assert!(collect("a = b").iter().any(|t| t.kind == TokenKind::Error));
    }

    #[test]
    fn test_lexer_tokenization_malformed_numbers() {
        assert!(collect("1..2").iter().any(|t| t.kind == TokenKind::Error));
        assert!(collect("1e--2").iter().any(|t| t.kind == TokenKind::Error));
    }

    #[test]
    fn test_lexer_decimal_with_leading_dot() {
        let values: Vec<Option<Real>> = collect(".5 .125 .0 .9e2").iter().map(|t| t.value).collect();
        assert_eq!(values, vec![Some(0.5), Some(0.125), Some(0.0), Some(90.0)]);
    }

    #[test]
    fn test_lexer_qualified_name() {
        let tokens = collect("math.sqrt(x)");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_deref().unwrap()).collect();
        assert_eq!(texts, vec!["math", ".", "sqrt", "(", "x", ")"]);
        assert_eq!(tokens[1].kind, TokenKind::Operator);
    }

    #[test]
    fn test_lexer_multichar_operators() {
        let ops: Vec<String> = collect("a && b || c == d != e <= f >= g ** h")
            .into_iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .filter_map(|t| t.text)
            .collect();
        assert_eq!(ops, vec!["&&", "||", "==", "!=", "<=", ">=", "**"]);
    }
}
