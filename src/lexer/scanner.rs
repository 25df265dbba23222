//! Scanner for Rill source code.
//!
//! The scanner is a pull interface: the parser calls [`Scanner::next_token`]
//! on demand, so the full token stream is never buffered.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The scanner transforms source text into a stream of tokens.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
    start_pos: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan the next token. The final token of every stream is `Eof`.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        self.mark_start();

        let Some(c) = self.advance() else {
            return Ok(Token::eof(self.current_pos, self.line, self.column));
        };

        match c {
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            '[' => Ok(self.make_token(TokenKind::LeftBracket)),
            ']' => Ok(self.make_token(TokenKind::RightBracket)),
            ',' => Ok(self.make_token(TokenKind::Comma)),
            '.' => Ok(self.make_token(TokenKind::Dot)),
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            '-' => Ok(self.make_token(TokenKind::Minus)),
            '*' => Ok(self.make_token(TokenKind::Star)),
            '/' => Ok(self.make_token(TokenKind::Slash)),

            '+' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::PlusEqual))
                } else {
                    Ok(self.make_token(TokenKind::Plus))
                }
            }
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual))
                } else {
                    Ok(self.make_token(TokenKind::Equal))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Ok(self.make_token(TokenKind::Bang))
                }
            }
            '<' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::LessEqual))
                } else {
                    Ok(self.make_token(TokenKind::Less))
                }
            }
            '>' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::GreaterEqual))
                } else {
                    Ok(self.make_token(TokenKind::Greater))
                }
            }

            '"' => self.scan_string(),

            c if c.is_ascii_digit() => self.scan_number(),

            c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),

            _ => Err(LexerError::unexpected_char(c, self.current_span())),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self) -> Result<Token, LexerError> {
        loop {
            match self.peek() {
                // No escapes; a newline inside a literal is unterminated.
                None | Some('\n') => {
                    return Err(LexerError::unterminated_string(self.current_span()));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        // Strip the surrounding quotes from the lexeme.
        let value = self.source[self.start_pos + 1..self.current_pos - 1].to_string();
        Ok(self.make_token(TokenKind::StringLiteral(value)))
    }

    fn scan_number(&mut self) -> Result<Token, LexerError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        // A dot is only part of the number when a digit follows it.
        if self.peek() == Some('.') && matches!(self.peek_next(), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let lexeme = &self.source[self.start_pos..self.current_pos];
        let value: f64 = lexeme.parse().unwrap_or(0.0);
        Ok(self.make_token(TokenKind::NumberLiteral(value)))
    }

    fn scan_identifier(&mut self) -> Result<Token, LexerError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let lexeme = &self.source[self.start_pos..self.current_pos];
        let kind = TokenKind::keyword(lexeme)
            .unwrap_or_else(|| TokenKind::Identifier(lexeme.to_string()));
        Ok(self.make_token(kind))
    }

    // ===== Cursor primitives =====

    fn mark_start(&mut self) {
        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.current_pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&mut self) -> Option<char> {
        self.source[self.current_pos..].chars().nth(1)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            Span::new(
                self.start_pos,
                self.current_pos,
                self.start_line,
                self.start_column,
            ),
        )
    }

    fn current_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut kinds = Vec::new();
        loop {
            let token = scanner.next_token().expect("lexer error");
            let done = token.kind == TokenKind::Eof;
            kinds.push(token.kind);
            if done {
                break;
            }
        }
        kinds
    }

    #[test]
    fn test_punctuation_and_operators() {
        let kinds = scan_all("( ) { } [ ] , ; . + - * / = == != ! > >= < <= +=");
        assert_eq!(
            kinds,
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Dot,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::Bang,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::PlusEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            scan_all("42 3.5"),
            vec![
                TokenKind::NumberLiteral(42.0),
                TokenKind::NumberLiteral(3.5),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_dot_without_digit_is_separate() {
        // `1.foo` lexes as NUMBER DOT IDENT, not a malformed float.
        assert_eq!(
            scan_all("1.foo"),
            vec![
                TokenKind::NumberLiteral(1.0),
                TokenKind::Dot,
                TokenKind::Identifier("foo".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_literal_strips_quotes() {
        assert_eq!(
            scan_all("\"hello\""),
            vec![TokenKind::StringLiteral("hello".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let mut scanner = Scanner::new("\"abc");
        assert!(matches!(
            scanner.next_token(),
            Err(LexerError::UnterminatedString(_))
        ));

        let mut scanner = Scanner::new("\"abc\ndef\"");
        assert!(matches!(
            scanner.next_token(),
            Err(LexerError::UnterminatedString(_))
        ));
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            scan_all("let functions function _x1"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier("functions".to_string()),
                TokenKind::Function,
                TokenKind::Identifier("_x1".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let mut scanner = Scanner::new("// comment\nx");
        let token = scanner.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::Identifier("x".to_string()));
        assert_eq!(token.span.line, 2);
    }

    #[test]
    fn test_unexpected_char() {
        let mut scanner = Scanner::new("@");
        assert!(matches!(
            scanner.next_token(),
            Err(LexerError::UnexpectedChar('@', _))
        ));
    }
}
