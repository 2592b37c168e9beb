//! Scanner for Tamarin source code.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The scanner transforms source code into a stream of tokens.
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

    /// Scan all tokens from the source.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Scan the next token.
    fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        self.mark_start();

        let Some((_, c)) = self.advance() else {
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
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            ':' => Ok(self.make_token(TokenKind::Colon)),
            '+' => Ok(self.make_token(TokenKind::Plus)),
            '-' => Ok(self.make_token(TokenKind::Minus)),
            '*' => Ok(self.make_token(TokenKind::Star)),
            '/' => Ok(self.make_token(TokenKind::Slash)),
            '<' => Ok(self.make_token(TokenKind::Less)),
            '>' => Ok(self.make_token(TokenKind::Greater)),
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual))
                } else {
                    Ok(self.make_token(TokenKind::Assign))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Ok(self.make_token(TokenKind::Bang))
                }
            }
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if c.is_alphabetic() || c == '_' => Ok(self.scan_identifier(c)),
            _ => Err(LexerError::UnexpectedChar(c, self.current_span())),
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
                    self.line += 1;
                    self.column = 1;
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self) -> Result<Token, LexerError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(LexerError::UnterminatedString(self.current_span())),
                Some((_, '"')) => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, '"')) => value.push('"'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, other)) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err(LexerError::UnterminatedString(self.current_span())),
                },
                Some((_, '\n')) => {
                    self.line += 1;
                    self.column = 1;
                    value.push('\n');
                }
                Some((_, c)) => value.push(c),
            }
        }

        Ok(self.make_token(TokenKind::StringLiteral(value)))
    }

    fn scan_number(&mut self, _first: char) -> Result<Token, LexerError> {
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.advance();
        }

        let text = &self.source[self.start_pos..self.current_pos];
        match text.parse::<i64>() {
            Ok(value) => Ok(self.make_token(TokenKind::IntLiteral(value))),
            Err(_) => Err(LexerError::InvalidNumber(
                text.to_string(),
                self.current_span(),
            )),
        }
    }

    fn scan_identifier(&mut self, _first: char) -> Token {
        while let Some(c) = self.peek() {
            if !c.is_alphanumeric() && c != '_' {
                break;
            }
            self.advance();
        }

        let text = &self.source[self.start_pos..self.current_pos];
        match TokenKind::keyword(text) {
            Some(kind) => self.make_token(kind),
            None => self.make_token(TokenKind::Identifier(text.to_string())),
        }
    }

    // ===== Cursor helpers =====

    fn advance(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((pos, c)) = next {
            self.current_pos = pos + c.len_utf8();
            self.column += 1;
        }
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.current_pos..].chars().nth(n)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn mark_start(&mut self) {
        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.current_span())
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

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .expect("lexer error")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators_and_delimiters() {
        assert_eq!(
            kinds("=+(){},;"),
            vec![
                TokenKind::Assign,
                TokenKind::Plus,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_let_function() {
        assert_eq!(
            kinds("let add = fn(x, y) { x + y; };"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier("add".to_string()),
                TokenKind::Assign,
                TokenKind::Fn,
                TokenKind::LeftParen,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Comma,
                TokenKind::Identifier("y".to_string()),
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Plus,
                TokenKind::Identifier("y".to_string()),
                TokenKind::Semicolon,
                TokenKind::RightBrace,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("10 == 10; 9 != 10;"),
            vec![
                TokenKind::IntLiteral(10),
                TokenKind::EqualEqual,
                TokenKind::IntLiteral(10),
                TokenKind::Semicolon,
                TokenKind::IntLiteral(9),
                TokenKind::BangEqual,
                TokenKind::IntLiteral(10),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_collections() {
        assert_eq!(
            kinds(r#""foobar" [1, 2] {"key": "value"}"#),
            vec![
                TokenKind::StringLiteral("foobar".to_string()),
                TokenKind::LeftBracket,
                TokenKind::IntLiteral(1),
                TokenKind::Comma,
                TokenKind::IntLiteral(2),
                TokenKind::RightBracket,
                TokenKind::LeftBrace,
                TokenKind::StringLiteral("key".to_string()),
                TokenKind::Colon,
                TokenKind::StringLiteral("value".to_string()),
                TokenKind::RightBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_comments() {
        assert_eq!(
            kinds("1 // one\n2"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::IntLiteral(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Scanner::new("\"oops").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::UnterminatedString(_)));
    }

    #[test]
    fn test_unexpected_char() {
        let err = Scanner::new("1 @ 2").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::UnexpectedChar('@', _)));
    }
}
