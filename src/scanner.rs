use std::iter::FusedIterator;

use log::{debug, info};
use phf::phf_map;

use crate::error::{ErrorCode, LoxError, Result};
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"break" => TokenType::BREAK,
    b"class" => TokenType::CLASS,
    b"continue" => TokenType::CONTINUE,
    b"else" => TokenType::ELSE,
    b"false" => TokenType::FALSE,
    b"fun" => TokenType::FUN,
    b"for" => TokenType::FOR,
    b"if" => TokenType::IF,
    b"nil" => TokenType::NIL,
    b"print" => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super" => TokenType::SUPER,
    b"this" => TokenType::THIS,
    b"true" => TokenType::TRUE,
    b"var" => TokenType::VAR,
    b"while" => TokenType::WHILE,
};

/// Byte-cursor lexer.  Yields `Result<Token, LoxError>` and fuses after the
/// first error; the remainder of the stream past an error is undefined.
#[derive(Debug, Clone)]
pub struct Scanner {
    source: Vec<u8>,
    start: usize,
    curr_ptr: usize,
    line: usize,
    column: usize,
    token_line: usize,
    token_column: usize,
    had_error: bool,
    emitted_eof: bool,
    pending_token: Option<TokenType>,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        info!("Initializing Scanner with {} bytes", source.len());
        Self {
            source: source.as_bytes().to_vec(),
            start: 0,
            curr_ptr: 0,
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
            had_error: false,
            emitted_eof: false,
            pending_token: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Drive the iterator to completion, stopping at the first error.
    pub fn scan_tokens(self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::new();

        for item in self {
            tokens.push(item?);
        }

        Ok(tokens)
    }

    fn scan_token(&mut self) -> Result<()> {
        let byte: u8 = self.advance();

        match byte {
            b'(' => self.add_token(TokenType::LEFT_PAREN),

            b')' => self.add_token(TokenType::RIGHT_PAREN),

            b'{' => self.add_token(TokenType::LEFT_BRACE),

            b'}' => self.add_token(TokenType::RIGHT_BRACE),

            b',' => self.add_token(TokenType::COMMA),

            b'.' => self.add_token(TokenType::DOT),

            b'-' => self.add_token(TokenType::MINUS),

            b'+' => self.add_token(TokenType::PLUS),

            b';' => self.add_token(TokenType::SEMICOLON),

            b'*' => {
                // A close-comment with no matching open is not division
                // times anything; reject it where it stands.
                if self.match_byte(b'/') {
                    return Err(self.error(ErrorCode::UnexpectedToken, "Unexpected token '*/'"));
                }

                self.add_token(TokenType::STAR);
            }

            b'!' => {
                let token_type: TokenType = if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                };
                self.add_token(token_type);
            }

            b'=' => {
                let token_type: TokenType = if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                };
                self.add_token(token_type);
            }

            b'<' => {
                let token_type: TokenType = if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                };
                self.add_token(token_type);
            }

            b'>' => {
                let token_type: TokenType = if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };
                self.add_token(token_type);
            }

            b'&' => {
                if self.match_byte(b'&') {
                    self.add_token(TokenType::AND);
                } else {
                    return Err(self.error(ErrorCode::UnexpectedToken, "Unexpected character '&'"));
                }
            }

            b'|' => {
                if self.match_byte(b'|') {
                    self.add_token(TokenType::OR);
                } else {
                    return Err(self.error(ErrorCode::UnexpectedToken, "Unexpected character '|'"));
                }
            }

            b' ' | b'\r' | b'\t' | b'\n' => {
                debug!("Skipping whitespace");
            }

            b'/' => {
                if self.match_byte(b'/') {
                    debug!("Found line comment, skipping until newline");
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_byte(b'*') {
                    self.skip_block_comment()?;
                } else {
                    self.add_token(TokenType::SLASH);
                }
            }

            b'"' => {
                self.parse_string()?;
            }

            b'0'..=b'9' => {
                self.parse_number();
            }

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.parse_identifier();
            }

            _ => {
                return Err(self.error(
                    ErrorCode::UnexpectedToken,
                    format!("Unexpected character '{}'", byte as char),
                ));
            }
        }

        Ok(())
    }

    // Block comments do not nest.
    fn skip_block_comment(&mut self) -> Result<()> {
        debug!("Skipping block comment at line {}", self.token_line);

        loop {
            if self.is_at_end() {
                return Err(self.error(
                    ErrorCode::UnterminatedComment,
                    "Unterminated block comment",
                ));
            }

            if self.peek() == b'*' && self.peek_next() == b'/' {
                self.advance();
                self.advance();
                return Ok(());
            }

            self.advance();
        }
    }

    fn parse_string(&mut self) -> Result<()> {
        while !self.is_at_end() && self.peek() != b'"' {
            self.advance();
        }

        if self.is_at_end() {
            // Positioned at the opening quote.
            return Err(self.error(ErrorCode::UnterminatedString, "Unterminated string"));
        }

        self.advance();

        let parsed_string: String =
            String::from_utf8_lossy(&self.source[self.start + 1..self.curr_ptr - 1]).into_owned();

        debug!("Parsed string literal: {}", parsed_string);

        self.add_token(TokenType::STRING(parsed_string));

        Ok(())
    }

    fn parse_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme = &self.source[self.start..self.curr_ptr];
        let number: f64 = std::str::from_utf8(lexeme)
            .ok()
            .and_then(|text| text.parse().ok())
            .unwrap_or(0.0);

        debug!("Parsed number: {}", number);

        self.add_token(TokenType::NUMBER(number));
    }

    fn parse_identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }

        let text: &[u8] = &self.source[self.start..self.curr_ptr];

        match KEYWORDS.get(text) {
            Some(token_type) => {
                self.add_token(token_type.clone());
            }

            None => {
                self.add_token(TokenType::IDENTIFIER);
            }
        }
    }

    #[inline]
    fn add_token(&mut self, token_type: TokenType) {
        self.pending_token = Some(token_type);
    }

    #[inline]
    fn error<S: Into<String>>(&mut self, code: ErrorCode, msg: S) -> LoxError {
        self.had_error = true;
        LoxError::syntax(code, self.token_line, self.token_column, msg)
    }

    // Line and column bookkeeping lives here; columns count code points,
    // so UTF-8 continuation bytes do not advance them.
    #[inline]
    fn advance(&mut self) -> u8 {
        let byte = self.source[self.curr_ptr];

        self.curr_ptr += 1;

        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if byte & 0xC0 != 0x80 {
            self.column += 1;
        }

        byte
    }

    #[inline]
    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.curr_ptr] != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    #[inline]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.curr_ptr]
        }
    }

    #[inline]
    fn peek_next(&self) -> u8 {
        if self.curr_ptr + 1 >= self.len() {
            0
        } else {
            self.source[self.curr_ptr + 1]
        }
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.curr_ptr >= self.len()
    }
}

impl Iterator for Scanner {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.had_error || self.emitted_eof {
            return None;
        }

        loop {
            if self.is_at_end() {
                self.emitted_eof = true;

                info!("Reached EOF at line {}", self.line);

                return Some(Ok(Token::new(
                    TokenType::EOF,
                    String::new(),
                    self.line,
                    self.column,
                )));
            }

            self.pending_token = None;
            self.start = self.curr_ptr;
            self.token_line = self.line;
            self.token_column = self.column;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some(token_type) = self.pending_token.take() {
                let lexeme: String =
                    String::from_utf8_lossy(&self.source[self.start..self.curr_ptr]).into_owned();

                debug!(
                    "Emitting token: type={:?}, lexeme={}, line={}",
                    token_type, lexeme, self.token_line
                );

                return Some(Ok(Token::new(
                    token_type,
                    lexeme,
                    self.token_line,
                    self.token_column,
                )));
            }

            // Whitespace or a comment; keep scanning.
        }
    }
}

impl FusedIterator for Scanner {}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        Scanner::new(source)
            .scan_tokens()
            .expect("scan failed")
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn logical_operators() {
        assert_eq!(
            kinds("a && b || c"),
            vec![
                TokenType::IDENTIFIER,
                TokenType::AND,
                TokenType::IDENTIFIER,
                TokenType::OR,
                TokenType::IDENTIFIER,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn bare_ampersand_is_rejected() {
        let err = Scanner::new("a & b").scan_tokens().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UnexpectedToken));
    }

    #[test]
    fn block_comment_is_skipped() {
        assert_eq!(
            kinds("1 /* comment \n spanning lines */ 2"),
            vec![
                TokenType::NUMBER(1.0),
                TokenType::NUMBER(2.0),
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn stray_close_comment_is_rejected() {
        let err = Scanner::new("1 */ 2").scan_tokens().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UnexpectedToken));
    }

    #[test]
    fn columns_track_code_points() {
        let tokens = Scanner::new("var x;\n  x = 1;").scan_tokens().unwrap();

        let x_assign = &tokens[3];
        assert_eq!(x_assign.lexeme, "x");
        assert_eq!(x_assign.line, 2);
        assert_eq!(x_assign.column, 3);
    }

    #[test]
    fn unterminated_string_points_at_opening_quote() {
        let err = Scanner::new("var s = \"abc").scan_tokens().unwrap_err();

        match err {
            LoxError::Syntax { code, column, .. } => {
                assert_eq!(code, ErrorCode::UnterminatedString);
                assert_eq!(column, 9);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
