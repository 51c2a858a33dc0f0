//! Lexical analysis for the source language.
//!
//! Contains [Scanner], which implements an [Iterator] that yields [Token]s
//! one at a time from a source string. This mirrors the original tutorial's
//! `gettok()`, but instead of buffering one `char` at a time into owned
//! `IdentifierStr`/`NumVal` globals, it slices directly out of the input
//! string, so identifiers and unrecognized-byte payloads borrow from the
//! caller's source text rather than allocating.
//!
//! # Example
//!
//! ```
//! use kaleidoscope::lexer::{Scanner, Token};
//!
//! let tokens: Vec<_> = Scanner::new("def foo(x) x+1")
//!     .take_while(|t| *t != Token::Eof)
//!     .collect();
//!
//! use Token::*;
//! assert_eq!(
//!     vec![Def, Identifier("foo"), Char(b'('), Identifier("x"), Char(b')'),
//!          Identifier("x"), Char(b'+'), Number(1.0)],
//!     tokens
//! );
//! ```

/// A single token of source text.
///
/// There is no source-position information attached; diagnostics in this
/// language never report a line or column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Token<'a> {
    Eof,
    Def,
    Extern,
    If,
    Then,
    Else,
    For,
    In,
    Binary,
    Unary,
    Var,
    Identifier(&'a str),
    Number(f64),
    /// Any other single ASCII byte: operators, parens, comma, semicolon.
    Char(u8),
}

/// Scans source code and yields [Token]s on demand.
///
/// Like [crate::ast], the scanner has no notion of a "bad" token: anything
/// that isn't a keyword, identifier, or number literal becomes a
/// [Token::Char], and it is up to the parser to reject it in context.
#[derive(Debug)]
pub struct Scanner<'a> {
    current: &'a str,
}

impl<'a> Scanner<'a> {
    /// Start scanning the given string of source code.
    pub fn new(source: &'a str) -> Self {
        Scanner { current: source }
    }

    /// Yield the next [Token] from the string. Once the end of the string is
    /// reached, this keeps returning [Token::Eof].
    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_whitespace_and_comments();

        if self.is_at_end() {
            return Token::Eof;
        }

        let start = self.current;

        match self.peek() {
            c if is_id_start(c) => self.identifier(start),
            c if c.is_ascii_digit() || c == '.' => self.number(start),
            c => {
                self.advance();
                Token::Char(c as u8)
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current.is_empty()
    }

    fn peek(&self) -> char {
        self.current.chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.current.chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    /// Advance one char, returning it.
    fn advance(&mut self) -> char {
        let c = self.peek();
        let len = c.len_utf8();
        self.current = &self.current[len..];
        c
    }

    /// Skip ASCII whitespace and `#`-to-end-of-line comments, possibly
    /// several times in a row.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '#' => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    /// Scan `[a-zA-Z_][a-zA-Z0-9_]*`, starting from a char already known to
    /// satisfy [is_id_start].
    fn identifier(&mut self, start: &'a str) -> Token<'a> {
        while is_id_continue(self.peek()) {
            self.advance();
        }
        let text = &start[..start.len() - self.current.len()];

        match text {
            "def" => Token::Def,
            "extern" => Token::Extern,
            "if" => Token::If,
            "then" => Token::Then,
            "else" => Token::Else,
            "for" => Token::For,
            "in" => Token::In,
            "binary" => Token::Binary,
            "unary" => Token::Unary,
            "var" => Token::Var,
            _ => Token::Identifier(text),
        }
    }

    /// Scan `[0-9]* ('.' [0-9]*)?`, mirroring `strtod`'s longest-valid-prefix
    /// rule: at most one `.` is ever consumed, so `"1.2.3"` scans as the
    /// number `1.2` and leaves `.3` for the caller to lex next, rather than
    /// swallowing the whole run and failing to parse it as one float.
    fn number(&mut self, start: &'a str) -> Token<'a> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text = &start[..start.len() - self.current.len()];
        match text.parse::<f64>() {
            Ok(value) => Token::Number(value),
            Err(_) => Token::Number(f64::NAN),
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        Some(self.next_token())
    }
}

fn is_id_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_id_continue(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scans_every_keyword() {
        use Token::*;
        let source = "def extern if then else for in binary unary var";
        let tokens: Vec<_> = Scanner::new(source)
            .take_while(|t| *t != Eof)
            .collect();
        assert_eq!(
            vec![Def, Extern, If, Then, Else, For, In, Binary, Unary, Var],
            tokens
        );
    }

    #[test]
    fn scans_identifiers_and_numbers() {
        use Token::*;
        let tokens: Vec<_> = Scanner::new("foo bar123 3.14 42")
            .take_while(|t| *t != Eof)
            .collect();
        assert_eq!(
            vec![
                Identifier("foo"),
                Identifier("bar123"),
                Number(3.14),
                Number(42.0)
            ],
            tokens
        );
    }

    #[test]
    fn a_second_dot_stops_the_number_and_is_lexed_separately() {
        use Token::*;
        // strtod("1.2.3", ...) parses the longest valid prefix, "1.2", and
        // leaves ".3" behind; this mirrors that rather than failing to
        // parse the whole run as one malformed float.
        let tokens: Vec<_> = Scanner::new("1.2.3").take_while(|t| *t != Eof).collect();
        assert_eq!(vec![Number(1.2), Number(0.3)], tokens);
    }

    #[test]
    fn scans_operators_and_punctuation() {
        use Token::*;
        let tokens: Vec<_> = Scanner::new("(a, b) * c + d < e : f")
            .take_while(|t| *t != Eof)
            .collect();
        assert_eq!(
            vec![
                Char(b'('),
                Identifier("a"),
                Char(b','),
                Identifier("b"),
                Char(b')'),
                Char(b'*'),
                Identifier("c"),
                Char(b'+'),
                Identifier("d"),
                Char(b'<'),
                Identifier("e"),
                Char(b':'),
                Identifier("f"),
            ],
            tokens
        );
    }

    #[test]
    fn skips_comments_to_end_of_line() {
        use Token::*;
        let tokens: Vec<_> = Scanner::new("1 # a comment\n+ 2")
            .take_while(|t| *t != Eof)
            .collect();
        assert_eq!(vec![Number(1.0), Char(b'+'), Number(2.0)], tokens);
    }

    #[test]
    fn comment_at_end_of_file_reaches_eof() {
        let mut s = Scanner::new("# nothing but a comment");
        assert_eq!(Token::Eof, s.next_token());
        assert_eq!(Token::Eof, s.next_token());
    }

    #[test]
    fn forever_yields_eof_past_the_end() {
        let mut s = Scanner::new("");
        assert_eq!(Token::Eof, s.next_token());
        assert_eq!(Token::Eof, s.next_token());
        assert_eq!(Token::Eof, s.next_token());
    }
}
