//! Path expression parser
//!
//! Recursive descent over the path grammar:
//!
//! ```text
//! path     := ε | first rest*
//! first    := key | bracket
//! rest     := '.' key | bracket
//! key      := [^.\[\]]+           (a trailing '?' marks it optional)
//! bracket  := '[' ( '*' | '-'? digits | quoted | name '?' ) ']' '?'?
//! ```
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::error::PathError;
use super::{Path, PathSegment};
use std::iter::Peekable;
use std::str::Chars;

/// Path expression parser
pub struct Parser<'a> {
    /// Input string being parsed
    input: &'a str,
    /// Character iterator
    chars: Peekable<Chars<'a>>,
    /// Current byte position in input
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    /// Parse the whole input into a path
    pub fn parse(mut self) -> Result<Path, PathError> {
        let mut segments = Vec::new();
        if self.input.trim().is_empty() {
            return Ok(Path::root());
        }

        segments.push(match self.current_char() {
            Some('[') => self.parse_bracket()?,
            _ => self.parse_key()?,
        });

        while let Some(ch) = self.current_char() {
            let segment = match ch {
                '.' => {
                    self.advance();
                    self.parse_key()?
                }
                '[' => self.parse_bracket()?,
                other => {
                    return Err(self.error(format!("Unexpected character '{}' after segment", other)))
                }
            };
            segments.push(segment);
        }

        Ok(Path::from_segments(segments))
    }

    /// Parse a bare object key, honoring a trailing '?'
    fn parse_key(&mut self) -> Result<PathSegment, PathError> {
        let start = self.position;
        let mut name = String::new();
        while let Some(ch) = self.current_char() {
            if ch == '.' || ch == '[' || ch == ']' {
                break;
            }
            name.push(ch);
            self.advance();
        }

        if name.is_empty() {
            return Err(PathError::parse("Expected key", start, self.input));
        }

        let optional = name.ends_with('?') && name.len() > 1;
        if optional {
            name.pop();
        }
        Ok(PathSegment::ObjectKey { name, optional })
    }

    /// Parse bracket notation
    fn parse_bracket(&mut self) -> Result<PathSegment, PathError> {
        self.advance(); // consume '['
        self.skip_whitespace();

        let segment = match self.current_char() {
            Some('*') => {
                self.advance();
                PathSegment::ArrayWildcard
            }
            Some('\'') | Some('"') => {
                let name = self.parse_quoted()?;
                PathSegment::ObjectKey { name, optional: false }
            }
            Some(ch) if ch == '-' || ch.is_ascii_digit() => PathSegment::ArrayIndex(self.parse_index()?),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let name = self.parse_identifier();
                if self.current_char() != Some('?') {
                    return Err(self.error("Bracketed keys must be quoted or end with '?'"));
                }
                self.advance();
                PathSegment::ObjectKey { name, optional: true }
            }
            Some(ch) => return Err(self.error(format!("Unexpected character '{}' in brackets", ch))),
            None => return Err(self.error("Unclosed bracket")),
        };

        self.skip_whitespace();
        self.expect_char(']')?;

        // `['quoted key']?` marks a quoted key optional
        if let PathSegment::ObjectKey { name, optional: false } = &segment {
            if self.current_char() == Some('?') {
                self.advance();
                return Ok(PathSegment::ObjectKey { name: name.clone(), optional: true });
            }
        }
        Ok(segment)
    }

    fn parse_index(&mut self) -> Result<i64, PathError> {
        let start = self.position;
        let mut digits = String::new();
        if self.current_char() == Some('-') {
            digits.push('-');
            self.advance();
        }
        while let Some(ch) = self.current_char() {
            if !ch.is_ascii_digit() {
                break;
            }
            digits.push(ch);
            self.advance();
        }
        digits
            .parse::<i64>()
            .map_err(|_| PathError::parse(format!("Invalid array index '{}'", digits), start, self.input))
    }

    fn parse_identifier(&mut self) -> String {
        let mut identifier = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        identifier
    }

    fn parse_quoted(&mut self) -> Result<String, PathError> {
        let start = self.position;
        let quote = self.advance().unwrap_or('\'');
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\\') => match self.advance() {
                    Some(escaped) => value.push(escaped),
                    None => break,
                },
                Some(ch) if ch == quote => return Ok(value),
                Some(ch) => value.push(ch),
                None => break,
            }
        }
        Err(PathError::parse("Unterminated quoted key", start, self.input))
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current_char(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn current_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn expect_char(&mut self, expected: char) -> Result<(), PathError> {
        match self.current_char() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("Expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("Expected '{}', found end of input", expected))),
        }
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        PathError::parse(message, self.position, self.input)
    }
}
