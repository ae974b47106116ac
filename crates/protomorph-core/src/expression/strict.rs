//! Strict expression grammar
//!
//! ```text
//! expr    := ws '$'? ident ('.' ident)* ('(' ws ')')? (ws '|' ws filter)* ws
//! filter  := ident ( ws '(' args? ')' | ws literal )?
//! args    := literal (ws ',' ws literal)*
//! literal := quoted | number | true | false | none | null
//! ```
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::{Expression, Filter, ParseTier};
use serde_json::{Number, Value};
use std::iter::Peekable;
use std::str::Chars;

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { chars: input.chars().peekable() }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn identifier(&mut self) -> Result<String, String> {
        let mut identifier = String::new();
        match self.peek() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {}
            Some(ch) => return Err(format!("expected identifier, found '{}'", ch)),
            None => return Err("expected identifier, found end of input".to_string()),
        }
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.chars.next();
            } else {
                break;
            }
        }
        Ok(identifier)
    }

    fn literal(&mut self) -> Result<Value, String> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.chars.next();
                let mut text = String::new();
                loop {
                    match self.chars.next() {
                        Some('\\') => match self.chars.next() {
                            Some(escaped) => text.push(escaped),
                            None => return Err("unterminated string".to_string()),
                        },
                        Some(ch) if ch == quote => return Ok(Value::String(text)),
                        Some(ch) => text.push(ch),
                        None => return Err("unterminated string".to_string()),
                    }
                }
            }
            Some(ch) if ch == '-' || ch.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(ch) = self.peek() {
                    if ch == '-' || ch == '.' || ch.is_ascii_digit() {
                        digits.push(ch);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                parse_number(&digits).ok_or_else(|| format!("invalid number '{}'", digits))
            }
            Some(ch) if ch.is_alphabetic() => match self.identifier()?.as_str() {
                "true" | "True" => Ok(Value::Bool(true)),
                "false" | "False" => Ok(Value::Bool(false)),
                "none" | "None" | "null" => Ok(Value::Null),
                other => Err(format!("unsupported literal '{}'", other)),
            },
            Some(ch) => Err(format!("expected literal, found '{}'", ch)),
            None => Err("expected literal, found end of input".to_string()),
        }
    }

    fn filter(&mut self) -> Result<Filter, String> {
        let name = self.identifier()?;
        self.skip_whitespace();
        let mut args = Vec::new();
        if self.eat('(') {
            self.skip_whitespace();
            if !self.eat(')') {
                loop {
                    args.push(self.literal()?);
                    self.skip_whitespace();
                    if self.eat(')') {
                        break;
                    }
                    if !self.eat(',') {
                        return Err(format!("expected ',' or ')' in arguments of '{}'", name));
                    }
                    self.skip_whitespace();
                }
            }
        } else if matches!(self.peek(), Some(ch) if ch != '|') {
            // legacy form: `default 'value'`
            args.push(self.literal()?);
        }
        Ok(Filter::with_args(name, args))
    }
}

pub(crate) fn parse_number(text: &str) -> Option<Value> {
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::Number(integer.into()));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

/// Parse a variable block body with the strict grammar
pub fn try_strict_parse(body: &str, mapping_delimiter: bool, source: &str) -> Result<Expression, String> {
    let mut parser = Parser::new(body);
    parser.skip_whitespace();

    let dollar = parser.eat('$');
    let mut name = parser.identifier()?;
    if dollar {
        name.insert(0, '$');
    }
    let mut attributes = Vec::new();
    while parser.eat('.') {
        attributes.push(parser.identifier()?);
    }

    parser.skip_whitespace();
    let mut call = false;
    if parser.eat('(') {
        parser.skip_whitespace();
        if !parser.eat(')') {
            return Err("call arguments are not supported".to_string());
        }
        call = true;
    }

    let mut filters = Vec::new();
    loop {
        parser.skip_whitespace();
        if parser.peek().is_none() {
            break;
        }
        if !parser.eat('|') {
            return Err(format!("unexpected '{}'", parser.peek().unwrap_or_default()));
        }
        parser.skip_whitespace();
        filters.push(parser.filter()?);
    }

    let (kind, name) = Expression::classify(&name, mapping_delimiter, call);
    let (filters, default) = Expression::lift_default(filters);
    Ok(Expression {
        kind,
        name,
        attributes,
        filters,
        default,
        call,
        tier: ParseTier::Strict,
        source: source.to_string(),
    })
}
