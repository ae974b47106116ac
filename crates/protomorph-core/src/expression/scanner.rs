//! Leaf scanner
//!
//! Splits a leaf string on the four block delimiters without interpreting
//! block bodies. Unterminated blocks are kept as literal text.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

/// A delimited region of a leaf, borrowed from the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFragment<'a> {
    Literal(&'a str),
    Variable {
        body: &'a str,
        /// Opened with `${{`
        mapping: bool,
        source: &'a str,
    },
    Control(&'a str),
    Comment(&'a str),
}

#[derive(Clone, Copy)]
enum Opener {
    Variable,
    MappingVariable,
    Control,
    Comment,
}

impl Opener {
    fn open(self) -> &'static str {
        match self {
            Opener::Variable => "{{",
            Opener::MappingVariable => "${{",
            Opener::Control => "{%",
            Opener::Comment => "{#",
        }
    }

    fn close(self) -> &'static str {
        match self {
            Opener::Variable | Opener::MappingVariable => "}}",
            Opener::Control => "%}",
            Opener::Comment => "#}",
        }
    }
}

/// Find the earliest block opener at or after `from`
fn next_opener(text: &str, from: usize) -> Option<(usize, Opener)> {
    let rest = &text[from..];
    let brace = rest.find('{')?;
    let mut offset = brace;
    loop {
        let at = from + offset;
        let tail = &text[at..];
        let opener = if tail.starts_with("{{") {
            if at > 0 && text[..at].ends_with('$') {
                return Some((at - 1, Opener::MappingVariable));
            }
            Some(Opener::Variable)
        } else if tail.starts_with("{%") {
            Some(Opener::Control)
        } else if tail.starts_with("{#") {
            Some(Opener::Comment)
        } else {
            None
        };
        if let Some(opener) = opener {
            return Some((at, opener));
        }
        let next = text[at + 1..].find('{')?;
        offset += next + 1;
    }
}

/// Scan a leaf into raw fragments
pub fn scan(text: &str) -> Vec<RawFragment<'_>> {
    let mut fragments = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let Some((start, opener)) = next_opener(text, cursor) else {
            break;
        };
        let body_start = start + opener.open().len();
        let Some(close) = text[body_start..].find(opener.close()) else {
            break;
        };
        let body_end = body_start + close;
        let end = body_end + opener.close().len();

        if start > cursor {
            fragments.push(RawFragment::Literal(&text[cursor..start]));
        }
        let source = &text[start..end];
        let body = &text[body_start..body_end];
        fragments.push(match opener {
            Opener::Variable => RawFragment::Variable { body, mapping: false, source },
            Opener::MappingVariable => RawFragment::Variable { body, mapping: true, source },
            Opener::Control => RawFragment::Control(source),
            Opener::Comment => RawFragment::Comment(body),
        });
        cursor = end;
    }

    if cursor < text.len() {
        fragments.push(RawFragment::Literal(&text[cursor..]));
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mixed() {
        let fragments = scan("Call {{ person }} at ${{ place }}{# note #}!");
        assert_eq!(
            fragments,
            vec![
                RawFragment::Literal("Call "),
                RawFragment::Variable { body: " person ", mapping: false, source: "{{ person }}" },
                RawFragment::Literal(" at "),
                RawFragment::Variable { body: " place ", mapping: true, source: "${{ place }}" },
                RawFragment::Comment(" note "),
                RawFragment::Literal("!"),
            ]
        );
    }

    #[test]
    fn test_scan_plain_and_braces() {
        assert_eq!(scan("no blocks"), vec![RawFragment::Literal("no blocks")]);
        assert_eq!(scan("{a} {b}"), vec![RawFragment::Literal("{a} {b}")]);
        assert!(scan("").is_empty());
    }

    #[test]
    fn test_scan_unterminated_is_literal() {
        assert_eq!(scan("x {{ y"), vec![RawFragment::Literal("x {{ y")]);
        assert_eq!(
            scan("{% if a %}{{ b"),
            vec![RawFragment::Control("{% if a %}"), RawFragment::Literal("{{ b")]
        );
    }

    #[test]
    fn test_scan_dollar_without_braces() {
        assert_eq!(
            scan("$5 {{ price }}"),
            vec![
                RawFragment::Literal("$5 "),
                RawFragment::Variable { body: " price ", mapping: false, source: "{{ price }}" },
            ]
        );
    }

    #[test]
    fn test_scan_unicode_literals() {
        let fragments = scan("到{{ 目的地 }}去");
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], RawFragment::Literal("到"));
        assert_eq!(fragments[2], RawFragment::Literal("去"));
    }
}
