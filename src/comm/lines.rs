//! Fallback parser for feeds that only render as flattened text.
//!
//! Lines arrive newest first, already trimmed and stripped of known chrome.
//! [`tokenize`] classifies each line, [`parse_tokens`] applies the block
//! grammar, and [`parse_lines`] returns the result oldest first.

use crate::comm::message::Message;
use std::collections::BTreeSet;

pub const DEFAULT_BLACKLIST: &[&str] = &["Unpin from Layout", "[UNPIN]", "Comm Terminal"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Id(&'a str),
    Time(&'a str),
    QuoteLine(&'a str),
    Text(&'a str),
}

impl<'a> Token<'a> {
    pub fn raw(&self) -> &'a str {
        match self {
            Token::Id(s) | Token::Time(s) | Token::QuoteLine(s) | Token::Text(s) => s,
        }
    }

    fn is_id(&self) -> bool {
        matches!(self, Token::Id(_))
    }
}

fn is_numeric_id(line: &str) -> bool {
    line.len() >= 6 && line.bytes().all(|b| b.is_ascii_digit())
}

/// `H:MM AM` / `HH:MM pm`, whitespace before the meridiem optional.
fn is_clock_time(line: &str) -> bool {
    let bytes = line.as_bytes();
    let hour_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if !(1..=2).contains(&hour_len) {
        return false;
    }
    let rest = &bytes[hour_len..];
    if rest.len() < 3 || rest[0] != b':' || !rest[1].is_ascii_digit() || !rest[2].is_ascii_digit()
    {
        return false;
    }
    let tail = &line[hour_len + 3..];
    let meridiem = tail.trim_start();
    meridiem.eq_ignore_ascii_case("AM") || meridiem.eq_ignore_ascii_case("PM")
}

pub fn classify(line: &str) -> Token<'_> {
    if is_numeric_id(line) {
        Token::Id(line)
    } else if is_clock_time(line) {
        Token::Time(line)
    } else if line.starts_with('>') {
        Token::QuoteLine(line)
    } else {
        Token::Text(line)
    }
}

pub fn tokenize<'a, S: AsRef<str>>(lines: &'a [S]) -> Vec<Token<'a>> {
    lines.iter().map(|line| classify(line.as_ref())).collect()
}

fn strip_quote_marker(line: &str) -> &str {
    let Some(rest) = line.strip_prefix('>') else {
        return line;
    };
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => chars.as_str(),
        _ => rest,
    }
}

fn join_body(tokens: &[Token<'_>]) -> String {
    tokens
        .iter()
        .map(|t| strip_quote_marker(t.raw()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Applies the block grammar in scan order. Output stays in scan order (newest first).
pub fn parse_tokens(tokens: &[Token<'_>]) -> Vec<Message> {
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < tokens.len() {
        let opens_block = tokens[i].is_id()
            && i + 2 < tokens.len()
            && matches!(tokens[i + 1], Token::Time(_))
            && !tokens[i + 2].is_id();
        if opens_block {
            let time = tokens[i + 1].raw();
            let user = tokens[i + 2].raw();
            let body_start = i + 3;
            let mut j = body_start;
            while j < tokens.len() && !tokens[j].is_id() {
                j += 1;
            }
            let body = join_body(&tokens[body_start..j]);
            if !body.is_empty() {
                out.push(Message::authored(user, time, body));
            }
            i = j;
            continue;
        }

        if matches!(tokens[i], Token::QuoteLine(_)) {
            let mut j = i;
            while j < tokens.len() && matches!(tokens[j], Token::QuoteLine(_)) {
                j += 1;
            }
            let body = join_body(&tokens[i..j]);
            if !body.is_empty() {
                out.push(Message::system(body));
            }
            i = j;
            continue;
        }

        out.push(Message::system(tokens[i].raw()));
        i += 1;
    }

    out
}

/// Parses newest-first lines and returns candidates oldest first.
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Vec<Message> {
    let tokens = tokenize(lines);
    let mut messages = parse_tokens(&tokens);
    messages.reverse();
    messages
}

/// Splits flattened feed text into trimmed, non-empty, non-chrome lines.
pub fn prepare_lines(text: &str, blacklist: &BTreeSet<String>) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !blacklist.contains(*line))
        .map(ToOwned::to_owned)
        .collect()
}

pub fn default_blacklist() -> BTreeSet<String> {
    DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::message::SYSTEM_AUTHOR;

    #[test]
    fn authored_block_is_recognized() {
        let got = parse_lines(&["000123", "3:45 PM", "Alice", "hello world"]);
        assert_eq!(got, vec![Message::authored("Alice", "3:45 PM", "hello world")]);
    }

    #[test]
    fn quote_run_becomes_one_system_message() {
        let got = parse_lines(&[">foo", ">bar"]);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].username, SYSTEM_AUTHOR);
        assert_eq!(got[0].time, "");
        assert_eq!(got[0].message, "foo\nbar");
    }

    #[test]
    fn body_spans_until_next_id_and_strips_quotes() {
        let lines = [
            "4567890", "10:02 am", "Bob", "> quoted", "plain", "1234567", "9:59 AM", "Carol",
            "earlier",
        ];
        let got = parse_lines(&lines);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], Message::authored("Carol", "9:59 AM", "earlier"));
        assert_eq!(got[1], Message::authored("Bob", "10:02 am", "quoted\nplain"));
    }

    #[test]
    fn id_followed_by_id_is_not_a_block() {
        let got = parse_lines(&["1234567", "3:45 PM", "7654321"]);
        assert_eq!(got.len(), 3);
        assert!(got.iter().all(|m| m.username == SYSTEM_AUTHOR));
    }

    #[test]
    fn stray_lines_become_system_messages_oldest_first() {
        let got = parse_lines(&["newest notice", "older notice"]);
        let bodies: Vec<_> = got.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["older notice", "newest notice"]);
    }

    #[test]
    fn empty_blocks_are_dropped() {
        assert!(parse_lines(&[">", "> "]).is_empty());
        assert!(parse_lines(&["1234567", "1:00 PM", "Dana"]).is_empty());
    }

    #[test]
    fn clock_time_shapes() {
        assert!(is_clock_time("3:45 PM"));
        assert!(is_clock_time("12:00am"));
        assert!(!is_clock_time("123:45 PM"));
        assert!(!is_clock_time("3:4 PM"));
        assert!(!is_clock_time("3:45"));
    }

    #[test]
    fn prepare_lines_filters_chrome() {
        let text = "  Comm Terminal \n\n 123456 \n[UNPIN]\nhello";
        let got = prepare_lines(text, &default_blacklist());
        assert_eq!(got, vec!["123456".to_string(), "hello".to_string()]);
    }
}
