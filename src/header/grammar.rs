//! Character classes of the HTTP/1.1 header grammar (RFC 2616 section 2.2).

/// Lexical type of a single US-ASCII character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharType {
    Token,
    QuotedString,
    Comment,
    Separator,
    Control,
    WhiteSpace,
}

const WHITE_SPACE: [u8; 4] = *b"\t\r\n ";
const SEPARATORS: [u8; 19] = *b"()<>@,;:\\\"/[]?={} \t";

const fn type_table() -> [CharType; 128] {
    let mut table = [CharType::Token; 128];
    let mut i = 0;
    while i < 32 {
        table[i] = CharType::Control;
        i += 1;
    }
    table[127] = CharType::Control;
    let mut i = 0;
    while i < SEPARATORS.len() {
        table[SEPARATORS[i] as usize] = CharType::Separator;
        i += 1;
    }
    table[b'(' as usize] = CharType::Comment;
    table[b'"' as usize] = CharType::QuotedString;
    let mut i = 0;
    while i < WHITE_SPACE.len() {
        table[WHITE_SPACE[i] as usize] = CharType::WhiteSpace;
        i += 1;
    }
    table
}

static TYPE_TABLE: [CharType; 128] = type_table();

/// Type of `c`, or `None` for anything outside US-ASCII.
pub fn char_type(c: char) -> Option<CharType> {
    if c.is_ascii() {
        Some(TYPE_TABLE[c as usize])
    } else {
        None
    }
}

pub fn is_white_space(c: char) -> bool {
    char_type(c) == Some(CharType::WhiteSpace)
}

pub fn is_token(c: char) -> bool {
    char_type(c) == Some(CharType::Token)
}

/// `(` and `"` open comments and quoted strings, so they are not separators here.
pub fn is_separator(c: char) -> bool {
    char_type(c) == Some(CharType::Separator)
}

/// True if `s` is non-empty and made only of token characters.
pub fn is_token_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token)
}

pub fn contains_white_space(s: &str) -> bool {
    s.chars().any(is_white_space)
}

/// Remove CR (and the LF of a CRLF pair) and un-escape `\x` sequences, unless
/// `preserve_backslash` is set, in which case backslashes are kept verbatim.
pub fn filter_token(s: &str, preserve_backslash: bool) -> String {
    let mut out = String::with_capacity(s.len());
    let mut got_escape = false;
    let mut got_cr = false;
    for c in s.chars() {
        if c == '\n' && got_cr {
            got_cr = false;
            continue;
        }
        got_cr = false;
        if got_escape {
            out.push(c);
            got_escape = false;
        } else if !preserve_backslash && c == '\\' {
            got_escape = true;
        } else if c == '\r' {
            got_cr = true;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_char_types() {
        assert_eq!(char_type('a'), Some(CharType::Token));
        assert_eq!(char_type('"'), Some(CharType::QuotedString));
        assert_eq!(char_type('('), Some(CharType::Comment));
        assert_eq!(char_type(';'), Some(CharType::Separator));
        assert_eq!(char_type('\u{7f}'), Some(CharType::Control));
        assert_eq!(char_type(' '), Some(CharType::WhiteSpace));
        assert_eq!(char_type('é'), None);
    }

    #[test]
    fn test_separators_and_tokens() {
        assert!(is_separator('/'));
        assert!(!is_separator('('));
        assert!(!is_separator(' '));
        assert!(is_token('-'));
        assert!(!is_token('/'));
        assert!(is_token_string("gzip"));
        assert!(!is_token_string("text/html"));
        assert!(!is_token_string(""));
        assert!(contains_white_space("a b"));
    }

    #[test]
    fn test_filter_token() {
        assert_eq!(filter_token("a\\\"b", false), "a\"b");
        assert_eq!(filter_token("a\\\"b", true), "a\\\"b");
        assert_eq!(filter_token("a\r\n b", false), "a b");
    }
}
