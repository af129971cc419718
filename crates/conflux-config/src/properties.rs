//! Properties text codec.
//!
//! Reads and writes the line-oriented `key=value` format:
//!
//! - `#` or `!` as the first non-blank character starts a comment line
//! - the key ends at the first unescaped `=`, `:` or whitespace
//! - a line ending in an odd number of backslashes continues on the next line
//! - escapes `\t`, `\n`, `\r`, `\f`, `\uXXXX`; any other escaped character
//!   stands for itself
//!
//! [`store`] writes keys in sorted order and escapes whatever [`parse`] would
//! otherwise misread, so stored text parses back to the same map.

use conflux_core::ConfigurationMap;

const WHITESPACE: [char; 3] = [' ', '\t', '\x0c'];

/// Marker that flags a value as encrypted.
pub const ENCRYPTED_MARKER: &str = "ENC(";

/// Parses properties text into a map. Later duplicates win.
///
/// # Example
///
/// ```
/// use conflux_config::properties;
///
/// let map = properties::parse("# comment\ngreeting = hello\npath=C:\\\\temp\n");
/// assert_eq!(map["greeting"], "hello");
/// assert_eq!(map["path"], "C:\\temp");
/// ```
#[must_use]
pub fn parse(content: &str) -> ConfigurationMap {
    logical_lines(content)
        .iter()
        .map(|line| split_entry(line))
        .collect()
}

/// Returns `true` if the raw text contains an encrypted-value marker.
#[must_use]
pub fn has_encrypted_marker(content: &str) -> bool {
    content.contains(ENCRYPTED_MARKER)
}

/// Renders a map as properties text preceded by comment lines.
#[must_use]
pub fn store(entries: &ConfigurationMap, comments: &[&str]) -> String {
    let mut out = String::new();

    for comment in comments {
        for line in comment.lines() {
            out.push('#');
            out.push_str(line);
            out.push('\n');
        }
    }

    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort();

    for key in keys {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(&entries[key], false));
        out.push('\n');
    }

    out
}

// Joins continuation lines, drops blanks and comments.
fn logical_lines(content: &str) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n");
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for natural in normalized.split(['\n', '\r']) {
        let trimmed = natural.trim_start_matches(WHITESPACE);
        let continues = ends_with_odd_backslashes(trimmed);
        let body = if continues {
            &trimmed[..trimmed.len() - 1]
        } else {
            trimmed
        };

        match pending.take() {
            Some(mut acc) => {
                acc.push_str(body);
                if continues {
                    pending = Some(acc);
                } else {
                    lines.push(acc);
                }
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                if continues {
                    pending = Some(body.to_string());
                } else {
                    lines.push(body.to_string());
                }
            }
        }
    }

    if let Some(acc) = pending {
        lines.push(acc);
    }

    lines
}

fn ends_with_odd_backslashes(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let chars: Vec<char> = line.chars().collect();
    let mut key_len = 0;
    let mut value_start = chars.len();
    let mut has_separator = false;
    let mut escaped = false;

    while key_len < chars.len() {
        let c = chars[key_len];
        if !escaped && (c == '=' || c == ':') {
            value_start = key_len + 1;
            has_separator = true;
            break;
        }
        if !escaped && WHITESPACE.contains(&c) {
            value_start = key_len + 1;
            break;
        }
        escaped = c == '\\' && !escaped;
        key_len += 1;
    }

    while value_start < chars.len() {
        let c = chars[value_start];
        if !WHITESPACE.contains(&c) {
            if !has_separator && (c == '=' || c == ':') {
                has_separator = true;
            } else {
                break;
            }
        }
        value_start += 1;
    }

    (
        unescape(&chars[..key_len]),
        unescape(&chars[value_start.min(chars.len())..]),
    )
}

fn unescape(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(&next) = chars.get(i) else {
            break;
        };
        i += 1;

        match next {
            'u' => match read_unicode(chars, i) {
                Some((decoded, consumed)) => {
                    out.push(decoded);
                    i += consumed;
                }
                None => out.push_str("\\u"),
            },
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\x0c'),
            other => out.push(other),
        }
    }

    out
}

// Decodes `XXXX` (and a following `\uXXXX` low surrogate) starting at `at`.
fn read_unicode(chars: &[char], at: usize) -> Option<(char, usize)> {
    let unit = hex_unit(chars, at)?;

    if (0xD800..0xDC00).contains(&unit) {
        let is_pair = chars.get(at + 4) == Some(&'\\') && chars.get(at + 5) == Some(&'u');
        if is_pair {
            let low = hex_unit(chars, at + 6)?;
            if (0xDC00..0xE000).contains(&low) {
                let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(combined).map(|c| (c, 10));
            }
        }
        return None;
    }

    char::from_u32(unit).map(|c| (c, 4))
}

fn hex_unit(chars: &[char], at: usize) -> Option<u32> {
    let digits: String = chars.get(at..at + 4)?.iter().collect();
    u32::from_str_radix(&digits, 16).ok()
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len() + 8);

    for (index, c) in text.chars().enumerate() {
        match c {
            ' ' if is_key || index == 0 => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04X}"));
                }
            }
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_separators() {
        let map = parse("a=1\nb:2\nc 3\nd = 4\ne  :  5\nf\t=\t6\n");
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "2");
        assert_eq!(map["c"], "3");
        assert_eq!(map["d"], "4");
        assert_eq!(map["e"], "5");
        assert_eq!(map["f"], "6");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let map = parse("# header\n! bang comment\n\n   \n  # indented comment\nkey=value\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map["key"], "value");
    }

    #[test]
    fn test_key_without_value() {
        let map = parse("flag\nempty=\n");
        assert_eq!(map["flag"], "");
        assert_eq!(map["empty"], "");
    }

    #[test]
    fn test_value_keeps_trailing_whitespace_and_inner_separators() {
        let map = parse("url=http://host:8080/a=b  \n");
        assert_eq!(map["url"], "http://host:8080/a=b  ");
    }

    #[test]
    fn test_line_continuation() {
        let map = parse("list=one, \\\n     two, \\\n     three\nnext=x\n");
        assert_eq!(map["list"], "one, two, three");
        assert_eq!(map["next"], "x");
    }

    #[test]
    fn test_even_backslashes_do_not_continue() {
        let map = parse("dir=C:\\\\\nother=y\n");
        assert_eq!(map["dir"], "C:\\");
        assert_eq!(map["other"], "y");
    }

    #[test]
    fn test_continued_line_starting_with_hash_is_content() {
        let map = parse("a=1\\\n#2\n");
        assert_eq!(map["a"], "1#2");
    }

    #[test]
    fn test_escapes() {
        let map = parse(
            "key\\ with\\ spaces=tab\\there\\nnewline\nsnow=\\u2603\nface=\\uD83D\\uDE00\n",
        );
        assert_eq!(map["key with spaces"], "tab\there\nnewline");
        assert_eq!(map["snow"], "\u{2603}");
        assert_eq!(map["face"], "\u{1F600}");
    }

    #[test]
    fn test_malformed_unicode_escape_kept_literally() {
        let map = parse("bad=\\uZZ\n");
        assert_eq!(map["bad"], "\\uZZ");
    }

    #[test]
    fn test_crlf_line_endings() {
        let map = parse("a=1\r\nb=2\r\n");
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "2");
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let map = parse("k=first\nk=second\n");
        assert_eq!(map["k"], "second");
    }

    #[test]
    fn test_encrypted_marker_detection() {
        assert!(has_encrypted_marker("password=ENC(abc)\n"));
        assert!(!has_encrypted_marker("password=plain\n"));
    }

    #[test]
    fn test_store_layout() {
        let map: ConfigurationMap = [("b", "2"), ("a", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let text = store(&map, &[" -- property: a was added"]);
        assert_eq!(text, "# -- property: a was added\na=1\nb=2\n");
    }

    #[test]
    fn test_store_escapes_special_characters() {
        let map: ConfigurationMap = [("a key", " lead"), ("x=y", "p#q:r!s\\t")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let text = store(&map, &[]);
        assert!(text.contains("a\\ key=\\ lead\n"));
        assert!(text.contains("x\\=y=p\\#q\\:r\\!s\\\\t\n"));
        assert_eq!(parse(&text), map);
    }

    #[test]
    fn test_store_keeps_encrypted_values_verbatim() {
        let map: ConfigurationMap = [("secret", "ENC(QUJD)")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let text = store(&map, &[]);
        assert!(text.contains("secret=ENC(QUJD)"));
        assert!(has_encrypted_marker(&text));
    }

    proptest! {
        #[test]
        fn prop_store_then_parse_preserves_map(
            entries in proptest::collection::hash_map(
                "[a-zA-Z0-9 .=:#!\\\\_\t\n-]{1,12}",
                "[ -~\t\n\u{e9}\u{2603}]{0,20}",
                0..8,
            )
        ) {
            let text = store(&entries, &["header"]);
            prop_assert_eq!(parse(&text), entries);
        }
    }
}
