//! Glob patterns over slash-separated object names.
//!
//! Patterns are compiled once into an anchored [`Regex`]:
//!
//! | Syntax      | Matches                                                          |
//! |-------------|------------------------------------------------------------------|
//! | `*`         | any run of characters except `/`                                 |
//! | `**`        | as a whole segment, zero or more segments; elsewhere same as `*` |
//! | `?`         | one character except `/`                                         |
//! | `[a-z]`     | one character from the class (`!` or `^` negates), never `/`     |
//! | `{a,b}`     | any of the comma separated alternatives, may nest                |
//! | `\x`        | the literal character `x`                                        |
//!
//! The empty pattern is valid and matches nothing.

use crate::error::{BucketError, Result};
use regex::Regex;
use std::fmt;

const META: [char; 5] = ['*', '?', '[', '{', '\\'];

/// A compiled glob pattern.
#[derive(Clone)]
pub struct Glob {
    pattern: String,
    regex: Option<Regex>,
}

impl fmt::Debug for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Glob").field(&self.pattern).finish()
    }
}

impl Glob {
    /// Compiles `pattern`, failing with [`BucketError::InvalidPattern`] when it is malformed.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Ok(Self { pattern: String::new(), regex: None });
        }

        let source = translate(pattern)?;
        let regex = Regex::new(&source).map_err(|e| BucketError::InvalidPattern {
            message: pattern.to_owned().into(),
            context: Some(e.to_string().into()),
        })?;

        Ok(Self { pattern: pattern.to_owned(), regex: Some(regex) })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(name))
    }

    /// True for the empty pattern, which selects no object at all.
    #[must_use]
    pub const fn matches_nothing(&self) -> bool {
        self.regex.is_none()
    }

    /// The directory part of the pattern before its first meta character, including the
    /// trailing `/`. Every matching name starts with it, so listings can begin there.
    ///
    /// ```rust
    /// use stowage::Glob;
    ///
    /// assert_eq!(Glob::new("path/to/*.txt").unwrap().literal_prefix(), "path/to/");
    /// assert_eq!(Glob::new("path/f*/x").unwrap().literal_prefix(), "path/");
    /// assert_eq!(Glob::new("**").unwrap().literal_prefix(), "");
    /// ```
    #[must_use]
    pub fn literal_prefix(&self) -> &str {
        let literal = self.pattern.find(META).map_or(self.pattern.as_str(), |i| &self.pattern[..i]);
        literal.rfind('/').map_or("", |i| &literal[..=i])
    }
}

fn translate(pattern: &str) -> Result<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                let mut end = i;
                while end < chars.len() && chars[end] == '*' {
                    end += 1;
                }
                let opens = i == 0 || matches!(chars[i - 1], '/' | '{' | ',');
                let closes = end == chars.len() || matches!(chars[end], '/' | '}' | ',');

                if end - i >= 2 && opens && closes {
                    if chars.get(end) == Some(&'/') {
                        out.push_str("(?:[^/]*/)*");
                        end += 1;
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
                i = end;
            },
            '?' => {
                out.push_str("[^/]");
                i += 1;
            },
            '[' => {
                i = translate_class(pattern, &chars, i, &mut out)?;
            },
            '{' => {
                depth += 1;
                out.push_str("(?:");
                i += 1;
            },
            ',' if depth > 0 => {
                out.push('|');
                i += 1;
            },
            '}' if depth > 0 => {
                depth -= 1;
                out.push(')');
                i += 1;
            },
            '\\' => {
                let Some(&c) = chars.get(i + 1) else {
                    return Err(BucketError::invalid_pattern(pattern, "trailing escape"));
                };
                push_literal(&mut out, c);
                i += 2;
            },
            c => {
                push_literal(&mut out, c);
                i += 1;
            },
        }
    }

    if depth > 0 {
        return Err(BucketError::invalid_pattern(pattern, "unterminated alternation"));
    }

    out.push('$');
    Ok(out)
}

/// Translates the class starting at `chars[start] == '['` and returns the index after it.
fn translate_class(pattern: &str, chars: &[char], start: usize, out: &mut String) -> Result<usize> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!' | '^'));
    if negated {
        i += 1;
    }

    let mut items = String::new();
    let mut first = true;
    loop {
        let Some(&c) = chars.get(i) else {
            return Err(BucketError::invalid_pattern(pattern, "unterminated character class"));
        };
        if c == ']' && !first {
            i += 1;
            break;
        }
        first = false;

        let lo = if c == '\\' {
            i += 1;
            *chars
                .get(i)
                .ok_or_else(|| BucketError::invalid_pattern(pattern, "trailing escape"))?
        } else {
            c
        };
        i += 1;

        if chars.get(i) == Some(&'-') && chars.get(i + 1).is_some_and(|&n| n != ']') {
            let mut hi = chars[i + 1];
            i += 2;
            if hi == '\\' {
                hi = *chars
                    .get(i)
                    .ok_or_else(|| BucketError::invalid_pattern(pattern, "trailing escape"))?;
                i += 1;
            }
            if hi < lo {
                return Err(BucketError::invalid_pattern(pattern, "reversed class range"));
            }
            items.push_str(&regex::escape(&lo.to_string()));
            items.push('-');
            items.push_str(&regex::escape(&hi.to_string()));
        } else {
            items.push_str(&regex::escape(&lo.to_string()));
        }
    }

    if negated {
        out.push_str("[^/");
        out.push_str(&items);
        out.push(']');
    } else {
        out.push('[');
        out.push_str(&items);
        out.push_str("&&[^/]]");
    }
    Ok(i)
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
