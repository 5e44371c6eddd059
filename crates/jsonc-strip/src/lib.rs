//! Shared JSONC comment stripping utility.
//!
//! Supports:
//! - `//` line comments
//! - `/* ... */` block comments
//! - string literal preservation for both `"double"` and `'single'` quoted
//!   strings (including escapes)
//!
//! Single-quoted strings are not JSON, but language models emit them often
//! enough that comment stripping has to leave their contents alone too.

use std::borrow::Cow;

/// Strip `//` and `/* */` comments from JSONC input.
///
/// Correctly handles escaped quotes inside strings and comment-like sequences
/// embedded in string literals.
#[must_use]
pub fn strip_jsonc(input: &str) -> String {
    strip_comments(input).into_owned()
}

/// Strip comments, borrowing the input unchanged when it contains none.
///
/// All delimiters involved are ASCII, so the scan walks bytes and copies
/// whole slices of the input; multi-byte characters are never split.
#[must_use]
pub fn strip_comments(input: &str) -> Cow<'_, str> {
    let b = input.as_bytes();
    let len = b.len();
    let mut out: Option<String> = None;
    // Start of the pending run of kept bytes.
    let mut keep_from = 0usize;
    let mut i = 0usize;
    let mut quote: Option<u8> = None;

    while i < len {
        let c = b[i];

        if let Some(q) = quote {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            b'"' | b'\'' => {
                quote = Some(c);
                i += 1;
            }
            b'/' if i + 1 < len && (b[i + 1] == b'/' || b[i + 1] == b'*') => {
                let buf = out.get_or_insert_with(|| String::with_capacity(len));
                buf.push_str(&input[keep_from..i]);
                if b[i + 1] == b'/' {
                    i += 2;
                    while i < len && b[i] != b'\n' {
                        i += 1;
                    }
                } else {
                    i += 2;
                    while i + 1 < len && !(b[i] == b'*' && b[i + 1] == b'/') {
                        i += 1;
                    }
                    i = (i + 2).min(len);
                }
                keep_from = i;
            }
            _ => i += 1,
        }
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&input[keep_from.min(len)..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(input),
    }
}
