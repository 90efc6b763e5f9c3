//! Argument tokenizer for directive lines

use plasma_core::{Error, Result};

/// One whitespace-delimited argument, optionally in `key=value` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Arg {
    Positional(String),
    Keyed { key: String, value: String },
}

/// Split directive arguments.
///
/// Values may be double-quoted; inside quotes `\"` and `\\` are escapes.
/// A `=` outside quotes turns the argument into a keyed pair.
pub(crate) fn tokenize(input: &str, line: usize, keyword: &str) -> Result<Vec<Arg>> {
    let mut args = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key: Option<String> = None;
        let mut current = String::new();
        let mut quoted = false;

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            match c {
                '"' => {
                    if quoted {
                        return Err(Error::directive(
                            line,
                            keyword,
                            "unexpected quote after quoted value",
                        ));
                    }
                    current.push_str(&read_quoted(&mut chars, line, keyword)?);
                    quoted = true;
                }
                '=' if key.is_none() && !quoted => {
                    if current.is_empty() {
                        return Err(Error::directive(line, keyword, "empty option name"));
                    }
                    key = Some(std::mem::take(&mut current));
                }
                _ if quoted => {
                    return Err(Error::directive(
                        line,
                        keyword,
                        format!("unexpected '{c}' after closing quote"),
                    ));
                }
                _ => current.push(c),
            }
        }

        args.push(match key {
            Some(key) => Arg::Keyed {
                key,
                value: current,
            },
            None => Arg::Positional(current),
        });
    }

    Ok(args)
}

fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    line: usize,
    keyword: &str,
) -> Result<String> {
    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(value),
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => value.push(escaped),
                Some(other) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            _ => value.push(c),
        }
    }
    Err(Error::directive(line, keyword, "unterminated quote"))
}
