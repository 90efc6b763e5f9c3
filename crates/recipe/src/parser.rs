//! Leading comment block scanner
//!
//! Only the header of a recipe is inspected. The scan ends at the first line
//! that is neither blank nor a comment, so `PLASMA` strings inside the recipe
//! body are never treated as directives.

use crate::directive::Directive;
use plasma_core::{Error, Result, RuntimeKind, DIRECTIVE_MARKER};
use std::path::Path;
use tracing::{debug, trace};

/// Line comment markers accepted in a recipe header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentStyle {
    /// `//`
    Slash,
    /// `#`
    Hash,
    /// `--`
    Dash,
    /// Any of the above, for files whose language is unknown
    #[default]
    Any,
}

impl CommentStyle {
    /// Markers used by the language implied by the file extension
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some(
                "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" | "rs" | "go" | "c"
                | "cc" | "cpp" | "h" | "java" | "kt" | "kts" | "swift" | "scala" | "dart",
            ) => Self::Slash,
            Some(
                "sh" | "bash" | "zsh" | "fish" | "py" | "rb" | "pl" | "r" | "ps1" | "nu" | "ex"
                | "exs" | "jl",
            ) => Self::Hash,
            Some("lua" | "sql" | "hs" | "elm") => Self::Dash,
            _ => Self::Any,
        }
    }

    fn markers(self) -> &'static [&'static str] {
        match self {
            Self::Slash => &["//"],
            Self::Hash => &["#"],
            Self::Dash => &["--"],
            Self::Any => &["//", "#", "--"],
        }
    }
}

/// Result of scanning a recipe header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    /// Directives in source order
    pub directives: Vec<Directive>,
    /// Source with the shebang and directive lines blanked out
    pub body: String,
    /// Runtime named by a `plasma run <runtime>` shebang
    pub shebang_runtime: Option<RuntimeKind>,
}

/// Parse the directive header of `source`, recognising `style` comments.
pub fn parse_header(source: &str, style: CommentStyle) -> Result<ParsedHeader> {
    let mut directives: Vec<Directive> = Vec::new();
    let mut body = String::with_capacity(source.len());
    let mut shebang_runtime = None;
    let mut in_header = true;
    let mut seen_cache = false;
    let mut seen_runtime = false;

    for (index, raw) in source.split_inclusive('\n').enumerate() {
        let line_no = index + 1;

        if !in_header {
            body.push_str(raw);
            continue;
        }

        let (content, ending) = split_line_ending(raw);
        let trimmed = content.trim();

        if index == 0 && trimmed.starts_with("#!") {
            shebang_runtime = runtime_from_shebang(trimmed)?;
            trace!(line = line_no, runtime = ?shebang_runtime, "Skipping shebang");
            body.push_str(ending);
            continue;
        }

        if trimmed.is_empty() {
            body.push_str(raw);
            continue;
        }

        let Some(comment) = comment_text(trimmed, style) else {
            in_header = false;
            body.push_str(raw);
            continue;
        };

        let Some(directive_text) = strip_marker(comment) else {
            body.push_str(raw);
            continue;
        };

        for directive in Directive::parse_line(directive_text, line_no)? {
            match &directive {
                Directive::Cache { .. } if seen_cache => {
                    return Err(Error::directive(
                        line_no,
                        "cache",
                        "cache directive given more than once",
                    ));
                }
                Directive::Runtime { .. } if seen_runtime => {
                    return Err(Error::directive(
                        line_no,
                        "runtime",
                        "runtime directive given more than once",
                    ));
                }
                Directive::Cache { .. } => seen_cache = true,
                Directive::Runtime { .. } => seen_runtime = true,
                _ => {}
            }
            debug!(line = line_no, keyword = directive.keyword(), "Parsed directive");
            directives.push(directive);
        }
        body.push_str(ending);
    }

    Ok(ParsedHeader {
        directives,
        body,
        shebang_runtime,
    })
}

fn split_line_ending(raw: &str) -> (&str, &str) {
    let content = raw.trim_end_matches(['\n', '\r']);
    (content, &raw[content.len()..])
}

fn comment_text(line: &str, style: CommentStyle) -> Option<&str> {
    style
        .markers()
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
}

/// Text after the `PLASMA` marker, if this comment is a directive
fn strip_marker(comment: &str) -> Option<&str> {
    let rest = comment.trim_start().strip_prefix(DIRECTIVE_MARKER)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

/// Recognise `#!/usr/bin/env -S plasma run node`
fn runtime_from_shebang(line: &str) -> Result<Option<RuntimeKind>> {
    let words: Vec<&str> = line.trim_start_matches("#!").split_whitespace().collect();
    let Some(position) = words.windows(2).position(|pair| {
        let program = pair[0].rsplit('/').next().unwrap_or(pair[0]);
        program == plasma_core::APP_NAME && pair[1] == "run"
    }) else {
        return Ok(None);
    };

    match words.get(position + 2) {
        Some(runtime) => runtime
            .parse()
            .map(Some)
            .map_err(|e| Error::directive(1, "#!", format!("invalid shebang runtime: {e}"))),
        None => Ok(None),
    }
}
