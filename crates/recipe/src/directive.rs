//! Typed recipe directives

use crate::duration::parse_duration;
use crate::lexer::{tokenize, Arg};
use plasma_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Runtime option that folds the runtime version into the cache key
pub const INCLUDE_VERSION_OPTION: &str = "include-version";

/// A single parsed `PLASMA` directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Glob pattern relative to the recipe directory
    Input { pattern: String },
    /// Path prefix whose files are captured after a successful run
    Output { prefix: String },
    /// Cache lifetime; zero disables caching
    Cache { ttl: Duration },
    /// Environment variable names that participate in the key
    Env { names: BTreeSet<String> },
    /// Runtime options
    Runtime { options: RuntimeOptions },
}

impl Directive {
    /// Directive keyword as written in the recipe
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            Directive::Input { .. } => "input",
            Directive::Output { .. } => "output",
            Directive::Cache { .. } => "cache",
            Directive::Env { .. } => "env",
            Directive::Runtime { .. } => "runtime",
        }
    }

    /// Parse the text following the `PLASMA` marker.
    ///
    /// One line may expand to several directives (`input "a" "b"`).
    pub(crate) fn parse_line(text: &str, line: usize) -> Result<Vec<Directive>> {
        let text = text.trim();
        let (keyword, rest) = match text.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest),
            None => (text, ""),
        };

        if keyword.is_empty() {
            return Err(Error::directive(line, "", "missing directive keyword"));
        }

        let args = tokenize(rest, line, keyword)?;

        match keyword {
            "input" => Ok(positional(&args, line, keyword)?
                .into_iter()
                .map(|pattern| Directive::Input { pattern })
                .collect()),
            "output" => Ok(positional(&args, line, keyword)?
                .into_iter()
                .map(|prefix| Directive::Output { prefix })
                .collect()),
            "env" => {
                let names = positional(&args, line, keyword)?;
                for name in &names {
                    if !is_valid_env_name(name) {
                        return Err(Error::directive(
                            line,
                            keyword,
                            format!("'{name}' is not a valid environment variable name"),
                        ));
                    }
                }
                Ok(vec![Directive::Env {
                    names: names.into_iter().collect(),
                }])
            }
            "cache" => parse_cache(&args, line).map(|d| vec![d]),
            "runtime" => parse_runtime(&args, line).map(|d| vec![d]),
            other => Err(Error::directive(line, other, "unknown directive keyword")),
        }
    }
}

/// Options from a `runtime` directive, kept ordered for hashing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    pub include_version: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

fn positional(args: &[Arg], line: usize, keyword: &str) -> Result<Vec<String>> {
    if args.is_empty() {
        return Err(Error::directive(line, keyword, "expected at least one argument"));
    }
    args.iter()
        .map(|arg| match arg {
            Arg::Positional(value) if value.is_empty() => {
                Err(Error::directive(line, keyword, "empty argument"))
            }
            Arg::Positional(value) => Ok(value.clone()),
            Arg::Keyed { key, .. } => Err(Error::directive(
                line,
                keyword,
                format!("unexpected option '{key}='"),
            )),
        })
        .collect()
}

fn keyed<'a>(args: &'a [Arg], line: usize, keyword: &str) -> Result<BTreeMap<&'a str, &'a str>> {
    let mut options = BTreeMap::new();
    for arg in args {
        match arg {
            Arg::Keyed { key, value } => {
                if options.insert(key.as_str(), value.as_str()).is_some() {
                    return Err(Error::directive(
                        line,
                        keyword,
                        format!("option '{key}' given more than once"),
                    ));
                }
            }
            Arg::Positional(value) => {
                return Err(Error::directive(
                    line,
                    keyword,
                    format!("expected key=value, found '{value}'"),
                ))
            }
        }
    }
    Ok(options)
}

fn parse_cache(args: &[Arg], line: usize) -> Result<Directive> {
    let mut options = keyed(args, line, "cache")?;
    let ttl = options
        .remove("ttl")
        .ok_or_else(|| Error::directive(line, "cache", "missing ttl option"))?;
    if let Some(unknown) = options.keys().next() {
        return Err(Error::directive(
            line,
            "cache",
            format!("unknown option '{unknown}'"),
        ));
    }
    Ok(Directive::Cache {
        ttl: parse_duration(ttl)?,
    })
}

fn parse_runtime(args: &[Arg], line: usize) -> Result<Directive> {
    let options = keyed(args, line, "runtime")?;
    let mut parsed = RuntimeOptions::default();
    for (key, value) in options {
        if key == INCLUDE_VERSION_OPTION {
            parsed.include_version = match value {
                "true" => true,
                "false" => false,
                other => {
                    return Err(Error::directive(
                        line,
                        "runtime",
                        format!("{INCLUDE_VERSION_OPTION} must be true or false, found '{other}'"),
                    ))
                }
            };
        } else {
            parsed.extra.insert(key.to_string(), value.to_string());
        }
    }
    Ok(Directive::Runtime { options: parsed })
}

fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_expands_per_pattern() {
        let parsed = Directive::parse_line(r#"input "src/*.js" "lib/**""#, 2).unwrap();
        assert_eq!(
            parsed,
            vec![
                Directive::Input {
                    pattern: "src/*.js".into()
                },
                Directive::Input {
                    pattern: "lib/**".into()
                },
            ]
        );
    }

    #[test]
    fn test_cache_ttl() {
        let parsed = Directive::parse_line(r#"cache ttl="30m""#, 1).unwrap();
        assert_eq!(
            parsed,
            vec![Directive::Cache {
                ttl: Duration::from_secs(1800)
            }]
        );
    }

    #[test]
    fn test_cache_requires_ttl() {
        assert!(matches!(
            Directive::parse_line("cache", 1),
            Err(Error::Directive { .. })
        ));
        assert!(matches!(
            Directive::parse_line(r#"cache ttl="1h" size=3"#, 1),
            Err(Error::Directive { .. })
        ));
    }

    #[test]
    fn test_cache_bad_duration_surfaces_as_invalid_duration() {
        assert!(matches!(
            Directive::parse_line(r#"cache ttl="1y""#, 1),
            Err(Error::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_env_names_are_validated() {
        let parsed = Directive::parse_line(r#"env "NODE_ENV" "API_URL" "NODE_ENV""#, 1).unwrap();
        match &parsed[0] {
            Directive::Env { names } => {
                assert_eq!(names.iter().collect::<Vec<_>>(), vec!["API_URL", "NODE_ENV"]);
            }
            other => panic!("unexpected directive {other:?}"),
        }

        assert!(Directive::parse_line(r#"env "1BAD""#, 1).is_err());
        assert!(Directive::parse_line(r#"env "A-B""#, 1).is_err());
        assert!(Directive::parse_line("env", 1).is_err());
    }

    #[test]
    fn test_runtime_options() {
        let parsed =
            Directive::parse_line("runtime include-version=true flavor=lts", 1).unwrap();
        match &parsed[0] {
            Directive::Runtime { options } => {
                assert!(options.include_version);
                assert_eq!(options.extra.get("flavor").map(String::as_str), Some("lts"));
            }
            other => panic!("unexpected directive {other:?}"),
        }

        assert!(Directive::parse_line("runtime include-version=maybe", 1).is_err());
        assert!(Directive::parse_line("runtime node", 1).is_err());
    }

    #[test]
    fn test_unknown_keyword() {
        match Directive::parse_line(r#"inptu "a""#, 7) {
            Err(Error::Directive { line, keyword, .. }) => {
                assert_eq!(line, 7);
                assert_eq!(keyword, "inptu");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_output_rejects_keyed_args() {
        assert!(Directive::parse_line(r#"output dir="dist/""#, 1).is_err());
        assert!(Directive::parse_line(r#"output """#, 1).is_err());
    }
}
