//! Runtime identity for recipes

use crate::constants::{PORTABLE_RUNTIME, STANDARD_RUNTIME_PREFIX};
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The backend family a recipe executes on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RuntimeKind {
    /// Sandboxed in-process interpreter with the host bridge injected
    Portable,
    /// External interpreter process, e.g. `standard:node`
    Standard { interpreter: String },
}

impl RuntimeKind {
    /// Create a standard runtime for the named interpreter
    pub fn standard(interpreter: impl Into<String>) -> Result<Self> {
        let interpreter = interpreter.into();
        validate_interpreter(&interpreter)?;
        Ok(RuntimeKind::Standard { interpreter })
    }

    #[must_use]
    pub fn is_portable(&self) -> bool {
        matches!(self, RuntimeKind::Portable)
    }

    /// Interpreter name for standard runtimes
    #[must_use]
    pub fn interpreter(&self) -> Option<&str> {
        match self {
            RuntimeKind::Portable => None,
            RuntimeKind::Standard { interpreter } => Some(interpreter),
        }
    }
}

fn validate_interpreter(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::configuration("runtime interpreter name is empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::configuration(format!(
            "runtime interpreter '{name}' contains invalid characters"
        )));
    }
    Ok(())
}

impl FromStr for RuntimeKind {
    type Err = Error;

    /// Accepts `portable`, `standard:<name>` or a bare interpreter name,
    /// the latter being the `plasma run node script.js` convention.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == PORTABLE_RUNTIME {
            return Ok(RuntimeKind::Portable);
        }
        match s.strip_prefix(STANDARD_RUNTIME_PREFIX) {
            Some(name) => RuntimeKind::standard(name),
            None => RuntimeKind::standard(s),
        }
    }
}

impl TryFrom<String> for RuntimeKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RuntimeKind> for String {
    fn from(kind: RuntimeKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeKind::Portable => write!(f, "{PORTABLE_RUNTIME}"),
            RuntimeKind::Standard { interpreter } => {
                write!(f, "{STANDARD_RUNTIME_PREFIX}{interpreter}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_runtime_kinds() {
        assert_eq!("portable".parse::<RuntimeKind>().unwrap(), RuntimeKind::Portable);
        assert_eq!(
            "standard:node".parse::<RuntimeKind>().unwrap(),
            RuntimeKind::Standard {
                interpreter: "node".to_string()
            }
        );
        assert_eq!(
            "python3".parse::<RuntimeKind>().unwrap().to_string(),
            "standard:python3"
        );
    }

    #[test]
    fn test_rejects_bad_interpreter() {
        assert!("standard:".parse::<RuntimeKind>().is_err());
        assert!("standard:../bin/sh".parse::<RuntimeKind>().is_err());
        assert!("node --inspect".parse::<RuntimeKind>().is_err());
    }

    #[test]
    fn test_serde_uses_display_form() {
        let kind = RuntimeKind::standard("deno").unwrap();
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"standard:deno\"");
        let back: RuntimeKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
