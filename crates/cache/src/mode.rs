use plasma_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Global gate on cache store access
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Caching is disabled
    Off,
    /// Cache can only be read from
    Read,
    /// Cache can be read from and written to (default)
    #[default]
    ReadWrite,
    /// Cache can only be written to
    Write,
}

impl FromStr for CacheMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "off" => Ok(CacheMode::Off),
            "read" => Ok(CacheMode::Read),
            "read-write" | "readwrite" => Ok(CacheMode::ReadWrite),
            "write" => Ok(CacheMode::Write),
            other => Err(Error::configuration(format!(
                "unknown cache mode '{other}' (expected off, read, write or read-write)"
            ))),
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode_str = match self {
            CacheMode::Off => "off",
            CacheMode::Read => "read",
            CacheMode::ReadWrite => "read-write",
            CacheMode::Write => "write",
        };
        write!(f, "{mode_str}")
    }
}

impl CacheMode {
    /// Check if cache can be read from
    #[must_use]
    pub fn is_readable(&self) -> bool {
        matches!(self, CacheMode::Read | CacheMode::ReadWrite)
    }

    /// Check if cache can be written to
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self, CacheMode::Write | CacheMode::ReadWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing_and_access() {
        assert_eq!("READ".parse::<CacheMode>().unwrap(), CacheMode::Read);
        assert_eq!("read-write".parse::<CacheMode>().unwrap(), CacheMode::ReadWrite);
        assert!("sometimes".parse::<CacheMode>().is_err());

        assert!(CacheMode::Read.is_readable() && !CacheMode::Read.is_writable());
        assert!(!CacheMode::Write.is_readable() && CacheMode::Write.is_writable());
        assert!(!CacheMode::Off.is_readable() && !CacheMode::Off.is_writable());
        assert_eq!(CacheMode::default().to_string(), "read-write");
    }
}
