//! Resource locators
//!
//! A locator names the backend (by scheme) and the target host a service
//! binds to. Parsing is delegated to the `url` crate; only scheme and host
//! are consulted when routing.

use crate::error::{JobError, JobResult};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Immutable `{scheme, host, port, path}` view of a service URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator {
    url: Url,
}

impl ResourceLocator {
    pub fn parse(input: &str) -> JobResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(JobError::bad_parameter("resource URL must not be empty"));
        }
        Ok(Self {
            url: Url::parse(trimmed)?,
        })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host component, empty when the URL carries none
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl FromStr for ResourceLocator {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ResourceLocator {
    type Error = JobError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_fork_localhost_components() {
        let locator = ResourceLocator::parse("fork://localhost").unwrap();
        assert_eq!(locator.scheme(), "fork");
        assert_eq!(locator.host(), "localhost");
        assert_eq!(locator.port(), None);
        assert_eq!(locator.to_string(), "fork://localhost");
    }

    #[test]
    fn test_port_and_path() {
        let locator: ResourceLocator = "ssh://build01:2222/scratch".parse().unwrap();
        assert_eq!(locator.host(), "build01");
        assert_eq!(locator.port(), Some(2222));
        assert_eq!(locator.path(), "/scratch");
    }

    #[test]
    fn test_scheme_is_lowercased() {
        let locator = ResourceLocator::parse("FORK://localhost").unwrap();
        assert_eq!(locator.scheme(), "fork");
    }

    #[test]
    fn test_rejects_empty_and_relative() {
        assert_eq!(
            ResourceLocator::parse("  ").unwrap_err().kind(),
            ErrorKind::BadParameter
        );
        assert_eq!(
            ResourceLocator::parse("localhost").unwrap_err().kind(),
            ErrorKind::BadParameter
        );
    }
}
