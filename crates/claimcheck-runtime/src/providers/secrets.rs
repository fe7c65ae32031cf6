//! Credential handling for inference backends.
//!
//! Inference endpoints are usually authenticated with a bearer token. The
//! token is wrapped in [`ApiCredential`] as soon as it is read so that it
//! cannot end up in logs or `Debug` output:
//!
//! - `Debug` and `Display` print `[REDACTED]`
//! - the value is zeroed on drop (`secrecy`)
//! - reading it requires an explicit [`ApiCredential::expose`]
//!
//! ## Usage
//!
//! ```ignore
//! let token = ApiCredential::new(raw, CredentialSource::CommandLine, "API token");
//! request = request.header("authorization", token.bearer());
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from an environment variable
    Environment,
    /// Passed as a command-line flag
    CommandLine,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::CommandLine => write!(f, "command line"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value. The value cannot be logged after this point.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Expose the credential value. Call only where it is sent.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// `Authorization` header value for bearer authentication.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_never_printed() {
        let token = "hf_0123456789abcdef";
        let cred = ApiCredential::new(token, CredentialSource::CommandLine, "API token");

        let debug = format!("{:?}", cred);
        let shown = cred.to_string();
        for rendered in [&debug, &shown] {
            assert!(!rendered.contains(token), "token leaked: {}", rendered);
            assert!(rendered.contains("[REDACTED]"));
        }
        assert_eq!(shown, "API token from command line [REDACTED]");
    }

    #[test]
    fn test_bearer_header() {
        let cred = ApiCredential::new("abc", CredentialSource::Programmatic, "API token");
        assert_eq!(cred.bearer(), "Bearer abc");
        assert_eq!(cred.expose(), "abc");
    }
}
