use crate::error::FetchError;
use crate::retry::RetryPolicy;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_FILE_PREFIX: &str = "upload";

/// Describes a single snapshot download.
///
/// A request is built once per run by the caller and is never modified by the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub auth: Option<Auth>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub output_dir: PathBuf,
    pub file_prefix: String,
}

impl FetchRequest {
    pub fn new(url: &str, output_dir: impl AsRef<Path>) -> Self {
        Self {
            url: url.into(),
            auth: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            output_dir: output_dir.as_ref().to_path_buf(),
            file_prefix: DEFAULT_FILE_PREFIX.into(),
        }
    }

    pub fn with_auth(self, auth: Auth) -> Self {
        Self {
            auth: Some(auth),
            ..self
        }
    }

    pub fn with_timeouts(self, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            ..self
        }
    }

    pub fn with_retry_policy(self, retry_policy: RetryPolicy) -> Self {
        Self {
            retry_policy,
            ..self
        }
    }

    pub fn with_file_prefix(self, file_prefix: &str) -> Self {
        Self {
            file_prefix: file_prefix.into(),
            ..self
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns the basic credentials, failing if any part of them is missing.
    pub fn credentials(&self) -> Result<(&str, &str), FetchError> {
        match &self.auth {
            None => Err(FetchError::MissingCredential { field: "username" }),
            Some(Auth::Basic { username, .. }) if username.is_empty() => {
                Err(FetchError::MissingCredential { field: "username" })
            }
            Some(Auth::Basic { password, .. }) if password.is_empty() => {
                Err(FetchError::MissingCredential { field: "password" })
            }
            Some(Auth::Basic { username, password }) => Ok((username, password)),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, password: String },
}

impl Auth {
    pub fn new_basic(username: &str, password: &str) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

// The password must not leak into logs
impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"********")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    #[test_case(None, "username" ; "no auth at all")]
    #[test_case(Some(Auth::new_basic("", "secret")), "username" ; "empty username")]
    #[test_case(Some(Auth::new_basic("user", "")), "password" ; "empty password")]
    #[test_case(Some(Auth::new_basic("", "")), "username" ; "both empty")]
    fn incomplete_credentials_are_rejected(auth: Option<Auth>, missing: &str) {
        let mut request = FetchRequest::new("https://example.com/upload.xml", "data");
        request.auth = auth;

        assert_matches!(
            request.credentials(),
            Err(FetchError::MissingCredential { field }) if field == missing
        );
    }

    #[test]
    fn complete_credentials_are_returned() {
        let request = FetchRequest::new("https://example.com/upload.xml", "data")
            .with_auth(Auth::new_basic("user", "secret"));

        assert_eq!(request.credentials().unwrap(), ("user", "secret"));
    }

    #[test]
    fn debug_output_hides_password() {
        let auth = Auth::new_basic("user", "hunter2");
        let debug = format!("{auth:?}");

        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn read_timeout_outlasts_connect_timeout_by_default() {
        let request = FetchRequest::new("https://example.com/upload.xml", "data");

        assert!(request.read_timeout > request.connect_timeout);
        assert_eq!(request.file_prefix, "upload");
    }
}
