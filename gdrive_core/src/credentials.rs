//! Access tokens for the Google REST APIs.
//!
//! The server authenticates as a service account. Tokens are minted and
//! refreshed by `yup-oauth2`; everything else in the crate only sees the
//! [`TokenProvider`] trait so tests can hand in a fixed token.

use async_trait::async_trait;

use crate::error::ConnectorError;

/// Full Drive access: search, export, download and file creation.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
/// Read/write access to spreadsheet values, formatting and metadata.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

pub const DEFAULT_SCOPES: &[&str] = &[DRIVE_SCOPE, SHEETS_SCOPE];

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a bearer token valid for the configured scopes.
    async fn access_token(&self) -> Result<String, ConnectorError>;
}

/// A fixed token. Useful for tests and for tokens minted out of band.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, ConnectorError> {
        Ok(self.0.clone())
    }
}

#[cfg(feature = "service-account")]
pub use service_account::ServiceAccountTokens;

#[cfg(feature = "service-account")]
mod service_account {
    use super::*;
    use std::path::Path;
    use tracing::{debug, info};
    use yup_oauth2::authenticator::DefaultAuthenticator;

    /// Service-account authenticator. Caches and refreshes tokens internally.
    pub struct ServiceAccountTokens {
        auth: DefaultAuthenticator,
        scopes: Vec<String>,
        client_email: String,
    }

    impl ServiceAccountTokens {
        /// Loads a service-account JSON key and builds an authenticator.
        pub async fn from_key_file(
            path: impl AsRef<Path>,
            scopes: &[&str],
        ) -> Result<Self, ConnectorError> {
            let path = path.as_ref();
            let key = yup_oauth2::read_service_account_key(path)
                .await
                .map_err(|e| {
                    ConnectorError::Authentication(format!(
                        "failed to read service account key {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            let client_email = key.client_email.clone();
            let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
                .build()
                .await
                .map_err(|e| {
                    ConnectorError::Authentication(format!(
                        "failed to build service account authenticator: {}",
                        e
                    ))
                })?;
            info!(client_email = %client_email, "Loaded service account credentials");
            Ok(Self {
                auth,
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
                client_email,
            })
        }

        pub fn client_email(&self) -> &str {
            &self.client_email
        }
    }

    #[async_trait]
    impl TokenProvider for ServiceAccountTokens {
        async fn access_token(&self) -> Result<String, ConnectorError> {
            let token = self
                .auth
                .token(self.scopes.as_slice())
                .await
                .map_err(|e| ConnectorError::Authentication(e.to_string()))?;
            debug!("Obtained access token");
            token
                .token()
                .map(str::to_string)
                .ok_or_else(|| {
                    ConnectorError::Authentication("token response had no access_token".into())
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let tokens = StaticToken::new("ya29.test");
        assert_eq!(tokens.access_token().await.unwrap(), "ya29.test");
    }

    #[cfg(feature = "service-account")]
    #[tokio::test]
    async fn unreadable_key_file_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = ServiceAccountTokens::from_key_file(&path, DEFAULT_SCOPES)
            .await
            .err()
            .expect("missing key must fail");
        assert_eq!(err.code_str(), "auth_failed");
    }

    #[cfg(feature = "service-account")]
    #[tokio::test]
    async fn malformed_key_file_is_an_auth_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{\"type\": \"service_account\"}").unwrap();
        let err = ServiceAccountTokens::from_key_file(file.path(), DEFAULT_SCOPES)
            .await
            .err()
            .expect("incomplete key must fail");
        assert!(matches!(err, ConnectorError::Authentication(_)));
    }
}
