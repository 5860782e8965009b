//! Bearer token sources for the Google Sheets and Drive APIs.

use crate::domain::ports::AccessTokenProvider;
use crate::utils::error::Result;
use async_trait::async_trait;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// A fixed token, e.g. one minted out of band or served through a proxy.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(feature = "google-sheets")]
pub use service_account::ServiceAccountTokenProvider;

#[cfg(feature = "google-sheets")]
mod service_account {
    use super::{DRIVE_READONLY_SCOPE, SHEETS_SCOPE};
    use crate::domain::ports::AccessTokenProvider;
    use crate::utils::error::{CardError, Result};
    use async_trait::async_trait;
    use gcp_auth::{CustomServiceAccount, TokenProvider};

    /// Tokens minted from a service-account key file.
    pub struct ServiceAccountTokenProvider {
        account: CustomServiceAccount,
    }

    impl ServiceAccountTokenProvider {
        pub fn from_file(path: &str) -> Result<Self> {
            let account = CustomServiceAccount::from_file(path).map_err(|e| {
                CardError::sink_unavailable(format!(
                    "Could not load Google service account credentials from {}: {}",
                    path, e
                ))
            })?;
            Ok(Self { account })
        }
    }

    #[async_trait]
    impl AccessTokenProvider for ServiceAccountTokenProvider {
        async fn access_token(&self) -> Result<String> {
            // gcp_auth 內部會快取 token，直到即將過期
            let token = self
                .account
                .token(&[SHEETS_SCOPE, DRIVE_READONLY_SCOPE])
                .await
                .map_err(|e| {
                    CardError::sink_unavailable(format!(
                        "Could not obtain a Google access token: {}",
                        e
                    ))
                })?;
            Ok(token.as_str().to_string())
        }
    }
}
