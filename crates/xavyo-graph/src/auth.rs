//! OAuth2 authorization for Microsoft Graph API requests.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::{GraphCloudEnvironment, GraphCredentials, GraphError, GraphResult};

/// Supplies bearer tokens for outgoing Graph requests.
#[async_trait]
pub trait Authorizer: Send + Sync + fmt::Debug {
    /// Returns an access token valid for at least the next request.
    async fn token(&self) -> GraphResult<String>;

    /// Drops any cached token after the API rejected it.
    ///
    /// Returns true if the next call to [`Authorizer::token`] may yield a
    /// different token.
    async fn invalidate(&self) -> bool {
        false
    }
}

/// A pre-issued access token, used as-is.
#[derive(Debug)]
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into()))
    }
}

#[async_trait]
impl Authorizer for StaticToken {
    async fn token(&self) -> GraphResult<String> {
        Ok(self.0.expose_secret().clone())
    }
}

/// OAuth2 token response from the identity platform.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: String,
}

/// Cached OAuth2 access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Client credentials token source with an in-memory cache.
#[derive(Debug)]
pub struct TokenCache {
    credentials: GraphCredentials,
    cloud_environment: GraphCloudEnvironment,
    tenant_id: String,
    http_client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
    /// Grace period before expiry to trigger refresh (default: 5 minutes).
    grace_period: Duration,
}

impl TokenCache {
    /// Creates a new token cache.
    pub fn new(
        credentials: GraphCredentials,
        cloud_environment: GraphCloudEnvironment,
        tenant_id: String,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            credentials,
            cloud_environment,
            tenant_id,
            http_client,
            cached_token: RwLock::new(None),
            grace_period: Duration::minutes(5),
        }
    }

    /// Returns the token endpoint for the configured tenant.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.cloud_environment.login_endpoint(),
            self.tenant_id
        )
    }

    /// Acquires a new access token using the client credentials flow.
    #[instrument(skip(self))]
    async fn acquire_token(&self) -> GraphResult<CachedToken> {
        let scope = format!("{}/.default", self.cloud_environment.graph_endpoint());
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            (
                "client_secret",
                self.credentials.client_secret.expose_secret().as_str(),
            ),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http_client
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| GraphError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Auth(format!("Failed to parse token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

        debug!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl Authorizer for TokenCache {
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn token(&self) -> GraphResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    debug!("Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Refreshing access token");
        let new_token = self.acquire_token().await?;
        let access_token = new_token.access_token.clone();

        let mut cache = self.cached_token.write().await;
        *cache = Some(new_token);

        Ok(access_token)
    }

    async fn invalidate(&self) -> bool {
        let mut cache = self.cached_token.write().await;
        *cache = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_expiry() {
        let token = CachedToken {
            access_token: "test".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };

        assert!(!token.is_expired(Duration::minutes(5)));
        assert!(token.is_expired(Duration::minutes(15)));
    }

    #[test]
    fn test_cached_token_already_expired() {
        let token = CachedToken {
            access_token: "test".to_string(),
            expires_at: Utc::now() - Duration::minutes(1),
        };

        assert!(token.is_expired(Duration::minutes(0)));
    }

    #[test]
    fn test_token_url_per_cloud() {
        let credentials = GraphCredentials {
            client_id: "app".to_string(),
            client_secret: SecretString::new("secret".to_string()),
        };
        let cache = TokenCache::new(
            credentials,
            GraphCloudEnvironment::UsGovernment,
            "tenant-1".to_string(),
            reqwest::Client::new(),
        );

        assert_eq!(
            cache.token_url(),
            "https://login.microsoftonline.us/tenant-1/oauth2/v2.0/token"
        );
    }

    #[tokio::test]
    async fn test_static_token() {
        let auth = StaticToken::new("abc");
        assert_eq!(auth.token().await.unwrap(), "abc");
        assert!(!format!("{auth:?}").contains("abc"));
        assert!(!auth.invalidate().await);
    }

    #[tokio::test]
    async fn test_token_cache_invalidate_clears_cache() {
        let credentials = GraphCredentials {
            client_id: "app".to_string(),
            client_secret: SecretString::new("secret".to_string()),
        };
        let cache = TokenCache::new(
            credentials,
            GraphCloudEnvironment::Commercial,
            "tenant-1".to_string(),
            reqwest::Client::new(),
        );
        *cache.cached_token.write().await = Some(CachedToken {
            access_token: "cached".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        });

        assert!(cache.invalidate().await);
        assert!(cache.cached_token.read().await.is_none());
    }
}
