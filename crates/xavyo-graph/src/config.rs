//! Client configuration: cloud environments, API versions and credentials.

use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::{GraphError, GraphResult};

/// Environment variable holding the directory tenant ID.
pub const ENV_TENANT_ID: &str = "GRAPH_TENANT_ID";
/// Environment variable selecting the national cloud.
pub const ENV_CLOUD: &str = "GRAPH_CLOUD";
/// Environment variable selecting the API version.
pub const ENV_API_VERSION: &str = "GRAPH_API_VERSION";
/// Environment variable holding the application (client) ID.
pub const ENV_CLIENT_ID: &str = "GRAPH_CLIENT_ID";
/// Environment variable holding the client secret.
pub const ENV_CLIENT_SECRET: &str = "GRAPH_CLIENT_SECRET";

const DEFAULT_USER_AGENT: &str = concat!("xavyo-graph/", env!("CARGO_PKG_VERSION"));

/// Microsoft cloud the tenant lives in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphCloudEnvironment {
    /// Global Azure cloud.
    #[default]
    Commercial,
    /// Azure US Government (GCC High / DoD).
    UsGovernment,
    /// Azure China operated by 21Vianet.
    China,
    /// Azure Germany.
    Germany,
    /// Explicit endpoints, e.g. a proxy or a local mock server.
    Custom {
        graph_endpoint: String,
        login_endpoint: String,
    },
}

impl GraphCloudEnvironment {
    /// Returns the Graph API root for this cloud, without a trailing slash.
    #[must_use]
    pub fn graph_endpoint(&self) -> &str {
        match self {
            Self::Commercial => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
            Self::Germany => "https://graph.microsoft.de",
            Self::Custom { graph_endpoint, .. } => graph_endpoint.trim_end_matches('/'),
        }
    }

    /// Returns the identity platform root for this cloud, without a trailing slash.
    #[must_use]
    pub fn login_endpoint(&self) -> &str {
        match self {
            Self::Commercial => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
            Self::Germany => "https://login.microsoftonline.de",
            Self::Custom { login_endpoint, .. } => login_endpoint.trim_end_matches('/'),
        }
    }
}

impl FromStr for GraphCloudEnvironment {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commercial" | "public" | "global" => Ok(Self::Commercial),
            "us_government" | "usgovernment" | "usgov" => Ok(Self::UsGovernment),
            "china" => Ok(Self::China),
            "germany" => Ok(Self::Germany),
            other => Err(GraphError::Config(format!("Unknown cloud environment: {other}"))),
        }
    }
}

/// Graph API version segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiVersion {
    #[serde(rename = "v1.0")]
    V1,
    #[default]
    #[serde(rename = "beta")]
    Beta,
}

impl ApiVersion {
    /// Returns the path segment used in request URLs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1.0",
            Self::Beta => "beta",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "v1.0" | "v1" => Ok(Self::V1),
            "beta" => Ok(Self::Beta),
            other => Err(GraphError::Config(format!("Unknown API version: {other}"))),
        }
    }
}

/// Application credentials for the client credentials grant.
#[derive(Debug)]
pub struct GraphCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl GraphCredentials {
    /// Reads credentials from `GRAPH_CLIENT_ID` and `GRAPH_CLIENT_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is missing or empty.
    pub fn from_env() -> GraphResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> GraphResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = required(&lookup, ENV_CLIENT_ID)?;
        let client_secret = required(&lookup, ENV_CLIENT_SECRET)?;

        Ok(Self {
            client_id,
            client_secret: SecretString::new(client_secret),
        })
    }
}

/// Configuration for a Graph client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Directory tenant ID (GUID or verified domain).
    pub tenant_id: String,
    #[serde(default)]
    pub cloud_environment: GraphCloudEnvironment,
    #[serde(default)]
    pub api_version: ApiVersion,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl GraphConfig {
    /// Returns a builder for the configuration.
    #[must_use]
    pub fn builder() -> GraphConfigBuilder {
        GraphConfigBuilder::default()
    }

    /// Reads configuration from `GRAPH_TENANT_ID`, `GRAPH_CLOUD` and `GRAPH_API_VERSION`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant is missing or a value cannot be parsed.
    pub fn from_env() -> GraphResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> GraphResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder().tenant_id(required(&lookup, ENV_TENANT_ID)?);

        if let Some(cloud) = lookup(ENV_CLOUD).filter(|v| !v.trim().is_empty()) {
            builder = builder.cloud_environment(cloud.parse()?);
        }
        if let Some(version) = lookup(ENV_API_VERSION).filter(|v| !v.trim().is_empty()) {
            builder = builder.api_version(version.parse()?);
        }

        builder.build()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> GraphResult<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(GraphError::Config("tenant_id is required".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(GraphError::Config(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        if let GraphCloudEnvironment::Custom {
            graph_endpoint,
            login_endpoint,
        } = &self.cloud_environment
        {
            url::Url::parse(graph_endpoint)?;
            url::Url::parse(login_endpoint)?;
        }
        self.retry.validate().map_err(GraphError::Config)
    }
}

/// Builder for [`GraphConfig`].
#[derive(Debug, Default)]
pub struct GraphConfigBuilder {
    tenant_id: Option<String>,
    cloud_environment: GraphCloudEnvironment,
    api_version: ApiVersion,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    retry: RetryPolicy,
}

impl GraphConfigBuilder {
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn cloud_environment(mut self, cloud_environment: GraphCloudEnvironment) -> Self {
        self.cloud_environment = cloud_environment;
        self
    }

    #[must_use]
    pub fn api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant is missing or any field is invalid.
    pub fn build(self) -> GraphResult<GraphConfig> {
        let config = GraphConfig {
            tenant_id: self
                .tenant_id
                .ok_or_else(|| GraphError::Config("tenant_id is required".to_string()))?,
            cloud_environment: self.cloud_environment,
            api_version: self.api_version,
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or_else(default_request_timeout_secs),
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            retry: self.retry,
        };
        config.validate()?;
        Ok(config)
    }
}

fn required<F>(lookup: &F, key: &str) -> GraphResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GraphError::Config(format!("{key} is not set")))
}
