//! Typed Microsoft Graph client for directory groups.
//!
//! Each [`GroupsClient`] method maps onto one Graph endpoint under
//! `/groups`: group CRUD, and list/get/add/remove for members and owners.
//! Requests go through a shared [`BaseClient`] which handles URI
//! construction, bearer authorization, throttling retries and status
//! validation. Every operation returns the HTTP status alongside the decoded
//! value; errors carry the status when the API answered.
//!
//! # Example
//!
//! ```no_run
//! use xavyo_graph::{GraphConfig, GraphCredentials, GroupsClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GraphConfig::builder()
//!     .tenant_id("your-tenant-id")
//!     .build()?;
//! let credentials = GraphCredentials::from_env()?;
//!
//! let client = GroupsClient::new(&config, credentials)?;
//! let (groups, status) = client.list(Some("startswith(displayName,'Eng')")).await?;
//! println!("{status}: {} groups", groups.len());
//! # Ok(())
//! # }
//! ```

mod auth;
mod base;
mod config;
mod error;
mod groups;
mod models;
mod retry;

// Re-exports
pub use auth::{Authorizer, StaticToken, TokenCache};
pub use base::{
    BaseClient, DeleteRequest, GetRequest, GraphResponse, ODataError, ODataErrorBody,
    PatchRequest, PostRequest, Uri,
};
pub use config::{
    ApiVersion, GraphCloudEnvironment, GraphConfig, GraphConfigBuilder, GraphCredentials,
    ENV_API_VERSION, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_CLOUD, ENV_TENANT_ID,
};
pub use error::{GraphError, GraphResult};
pub use groups::{GroupsClient, MAX_MEMBERS_PER_REQUEST};
pub use models::{
    directory_object_url, DirectoryObjectLink, DirectoryObjectRef, Group, GroupVisibility,
    GROUP_TYPE_DYNAMIC_MEMBERSHIP, GROUP_TYPE_UNIFIED,
};
pub use retry::RetryPolicy;
pub use reqwest::StatusCode;
