//! Shared HTTP plumbing for Graph resource clients.
//!
//! Resource clients describe a call as a [`Uri`] plus the status codes that
//! count as success. The base client turns that into a full URL, attaches a
//! bearer token, retries throttled and transient responses, validates the
//! final status and, for collection reads, follows `@odata.nextLink`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::Authorizer;
use crate::retry::RetryPolicy;
use crate::{ApiVersion, GraphCloudEnvironment, GraphConfig, GraphError, GraphResult};

const NEXT_LINK: &str = "@odata.nextLink";

/// `OData` error response from Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

/// `OData` error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
    #[serde(rename = "innerError")]
    pub inner_error: Option<Value>,
}

/// Relative resource address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uri {
    /// Path below the version (and tenant) segment, starting with `/`.
    pub entity: String,
    /// Query parameters, encoded in order.
    pub params: Vec<(String, String)>,
    /// Whether the tenant ID is inserted after the version segment.
    pub has_tenant_id: bool,
}

impl Uri {
    /// A tenant-scoped entity path.
    pub fn tenant(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            params: Vec::new(),
            has_tenant_id: true,
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// Input for a GET request.
#[derive(Debug, Clone)]
pub struct GetRequest {
    pub uri: Uri,
    pub valid_status_codes: Vec<StatusCode>,
    /// Return only the first page of a collection.
    pub disable_paging: bool,
}

/// Input for a POST request.
#[derive(Debug, Clone)]
pub struct PostRequest {
    pub uri: Uri,
    pub body: Vec<u8>,
    pub valid_status_codes: Vec<StatusCode>,
}

/// Input for a PATCH request.
#[derive(Debug, Clone)]
pub struct PatchRequest {
    pub uri: Uri,
    pub body: Vec<u8>,
    pub valid_status_codes: Vec<StatusCode>,
}

/// Input for a DELETE request.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub uri: Uri,
    pub valid_status_codes: Vec<StatusCode>,
}

/// A response whose status has been validated.
#[derive(Debug, Clone)]
pub struct GraphResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl GraphResponse {
    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Decode`], carrying the response status, if the
    /// body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> GraphResult<T> {
        serde_json::from_slice(&self.body).map_err(|source| GraphError::Decode {
            status: self.status,
            source,
        })
    }
}

/// HTTP client shared by the Graph resource clients.
#[derive(Debug, Clone)]
pub struct BaseClient {
    http_client: reqwest::Client,
    authorizer: Arc<dyn Authorizer>,
    cloud_environment: GraphCloudEnvironment,
    api_version: ApiVersion,
    tenant_id: String,
    retry: RetryPolicy,
}

impl BaseClient {
    /// Creates a base client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be created.
    pub fn new(config: &GraphConfig, authorizer: Arc<dyn Authorizer>) -> GraphResult<Self> {
        let http_client = build_http_client(config)?;
        Ok(Self::with_http_client(config, authorizer, http_client))
    }

    /// Creates a base client with a pre-built `reqwest::Client`.
    #[must_use]
    pub fn with_http_client(
        config: &GraphConfig,
        authorizer: Arc<dyn Authorizer>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            http_client,
            authorizer,
            cloud_environment: config.cloud_environment.clone(),
            api_version: config.api_version,
            tenant_id: config.tenant_id.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Returns the Graph endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.cloud_environment.graph_endpoint()
    }

    #[must_use]
    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Builds the absolute URL for a resource address.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured endpoint is not a valid URL.
    pub fn build_uri(&self, uri: &Uri) -> GraphResult<Url> {
        let mut url = Url::parse(self.endpoint())?;

        let mut path = format!("{}/{}", url.path().trim_end_matches('/'), self.api_version);
        if uri.has_tenant_id {
            path.push('/');
            path.push_str(&self.tenant_id);
        }
        path.push_str(&uri.entity);
        url.set_path(&path);

        if !uri.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&uri.params);
        }

        Ok(url)
    }

    /// Performs a GET request, following `@odata.nextLink` unless paging is disabled.
    #[instrument(skip(self, input), fields(entity = %input.uri.entity))]
    pub async fn get(&self, input: GetRequest) -> GraphResult<GraphResponse> {
        let url = self.build_uri(&input.uri)?;
        let response = self
            .perform(Method::GET, url, None, &input.valid_status_codes)
            .await?;

        if input.disable_paging {
            return Ok(response);
        }
        self.follow_pages(response, &input.valid_status_codes).await
    }

    /// Performs a POST request.
    #[instrument(skip(self, input), fields(entity = %input.uri.entity))]
    pub async fn post(&self, input: PostRequest) -> GraphResult<GraphResponse> {
        let url = self.build_uri(&input.uri)?;
        self.perform(
            Method::POST,
            url,
            Some(input.body.as_slice()),
            &input.valid_status_codes,
        )
        .await
    }

    /// Performs a PATCH request.
    #[instrument(skip(self, input), fields(entity = %input.uri.entity))]
    pub async fn patch(&self, input: PatchRequest) -> GraphResult<GraphResponse> {
        let url = self.build_uri(&input.uri)?;
        self.perform(
            Method::PATCH,
            url,
            Some(input.body.as_slice()),
            &input.valid_status_codes,
        )
        .await
    }

    /// Performs a DELETE request.
    #[instrument(skip(self, input), fields(entity = %input.uri.entity))]
    pub async fn delete(&self, input: DeleteRequest) -> GraphResult<GraphResponse> {
        let url = self.build_uri(&input.uri)?;
        self.perform(Method::DELETE, url, None, &input.valid_status_codes)
            .await
    }

    /// Sends one request, retrying throttled and transient responses.
    async fn perform(
        &self,
        method: Method,
        url: Url,
        body: Option<&[u8]>,
        valid_status_codes: &[StatusCode],
    ) -> GraphResult<GraphResponse> {
        let mut attempt = 0u32;
        let mut refreshed = false;

        loop {
            let token = self.authorizer.token().await?;

            let mut request = self
                .http_client
                .request(method.clone(), url.clone())
                .bearer_auth(&token);

            if let Some(b) = body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(b.to_vec());
            }

            let response = request.send().await?;
            let status = response.status();

            if RetryPolicy::is_retryable(status) && attempt < self.retry.max_retries {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(RetryPolicy::parse_retry_after);
                let delay = self.retry.delay_for(retry_after, attempt);
                attempt += 1;

                warn!(
                    "Graph returned {}, retry {}/{} after {:?}",
                    status, attempt, self.retry.max_retries, delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED
                && !refreshed
                && self.authorizer.invalidate().await
            {
                refreshed = true;
                warn!("Graph rejected the access token, retrying with a fresh one");
                continue;
            }

            let body = response.bytes().await?.to_vec();

            let valid = if valid_status_codes.is_empty() {
                status.is_success()
            } else {
                valid_status_codes.contains(&status)
            };

            if valid {
                debug!("{} {} -> {}", method, url.path(), status);
                return Ok(GraphResponse { status, body });
            }

            return Err(api_error(status, &body));
        }
    }

    /// Fetches the remaining pages of a collection and merges their `value` arrays.
    async fn follow_pages(
        &self,
        first: GraphResponse,
        valid_status_codes: &[StatusCode],
    ) -> GraphResult<GraphResponse> {
        let Ok(mut merged) = serde_json::from_slice::<Value>(&first.body) else {
            return Ok(first);
        };
        let Some(mut next) = next_link(&merged) else {
            return Ok(first);
        };

        let endpoint = Url::parse(self.endpoint())?;

        let status = loop {
            debug!("Fetching page: {}", next);
            let url = Url::parse(&next)?;
            if url.origin() != endpoint.origin() {
                return Err(GraphError::InvalidInput(format!(
                    "nextLink {} points outside {}",
                    url.origin().ascii_serialization(),
                    endpoint.origin().ascii_serialization()
                )));
            }
            let response = self
                .perform(Method::GET, url, None, valid_status_codes)
                .await?;

            let mut page: Value = response.json()?;
            let items = match page.get_mut("value").map(Value::take) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            if let Some(Value::Array(all)) = merged.get_mut("value") {
                all.extend(items);
            }

            match next_link(&page) {
                Some(link) => next = link,
                None => break response.status,
            }
        };

        if let Some(object) = merged.as_object_mut() {
            object.remove(NEXT_LINK);
        }

        Ok(GraphResponse {
            status,
            body: serde_json::to_vec(&merged)?,
        })
    }
}

/// Builds the HTTP client shared by Graph and token requests.
pub(crate) fn build_http_client(config: &GraphConfig) -> GraphResult<reqwest::Client> {
    config.validate()?;

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| GraphError::Config(format!("Failed to create HTTP client: {e}")))
}

fn next_link(page: &Value) -> Option<String> {
    page.get(NEXT_LINK)
        .and_then(Value::as_str)
        .filter(|link| !link.is_empty())
        .map(String::from)
}

/// Converts an unexpected response into a `GraphError`, decoding the `OData` envelope if present.
fn api_error(status: StatusCode, body: &[u8]) -> GraphError {
    if let Ok(odata_error) = serde_json::from_slice::<ODataError>(body) {
        return GraphError::GraphApi {
            status,
            code: odata_error.error.code,
            message: odata_error.error.message,
            inner_error: odata_error.error.inner_error.map(|v| v.to_string()),
        };
    }

    GraphError::GraphApi {
        status,
        code: status.to_string(),
        message: String::from_utf8_lossy(body).into_owned(),
        inner_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    fn client(api_version: ApiVersion) -> BaseClient {
        let config = GraphConfig::builder()
            .tenant_id("tenant-1")
            .api_version(api_version)
            .build()
            .unwrap();
        BaseClient::new(&config, Arc::new(StaticToken::new("token"))).unwrap()
    }

    #[test]
    fn test_build_uri_with_tenant_and_params() {
        let client = client(ApiVersion::Beta);
        let uri = Uri::tenant("/groups").param("$filter", "displayName eq 'Sales'");

        let url = client.build_uri(&uri).unwrap();
        assert_eq!(url.path(), "/beta/tenant-1/groups");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![(
                "$filter".to_string(),
                "displayName eq 'Sales'".to_string()
            )]
        );
    }

    #[test]
    fn test_build_uri_without_tenant() {
        let client = client(ApiVersion::V1);
        let uri = Uri {
            entity: "/directoryObjects/abc".to_string(),
            ..Default::default()
        };

        let url = client.build_uri(&uri).unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/directoryObjects/abc"
        );
    }

    #[test]
    fn test_build_uri_keeps_ref_segment() {
        let client = client(ApiVersion::Beta);
        let uri = Uri::tenant("/groups/g1/members/m1/$ref").param("$select", "id,url");

        let url = client.build_uri(&uri).unwrap();
        assert_eq!(url.path(), "/beta/tenant-1/groups/g1/members/m1/$ref");
        assert_eq!(url.query_pairs().next().unwrap().1, "id,url");
    }

    #[test]
    fn test_odata_error_parsing() {
        let body = br#"{
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource not found",
                "innerError": {"date": "2024-01-15"}
            }
        }"#;

        match api_error(StatusCode::NOT_FOUND, body) {
            GraphError::GraphApi {
                status,
                code,
                inner_error,
                ..
            } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(code, "Request_ResourceNotFound");
                assert!(inner_error.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_error_body() {
        let err = api_error(StatusCode::BAD_REQUEST, b"bad things");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(err.to_string().contains("bad things"));
    }

    #[test]
    fn test_next_link_detection() {
        let page = serde_json::json!({
            "value": [],
            "@odata.nextLink": "https://graph.microsoft.com/beta/groups?$skiptoken=abc"
        });
        assert!(next_link(&page).is_some());
        assert!(next_link(&serde_json::json!({ "value": [] })).is_none());
    }
}
