//! Common test utilities for xavyo-graph integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xavyo_graph::{
    BaseClient, GraphCloudEnvironment, GraphConfig, GroupsClient, RetryPolicy, StaticToken,
};

pub const TENANT_ID: &str = "tenant-1";
pub const ACCESS_TOKEN: &str = "mock-access-token";

/// Path of a tenant-scoped entity on the mock server.
pub fn tenant_path(entity: &str) -> String {
    format!("/beta/{TENANT_ID}{entity}")
}

/// Configuration pointing both Graph and login endpoints at the mock server.
pub fn test_config(server: &MockServer) -> GraphConfig {
    GraphConfig::builder()
        .tenant_id(TENANT_ID)
        .cloud_environment(GraphCloudEnvironment::Custom {
            graph_endpoint: server.uri(),
            login_endpoint: server.uri(),
        })
        .retry(RetryPolicy::for_testing())
        .build()
        .unwrap()
}

/// Groups client authenticating with a fixed bearer token.
pub fn groups_client(server: &MockServer) -> GroupsClient {
    let base = BaseClient::new(&test_config(server), Arc::new(StaticToken::new(ACCESS_TOKEN)))
        .unwrap();
    GroupsClient::with_base_client(base)
}

/// Test data factory for a security group as returned by Graph.
pub fn create_test_group(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "displayName": name,
        "description": format!("Test group: {}", name),
        "mailEnabled": false,
        "mailNickname": name.to_lowercase().replace(' ', "-"),
        "securityEnabled": true,
        "groupTypes": []
    })
}

/// Generate a sequence of test groups.
pub fn generate_test_groups(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| create_test_group(&format!("group-{i}"), &format!("Test Group {i}")))
        .collect()
}

/// A directory object entry selected down to its ID.
pub fn create_object_ref(id: &str, odata_type: &str) -> Value {
    json!({
        "@odata.type": odata_type,
        "id": id
    })
}

/// A `$ref` link response for a single member or owner.
pub fn create_object_link(id: &str) -> Value {
    json!({
        "@odata.context": "https://graph.microsoft.com/beta/$metadata#directoryObjects/$entity",
        "@odata.type": "#microsoft.graph.user",
        "id": id,
        "url": format!("https://graph.microsoft.com/v2/{TENANT_ID}/directoryObjects/{id}/Microsoft.DirectoryServices.User")
    })
}

/// Wraps items in an OData collection response.
pub fn create_odata_response(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut response = json!({ "value": items });
    if let Some(link) = next_link {
        response["@odata.nextLink"] = json!(link);
    }
    response
}

/// Creates an OData error response.
pub fn create_odata_error(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Mounts a `$ref` lookup that answers 200 for an existing link.
pub async fn mock_link_exists(server: &MockServer, relationship: &str, group_id: &str, id: &str) {
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!(
            "/groups/{group_id}/{relationship}/{id}/$ref"
        ))))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_object_link(id)))
        .mount(server)
        .await;
}

/// Mounts a `$ref` lookup that answers 404.
pub async fn mock_link_missing(server: &MockServer, relationship: &str, group_id: &str, id: &str) {
    Mock::given(method("GET"))
        .and(path(tenant_path(&format!(
            "/groups/{group_id}/{relationship}/{id}/$ref"
        ))))
        .respond_with(ResponseTemplate::new(404).set_body_json(create_odata_error(
            "Request_ResourceNotFound",
            &format!("Resource '{id}' does not exist or one of its queried reference-property objects are not present."),
        )))
        .mount(server)
        .await;
}

/// Mounts a `$ref` delete answering 204, expecting exactly `times` calls.
pub async fn mock_link_delete(
    server: &MockServer,
    relationship: &str,
    group_id: &str,
    id: &str,
    times: u64,
) {
    Mock::given(method("DELETE"))
        .and(path(tenant_path(&format!(
            "/groups/{group_id}/{relationship}/{id}/$ref"
        ))))
        .respond_with(ResponseTemplate::new(204))
        .expect(times)
        .mount(server)
        .await;
}
