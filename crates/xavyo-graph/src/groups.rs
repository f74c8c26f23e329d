//! Group, membership and ownership operations.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::auth::TokenCache;
use crate::base::{
    build_http_client, BaseClient, DeleteRequest, GetRequest, PatchRequest, PostRequest, Uri,
};
use crate::models::{DirectoryObjectLink, DirectoryObjectRef, Group, ODataCollection};
use crate::{GraphConfig, GraphCredentials, GraphError, GraphResult};

/// Maximum number of `members@odata.bind` references accepted by a single group PATCH.
pub const MAX_MEMBERS_PER_REQUEST: usize = 20;

#[derive(Serialize)]
struct MembersBind<'a> {
    #[serde(rename = "members@odata.bind")]
    members: &'a [String],
}

#[derive(Serialize)]
struct ODataIdRef<'a> {
    #[serde(rename = "@odata.id")]
    id: &'a str,
}

/// Client for the `/groups` resource.
#[derive(Debug, Clone)]
pub struct GroupsClient {
    base_client: BaseClient,
}

impl GroupsClient {
    /// Creates a groups client authenticating with the client credentials grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be created.
    pub fn new(config: &GraphConfig, credentials: GraphCredentials) -> GraphResult<Self> {
        let http_client = build_http_client(config)?;
        let token_cache = TokenCache::new(
            credentials,
            config.cloud_environment.clone(),
            config.tenant_id.clone(),
            http_client.clone(),
        );
        let base_client =
            BaseClient::with_http_client(config, Arc::new(token_cache), http_client);
        Ok(Self::with_base_client(base_client))
    }

    /// Creates a groups client on top of an existing base client.
    #[must_use]
    pub fn with_base_client(base_client: BaseClient) -> Self {
        Self { base_client }
    }

    /// Returns the underlying base client.
    #[must_use]
    pub fn base_client(&self) -> &BaseClient {
        &self.base_client
    }

    /// Lists groups, optionally narrowed by an `OData` `$filter` expression.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: Option<&str>) -> GraphResult<(Vec<Group>, StatusCode)> {
        let mut uri = Uri::tenant("/groups");
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            uri = uri.param("$filter", filter);
        }

        let response = self
            .base_client
            .get(GetRequest {
                uri,
                valid_status_codes: vec![StatusCode::OK],
                disable_paging: false,
            })
            .await?;

        let data: ODataCollection<Group> = response.json()?;
        debug!("Listed {} groups", data.value.len());
        Ok((data.value, response.status))
    }

    /// Creates a group and returns it as stored by the directory.
    #[instrument(skip(self, group))]
    pub async fn create(&self, group: &Group) -> GraphResult<(Group, StatusCode)> {
        let body = serde_json::to_vec(group)?;

        let response = self
            .base_client
            .post(PostRequest {
                uri: Uri::tenant("/groups"),
                body,
                valid_status_codes: vec![StatusCode::CREATED],
            })
            .await?;

        let created: Group = response.json()?;
        info!(
            "Group created with ID: {}",
            created.id.as_deref().unwrap_or_default()
        );
        Ok((created, response.status))
    }

    /// Retrieves a group.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> GraphResult<(Group, StatusCode)> {
        let response = self
            .base_client
            .get(GetRequest {
                uri: Uri::tenant(format!("/groups/{id}")),
                valid_status_codes: vec![StatusCode::OK],
                disable_paging: true,
            })
            .await?;

        Ok((response.json()?, response.status))
    }

    /// Amends an existing group. Only the fields set on `group` are sent.
    #[instrument(skip(self, group), fields(group_id = ?group.id))]
    pub async fn update(&self, group: &Group) -> GraphResult<StatusCode> {
        let id = group_id(group)?;
        let body = serde_json::to_vec(group)?;

        let response = self
            .base_client
            .patch(PatchRequest {
                uri: Uri::tenant(format!("/groups/{id}")),
                body,
                valid_status_codes: vec![StatusCode::NO_CONTENT],
            })
            .await?;

        info!("Group updated: {}", id);
        Ok(response.status)
    }

    /// Deletes a group.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> GraphResult<StatusCode> {
        let response = self
            .base_client
            .delete(DeleteRequest {
                uri: Uri::tenant(format!("/groups/{id}")),
                valid_status_codes: vec![StatusCode::NO_CONTENT],
            })
            .await?;

        info!("Group deleted: {}", id);
        Ok(response.status)
    }

    /// Lists the object IDs of the group's direct members.
    #[instrument(skip(self))]
    pub async fn list_members(&self, id: &str) -> GraphResult<(Vec<String>, StatusCode)> {
        self.list_links(id, "members").await
    }

    /// Retrieves a single member link, returning the member's object ID.
    #[instrument(skip(self))]
    pub async fn get_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> GraphResult<(String, StatusCode)> {
        self.get_link(group_id, "members", member_id).await
    }

    /// Adds the members queued on `group` with [`Group::append_member`].
    ///
    /// References are sent in chunks of [`MAX_MEMBERS_PER_REQUEST`]; the first
    /// failing chunk stops the operation. Returns the status of the last request,
    /// or `None` if there was nothing to add.
    #[instrument(skip(self, group), fields(group_id = ?group.id))]
    pub async fn add_members(&self, group: &Group) -> GraphResult<Option<StatusCode>> {
        let id = group_id(group)?;
        let members = group.members.as_deref().unwrap_or_default();
        let mut status = None;

        for chunk in members.chunks(MAX_MEMBERS_PER_REQUEST) {
            let body = serde_json::to_vec(&MembersBind { members: chunk })?;

            let response = self
                .base_client
                .patch(PatchRequest {
                    uri: Uri::tenant(format!("/groups/{id}")),
                    body,
                    valid_status_codes: vec![StatusCode::NO_CONTENT],
                })
                .await?;

            debug!("Added {} members to group {}", chunk.len(), id);
            status = Some(response.status);
        }

        if status.is_some() {
            info!("Added {} members to group {}", members.len(), id);
        }
        Ok(status)
    }

    /// Removes members from a group, skipping IDs that are not currently members.
    #[instrument(skip(self, member_ids))]
    pub async fn remove_members(
        &self,
        group_id: &str,
        member_ids: &[String],
    ) -> GraphResult<Option<StatusCode>> {
        self.remove_links(group_id, "members", member_ids).await
    }

    /// Lists the object IDs of the group's owners.
    #[instrument(skip(self))]
    pub async fn list_owners(&self, id: &str) -> GraphResult<(Vec<String>, StatusCode)> {
        self.list_links(id, "owners").await
    }

    /// Retrieves a single owner link, returning the owner's object ID.
    #[instrument(skip(self))]
    pub async fn get_owner(
        &self,
        group_id: &str,
        owner_id: &str,
    ) -> GraphResult<(String, StatusCode)> {
        self.get_link(group_id, "owners", owner_id).await
    }

    /// Adds the owners queued on `group` with [`Group::append_owner`], one request per owner.
    ///
    /// The first failure stops the operation. Returns the status of the last
    /// request, or `None` if there was nothing to add.
    #[instrument(skip(self, group), fields(group_id = ?group.id))]
    pub async fn add_owners(&self, group: &Group) -> GraphResult<Option<StatusCode>> {
        let id = group_id(group)?;
        let owners = group.owners.as_deref().unwrap_or_default();
        let mut status = None;

        for owner in owners {
            let body = serde_json::to_vec(&ODataIdRef { id: owner })?;

            let response = self
                .base_client
                .post(PostRequest {
                    uri: Uri::tenant(format!("/groups/{id}/owners/$ref")),
                    body,
                    valid_status_codes: vec![StatusCode::NO_CONTENT],
                })
                .await?;

            status = Some(response.status);
        }

        if status.is_some() {
            info!("Added {} owners to group {}", owners.len(), id);
        }
        Ok(status)
    }

    /// Removes owners from a group, skipping IDs that are not currently owners.
    #[instrument(skip(self, owner_ids))]
    pub async fn remove_owners(
        &self,
        group_id: &str,
        owner_ids: &[String],
    ) -> GraphResult<Option<StatusCode>> {
        self.remove_links(group_id, "owners", owner_ids).await
    }

    async fn list_links(
        &self,
        group_id: &str,
        relationship: &str,
    ) -> GraphResult<(Vec<String>, StatusCode)> {
        let response = self
            .base_client
            .get(GetRequest {
                uri: Uri::tenant(format!("/groups/{group_id}/{relationship}"))
                    .param("$select", "id"),
                valid_status_codes: vec![StatusCode::OK],
                disable_paging: false,
            })
            .await?;

        let data: ODataCollection<DirectoryObjectRef> = response.json()?;
        let ids = data.value.into_iter().map(|entry| entry.id).collect();
        Ok((ids, response.status))
    }

    async fn get_link(
        &self,
        group_id: &str,
        relationship: &str,
        object_id: &str,
    ) -> GraphResult<(String, StatusCode)> {
        let response = self
            .base_client
            .get(GetRequest {
                uri: Uri::tenant(format!("/groups/{group_id}/{relationship}/{object_id}/$ref"))
                    .param("$select", "id,url"),
                valid_status_codes: vec![StatusCode::OK],
                disable_paging: true,
            })
            .await?;

        let link: DirectoryObjectLink = response.json()?;
        Ok((link.id, response.status))
    }

    /// Deletes `$ref` links after confirming each one exists.
    async fn remove_links(
        &self,
        group_id: &str,
        relationship: &str,
        object_ids: &[String],
    ) -> GraphResult<Option<StatusCode>> {
        let mut status = None;

        for object_id in object_ids {
            if let Err(e) = self.get_link(group_id, relationship, object_id).await {
                if e.is_not_found() {
                    debug!(
                        "{} is not in {} of group {}, skipping",
                        object_id, relationship, group_id
                    );
                    continue;
                }
                return Err(e);
            }

            let response = self
                .base_client
                .delete(DeleteRequest {
                    uri: Uri::tenant(format!(
                        "/groups/{group_id}/{relationship}/{object_id}/$ref"
                    )),
                    valid_status_codes: vec![StatusCode::NO_CONTENT],
                })
                .await?;

            info!("Removed {} from {} of group {}", object_id, relationship, group_id);
            status = Some(response.status);
        }

        Ok(status)
    }
}

fn group_id(group: &Group) -> GraphResult<&str> {
    group
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GraphError::InvalidInput("group id is required".to_string()))
}
