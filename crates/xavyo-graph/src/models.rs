//! Directory object models exchanged with the groups endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ApiVersion;

/// `groupTypes` entry marking a Microsoft 365 group.
pub const GROUP_TYPE_UNIFIED: &str = "Unified";
/// `groupTypes` entry marking rule-based membership.
pub const GROUP_TYPE_DYNAMIC_MEMBERSHIP: &str = "DynamicMembership";

/// Group visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupVisibility {
    Private,
    Public,
    Hiddenmembership,
}

/// A directory group.
///
/// Every field is optional so the same type serves as a create body, a
/// partial update body and a decoded response. Unset fields are omitted
/// from request bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_assignable_to_role: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_rule_processing_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_premises_sync_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewed_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<GroupVisibility>,

    /// Directory object URLs to link as members when the group is written.
    #[serde(
        rename = "members@odata.bind",
        skip_serializing_if = "Option::is_none"
    )]
    pub members: Option<Vec<String>>,

    /// Directory object URLs to link as owners when the group is written.
    #[serde(rename = "owners@odata.bind", skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
}

impl Group {
    /// Queues a member reference for `id`, addressed through `endpoint` and `api_version`.
    pub fn append_member(&mut self, endpoint: &str, api_version: ApiVersion, id: &str) {
        self.members
            .get_or_insert_with(Vec::new)
            .push(directory_object_url(endpoint, api_version, id));
    }

    /// Queues an owner reference for `id`, addressed through `endpoint` and `api_version`.
    pub fn append_owner(&mut self, endpoint: &str, api_version: ApiVersion, id: &str) {
        self.owners
            .get_or_insert_with(Vec::new)
            .push(directory_object_url(endpoint, api_version, id));
    }

    /// Returns true for Microsoft 365 (unified) groups.
    #[must_use]
    pub fn is_microsoft365(&self) -> bool {
        self.has_group_type(GROUP_TYPE_UNIFIED)
    }

    /// Returns true when membership is computed from `membership_rule`.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.has_group_type(GROUP_TYPE_DYNAMIC_MEMBERSHIP)
    }

    fn has_group_type(&self, group_type: &str) -> bool {
        self.group_types
            .as_deref()
            .is_some_and(|types| types.iter().any(|t| t == group_type))
    }
}

/// Builds the URL used to reference a directory object in `@odata.bind` and `@odata.id`.
#[must_use]
pub fn directory_object_url(endpoint: &str, api_version: ApiVersion, id: &str) -> String {
    format!(
        "{}/{}/directoryObjects/{}",
        endpoint.trim_end_matches('/'),
        api_version,
        id
    )
}

/// Entry of a `members` or `owners` collection selected down to its ID.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryObjectRef {
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
    pub id: String,
}

/// A single `$ref` link as returned by `/groups/{id}/members/{id}/$ref`.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryObjectLink {
    #[serde(rename = "@odata.context", default)]
    pub odata_context: Option<String>,
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Collection envelope for list responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ODataCollection<T> {
    pub value: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_serialization_omits_unset_fields() {
        let group = Group {
            display_name: Some("Engineering".to_string()),
            mail_enabled: Some(false),
            mail_nickname: Some("engineering".to_string()),
            security_enabled: Some(true),
            ..Default::default()
        };

        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["displayName"], "Engineering");
        assert_eq!(json["mailNickname"], "engineering");
        assert_eq!(json["securityEnabled"], true);
        assert!(json.get("id").is_none());
        assert!(json.get("description").is_none());
        assert!(json.get("members@odata.bind").is_none());
    }

    #[test]
    fn test_group_deserializes_graph_response() {
        let json = serde_json::json!({
            "@odata.context": "https://graph.microsoft.com/beta/$metadata#groups/$entity",
            "id": "02bd9fd6-8f93-4758-87c3-1fb73740a315",
            "createdDateTime": "2017-07-31T18:56:16Z",
            "description": "Welcome to the HR Taskforce team.",
            "displayName": "HR Taskforce",
            "groupTypes": ["Unified"],
            "mail": "HRTaskforce@contoso.com",
            "mailEnabled": true,
            "mailNickname": "HRTaskforce",
            "securityEnabled": false,
            "visibility": "Private",
            "proxyAddresses": ["SMTP:HRTaskforce@contoso.com"]
        });

        let group: Group = serde_json::from_value(json).unwrap();
        assert_eq!(
            group.id.as_deref(),
            Some("02bd9fd6-8f93-4758-87c3-1fb73740a315")
        );
        assert_eq!(group.visibility, Some(GroupVisibility::Private));
        assert!(group.created_date_time.is_some());
        assert!(group.is_microsoft365());
        assert!(!group.is_dynamic());
    }

    #[test]
    fn test_append_member_and_owner() {
        let mut group = Group::default();
        group.append_member("https://graph.microsoft.com/", ApiVersion::Beta, "user-1");
        group.append_member("https://graph.microsoft.com", ApiVersion::Beta, "user-2");
        group.append_owner("https://graph.microsoft.com", ApiVersion::V1, "owner-1");

        assert_eq!(
            group.members,
            Some(vec![
                "https://graph.microsoft.com/beta/directoryObjects/user-1".to_string(),
                "https://graph.microsoft.com/beta/directoryObjects/user-2".to_string(),
            ])
        );
        assert_eq!(
            group.owners,
            Some(vec![
                "https://graph.microsoft.com/v1.0/directoryObjects/owner-1".to_string()
            ])
        );

        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["members@odata.bind"].as_array().unwrap().len(), 2);
        assert_eq!(json["owners@odata.bind"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_dynamic_group_detection() {
        let group = Group {
            group_types: Some(vec![GROUP_TYPE_DYNAMIC_MEMBERSHIP.to_string()]),
            membership_rule: Some("user.department -eq \"Sales\"".to_string()),
            ..Default::default()
        };

        assert!(group.is_dynamic());
        assert!(!group.is_microsoft365());
    }

    #[test]
    fn test_directory_object_link_parsing() {
        let json = r##"{
            "@odata.context": "https://graph.microsoft.com/beta/$metadata#directoryObjects/$entity",
            "@odata.type": "#microsoft.graph.user",
            "id": "user-1",
            "url": "https://graph.microsoft.com/v2/tenant/directoryObjects/user-1/Microsoft.DirectoryServices.User"
        }"##;

        let link: DirectoryObjectLink = serde_json::from_str(json).unwrap();
        assert_eq!(link.id, "user-1");
        assert_eq!(link.odata_type.as_deref(), Some("#microsoft.graph.user"));
        assert!(link.url.is_some());
    }
}
