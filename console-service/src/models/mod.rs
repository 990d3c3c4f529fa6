use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored upstream-platform credential plus display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub api_key: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_email: Option<String>,
    pub created_at: i64,
}

/// Trimmed view of an upstream service, the unit the cache stores.
///
/// Everything past `id`/`name` is passed through for display; only the
/// account attribution and the sort keys matter to this layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub auto_deploy: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub suspended: Option<String>,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub account_name: String,
}

impl ServiceSummary {
    /// Build a summary from one element of the upstream services page
    /// (`{cursor, service: {...}}`). Items without a `service` object
    /// or an id/name are dropped.
    pub fn from_page_item(item: &Value) -> Option<Self> {
        let service = item.get("service")?;
        let details = service.get("serviceDetails");

        let str_field = |v: &Value, key: &str| {
            v.get(key)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };

        Some(ServiceSummary {
            id: str_field(service, "id")?,
            name: str_field(service, "name")?,
            service_type: str_field(service, "type"),
            auto_deploy: str_field(service, "autoDeploy"),
            created_at: str_field(service, "createdAt"),
            updated_at: str_field(service, "updatedAt"),
            suspended: str_field(service, "suspended"),
            dashboard_url: str_field(service, "dashboardUrl"),
            url: details.and_then(|d| str_field(d, "url")),
            region: details.and_then(|d| str_field(d, "region")),
            plan: details.and_then(|d| str_field(d, "plan")),
            env: details.and_then(|d| str_field(d, "env")),
            image_path: str_field(service, "imagePath"),
            owner_id: str_field(service, "ownerId"),
            account_id: String::new(),
            account_name: String::new(),
        })
    }
}

/// Identity behind an API key, as reported by the upstream owners probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerInfo {
    pub owner_id: String,
    pub owner_email: String,
    pub owner_name: String,
    pub owner_type: String,
}
