//! Wire models for the compute API

use compute_smoke_common::ServerStatus;
use serde::{Deserialize, Deserializer, Serialize};

/// A status code paired with a decoded body
///
/// Every successful client call yields one of these so callers can assert on
/// the exact status (200 vs 202 vs 204) the backend chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn new(status: u16, body: T) -> Self {
        Self { status, body }
    }

    /// Transform the body, keeping the status
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            status: self.status,
            body: f(self.body),
        }
    }
}

/// A security group as returned by the backend
///
/// Identity is `id`; `name` and `description` are stored byte-for-byte,
/// whitespace included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub rules: Vec<serde_json::Value>,
}

/// Reference to a security group attached to a server (by name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRef {
    pub name: String,
}

/// A server instance as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInstance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status: ServerStatus,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupRef>,
}

impl ServerInstance {
    /// Check whether a group with this exact name is attached
    pub fn has_security_group(&self, name: &str) -> bool {
        self.security_groups.iter().any(|g| g.name == name)
    }
}

/// Server summary as returned by the list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Parameters for booting a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    #[serde(rename = "imageRef")]
    pub image_ref: String,
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
}

impl CreateServerRequest {
    pub fn new(
        name: impl Into<String>,
        image_ref: impl Into<String>,
        flavor_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image_ref: image_ref.into(),
            flavor_ref: flavor_ref.into(),
        }
    }
}

/// Reboot flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RebootType {
    Soft,
    Hard,
}

/// Accept ids encoded either as strings or integers (legacy backends)
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
