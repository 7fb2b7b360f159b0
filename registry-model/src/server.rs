//! Normalized server record and its nested shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote transport type for endpoints that speak streamable HTTP.
pub const TRANSPORT_STREAMABLE_HTTP: &str = "streamable-http";
/// Remote transport type for server-sent-events endpoints.
pub const TRANSPORT_SSE: &str = "sse";
/// Package transport type for servers launched as a local process.
pub const TRANSPORT_STDIO: &str = "stdio";

/// A normalized MCP server version.
///
/// Names are opaque and may contain forward slashes; comparisons are
/// byte-exact. Versions are opaque strings per the upstream's versioning.
/// Fields the registry publishes but RAGMap does not interpret land in
/// `extra` and round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<RemoteEndpoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageRef>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ServerRecord {
    /// Deserializes a raw upstream `server` object, lifting nested fields
    /// RAGMap normalizes: `repository.url` becomes `repository_url` when the
    /// record carries no flat url. The nested object stays in `extra` so the
    /// payload round-trips.
    pub fn from_upstream_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut record: ServerRecord = serde_json::from_value(value)?;
        if record.repository_url.is_none() {
            record.repository_url = record
                .extra
                .get("repository")
                .and_then(|r| r.get("url"))
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .map(str::to_string);
        }
        Ok(record)
    }
}

/// A remote endpoint advertised by a server version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEndpoint {
    /// Transport type, `streamable-http` or `sse`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<RemoteHeader>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A header a remote endpoint expects from connecting clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHeader {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// An installable package reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRef {
    #[serde(default)]
    pub registry_type: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<PackageTransport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_arguments: Vec<PackageArgument>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Transport a package speaks once launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageTransport {
    /// `stdio` or `streamable-http`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A launch argument declared by a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageArgument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The single URL a reachability probe would target for this record:
/// the first `streamable-http` remote, else the first `streamable-http`
/// package transport. `None` when the server has no probeable endpoint.
pub fn probe_url(server: &ServerRecord) -> Option<&str> {
    server
        .remotes
        .iter()
        .find(|r| r.kind == TRANSPORT_STREAMABLE_HTTP && !r.url.is_empty())
        .map(|r| r.url.as_str())
        .or_else(|| {
            server.packages.iter().find_map(|p| {
                p.transport
                    .as_ref()
                    .filter(|t| t.kind == TRANSPORT_STREAMABLE_HTTP)
                    .and_then(|t| t.url.as_deref())
                    .filter(|u| !u.is_empty())
            })
        })
}
