//! Copy-ready install projections for a latest catalog entry.

use regex::Regex;
use registry_model::{CatalogEntry, PackageRef, RemoteEndpoint, TRANSPORT_STDIO, TRANSPORT_STREAMABLE_HTTP};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

static SECRET_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)authorization|token|secret|password|api[-_]?key")
        .unwrap_or_else(|e| panic!("invalid secret header pattern: {e}"))
});

/// Placeholder for header values the operator must fill in with a secret.
const SECRET_PLACEHOLDER: &str = "<set-secret>";
const VALUE_PLACEHOLDER: &str = "<set-value>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportSummary {
    Stdio,
    Remote,
    Hybrid,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportAvailability {
    pub summary: TransportSummary,
    pub has_stdio: bool,
    pub has_remote: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StdioInstall {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallHeader {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub is_secret: bool,
    /// Sanitized placeholder, never a real value.
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteInstall {
    pub url: String,
    pub headers: Vec<InstallHeader>,
}

/// Pretty-printed host-config JSON, one shape per available transport.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallConfigs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdio: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallProjection {
    pub name: String,
    pub version: String,
    pub transport: TransportAvailability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdio: Option<StdioInstall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteInstall>,
    pub configs: InstallConfigs,
}

/// Derives the install projection for a latest entry.
pub fn project_install(entry: &CatalogEntry) -> InstallProjection {
    let stdio = stdio_package(&entry.server.packages).map(derive_stdio);
    let remote = entry
        .server
        .remotes
        .iter()
        .find(|r| r.kind == TRANSPORT_STREAMABLE_HTTP && !r.url.is_empty())
        .map(derive_remote);

    let summary = match (&stdio, &remote) {
        (Some(_), Some(_)) => TransportSummary::Hybrid,
        (Some(_), None) => TransportSummary::Stdio,
        (None, Some(_)) => TransportSummary::Remote,
        (None, None) => TransportSummary::Unknown,
    };

    let config_id = config_key(entry.name());
    let configs = InstallConfigs {
        remote: remote.as_ref().map(|r| remote_config(&config_id, r)),
        stdio: stdio.as_ref().map(|s| stdio_config(&config_id, s)),
    };

    InstallProjection {
        name: entry.name().to_string(),
        version: entry.version().to_string(),
        transport: TransportAvailability {
            summary,
            has_stdio: stdio.is_some(),
            has_remote: remote.is_some(),
        },
        stdio,
        remote,
        configs,
    }
}

/// The stdio-capable package: an explicit stdio transport wins, else the
/// first package that is not remote-only.
fn stdio_package(packages: &[PackageRef]) -> Option<&PackageRef> {
    packages
        .iter()
        .find(|p| {
            p.transport
                .as_ref()
                .is_some_and(|t| t.kind == TRANSPORT_STDIO)
        })
        .or_else(|| {
            packages.iter().find(|p| {
                p.transport
                    .as_ref()
                    .map(|t| t.kind != TRANSPORT_STREAMABLE_HTTP)
                    .unwrap_or(true)
            })
        })
}

enum VersionSuffix {
    /// `@<version>` (npm/npx).
    At,
    /// `==<version>` (uvx, pipx).
    Eq,
}

fn derive_stdio(package: &PackageRef) -> StdioInstall {
    let registry = package.registry_type.to_ascii_lowercase();
    let hint = package.runtime_hint.as_deref().unwrap_or("");

    let (command, mut args, suffix) = if hint == "uvx" || registry == "pypi" || registry == "python"
    {
        ("uvx", Vec::new(), VersionSuffix::Eq)
    } else if hint == "pipx" {
        ("pipx", vec!["run".to_string()], VersionSuffix::Eq)
    } else {
        ("npx", vec!["-y".to_string()], VersionSuffix::At)
    };

    let mut identifier = package.identifier.clone();
    if let Some(version) = package.version.as_deref().filter(|v| !v.is_empty()) {
        let already_versioned = match suffix {
            // Scoped npm names start with '@'; only a later '@' pins a version.
            VersionSuffix::At => identifier.rfind('@').is_some_and(|i| i > 0),
            VersionSuffix::Eq => identifier.contains("=="),
        };
        if !already_versioned {
            match suffix {
                VersionSuffix::At => identifier.push_str(&format!("@{version}")),
                VersionSuffix::Eq => identifier.push_str(&format!("=={version}")),
            }
        }
    }
    args.push(identifier);

    for argument in &package.package_arguments {
        if argument.kind.as_deref() == Some("positional") {
            if let Some(value) = argument.value.as_deref().filter(|v| !v.is_empty()) {
                args.push(value.to_string());
            }
        }
    }

    StdioInstall {
        command: command.to_string(),
        args,
    }
}

fn derive_remote(remote: &RemoteEndpoint) -> RemoteInstall {
    let headers = remote
        .headers
        .iter()
        .map(|h| {
            let secret = h.is_secret || SECRET_HEADER_RE.is_match(&h.name);
            InstallHeader {
                name: h.name.clone(),
                description: h.description.clone(),
                required: h.required,
                is_secret: secret,
                value: if secret {
                    SECRET_PLACEHOLDER.to_string()
                } else {
                    VALUE_PLACEHOLDER.to_string()
                },
            }
        })
        .collect();
    RemoteInstall {
        url: remote.url.clone(),
        headers,
    }
}

/// Host-config key: the server name with anything outside
/// `[A-Za-z0-9_.-]` replaced by `_`.
fn config_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn remote_config(id: &str, remote: &RemoteInstall) -> String {
    let mut headers = Map::new();
    for header in &remote.headers {
        headers.insert(header.name.clone(), Value::String(header.value.clone()));
    }
    pretty(json!({
        "mcpServers": {
            id: {
                "transport": TRANSPORT_STREAMABLE_HTTP,
                "url": remote.url,
                "headers": headers,
            }
        }
    }))
}

fn stdio_config(id: &str, stdio: &StdioInstall) -> String {
    pretty(json!({
        "mcpServers": {
            id: {
                "command": stdio.command,
                "args": stdio.args,
            }
        }
    }))
}

fn pretty(value: Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_model::{
        OfficialMeta, PackageTransport, RagEnrichment, RemoteHeader, ServerRecord,
    };
    use serde_json::json;

    fn entry_with(server: ServerRecord) -> CatalogEntry {
        CatalogEntry {
            server,
            official: OfficialMeta(json!({ "isLatest": true })),
            publisher_provided: None,
            ragmap: RagEnrichment {
                embedding_text_hash: "h".into(),
                ..Default::default()
            },
        }
    }

    fn npm_stdio_server() -> ServerRecord {
        ServerRecord {
            name: "acme/installable".into(),
            version: "1.2.3".into(),
            description: None,
            title: None,
            repository_url: None,
            website_url: None,
            remotes: Vec::new(),
            packages: vec![PackageRef {
                registry_type: "npm".into(),
                identifier: "@example/installable-mcp".into(),
                version: Some("1.2.3".into()),
                runtime_hint: Some("npx".into()),
                transport: Some(PackageTransport {
                    kind: "stdio".into(),
                    url: None,
                    extra: serde_json::Map::new(),
                }),
                package_arguments: Vec::new(),
                extra: serde_json::Map::new(),
            }],
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn npm_stdio_projection() {
        let projection = project_install(&entry_with(npm_stdio_server()));

        assert!(projection.transport.has_stdio);
        assert_eq!(projection.transport.summary, TransportSummary::Stdio);
        let stdio = projection.stdio.unwrap();
        assert_eq!(stdio.command, "npx");
        assert_eq!(stdio.args, ["-y", "@example/installable-mcp@1.2.3"]);
        let config = projection.configs.stdio.unwrap();
        assert!(config.contains("\"mcpServers\""));
        assert!(config.contains("@example/installable-mcp@1.2.3"));
    }

    #[test]
    fn pypi_packages_use_uvx_with_eq_suffix() {
        let mut server = npm_stdio_server();
        server.packages[0].registry_type = "pypi".into();
        server.packages[0].identifier = "acme-mcp".into();
        server.packages[0].runtime_hint = None;

        let stdio = project_install(&entry_with(server)).stdio.unwrap();
        assert_eq!(stdio.command, "uvx");
        assert_eq!(stdio.args, ["acme-mcp==1.2.3"]);
    }

    #[test]
    fn already_versioned_identifiers_keep_their_pin() {
        let mut server = npm_stdio_server();
        server.packages[0].identifier = "@example/installable-mcp@2.0.0".into();

        let stdio = project_install(&entry_with(server)).stdio.unwrap();
        assert_eq!(stdio.args, ["-y", "@example/installable-mcp@2.0.0"]);
    }

    #[test]
    fn positional_arguments_append_in_order() {
        let mut server = npm_stdio_server();
        server.packages[0].package_arguments = vec![
            registry_model::PackageArgument {
                kind: Some("positional".into()),
                value: Some("--root".into()),
                extra: serde_json::Map::new(),
            },
            registry_model::PackageArgument {
                kind: Some("named".into()),
                value: Some("ignored".into()),
                extra: serde_json::Map::new(),
            },
        ];

        let stdio = project_install(&entry_with(server)).stdio.unwrap();
        assert_eq!(stdio.args, ["-y", "@example/installable-mcp@1.2.3", "--root"]);
    }

    #[test]
    fn remote_headers_are_sanitized() {
        let mut server = npm_stdio_server();
        server.packages.clear();
        server.remotes = vec![RemoteEndpoint {
            kind: "streamable-http".into(),
            url: "https://mcp.acme.example".into(),
            headers: vec![
                RemoteHeader {
                    name: "X-Api-Key".into(),
                    description: None,
                    is_secret: false,
                    required: true,
                    extra: serde_json::Map::new(),
                },
                RemoteHeader {
                    name: "X-Tenant".into(),
                    description: Some("tenant id".into()),
                    is_secret: false,
                    required: false,
                    extra: serde_json::Map::new(),
                },
            ],
            extra: serde_json::Map::new(),
        }];

        let projection = project_install(&entry_with(server));
        assert_eq!(projection.transport.summary, TransportSummary::Remote);
        let remote = projection.remote.unwrap();
        assert_eq!(remote.headers[0].value, "<set-secret>");
        assert!(remote.headers[0].is_secret);
        assert_eq!(remote.headers[1].value, "<set-value>");
        let config = projection.configs.remote.unwrap();
        assert!(config.contains("streamable-http"));
        assert!(!config.contains("hunter2"));
    }

    #[test]
    fn config_key_replaces_disallowed_characters() {
        assert_eq!(config_key("acme/search v2"), "acme_search_v2");
        assert_eq!(config_key("io.github.acme-x_1"), "io.github.acme-x_1");
    }
}
