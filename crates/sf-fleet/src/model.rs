use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::ssh::{Credential, SshTarget};

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_PLAYLIST_CACHING_INTERVAL: &str = "2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    #[default]
    Origin,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
    Error,
}

/// A registered streaming server (origin or edge).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub display_name: String,
    pub ip_address: String,
    pub ssh_username: String,
    #[serde(default)]
    pub ssh_password: String,
    /// SSH port.
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Address this server forwards its output to, as `ip:port`.
    pub origin_ip_with_port: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub server_type: ServerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Server {
    /// IP portion of `originIpWithPort`.
    pub fn origin_ip(&self) -> &str {
        origin_ip(&self.origin_ip_with_port)
    }

    pub fn ssh_target(&self) -> SshTarget {
        SshTarget {
            host: self.ip_address.clone(),
            port: self.port,
            username: self.ssh_username.clone(),
            credential: Credential::Password(self.ssh_password.clone()),
        }
    }

    /// Denormalized copy stored inside assignments.
    pub fn snapshot(&self) -> ServerRef {
        ServerRef {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            ip_address: self.ip_address.clone(),
            port: self.port,
            origin_ip_with_port: self.origin_ip_with_port.clone(),
        }
    }

    /// Copy safe to hand out over the API.
    pub fn redacted(&self) -> Server {
        Server {
            ssh_password: String::new(),
            ..self.clone()
        }
    }
}

/// First `:`-separated segment of an `ip:port` string.
pub fn origin_ip(ip_with_port: &str) -> &str {
    ip_with_port.split(':').next().unwrap_or_default()
}

/// Server snapshot embedded in a [`RouteServerAssignment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRef {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub origin_ip_with_port: String,
}

/// Stream type served by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamType {
    Dash,
    Hls,
    Cmaf,
}

impl StreamType {
    pub const ALL: [StreamType; 3] = [StreamType::Dash, StreamType::Hls, StreamType::Cmaf];

    pub fn as_str(self) -> &'static str {
        match self {
            StreamType::Dash => "DASH",
            StreamType::Hls => "HLS",
            StreamType::Cmaf => "CMAF",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown stream type: {s}"))
    }
}

/// A path → origin mapping, as found in the remote rules file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub origin_path: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub use_ssl: bool,
    #[serde(default = "default_caching_interval", deserialize_with = "lenient_string")]
    pub playlist_caching_interval: String,
    /// Fields of the rules file this service does not interpret (host, geo, range...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_caching_interval() -> String {
    DEFAULT_PLAYLIST_CACHING_INTERVAL.to_string()
}

impl Route {
    /// Full URL an assignment for this route must point to.
    pub fn origin_url(&self) -> String {
        format!("{}{}", self.origin, self.origin_path)
    }
}

/// The rules file stores booleans as strings.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => Ok(matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")),
        Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!("expected boolean, got {other}"))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(default_caching_interval()),
        other => Err(serde::de::Error::custom(format!("expected string, got {other}"))),
    }
}

/// A route bound to the servers responsible for serving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteServerAssignment {
    pub id: String,
    #[serde(default)]
    pub priority: i64,
    pub route_kind: StreamType,
    pub from: String,
    pub to: String,
    pub servers: Vec<ServerRef>,
}

/// Assignment as submitted by a client, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub route_kind: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub servers: Option<Vec<ServerRef>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_json_is_camel_case() {
        let server: Server = serde_json::from_value(json!({
            "id": "s1",
            "displayName": "Edge Kolkata",
            "ipAddress": "173.26.147.14",
            "sshUsername": "streamer",
            "sshPassword": "Secret123",
            "originIpWithPort": "10.0.0.5:1935",
            "serverType": "edge",
            "parentServerId": "s0"
        }))
        .unwrap();

        assert_eq!(server.port, 22);
        assert_eq!(server.server_type, ServerType::Edge);
        assert_eq!(server.origin_ip(), "10.0.0.5");
        assert!(server.status.is_none());

        let value = serde_json::to_value(server.redacted()).unwrap();
        assert_eq!(value["sshPassword"], "");
        assert_eq!(value["parentServerId"], "s0");
        assert!(value.get("lastChecked").is_none());
    }

    #[test]
    fn test_origin_ip_without_port() {
        assert_eq!(origin_ip("10.0.0.5"), "10.0.0.5");
        assert_eq!(origin_ip(""), "");
    }

    #[test]
    fn test_route_from_rules_file() {
        let route: Route = serde_json::from_value(json!({
            "host": "",
            "path": "/live/x",
            "origin": "rtmp://10.0.0.5:1935",
            "origin_path": "/live/x",
            "use_ssl": "false",
            "geo": "",
            "range": "",
            "playlist_caching_interval": 4
        }))
        .unwrap();

        assert!(!route.use_ssl);
        assert_eq!(route.playlist_caching_interval, "4");
        assert_eq!(route.origin_url(), "rtmp://10.0.0.5:1935/live/x");
        assert_eq!(route.extra.get("geo"), Some(&json!("")));

        let back = serde_json::to_value(&route).unwrap();
        assert_eq!(back["host"], "");
        assert!(back.get("id").is_none());
    }

    #[test]
    fn test_stream_type_parse() {
        assert_eq!("HLS".parse::<StreamType>(), Ok(StreamType::Hls));
        assert!("hls".parse::<StreamType>().is_err());
        assert_eq!(serde_json::to_value(StreamType::Cmaf).unwrap(), json!("CMAF"));
    }
}
