use serde::Deserialize;
use std::net::Ipv4Addr;

use crate::model::{DEFAULT_SSH_PORT, Server, ServerType};
use crate::validation::ValidationError;

/// Server fields as submitted by the registration/edit form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInput {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub ssh_username: String,
    #[serde(default)]
    pub ssh_password: String,
    #[serde(default = "default_port")]
    pub port: i64,
    #[serde(default)]
    pub origin_ip_with_port: String,
    #[serde(default)]
    pub server_type: ServerType,
    #[serde(default)]
    pub parent_server_id: Option<String>,
}

fn default_port() -> i64 {
    DEFAULT_SSH_PORT as i64
}

impl ServerInput {
    /// Field checks. `require_password` is false on edits, where an empty
    /// password keeps the stored one.
    pub fn validate(&self, require_password: bool) -> Result<(), ValidationError> {
        check_display_name(self.display_name.trim())?;
        check_ip(self.ip_address.trim(), "ipAddress")?;
        check_username(self.ssh_username.trim())?;
        if require_password || !self.ssh_password.is_empty() {
            check_password(&self.ssh_password)?;
        }
        check_port(self.port, "port")?;
        check_ip_with_port(self.origin_ip_with_port.trim())?;
        Ok(())
    }

    fn parent(&self) -> Option<String> {
        self.parent_server_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
    }

    /// Build a new record. Call [`ServerInput::validate`] first.
    pub fn into_server(self, id: String, created_at: String) -> Server {
        let parent_server_id = self.parent();
        Server {
            id,
            display_name: self.display_name.trim().to_string(),
            ip_address: self.ip_address.trim().to_string(),
            ssh_username: self.ssh_username.trim().to_string(),
            ssh_password: self.ssh_password,
            port: self.port as u16,
            origin_ip_with_port: self.origin_ip_with_port.trim().to_string(),
            created_at,
            server_type: self.server_type,
            parent_server_id,
            status: None,
            last_checked: None,
        }
    }

    /// Apply an edit on top of `existing`, keeping identity and health data.
    pub fn apply_to(self, existing: &Server) -> Server {
        let ssh_password = if self.ssh_password.is_empty() {
            existing.ssh_password.clone()
        } else {
            self.ssh_password.clone()
        };
        let mut server = self.into_server(existing.id.clone(), existing.created_at.clone());
        server.ssh_password = ssh_password;
        server.status = existing.status;
        server.last_checked = existing.last_checked.clone();
        server
    }
}

fn check_display_name(value: &str) -> Result<(), ValidationError> {
    let field = "displayName";
    let len = value.chars().count();
    if len == 0 {
        return Err(ValidationError::new(field, "Display name is required"));
    }
    if len < 3 {
        return Err(ValidationError::new(field, "Display name must be at least 3 characters"));
    }
    if len > 50 {
        return Err(ValidationError::new(field, "Display name must be at most 50 characters"));
    }
    Ok(())
}

fn check_ip(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(field, "IP address is required"));
    }
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new(field, "Invalid IP address format"))
}

fn check_username(value: &str) -> Result<(), ValidationError> {
    let field = "sshUsername";
    let len = value.chars().count();
    if len == 0 {
        return Err(ValidationError::new(field, "SSH username is required"));
    }
    if len < 3 {
        return Err(ValidationError::new(field, "SSH username must be at least 3 characters"));
    }
    if len > 32 {
        return Err(ValidationError::new(field, "SSH username must be at most 32 characters"));
    }

    // [a-z_][a-z0-9_-]*[$]?
    let body = value.strip_suffix('$').unwrap_or(value);
    let mut chars = body.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !first_ok || !rest_ok {
        return Err(ValidationError::new(field, "Invalid SSH username format"));
    }
    Ok(())
}

fn check_password(value: &str) -> Result<(), ValidationError> {
    let field = "sshPassword";
    let len = value.chars().count();
    if len == 0 {
        return Err(ValidationError::new(field, "SSH password is required"));
    }
    if len < 8 {
        return Err(ValidationError::new(field, "Password must be at least 8 characters"));
    }
    if len > 128 {
        return Err(ValidationError::new(field, "Password must be at most 128 characters"));
    }
    let lower = value.chars().any(|c| c.is_ascii_lowercase());
    let upper = value.chars().any(|c| c.is_ascii_uppercase());
    let digit = value.chars().any(|c| c.is_ascii_digit());
    if !(lower && upper && digit) {
        return Err(ValidationError::new(
            field,
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        ));
    }
    Ok(())
}

fn check_port(value: i64, field: &'static str) -> Result<(), ValidationError> {
    if !(1..=65535).contains(&value) {
        return Err(ValidationError::new(field, "Port must be between 1 and 65535"));
    }
    Ok(())
}

fn check_ip_with_port(value: &str) -> Result<(), ValidationError> {
    let field = "originIpWithPort";
    if value.is_empty() {
        return Err(ValidationError::new(field, "Origin IP with port is required"));
    }
    let invalid = || {
        ValidationError::new(
            field,
            "Invalid format. Expected: IP:Port (e.g., 192.168.1.1:8080)",
        )
    };
    let (ip, port) = value.split_once(':').ok_or_else(invalid)?;
    check_ip(ip, field).map_err(|_| invalid())?;
    let port: i64 = port.parse().map_err(|_| invalid())?;
    check_port(port, field)
        .map_err(|_| ValidationError::new(field, "Origin port must be between 1 and 65535"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServerStatus;

    fn input() -> ServerInput {
        ServerInput {
            display_name: "BSNL Vijayawada".to_string(),
            ip_address: "169.254.86.100".to_string(),
            ssh_username: "streamer".to_string(),
            ssh_password: "Stream3rPass".to_string(),
            port: 22,
            origin_ip_with_port: "10.0.0.5:1935".to_string(),
            server_type: ServerType::Origin,
            parent_server_id: None,
        }
    }

    fn field_of(input: &ServerInput) -> &'static str {
        input.validate(true).unwrap_err().field
    }

    #[test]
    fn test_valid_input() {
        assert!(input().validate(true).is_ok());
    }

    #[test]
    fn test_field_errors() {
        let mut i = input();
        i.display_name = "ab".into();
        assert_eq!(field_of(&i), "displayName");

        let mut i = input();
        i.ip_address = "300.1.1.1".into();
        assert_eq!(field_of(&i), "ipAddress");

        let mut i = input();
        i.ssh_username = "Root".into();
        assert_eq!(field_of(&i), "sshUsername");

        let mut i = input();
        i.ssh_password = "alllowercase1".into();
        assert_eq!(field_of(&i), "sshPassword");

        let mut i = input();
        i.port = 70000;
        assert_eq!(field_of(&i), "port");

        let mut i = input();
        i.origin_ip_with_port = "10.0.0.5".into();
        assert_eq!(field_of(&i), "originIpWithPort");

        let mut i = input();
        i.origin_ip_with_port = "10.0.0.5:0".into();
        assert_eq!(field_of(&i), "originIpWithPort");
    }

    #[test]
    fn test_username_format() {
        for (name, ok) in [("ulka_admin", true), ("_svc", true), ("deploy$", true), ("9lives", false), ("a.b.c", false)] {
            assert_eq!(check_username(name).is_ok(), ok, "{name}");
        }
    }

    #[test]
    fn test_password_optional_on_edit() {
        let mut i = input();
        i.ssh_password.clear();
        assert!(i.validate(false).is_ok());
        assert!(i.validate(true).is_err());
    }

    #[test]
    fn test_apply_keeps_identity_and_password() {
        let mut existing = input().into_server("s1".into(), "2026-01-01T00:00:00Z".into());
        existing.status = Some(ServerStatus::Online);

        let mut edit = input();
        edit.display_name = "Renamed".into();
        edit.ssh_password.clear();
        edit.parent_server_id = Some("  ".into());
        let updated = edit.apply_to(&existing);

        assert_eq!(updated.id, "s1");
        assert_eq!(updated.created_at, "2026-01-01T00:00:00Z");
        assert_eq!(updated.display_name, "Renamed");
        assert_eq!(updated.ssh_password, "Stream3rPass");
        assert_eq!(updated.status, Some(ServerStatus::Online));
        assert!(updated.parent_server_id.is_none());
    }
}
