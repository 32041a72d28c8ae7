use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration principale chargée depuis les variables d'environnement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Port de l'API de gestion
    pub api_port: u16,
    /// Répertoire des fichiers JSON (servers, route-servers, routes)
    pub data_dir: PathBuf,
    /// Chemin du frontend buildé
    pub web_dist_path: PathBuf,
    /// Service de streaming géré sur les machines distantes
    pub service_name: String,
    /// Commande lancée après chaque écriture de config distante
    pub reload_command: String,
    /// Répertoire distant des fichiers de route poussés par serveur
    pub route_config_dir: String,
    /// Délai max pour établir une session SSH
    pub ssh_ready_timeout_ms: u64,
    /// Hôte qui porte le fichier de règles (SyncResponse)
    pub rules_host: Option<String>,
    pub rules_port: u16,
    pub rules_user: Option<String>,
    #[serde(skip_serializing)]
    pub rules_password: Option<String>,
    pub rules_path: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            api_port: 4000,
            data_dir: PathBuf::from("./data"),
            web_dist_path: PathBuf::from("./web/dist"),
            service_name: "nimble".to_string(),
            reload_command: "systemctl reload nimble".to_string(),
            route_config_dir: "/etc/nimble/routes.d".to_string(),
            ssh_ready_timeout_ms: 5000,
            rules_host: None,
            rules_port: 22,
            rules_user: None,
            rules_password: None,
            rules_path: "/etc/nimble/rules.conf".to_string(),
        }
    }
}

impl EnvConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applique les surcharges fournies par `lookup` sur les valeurs par défaut
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("SF_API_PORT") {
            if let Ok(port) = v.parse() {
                config.api_port = port;
            }
        }
        if let Some(v) = lookup("SF_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SF_WEB_DIST") {
            config.web_dist_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SF_SERVICE_NAME") {
            config.service_name = v;
        }
        if let Some(v) = lookup("SF_RELOAD_COMMAND") {
            config.reload_command = v;
        }
        if let Some(v) = lookup("SF_ROUTE_CONFIG_DIR") {
            config.route_config_dir = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("SF_SSH_READY_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                config.ssh_ready_timeout_ms = ms;
            }
        }
        if let Some(v) = lookup("SF_RULES_HOST") {
            if !v.is_empty() {
                config.rules_host = Some(v);
            }
        }
        if let Some(v) = lookup("SF_RULES_PORT") {
            if let Ok(port) = v.parse() {
                config.rules_port = port;
            }
        }
        if let Some(v) = lookup("SF_RULES_USER") {
            config.rules_user = Some(v);
        }
        if let Some(v) = lookup("SF_RULES_PASSWORD") {
            config.rules_password = Some(v);
        }
        if let Some(v) = lookup("SF_RULES_PATH") {
            config.rules_path = v;
        }

        config
    }

    /// Charge le fichier .env puis les variables d'environnement.
    /// Une variable déjà définie dans l'environnement l'emporte sur le fichier.
    pub fn load(env_file: Option<&Path>) -> Self {
        let path = env_file.unwrap_or(Path::new(".env"));
        let file_vars: HashMap<String, String> = match std::fs::read_to_string(path) {
            Ok(content) => {
                let vars: HashMap<_, _> = parse_dotenv(&content).into_iter().collect();
                debug!("Loaded {} variable(s) from {}", vars.len(), path.display());
                vars
            }
            Err(_) => HashMap::new(),
        };

        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    pub fn servers_file(&self) -> PathBuf {
        self.data_dir.join("servers.json")
    }

    pub fn assignments_file(&self) -> PathBuf {
        self.data_dir.join("route-servers.json")
    }

    pub fn routes_file(&self) -> PathBuf {
        self.data_dir.join("routes.json")
    }
}

/// Parse un fichier .env basique (KEY=VALUE par ligne)
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut vars = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !key.is_empty() {
                vars.push((key.to_string(), value.to_string()));
            }
        }
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = EnvConfig::from_lookup(|_| None);
        assert_eq!(config.api_port, 4000);
        assert_eq!(config.service_name, "nimble");
        assert_eq!(config.reload_command, "systemctl reload nimble");
        assert_eq!(config.ssh_ready_timeout_ms, 5000);
        assert!(config.rules_host.is_none());
        assert_eq!(config.servers_file(), PathBuf::from("./data/servers.json"));
    }

    #[test]
    fn test_overrides_applied() {
        let config = EnvConfig::from_lookup(lookup_from(&[
            ("SF_API_PORT", "8080"),
            ("SF_DATA_DIR", "/srv/fleet"),
            ("SF_ROUTE_CONFIG_DIR", "/opt/nimble/routes.d/"),
            ("SF_RULES_HOST", "10.1.1.1"),
            ("SF_RULES_PORT", "9229"),
            ("SF_RULES_USER", "streamer"),
        ]));
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.assignments_file(), PathBuf::from("/srv/fleet/route-servers.json"));
        assert_eq!(config.route_config_dir, "/opt/nimble/routes.d");
        assert_eq!(config.rules_host.as_deref(), Some("10.1.1.1"));
        assert_eq!(config.rules_port, 9229);
        assert_eq!(config.rules_user.as_deref(), Some("streamer"));
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let config = EnvConfig::from_lookup(lookup_from(&[
            ("SF_API_PORT", "not-a-port"),
            ("SF_SSH_READY_TIMEOUT_MS", "-3"),
            ("SF_RULES_HOST", ""),
        ]));
        assert_eq!(config.api_port, 4000);
        assert_eq!(config.ssh_ready_timeout_ms, 5000);
        assert!(config.rules_host.is_none());
    }

    #[test]
    fn test_parse_dotenv() {
        let vars = parse_dotenv(
            "# comment\n\nSF_API_PORT=5000\nSF_RULES_PASSWORD=\"s3cret=1\"\nbroken line\n",
        );
        assert_eq!(
            vars,
            vec![
                ("SF_API_PORT".to_string(), "5000".to_string()),
                ("SF_RULES_PASSWORD".to_string(), "s3cret=1".to_string()),
            ]
        );
    }

    #[test]
    fn test_password_not_serialized() {
        let config = EnvConfig {
            rules_password: Some("hunter2".to_string()),
            ..EnvConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_load_reads_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.env");
        std::fs::write(&path, "# fleet\nSF_RULES_PATH=/opt/nimble/rules.conf\n").unwrap();

        let config = EnvConfig::load(Some(&path));
        assert_eq!(config.rules_path, "/opt/nimble/rules.conf");
    }
}
