use crate::models::HostDescriptor;
use async_trait::async_trait;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid server list {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {key}: {message}")]
    InvalidSetting { key: &'static str, message: String },
}

/// Where the list of monitored hosts comes from. Read once at startup.
#[async_trait]
pub trait HostSource: Send + Sync {
    async fn load(&self) -> Result<Vec<HostDescriptor>, ConfigError>;
}

/// Server list stored in a JSON (default) or YAML file.
///
/// ```json
/// [
///   { "host": "192.168.1.10", "port": 22, "username": "root", "password": "..." },
///   { "host": "db.lan", "username": "ops", "identity_file": "/home/ops/.ssh/id_ed25519" }
/// ]
/// ```
pub struct FileHostSource {
    path: PathBuf,
}

impl FileHostSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn is_yaml(&self) -> bool {
        matches!(
            self.path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        )
    }
}

#[async_trait]
impl HostSource for FileHostSource {
    async fn load(&self) -> Result<Vec<HostDescriptor>, ConfigError> {
        let txt = fs::read_to_string(&self.path).await.map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        let parsed: Vec<HostDescriptor> = if self.is_yaml() {
            serde_yaml::from_str(&txt).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&txt).map_err(|e| e.to_string())
        }
        .map_err(|message| ConfigError::Parse { path: self.path.clone(), message })?;

        let hosts = dedup_hosts(parsed);
        debug!(
            "loaded servers from {}: {:?}",
            self.path.display(),
            hosts.iter().map(|h| format!("{}@{}:{}", h.username, h.host, h.port)).collect::<Vec<_>>()
        );
        Ok(hosts)
    }
}

/// Keeps the first descriptor of every address; each host owns one store key.
fn dedup_hosts(hosts: Vec<HostDescriptor>) -> Vec<HostDescriptor> {
    let mut seen = HashSet::new();
    hosts
        .into_iter()
        .filter(|h| {
            let fresh = seen.insert(h.host.clone());
            if !fresh {
                warn!("server {} listed more than once, keeping the first entry", h.host);
            }
            fresh
        })
        .collect()
}

/// Service settings, taken from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub servers_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub ssh_program: PathBuf,
    pub sshpass_program: PathBuf,
    /// Warning-level log file, `None` disables it
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            servers_path: PathBuf::from("servers.json"),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3500)),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            ssh_program: PathBuf::from("ssh"),
            sshpass_program: PathBuf::from("sshpass"),
            log_file: Some(PathBuf::from("logs/hostwatch.log")),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(path) = lookup("HOSTWATCH_SERVERS") {
            settings.servers_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("HOSTWATCH_LISTEN") {
            settings.listen_addr = parse_setting("HOSTWATCH_LISTEN", &addr)?;
        }
        if let Some(secs) = lookup("HOSTWATCH_CONNECT_TIMEOUT_SECS") {
            settings.connect_timeout = parse_secs("HOSTWATCH_CONNECT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("HOSTWATCH_COMMAND_TIMEOUT_SECS") {
            settings.command_timeout = parse_secs("HOSTWATCH_COMMAND_TIMEOUT_SECS", &secs)?;
        }
        if let Some(path) = lookup("HOSTWATCH_SSH") {
            settings.ssh_program = PathBuf::from(path);
        }
        if let Some(path) = lookup("HOSTWATCH_SSHPASS") {
            settings.sshpass_program = PathBuf::from(path);
        }
        if let Some(path) = lookup("HOSTWATCH_LOG_FILE") {
            settings.log_file = if path.trim().is_empty() { None } else { Some(PathBuf::from(path)) };
        }

        Ok(settings)
    }

    pub fn servers_path(&self) -> &Path {
        &self.servers_path
    }
}

fn parse_setting<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidSetting { key, message: e.to_string() })
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_setting(key, value)?;
    if secs == 0 {
        return Err(ConfigError::InvalidSetting { key, message: "must be at least 1".into() });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_json_server_list() {
        let file = write_file(
            ".json",
            r#"[
                {"host": "192.168.1.10", "port": 2222, "username": "root", "password": "pw"},
                {"host": "db.lan", "username": "ops", "identity_file": "/home/ops/.ssh/id_ed25519"}
            ]"#,
        );

        let hosts = FileHostSource::new(file.path()).load().await.unwrap();

        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].port, 2222);
        assert!(hosts[0].password.is_some());
        assert_eq!(hosts[1].port, 22);
        assert_eq!(hosts[1].identity_file.as_deref(), Some(Path::new("/home/ops/.ssh/id_ed25519")));
    }

    #[tokio::test]
    async fn test_load_yaml_server_list() {
        let file = write_file(
            ".yaml",
            "- host: nas.lan\n  port: 22\n  username: admin\n  password: secret\n",
        );

        let hosts = FileHostSource::new(file.path()).load().await.unwrap();

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].id(), "nas.lan");
        assert_eq!(hosts[0].username, "admin");
    }

    #[tokio::test]
    async fn test_duplicate_hosts_keep_first_entry() {
        let file = write_file(
            ".json",
            r#"[
                {"host": "a", "username": "first"},
                {"host": "b", "username": "other"},
                {"host": "a", "username": "second"}
            ]"#,
        );

        let hosts = FileHostSource::new(file.path()).load().await.unwrap();

        let names: Vec<_> = hosts.iter().map(|h| (h.host.as_str(), h.username.as_str())).collect();
        assert_eq!(names, vec![("a", "first"), ("b", "other")]);
    }

    #[tokio::test]
    async fn test_malformed_and_missing_files_are_errors() {
        let file = write_file(".json", "{ not json");
        let err = FileHostSource::new(file.path()).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = FileHostSource::new("/nonexistent/servers.json").load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.listen_addr.port(), 3500);
        assert_eq!(settings.servers_path(), Path::new("servers.json"));
    }

    #[test]
    fn test_settings_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HOSTWATCH_SERVERS", "/etc/hostwatch/servers.yaml"),
            ("HOSTWATCH_LISTEN", "127.0.0.1:8081"),
            ("HOSTWATCH_COMMAND_TIMEOUT_SECS", "45"),
            ("HOSTWATCH_SSH", "/usr/local/bin/ssh"),
            ("HOSTWATCH_LOG_FILE", ""),
        ]);

        let settings = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.servers_path, PathBuf::from("/etc/hostwatch/servers.yaml"));
        assert_eq!(settings.listen_addr, "127.0.0.1:8081".parse().unwrap());
        assert_eq!(settings.command_timeout, Duration::from_secs(45));
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.ssh_program, PathBuf::from("/usr/local/bin/ssh"));
        assert_eq!(settings.sshpass_program, PathBuf::from("sshpass"));
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn test_settings_reject_bad_values() {
        let err = Settings::from_lookup(|k| (k == "HOSTWATCH_LISTEN").then(|| "nowhere".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { key: "HOSTWATCH_LISTEN", .. }));

        let err = Settings::from_lookup(|k| {
            (k == "HOSTWATCH_CONNECT_TIMEOUT_SECS").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }
}
