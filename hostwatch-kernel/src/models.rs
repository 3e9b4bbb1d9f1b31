use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Placeholder stored in any snapshot field whose command produced nothing usable.
pub const NO_DATA: &str = "no data";

/// Connection parameters for one monitored machine, as read from the server list.
#[derive(Debug, Deserialize)]
pub struct HostDescriptor {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    /// Private key for key authentication, used when no password is given
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

impl HostDescriptor {
    #[cfg(test)]
    pub fn with_password(host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: Some(SecretString::from(password.to_string())),
            identity_file: None,
        }
    }

    #[cfg(test)]
    pub fn with_identity(host: &str, port: u16, username: &str, identity_file: PathBuf) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: None,
            identity_file: Some(identity_file),
        }
    }

    /// Store key for this host
    pub fn id(&self) -> &str {
        &self.host
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// The fixed battery of commands run against every host each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Uptime,
    Memory,
    CpuUsage,
    Temperature,
}

impl Probe {
    /// Execution order within a poll cycle
    pub const ALL: [Probe; 4] = [Probe::Uptime, Probe::Memory, Probe::CpuUsage, Probe::Temperature];

    pub fn command(self) -> &'static str {
        match self {
            Probe::Uptime => "uptime",
            Probe::Memory => "free -m",
            // one-second sampling window
            Probe::CpuUsage => "mpstat 1 1",
            Probe::Temperature => "sensors",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Probe::Uptime => "uptime",
            Probe::Memory => "memory",
            Probe::CpuUsage => "cpu_usage",
            Probe::Temperature => "temperature",
        }
    }
}

/// Latest health record of one host. Every field holds either raw command
/// output or [`NO_DATA`].
#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub uptime: String,
    pub memory: String,
    pub cpu_usage: String,
    pub temperature: String,
    pub collected_at: OffsetDateTime,
}

impl HostSnapshot {
    pub fn empty() -> Self {
        Self {
            uptime: NO_DATA.to_string(),
            memory: NO_DATA.to_string(),
            cpu_usage: NO_DATA.to_string(),
            temperature: NO_DATA.to_string(),
            collected_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn field_mut(&mut self, probe: Probe) -> &mut String {
        match probe {
            Probe::Uptime => &mut self.uptime,
            Probe::Memory => &mut self.memory,
            Probe::CpuUsage => &mut self.cpu_usage,
            Probe::Temperature => &mut self.temperature,
        }
    }

    pub fn field(&self, probe: Probe) -> &str {
        match probe {
            Probe::Uptime => &self.uptime,
            Probe::Memory => &self.memory,
            Probe::CpuUsage => &self.cpu_usage,
            Probe::Temperature => &self.temperature,
        }
    }
}

pub type SnapshotMap = HashMap<String, HostSnapshot>;
