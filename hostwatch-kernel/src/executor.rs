//! Remote command execution over SSH.
//!
//! Every call opens its own connection through the system OpenSSH client,
//! runs exactly one command, collects stdout and tears the process down:
//! - Password credentials go through `sshpass -e` (secret passed by environment)
//! - Key credentials use `ssh -o BatchMode=yes [-i key]`
//! - Unknown host keys are accepted on first contact (`accept-new`)
//! - Failures are classified from the exit status and stderr

use crate::models::HostDescriptor;
use crate::reporter::FailureReporter;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Exit status OpenSSH uses for its own errors
const SSH_ERROR_EXIT: i32 = 255;
/// Exit status sshpass uses for a rejected password
const SSHPASS_BAD_PASSWORD_EXIT: i32 = 5;
/// sshpass's own errors: conflicting arguments, runtime error (ssh missing),
/// unrecognised prompt, unknown host key
const SSHPASS_ERROR_EXITS: &[i32] = &[2, 3, 4, 6];

const AUTH_MARKERS: &[&str] = &[
    "Permission denied",
    "Authentication failed",
    "Too many authentication failures",
];

const CONNECTION_MARKERS: &[&str] = &[
    "Connection refused",
    "No route to host",
    "Could not resolve hostname",
    "Connection timed out",
    "Network is unreachable",
    "Connection reset",
    "Connection closed",
];

/// Why a remote command produced no output. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecFailure {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Runs `command` on `host` and returns its complete stdout.
    async fn execute(&self, host: &HostDescriptor, command: &str) -> Result<String, ExecFailure>;
}

/// [`RemoteExecutor`] backed by the `ssh` binary.
pub struct SshExecutor {
    reporter: Arc<FailureReporter>,
    ssh_program: PathBuf,
    sshpass_program: PathBuf,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SshExecutor {
    pub fn new(reporter: Arc<FailureReporter>) -> Self {
        Self {
            reporter,
            ssh_program: PathBuf::from("ssh"),
            sshpass_program: PathBuf::from("sshpass"),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_ssh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ssh_program = program.into();
        self
    }

    pub fn with_sshpass_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.sshpass_program = program.into();
        self
    }

    fn build_command(&self, host: &HostDescriptor, command: &str) -> Command {
        let mut cmd = match &host.password {
            Some(password) => {
                let mut cmd = Command::new(&self.sshpass_program);
                cmd.env("SSHPASS", password.expose_secret());
                cmd.arg("-e").arg(&self.ssh_program);
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.ssh_program);
                cmd.arg("-o").arg("BatchMode=yes");
                cmd
            }
        };

        cmd.arg("-o").arg("StrictHostKeyChecking=accept-new");
        cmd.arg("-o").arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)));
        cmd.arg("-o").arg("LogLevel=ERROR");
        cmd.arg("-p").arg(host.port.to_string());
        if let Some(key) = &host.identity_file {
            cmd.arg("-i").arg(key);
        }
        // a destination starting with '-' must not be read as an option
        cmd.arg("--");
        cmd.arg(format!("{}@{}", host.username, host.host));
        cmd.arg(command);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // the ssh process dies with its future: timeout, cancellation or error
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, host: &HostDescriptor, command: &str) -> Result<String, ExecFailure> {
        let mut cmd = self.build_command(host, command);
        let child = cmd
            .spawn()
            .map_err(|e| ExecFailure::Other(format!("failed to launch ssh client: {e}")))?;

        let output = match tokio::time::timeout(self.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExecFailure::Other(format!("failed to read command output: {e}"))),
            Err(_) => {
                return Err(ExecFailure::Other(format!(
                    "no answer within {}s",
                    self.command_timeout.as_secs()
                )))
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(
            "'{}' on {} exited with {:?}",
            command,
            host.host,
            output.status.code()
        );

        if let Some(failure) = classify(
            output.status.code(),
            &stderr,
            output.stdout.is_empty(),
            host.password.is_some(),
        ) {
            return Err(failure);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, host: &HostDescriptor, command: &str) -> Result<String, ExecFailure> {
        let result = self.run(host, command).await;
        if let Err(failure) = &result {
            let message = match failure {
                ExecFailure::Connection(_) | ExecFailure::Auth(_) => {
                    format!("cannot connect to server {}: {}", host.host, failure)
                }
                ExecFailure::Other(_) => {
                    format!("command '{}' failed on server {}: {}", command, host.host, failure)
                }
            };
            self.reporter.report(&message);
        }
        result
    }
}

/// Maps an ssh exit to a failure, or `None` when stdout should be kept.
///
/// Exit codes other than 255 belong to the remote command itself; its output
/// is kept whatever the status, so `sensors` exiting 1 still counts.
///
/// Behind sshpass the exit status is shared between sshpass and the remote
/// command, so sshpass codes only count as failures when nothing reached
/// stdout. A silent remote command exiting with one of those codes is still
/// reported as a failure; it would have been `NO_DATA` anyway.
fn classify(
    code: Option<i32>,
    stderr: &str,
    stdout_empty: bool,
    password_auth: bool,
) -> Option<ExecFailure> {
    let sshpass_error = password_auth && stdout_empty;
    match code {
        Some(0) => None,
        Some(SSH_ERROR_EXIT) => Some(classify_ssh_error(stderr)),
        Some(SSHPASS_BAD_PASSWORD_EXIT) if sshpass_error && stderr.trim().is_empty() => {
            Some(ExecFailure::Auth("password rejected".to_string()))
        }
        Some(status) if sshpass_error && SSHPASS_ERROR_EXITS.contains(&status) => {
            let detail = first_line(stderr);
            Some(ExecFailure::Other(if detail.is_empty() {
                format!("sshpass exited with status {status}")
            } else {
                format!("sshpass exited with status {status}: {detail}")
            }))
        }
        Some(_) => None,
        None => Some(ExecFailure::Other("ssh terminated by signal".to_string())),
    }
}

fn classify_ssh_error(stderr: &str) -> ExecFailure {
    let detail = first_line(stderr);
    if AUTH_MARKERS.iter().any(|m| stderr.contains(m)) {
        ExecFailure::Auth(detail)
    } else if CONNECTION_MARKERS.iter().any(|m| stderr.contains(m)) {
        ExecFailure::Connection(detail)
    } else if detail.is_empty() {
        ExecFailure::Other(format!("ssh exited with status {SSH_ERROR_EXIT}"))
    } else {
        ExecFailure::Other(detail)
    }
}

fn first_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}
