//! Scripted stand-in for remote hosts, shared by the unit tests.

use crate::executor::{ExecFailure, RemoteExecutor};
use crate::models::HostDescriptor;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// How a simulated host answers every command.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answers `"<host>: <command> #<call>"`
    Echo,
    /// Answers with the same text every time
    Output(String),
    Fail(ExecFailure),
    /// Never answers
    Hang,
    /// Panics while the command runs
    Panic,
}

#[derive(Default)]
pub struct ScriptedExecutor {
    behaviors: HashMap<String, Behavior>,
    /// per (host, command) overrides
    overrides: HashMap<(String, String), Behavior>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(host.to_string(), behavior);
        self
    }

    pub fn command(mut self, host: &str, command: &str, behavior: Behavior) -> Self {
        self.overrides.insert((host.to_string(), command.to_string()), behavior);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, host: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(&self, host: &HostDescriptor, command: &str) -> Result<String, ExecFailure> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push((host.host.clone(), command.to_string()));
            calls.iter().filter(|(h, _)| *h == host.host).count()
        };

        let behavior = self
            .overrides
            .get(&(host.host.clone(), command.to_string()))
            .or_else(|| self.behaviors.get(&host.host))
            .cloned()
            .unwrap_or(Behavior::Echo);

        match behavior {
            Behavior::Echo => Ok(format!("{}: {} #{}", host.host, command, call)),
            Behavior::Output(text) => Ok(text),
            Behavior::Fail(failure) => Err(failure),
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("simulated crash on {}", host.host),
        }
    }
}

pub fn descriptor(host: &str) -> HostDescriptor {
    HostDescriptor::with_password(host, 22, "monitor", "secret")
}
