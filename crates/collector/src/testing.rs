use crate::process::{CommandRunner, CommandSpec};
use crate::{Result, WatchdogError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Canned command responses for tests. A command gets the response whose key is
/// the longest substring of its rendered command line; anything else fails.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Vec<(String, String)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, key: &str, stdout: &str) -> Self {
        self.responses.push((key.to_string(), stdout.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<String> {
        let line = command.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }
        self.responses
            .iter()
            .filter(|(key, _)| line.contains(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, stdout)| stdout.clone())
            .ok_or_else(|| WatchdogError::transient(line, "no scripted response"))
    }
}
