use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{CommandOutput, CommandRunner};

/// In-memory runner that answers from canned replies and records calls
#[derive(Default)]
pub struct FixtureRunner {
    replies: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<Vec<String>>>,
    fail_batch: Option<String>,
}

impl FixtureRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, command: &str, output: &str) -> Self {
        self.replies.insert(command.to_string(), Ok(output.to_string()));
        self
    }

    pub fn fail(mut self, command: &str, error: &str) -> Self {
        self.replies.insert(command.to_string(), Err(error.to_string()));
        self
    }

    pub fn fail_batch(mut self, error: &str) -> Self {
        self.fail_batch = Some(error.to_string());
        self
    }

    /// Every batch passed to `run`, in call order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for FixtureRunner {
    async fn run(&self, commands: &[String]) -> Result<Vec<CommandOutput>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(commands.to_vec());
        }
        if let Some(err) = &self.fail_batch {
            return Err(anyhow!(err.clone()));
        }
        Ok(commands
            .iter()
            .map(|c| {
                self.replies
                    .get(c)
                    .cloned()
                    .unwrap_or_else(|| Ok(String::new()))
            })
            .collect())
    }
}
