//! Scripted executor for tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{CommandExecutor, CommandOutput, SshError, SshTarget};

type Responder = Box<dyn Fn(&SshTarget, &str) -> Result<CommandOutput, SshError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub host: String,
    pub command: String,
}

/// Records every call and answers with a caller-supplied closure.
pub struct MockExecutor {
    responder: Responder,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockExecutor {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&SshTarget, &str) -> Result<CommandOutput, SshError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command succeeds with `stdout`.
    pub fn answering(stdout: &'static str) -> Self {
        Self::new(move |_, _| Ok(CommandOutput::stdout(stdout)))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(&self, target: &SshTarget, command: &str) -> Result<CommandOutput, SshError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                host: target.host.clone(),
                command: command.to_string(),
            });
        }
        (self.responder)(target, command)
    }
}
