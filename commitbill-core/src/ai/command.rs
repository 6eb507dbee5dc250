//! Text generation through an external CLI (e.g. `claude -p`).
//!
//! The prompt is written to the child's stdin and stdout is the answer.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::config::AiBackendConfig;
use crate::error::{Error, Result};

use super::{ai_error, TextGenerator};

/// Runs a configured program once per prompt
pub struct CommandTextGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTextGenerator {
    pub fn new(config: &AiBackendConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ai_error(&format!("failed to start {}", self.program), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| ai_error("failed to write prompt", e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ai_error(&format!("{} failed", self.program), e))?;

        if !output.status.success() {
            return Err(Error::Ai(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TextGenerator for CommandTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.run(prompt))
            .await
            .map_err(|_| {
                Error::Ai(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
    }
}
