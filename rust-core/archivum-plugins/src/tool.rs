// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! External command-line tools.
//!
//! A tool is described by a command template such as
//! `convert {arguments} {input_file} {output_arguments} {output_file}`.
//! The template is split on whitespace first and placeholders are
//! substituted per token, so a file path with spaces stays one argument
//! while `{arguments}` may expand to several.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::PluginError;

pub const INPUT_FILE: &str = "{input_file}";
pub const OUTPUT_FILE: &str = "{output_file}";
pub const ARGUMENTS: &str = "{arguments}";
pub const OUTPUT_ARGUMENTS: &str = "{output_arguments}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub template: String,
}

impl ToolCommand {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Build the argument vector for one invocation.
    pub fn render(
        &self,
        input: &Path,
        output: &Path,
        arguments: &str,
        output_arguments: &str,
    ) -> Result<Vec<String>, PluginError> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let mut argv = Vec::new();
        for token in self.template.split_whitespace() {
            match token {
                INPUT_FILE => argv.push(input.to_string()),
                OUTPUT_FILE => argv.push(output.to_string()),
                ARGUMENTS => argv.extend(arguments.split_whitespace().map(str::to_string)),
                OUTPUT_ARGUMENTS => {
                    argv.extend(output_arguments.split_whitespace().map(str::to_string))
                }
                // Placeholders embedded in a larger token, e.g. `-o{output_file}`.
                other => argv.push(
                    other
                        .replace(INPUT_FILE, &input)
                        .replace(OUTPUT_FILE, &output),
                ),
            }
        }
        if argv.is_empty() {
            return Err(PluginError::InvalidParameter("empty tool command".to_string()));
        }
        Ok(argv)
    }
}

/// What a tool run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools. Tests substitute their own runner.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `argv[0]` with the remaining arguments.
    ///
    /// A non-zero exit is reported through [`ToolOutput::success`], not as
    /// an error; errors mean the tool could not be run at all.
    async fn run(&self, argv: &[String]) -> Result<ToolOutput, PluginError>;
}

/// Runs tools as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessToolRunner {
    timeout: Option<Duration>,
}

impl ProcessToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, argv: &[String]) -> Result<ToolOutput, PluginError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PluginError::InvalidParameter("empty tool command".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %program, args = args.len(), "Running external tool");
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| PluginError::Tool(format!("{program} timed out after {limit:?}")))?,
            None => command.output().await,
        }
        .map_err(|e| PluginError::Tool(format!("failed to run {program}: {e}")))?;

        Ok(ToolOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
