//! Common test utilities for CLI integration tests

#![allow(dead_code)]

use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Temporary home for one test's profile state
pub struct CliTestContext {
    pub test_dir: TempDir,
    pub state_file: PathBuf,
}

impl CliTestContext {
    pub fn new() -> Result<Self> {
        let test_dir = TempDir::new()?;
        let state_file = test_dir.path().join(".hydra-cli");
        Ok(Self {
            test_dir,
            state_file,
        })
    }

    /// Context with one profile already stored and active
    ///
    /// The profile points at a port nothing listens on.
    pub fn configured() -> Result<Self> {
        let ctx = Self::new()?;
        ctx.run(&["config", "local", "--url", "127.0.0.1", "--port", "1"])?
            .assert_success()
            .assert_contains("Profile 'local' created");
        Ok(ctx)
    }

    /// Run the CLI against this context's state file
    pub fn run(&self, args: &[&str]) -> Result<CliOutput> {
        let output = Command::new(env!("CARGO_BIN_EXE_hydra-cli"))
            .env("HYDRA_CLI_STATE", &self.state_file)
            .env_remove("HYDRA_LOG")
            .args(["--connect-timeout", "2"])
            .args(args)
            .output()?;

        Ok(CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            exit_code: output.status.code(),
        })
    }

    /// Parsed state file
    pub fn state(&self) -> Result<Value> {
        Ok(serde_json::from_str(&std::fs::read_to_string(
            &self.state_file,
        )?)?)
    }

    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.test_dir.path().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        self.test_dir.path()
    }
}

#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl CliOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.success {
            panic!(
                "Command failed with exit code {:?}\nSTDOUT:\n{}\nSTDERR:\n{}",
                self.exit_code, self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_contains(&self, text: &str) -> &Self {
        if !self.stdout.contains(text) && !self.stderr.contains(text) {
            panic!(
                "Expected output to contain '{}'\nSTDOUT:\n{}\nSTDERR:\n{}",
                text, self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_not_contains(&self, text: &str) -> &Self {
        if self.stdout.contains(text) || self.stderr.contains(text) {
            panic!(
                "Expected output not to contain '{}'\nSTDOUT:\n{}\nSTDERR:\n{}",
                text, self.stdout, self.stderr
            );
        }
        self
    }
}
