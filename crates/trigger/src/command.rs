//! Lookup backed by an external program
//!
//! The term is passed as the last argument. Standard output (trailing
//! whitespace trimmed) is the payload; a non-zero exit is a failure.

use crate::lookup::{Lookup, LookupError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `program args.. <term>` per lookup
#[derive(Debug, Clone)]
pub struct CommandLookup {
    program: String,
    args: Vec<String>,
}

impl CommandLookup {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a full command line (`program` followed by its arguments)
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Lookup for CommandLookup {
    type Output = String;

    async fn lookup(&self, term: &str) -> Result<String, LookupError> {
        debug!(program = %self.program, term, "spawning lookup command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(term)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LookupError::Transport(format!("failed to run {}: {}", self.program, e)))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(program = %self.program, "lookup stderr: {}", stderr.trim());
        }

        match output.status.code() {
            Some(code) => Err(LookupError::from_exit_code(code)),
            None => Err(LookupError::Transport(format!(
                "{} terminated by signal",
                self.program
            ))),
        }
    }
}
