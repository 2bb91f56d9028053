//! Process-launch agent transport.
//!
//! Each consultation runs the launcher once:
//!
//! ```text
//! <command> [args..] --role <role> --model <model> --reasoning-effort <effort>
//!           --sandbox <mode> [--resume <conversation id>]
//! ```
//!
//! The prompt goes to stdin and the [line protocol](super::protocol) comes
//! back on stdout. Continuations pass the conversation id with `--resume`;
//! the launcher keeps the conversation state on its side.
//!
//! The child is never killed when the caller stops waiting (timeout or
//! abort): the agent may be persisting its session and is left to finish.
//! On Linux it still receives SIGTERM if this process dies.

use super::error::{LauncherError, Result};
use super::protocol::Transcript;
use async_trait::async_trait;
use devgate_application::{AgentReply, AgentRequest, AgentTransport, TransportError};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Longest stderr excerpt carried in a diagnostic
const STDERR_EXCERPT: usize = 2_000;

/// How to run the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    pub command: String,
    /// Arguments placed before the per-request flags
    pub args: Vec<String>,
    /// Working directory of the child (the workspace under review)
    pub workdir: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            command: "devgate-agent".to_string(),
            args: Vec::new(),
            workdir: None,
        }
    }
}

/// [`AgentTransport`] over a launcher process
pub struct LauncherTransport {
    config: LauncherConfig,
}

impl LauncherTransport {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Whether the launcher command resolves on PATH
    pub fn is_available(&self) -> bool {
        which::which(&self.config.command).is_ok()
    }

    /// Full argument list for `request`
    pub fn arguments(&self, request: &AgentRequest) -> Vec<String> {
        let mut args = self.config.args.clone();
        args.extend([
            "--role".to_string(),
            request.role.to_string(),
            "--model".to_string(),
            request.profile.model.clone(),
            "--reasoning-effort".to_string(),
            request.profile.reasoning_effort.as_str().to_string(),
            "--sandbox".to_string(),
            request.profile.sandbox.as_str().to_string(),
        ]);
        if let Some(token) = &request.token {
            args.push("--resume".to_string());
            args.push(token.to_string());
        }
        args
    }

    async fn run(&self, request: AgentRequest) -> Result<AgentReply> {
        let program = which::which(&self.config.command)
            .map_err(|_| LauncherError::CommandNotFound(self.config.command.clone()))?;
        let args = self.arguments(&request);
        debug!("Launching {} {}", program.display(), args.join(" "));

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        if let Some(dir) = &self.config.workdir {
            cmd.current_dir(dir);
        }

        // Linux: request kernel to send SIGTERM to child when parent dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn()?;

        let stdin = child.stdin.take();
        let prompt = request.prompt;
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let stderr = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let stdout = child.stdout.take().ok_or_else(|| {
            LauncherError::SpawnError(std::io::Error::other("Failed to capture stdout"))
        })?;
        let mut lines = BufReader::new(stdout).lines();
        let mut transcript = Transcript::default();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => transcript.push_line(&line),
                Ok(None) => break,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    return Err(LauncherError::Protocol(format!(
                        "launcher output is not UTF-8: {}",
                        e
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let status = child.wait().await?;
        match writer.await {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                warn!("Writing prompt to launcher failed: {}", e)
            }
            Err(e) => warn!("Prompt writer task failed: {}", e),
            _ => {}
        }
        let stderr = stderr_reader.await.unwrap_or_default();

        for error in transcript.errors() {
            warn!("{} reported: {}", request.role, error);
        }

        if !status.success() {
            return Err(LauncherError::ProcessFailed {
                status: status.to_string(),
                stderr: excerpt(&stderr),
            });
        }
        transcript.into_reply()
    }
}

#[async_trait]
impl AgentTransport for LauncherTransport {
    async fn send(&self, request: AgentRequest) -> std::result::Result<AgentReply, TransportError> {
        self.run(request).await.map_err(TransportError::from)
    }
}

/// Tail of `stderr`, which is where launchers put the actual failure
fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "(no stderr output)".to_string();
    }
    if trimmed.len() <= STDERR_EXCERPT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_EXCERPT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
