use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

pub const OLLAMA_PROGRAM: &str = "ollama";
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Availability of the optional local model runner. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OllamaStatus {
    Skipped,
    NotInstalled,
    Unresponsive { detail: String },
    Available { models: Vec<String> },
}

pub fn probe() -> OllamaStatus {
    probe_with(OLLAMA_PROGRAM, PROBE_TIMEOUT)
}

pub fn probe_with(program: &str, timeout: Duration) -> OllamaStatus {
    let mut command = Command::new(program);
    command.arg("list");
    run_probe(command, timeout)
}

fn run_probe(mut command: Command, timeout: Duration) -> OllamaStatus {
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(err) if err.kind() == ErrorKind::NotFound => return OllamaStatus::NotInstalled,
        Err(err) => {
            return OllamaStatus::Unresponsive {
                detail: err.to_string(),
            }
        }
    };

    // Drained while polling; a full pipe would stall the child until the timeout.
    let reader = child.stdout.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut stdout = String::new();
            pipe.read_to_string(&mut stdout).map(|_| stdout)
        })
    });

    let status = match wait_with_timeout(&mut child, timeout) {
        Ok(status) => status,
        Err(detail) => return OllamaStatus::Unresponsive { detail },
    };
    if !status.success() {
        return OllamaStatus::Unresponsive {
            detail: format!("`{}` exited with {status}", describe(&command)),
        };
    }

    let stdout = match reader.map(|handle| handle.join()) {
        None => String::new(),
        Some(Ok(Ok(stdout))) => stdout,
        Some(Ok(Err(err))) => {
            return OllamaStatus::Unresponsive {
                detail: err.to_string(),
            }
        }
        Some(Err(_)) => {
            return OllamaStatus::Unresponsive {
                detail: "output reader panicked".to_string(),
            }
        }
    };
    let models = parse_model_list(&stdout);
    tracing::debug!(models = models.len(), "ollama probe finished");
    OllamaStatus::Available { models }
}

fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    parts.extend(command.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<std::process::ExitStatus, String> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("no answer within {}s", timeout.as_secs()));
            }
            Ok(None) => thread::sleep(Duration::from_millis(50)),
            Err(err) => return Err(err.to_string()),
        }
    }
}

/// Model names from `ollama list` output. The first line is the column header.
/// A non-numeric tag such as `:latest` is dropped; size tags like `:7b` stay.
pub fn parse_model_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| match name.split_once(':') {
            Some((base, tag)) if !tag.chars().any(|ch| ch.is_ascii_digit()) => base.to_string(),
            _ => name.to_string(),
        })
        .collect()
}
