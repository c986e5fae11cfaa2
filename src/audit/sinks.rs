use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{AuditEvent, AuditSink};

/// Emits each event as a structured `tracing` record on the
/// `faxbridge::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match event {
            AuditEvent::RunStarted {
                execution_id,
                steps,
                ..
            } => {
                info!(target: "faxbridge::audit", %execution_id, steps, "run started");
            }
            AuditEvent::StepAttempt {
                execution_id,
                step_id,
                tool,
                attempt,
                success,
                error,
                skipped,
                description,
                duration_ms,
                ..
            } => {
                if let Some(reason) = skipped {
                    info!(target: "faxbridge::audit", %execution_id, %step_id, %tool, reason = %reason, "step skipped");
                } else if *success {
                    info!(target: "faxbridge::audit", %execution_id, %step_id, %tool, attempt, duration_ms, %description, "step succeeded");
                } else {
                    warn!(
                        target: "faxbridge::audit",
                        %execution_id,
                        %step_id,
                        %tool,
                        attempt,
                        duration_ms,
                        error = error.as_deref().unwrap_or_default(),
                        "step attempt failed"
                    );
                }
            }
            AuditEvent::RunCompleted {
                execution_id,
                status,
                total_steps,
                succeeded,
                failed,
                skipped,
                total_retries,
                duration_ms,
                ..
            } => {
                info!(
                    target: "faxbridge::audit",
                    %execution_id,
                    %status,
                    total_steps,
                    succeeded,
                    failed,
                    skipped,
                    total_retries,
                    duration_ms,
                    "run finished"
                );
            }
        }
    }
}

/// Keeps events in memory, for tests and for callers that inspect the
/// trail after a run.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesAuditSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory {}", parent.display())
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonLinesAuditSink {
    fn record(&self, event: &AuditEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to serialize audit event");
                return;
            }
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writeln!(writer, "{line}").and_then(|_| writer.flush());
        if let Err(err) = written {
            warn!(path = %self.path.display(), error = %err, "failed to write audit event");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}
