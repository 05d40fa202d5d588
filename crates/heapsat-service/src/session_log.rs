//! Per-solve session logs.
//!
//! One JSON file per solve call: the request, the response, wall-clock
//! timings, and the full oracle transcript. Log writing is best-effort and
//! never affects the response.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use heapsat_solver::{ConversationLogEntry, SolveRequestV1};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub request: SolveRequestV1,
    pub response: Value,
    pub transcript: Vec<ConversationLogEntry>,
}

impl SessionRecord {
    pub fn new(
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        request: SolveRequestV1,
        response: Value,
        transcript: Vec<ConversationLogEntry>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at,
            ended_at,
            duration_ms: (ended_at - started_at).num_milliseconds(),
            request,
            response,
            transcript,
        }
    }
}

pub struct SessionLogger {
    dir: PathBuf,
}

impl SessionLogger {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create session log dir: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn write(&self, record: &SessionRecord) -> Result<PathBuf> {
        let file = self.dir.join(format!(
            "solve_{}_{}.json",
            record.started_at.format("%Y%m%d_%H%M%S"),
            record.session_id
        ));
        let payload = serde_json::to_string_pretty(record)
            .context("failed to serialize session record")?;
        fs::write(&file, payload)
            .with_context(|| format!("failed to write session log: {}", file.display()))?;
        Ok(file)
    }
}
