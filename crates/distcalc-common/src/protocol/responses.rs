//! Result payloads returned in JSON-RPC `result`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::requests::OwnerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Externally visible job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub state: JobStatus,
    #[serde(default)]
    pub result: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    /// Dispatch attempts made so far
    pub attempts: u32,
    /// True while a `Failed` state is only transient and a retry is queued
    pub retry_scheduled: bool,
    pub postfix: String,
}

impl JobStatusResponse {
    /// Done, or Failed with no retry pending.
    pub fn is_finished(&self) -> bool {
        match self.state {
            JobStatus::Pending => false,
            JobStatus::Done => true,
            JobStatus::Failed => !self.retry_scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelaysResponse {
    pub owner: OwnerId,
    pub delays: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub addr: String,
    pub is_new_registration: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub addr: String,
    /// False when the heartbeat implicitly registered the worker
    pub was_known: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerLiveness {
    Available,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub addr: String,
    pub state: WorkerLiveness,
    pub since_last_beat_ms: u64,
}
