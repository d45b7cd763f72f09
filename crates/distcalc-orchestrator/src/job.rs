//! Jobs and their identifiers.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use distcalc_common::{JobStatus, JobStatusResponse, OwnerId};

use crate::error::JobError;
use crate::parser::PostfixExpression;

/// Deterministic job identifier.
///
/// The first eight bytes of `BLAKE3(owner as little-endian u64 ‖ postfix)`,
/// rendered as 16 lowercase hex digits. The same owner submitting the same
/// expression always gets the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn compute(owner: OwnerId, postfix: &PostfixExpression) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&owner.to_le_bytes());
        hasher.update(postfix.as_str().as_bytes());
        let hash = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        JobId(u64::from_be_bytes(prefix))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for JobId {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(JobError::InvalidJobId(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(JobId)
            .map_err(|_| JobError::InvalidJobId(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Done(f64),
    /// Error message. Terminal unless the job has a retry scheduled.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub owner: OwnerId,
    pub postfix: PostfixExpression,
    pub state: JobState,
    pub retry_scheduled: bool,
    /// Dispatch attempts so far
    pub attempts: u32,
    pub submitted_at: SystemTime,
}

impl Job {
    pub fn new(owner: OwnerId, postfix: PostfixExpression) -> Self {
        Self {
            id: JobId::compute(owner, &postfix),
            owner,
            postfix,
            state: JobState::Pending,
            retry_scheduled: false,
            attempts: 0,
            submitted_at: SystemTime::now(),
        }
    }

    /// Done, or Failed with nothing scheduled.
    pub fn is_finished(&self) -> bool {
        match self.state {
            JobState::Pending => false,
            JobState::Done(_) => true,
            JobState::Failed(_) => !self.retry_scheduled,
        }
    }

    pub fn status(&self) -> JobStatusResponse {
        let (state, result, error) = match &self.state {
            JobState::Pending => (JobStatus::Pending, None, None),
            JobState::Done(value) => (JobStatus::Done, Some(*value), None),
            JobState::Failed(message) => (JobStatus::Failed, None, Some(message.clone())),
        };
        JobStatusResponse {
            job_id: self.id.to_string(),
            state,
            result,
            error,
            attempts: self.attempts,
            retry_scheduled: self.retry_scheduled,
            postfix: self.postfix.as_str().to_string(),
        }
    }
}
