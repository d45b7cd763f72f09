//! Job persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::job::{Job, JobId};

/// Storage for jobs.
///
/// The orchestrator is the only writer. A store that survives restarts lets
/// a new orchestrator pick up unfinished jobs through [`JobStore::unfinished`].
pub trait JobStore: Send + Sync {
    /// Inserts `job` unless a job with the same id exists, in which case the
    /// existing job is returned and nothing is written.
    fn insert_if_absent(&self, job: Job) -> Result<Option<Job>, StoreError>;

    fn get(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Inserts or overwrites.
    fn upsert(&self, job: Job) -> Result<(), StoreError>;

    /// Pending jobs and failed jobs with a retry scheduled, oldest first.
    fn unfinished(&self) -> Result<Vec<Job>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("job table lock poisoned".to_string())
}

impl JobStore for InMemoryJobStore {
    fn insert_if_absent(&self, job: Job) -> Result<Option<Job>, StoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if let Some(existing) = jobs.get(&job.id) {
            return Ok(Some(existing.clone()));
        }
        jobs.insert(job.id, job);
        Ok(None)
    }

    fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn upsert(&self, job: Job) -> Result<(), StoreError> {
        self.jobs.write().map_err(poisoned)?.insert(job.id, job);
        Ok(())
    }

    fn unfinished(&self) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let mut unfinished: Vec<Job> = jobs.values().filter(|job| !job.is_finished()).cloned().collect();
        unfinished.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        Ok(unfinished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;
    use crate::parser::parse_to_postfix;
    use std::time::{Duration, SystemTime};

    fn job(owner: u64, text: &str) -> Job {
        Job::new(owner, parse_to_postfix(text).unwrap())
    }

    #[test]
    fn test_insert_if_absent_keeps_first() {
        let store = InMemoryJobStore::new();
        let first = job(1, "1 + 1");
        assert!(store.insert_if_absent(first.clone()).unwrap().is_none());

        let mut second = job(1, "1 + 1");
        second.state = JobState::Done(2.0);
        let existing = store.insert_if_absent(second).unwrap().unwrap();
        assert_eq!(existing.state, JobState::Pending);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upsert_overwrites() {
        let store = InMemoryJobStore::new();
        let mut j = job(1, "2 * 3");
        store.upsert(j.clone()).unwrap();

        j.state = JobState::Done(6.0);
        store.upsert(j.clone()).unwrap();
        assert_eq!(store.get(j.id).unwrap().unwrap().state, JobState::Done(6.0));
        assert_eq!(store.len(), 1);
        assert!(store.get(JobId::compute(9, &parse_to_postfix("1").unwrap())).unwrap().is_none());
    }

    #[test]
    fn test_unfinished_in_submission_order() {
        let store = InMemoryJobStore::new();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        let mut late = job(1, "3 + 3");
        late.submitted_at = base + Duration::from_secs(2);
        let mut early = job(1, "1 + 1");
        early.submitted_at = base;
        let mut retrying = job(2, "2 + 2");
        retrying.submitted_at = base + Duration::from_secs(1);
        retrying.state = JobState::Failed("no available worker".into());
        retrying.retry_scheduled = true;
        let mut done = job(1, "4 + 4");
        done.state = JobState::Done(8.0);
        let mut failed = job(1, "5 / 0");
        failed.state = JobState::Failed("division by zero".into());

        for j in [late.clone(), early.clone(), retrying.clone(), done, failed] {
            store.upsert(j).unwrap();
        }

        let ids: Vec<JobId> = store.unfinished().unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![early.id, retrying.id, late.id]);
    }
}
