//! Engine double that records calls instead of firing jobs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::{EngineError, JobData, SchedulingEngine};
use crate::trigger::TriggerSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Register { key: String, trigger: TriggerSpec },
    Replace { key: String, trigger: TriggerSpec },
    Remove { key: String },
}

#[derive(Default)]
struct Inner {
    calls: Vec<EngineCall>,
    jobs: HashMap<String, (TriggerSpec, JobData)>,
    failures: VecDeque<EngineError>,
}

/// [`SchedulingEngine`] that keeps registered jobs in a map and logs every call.
#[derive(Default)]
pub struct RecordingEngine {
    inner: Mutex<Inner>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next engine call fail with `err`.
    pub fn fail_next(&self, err: EngineError) {
        self.lock().failures.push_back(err);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }

    pub fn job(&self, key: &str) -> Option<(TriggerSpec, JobData)> {
        self.lock().jobs.get(key).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SchedulingEngine for RecordingEngine {
    async fn register(
        &self,
        key: &str,
        trigger: &TriggerSpec,
        data: JobData,
    ) -> Result<(), EngineError> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::Register {
            key: key.to_string(),
            trigger: trigger.clone(),
        });
        if let Some(err) = inner.failures.pop_front() {
            return Err(err);
        }
        if inner.jobs.contains_key(key) {
            return Err(EngineError::AlreadyExists(key.to_string()));
        }
        inner.jobs.insert(key.to_string(), (trigger.clone(), data));
        Ok(())
    }

    async fn replace_trigger(&self, key: &str, trigger: &TriggerSpec) -> Result<bool, EngineError> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::Replace {
            key: key.to_string(),
            trigger: trigger.clone(),
        });
        if let Some(err) = inner.failures.pop_front() {
            return Err(err);
        }
        match inner.jobs.get_mut(key) {
            Some(job) => {
                job.0 = trigger.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_job(&self, key: &str) -> Result<bool, EngineError> {
        let mut inner = self.lock();
        inner.calls.push(EngineCall::Remove {
            key: key.to_string(),
        });
        if let Some(err) = inner.failures.pop_front() {
            return Err(err);
        }
        Ok(inner.jobs.remove(key).is_some())
    }
}
