//! In-process scheduling engine backed by tokio tasks.
//!
//! Every job owns one task that sleeps until its next fire time and then
//! spawns the handler. Jobs live only as long as the process; durability
//! comes from rebuilding triggers from stored records at startup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::cron::parse_schedule;
use crate::engine::{EngineError, JobData, JobHandler, SchedulingEngine};
use crate::trigger::TriggerSpec;

struct LocalJob {
    trigger: TriggerSpec,
    data: JobData,
    handle: JoinHandle<()>,
}

/// How a job task computes its next fire.
enum Plan {
    Every(Duration),
    Cron(::cron::Schedule, Tz),
}

impl Plan {
    fn from_trigger(key: &str, trigger: &TriggerSpec) -> Result<Self, EngineError> {
        let invalid = |reason: String| EngineError::InvalidTrigger {
            key: key.to_string(),
            reason,
        };
        match trigger {
            TriggerSpec::Interval { every_ms } => {
                if *every_ms == 0 {
                    return Err(invalid("interval must be positive".to_string()));
                }
                Ok(Plan::Every(Duration::from_millis(*every_ms)))
            }
            TriggerSpec::Cron { expression, zone } => {
                let tz = zone
                    .parse::<Tz>()
                    .map_err(|_| invalid(format!("unknown zone '{zone}'")))?;
                let schedule = parse_schedule(expression).map_err(|e| invalid(e.to_string()))?;
                Ok(Plan::Cron(schedule, tz))
            }
        }
    }
}

/// Tokio-backed [`SchedulingEngine`].
#[derive(Clone)]
pub struct LocalEngine {
    jobs: Arc<Mutex<HashMap<String, LocalJob>>>,
    handler: Arc<dyn JobHandler>,
}

impl LocalEngine {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            handler,
        }
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Trigger currently registered under `key`.
    pub async fn trigger_of(&self, key: &str) -> Option<TriggerSpec> {
        self.jobs.lock().await.get(key).map(|j| j.trigger.clone())
    }

    /// Abort every job task.
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.handle.abort();
        }
        debug!("local engine shut down");
    }

    fn spawn(&self, key: &str, plan: Plan, data: JobData) -> JoinHandle<()> {
        let handler = self.handler.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            match plan {
                Plan::Every(every) => {
                    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        fire(&handler, &key, data.clone());
                    }
                }
                Plan::Cron(schedule, tz) => loop {
                    let now = Utc::now().with_timezone(&tz);
                    let Some(next) = schedule.after(&now).next() else {
                        debug!(job = %key, "cron schedule exhausted");
                        return;
                    };
                    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                    tokio::time::sleep(wait).await;
                    fire(&handler, &key, data.clone());
                },
            }
        })
    }
}

fn fire(handler: &Arc<dyn JobHandler>, key: &str, data: JobData) {
    debug!(job = %key, tenant = %data.tenant, "job fired");
    let handler = handler.clone();
    tokio::spawn(async move {
        handler.fire(data).await;
    });
}

#[async_trait]
impl SchedulingEngine for LocalEngine {
    async fn register(
        &self,
        key: &str,
        trigger: &TriggerSpec,
        data: JobData,
    ) -> Result<(), EngineError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(key) {
            return Err(EngineError::AlreadyExists(key.to_string()));
        }
        let plan = Plan::from_trigger(key, trigger)?;
        let handle = self.spawn(key, plan, data.clone());
        jobs.insert(
            key.to_string(),
            LocalJob {
                trigger: trigger.clone(),
                data,
                handle,
            },
        );
        Ok(())
    }

    async fn replace_trigger(&self, key: &str, trigger: &TriggerSpec) -> Result<bool, EngineError> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(key) else {
            return Ok(false);
        };
        let plan = Plan::from_trigger(key, trigger)?;
        job.handle.abort();
        job.handle = self.spawn(key, plan, job.data.clone());
        job.trigger = trigger.clone();
        Ok(true)
    }

    async fn remove_job(&self, key: &str) -> Result<bool, EngineError> {
        match self.jobs.lock().await.remove(key) {
            Some(job) => {
                job.handle.abort();
                Ok(true)
            }
            None => {
                warn!(job = %key, "remove requested for unknown job");
                Ok(false)
            }
        }
    }
}
