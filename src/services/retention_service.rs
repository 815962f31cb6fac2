use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::Result;
use crate::store::AttemptStore;

/// Deletes NEW attempts nobody has touched for `retention`. Finished
/// attempts are history and are kept.
#[derive(Clone)]
pub struct RetentionService {
    attempts: Arc<dyn AttemptStore>,
    retention: Duration,
}

impl RetentionService {
    pub fn new(attempts: Arc<dyn AttemptStore>, retention_days: i64) -> Self {
        Self {
            attempts,
            retention: Duration::days(retention_days),
        }
    }

    pub async fn purge_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - self.retention;
        let removed = self.attempts.purge_stale(cutoff).await?;
        tracing::info!(removed, %cutoff, "Outdated attempts deleted");
        Ok(removed)
    }

    /// Registers the sweep on a cron schedule and starts the scheduler.
    pub async fn schedule(self, cron: &str) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;
        let job = Job::new_async(cron, move |_id, _scheduler| {
            let service = self.clone();
            Box::pin(async move {
                if let Err(e) = service.purge_stale(Utc::now()).await {
                    tracing::error!(error = ?e, "Attempt retention sweep failed");
                }
            })
        })?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attempt::Attempt;
    use crate::store::memory::MemoryAttemptStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn sweep_uses_the_retention_window() {
        let store = Arc::new(MemoryAttemptStore::new());
        let now = Utc::now();

        let mut idle = Attempt::start(Uuid::new_v4(), Uuid::new_v4(), now - Duration::days(8));
        idle.updated_at = now - Duration::days(8);
        let mut recent = Attempt::start(Uuid::new_v4(), Uuid::new_v4(), now - Duration::days(2));
        recent.updated_at = now - Duration::days(2);
        store.insert(idle.clone());
        store.insert(recent.clone());

        let service = RetentionService::new(store.clone(), 7);
        assert_eq!(service.purge_stale(now).await.unwrap(), 1);
        assert!(store.get(idle.id).is_none());
        assert!(store.get(recent.id).is_some());
    }
}
