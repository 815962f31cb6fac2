use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::attempt::{Attempt, AttemptState};
use crate::store::AttemptStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    pub attempt_id: Uuid,
    pub user_id: Uuid,
    pub state: AttemptState,
    pub num_correct_answers: i32,
    pub num_incorrect_answers: i32,
    pub points: i32,
    pub time_spent_seconds: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<&Attempt> for AttemptSummary {
    fn from(attempt: &Attempt) -> Self {
        Self {
            attempt_id: attempt.id,
            user_id: attempt.user_id,
            state: attempt.state,
            num_correct_answers: attempt.num_correct_answers,
            num_incorrect_answers: attempt.num_incorrect_answers,
            points: attempt.points(),
            time_spent_seconds: attempt.time_spent().num_seconds(),
            updated_at: attempt.updated_at,
        }
    }
}

/// Highest points wins; among equals the quickest run wins.
pub fn pick_best(attempts: &[Attempt]) -> Option<&Attempt> {
    attempts.iter().min_by(|a, b| {
        b.points()
            .cmp(&a.points())
            .then_with(|| a.time_spent().cmp(&b.time_spent()))
    })
}

pub fn latest_update(attempts: &[Attempt]) -> Option<DateTime<Utc>> {
    attempts.iter().map(|a| a.updated_at).max()
}

/// Read-only leaderboard queries. Nothing here changes an attempt.
#[derive(Clone)]
pub struct ReportService {
    attempts: Arc<dyn AttemptStore>,
}

impl ReportService {
    pub fn new(attempts: Arc<dyn AttemptStore>) -> Self {
        Self { attempts }
    }

    /// `None` means nobody has attempted the test yet.
    pub async fn best_result(&self, test_id: Uuid) -> Result<Option<AttemptSummary>> {
        let attempts = self.attempts.list_for_test(test_id).await?;
        Ok(pick_best(&attempts).map(AttemptSummary::from))
    }

    /// `None` means the test has never been run.
    pub async fn last_run(&self, test_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let attempts = self.attempts.list_for_test(test_id).await?;
        Ok(latest_update(&attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryAttemptStore;
    use chrono::Duration;

    fn run(correct: i32, incorrect: i32, minutes: i64) -> Attempt {
        let started = Utc::now() - Duration::hours(1);
        let mut attempt = Attempt::start(Uuid::new_v4(), Uuid::new_v4(), started);
        attempt.state = AttemptState::Finished;
        attempt.current_order_number = correct + incorrect;
        attempt.num_correct_answers = correct;
        attempt.num_incorrect_answers = incorrect;
        attempt.updated_at = started + Duration::minutes(minutes);
        attempt
    }

    #[test]
    fn best_prefers_points_then_speed() {
        let slow_perfect = run(3, 0, 20);
        let fast_perfect = run(3, 0, 5);
        let fast_poor = run(1, 2, 1);
        let attempts = vec![slow_perfect, fast_perfect.clone(), fast_poor];

        let best = pick_best(&attempts).unwrap();
        assert_eq!(best.id, fast_perfect.id);
    }

    #[test]
    fn empty_history_has_no_best_and_no_last_run() {
        assert!(pick_best(&[]).is_none());
        assert!(latest_update(&[]).is_none());
    }

    #[test]
    fn last_run_is_most_recent_update() {
        let early = run(1, 2, 1);
        let late = run(2, 1, 30);
        assert_eq!(latest_update(&[late.clone(), early]), Some(late.updated_at));
    }

    #[tokio::test]
    async fn queries_do_not_touch_attempts() {
        let store = Arc::new(MemoryAttemptStore::new());
        let attempt = run(2, 1, 10);
        store.insert(attempt.clone());

        let reports = ReportService::new(store.clone());
        let best = reports.best_result(attempt.test_id).await.unwrap().unwrap();
        assert_eq!(best.attempt_id, attempt.id);
        assert_eq!(best.points, 1);
        assert_eq!(best.time_spent_seconds, 600);
        assert_eq!(
            reports.last_run(attempt.test_id).await.unwrap(),
            Some(attempt.updated_at)
        );
        assert_eq!(store.get(attempt.id).unwrap(), attempt);
    }

    #[tokio::test]
    async fn unknown_test_yields_sentinels() {
        let reports = ReportService::new(Arc::new(MemoryAttemptStore::new()));
        assert!(reports.best_result(Uuid::new_v4()).await.unwrap().is_none());
        assert!(reports.last_run(Uuid::new_v4()).await.unwrap().is_none());
    }
}
