//! Storage seams for the catalog and for attempts.
//!
//! Services depend on these traits only. `postgres` backs them with sqlx,
//! `memory` keeps everything in process for tests and embedding.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    answer::Answer,
    attempt::Attempt,
    question::{NewQuestion, Question},
    test::{Level, Test},
    topic::Topic,
};

/// Header fields of a test being created.
#[derive(Debug, Clone)]
pub struct NewTest {
    pub topic_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub level: Level,
    pub image: String,
    pub questions: Vec<NewQuestion>,
}

/// Partial update of a test. `None` leaves a field alone; for the nullable
/// columns `Some(None)` clears them. `questions`, when present, replaces the
/// whole question set.
#[derive(Debug, Clone, Default)]
pub struct TestChanges {
    pub topic_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub level: Option<Level>,
    pub image: Option<String>,
    pub questions: Option<Vec<NewQuestion>>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fails with `NotFound` when the test does not exist.
    async fn get_test(&self, test_id: Uuid) -> Result<Test>;

    async fn get_topic(&self, topic_id: Uuid) -> Result<Option<Topic>>;

    async fn question_count(&self, test_id: Uuid) -> Result<i32>;

    async fn find_question(&self, test_id: Uuid, order_number: i32) -> Result<Option<Question>>;

    /// Answers of a question in display order.
    async fn answers_for(&self, question_id: Uuid) -> Result<Vec<Answer>>;

    /// Tests ordered by title, plus the total count.
    async fn list_tests(&self, limit: i64, offset: i64) -> Result<(Vec<Test>, i64)>;

    /// Saves the test with all its questions and answers, or nothing.
    async fn insert_test(&self, test: NewTest) -> Result<Test>;

    async fn update_test(&self, test_id: Uuid, changes: TestChanges) -> Result<Test>;

    async fn delete_test(&self, test_id: Uuid) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Returns the NEW attempt for (user, test), creating it with a fresh
    /// cursor only when none exists.
    async fn get_or_create(&self, user_id: Uuid, test_id: Uuid) -> Result<Attempt>;

    async fn find_new(&self, user_id: Uuid, test_id: Uuid) -> Result<Option<Attempt>>;

    async fn count_new(&self, user_id: Uuid, test_id: Uuid) -> Result<i64>;

    /// Writes counters, cursor and state if the stored version still matches
    /// `attempt.version`; otherwise fails with `Conflict` and writes nothing.
    async fn save(&self, attempt: &Attempt) -> Result<Attempt>;

    async fn list_for_test(&self, test_id: Uuid) -> Result<Vec<Attempt>>;

    /// Deletes NEW attempts idle since before `cutoff`.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
