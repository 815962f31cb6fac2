use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    answer::Answer,
    attempt::{Attempt, AttemptRow, AttemptState},
    question::{NewQuestion, Question},
    test::Test,
    topic::Topic,
};
use crate::store::{AttemptStore, Catalog, NewTest, TestChanges};

const TEST_COLUMNS: &str =
    "id, topic_id, title, description, level, image, created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, user_id, test_id, state, current_order_number, \
     num_correct_answers, num_incorrect_answers, version, created_at, updated_at";

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_questions(
    tx: &mut Transaction<'_, Postgres>,
    test_id: Uuid,
    questions: &[NewQuestion],
) -> Result<()> {
    for (idx, question) in questions.iter().enumerate() {
        let question_id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO questions (id, test_id, order_number, text) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(question_id)
        .bind(test_id)
        .bind((idx as i32) + 1)
        .bind(&question.text)
        .execute(&mut **tx)
        .await?;

        for (pos, answer) in question.answers.iter().enumerate() {
            sqlx::query(
                r#"INSERT INTO answers (id, question_id, position, text, is_correct)
                   VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(Uuid::new_v4())
            .bind(question_id)
            .bind(pos as i32)
            .bind(&answer.text)
            .bind(answer.is_correct)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn get_test(&self, test_id: Uuid) -> Result<Test> {
        let test = sqlx::query_as::<_, Test>(&format!(
            "SELECT {} FROM tests WHERE id = $1",
            TEST_COLUMNS
        ))
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        test.ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    async fn get_topic(&self, topic_id: Uuid) -> Result<Option<Topic>> {
        let topic = sqlx::query_as::<_, Topic>(r#"SELECT id, name FROM topics WHERE id = $1"#)
            .bind(topic_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(topic)
    }

    async fn question_count(&self, test_id: Uuid) -> Result<i32> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM questions WHERE test_id = $1"#)
            .bind(test_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as i32)
    }

    async fn find_question(&self, test_id: Uuid, order_number: i32) -> Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(
            r#"SELECT id, test_id, order_number, text FROM questions
               WHERE test_id = $1 AND order_number = $2"#,
        )
        .bind(test_id)
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(question)
    }

    async fn answers_for(&self, question_id: Uuid) -> Result<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>(
            r#"SELECT id, question_id, position, text, is_correct FROM answers
               WHERE question_id = $1
               ORDER BY position, id"#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn list_tests(&self, limit: i64, offset: i64) -> Result<(Vec<Test>, i64)> {
        let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM tests"#)
            .fetch_one(&self.pool)
            .await?;

        let tests = sqlx::query_as::<_, Test>(&format!(
            "SELECT {} FROM tests ORDER BY title, id LIMIT $1 OFFSET $2",
            TEST_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((tests, total))
    }

    async fn insert_test(&self, test: NewTest) -> Result<Test> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Test>(&format!(
            "INSERT INTO tests (id, topic_id, title, description, level, image)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            TEST_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(test.topic_id)
        .bind(&test.title)
        .bind(&test.description)
        .bind(test.level)
        .bind(&test.image)
        .fetch_one(&mut *tx)
        .await?;

        insert_questions(&mut tx, created.id, &test.questions).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn update_test(&self, test_id: Uuid, changes: TestChanges) -> Result<Test> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Test>(&format!(
            "UPDATE tests
             SET topic_id = CASE WHEN $1 THEN $2 ELSE topic_id END,
                 title = COALESCE($3, title),
                 description = CASE WHEN $4 THEN $5 ELSE description END,
                 level = COALESCE($6, level),
                 image = COALESCE($7, image),
                 updated_at = NOW()
             WHERE id = $8
             RETURNING {}",
            TEST_COLUMNS
        ))
        .bind(changes.topic_id.is_some())
        .bind(changes.topic_id.flatten())
        .bind(changes.title)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .bind(changes.level)
        .bind(changes.image)
        .bind(test_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))?;

        if let Some(questions) = changes.questions {
            sqlx::query(r#"DELETE FROM questions WHERE test_id = $1"#)
                .bind(test_id)
                .execute(&mut *tx)
                .await?;
            insert_questions(&mut tx, test_id, &questions).await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_test(&self, test_id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM tests WHERE id = $1"#)
            .bind(test_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `None` when another NEW attempt already holds the partial unique index.
    async fn try_insert_new(&self, user_id: Uuid, test_id: Uuid) -> Result<Option<Attempt>> {
        let inserted = sqlx::query_as::<_, AttemptRow>(&format!(
            "INSERT INTO attempts (id, user_id, test_id, state)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, test_id) WHERE state = 0 DO NOTHING
             RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(test_id)
        .bind(AttemptState::New.as_i16())
        .fetch_optional(&self.pool)
        .await?;

        inserted.map(Attempt::try_from).transpose()
    }
}

const GET_OR_CREATE_ROUNDS: usize = 3;

/// Alternates insert and select until one of them yields the NEW attempt.
/// The insert can lose to a concurrent one, and the winner can finish before
/// the select sees it; both are retried for a bounded number of rounds.
async fn insert_or_resume<I, IFut, S, SFut>(mut insert: I, mut select: S) -> Result<Attempt>
where
    I: FnMut() -> IFut,
    IFut: Future<Output = Result<Option<Attempt>>>,
    S: FnMut() -> SFut,
    SFut: Future<Output = Result<Option<Attempt>>>,
{
    for round in 1..=GET_OR_CREATE_ROUNDS {
        if let Some(attempt) = insert().await? {
            return Ok(attempt);
        }
        if let Some(attempt) = select().await? {
            return Ok(attempt);
        }
        tracing::debug!(round, "NEW attempt vanished between insert and select, retrying");
    }
    Err(Error::Conflict(
        "NEW attempt could not be created or resumed".to_string(),
    ))
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn get_or_create(&self, user_id: Uuid, test_id: Uuid) -> Result<Attempt> {
        insert_or_resume(
            || self.try_insert_new(user_id, test_id),
            || self.find_new(user_id, test_id),
        )
        .await
        .map_err(|err| match err {
            Error::Conflict(_) => Error::Conflict(format!(
                "Could not start test {} for user {}: attempts keep changing",
                test_id, user_id
            )),
            other => other,
        })
    }

    async fn find_new(&self, user_id: Uuid, test_id: Uuid) -> Result<Option<Attempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE user_id = $1 AND test_id = $2 AND state = $3",
            ATTEMPT_COLUMNS
        ))
        .bind(user_id)
        .bind(test_id)
        .bind(AttemptState::New.as_i16())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn count_new(&self, user_id: Uuid, test_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM attempts WHERE user_id = $1 AND test_id = $2 AND state = $3"#,
        )
        .bind(user_id)
        .bind(test_id)
        .bind(AttemptState::New.as_i16())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn save(&self, attempt: &Attempt) -> Result<Attempt> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "UPDATE attempts
             SET state = $1,
                 current_order_number = $2,
                 num_correct_answers = $3,
                 num_incorrect_answers = $4,
                 version = version + 1,
                 updated_at = NOW()
             WHERE id = $5 AND version = $6
             RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt.state.as_i16())
        .bind(attempt.current_order_number)
        .bind(attempt.num_correct_answers)
        .bind(attempt.num_incorrect_answers)
        .bind(attempt.id)
        .bind(attempt.version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Attempt::try_from(row),
            None => Err(Error::Conflict(format!(
                "Attempt {} was modified concurrently",
                attempt.id
            ))),
        }
    }

    async fn list_for_test(&self, test_id: Uuid) -> Result<Vec<Attempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE test_id = $1 ORDER BY created_at",
            ATTEMPT_COLUMNS
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Attempt::try_from).collect()
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query(r#"DELETE FROM attempts WHERE state = $1 AND updated_at <= $2"#)
                .bind(AttemptState::New.as_i16())
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
