use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    answer::Answer,
    attempt::Attempt,
    question::Question,
    test::{QUESTION_MAX_LIMIT, QUESTION_MIN_LIMIT},
};
use crate::services::runner::{CurrentQuestion, TestRunner, Transition};
use crate::services::validation::validate_selection;
use crate::store::{AttemptStore, Catalog};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalScore {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub num_correct_answers: i32,
    pub num_incorrect_answers: i32,
    pub question_count: i32,
    pub points: i32,
    pub score_percent: Decimal,
    pub time_spent_seconds: i64,
}

impl FinalScore {
    pub fn of(attempt: &Attempt, question_count: i32) -> Self {
        Self {
            attempt_id: attempt.id,
            test_id: attempt.test_id,
            num_correct_answers: attempt.num_correct_answers,
            num_incorrect_answers: attempt.num_incorrect_answers,
            question_count,
            points: attempt.points(),
            score_percent: attempt.score_percent(question_count),
            time_spent_seconds: attempt.time_spent().num_seconds(),
        }
    }
}

/// What the caller should do after a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Directive {
    Continue {
        attempt_id: Uuid,
        test_id: Uuid,
        next_order_number: i32,
    },
    Finished(FinalScore),
    /// The selection was rejected; the attempt is unchanged and the same
    /// question should be asked again.
    ValidationError { message: String },
    FatalError { message: String },
}

#[derive(Clone)]
pub struct AttemptService {
    catalog: Arc<dyn Catalog>,
    attempts: Arc<dyn AttemptStore>,
}

impl AttemptService {
    pub fn new(catalog: Arc<dyn Catalog>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self { catalog, attempts }
    }

    /// Starts the test for the user, or resumes the attempt already in
    /// progress without touching its progress.
    pub async fn start(&self, user_id: Uuid, test_id: Uuid) -> Result<Attempt> {
        let test = self.catalog.get_test(test_id).await?;
        let question_count = self.catalog.question_count(test.id).await? as usize;
        if !(QUESTION_MIN_LIMIT..=QUESTION_MAX_LIMIT).contains(&question_count) {
            return Err(Error::Validation(format!(
                "Test {} has {} questions and cannot be taken ({}..{} required)",
                test.id, question_count, QUESTION_MIN_LIMIT, QUESTION_MAX_LIMIT
            )));
        }

        let attempt = self.attempts.get_or_create(user_id, test.id).await?;
        tracing::info!(
            attempt_id = %attempt.id,
            %user_id,
            %test_id,
            order_number = attempt.current_order_number,
            "Attempt started or resumed"
        );
        Ok(attempt)
    }

    /// The NEW attempt for (user, test); absence is a `NotFound`.
    pub async fn current_attempt(&self, user_id: Uuid, test_id: Uuid) -> Result<Attempt> {
        self.attempts
            .find_new(user_id, test_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("No test in progress for test {}", test_id))
            })
    }

    /// The question the user's attempt currently points at, with its answers
    /// in display order.
    pub async fn current_question(
        &self,
        user_id: Uuid,
        test_id: Uuid,
    ) -> Result<(Attempt, Question, Vec<Answer>)> {
        let attempt = self.current_attempt(user_id, test_id).await?;
        let question = self
            .catalog
            .find_question(attempt.test_id, attempt.current_order_number)
            .await?
            .ok_or_else(|| missing_question(&attempt))?;
        let answers = self.catalog.answers_for(question.id).await?;
        Ok((attempt, question, answers))
    }

    /// Number of NEW attempts the user holds for the test (0 or 1).
    pub async fn continue_flag(&self, user_id: Uuid, test_id: Uuid) -> Result<i64> {
        self.attempts.count_new(user_id, test_id).await
    }

    /// Loads the user's NEW attempt and applies one step to it.
    pub async fn submit(&self, user_id: Uuid, test_id: Uuid, selection: &[bool]) -> Result<Directive> {
        let attempt = self.current_attempt(user_id, test_id).await?;
        self.step(attempt, selection).await
    }

    /// Applies one step to `attempt` and persists it in a single versioned
    /// write. Storage failures and lost races come back as `Err`; everything
    /// the caller should render comes back as a `Directive`.
    pub async fn step(&self, mut attempt: Attempt, selection: &[bool]) -> Result<Directive> {
        let question_count = self.catalog.question_count(attempt.test_id).await?;

        let transition = if attempt.is_finished() {
            TestRunner::next(&mut attempt, selection, None)
        } else {
            let question = self
                .catalog
                .find_question(attempt.test_id, attempt.current_order_number)
                .await?;
            let answers = match &question {
                Some(question) => self.catalog.answers_for(question.id).await?,
                None => Vec::new(),
            };

            if question.is_some() && !answers.is_empty() {
                if let Err(err) = validate_selection(&answers, selection) {
                    tracing::debug!(attempt_id = %attempt.id, error = %err, "Selection rejected");
                    return Ok(Directive::ValidationError {
                        message: err.to_string(),
                    });
                }
            }

            let current = question.as_ref().map(|_| CurrentQuestion {
                answers: &answers,
                question_count,
            });
            TestRunner::next(&mut attempt, selection, current)
        };

        let transition = match transition {
            Ok(transition) => transition,
            Err(Error::InconsistentState(message)) => {
                tracing::error!(
                    attempt_id = %attempt.id,
                    test_id = %attempt.test_id,
                    order_number = attempt.current_order_number,
                    "{}",
                    message
                );
                return Ok(Directive::FatalError { message });
            }
            Err(other) => return Err(other),
        };

        let saved = self.attempts.save(&attempt).await.map_err(|err| {
            if let Error::Conflict(_) = &err {
                tracing::warn!(attempt_id = %attempt.id, "Concurrent submission lost the race");
            }
            err
        })?;

        tracing::debug!(
            attempt_id = %saved.id,
            ?transition,
            correct = saved.num_correct_answers,
            incorrect = saved.num_incorrect_answers,
            "Attempt advanced"
        );

        Ok(match transition {
            Transition::Advanced {
                next_order_number, ..
            } => Directive::Continue {
                attempt_id: saved.id,
                test_id: saved.test_id,
                next_order_number,
            },
            Transition::Finished { .. } | Transition::Refinalized => {
                Directive::Finished(FinalScore::of(&saved, question_count))
            }
        })
    }
}

fn missing_question(attempt: &Attempt) -> Error {
    Error::InconsistentState(format!(
        "Attempt {} points at question {} which does not exist for test {}",
        attempt.id, attempt.current_order_number, attempt.test_id
    ))
}
