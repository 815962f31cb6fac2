use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::answer::Answer;
use crate::models::attempt::{Attempt, AttemptState};
use crate::models::question::Question;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub state: AttemptState,
    pub current_order_number: i32,
    pub num_correct_answers: i32,
    pub num_incorrect_answers: i32,
}

impl From<Attempt> for AttemptResponse {
    fn from(attempt: Attempt) -> Self {
        Self {
            attempt_id: attempt.id,
            test_id: attempt.test_id,
            state: attempt.state,
            current_order_number: attempt.current_order_number,
            num_correct_answers: attempt.num_correct_answers,
            num_incorrect_answers: attempt.num_incorrect_answers,
        }
    }
}

/// An answer as shown to the learner; correctness stays server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub order_number: i32,
    pub text: String,
    pub answers: Vec<AnswerOption>,
}

impl QuestionResponse {
    pub fn new(attempt: &Attempt, question: Question, answers: Vec<Answer>) -> Self {
        Self {
            attempt_id: attempt.id,
            test_id: attempt.test_id,
            order_number: question.order_number,
            text: question.text,
            answers: answers
                .into_iter()
                .map(|a| AnswerOption {
                    id: a.id,
                    text: a.text,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    /// One flag per answer, in the order the answers were presented.
    pub selected: Vec<bool>,
}
