use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub id: Uuid,
    pub question_id: Uuid,
    /// Display order inside the question. Selection vectors follow it.
    pub position: i32,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewAnswer {
    #[validate(length(min = 1, max = 128))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}
