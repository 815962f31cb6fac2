use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::NewAnswer;

pub const ANSWER_MIN_LIMIT: usize = 3;
pub const ANSWER_MAX_LIMIT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    /// 1-based and contiguous within the owning test.
    pub order_number: i32,
    pub text: String,
}

/// A question as submitted by an author. Its order number is its position in
/// the submitted list.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewQuestion {
    #[validate(length(min = 1, max = 512))]
    pub text: String,
    #[validate(nested)]
    pub answers: Vec<NewAnswer>,
}
