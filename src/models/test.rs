use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const QUESTION_MIN_LIMIT: usize = 3;
pub const QUESTION_MAX_LIMIT: usize = 20;

pub const DEFAULT_COVER_IMAGE: &str = "covers/default.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Basic = 0,
    #[default]
    Middle = 1,
    Advanced = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Test {
    pub id: Uuid,
    pub topic_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub level: Level,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
