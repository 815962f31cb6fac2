use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::question::NewQuestion;
use crate::models::test::{Level, Test};
use crate::models::topic::Topic;
use crate::services::report_service::AttemptSummary;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestPayload {
    pub topic_id: Option<Uuid>,
    #[validate(length(min = 1, max = 128))]
    pub title: String,
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    pub level: Option<Level>,
    #[validate(length(min = 1))]
    pub image: Option<String>,
    #[validate(nested)]
    pub questions: Vec<NewQuestion>,
}

/// Absent fields are left alone. `topic_id` and `description` also accept an
/// explicit `null`, which clears them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_description"))]
pub struct UpdateTestPayload {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<Option<Uuid>>,
    #[validate(length(min = 1, max = 128))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    pub level: Option<Level>,
    #[validate(length(min = 1))]
    pub image: Option<String>,
    #[validate(nested)]
    pub questions: Option<Vec<NewQuestion>>,
}

const DESCRIPTION_MAX_LEN: usize = 1024;

/// `null` becomes `Some(None)`; a missing field falls back to `None` through
/// `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_description(payload: &UpdateTestPayload) -> Result<(), ValidationError> {
    match &payload.description {
        Some(Some(text)) if text.chars().count() > DESCRIPTION_MAX_LEN => {
            Err(ValidationError::new("description_too_long"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestDetailResponse {
    pub test: Test,
    pub topic: Option<Topic>,
    pub question_count: i32,
    pub best_result: Option<AttemptSummary>,
    pub last_run: Option<DateTime<Utc>>,
    pub continue_flag: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_payload_tells_null_from_missing() {
        let missing: UpdateTestPayload = serde_json::from_value(json!({ "title": "x" })).unwrap();
        assert_eq!(missing.topic_id, None);
        assert_eq!(missing.description, None);

        let cleared: UpdateTestPayload =
            serde_json::from_value(json!({ "topic_id": null, "description": null })).unwrap();
        assert_eq!(cleared.topic_id, Some(None));
        assert_eq!(cleared.description, Some(None));

        let set: UpdateTestPayload =
            serde_json::from_value(json!({ "description": "Lifetimes" })).unwrap();
        assert_eq!(set.description, Some(Some("Lifetimes".to_string())));
    }

    #[test]
    fn overlong_description_is_invalid() {
        let payload = UpdateTestPayload {
            description: Some(Some("x".repeat(DESCRIPTION_MAX_LEN + 1))),
            ..Default::default()
        };
        assert!(payload.validate().is_err());

        let cleared = UpdateTestPayload {
            description: Some(None),
            ..Default::default()
        };
        assert!(cleared.validate().is_ok());
    }
}
