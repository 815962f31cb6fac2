use std::sync::Arc;

use uuid::Uuid;

use crate::dto::test_dto::{CreateTestPayload, UpdateTestPayload};
use crate::error::{Error, Result};
use crate::models::test::{Test, DEFAULT_COVER_IMAGE};
use crate::models::topic::Topic;
use crate::services::validation::validate_question_set;
use crate::store::{Catalog, NewTest, TestChanges};

pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, serde::Serialize)]
pub struct PaginatedTests {
    #[serde(rename = "items")]
    pub tests: Vec<Test>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Clone)]
pub struct TestService {
    catalog: Arc<dyn Catalog>,
}

impl TestService {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub async fn create_test(&self, payload: CreateTestPayload) -> Result<Test> {
        validate_question_set(&payload.questions)?;

        let test = self
            .catalog
            .insert_test(NewTest {
                topic_id: payload.topic_id,
                title: payload.title,
                description: payload.description,
                level: payload.level.unwrap_or_default(),
                image: payload
                    .image
                    .unwrap_or_else(|| DEFAULT_COVER_IMAGE.to_string()),
                questions: payload.questions,
            })
            .await?;

        tracing::info!(test_id = %test.id, title = %test.title, "Test created");
        Ok(test)
    }

    pub async fn update_test(&self, test_id: Uuid, payload: UpdateTestPayload) -> Result<Test> {
        if let Some(questions) = &payload.questions {
            validate_question_set(questions)?;
        }

        let test = self
            .catalog
            .update_test(
                test_id,
                TestChanges {
                    topic_id: payload.topic_id,
                    title: payload.title,
                    description: payload.description,
                    level: payload.level,
                    image: payload.image,
                    questions: payload.questions,
                },
            )
            .await?;

        tracing::info!(test_id = %test.id, "Test updated");
        Ok(test)
    }

    pub async fn get_test(&self, test_id: Uuid) -> Result<Test> {
        self.catalog.get_test(test_id).await
    }

    pub async fn get_topic(&self, topic_id: Uuid) -> Result<Option<Topic>> {
        self.catalog.get_topic(topic_id).await
    }

    pub async fn question_count(&self, test_id: Uuid) -> Result<i32> {
        self.catalog.question_count(test_id).await
    }

    /// `per_page` is clamped to `1..=MAX_PER_PAGE`; a page whose offset does
    /// not fit in an `i64` is a bad request.
    pub async fn list_tests(&self, page: i64, per_page: i64) -> Result<PaginatedTests> {
        if page < 1 {
            return Err(Error::BadRequest("page must be positive".to_string()));
        }
        let per_page = per_page.clamp(1, MAX_PER_PAGE);

        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| Error::BadRequest(format!("page {} is out of range", page)))?;
        let (tests, total) = self.catalog.list_tests(per_page, offset).await?;
        let total_pages = total / per_page + i64::from(total % per_page != 0);

        Ok(PaginatedTests {
            tests,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn delete_test(&self, test_id: Uuid) -> Result<bool> {
        let deleted = self.catalog.delete_test(test_id).await?;
        if deleted {
            tracing::info!(%test_id, "Test deleted");
        }
        Ok(deleted)
    }
}
