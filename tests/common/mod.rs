#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value as JsonValue;
use smart_test::{
    middleware::auth::Claims,
    models::{answer::NewAnswer, question::NewQuestion, test::{Level, Test}},
    routes,
    store::{
        memory::{MemoryAttemptStore, MemoryCatalog},
        Catalog, NewTest,
    },
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub catalog: Arc<MemoryCatalog>,
    pub attempts: Arc<MemoryAttemptStore>,
}

pub fn setup_app() -> TestApp {
    let attempts = Arc::new(MemoryAttemptStore::new());
    let catalog = Arc::new(MemoryCatalog::with_attempts(attempts.clone()));
    let state = AppState::with_stores(catalog.clone(), attempts.clone(), JWT_SECRET);
    TestApp {
        router: routes::app(state.clone()),
        state,
        catalog,
        attempts,
    }
}

pub fn token_for(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

/// A question whose first answer is the only correct one.
pub fn first_is_correct(text: &str) -> NewQuestion {
    NewQuestion {
        text: text.to_string(),
        answers: vec![
            NewAnswer {
                text: "right".to_string(),
                is_correct: true,
            },
            NewAnswer {
                text: "wrong".to_string(),
                is_correct: false,
            },
            NewAnswer {
                text: "also wrong".to_string(),
                is_correct: false,
            },
        ],
    }
}

pub async fn seed_test(catalog: &MemoryCatalog, questions: usize) -> Test {
    catalog
        .insert_test(NewTest {
            topic_id: None,
            title: "Ownership and borrowing".to_string(),
            description: Some("Moves, borrows and lifetimes".to_string()),
            level: Level::Basic,
            image: "covers/default.png".to_string(),
            questions: (1..=questions)
                .map(|i| first_is_correct(&format!("Question {}", i)))
                .collect(),
        })
        .await
        .expect("seed test")
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}
