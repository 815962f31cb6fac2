use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    answer::Answer,
    attempt::{Attempt, AttemptState},
    question::{NewQuestion, Question},
    test::Test,
    topic::Topic,
};
use crate::store::{AttemptStore, Catalog, NewTest, TestChanges};

#[derive(Default)]
struct CatalogData {
    topics: HashMap<Uuid, Topic>,
    tests: HashMap<Uuid, Test>,
    questions: Vec<Question>,
    answers: Vec<Answer>,
}

impl CatalogData {
    fn remove_questions(&mut self, test_id: Uuid) {
        let removed: Vec<Uuid> = self
            .questions
            .iter()
            .filter(|q| q.test_id == test_id)
            .map(|q| q.id)
            .collect();
        self.questions.retain(|q| q.test_id != test_id);
        self.answers.retain(|a| !removed.contains(&a.question_id));
    }

    fn push_questions(&mut self, test_id: Uuid, questions: &[NewQuestion]) {
        for (idx, question) in questions.iter().enumerate() {
            let question_id = Uuid::new_v4();
            self.questions.push(Question {
                id: question_id,
                test_id,
                order_number: (idx as i32) + 1,
                text: question.text.clone(),
            });
            for (pos, answer) in question.answers.iter().enumerate() {
                self.answers.push(Answer {
                    id: Uuid::new_v4(),
                    question_id,
                    position: pos as i32,
                    text: answer.text.clone(),
                    is_correct: answer.is_correct,
                });
            }
        }
    }
}

/// Catalog held in process memory.
#[derive(Default)]
pub struct MemoryCatalog {
    data: Mutex<CatalogData>,
    attempts: Option<Arc<MemoryAttemptStore>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog whose deletes cascade into `attempts`, like the
    /// `ON DELETE CASCADE` on `attempts.test_id`.
    pub fn with_attempts(attempts: Arc<MemoryAttemptStore>) -> Self {
        Self {
            data: Mutex::default(),
            attempts: Some(attempts),
        }
    }

    pub fn add_topic(&self, name: &str) -> Topic {
        let topic = Topic {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        let mut data = self.data.lock().expect("catalog mutex poisoned");
        data.topics.insert(topic.id, topic.clone());
        topic
    }

    /// Drops a single question, leaving a hole in the order numbers.
    pub fn remove_question(&self, test_id: Uuid, order_number: i32) {
        let mut data = self.data.lock().expect("catalog mutex poisoned");
        let removed: Vec<Uuid> = data
            .questions
            .iter()
            .filter(|q| q.test_id == test_id && q.order_number == order_number)
            .map(|q| q.id)
            .collect();
        data.questions.retain(|q| !removed.contains(&q.id));
        data.answers.retain(|a| !removed.contains(&a.question_id));
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_test(&self, test_id: Uuid) -> Result<Test> {
        let data = self.data.lock().expect("catalog mutex poisoned");
        data.tests
            .get(&test_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    async fn get_topic(&self, topic_id: Uuid) -> Result<Option<Topic>> {
        let data = self.data.lock().expect("catalog mutex poisoned");
        Ok(data.topics.get(&topic_id).cloned())
    }

    async fn question_count(&self, test_id: Uuid) -> Result<i32> {
        let data = self.data.lock().expect("catalog mutex poisoned");
        Ok(data.questions.iter().filter(|q| q.test_id == test_id).count() as i32)
    }

    async fn find_question(&self, test_id: Uuid, order_number: i32) -> Result<Option<Question>> {
        let data = self.data.lock().expect("catalog mutex poisoned");
        Ok(data
            .questions
            .iter()
            .find(|q| q.test_id == test_id && q.order_number == order_number)
            .cloned())
    }

    async fn answers_for(&self, question_id: Uuid) -> Result<Vec<Answer>> {
        let data = self.data.lock().expect("catalog mutex poisoned");
        let mut answers: Vec<Answer> = data
            .answers
            .iter()
            .filter(|a| a.question_id == question_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.position);
        Ok(answers)
    }

    async fn list_tests(&self, limit: i64, offset: i64) -> Result<(Vec<Test>, i64)> {
        let data = self.data.lock().expect("catalog mutex poisoned");
        let mut tests: Vec<Test> = data.tests.values().cloned().collect();
        tests.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        let total = tests.len() as i64;
        let page = tests
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert_test(&self, test: NewTest) -> Result<Test> {
        let now = Utc::now();
        let created = Test {
            id: Uuid::new_v4(),
            topic_id: test.topic_id,
            title: test.title,
            description: test.description,
            level: test.level,
            image: test.image,
            created_at: now,
            updated_at: now,
        };
        let mut data = self.data.lock().expect("catalog mutex poisoned");
        data.push_questions(created.id, &test.questions);
        data.tests.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_test(&self, test_id: Uuid, changes: TestChanges) -> Result<Test> {
        let mut data = self.data.lock().expect("catalog mutex poisoned");
        let test = data
            .tests
            .get_mut(&test_id)
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))?;

        if let Some(topic_id) = changes.topic_id {
            test.topic_id = topic_id;
        }
        if let Some(title) = changes.title {
            test.title = title;
        }
        if let Some(description) = changes.description {
            test.description = description;
        }
        if let Some(level) = changes.level {
            test.level = level;
        }
        if let Some(image) = changes.image {
            test.image = image;
        }
        test.updated_at = Utc::now();
        let updated = test.clone();

        if let Some(questions) = changes.questions {
            data.remove_questions(test_id);
            data.push_questions(test_id, &questions);
        }
        Ok(updated)
    }

    async fn delete_test(&self, test_id: Uuid) -> Result<bool> {
        let existed = {
            let mut data = self.data.lock().expect("catalog mutex poisoned");
            let existed = data.tests.remove(&test_id).is_some();
            if existed {
                data.remove_questions(test_id);
            }
            existed
        };
        if existed {
            if let Some(attempts) = &self.attempts {
                attempts.remove_for_test(test_id);
            }
        }
        Ok(existed)
    }
}

/// Attempt store held in process memory. One lock guards all attempts, so the
/// version check in `save` and the uniqueness check in `get_or_create` are
/// atomic.
#[derive(Default)]
pub struct MemoryAttemptStore {
    attempts: Mutex<Vec<Attempt>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an attempt as-is, bypassing the state machine. Used to seed
    /// history.
    pub fn insert(&self, attempt: Attempt) {
        let mut attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        attempts.push(attempt);
    }

    pub fn get(&self, attempt_id: Uuid) -> Option<Attempt> {
        let attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        attempts.iter().find(|a| a.id == attempt_id).cloned()
    }

    fn remove_for_test(&self, test_id: Uuid) {
        let mut attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        attempts.retain(|a| a.test_id != test_id);
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn get_or_create(&self, user_id: Uuid, test_id: Uuid) -> Result<Attempt> {
        let mut attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        if let Some(existing) = attempts.iter().find(|a| {
            a.user_id == user_id && a.test_id == test_id && a.state == AttemptState::New
        }) {
            return Ok(existing.clone());
        }
        let attempt = Attempt::start(user_id, test_id, Utc::now());
        attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn find_new(&self, user_id: Uuid, test_id: Uuid) -> Result<Option<Attempt>> {
        let attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        Ok(attempts
            .iter()
            .find(|a| a.user_id == user_id && a.test_id == test_id && a.state == AttemptState::New)
            .cloned())
    }

    async fn count_new(&self, user_id: Uuid, test_id: Uuid) -> Result<i64> {
        let attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        Ok(attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.test_id == test_id && a.state == AttemptState::New)
            .count() as i64)
    }

    async fn save(&self, attempt: &Attempt) -> Result<Attempt> {
        let mut attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        let stored = attempts
            .iter_mut()
            .find(|a| a.id == attempt.id)
            .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", attempt.id)))?;

        if stored.version != attempt.version {
            return Err(Error::Conflict(format!(
                "Attempt {} was modified concurrently",
                attempt.id
            )));
        }

        stored.state = attempt.state;
        stored.current_order_number = attempt.current_order_number;
        stored.num_correct_answers = attempt.num_correct_answers;
        stored.num_incorrect_answers = attempt.num_incorrect_answers;
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn list_for_test(&self, test_id: Uuid) -> Result<Vec<Attempt>> {
        let attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        Ok(attempts.iter().filter(|a| a.test_id == test_id).cloned().collect())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut attempts = self.attempts.lock().expect("attempt store mutex poisoned");
        let before = attempts.len();
        attempts.retain(|a| !(a.state == AttemptState::New && a.updated_at <= cutoff));
        Ok((before - attempts.len()) as u64)
    }
}
