//! The attempt state machine.
//!
//! `TestRunner` applies one "submit answer" step to an attempt. It does no
//! I/O: the caller resolves the current question, validates the selection,
//! and persists the mutated attempt in a single write afterwards.

use crate::error::{Error, Result};
use crate::models::{
    answer::Answer,
    attempt::{Attempt, AttemptState},
};

/// The question the attempt's cursor points at, as resolved by the caller.
#[derive(Debug, Clone, Copy)]
pub struct CurrentQuestion<'a> {
    /// Answers in display order, matching the selection vector.
    pub answers: &'a [Answer],
    pub question_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The question was graded and the cursor moved on.
    Advanced { scored: bool, next_order_number: i32 },
    /// The last question was graded; the attempt is now FINISHED.
    Finished { scored: bool },
    /// The attempt was already FINISHED; nothing changed.
    Refinalized,
}

pub struct TestRunner;

impl TestRunner {
    /// Exact-match grading: every answer's mark must equal its correctness.
    pub fn grade(answers: &[Answer], selection: &[bool]) -> bool {
        let matched = answers
            .iter()
            .zip(selection)
            .filter(|(answer, selected)| answer.is_correct == **selected)
            .count();
        matched == answers.len()
    }

    /// Applies one step. `current` is required while the attempt is NEW;
    /// `None` there means the cursor points at a question that does not exist.
    pub fn next(
        attempt: &mut Attempt,
        selection: &[bool],
        current: Option<CurrentQuestion<'_>>,
    ) -> Result<Transition> {
        match attempt.state {
            AttemptState::Finished => {
                attempt.state = AttemptState::Finished;
                Ok(Transition::Refinalized)
            }
            AttemptState::New => {
                let current = current.ok_or_else(|| {
                    Error::InconsistentState(format!(
                        "Attempt {} points at question {} which does not exist for test {}",
                        attempt.id, attempt.current_order_number, attempt.test_id
                    ))
                })?;
                Self::on_new(attempt, selection, current)
            }
        }
    }

    fn on_new(
        attempt: &mut Attempt,
        selection: &[bool],
        current: CurrentQuestion<'_>,
    ) -> Result<Transition> {
        if current.answers.is_empty()
            || attempt.current_order_number < 1
            || attempt.current_order_number > current.question_count
        {
            return Err(Error::InconsistentState(format!(
                "Attempt {} cursor {} is outside the {} questions of test {}",
                attempt.id, attempt.current_order_number, current.question_count, attempt.test_id
            )));
        }

        let scored = Self::grade(current.answers, selection);
        let point = i32::from(scored);
        attempt.num_correct_answers += point;
        attempt.num_incorrect_answers += 1 - point;

        if attempt.current_order_number == current.question_count {
            attempt.state = AttemptState::Finished;
            Ok(Transition::Finished { scored })
        } else {
            attempt.current_order_number += 1;
            Ok(Transition::Advanced {
                scored,
                next_order_number: attempt.current_order_number,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn answers(flags: &[bool]) -> Vec<Answer> {
        let question_id = Uuid::new_v4();
        flags
            .iter()
            .enumerate()
            .map(|(pos, correct)| Answer {
                id: Uuid::new_v4(),
                question_id,
                position: pos as i32,
                text: format!("answer {}", pos),
                is_correct: *correct,
            })
            .collect()
    }

    fn fresh() -> Attempt {
        Attempt::start(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn grading_is_all_or_nothing() {
        let set = answers(&[true, false, false]);
        assert!(TestRunner::grade(&set, &[true, false, false]));
        assert!(!TestRunner::grade(&set, &[true, true, false]));
        assert!(!TestRunner::grade(&set, &[false, true, false]));

        let multi = answers(&[true, false, true, false]);
        assert!(TestRunner::grade(&multi, &[true, false, true, false]));
        assert!(!TestRunner::grade(&multi, &[true, false, false, false]));
    }

    #[test]
    fn walks_every_question_then_finishes() {
        let set = answers(&[true, false, false]);
        let mut attempt = fresh();
        let current = CurrentQuestion {
            answers: &set,
            question_count: 3,
        };

        let t1 = TestRunner::next(&mut attempt, &[true, false, false], Some(current)).unwrap();
        assert_eq!(
            t1,
            Transition::Advanced {
                scored: true,
                next_order_number: 2
            }
        );
        assert!(attempt.is_consistent(3));

        let t2 = TestRunner::next(&mut attempt, &[false, true, false], Some(current)).unwrap();
        assert_eq!(
            t2,
            Transition::Advanced {
                scored: false,
                next_order_number: 3
            }
        );
        assert!(attempt.is_consistent(3));

        let t3 = TestRunner::next(&mut attempt, &[true, false, false], Some(current)).unwrap();
        assert_eq!(t3, Transition::Finished { scored: true });
        assert_eq!(attempt.state, AttemptState::Finished);
        assert_eq!(attempt.current_order_number, 3);
        assert_eq!(attempt.num_correct_answers, 2);
        assert_eq!(attempt.num_incorrect_answers, 1);
        assert!(attempt.is_consistent(3));
    }

    #[test]
    fn finished_attempt_is_left_alone() {
        let mut attempt = fresh();
        attempt.state = AttemptState::Finished;
        attempt.current_order_number = 3;
        attempt.num_correct_answers = 2;
        attempt.num_incorrect_answers = 1;
        let before = attempt.clone();

        let transition = TestRunner::next(&mut attempt, &[true, false, false], None).unwrap();
        assert_eq!(transition, Transition::Refinalized);
        assert_eq!(attempt, before);
    }

    #[test]
    fn missing_question_is_inconsistent() {
        let mut attempt = fresh();
        let before = attempt.clone();
        let err = TestRunner::next(&mut attempt, &[true, false, false], None).unwrap_err();
        assert!(matches!(err, Error::InconsistentState(_)));
        assert_eq!(attempt, before);
    }

    #[test]
    fn cursor_past_the_end_is_inconsistent() {
        let set = answers(&[true, false, false]);
        let mut attempt = fresh();
        attempt.current_order_number = 4;
        attempt.num_incorrect_answers = 3;

        let err = TestRunner::next(
            &mut attempt,
            &[true, false, false],
            Some(CurrentQuestion {
                answers: &set,
                question_count: 3,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InconsistentState(_)));
        assert_eq!(attempt.num_incorrect_answers, 3);
    }
}
