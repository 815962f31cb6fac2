use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    New,
    Finished,
}

impl AttemptState {
    pub fn as_i16(self) -> i16 {
        match self {
            AttemptState::New => 0,
            AttemptState::Finished => 1,
        }
    }
}

impl TryFrom<i16> for AttemptState {
    type Error = Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AttemptState::New),
            1 => Ok(AttemptState::Finished),
            other => Err(Error::InconsistentState(format!(
                "Unexpected attempt state {}",
                other
            ))),
        }
    }
}

/// One user's run through one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_id: Uuid,
    pub state: AttemptState,
    pub current_order_number: i32,
    pub num_correct_answers: i32,
    pub num_incorrect_answers: i32,
    /// Bumped by the store on every save; a stale value makes the save fail.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attempt {
    pub fn start(user_id: Uuid, test_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            test_id,
            state: AttemptState::New,
            current_order_number: 1,
            num_correct_answers: 0,
            num_incorrect_answers: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == AttemptState::Finished
    }

    pub fn answered(&self) -> i32 {
        self.num_correct_answers + self.num_incorrect_answers
    }

    pub fn points(&self) -> i32 {
        (self.num_correct_answers - self.num_incorrect_answers).max(0)
    }

    pub fn score_percent(&self, question_count: i32) -> Decimal {
        if question_count <= 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.num_correct_answers) * Decimal::ONE_HUNDRED
            / Decimal::from(question_count))
        .round_dp(2)
    }

    pub fn time_spent(&self) -> Duration {
        self.updated_at - self.created_at
    }

    /// Counter/cursor agreement for the attempt's current state.
    pub fn is_consistent(&self, question_count: i32) -> bool {
        match self.state {
            AttemptState::New => self.answered() == self.current_order_number - 1,
            AttemptState::Finished => self.answered() == question_count,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AttemptRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_id: Uuid,
    pub state: i16,
    pub current_order_number: i32,
    pub num_correct_answers: i32,
    pub num_incorrect_answers: i32,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            test_id: row.test_id,
            state: AttemptState::try_from(row.state)?,
            current_order_number: row.current_order_number,
            num_correct_answers: row.num_correct_answers,
            num_incorrect_answers: row.num_incorrect_answers,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(correct: i32, incorrect: i32) -> Attempt {
        let mut attempt = Attempt::start(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        attempt.state = AttemptState::Finished;
        attempt.current_order_number = correct + incorrect;
        attempt.num_correct_answers = correct;
        attempt.num_incorrect_answers = incorrect;
        attempt
    }

    #[test]
    fn points_never_go_negative() {
        assert_eq!(finished(1, 2).points(), 0);
        assert_eq!(finished(3, 1).points(), 2);
        assert_eq!(finished(0, 0).points(), 0);
    }

    #[test]
    fn score_percent_is_rounded_to_two_places() {
        assert_eq!(finished(1, 2).score_percent(3), Decimal::new(3333, 2));
        assert_eq!(finished(3, 0).score_percent(3), Decimal::from(100));
        assert_eq!(finished(0, 3).score_percent(3), Decimal::ZERO);
        assert_eq!(finished(0, 0).score_percent(0), Decimal::ZERO);
    }

    #[test]
    fn unknown_state_value_is_inconsistent() {
        let now = Utc::now();
        let row = AttemptRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            test_id: Uuid::new_v4(),
            state: 7,
            current_order_number: 1,
            num_correct_answers: 0,
            num_incorrect_answers: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let err = Attempt::try_from(row).unwrap_err();
        assert!(matches!(err, Error::InconsistentState(_)));
    }

    #[test]
    fn state_codes_round_trip() {
        for state in [AttemptState::New, AttemptState::Finished] {
            assert_eq!(AttemptState::try_from(state.as_i16()).unwrap(), state);
        }
    }

    #[test]
    fn consistency_tracks_state() {
        let mut attempt = Attempt::start(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        assert!(attempt.is_consistent(3));
        attempt.num_correct_answers = 1;
        assert!(!attempt.is_consistent(3));
        attempt.current_order_number = 2;
        assert!(attempt.is_consistent(3));
        assert!(finished(2, 1).is_consistent(3));
        assert!(!finished(2, 0).is_consistent(3));
    }
}
