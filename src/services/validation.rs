use crate::error::{Error, Result};
use crate::models::{
    answer::Answer,
    question::{NewQuestion, ANSWER_MAX_LIMIT, ANSWER_MIN_LIMIT},
    test::{QUESTION_MAX_LIMIT, QUESTION_MIN_LIMIT},
};

/// Checks the shape of a selection vector against the answers it refers to.
/// A selection must cover every answer, mark at least one, and leave at least
/// one unmarked.
pub fn validate_selection(answers: &[Answer], selection: &[bool]) -> Result<()> {
    if selection.len() != answers.len() {
        return Err(Error::Validation(format!(
            "Expected {} selections, got {}",
            answers.len(),
            selection.len()
        )));
    }

    let selected = selection.iter().filter(|s| **s).count();
    if selected == 0 {
        return Err(Error::Validation(
            "You should select at least 1 answer".to_string(),
        ));
    }
    if selected == selection.len() {
        return Err(Error::Validation("You can't select ALL answers".to_string()));
    }
    Ok(())
}

/// Enforces the catalog limits on a question set before it is saved.
pub fn validate_question_set(questions: &[NewQuestion]) -> Result<()> {
    if !(QUESTION_MIN_LIMIT..=QUESTION_MAX_LIMIT).contains(&questions.len()) {
        return Err(Error::Validation(format!(
            "Quantity of questions is out of range ({}..{})",
            QUESTION_MIN_LIMIT, QUESTION_MAX_LIMIT
        )));
    }

    for (idx, question) in questions.iter().enumerate() {
        let order_number = idx + 1;
        let count = question.answers.len();
        if !(ANSWER_MIN_LIMIT..=ANSWER_MAX_LIMIT).contains(&count) {
            return Err(Error::Validation(format!(
                "Question {}: quantity of answers is out of range ({}..{})",
                order_number, ANSWER_MIN_LIMIT, ANSWER_MAX_LIMIT
            )));
        }

        let correct = question.answers.iter().filter(|a| a.is_correct).count();
        if correct == 0 {
            return Err(Error::Validation(format!(
                "Question {}: at least one answer must be correct",
                order_number
            )));
        }
        if correct == count {
            return Err(Error::Validation(format!(
                "Question {}: not all answers may be correct",
                order_number
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answer::NewAnswer;
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

    fn question(flags: &[bool]) -> NewQuestion {
        NewQuestion {
            text: "q".to_string(),
            answers: flags
                .iter()
                .map(|c| NewAnswer {
                    text: "a".to_string(),
                    is_correct: *c,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = validate_selection(&answers(&[true, false, false]), &[false, false, false])
            .unwrap_err();
        assert_eq!(err.to_string(), "You should select at least 1 answer");
    }

    #[test]
    fn full_selection_is_rejected() {
        let err =
            validate_selection(&answers(&[true, false, false]), &[true, true, true]).unwrap_err();
        assert_eq!(err.to_string(), "You can't select ALL answers");
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = validate_selection(&answers(&[true, false, false]), &[true, false]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn partial_selection_passes() {
        assert!(validate_selection(&answers(&[true, false, false]), &[false, true, false]).is_ok());
    }

    #[test]
    fn question_set_limits() {
        let good = question(&[true, false, false]);
        assert!(validate_question_set(&vec![good.clone(); 3]).is_ok());
        assert!(validate_question_set(&vec![good.clone(); 20]).is_ok());
        assert!(validate_question_set(&vec![good.clone(); 2]).is_err());
        assert!(validate_question_set(&vec![good; 21]).is_err());
    }

    #[test]
    fn answer_limits_and_correct_subset() {
        let ok = question(&[true, false, false]);
        let too_few = question(&[true, false]);
        let too_many = question(&[true, false, false, false, false, false, false]);
        let none_correct = question(&[false, false, false]);
        let all_correct = question(&[true, true, true]);

        for bad in [too_few, too_many, none_correct, all_correct] {
            let set = vec![ok.clone(), bad, ok.clone()];
            let err = validate_question_set(&set).unwrap_err();
            assert!(err.to_string().starts_with("Question 2"), "{}", err);
        }
    }
}
