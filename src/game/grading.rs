//! Scoring: per-variant correctness checks and the speed-weighted point
//! formula shared by all four question kinds.

use std::collections::{BTreeMap, HashSet};

use crate::models::{Question, QuestionKind};

pub const BASE_POINTS: i64 = 1000;

pub struct GradeOutcome {
    pub is_correct: bool,
    pub points_earned: i64,
    pub time_bonus: i64,
    pub multiplier: f64,
    /// `Some` only for `multiMcq`, where credit can fall strictly between 0
    /// and 1.
    pub partial_credit: Option<f64>,
}

impl GradeOutcome {
    pub fn is_partial(&self) -> bool {
        matches!(self.partial_credit, Some(fraction) if fraction > 0.0 && fraction < 1.0)
    }
}

/// Grades one submitted answer against a question.
///
/// `elapsed_seconds` is clamped to `[0, time_limit_seconds]` before the
/// speed multiplier is computed, so a client-reported timestamp can never
/// earn more than the maximum 2x bonus or go negative.
pub fn grade_answer(
    question: &Question,
    answer: &serde_json::Value,
    elapsed_seconds: f64,
    time_limit_seconds: u32,
) -> GradeOutcome {
    let limit = (time_limit_seconds as f64).max(1.0);
    let elapsed = elapsed_seconds.clamp(0.0, limit);
    let multiplier = (2.0 - elapsed / limit).max(1.0);

    let (is_correct, fraction) = match question.kind {
        QuestionKind::SingleMcq | QuestionKind::TrueFalse => grade_single(question, answer),
        QuestionKind::MultiMcq => grade_multi(question, answer),
        QuestionKind::DragAndDrop => grade_drag(question, answer),
    };

    let effective_base = (BASE_POINTS as f64 * fraction).round();
    let time_bonus = (effective_base * (multiplier - 1.0)).round() as i64;
    let points_earned = effective_base as i64 + time_bonus;

    GradeOutcome {
        is_correct,
        points_earned,
        time_bonus,
        multiplier,
        partial_credit: matches!(question.kind, QuestionKind::MultiMcq).then_some(fraction),
    }
}

/// The canonical correct-answer value to echo back to a player after
/// grading, in the same shape their submission would have taken.
pub fn correct_answer_value(question: &Question) -> serde_json::Value {
    match question.kind {
        QuestionKind::SingleMcq | QuestionKind::TrueFalse => serde_json::json!(question.correct_answer_index),
        QuestionKind::MultiMcq => serde_json::json!(question.correct_answer_indices),
        QuestionKind::DragAndDrop => serde_json::json!(question.correct_matches),
    }
}

fn grade_single(question: &Question, answer: &serde_json::Value) -> (bool, f64) {
    let correct = question
        .correct_answer_index
        .zip(answer.as_u64())
        .is_some_and(|(expected, got)| got as usize == expected);
    (correct, if correct { 1.0 } else { 0.0 })
}

fn grade_multi(question: &Question, answer: &serde_json::Value) -> (bool, f64) {
    let correct_set: HashSet<usize> = question
        .correct_answer_indices
        .clone()
        .unwrap_or_default()
        .into_iter()
        .collect();
    if correct_set.is_empty() {
        return (false, 0.0);
    }
    let given: HashSet<usize> = answer
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_u64())
                .map(|v| v as usize)
                .collect()
        })
        .unwrap_or_default();

    let num_correct = given.intersection(&correct_set).count() as f64;
    let num_wrong = given.difference(&correct_set).count() as f64;
    let fraction = ((num_correct - num_wrong) / correct_set.len() as f64).clamp(0.0, 1.0);
    (given == correct_set, fraction)
}

fn grade_drag(question: &Question, answer: &serde_json::Value) -> (bool, f64) {
    let expected = question.correct_matches.clone().unwrap_or_default();
    if expected.is_empty() {
        return (false, 0.0);
    }
    let given: BTreeMap<String, String> = serde_json::from_value(answer.clone()).unwrap_or_default();
    let correct = expected == given;
    (correct, if correct { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_mcq(correct: usize) -> Question {
        Question {
            question: "q".into(),
            kind: QuestionKind::SingleMcq,
            options: vec!["a".into(), "b".into()],
            id: None,
            time_limit: None,
            correct_answer_index: Some(correct),
            correct_answer_indices: None,
            drag_items: None,
            drop_targets: None,
            correct_matches: None,
            image_url: None,
        }
    }

    #[test]
    fn instant_correct_answer_gets_full_double_bonus() {
        let q = single_mcq(1);
        let outcome = grade_answer(&q, &json!(1), 0.0, 20);
        assert!(outcome.is_correct);
        assert_eq!(outcome.points_earned, 2000);
        assert_eq!(outcome.time_bonus, 1000);
    }

    #[test]
    fn answer_at_time_limit_gets_base_points_only() {
        let q = single_mcq(1);
        let outcome = grade_answer(&q, &json!(1), 20.0, 20);
        assert!(outcome.is_correct);
        assert_eq!(outcome.points_earned, 1000);
        assert_eq!(outcome.time_bonus, 0);
    }

    #[test]
    fn wrong_answer_earns_nothing() {
        let q = single_mcq(1);
        let outcome = grade_answer(&q, &json!(0), 0.0, 20);
        assert!(!outcome.is_correct);
        assert_eq!(outcome.points_earned, 0);
    }

    #[test]
    fn multi_mcq_awards_partial_credit_strictly_between_bounds() {
        let q = Question {
            kind: QuestionKind::MultiMcq,
            correct_answer_indices: Some(vec![0, 1, 2]),
            ..single_mcq(0)
        };

        // one correct, one wrong out of three correct -> (1-1)/3 = 0.0
        let outcome = grade_answer(&q, &json!([0, 3]), 0.0, 20);
        assert!(!outcome.is_correct);
        assert_eq!(outcome.points_earned, 0);

        // two correct, zero wrong -> 2/3 fraction, instant answer -> 2x
        let outcome = grade_answer(&q, &json!([0, 1]), 0.0, 20);
        assert!(!outcome.is_correct);
        assert!(outcome.is_partial());
        assert!(outcome.points_earned > 0 && outcome.points_earned < 2000);
    }

    #[test]
    fn drag_and_drop_requires_exact_match() {
        let mut matches = std::collections::BTreeMap::new();
        matches.insert("a".to_string(), "1".to_string());
        let q = Question {
            kind: QuestionKind::DragAndDrop,
            correct_matches: Some(matches),
            ..single_mcq(0)
        };
        let outcome = grade_answer(&q, &json!({"a": "1"}), 0.0, 20);
        assert!(outcome.is_correct);
        let outcome = grade_answer(&q, &json!({"a": "2"}), 0.0, 20);
        assert!(!outcome.is_correct);
    }
}
